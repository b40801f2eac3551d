//! Error types for iCharger communications.
//!
//! Three layers are kept apart:
//! * [`ModbusError`] - the flat, firmware-defined result code of a framed transaction.
//! * [`DecodeError`] - a byte buffer could not be turned into a structure (or back).
//! * [`Error`] - what a [`Charger`](crate::charger::Charger) session hands back, wrapping the above
//!   together with the raw transport error.

use strum_macros::EnumIter;
use thiserror::Error;

pub type Result<T, I> = core::result::Result<T, Error<I>>;

/// Result codes of the HID Modbus master.
///
/// The numeric values are the ones used by the charger firmware and by the exception
/// byte in a `function | 0x80` response. Success (`0x00`) is represented by `Ok(..)`.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, EnumIter)]
pub enum ModbusError {
    #[error("Illegal function")]
    IllegalFunction,
    #[error("Illegal data address")]
    IllegalDataAddress,
    #[error("Illegal data value")]
    IllegalDataValue,
    #[error("Slave device failure")]
    SlaveDeviceFailure,
    #[error("Acknowledge")]
    Acknowledge,
    #[error("Slave device busy")]
    SlaveBusy,
    #[error("Memory parity error")]
    MemoryParityError,
    #[error("Gateway path unavailable")]
    GatewayPathFailed,
    #[error("Gateway target device failed to respond")]
    GatewayTargetFailed,
    #[error("Illegal register address")]
    NoRegister,
    #[error("Function code not supported by the master")]
    IllegalFunctionLocal,
    #[error("I/O error")]
    Io,
    #[error("Unexpected function code returned")]
    ReturnMismatch,
    #[error("Report length mismatch")]
    LengthMismatch,
    #[error("Transaction timed out")]
    TimedOut,
    #[error("Invalid error code")]
    Invalid,
    #[error("Unknown error code 0x{0:02X}")]
    Unknown(u8),
}

impl ModbusError {
    /// The firmware code of this error.
    pub const fn code(&self) -> u8 {
        match self {
            Self::IllegalFunction => 0x01,
            Self::IllegalDataAddress => 0x02,
            Self::IllegalDataValue => 0x03,
            Self::SlaveDeviceFailure => 0x04,
            Self::Acknowledge => 0x05,
            Self::SlaveBusy => 0x06,
            Self::MemoryParityError => 0x08,
            Self::GatewayPathFailed => 0x0A,
            Self::GatewayTargetFailed => 0x0B,
            Self::NoRegister => 0x80,
            Self::IllegalFunctionLocal => 0xF0,
            Self::Io => 0xF1,
            Self::ReturnMismatch => 0xF2,
            Self::LengthMismatch => 0xF3,
            Self::TimedOut => 0xF4,
            Self::Invalid => 0xF5,
            Self::Unknown(code) => *code,
        }
    }

    /// Map an exception byte reported by the charger.
    ///
    /// Returns `None` for `0x00` (no error).
    pub const fn from_code(code: u8) -> Option<Self> {
        let error = match code {
            0x00 => return None,
            0x01 => Self::IllegalFunction,
            0x02 => Self::IllegalDataAddress,
            0x03 => Self::IllegalDataValue,
            0x04 => Self::SlaveDeviceFailure,
            0x05 => Self::Acknowledge,
            0x06 => Self::SlaveBusy,
            0x08 => Self::MemoryParityError,
            0x0A => Self::GatewayPathFailed,
            0x0B => Self::GatewayTargetFailed,
            0x80 => Self::NoRegister,
            0xF0 => Self::IllegalFunctionLocal,
            0xF1 => Self::Io,
            0xF2 => Self::ReturnMismatch,
            0xF3 => Self::LengthMismatch,
            0xF4 => Self::TimedOut,
            0xF5 => Self::Invalid,
            other => Self::Unknown(other),
        };
        Some(error)
    }
}

/// Failures turning raw bytes into structures and back. Never produced by the transport.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    #[error("Buffer too short: need {needed} bytes, got {actual}")]
    TooShort { needed: usize, actual: usize },
    #[error("Unknown battery type ordinal {0}")]
    UnknownChemistry(u8),
    #[error("Battery type not supported by this charger family")]
    UnsupportedChemistry,
    #[error("Logical parameter index {0} out of range")]
    InvalidIndex(usize),
    #[error("Value {value} does not fit logical parameter {index}")]
    ValueOutOfRange { index: usize, value: u32 },
    #[error("Name longer than {0} bytes")]
    NameTooLong(usize),
    #[error("Memory directory lists {0} entries")]
    DirectoryCount(u16),
    #[error("Block belongs to another charger family")]
    FamilyMismatch,
}

/// Custom error type for a charger session.
#[derive(Error, Debug)]
pub enum Error<I: embedded_io::Error> {
    #[error("HID transport error")]
    Transport(I),
    #[error("Modbus error: {0}")]
    Modbus(ModbusError),
    #[error("Decode error: {0}")]
    Decode(DecodeError),
    #[error("Modbus frame generation failed: {0}")]
    Encode(rmodbus::ErrorKind),
    #[error("Program memory {ordinal} is built in (first writable is {threshold})")]
    BuiltInSlot { ordinal: u8, threshold: u8 },
    #[error("Memory directory is full")]
    DirectoryFull,
    #[error("Program memory {0} is not listed in the directory")]
    NotInDirectory(u8),
}

impl<I: embedded_io::Error> Error<I> {
    /// Collapse this error onto the flat transaction code.
    ///
    /// Errors that never reach the wire (decode, refused writes, directory bookkeeping)
    /// report [`ModbusError::Invalid`].
    pub fn code(&self) -> ModbusError {
        match self {
            Error::Transport(e) => match e.kind() {
                embedded_io::ErrorKind::TimedOut => ModbusError::TimedOut,
                _ => ModbusError::Io,
            },
            Error::Modbus(e) => *e,
            Error::Encode(_) => ModbusError::LengthMismatch,
            Error::Decode(_)
            | Error::BuiltInSlot { .. }
            | Error::DirectoryFull
            | Error::NotInDirectory(_) => ModbusError::Invalid,
        }
    }
}

impl<I: embedded_io::Error> From<ModbusError> for Error<I> {
    fn from(err: ModbusError) -> Self {
        Error::Modbus(err)
    }
}

impl<I: embedded_io::Error> From<DecodeError> for Error<I> {
    fn from(err: DecodeError) -> Self {
        Error::Decode(err)
    }
}

impl<I: embedded_io::Error> From<rmodbus::ErrorKind> for Error<I> {
    fn from(err: rmodbus::ErrorKind) -> Self {
        Error::Encode(err)
    }
}
