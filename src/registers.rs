//! This module is used to define the register map and command block of the iCharger.
//!
//! Input registers hold the device identity and live channel status, holding registers
//! hold the control block, system settings, memory directory and the selected program memory.

use strum_macros::EnumIter;

/// Packet and table limits of the HID Modbus link.
#[derive(Debug, Clone, Copy)]
pub struct Limits;

impl Limits {
    /// Every HID report is exactly this long.
    pub const REPORT_SIZE: usize = 64;
    /// Registers per read transaction. (Report minus length, protocol, function and byte count.)
    pub const READ_REGISTERS_MAX: u16 = ((Self::REPORT_SIZE - 4) / 2) as u16;
    /// Registers per write transaction.
    pub const WRITE_REGISTERS_MAX: u16 = ((Self::REPORT_SIZE - 8) / 2) as u16;
    /// Entries in the program memory directory.
    pub const DIRECTORY_ENTRIES_MAX: usize = 32;
    /// Characters of a program memory name, the stored field has one more byte for the NUL.
    pub const NAME_LEN_MAX: usize = 37;
}

/// Value which arms the order register.
pub const ORDER_KEY: u16 = 0x55AA;

/// Which Modbus table a block lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterKind {
    /// Read only, function `0x04`.
    Input,
    /// Read/write, functions `0x03` and `0x10`.
    Holding,
}

/// Base addresses of every register block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisterMap {
    /// __R__ - Device identity, see [`DeviceInfo`](crate::info::DeviceInfo).
    pub info: u16,
    /// __R__ - Live status of channel 1 and channel 2.
    pub channel_status: [u16; 2],
    /// Registers reserved per channel status block.
    pub channel_status_len: u16,
    /// __R/W__ - Command block, see [`ControlRegister`].
    pub control: u16,
    /// __R/W__ - System settings, see [`SystemConfig`](crate::system::SystemConfig).
    pub system: u16,
    /// __R/W__ - Memory directory, see [`MemoryDirectory`](crate::directory::MemoryDirectory).
    pub memory_head: u16,
    /// __R/W__ - The program memory picked with [`ControlRegister::SelectMemory`].
    pub memory: u16,
}

impl RegisterMap {
    /// Register layout shared by the Duo and X-series firmware.
    pub const ICHARGER: RegisterMap = RegisterMap {
        info: 0x0000,
        channel_status: [0x0100, 0x0200],
        channel_status_len: 0x0100,
        control: 0x8000,
        system: 0x8400,
        memory_head: 0x8800,
        memory: 0x8C00,
    };

    /// Address of one register in the command block.
    pub const fn control(&self, register: ControlRegister) -> u16 {
        self.control + register as u16
    }

    /// First status register of a channel.
    pub const fn channel_status(&self, channel: Channel) -> u16 {
        self.channel_status[channel as usize]
    }
}

impl Default for RegisterMap {
    fn default() -> Self {
        Self::ICHARGER
    }
}

/// Offsets inside the command block.
#[derive(Debug, Copy, Clone, PartialEq, Eq, EnumIter)]
#[repr(u16)]
pub enum ControlRegister {
    /// __W__ - Operation to run, see [`Operation`].
    SelectOperation = 0,
    /// __W__ - Program memory ordinal to load into the memory block.
    SelectMemory = 1,
    /// __W__ - Channel to act on, see [`Channel`].
    SelectChannel = 2,
    /// __W__ - Must hold [`ORDER_KEY`] while an order is written.
    OrderKey = 3,
    /// __W__ - The order to execute, see [`Order`].
    Order = 4,
    /// __W__ - Current limit for a running program.
    Current = 5,
    /// __W__ - Voltage limit for a running program.
    Voltage = 6,
}

impl From<ControlRegister> for u16 {
    fn from(value: ControlRegister) -> Self {
        value as u16
    }
}

/// Orders understood by the command block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter)]
#[repr(u8)]
pub enum Order {
    Stop = 0,
    Run = 1,
    Modify = 2,
    /// Commit the system block.
    WriteSystem = 3,
    /// Commit the memory directory.
    WriteMemoryHead = 4,
    /// Commit the selected program memory.
    WriteMemory = 5,
    LogOn = 6,
    LogOff = 7,
    /// Answer "yes" to the dialog shown on the charger.
    MsgboxYes = 8,
    /// Answer "no" to the dialog shown on the charger.
    MsgboxNo = 9,
}

impl TryFrom<u8> for Order {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        use Order as O;
        Ok(match value {
            0 => O::Stop,
            1 => O::Run,
            2 => O::Modify,
            3 => O::WriteSystem,
            4 => O::WriteMemoryHead,
            5 => O::WriteMemory,
            6 => O::LogOn,
            7 => O::LogOff,
            8 => O::MsgboxYes,
            9 => O::MsgboxNo,
            other => return Err(other),
        })
    }
}

/// Programs which can be started on a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter)]
#[repr(u8)]
pub enum Operation {
    Charge = 0,
    Storage = 1,
    Discharge = 2,
    Cycle = 3,
    Balance = 4,
    /// Digital power supply mode, X-series only.
    Power = 5,
}

/// Output channels. Single channel chargers only have [`Channel::One`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter)]
#[repr(u8)]
pub enum Channel {
    One = 0,
    Two = 1,
}
