//! Live channel status, 87 input registers per channel.

use strum_macros::{EnumIter, IntoStaticStr};

use crate::error::DecodeError;

/// Encoded size of [`ChannelStatus`].
pub const CHANNEL_STATUS_SIZE: usize = 174;
/// Cells reported per channel.
pub const CELLS_MAX: usize = 16;

/// Fault reported by a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, IntoStaticStr)]
pub enum ErrorStatus {
    #[strum(serialize = "OK")]
    Ok,
    #[strum(serialize = "CHECK_WAIT")]
    CheckWait,
    #[strum(serialize = "VIN_OVER")]
    InputVoltageOver,
    #[strum(serialize = "VIN_LOW")]
    InputVoltageLow,
    #[strum(serialize = "VOUT_OVER")]
    OutputVoltageOver,
    #[strum(serialize = "BAT_LOW")]
    BatteryLow,
    #[strum(serialize = "BAT_OVER")]
    BatteryOver,
    #[strum(serialize = "COUT_OVER")]
    OutputCurrentOver,
    #[strum(serialize = "COUT_LOW")]
    OutputCurrentLow,
    #[strum(serialize = "CIN_OVER")]
    InputCurrentOver,
    #[strum(serialize = "CIN_LOW")]
    InputCurrentLow,
    #[strum(serialize = "TEMP_OVER")]
    TemperatureOver,
    #[strum(serialize = "TEMP_LOW")]
    TemperatureLow,
    #[strum(serialize = "CHECK")]
    Check,
    #[strum(serialize = "GND")]
    Ground,
    #[strum(serialize = "POLARITY")]
    Polarity,
    #[strum(serialize = "CONTROL")]
    Control,
    #[strum(serialize = "TIMEOVER")]
    TimeOver,
    #[strum(serialize = "CAP")]
    Capacity,
    #[strum(serialize = "TEMP")]
    Temperature,
    #[strum(serialize = "CURRENT_NULL")]
    NoCurrent,
    #[strum(serialize = "CELLS_LINE")]
    CellsLine,
    #[strum(serialize = "CELLS_LOW")]
    CellsLow,
    #[strum(serialize = "CELLS_OVER")]
    CellsOver,
    #[strum(serialize = "CELLS_L_VOUT")]
    CellsLowOutputVoltage,
    #[strum(serialize = "CELLS_O_VOUT")]
    CellsOverOutputVoltage,
    #[strum(serialize = "CELLS_SET")]
    CellsSet,
    #[strum(serialize = "CELLS_SET_LOW")]
    CellsSetLow,
    #[strum(serialize = "CELLS_SET_OVER")]
    CellsSetOver,
    #[strum(serialize = "BAL_PORT")]
    BalancePort,
    #[strum(serialize = "NO_BAL")]
    NoBalance,
    #[strum(serialize = "CELLS_AUTO")]
    CellsAuto,
    #[strum(serialize = "AWD")]
    Awd,
    #[strum(serialize = "SYN_IMBAL")]
    SyncImbalance,
    #[strum(serialize = "REG_NO_LOAD")]
    RegenerativeNoLoad,
    #[strum(serialize = "CH_OCCUPIED")]
    ChannelOccupied,
    #[strum(serialize = "REG_CAP")]
    RegenerativeCapacity,
    #[strum(serialize = "NULL")]
    Null,
    #[strum(serialize = "UNKNOWN")]
    Unknown(u8),
}

const ERROR_STATUS: [ErrorStatus; 38] = [
    ErrorStatus::Ok,
    ErrorStatus::CheckWait,
    ErrorStatus::InputVoltageOver,
    ErrorStatus::InputVoltageLow,
    ErrorStatus::OutputVoltageOver,
    ErrorStatus::BatteryLow,
    ErrorStatus::BatteryOver,
    ErrorStatus::OutputCurrentOver,
    ErrorStatus::OutputCurrentLow,
    ErrorStatus::InputCurrentOver,
    ErrorStatus::InputCurrentLow,
    ErrorStatus::TemperatureOver,
    ErrorStatus::TemperatureLow,
    ErrorStatus::Check,
    ErrorStatus::Ground,
    ErrorStatus::Polarity,
    ErrorStatus::Control,
    ErrorStatus::TimeOver,
    ErrorStatus::Capacity,
    ErrorStatus::Temperature,
    ErrorStatus::NoCurrent,
    ErrorStatus::CellsLine,
    ErrorStatus::CellsLow,
    ErrorStatus::CellsOver,
    ErrorStatus::CellsLowOutputVoltage,
    ErrorStatus::CellsOverOutputVoltage,
    ErrorStatus::CellsSet,
    ErrorStatus::CellsSetLow,
    ErrorStatus::CellsSetOver,
    ErrorStatus::BalancePort,
    ErrorStatus::NoBalance,
    ErrorStatus::CellsAuto,
    ErrorStatus::Awd,
    ErrorStatus::SyncImbalance,
    ErrorStatus::RegenerativeNoLoad,
    ErrorStatus::ChannelOccupied,
    ErrorStatus::RegenerativeCapacity,
    ErrorStatus::Null,
];

impl From<u8> for ErrorStatus {
    fn from(value: u8) -> Self {
        ERROR_STATUS
            .get(value as usize)
            .copied()
            .unwrap_or(ErrorStatus::Unknown(value))
    }
}

impl From<ErrorStatus> for u8 {
    fn from(value: ErrorStatus) -> Self {
        match value {
            ErrorStatus::Unknown(code) => code,
            known => ERROR_STATUS
                .iter()
                .position(|status| *status == known)
                .map_or(u8::MAX, |p| p as u8),
        }
    }
}

impl ErrorStatus {
    pub fn name(&self) -> &'static str {
        self.into()
    }

    pub fn is_error(&self) -> bool {
        !matches!(self, Self::Ok | Self::Null)
    }
}

/// A raw status word with per bit access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatusBits(pub u16);

impl StatusBits {
    pub const fn is_set(&self, bit: u8) -> bool {
        bit < 16 && self.0 & (1 << bit) != 0
    }

    /// Positions of the set bits, lowest first.
    pub fn set_bits(&self) -> impl Iterator<Item = u8> + '_ {
        (0..16u8).filter(|bit| self.is_set(*bit))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelStatus {
    pub timestamp: u32,
    pub output_power: u32,
    pub output_current: u16,
    pub input_voltage: u16,
    pub output_voltage: u16,
    pub output_capacity: u32,
    pub internal_temperature: i16,
    pub external_temperature: i16,
    pub cell_voltages: [u16; CELLS_MAX],
    pub cell_balances: [u8; CELLS_MAX],
    pub cell_resistances: [u16; CELLS_MAX],
    pub total_resistance: u16,
    pub line_resistance: u16,
    pub cycle_count: u16,
    pub control_status: StatusBits,
    pub run_status: StatusBits,
    /// The low byte of the error pair. Only the high byte indexes [`ErrorStatus`].
    pub error_detail: u8,
    pub error: ErrorStatus,
    /// Dialog the charger is showing, 0 for none.
    pub dialog_box_id: u16,
    pub cell_capacities: [u16; CELLS_MAX],
}

fn words<const N: usize>(bytes: &[u8]) -> [u16; N] {
    let mut out = [0u16; N];
    for (word, pair) in out.iter_mut().zip(bytes.chunks_exact(2)) {
        *word = u16::from_le_bytes([pair[0], pair[1]]);
    }
    out
}

impl ChannelStatus {
    pub fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        if bytes.len() < CHANNEL_STATUS_SIZE {
            return Err(DecodeError::TooShort {
                needed: CHANNEL_STATUS_SIZE,
                actual: bytes.len(),
            });
        }
        let word = |at: usize| u16::from_le_bytes([bytes[at], bytes[at + 1]]);
        let dword = |at: usize| {
            u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
        };
        let mut cell_balances = [0u8; CELLS_MAX];
        cell_balances.copy_from_slice(&bytes[54..70]);

        Ok(Self {
            timestamp: dword(0),
            output_power: dword(4),
            output_current: word(8),
            input_voltage: word(10),
            output_voltage: word(12),
            output_capacity: dword(14),
            internal_temperature: word(18) as i16,
            external_temperature: word(20) as i16,
            cell_voltages: words(&bytes[22..54]),
            cell_balances,
            cell_resistances: words(&bytes[70..102]),
            total_resistance: word(102),
            line_resistance: word(104),
            cycle_count: word(106),
            control_status: StatusBits(word(108)),
            run_status: StatusBits(word(110)),
            error_detail: bytes[112],
            error: ErrorStatus::from(bytes[113]),
            dialog_box_id: word(114),
            cell_capacities: words(&bytes[116..148]),
        })
    }

    /// Number of connected cells, counted by nonzero cell voltage.
    pub fn cell_count(&self) -> usize {
        self.cell_voltages.iter().filter(|v| **v != 0).count()
    }
}
