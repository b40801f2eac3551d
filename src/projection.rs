//! The logical parameter vector of a program memory.
//!
//! A [`ProgramMemory`] stores one set of voltage and mode fields per chemistry, but only the set
//! selected by its battery type is used by the charger. The logical vector hides that: every
//! index names one setting ("charge cell voltage", "charge mode", ...) and resolves to the field
//! that is authoritative for the current chemistry.
//!
//! The resolution is a lookup table keyed by `(family, chemistry, index)`, see [`mapping`].
//!
//! | Index | Setting | Index | Setting |
//! |---|---|---|---|
//! | 0 | battery type ordinal | 26..=31 | Ni peak, peak delay, zero volt, trickle, trickle current, trickle time |
//! | 1 | cell count | 32..=35 | restore voltage, time, current, keep charging |
//! | 2 | capacity | 36 | storage cell voltage |
//! | 3 | charge current | 37, 38 | storage compensation, fast storage |
//! | 4 | charge mode | 39..=41 | cycle mode, count, delay |
//! | 5 | balancer end mode | 42, 43 | power supply voltage, current |
//! | 6 | end charge current | 44..=46 | power supply lock, auto start, live update |
//! | 7 | charge cell voltage | 47 | channel mode |
//! | 8..=10 | charge safety temperature (°C), capacity, time | 48 | log interval |
//! | 11..=16 | balancer speed, start, diff, set point, over point, delay | 49 | log to SD |
//! | 17..=20 | discharge current, cell voltage, end current, regenerative mode | 50 | regenerative channel mode |
//! | 21, 22 | discharge mode bits | 51, 52 | regenerative channel voltage, current |
//! | 23..=25 | discharge safety temperature (°C), capacity, time | | |

use crate::{
    chemistry::{BalancerSpeed, Chemistry, Phase},
    device::DeviceFamily,
    error::DecodeError,
    memory::{CellVoltages, ProgramMemory, XSeriesFields},
};

/// Number of entries in the logical vector.
pub const LOGICAL_PARAMETERS: usize = 53;

pub type LogicalValues = [u32; LOGICAL_PARAMETERS];

/// Declare the plain program memory fields the table can point at.
macro_rules! plain_fields {
    ($($variant:ident => $($path:ident).+ : $ty:ty,)+) => {
        /// A program memory field shared by both families.
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        pub enum Field {
            $($variant,)+
            /// X-series only.
            Lto(Phase),
            /// X-series only.
            PowerVoltage,
            /// X-series only.
            PowerCurrent,
            /// X-series only.
            PowerOptions,
        }

        impl Field {
            fn get(self, memory: &ProgramMemory) -> u32 {
                let x = memory.x_series.unwrap_or_default();
                match self {
                    $(Self::$variant => memory.$($path).+ as u32,)+
                    Self::Lto(phase) => voltage(&x.lto, phase) as u32,
                    Self::PowerVoltage => x.power_voltage as u32,
                    Self::PowerCurrent => x.power_current as u32,
                    Self::PowerOptions => u16::from_le_bytes(x.power_options.into_bytes()) as u32,
                }
            }

            fn set(
                self,
                memory: &mut ProgramMemory,
                value: u32,
            ) -> Result<(), core::num::TryFromIntError> {
                match self {
                    $(Self::$variant => memory.$($path).+ = <$ty>::try_from(value)?,)+
                    x_field => {
                        let value = u16::try_from(value)?;
                        let x = memory.x_series.get_or_insert_with(XSeriesFields::default);
                        match x_field {
                            Self::Lto(phase) => *voltage_mut(&mut x.lto, phase) = value,
                            Self::PowerVoltage => x.power_voltage = value,
                            Self::PowerCurrent => x.power_current = value,
                            _ => {
                                x.power_options =
                                    crate::memory::PowerOptions::from_bytes(value.to_le_bytes())
                            }
                        }
                    }
                }
                Ok(())
            }
        }
    };
}

plain_fields! {
    BatteryType => battery_type: u8,
    LiCells => li_cells: u8,
    NiCells => ni_cells: u8,
    PbCells => pb_cells: u8,
    NiZnCells => nizn_cells: u8,
    Capacity => capacity: u32,
    ChargeCurrent => charge_current: u16,
    LiBalEndMode => li_bal_end_mode: u8,
    LiModeCharge => li_mode_charge: u8,
    NiModeCharge => ni_mode_charge: u8,
    PbModeCharge => pb_mode_charge: u8,
    EndCharge => end_charge: u16,
    LiPoCharge => lipo.charge: u16,
    LiIoCharge => liio.charge: u16,
    LiFeCharge => life.charge: u16,
    LiHvCharge => lihv.charge: u16,
    NiZnCharge => nizn_charge_volt: u16,
    SafetyTempCharge => safety_temp_charge: u16,
    SafetyCapCharge => safety_cap_charge: u16,
    SafetyTimeCharge => safety_time_charge: u16,
    BalSpeed => bal_speed: u8,
    BalStartMode => bal_start_mode: u8,
    BalDiff => bal_diff: u8,
    BalSetPoint => bal_set_point: u8,
    BalOverPoint => bal_over_point: u8,
    BalDelay => bal_delay: u8,
    DischargeCurrent => discharge_current: u16,
    LiPoDischarge => lipo.discharge: u16,
    LiIoDischarge => liio.discharge: u16,
    LiFeDischarge => life.discharge: u16,
    LiHvDischarge => lihv.discharge: u16,
    NiDischarge => ni_discharge_volt: u16,
    PbDischarge => pb_discharge_volt: u16,
    NiZnDischarge => nizn_discharge_volt: u16,
    EndDischarge => end_discharge: u16,
    RegDischargeMode => reg_discharge_mode: u16,
    LiModeDischarge => li_mode_discharge: u8,
    NiModeDischarge => ni_mode_discharge: u8,
    PbModeDischarge => pb_mode_discharge: u8,
    SafetyTempDischarge => safety_temp_discharge: u16,
    SafetyCapDischarge => safety_cap_discharge: u16,
    SafetyTimeDischarge => safety_time_discharge: u16,
    NiPeak => ni_peak: u16,
    NiPeakDelay => ni_peak_delay: u16,
    NiZeroEnable => ni_zero_enable: u16,
    NiTrickleEnable => ni_trickle_enable: u16,
    NiTrickleCurrent => ni_trickle_current: u16,
    NiTrickleTime => ni_trickle_time: u16,
    RestoreVolt => restore_volt: u16,
    RestoreTime => restore_time: u16,
    RestoreCurrent => restore_current: u16,
    KeepChargeEnable => keep_charge_enable: u8,
    LiPoStorage => lipo.storage: u16,
    LiIoStorage => liio.storage: u16,
    LiFeStorage => life.storage: u16,
    LiHvStorage => lihv.storage: u16,
    StorageCompensation => storage_compensation: u16,
    FastStorage => fast_storage: u8,
    CycleMode => cycle_mode: u8,
    CycleCount => cycle_count: u16,
    CycleDelay => cycle_delay: u16,
    ChannelMode => channel_mode: u8,
    LogInterval => log_interval: u16,
    SaveToSd => save_to_sd: u8,
    RegChannelMode => reg_channel_mode: u8,
    RegChannelVolt => reg_channel_volt: u16,
    RegChannelCurrent => reg_channel_current: u16,
}

fn voltage(voltages: &CellVoltages, phase: Phase) -> u16 {
    match phase {
        Phase::Charge => voltages.charge,
        Phase::Storage => voltages.storage,
        Phase::Discharge => voltages.discharge,
    }
}

fn voltage_mut(voltages: &mut CellVoltages, phase: Phase) -> &mut u16 {
    match phase {
        Phase::Charge => &mut voltages.charge,
        Phase::Storage => &mut voltages.storage,
        Phase::Discharge => &mut voltages.discharge,
    }
}

/// How a stored value relates to its logical value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scale {
    Raw,
    /// Stored `n` times finer than shown.
    Div(u32),
    /// One bit of a flag word, shown as 0 or 1.
    Bit(u8),
    /// Bit 0 of a mode byte.
    LowBit,
    /// Bits 1.. of a mode byte.
    HighBits,
    /// Raw, but only multiples of `n` are stored.
    Step(u32),
}

impl Scale {
    fn to_logical(self, raw: u32) -> u32 {
        match self {
            Self::Raw | Self::Step(_) => raw,
            Self::Div(n) => raw / n,
            Self::Bit(bit) => (raw >> bit) & 0x01,
            Self::LowBit => raw & 0x01,
            Self::HighBits => raw >> 1,
        }
    }

    /// The raw value for `value`, keeping the bits of `current` it does not cover.
    fn to_raw(self, value: u32, current: u32) -> Option<u32> {
        match self {
            Self::Raw => Some(value),
            Self::Div(n) => value.checked_mul(n),
            Self::Bit(bit) => {
                (value <= 1).then(|| (current & !(1u32 << bit)) | (value << bit))
            }
            Self::LowBit => (value <= 1).then_some((current & !0x01) | value),
            Self::HighBits => value.checked_mul(2).map(|v| v | (current & 0x01)),
            Self::Step(n) => Some(value - value % n),
        }
    }
}

/// Where one logical index lives for one chemistry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mapping {
    pub field: Field,
    pub scale: Scale,
}

const fn raw(field: Field) -> Option<Mapping> {
    Some(Mapping {
        field,
        scale: Scale::Raw,
    })
}

const fn scaled(field: Field, scale: Scale) -> Option<Mapping> {
    Some(Mapping { field, scale })
}

/// The field behind logical `index` for a `chemistry` program on a `family` charger.
///
/// `Ok(None)` means the setting does not exist for this chemistry. It reads as 0 and
/// ignores writes.
pub fn mapping(
    family: DeviceFamily,
    chemistry: Chemistry,
    index: usize,
) -> Result<Option<Mapping>, DecodeError> {
    use Chemistry as C;
    use Field as F;

    let x = family == DeviceFamily::X;
    let mapping = match (index, chemistry) {
        (0, _) => raw(F::BatteryType),

        (1, C::LiPo | C::LiIo | C::LiFe | C::LiHv | C::Lto) => raw(F::LiCells),
        (1, C::NiMh | C::NiCd) => raw(F::NiCells),
        (1, C::NiZn) => raw(F::NiZnCells),
        (1, C::Pb) => raw(F::PbCells),
        (1, C::Power) => None,
        (2, _) => raw(F::Capacity),
        (3, _) => raw(F::ChargeCurrent),
        (4, c) if c.is_lithium() => raw(F::LiModeCharge),
        (4, C::NiMh | C::NiCd | C::NiZn) => raw(F::NiModeCharge),
        (4, C::Pb) => raw(F::PbModeCharge),
        (4, _) => None,
        (5, _) => raw(F::LiBalEndMode),
        (6, _) => raw(F::EndCharge),

        (7, C::LiPo) => raw(F::LiPoCharge),
        (7, C::LiIo) => raw(F::LiIoCharge),
        (7, C::LiFe) => raw(F::LiFeCharge),
        (7, C::LiHv) => raw(F::LiHvCharge),
        (7, C::Lto) if x => raw(F::Lto(Phase::Charge)),
        (7, C::NiZn) => raw(F::NiZnCharge),
        (7, _) => None,
        (8, _) => scaled(F::SafetyTempCharge, Scale::Div(10)),
        (9, _) => raw(F::SafetyCapCharge),
        (10, _) => raw(F::SafetyTimeCharge),

        (11, _) => raw(F::BalSpeed),
        (12, _) => raw(F::BalStartMode),
        (13, _) => raw(F::BalDiff),
        (14, _) => raw(F::BalSetPoint),
        (15, _) => raw(F::BalOverPoint),
        (16, _) => raw(F::BalDelay),

        (17, _) => raw(F::DischargeCurrent),
        (18, C::LiPo) => raw(F::LiPoDischarge),
        (18, C::LiIo) => raw(F::LiIoDischarge),
        (18, C::LiFe) => raw(F::LiFeDischarge),
        (18, C::LiHv) => raw(F::LiHvDischarge),
        (18, C::Lto) if x => raw(F::Lto(Phase::Discharge)),
        (18, C::NiMh | C::NiCd) => raw(F::NiDischarge),
        (18, C::NiZn) => raw(F::NiZnDischarge),
        (18, C::Pb) => raw(F::PbDischarge),
        (18, _) => None,
        (19, _) => raw(F::EndDischarge),
        (20, _) => raw(F::RegDischargeMode),

        (21 | 22, C::Power) => None,
        (21 | 22, C::NiMh | C::NiCd) => mode_bits(F::NiModeDischarge, index),
        (21 | 22, C::Pb) => mode_bits(F::PbModeDischarge, index),
        (21 | 22, _) => mode_bits(F::LiModeDischarge, index),

        (23, _) => scaled(F::SafetyTempDischarge, Scale::Div(10)),
        (24, _) => raw(F::SafetyCapDischarge),
        (25, _) => raw(F::SafetyTimeDischarge),

        (26, _) => raw(F::NiPeak),
        (27, _) => raw(F::NiPeakDelay),
        (28, _) => raw(F::NiZeroEnable),
        (29, _) => raw(F::NiTrickleEnable),
        (30, _) => raw(F::NiTrickleCurrent),
        (31, _) => raw(F::NiTrickleTime),

        (32, _) => raw(F::RestoreVolt),
        (33, _) => raw(F::RestoreTime),
        (34, _) => raw(F::RestoreCurrent),
        (35, _) => raw(F::KeepChargeEnable),

        (36, C::LiPo) => raw(F::LiPoStorage),
        (36, C::LiIo) => raw(F::LiIoStorage),
        (36, C::LiFe) => raw(F::LiFeStorage),
        (36, C::LiHv) => raw(F::LiHvStorage),
        (36, C::Lto) if x => raw(F::Lto(Phase::Storage)),
        (36, _) => None,
        (37, _) => raw(F::StorageCompensation),
        (38, _) => raw(F::FastStorage),

        (39, _) => raw(F::CycleMode),
        (40, _) => raw(F::CycleCount),
        (41, _) => raw(F::CycleDelay),

        (42, _) if x => scaled(F::PowerVoltage, Scale::Div(100)),
        (43, _) if x => scaled(F::PowerCurrent, Scale::Div(10)),
        (44..=46, _) if x => scaled(F::PowerOptions, Scale::Bit((index - 44) as u8)),
        (42..=46, _) => None,

        (47, _) => raw(F::ChannelMode),
        (48, _) => scaled(F::LogInterval, Scale::Step(5)),
        (49, _) => raw(F::SaveToSd),
        (50, _) => raw(F::RegChannelMode),
        (51, _) => scaled(F::RegChannelVolt, Scale::Div(100)),
        (52, _) => raw(F::RegChannelCurrent),

        _ => return Err(DecodeError::InvalidIndex(index)),
    };
    Ok(mapping)
}

fn mode_bits(field: Field, index: usize) -> Option<Mapping> {
    let scale = if index == 21 {
        Scale::LowBit
    } else {
        Scale::HighBits
    };
    scaled(field, scale)
}

/// Read the whole logical vector. Settings the chemistry does not have read as 0.
pub fn project_to_logical(
    memory: &ProgramMemory,
    family: DeviceFamily,
) -> Result<LogicalValues, DecodeError> {
    let chemistry = memory.chemistry(family)?;
    let mut values = [0u32; LOGICAL_PARAMETERS];
    for (index, value) in values.iter_mut().enumerate() {
        if let Some(Mapping { field, scale }) = mapping(family, chemistry, index)? {
            *value = scale.to_logical(field.get(memory));
        }
    }
    Ok(values)
}

/// Update the field behind logical `index` and report whether the stored bytes changed.
///
/// A value equal to the current logical value leaves the memory untouched, so feeding back a
/// projected vector never loses the precision a scaled field stores beyond its logical value.
/// Index 0 switches the chemistry and only accepts ordinals the family knows.
pub fn apply_from_logical(
    memory: &mut ProgramMemory,
    family: DeviceFamily,
    index: usize,
    value: u32,
) -> Result<bool, DecodeError> {
    let out_of_range = DecodeError::ValueOutOfRange { index, value };
    if index >= LOGICAL_PARAMETERS {
        return Err(DecodeError::InvalidIndex(index));
    }
    if index == 0 {
        let ordinal = u8::try_from(value).map_err(|_| out_of_range)?;
        Chemistry::from_ordinal(family, ordinal)?;
        let changed = memory.battery_type != ordinal;
        memory.battery_type = ordinal;
        return Ok(changed);
    }

    let chemistry = memory.chemistry(family)?;
    let Some(Mapping { field, scale }) = mapping(family, chemistry, index)? else {
        return Ok(false);
    };
    let current = field.get(memory);
    if scale.to_logical(current) == value {
        return Ok(false);
    }
    let updated = scale.to_raw(value, current).ok_or(out_of_range)?;
    field.set(memory, updated).map_err(|_| out_of_range)?;
    Ok(updated != current)
}

/// Whether logical `index` means anything for the program as it stands.
///
/// Used to grey out settings: inactive values are still stored and projected.
pub fn is_active(index: usize, family: DeviceFamily, memory: &ProgramMemory) -> bool {
    let Ok(chemistry) = memory.chemistry(family) else {
        return index == 0;
    };
    if !matches!(mapping(family, chemistry, index), Ok(Some(_))) {
        return false;
    }
    let user_balancer = memory.balancer_speed() == Some(BalancerSpeed::User);
    let duo = family == DeviceFamily::Duo;

    match index {
        5 => chemistry.has_balancer(),
        11 | 12 => chemistry.has_balancer(),
        13..=16 => chemistry.has_balancer() && user_balancer,
        21 | 22 => chemistry.has_balancer(),
        26..=31 => chemistry.is_nickel(),
        42..=46 => chemistry == Chemistry::Power,
        47 | 50..=52 => duo,
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::PROGRAM_MEMORY_MAX;
    use strum::IntoEnumIterator;

    /// Every byte set to something distinct, with a valid battery type.
    fn noisy(family: DeviceFamily, chemistry: Chemistry) -> ProgramMemory {
        let mut bytes = [0u8; PROGRAM_MEMORY_MAX];
        for (i, b) in bytes.iter_mut().enumerate() {
            *b = (i * 13 + 5) as u8;
        }
        bytes[61] = chemistry.ordinal(family).unwrap();
        ProgramMemory::decode(&bytes[..family.program_memory_size()], family).unwrap()
    }

    #[test]
    fn feeding_back_the_projection_changes_nothing() {
        for family in DeviceFamily::iter() {
            for chemistry in family.chemistries() {
                for memory in [
                    noisy(family, *chemistry),
                    ProgramMemory::with_defaults(family, *chemistry).unwrap(),
                ] {
                    let values = project_to_logical(&memory, family).unwrap();
                    let mut copy = memory.clone();
                    for (index, value) in values.iter().enumerate() {
                        let changed = apply_from_logical(&mut copy, family, index, *value).unwrap();
                        assert!(!changed, "{family:?} {chemistry:?} index {index}");
                    }
                    assert_eq!(copy, memory);
                }
            }
        }
    }

    #[test]
    fn x_series_nimh_reads_nickel_fields() {
        let mut bytes = [0u8; 192];
        bytes[61] = 5;
        bytes[65] = 1; // li charge mode
        bytes[67] = 0; // ni charge mode
        bytes[80..82].copy_from_slice(&4200u16.to_le_bytes());
        let memory = ProgramMemory::decode(&bytes, DeviceFamily::X).unwrap();

        let values = project_to_logical(&memory, DeviceFamily::X).unwrap();
        assert_eq!(values[7], 0);
        assert_eq!(values[4], 0);

        let mut memory = memory;
        memory.ni_mode_charge = 1;
        memory.li_mode_charge = 0;
        let values = project_to_logical(&memory, DeviceFamily::X).unwrap();
        assert_eq!(values[4], 1);
    }

    #[test]
    fn ordinals_resolve_per_family() {
        // Ordinal 3 is NiMH on Duo and LiHV on X-series.
        let mut memory = ProgramMemory::with_defaults(DeviceFamily::Duo, Chemistry::LiPo).unwrap();
        memory.battery_type = 3;
        memory.lihv.charge = 4350;
        memory.ni_cells = 12;
        memory.li_cells = 4;
        let duo = project_to_logical(&memory, DeviceFamily::Duo).unwrap();
        assert_eq!((duo[1], duo[7]), (12, 0));

        memory.x_series = Some(XSeriesFields::default());
        let x = project_to_logical(&memory, DeviceFamily::X).unwrap();
        assert_eq!((x[1], x[7]), (4, 4350));
    }

    #[test]
    fn voltage_fields_follow_the_chemistry() {
        let family = DeviceFamily::X;
        let memory = ProgramMemory::with_defaults(family, Chemistry::Lto).unwrap();
        let values = project_to_logical(&memory, family).unwrap();
        assert_eq!((values[7], values[36], values[18]), (2850, 2400, 1800));

        let memory = ProgramMemory::with_defaults(family, Chemistry::NiZn).unwrap();
        let values = project_to_logical(&memory, family).unwrap();
        assert_eq!((values[7], values[36], values[18]), (1900, 0, 1100));

        let memory = ProgramMemory::with_defaults(family, Chemistry::Pb).unwrap();
        let values = project_to_logical(&memory, family).unwrap();
        assert_eq!((values[1], values[7], values[18]), (6, 0, 1800));
    }

    #[test]
    fn scaled_fields() {
        let family = DeviceFamily::X;
        let mut memory = ProgramMemory::with_defaults(family, Chemistry::Power).unwrap();
        memory.safety_temp_charge = 455;
        let values = project_to_logical(&memory, family).unwrap();
        assert_eq!(values[8], 45);

        // Same logical value: the extra half degree survives.
        assert!(!apply_from_logical(&mut memory, family, 8, 45).unwrap());
        assert_eq!(memory.safety_temp_charge, 455);
        assert!(apply_from_logical(&mut memory, family, 8, 50).unwrap());
        assert_eq!(memory.safety_temp_charge, 500);

        assert!(apply_from_logical(&mut memory, family, 42, 120).unwrap());
        assert!(apply_from_logical(&mut memory, family, 43, 55).unwrap());
        let x = memory.x_series.unwrap();
        assert_eq!((x.power_voltage, x.power_current), (12000, 550));

        assert_eq!(
            apply_from_logical(&mut memory, family, 42, 1000),
            Err(DecodeError::ValueOutOfRange {
                index: 42,
                value: 1000
            })
        );
    }

    #[test]
    fn log_interval_is_truncated_to_five_seconds() {
        let family = DeviceFamily::Duo;
        let mut memory = ProgramMemory::with_defaults(family, Chemistry::LiPo).unwrap();
        assert!(apply_from_logical(&mut memory, family, 48, 23).unwrap());
        assert_eq!(memory.log_interval, 20);
        // Truncates to what is already stored.
        assert!(!apply_from_logical(&mut memory, family, 48, 24).unwrap());
    }

    #[test]
    fn power_option_bits() {
        let family = DeviceFamily::X;
        let mut memory = ProgramMemory::with_defaults(family, Chemistry::Power).unwrap();
        assert!(apply_from_logical(&mut memory, family, 45, 1).unwrap());
        assert!(apply_from_logical(&mut memory, family, 46, 1).unwrap());
        let options = memory.x_series.unwrap().power_options;
        assert!(!options.lock());
        assert!(options.auto_start());
        assert!(options.live_update());

        let values = project_to_logical(&memory, family).unwrap();
        assert_eq!(&values[44..47], &[0, 1, 1]);
        assert!(apply_from_logical(&mut memory, family, 46, 2).is_err());
    }

    #[test]
    fn discharge_mode_bits_share_a_byte() {
        let family = DeviceFamily::Duo;
        let mut memory = ProgramMemory::with_defaults(family, Chemistry::LiFe).unwrap();
        memory.li_mode_discharge = 0b101;
        assert!(apply_from_logical(&mut memory, family, 21, 0).unwrap());
        assert_eq!(memory.li_mode_discharge, 0b100);
        assert!(apply_from_logical(&mut memory, family, 22, 1).unwrap());
        assert_eq!(memory.li_mode_discharge, 0b010);

        // Nickel programs use their own byte.
        memory.battery_type = Chemistry::NiCd.ordinal(family).unwrap();
        assert!(apply_from_logical(&mut memory, family, 21, 1).unwrap());
        assert_eq!(memory.ni_mode_discharge, 1);
        assert_eq!(memory.li_mode_discharge, 0b010);
    }

    #[test]
    fn battery_type_updates_are_validated() {
        let mut memory = ProgramMemory::with_defaults(DeviceFamily::Duo, Chemistry::LiPo).unwrap();
        assert_eq!(
            apply_from_logical(&mut memory, DeviceFamily::Duo, 0, 8),
            Err(DecodeError::UnknownChemistry(8))
        );
        assert!(apply_from_logical(&mut memory, DeviceFamily::Duo, 0, 7).unwrap());
        assert_eq!(memory.chemistry(DeviceFamily::Duo), Ok(Chemistry::LiHv));
        assert!(!apply_from_logical(&mut memory, DeviceFamily::Duo, 0, 7).unwrap());
    }

    #[test]
    fn absent_settings_ignore_writes() {
        let family = DeviceFamily::X;
        let mut memory = ProgramMemory::with_defaults(family, Chemistry::NiMh).unwrap();
        let before = memory.clone();
        assert!(!apply_from_logical(&mut memory, family, 7, 4200).unwrap());
        assert!(!apply_from_logical(&mut memory, family, 36, 3800).unwrap());
        assert_eq!(memory, before);

        let mut memory = ProgramMemory::with_defaults(DeviceFamily::Duo, Chemistry::LiPo).unwrap();
        assert!(!apply_from_logical(&mut memory, DeviceFamily::Duo, 42, 120).unwrap());
        assert_eq!(memory.x_series, None);
    }

    #[test]
    fn index_out_of_range() {
        let mut memory = ProgramMemory::with_defaults(DeviceFamily::X, Chemistry::LiPo).unwrap();
        assert_eq!(
            apply_from_logical(&mut memory, DeviceFamily::X, 53, 0),
            Err(DecodeError::InvalidIndex(53))
        );
        assert_eq!(
            mapping(DeviceFamily::X, Chemistry::LiPo, 60),
            Err(DecodeError::InvalidIndex(60))
        );
    }

    #[test]
    fn unknown_chemistry_is_reported() {
        let mut memory = ProgramMemory::with_defaults(DeviceFamily::Duo, Chemistry::LiPo).unwrap();
        memory.battery_type = 9;
        assert_eq!(
            project_to_logical(&memory, DeviceFamily::Duo),
            Err(DecodeError::UnknownChemistry(9))
        );
        assert!(is_active(0, DeviceFamily::Duo, &memory));
        assert!(!is_active(3, DeviceFamily::Duo, &memory));
    }

    #[test]
    fn active_settings() {
        let duo = DeviceFamily::Duo;
        let x = DeviceFamily::X;

        let mut lipo = ProgramMemory::with_defaults(duo, Chemistry::LiPo).unwrap();
        assert!(is_active(11, duo, &lipo));
        assert!(!is_active(13, duo, &lipo));
        lipo.bal_speed = BalancerSpeed::User.into();
        assert!(is_active(13, duo, &lipo));
        assert!(is_active(36, duo, &lipo));
        assert!(!is_active(26, duo, &lipo));
        assert!(is_active(47, duo, &lipo));
        assert!(is_active(51, duo, &lipo));
        assert!(!is_active(42, duo, &lipo));

        let nimh = ProgramMemory::with_defaults(x, Chemistry::NiMh).unwrap();
        for index in [5, 7, 11, 21, 36, 42, 47, 50] {
            assert!(!is_active(index, x, &nimh), "index {index}");
        }
        for index in [1, 4, 18, 26, 31] {
            assert!(is_active(index, x, &nimh), "index {index}");
        }

        let nizn = ProgramMemory::with_defaults(x, Chemistry::NiZn).unwrap();
        assert!(is_active(11, x, &nizn));
        assert!(is_active(21, x, &nizn));
        assert!(!is_active(26, x, &nizn));

        let power = ProgramMemory::with_defaults(x, Chemistry::Power).unwrap();
        for index in 42..=46 {
            assert!(is_active(index, x, &power));
        }
        assert!(!is_active(1, x, &power));
        assert!(!is_active(44, x, &ProgramMemory::with_defaults(x, Chemistry::LiPo).unwrap()));
    }

    #[test]
    fn every_index_resolves_for_every_chemistry() {
        for family in DeviceFamily::iter() {
            for chemistry in family.chemistries() {
                for index in 0..LOGICAL_PARAMETERS {
                    assert!(mapping(family, *chemistry, index).is_ok());
                }
            }
        }
    }
}
