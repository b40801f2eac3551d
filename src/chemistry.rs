//! Battery chemistries and the small enumerations stored in program memory.

use strum_macros::{EnumIter, IntoStaticStr};

use crate::{device::DeviceFamily, error::DecodeError};

/// Battery chemistry of a program memory.
///
/// The firmware stores it as an ordinal whose meaning depends on the [`DeviceFamily`], use
/// [`Chemistry::from_ordinal`] and [`Chemistry::ordinal`] to convert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, IntoStaticStr)]
pub enum Chemistry {
    LiPo,
    LiIo,
    LiFe,
    #[strum(serialize = "LiHV")]
    LiHv,
    #[strum(serialize = "LTO")]
    Lto,
    #[strum(serialize = "NiMH")]
    NiMh,
    NiCd,
    NiZn,
    Pb,
    /// Digital power supply, X-series only.
    Power,
}

/// Duo chemistries by ordinal.
pub const DUO_CHEMISTRIES: [Chemistry; 8] = [
    Chemistry::LiPo,
    Chemistry::LiIo,
    Chemistry::LiFe,
    Chemistry::NiMh,
    Chemistry::NiCd,
    Chemistry::Pb,
    Chemistry::NiZn,
    Chemistry::LiHv,
];

/// X-series chemistries by ordinal.
pub const X_CHEMISTRIES: [Chemistry; 10] = [
    Chemistry::LiPo,
    Chemistry::LiIo,
    Chemistry::LiFe,
    Chemistry::LiHv,
    Chemistry::Lto,
    Chemistry::NiMh,
    Chemistry::NiCd,
    Chemistry::NiZn,
    Chemistry::Pb,
    Chemistry::Power,
];

/// Phase of a program a cell voltage applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter)]
pub enum Phase {
    Charge,
    /// Storage, or float charge for lead acid.
    Storage,
    Discharge,
}

/// Allowed range and firmware default of a setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SettingRange {
    pub min: u16,
    pub max: u16,
    pub default: u16,
}

impl SettingRange {
    pub const fn new(min: u16, max: u16, default: u16) -> Self {
        Self { min, max, default }
    }

    pub const fn contains(&self, value: u16) -> bool {
        value >= self.min && value <= self.max
    }

    /// Clamp `value` into the range.
    pub const fn clamp(&self, value: u16) -> u16 {
        if value < self.min {
            self.min
        } else if value > self.max {
            self.max
        } else {
            value
        }
    }
}

impl Chemistry {
    /// Decode a firmware ordinal.
    pub fn from_ordinal(family: DeviceFamily, ordinal: u8) -> Result<Self, DecodeError> {
        family
            .chemistries()
            .get(ordinal as usize)
            .copied()
            .ok_or(DecodeError::UnknownChemistry(ordinal))
    }

    /// Firmware ordinal, `None` when `family` does not support this chemistry.
    pub fn ordinal(&self, family: DeviceFamily) -> Option<u8> {
        family
            .chemistries()
            .iter()
            .position(|c| c == self)
            .map(|p| p as u8)
    }

    pub fn name(&self) -> &'static str {
        self.into()
    }

    /// Lithium based chemistries, which share the lithium cell count and balancer.
    pub const fn is_lithium(&self) -> bool {
        matches!(
            self,
            Self::LiPo | Self::LiIo | Self::LiFe | Self::LiHv | Self::Lto
        )
    }

    /// NiMH and NiCd, which share the nickel cell count and peak detection.
    pub const fn is_nickel(&self) -> bool {
        matches!(self, Self::NiMh | Self::NiCd)
    }

    /// Chemistries with a cell balancer.
    pub const fn has_balancer(&self) -> bool {
        self.is_lithium() || matches!(self, Self::NiZn)
    }

    /// Per cell voltage limits in mV for one phase, `None` when the chemistry has no such setting.
    pub const fn voltage_range(&self, phase: Phase) -> Option<SettingRange> {
        use Phase as P;
        let range = match (self, phase) {
            (Self::LiPo, P::Charge) => SettingRange::new(3850, 4350, 4200),
            (Self::LiPo, P::Storage) => SettingRange::new(3700, 3900, 3850),
            (Self::LiPo, P::Discharge) => SettingRange::new(3000, 4100, 3500),
            (Self::LiIo, P::Charge) => SettingRange::new(3750, 4350, 4100),
            (Self::LiIo, P::Storage) => SettingRange::new(3600, 3800, 3750),
            (Self::LiIo, P::Discharge) => SettingRange::new(2500, 4000, 3500),
            (Self::LiFe, P::Charge) => SettingRange::new(3300, 3800, 3600),
            (Self::LiFe, P::Storage) => SettingRange::new(3100, 3400, 3300),
            (Self::LiFe, P::Discharge) => SettingRange::new(2000, 3500, 2500),
            (Self::LiHv, P::Charge) => SettingRange::new(3900, 4450, 4350),
            (Self::LiHv, P::Storage) => SettingRange::new(3700, 3900, 3850),
            (Self::LiHv, P::Discharge) => SettingRange::new(3000, 4100, 3500),
            (Self::Lto, P::Charge) => SettingRange::new(2400, 3100, 2850),
            (Self::Lto, P::Storage) => SettingRange::new(2200, 2600, 2400),
            (Self::Lto, P::Discharge) => SettingRange::new(1500, 2900, 1800),
            (Self::NiZn, P::Charge) => SettingRange::new(1200, 2000, 1900),
            (Self::NiZn, P::Discharge) => SettingRange::new(900, 1600, 1100),
            (Self::Pb, P::Charge) => SettingRange::new(2000, 2600, 2400),
            (Self::Pb, P::Storage) => SettingRange::new(2200, 2400, 2300),
            (Self::Pb, P::Discharge) => SettingRange::new(1500, 2400, 1800),
            _ => return None,
        };
        Some(range)
    }
}

/// Declare a byte sized setting enum with its firmware ordinals and display labels.
macro_rules! setting_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            $($(#[$variant_meta:meta])* $variant:ident = $value:literal => $label:literal,)+
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, IntoStaticStr)]
        #[repr(u8)]
        pub enum $name {
            $(
                $(#[$variant_meta])*
                #[strum(serialize = $label)]
                $variant = $value,
            )+
        }

        impl $name {
            pub fn label(&self) -> &'static str {
                self.into()
            }
        }

        impl From<$name> for u8 {
            fn from(value: $name) -> Self {
                value as u8
            }
        }

        impl TryFrom<u8> for $name {
            type Error = u8;

            fn try_from(value: u8) -> Result<Self, Self::Error> {
                match value {
                    $($value => Ok($name::$variant),)+
                    other => Err(other),
                }
            }
        }
    };
}

setting_enum! {
    /// When the balancer starts during a lithium charge.
    pub enum BalancerStart {
        Cv = 0 => "CV",
        Cv100 = 1 => "CV-0.1V",
        Cv200 = 2 => "CV-0.2V",
        Cv300 = 3 => "CV-0.3V",
        Cv400 = 4 => "CV-0.4V",
        Cv500 = 5 => "CV-0.5V",
        Cv600 = 6 => "CV-0.6V",
        Cv700 = 7 => "CV-0.7V",
        Cv800 = 8 => "CV-0.8V",
        Cv900 = 9 => "CV-0.9V",
        Cv1000 = 10 => "CV-1.0V",
        Always = 11 => "Always",
    }
}

setting_enum! {
    /// How end current and balance detection combine to finish a lithium charge.
    pub enum BalancerEndMode {
        CurrentOffDetectOn = 0 => "OFF-ON",
        CurrentOnDetectOff = 1 => "ON-OFF",
        CurrentOrDetect = 2 => "OR",
        CurrentAndDetect = 3 => "AND",
    }
}

setting_enum! {
    pub enum BalancerSpeed {
        Slow = 0 => "slow",
        Normal = 1 => "normal",
        Fast = 2 => "fast",
        /// Use the balancer values stored in the program memory.
        User = 3 => "user",
    }
}

/// Balancer values implied by a [`BalancerSpeed`] preset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BalancerPreset {
    pub diff: u8,
    pub set_point: u8,
    pub over_point: u8,
    pub delay: u8,
}

impl BalancerSpeed {
    /// Fixed values of the preset speeds, `None` for [`BalancerSpeed::User`].
    pub const fn preset(&self) -> Option<BalancerPreset> {
        let preset = match self {
            Self::Slow => BalancerPreset {
                diff: 3,
                set_point: 3,
                over_point: 0,
                delay: 2,
            },
            Self::Normal => BalancerPreset {
                diff: 5,
                set_point: 5,
                over_point: 0,
                delay: 1,
            },
            Self::Fast => BalancerPreset {
                diff: 8,
                set_point: 8,
                over_point: 5,
                delay: 0,
            },
            Self::User => return None,
        };
        Some(preset)
    }
}

setting_enum! {
    pub enum LiChargeMode {
        Balance = 0 => "balancer",
        NoBalance = 1 => "off",
    }
}

setting_enum! {
    pub enum NiChargeMode {
        Normal = 0 => "normal",
        Reflex = 1 => "reflex",
    }
}

setting_enum! {
    pub enum PbChargeMode {
        Normal = 0 => "normal",
        Reflex = 1 => "reflex",
    }
}

setting_enum! {
    pub enum CycleMode {
        ChargeDischarge = 0 => "C->D",
        DischargeCharge = 1 => "D->C",
        ChargeDischargeCharge = 2 => "C->D->C",
        DischargeChargeDischarge = 3 => "D->C->D",
        ChargeDischargeStorage = 4 => "C->D->S",
        DischargeChargeStorage = 5 => "D->C->S",
    }
}

setting_enum! {
    /// Where discharge energy goes, Duo only.
    pub enum RegenerativeMode {
        Off = 0 => "OFF",
        ToInput = 1 => "INPUT",
        ToChannel = 2 => "CH",
        Auto = 3 => "AUTO",
    }
}

setting_enum! {
    /// What the other channel is when discharging channel to channel, Duo only.
    pub enum ChannelType {
        Resistor = 0 => "RES",
        Battery = 1 => "BAT",
    }
}
