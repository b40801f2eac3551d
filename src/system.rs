//! System settings block.
//!
//! A sequence of little-endian words, 118 bytes on Duo chargers and 156 bytes on X-series
//! chargers. The first and last parts are shared, the middle part differs per family.

use crate::{device::DeviceFamily, error::DecodeError};

/// Largest encoded system block.
pub const SYSTEM_SIZE_MAX: usize = 156;

/// Input limits and regenerative discharge settings of one X-series input source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InputSource {
    pub input_low_volt: u16,
    pub input_current_limit: u16,
    pub charge_power: u16,
    pub reg_enable: u16,
    pub reg_volt_limit: u16,
    pub reg_current_limit: u16,
    pub reg_power_limit: u16,
    pub reg_cap_limit: u32,
}

/// Settings only Duo chargers have. Per channel arrays are indexed by channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DuoSystem {
    pub fans_speed: u16,
    pub beep_mode: u16,
    pub dc_input_low_volt: u16,
    pub dc_input_over_volt: u16,
    pub dc_input_current_limit: u16,
    pub bat_input_low_volt: u16,
    pub bat_input_over_volt: u16,
    pub bat_input_current_limit: u16,
    pub reg_enable: u16,
    pub reg_volt_limit: u16,
    pub reg_current_limit: u16,
    pub charge_power: [u16; 2],
    pub discharge_power: [u16; 2],
    pub pro_power: u16,
    pub monitor_log_interval: [u16; 2],
    pub monitor_log_save_to_sd: [u16; 2],
}

/// Settings only X-series chargers have.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct XSystem {
    pub input_sources: [InputSource; 4],
    pub discharge_power: u16,
    pub monitor_log_interval: u16,
    pub monitor_log_save_to_sd: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FamilySystem {
    Duo(DuoSystem),
    X(XSystem),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SystemConfig {
    pub temp_unit: u16,
    pub temp_stop: u16,
    pub temp_fans_on: u16,
    pub temp_reduce: u16,
    pub fans_off_delay: u16,
    pub lcd_contrast: u16,
    pub light_value: u16,
    pub beep_type: [u16; 4],
    pub beep_enable: [u16; 4],
    pub beep_volume: [u16; 4],
    /// 0 English, 1 German.
    pub select_language: u16,
    pub select_adj: u16,
    pub system_version: u16,
    /// Duo: 0 AC, 1 battery. X-series: input source 0 to 3.
    pub select_input_source: u16,
    pub family: FamilySystem,
    pub servo_type: u16,
    pub servo_user_center: u16,
    pub servo_user_rate: u16,
    pub servo_user_op_angle: u16,
    pub modbus_mode: u16,
    pub modbus_address: u16,
    pub reserved: [u16; 10],
}

struct Reader<'a> {
    bytes: &'a [u8],
    at: usize,
}

impl Reader<'_> {
    fn u16(&mut self) -> u16 {
        let value = u16::from_le_bytes([self.bytes[self.at], self.bytes[self.at + 1]]);
        self.at += 2;
        value
    }

    fn u32(&mut self) -> u32 {
        let low = self.u16() as u32;
        low | (self.u16() as u32) << 16
    }

    fn words<const N: usize>(&mut self) -> [u16; N] {
        core::array::from_fn(|_| self.u16())
    }

    fn input_source(&mut self) -> InputSource {
        InputSource {
            input_low_volt: self.u16(),
            input_current_limit: self.u16(),
            charge_power: self.u16(),
            reg_enable: self.u16(),
            reg_volt_limit: self.u16(),
            reg_current_limit: self.u16(),
            reg_power_limit: self.u16(),
            reg_cap_limit: self.u32(),
        }
    }
}

struct Writer {
    bytes: heapless::Vec<u8, SYSTEM_SIZE_MAX>,
}

impl Writer {
    fn put(&mut self, bytes: &[u8]) {
        let written = self.bytes.extend_from_slice(bytes);
        debug_assert!(written.is_ok(), "system layout larger than SYSTEM_SIZE_MAX");
    }

    fn u16(&mut self, value: u16) {
        self.put(&value.to_le_bytes());
    }

    fn u32(&mut self, value: u32) {
        self.put(&value.to_le_bytes());
    }

    fn words(&mut self, values: &[u16]) {
        values.iter().for_each(|v| self.u16(*v));
    }

    fn input_source(&mut self, source: &InputSource) {
        self.words(&[
            source.input_low_volt,
            source.input_current_limit,
            source.charge_power,
            source.reg_enable,
            source.reg_volt_limit,
            source.reg_current_limit,
            source.reg_power_limit,
        ]);
        self.u32(source.reg_cap_limit);
    }
}

impl SystemConfig {
    pub fn decode(bytes: &[u8], family: DeviceFamily) -> Result<Self, DecodeError> {
        let needed = family.system_size();
        if bytes.len() < needed {
            return Err(DecodeError::TooShort {
                needed,
                actual: bytes.len(),
            });
        }
        let duo = family == DeviceFamily::Duo;
        let mut r = Reader { bytes, at: 0 };
        let mut duo_fields = DuoSystem::default();

        let temp_unit = r.u16();
        let temp_stop = r.u16();
        let temp_fans_on = r.u16();
        let temp_reduce = r.u16();
        if duo {
            duo_fields.fans_speed = r.u16();
        }
        let fans_off_delay = r.u16();
        let lcd_contrast = r.u16();
        let light_value = r.u16();
        if duo {
            duo_fields.beep_mode = r.u16();
        }
        let beep_type = r.words();
        let beep_enable = r.words();
        let beep_volume = r.words();
        let select_language = r.u16();
        let select_adj = r.u16();
        let system_version = r.u16();
        let select_input_source = r.u16();

        let family = if duo {
            duo_fields.dc_input_low_volt = r.u16();
            duo_fields.dc_input_over_volt = r.u16();
            duo_fields.dc_input_current_limit = r.u16();
            duo_fields.bat_input_low_volt = r.u16();
            duo_fields.bat_input_over_volt = r.u16();
            duo_fields.bat_input_current_limit = r.u16();
            duo_fields.reg_enable = r.u16();
            duo_fields.reg_volt_limit = r.u16();
            duo_fields.reg_current_limit = r.u16();
            duo_fields.charge_power = r.words();
            duo_fields.discharge_power = r.words();
            duo_fields.pro_power = r.u16();
            duo_fields.monitor_log_interval = r.words();
            duo_fields.monitor_log_save_to_sd = r.words();
            FamilySystem::Duo(duo_fields)
        } else {
            FamilySystem::X(XSystem {
                input_sources: core::array::from_fn(|_| r.input_source()),
                discharge_power: r.u16(),
                monitor_log_interval: r.u16(),
                monitor_log_save_to_sd: r.u16(),
            })
        };

        Ok(Self {
            temp_unit,
            temp_stop,
            temp_fans_on,
            temp_reduce,
            fans_off_delay,
            lcd_contrast,
            light_value,
            beep_type,
            beep_enable,
            beep_volume,
            select_language,
            select_adj,
            system_version,
            select_input_source,
            family,
            servo_type: r.u16(),
            servo_user_center: r.u16(),
            servo_user_rate: r.u16(),
            servo_user_op_angle: r.u16(),
            modbus_mode: r.u16(),
            modbus_address: r.u16(),
            reserved: r.words(),
        })
    }

    /// Encode in the layout of [`SystemConfig::device_family`].
    pub fn encode(&self) -> heapless::Vec<u8, SYSTEM_SIZE_MAX> {
        let mut w = Writer {
            bytes: heapless::Vec::new(),
        };
        let duo = match &self.family {
            FamilySystem::Duo(duo) => Some(duo),
            FamilySystem::X(_) => None,
        };

        w.words(&[
            self.temp_unit,
            self.temp_stop,
            self.temp_fans_on,
            self.temp_reduce,
        ]);
        if let Some(duo) = duo {
            w.u16(duo.fans_speed);
        }
        w.words(&[self.fans_off_delay, self.lcd_contrast, self.light_value]);
        if let Some(duo) = duo {
            w.u16(duo.beep_mode);
        }
        w.words(&self.beep_type);
        w.words(&self.beep_enable);
        w.words(&self.beep_volume);
        w.words(&[
            self.select_language,
            self.select_adj,
            self.system_version,
            self.select_input_source,
        ]);

        match &self.family {
            FamilySystem::Duo(duo) => {
                w.words(&[
                    duo.dc_input_low_volt,
                    duo.dc_input_over_volt,
                    duo.dc_input_current_limit,
                    duo.bat_input_low_volt,
                    duo.bat_input_over_volt,
                    duo.bat_input_current_limit,
                    duo.reg_enable,
                    duo.reg_volt_limit,
                    duo.reg_current_limit,
                ]);
                w.words(&duo.charge_power);
                w.words(&duo.discharge_power);
                w.u16(duo.pro_power);
                w.words(&duo.monitor_log_interval);
                w.words(&duo.monitor_log_save_to_sd);
            }
            FamilySystem::X(x) => {
                x.input_sources.iter().for_each(|s| w.input_source(s));
                w.words(&[
                    x.discharge_power,
                    x.monitor_log_interval,
                    x.monitor_log_save_to_sd,
                ]);
            }
        }

        w.words(&[
            self.servo_type,
            self.servo_user_center,
            self.servo_user_rate,
            self.servo_user_op_angle,
            self.modbus_mode,
            self.modbus_address,
        ]);
        w.words(&self.reserved);
        w.bytes
    }

    /// The family whose layout this block was decoded from.
    pub fn device_family(&self) -> DeviceFamily {
        match self.family {
            FamilySystem::Duo(_) => DeviceFamily::Duo,
            FamilySystem::X(_) => DeviceFamily::X,
        }
    }
}
