//! Program memory: one stored charging program.
//!
//! A program memory is a packed little-endian structure of 173 bytes on Duo chargers and 192
//! bytes on X-series chargers. Only the cell voltages of the chemistry selected by
//! [`ProgramMemory::battery_type`] are used by the charger, the others are kept as they are.

use modular_bitfield::prelude::*;

use crate::{
    chemistry::{BalancerSpeed, Chemistry, Phase, SettingRange},
    device::DeviceFamily,
    error::DecodeError,
    registers::Limits,
};

/// Largest encoded program memory.
pub const PROGRAM_MEMORY_MAX: usize = 192;

const LIHV_OFFSET: usize = 166;
const NAME_FIELD: usize = Limits::NAME_LEN_MAX + 1;

/// Ranges and defaults of the settings which do not depend on the chemistry.
pub struct Defaults;

impl Defaults {
    pub const LOG_INTERVAL: SettingRange = SettingRange::new(5, 600, 10);
    pub const CYCLE_COUNT: SettingRange = SettingRange::new(1, 99, 3);
    pub const CYCLE_DELAY: SettingRange = SettingRange::new(0, 9999, 3);
    pub const SAFETY_TEMP: SettingRange = SettingRange::new(200, 800, 450);
    pub const SAFETY_CAP: SettingRange = SettingRange::new(50, 200, 120);
    pub const SAFETY_TIME: SettingRange = SettingRange::new(0, 9999, 0);
    pub const END_CURRENT_CHARGE: SettingRange = SettingRange::new(1, 50, 10);
    pub const END_CURRENT_DISCHARGE: SettingRange = SettingRange::new(1, 100, 50);
    pub const CURRENT_DEFAULT: u16 = 200;
    pub const RESTORE_VOLT: SettingRange = SettingRange::new(500, 2500, 1000);
    pub const RESTORE_TIME: SettingRange = SettingRange::new(1, 5, 3);
    pub const RESTORE_CURRENT: SettingRange = SettingRange::new(2, 50, 10);
    pub const BALANCE_VOLT: SettingRange = SettingRange::new(3000, 4200, 3500);
    pub const BALANCE_DIFF: SettingRange = SettingRange::new(1, 10, 5);
    pub const BALANCE_SET_POINT: SettingRange = SettingRange::new(1, 50, 5);
    pub const BALANCE_DELAY: SettingRange = SettingRange::new(0, 20, 1);
    pub const BALANCE_OVER_POINT: SettingRange = SettingRange::new(0, 10, 0);
    pub const STORAGE_COMPENSATION: SettingRange = SettingRange::new(0, 200, 10);
    pub const NIMH_PEAK_SENSITIVITY: u16 = 3;
    pub const NICD_PEAK_SENSITIVITY: u16 = 5;
    pub const NI_PEAK_DELAY: SettingRange = SettingRange::new(0, 20, 3);
    pub const NI_TRICKLE_CURRENT: SettingRange = SettingRange::new(2, 100, 5);
    pub const NI_TRICKLE_TIME: SettingRange = SettingRange::new(1, 999, 5);
    pub const PB_CELLS: u8 = 6;
    pub const REGENERATIVE_VOLT: u16 = 12000;
    pub const REGENERATIVE_CURRENT: u16 = 100;
}

/// How a program memory slot is used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UseFlag {
    /// Written by the user.
    Custom,
    /// Factory program.
    BuiltIn,
    /// Never written.
    Empty,
    Unknown(u16),
}

impl From<u16> for UseFlag {
    fn from(value: u16) -> Self {
        match value {
            0x55AA => Self::Custom,
            0x0000 => Self::BuiltIn,
            0xFFFF => Self::Empty,
            other => Self::Unknown(other),
        }
    }
}

impl From<UseFlag> for u16 {
    fn from(value: UseFlag) -> Self {
        match value {
            UseFlag::Custom => 0x55AA,
            UseFlag::BuiltIn => 0x0000,
            UseFlag::Empty => 0xFFFF,
            UseFlag::Unknown(other) => other,
        }
    }
}

/// Programs the user may start from this memory.
#[bitfield(bits = 16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OperationEnable {
    pub charge: bool,
    #[skip]
    __: B1,
    pub storage: bool,
    pub discharge: bool,
    pub cycle: bool,
    pub balance_only: bool,
    #[skip]
    __: B10,
}

/// Digital power supply options, X-series only.
#[bitfield(bits = 16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PowerOptions {
    pub lock: bool,
    pub auto_start: bool,
    pub live_update: bool,
    #[skip]
    __: B13,
}

/// Per cell voltages in mV of one chemistry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CellVoltages {
    pub charge: u16,
    pub storage: u16,
    pub discharge: u16,
}

impl CellVoltages {
    /// Firmware defaults of `chemistry`, zero for phases it does not have.
    pub fn defaults(chemistry: Chemistry) -> Self {
        let default = |phase| chemistry.voltage_range(phase).map_or(0, |r| r.default);
        Self {
            charge: default(Phase::Charge),
            storage: default(Phase::Storage),
            discharge: default(Phase::Discharge),
        }
    }
}

/// Fields which only exist in X-series program memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct XSeriesFields {
    pub lto: CellVoltages,
    /// User defined chemistry.
    pub user: CellVoltages,
    pub user_cells: u8,
    /// Digital power supply voltage in mV.
    pub power_voltage: u16,
    /// Digital power supply current in mA.
    pub power_current: u16,
    pub power_options: PowerOptions,
}

impl Default for XSeriesFields {
    fn default() -> Self {
        Self {
            lto: CellVoltages::default(),
            user: CellVoltages::default(),
            user_cells: 0,
            power_voltage: 0,
            power_current: 0,
            power_options: PowerOptions::new(),
        }
    }
}

/// One stored charging program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramMemory {
    pub use_flag: UseFlag,
    name: [u8; NAME_FIELD],
    /// Battery capacity in mAh.
    pub capacity: u32,
    pub auto_save: u8,
    /// See [`BalancerEndMode`](crate::chemistry::BalancerEndMode).
    pub li_bal_end_mode: u8,
    pub lock_flag: u8,
    pub lock_password: [u8; 6],
    pub op_enable: OperationEnable,
    /// CH1|CH2, CH1&CH2, CH1, CH2. Duo only.
    pub channel_mode: u8,
    pub save_to_sd: u8,
    /// Seconds between log records.
    pub log_interval: u16,
    pub run_counter: u16,

    /// Chemistry ordinal, see [`Chemistry::from_ordinal`].
    pub battery_type: u8,
    pub li_cells: u8,
    pub ni_cells: u8,
    pub pb_cells: u8,
    /// See [`LiChargeMode`](crate::chemistry::LiChargeMode).
    pub li_mode_charge: u8,
    /// Bit 0 and bits 1.. are two separate discharge options.
    pub li_mode_discharge: u8,
    pub ni_mode_charge: u8,
    pub ni_mode_discharge: u8,
    pub pb_mode_charge: u8,
    pub pb_mode_discharge: u8,

    /// See [`BalancerSpeed`].
    pub bal_speed: u8,
    /// See [`BalancerStart`](crate::chemistry::BalancerStart).
    pub bal_start_mode: u8,
    pub bal_start_volt: u16,
    pub bal_diff: u8,
    pub bal_over_point: u8,
    pub bal_set_point: u8,
    pub bal_delay: u8,
    pub keep_charge_enable: u8,

    pub lipo: CellVoltages,
    pub liio: CellVoltages,
    pub life: CellVoltages,

    /// Charge current.
    pub charge_current: u16,
    /// Discharge current.
    pub discharge_current: u16,
    /// End of charge current in percent.
    pub end_charge: u16,
    /// End of discharge current in percent.
    pub end_discharge: u16,
    /// See [`RegenerativeMode`](crate::chemistry::RegenerativeMode).
    pub reg_discharge_mode: u16,

    pub ni_peak: u16,
    pub ni_peak_delay: u16,
    pub ni_trickle_enable: u16,
    pub ni_trickle_current: u16,
    pub ni_trickle_time: u16,
    pub ni_zero_enable: u16,
    pub ni_discharge_volt: u16,
    pub pb_charge_volt: u16,
    pub pb_discharge_volt: u16,
    pub pb_float_enable: u16,
    pub pb_float_volt: u16,

    pub restore_volt: u16,
    pub restore_time: u16,
    pub restore_current: u16,

    pub cycle_count: u16,
    /// Minutes between cycle steps.
    pub cycle_delay: u16,
    /// See [`CycleMode`](crate::chemistry::CycleMode).
    pub cycle_mode: u8,

    /// Minutes, 0 is off.
    pub safety_time_charge: u16,
    /// Percent of capacity.
    pub safety_cap_charge: u16,
    /// 0.1°C.
    pub safety_temp_charge: u16,
    pub safety_time_discharge: u16,
    pub safety_cap_discharge: u16,
    pub safety_temp_discharge: u16,

    /// See [`ChannelType`](crate::chemistry::ChannelType). Duo only.
    pub reg_channel_mode: u8,
    /// Duo only.
    pub reg_channel_volt: u16,
    /// Duo only.
    pub reg_channel_current: u16,

    pub fast_storage: u8,
    pub storage_compensation: u16,

    pub nizn_charge_volt: u16,
    pub nizn_discharge_volt: u16,
    pub nizn_cells: u8,

    pub lihv: CellVoltages,

    /// `None` for Duo program memory.
    pub x_series: Option<XSeriesFields>,
    /// Trailing padding byte.
    pub reserved: u8,
}

fn le_u16(bytes: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([bytes[at], bytes[at + 1]])
}

fn put_u16(bytes: &mut [u8], at: usize, value: u16) {
    bytes[at..at + 2].copy_from_slice(&value.to_le_bytes());
}

fn cell_voltages(bytes: &[u8], charge: usize, storage: usize, discharge: usize) -> CellVoltages {
    CellVoltages {
        charge: le_u16(bytes, charge),
        storage: le_u16(bytes, storage),
        discharge: le_u16(bytes, discharge),
    }
}

fn put_cell_voltages(
    bytes: &mut [u8],
    voltages: &CellVoltages,
    charge: usize,
    storage: usize,
    discharge: usize,
) {
    put_u16(bytes, charge, voltages.charge);
    put_u16(bytes, storage, voltages.storage);
    put_u16(bytes, discharge, voltages.discharge);
}

impl ProgramMemory {
    /// Decode a program memory read from the charger.
    ///
    /// Duo buffers shorter than the full 173 bytes (but at least 167) are zero-extended.
    pub fn decode(bytes: &[u8], family: DeviceFamily) -> Result<Self, DecodeError> {
        let needed = family.program_memory_min_size();
        if bytes.len() < needed {
            return Err(DecodeError::TooShort {
                needed,
                actual: bytes.len(),
            });
        }
        let mut b = [0u8; PROGRAM_MEMORY_MAX];
        let full = family.program_memory_size();
        // A short buffer ends before the LiHV block, whatever trails it is not ours.
        let n = if bytes.len() < full {
            bytes.len().min(LIHV_OFFSET)
        } else {
            full
        };
        b[..n].copy_from_slice(&bytes[..n]);

        let mut name = [0u8; NAME_FIELD];
        name.copy_from_slice(&b[2..2 + NAME_FIELD]);
        let mut lock_password = [0u8; 6];
        lock_password.copy_from_slice(&b[47..53]);

        let x_series = match family {
            DeviceFamily::Duo => None,
            DeviceFamily::X => Some(XSeriesFields {
                lto: cell_voltages(&b, 172, 174, 176),
                user: cell_voltages(&b, 178, 180, 182),
                user_cells: b[184],
                power_voltage: le_u16(&b, 185),
                power_current: le_u16(&b, 187),
                power_options: PowerOptions::from_bytes([b[189], b[190]]),
            }),
        };

        Ok(Self {
            use_flag: UseFlag::from(le_u16(&b, 0)),
            name,
            capacity: u32::from_le_bytes([b[40], b[41], b[42], b[43]]),
            auto_save: b[44],
            li_bal_end_mode: b[45],
            lock_flag: b[46],
            lock_password,
            op_enable: OperationEnable::from_bytes([b[53], b[54]]),
            channel_mode: b[55],
            save_to_sd: b[56],
            log_interval: le_u16(&b, 57),
            run_counter: le_u16(&b, 59),
            battery_type: b[61],
            li_cells: b[62],
            ni_cells: b[63],
            pb_cells: b[64],
            li_mode_charge: b[65],
            li_mode_discharge: b[66],
            ni_mode_charge: b[67],
            ni_mode_discharge: b[68],
            pb_mode_charge: b[69],
            pb_mode_discharge: b[70],
            bal_speed: b[71],
            bal_start_mode: b[72],
            bal_start_volt: le_u16(&b, 73),
            bal_diff: b[75],
            bal_over_point: b[76],
            bal_set_point: b[77],
            bal_delay: b[78],
            keep_charge_enable: b[79],
            lipo: cell_voltages(&b, 80, 86, 92),
            liio: cell_voltages(&b, 82, 88, 94),
            life: cell_voltages(&b, 84, 90, 96),
            charge_current: le_u16(&b, 98),
            discharge_current: le_u16(&b, 100),
            end_charge: le_u16(&b, 102),
            end_discharge: le_u16(&b, 104),
            reg_discharge_mode: le_u16(&b, 106),
            ni_peak: le_u16(&b, 108),
            ni_peak_delay: le_u16(&b, 110),
            ni_trickle_enable: le_u16(&b, 112),
            ni_trickle_current: le_u16(&b, 114),
            ni_trickle_time: le_u16(&b, 116),
            ni_zero_enable: le_u16(&b, 118),
            ni_discharge_volt: le_u16(&b, 120),
            pb_charge_volt: le_u16(&b, 122),
            pb_discharge_volt: le_u16(&b, 124),
            pb_float_enable: le_u16(&b, 126),
            pb_float_volt: le_u16(&b, 128),
            restore_volt: le_u16(&b, 130),
            restore_time: le_u16(&b, 132),
            restore_current: le_u16(&b, 134),
            cycle_count: le_u16(&b, 136),
            cycle_delay: le_u16(&b, 138),
            cycle_mode: b[140],
            safety_time_charge: le_u16(&b, 141),
            safety_cap_charge: le_u16(&b, 143),
            safety_temp_charge: le_u16(&b, 145),
            safety_time_discharge: le_u16(&b, 147),
            safety_cap_discharge: le_u16(&b, 149),
            safety_temp_discharge: le_u16(&b, 151),
            reg_channel_mode: b[153],
            reg_channel_volt: le_u16(&b, 154),
            reg_channel_current: le_u16(&b, 156),
            fast_storage: b[158],
            storage_compensation: le_u16(&b, 159),
            nizn_charge_volt: le_u16(&b, 161),
            nizn_discharge_volt: le_u16(&b, 163),
            nizn_cells: b[165],
            lihv: cell_voltages(&b, LIHV_OFFSET, LIHV_OFFSET + 2, LIHV_OFFSET + 4),
            x_series,
            reserved: b[family.program_memory_size() - 1],
        })
    }

    /// Encode for writing to the charger.
    ///
    /// The result always holds whole registers, so a Duo memory is padded to 174 bytes.
    /// X-series fields are dropped for Duo and written as zero when missing for X-series.
    pub fn encode(&self, family: DeviceFamily) -> heapless::Vec<u8, PROGRAM_MEMORY_MAX> {
        let mut b = [0u8; PROGRAM_MEMORY_MAX];
        put_u16(&mut b, 0, self.use_flag.into());
        b[2..2 + NAME_FIELD].copy_from_slice(&self.name);
        b[40..44].copy_from_slice(&self.capacity.to_le_bytes());
        b[44] = self.auto_save;
        b[45] = self.li_bal_end_mode;
        b[46] = self.lock_flag;
        b[47..53].copy_from_slice(&self.lock_password);
        b[53..55].copy_from_slice(&self.op_enable.into_bytes());
        b[55] = self.channel_mode;
        b[56] = self.save_to_sd;
        put_u16(&mut b, 57, self.log_interval);
        put_u16(&mut b, 59, self.run_counter);
        b[61] = self.battery_type;
        b[62] = self.li_cells;
        b[63] = self.ni_cells;
        b[64] = self.pb_cells;
        b[65] = self.li_mode_charge;
        b[66] = self.li_mode_discharge;
        b[67] = self.ni_mode_charge;
        b[68] = self.ni_mode_discharge;
        b[69] = self.pb_mode_charge;
        b[70] = self.pb_mode_discharge;
        b[71] = self.bal_speed;
        b[72] = self.bal_start_mode;
        put_u16(&mut b, 73, self.bal_start_volt);
        b[75] = self.bal_diff;
        b[76] = self.bal_over_point;
        b[77] = self.bal_set_point;
        b[78] = self.bal_delay;
        b[79] = self.keep_charge_enable;
        put_cell_voltages(&mut b, &self.lipo, 80, 86, 92);
        put_cell_voltages(&mut b, &self.liio, 82, 88, 94);
        put_cell_voltages(&mut b, &self.life, 84, 90, 96);
        put_u16(&mut b, 98, self.charge_current);
        put_u16(&mut b, 100, self.discharge_current);
        put_u16(&mut b, 102, self.end_charge);
        put_u16(&mut b, 104, self.end_discharge);
        put_u16(&mut b, 106, self.reg_discharge_mode);
        put_u16(&mut b, 108, self.ni_peak);
        put_u16(&mut b, 110, self.ni_peak_delay);
        put_u16(&mut b, 112, self.ni_trickle_enable);
        put_u16(&mut b, 114, self.ni_trickle_current);
        put_u16(&mut b, 116, self.ni_trickle_time);
        put_u16(&mut b, 118, self.ni_zero_enable);
        put_u16(&mut b, 120, self.ni_discharge_volt);
        put_u16(&mut b, 122, self.pb_charge_volt);
        put_u16(&mut b, 124, self.pb_discharge_volt);
        put_u16(&mut b, 126, self.pb_float_enable);
        put_u16(&mut b, 128, self.pb_float_volt);
        put_u16(&mut b, 130, self.restore_volt);
        put_u16(&mut b, 132, self.restore_time);
        put_u16(&mut b, 134, self.restore_current);
        put_u16(&mut b, 136, self.cycle_count);
        put_u16(&mut b, 138, self.cycle_delay);
        b[140] = self.cycle_mode;
        put_u16(&mut b, 141, self.safety_time_charge);
        put_u16(&mut b, 143, self.safety_cap_charge);
        put_u16(&mut b, 145, self.safety_temp_charge);
        put_u16(&mut b, 147, self.safety_time_discharge);
        put_u16(&mut b, 149, self.safety_cap_discharge);
        put_u16(&mut b, 151, self.safety_temp_discharge);
        b[153] = self.reg_channel_mode;
        put_u16(&mut b, 154, self.reg_channel_volt);
        put_u16(&mut b, 156, self.reg_channel_current);
        b[158] = self.fast_storage;
        put_u16(&mut b, 159, self.storage_compensation);
        put_u16(&mut b, 161, self.nizn_charge_volt);
        put_u16(&mut b, 163, self.nizn_discharge_volt);
        b[165] = self.nizn_cells;
        put_cell_voltages(&mut b, &self.lihv, LIHV_OFFSET, LIHV_OFFSET + 2, LIHV_OFFSET + 4);

        if family == DeviceFamily::X {
            let x = self.x_series.unwrap_or_default();
            put_cell_voltages(&mut b, &x.lto, 172, 174, 176);
            put_cell_voltages(&mut b, &x.user, 178, 180, 182);
            b[184] = x.user_cells;
            put_u16(&mut b, 185, x.power_voltage);
            put_u16(&mut b, 187, x.power_current);
            b[189..191].copy_from_slice(&x.power_options.into_bytes());
        }
        let size = family.program_memory_size();
        b[size - 1] = self.reserved;

        let mut out = heapless::Vec::new();
        let copied = out.extend_from_slice(&b[..size.div_ceil(2) * 2]);
        debug_assert!(copied.is_ok(), "program memory larger than PROGRAM_MEMORY_MAX");
        out
    }

    /// A custom program for `chemistry` holding the firmware defaults.
    pub fn with_defaults(family: DeviceFamily, chemistry: Chemistry) -> Result<Self, DecodeError> {
        let battery_type = chemistry
            .ordinal(family)
            .ok_or(DecodeError::UnsupportedChemistry)?;
        let pb = CellVoltages::defaults(Chemistry::Pb);
        let nizn = CellVoltages::defaults(Chemistry::NiZn);
        let mut op_enable = OperationEnable::new();
        op_enable.set_charge(true);
        op_enable.set_storage(true);
        op_enable.set_discharge(true);
        op_enable.set_cycle(true);
        op_enable.set_balance_only(chemistry.has_balancer());

        let x_series = match family {
            DeviceFamily::Duo => None,
            DeviceFamily::X => Some(XSeriesFields {
                lto: CellVoltages::defaults(Chemistry::Lto),
                ..XSeriesFields::default()
            }),
        };

        Ok(Self {
            use_flag: UseFlag::Custom,
            name: [0; NAME_FIELD],
            capacity: 0,
            auto_save: 0,
            li_bal_end_mode: 0,
            lock_flag: 0,
            lock_password: [0; 6],
            op_enable,
            channel_mode: 0,
            save_to_sd: 0,
            log_interval: Defaults::LOG_INTERVAL.default,
            run_counter: 0,
            battery_type,
            li_cells: 0,
            ni_cells: 0,
            pb_cells: Defaults::PB_CELLS,
            li_mode_charge: 0,
            li_mode_discharge: 0,
            ni_mode_charge: 0,
            ni_mode_discharge: 0,
            pb_mode_charge: 0,
            pb_mode_discharge: 0,
            bal_speed: BalancerSpeed::Normal.into(),
            bal_start_mode: 0,
            bal_start_volt: Defaults::BALANCE_VOLT.default,
            bal_diff: Defaults::BALANCE_DIFF.default as u8,
            bal_over_point: Defaults::BALANCE_OVER_POINT.default as u8,
            bal_set_point: Defaults::BALANCE_SET_POINT.default as u8,
            bal_delay: Defaults::BALANCE_DELAY.default as u8,
            keep_charge_enable: 0,
            lipo: CellVoltages::defaults(Chemistry::LiPo),
            liio: CellVoltages::defaults(Chemistry::LiIo),
            life: CellVoltages::defaults(Chemistry::LiFe),
            charge_current: Defaults::CURRENT_DEFAULT,
            discharge_current: Defaults::CURRENT_DEFAULT,
            end_charge: Defaults::END_CURRENT_CHARGE.default,
            end_discharge: Defaults::END_CURRENT_DISCHARGE.default,
            reg_discharge_mode: 0,
            ni_peak: match chemistry {
                Chemistry::NiCd => Defaults::NICD_PEAK_SENSITIVITY,
                _ => Defaults::NIMH_PEAK_SENSITIVITY,
            },
            ni_peak_delay: Defaults::NI_PEAK_DELAY.default,
            ni_trickle_enable: 0,
            ni_trickle_current: Defaults::NI_TRICKLE_CURRENT.default,
            ni_trickle_time: Defaults::NI_TRICKLE_TIME.default,
            ni_zero_enable: 0,
            ni_discharge_volt: 0,
            pb_charge_volt: pb.charge,
            pb_discharge_volt: pb.discharge,
            pb_float_enable: 0,
            pb_float_volt: pb.storage,
            restore_volt: Defaults::RESTORE_VOLT.default,
            restore_time: Defaults::RESTORE_TIME.default,
            restore_current: Defaults::RESTORE_CURRENT.default,
            cycle_count: Defaults::CYCLE_COUNT.default,
            cycle_delay: Defaults::CYCLE_DELAY.default,
            cycle_mode: 0,
            safety_time_charge: Defaults::SAFETY_TIME.default,
            safety_cap_charge: Defaults::SAFETY_CAP.default,
            safety_temp_charge: Defaults::SAFETY_TEMP.default,
            safety_time_discharge: Defaults::SAFETY_TIME.default,
            safety_cap_discharge: Defaults::SAFETY_CAP.default,
            safety_temp_discharge: Defaults::SAFETY_TEMP.default,
            reg_channel_mode: 0,
            reg_channel_volt: Defaults::REGENERATIVE_VOLT,
            reg_channel_current: Defaults::REGENERATIVE_CURRENT,
            fast_storage: 0,
            storage_compensation: Defaults::STORAGE_COMPENSATION.default,
            nizn_charge_volt: nizn.charge,
            nizn_discharge_volt: nizn.discharge,
            nizn_cells: 0,
            lihv: CellVoltages::defaults(Chemistry::LiHv),
            x_series,
            reserved: 0,
        })
    }

    /// The chemistry this program is for.
    pub fn chemistry(&self, family: DeviceFamily) -> Result<Chemistry, DecodeError> {
        Chemistry::from_ordinal(family, self.battery_type)
    }

    pub fn is_custom(&self) -> bool {
        self.use_flag == UseFlag::Custom
    }

    /// Raw name field, NUL padded.
    pub fn name_bytes(&self) -> &[u8; NAME_FIELD] {
        &self.name
    }

    /// Name up to the first NUL. Invalid UTF-8 is cut off.
    pub fn name(&self) -> &str {
        let end = self.name.iter().position(|b| *b == 0).unwrap_or(NAME_FIELD);
        match core::str::from_utf8(&self.name[..end]) {
            Ok(name) => name,
            Err(e) => core::str::from_utf8(&self.name[..e.valid_up_to()]).unwrap_or_default(),
        }
    }

    pub fn set_name(&mut self, name: &str) -> Result<(), DecodeError> {
        let bytes = name.as_bytes();
        if bytes.len() > Limits::NAME_LEN_MAX {
            return Err(DecodeError::NameTooLong(Limits::NAME_LEN_MAX));
        }
        self.name = [0; NAME_FIELD];
        self.name[..bytes.len()].copy_from_slice(bytes);
        Ok(())
    }

    /// Append `suffix` to the name, dropping trailing spaces of the current name first.
    pub fn append_to_name(&mut self, suffix: &str) -> Result<(), DecodeError> {
        let base = self.name().trim_end().as_bytes();
        let len = base.len() + suffix.len();
        if len > Limits::NAME_LEN_MAX {
            return Err(DecodeError::NameTooLong(Limits::NAME_LEN_MAX));
        }
        let mut name = [0u8; NAME_FIELD];
        name[..base.len()].copy_from_slice(base);
        name[base.len()..len].copy_from_slice(suffix.as_bytes());
        self.name = name;
        Ok(())
    }

    /// The balancer speed, `None` for an out of range value.
    pub fn balancer_speed(&self) -> Option<BalancerSpeed> {
        BalancerSpeed::try_from(self.bal_speed).ok()
    }

    /// Cell voltages of a lithium chemistry, `None` for the others.
    pub fn lithium_voltages(&self, chemistry: Chemistry) -> Option<&CellVoltages> {
        match chemistry {
            Chemistry::LiPo => Some(&self.lipo),
            Chemistry::LiIo => Some(&self.liio),
            Chemistry::LiFe => Some(&self.life),
            Chemistry::LiHv => Some(&self.lihv),
            Chemistry::Lto => self.x_series.as_ref().map(|x| &x.lto),
            _ => None,
        }
    }
}
