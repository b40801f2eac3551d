//! Device identity, the first 12 input registers.

use crate::{device::DeviceFamily, error::DecodeError};

/// Encoded size of [`DeviceInfo`].
pub const INFO_SIZE: usize = 24;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceInfo {
    pub device_id: u16,
    serial: [u8; 12],
    pub software_version: u16,
    pub hardware_version: u16,
    /// Bytes of system settings, 0 on firmware which does not report it.
    pub system_memory_length: u16,
    /// Bytes of one program memory, 0 on firmware which does not report it.
    pub program_memory_length: u16,
    pub channel_status: u16,
}

impl DeviceInfo {
    pub fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        if bytes.len() < INFO_SIZE {
            return Err(DecodeError::TooShort {
                needed: INFO_SIZE,
                actual: bytes.len(),
            });
        }
        let word = |at: usize| u16::from_le_bytes([bytes[at], bytes[at + 1]]);
        let mut serial = [0u8; 12];
        serial.copy_from_slice(&bytes[2..14]);

        Ok(Self {
            device_id: word(0),
            serial,
            software_version: word(14),
            hardware_version: word(16),
            system_memory_length: word(18),
            program_memory_length: word(20),
            channel_status: word(22),
        })
    }

    /// Serial number, trailing NULs and spaces removed.
    pub fn serial(&self) -> &str {
        let end = self
            .serial
            .iter()
            .position(|b| *b == 0)
            .unwrap_or(self.serial.len());
        core::str::from_utf8(&self.serial[..end])
            .unwrap_or_default()
            .trim_end()
    }

    /// Bytes to read for one program memory: the reported length, else the family's.
    pub fn program_memory_size(&self, family: DeviceFamily) -> usize {
        match self.program_memory_length {
            0 => family.program_memory_size(),
            len => len as usize,
        }
    }

    /// Bytes to read for the system settings: the reported length, else the family's.
    pub fn system_size(&self, family: DeviceFamily) -> usize {
        match self.system_memory_length {
            0 => family.system_size(),
            len => len as usize,
        }
    }
}
