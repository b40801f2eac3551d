//! The program memory directory.
//!
//! The charger keeps the list of program memories it shows as a count followed by 32 ordinal
//! bytes. The order of the list is the display order, the ordinal is the physical memory the
//! entry points at.

use crate::{error::DecodeError, registers::Limits};

/// Encoded size: the count and one byte per entry.
pub const DIRECTORY_SIZE: usize = 2 + Limits::DIRECTORY_ENTRIES_MAX;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryDirectory {
    entries: heapless::Vec<u8, { Limits::DIRECTORY_ENTRIES_MAX }>,
}

impl MemoryDirectory {
    pub fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        if bytes.len() < 2 {
            return Err(DecodeError::TooShort {
                needed: 2,
                actual: bytes.len(),
            });
        }
        let count = u16::from_le_bytes([bytes[0], bytes[1]]);
        if count as usize > Limits::DIRECTORY_ENTRIES_MAX {
            return Err(DecodeError::DirectoryCount(count));
        }
        let listed = bytes
            .get(2..2 + count as usize)
            .ok_or(DecodeError::TooShort {
                needed: 2 + count as usize,
                actual: bytes.len(),
            })?;

        let mut entries = heapless::Vec::new();
        entries
            .extend_from_slice(listed)
            .map_err(|_| DecodeError::DirectoryCount(count))?;
        Ok(Self { entries })
    }

    /// Unused entries are written as zero.
    pub fn encode(&self) -> [u8; DIRECTORY_SIZE] {
        let mut bytes = [0u8; DIRECTORY_SIZE];
        bytes[..2].copy_from_slice(&(self.entries.len() as u16).to_le_bytes());
        bytes[2..2 + self.entries.len()].copy_from_slice(&self.entries);
        bytes
    }

    /// Memory ordinals in display order.
    pub fn entries(&self) -> &[u8] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.entries.is_full()
    }

    pub fn contains(&self, ordinal: u8) -> bool {
        self.entries.contains(&ordinal)
    }

    /// Lowest memory ordinal from `first` on that no entry points at.
    ///
    /// Pass [`DeviceFamily::first_custom_slot`](crate::device::DeviceFamily::first_custom_slot) to skip the built-in memories.
    pub fn free_ordinal(&self, first: u8) -> Option<u8> {
        (first..Limits::DIRECTORY_ENTRIES_MAX as u8).find(|ordinal| !self.contains(*ordinal))
    }

    /// Add a free memory, at or above `first`, behind the last entry for `chemistry_ordinal`.
    ///
    /// The built-in program of each chemistry sits at the memory with the chemistry's ordinal,
    /// so new programs are listed next to it. Without such an entry the new one is appended.
    /// Returns the memory ordinal taken, `None` when the directory or the free range is full.
    pub fn insert_after(&mut self, chemistry_ordinal: u8, first: u8) -> Option<u8> {
        if self.is_full() {
            return None;
        }
        let ordinal = self.free_ordinal(first)?;
        let at = self
            .entries
            .iter()
            .rposition(|entry| *entry == chemistry_ordinal)
            .map_or(self.entries.len(), |last| last + 1);
        self.entries.insert(at, ordinal).ok()?;
        Some(ordinal)
    }

    /// Drop the entry for memory `ordinal`, keeping the order of the others.
    ///
    /// Returns `false` when no entry points at `ordinal`.
    pub fn remove(&mut self, ordinal: u8) -> bool {
        let before = self.entries.len();
        self.entries.retain(|entry| *entry != ordinal);
        self.entries.len() != before
    }
}
