//! In-memory mirror of the allocation table, with absolute addresses.

use crate::codec::{AllocationEntry, VolumeHeader, FILE_HEADER_SIZE};
use crate::config::{MAGIC, VERSION};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InodeTableEntry {
    pub file_header_pointer: u32,
    pub max_file_size: u32,
}

impl InodeTableEntry {
    pub fn file_data_pointer(&self) -> u32 {
        self.file_header_pointer + FILE_HEADER_SIZE as u32
    }
}

/// Free cursor plus one entry per allocated file, in inode order.
///
/// Allocation only ever appends: `free_memory_pointer` grows,
/// `free_memory_size` shrinks and `files` never loses an entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VolumeState {
    pub base_address: u32,
    pub free_memory_pointer: u32,
    pub free_memory_size: u32,
    pub files: Vec<InodeTableEntry>,
}

impl VolumeState {
    pub fn from_disk(base_address: u32, header: &VolumeHeader, entries: &[AllocationEntry]) -> Self {
        let files = entries
            .iter()
            .map(|entry| InodeTableEntry {
                file_header_pointer: base_address.wrapping_add(entry.file_header_offset),
                max_file_size: entry.max_file_size,
            })
            .collect();

        Self {
            base_address,
            free_memory_pointer: base_address.wrapping_add(header.free_memory_offset),
            free_memory_size: header.free_memory_size,
            files,
        }
    }

    pub fn number_of_files(&self) -> usize {
        self.files.len()
    }

    pub fn inode(&self, index: usize) -> Option<&InodeTableEntry> {
        self.files.get(index)
    }

    /// Free bytes left for file data once a header has been placed.
    pub fn free_data_size(&self) -> u32 {
        self.free_memory_size.saturating_sub(FILE_HEADER_SIZE as u32)
    }

    /// Appends an inode at the free cursor with all remaining space as its
    /// provisional capacity. The cursor itself moves on [`Self::commit`].
    pub fn append_provisional(&mut self) -> usize {
        let entry = InodeTableEntry {
            file_header_pointer: self.free_memory_pointer,
            max_file_size: self.free_data_size(),
        };
        self.files.push(entry);
        self.files.len() - 1
    }

    /// Reserves header plus `max_file_size` bytes for inode `index` and
    /// moves the free cursor past them.
    ///
    /// Returns `None`, leaving the state untouched, when `index` is unknown
    /// or the reservation does not fit.
    pub fn commit(&mut self, index: usize, max_file_size: u32) -> Option<()> {
        let reserved = (FILE_HEADER_SIZE as u32).checked_add(max_file_size)?;
        let pointer = self.free_memory_pointer.checked_add(reserved)?;
        let size = self.free_memory_size.checked_sub(reserved)?;
        let entry = self.files.get_mut(index)?;
        entry.max_file_size = max_file_size;
        self.free_memory_pointer = pointer;
        self.free_memory_size = size;
        Some(())
    }

    pub fn allocation_entry(&self, index: usize) -> Option<AllocationEntry> {
        let entry = self.files.get(index)?;
        Some(AllocationEntry {
            file_header_offset: entry.file_header_pointer.checked_sub(self.base_address)?,
            max_file_size: entry.max_file_size,
        })
    }

    /// Volume header describing the current state, CRC left at zero.
    /// `None` if the free cursor sits below the base address.
    pub fn header(&self) -> Option<VolumeHeader> {
        Some(VolumeHeader {
            crc: 0,
            magic: MAGIC,
            version: VERSION,
            free_memory_offset: self.free_memory_pointer.checked_sub(self.base_address)?,
            free_memory_size: self.free_memory_size,
            number_of_files: self.files.len() as u32,
        })
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}
