/*In-memory backend: a header, an allocation table and file headers keyed by
offset. Tests build broken volumes with it without encoding any bytes. */

use std::collections::HashMap;

use super::fsck_backend::FsckBackend;
use crate::codec::{AllocationEntry, FileHeader, VolumeHeader, FILE_HEADER_SIZE};
use crate::error::{CodecError, Result};

#[derive(Debug, Clone, Default)]
pub struct MockBackend {
    pub capacity: u32,
    pub header: VolumeHeader,
    pub entries: Vec<AllocationEntry>,
    pub files: HashMap<u32, FileHeader>,
}

impl FsckBackend for MockBackend {
    fn capacity(&self) -> u32 {
        self.capacity
    }

    fn load_header(&self) -> Result<VolumeHeader> {
        Ok(self.header)
    }

    fn load_allocation_entry(&self, index: usize) -> Result<AllocationEntry> {
        Ok(self.entries.get(index).copied().unwrap_or_default())
    }

    fn load_file_header(&self, offset: u32) -> Result<FileHeader> {
        self.files.get(&offset).cloned().ok_or_else(|| {
            CodecError::ShortRead {
                record: "file header",
                needed: FILE_HEADER_SIZE,
                actual: 0,
            }
            .into()
        })
    }
}
