/*How the checker reads a volume. Offsets are relative to the volume base.
There are two backends: one over a real medium, and a mock for tests. */

use std::sync::Arc;

use crate::codec::{AllocationEntry, FileHeader, VolumeHeader};
use crate::error::Result;
use crate::medium::{self, Medium};
use crate::text::{TextCodec, Utf8};

pub trait FsckBackend {
    /// Bytes available from the base address to the end of the medium.
    fn capacity(&self) -> u32;
    fn load_header(&self) -> Result<VolumeHeader>;
    fn load_allocation_entry(&self, index: usize) -> Result<AllocationEntry>;
    fn load_file_header(&self, offset: u32) -> Result<FileHeader>;
}

pub struct MediumBackend<'a, M: Medium + ?Sized> {
    medium: &'a M,
    base: u32,
    codec: Arc<dyn TextCodec>,
}

impl<'a, M: Medium + ?Sized> MediumBackend<'a, M> {
    pub fn new(medium: &'a M, base: u32) -> Self {
        Self {
            medium,
            base,
            codec: Arc::new(Utf8::strict()),
        }
    }

    pub fn with_codec(mut self, codec: Arc<dyn TextCodec>) -> Self {
        self.codec = codec;
        self
    }
}

impl<M: Medium + ?Sized> FsckBackend for MediumBackend<'_, M> {
    fn capacity(&self) -> u32 {
        self.medium.capacity().saturating_sub(self.base)
    }

    fn load_header(&self) -> Result<VolumeHeader> {
        medium::read_volume_header(self.medium, self.base)
    }

    fn load_allocation_entry(&self, index: usize) -> Result<AllocationEntry> {
        medium::read_allocation_entry(self.medium, self.base, index)
    }

    fn load_file_header(&self, offset: u32) -> Result<FileHeader> {
        let pointer = self.base.saturating_add(offset);
        medium::read_file_header(self.medium, self.codec.as_ref(), pointer)
    }
}
