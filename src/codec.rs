//! Big-endian encoding of the three on-disk records.
//!
//! ```text
//! base + 0     VolumeHeader            24 bytes
//! base + 24    AllocationEntry x 64     8 bytes each
//! base + 536   FileHeader | data | FileHeader | data | ... | free space
//! ```
//!
//! Nothing in here touches the medium; see [`crate::medium`] for that.

use crate::config::{MAX_FILENAME_SIZE, MAX_FILES};
use crate::error::CodecError;
use crate::text::TextCodec;

// -----------------------------------------------------------------------------
// Record sizes
// -----------------------------------------------------------------------------

pub const VOLUME_HEADER_SIZE: usize = 6 * 4;
pub const ALLOCATION_ENTRY_SIZE: usize = 2 * 4;
/// Header plus the full fixed-size allocation table.
pub const ALLOCATION_TABLE_SIZE: usize = VOLUME_HEADER_SIZE + ALLOCATION_ENTRY_SIZE * MAX_FILES;
pub const FILE_HEADER_SIZE: usize = 6 * 4 + MAX_FILENAME_SIZE;

const FILENAME_OFFSET: usize = 24;

const IN_USE_TRUE: u32 = 1;
const IN_USE_FALSE: u32 = 0;

// -----------------------------------------------------------------------------
// Records
// -----------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VolumeHeader {
    pub crc: u32,
    pub magic: u32,
    pub version: u32,
    /// Relative to the volume base address.
    pub free_memory_offset: u32,
    pub free_memory_size: u32,
    pub number_of_files: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AllocationEntry {
    /// Relative to the volume base address.
    pub file_header_offset: u32,
    pub max_file_size: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileHeader {
    pub crc: u32,
    pub in_use: bool,
    pub attributes: u32,
    pub file_size: u32,
    pub modification_date: u32,
    pub creation_date: u32,
    pub filename: String,
}

fn ensure_len(data: &[u8], needed: usize, record: &'static str) -> Result<(), CodecError> {
    if data.len() < needed {
        return Err(CodecError::ShortRead {
            record,
            needed,
            actual: data.len(),
        });
    }
    Ok(())
}

#[inline]
fn be_u32(data: &[u8], offset: usize) -> u32 {
    u32::from_be_bytes([
        data[offset],
        data[offset + 1],
        data[offset + 2],
        data[offset + 3],
    ])
}

#[inline]
fn put_be_u32(out: &mut [u8], offset: usize, value: u32) {
    out[offset..offset + 4].copy_from_slice(&value.to_be_bytes());
}

impl VolumeHeader {
    pub fn decode(data: &[u8]) -> Result<Self, CodecError> {
        ensure_len(data, VOLUME_HEADER_SIZE, "volume header")?;
        Ok(Self {
            crc: be_u32(data, 0),
            magic: be_u32(data, 4),
            version: be_u32(data, 8),
            free_memory_offset: be_u32(data, 12),
            free_memory_size: be_u32(data, 16),
            number_of_files: be_u32(data, 20),
        })
    }

    pub fn encode(&self) -> [u8; VOLUME_HEADER_SIZE] {
        let mut out = [0u8; VOLUME_HEADER_SIZE];
        put_be_u32(&mut out, 0, self.crc);
        put_be_u32(&mut out, 4, self.magic);
        put_be_u32(&mut out, 8, self.version);
        put_be_u32(&mut out, 12, self.free_memory_offset);
        put_be_u32(&mut out, 16, self.free_memory_size);
        put_be_u32(&mut out, 20, self.number_of_files);
        out
    }
}

impl AllocationEntry {
    pub fn decode(data: &[u8]) -> Result<Self, CodecError> {
        ensure_len(data, ALLOCATION_ENTRY_SIZE, "allocation entry")?;
        Ok(Self {
            file_header_offset: be_u32(data, 0),
            max_file_size: be_u32(data, 4),
        })
    }

    pub fn encode(&self) -> [u8; ALLOCATION_ENTRY_SIZE] {
        let mut out = [0u8; ALLOCATION_ENTRY_SIZE];
        put_be_u32(&mut out, 0, self.file_header_offset);
        put_be_u32(&mut out, 4, self.max_file_size);
        out
    }

    /// Position of entry `index` relative to the volume base.
    pub fn offset_of(index: usize) -> usize {
        VOLUME_HEADER_SIZE + index * ALLOCATION_ENTRY_SIZE
    }
}

impl FileHeader {
    pub fn decode(data: &[u8], codec: &dyn TextCodec) -> Result<Self, CodecError> {
        ensure_len(data, FILE_HEADER_SIZE, "file header")?;

        let field = &data[FILENAME_OFFSET..FILENAME_OFFSET + MAX_FILENAME_SIZE];
        let name_len = field.iter().position(|&b| b == 0).unwrap_or(field.len());
        let filename = codec.decode(&field[..name_len])?;

        Ok(Self {
            crc: be_u32(data, 0),
            in_use: be_u32(data, 4) == IN_USE_TRUE,
            attributes: be_u32(data, 8),
            file_size: be_u32(data, 12),
            modification_date: be_u32(data, 16),
            creation_date: be_u32(data, 20),
            filename,
        })
    }

    /// Encodes into a zeroed buffer; names longer than the field are cut at
    /// 40 bytes.
    pub fn encode(&self, codec: &dyn TextCodec) -> [u8; FILE_HEADER_SIZE] {
        let mut out = [0u8; FILE_HEADER_SIZE];
        put_be_u32(&mut out, 0, self.crc);
        put_be_u32(
            &mut out,
            4,
            if self.in_use { IN_USE_TRUE } else { IN_USE_FALSE },
        );
        put_be_u32(&mut out, 8, self.attributes);
        put_be_u32(&mut out, 12, self.file_size);
        put_be_u32(&mut out, 16, self.modification_date);
        put_be_u32(&mut out, 20, self.creation_date);

        let name = codec.encode(&self.filename);
        let len = name.len().min(MAX_FILENAME_SIZE);
        out[FILENAME_OFFSET..FILENAME_OFFSET + len].copy_from_slice(&name[..len]);
        out
    }
}
