//! The raw storage medium and the record I/O built on top of it.

use std::fs::{File, OpenOptions};
use std::io;
use std::os::unix::fs::FileExt;
use std::path::Path;

use crate::codec::{
    AllocationEntry, FileHeader, VolumeHeader, ALLOCATION_ENTRY_SIZE, FILE_HEADER_SIZE,
    VOLUME_HEADER_SIZE,
};
use crate::error::{CodecError, EefsError, Result};
use crate::text::TextCodec;

/// Byte-addressable random-access storage (EEPROM, flash window, RAM, image file).
///
/// Writes are unbuffered: a read issued after a write sees the written bytes.
pub trait Medium {
    /// Number of addressable bytes.
    fn capacity(&self) -> u32;

    /// Reads up to `buf.len()` bytes at `offset`. Returns fewer only when the
    /// end of the medium is reached.
    fn read_at(&self, offset: u32, buf: &mut [u8]) -> io::Result<usize>;

    /// Writes all of `data` at `offset`.
    fn write_at(&mut self, offset: u32, data: &[u8]) -> io::Result<()>;
}

impl<M: Medium + ?Sized> Medium for &mut M {
    fn capacity(&self) -> u32 {
        (**self).capacity()
    }

    fn read_at(&self, offset: u32, buf: &mut [u8]) -> io::Result<usize> {
        (**self).read_at(offset, buf)
    }

    fn write_at(&mut self, offset: u32, data: &[u8]) -> io::Result<()> {
        (**self).write_at(offset, data)
    }
}

fn out_of_range(offset: u32, len: usize, capacity: u32) -> io::Error {
    io::Error::new(
        io::ErrorKind::InvalidInput,
        format!("write of {len} bytes at {offset:#x} exceeds medium of {capacity} bytes"),
    )
}

// -----------------------------------------------------------------------------
// In-memory medium
// -----------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryMedium {
    bytes: Vec<u8>,
}

impl MemoryMedium {
    /// A zero-filled medium of `size` bytes.
    pub fn new(size: u32) -> Self {
        Self {
            bytes: vec![0u8; size as usize],
        }
    }

    pub fn from_vec(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.bytes
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.bytes
    }
}

impl Medium for MemoryMedium {
    fn capacity(&self) -> u32 {
        u32::try_from(self.bytes.len()).unwrap_or(u32::MAX)
    }

    fn read_at(&self, offset: u32, buf: &mut [u8]) -> io::Result<usize> {
        let start = offset as usize;
        if start >= self.bytes.len() {
            return Ok(0);
        }
        let n = buf.len().min(self.bytes.len() - start);
        buf[..n].copy_from_slice(&self.bytes[start..start + n]);
        Ok(n)
    }

    fn write_at(&mut self, offset: u32, data: &[u8]) -> io::Result<()> {
        let start = offset as usize;
        let end = start
            .checked_add(data.len())
            .filter(|&end| end <= self.bytes.len())
            .ok_or_else(|| out_of_range(offset, data.len(), self.capacity()))?;
        self.bytes[start..end].copy_from_slice(data);
        Ok(())
    }
}

// -----------------------------------------------------------------------------
// Image file medium
// -----------------------------------------------------------------------------

/// An image file accessed with positional I/O; there is no shared cursor.
#[derive(Debug)]
pub struct FileMedium {
    file: File,
    len: u32,
    writable: bool,
}

impl FileMedium {
    /// Opens an existing image, read-write when permitted, otherwise read-only.
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref();
        let (file, writable) = match OpenOptions::new().read(true).write(true).open(path) {
            Ok(file) => (file, true),
            Err(e) if e.kind() == io::ErrorKind::PermissionDenied => {
                (OpenOptions::new().read(true).open(path)?, false)
            }
            Err(e) => return Err(e),
        };
        Self::from_file(file, writable)
    }

    pub fn open_read_only(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = OpenOptions::new().read(true).open(path.as_ref())?;
        Self::from_file(file, false)
    }

    /// Creates (or replaces) a zero-filled image of `size` bytes.
    pub fn create(path: impl AsRef<Path>, size: u32) -> io::Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path.as_ref())?;
        file.set_len(u64::from(size))?;
        Self::from_file(file, true)
    }

    fn from_file(file: File, writable: bool) -> io::Result<Self> {
        let len = file.metadata()?.len();
        let len = u32::try_from(len).map_err(|_| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("image of {len} bytes is larger than a 32-bit volume"),
            )
        })?;
        Ok(Self {
            file,
            len,
            writable,
        })
    }

    pub fn is_writable(&self) -> bool {
        self.writable
    }

    pub fn sync(&self) -> io::Result<()> {
        self.file.sync_data()
    }
}

impl Medium for FileMedium {
    fn capacity(&self) -> u32 {
        self.len
    }

    fn read_at(&self, offset: u32, buf: &mut [u8]) -> io::Result<usize> {
        let mut done = 0;
        while done < buf.len() {
            match self
                .file
                .read_at(&mut buf[done..], u64::from(offset) + done as u64)
            {
                Ok(0) => break,
                Ok(n) => done += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(done)
    }

    fn write_at(&mut self, offset: u32, data: &[u8]) -> io::Result<()> {
        if !self.writable {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                "image opened read-only",
            ));
        }
        let end = u64::from(offset) + data.len() as u64;
        if end > u64::from(self.len) {
            return Err(out_of_range(offset, data.len(), self.len));
        }
        self.file.write_all_at(data, u64::from(offset))
    }
}

// -----------------------------------------------------------------------------
// Record I/O
// -----------------------------------------------------------------------------

/// Fills `buf` from `offset`; a short medium is a corruption, not a status.
pub fn read_exact<M: Medium + ?Sized>(
    medium: &M,
    offset: u32,
    buf: &mut [u8],
    record: &'static str,
) -> Result<()> {
    let n = medium.read_at(offset, buf)?;
    if n < buf.len() {
        return Err(EefsError::Codec(CodecError::ShortRead {
            record,
            needed: buf.len(),
            actual: n,
        }));
    }
    Ok(())
}

pub fn read_volume_header<M: Medium + ?Sized>(medium: &M, base: u32) -> Result<VolumeHeader> {
    let mut buf = [0u8; VOLUME_HEADER_SIZE];
    let n = medium.read_at(base, &mut buf)?;
    Ok(VolumeHeader::decode(&buf[..n])?)
}

pub fn write_volume_header<M: Medium + ?Sized>(
    medium: &mut M,
    base: u32,
    header: &VolumeHeader,
) -> Result<()> {
    medium.write_at(base, &header.encode())?;
    Ok(())
}

pub fn read_allocation_entry<M: Medium + ?Sized>(
    medium: &M,
    base: u32,
    index: usize,
) -> Result<AllocationEntry> {
    let mut buf = [0u8; ALLOCATION_ENTRY_SIZE];
    let n = medium.read_at(entry_address(base, index)?, &mut buf)?;
    Ok(AllocationEntry::decode(&buf[..n])?)
}

pub fn write_allocation_entry<M: Medium + ?Sized>(
    medium: &mut M,
    base: u32,
    index: usize,
    entry: &AllocationEntry,
) -> Result<()> {
    medium.write_at(entry_address(base, index)?, &entry.encode())?;
    Ok(())
}

pub fn read_file_header<M: Medium + ?Sized>(
    medium: &M,
    codec: &dyn TextCodec,
    pointer: u32,
) -> Result<FileHeader> {
    let mut buf = [0u8; FILE_HEADER_SIZE];
    let n = medium.read_at(pointer, &mut buf)?;
    Ok(FileHeader::decode(&buf[..n], codec)?)
}

pub fn write_file_header<M: Medium + ?Sized>(
    medium: &mut M,
    codec: &dyn TextCodec,
    pointer: u32,
    header: &FileHeader,
) -> Result<()> {
    medium.write_at(pointer, &header.encode(codec))?;
    Ok(())
}

fn entry_address(base: u32, index: usize) -> Result<u32> {
    u32::try_from(AllocationEntry::offset_of(index))
        .ok()
        .and_then(|offset| base.checked_add(offset))
        .ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "allocation entry address overflows")
                .into()
        })
}
