//! Common utilities for tests
#![allow(dead_code)]

use std::cell::Cell;
use std::io;

use eefs::codec::{ALLOCATION_TABLE_SIZE, VOLUME_HEADER_SIZE};
use eefs::{
    format, Attributes, Eefs, EefsError, Medium, MemoryMedium, MountOptions, OpenFlags, Status,
};

pub const ORANGE: &str = "\x1b[38;5;214m";
pub const RESET: &str = "\x1b[0m";

/// Provides a macro for logging messages during tests.
/// e.g. log!("{}", x) -> println!("[test] ...");
#[macro_export]
macro_rules! log {
    ($msg:expr, $($arg:tt)*) => {
        println!("{}[test] {}{}", crate::common::ORANGE, format!($msg, $($arg)*), crate::common::RESET)
    };
}

pub const NOW: u32 = 1_700_000_000;

pub fn fixed_clock() -> u32 {
    NOW
}

pub fn options() -> MountOptions {
    MountOptions::default().with_clock(fixed_clock)
}

/// A zeroed medium of `size` bytes with a volume formatted at address 0.
pub fn formatted(size: u32) -> MemoryMedium {
    let mut medium = MemoryMedium::new(size);
    format(&mut medium, 0, size).unwrap();
    medium
}

/// A memory medium that can be told to fail writes into the allocation
/// table of a volume at address 0.
pub struct FlakyMedium {
    inner: MemoryMedium,
    pub fail_table_writes: Cell<bool>,
}

impl FlakyMedium {
    pub fn new(inner: MemoryMedium) -> Self {
        Self {
            inner,
            fail_table_writes: Cell::new(false),
        }
    }
}

impl Medium for FlakyMedium {
    fn capacity(&self) -> u32 {
        self.inner.capacity()
    }

    fn read_at(&self, offset: u32, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read_at(offset, buf)
    }

    fn write_at(&mut self, offset: u32, data: &[u8]) -> io::Result<()> {
        let table = VOLUME_HEADER_SIZE as u32..ALLOCATION_TABLE_SIZE as u32;
        if self.fail_table_writes.get() && table.contains(&offset) {
            return Err(io::Error::new(io::ErrorKind::Other, "flash write failed"));
        }
        self.inner.write_at(offset, data)
    }
}

pub fn mount_with(medium: MemoryMedium, options: MountOptions) -> Eefs<MemoryMedium> {
    Eefs::mount(medium, 0, options).map_err(|(_, e)| e).unwrap()
}

pub fn mounted(size: u32) -> Eefs<MemoryMedium> {
    mount_with(formatted(size), options())
}

/// Creates `name` holding `data` and returns its inode index.
pub fn add_file<M: Medium>(fs: &mut Eefs<M>, name: &str, data: &[u8]) -> usize {
    let fd = fs.create(name, Attributes::NONE).unwrap();
    if !data.is_empty() {
        assert_eq!(fs.write(fd, data).unwrap(), data.len());
    }
    fs.close(fd).unwrap();
    fs.stat(name).unwrap().inode_index
}

pub fn read_all<M: Medium>(fs: &mut Eefs<M>, name: &str) -> Vec<u8> {
    let fd = fs.open(name, OpenFlags::RDONLY, Attributes::NONE).unwrap();
    let mut out = Vec::new();
    let mut buf = [0u8; 100];
    loop {
        let n = fs.read(fd, &mut buf).unwrap();
        if n == 0 {
            break;
        }
        out.extend_from_slice(&buf[..n]);
    }
    fs.close(fd).unwrap();
    out
}

/// The status of a failed call. Panics on success or on a non-status error.
pub fn status<T: std::fmt::Debug>(result: Result<T, EefsError>) -> Status {
    result.unwrap_err().status().unwrap()
}
