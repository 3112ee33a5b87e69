//! Fixed pool of open-file descriptors.

use std::fmt;
use std::ops::{BitOr, BitOrAssign};

use crate::config::MAX_OPEN_FILES;
use crate::error::Status;

/// Access granted to one descriptor.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Mode(u32);

impl Mode {
    pub const NONE: Mode = Mode(0);
    pub const READ: Mode = Mode(1);
    pub const WRITE: Mode = Mode(2);
    pub const CREATE: Mode = Mode(4);

    pub fn bits(self) -> u32 {
        self.0
    }

    pub fn contains(self, other: Mode) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn intersects(self, other: Mode) -> bool {
        self.0 & other.0 != 0
    }
}

impl BitOr for Mode {
    type Output = Mode;

    fn bitor(self, rhs: Mode) -> Mode {
        Mode(self.0 | rhs.0)
    }
}

impl BitOrAssign for Mode {
    fn bitor_assign(&mut self, rhs: Mode) {
        self.0 |= rhs.0;
    }
}

impl fmt::Debug for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if self.contains(Mode::READ) {
            parts.push("READ");
        }
        if self.contains(Mode::WRITE) {
            parts.push("WRITE");
        }
        if self.contains(Mode::CREATE) {
            parts.push("CREATE");
        }
        if parts.is_empty() {
            parts.push("NONE");
        }
        write!(f, "Mode({})", parts.join("|"))
    }
}

/// Opaque handle to a slot of the descriptor pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fd(usize);

impl Fd {
    pub fn from_raw(index: usize) -> Self {
        Fd(index)
    }

    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for Fd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "fd{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDescriptor {
    pub mode: Mode,
    pub file_header_pointer: u32,
    /// Absolute position of the cursor on the medium.
    pub file_data_pointer: u32,
    /// Cursor relative to the start of the data region.
    pub byte_offset: u32,
    pub file_size: u32,
    pub max_file_size: u32,
    pub inode_index: usize,
}

#[derive(Debug, Clone)]
pub struct DescriptorTable {
    slots: [Option<FileDescriptor>; MAX_OPEN_FILES],
    in_use: usize,
    high_water_mark: usize,
}

impl Default for DescriptorTable {
    fn default() -> Self {
        Self::new()
    }
}

impl DescriptorTable {
    pub fn new() -> Self {
        Self {
            slots: std::array::from_fn(|_| None),
            in_use: 0,
            high_water_mark: 0,
        }
    }

    pub fn has_free_slot(&self) -> bool {
        self.in_use < MAX_OPEN_FILES
    }

    /// Places `descriptor` in the lowest free slot.
    pub fn allocate(&mut self, descriptor: FileDescriptor) -> Result<Fd, Status> {
        let index = self
            .slots
            .iter()
            .position(Option::is_none)
            .ok_or(Status::NoFreeFileDescriptor)?;
        self.slots[index] = Some(descriptor);
        self.in_use += 1;
        self.high_water_mark = self.high_water_mark.max(self.in_use);
        Ok(Fd(index))
    }

    pub fn get(&self, fd: Fd) -> Result<&FileDescriptor, Status> {
        self.slots
            .get(fd.0)
            .and_then(Option::as_ref)
            .ok_or(Status::InvalidArgument)
    }

    pub fn get_mut(&mut self, fd: Fd) -> Result<&mut FileDescriptor, Status> {
        self.slots
            .get_mut(fd.0)
            .and_then(Option::as_mut)
            .ok_or(Status::InvalidArgument)
    }

    pub fn free(&mut self, fd: Fd) -> Result<FileDescriptor, Status> {
        let descriptor = self
            .slots
            .get_mut(fd.0)
            .and_then(Option::take)
            .ok_or(Status::InvalidArgument)?;
        self.in_use -= 1;
        Ok(descriptor)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Fd, &FileDescriptor)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|d| (Fd(i), d)))
    }

    pub fn has_open_files(&self) -> bool {
        self.in_use > 0
    }

    pub fn has_open_create(&self) -> bool {
        self.iter().any(|(_, d)| d.mode.contains(Mode::CREATE))
    }

    /// Union of the modes of every descriptor open on `inode_index`.
    pub fn fmode(&self, inode_index: usize) -> Mode {
        self.iter()
            .filter(|(_, d)| d.inode_index == inode_index)
            .fold(Mode::NONE, |mode, (_, d)| mode | d.mode)
    }

    pub fn in_use(&self) -> usize {
        self.in_use
    }

    pub fn high_water_mark(&self) -> usize {
        self.high_water_mark
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(inode_index: usize, mode: Mode) -> FileDescriptor {
        FileDescriptor {
            mode,
            file_header_pointer: 536,
            file_data_pointer: 600,
            byte_offset: 0,
            file_size: 0,
            max_file_size: 512,
            inode_index,
        }
    }

    #[test]
    fn pool_is_bounded() {
        let mut table = DescriptorTable::new();
        let fds: Vec<Fd> = (0..MAX_OPEN_FILES)
            .map(|_| table.allocate(descriptor(0, Mode::READ)).unwrap())
            .collect();
        assert_eq!(fds.first().map(|fd| fd.index()), Some(0));
        assert_eq!(table.in_use(), MAX_OPEN_FILES);
        assert!(!table.has_free_slot());
        assert_eq!(
            table.allocate(descriptor(0, Mode::READ)),
            Err(Status::NoFreeFileDescriptor)
        );

        table.free(fds[5]).unwrap();
        assert_eq!(table.allocate(descriptor(1, Mode::READ)), Ok(fds[5]));
        assert_eq!(table.high_water_mark(), MAX_OPEN_FILES);
    }

    #[test]
    fn high_water_mark_survives_frees() {
        let mut table = DescriptorTable::new();
        let a = table.allocate(descriptor(0, Mode::READ)).unwrap();
        let b = table.allocate(descriptor(0, Mode::READ)).unwrap();
        table.free(a).unwrap();
        table.free(b).unwrap();
        assert_eq!(table.in_use(), 0);
        assert_eq!(table.high_water_mark(), 2);
        assert!(!table.has_open_files());
    }

    #[test]
    fn unknown_descriptors_are_invalid() {
        let mut table = DescriptorTable::new();
        assert_eq!(table.get(Fd::from_raw(3)), Err(Status::InvalidArgument));
        assert_eq!(table.free(Fd::from_raw(42)), Err(Status::InvalidArgument));
        assert_eq!(table.in_use(), 0);
    }

    #[test]
    fn mode_queries() {
        let mut table = DescriptorTable::new();
        table.allocate(descriptor(0, Mode::READ)).unwrap();
        table.allocate(descriptor(0, Mode::WRITE)).unwrap();
        table.allocate(descriptor(1, Mode::WRITE | Mode::CREATE)).unwrap();

        assert_eq!(table.fmode(0), Mode::READ | Mode::WRITE);
        assert!(table.fmode(1).contains(Mode::CREATE));
        assert_eq!(table.fmode(2), Mode::NONE);
        assert!(table.has_open_create());
        assert_eq!(format!("{:?}", Mode::READ | Mode::WRITE), "Mode(READ|WRITE)");
    }
}
