use std::cmp::Ordering;
use std::fmt;
use std::ops::BitOr;

use tracing::{debug, info, trace, warn};

use crate::codec::{
    AllocationEntry, FileHeader, VolumeHeader, ALLOCATION_TABLE_SIZE, FILE_HEADER_SIZE,
    VOLUME_HEADER_SIZE,
};
use crate::config::{MountOptions, MAGIC, MAX_FILENAME_SIZE, MAX_FILES, MAX_OPEN_FILES, VERSION};
use crate::descriptor::{DescriptorTable, Fd, FileDescriptor, Mode};
use crate::error::{EefsError, Result, Status};
use crate::medium::{self, Medium};
use crate::volume::{InodeTableEntry, VolumeState};

// -----------------------------------------------------------------------------
// Open flags, attributes, seek origin
// -----------------------------------------------------------------------------

#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct OpenFlags(u32);

impl OpenFlags {
    pub const CREAT: OpenFlags = OpenFlags(0x0002);
    pub const TRUNC: OpenFlags = OpenFlags(0x0040);
    /// Mask of the access-mode sub-field.
    pub const ACCMODE: OpenFlags = OpenFlags(0xF000);
    pub const RDONLY: OpenFlags = OpenFlags(0x2000);
    pub const WRONLY: OpenFlags = OpenFlags(0x8000);
    pub const RDWR: OpenFlags = OpenFlags(0xA000);

    const KNOWN: u32 = Self::CREAT.0 | Self::TRUNC.0 | Self::RDONLY.0 | Self::WRONLY.0 | Self::RDWR.0;

    pub fn from_bits(bits: u32) -> Self {
        OpenFlags(bits)
    }

    pub fn bits(self) -> u32 {
        self.0
    }

    pub fn contains(self, other: OpenFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn has_unknown_bits(self) -> bool {
        self.0 & !Self::KNOWN != 0
    }

    pub fn access(self) -> u32 {
        self.0 & Self::ACCMODE.0
    }

    pub fn wants_write(self) -> bool {
        self.access() & Self::WRONLY.0 != 0
    }

    /// Descriptor mode for opening an existing file. An empty access field
    /// reads as read-only.
    pub fn mode(self) -> Mode {
        let access = self.access();
        let mut mode = Mode::NONE;
        if access & Self::RDONLY.0 != 0 || access == 0 {
            mode |= Mode::READ;
        }
        if access & Self::WRONLY.0 != 0 {
            mode |= Mode::WRITE;
        }
        mode
    }
}

impl BitOr for OpenFlags {
    type Output = OpenFlags;

    fn bitor(self, rhs: OpenFlags) -> OpenFlags {
        OpenFlags(self.0 | rhs.0)
    }
}

impl fmt::Debug for OpenFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "OpenFlags({:#06x})", self.0)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Attributes(u32);

impl Attributes {
    pub const NONE: Attributes = Attributes(0);
    pub const READONLY: Attributes = Attributes(1);

    pub fn from_raw(raw: u32) -> Self {
        Attributes(raw)
    }

    pub fn raw(self) -> u32 {
        self.0
    }

    pub fn is_valid(self) -> bool {
        self == Self::NONE || self == Self::READONLY
    }

    pub fn is_readonly(self) -> bool {
        self.0 & Self::READONLY.0 != 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Whence {
    Set,
    Cur,
    End,
}

impl TryFrom<i32> for Whence {
    type Error = Status;

    fn try_from(raw: i32) -> std::result::Result<Self, Status> {
        match raw {
            0 => Ok(Whence::Set),
            1 => Ok(Whence::Cur),
            2 => Ok(Whence::End),
            _ => Err(Status::InvalidArgument),
        }
    }
}

/// Snapshot of one file header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stat {
    pub inode_index: usize,
    pub crc: u32,
    pub attributes: Attributes,
    pub file_size: u32,
    pub modification_date: u32,
    pub creation_date: u32,
    pub filename: String,
}

impl Stat {
    fn new(inode_index: usize, header: FileHeader) -> Self {
        Self {
            inode_index,
            crc: header.crc,
            attributes: Attributes::from_raw(header.attributes),
            file_size: header.file_size,
            modification_date: header.modification_date,
            creation_date: header.creation_date,
            filename: header.filename,
        }
    }
}

// -----------------------------------------------------------------------------
// Format
// -----------------------------------------------------------------------------

/// Writes an empty volume of `size` bytes at `base`: a fresh header and a
/// zeroed allocation table.
pub fn format<M: Medium + ?Sized>(medium: &mut M, base: u32, size: u32) -> Result<VolumeHeader> {
    let table_size = ALLOCATION_TABLE_SIZE as u32;
    if size < table_size {
        warn!(size, needed = table_size, "volume too small for the allocation table");
        return Err(Status::InvalidArgument.into());
    }
    if u64::from(base) + u64::from(size) > u64::from(medium.capacity()) {
        warn!(base, size, capacity = medium.capacity(), "volume exceeds medium");
        return Err(Status::InvalidArgument.into());
    }

    let header = VolumeHeader {
        crc: 0,
        magic: MAGIC,
        version: VERSION,
        free_memory_offset: table_size,
        free_memory_size: size - table_size,
        number_of_files: 0,
    };

    medium::write_volume_header(medium, base, &header)?;
    medium.write_at(
        base + VOLUME_HEADER_SIZE as u32,
        &[0u8; ALLOCATION_TABLE_SIZE - VOLUME_HEADER_SIZE],
    )?;

    info!(base, size, free = header.free_memory_size, "volume formatted");
    Ok(header)
}

// -----------------------------------------------------------------------------
// Mounted volume
// -----------------------------------------------------------------------------

/// One mounted volume: the medium, its inode table and its descriptor pool.
///
/// Access is single-threaded; wrap the whole value in a lock to share it.
pub struct Eefs<M: Medium> {
    medium: M,
    volume: VolumeState,
    descriptors: DescriptorTable,
    options: MountOptions,
    mounted: bool,
}

impl<M: Medium> fmt::Debug for Eefs<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Eefs")
            .field("volume", &self.volume)
            .field("descriptors_in_use", &self.descriptors.in_use())
            .field("mounted", &self.mounted)
            .finish_non_exhaustive()
    }
}

impl<M: Medium> Eefs<M> {
    /// Reads the volume header and allocation table at `base_address`.
    ///
    /// Bad magic, bad version, an impossible file count, or a free region or
    /// allocation entry outside the medium is `NoSuchDevice`; the medium is
    /// handed back along with the error.
    pub fn mount(
        medium: M,
        base_address: u32,
        options: MountOptions,
    ) -> std::result::Result<Self, (M, EefsError)> {
        match Self::load(&medium, base_address) {
            Ok(volume) => {
                info!(
                    base = base_address,
                    files = volume.number_of_files(),
                    free = volume.free_memory_size,
                    "volume mounted"
                );
                Ok(Self {
                    medium,
                    volume,
                    descriptors: DescriptorTable::new(),
                    options,
                    mounted: true,
                })
            }
            Err(e) => Err((medium, e)),
        }
    }

    fn load(medium: &M, base_address: u32) -> Result<VolumeState> {
        let header = medium::read_volume_header(medium, base_address)?;

        if header.magic != MAGIC {
            warn!(expected = MAGIC, found = header.magic, "bad volume magic");
            return Err(Status::NoSuchDevice.into());
        }
        if header.version != VERSION {
            warn!(expected = VERSION, found = header.version, "unsupported volume version");
            return Err(Status::NoSuchDevice.into());
        }
        if header.number_of_files as usize > MAX_FILES {
            warn!(files = header.number_of_files, "file count exceeds allocation table");
            return Err(Status::NoSuchDevice.into());
        }

        if (header.free_memory_offset as usize) < ALLOCATION_TABLE_SIZE {
            warn!(offset = header.free_memory_offset, "free region overlaps the allocation table");
            return Err(Status::NoSuchDevice.into());
        }
        let free_end = u64::from(base_address)
            + u64::from(header.free_memory_offset)
            + u64::from(header.free_memory_size);
        if free_end > u64::from(medium.capacity()) {
            warn!(
                offset = header.free_memory_offset,
                size = header.free_memory_size,
                "free region runs past the medium"
            );
            return Err(Status::NoSuchDevice.into());
        }

        let entries = (0..header.number_of_files as usize)
            .map(|i| medium::read_allocation_entry(medium, base_address, i))
            .collect::<Result<Vec<AllocationEntry>>>()?;

        for (index, entry) in entries.iter().enumerate() {
            let end = u64::from(base_address)
                + u64::from(entry.file_header_offset)
                + FILE_HEADER_SIZE as u64
                + u64::from(entry.max_file_size);
            if end > u64::from(medium.capacity()) {
                warn!(inode = index, end, "allocation entry runs past the medium");
                return Err(Status::NoSuchDevice.into());
            }
        }

        Ok(VolumeState::from_disk(base_address, &header, &entries))
    }

    /// Drops the in-memory tables. Refused while any descriptor is open.
    pub fn unmount(&mut self) -> Result<()> {
        if self.descriptors.has_open_files() {
            return Err(Status::DeviceIsBusy.into());
        }
        self.volume.clear();
        self.mounted = false;
        info!("volume unmounted");
        Ok(())
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted
    }

    pub fn volume(&self) -> &VolumeState {
        &self.volume
    }

    pub fn options(&self) -> &MountOptions {
        &self.options
    }

    pub fn medium(&self) -> &M {
        &self.medium
    }

    pub fn into_medium(self) -> M {
        self.medium
    }

    // -------------------------------------------------------------------------
    // Open / create / close
    // -------------------------------------------------------------------------

    pub fn open(&mut self, filename: &str, flags: OpenFlags, attributes: Attributes) -> Result<Fd> {
        self.ensure_mounted()?;
        self.validate_filename(filename)?;

        match self.find_file(filename)? {
            Some(inode_index) => self.open_existing(inode_index, flags),
            None if flags.contains(OpenFlags::CREAT) => self.create_new(filename, attributes),
            None => Err(Status::FileNotFound.into()),
        }
    }

    /// Creates `filename`, or reopens it write-only and truncated if it exists.
    pub fn create(&mut self, filename: &str, attributes: Attributes) -> Result<Fd> {
        self.ensure_mounted()?;
        self.validate_filename(filename)?;

        match self.find_file(filename)? {
            Some(inode_index) => {
                self.open_existing(inode_index, OpenFlags::WRONLY | OpenFlags::TRUNC)
            }
            None => self.create_new(filename, attributes),
        }
    }

    fn open_existing(&mut self, inode_index: usize, flags: OpenFlags) -> Result<Fd> {
        if flags.has_unknown_bits() {
            return Err(Status::InvalidArgument.into());
        }

        let writing = flags.wants_write();
        if writing && self.options.write_protected {
            return Err(Status::ReadOnlyFileSystem.into());
        }

        let inode = *self.inode(inode_index)?;
        let header = self.read_header(inode.file_header_pointer)?;

        if writing && Attributes::from_raw(header.attributes).is_readonly() {
            return Err(Status::PermissionDenied.into());
        }
        if writing && self.descriptors.fmode(inode_index).contains(Mode::WRITE) {
            return Err(Status::PermissionDenied.into());
        }

        let truncate = writing && flags.contains(OpenFlags::TRUNC);
        let fd = self
            .descriptors
            .allocate(FileDescriptor {
                mode: flags.mode(),
                file_header_pointer: inode.file_header_pointer,
                file_data_pointer: inode.file_data_pointer(),
                byte_offset: 0,
                file_size: if truncate { 0 } else { header.file_size },
                max_file_size: inode.max_file_size,
                inode_index,
            })
            .inspect_err(|_| warn!("descriptor pool exhausted"))?;

        debug!(%fd, inode = inode_index, ?flags, truncate, "file opened");
        Ok(fd)
    }

    fn create_new(&mut self, filename: &str, attributes: Attributes) -> Result<Fd> {
        if self.options.write_protected {
            return Err(Status::ReadOnlyFileSystem.into());
        }
        if self.volume.number_of_files() >= MAX_FILES {
            return Err(Status::NoSpaceLeftOnDevice.into());
        }
        if self.descriptors.has_open_create() {
            return Err(Status::PermissionDenied.into());
        }
        if self.volume.free_memory_size < FILE_HEADER_SIZE as u32 {
            return Err(Status::NoSpaceLeftOnDevice.into());
        }
        if !attributes.is_valid() {
            return Err(Status::InvalidArgument.into());
        }
        if !self.descriptors.has_free_slot() {
            warn!("descriptor pool exhausted");
            return Err(Status::NoFreeFileDescriptor.into());
        }

        let now = (self.options.clock)();
        let header = FileHeader {
            crc: 0,
            in_use: true,
            attributes: attributes.raw(),
            file_size: 0,
            modification_date: now,
            creation_date: now,
            filename: filename.to_owned(),
        };
        self.write_header(self.volume.free_memory_pointer, &header)?;

        let inode_index = self.volume.append_provisional();
        let inode = self.volume.files[inode_index];
        let fd = self.descriptors.allocate(FileDescriptor {
            mode: Mode::WRITE | Mode::CREATE,
            file_header_pointer: inode.file_header_pointer,
            file_data_pointer: inode.file_data_pointer(),
            byte_offset: 0,
            file_size: 0,
            max_file_size: inode.max_file_size,
            inode_index,
        })?;

        debug!(%fd, inode = inode_index, filename, "file created");
        Ok(fd)
    }

    /// Releases `fd`, persisting whatever its mode requires.
    ///
    /// Closing a new file fixes its capacity at the written size plus the
    /// spare allowance (rounded to 4 bytes, capped by free space) and makes
    /// the allocation durable.
    pub fn close(&mut self, fd: Fd) -> Result<()> {
        let descriptor = self.descriptors.get(fd)?.clone();
        let inode_index = descriptor.inode_index;

        if descriptor.mode.contains(Mode::CREATE) {
            let final_size = round_up_4(descriptor.file_size.saturating_add(self.options.spare_bytes))
                .min(self.volume.free_data_size());

            // The in-memory tables only move once the medium has them.
            let mut staged = self.volume.clone();
            staged.commit(inode_index, final_size).ok_or(Status::Error)?;
            let entry = staged.allocation_entry(inode_index).ok_or(Status::Error)?;
            let state = staged.header().ok_or(Status::Error)?;

            let mut header = self.read_header(descriptor.file_header_pointer)?;
            header.file_size = descriptor.file_size;
            header.crc = 0;
            self.write_header(descriptor.file_header_pointer, &header)?;

            medium::write_allocation_entry(&mut self.medium, staged.base_address, inode_index, &entry)?;

            let mut volume_header = medium::read_volume_header(&self.medium, staged.base_address)?;
            volume_header.free_memory_offset = state.free_memory_offset;
            volume_header.free_memory_size = state.free_memory_size;
            volume_header.number_of_files = state.number_of_files;
            medium::write_volume_header(&mut self.medium, staged.base_address, &volume_header)?;

            self.volume = staged;

            debug!(
                %fd,
                inode = inode_index,
                size = descriptor.file_size,
                capacity = final_size,
                "new file committed"
            );
        } else if descriptor.mode.contains(Mode::WRITE) {
            let mut header = self.read_header(descriptor.file_header_pointer)?;
            header.file_size = descriptor.file_size;
            header.modification_date = (self.options.clock)();
            header.crc = 0;
            self.write_header(descriptor.file_header_pointer, &header)?;

            debug!(%fd, inode = inode_index, size = descriptor.file_size, "file updated");
        }

        self.descriptors.free(fd)?;
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Read / write / seek
    // -------------------------------------------------------------------------

    /// Reads from the cursor into `target`. Returns 0 at end of file.
    pub fn read(&mut self, fd: Fd, target: &mut [u8]) -> Result<usize> {
        let descriptor = self.descriptors.get(fd)?;
        if target.is_empty() {
            return Err(Status::InvalidArgument.into());
        }
        if !descriptor.mode.contains(Mode::READ) {
            return Err(Status::PermissionDenied.into());
        }

        let remaining = descriptor.file_size.saturating_sub(descriptor.byte_offset) as usize;
        let count = remaining.min(target.len());
        let pointer = descriptor.file_data_pointer;
        if count > 0 {
            medium::read_exact(&self.medium, pointer, &mut target[..count], "file data")?;
        }

        let descriptor = self.descriptors.get_mut(fd)?;
        descriptor.byte_offset += count as u32;
        descriptor.file_data_pointer += count as u32;
        trace!(%fd, count, offset = descriptor.byte_offset, "read");
        Ok(count)
    }

    /// Writes `buffer` at the cursor. Anything past the file's capacity is
    /// dropped; the return value is the number of bytes kept.
    pub fn write(&mut self, fd: Fd, buffer: &[u8]) -> Result<usize> {
        let descriptor = self.descriptors.get(fd)?;
        if buffer.is_empty() {
            return Err(Status::InvalidArgument.into());
        }
        if !descriptor.mode.contains(Mode::WRITE) {
            return Err(Status::PermissionDenied.into());
        }

        let room = descriptor.max_file_size.saturating_sub(descriptor.byte_offset) as usize;
        let count = room.min(buffer.len());
        let pointer = descriptor.file_data_pointer;
        if count > 0 {
            self.medium.write_at(pointer, &buffer[..count])?;
        }

        let descriptor = self.descriptors.get_mut(fd)?;
        descriptor.byte_offset += count as u32;
        descriptor.file_data_pointer += count as u32;
        if descriptor.byte_offset > descriptor.file_size {
            descriptor.file_size = descriptor.byte_offset;
        }
        if count < buffer.len() {
            debug!(%fd, requested = buffer.len(), count, "write truncated at capacity");
        }
        trace!(%fd, count, offset = descriptor.byte_offset, "write");
        Ok(count)
    }

    /// Empties the file behind a writable descriptor and rewinds it. The
    /// new size reaches the medium on close.
    pub fn truncate(&mut self, fd: Fd) -> Result<()> {
        let descriptor = self.descriptors.get_mut(fd)?;
        if !descriptor.mode.contains(Mode::WRITE) {
            return Err(Status::PermissionDenied.into());
        }
        descriptor.file_size = 0;
        descriptor.byte_offset = 0;
        descriptor.file_data_pointer = descriptor.file_header_pointer + FILE_HEADER_SIZE as u32;
        debug!(%fd, inode = descriptor.inode_index, "file truncated");
        Ok(())
    }

    /// Moves the cursor and returns its new offset. Targets past the end of
    /// file are clamped to the end of file.
    pub fn seek(&mut self, fd: Fd, offset: i64, whence: Whence) -> Result<u32> {
        let descriptor = self.descriptors.get_mut(fd)?;
        let file_size = i64::from(descriptor.file_size);
        let current = i64::from(descriptor.byte_offset);

        let target = match whence {
            Whence::Set => offset.clamp(0, file_size),
            Whence::Cur => {
                let target = current.checked_add(offset).ok_or(Status::InvalidArgument)?;
                if target < 0 {
                    return Err(Status::InvalidArgument.into());
                }
                target.min(file_size)
            }
            Whence::End => {
                let target = file_size.checked_add(offset).ok_or(Status::InvalidArgument)?;
                if target < 0 {
                    return Err(Status::InvalidArgument.into());
                }
                target.min(file_size)
            }
        };

        // 0 <= target <= file_size, which fits in u32.
        let target = target as u32;
        let data_start = descriptor.file_header_pointer + FILE_HEADER_SIZE as u32;
        descriptor.byte_offset = target;
        descriptor.file_data_pointer = data_start + target;
        trace!(%fd, offset, ?whence, target, "seek");
        Ok(target)
    }

    // -------------------------------------------------------------------------
    // Namespace
    // -------------------------------------------------------------------------

    /// Tombstones `filename`. Its slot and inode index are never reused.
    pub fn remove(&mut self, filename: &str) -> Result<()> {
        self.ensure_mounted()?;
        self.validate_filename(filename)?;
        if self.options.write_protected {
            return Err(Status::ReadOnlyFileSystem.into());
        }

        let inode_index = self.find_file(filename)?.ok_or(Status::FileNotFound)?;
        let pointer = self.inode(inode_index)?.file_header_pointer;
        let mut header = self.read_header(pointer)?;

        if Attributes::from_raw(header.attributes).is_readonly() {
            return Err(Status::PermissionDenied.into());
        }
        if self.descriptors.fmode(inode_index) != Mode::NONE {
            return Err(Status::PermissionDenied.into());
        }

        header.in_use = false;
        header.modification_date = (self.options.clock)();
        self.write_header(pointer, &header)?;

        debug!(inode = inode_index, filename, "file removed");
        Ok(())
    }

    pub fn rename(&mut self, old_filename: &str, new_filename: &str) -> Result<()> {
        self.ensure_mounted()?;
        self.validate_filename(old_filename)?;
        self.validate_filename(new_filename)?;
        if self.options.write_protected {
            return Err(Status::ReadOnlyFileSystem.into());
        }

        if self.find_file(new_filename)?.is_some() {
            return Err(Status::PermissionDenied.into());
        }
        let inode_index = self.find_file(old_filename)?.ok_or(Status::FileNotFound)?;
        let pointer = self.inode(inode_index)?.file_header_pointer;
        let mut header = self.read_header(pointer)?;

        if Attributes::from_raw(header.attributes).is_readonly() {
            return Err(Status::PermissionDenied.into());
        }

        header.filename = new_filename.to_owned();
        header.modification_date = (self.options.clock)();
        self.write_header(pointer, &header)?;

        debug!(inode = inode_index, old_filename, new_filename, "file renamed");
        Ok(())
    }

    pub fn set_file_attributes(&mut self, filename: &str, attributes: Attributes) -> Result<()> {
        self.ensure_mounted()?;
        if !attributes.is_valid() {
            return Err(Status::InvalidArgument.into());
        }
        self.validate_filename(filename)?;
        if self.options.write_protected {
            return Err(Status::ReadOnlyFileSystem.into());
        }

        let inode_index = self.find_file(filename)?.ok_or(Status::FileNotFound)?;
        let pointer = self.inode(inode_index)?.file_header_pointer;
        let mut header = self.read_header(pointer)?;
        header.attributes = attributes.raw();
        self.write_header(pointer, &header)?;

        debug!(inode = inode_index, filename, ?attributes, "attributes changed");
        Ok(())
    }

    pub fn stat(&self, filename: &str) -> Result<Stat> {
        self.ensure_mounted()?;
        self.validate_filename(filename)?;

        let inode_index = self.find_file(filename)?.ok_or(Status::FileNotFound)?;
        let header = self.read_header(self.inode(inode_index)?.file_header_pointer)?;
        Ok(Stat::new(inode_index, header))
    }

    pub fn fstat(&self, fd: Fd) -> Result<Stat> {
        let descriptor = self.descriptors.get(fd)?;
        let header = self.read_header(descriptor.file_header_pointer)?;
        Ok(Stat::new(descriptor.inode_index, header))
    }

    /// Stat by inode index; tombstoned and unknown inodes are `FileNotFound`.
    pub fn stat_inode(&self, inode_index: usize) -> Result<Stat> {
        self.ensure_mounted()?;
        let pointer = self
            .volume
            .inode(inode_index)
            .ok_or(Status::FileNotFound)?
            .file_header_pointer;
        let header = self.read_header(pointer)?;
        if !header.in_use {
            return Err(Status::FileNotFound.into());
        }
        Ok(Stat::new(inode_index, header))
    }

    // -------------------------------------------------------------------------
    // Descriptor accounting
    // -------------------------------------------------------------------------

    pub fn has_open_files(&self) -> bool {
        self.descriptors.has_open_files()
    }

    pub fn has_open_create(&self) -> bool {
        self.descriptors.has_open_create()
    }

    pub fn fmode(&self, inode_index: usize) -> Mode {
        self.descriptors.fmode(inode_index)
    }

    pub fn descriptor(&self, fd: Fd) -> Result<&FileDescriptor> {
        Ok(self.descriptors.get(fd)?)
    }

    pub fn descriptors(&self) -> &DescriptorTable {
        &self.descriptors
    }

    pub fn file_descriptors_in_use(&self) -> usize {
        self.descriptors.in_use()
    }

    pub fn file_descriptors_high_water_mark(&self) -> usize {
        self.descriptors.high_water_mark()
    }

    pub fn max_files(&self) -> usize {
        MAX_FILES
    }

    pub fn max_open_files(&self) -> usize {
        MAX_OPEN_FILES
    }

    // -------------------------------------------------------------------------
    // Helpers
    // -------------------------------------------------------------------------

    fn ensure_mounted(&self) -> Result<()> {
        if !self.mounted {
            return Err(Status::NoSuchDevice.into());
        }
        Ok(())
    }

    fn validate_filename(&self, filename: &str) -> Result<()> {
        let len = self.options.codec.encode(filename).len();
        if len == 0 || len > MAX_FILENAME_SIZE {
            return Err(Status::InvalidArgument.into());
        }
        Ok(())
    }

    fn inode(&self, index: usize) -> Result<&InodeTableEntry> {
        Ok(self.volume.inode(index).ok_or(Status::Error)?)
    }

    /// First in-use inode whose name collates equal to `filename`.
    pub(crate) fn find_file(&self, filename: &str) -> Result<Option<usize>> {
        for (index, inode) in self.volume.files.iter().enumerate() {
            let header = self.read_header(inode.file_header_pointer)?;
            if !header.in_use {
                continue;
            }
            if self.options.collator.compare(&header.filename, filename) == Ordering::Equal {
                return Ok(Some(index));
            }
        }
        Ok(None)
    }

    pub(crate) fn read_header(&self, pointer: u32) -> Result<FileHeader> {
        medium::read_file_header(&self.medium, self.options.codec.as_ref(), pointer)
    }

    fn write_header(&mut self, pointer: u32, header: &FileHeader) -> Result<()> {
        medium::write_file_header(&mut self.medium, self.options.codec.as_ref(), pointer, header)
    }
}

fn round_up_4(value: u32) -> u32 {
    value.saturating_add(3) & !3
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flag_modes() {
        assert_eq!(OpenFlags::RDONLY.mode(), Mode::READ);
        assert_eq!(OpenFlags::WRONLY.mode(), Mode::WRITE);
        assert_eq!(OpenFlags::RDWR.mode(), Mode::READ | Mode::WRITE);
        assert_eq!(OpenFlags::CREAT.mode(), Mode::READ);
        assert!(OpenFlags::RDWR.wants_write());
        assert!(!OpenFlags::RDONLY.wants_write());
        assert!(!(OpenFlags::RDWR | OpenFlags::TRUNC | OpenFlags::CREAT).has_unknown_bits());
        assert!(OpenFlags::from_bits(0x0001).has_unknown_bits());
    }

    #[test]
    fn attribute_values() {
        assert!(Attributes::NONE.is_valid());
        assert!(Attributes::READONLY.is_valid());
        assert!(!Attributes::from_raw(42).is_valid());
        assert!(Attributes::READONLY.is_readonly());
    }

    #[test]
    fn whence_from_raw() {
        assert_eq!(Whence::try_from(0), Ok(Whence::Set));
        assert_eq!(Whence::try_from(2), Ok(Whence::End));
        assert_eq!(Whence::try_from(7), Err(Status::InvalidArgument));
    }

    #[test]
    fn rounding() {
        assert_eq!(round_up_4(0), 0);
        assert_eq!(round_up_4(566), 568);
        assert_eq!(round_up_4(568), 568);
        assert_eq!(round_up_4(u32::MAX), u32::MAX & !3);
    }
}
