// src/fuse.rs
use std::ffi::OsStr;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use fuser::{
    FileAttr,
    FileType,
    Filesystem,
    MountOption,
    ReplyAttr,
    ReplyCreate,
    ReplyData,
    ReplyDirectory,
    ReplyEmpty,
    ReplyEntry,
    ReplyOpen,
    ReplyStatfs,
    ReplyWrite,
    Request,
    TimeOrNow,
};
use libc::{EINVAL, ENOENT, ENOSPC};
use tracing::{debug, info, warn};

use crate::config::{MAX_FILENAME_SIZE, MAX_FILES};
use crate::descriptor::{Fd, Mode};
use crate::error::{EefsError, Status};
use crate::fs::{Attributes, Eefs, OpenFlags, Stat, Whence};
use crate::medium::Medium;

pub const ROOT_INO: u64 = 1;
const BLOCK_SIZE: u32 = 512;
const TTL: Duration = Duration::from_secs(1);

/// Inode index `i` is exposed as `i + 2`; 1 is the root directory.
pub fn ino_of(inode_index: usize) -> u64 {
    inode_index as u64 + 2
}

pub fn inode_index_of(ino: u64) -> Option<usize> {
    ino.checked_sub(2).map(|i| i as usize)
}

fn errno(e: EefsError) -> i32 {
    e.as_errno()
}

fn epoch(secs: u32) -> SystemTime {
    UNIX_EPOCH + Duration::from_secs(u64::from(secs))
}

fn name_of(name: &OsStr) -> Result<&str, i32> {
    name.to_str().ok_or(EINVAL)
}

/// Kernel open flags to engine flags. Anything besides the access mode and
/// `O_TRUNC` is dropped.
pub fn open_flags_from_libc(flags: i32) -> OpenFlags {
    let access = match flags & libc::O_ACCMODE {
        libc::O_WRONLY => OpenFlags::WRONLY,
        libc::O_RDWR => OpenFlags::RDWR,
        _ => OpenFlags::RDONLY,
    };
    if flags & libc::O_TRUNC != 0 {
        access | OpenFlags::TRUNC
    } else {
        access
    }
}

fn attributes_from_mode(mode: u32) -> Attributes {
    if mode & 0o222 == 0 {
        Attributes::READONLY
    } else {
        Attributes::NONE
    }
}

/// A mounted volume exposed as one flat directory.
pub struct EefsFuse<M: Medium> {
    inner: Arc<Mutex<Eefs<M>>>,
    uid: u32,
    gid: u32,
}

impl<M: Medium> EefsFuse<M> {
    pub fn new(fs: Eefs<M>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(fs)),
            uid: 0,
            gid: 0,
        }
    }

    /// Owner reported for every node.
    pub fn with_owner(mut self, uid: u32, gid: u32) -> Self {
        self.uid = uid;
        self.gid = gid;
        self
    }

    pub fn engine(&self) -> Arc<Mutex<Eefs<M>>> {
        Arc::clone(&self.inner)
    }

    fn lock(&self) -> MutexGuard<'_, Eefs<M>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // -------------------------------------------------------------------------
    // Attributes
    // -------------------------------------------------------------------------

    fn root_attr(&self) -> FileAttr {
        FileAttr {
            ino: ROOT_INO,
            size: 0,
            blocks: 0,
            atime: UNIX_EPOCH,
            mtime: UNIX_EPOCH,
            ctime: UNIX_EPOCH,
            crtime: UNIX_EPOCH,
            kind: FileType::Directory,
            perm: 0o755,
            nlink: 2,
            uid: self.uid,
            gid: self.gid,
            rdev: 0,
            blksize: BLOCK_SIZE,
            flags: 0,
        }
    }

    /// Size seen through an open writer wins over the header on the medium.
    fn file_attr(&self, fs: &Eefs<M>, stat: &Stat) -> FileAttr {
        let size = fs
            .descriptors()
            .iter()
            .find(|(_, d)| d.inode_index == stat.inode_index && d.mode.contains(Mode::WRITE))
            .map_or(stat.file_size, |(_, d)| d.file_size);

        FileAttr {
            ino: ino_of(stat.inode_index),
            size: u64::from(size),
            blocks: u64::from(size.div_ceil(BLOCK_SIZE)),
            atime: epoch(stat.modification_date),
            mtime: epoch(stat.modification_date),
            ctime: epoch(stat.modification_date),
            crtime: epoch(stat.creation_date),
            kind: FileType::RegularFile,
            perm: if stat.attributes.is_readonly() { 0o444 } else { 0o644 },
            nlink: 1,
            uid: self.uid,
            gid: self.gid,
            rdev: 0,
            blksize: BLOCK_SIZE,
            flags: 0,
        }
    }

    fn stat_ino(fs: &Eefs<M>, ino: u64) -> Result<Stat, i32> {
        let index = inode_index_of(ino).ok_or(ENOENT)?;
        fs.stat_inode(index).map_err(errno)
    }

    // -------------------------------------------------------------------------
    // Operations, callable without a kernel request
    // -------------------------------------------------------------------------

    pub fn attr(&self, ino: u64) -> Result<FileAttr, i32> {
        if ino == ROOT_INO {
            return Ok(self.root_attr());
        }
        let fs = self.lock();
        let stat = Self::stat_ino(&fs, ino)?;
        Ok(self.file_attr(&fs, &stat))
    }

    pub fn lookup_name(&self, parent: u64, name: &OsStr) -> Result<FileAttr, i32> {
        if parent != ROOT_INO {
            return Err(ENOENT);
        }
        let fs = self.lock();
        let stat = fs.stat(name_of(name)?).map_err(errno)?;
        Ok(self.file_attr(&fs, &stat))
    }

    /// `.`, `..` and every live file, each with the offset of the next entry.
    pub fn list(&self) -> Result<Vec<(u64, FileType, String)>, i32> {
        let fs = self.lock();
        let mut items = vec![
            (ROOT_INO, FileType::Directory, ".".to_string()),
            (ROOT_INO, FileType::Directory, "..".to_string()),
        ];
        for entry in fs.entries() {
            let entry = entry.map_err(errno)?;
            items.push((ino_of(entry.inode_index), FileType::RegularFile, entry.filename));
        }
        Ok(items)
    }

    pub fn open_ino(&self, ino: u64, flags: i32) -> Result<u64, i32> {
        let mut fs = self.lock();
        let stat = Self::stat_ino(&fs, ino)?;
        let fd = fs
            .open(&stat.filename, open_flags_from_libc(flags), Attributes::NONE)
            .map_err(errno)?;
        Ok(fd.index() as u64)
    }

    pub fn create_file(&self, parent: u64, name: &OsStr, mode: u32) -> Result<(FileAttr, u64), i32> {
        if parent != ROOT_INO {
            return Err(ENOENT);
        }
        let mut fs = self.lock();
        let fd = fs
            .create(name_of(name)?, attributes_from_mode(mode))
            .map_err(errno)?;
        let stat = fs.fstat(fd).map_err(errno)?;
        Ok((self.file_attr(&fs, &stat), fd.index() as u64))
    }

    pub fn read_fh(&self, fh: u64, offset: i64, size: u32) -> Result<Vec<u8>, i32> {
        if offset < 0 {
            return Err(EINVAL);
        }
        let fd = Fd::from_raw(fh as usize);
        let mut fs = self.lock();
        let position = fs.seek(fd, offset, Whence::Set).map_err(errno)?;
        if i64::from(position) < offset || size == 0 {
            return Ok(Vec::new());
        }
        let mut buf = vec![0u8; size as usize];
        let n = fs.read(fd, &mut buf).map_err(errno)?;
        buf.truncate(n);
        Ok(buf)
    }

    /// Writes at `offset`. Holes past the end of file are refused and a write
    /// with no room left is `ENOSPC`.
    pub fn write_fh(&self, fh: u64, offset: i64, data: &[u8]) -> Result<u32, i32> {
        if offset < 0 {
            return Err(EINVAL);
        }
        let fd = Fd::from_raw(fh as usize);
        let mut fs = self.lock();
        let position = fs.seek(fd, offset, Whence::Set).map_err(errno)?;
        if i64::from(position) != offset {
            return Err(EINVAL);
        }
        if data.is_empty() {
            return Ok(0);
        }
        match fs.write(fd, data).map_err(errno)? {
            0 => Err(ENOSPC),
            n => Ok(n as u32),
        }
    }

    pub fn release_fh(&self, fh: u64) -> Result<(), i32> {
        self.lock()
            .close(Fd::from_raw(fh as usize))
            .map_err(errno)
    }

    pub fn unlink_name(&self, parent: u64, name: &OsStr) -> Result<(), i32> {
        if parent != ROOT_INO {
            return Err(ENOENT);
        }
        self.lock().remove(name_of(name)?).map_err(errno)
    }

    pub fn rename_name(
        &self,
        parent: u64,
        name: &OsStr,
        newparent: u64,
        newname: &OsStr,
    ) -> Result<(), i32> {
        if parent != ROOT_INO || newparent != ROOT_INO {
            return Err(ENOENT);
        }
        self.lock()
            .rename(name_of(name)?, name_of(newname)?)
            .map_err(errno)
    }

    /// chmod maps onto the READONLY attribute; the only size change allowed
    /// is truncation to zero.
    pub fn set_attr(
        &self,
        ino: u64,
        mode: Option<u32>,
        size: Option<u64>,
        fh: Option<u64>,
    ) -> Result<FileAttr, i32> {
        if ino == ROOT_INO {
            return Ok(self.root_attr());
        }

        let mut fs = self.lock();
        let stat = Self::stat_ino(&fs, ino)?;

        if let Some(mode) = mode {
            fs.set_file_attributes(&stat.filename, attributes_from_mode(mode))
                .map_err(errno)?;
        }

        match size {
            None => {}
            Some(0) => match fh {
                Some(fh) => fs.truncate(Fd::from_raw(fh as usize)).map_err(errno)?,
                None => {
                    let fd = fs
                        .open(
                            &stat.filename,
                            OpenFlags::WRONLY | OpenFlags::TRUNC,
                            Attributes::NONE,
                        )
                        .map_err(errno)?;
                    fs.close(fd).map_err(errno)?;
                }
            },
            Some(size) => {
                let current = self.file_attr(&fs, &stat).size;
                if size != current {
                    return Err(Status::UnsupportedOption.as_errno());
                }
            }
        }

        let stat = fs.stat_inode(stat.inode_index).map_err(errno)?;
        Ok(self.file_attr(&fs, &stat))
    }

    /// (blocks, free blocks, files, free file slots)
    pub fn usage(&self) -> (u64, u64, u64, u64) {
        let fs = self.lock();
        let volume = fs.volume();
        let used = u64::from(volume.free_memory_pointer - volume.base_address);
        let free = u64::from(volume.free_memory_size);
        let block = u64::from(BLOCK_SIZE);
        let files = MAX_FILES as u64;
        let free_files = files.saturating_sub(volume.number_of_files() as u64);
        ((used + free) / block, free / block, files, free_files)
    }

    /// Serves the volume at `mountpoint` until it is unmounted, then unmounts
    /// the engine as well.
    pub fn run(self, mountpoint: &Path) -> anyhow::Result<()> {
        let inner = self.engine();
        let options = vec![
            MountOption::FSName("eefs".to_string()),
            MountOption::RW,
            MountOption::DefaultPermissions,
        ];

        info!(mountpoint = %mountpoint.display(), "serving volume");
        fuser::mount2(self, mountpoint, &options)?;

        let mut fs = inner.lock().unwrap_or_else(PoisonError::into_inner);
        fs.unmount()?;
        Ok(())
    }
}

// -----------------------------------------------------------------------------
// FUSE glue
// -----------------------------------------------------------------------------

impl<M: Medium> Filesystem for EefsFuse<M> {
    fn getattr(&mut self, _req: &Request<'_>, ino: u64, reply: ReplyAttr) {
        match self.attr(ino) {
            Ok(attr) => reply.attr(&TTL, &attr),
            Err(e) => reply.error(e),
        }
    }

    fn lookup(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEntry) {
        match self.lookup_name(parent, name) {
            Ok(attr) => reply.entry(&TTL, &attr, 0),
            Err(e) => reply.error(e),
        }
    }

    fn readdir(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _fh: u64,
        offset: i64,
        mut reply: ReplyDirectory,
    ) {
        if ino != ROOT_INO {
            reply.error(libc::ENOTDIR);
            return;
        }

        let items = match self.list() {
            Ok(items) => items,
            Err(e) => {
                reply.error(e);
                return;
            }
        };

        for (i, (child, kind, name)) in items.iter().enumerate().skip(offset.max(0) as usize) {
            if reply.add(*child, (i + 1) as i64, *kind, name) {
                break;
            }
        }
        reply.ok();
    }

    fn open(&mut self, _req: &Request<'_>, ino: u64, flags: i32, reply: ReplyOpen) {
        match self.open_ino(ino, flags) {
            Ok(fh) => reply.opened(fh, 0),
            Err(e) => {
                debug!(ino, flags, errno = e, "open refused");
                reply.error(e)
            }
        }
    }

    fn create(
        &mut self,
        _req: &Request<'_>,
        parent: u64,
        name: &OsStr,
        mode: u32,
        _umask: u32,
        _flags: i32,
        reply: ReplyCreate,
    ) {
        match self.create_file(parent, name, mode) {
            Ok((attr, fh)) => reply.created(&TTL, &attr, 0, fh, 0),
            Err(e) => {
                debug!(?name, errno = e, "create refused");
                reply.error(e)
            }
        }
    }

    fn read(
        &mut self,
        _req: &Request<'_>,
        _ino: u64,
        fh: u64,
        offset: i64,
        size: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyData,
    ) {
        match self.read_fh(fh, offset, size) {
            Ok(data) => reply.data(&data),
            Err(e) => reply.error(e),
        }
    }

    fn write(
        &mut self,
        _req: &Request<'_>,
        _ino: u64,
        fh: u64,
        offset: i64,
        data: &[u8],
        _write_flags: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyWrite,
    ) {
        match self.write_fh(fh, offset, data) {
            Ok(n) => reply.written(n),
            Err(e) => reply.error(e),
        }
    }

    fn release(
        &mut self,
        _req: &Request<'_>,
        _ino: u64,
        fh: u64,
        _flags: i32,
        _lock_owner: Option<u64>,
        _flush: bool,
        reply: ReplyEmpty,
    ) {
        match self.release_fh(fh) {
            Ok(()) => reply.ok(),
            Err(e) => {
                warn!(fh, errno = e, "close failed");
                reply.error(e)
            }
        }
    }

    fn flush(&mut self, _req: &Request<'_>, _ino: u64, _fh: u64, _lock_owner: u64, reply: ReplyEmpty) {
        reply.ok();
    }

    fn fsync(&mut self, _req: &Request<'_>, _ino: u64, _fh: u64, _datasync: bool, reply: ReplyEmpty) {
        reply.ok();
    }

    fn unlink(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEmpty) {
        match self.unlink_name(parent, name) {
            Ok(()) => reply.ok(),
            Err(e) => reply.error(e),
        }
    }

    fn rename(
        &mut self,
        _req: &Request<'_>,
        parent: u64,
        name: &OsStr,
        newparent: u64,
        newname: &OsStr,
        _flags: u32,
        reply: ReplyEmpty,
    ) {
        match self.rename_name(parent, name, newparent, newname) {
            Ok(()) => reply.ok(),
            Err(e) => reply.error(e),
        }
    }

    fn setattr(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        mode: Option<u32>,
        _uid: Option<u32>,
        _gid: Option<u32>,
        size: Option<u64>,
        _atime: Option<TimeOrNow>,
        _mtime: Option<TimeOrNow>,
        _ctime: Option<SystemTime>,
        fh: Option<u64>,
        _crtime: Option<SystemTime>,
        _chgtime: Option<SystemTime>,
        _bkuptime: Option<SystemTime>,
        _flags: Option<u32>,
        reply: ReplyAttr,
    ) {
        match self.set_attr(ino, mode, size, fh) {
            Ok(attr) => reply.attr(&TTL, &attr),
            Err(e) => reply.error(e),
        }
    }

    fn statfs(&mut self, _req: &Request<'_>, _ino: u64, reply: ReplyStatfs) {
        let (blocks, bfree, files, ffree) = self.usage();
        reply.statfs(
            blocks,
            bfree,
            bfree,
            files,
            ffree,
            BLOCK_SIZE,
            MAX_FILENAME_SIZE as u32,
            BLOCK_SIZE,
        );
    }
}
