// src/dir.rs
use std::iter::FusedIterator;

use crate::descriptor::{Fd, Mode};
use crate::error::Result;
use crate::fs::Eefs;
use crate::medium::Medium;

/// One live file, as seen by enumeration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub inode_index: usize,
    pub filename: String,
    pub file_size: u32,
}

/// One descriptor of the pool and the file behind it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenFile {
    pub fd: Fd,
    pub inode_index: usize,
    pub filename: String,
    pub mode: Mode,
}

/// Lazy walk over the inode table in index order, skipping tombstones.
///
/// Every item re-reads its file header from the medium. The borrow on the
/// engine keeps the volume from changing underneath.
pub struct Entries<'a, M: Medium> {
    fs: &'a Eefs<M>,
    next: usize,
    end: usize,
}

impl<'a, M: Medium> Iterator for Entries<'a, M> {
    type Item = Result<DirEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        while self.next < self.end {
            let inode_index = self.next;
            self.next += 1;

            let pointer = match self.fs.volume().inode(inode_index) {
                Some(inode) => inode.file_header_pointer,
                None => break,
            };
            let header = match self.fs.read_header(pointer) {
                Ok(header) => header,
                Err(e) => {
                    // Stop after a corrupt header instead of looping on errors.
                    self.next = self.end;
                    return Some(Err(e));
                }
            };
            if header.in_use {
                return Some(Ok(DirEntry {
                    inode_index,
                    filename: header.filename,
                    file_size: header.file_size,
                }));
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.end.saturating_sub(self.next)))
    }
}

impl<M: Medium> FusedIterator for Entries<'_, M> {}

impl<M: Medium> Eefs<M> {
    /// Lists every in-use file. Each call starts a fresh walk.
    pub fn entries(&self) -> Entries<'_, M> {
        Entries {
            fs: self,
            next: 0,
            end: self.volume().number_of_files(),
        }
    }

    /// Every open descriptor with the name of its file, in descriptor order.
    pub fn list_open_files(&self) -> Result<Vec<OpenFile>> {
        self.descriptors()
            .iter()
            .map(|(fd, descriptor)| {
                let header = self.read_header(descriptor.file_header_pointer)?;
                Ok(OpenFile {
                    fd,
                    inode_index: descriptor.inode_index,
                    filename: header.filename,
                    mode: descriptor.mode,
                })
            })
            .collect()
    }
}
