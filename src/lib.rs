pub mod codec;
pub mod config;
pub mod descriptor;
mod dir;
pub mod error;
mod fs;
pub mod fsck;
pub mod fuse;
pub mod medium;
pub mod text;
pub mod volume;

pub use crate::config::{
    MountOptions, DEFAULT_SPARE_BYTES, MAGIC, MAX_FILENAME_SIZE, MAX_FILES, MAX_OPEN_FILES,
    VERSION,
};
pub use crate::descriptor::{Fd, FileDescriptor, Mode};
pub use crate::dir::{DirEntry, Entries, OpenFile};
pub use crate::error::{CodecError, EefsError, Result, Status};
pub use crate::fs::{format, Attributes, Eefs, OpenFlags, Stat, Whence};
pub use crate::fuse::EefsFuse;
pub use crate::medium::{FileMedium, MemoryMedium, Medium};
pub use crate::text::{AsciiCaseInsensitive, CodepointOrder, Collator, TextCodec, Utf8};
