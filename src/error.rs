// src/error.rs
use thiserror::Error;

/// Expected filesystem outcomes, returned to the caller as values.
///
/// Success is `Ok(..)`; every other code of the on-disk API has a variant
/// here with the same numeric value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
#[repr(i32)]
pub enum Status {
    #[error("error")]
    Error = -1,
    #[error("invalid argument")]
    InvalidArgument = -2,
    #[error("unsupported option")]
    UnsupportedOption = -3,
    #[error("permission denied")]
    PermissionDenied = -4,
    #[error("file not found")]
    FileNotFound = -5,
    #[error("no free file descriptor")]
    NoFreeFileDescriptor = -6,
    #[error("no space left on device")]
    NoSpaceLeftOnDevice = -7,
    #[error("no such device")]
    NoSuchDevice = -8,
    #[error("device is busy")]
    DeviceIsBusy = -9,
    #[error("read-only file system")]
    ReadOnlyFileSystem = -10,
}

impl Status {
    pub const SUCCESS: i32 = 0;

    pub fn code(self) -> i32 {
        self as i32
    }

    pub fn from_code(code: i32) -> Option<Self> {
        let status = match code {
            -1 => Status::Error,
            -2 => Status::InvalidArgument,
            -3 => Status::UnsupportedOption,
            -4 => Status::PermissionDenied,
            -5 => Status::FileNotFound,
            -6 => Status::NoFreeFileDescriptor,
            -7 => Status::NoSpaceLeftOnDevice,
            -8 => Status::NoSuchDevice,
            -9 => Status::DeviceIsBusy,
            -10 => Status::ReadOnlyFileSystem,
            _ => return None,
        };
        Some(status)
    }

    pub fn as_errno(self) -> i32 {
        match self {
            Status::Error => libc::EIO,
            Status::InvalidArgument => libc::EINVAL,
            Status::UnsupportedOption => libc::EOPNOTSUPP,
            Status::PermissionDenied => libc::EACCES,
            Status::FileNotFound => libc::ENOENT,
            Status::NoFreeFileDescriptor => libc::EMFILE,
            Status::NoSpaceLeftOnDevice => libc::ENOSPC,
            Status::NoSuchDevice => libc::ENODEV,
            Status::DeviceIsBusy => libc::EBUSY,
            Status::ReadOnlyFileSystem => libc::EROFS,
        }
    }
}

/// The medium or the caller broke a precondition of the byte layout.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("short read decoding {record}: need {needed} bytes, got {actual}")]
    ShortRead {
        record: &'static str,
        needed: usize,
        actual: usize,
    },
    #[error("malformed filename bytes: {0}")]
    TextDecode(String),
}

#[derive(Debug, Error)]
pub enum EefsError {
    #[error(transparent)]
    Status(#[from] Status),
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error("medium I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl EefsError {
    /// The status code, when this is an ordinary filesystem outcome.
    pub fn status(&self) -> Option<Status> {
        match self {
            EefsError::Status(status) => Some(*status),
            _ => None,
        }
    }

    pub fn as_errno(&self) -> i32 {
        match self {
            EefsError::Status(status) => status.as_errno(),
            EefsError::Codec(_) | EefsError::Io(_) => libc::EIO,
        }
    }
}

pub type Result<T> = std::result::Result<T, EefsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_match_the_wire_values() {
        assert_eq!(Status::InvalidArgument.code(), -2);
        assert_eq!(Status::ReadOnlyFileSystem.code(), -10);
        for code in -10..=-1 {
            let status = Status::from_code(code).unwrap();
            assert_eq!(status.code(), code);
        }
        assert_eq!(Status::from_code(Status::SUCCESS), None);
        assert_eq!(Status::from_code(-11), None);
    }

    #[test]
    fn errno_mapping() {
        assert_eq!(Status::FileNotFound.as_errno(), libc::ENOENT);
        assert_eq!(Status::DeviceIsBusy.as_errno(), libc::EBUSY);

        let err = EefsError::from(Status::PermissionDenied);
        assert_eq!(err.status(), Some(Status::PermissionDenied));
        assert_eq!(err.as_errno(), libc::EACCES);

        let err = EefsError::from(CodecError::TextDecode("bad".into()));
        assert_eq!(err.status(), None);
        assert_eq!(err.as_errno(), libc::EIO);
    }
}
