//! Adapter error kinds and their POSIX errno projection.
//!
//! `SdmcError::errno` is the single place that maps error kinds to errno
//! values. Callers must not duplicate this mapping elsewhere.

use crate::result::ResultCode;

pub type SdmcResult<T> = Result<T, SdmcError>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, thiserror::Error)]
pub enum SdmcErrorKind {
    #[error("invalid argument")]
    InvalidArgument,
    #[error("invalid path")]
    InvalidPath,
    #[error("bad file descriptor")]
    BadFileDescriptor,
    #[error("entry already exists")]
    AlreadyExists,
    #[error("entry not found")]
    NotFound,
    #[error("no space left on device")]
    NoSpace,
    #[error("name too long")]
    NameTooLong,
    #[error("illegal byte sequence")]
    EncodingError,
    #[error("operation not supported")]
    NotSupported,
    #[error("no more directory entries")]
    NoMoreEntries,
    #[error("device not initialized")]
    NoDevice,
    /// A service failure with no POSIX counterpart.
    #[error("service error {0}")]
    Service(ResultCode),
}

impl SdmcErrorKind {
    pub fn errno(self) -> i32 {
        match self {
            SdmcErrorKind::InvalidArgument => libc::EINVAL,
            SdmcErrorKind::InvalidPath => libc::EINVAL,
            SdmcErrorKind::BadFileDescriptor => libc::EBADF,
            SdmcErrorKind::AlreadyExists => libc::EEXIST,
            SdmcErrorKind::NotFound => libc::ENOENT,
            SdmcErrorKind::NoSpace => libc::ENOSPC,
            SdmcErrorKind::NameTooLong => libc::ENAMETOOLONG,
            SdmcErrorKind::EncodingError => libc::EILSEQ,
            SdmcErrorKind::NotSupported => libc::ENOSYS,
            // End of directory is reported as ENOENT by newlib-style readers.
            SdmcErrorKind::NoMoreEntries => libc::ENOENT,
            SdmcErrorKind::NoDevice => libc::ENODEV,
            SdmcErrorKind::Service(code) => code.raw() as i32,
        }
    }
}

/// An error kind tagged with the operation that produced it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
#[error("{context}: {kind}")]
pub struct SdmcError {
    kind: SdmcErrorKind,
    context: &'static str,
}

impl SdmcError {
    pub fn new(kind: SdmcErrorKind, context: &'static str) -> Self {
        Self { kind, context }
    }

    pub fn kind(&self) -> SdmcErrorKind {
        self.kind
    }

    pub fn context(&self) -> &'static str {
        self.context
    }

    pub fn errno(&self) -> i32 {
        self.kind.errno()
    }
}
