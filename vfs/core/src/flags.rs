//! POSIX open/seek flags and the service-side flag words they translate to.
//!
//! `OpenFlags::from_posix` is the only place that interprets `O_*` bits.

use bitflags::bitflags;

use crate::error::{SdmcError, SdmcErrorKind, SdmcResult};

bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct OpenFlags: u32 {
        const READ = 1 << 0;
        const WRITE = 1 << 1;
        const APPEND = 1 << 2;
        const SYNC = 1 << 3;
        const CREATE = 1 << 4;
        const EXCL = 1 << 5;
        const TRUNC = 1 << 6;
    }
}

impl OpenFlags {
    /// Flags a file session keeps after open.
    pub const SESSION: OpenFlags = OpenFlags::READ
        .union(OpenFlags::WRITE)
        .union(OpenFlags::APPEND)
        .union(OpenFlags::SYNC);

    /// Translate `open(2)` flags, validating the access mode.
    pub fn from_posix(flags: i32) -> SdmcResult<Self> {
        let mut out = match flags & libc::O_ACCMODE {
            libc::O_RDONLY => OpenFlags::READ,
            libc::O_WRONLY => OpenFlags::WRITE,
            libc::O_RDWR => OpenFlags::READ | OpenFlags::WRITE,
            _ => return Err(SdmcError::new(SdmcErrorKind::InvalidArgument, "open.flags")),
        };

        if flags & libc::O_APPEND != 0 {
            if out == OpenFlags::READ {
                return Err(SdmcError::new(SdmcErrorKind::InvalidArgument, "open.flags"));
            }
            out |= OpenFlags::APPEND;
        }
        if flags & libc::O_SYNC == libc::O_SYNC {
            out |= OpenFlags::SYNC;
        }
        if flags & libc::O_CREAT != 0 {
            out |= OpenFlags::CREATE;
        }
        if flags & libc::O_EXCL != 0 {
            out |= OpenFlags::EXCL;
        }
        if flags & libc::O_TRUNC != 0 {
            out |= OpenFlags::TRUNC;
        }
        Ok(out)
    }

    pub fn is_read_only(self) -> bool {
        !self.contains(OpenFlags::WRITE)
    }

    pub fn is_write_only(self) -> bool {
        !self.contains(OpenFlags::READ)
    }

    pub fn service_open_flags(self) -> ServiceOpenFlags {
        let mut out = ServiceOpenFlags::empty();
        if self.contains(OpenFlags::READ) {
            out |= ServiceOpenFlags::READ;
        }
        if self.contains(OpenFlags::WRITE) {
            out |= ServiceOpenFlags::WRITE;
        }
        if self.contains(OpenFlags::CREATE) {
            out |= ServiceOpenFlags::CREATE;
        }
        out
    }

    pub fn write_flags(self) -> WriteFlags {
        if self.contains(OpenFlags::SYNC) {
            WriteFlags::FLUSH | WriteFlags::UPDATE_TIME
        } else {
            WriteFlags::empty()
        }
    }
}

bitflags! {
    /// Open mode word understood by the storage service.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct ServiceOpenFlags: u32 {
        const READ = 1 << 0;
        const WRITE = 1 << 1;
        const CREATE = 1 << 2;
    }
}

bitflags! {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct WriteFlags: u32 {
        const FLUSH = 1 << 0;
        const UPDATE_TIME = 1 << 8;
    }
}

bitflags! {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct EntryAttributes: u32 {
        const DIRECTORY = 1 << 0;
        const HIDDEN = 1 << 8;
        const ARCHIVE = 1 << 16;
        const READ_ONLY = 1 << 24;
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SeekWhence {
    Set,
    Current,
    End,
}

impl SeekWhence {
    pub fn from_posix(whence: i32) -> SdmcResult<Self> {
        match whence {
            libc::SEEK_SET => Ok(SeekWhence::Set),
            libc::SEEK_CUR => Ok(SeekWhence::Current),
            libc::SEEK_END => Ok(SeekWhence::End),
            _ => Err(SdmcError::new(SdmcErrorKind::InvalidArgument, "seek.whence")),
        }
    }
}
