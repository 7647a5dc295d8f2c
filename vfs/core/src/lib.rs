//! Shared building blocks for the SDMC filesystem adapter: path
//! normalization, UTF-16 transcoding, service result translation and the
//! storage service interface.

pub mod error;
pub mod flags;
pub mod path;
pub mod result;
pub mod service;
pub mod translate;
pub mod types;
pub mod wide;

pub use error::{SdmcError, SdmcErrorKind, SdmcResult};
pub use flags::{EntryAttributes, OpenFlags, SeekWhence, ServiceOpenFlags, WriteFlags};
pub use path::{
    NormalizedPath, NormalizedPathBuf, PATH_MAX, PathScratch, ResolvedPath, WirePath,
    WirePathBuf, with_scratch,
};
pub use result::ResultCode;
pub use service::{
    ArchiveHandle, ArchiveId, ArchiveResource, ENTRY_NAME_UNITS, FsService, RawHandle,
    ServiceDirEntry, ServiceResult,
};
pub use translate::{translate, translate_kind};
pub use types::{FileMode, Stat, StatVfs, StatVfsFlags};
pub use wide::{NAME_MAX, decode_entry_name, utf16_to_utf8, utf8_to_utf16};
