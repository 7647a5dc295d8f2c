//! The storage service collaborator.
//!
//! Every request is a blocking round trip to the service and reports failure
//! as a raw [`ResultCode`]; translation to [`SdmcError`](crate::SdmcError)
//! happens at the call site.

use crate::flags::{EntryAttributes, ServiceOpenFlags, WriteFlags};
use crate::path::WirePath;
use crate::result::ResultCode;

pub type ServiceResult<T> = Result<T, ResultCode>;

/// Handle to an open remote file or directory.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RawHandle(pub u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ArchiveHandle(pub u64);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ArchiveId(pub u32);

impl ArchiveId {
    pub const SDMC: ArchiveId = ArchiveId(9);
}

/// Capacity of the name field of a service directory entry, in UTF-16 units.
pub const ENTRY_NAME_UNITS: usize = 0x106;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServiceDirEntry {
    /// NUL-padded UTF-16 name.
    pub name: [u16; ENTRY_NAME_UNITS],
    pub attributes: EntryAttributes,
    pub file_size: u64,
}

impl ServiceDirEntry {
    pub fn is_directory(&self) -> bool {
        self.attributes.contains(EntryAttributes::DIRECTORY)
    }
}

impl Default for ServiceDirEntry {
    fn default() -> Self {
        Self {
            name: [0; ENTRY_NAME_UNITS],
            attributes: EntryAttributes::empty(),
            file_size: 0,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ArchiveResource {
    pub sector_size: u32,
    pub cluster_size: u32,
    pub total_clusters: u32,
    pub free_clusters: u32,
}

pub trait FsService: Send + Sync + 'static {
    fn open_archive(&self, id: ArchiveId) -> ServiceResult<ArchiveHandle>;
    fn close_archive(&self, archive: ArchiveHandle) -> ServiceResult<()>;

    fn open_file(
        &self,
        archive: ArchiveHandle,
        path: WirePath<'_>,
        flags: ServiceOpenFlags,
        attributes: EntryAttributes,
    ) -> ServiceResult<RawHandle>;
    fn create_file(
        &self,
        archive: ArchiveHandle,
        path: WirePath<'_>,
        attributes: EntryAttributes,
        size: u64,
    ) -> ServiceResult<()>;
    fn delete_file(&self, archive: ArchiveHandle, path: WirePath<'_>) -> ServiceResult<()>;
    fn rename_file(
        &self,
        archive: ArchiveHandle,
        from: WirePath<'_>,
        to: WirePath<'_>,
    ) -> ServiceResult<()>;

    fn open_directory(&self, archive: ArchiveHandle, path: WirePath<'_>)
    -> ServiceResult<RawHandle>;
    fn create_directory(
        &self,
        archive: ArchiveHandle,
        path: WirePath<'_>,
        attributes: EntryAttributes,
    ) -> ServiceResult<()>;
    fn delete_directory(&self, archive: ArchiveHandle, path: WirePath<'_>) -> ServiceResult<()>;
    fn rename_directory(
        &self,
        archive: ArchiveHandle,
        from: WirePath<'_>,
        to: WirePath<'_>,
    ) -> ServiceResult<()>;

    fn file_read(&self, file: RawHandle, offset: u64, buf: &mut [u8]) -> ServiceResult<usize>;
    fn file_write(
        &self,
        file: RawHandle,
        offset: u64,
        buf: &[u8],
        flags: WriteFlags,
    ) -> ServiceResult<usize>;
    fn file_size(&self, file: RawHandle) -> ServiceResult<u64>;
    fn file_set_size(&self, file: RawHandle, size: u64) -> ServiceResult<()>;
    fn file_flush(&self, file: RawHandle) -> ServiceResult<()>;
    fn file_close(&self, file: RawHandle) -> ServiceResult<()>;

    /// Fill `entries` from the front and return how many were written.
    /// Zero means the listing is exhausted.
    fn dir_read(&self, dir: RawHandle, entries: &mut [ServiceDirEntry]) -> ServiceResult<usize>;
    fn dir_close(&self, dir: RawHandle) -> ServiceResult<()>;

    fn archive_resource(&self) -> ServiceResult<ArchiveResource>;
    fn is_writable(&self) -> ServiceResult<bool>;
    /// Last modification time in milliseconds since 2000-01-01.
    fn timestamp(&self, archive: ArchiveHandle, path: WirePath<'_>) -> ServiceResult<u64>;
}
