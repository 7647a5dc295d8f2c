use std::sync::Arc;

use sdmc_core::{
    ArchiveHandle, FileMode, FsService, SdmcError, SdmcErrorKind, SdmcResult, ServiceDirEntry,
    Stat, WirePath, decode_entry_name,
};

use crate::handle::{HandleKind, RemoteHandle};
use crate::service_result;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub stat: Stat,
}

/// An open directory listing, fetched from the service in batches.
#[derive(Debug)]
pub struct DirSession {
    handle: RemoteHandle,
    batch: Vec<ServiceDirEntry>,
    /// Position of the last entry handed out; -1 before the first.
    index: isize,
    size: usize,
}

impl DirSession {
    pub fn open(
        service: &Arc<dyn FsService>,
        archive: ArchiveHandle,
        path: WirePath<'_>,
        batch_size: usize,
    ) -> SdmcResult<Self> {
        let raw = service_result("dir.open", service.open_directory(archive, path))?;
        Ok(Self {
            handle: RemoteHandle::new(service.clone(), raw, HandleKind::Directory),
            batch: vec![ServiceDirEntry::default(); batch_size.max(1)],
            index: -1,
            size: 0,
        })
    }

    /// Return the next entry, refilling the batch when it runs out.
    ///
    /// `NoMoreEntries` marks the end of the listing.
    pub fn next_entry(&mut self) -> SdmcResult<DirEntry> {
        self.index += 1;
        if self.index < 0 || self.index as usize >= self.size {
            self.refill()?;
        }

        let entry = &self.batch[self.index as usize];
        let mode = if entry.is_directory() {
            FileMode::IFDIR
        } else {
            FileMode::IFREG
        };
        Ok(DirEntry {
            name: decode_entry_name(&entry.name)?,
            stat: Stat {
                ino: 0,
                mode,
                nlink: 0,
                size: 0,
            },
        })
    }

    fn refill(&mut self) -> SdmcResult<()> {
        self.index = -1;
        self.size = 0;
        self.batch.fill(ServiceDirEntry::default());

        let count = service_result(
            "dir.next",
            self.handle
                .service()
                .dir_read(self.handle.raw(), &mut self.batch),
        )?;
        if count == 0 {
            return Err(SdmcError::new(SdmcErrorKind::NoMoreEntries, "dir.next"));
        }
        self.index = 0;
        self.size = count.min(self.batch.len());
        Ok(())
    }

    /// Rewinding a listing is not supported by the service.
    pub fn reset(&mut self) -> SdmcResult<()> {
        Err(SdmcError::new(SdmcErrorKind::NotSupported, "dir.reset"))
    }

    pub fn close(self) -> SdmcResult<()> {
        self.handle.close()
    }
}

impl Iterator for DirSession {
    type Item = SdmcResult<DirEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.next_entry() {
            Err(err) if err.kind() == SdmcErrorKind::NoMoreEntries => None,
            other => Some(other),
        }
    }
}
