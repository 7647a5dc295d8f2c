//! File sessions: one open remote file plus the POSIX offset and mode bits
//! that the service does not track.

use std::cell::RefCell;
use std::sync::Arc;

use sdmc_core::{
    ArchiveHandle, EntryAttributes, FileMode, FsService, OpenFlags, RawHandle, SdmcError,
    SdmcErrorKind, SdmcResult, SeekWhence, Stat, WirePath, WriteFlags,
};
use tracing::debug;

use crate::config::WriteMode;
use crate::handle::{HandleKind, RemoteHandle};
use crate::service_result;

thread_local! {
    static STAGING: RefCell<Vec<u8>> = const { RefCell::new(Vec::new()) };
}

/// Run `f` with this thread's staging buffer, sized to `size` bytes.
fn with_staging<R>(size: usize, f: impl FnOnce(&mut [u8]) -> R) -> R {
    STAGING.with(|cell| match cell.try_borrow_mut() {
        Ok(mut staging) => {
            staging.resize(size, 0);
            f(&mut staging)
        }
        Err(_) => f(&mut vec![0; size]),
    })
}

#[derive(Debug)]
pub struct FileSession {
    handle: RemoteHandle,
    flags: OpenFlags,
    offset: u64,
}

impl FileSession {
    pub fn open(
        service: &Arc<dyn FsService>,
        archive: ArchiveHandle,
        path: WirePath<'_>,
        flags: OpenFlags,
    ) -> SdmcResult<Self> {
        if flags.contains(OpenFlags::CREATE | OpenFlags::EXCL) {
            service_result(
                "file.open.create",
                service.create_file(archive, path, EntryAttributes::empty(), 0),
            )?;
        }

        let raw = service_result(
            "file.open",
            service.open_file(
                archive,
                path,
                flags.service_open_flags(),
                EntryAttributes::empty(),
            ),
        )?;
        let handle = RemoteHandle::new(service.clone(), raw, HandleKind::File);

        if flags.contains(OpenFlags::TRUNC) && !flags.is_read_only() {
            // On failure `handle` is dropped here, which closes it.
            service_result("file.open.truncate", service.file_set_size(raw, 0))?;
        }

        Ok(Self {
            handle,
            flags: flags & OpenFlags::SESSION,
            offset: 0,
        })
    }

    /// Wrap a handle that is already open, starting at offset 0.
    pub(crate) fn from_raw(
        service: &Arc<dyn FsService>,
        raw: RawHandle,
        flags: OpenFlags,
    ) -> Self {
        Self {
            handle: RemoteHandle::new(service.clone(), raw, HandleKind::File),
            flags: flags & OpenFlags::SESSION,
            offset: 0,
        }
    }

    pub fn flags(&self) -> OpenFlags {
        self.flags
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn read(&mut self, buf: &mut [u8]) -> SdmcResult<usize> {
        if self.flags.is_write_only() {
            return Err(SdmcError::new(SdmcErrorKind::BadFileDescriptor, "file.read"));
        }
        let read = service_result(
            "file.read",
            self.handle
                .service()
                .file_read(self.handle.raw(), self.offset, buf),
        )?;
        self.offset += read as u64;
        Ok(read)
    }

    /// Write at the session offset, or at the remote end of file in append
    /// mode. Returns the number of bytes the service accepted.
    pub fn write(
        &mut self,
        buf: &[u8],
        mode: WriteMode,
        staging_size: usize,
    ) -> SdmcResult<usize> {
        if self.flags.is_read_only() {
            return Err(SdmcError::new(SdmcErrorKind::BadFileDescriptor, "file.write"));
        }
        let write_flags = self.flags.write_flags();

        if self.flags.contains(OpenFlags::APPEND) {
            self.offset = self.remote_size("file.write.append")?;
        }

        match mode {
            WriteMode::Direct => self.write_direct(buf, write_flags),
            WriteMode::Safe => self.write_staged(buf, write_flags, staging_size),
        }
    }

    fn write_direct(&mut self, buf: &[u8], flags: WriteFlags) -> SdmcResult<usize> {
        let written = service_result(
            "file.write",
            self.handle
                .service()
                .file_write(self.handle.raw(), self.offset, buf, flags),
        )?;
        self.offset += written as u64;
        Ok(written)
    }

    fn write_staged(
        &mut self,
        buf: &[u8],
        flags: WriteFlags,
        staging_size: usize,
    ) -> SdmcResult<usize> {
        with_staging(staging_size, |staging| {
            let mut written = 0;
            while written < buf.len() {
                let chunk = (buf.len() - written).min(staging.len());
                staging[..chunk].copy_from_slice(&buf[written..written + chunk]);

                let result = self.handle.service().file_write(
                    self.handle.raw(),
                    self.offset,
                    &staging[..chunk],
                    flags,
                );
                match result {
                    Ok(0) => break,
                    Ok(count) => {
                        let count = count.min(chunk);
                        self.offset += count as u64;
                        written += count;
                    }
                    Err(code) if written > 0 => {
                        debug!(%code, written, requested = buf.len(), "sdmc.file.write partial");
                        break;
                    }
                    Err(code) => return Err(sdmc_core::translate(code, "file.write")),
                }
            }
            Ok(written)
        })
    }

    /// Move the offset. Positions past end of file are allowed.
    pub fn seek(&mut self, pos: i64, whence: SeekWhence) -> SdmcResult<u64> {
        let base = match whence {
            SeekWhence::Set => 0,
            SeekWhence::Current => self.offset,
            SeekWhence::End => self.remote_size("file.seek")?,
        };

        let new = base
            .checked_add_signed(pos)
            .filter(|offset| i64::try_from(*offset).is_ok())
            .ok_or(SdmcError::new(SdmcErrorKind::InvalidArgument, "file.seek"))?;
        self.offset = new;
        Ok(new)
    }

    pub fn stat(&self) -> SdmcResult<Stat> {
        Ok(Stat {
            ino: 0,
            mode: FileMode::regular(),
            nlink: 1,
            size: self.remote_size("file.stat")?,
        })
    }

    pub fn truncate(&self, len: i64) -> SdmcResult<()> {
        let len = u64::try_from(len)
            .map_err(|_| SdmcError::new(SdmcErrorKind::InvalidArgument, "file.truncate"))?;
        service_result(
            "file.truncate",
            self.handle.service().file_set_size(self.handle.raw(), len),
        )
    }

    pub fn sync(&self) -> SdmcResult<()> {
        service_result(
            "file.sync",
            self.handle.service().file_flush(self.handle.raw()),
        )
    }

    pub fn close(self) -> SdmcResult<()> {
        self.handle.close()
    }

    fn remote_size(&self, context: &'static str) -> SdmcResult<u64> {
        service_result(context, self.handle.service().file_size(self.handle.raw()))
    }
}
