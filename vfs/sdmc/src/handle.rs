use std::fmt;
use std::sync::Arc;

use sdmc_core::{FsService, RawHandle, SdmcResult};
use tracing::{trace, warn};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum HandleKind {
    File,
    Directory,
}

/// Owns one open remote handle and releases it exactly once, either through
/// [`RemoteHandle::close`] or on drop.
pub(crate) struct RemoteHandle {
    service: Arc<dyn FsService>,
    raw: RawHandle,
    kind: HandleKind,
    open: bool,
}

impl RemoteHandle {
    pub(crate) fn new(service: Arc<dyn FsService>, raw: RawHandle, kind: HandleKind) -> Self {
        trace!(?raw, ?kind, "sdmc.handle.open");
        Self {
            service,
            raw,
            kind,
            open: true,
        }
    }

    pub(crate) fn raw(&self) -> RawHandle {
        self.raw
    }

    pub(crate) fn service(&self) -> &dyn FsService {
        &*self.service
    }

    pub(crate) fn close(mut self) -> SdmcResult<()> {
        self.open = false;
        self.release()
    }

    fn release(&self) -> SdmcResult<()> {
        trace!(raw = ?self.raw, kind = ?self.kind, "sdmc.handle.close");
        match self.kind {
            HandleKind::File => {
                crate::service_result("file.close", self.service.file_close(self.raw))
            }
            HandleKind::Directory => {
                crate::service_result("dir.close", self.service.dir_close(self.raw))
            }
        }
    }
}

impl Drop for RemoteHandle {
    fn drop(&mut self) {
        if self.open {
            if let Err(err) = self.release() {
                warn!(raw = ?self.raw, kind = ?self.kind, %err, "failed to close remote handle");
            }
        }
    }
}

impl fmt::Debug for RemoteHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteHandle")
            .field("raw", &self.raw)
            .field("kind", &self.kind)
            .finish()
    }
}
