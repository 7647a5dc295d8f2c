//! The adapter facade: resolves caller paths, owns the archive handle and
//! the current directory, and dispatches to the session managers.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::{Mutex, RwLock};
use sdmc_core::{
    ArchiveHandle, EntryAttributes, FileMode, FsService, NormalizedPathBuf, OpenFlags, PATH_MAX,
    PathScratch, ResolvedPath, SdmcError, SdmcErrorKind, SdmcResult, Stat, StatVfs, WirePath,
    with_scratch,
};
use tracing::{debug, trace, warn};

use crate::config::{SdmcConfig, WriteMode};
use crate::dir::DirSession;
use crate::file::FileSession;
use crate::host::{DeviceHost, DeviceId};
use crate::service_result;

/// Seconds between 1970-01-01 and 2000-01-01, the service's epoch.
const SERVICE_EPOCH_OFFSET: u64 = 946_684_800;

pub struct SdmcDeviceBuilder {
    service: Arc<dyn FsService>,
    host: Arc<dyn DeviceHost>,
    config: SdmcConfig,
}

impl SdmcDeviceBuilder {
    pub fn new(service: Arc<dyn FsService>, host: Arc<dyn DeviceHost>) -> Self {
        Self {
            service,
            host,
            config: SdmcConfig::default(),
        }
    }

    pub fn with_config(mut self, config: SdmcConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> SdmcResult<SdmcDevice> {
        SdmcDevice::new(self.service, self.host, self.config)
    }
}

pub struct SdmcDevice {
    service: Arc<dyn FsService>,
    host: Arc<dyn DeviceHost>,
    config: SdmcConfig,
    /// Held across all of init and exit so registration stays in step with
    /// the archive.
    lifecycle: Mutex<()>,
    archive: Mutex<Option<ArchiveHandle>>,
    cwd: RwLock<NormalizedPathBuf>,
    write_safe: AtomicBool,
}

impl SdmcDevice {
    pub fn new(
        service: Arc<dyn FsService>,
        host: Arc<dyn DeviceHost>,
        config: SdmcConfig,
    ) -> SdmcResult<Self> {
        config.validate()?;
        let write_safe = config.write_mode == WriteMode::Safe;
        Ok(Self {
            service,
            host,
            config,
            lifecycle: Mutex::new(()),
            archive: Mutex::new(None),
            cwd: RwLock::new(NormalizedPathBuf::root()),
            write_safe: AtomicBool::new(write_safe),
        })
    }

    pub fn builder(service: Arc<dyn FsService>, host: Arc<dyn DeviceHost>) -> SdmcDeviceBuilder {
        SdmcDeviceBuilder::new(service, host)
    }

    pub fn config(&self) -> &SdmcConfig {
        &self.config
    }

    /// Open the archive and register the device. Calling it again while
    /// initialized does nothing.
    pub fn init(&self) -> SdmcResult<()> {
        let _lifecycle = self.lifecycle.lock();
        let mut archive = self.archive.lock();
        if archive.is_some() {
            return Ok(());
        }
        let handle = service_result(
            "sdmc.init.open_archive",
            self.service.open_archive(self.config.archive),
        )?;
        *archive = Some(handle);
        drop(archive);

        match self.host.add_device(&self.config.device_name) {
            Some(device) => {
                self.host.set_default_device(device);
                self.enter_launch_directory(device);
            }
            None => warn!(name = %self.config.device_name, "device registration refused"),
        }
        debug!(name = %self.config.device_name, ?handle, "sdmc device initialized");
        Ok(())
    }

    /// Close the archive and unregister the device. Calling it while not
    /// initialized does nothing.
    pub fn exit(&self) -> SdmcResult<()> {
        let _lifecycle = self.lifecycle.lock();
        let mut archive = self.archive.lock();
        let Some(handle) = *archive else {
            return Ok(());
        };
        service_result("sdmc.exit.close_archive", self.service.close_archive(handle))?;
        *archive = None;
        drop(archive);

        self.host.remove_device(&self.config.device_name);
        debug!(name = %self.config.device_name, "sdmc device shut down");
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.archive.lock().is_some()
    }

    /// Choose between staged (safe) and single-request (direct) writes for
    /// every file on this device.
    pub fn set_write_safe(&self, safe: bool) {
        self.write_safe.store(safe, Ordering::Release);
    }

    pub fn write_mode(&self) -> WriteMode {
        if self.write_safe.load(Ordering::Acquire) {
            WriteMode::Safe
        } else {
            WriteMode::Direct
        }
    }

    pub fn cwd(&self) -> NormalizedPathBuf {
        self.cwd.read().clone()
    }

    pub fn open(&self, path: &[u8], flags: i32) -> SdmcResult<FileSession> {
        self.with_path(path, |archive, resolved| {
            trace!(path = %resolved.path, flags, "sdmc.open");
            let flags = OpenFlags::from_posix(flags)?;
            FileSession::open(&self.service, archive, resolved.wire, flags)
        })
    }

    pub fn write(&self, file: &mut FileSession, buf: &[u8]) -> SdmcResult<usize> {
        file.write(buf, self.write_mode(), self.config.staging_size)
    }

    pub fn stat(&self, path: &[u8]) -> SdmcResult<Stat> {
        self.with_path(path, |archive, resolved| {
            let opened = self.service.open_file(
                archive,
                resolved.wire,
                OpenFlags::READ.service_open_flags(),
                EntryAttributes::empty(),
            );
            if let Ok(raw) = opened {
                let file = FileSession::from_raw(&self.service, raw, OpenFlags::READ);
                return file.stat();
            }

            self.probe_directory(archive, resolved.wire, "sdmc.stat")?;
            Ok(Stat {
                ino: 0,
                mode: FileMode::directory(),
                nlink: 1,
                size: 0,
            })
        })
    }

    pub fn link(&self, _existing: &[u8], _new: &[u8]) -> SdmcResult<()> {
        Err(SdmcError::new(SdmcErrorKind::NotSupported, "sdmc.link"))
    }

    pub fn unlink(&self, path: &[u8]) -> SdmcResult<()> {
        self.with_path(path, |archive, resolved| {
            service_result(
                "sdmc.unlink",
                self.service.delete_file(archive, resolved.wire),
            )
        })
    }

    /// Change the current directory after checking that `path` opens as a
    /// directory.
    pub fn chdir(&self, path: &[u8]) -> SdmcResult<()> {
        self.with_path(path, |archive, resolved| {
            self.probe_directory(archive, resolved.wire, "sdmc.chdir")?;
            let cwd = resolved.path.to_path_buf().into_directory()?;
            debug!(cwd = %cwd, "sdmc.chdir");
            *self.cwd.write() = cwd;
            Ok(())
        })
    }

    /// Rename a file, or failing that a directory.
    pub fn rename(&self, old: &[u8], new: &[u8]) -> SdmcResult<()> {
        let archive = self.archive("sdmc.rename")?;
        with_scratch(|scratch| {
            let from = self.resolve(scratch, old)?.wire.to_path_buf();
            let to = self.resolve(scratch, new)?;
            trace!(from = ?from, to = %to.path, "sdmc.rename");

            if self
                .service
                .rename_file(archive, from.as_path(), to.wire)
                .is_ok()
            {
                return Ok(());
            }
            service_result(
                "sdmc.rename",
                self.service.rename_directory(archive, from.as_path(), to.wire),
            )
        })
    }

    /// Create a directory. `mode` is accepted for POSIX compatibility and
    /// ignored.
    pub fn mkdir(&self, path: &[u8], _mode: u32) -> SdmcResult<()> {
        self.with_path(path, |archive, resolved| {
            service_result(
                "sdmc.mkdir",
                self.service
                    .create_directory(archive, resolved.wire, EntryAttributes::empty()),
            )
        })
    }

    pub fn rmdir(&self, path: &[u8]) -> SdmcResult<()> {
        self.with_path(path, |archive, resolved| {
            service_result(
                "sdmc.rmdir",
                self.service.delete_directory(archive, resolved.wire),
            )
        })
    }

    pub fn diropen(&self, path: &[u8]) -> SdmcResult<DirSession> {
        self.with_path(path, |archive, resolved| {
            DirSession::open(
                &self.service,
                archive,
                resolved.wire,
                self.config.dir_batch_size,
            )
        })
    }

    /// Volume statistics. The path only selects the device.
    pub fn statvfs(&self, _path: &[u8]) -> SdmcResult<StatVfs> {
        self.archive("sdmc.statvfs")?;
        crate::volume::statvfs(&*self.service)
    }

    pub fn chmod(&self, _path: &[u8], _mode: u32) -> SdmcResult<()> {
        Err(SdmcError::new(SdmcErrorKind::NotSupported, "sdmc.chmod"))
    }

    pub fn fchmod(&self, _file: &FileSession, _mode: u32) -> SdmcResult<()> {
        Err(SdmcError::new(SdmcErrorKind::NotSupported, "sdmc.fchmod"))
    }

    /// Modification time of `path` in seconds since the Unix epoch.
    pub fn getmtime(&self, path: &[u8]) -> SdmcResult<u64> {
        self.with_path(path, |archive, resolved| {
            let ms = service_result(
                "sdmc.getmtime",
                self.service.timestamp(archive, resolved.wire),
            )?;
            Ok(ms / 1000 + SERVICE_EPOCH_OFFSET)
        })
    }

    fn archive(&self, context: &'static str) -> SdmcResult<ArchiveHandle> {
        (*self.archive.lock()).ok_or(SdmcError::new(SdmcErrorKind::NoDevice, context))
    }

    /// Check that `path` opens as a directory.
    fn probe_directory(
        &self,
        archive: ArchiveHandle,
        path: WirePath<'_>,
        context: &'static str,
    ) -> SdmcResult<()> {
        let raw = service_result(context, self.service.open_directory(archive, path))?;
        if let Err(code) = self.service.dir_close(raw) {
            warn!(%code, context, "failed to close probed directory");
        }
        Ok(())
    }

    /// Resolve `path` against the current directory into `scratch`.
    fn resolve<'s>(
        &self,
        scratch: &'s mut PathScratch,
        path: &[u8],
    ) -> SdmcResult<ResolvedPath<'s>> {
        let cwd = self.cwd.read();
        scratch.resolve(cwd.as_path(), path)
    }

    fn with_path<R>(
        &self,
        path: &[u8],
        f: impl FnOnce(ArchiveHandle, ResolvedPath<'_>) -> SdmcResult<R>,
    ) -> SdmcResult<R> {
        let archive = self.archive("sdmc.path")?;
        with_scratch(|scratch| {
            let resolved = self.resolve(scratch, path)?;
            f(archive, resolved)
        })
    }

    /// Change into the directory the program was launched from, when the
    /// launch path lives on this device.
    fn enter_launch_directory(&self, device: DeviceId) {
        let Some(launch) = self.host.launch_path() else {
            return;
        };
        if launch.len() > PATH_MAX || self.host.find_device(&launch) != Some(device) {
            return;
        }
        let launch = match launch.iter().position(|&b| b == 0) {
            Some(end) => &launch[..end],
            None => &launch[..],
        };
        let Ok(text) = std::str::from_utf8(launch) else {
            return;
        };
        let Some(slash) = text.rfind('/') else {
            return;
        };
        if let Err(err) = self.chdir(&launch[..slash]) {
            debug!(%err, "could not enter launch directory");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sdmc_mem::MemService;

    struct SingleDevice;

    impl DeviceHost for SingleDevice {
        fn add_device(&self, _name: &str) -> Option<DeviceId> {
            Some(DeviceId(3))
        }

        fn set_default_device(&self, _device: DeviceId) {}

        fn find_device(&self, _path: &[u8]) -> Option<DeviceId> {
            Some(DeviceId(3))
        }

        fn remove_device(&self, _name: &str) {}

        fn launch_path(&self) -> Option<Vec<u8>> {
            Some(b"sdmc:/missing/app.3dsx".to_vec())
        }
    }

    fn device() -> SdmcDevice {
        SdmcDevice::builder(Arc::new(MemService::default()), Arc::new(SingleDevice))
            .build()
            .unwrap()
    }

    #[test]
    #[tracing_test::traced_test]
    fn lifecycle_is_logged() {
        let device = device();
        device.init().unwrap();
        assert!(logs_contain("sdmc device initialized"));
        assert!(logs_contain("could not enter launch directory"));
        assert_eq!(device.cwd().as_str(), "/");

        device.exit().unwrap();
        assert!(logs_contain("sdmc device shut down"));
    }

    #[test]
    fn stat_releases_its_probe_handles() {
        let mem = Arc::new(MemService::default());
        mem.insert_file("/d/f", b"x").unwrap();
        let device = SdmcDevice::builder(mem.clone(), Arc::new(SingleDevice))
            .build()
            .unwrap();
        device.init().unwrap();

        device.stat(b"/d/f").unwrap();
        device.stat(b"/d").unwrap();
        device.stat(b"/nope").unwrap_err();
        assert_eq!(mem.stats().open_files, 0);
        assert_eq!(mem.stats().open_dirs, 0);
    }
}
