#![allow(dead_code)]

use std::sync::Arc;

use parking_lot::Mutex;
use sdmc_core::{
    ArchiveHandle, ArchiveId, ArchiveResource, EntryAttributes, FsService, RawHandle, ResultCode,
    ServiceDirEntry, ServiceOpenFlags, ServiceResult, WirePath, WriteFlags,
};
use sdmc_fs::{DeviceHost, DeviceId, SdmcConfig, SdmcDevice};
use sdmc_mem::{MemConfig, MemService};

/// Device table stand-in: names map to ids, `name:` prefixes route paths.
#[derive(Default)]
pub struct TestHost {
    pub devices: Mutex<Vec<String>>,
    pub default_device: Mutex<Option<DeviceId>>,
    pub launch: Mutex<Option<Vec<u8>>>,
}

impl TestHost {
    pub fn with_launch_path(path: &str) -> Self {
        let host = Self::default();
        *host.launch.lock() = Some(path.as_bytes().to_vec());
        host
    }

    pub fn registered(&self) -> Vec<String> {
        self.devices.lock().clone()
    }
}

impl DeviceHost for TestHost {
    fn add_device(&self, name: &str) -> Option<DeviceId> {
        let mut devices = self.devices.lock();
        if let Some(index) = devices.iter().position(|d| d == name) {
            return Some(DeviceId(index as i32));
        }
        devices.push(name.to_owned());
        Some(DeviceId(devices.len() as i32 - 1))
    }

    fn set_default_device(&self, device: DeviceId) {
        *self.default_device.lock() = Some(device);
    }

    fn find_device(&self, path: &[u8]) -> Option<DeviceId> {
        let Some(colon) = path.iter().position(|&b| b == b':') else {
            return *self.default_device.lock();
        };
        let name = std::str::from_utf8(&path[..colon]).ok()?;
        let devices = self.devices.lock();
        devices
            .iter()
            .position(|d| d == name)
            .map(|index| DeviceId(index as i32))
    }

    fn remove_device(&self, name: &str) {
        self.devices.lock().retain(|d| d != name);
    }

    fn launch_path(&self) -> Option<Vec<u8>> {
        self.launch.lock().clone()
    }
}

pub struct Fixture {
    pub mem: Arc<MemService>,
    pub host: Arc<TestHost>,
    pub device: SdmcDevice,
}

pub fn fixture_with(mem: MemConfig, config: SdmcConfig, host: TestHost) -> Fixture {
    let mem = Arc::new(MemService::new(mem));
    let host = Arc::new(host);
    let device = SdmcDevice::builder(mem.clone(), host.clone())
        .with_config(config)
        .build()
        .expect("valid config");
    device.init().expect("init");
    Fixture { mem, host, device }
}

pub fn fixture() -> Fixture {
    fixture_with(
        MemConfig::default(),
        SdmcConfig::default(),
        TestHost::default(),
    )
}

/// Small volume: 20 clusters of 512 bytes.
pub fn small_volume() -> MemConfig {
    MemConfig {
        cluster_size: 512,
        total_clusters: 20,
        ..MemConfig::default()
    }
}

/// Wraps a [`MemService`] and injects failures or odd replies.
pub struct FaultyService {
    pub inner: Arc<MemService>,
    /// Fail every write once this many writes have succeeded.
    pub writes_before_failure: Mutex<Option<usize>>,
    pub fail_set_size: Mutex<Option<ResultCode>>,
    pub fail_close: Mutex<Option<ResultCode>>,
    pub fail_writable_query: Mutex<bool>,
    /// Replace every directory entry name with these UTF-16 units.
    pub entry_name_override: Mutex<Option<Vec<u16>>>,
}

impl FaultyService {
    pub fn new(inner: Arc<MemService>) -> Self {
        Self {
            inner,
            writes_before_failure: Mutex::new(None),
            fail_set_size: Mutex::new(None),
            fail_close: Mutex::new(None),
            fail_writable_query: Mutex::new(false),
            entry_name_override: Mutex::new(None),
        }
    }
}

impl FsService for FaultyService {
    fn open_archive(&self, id: ArchiveId) -> ServiceResult<ArchiveHandle> {
        self.inner.open_archive(id)
    }

    fn close_archive(&self, archive: ArchiveHandle) -> ServiceResult<()> {
        self.inner.close_archive(archive)
    }

    fn open_file(
        &self,
        archive: ArchiveHandle,
        path: WirePath<'_>,
        flags: ServiceOpenFlags,
        attributes: EntryAttributes,
    ) -> ServiceResult<RawHandle> {
        self.inner.open_file(archive, path, flags, attributes)
    }

    fn create_file(
        &self,
        archive: ArchiveHandle,
        path: WirePath<'_>,
        attributes: EntryAttributes,
        size: u64,
    ) -> ServiceResult<()> {
        self.inner.create_file(archive, path, attributes, size)
    }

    fn delete_file(&self, archive: ArchiveHandle, path: WirePath<'_>) -> ServiceResult<()> {
        self.inner.delete_file(archive, path)
    }

    fn rename_file(
        &self,
        archive: ArchiveHandle,
        from: WirePath<'_>,
        to: WirePath<'_>,
    ) -> ServiceResult<()> {
        self.inner.rename_file(archive, from, to)
    }

    fn open_directory(
        &self,
        archive: ArchiveHandle,
        path: WirePath<'_>,
    ) -> ServiceResult<RawHandle> {
        self.inner.open_directory(archive, path)
    }

    fn create_directory(
        &self,
        archive: ArchiveHandle,
        path: WirePath<'_>,
        attributes: EntryAttributes,
    ) -> ServiceResult<()> {
        self.inner.create_directory(archive, path, attributes)
    }

    fn delete_directory(&self, archive: ArchiveHandle, path: WirePath<'_>) -> ServiceResult<()> {
        self.inner.delete_directory(archive, path)
    }

    fn rename_directory(
        &self,
        archive: ArchiveHandle,
        from: WirePath<'_>,
        to: WirePath<'_>,
    ) -> ServiceResult<()> {
        self.inner.rename_directory(archive, from, to)
    }

    fn file_read(&self, file: RawHandle, offset: u64, buf: &mut [u8]) -> ServiceResult<usize> {
        self.inner.file_read(file, offset, buf)
    }

    fn file_write(
        &self,
        file: RawHandle,
        offset: u64,
        buf: &[u8],
        flags: WriteFlags,
    ) -> ServiceResult<usize> {
        let mut remaining = self.writes_before_failure.lock();
        match remaining.as_mut() {
            Some(0) => return Err(ResultCode::new(0xC8A04555)),
            Some(count) => *count -= 1,
            None => {}
        }
        drop(remaining);
        self.inner.file_write(file, offset, buf, flags)
    }

    fn file_size(&self, file: RawHandle) -> ServiceResult<u64> {
        self.inner.file_size(file)
    }

    fn file_set_size(&self, file: RawHandle, size: u64) -> ServiceResult<()> {
        if let Some(code) = *self.fail_set_size.lock() {
            return Err(code);
        }
        self.inner.file_set_size(file, size)
    }

    fn file_flush(&self, file: RawHandle) -> ServiceResult<()> {
        self.inner.file_flush(file)
    }

    fn file_close(&self, file: RawHandle) -> ServiceResult<()> {
        let result = self.inner.file_close(file);
        match *self.fail_close.lock() {
            Some(code) => Err(code),
            None => result,
        }
    }

    fn dir_read(&self, dir: RawHandle, entries: &mut [ServiceDirEntry]) -> ServiceResult<usize> {
        let count = self.inner.dir_read(dir, entries)?;
        if let Some(name) = self.entry_name_override.lock().as_ref() {
            for entry in &mut entries[..count] {
                entry.name.fill(0);
                entry.name[..name.len()].copy_from_slice(name);
            }
        }
        Ok(count)
    }

    fn dir_close(&self, dir: RawHandle) -> ServiceResult<()> {
        self.inner.dir_close(dir)
    }

    fn archive_resource(&self) -> ServiceResult<ArchiveResource> {
        self.inner.archive_resource()
    }

    fn is_writable(&self) -> ServiceResult<bool> {
        if *self.fail_writable_query.lock() {
            return Err(ResultCode::new(0xC8A04555));
        }
        self.inner.is_writable()
    }

    fn timestamp(&self, archive: ArchiveHandle, path: WirePath<'_>) -> ServiceResult<u64> {
        self.inner.timestamp(archive, path)
    }
}

pub struct FaultyFixture {
    pub mem: Arc<MemService>,
    pub faults: Arc<FaultyService>,
    pub device: SdmcDevice,
}

pub fn faulty_fixture(mem: MemConfig, config: SdmcConfig) -> FaultyFixture {
    let mem = Arc::new(MemService::new(mem));
    let faults = Arc::new(FaultyService::new(mem.clone()));
    let device = SdmcDevice::builder(faults.clone(), Arc::new(TestHost::default()))
        .with_config(config)
        .build()
        .expect("valid config");
    device.init().expect("init");
    FaultyFixture {
        mem,
        faults,
        device,
    }
}
