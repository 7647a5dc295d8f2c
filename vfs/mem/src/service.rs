use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use sdmc_core::{
    ArchiveHandle, ArchiveId, ArchiveResource, ENTRY_NAME_UNITS, EntryAttributes, FsService,
    RawHandle, ResultCode, ServiceDirEntry, ServiceOpenFlags, ServiceResult, WirePath, WriteFlags,
};
use tracing::trace;

use crate::config::MemConfig;
use crate::tree::{Listing, NodeId, NodeKind, Tree, canonical, parent_of};

/// Counters describing how the service has been used.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MemStats {
    pub open_files: usize,
    pub open_dirs: usize,
    pub open_archives: usize,
    pub dir_reads: usize,
    pub size_queries: usize,
    pub write_calls: usize,
    pub flushed_writes: usize,
}

struct OpenFile {
    node: NodeId,
    flags: ServiceOpenFlags,
}

struct OpenDir {
    entries: Vec<Listing>,
    cursor: usize,
}

struct State {
    tree: Tree,
    archives: HashSet<u64>,
    next_archive: u64,
    files: HashMap<u32, OpenFile>,
    dirs: HashMap<u32, OpenDir>,
    next_handle: u32,
    stats: MemStats,
}

impl State {
    fn check_archive(&self, archive: ArchiveHandle) -> ServiceResult<()> {
        if self.archives.contains(&archive.0) {
            Ok(())
        } else {
            Err(ResultCode::INVALID_HANDLE)
        }
    }

    fn allocate_handle(&mut self) -> u32 {
        let handle = self.next_handle;
        self.next_handle = self.next_handle.wrapping_add(1).max(1);
        handle
    }

    fn file(&self, file: RawHandle) -> ServiceResult<&OpenFile> {
        self.files.get(&file.0).ok_or(ResultCode::INVALID_HANDLE)
    }
}

pub struct MemService {
    config: MemConfig,
    clock_ms: AtomicU64,
    state: Mutex<State>,
}

impl MemService {
    pub fn new(config: MemConfig) -> Self {
        let clock_ms = config.clock_ms;
        Self {
            config,
            clock_ms: AtomicU64::new(clock_ms),
            state: Mutex::new(State {
                tree: Tree::new(clock_ms),
                archives: HashSet::new(),
                next_archive: 1,
                files: HashMap::new(),
                dirs: HashMap::new(),
                next_handle: 1,
                stats: MemStats::default(),
            }),
        }
    }

    pub fn config(&self) -> &MemConfig {
        &self.config
    }

    pub fn stats(&self) -> MemStats {
        let state = self.state.lock();
        MemStats {
            open_files: state.files.len(),
            open_dirs: state.dirs.len(),
            open_archives: state.archives.len(),
            ..state.stats
        }
    }

    /// Set the clock stamped on subsequent modifications.
    pub fn set_clock_ms(&self, ms: u64) {
        self.clock_ms.store(ms, Ordering::Release);
    }

    /// Create `path` and any missing ancestors as directories.
    pub fn insert_dir(&self, path: &str) -> ServiceResult<()> {
        let path = canonical(path)?;
        let now = self.now();
        let mut state = self.state.lock();
        let mut prefix = String::new();
        for component in path.split('/').filter(|c| !c.is_empty()) {
            prefix.push('/');
            prefix.push_str(component);
            if state.tree.lookup(&prefix).is_none() {
                state.tree.create(&prefix, NodeKind::Dir, now)?;
            }
        }
        Ok(())
    }

    /// Create or replace a file, creating missing ancestors.
    pub fn insert_file(&self, path: &str, data: &[u8]) -> ServiceResult<()> {
        let path = canonical(path)?;
        self.insert_dir(parent_of(&path))?;
        let now = self.now();
        let capacity = self.config.capacity();
        let mut state = self.state.lock();
        let node = match state.tree.lookup(&path) {
            Some(node) => node,
            None => state.tree.create(&path, NodeKind::File(Vec::new()), now)?,
        };
        state.tree.resize(node, 0, capacity, now)?;
        state.tree.write(node, 0, data, capacity, now)?;
        Ok(())
    }

    pub fn read_file(&self, path: &str) -> Option<Vec<u8>> {
        let path = canonical(path).ok()?;
        let state = self.state.lock();
        let node = state.tree.node(state.tree.lookup(&path)?)?;
        match &node.kind {
            NodeKind::File(data) => Some(data.clone()),
            NodeKind::Dir => None,
        }
    }

    pub fn is_dir(&self, path: &str) -> bool {
        let Ok(path) = canonical(path) else {
            return false;
        };
        let state = self.state.lock();
        state
            .tree
            .lookup(&path)
            .and_then(|id| state.tree.node(id))
            .is_some_and(|node| node.is_dir())
    }

    fn now(&self) -> u64 {
        self.clock_ms.load(Ordering::Acquire)
    }

    fn require_writable(&self) -> ServiceResult<()> {
        if self.config.writable {
            Ok(())
        } else {
            Err(ResultCode::WRITE_PROTECTED)
        }
    }
}

impl Default for MemService {
    fn default() -> Self {
        Self::new(MemConfig::default())
    }
}

impl FsService for MemService {
    fn open_archive(&self, id: ArchiveId) -> ServiceResult<ArchiveHandle> {
        if id != ArchiveId::SDMC {
            return Err(ResultCode::NOT_FOUND);
        }
        let mut state = self.state.lock();
        let handle = state.next_archive;
        state.next_archive += 1;
        state.archives.insert(handle);
        Ok(ArchiveHandle(handle))
    }

    fn close_archive(&self, archive: ArchiveHandle) -> ServiceResult<()> {
        let mut state = self.state.lock();
        if state.archives.remove(&archive.0) {
            Ok(())
        } else {
            Err(ResultCode::INVALID_HANDLE)
        }
    }

    fn open_file(
        &self,
        archive: ArchiveHandle,
        path: WirePath<'_>,
        flags: ServiceOpenFlags,
        _attributes: EntryAttributes,
    ) -> ServiceResult<RawHandle> {
        let path = canonical(&path.to_string_lossy())?;
        let now = self.now();
        let mut state = self.state.lock();
        state.check_archive(archive)?;

        let node = match state.tree.lookup(&path) {
            Some(node) => node,
            None if flags.contains(ServiceOpenFlags::CREATE) => {
                self.require_writable()?;
                state.tree.create(&path, NodeKind::File(Vec::new()), now)?
            }
            None => return Err(ResultCode::NOT_FOUND),
        };
        if state.tree.node(node).is_none_or(|node| node.is_dir()) {
            return Err(ResultCode::NOT_FOUND);
        }
        if flags.contains(ServiceOpenFlags::WRITE) {
            self.require_writable()?;
        }

        let handle = state.allocate_handle();
        state.files.insert(handle, OpenFile { node, flags });
        trace!(path = %path, handle, "mem.open_file");
        Ok(RawHandle(handle))
    }

    fn create_file(
        &self,
        archive: ArchiveHandle,
        path: WirePath<'_>,
        _attributes: EntryAttributes,
        size: u64,
    ) -> ServiceResult<()> {
        let path = canonical(&path.to_string_lossy())?;
        self.require_writable()?;
        let now = self.now();
        let capacity = self.config.capacity();
        let mut state = self.state.lock();
        state.check_archive(archive)?;
        let node = state.tree.create(&path, NodeKind::File(Vec::new()), now)?;
        if size > 0 {
            state.tree.resize(node, size, capacity, now)?;
        }
        Ok(())
    }

    fn delete_file(&self, archive: ArchiveHandle, path: WirePath<'_>) -> ServiceResult<()> {
        let path = canonical(&path.to_string_lossy())?;
        self.require_writable()?;
        let mut state = self.state.lock();
        state.check_archive(archive)?;
        state.tree.remove(&path, false)
    }

    fn rename_file(
        &self,
        archive: ArchiveHandle,
        from: WirePath<'_>,
        to: WirePath<'_>,
    ) -> ServiceResult<()> {
        let from = canonical(&from.to_string_lossy())?;
        let to = canonical(&to.to_string_lossy())?;
        self.require_writable()?;
        let mut state = self.state.lock();
        state.check_archive(archive)?;
        state.tree.rename(&from, &to, false)
    }

    fn open_directory(
        &self,
        archive: ArchiveHandle,
        path: WirePath<'_>,
    ) -> ServiceResult<RawHandle> {
        let path = canonical(&path.to_string_lossy())?;
        let mut state = self.state.lock();
        state.check_archive(archive)?;
        let is_dir = state
            .tree
            .lookup(&path)
            .and_then(|id| state.tree.node(id))
            .is_some_and(|node| node.is_dir());
        if !is_dir {
            return Err(ResultCode::PATH_NOT_FOUND);
        }

        let entries = state.tree.children(&path);
        let handle = state.allocate_handle();
        state.dirs.insert(handle, OpenDir { entries, cursor: 0 });
        trace!(path = %path, handle, "mem.open_directory");
        Ok(RawHandle(handle))
    }

    fn create_directory(
        &self,
        archive: ArchiveHandle,
        path: WirePath<'_>,
        _attributes: EntryAttributes,
    ) -> ServiceResult<()> {
        let path = canonical(&path.to_string_lossy())?;
        self.require_writable()?;
        let now = self.now();
        let mut state = self.state.lock();
        state.check_archive(archive)?;
        state.tree.create(&path, NodeKind::Dir, now).map(|_| ())
    }

    fn delete_directory(&self, archive: ArchiveHandle, path: WirePath<'_>) -> ServiceResult<()> {
        let path = canonical(&path.to_string_lossy())?;
        self.require_writable()?;
        let mut state = self.state.lock();
        state.check_archive(archive)?;
        state.tree.remove(&path, true)
    }

    fn rename_directory(
        &self,
        archive: ArchiveHandle,
        from: WirePath<'_>,
        to: WirePath<'_>,
    ) -> ServiceResult<()> {
        let from = canonical(&from.to_string_lossy())?;
        let to = canonical(&to.to_string_lossy())?;
        self.require_writable()?;
        let mut state = self.state.lock();
        state.check_archive(archive)?;
        state.tree.rename(&from, &to, true)
    }

    fn file_read(&self, file: RawHandle, offset: u64, buf: &mut [u8]) -> ServiceResult<usize> {
        let state = self.state.lock();
        let open = state.file(file)?;
        if !open.flags.contains(ServiceOpenFlags::READ) {
            return Err(ResultCode::INVALID_HANDLE);
        }
        state.tree.read(open.node, offset, buf)
    }

    fn file_write(
        &self,
        file: RawHandle,
        offset: u64,
        buf: &[u8],
        flags: WriteFlags,
    ) -> ServiceResult<usize> {
        let now = self.now();
        let capacity = self.config.capacity();
        let mut state = self.state.lock();
        state.stats.write_calls += 1;
        let open = state.file(file)?;
        if !open.flags.contains(ServiceOpenFlags::WRITE) {
            return Err(ResultCode::INVALID_HANDLE);
        }
        let node = open.node;
        let written = state.tree.write(node, offset, buf, capacity, now)?;
        if flags.contains(WriteFlags::FLUSH) {
            state.stats.flushed_writes += 1;
        }
        Ok(written)
    }

    fn file_size(&self, file: RawHandle) -> ServiceResult<u64> {
        let mut state = self.state.lock();
        state.stats.size_queries += 1;
        let node = state.file(file)?.node;
        state
            .tree
            .node(node)
            .map(|node| node.len())
            .ok_or(ResultCode::INVALID_HANDLE)
    }

    fn file_set_size(&self, file: RawHandle, size: u64) -> ServiceResult<()> {
        let now = self.now();
        let capacity = self.config.capacity();
        let mut state = self.state.lock();
        let open = state.file(file)?;
        if !open.flags.contains(ServiceOpenFlags::WRITE) {
            return Err(ResultCode::INVALID_HANDLE);
        }
        let node = open.node;
        state.tree.resize(node, size, capacity, now)
    }

    fn file_flush(&self, file: RawHandle) -> ServiceResult<()> {
        self.state.lock().file(file).map(|_| ())
    }

    fn file_close(&self, file: RawHandle) -> ServiceResult<()> {
        let mut state = self.state.lock();
        match state.files.remove(&file.0) {
            Some(_) => Ok(()),
            None => Err(ResultCode::INVALID_HANDLE),
        }
    }

    fn dir_read(&self, dir: RawHandle, entries: &mut [ServiceDirEntry]) -> ServiceResult<usize> {
        let mut state = self.state.lock();
        state.stats.dir_reads += 1;
        let open = state.dirs.get_mut(&dir.0).ok_or(ResultCode::INVALID_HANDLE)?;

        let mut count = 0;
        for (slot, listing) in entries.iter_mut().zip(&open.entries[open.cursor..]) {
            *slot = ServiceDirEntry::default();
            for (unit, out) in listing
                .name
                .encode_utf16()
                .take(ENTRY_NAME_UNITS - 1)
                .zip(slot.name.iter_mut())
            {
                *out = unit;
            }
            if listing.is_dir {
                slot.attributes = EntryAttributes::DIRECTORY;
            } else {
                slot.attributes = EntryAttributes::ARCHIVE;
                slot.file_size = listing.size;
            }
            count += 1;
        }
        open.cursor += count;
        Ok(count)
    }

    fn dir_close(&self, dir: RawHandle) -> ServiceResult<()> {
        let mut state = self.state.lock();
        match state.dirs.remove(&dir.0) {
            Some(_) => Ok(()),
            None => Err(ResultCode::INVALID_HANDLE),
        }
    }

    fn archive_resource(&self) -> ServiceResult<ArchiveResource> {
        let used = self.state.lock().tree.used_bytes();
        let cluster = u64::from(self.config.cluster_size.max(1));
        let used_clusters = used.div_ceil(cluster);
        let free = u64::from(self.config.total_clusters).saturating_sub(used_clusters);
        Ok(ArchiveResource {
            sector_size: 0x200,
            cluster_size: self.config.cluster_size,
            total_clusters: self.config.total_clusters,
            free_clusters: free as u32,
        })
    }

    fn is_writable(&self) -> ServiceResult<bool> {
        Ok(self.config.writable)
    }

    fn timestamp(&self, archive: ArchiveHandle, path: WirePath<'_>) -> ServiceResult<u64> {
        let path = canonical(&path.to_string_lossy())?;
        let state = self.state.lock();
        state.check_archive(archive)?;
        state
            .tree
            .lookup(&path)
            .and_then(|id| state.tree.node(id))
            .map(|node| node.mtime_ms)
            .ok_or(ResultCode::NOT_FOUND)
    }
}
