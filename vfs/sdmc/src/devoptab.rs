//! POSIX-shaped device table entry points.
//!
//! Each `*_r` call reports failure through the caller's [`Reent`] errno slot
//! and a sentinel return value, so concurrent callers never share an error
//! location. Session state lives in caller-owned slots.

use sdmc_core::{SdmcError, SdmcErrorKind, SdmcResult, SeekWhence, Stat, StatVfs};

use crate::device::SdmcDevice;
use crate::dir::DirSession;
use crate::file::FileSession;

/// Per-caller error state.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Reent {
    pub errno: i32,
}

impl Reent {
    pub fn new() -> Self {
        Self::default()
    }

    fn fail(&mut self, err: SdmcError) {
        self.errno = err.errno();
    }

    fn report<T>(&mut self, result: SdmcResult<T>) -> Option<T> {
        result.map_err(|err| self.fail(err)).ok()
    }

    fn status(&mut self, result: SdmcResult<()>) -> i32 {
        match self.report(result) {
            Some(()) => 0,
            None => -1,
        }
    }
}

/// Device table a C runtime dispatches `name:` paths through.
pub trait DevOptab: Send + Sync {
    fn name(&self) -> &str;

    fn open_r(
        &self,
        r: &mut Reent,
        slot: &mut Option<FileSession>,
        path: &[u8],
        flags: i32,
        mode: u32,
    ) -> i32;
    fn close_r(&self, r: &mut Reent, slot: &mut Option<FileSession>) -> i32;
    fn write_r(&self, r: &mut Reent, file: &mut FileSession, buf: &[u8]) -> isize;
    fn read_r(&self, r: &mut Reent, file: &mut FileSession, buf: &mut [u8]) -> isize;
    fn seek_r(&self, r: &mut Reent, file: &mut FileSession, pos: i64, whence: i32) -> i64;
    fn fstat_r(&self, r: &mut Reent, file: &FileSession, st: &mut Stat) -> i32;
    fn stat_r(&self, r: &mut Reent, path: &[u8], st: &mut Stat) -> i32;
    fn link_r(&self, r: &mut Reent, existing: &[u8], new: &[u8]) -> i32;
    fn unlink_r(&self, r: &mut Reent, path: &[u8]) -> i32;
    fn chdir_r(&self, r: &mut Reent, path: &[u8]) -> i32;
    fn rename_r(&self, r: &mut Reent, old: &[u8], new: &[u8]) -> i32;
    fn mkdir_r(&self, r: &mut Reent, path: &[u8], mode: u32) -> i32;
    fn rmdir_r(&self, r: &mut Reent, path: &[u8]) -> i32;

    fn diropen_r<'a>(
        &self,
        r: &mut Reent,
        slot: &'a mut Option<DirSession>,
        path: &[u8],
    ) -> Option<&'a mut DirSession>;
    fn dirreset_r(&self, r: &mut Reent, dir: &mut DirSession) -> i32;
    /// Store the next entry's name in `filename` and fill in the type bits of
    /// `st`.
    fn dirnext_r(
        &self,
        r: &mut Reent,
        dir: &mut DirSession,
        filename: &mut Vec<u8>,
        st: &mut Stat,
    ) -> i32;
    fn dirclose_r(&self, r: &mut Reent, slot: &mut Option<DirSession>) -> i32;

    fn statvfs_r(&self, r: &mut Reent, path: &[u8], buf: &mut StatVfs) -> i32;
    fn ftruncate_r(&self, r: &mut Reent, file: &mut FileSession, len: i64) -> i32;
    fn fsync_r(&self, r: &mut Reent, file: &mut FileSession) -> i32;
    fn chmod_r(&self, r: &mut Reent, path: &[u8], mode: u32) -> i32;
    fn fchmod_r(&self, r: &mut Reent, file: &mut FileSession, mode: u32) -> i32;
}

impl DevOptab for SdmcDevice {
    fn name(&self) -> &str {
        &self.config().device_name
    }

    fn open_r(
        &self,
        r: &mut Reent,
        slot: &mut Option<FileSession>,
        path: &[u8],
        flags: i32,
        _mode: u32,
    ) -> i32 {
        match r.report(self.open(path, flags)) {
            Some(file) => {
                *slot = Some(file);
                0
            }
            None => -1,
        }
    }

    fn close_r(&self, r: &mut Reent, slot: &mut Option<FileSession>) -> i32 {
        match slot.take() {
            Some(file) => r.status(file.close()),
            None => {
                r.fail(SdmcError::new(SdmcErrorKind::BadFileDescriptor, "file.close"));
                -1
            }
        }
    }

    fn write_r(&self, r: &mut Reent, file: &mut FileSession, buf: &[u8]) -> isize {
        r.report(self.write(file, buf))
            .map_or(-1, |written| written as isize)
    }

    fn read_r(&self, r: &mut Reent, file: &mut FileSession, buf: &mut [u8]) -> isize {
        r.report(file.read(buf)).map_or(-1, |read| read as isize)
    }

    fn seek_r(&self, r: &mut Reent, file: &mut FileSession, pos: i64, whence: i32) -> i64 {
        let result = SeekWhence::from_posix(whence).and_then(|whence| file.seek(pos, whence));
        // Offsets above i64::MAX are rejected by the seek itself.
        r.report(result).map_or(-1, |offset| offset as i64)
    }

    fn fstat_r(&self, r: &mut Reent, file: &FileSession, st: &mut Stat) -> i32 {
        match r.report(file.stat()) {
            Some(stat) => {
                *st = stat;
                0
            }
            None => -1,
        }
    }

    fn stat_r(&self, r: &mut Reent, path: &[u8], st: &mut Stat) -> i32 {
        match r.report(self.stat(path)) {
            Some(stat) => {
                *st = stat;
                0
            }
            None => -1,
        }
    }

    fn link_r(&self, r: &mut Reent, existing: &[u8], new: &[u8]) -> i32 {
        r.status(self.link(existing, new))
    }

    fn unlink_r(&self, r: &mut Reent, path: &[u8]) -> i32 {
        r.status(self.unlink(path))
    }

    fn chdir_r(&self, r: &mut Reent, path: &[u8]) -> i32 {
        r.status(self.chdir(path))
    }

    fn rename_r(&self, r: &mut Reent, old: &[u8], new: &[u8]) -> i32 {
        r.status(self.rename(old, new))
    }

    fn mkdir_r(&self, r: &mut Reent, path: &[u8], mode: u32) -> i32 {
        r.status(self.mkdir(path, mode))
    }

    fn rmdir_r(&self, r: &mut Reent, path: &[u8]) -> i32 {
        r.status(self.rmdir(path))
    }

    fn diropen_r<'a>(
        &self,
        r: &mut Reent,
        slot: &'a mut Option<DirSession>,
        path: &[u8],
    ) -> Option<&'a mut DirSession> {
        let dir = r.report(self.diropen(path))?;
        Some(slot.insert(dir))
    }

    fn dirreset_r(&self, r: &mut Reent, dir: &mut DirSession) -> i32 {
        r.status(dir.reset())
    }

    fn dirnext_r(
        &self,
        r: &mut Reent,
        dir: &mut DirSession,
        filename: &mut Vec<u8>,
        st: &mut Stat,
    ) -> i32 {
        match r.report(dir.next_entry()) {
            Some(entry) => {
                filename.clear();
                filename.extend_from_slice(entry.name.as_bytes());
                st.ino = entry.stat.ino;
                st.mode = entry.stat.mode;
                0
            }
            None => -1,
        }
    }

    fn dirclose_r(&self, r: &mut Reent, slot: &mut Option<DirSession>) -> i32 {
        match slot.take() {
            Some(dir) => r.status(dir.close()),
            None => {
                r.fail(SdmcError::new(SdmcErrorKind::BadFileDescriptor, "dir.close"));
                -1
            }
        }
    }

    fn statvfs_r(&self, r: &mut Reent, path: &[u8], buf: &mut StatVfs) -> i32 {
        match r.report(self.statvfs(path)) {
            Some(stat) => {
                *buf = stat;
                0
            }
            None => -1,
        }
    }

    fn ftruncate_r(&self, r: &mut Reent, file: &mut FileSession, len: i64) -> i32 {
        r.status(file.truncate(len))
    }

    fn fsync_r(&self, r: &mut Reent, file: &mut FileSession) -> i32 {
        r.status(file.sync())
    }

    fn chmod_r(&self, r: &mut Reent, path: &[u8], mode: u32) -> i32 {
        r.status(self.chmod(path, mode))
    }

    fn fchmod_r(&self, r: &mut Reent, file: &mut FileSession, mode: u32) -> i32 {
        r.status(self.fchmod(file, mode))
    }
}
