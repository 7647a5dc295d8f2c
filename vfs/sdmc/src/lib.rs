//! POSIX-style filesystem adapter for the SD card archive.
//!
//! [`SdmcDevice`] resolves caller paths, talks to an [`FsService`] and hands
//! out [`FileSession`]s and [`DirSession`]s. [`DevOptab`] exposes the same
//! operations with errno-style reporting for C runtimes.

mod config;
mod device;
mod devoptab;
mod dir;
mod file;
mod handle;
mod host;
mod volume;

pub use config::{SdmcConfig, WriteMode};
pub use device::{SdmcDevice, SdmcDeviceBuilder};
pub use devoptab::{DevOptab, Reent};
pub use dir::{DirEntry, DirSession};
pub use file::FileSession;
pub use host::{DeviceHost, DeviceId};
pub use sdmc_core::{FsService, SdmcError, SdmcErrorKind, SdmcResult};
pub use volume::statvfs;

use sdmc_core::{ResultCode, translate};

/// Translate a service result, tagging failures with `context`.
pub(crate) fn service_result<T>(
    context: &'static str,
    result: Result<T, ResultCode>,
) -> SdmcResult<T> {
    result.map_err(|code| translate(code, context))
}
