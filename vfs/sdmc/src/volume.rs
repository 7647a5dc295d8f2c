use sdmc_core::{FsService, SdmcResult, StatVfs, StatVfsFlags};
use tracing::debug;

use crate::service_result;

/// Capacity and write-protection state of the card.
pub fn statvfs(service: &dyn FsService) -> SdmcResult<StatVfs> {
    let resource = service_result("volume.statvfs", service.archive_resource())?;

    let mut flag = StatVfsFlags::NOSUID;
    match service.is_writable() {
        Ok(true) => {}
        Ok(false) => flag |= StatVfsFlags::RDONLY,
        Err(code) => {
            debug!(%code, "write-protect query failed, reporting read-only");
            flag |= StatVfsFlags::RDONLY;
        }
    }

    let free = u64::from(resource.free_clusters);
    Ok(StatVfs {
        bsize: u64::from(resource.cluster_size),
        frsize: u64::from(resource.cluster_size),
        blocks: u64::from(resource.total_clusters),
        bfree: free,
        bavail: free,
        files: 0,
        ffree: free,
        favail: free,
        fsid: 0,
        flag,
        namemax: 0,
    })
}
