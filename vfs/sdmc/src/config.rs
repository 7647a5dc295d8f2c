use sdmc_core::{ArchiveId, SdmcError, SdmcErrorKind, SdmcResult};

/// How file writes reach the service.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum WriteMode {
    /// Copy through a per-thread staging buffer, one request per chunk.
    #[default]
    Safe,
    /// Hand the caller's buffer to the service in a single request.
    Direct,
}

#[derive(Clone, Debug)]
pub struct SdmcConfig {
    /// Name the device is registered under, without the trailing `:`.
    pub device_name: String,
    pub archive: ArchiveId,
    pub write_mode: WriteMode,
    /// Maximum entries fetched per directory read request.
    pub dir_batch_size: usize,
    /// Size of the staging buffer used by safe writes.
    pub staging_size: usize,
}

impl SdmcConfig {
    pub fn validate(&self) -> SdmcResult<()> {
        if self.device_name.is_empty() || self.device_name.contains([':', '/']) {
            return Err(SdmcError::new(
                SdmcErrorKind::InvalidArgument,
                "sdmc.validate_config.device_name",
            ));
        }
        if self.dir_batch_size == 0 {
            return Err(SdmcError::new(
                SdmcErrorKind::InvalidArgument,
                "sdmc.validate_config.dir_batch_size",
            ));
        }
        if self.staging_size == 0 {
            return Err(SdmcError::new(
                SdmcErrorKind::InvalidArgument,
                "sdmc.validate_config.staging_size",
            ));
        }
        Ok(())
    }
}

impl Default for SdmcConfig {
    fn default() -> Self {
        Self {
            device_name: String::from("sdmc"),
            archive: ArchiveId::SDMC,
            write_mode: WriteMode::Safe,
            dir_batch_size: 32,
            staging_size: 8192,
        }
    }
}
