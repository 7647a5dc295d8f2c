#[derive(Clone, Debug)]
pub struct MemConfig {
    /// Bytes per cluster reported by the archive resource query.
    pub cluster_size: u32,
    /// Capacity of the volume in clusters; file data beyond it fails with
    /// `DISK_FULL`.
    pub total_clusters: u32,
    /// Answer to the write-protection query, also enforced on mutation.
    pub writable: bool,
    /// Initial value of the modification clock, in milliseconds since
    /// 2000-01-01.
    pub clock_ms: u64,
}

impl MemConfig {
    pub fn capacity(&self) -> u64 {
        u64::from(self.cluster_size) * u64::from(self.total_clusters)
    }
}

impl Default for MemConfig {
    fn default() -> Self {
        Self {
            cluster_size: 0x8000,
            total_clusters: 0x1000,
            writable: true,
            clock_ms: 0,
        }
    }
}
