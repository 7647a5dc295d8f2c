//! The device registration collaborator.

/// Identifier the host assigns to a registered device.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct DeviceId(pub i32);

/// Registers devices under a name and routes `name:` paths to them.
pub trait DeviceHost: Send + Sync {
    /// Register `name`; `None` if the host refused it.
    fn add_device(&self, name: &str) -> Option<DeviceId>;
    fn set_default_device(&self, device: DeviceId);
    /// The device a path would be routed to, if any.
    fn find_device(&self, path: &[u8]) -> Option<DeviceId>;
    fn remove_device(&self, name: &str);
    /// Path the running program was launched from, when known.
    fn launch_path(&self) -> Option<Vec<u8>>;
}
