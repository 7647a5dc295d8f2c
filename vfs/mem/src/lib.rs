//! An in-memory implementation of the storage service.
//!
//! Paths, handles and result codes behave like the real SD card archive so
//! the adapter can be exercised without the IPC transport.

mod config;
mod service;
mod tree;

pub use config::MemConfig;
pub use service::{MemService, MemStats};
