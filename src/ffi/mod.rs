//! C Foreign Function Interface (FFI) for foreign renderer bindings
//!
//! Exposes region open/close, heartbeat and the raw section windows. A
//! binding maps its own views of the frame slots and rings onto those
//! windows using the layout described in [`crate::layout`].

pub mod region;
pub mod types;
pub mod utils;
pub mod version;

// Re-export commonly used types and functions
pub use types::{GpuSharedErrorCode, GpuSharedHandle, GpuSharedRegionConfig, GpuSharedRegionInfo};

pub use utils::{gpushared_free_string, HANDLE_REGISTRY};

// Region API
pub use region::{
    gpushared_close, gpushared_heartbeat, gpushared_open, gpushared_open_with_config,
    gpushared_peer_alive, gpushared_region_info, gpushared_remove, gpushared_window,
};

// Version API
pub use version::{
    gpushared_schema_version, gpushared_version_major, gpushared_version_minor,
    gpushared_version_patch, gpushared_version_string,
};
