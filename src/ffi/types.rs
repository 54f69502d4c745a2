//! FFI type definitions and handle types

use crate::error::BridgeError;
use std::ffi::{c_char, c_void};

/// Opaque region handle for the C API (an id into the handle registry)
pub type GpuSharedHandle = *mut c_void;

/// Error codes for C API
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GpuSharedErrorCode {
    Success = 0,
    InvalidParameter = 1,
    IoError = 2,
    MappingError = 3,
    RegionNotReady = 4,
    LayoutMismatch = 5,
    VersionMismatch = 6,
    PayloadTooLarge = 7,
    CorruptEvent = 8,
    ConcurrencyError = 9,
    PlatformError = 10,
    InvalidHandle = 11,
    UnknownError = 99,
}

impl From<BridgeError> for GpuSharedErrorCode {
    fn from(error: BridgeError) -> Self {
        GpuSharedErrorCode::from(&error)
    }
}

impl From<&BridgeError> for GpuSharedErrorCode {
    fn from(error: &BridgeError) -> Self {
        match error {
            BridgeError::Io { .. } => GpuSharedErrorCode::IoError,
            BridgeError::Mapping { .. } => GpuSharedErrorCode::MappingError,
            BridgeError::InvalidParameter { .. } => GpuSharedErrorCode::InvalidParameter,
            BridgeError::RegionNotReady { .. } => GpuSharedErrorCode::RegionNotReady,
            BridgeError::LayoutMismatch { .. } => GpuSharedErrorCode::LayoutMismatch,
            BridgeError::VersionMismatch { .. } => GpuSharedErrorCode::VersionMismatch,
            BridgeError::PayloadTooLarge { .. } => GpuSharedErrorCode::PayloadTooLarge,
            BridgeError::CorruptEvent { .. } => GpuSharedErrorCode::CorruptEvent,
            BridgeError::Concurrency { .. } => GpuSharedErrorCode::ConcurrencyError,
            BridgeError::Platform { .. } => GpuSharedErrorCode::PlatformError,
        }
    }
}

/// Region configuration (C-compatible)
///
/// `side`: 0 = client, 1 = renderer. `backing_type`: 0 = POSIX shm,
/// 1 = file-backed. Zero capacities or timeout select the defaults.
#[repr(C)]
pub struct GpuSharedRegionConfig {
    pub name: *const c_char,
    pub side: u32,
    pub backing_type: u32,
    pub file_path: *const c_char,
    pub scene_capacity: usize,
    pub ui_capacity: usize,
    pub attach_timeout_ms: u64,
}

/// Region summary (C-compatible)
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct GpuSharedRegionInfo {
    pub total_size: usize,
    pub scene_capacity: usize,
    pub ui_capacity: usize,
    pub creator_pid: u32,
    pub attach_count: u32,
    pub is_creator: bool,
    pub last_frame_id: u64,
    pub frames_dropped: u64,
    pub input_events_dropped: u64,
}
