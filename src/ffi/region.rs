//! FFI functions for opening regions and reaching their sections

use std::{ffi::c_char, path::PathBuf, time::Duration};

use crate::{
    error::{BridgeError, Result},
    handle::{PeerStatus, RegionHandle},
    layout::{ChannelCapacities, Section, Side},
    memory::{BackingType, RegionConfig, SharedMemoryRegion},
};

use super::{
    types::{GpuSharedErrorCode, GpuSharedHandle, GpuSharedRegionConfig, GpuSharedRegionInfo},
    utils::{c_str_to_string, lookup, registry},
};

fn side_from_u32(side: u32) -> Result<Side> {
    Side::from_u32(side)
        .ok_or_else(|| BridgeError::invalid_parameter("side", "Must be 0 (client) or 1 (renderer)"))
}

/// Convert C region config to Rust config
fn convert_region_config(config: &GpuSharedRegionConfig) -> Result<RegionConfig> {
    let name = c_str_to_string(config.name, "name")?;
    let side = side_from_u32(config.side)?;

    let backing_type = match config.backing_type {
        0 => BackingType::PosixShm,
        1 => BackingType::FileBacked,
        _ => {
            return Err(BridgeError::invalid_parameter(
                "backing_type",
                "Must be 0 (PosixShm) or 1 (FileBacked)",
            ))
        }
    };

    let mut rust_config = RegionConfig::new(name)
        .with_side(side)
        .with_backing_type(backing_type);

    if !config.file_path.is_null() {
        rust_config = rust_config.with_file_path(PathBuf::from(c_str_to_string(
            config.file_path,
            "file_path",
        )?));
    }

    let defaults = ChannelCapacities::default();
    let scene = if config.scene_capacity == 0 { defaults.scene } else { config.scene_capacity };
    let ui = if config.ui_capacity == 0 { defaults.ui } else { config.ui_capacity };
    rust_config = rust_config.with_capacities(ChannelCapacities::new(scene, ui));

    if config.attach_timeout_ms != 0 {
        rust_config = rust_config.with_attach_timeout(Duration::from_millis(config.attach_timeout_ms));
    }

    Ok(rust_config)
}

fn open_into(config: Result<RegionConfig>, out_handle: *mut GpuSharedHandle) -> GpuSharedErrorCode {
    let opened = config.and_then(|config| RegionHandle::open_or_create(&config));
    match opened {
        Ok(handle) => {
            let id = registry().store_region(handle);
            // SAFETY: out_handle checked non-null by the caller.
            unsafe { *out_handle = id as GpuSharedHandle };
            GpuSharedErrorCode::Success
        }
        Err(e) => {
            log::warn!("gpushared_open failed: {}", e);
            e.into()
        }
    }
}

/// Open (creating if needed) the POSIX shared memory region `name` with
/// default capacities. `side`: 0 = client, 1 = renderer.
#[no_mangle]
pub extern "C" fn gpushared_open(
    name: *const c_char,
    side: u32,
    out_handle: *mut GpuSharedHandle,
) -> GpuSharedErrorCode {
    if name.is_null() || out_handle.is_null() {
        return GpuSharedErrorCode::InvalidParameter;
    }

    let config = c_str_to_string(name, "name")
        .and_then(|name| Ok(RegionConfig::new(name).with_side(side_from_u32(side)?)));
    open_into(config, out_handle)
}

/// Open (creating if needed) a region from a full configuration
#[no_mangle]
pub extern "C" fn gpushared_open_with_config(
    config: *const GpuSharedRegionConfig,
    out_handle: *mut GpuSharedHandle,
) -> GpuSharedErrorCode {
    if config.is_null() || out_handle.is_null() {
        return GpuSharedErrorCode::InvalidParameter;
    }

    // SAFETY: non-null, and the caller keeps it valid for this call.
    let config = unsafe { &*config };
    open_into(convert_region_config(config), out_handle)
}

/// Close a handle. Closing the last handle to a region unlinks it.
#[no_mangle]
pub extern "C" fn gpushared_close(handle: GpuSharedHandle) -> GpuSharedErrorCode {
    if handle.is_null() {
        return GpuSharedErrorCode::InvalidParameter;
    }

    match registry().remove_region(handle as usize) {
        Some(_) => GpuSharedErrorCode::Success,
        None => GpuSharedErrorCode::InvalidHandle,
    }
}

/// Unlink the named POSIX region, e.g. one left by crashed processes.
/// Existing mappings stay valid.
#[no_mangle]
pub extern "C" fn gpushared_remove(name: *const c_char) -> GpuSharedErrorCode {
    let removed = c_str_to_string(name, "name")
        .and_then(|name| SharedMemoryRegion::remove(&RegionConfig::new(name)));
    match removed {
        Ok(_) => GpuSharedErrorCode::Success,
        Err(e) => e.into(),
    }
}

/// Base pointer and length of one section of the mapping.
///
/// `section` values: 0 header, 1 camera, 2 frame slot 0, 3 frame slot 1,
/// 4 frame control, 5 input ring, 6 resolution A, 7 resolution B. The
/// pointer stays valid until the handle is closed.
#[no_mangle]
pub extern "C" fn gpushared_window(
    handle: GpuSharedHandle,
    section: u32,
    out_ptr: *mut *mut u8,
    out_len: *mut usize,
) -> GpuSharedErrorCode {
    if out_ptr.is_null() || out_len.is_null() {
        return GpuSharedErrorCode::InvalidParameter;
    }
    let Some(section) = Section::from_u32(section) else {
        return GpuSharedErrorCode::InvalidParameter;
    };
    let Some(region) = lookup(handle) else {
        return GpuSharedErrorCode::InvalidHandle;
    };

    let window = region.window(section);
    // SAFETY: both out pointers checked non-null above.
    unsafe {
        *out_ptr = window.ptr;
        *out_len = window.len;
    }
    GpuSharedErrorCode::Success
}

/// Stamp this side's heartbeat
#[no_mangle]
pub extern "C" fn gpushared_heartbeat(handle: GpuSharedHandle) -> GpuSharedErrorCode {
    match lookup(handle) {
        Some(region) => {
            region.heartbeat();
            GpuSharedErrorCode::Success
        }
        None => GpuSharedErrorCode::InvalidHandle,
    }
}

/// Whether the peer beat within `max_age_ms`
#[no_mangle]
pub extern "C" fn gpushared_peer_alive(
    handle: GpuSharedHandle,
    max_age_ms: u64,
    out_alive: *mut bool,
) -> GpuSharedErrorCode {
    if out_alive.is_null() {
        return GpuSharedErrorCode::InvalidParameter;
    }
    let Some(region) = lookup(handle) else {
        return GpuSharedErrorCode::InvalidHandle;
    };

    let alive = matches!(
        region.peer_status(Duration::from_millis(max_age_ms)),
        PeerStatus::Alive { .. }
    );
    // SAFETY: checked non-null above.
    unsafe { *out_alive = alive };
    GpuSharedErrorCode::Success
}

/// Fill `out_info` with the region summary
#[no_mangle]
pub extern "C" fn gpushared_region_info(
    handle: GpuSharedHandle,
    out_info: *mut GpuSharedRegionInfo,
) -> GpuSharedErrorCode {
    if out_info.is_null() {
        return GpuSharedErrorCode::InvalidParameter;
    }
    let Some(region) = lookup(handle) else {
        return GpuSharedErrorCode::InvalidHandle;
    };

    let snapshot = region.snapshot();
    let info = GpuSharedRegionInfo {
        total_size: snapshot.header.total_size as usize,
        scene_capacity: snapshot.header.scene_capacity as usize,
        ui_capacity: snapshot.header.ui_capacity as usize,
        creator_pid: snapshot.header.creator_pid,
        attach_count: snapshot.header.attach_count,
        is_creator: region.is_creator(),
        last_frame_id: snapshot.last_frame_id,
        frames_dropped: snapshot.frames_dropped,
        input_events_dropped: snapshot.input_events_dropped,
    };
    // SAFETY: checked non-null above.
    unsafe { *out_info = info };
    GpuSharedErrorCode::Success
}
