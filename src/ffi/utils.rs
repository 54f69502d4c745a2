//! FFI utilities and handle management

use std::{
    collections::HashMap,
    ffi::{c_char, CStr, CString},
    sync::{Arc, Mutex, MutexGuard},
};

use crate::{error::BridgeError, handle::RegionHandle};

use super::types::GpuSharedHandle;

// Global handle management
lazy_static::lazy_static! {
    pub static ref HANDLE_REGISTRY: Mutex<HandleRegistry> = Mutex::new(HandleRegistry::new());
}

/// Open regions keyed by the id handed to C callers
#[derive(Debug)]
pub struct HandleRegistry {
    regions: HashMap<usize, Arc<RegionHandle>>,
    next_id: usize,
}

impl Default for HandleRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl HandleRegistry {
    pub fn new() -> Self {
        Self {
            regions: HashMap::new(),
            next_id: 1,
        }
    }

    pub fn store_region(&mut self, region: RegionHandle) -> usize {
        let id = self.next_id;
        self.next_id += 1;
        self.regions.insert(id, Arc::new(region));
        id
    }

    pub fn get_region(&self, id: usize) -> Option<Arc<RegionHandle>> {
        self.regions.get(&id).cloned()
    }

    pub fn remove_region(&mut self, id: usize) -> Option<Arc<RegionHandle>> {
        self.regions.remove(&id)
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }
}

/// Lock the registry; a panic in another caller does not poison it for C
pub fn registry() -> MutexGuard<'static, HandleRegistry> {
    HANDLE_REGISTRY
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Look up the region behind a C handle
pub fn lookup(handle: GpuSharedHandle) -> Option<Arc<RegionHandle>> {
    if handle.is_null() {
        return None;
    }
    registry().get_region(handle as usize)
}

/// Convert C string to Rust String
pub fn c_str_to_string(c_str: *const c_char, parameter: &str) -> Result<String, BridgeError> {
    if c_str.is_null() {
        return Err(BridgeError::invalid_parameter(parameter, "null string"));
    }

    // SAFETY: caller passes a NUL-terminated string that outlives this call.
    unsafe { CStr::from_ptr(c_str) }
        .to_str()
        .map(str::to_owned)
        .map_err(|_| BridgeError::invalid_parameter(parameter, "string is not valid UTF-8"))
}

/// Convert Rust String to C string (caller must free with gpushared_free_string)
pub fn string_to_c_str(s: String) -> *mut c_char {
    match CString::new(s) {
        Ok(c_string) => c_string.into_raw(),
        Err(_) => std::ptr::null_mut(),
    }
}

/// Free a C string allocated by this library
#[no_mangle]
pub extern "C" fn gpushared_free_string(ptr: *mut c_char) {
    if !ptr.is_null() {
        // SAFETY: ptr came from CString::into_raw in string_to_c_str.
        unsafe {
            drop(CString::from_raw(ptr));
        }
    }
}
