//! Checked field accessors over the raw mapped bytes
//!
//! Nothing is ever overlaid as a Rust struct onto the mapping. Each field is
//! reached through an offset, and atomics are materialized with
//! `AtomicU32::from_ptr`/`AtomicU64::from_ptr` on naturally aligned addresses.

use std::{
    ptr::{self, NonNull},
    sync::atomic::{AtomicU32, AtomicU64},
};

#[cfg(target_endian = "big")]
compile_error!("gpushared stores atomics in native order and requires a little-endian target");

/// A bounds-checked view over a mapped byte range.
///
/// `SharedBytes` does not own the memory; the owner (a `RegionHandle`) must
/// outlive every view derived from it.
#[derive(Debug, Clone, Copy)]
pub struct SharedBytes {
    base: NonNull<u8>,
    len: usize,
}

unsafe impl Send for SharedBytes {}
unsafe impl Sync for SharedBytes {}

impl SharedBytes {
    /// Wrap a mapped range.
    ///
    /// # Safety
    /// `base` must point to `len` bytes that stay mapped (and writable) for as
    /// long as this view or any copy of it is used. `base` must be aligned to
    /// at least 8 bytes.
    pub unsafe fn new(base: NonNull<u8>, len: usize) -> Self {
        debug_assert_eq!(base.as_ptr() as usize % 8, 0);
        Self { base, len }
    }

    /// Number of bytes covered by this view
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the view covers zero bytes
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Base pointer of the view
    pub fn as_ptr(&self) -> *mut u8 {
        self.base.as_ptr()
    }

    #[inline]
    fn check(&self, offset: usize, size: usize) {
        assert!(
            offset.checked_add(size).is_some_and(|end| end <= self.len),
            "access {}..+{} out of bounds for region of {} bytes",
            offset,
            size,
            self.len
        );
    }

    /// Pointer to `offset`, checked against `size` bytes of access
    pub fn ptr_at(&self, offset: usize, size: usize) -> *mut u8 {
        self.check(offset, size);
        // SAFETY: bounds checked above.
        unsafe { self.base.as_ptr().add(offset) }
    }

    /// Atomic view of the `u32` at `offset`
    pub fn atomic_u32(&self, offset: usize) -> &AtomicU32 {
        assert_eq!(offset % 4, 0, "u32 field at {} is misaligned", offset);
        let ptr = self.ptr_at(offset, 4);
        // SAFETY: in bounds, aligned, and only ever accessed atomically.
        unsafe { AtomicU32::from_ptr(ptr.cast()) }
    }

    /// Atomic view of the `u64` at `offset`
    pub fn atomic_u64(&self, offset: usize) -> &AtomicU64 {
        assert_eq!(offset % 8, 0, "u64 field at {} is misaligned", offset);
        let ptr = self.ptr_at(offset, 8);
        // SAFETY: in bounds, aligned, and only ever accessed atomically.
        unsafe { AtomicU64::from_ptr(ptr.cast()) }
    }

    /// Copy `src` into the mapping at `offset`
    pub fn write_bytes(&self, offset: usize, src: &[u8]) {
        let dst = self.ptr_at(offset, src.len());
        // SAFETY: in bounds; `src` is process-local and cannot overlap.
        unsafe { ptr::copy_nonoverlapping(src.as_ptr(), dst, src.len()) }
    }

    /// Copy bytes at `offset` out of the mapping into `dst`
    pub fn read_bytes(&self, offset: usize, dst: &mut [u8]) {
        let src = self.ptr_at(offset, dst.len());
        // SAFETY: in bounds; `dst` is process-local and cannot overlap.
        unsafe { ptr::copy_nonoverlapping(src, dst.as_mut_ptr(), dst.len()) }
    }

    /// Set `len` bytes at `offset` to zero
    pub fn zero(&self, offset: usize, len: usize) {
        let dst = self.ptr_at(offset, len);
        // SAFETY: in bounds.
        unsafe { ptr::write_bytes(dst, 0, len) }
    }

    pub fn read_u8(&self, offset: usize) -> u8 {
        let mut buf = [0u8; 1];
        self.read_bytes(offset, &mut buf);
        buf[0]
    }

    pub fn write_u8(&self, offset: usize, value: u8) {
        self.write_bytes(offset, &[value]);
    }

    pub fn read_f32_le(&self, offset: usize) -> f32 {
        let mut buf = [0u8; 4];
        self.read_bytes(offset, &mut buf);
        f32::from_le_bytes(buf)
    }

    pub fn write_f32_le(&self, offset: usize, value: f32) {
        self.write_bytes(offset, &value.to_le_bytes());
    }

    /// Mutable slice over `len` bytes at `offset`.
    ///
    /// # Safety
    /// The caller must hold exclusive write ownership of the range under the
    /// channel protocol for the lifetime of the returned slice.
    #[allow(clippy::mut_from_ref)]
    pub unsafe fn slice_mut(&self, offset: usize, len: usize) -> &mut [u8] {
        let ptr = self.ptr_at(offset, len);
        std::slice::from_raw_parts_mut(ptr, len)
    }
}
