//! Per-side viewport size publication
//!
//! Each side owns one pair and reads the other. A pair is stored as a single
//! packed `u64` (width in the low half, height in the high half), so a Rust
//! reader always sees a width and height that were published together. The
//! byte layout is still width at +0 and height at +4, so a foreign binding
//! may read the two halves separately and accept a transiently mixed pair.

use std::sync::atomic::Ordering;

use serde::{Deserialize, Serialize};

use crate::layout::{resolution_fields, RegionLayout, Section, SharedBytes, Side};

/// Viewport size in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Whether the side has never published
    pub fn is_unset(&self) -> bool {
        self.width == 0 && self.height == 0
    }

    pub fn aspect_ratio(&self) -> Option<f32> {
        (self.height != 0).then(|| self.width as f32 / self.height as f32)
    }

    fn pack(self) -> u64 {
        (self.height as u64) << 32 | self.width as u64
    }

    fn unpack(packed: u64) -> Self {
        Self {
            width: packed as u32,
            height: (packed >> 32) as u32,
        }
    }
}

impl std::fmt::Display for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Publishes this side's viewport and reads the peer's
#[derive(Debug, Clone, Copy)]
pub struct ResolutionNegotiator<'a> {
    bytes: &'a SharedBytes,
    layout: &'a RegionLayout,
    side: Side,
}

impl<'a> ResolutionNegotiator<'a> {
    pub fn new(bytes: &'a SharedBytes, layout: &'a RegionLayout, side: Side) -> Self {
        Self {
            bytes,
            layout,
            side,
        }
    }

    fn offset(&self, side: Side) -> usize {
        self.layout.window(Section::resolution(side)).offset + resolution_fields::PACKED
    }

    /// Publish this side's viewport
    pub fn publish_local(&self, width: u32, height: u32) {
        self.publish(self.side, Resolution::new(width, height));
    }

    pub(crate) fn publish(&self, side: Side, resolution: Resolution) {
        self.bytes
            .atomic_u64(self.offset(side))
            .store(resolution.pack(), Ordering::Release);
    }

    /// Read the pair owned by `side`
    pub fn get(&self, side: Side) -> Resolution {
        Resolution::unpack(self.bytes.atomic_u64(self.offset(side)).load(Ordering::Acquire))
    }

    /// What this side last published
    pub fn local(&self) -> Resolution {
        self.get(self.side)
    }

    /// What the peer last published
    pub fn peer(&self) -> Resolution {
        self.get(self.side.peer())
    }

    pub(crate) fn reset(&self) {
        for side in [Side::Client, Side::Renderer] {
            self.publish(side, Resolution::default());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::ChannelCapacities;
    use std::ptr::NonNull;

    #[test]
    fn test_packed_layout_matches_split_fields() {
        let layout = RegionLayout::new(ChannelCapacities::new(64, 64)).unwrap();
        let mut words = vec![0u64; layout.total_size() / 8];
        let base = NonNull::new(words.as_mut_ptr().cast::<u8>()).unwrap();
        let bytes = unsafe { SharedBytes::new(base, layout.total_size()) };

        let client = ResolutionNegotiator::new(&bytes, &layout, Side::Client);
        client.publish_local(1920, 1080);

        let offset = layout.window(Section::ResolutionA).offset;
        assert_eq!(bytes.atomic_u32(offset + resolution_fields::WIDTH).load(Ordering::Relaxed), 1920);
        assert_eq!(bytes.atomic_u32(offset + resolution_fields::HEIGHT).load(Ordering::Relaxed), 1080);

        let renderer = ResolutionNegotiator::new(&bytes, &layout, Side::Renderer);
        assert_eq!(renderer.peer(), Resolution::new(1920, 1080));
        assert!(renderer.local().is_unset());
    }

    #[test]
    fn test_aspect_ratio() {
        assert_eq!(Resolution::new(1600, 800).aspect_ratio(), Some(2.0));
        assert_eq!(Resolution::default().aspect_ratio(), None);
        assert_eq!(Resolution::new(800, 600).to_string(), "800x600");
    }
}
