//! Global header: magic, schema version, init state and heartbeats

use std::sync::atomic::Ordering;

use serde::{Deserialize, Serialize};

use crate::error::{BridgeError, Result};

use super::{
    bytes::SharedBytes,
    constants::*,
    offsets::{RegionLayout, Section},
    side::Side,
};

/// Accessor for the global header of a mapped region
#[derive(Debug, Clone, Copy)]
pub struct GlobalHeader<'a> {
    bytes: &'a SharedBytes,
    layout: &'a RegionLayout,
    base: usize,
}

impl<'a> GlobalHeader<'a> {
    pub fn new(bytes: &'a SharedBytes, layout: &'a RegionLayout) -> Self {
        Self {
            bytes,
            layout,
            base: layout.window(Section::Header).offset,
        }
    }

    fn u32_field(&self, field: usize) -> &'a std::sync::atomic::AtomicU32 {
        self.bytes.atomic_u32(self.base + field)
    }

    fn u64_field(&self, field: usize) -> &'a std::sync::atomic::AtomicU64 {
        self.bytes.atomic_u64(self.base + field)
    }

    fn transition(&self, from: u32, to: u32) -> bool {
        self.u32_field(header_fields::INIT_STATE)
            .compare_exchange(from, to, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Claim the header for initialization (creator only). Fails if the
    /// region was already retired by a process that gave up waiting.
    pub fn begin_init(&self) -> bool {
        self.transition(init_state::UNINIT, init_state::INITIALIZING)
    }

    /// Write the identification fields. Called by the creator before any
    /// channel rest state is written.
    pub fn write_identity(&self, creator_pid: u32, created_at_ms: u64) {
        let capacities = self.layout.capacities();
        self.u64_field(header_fields::MAGIC)
            .store(GPUSHARED_MAGIC, Ordering::Relaxed);
        self.u32_field(header_fields::VERSION)
            .store(SCHEMA_VERSION, Ordering::Relaxed);
        self.u64_field(header_fields::TOTAL_SIZE)
            .store(self.layout.total_size() as u64, Ordering::Relaxed);
        self.u32_field(header_fields::SCENE_CAPACITY)
            .store(capacities.scene as u32, Ordering::Relaxed);
        self.u32_field(header_fields::UI_CAPACITY)
            .store(capacities.ui as u32, Ordering::Relaxed);
        self.u32_field(header_fields::CREATOR_PID)
            .store(creator_pid, Ordering::Relaxed);
        self.u64_field(header_fields::CREATED_AT_MS)
            .store(created_at_ms, Ordering::Relaxed);
        self.u32_field(header_fields::ATTACH_COUNT)
            .store(1, Ordering::Relaxed);
        for side in [Side::Client, Side::Renderer] {
            let record = self.layout.heartbeat(side);
            self.bytes
                .atomic_u64(record + header_fields::HEARTBEAT_MS)
                .store(0, Ordering::Relaxed);
            self.bytes
                .atomic_u32(record + header_fields::HEARTBEAT_PID)
                .store(0, Ordering::Relaxed);
        }
    }

    /// Publish the rest state. Everything written before this call is
    /// visible to an attacher that observes `READY`.
    pub fn publish_ready(&self) -> bool {
        self.transition(init_state::INITIALIZING, init_state::READY)
    }

    /// Mark the region torn down, starting from the state `from` the
    /// caller observed. Only the process that wins this unlinks the name.
    pub fn retire(&self, from: u32) -> bool {
        self.transition(from, init_state::RETIRED)
    }

    /// Current init state, with acquire ordering
    pub fn init_state(&self) -> u32 {
        self.u32_field(header_fields::INIT_STATE)
            .load(Ordering::Acquire)
    }

    pub fn is_ready(&self) -> bool {
        self.init_state() == init_state::READY
    }

    /// Check that the attached region was written by a compatible build
    /// with the same capacities
    pub fn validate(&self) -> Result<()> {
        let magic = self.u64_field(header_fields::MAGIC).load(Ordering::Acquire);
        if magic != GPUSHARED_MAGIC {
            return Err(BridgeError::layout_mismatch("magic", GPUSHARED_MAGIC, magic));
        }

        let version = self.u32_field(header_fields::VERSION).load(Ordering::Acquire);
        if version != SCHEMA_VERSION {
            return Err(BridgeError::version_mismatch(
                SCHEMA_VERSION as u64,
                version as u64,
            ));
        }

        let capacities = self.layout.capacities();
        let checks = [
            (
                "total_size",
                self.layout.total_size() as u64,
                self.u64_field(header_fields::TOTAL_SIZE).load(Ordering::Acquire),
            ),
            (
                "scene_capacity",
                capacities.scene as u64,
                self.u32_field(header_fields::SCENE_CAPACITY).load(Ordering::Acquire) as u64,
            ),
            (
                "ui_capacity",
                capacities.ui as u64,
                self.u32_field(header_fields::UI_CAPACITY).load(Ordering::Acquire) as u64,
            ),
        ];
        for (field, expected, actual) in checks {
            if expected != actual {
                return Err(BridgeError::layout_mismatch(field, expected, actual));
            }
        }

        Ok(())
    }

    /// Count one more open handle. Fails once the count has reached zero:
    /// the last handle is closing and the name is about to be unlinked.
    pub fn join(&self) -> bool {
        self.u32_field(header_fields::ATTACH_COUNT)
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |count| {
                (count != 0).then(|| count + 1)
            })
            .is_ok()
    }

    /// Drop one open handle and return how many remain, or `None` if the
    /// count was already zero
    pub fn leave(&self) -> Option<u32> {
        self.u32_field(header_fields::ATTACH_COUNT)
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |count| {
                count.checked_sub(1)
            })
            .ok()
            .map(|previous| previous - 1)
    }

    pub fn attach_count(&self) -> u32 {
        self.u32_field(header_fields::ATTACH_COUNT)
            .load(Ordering::Acquire)
    }

    /// Stamp the heartbeat record of `side`
    pub fn beat(&self, side: Side, now_ms: u64, pid: u32) {
        let record = self.layout.heartbeat(side);
        self.bytes
            .atomic_u32(record + header_fields::HEARTBEAT_PID)
            .store(pid, Ordering::Relaxed);
        self.bytes
            .atomic_u64(record + header_fields::HEARTBEAT_MS)
            .store(now_ms, Ordering::Release);
    }

    /// Last heartbeat of `side` as (unix millis, pid); millis is 0 if the
    /// side never beat
    pub fn heartbeat(&self, side: Side) -> (u64, u32) {
        let record = self.layout.heartbeat(side);
        let ms = self
            .bytes
            .atomic_u64(record + header_fields::HEARTBEAT_MS)
            .load(Ordering::Acquire);
        let pid = self
            .bytes
            .atomic_u32(record + header_fields::HEARTBEAT_PID)
            .load(Ordering::Relaxed);
        (ms, pid)
    }

    /// Snapshot of the identification fields
    pub fn info(&self) -> HeaderInfo {
        HeaderInfo {
            magic: self.u64_field(header_fields::MAGIC).load(Ordering::Acquire),
            version: self.u32_field(header_fields::VERSION).load(Ordering::Acquire),
            init_state: self.init_state(),
            total_size: self.u64_field(header_fields::TOTAL_SIZE).load(Ordering::Acquire),
            scene_capacity: self
                .u32_field(header_fields::SCENE_CAPACITY)
                .load(Ordering::Acquire),
            ui_capacity: self.u32_field(header_fields::UI_CAPACITY).load(Ordering::Acquire),
            creator_pid: self.u32_field(header_fields::CREATOR_PID).load(Ordering::Acquire),
            created_at_ms: self
                .u64_field(header_fields::CREATED_AT_MS)
                .load(Ordering::Acquire),
            attach_count: self.attach_count(),
        }
    }
}

/// Identification fields of a region header
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderInfo {
    pub magic: u64,
    pub version: u32,
    pub init_state: u32,
    pub total_size: u64,
    pub scene_capacity: u32,
    pub ui_capacity: u32,
    pub creator_pid: u32,
    pub created_at_ms: u64,
    pub attach_count: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::ChannelCapacities;
    use std::ptr::NonNull;

    #[test]
    fn test_lifecycle_transitions() {
        let layout = RegionLayout::new(ChannelCapacities::new(64, 64)).unwrap();
        let mut words = vec![0u64; layout.total_size() / 8];
        let base = NonNull::new(words.as_mut_ptr().cast::<u8>()).unwrap();
        let bytes = unsafe { SharedBytes::new(base, layout.total_size()) };
        let header = GlobalHeader::new(&bytes, &layout);

        assert!(header.begin_init());
        assert!(!header.begin_init());
        header.write_identity(42, 1);
        assert_eq!(header.attach_count(), 1);
        assert!(header.publish_ready());
        assert!(header.validate().is_ok());

        assert!(header.join());
        assert_eq!(header.leave(), Some(1));
        assert_eq!(header.leave(), Some(0));
        assert_eq!(header.leave(), None);

        // No joining a region whose last handle is gone
        assert!(!header.join());
        assert!(header.retire(init_state::READY));
        assert!(!header.retire(init_state::READY));
        assert_eq!(header.init_state(), init_state::RETIRED);
    }
}
