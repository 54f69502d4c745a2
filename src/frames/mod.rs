//! Double-buffered frame handoff from the renderer to the client
//!
//! Two slots alternate between the producer and the consumer. The producer
//! never blocks: it writes into a free slot, or, when the consumer is behind
//! on both, overwrites the older unconsumed frame and counts it as dropped.
//! The consumer polls the slot named by the active index and copies the
//! frame out only if it was fully written.
//!
//! Ordering:
//! - payload and lengths → `frame_id` → `ready` (release) → active index
//!   (release) on the producer side
//! - active index → `ready` → `frame_id` (acquire) → payload → fence →
//!   `frame_id` re-check on the consumer side
//! - the consumer's `consumed` store (release) pairs with the producer's
//!   free-slot check (acquire)

pub mod consumer;
pub mod producer;
pub mod slot;

pub use consumer::FrameConsumer;
pub use producer::FrameProducer;
pub use slot::{SlotPhase, SlotState};

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::layout::{
    frame_control, ChannelCapacities, RegionLayout, Section, SharedBytes, FRAME_SLOT_COUNT,
};

use slot::FrameSlot;

/// A frame copied out of the region
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Frame {
    pub frame_id: u64,
    pub slot: usize,
    pub scene: Vec<u8>,
    pub ui: Vec<u8>,
}

/// Result of one publish
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublishOutcome {
    pub frame_id: u64,
    pub slot: usize,
    /// Frame id that was overwritten before the consumer read it
    pub dropped: Option<u64>,
}

/// Process-local counters of one endpoint
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameStats {
    /// Frames published (producer) or returned (consumer)
    pub frames: u64,
    /// Unconsumed frames overwritten by this producer
    pub dropped: u64,
    /// Reads discarded because the slot was overwritten mid-copy
    pub torn_reads: u64,
    /// Polls that found nothing new
    pub empty_polls: u64,
}

/// View over the frame control line and both slots
#[derive(Debug, Clone, Copy)]
pub struct FrameChannel<'a> {
    bytes: &'a SharedBytes,
    layout: &'a RegionLayout,
    control: usize,
}

impl<'a> FrameChannel<'a> {
    pub fn new(bytes: &'a SharedBytes, layout: &'a RegionLayout) -> Self {
        Self {
            bytes,
            layout,
            control: layout.window(Section::ActiveSlotIndex).offset,
        }
    }

    fn active_field(&self) -> &'a AtomicU32 {
        self.bytes.atomic_u32(self.control + frame_control::ACTIVE_INDEX)
    }

    fn last_frame_id_field(&self) -> &'a AtomicU64 {
        self.bytes.atomic_u64(self.control + frame_control::LAST_FRAME_ID)
    }

    fn dropped_field(&self) -> &'a AtomicU64 {
        self.bytes.atomic_u64(self.control + frame_control::FRAMES_DROPPED)
    }

    pub(crate) fn slot(&self, index: usize) -> FrameSlot<'a> {
        FrameSlot::new(self.bytes, self.layout, index)
    }

    pub fn capacities(&self) -> ChannelCapacities {
        self.layout.capacities()
    }

    /// Slot the consumer should inspect next. Out-of-range values written by
    /// a foreign binding are folded into range.
    pub fn active_index(&self) -> usize {
        self.active_field().load(Ordering::Acquire) as usize % FRAME_SLOT_COUNT
    }

    pub(crate) fn set_active(&self, index: usize) {
        self.active_field().store(index as u32, Ordering::Release);
    }

    /// Highest frame id handed out so far
    pub fn last_frame_id(&self) -> u64 {
        self.last_frame_id_field().load(Ordering::Acquire)
    }

    pub(crate) fn next_frame_id(&self) -> u64 {
        self.last_frame_id_field().fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Frames overwritten before they were consumed, across producer restarts
    pub fn frames_dropped(&self) -> u64 {
        self.dropped_field().load(Ordering::Relaxed)
    }

    pub(crate) fn record_dropped(&self) {
        self.dropped_field().fetch_add(1, Ordering::Relaxed);
    }

    /// Header state of both slots
    pub fn slot_states(&self) -> [SlotState; FRAME_SLOT_COUNT] {
        [self.slot(0).state(), self.slot(1).state()]
    }

    /// Frame ids currently held by filled slots, oldest first
    pub fn retained_frame_ids(&self) -> Vec<u64> {
        let mut ids: Vec<u64> = self
            .slot_states()
            .iter()
            .filter(|state| state.phase() == SlotPhase::Filled)
            .map(|state| state.frame_id)
            .collect();
        ids.sort_unstable();
        ids
    }

    pub(crate) fn reset(&self) {
        for index in 0..FRAME_SLOT_COUNT {
            self.slot(index).reset();
        }
        self.last_frame_id_field().store(0, Ordering::Relaxed);
        self.dropped_field().store(0, Ordering::Relaxed);
        self.active_field().store(0, Ordering::Release);
    }
}
