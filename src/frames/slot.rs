//! Accessor for one frame slot of the double buffer

use std::sync::atomic::{fence, AtomicU32, AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::layout::{slot_header, RegionLayout, SharedBytes, Window};

/// Where a slot is in its Free → Filled → Free cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SlotPhase {
    /// `ready=false, consumed=true`: available to the producer
    Free,
    /// `ready=true, consumed=false`: holds an unconsumed frame
    Filled,
    /// Both flags clear: being written, or being released by the consumer
    Transition,
    /// Both flags set; never produced by this crate
    Invalid,
}

impl SlotPhase {
    fn from_flags(ready: bool, consumed: bool) -> Self {
        match (ready, consumed) {
            (false, true) => SlotPhase::Free,
            (true, false) => SlotPhase::Filled,
            (false, false) => SlotPhase::Transition,
            (true, true) => SlotPhase::Invalid,
        }
    }
}

/// Point-in-time view of a slot header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotState {
    pub index: usize,
    pub ready: bool,
    pub consumed: bool,
    pub frame_id: u64,
    pub scene_length: u32,
    pub ui_length: u32,
}

impl SlotState {
    pub fn phase(&self) -> SlotPhase {
        SlotPhase::from_flags(self.ready, self.consumed)
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct FrameSlot<'a> {
    bytes: &'a SharedBytes,
    index: usize,
    header: usize,
    scene: Window,
    ui: Window,
}

impl<'a> FrameSlot<'a> {
    pub(crate) fn new(bytes: &'a SharedBytes, layout: &RegionLayout, index: usize) -> Self {
        Self {
            bytes,
            index,
            header: layout.slot_header(index),
            scene: layout.slot_scene(index),
            ui: layout.slot_ui(index),
        }
    }

    fn ready_flag(&self) -> &'a AtomicU32 {
        self.bytes.atomic_u32(self.header + slot_header::READY)
    }

    fn consumed_flag(&self) -> &'a AtomicU32 {
        self.bytes.atomic_u32(self.header + slot_header::CONSUMED)
    }

    fn frame_id_field(&self) -> &'a AtomicU64 {
        self.bytes.atomic_u64(self.header + slot_header::FRAME_ID)
    }

    fn scene_length_field(&self) -> &'a AtomicU32 {
        self.bytes.atomic_u32(self.header + slot_header::SCENE_LENGTH)
    }

    fn ui_length_field(&self) -> &'a AtomicU32 {
        self.bytes.atomic_u32(self.header + slot_header::UI_LENGTH)
    }

    pub(crate) fn index(&self) -> usize {
        self.index
    }

    /// Write the rest state: free, no frame, empty payloads
    pub(crate) fn reset(&self) {
        self.ready_flag().store(0, Ordering::Relaxed);
        self.frame_id_field().store(0, Ordering::Relaxed);
        self.scene_length_field().store(0, Ordering::Relaxed);
        self.ui_length_field().store(0, Ordering::Relaxed);
        self.consumed_flag().store(1, Ordering::Release);
    }

    pub(crate) fn is_ready(&self) -> bool {
        self.ready_flag().load(Ordering::Acquire) != 0
    }

    /// Free for the producer; acquire pairs with the consumer's release so
    /// its payload reads finish before the producer overwrites them
    pub(crate) fn is_free(&self) -> bool {
        self.consumed_flag().load(Ordering::Acquire) != 0
    }

    /// Claimed but never published, e.g. a `fill` that panicked. The
    /// consumer's release never clears both flags with a zero frame id.
    pub(crate) fn is_abandoned(&self) -> bool {
        self.ready_flag().load(Ordering::Acquire) == 0
            && self.consumed_flag().load(Ordering::Acquire) == 0
            && self.frame_id() == 0
    }

    pub(crate) fn frame_id(&self) -> u64 {
        self.frame_id_field().load(Ordering::Acquire)
    }

    pub(crate) fn lengths(&self) -> (usize, usize) {
        (
            self.scene_length_field().load(Ordering::Relaxed) as usize,
            self.ui_length_field().load(Ordering::Relaxed) as usize,
        )
    }

    /// Take the slot for writing: both flags clear and frame id zeroed.
    ///
    /// The release fence orders these stores before every payload write
    /// that follows, so a reader that sees any new payload byte also sees
    /// the frame id change when it re-checks.
    pub(crate) fn claim(&self) {
        self.ready_flag().store(0, Ordering::Relaxed);
        self.consumed_flag().store(0, Ordering::Relaxed);
        self.frame_id_field().store(0, Ordering::Relaxed);
        fence(Ordering::Release);
    }

    pub(crate) fn set_lengths(&self, scene: usize, ui: usize) {
        self.scene_length_field().store(scene as u32, Ordering::Relaxed);
        self.ui_length_field().store(ui as u32, Ordering::Relaxed);
    }

    /// Writable scene and UI payload ranges.
    ///
    /// # Safety
    /// The slot must be claimed by the only producer and not yet published.
    pub(crate) unsafe fn payload_mut(&self, scene_len: usize, ui_len: usize) -> (&mut [u8], &mut [u8]) {
        (
            self.bytes.slice_mut(self.scene.offset, scene_len),
            self.bytes.slice_mut(self.ui.offset, ui_len),
        )
    }

    /// Expose the written frame. Payload, lengths and frame id become
    /// visible before `ready`.
    pub(crate) fn publish(&self, frame_id: u64) {
        self.frame_id_field().store(frame_id, Ordering::Release);
        self.consumed_flag().store(0, Ordering::Relaxed);
        self.ready_flag().store(1, Ordering::Release);
    }

    pub(crate) fn read_scene(&self, dst: &mut [u8]) {
        self.bytes.read_bytes(self.scene.offset, dst);
    }

    pub(crate) fn read_ui(&self, dst: &mut [u8]) {
        self.bytes.read_bytes(self.ui.offset, dst);
    }

    /// After copying a payload, check that the producer did not start
    /// overwriting the slot while it was read
    pub(crate) fn still_holds(&self, frame_id: u64) -> bool {
        fence(Ordering::Acquire);
        self.frame_id_field().load(Ordering::Relaxed) == frame_id
            && self.ready_flag().load(Ordering::Relaxed) != 0
    }

    /// Return the slot to the producer, unless it has already been taken
    /// for a newer frame
    pub(crate) fn release(&self, frame_id: u64) -> bool {
        if self.frame_id_field().load(Ordering::Relaxed) != frame_id {
            return false;
        }
        self.ready_flag().store(0, Ordering::Relaxed);
        self.consumed_flag().store(1, Ordering::Release);
        true
    }

    pub(crate) fn state(&self) -> SlotState {
        let (scene_length, ui_length) = self.lengths();
        SlotState {
            index: self.index,
            ready: self.is_ready(),
            consumed: self.consumed_flag().load(Ordering::Acquire) != 0,
            frame_id: self.frame_id(),
            scene_length: scene_length as u32,
            ui_length: ui_length as u32,
        }
    }
}
