//! Offset table for the shared region
//!
//! The region is laid out as a sequence of cache-line aligned sections:
//!
//! ```text
//! ┌──────────────┬───────────────┬────────┬──────────────┬──────────────┐
//! │ header (128) │ frame control │ camera │ resolution A │ resolution B │
//! ├──────────────┴───────────────┴────────┴──────────────┴──────────────┤
//! │ input ring: head │ tail │ dropped │ 256 × event record              │
//! ├─────────────────────────────────────────────────────────────────────┤
//! │ frame slot 0: header (64) │ scene payload │ ui payload              │
//! ├─────────────────────────────────────────────────────────────────────┤
//! │ frame slot 1: header (64) │ scene payload │ ui payload              │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{BridgeError, Result};

use super::{constants::*, side::Side};

/// Sub-structures of the region that are exposed as windows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u32)]
pub enum Section {
    Header = 0,
    Camera = 1,
    FrameSlot0 = 2,
    FrameSlot1 = 3,
    ActiveSlotIndex = 4,
    InputRing = 5,
    ResolutionA = 6,
    ResolutionB = 7,
}

impl Section {
    pub const ALL: [Section; 8] = [
        Section::Header,
        Section::Camera,
        Section::FrameSlot0,
        Section::FrameSlot1,
        Section::ActiveSlotIndex,
        Section::InputRing,
        Section::ResolutionA,
        Section::ResolutionB,
    ];

    pub fn from_u32(value: u32) -> Option<Self> {
        Self::ALL.get(value as usize).copied()
    }

    /// Frame slot section for slot `index` (0 or 1)
    pub fn frame_slot(index: usize) -> Self {
        match index {
            0 => Section::FrameSlot0,
            1 => Section::FrameSlot1,
            _ => panic!("frame slot index {} out of range", index),
        }
    }

    /// Resolution pair owned by `side` (A = client, B = renderer)
    pub fn resolution(side: Side) -> Self {
        match side {
            Side::Client => Section::ResolutionA,
            Side::Renderer => Section::ResolutionB,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Section::Header => "header",
            Section::Camera => "camera",
            Section::FrameSlot0 => "frame-slot-0",
            Section::FrameSlot1 => "frame-slot-1",
            Section::ActiveSlotIndex => "active-slot-index",
            Section::InputRing => "input-ring",
            Section::ResolutionA => "resolution-a",
            Section::ResolutionB => "resolution-b",
        }
    }
}

/// A byte range within the region
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Window {
    pub offset: usize,
    pub len: usize,
}

impl Window {
    pub fn end(&self) -> usize {
        self.offset + self.len
    }

    pub fn overlaps(&self, other: &Window) -> bool {
        self.offset < other.end() && other.offset < self.end()
    }
}

/// Fixed payload capacities of each frame slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelCapacities {
    /// Scene payload bytes per slot
    pub scene: usize,
    /// UI payload bytes per slot
    pub ui: usize,
}

impl Default for ChannelCapacities {
    fn default() -> Self {
        Self {
            scene: MAX_SCENE_SIZE,
            ui: MAX_UI_SIZE,
        }
    }
}

impl ChannelCapacities {
    pub fn new(scene: usize, ui: usize) -> Self {
        Self { scene, ui }
    }

    /// Validate the capacities
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [("scene", self.scene), ("ui", self.ui)] {
            if value == 0 {
                return Err(BridgeError::invalid_parameter(
                    name,
                    "Payload capacity must be greater than 0",
                ));
            }
            if value > u32::MAX as usize {
                return Err(BridgeError::invalid_parameter(
                    name,
                    "Payload capacity must fit in a u32 length field",
                ));
            }
        }
        Ok(())
    }
}

/// Byte offsets of every section, computed once from the capacities
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegionLayout {
    capacities: ChannelCapacities,
    header: Window,
    frame_control: Window,
    camera: Window,
    resolution: [Window; 2],
    input_ring: Window,
    frame_slots: [Window; FRAME_SLOT_COUNT],
    total_size: usize,
}

impl RegionLayout {
    /// Compute the layout for the given payload capacities
    pub fn new(capacities: ChannelCapacities) -> Result<Self> {
        capacities.validate()?;

        let mut cursor = 0usize;
        let mut next = |len: usize| {
            let window = Window {
                offset: cursor,
                len,
            };
            cursor = align_up(cursor + len, CACHE_LINE_SIZE);
            window
        };

        let header = next(header_fields::BYTES);
        let frame_control = next(frame_control::BYTES);
        let camera = next(camera_fields::BYTES);
        let resolution = [
            next(resolution_fields::BYTES),
            next(resolution_fields::BYTES),
        ];
        let input_ring = next(
            ring_fields::EVENTS + INPUT_RING_CAPACITY as usize * event_fields::BYTES,
        );

        let slot_len = slot_header::BYTES
            + align_up(capacities.scene, CACHE_LINE_SIZE)
            + align_up(capacities.ui, CACHE_LINE_SIZE);
        let frame_slots = [next(slot_len), next(slot_len)];

        let total_size = cursor;
        log::debug!(
            "computed region layout: {} bytes (scene {} / ui {} per slot)",
            total_size,
            capacities.scene,
            capacities.ui
        );

        Ok(Self {
            capacities,
            header,
            frame_control,
            camera,
            resolution,
            input_ring,
            frame_slots,
            total_size,
        })
    }

    pub fn capacities(&self) -> ChannelCapacities {
        self.capacities
    }

    /// Total number of bytes the region must be mapped with
    pub fn total_size(&self) -> usize {
        self.total_size
    }

    /// Window for one section
    pub fn window(&self, section: Section) -> Window {
        match section {
            Section::Header => self.header,
            Section::Camera => self.camera,
            Section::FrameSlot0 => self.frame_slots[0],
            Section::FrameSlot1 => self.frame_slots[1],
            Section::ActiveSlotIndex => self.frame_control,
            Section::InputRing => self.input_ring,
            Section::ResolutionA => self.resolution[0],
            Section::ResolutionB => self.resolution[1],
        }
    }

    /// Absolute offset of frame slot `index`'s header
    pub fn slot_header(&self, index: usize) -> usize {
        self.frame_slots[index].offset
    }

    /// Scene payload window of frame slot `index`
    pub fn slot_scene(&self, index: usize) -> Window {
        Window {
            offset: self.frame_slots[index].offset + slot_header::BYTES,
            len: self.capacities.scene,
        }
    }

    /// UI payload window of frame slot `index`
    pub fn slot_ui(&self, index: usize) -> Window {
        Window {
            offset: self.frame_slots[index].offset
                + slot_header::BYTES
                + align_up(self.capacities.scene, CACHE_LINE_SIZE),
            len: self.capacities.ui,
        }
    }

    /// Absolute offset of the heartbeat record for `side`
    pub fn heartbeat(&self, side: Side) -> usize {
        self.header.offset
            + header_fields::HEARTBEAT_BASE
            + side.index() * header_fields::HEARTBEAT_STRIDE
    }
}
