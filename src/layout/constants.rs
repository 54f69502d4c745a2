//! Constants and field offsets for the shared region layout
//!
//! Every offset below is a byte offset from the start of its section. Atomic
//! fields are naturally aligned; all scalars are little-endian.

/// Cache line size used to separate sections (64 bytes on most x86_64 systems)
pub const CACHE_LINE_SIZE: usize = 64;

/// `b"GPUSHMEM"` as a little-endian `u64`
pub const GPUSHARED_MAGIC: u64 = u64::from_le_bytes(*b"GPUSHMEM");

/// Current schema version
pub const SCHEMA_VERSION: u32 = 1;

/// Default scene payload capacity per slot (8 MiB)
pub const MAX_SCENE_SIZE: usize = 8 * 1024 * 1024;

/// Default UI payload capacity per slot (one 4K RGBA framebuffer)
pub const MAX_UI_SIZE: usize = 3840 * 2160 * 4;

/// Number of frame slots in the double buffer
pub const FRAME_SLOT_COUNT: usize = 2;

/// Number of event records in the input ring
pub const INPUT_RING_CAPACITY: u32 = 256;

/// Region initialization states stored in the header
pub mod init_state {
    /// Freshly created, contents not yet written
    pub const UNINIT: u32 = 0;
    /// The creator is writing the rest state
    pub const INITIALIZING: u32 = 1;
    /// Rest state written, safe to attach
    pub const READY: u32 = 2;
    /// Torn down; the name is being unlinked and will be created afresh
    pub const RETIRED: u32 = 3;
}

/// Global header fields
pub mod header_fields {
    pub const MAGIC: usize = 0; // u64
    pub const VERSION: usize = 8; // u32
    pub const INIT_STATE: usize = 12; // u32
    pub const TOTAL_SIZE: usize = 16; // u64
    pub const SCENE_CAPACITY: usize = 24; // u32
    pub const UI_CAPACITY: usize = 28; // u32
    pub const CREATOR_PID: usize = 32; // u32
    pub const CREATED_AT_MS: usize = 40; // u64
    /// Open handles across both processes; 0 once the last one closed
    pub const ATTACH_COUNT: usize = 48; // u32
    /// Start of the per-side heartbeat records
    pub const HEARTBEAT_BASE: usize = 64;
    pub const HEARTBEAT_STRIDE: usize = 16;
    /// Offsets inside one heartbeat record
    pub const HEARTBEAT_MS: usize = 0; // u64, unix millis, 0 = never
    pub const HEARTBEAT_PID: usize = 8; // u32
    pub const BYTES: usize = 128;
}

/// Frame channel control line (active slot index and shared counters)
pub mod frame_control {
    pub const ACTIVE_INDEX: usize = 0; // u32
    pub const LAST_FRAME_ID: usize = 8; // u64
    pub const FRAMES_DROPPED: usize = 16; // u64
    pub const BYTES: usize = 24;
}

/// Per-slot frame header, followed by the scene and UI payloads
pub mod slot_header {
    pub const READY: usize = 0; // u32
    pub const CONSUMED: usize = 4; // u32
    pub const FRAME_ID: usize = 8; // u64, 0 = no frame / being written
    pub const SCENE_LENGTH: usize = 16; // u32
    pub const UI_LENGTH: usize = 20; // u32
    pub const BYTES: usize = 64;
}

/// Camera pose, six little-endian `f32` fields
pub mod camera_fields {
    pub const X: usize = 0;
    pub const Y: usize = 4;
    pub const Z: usize = 8;
    pub const YAW: usize = 12;
    pub const PITCH: usize = 16;
    pub const ZOOM: usize = 20;
    pub const BYTES: usize = 24;
}

/// Resolution pair packed into one `u64`: width at +0, height at +4
pub mod resolution_fields {
    pub const PACKED: usize = 0;
    pub const WIDTH: usize = 0;
    pub const HEIGHT: usize = 4;
    pub const BYTES: usize = 8;
}

/// Input ring control words; head and tail live on separate cache lines
pub mod ring_fields {
    pub const HEAD: usize = 0; // u32
    pub const TAIL: usize = 64; // u32
    pub const DROPPED: usize = 128; // u64
    pub const EVENTS: usize = 192;
}

/// One input event record
pub mod event_fields {
    pub const KIND: usize = 0; // u8
    pub const KEY_CODE: usize = 1; // u8
    pub const MOUSE_BUTTON: usize = 2; // u8
    pub const MOUSE_X: usize = 4; // f32
    pub const MOUSE_Y: usize = 8; // f32
    pub const BYTES: usize = 12;
}

pub(crate) const fn align_up(value: usize, align: usize) -> usize {
    debug_assert!(align.is_power_of_two());
    (value + (align - 1)) & !(align - 1)
}
