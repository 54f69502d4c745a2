//! # gpushared - Shared-memory bridge between a game client and a renderer
//!
//! gpushared lets two cooperating processes on one host exchange rendering
//! data through a single named shared memory region, without locks and
//! without either side ever blocking on the other.
//!
//! ## Features
//!
//! - **Double-buffered frames**: scene and UI payloads published as one unit,
//!   newest wins, a torn frame is never returned
//! - **Input ring**: bounded lock-free SPSC queue of key and mouse events
//! - **Camera pose**: last-writer-wins floats
//! - **Resolution negotiation**: each side publishes its viewport size
//! - **Self-describing region**: magic, schema version and capacities checked
//!   on attach, per-side heartbeat
//! - **Session lifetime**: open handles are counted in the header; the last
//!   close unlinks the region and abandoned regions are recreated
//! - **C API**: raw section windows for foreign bindings (feature `c-api`)
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────┐                         ┌──────────────────┐
//! │   Game client    │                         │     Renderer     │
//! │  frame consumer  │   ┌─────────────────┐   │  frame producer  │
//! │  input producer  │──▶│  shared region  │◀──│  input consumer  │
//! │  camera writer   │   │  header         │   │  camera reader   │
//! │  resolution A    │   │  frame slots ×2 │   │  resolution B    │
//! └──────────────────┘   │  input ring     │   └──────────────────┘
//!                        │  camera, res    │
//!                        └─────────────────┘
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use gpushared::{RegionConfig, RegionHandle, Side};
//!
//! let config = RegionConfig::new("chan1").with_side(Side::Renderer);
//! let handle = RegionHandle::open_or_create(&config)?;
//! let mut producer = handle.frame_producer()?;
//! producer.publish(b"scene", b"ui")?;
//! # Ok::<(), gpushared::BridgeError>(())
//! ```

pub mod error;
pub mod layout;
pub mod memory;

pub mod camera;
pub mod frames;
pub mod handle;
pub mod input;
pub mod resolution;

#[cfg(feature = "c-api")]
pub mod ffi;

pub use camera::{CameraChannel, CameraState};
pub use error::{BridgeError, Result};
pub use frames::{
    Frame, FrameChannel, FrameConsumer, FrameProducer, FrameStats, PublishOutcome, SlotPhase,
    SlotState,
};
pub use handle::{HeartbeatInfo, PeerStatus, RawWindow, RegionHandle, RegionSnapshot};
pub use input::{InputConsumer, InputEvent, InputKind, InputProducer, InputRing, InputStats};
pub use layout::{ChannelCapacities, HeaderInfo, RegionLayout, Section, Side, Window};
pub use memory::{BackingType, OpenMode, RegionConfig, SharedMemoryRegion};
pub use resolution::{Resolution, ResolutionNegotiator};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const VERSION_MAJOR: u32 = 0;
pub const VERSION_MINOR: u32 = 1;
pub const VERSION_PATCH: u32 = 0;

/// Default configuration constants
pub mod config {
    use std::time::Duration;

    /// Region name used when none is given
    pub const DEFAULT_REGION_NAME: &str = "chan1";

    /// How long an attacher waits for the creator to publish the header
    pub const DEFAULT_ATTACH_TIMEOUT: Duration = Duration::from_secs(2);

    /// Heartbeat age after which the peer is reported stale
    pub const DEFAULT_PEER_TIMEOUT: Duration = Duration::from_secs(3);

    /// Permissions of newly created named regions
    pub const DEFAULT_PERMISSIONS: u32 = 0o600;
}
