//! Byte layout of the shared region
//!
//! The region is addressed only through the offset table in [`offsets`] and
//! the checked accessors in [`bytes`]; no Rust struct is ever overlaid on the
//! mapping. The layout is:
//! 1. Global header (magic, version, init state, capacities, heartbeats)
//! 2. Frame channel control (active slot index, frame id counter)
//! 3. Camera pose and the two resolution pairs
//! 4. Input event ring
//! 5. Two frame slots (header + scene payload + UI payload)

pub mod bytes;
pub mod constants;
pub mod header;
pub mod offsets;
pub mod side;

pub use bytes::SharedBytes;
pub use constants::*;
pub use header::{GlobalHeader, HeaderInfo};
pub use offsets::{ChannelCapacities, RegionLayout, Section, Window};
pub use side::Side;
