//! OS-facing shared memory surface: create or open a named object, map it,
//! and release it

pub mod config;
pub mod regions;

pub use config::{BackingType, RegionConfig};
pub use regions::{OpenMode, SharedMemoryRegion};
