//! The two roles that attach to a region

use serde::{Deserialize, Serialize};

/// Which process a handle belongs to.
///
/// The client publishes camera and input and consumes frames; the renderer
/// does the inverse. Each side owns one resolution pair and one heartbeat.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    #[default]
    Client,
    Renderer,
}

impl Side {
    /// Index of this side's per-side records (resolution pair, heartbeat)
    pub fn index(self) -> usize {
        match self {
            Side::Client => 0,
            Side::Renderer => 1,
        }
    }

    /// The opposite side
    pub fn peer(self) -> Self {
        match self {
            Side::Client => Side::Renderer,
            Side::Renderer => Side::Client,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Side::Client => "client",
            Side::Renderer => "renderer",
        }
    }

    /// Parse `0`/`1` as used by the C API
    pub fn from_u32(value: u32) -> Option<Self> {
        match value {
            0 => Some(Side::Client),
            1 => Some(Side::Renderer),
            _ => None,
        }
    }
}

impl std::str::FromStr for Side {
    type Err = crate::error::BridgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "client" => Ok(Side::Client),
            "renderer" => Ok(Side::Renderer),
            _ => Err(crate::error::BridgeError::invalid_parameter(
                "side",
                format!("expected 'client' or 'renderer', got '{}'", s),
            )),
        }
    }
}
