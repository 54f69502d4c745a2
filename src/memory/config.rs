//! Configuration types for shared memory regions

use serde::{Deserialize, Serialize};
use std::{path::PathBuf, time::Duration};

use crate::layout::{ChannelCapacities, Side};

/// Types of shared memory backing
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum BackingType {
    /// Named POSIX shared memory object (`shm_open`)
    #[default]
    PosixShm,
    /// File-backed shared memory
    FileBacked,
    /// Process-local anonymous mapping, never shared by name
    Anonymous,
}

impl BackingType {
    /// Check if this backing type is supported on the current platform
    pub fn is_supported(&self) -> bool {
        match self {
            BackingType::PosixShm => cfg!(unix),
            BackingType::FileBacked => true,
            BackingType::Anonymous => true,
        }
    }

    /// Whether a second process can attach to the region by name
    pub fn is_named(&self) -> bool {
        !matches!(self, BackingType::Anonymous)
    }

    /// Get a human-readable name for the backing type
    pub fn name(&self) -> &'static str {
        match self {
            BackingType::PosixShm => "posix-shm",
            BackingType::FileBacked => "file-backed",
            BackingType::Anonymous => "anonymous",
        }
    }
}

/// Configuration for opening a region
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegionConfig {
    /// Name shared by both processes
    pub name: String,
    /// Backing type for the shared memory
    pub backing_type: BackingType,
    /// Optional file path for file-backed regions
    pub file_path: Option<PathBuf>,
    /// Permissions for a newly created object (Unix permissions)
    pub permissions: u32,
    /// Which role this process plays
    pub side: Side,
    /// Frame payload capacities; must match on both sides
    pub capacities: ChannelCapacities,
    /// How long an attacher waits for the creator to finish initializing
    pub attach_timeout: Duration,
    /// Heartbeat age after which a side counts as gone. A region whose
    /// every recorded heartbeat is older than this is recreated on open.
    pub peer_timeout: Duration,
}

impl Default for RegionConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            backing_type: BackingType::default(),
            file_path: None,
            permissions: crate::config::DEFAULT_PERMISSIONS,
            side: Side::default(),
            capacities: ChannelCapacities::default(),
            attach_timeout: crate::config::DEFAULT_ATTACH_TIMEOUT,
            peer_timeout: crate::config::DEFAULT_PEER_TIMEOUT,
        }
    }
}

impl RegionConfig {
    /// Create a new region configuration
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Set the backing type
    pub fn with_backing_type(mut self, backing_type: BackingType) -> Self {
        self.backing_type = backing_type;
        self
    }

    /// Set the file path for file-backed regions
    pub fn with_file_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.file_path = Some(path.into());
        self
    }

    /// Set the permissions for a newly created region
    pub fn with_permissions(mut self, permissions: u32) -> Self {
        self.permissions = permissions;
        self
    }

    /// Set which side this process plays
    pub fn with_side(mut self, side: Side) -> Self {
        self.side = side;
        self
    }

    /// Set the frame payload capacities
    pub fn with_capacities(mut self, capacities: ChannelCapacities) -> Self {
        self.capacities = capacities;
        self
    }

    /// Set the attach timeout
    pub fn with_attach_timeout(mut self, timeout: Duration) -> Self {
        self.attach_timeout = timeout;
        self
    }

    /// Set the heartbeat age after which a side counts as gone
    pub fn with_peer_timeout(mut self, timeout: Duration) -> Self {
        self.peer_timeout = timeout;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> crate::Result<()> {
        use crate::error::BridgeError;

        if self.name.is_empty() {
            return Err(BridgeError::invalid_parameter(
                "name",
                "Region name cannot be empty",
            ));
        }

        if self.name.contains('\0') {
            return Err(BridgeError::invalid_parameter(
                "name",
                "Region name contains null bytes",
            ));
        }

        if self.backing_type == BackingType::PosixShm {
            if self.name.contains('/') {
                return Err(BridgeError::invalid_parameter(
                    "name",
                    "Shared memory object names cannot contain '/'",
                ));
            }
            // NAME_MAX minus the leading slash
            if self.name.len() > 254 {
                return Err(BridgeError::invalid_parameter(
                    "name",
                    "Shared memory object name is too long",
                ));
            }
        }

        if !self.backing_type.is_supported() {
            return Err(BridgeError::invalid_parameter(
                "backing_type",
                format!(
                    "Backing type {} is not supported on this platform",
                    self.backing_type.name()
                ),
            ));
        }

        self.capacities.validate()
    }

    /// Get the default file path for this region
    pub fn default_file_path(&self) -> PathBuf {
        self.file_path
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join(format!("gpushared_{}", self.name)))
    }

    /// Name passed to `shm_open`
    pub fn shm_name(&self) -> String {
        format!("/{}", self.name)
    }
}
