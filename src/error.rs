//! Error types and handling for gpushared

/// Result type alias for gpushared operations
pub type Result<T> = std::result::Result<T, BridgeError>;

/// Errors surfaced by the region lifecycle and the channel endpoints.
///
/// Backpressure conditions (full input ring, dropped frames, discarded torn
/// reads) are not errors: they show up in return values and counters.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    /// I/O related errors (shm_open, file operations, mmap)
    #[error("I/O error: {message}")]
    Io {
        message: String,
        #[source]
        source: Option<std::io::Error>,
    },

    /// Mapping the region into this process failed
    #[error("Mapping error: {message}")]
    Mapping { message: String },

    /// Invalid parameters or configuration
    #[error("Invalid parameter: {parameter} - {message}")]
    InvalidParameter { parameter: String, message: String },

    /// The creator never finished initializing the region
    #[error("Region not ready: {name} (waited {waited_ms}ms)")]
    RegionNotReady { name: String, waited_ms: u64 },

    /// The attached region was laid out by an incompatible build
    #[error("Layout mismatch in {field}: expected {expected}, found {actual}")]
    LayoutMismatch {
        field: &'static str,
        expected: u64,
        actual: u64,
    },

    /// Schema version mismatch between the two sides
    #[error("Version mismatch: expected {expected}, got {actual}")]
    VersionMismatch { expected: u64, actual: u64 },

    /// A frame payload larger than the slot capacity
    #[error("Payload too large for {buffer}: {length} bytes exceeds capacity {capacity}")]
    PayloadTooLarge {
        buffer: &'static str,
        length: usize,
        capacity: usize,
    },

    /// An input record that does not decode to a known event kind
    #[error("Corrupt input event at ring index {index}: kind byte {kind:#04x}")]
    CorruptEvent { index: u32, kind: u8 },

    /// A single-writer or single-reader role is already held
    #[error("Concurrency error: {message}")]
    Concurrency { message: String },

    /// Platform-specific errors
    #[error("Platform error: {message}")]
    Platform { message: String },
}

impl BridgeError {
    /// Create an I/O error from a standard I/O error
    pub fn from_io(source: std::io::Error, context: &str) -> Self {
        Self::Io {
            message: format!("{}: {}", context, source),
            source: Some(source),
        }
    }

    /// Create a mapping error
    pub fn mapping(message: impl Into<String>) -> Self {
        Self::Mapping {
            message: message.into(),
        }
    }

    /// Create an invalid parameter error
    pub fn invalid_parameter(parameter: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidParameter {
            parameter: parameter.into(),
            message: message.into(),
        }
    }

    /// Create a region not ready error
    pub fn region_not_ready(name: impl Into<String>, waited_ms: u64) -> Self {
        Self::RegionNotReady {
            name: name.into(),
            waited_ms,
        }
    }

    /// Create a layout mismatch error
    pub fn layout_mismatch(field: &'static str, expected: u64, actual: u64) -> Self {
        Self::LayoutMismatch {
            field,
            expected,
            actual,
        }
    }

    /// Create a version mismatch error
    pub fn version_mismatch(expected: u64, actual: u64) -> Self {
        Self::VersionMismatch { expected, actual }
    }

    /// Create a payload too large error
    pub fn payload_too_large(buffer: &'static str, length: usize, capacity: usize) -> Self {
        Self::PayloadTooLarge {
            buffer,
            length,
            capacity,
        }
    }

    /// Create a corrupt event error
    pub fn corrupt_event(index: u32, kind: u8) -> Self {
        Self::CorruptEvent { index, kind }
    }

    /// Create a concurrency error
    pub fn concurrency(message: impl Into<String>) -> Self {
        Self::Concurrency {
            message: message.into(),
        }
    }

    /// Create a platform error
    pub fn platform(message: impl Into<String>) -> Self {
        Self::Platform {
            message: message.into(),
        }
    }

    /// Whether the failure came from the OS create/open/map surface
    pub fn is_os_failure(&self) -> bool {
        matches!(self, Self::Io { .. } | Self::Mapping { .. } | Self::Platform { .. })
    }
}

impl From<std::io::Error> for BridgeError {
    fn from(err: std::io::Error) -> Self {
        Self::from_io(err, "I/O operation failed")
    }
}

impl From<nix::errno::Errno> for BridgeError {
    fn from(err: nix::errno::Errno) -> Self {
        Self::from_io(std::io::Error::from(err), "System call failed")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = BridgeError::mapping("mmap failed");
        assert!(matches!(err, BridgeError::Mapping { .. }));
        assert!(err.is_os_failure());

        let err = BridgeError::payload_too_large("scene", 10, 4);
        assert!(matches!(err, BridgeError::PayloadTooLarge { length: 10, .. }));
        assert!(!err.is_os_failure());

        let err = BridgeError::region_not_ready("chan1", 250);
        assert!(matches!(err, BridgeError::RegionNotReady { .. }));
    }

    #[test]
    fn test_error_display() {
        let err = BridgeError::layout_mismatch("scene_capacity", 1024, 2048);
        let display = format!("{}", err);
        assert!(display.contains("scene_capacity"));
        assert!(display.contains("1024"));

        let err = BridgeError::corrupt_event(7, 0x2a);
        assert!(format!("{}", err).contains("0x2a"));
    }

    #[test]
    fn test_errno_conversion() {
        let err: BridgeError = nix::errno::Errno::EEXIST.into();
        assert!(matches!(err, BridgeError::Io { source: Some(_), .. }));
    }
}
