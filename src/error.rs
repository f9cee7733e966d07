//! Error types for the ring-disruptor core.

use thiserror::Error;

/// Result type alias for ring-disruptor operations.
pub type Result<T> = std::result::Result<T, RingError>;

/// Fatal error conditions raised by the core.
///
/// Non-fatal outcomes (empty claim/consume, commit-miss) are never
/// represented here — they are encoded in the ordinary return value of the
/// operation that produced them.
#[derive(Error, Debug)]
pub enum RingError {
    /// `shm_open`/`ftruncate`/`mmap`/`munmap`/`shm_unlink` failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Geometry or construction parameter is invalid.
    #[error("invalid configuration: {message}")]
    InvalidConfig {
        /// Description of the invalid parameter.
        message: String,
    },

    /// A new mapping in this process collides with one still tracked as
    /// active, and no non-overlapping base could be found.
    #[error("shared region collision: {message}")]
    RegionCollision {
        /// Description of the colliding region.
        message: String,
    },

    /// A condition that should not be reachable in a correctly functioning
    /// system (logic error).
    #[error("unexpected error: {message}")]
    Unexpected {
        /// Description of the unexpected condition.
        message: String,
    },
}

impl RingError {
    /// Build an `InvalidConfig` error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Build a `RegionCollision` error.
    pub fn collision(message: impl Into<String>) -> Self {
        Self::RegionCollision {
            message: message.into(),
        }
    }

    /// Build an `Unexpected` error.
    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_carries_its_message() {
        let err = RingError::config("bad geometry");
        assert!(matches!(err, RingError::InvalidConfig { .. }));
        assert_eq!(err.to_string(), "invalid configuration: bad geometry");
    }

    #[test]
    fn collision_carries_its_message() {
        let err = RingError::collision("overlap at 0x1000");
        assert_eq!(
            err.to_string(),
            "shared region collision: overlap at 0x1000"
        );
    }
}
