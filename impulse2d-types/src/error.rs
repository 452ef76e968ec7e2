//! Error types for engine operations.

use thiserror::Error;

/// Errors that can occur when creating entities or configuring the world.
///
/// The engine never panics and never leaves a store in an invalid state:
/// every fallible operation either succeeds or returns one of these and
/// changes nothing.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// A store's fixed capacity is exhausted.
    #[error("{kind} store full (capacity {capacity})")]
    CapacityExhausted {
        /// Which store rejected the create.
        kind: &'static str,
        /// The store's fixed capacity.
        capacity: usize,
    },

    /// A referenced particle does not exist (deleted or never created).
    #[error("unknown particle ID: {0}")]
    UnknownParticle(u32),

    /// A referenced distance constraint does not exist.
    #[error("unknown distance constraint ID: {0}")]
    UnknownDistanceConstraint(u32),

    /// Invalid configuration.
    #[error("invalid configuration: {reason}")]
    InvalidConfig {
        /// Description of the configuration error.
        reason: String,
    },
}

impl EngineError {
    /// Create a capacity-exhausted error.
    #[must_use]
    pub fn full(kind: &'static str, capacity: usize) -> Self {
        Self::CapacityExhausted { kind, capacity }
    }

    /// Create an invalid configuration error.
    #[must_use]
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }

    /// Check if this is a capacity error.
    #[must_use]
    pub fn is_full(&self) -> bool {
        matches!(self, Self::CapacityExhausted { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let err = EngineError::full("particle", 128);
        assert_eq!(err.to_string(), "particle store full (capacity 128)");
        assert!(err.is_full());

        let err = EngineError::UnknownParticle(9);
        assert_eq!(err.to_string(), "unknown particle ID: 9");
        assert!(!err.is_full());
    }
}
