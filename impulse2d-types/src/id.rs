//! Stable entity identifiers.
//!
//! Every entity in the engine is addressed by a stable ID that survives
//! swap-deletion of other entities. IDs are allocated from a fixed range
//! `0..capacity` and recycled LIFO; they are *not* generationally tagged,
//! so an ID deleted and immediately reused is indistinguishable from the
//! original.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Unique identifier for a particle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ParticleId(pub u32);

impl ParticleId {
    /// Create a new particle ID.
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Get the raw ID value.
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl From<u32> for ParticleId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for ParticleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Particle({})", self.0)
    }
}

/// Unique identifier for a distance constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DistanceConstraintId(pub u32);

impl DistanceConstraintId {
    /// Create a new distance constraint ID.
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Get the raw ID value.
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl From<u32> for DistanceConstraintId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for DistanceConstraintId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "DistanceConstraint({})", self.0)
    }
}

/// Unique identifier for an angular constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct AngularConstraintId(pub u32);

impl AngularConstraintId {
    /// Create a new angular constraint ID.
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Get the raw ID value.
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl From<u32> for AngularConstraintId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for AngularConstraintId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "AngularConstraint({})", self.0)
    }
}
