//! Caller-owned object classification.
//!
//! `ObjectType` is a bitmask reserved for embedders: the engine stores it
//! per particle and hands it back, but never branches on it. The particle
//! store keeps the value in a float column alongside the other scalar
//! columns, so the mask is limited to small exactly-representable values.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Classification bitmask attached to each particle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ObjectType(pub u32);

impl ObjectType {
    /// Free-standing particle.
    pub const PARTICLE: Self = Self(1);
    /// Wheel hub particle.
    pub const WHEEL: Self = Self(2);
    /// Particle belonging to a constraint chain.
    pub const CONSTRAINT: Self = Self(4);
    /// Particle belonging to a pinned constraint chain.
    pub const FIXED_CONSTRAINT: Self = Self(8);
    /// Fluid particle.
    pub const FLUID_PARTICLE: Self = Self(16);
    /// Soft-body particle.
    pub const SOFT_BODY: Self = Self(32);
    /// Anchor particle of a pinned constraint.
    pub const FIXED_CONSTRAINT_PARTICLE: Self = Self(64);

    /// Get the raw bitmask.
    #[must_use]
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Whether all bits of `other` are set in `self`.
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Encode for storage in a float column.
    ///
    /// All mask values fit in the f32 mantissa, so the round-trip through
    /// [`from_f32`](Self::from_f32) is lossless.
    #[must_use]
    pub fn as_f32(self) -> f32 {
        self.0 as f32
    }

    /// Decode from a float column value.
    #[must_use]
    pub fn from_f32(value: f32) -> Self {
        Self(value.max(0.0) as u32)
    }
}

impl std::ops::BitOr for ObjectType {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl std::ops::BitOrAssign for ObjectType {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}
