//! Core types for the impulse2d particle physics engine.
//!
//! This crate provides the foundational data types shared by the engine and
//! its embedders:
//!
//! - [`ParticleId`], [`DistanceConstraintId`], [`AngularConstraintId`] -
//!   stable entity identifiers
//! - [`Color`] - opaque per-particle RGB tag
//! - [`ObjectType`] - caller-owned classification bitmask
//! - [`WorldConfig`], [`Capacities`] - simulation configuration
//! - [`EngineError`] - error taxonomy for fallible operations
//!
//! # Design Philosophy
//!
//! These types are **pure data**. They carry no physics and no behavior
//! beyond construction, validation, and conversion. They are the common
//! language between:
//!
//! - The simulation core (`impulse2d-core`)
//! - Rendering layers (which consume positions, radii, and colors)
//! - Scenario builders and test harnesses
//!
//! # Coordinate System
//!
//! Screen-style 2D coordinates, 32-bit floats throughout:
//!
//! - X: right
//! - Y: down (gravity defaults to +Y)
//! - Units: pixels, seconds
//!
//! # Example
//!
//! ```
//! use impulse2d_types::{Capacities, WorldConfig};
//!
//! let caps = Capacities::new(4096, 1024, 512, 8192);
//! let config = WorldConfig::default().zero_gravity();
//!
//! assert!(config.validate().is_ok());
//! assert_eq!(caps.max_particles, 4096);
//! ```

#![deny(clippy::unwrap_used, clippy::expect_used)]
#![warn(missing_docs)]
// Allow certain clippy lints that are overly pedantic for type definitions
#![allow(
    clippy::missing_const_for_fn,  // Many methods can't be const due to nalgebra
    clippy::cast_precision_loss,   // u32 to f32 is fine for small tag values
    clippy::missing_errors_doc     // Error docs added where non-obvious
)]

mod color;
mod config;
mod error;
mod id;
mod object;

pub use color::Color;
pub use config::{Capacities, WorldConfig};
pub use error::EngineError;
pub use id::{AngularConstraintId, DistanceConstraintId, ParticleId};
pub use object::ObjectType;

// Re-export the math type used across the engine's public surface.
pub use nalgebra::Vector2;

/// 2D vector of 32-bit floats, the engine's universal math type.
pub type Vec2 = Vector2<f32>;

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;
