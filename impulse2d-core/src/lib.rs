//! impulse2d-core: impulse-projection 2D particle physics.
//!
//! A real-time particle-and-constraint engine operating in impulse space
//! with sequential Gauss-Seidel relaxation. It simulates thousands of
//! circular particles coupled by distance constraints, angular constraints,
//! spatial-hash collision contacts, and optional N-body gravity.
//!
//! # Architecture
//!
//! Every store is a Struct-of-Arrays with a dense packed region `[0, N)`,
//! swap-deletion, and stable IDs resolved through a bidirectional ID↔index
//! map ([`SlotAllocator`]). Cross-store references always use stable IDs;
//! dense indices are re-resolved inside every hot loop because any deletion
//! may move rows.
//!
//! # Tick pipeline
//!
//! [`World::step`] runs a fixed sequence each tick:
//!
//! ```text
//! apply external forces → broadphase build → broadphase query →
//! compute constraint data → prune stale contacts → warm start →
//! N × (angular, distance, contact) Gauss-Seidel sweeps → integrate
//! ```
//!
//! Per-element passes (integration, gravity accumulation, geometry
//! computation) fan out on rayon; the Gauss-Seidel sweeps are intrinsically
//! sequential and stay that way.
//!
//! # Example
//!
//! ```
//! use impulse2d_core::World;
//! use impulse2d_types::{Capacities, Color, ObjectType, Vec2, WorldConfig};
//!
//! let mut world = World::new(
//!     Capacities::new(1024, 256, 64, 2048),
//!     WorldConfig::default().with_gravity(Vec2::new(0.0, 100.0)),
//! )
//! .unwrap();
//!
//! let id = world
//!     .create_particle(
//!         ObjectType::PARTICLE,
//!         Vec2::new(640.0, 0.0),
//!         Vec2::zeros(),
//!         1.0,
//!         4.0,
//!         Color::WHITE,
//!     )
//!     .unwrap();
//!
//! world.step(0.01);
//! assert!(world.particle_position_by_id(id).y > 0.0);
//! ```

#![deny(clippy::unwrap_used, clippy::expect_used)]
#![warn(missing_docs)]
// Allow certain clippy lints that fight the SoA hot-loop style
#![allow(
    clippy::missing_const_for_fn,   // Most methods touch Vec state
    clippy::cast_precision_loss,    // usize to f32 for cell math is fine
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::missing_errors_doc      // Error docs added where non-obvious
)]

mod angular;
mod contact;
mod distance;
mod gravity;
mod grid;
mod particle;
mod slots;
mod world;

pub use angular::{AngularConstraintStore, AngularParams};
pub use contact::{ContactSnapshot, ContactStore};
pub use distance::{DistanceConstraintStore, DistanceParams};
pub use gravity::NewtonianGravity;
pub use grid::{CellRange, SpatialHashGrid};
pub use particle::ParticleStore;
pub use slots::{Removal, SlotAllocator};
pub use world::{World, WorldCounts};

pub use impulse2d_types as types;
