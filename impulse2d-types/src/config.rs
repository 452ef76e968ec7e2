//! Configuration types for the simulation world.
//!
//! [`Capacities`] fixes the size of every store up front (the engine never
//! reallocates mid-simulation); [`WorldConfig`] controls forces, solver
//! iteration count, and the broadphase grid.

use nalgebra::Vector2;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{EngineError, Result};

/// Fixed store capacities for a world.
///
/// Capacities are hard limits: a create against a full store is rejected
/// with [`EngineError::CapacityExhausted`]. A capacity of zero is valid and
/// simply makes every create of that kind fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Capacities {
    /// Maximum number of live particles.
    pub max_particles: usize,
    /// Maximum number of live distance constraints.
    pub max_distance_constraints: usize,
    /// Maximum number of live angular constraints.
    pub max_angular_constraints: usize,
    /// Maximum number of live contacts.
    pub max_contacts: usize,
}

impl Capacities {
    /// Create capacities for each store.
    #[must_use]
    pub const fn new(
        max_particles: usize,
        max_distance_constraints: usize,
        max_angular_constraints: usize,
        max_contacts: usize,
    ) -> Self {
        Self {
            max_particles,
            max_distance_constraints,
            max_angular_constraints,
            max_contacts,
        }
    }

    /// Particles only; every constraint store sized zero.
    #[must_use]
    pub const fn particles_only(max_particles: usize) -> Self {
        Self::new(max_particles, 0, 0, 0)
    }
}

/// Main configuration for a simulation world.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct WorldConfig {
    /// Uniform gravity acceleration in pixels/s². Applied to every dynamic
    /// particle each tick as the impulse `gravity * dt`.
    pub gravity: Vector2<f32>,
    /// Number of Gauss-Seidel solver iterations per tick.
    pub num_iterations: u32,
    /// Broadphase grid cell size in pixels.
    pub grid_cell_size: u32,
    /// World box width in pixels (broadphase coverage only; particles may
    /// leave the box and simply stop generating contacts).
    pub world_width: u32,
    /// World box height in pixels.
    pub world_height: u32,
    /// Whether the N-body Newtonian gravity pass runs each tick.
    pub newtonian: bool,
    /// Gravitational constant for the N-body pass.
    pub newtonian_constant: f32,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            gravity: Vector2::new(0.0, 98_200.0),
            num_iterations: 10,
            grid_cell_size: 12,
            world_width: 1280,
            world_height: 720,
            newtonian: false,
            newtonian_constant: 1.0,
        }
    }
}

impl WorldConfig {
    /// Set the uniform gravity vector.
    #[must_use]
    pub fn with_gravity(mut self, gravity: Vector2<f32>) -> Self {
        self.gravity = gravity;
        self
    }

    /// Disable uniform gravity.
    #[must_use]
    pub fn zero_gravity(mut self) -> Self {
        self.gravity = Vector2::zeros();
        self
    }

    /// Set the solver iteration count.
    #[must_use]
    pub fn with_iterations(mut self, num_iterations: u32) -> Self {
        self.num_iterations = num_iterations;
        self
    }

    /// Set the broadphase cell size.
    #[must_use]
    pub fn with_cell_size(mut self, grid_cell_size: u32) -> Self {
        self.grid_cell_size = grid_cell_size;
        self
    }

    /// Set the world box dimensions.
    #[must_use]
    pub fn with_world_size(mut self, width: u32, height: u32) -> Self {
        self.world_width = width;
        self.world_height = height;
        self
    }

    /// Enable the N-body Newtonian gravity pass with the given constant.
    #[must_use]
    pub fn with_newtonian(mut self, constant: f32) -> Self {
        self.newtonian = true;
        self.newtonian_constant = constant;
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if !self.gravity.x.is_finite() || !self.gravity.y.is_finite() {
            return Err(EngineError::invalid_config("gravity must be finite"));
        }

        if self.num_iterations == 0 {
            return Err(EngineError::invalid_config(
                "num_iterations must be at least 1",
            ));
        }

        if self.grid_cell_size == 0 {
            return Err(EngineError::invalid_config("grid_cell_size must be positive"));
        }

        if self.world_width == 0 || self.world_height == 0 {
            return Err(EngineError::invalid_config(
                "world box must have positive dimensions",
            ));
        }

        if !self.newtonian_constant.is_finite() {
            return Err(EngineError::invalid_config(
                "newtonian_constant must be finite",
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_defaults() {
        let config = WorldConfig::default();
        assert_relative_eq!(config.gravity.y, 98_200.0);
        assert_relative_eq!(config.gravity.x, 0.0);
        assert_eq!(config.num_iterations, 10);
        assert_eq!(config.grid_cell_size, 12);
        assert_eq!(config.world_width, 1280);
        assert_eq!(config.world_height, 720);
        assert!(!config.newtonian);
        config.validate().unwrap();
    }

    #[test]
    fn test_builders() {
        let config = WorldConfig::default()
            .zero_gravity()
            .with_iterations(4)
            .with_cell_size(32)
            .with_world_size(640, 480)
            .with_newtonian(6.674e-2);

        assert_relative_eq!(config.gravity.norm(), 0.0);
        assert_eq!(config.num_iterations, 4);
        assert!(config.newtonian);
        config.validate().unwrap();
    }

    #[test]
    fn test_validate_rejects_bad_configs() {
        let bad = WorldConfig::default().with_iterations(0);
        assert!(bad.validate().is_err());

        let bad = WorldConfig::default().with_cell_size(0);
        assert!(bad.validate().is_err());

        let bad = WorldConfig::default().with_world_size(0, 720);
        assert!(bad.validate().is_err());

        let bad = WorldConfig::default().with_gravity(Vector2::new(f32::NAN, 0.0));
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_capacities() {
        let caps = Capacities::particles_only(100);
        assert_eq!(caps.max_particles, 100);
        assert_eq!(caps.max_contacts, 0);
    }
}
