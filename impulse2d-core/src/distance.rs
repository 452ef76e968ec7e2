//! Distance constraints between particle pairs.
//!
//! A distance constraint is a stiff spring-damper link that drives the gap
//! between two particles toward a rest length. Geometry and rest impulses
//! are recomputed in parallel each tick; the corrective pass is a
//! sequential symmetric Gauss-Seidel sweep over the shared particle
//! impulse column.
//!
//! Constraints reference particles by stable ID and re-resolve dense
//! indices inside every loop, because a swap-delete anywhere in the
//! particle store can move rows between ticks.

use impulse2d_types::{DistanceConstraintId, EngineError, ParticleId, Result, Vec2};
use nalgebra::Vector2;
use rayon::prelude::*;

use crate::particle::{ParticleStore, SolverView};
use crate::slots::SlotAllocator;

/// Creation parameters for a distance constraint.
///
/// All compliance coefficients live in `[0, 1]` and are clamped on
/// creation. The defaults give a fully stiff, fully damped link.
#[derive(Debug, Clone, Copy)]
pub struct DistanceParams {
    /// Visual thickness of the link; not used by the dynamics.
    pub radius: f32,
    /// Target distance. `None` captures the live inter-particle distance
    /// at creation time.
    pub rest_length: Option<f32>,
    /// Position-error stiffness.
    pub stiffness: f32,
    /// Velocity-error damping.
    pub damping: f32,
    /// Fraction of the accumulated impulse replayed at warm start.
    pub warm_start: f32,
    /// Fraction of the solver error corrected per sweep.
    pub correction: f32,
}

impl Default for DistanceParams {
    fn default() -> Self {
        Self {
            radius: 1.0,
            rest_length: None,
            stiffness: 1.0,
            damping: 1.0,
            warm_start: 1.0,
            correction: 1.0,
        }
    }
}

/// Per-tick solver state, recomputed by [`DistanceConstraintStore::compute_data`].
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct DistanceDynamics {
    /// Unit vector from particle A to particle B, zero when degenerate.
    pub unit: Vec2,
    /// Target scalar impulse for this tick.
    pub rest_impulse: f32,
    /// `1 / (inv_mass_a + inv_mass_b)`, zero when both ends are static.
    pub reduced_mass: f32,
    /// `1 / (|delta|^2 * reduced_mass)`, zero when degenerate.
    pub inverse_inertia: f32,
    /// Signed angular velocity of the constraint segment.
    pub angular_velocity: f32,
}

/// SoA distance constraint store.
#[derive(Debug)]
pub struct DistanceConstraintStore {
    slots: SlotAllocator,

    particle_a: Vec<ParticleId>,
    particle_b: Vec<ParticleId>,
    stiffness: Vec<f32>,
    damping: Vec<f32>,
    warm_start: Vec<f32>,
    correction: Vec<f32>,
    radius: Vec<f32>,
    rest_length: Vec<f32>,

    dynamics: Vec<DistanceDynamics>,
    accumulated: Vec<Vec2>,
}

impl DistanceConstraintStore {
    /// Create a store with fixed capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: SlotAllocator::new(capacity),
            particle_a: vec![ParticleId::new(0); capacity],
            particle_b: vec![ParticleId::new(0); capacity],
            stiffness: vec![0.0; capacity],
            damping: vec![0.0; capacity],
            warm_start: vec![0.0; capacity],
            correction: vec![0.0; capacity],
            radius: vec![0.0; capacity],
            rest_length: vec![0.0; capacity],
            dynamics: vec![DistanceDynamics::default(); capacity],
            accumulated: vec![Vector2::zeros(); capacity],
        }
    }

    /// Create a constraint between two live particles.
    pub fn create(
        &mut self,
        particles: &ParticleStore,
        a: ParticleId,
        b: ParticleId,
        params: DistanceParams,
    ) -> Result<DistanceConstraintId> {
        let index_a = particles
            .index_of(a)
            .ok_or(EngineError::UnknownParticle(a.raw()))?;
        let index_b = particles
            .index_of(b)
            .ok_or(EngineError::UnknownParticle(b.raw()))?;

        let Some((id, index)) = self.slots.allocate() else {
            return Err(EngineError::full(
                "distance constraint",
                self.slots.capacity(),
            ));
        };

        let rest_length = params.rest_length.unwrap_or_else(|| {
            (particles.positions()[index_b] - particles.positions()[index_a]).norm()
        });

        self.particle_a[index] = a;
        self.particle_b[index] = b;
        self.stiffness[index] = params.stiffness.clamp(0.0, 1.0);
        self.damping[index] = params.damping.clamp(0.0, 1.0);
        self.warm_start[index] = params.warm_start.clamp(0.0, 1.0);
        self.correction[index] = params.correction.clamp(0.0, 1.0);
        self.radius[index] = params.radius;
        self.rest_length[index] = rest_length;
        self.dynamics[index] = DistanceDynamics::default();
        self.accumulated[index] = Vector2::zeros();

        Ok(DistanceConstraintId::new(id))
    }

    /// Delete a constraint. Returns `false` for unknown or stale IDs.
    pub fn delete(&mut self, id: DistanceConstraintId) -> bool {
        let Some(removal) = self.slots.release(id.raw()) else {
            return false;
        };
        let (index, last) = (removal.index, removal.last);

        self.particle_a.swap(index, last);
        self.particle_b.swap(index, last);
        self.stiffness.swap(index, last);
        self.damping.swap(index, last);
        self.warm_start.swap(index, last);
        self.correction.swap(index, last);
        self.radius.swap(index, last);
        self.rest_length.swap(index, last);
        self.dynamics.swap(index, last);
        self.accumulated.swap(index, last);

        true
    }

    /// Recompute geometry and rest impulses for every constraint.
    ///
    /// Each row writes only its own dynamics block, so the pass fans out
    /// on rayon. A constraint whose particle was deleted goes inert (zero
    /// dynamics) instead of faulting.
    pub fn compute_data(&mut self, particles: &ParticleStore, inv_dt: f32) {
        let n = self.slots.len();
        let (dynamics, particle_a, particle_b, rest_length, stiffness, damping) = (
            &mut self.dynamics[..n],
            &self.particle_a[..n],
            &self.particle_b[..n],
            &self.rest_length[..n],
            &self.stiffness[..n],
            &self.damping[..n],
        );
        let positions = particles.positions();
        let velocities = particles.velocities();
        let inv_masses = particles.inv_masses();

        dynamics.par_iter_mut().enumerate().for_each(|(i, dynamics)| {
            let (Some(index_a), Some(index_b)) = (
                particles.index_of(particle_a[i]),
                particles.index_of(particle_b[i]),
            ) else {
                *dynamics = DistanceDynamics::default();
                return;
            };

            let delta_pos = positions[index_b] - positions[index_a];
            let delta_vel = velocities[index_b] - velocities[index_a];
            let distance = delta_pos.norm();
            let unit = if distance > 0.0 {
                delta_pos / distance
            } else {
                Vector2::zeros()
            };

            let distance_error = unit.dot(&delta_pos) - rest_length[i];
            let velocity_error = unit.dot(&delta_vel);

            let inv_mass_sum = inv_masses[index_a] + inv_masses[index_b];
            let reduced_mass = if inv_mass_sum > 0.0 {
                1.0 / inv_mass_sum
            } else {
                0.0
            };
            let inertia = distance * distance * reduced_mass;
            let inverse_inertia = if inertia > 0.0 { 1.0 / inertia } else { 0.0 };

            *dynamics = DistanceDynamics {
                unit,
                rest_impulse: -(distance_error * stiffness[i] * inv_dt
                    + velocity_error * damping[i]),
                reduced_mass,
                inverse_inertia,
                angular_velocity: delta_pos.perp(&delta_vel) * reduced_mass * inverse_inertia,
            };
        });
    }

    /// Replay a fraction of last tick's accumulated impulse.
    ///
    /// The accumulator is consumed (zeroed) whether or not the replay
    /// fires; only a non-negative projection onto the current axis is
    /// applied, so a constraint that flipped direction over the tick
    /// starts cold.
    pub fn apply_warm_start(&mut self, particles: &mut ParticleStore) {
        let n = self.slots.len();
        let mut view = particles.solver_view();

        for i in 0..n {
            let accumulated = self.accumulated[i];
            self.accumulated[i] = Vector2::zeros();

            let unit = self.dynamics[i].unit;
            let projected = unit.dot(&accumulated);
            if projected < 0.0 {
                continue;
            }

            let (Some(index_a), Some(index_b)) = (
                view.index_of(self.particle_a[i]),
                view.index_of(self.particle_b[i]),
            ) else {
                continue;
            };

            let impulse = unit * projected * self.warm_start[i];
            view.impulse[index_a] -= impulse * view.inv_mass[index_a];
            view.impulse[index_b] += impulse * view.inv_mass[index_b];
        }
    }

    /// One symmetric Gauss-Seidel relaxation: a forward sweep followed by
    /// a reverse sweep. Must stay sequential; each row reads the freshest
    /// impulses written by the rows solved before it.
    pub fn apply_corrective_impulse(&mut self, particles: &mut ParticleStore) {
        let n = self.slots.len();
        let mut view = particles.solver_view();

        for i in 0..n {
            self.solve_row(i, &mut view);
        }
        for i in (0..n).rev() {
            self.solve_row(i, &mut view);
        }
    }

    fn solve_row(&mut self, i: usize, view: &mut SolverView<'_>) {
        let dynamics = self.dynamics[i];
        let (Some(index_a), Some(index_b)) = (
            view.index_of(self.particle_a[i]),
            view.index_of(self.particle_b[i]),
        ) else {
            return;
        };

        let delta_impulse = view.impulse[index_b] - view.impulse[index_a];
        let projected = dynamics.unit.dot(&delta_impulse);
        let error = (projected - dynamics.rest_impulse) * dynamics.reduced_mass * self.correction[i];
        let corrective = -dynamics.unit * error;

        view.impulse[index_a] -= corrective * view.inv_mass[index_a];
        view.impulse[index_b] += corrective * view.inv_mass[index_b];
        self.accumulated[i] += corrective;
    }

    /// Remove every constraint and recycle all IDs.
    pub fn clear(&mut self) {
        self.slots.clear();
    }

    /// Number of live constraints.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Fixed capacity.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.slots.capacity()
    }

    /// Whether an ID is live.
    #[must_use]
    pub fn contains(&self, id: DistanceConstraintId) -> bool {
        self.slots.contains(id.raw())
    }

    /// Dense particle-A IDs view, valid until the next mutating call.
    #[must_use]
    pub fn particle_a_ids(&self) -> &[ParticleId] {
        &self.particle_a[..self.slots.len()]
    }

    /// Dense particle-B IDs view.
    #[must_use]
    pub fn particle_b_ids(&self) -> &[ParticleId] {
        &self.particle_b[..self.slots.len()]
    }

    /// Dense link radii view.
    #[must_use]
    pub fn radii(&self) -> &[f32] {
        &self.radius[..self.slots.len()]
    }

    /// Rest length of a constraint, or `None` for a stale ID.
    #[must_use]
    pub fn rest_length_by_id(&self, id: DistanceConstraintId) -> Option<f32> {
        self.slots
            .index_of(id.raw())
            .map(|index| self.rest_length[index])
    }

    pub(crate) fn index_of(&self, id: DistanceConstraintId) -> Option<usize> {
        self.slots.index_of(id.raw())
    }

    pub(crate) fn dynamics(&self) -> &[DistanceDynamics] {
        &self.dynamics[..self.slots.len()]
    }

    pub(crate) fn particle_pair(&self, index: usize) -> (ParticleId, ParticleId) {
        (self.particle_a[index], self.particle_b[index])
    }
}
