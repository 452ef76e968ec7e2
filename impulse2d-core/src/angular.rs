//! Angular constraints coupling two distance constraints.
//!
//! An angular constraint freezes the signed angle between two constraint
//! segments at its creation value. The angle is stored as `(cos, sin)` so
//! the error term never goes through a trig call: the sine of the angular
//! deviation falls out of the cross/dot arithmetic below.
//!
//! The corrective pass maps particle-impulse changes to angular impulses
//! through each parent segment's reduced mass and inverse inertia, then
//! back-projects the scalar correction as perpendicular linear impulses on
//! the four involved particles.

use impulse2d_types::{AngularConstraintId, DistanceConstraintId, EngineError, Result, Vec2};
use nalgebra::Vector2;
use rayon::prelude::*;

use crate::distance::DistanceConstraintStore;
use crate::particle::{ParticleStore, SolverView};
use crate::slots::SlotAllocator;

/// Creation parameters for an angular constraint.
#[derive(Debug, Clone, Copy)]
pub struct AngularParams {
    /// Angle-error stiffness.
    pub stiffness: f32,
    /// Angular-velocity damping.
    pub damping: f32,
    /// Fraction of the accumulated impulse replayed at warm start.
    pub warm_start: f32,
    /// Fraction of the solver error corrected per sweep.
    pub correction: f32,
}

impl Default for AngularParams {
    fn default() -> Self {
        Self {
            stiffness: 1.0,
            damping: 1.0,
            warm_start: 1.0,
            correction: 1.0,
        }
    }
}

/// Per-tick solver state, recomputed by [`AngularConstraintStore::compute_data`].
#[derive(Debug, Clone, Copy, Default)]
struct AngularDynamics {
    /// Target scalar angular impulse for this tick.
    rest_impulse: f32,
    /// `1 / (inverse_inertia_a + inverse_inertia_b)`, zero when degenerate.
    reduced_inertia: f32,
}

/// One side of an angular constraint, resolved to dense particle indices.
struct Side {
    index_p1: usize,
    index_p2: usize,
    distance: Vec2,
    reduced_mass: f32,
    inverse_inertia: f32,
}

/// SoA angular constraint store.
#[derive(Debug)]
pub struct AngularConstraintStore {
    slots: SlotAllocator,

    dc_a: Vec<DistanceConstraintId>,
    dc_b: Vec<DistanceConstraintId>,
    stiffness: Vec<f32>,
    damping: Vec<f32>,
    warm_start: Vec<f32>,
    correction: Vec<f32>,
    /// Rest angle as `(cos, sin)`, captured at creation and immutable.
    rest_angle: Vec<Vec2>,

    dynamics: Vec<AngularDynamics>,
    accumulated: Vec<f32>,
}

impl AngularConstraintStore {
    /// Create a store with fixed capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: SlotAllocator::new(capacity),
            dc_a: vec![DistanceConstraintId::new(0); capacity],
            dc_b: vec![DistanceConstraintId::new(0); capacity],
            stiffness: vec![0.0; capacity],
            damping: vec![0.0; capacity],
            warm_start: vec![0.0; capacity],
            correction: vec![0.0; capacity],
            rest_angle: vec![Vector2::zeros(); capacity],
            dynamics: vec![AngularDynamics::default(); capacity],
            accumulated: vec![0.0; capacity],
        }
    }

    /// Create a constraint between two live distance constraints.
    ///
    /// The rest angle is computed from the particles' *live* positions, so
    /// creation works at any point in the tick without a prior
    /// `compute_data` pass.
    pub fn create(
        &mut self,
        distance: &DistanceConstraintStore,
        particles: &ParticleStore,
        a: DistanceConstraintId,
        b: DistanceConstraintId,
        params: AngularParams,
    ) -> Result<AngularConstraintId> {
        let unit_a = Self::live_unit(distance, particles, a)?;
        let unit_b = Self::live_unit(distance, particles, b)?;

        let Some((id, index)) = self.slots.allocate() else {
            return Err(EngineError::full(
                "angular constraint",
                self.slots.capacity(),
            ));
        };

        self.dc_a[index] = a;
        self.dc_b[index] = b;
        self.stiffness[index] = params.stiffness.clamp(0.0, 1.0);
        self.damping[index] = params.damping.clamp(0.0, 1.0);
        self.warm_start[index] = params.warm_start.clamp(0.0, 1.0);
        self.correction[index] = params.correction.clamp(0.0, 1.0);
        self.rest_angle[index] = Vector2::new(unit_a.dot(&unit_b), unit_a.perp(&unit_b));
        self.dynamics[index] = AngularDynamics::default();
        self.accumulated[index] = 0.0;

        Ok(AngularConstraintId::new(id))
    }

    fn live_unit(
        distance: &DistanceConstraintStore,
        particles: &ParticleStore,
        id: DistanceConstraintId,
    ) -> Result<Vec2> {
        let index = distance
            .index_of(id)
            .ok_or(EngineError::UnknownDistanceConstraint(id.raw()))?;
        let (p1, p2) = distance.particle_pair(index);
        let index_p1 = particles
            .index_of(p1)
            .ok_or(EngineError::UnknownParticle(p1.raw()))?;
        let index_p2 = particles
            .index_of(p2)
            .ok_or(EngineError::UnknownParticle(p2.raw()))?;

        let delta = particles.positions()[index_p2] - particles.positions()[index_p1];
        let length = delta.norm();
        Ok(if length > 0.0 {
            delta / length
        } else {
            Vector2::zeros()
        })
    }

    /// Delete a constraint. Returns `false` for unknown or stale IDs.
    pub fn delete(&mut self, id: AngularConstraintId) -> bool {
        let Some(removal) = self.slots.release(id.raw()) else {
            return false;
        };
        let (index, last) = (removal.index, removal.last);

        self.dc_a.swap(index, last);
        self.dc_b.swap(index, last);
        self.stiffness.swap(index, last);
        self.damping.swap(index, last);
        self.warm_start.swap(index, last);
        self.correction.swap(index, last);
        self.rest_angle.swap(index, last);
        self.dynamics.swap(index, last);
        self.accumulated.swap(index, last);

        true
    }

    /// Recompute angle errors and rest impulses for every constraint.
    ///
    /// Reads the distance store's freshly computed dynamics; the world
    /// pipeline orders the distance pass first.
    pub fn compute_data(&mut self, distance: &DistanceConstraintStore, inv_dt: f32) {
        let n = self.slots.len();
        let (dynamics, dc_a, dc_b, rest_angle, stiffness, damping) = (
            &mut self.dynamics[..n],
            &self.dc_a[..n],
            &self.dc_b[..n],
            &self.rest_angle[..n],
            &self.stiffness[..n],
            &self.damping[..n],
        );
        let segments = distance.dynamics();

        dynamics.par_iter_mut().enumerate().for_each(|(i, dynamics)| {
            let (Some(index_a), Some(index_b)) =
                (distance.index_of(dc_a[i]), distance.index_of(dc_b[i]))
            else {
                *dynamics = AngularDynamics::default();
                return;
            };

            let segment_a = segments[index_a];
            let segment_b = segments[index_b];

            let angle = Vector2::new(
                segment_a.unit.dot(&segment_b.unit),
                segment_a.unit.perp(&segment_b.unit),
            );
            let angle_error = rest_angle[i].x * angle.y - rest_angle[i].y * angle.x;
            let angular_velocity_error = segment_b.angular_velocity - segment_a.angular_velocity;

            let inertia_sum = segment_a.inverse_inertia + segment_b.inverse_inertia;
            let reduced_inertia = if inertia_sum > 0.0 {
                1.0 / inertia_sum
            } else {
                0.0
            };

            *dynamics = AngularDynamics {
                rest_impulse: -(stiffness[i] * angle_error * inv_dt
                    + damping[i] * angular_velocity_error),
                reduced_inertia,
            };
        });
    }

    /// Replay a fraction of last tick's accumulated angular impulse.
    pub fn apply_warm_start(
        &mut self,
        distance: &DistanceConstraintStore,
        particles: &mut ParticleStore,
    ) {
        let n = self.slots.len();
        let mut view = particles.solver_view();

        for i in 0..n {
            let accumulated = self.accumulated[i];
            self.accumulated[i] = 0.0;
            let impulse = accumulated * self.warm_start[i];
            if impulse == 0.0 {
                continue;
            }

            let (Some(side_a), Some(side_b)) = (
                Self::resolve_side(distance, &view, self.dc_a[i]),
                Self::resolve_side(distance, &view, self.dc_b[i]),
            ) else {
                continue;
            };

            Self::apply_to_side(&side_a, -impulse, &mut view);
            Self::apply_to_side(&side_b, impulse, &mut view);
        }
    }

    /// One symmetric Gauss-Seidel relaxation over all angular constraints.
    ///
    /// Sequential by construction: every row reads the particle impulses
    /// written by the rows before it, including distance-constraint and
    /// contact corrections from earlier in the same outer iteration.
    pub fn apply_corrective_impulse(
        &mut self,
        distance: &DistanceConstraintStore,
        particles: &mut ParticleStore,
    ) {
        let n = self.slots.len();
        let mut view = particles.solver_view();

        for i in 0..n {
            self.solve_row(i, distance, &mut view);
        }
        for i in (0..n).rev() {
            self.solve_row(i, distance, &mut view);
        }
    }

    fn solve_row(
        &mut self,
        i: usize,
        distance: &DistanceConstraintStore,
        view: &mut SolverView<'_>,
    ) {
        let dynamics = self.dynamics[i];
        let (Some(side_a), Some(side_b)) = (
            Self::resolve_side(distance, view, self.dc_a[i]),
            Self::resolve_side(distance, view, self.dc_b[i]),
        ) else {
            return;
        };

        let angular_impulse_a = Self::measure_side(&side_a, view);
        let angular_impulse_b = Self::measure_side(&side_b, view);

        let delta = angular_impulse_b - angular_impulse_a;
        let error = delta - dynamics.rest_impulse;
        let corrective = -error * dynamics.reduced_inertia * self.correction[i];

        Self::apply_to_side(&side_a, -corrective, view);
        Self::apply_to_side(&side_b, corrective, view);
        self.accumulated[i] += corrective;
    }

    /// Resolve one parent segment to dense particle indices and its
    /// current solver coefficients.
    fn resolve_side(
        distance: &DistanceConstraintStore,
        view: &SolverView<'_>,
        id: DistanceConstraintId,
    ) -> Option<Side> {
        let index = distance.index_of(id)?;
        let (p1, p2) = distance.particle_pair(index);
        let index_p1 = view.index_of(p1)?;
        let index_p2 = view.index_of(p2)?;
        let segment = distance.dynamics()[index];

        Some(Side {
            index_p1,
            index_p2,
            distance: view.position[index_p2] - view.position[index_p1],
            reduced_mass: segment.reduced_mass,
            inverse_inertia: segment.inverse_inertia,
        })
    }

    /// Current angular impulse of a segment, read from the shared impulse
    /// column.
    fn measure_side(side: &Side, view: &SolverView<'_>) -> f32 {
        let delta_impulse = view.impulse[side.index_p2] - view.impulse[side.index_p1];
        let local_impulse = side.distance.perp(&delta_impulse) * side.reduced_mass;
        local_impulse * side.inverse_inertia
    }

    /// Back-project a scalar angular impulse as perpendicular linear
    /// impulses on the segment's two particles.
    fn apply_to_side(side: &Side, magnitude: f32, view: &mut SolverView<'_>) {
        let perpendicular = Vector2::new(-side.distance.y, side.distance.x);
        let impulse = perpendicular * magnitude * side.inverse_inertia * side.reduced_mass;

        view.impulse[side.index_p1] -= impulse * view.inv_mass[side.index_p1];
        view.impulse[side.index_p2] += impulse * view.inv_mass[side.index_p2];
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
    pub fn contains(&self, id: AngularConstraintId) -> bool {
        self.slots.contains(id.raw())
    }

    /// Rest angle `(cos, sin)` of a constraint, or `None` for a stale ID.
    #[must_use]
    pub fn rest_angle_by_id(&self, id: AngularConstraintId) -> Option<Vec2> {
        self.slots
            .index_of(id.raw())
            .map(|index| self.rest_angle[index])
    }
}
