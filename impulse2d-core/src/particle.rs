//! Particle storage and integration.
//!
//! Particles are point masses stored in Struct-of-Arrays columns with a
//! dense packed region `[0, N)`. Solvers never touch positions directly;
//! they accumulate into the shared `impulse` column, and the integrator
//! folds that buffer into velocities at the end of the tick.

use impulse2d_types::{Color, EngineError, ObjectType, ParticleId, Result, Vec2};
use nalgebra::Vector2;
use rayon::prelude::*;

use crate::slots::SlotAllocator;

/// Margin added to every particle's radius for broadphase and contact
/// acceptance, in pixels.
pub(crate) const INTERACTION_MARGIN: f32 = 0.5;

/// SoA particle store.
///
/// Columns are allocated once at construction and never grow. The dense
/// region `[0, len)` of every column holds the live particles in the same
/// order; swap-deletion keeps it contiguous.
#[derive(Debug)]
pub struct ParticleStore {
    slots: SlotAllocator,

    object_type: Vec<f32>,
    position: Vec<Vec2>,
    rest_position: Vec<Vec2>,
    velocity: Vec<Vec2>,
    impulse: Vec<Vec2>,
    mass: Vec<f32>,
    inv_mass: Vec<f32>,
    radius: Vec<f32>,
    interaction_radius: Vec<f32>,
    color: Vec<Color>,

    // Per-tick scratch, zeroed by the integrator. Reserved for fluid and
    // soft-body extensions; carried through swap-deletes like any column.
    density: Vec<f32>,
    sum_distances: Vec<f32>,
    sum_velocities: Vec<f32>,
    num_constraints: Vec<u32>,
}

/// Split-borrow view handed to the constraint solvers.
///
/// Kinematic columns are shared; only the impulse accumulator is mutable.
/// This is the one piece of cross-store shared state during a tick.
pub(crate) struct SolverView<'a> {
    slots: &'a SlotAllocator,
    pub position: &'a [Vec2],
    pub mass: &'a [f32],
    pub inv_mass: &'a [f32],
    pub impulse: &'a mut [Vec2],
}

impl SolverView<'_> {
    /// Resolve a stable ID to its dense index.
    #[inline]
    pub fn index_of(&self, id: ParticleId) -> Option<usize> {
        self.slots.index_of(id.raw())
    }
}

impl ParticleStore {
    /// Create a store with fixed capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: SlotAllocator::new(capacity),
            object_type: vec![0.0; capacity],
            position: vec![Vector2::zeros(); capacity],
            rest_position: vec![Vector2::zeros(); capacity],
            velocity: vec![Vector2::zeros(); capacity],
            impulse: vec![Vector2::zeros(); capacity],
            mass: vec![0.0; capacity],
            inv_mass: vec![0.0; capacity],
            radius: vec![0.0; capacity],
            interaction_radius: vec![0.0; capacity],
            color: vec![Color::default(); capacity],
            density: vec![0.0; capacity],
            sum_distances: vec![0.0; capacity],
            sum_velocities: vec![0.0; capacity],
            num_constraints: vec![0; capacity],
        }
    }

    /// Create a particle.
    ///
    /// `mass == 0` makes the particle static: it never moves, ignores every
    /// impulse, and exerts no Newtonian gravity.
    pub fn create(
        &mut self,
        object_type: ObjectType,
        position: Vec2,
        velocity: Vec2,
        mass: f32,
        radius: f32,
        color: Color,
    ) -> Result<ParticleId> {
        let Some((id, index)) = self.slots.allocate() else {
            return Err(EngineError::full("particle", self.slots.capacity()));
        };

        self.object_type[index] = object_type.as_f32();
        self.position[index] = position;
        self.rest_position[index] = position;
        self.velocity[index] = velocity;
        self.impulse[index] = Vector2::zeros();
        self.mass[index] = mass;
        self.inv_mass[index] = if mass > 0.0 { 1.0 / mass } else { 0.0 };
        self.radius[index] = radius;
        self.interaction_radius[index] = radius + INTERACTION_MARGIN;
        self.color[index] = color;
        self.density[index] = 0.0;
        self.sum_distances[index] = 0.0;
        self.sum_velocities[index] = 0.0;
        self.num_constraints[index] = 0;

        Ok(ParticleId::new(id))
    }

    /// Delete a particle. Returns `false` for unknown or stale IDs.
    pub fn delete(&mut self, id: ParticleId) -> bool {
        let Some(removal) = self.slots.release(id.raw()) else {
            return false;
        };
        let (index, last) = (removal.index, removal.last);

        self.object_type.swap(index, last);
        self.position.swap(index, last);
        self.rest_position.swap(index, last);
        self.velocity.swap(index, last);
        self.impulse.swap(index, last);
        self.mass.swap(index, last);
        self.inv_mass.swap(index, last);
        self.radius.swap(index, last);
        self.interaction_radius.swap(index, last);
        self.color.swap(index, last);
        self.density.swap(index, last);
        self.sum_distances.swap(index, last);
        self.sum_velocities.swap(index, last);
        self.num_constraints.swap(index, last);

        true
    }

    /// Integrate one tick of symplectic Euler in impulse form.
    ///
    /// The impulse column already carries the dt factor folded in by the
    /// solvers and gravity, so it is added to velocity as-is. Every scratch
    /// column is zeroed afterwards, including on static particles.
    pub fn step(&mut self, dt: f32) {
        let n = self.slots.len();
        let (velocity, position, impulse, inv_mass) = (
            &mut self.velocity[..n],
            &mut self.position[..n],
            &mut self.impulse[..n],
            &self.inv_mass[..n],
        );

        velocity
            .par_iter_mut()
            .zip_eq(position.par_iter_mut())
            .zip_eq(impulse.par_iter_mut())
            .zip_eq(inv_mass.par_iter())
            .for_each(|(((velocity, position), impulse), &inv_mass)| {
                if inv_mass > 0.0 {
                    *velocity += *impulse;
                    *position += *velocity * dt;
                }
                *impulse = Vector2::zeros();
            });

        self.density[..n].fill(0.0);
        self.sum_distances[..n].fill(0.0);
        self.sum_velocities[..n].fill(0.0);
        self.num_constraints[..n].fill(0);
    }

    /// Accumulate a uniform acceleration as the impulse `acceleration * dt`
    /// on every dynamic particle.
    pub fn apply_uniform_acceleration(&mut self, acceleration: Vec2, dt: f32) {
        let n = self.slots.len();
        let (impulse, inv_mass) = (&mut self.impulse[..n], &self.inv_mass[..n]);

        impulse
            .par_iter_mut()
            .zip_eq(inv_mass.par_iter())
            .for_each(|(impulse, &inv_mass)| {
                if inv_mass > 0.0 {
                    *impulse += acceleration * dt;
                }
            });
    }

    /// Remove every particle and recycle all IDs.
    pub fn clear(&mut self) {
        self.slots.clear();
    }

    /// Number of live particles.
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
    pub fn contains(&self, id: ParticleId) -> bool {
        self.slots.contains(id.raw())
    }

    /// Dense positions view, valid until the next mutating call.
    #[must_use]
    pub fn positions(&self) -> &[Vec2] {
        &self.position[..self.slots.len()]
    }

    /// Dense colors view.
    #[must_use]
    pub fn colors(&self) -> &[Color] {
        &self.color[..self.slots.len()]
    }

    /// Dense radii view.
    #[must_use]
    pub fn radii(&self) -> &[f32] {
        &self.radius[..self.slots.len()]
    }

    /// Dense velocities view.
    #[must_use]
    pub fn velocities(&self) -> &[Vec2] {
        &self.velocity[..self.slots.len()]
    }

    /// Position of a particle, or zero for an unknown/stale ID.
    #[must_use]
    pub fn position_by_id(&self, id: ParticleId) -> Vec2 {
        self.slots
            .index_of(id.raw())
            .map_or_else(Vector2::zeros, |index| self.position[index])
    }

    /// Velocity of a particle, or zero for an unknown/stale ID.
    #[must_use]
    pub fn velocity_by_id(&self, id: ParticleId) -> Vec2 {
        self.slots
            .index_of(id.raw())
            .map_or_else(Vector2::zeros, |index| self.velocity[index])
    }

    /// Object type of a particle, or the empty mask for a stale ID.
    #[must_use]
    pub fn object_type_by_id(&self, id: ParticleId) -> ObjectType {
        self.slots
            .index_of(id.raw())
            .map_or(ObjectType::default(), |index| {
                ObjectType::from_f32(self.object_type[index])
            })
    }

    pub(crate) fn index_of(&self, id: ParticleId) -> Option<usize> {
        self.slots.index_of(id.raw())
    }

    pub(crate) fn id_at(&self, index: usize) -> ParticleId {
        ParticleId::new(self.slots.id_at(index))
    }

    pub(crate) fn inv_masses(&self) -> &[f32] {
        &self.inv_mass[..self.slots.len()]
    }

    pub(crate) fn masses(&self) -> &[f32] {
        &self.mass[..self.slots.len()]
    }

    pub(crate) fn interaction_radii(&self) -> &[f32] {
        &self.interaction_radius[..self.slots.len()]
    }

    /// Dense impulse accumulators view. Zero for every particle between
    /// ticks; useful for solver diagnostics mid-pipeline.
    #[must_use]
    pub fn impulses(&self) -> &[Vec2] {
        &self.impulse[..self.slots.len()]
    }

    /// Split-borrow view for the constraint solvers.
    pub(crate) fn solver_view(&mut self) -> SolverView<'_> {
        let n = self.slots.len();
        SolverView {
            slots: &self.slots,
            position: &self.position[..n],
            mass: &self.mass[..n],
            inv_mass: &self.inv_mass[..n],
            impulse: &mut self.impulse[..n],
        }
    }
}
