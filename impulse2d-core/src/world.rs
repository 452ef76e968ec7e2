//! World orchestration: stores, broadphase, and the tick pipeline.
//!
//! [`World`] owns every store plus the grid and gravity accumulator, and
//! fixes the per-tick phase order. The order is load-bearing: constraint
//! geometry must be fresh before warm starts replay impulses, stale
//! contacts must be pruned before they are warmed, and the Gauss-Seidel
//! iterations must run angular → distance → contact so the stiffest
//! couplings see the freshest impulses.

use hashbrown::HashSet;
use impulse2d_types::{
    AngularConstraintId, Capacities, Color, DistanceConstraintId, ObjectType, ParticleId, Result,
    Vec2, WorldConfig,
};
use rayon::prelude::*;
use tracing::{debug, trace, warn};

use crate::angular::{AngularConstraintStore, AngularParams};
use crate::contact::{pair_key, ContactSnapshot, ContactStore};
use crate::distance::{DistanceConstraintStore, DistanceParams};
use crate::gravity::NewtonianGravity;
use crate::grid::SpatialHashGrid;
use crate::particle::ParticleStore;

/// Live entity counts, captured by [`World::counts`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WorldCounts {
    /// Live particles.
    pub particles: usize,
    /// Live distance constraints.
    pub distance_constraints: usize,
    /// Live angular constraints.
    pub angular_constraints: usize,
    /// Live contacts.
    pub contacts: usize,
}

/// The simulation world.
pub struct World {
    config: WorldConfig,

    particles: ParticleStore,
    distance: DistanceConstraintStore,
    angular: AngularConstraintStore,
    contacts: ContactStore,
    grid: SpatialHashGrid,
    gravity: NewtonianGravity,

    /// Candidate pairs already examined this tick.
    seen_pairs: HashSet<u64>,
    /// Parallel broadphase emission buffer, drained sequentially.
    cell_entries: Vec<(u32, usize)>,

    step_count: u64,
    time: f32,
}

impl World {
    /// Create a world with the given store capacities and configuration.
    pub fn new(capacities: Capacities, config: WorldConfig) -> Result<Self> {
        config.validate()?;
        debug!(
            max_particles = capacities.max_particles,
            max_contacts = capacities.max_contacts,
            iterations = config.num_iterations,
            "creating world"
        );

        Ok(Self {
            particles: ParticleStore::new(capacities.max_particles),
            distance: DistanceConstraintStore::new(capacities.max_distance_constraints),
            angular: AngularConstraintStore::new(capacities.max_angular_constraints),
            contacts: ContactStore::new(capacities.max_contacts),
            grid: SpatialHashGrid::new(
                config.grid_cell_size,
                config.world_width,
                config.world_height,
            ),
            gravity: NewtonianGravity::new(
                config.newtonian_constant,
                capacities.max_particles,
            ),
            seen_pairs: HashSet::with_capacity(capacities.max_contacts * 2),
            cell_entries: Vec::new(),
            config,
            step_count: 0,
            time: 0.0,
        })
    }

    /// Advance the simulation by one fixed timestep.
    ///
    /// Total: a non-finite or non-positive `dt` is ignored with a warning.
    pub fn step(&mut self, dt: f32) {
        if !dt.is_finite() || dt <= 0.0 {
            warn!(dt, "ignoring step with invalid timestep");
            return;
        }
        let inv_dt = 1.0 / dt;

        // External forces
        self.particles
            .apply_uniform_acceleration(self.config.gravity, dt);
        if self.config.newtonian {
            self.gravity.solve_self(&mut self.particles, dt);
        }

        // Broadphase
        self.build_broadphase();
        let created = self.query_broadphase();

        // Constraint geometry
        self.distance.compute_data(&self.particles, inv_dt);
        self.angular.compute_data(&self.distance, inv_dt);
        self.contacts.compute_data(&self.particles, inv_dt);

        let pruned = self.contacts.prune();

        // Warm start
        self.distance.apply_warm_start(&mut self.particles);
        self.angular
            .apply_warm_start(&self.distance, &mut self.particles);
        self.contacts.apply_warm_start(&mut self.particles);

        // Gauss-Seidel relaxation
        for _ in 0..self.config.num_iterations {
            self.angular
                .apply_corrective_impulse(&self.distance, &mut self.particles);
            self.distance.apply_corrective_impulse(&mut self.particles);
            self.contacts.apply_corrective_impulse(&mut self.particles);
        }

        // Integrate
        self.particles.step(dt);

        self.step_count += 1;
        self.time += dt;
        trace!(
            step = self.step_count,
            particles = self.particles.len(),
            contacts = self.contacts.len(),
            contacts_created = created,
            contacts_pruned = pruned,
            "tick complete"
        );
    }

    /// Rebuild the uniform grid from live particle AABBs.
    ///
    /// Cell entries are emitted in parallel (`par_extend` preserves item
    /// order), then drained into buckets sequentially so bucket pushes
    /// never contend.
    fn build_broadphase(&mut self) {
        self.grid.clear();

        let grid = &self.grid;
        let positions = self.particles.positions();
        let radii = self.particles.interaction_radii();

        let mut entries = std::mem::take(&mut self.cell_entries);
        entries.clear();
        let particles = &self.particles;
        entries.par_extend((0..positions.len()).into_par_iter().flat_map_iter(|index| {
            let id = particles.id_at(index).raw();
            let range = grid.cell_range(positions[index], radii[index]);
            (range.min_row..=range.max_row).flat_map(move |row| {
                (range.min_col..=range.max_col)
                    .filter_map(move |col| grid.bucket_index(col, row).map(|bucket| (id, bucket)))
            })
        }));

        for &(id, bucket) in &entries {
            self.grid.insert(bucket, ParticleId::new(id));
        }
        self.cell_entries = entries;
    }

    /// Enumerate candidate pairs per bucket and feed first-time pairs to
    /// the contact narrowphase. Returns the number of contacts created.
    fn query_broadphase(&mut self) -> usize {
        self.seen_pairs.clear();
        let mut created = 0;

        for bucket_index in 0..self.grid.buckets().len() {
            let len = self.grid.buckets()[bucket_index].len();
            if len < 2 {
                continue;
            }
            for i in 0..len {
                for j in (i + 1)..len {
                    let bucket = &self.grid.buckets()[bucket_index];
                    let a = ParticleId::new(bucket[i]);
                    let b = ParticleId::new(bucket[j]);
                    if self.seen_pairs.insert(pair_key(a, b))
                        && self.contacts.create(&self.particles, a, b)
                    {
                        created += 1;
                    }
                }
            }
        }
        created
    }

    // ---------------------------------------------------------------------
    // Factory facade
    // ---------------------------------------------------------------------

    /// Create a particle. Mass 0 makes it static.
    pub fn create_particle(
        &mut self,
        object_type: ObjectType,
        position: Vec2,
        velocity: Vec2,
        mass: f32,
        radius: f32,
        color: Color,
    ) -> Result<ParticleId> {
        self.particles
            .create(object_type, position, velocity, mass, radius, color)
            .inspect_err(|error| warn!(%error, "create_particle failed"))
    }

    /// Delete a particle. Returns `false` for unknown or stale IDs.
    ///
    /// Constraints referencing the particle go inert and contacts on it
    /// are pruned next tick.
    pub fn delete_particle(&mut self, id: ParticleId) -> bool {
        self.particles.delete(id)
    }

    /// Create a distance constraint with default parameters and the live
    /// inter-particle distance as rest length.
    pub fn create_distance_constraint(
        &mut self,
        a: ParticleId,
        b: ParticleId,
        radius: f32,
    ) -> Result<DistanceConstraintId> {
        self.create_distance_constraint_with(
            a,
            b,
            DistanceParams {
                radius,
                ..DistanceParams::default()
            },
        )
    }

    /// Create a distance constraint with explicit parameters.
    pub fn create_distance_constraint_with(
        &mut self,
        a: ParticleId,
        b: ParticleId,
        params: DistanceParams,
    ) -> Result<DistanceConstraintId> {
        self.distance
            .create(&self.particles, a, b, params)
            .inspect_err(|error| warn!(%error, "create_distance_constraint failed"))
    }

    /// Delete a distance constraint. Returns `false` for unknown IDs.
    pub fn delete_distance_constraint(&mut self, id: DistanceConstraintId) -> bool {
        self.distance.delete(id)
    }

    /// Create an angular constraint freezing the current angle between
    /// two distance constraints.
    pub fn create_angular_constraint(
        &mut self,
        a: DistanceConstraintId,
        b: DistanceConstraintId,
    ) -> Result<AngularConstraintId> {
        self.create_angular_constraint_with(a, b, AngularParams::default())
    }

    /// Create an angular constraint with explicit parameters.
    pub fn create_angular_constraint_with(
        &mut self,
        a: DistanceConstraintId,
        b: DistanceConstraintId,
        params: AngularParams,
    ) -> Result<AngularConstraintId> {
        self.angular
            .create(&self.distance, &self.particles, a, b, params)
            .inspect_err(|error| warn!(%error, "create_angular_constraint failed"))
    }

    /// Delete an angular constraint. Returns `false` for unknown IDs.
    pub fn delete_angular_constraint(&mut self, id: AngularConstraintId) -> bool {
        self.angular.delete(id)
    }

    /// Remove every entity, recycling all IDs.
    pub fn clear(&mut self) {
        self.particles.clear();
        self.distance.clear();
        self.angular.clear();
        self.contacts.clear();
        self.grid.clear();
        self.step_count = 0;
        self.time = 0.0;
    }

    // ---------------------------------------------------------------------
    // Read-only views
    // ---------------------------------------------------------------------

    /// World configuration.
    #[must_use]
    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    /// Accumulated simulation time in seconds.
    #[must_use]
    pub fn time(&self) -> f32 {
        self.time
    }

    /// Number of completed ticks.
    #[must_use]
    pub fn step_count(&self) -> u64 {
        self.step_count
    }

    /// Live entity counts.
    #[must_use]
    pub fn counts(&self) -> WorldCounts {
        WorldCounts {
            particles: self.particles.len(),
            distance_constraints: self.distance.len(),
            angular_constraints: self.angular.len(),
            contacts: self.contacts.len(),
        }
    }

    /// Number of live particles.
    #[must_use]
    pub fn num_particles(&self) -> usize {
        self.particles.len()
    }

    /// Dense particle positions, valid until the next mutating call.
    #[must_use]
    pub fn particle_positions(&self) -> &[Vec2] {
        self.particles.positions()
    }

    /// Dense particle colors.
    #[must_use]
    pub fn particle_colors(&self) -> &[Color] {
        self.particles.colors()
    }

    /// Dense particle radii.
    #[must_use]
    pub fn particle_radii(&self) -> &[f32] {
        self.particles.radii()
    }

    /// Dense distance-constraint particle-A IDs.
    #[must_use]
    pub fn distance_constraint_particle_a(&self) -> &[ParticleId] {
        self.distance.particle_a_ids()
    }

    /// Dense distance-constraint particle-B IDs.
    #[must_use]
    pub fn distance_constraint_particle_b(&self) -> &[ParticleId] {
        self.distance.particle_b_ids()
    }

    /// Dense distance-constraint radii.
    #[must_use]
    pub fn distance_constraint_radii(&self) -> &[f32] {
        self.distance.radii()
    }

    /// Position of a particle, or zero for an unknown/stale ID.
    #[must_use]
    pub fn particle_position_by_id(&self, id: ParticleId) -> Vec2 {
        self.particles.position_by_id(id)
    }

    /// Velocity of a particle, or zero for an unknown/stale ID.
    #[must_use]
    pub fn particle_velocity_by_id(&self, id: ParticleId) -> Vec2 {
        self.particles.velocity_by_id(id)
    }

    /// Snapshot of the contact between two particles, or `None`.
    #[must_use]
    pub fn contact_between(&self, a: ParticleId, b: ParticleId) -> Option<ContactSnapshot> {
        self.contacts.get(a, b)
    }

    /// The particle store.
    #[must_use]
    pub fn particles(&self) -> &ParticleStore {
        &self.particles
    }

    /// The distance constraint store.
    #[must_use]
    pub fn distance_constraints(&self) -> &DistanceConstraintStore {
        &self.distance
    }

    /// The angular constraint store.
    #[must_use]
    pub fn angular_constraints(&self) -> &AngularConstraintStore {
        &self.angular
    }

    /// The contact store.
    #[must_use]
    pub fn contacts(&self) -> &ContactStore {
        &self.contacts
    }
}
