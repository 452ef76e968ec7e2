//! Persistent particle-pair contacts.
//!
//! Contacts are transient collision records keyed by the canonical 64-bit
//! pair key `(min_id << 32) | max_id`. They are created by the broadphase
//! query (after a narrowphase distance check), refreshed every tick, and
//! pruned once the pair separates beyond the interaction margin. A contact
//! that survives across ticks keeps its accumulated impulse, which is what
//! makes warm starting effective for resting piles.
//!
//! Unlike the ID-allocated stores, the dense columns here are indexed
//! through a hash map keyed by the pair; the map is the only non-array
//! index in the engine.

use hashbrown::HashMap;
use impulse2d_types::{ParticleId, Vec2};
use nalgebra::Vector2;
use rayon::prelude::*;

use crate::particle::{ParticleStore, SolverView, INTERACTION_MARGIN};

/// Contact position-error stiffness.
const CONTACT_STIFFNESS: f32 = 0.5;
/// Contact velocity-error damping.
const CONTACT_DAMPING: f32 = 1.0;
/// Fraction of the accumulated impulse replayed at warm start.
const CONTACT_WARM_START: f32 = 0.5;
/// Fraction of the solver error corrected per sweep.
const CONTACT_CORRECTION: f32 = 0.2;

/// Sentinel written into `reduced_mass` by the geometry pass to mark a
/// contact for pruning.
const PRUNE_FLAG: f32 = -1.0;

/// Per-tick solver state for one contact.
#[derive(Debug, Clone, Copy, Default)]
struct ContactDynamics {
    /// Unit vector from particle A to particle B; `(1, 0)` for perfectly
    /// stacked particles so the solver still separates them.
    unit: Vec2,
    /// Signed gap: negative is penetration depth, positive means the
    /// solver skips this contact.
    distance: f32,
    /// Target scalar impulse for this tick.
    rest_impulse: f32,
    /// `1 / (inv_mass_a + inv_mass_b)` captured at creation; `-1` flags
    /// the contact for pruning.
    reduced_mass: f32,
}

/// Read-only snapshot of one contact, for diagnostics and tests.
#[derive(Debug, Clone, Copy)]
pub struct ContactSnapshot {
    /// Lower-ID particle of the pair.
    pub particle_a: ParticleId,
    /// Higher-ID particle of the pair.
    pub particle_b: ParticleId,
    /// Signed gap; negative is penetration depth.
    pub distance: f32,
    /// Accumulated solver impulse.
    pub accumulated_impulse: Vec2,
}

/// Pair-keyed SoA contact store.
#[derive(Debug)]
pub struct ContactStore {
    index_of: HashMap<u64, usize>,

    keys: Vec<u64>,
    particle_a: Vec<ParticleId>,
    particle_b: Vec<ParticleId>,
    dynamics: Vec<ContactDynamics>,
    accumulated: Vec<Vec2>,

    capacity: usize,
}

/// Canonical pair key: lower ID in the high word.
pub(crate) fn pair_key(a: ParticleId, b: ParticleId) -> u64 {
    let (low, high) = if a.raw() < b.raw() {
        (a.raw(), b.raw())
    } else {
        (b.raw(), a.raw())
    };
    (u64::from(low) << 32) | u64::from(high)
}

impl ContactStore {
    /// Create a store with fixed capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            index_of: HashMap::with_capacity(capacity * 2),
            keys: Vec::with_capacity(capacity),
            particle_a: Vec::with_capacity(capacity),
            particle_b: Vec::with_capacity(capacity),
            dynamics: Vec::with_capacity(capacity),
            accumulated: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Create a contact for a broadphase candidate pair.
    ///
    /// Runs the narrowphase acceptance test and rejects duplicates,
    /// full-store, stale IDs, and pairs outside the interaction margin.
    /// Returns whether a contact was created.
    pub fn create(&mut self, particles: &ParticleStore, a: ParticleId, b: ParticleId) -> bool {
        let (a, b) = if a.raw() < b.raw() { (a, b) } else { (b, a) };
        let key = pair_key(a, b);

        if self.index_of.contains_key(&key) || self.keys.len() == self.capacity {
            return false;
        }

        let (Some(index_a), Some(index_b)) = (particles.index_of(a), particles.index_of(b)) else {
            return false;
        };

        let delta = particles.positions()[index_b] - particles.positions()[index_a];
        let reach = particles.radii()[index_a] + particles.radii()[index_b] + INTERACTION_MARGIN;
        if delta.norm_squared() > reach * reach {
            return false;
        }

        let inv_mass_sum = particles.inv_masses()[index_a] + particles.inv_masses()[index_b];
        let reduced_mass = if inv_mass_sum > 0.0 {
            1.0 / inv_mass_sum
        } else {
            0.0
        };

        let index = self.keys.len();
        self.keys.push(key);
        self.particle_a.push(a);
        self.particle_b.push(b);
        self.dynamics.push(ContactDynamics {
            reduced_mass,
            ..ContactDynamics::default()
        });
        self.accumulated.push(Vector2::zeros());
        self.index_of.insert(key, index);

        true
    }

    /// Delete the contact for a pair key. Returns `false` when absent.
    pub fn delete(&mut self, key: u64) -> bool {
        let Some(index) = self.index_of.remove(&key) else {
            return false;
        };

        self.keys.swap_remove(index);
        self.particle_a.swap_remove(index);
        self.particle_b.swap_remove(index);
        self.dynamics.swap_remove(index);
        self.accumulated.swap_remove(index);

        // The former last row now lives at `index`; re-point its key.
        if index < self.keys.len() {
            self.index_of.insert(self.keys[index], index);
        }

        true
    }

    /// Refresh geometry and rest impulses for every contact.
    ///
    /// Three regimes per contact:
    /// - separated beyond the margin: flagged for pruning
    /// - separated within the margin: kept alive but skipped by the solver
    /// - penetrating: full unit/penetration/rest-impulse update
    pub fn compute_data(&mut self, particles: &ParticleStore, inv_dt: f32) {
        let n = self.keys.len();
        let (dynamics, particle_a, particle_b) = (
            &mut self.dynamics[..n],
            &self.particle_a[..n],
            &self.particle_b[..n],
        );
        let positions = particles.positions();
        let velocities = particles.velocities();
        let radii = particles.radii();

        dynamics.par_iter_mut().enumerate().for_each(|(i, dynamics)| {
            let (Some(index_a), Some(index_b)) = (
                particles.index_of(particle_a[i]),
                particles.index_of(particle_b[i]),
            ) else {
                dynamics.reduced_mass = PRUNE_FLAG;
                return;
            };

            let delta = positions[index_b] - positions[index_a];
            let distance_squared = delta.norm_squared();
            let sum_radii = radii[index_a] + radii[index_b];
            let reach = sum_radii + INTERACTION_MARGIN;

            if distance_squared > reach * reach {
                dynamics.reduced_mass = PRUNE_FLAG;
                return;
            }

            if distance_squared > sum_radii * sum_radii {
                // Inside the margin but not touching: keep warm, solve nothing.
                dynamics.rest_impulse = 0.0;
                dynamics.distance = 1.0;
                return;
            }

            let distance = distance_squared.sqrt();
            let unit = if distance > 0.0 {
                delta / distance
            } else {
                Vector2::new(1.0, 0.0)
            };
            let penetration = distance - sum_radii;
            let velocity_error = unit.dot(&(velocities[index_b] - velocities[index_a]));

            dynamics.unit = unit;
            dynamics.distance = penetration;
            dynamics.rest_impulse =
                -(penetration * CONTACT_STIFFNESS * inv_dt + velocity_error * CONTACT_DAMPING);
        });
    }

    /// Remove every contact flagged by the geometry pass.
    ///
    /// Iterates the dense range backward so swap-removal never skips a
    /// flagged row.
    pub fn prune(&mut self) -> usize {
        let mut pruned = 0;
        for index in (0..self.keys.len()).rev() {
            if self.dynamics[index].reduced_mass < 0.0 {
                self.delete(self.keys[index]);
                pruned += 1;
            }
        }
        pruned
    }

    /// Replay a fraction of last tick's accumulated impulse on every
    /// surviving contact. Same projection gate as the distance store.
    pub fn apply_warm_start(&mut self, particles: &mut ParticleStore) {
        let n = self.keys.len();
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

            let impulse = unit * projected * CONTACT_WARM_START;
            view.impulse[index_a] -= impulse * view.inv_mass[index_a];
            view.impulse[index_b] += impulse * view.inv_mass[index_b];
        }
    }

    /// One symmetric Gauss-Seidel relaxation over all penetrating
    /// contacts. Sequential by construction.
    pub fn apply_corrective_impulse(&mut self, particles: &mut ParticleStore) {
        let n = self.keys.len();
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
        if dynamics.distance > 0.0 {
            return;
        }

        let (Some(index_a), Some(index_b)) = (
            view.index_of(self.particle_a[i]),
            view.index_of(self.particle_b[i]),
        ) else {
            return;
        };

        let delta_impulse = view.impulse[index_b] - view.impulse[index_a];
        let projected = dynamics.unit.dot(&delta_impulse);
        let error = (projected - dynamics.rest_impulse) * dynamics.reduced_mass * CONTACT_CORRECTION;
        let corrective = -dynamics.unit * error;

        view.impulse[index_a] -= corrective * view.inv_mass[index_a];
        view.impulse[index_b] += corrective * view.inv_mass[index_b];
        self.accumulated[i] += corrective;
    }

    /// Remove every contact.
    pub fn clear(&mut self) {
        self.index_of.clear();
        self.keys.clear();
        self.particle_a.clear();
        self.particle_b.clear();
        self.dynamics.clear();
        self.accumulated.clear();
    }

    /// Number of live contacts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Whether the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Fixed capacity.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Whether a contact exists for the pair.
    #[must_use]
    pub fn contains(&self, a: ParticleId, b: ParticleId) -> bool {
        self.index_of.contains_key(&pair_key(a, b))
    }

    /// Snapshot of the contact for a pair, or `None` when absent.
    #[must_use]
    pub fn get(&self, a: ParticleId, b: ParticleId) -> Option<ContactSnapshot> {
        let index = *self.index_of.get(&pair_key(a, b))?;
        Some(ContactSnapshot {
            particle_a: self.particle_a[index],
            particle_b: self.particle_b[index],
            distance: self.dynamics[index].distance,
            accumulated_impulse: self.accumulated[index],
        })
    }

    /// Iterate snapshots of all live contacts.
    pub fn iter(&self) -> impl Iterator<Item = ContactSnapshot> + '_ {
        (0..self.keys.len()).map(|index| ContactSnapshot {
            particle_a: self.particle_a[index],
            particle_b: self.particle_b[index],
            distance: self.dynamics[index].distance,
            accumulated_impulse: self.accumulated[index],
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use impulse2d_types::{Color, ObjectType};

    fn particles_at(spots: &[(f32, f32)]) -> (ParticleStore, Vec<ParticleId>) {
        let mut store = ParticleStore::new(16);
        let ids = spots
            .iter()
            .map(|&(x, y)| {
                store
                    .create(
                        ObjectType::PARTICLE,
                        Vector2::new(x, y),
                        Vector2::zeros(),
                        1.0,
                        1.0,
                        Color::WHITE,
                    )
                    .unwrap()
            })
            .collect();
        (store, ids)
    }

    #[test]
    fn test_pair_key_is_canonical() {
        let a = ParticleId::new(3);
        let b = ParticleId::new(9);
        assert_eq!(pair_key(a, b), pair_key(b, a));
        assert_eq!(pair_key(a, b), (3_u64 << 32) | 9);
    }

    #[test]
    fn test_create_accepts_touching_pair_and_rejects_far_pair() {
        let (particles, ids) = particles_at(&[(0.0, 0.0), (2.2, 0.0), (10.0, 0.0)]);
        let mut contacts = ContactStore::new(8);

        // 2.2 apart with radius 1 each: gap 0.2 < margin 0.5
        assert!(contacts.create(&particles, ids[0], ids[1]));
        // duplicate rejected, even argument-swapped
        assert!(!contacts.create(&particles, ids[1], ids[0]));
        // far pair rejected by narrowphase
        assert!(!contacts.create(&particles, ids[0], ids[2]));
        assert_eq!(contacts.len(), 1);
    }

    #[test]
    fn test_create_respects_capacity() {
        let (particles, ids) = particles_at(&[(0.0, 0.0), (1.0, 0.0), (2.0, 0.0)]);
        let mut contacts = ContactStore::new(1);

        assert!(contacts.create(&particles, ids[0], ids[1]));
        assert!(!contacts.create(&particles, ids[1], ids[2]));
        assert_eq!(contacts.len(), 1);
    }

    #[test]
    fn test_compute_data_three_regimes() {
        let (mut particles, ids) = particles_at(&[
            (0.0, 0.0),
            (1.5, 0.0), // penetrating: gap -0.5
            (0.0, 5.0),
            (2.2, 5.0), // margin band: gap 0.2
        ]);
        let mut contacts = ContactStore::new(8);
        assert!(contacts.create(&particles, ids[0], ids[1]));
        assert!(contacts.create(&particles, ids[2], ids[3]));

        contacts.compute_data(&particles, 100.0);

        let penetrating = contacts.get(ids[0], ids[1]).unwrap();
        assert_relative_eq!(penetrating.distance, -0.5);

        let margin = contacts.get(ids[2], ids[3]).unwrap();
        assert_relative_eq!(margin.distance, 1.0); // solver-skip sentinel

        // Separate the first pair beyond the margin and recompute: flagged.
        assert!(particles.delete(ids[1]));
        let moved = particles
            .create(
                ObjectType::PARTICLE,
                Vector2::new(40.0, 0.0),
                Vector2::zeros(),
                1.0,
                1.0,
                Color::WHITE,
            )
            .unwrap();
        assert_eq!(moved, ids[1]);
        contacts.compute_data(&particles, 100.0);
        let pruned = contacts.prune();
        assert_eq!(pruned, 1);
        assert!(!contacts.contains(ids[0], ids[1]));
        assert!(contacts.contains(ids[2], ids[3]));
    }

    #[test]
    fn test_stacked_particles_get_deterministic_unit() {
        let (particles, ids) = particles_at(&[(3.0, 3.0), (3.0, 3.0)]);
        let mut contacts = ContactStore::new(4);
        assert!(contacts.create(&particles, ids[0], ids[1]));

        contacts.compute_data(&particles, 100.0);
        let index = contacts.index_of[&pair_key(ids[0], ids[1])];
        assert_eq!(contacts.dynamics[index].unit, Vector2::new(1.0, 0.0));
        assert_relative_eq!(contacts.dynamics[index].distance, -2.0);
    }

    #[test]
    fn test_solver_separates_penetrating_pair() {
        let (mut particles, ids) = particles_at(&[(0.0, 0.0), (1.5, 0.0)]);
        let mut contacts = ContactStore::new(4);
        assert!(contacts.create(&particles, ids[0], ids[1]));

        contacts.compute_data(&particles, 100.0);
        contacts.apply_corrective_impulse(&mut particles);

        let index_a = particles.index_of(ids[0]).unwrap();
        let index_b = particles.index_of(ids[1]).unwrap();
        assert!(particles.impulses()[index_a].x < 0.0);
        assert!(particles.impulses()[index_b].x > 0.0);

        let snapshot = contacts.get(ids[0], ids[1]).unwrap();
        assert!(snapshot.accumulated_impulse.norm() > 0.0);
    }

    #[test]
    fn test_solver_skips_non_penetrating_contact() {
        let (mut particles, ids) = particles_at(&[(0.0, 0.0), (2.2, 0.0)]);
        let mut contacts = ContactStore::new(4);
        assert!(contacts.create(&particles, ids[0], ids[1]));

        contacts.compute_data(&particles, 100.0);
        contacts.apply_corrective_impulse(&mut particles);

        for impulse in particles.impulses() {
            assert_eq!(*impulse, Vector2::zeros());
        }
    }

    #[test]
    fn test_delete_repoints_swapped_key() {
        let (particles, ids) =
            particles_at(&[(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)]);
        let mut contacts = ContactStore::new(8);
        assert!(contacts.create(&particles, ids[0], ids[1]));
        assert!(contacts.create(&particles, ids[1], ids[2]));
        assert!(contacts.create(&particles, ids[2], ids[3]));

        assert!(contacts.delete(pair_key(ids[0], ids[1])));
        assert!(!contacts.delete(pair_key(ids[0], ids[1])));
        assert_eq!(contacts.len(), 2);

        // The swapped-in contact must still be reachable through the map.
        let snapshot = contacts.get(ids[2], ids[3]).unwrap();
        assert_eq!(snapshot.particle_a, ids[2].min(ids[3]));
        assert!(contacts.contains(ids[1], ids[2]));
    }

    #[test]
    fn test_warm_start_gates_and_replays() {
        let (mut particles, ids) = particles_at(&[(0.0, 0.0), (1.5, 0.0)]);
        let mut contacts = ContactStore::new(4);
        assert!(contacts.create(&particles, ids[0], ids[1]));
        contacts.compute_data(&particles, 100.0);

        let index = contacts.index_of[&pair_key(ids[0], ids[1])];
        contacts.accumulated[index] = Vector2::new(4.0, 0.0);
        contacts.apply_warm_start(&mut particles);

        assert_eq!(contacts.accumulated[index], Vector2::zeros());
        let index_a = particles.index_of(ids[0]).unwrap();
        // Half the projected impulse replayed (warm-start coefficient 0.5).
        assert_relative_eq!(particles.impulses()[index_a].x, -2.0);
    }
}
