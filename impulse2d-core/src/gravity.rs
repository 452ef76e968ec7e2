//! N-body Newtonian gravity.
//!
//! Accumulates pairwise attraction impulses. The self-interaction mode is
//! a parallel map over a per-particle scratch column followed by a
//! parallel reduce into the shared impulse column; because each phase
//! writes only its own row there are no races and no locks. The softening
//! term `epsilon^2 = 1` bounds the force between near-coincident
//! particles.
//!
//! Static particles (mass 0) neither attract nor move: the pair force
//! carries a `mass_a * mass_b` factor and the reduce scales by inverse
//! mass.

use impulse2d_types::{ParticleId, Vec2};
use nalgebra::Vector2;
use rayon::prelude::*;

use crate::particle::ParticleStore;

/// Softening term added to squared distances.
const EPSILON_SQUARED: f32 = 1.0;

/// N-body gravity impulse accumulator.
#[derive(Debug)]
pub struct NewtonianGravity {
    constant: f32,
    scratch: Vec<Vec2>,
}

impl NewtonianGravity {
    /// Create an accumulator for up to `max_particles` particles.
    #[must_use]
    pub fn new(constant: f32, max_particles: usize) -> Self {
        Self {
            constant,
            scratch: vec![Vector2::zeros(); max_particles],
        }
    }

    /// Gravitational constant.
    #[must_use]
    pub fn constant(&self) -> f32 {
        self.constant
    }

    /// Set the gravitational constant.
    pub fn set_constant(&mut self, constant: f32) {
        self.constant = constant;
    }

    /// Accumulate self-interaction gravity over every live particle.
    ///
    /// Map phase: each particle sums the attraction of all others into its
    /// private scratch slot. Reduce phase: each particle folds its slot
    /// into the impulse column, scaled by its inverse mass and `dt`.
    pub fn solve_self(&mut self, particles: &mut ParticleStore, dt: f32) {
        let n = particles.len();
        if n < 2 {
            return;
        }

        let constant = self.constant;
        {
            let positions = particles.positions();
            let masses = particles.masses();

            self.scratch[..n]
                .par_iter_mut()
                .enumerate()
                .for_each(|(index_a, slot)| {
                    let position_a = positions[index_a];
                    let mass_a = masses[index_a];
                    let mut sum = Vector2::zeros();

                    for index_b in 0..n {
                        if index_b == index_a {
                            continue;
                        }
                        let delta = positions[index_b] - position_a;
                        let distance = delta.norm();
                        if distance == 0.0 {
                            continue;
                        }
                        let softened = distance * distance + EPSILON_SQUARED;
                        let magnitude = constant * mass_a * masses[index_b] / softened;
                        sum += delta * (magnitude / distance);
                    }

                    *slot = sum;
                });
        }

        let scratch = &self.scratch[..n];
        let mut view = particles.solver_view();
        view.impulse
            .par_iter_mut()
            .zip_eq(view.inv_mass.par_iter())
            .zip_eq(scratch.par_iter())
            .for_each(|((impulse, &inv_mass), slot)| {
                *impulse += *slot * inv_mass * dt;
            });
    }

    /// Accumulate bipartite gravity between two particle groups.
    ///
    /// Sequential O(N*M); both sides of each pair receive their impulse
    /// immediately.
    pub fn solve_bipartite(
        &self,
        particles: &mut ParticleStore,
        group_a: &[ParticleId],
        group_b: &[ParticleId],
        dt: f32,
    ) {
        let constant = self.constant;
        let mut view = particles.solver_view();

        for &a in group_a {
            let Some(index_a) = view.index_of(a) else {
                continue;
            };
            for &b in group_b {
                let Some(index_b) = view.index_of(b) else {
                    continue;
                };
                if index_a == index_b {
                    continue;
                }

                let delta = view.position[index_b] - view.position[index_a];
                let distance = delta.norm();
                if distance == 0.0 {
                    continue;
                }
                let softened = distance * distance + EPSILON_SQUARED;
                let magnitude =
                    constant * view.mass[index_a] * view.mass[index_b] / softened;
                let impulse = delta * (magnitude / distance) * dt;

                view.impulse[index_a] += impulse * view.inv_mass[index_a];
                view.impulse[index_b] -= impulse * view.inv_mass[index_b];
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use impulse2d_types::{Color, ObjectType};

    fn particles_at(spots: &[(f32, f32, f32)]) -> (ParticleStore, Vec<ParticleId>) {
        let mut store = ParticleStore::new(16);
        let ids = spots
            .iter()
            .map(|&(x, y, mass)| {
                store
                    .create(
                        ObjectType::PARTICLE,
                        Vector2::new(x, y),
                        Vector2::zeros(),
                        mass,
                        1.0,
                        Color::WHITE,
                    )
                    .unwrap()
            })
            .collect();
        (store, ids)
    }

    #[test]
    fn test_equal_masses_attract_symmetrically() {
        let (mut particles, ids) = particles_at(&[(0.0, 0.0, 2.0), (10.0, 0.0, 2.0)]);
        let mut gravity = NewtonianGravity::new(1.0, 16);

        gravity.solve_self(&mut particles, 1.0);

        let impulse_a = particles.impulses()[particles.index_of(ids[0]).unwrap()];
        let impulse_b = particles.impulses()[particles.index_of(ids[1]).unwrap()];

        // G * mA * mB / (d^2 + 1) = 4 / 101, halved by inv_mass 0.5
        assert_relative_eq!(impulse_a.x, 4.0 / 101.0 * 0.5, epsilon = 1e-6);
        assert_relative_eq!(impulse_a.x, -impulse_b.x, epsilon = 1e-6);
        assert_relative_eq!(impulse_a.y, 0.0);
    }

    #[test]
    fn test_softening_bounds_coincident_pairs() {
        let (mut particles, _) = particles_at(&[(5.0, 5.0, 1.0), (5.0, 5.0, 1.0)]);
        let mut gravity = NewtonianGravity::new(1.0, 16);

        gravity.solve_self(&mut particles, 1.0);

        for impulse in particles.impulses() {
            assert!(impulse.x.is_finite() && impulse.y.is_finite());
        }
    }

    #[test]
    fn test_static_particles_neither_attract_nor_move() {
        let (mut particles, ids) = particles_at(&[(0.0, 0.0, 0.0), (10.0, 0.0, 1.0)]);
        let mut gravity = NewtonianGravity::new(1.0, 16);

        gravity.solve_self(&mut particles, 1.0);

        // The static particle has mass 0, so the pair force vanishes.
        for &id in &ids {
            let impulse = particles.impulses()[particles.index_of(id).unwrap()];
            assert_eq!(impulse, Vector2::zeros());
        }
    }

    #[test]
    fn test_bipartite_applies_both_sides() {
        let (mut particles, ids) = particles_at(&[(0.0, 0.0, 1.0), (10.0, 0.0, 4.0)]);
        let gravity = NewtonianGravity::new(2.0, 16);

        gravity.solve_bipartite(&mut particles, &ids[..1], &ids[1..], 0.5);

        let impulse_a = particles.impulses()[particles.index_of(ids[0]).unwrap()];
        let impulse_b = particles.impulses()[particles.index_of(ids[1]).unwrap()];

        // magnitude = 2 * 1 * 4 / 101, impulse = magnitude * 0.5 * inv_mass
        assert_relative_eq!(impulse_a.x, 8.0 / 101.0 * 0.5, epsilon = 1e-6);
        assert_relative_eq!(impulse_b.x, -(8.0 / 101.0) * 0.5 * 0.25, epsilon = 1e-6);
    }
}
