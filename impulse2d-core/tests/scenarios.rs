//! End-to-end scenario tests for the world pipeline.
//!
//! Each scenario drives the public API only: construct, create, step,
//! observe through the read-only views.

use approx::assert_relative_eq;
use impulse2d_core::World;
use impulse2d_types::{Capacities, Color, ObjectType, ParticleId, Vec2, WorldConfig};
use nalgebra::Vector2;

fn spawn(world: &mut World, position: Vec2, velocity: Vec2, mass: f32, radius: f32) -> ParticleId {
    world
        .create_particle(
            ObjectType::PARTICLE,
            position,
            velocity,
            mass,
            radius,
            Color::WHITE,
        )
        .expect("particle create failed")
}

/// Free fall: one unit-mass particle under gravity (0, 100).
#[test]
fn free_fall_matches_symplectic_euler() {
    let mut world = World::new(
        Capacities::particles_only(100),
        WorldConfig::default().with_gravity(Vector2::new(0.0, 100.0)),
    )
    .expect("world");

    let id = spawn(
        &mut world,
        Vector2::zeros(),
        Vector2::zeros(),
        1.0,
        1.0,
    );
    world.step(1.0);

    let position = world.particle_position_by_id(id);
    let velocity = world.particle_velocity_by_id(id);
    assert_relative_eq!(position.y, 100.0, epsilon = 1e-3);
    assert_relative_eq!(position.x, 0.0);
    assert_relative_eq!(velocity.y, 100.0, epsilon = 1e-3);
}

/// A zero-mass particle is static: gravity does not move it.
#[test]
fn static_particle_ignores_gravity() {
    let mut world = World::new(
        Capacities::particles_only(100),
        WorldConfig::default().with_gravity(Vector2::new(0.0, 100.0)),
    )
    .expect("world");

    let id = spawn(&mut world, Vector2::zeros(), Vector2::zeros(), 0.0, 1.0);
    world.step(1.0);

    assert_eq!(world.particle_position_by_id(id), Vector2::zeros());
}

/// Creates beyond capacity are rejected without disturbing the store.
#[test]
fn create_beyond_capacity_is_rejected() {
    let mut world = World::new(
        Capacities::particles_only(2),
        WorldConfig::default().zero_gravity(),
    )
    .expect("world");

    spawn(&mut world, Vector2::new(0.0, 0.0), Vector2::zeros(), 1.0, 1.0);
    spawn(&mut world, Vector2::new(5.0, 0.0), Vector2::zeros(), 1.0, 1.0);

    let rejected = world.create_particle(
        ObjectType::PARTICLE,
        Vector2::new(10.0, 0.0),
        Vector2::zeros(),
        1.0,
        1.0,
        Color::WHITE,
    );
    assert!(rejected.is_err());
    assert_eq!(world.num_particles(), 2);
}

/// Swap-deletion moves the last particle into the vacated dense slot while
/// IDs keep resolving.
#[test]
fn delete_swaps_last_into_hole() {
    let mut world = World::new(
        Capacities::particles_only(16),
        WorldConfig::default().zero_gravity(),
    )
    .expect("world");

    let _i1 = spawn(&mut world, Vector2::new(1.0, 1.0), Vector2::zeros(), 1.0, 1.0);
    let i2 = spawn(&mut world, Vector2::new(2.0, 2.0), Vector2::zeros(), 1.0, 1.0);
    let i3 = spawn(&mut world, Vector2::new(3.0, 3.0), Vector2::zeros(), 1.0, 1.0);

    assert!(world.delete_particle(i2));
    assert_eq!(world.num_particles(), 2);
    assert_eq!(world.particle_position_by_id(i3), Vector2::new(3.0, 3.0));
    assert_eq!(world.particle_positions()[1], Vector2::new(3.0, 3.0));
}

/// Freed IDs are reused LIFO.
#[test]
fn freed_id_is_reused() {
    let mut world = World::new(
        Capacities::particles_only(2),
        WorldConfig::default().zero_gravity(),
    )
    .expect("world");

    let first = spawn(&mut world, Vector2::zeros(), Vector2::zeros(), 1.0, 1.0);
    spawn(&mut world, Vector2::new(5.0, 0.0), Vector2::zeros(), 1.0, 1.0);

    assert!(world.delete_particle(first));
    let reused = spawn(&mut world, Vector2::new(9.0, 9.0), Vector2::zeros(), 1.0, 1.0);
    assert_eq!(reused, first);
}

/// Overlapping particles gain a penetrating contact and get pushed apart.
#[test]
fn overlapping_pair_contacts_and_separates() {
    let mut world = World::new(
        Capacities::new(100, 0, 0, 100),
        WorldConfig::default().zero_gravity(),
    )
    .expect("world");

    let a = spawn(&mut world, Vector2::new(0.0, 0.0), Vector2::zeros(), 1.0, 1.0);
    let b = spawn(&mut world, Vector2::new(1.5, 0.0), Vector2::zeros(), 1.0, 1.0);

    world.step(0.01);

    let contact = world.contact_between(a, b).expect("contact should exist");
    assert!(
        contact.distance < 0.0,
        "expected penetration, got {}",
        contact.distance
    );

    let position_a = world.particle_position_by_id(a);
    let position_b = world.particle_position_by_id(b);
    assert!(position_a.x < 0.0, "A should move -x, got {position_a:?}");
    assert!(position_b.x > 1.5, "B should move +x, got {position_b:?}");
}

/// A resting pair at exactly the rest length does not drift.
#[test]
fn distance_constraint_is_stable_at_rest() {
    let mut world = World::new(
        Capacities::new(16, 4, 0, 0),
        WorldConfig::default().zero_gravity(),
    )
    .expect("world");

    let a = spawn(&mut world, Vector2::new(0.0, 0.0), Vector2::zeros(), 1.0, 1.0);
    let b = spawn(&mut world, Vector2::new(30.0, 0.0), Vector2::zeros(), 1.0, 1.0);
    world
        .create_distance_constraint(a, b, 1.0)
        .expect("constraint");

    world.step(0.01);

    let gap = (world.particle_position_by_id(b) - world.particle_position_by_id(a)).norm();
    assert_relative_eq!(gap, 30.0, epsilon = 1e-3);
}

/// A stretched constraint pulls its particles back toward the rest length.
#[test]
fn distance_constraint_recovers_from_stretch() {
    let mut world = World::new(
        Capacities::new(16, 4, 0, 0),
        WorldConfig::default().zero_gravity(),
    )
    .expect("world");

    let a = spawn(&mut world, Vector2::new(0.0, 0.0), Vector2::zeros(), 1.0, 1.0);
    let b = spawn(&mut world, Vector2::new(40.0, 0.0), Vector2::zeros(), 1.0, 1.0);
    world
        .create_distance_constraint_with(
            a,
            b,
            impulse2d_core::DistanceParams {
                rest_length: Some(30.0),
                ..impulse2d_core::DistanceParams::default()
            },
        )
        .expect("constraint");

    let initial_gap = 40.0;
    for _ in 0..20 {
        world.step(0.01);
    }
    let gap = (world.particle_position_by_id(b) - world.particle_position_by_id(a)).norm();
    assert!(
        gap < initial_gap,
        "constraint should contract the pair, gap = {gap}"
    );
    assert_relative_eq!(gap, 30.0, epsilon = 1.0);
}

/// An angular constraint holds a two-segment arm rigid under load.
#[test]
fn angular_constraint_resists_bending() {
    let mut world = World::new(
        Capacities::new(16, 8, 4, 0),
        WorldConfig::default().with_gravity(Vector2::new(0.0, 500.0)),
    )
    .expect("world");

    // Cantilever: static anchor, two links hanging horizontally.
    let anchor = spawn(&mut world, Vector2::new(0.0, 0.0), Vector2::zeros(), 0.0, 1.0);
    let middle = spawn(&mut world, Vector2::new(20.0, 0.0), Vector2::zeros(), 1.0, 1.0);
    let tip = spawn(&mut world, Vector2::new(40.0, 0.0), Vector2::zeros(), 1.0, 1.0);

    let dc_a = world.create_distance_constraint(anchor, middle, 1.0).expect("dc");
    let dc_b = world.create_distance_constraint(middle, tip, 1.0).expect("dc");
    world.create_angular_constraint(dc_a, dc_b).expect("angular");

    for _ in 0..30 {
        world.step(0.005);
    }

    // Without the angular constraint the arm folds at the middle joint;
    // with it, the two segments stay nearly collinear.
    let p_anchor = world.particle_position_by_id(anchor);
    let p_middle = world.particle_position_by_id(middle);
    let p_tip = world.particle_position_by_id(tip);

    let u_a = (p_middle - p_anchor).normalize();
    let u_b = (p_tip - p_middle).normalize();
    let bend_sine = u_a.x * u_b.y - u_a.y * u_b.x;
    assert!(
        bend_sine.abs() < 0.35,
        "arm folded: sin(bend) = {bend_sine}"
    );
}

/// Contacts whose pair separated past the margin are pruned.
///
/// The pair slides apart tangentially: the contact normal (x) sees almost
/// no relative velocity, so the damping term cannot hold the particles
/// together and the gap grows past `sum_radii + 0.5` within a tick.
#[test]
fn separating_pair_is_pruned() {
    let mut world = World::new(
        Capacities::new(16, 0, 0, 16),
        WorldConfig::default().zero_gravity(),
    )
    .expect("world");

    let a = spawn(
        &mut world,
        Vector2::new(100.0, 100.0),
        Vector2::new(0.0, -100.0),
        1.0,
        1.0,
    );
    let b = spawn(
        &mut world,
        Vector2::new(101.8, 100.0),
        Vector2::new(0.0, 100.0),
        1.0,
        1.0,
    );

    world.step(0.01);
    assert!(world.contact_between(a, b).is_some());

    // A few more ticks carry the pair far outside the margin.
    for _ in 0..5 {
        world.step(0.01);
    }
    assert!(world.contact_between(a, b).is_none());
    assert_eq!(world.counts().contacts, 0);
}
