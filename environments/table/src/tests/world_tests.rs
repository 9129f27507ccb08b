//! Built-in physics engine tests.
//!
//! These tests define:
//! - Free fall and resting contact on the highest support
//! - Snapshot save/restore/remove
//! - Fixed constraints and dragging of penetrated bodies
//! - Contact queries

use crate::constants::*;
use crate::error::PhysicsError;
use crate::math::{Pose, Twist};
use crate::physics::{BodyDesc, BodyId, BodyKind, PhysicsEngine, Shape, StateId, World};

fn world_with_table() -> (World, BodyId) {
    let mut world = World::new();
    let table = world.add_body(
        BodyDesc::new("table", Shape::cuboid(TABLE_SIZE), BodyKind::Static)
            .with_pose(Pose::from_position([TABLE_CENTER_X, 0.0, -TABLE_SIZE[2] * 0.5])),
    );
    (world, table)
}

fn add_box(world: &mut World, pos: [f32; 3]) -> BodyId {
    world.add_body(BodyDesc::new("box", Shape::cuboid([0.05; 3]), BodyKind::Dynamic).with_pose(Pose::from_position(pos)))
}

// ============================================================================
// Gravity & Support
// ============================================================================

#[test]
fn should_drop_box_onto_table_and_come_to_rest() {
    let (mut world, _) = world_with_table();
    let b = add_box(&mut world, [0.5, 0.0, 0.1]);

    for _ in 0..200 {
        world.step_simulation();
    }

    let aabb = world.aabb(b).unwrap();
    assert!(aabb.min[2].abs() < 1e-5, "box should rest on the table top: {:?}", aabb);
    assert_eq!(world.twist(b).unwrap(), Twist::ZERO);
}

#[test]
fn should_accelerate_while_falling() {
    let (mut world, _) = world_with_table();
    let b = add_box(&mut world, [0.5, 0.0, 0.5]);

    world.step_simulation();
    let v1 = world.twist(b).unwrap().linear[2];
    world.step_simulation();
    let v2 = world.twist(b).unwrap().linear[2];

    assert!(v1 < 0.0);
    assert!(v2 < v1, "velocity should grow under gravity: {} then {}", v1, v2);
}

#[test]
fn should_stack_box_on_box() {
    let (mut world, _) = world_with_table();
    let lower = add_box(&mut world, [0.5, 0.0, 0.025]);
    let upper = add_box(&mut world, [0.51, 0.0, 0.2]);

    for _ in 0..300 {
        world.step_simulation();
    }

    let lower_top = world.aabb(lower).unwrap().max[2];
    let upper_bottom = world.aabb(upper).unwrap().min[2];
    assert!((upper_bottom - lower_top).abs() < 1e-5);
}

#[test]
fn should_fall_to_floor_off_table() {
    let (mut world, _) = world_with_table();
    let b = add_box(&mut world, [2.0, 0.0, 0.1]);

    for _ in 0..600 {
        world.step_simulation();
    }

    assert!(world.aabb(b).unwrap().min[2] <= FLOOR_HEIGHT + 1e-5);
}

#[test]
fn should_not_move_static_or_disabled_bodies() {
    let (mut world, table) = world_with_table();
    let b = add_box(&mut world, [0.5, 0.0, 0.3]);
    world.set_enabled(b, false).unwrap();
    let table_pose = world.pose(table).unwrap();

    for _ in 0..10 {
        world.step_simulation();
    }

    assert_eq!(world.pose(table).unwrap(), table_pose);
    assert_eq!(world.pose(b).unwrap().pos, [0.5, 0.0, 0.3]);
    assert_eq!(world.num_steps(), 10);
}

// ============================================================================
// Snapshots
// ============================================================================

#[test]
fn should_restore_saved_state() {
    let (mut world, _) = world_with_table();
    let b = add_box(&mut world, [0.5, 0.0, 0.3]);
    let id = world.save_state();

    for _ in 0..20 {
        world.step_simulation();
    }
    world.set_enabled(b, false).unwrap();
    world.restore_state(id).unwrap();

    assert_eq!(world.pose(b).unwrap().pos, [0.5, 0.0, 0.3]);
    assert_eq!(world.twist(b).unwrap(), Twist::ZERO);
    assert!(world.is_enabled(b).unwrap());
}

#[test]
fn should_release_removed_state() {
    let (mut world, _) = world_with_table();
    let first = world.save_state();
    let second = world.save_state();
    assert_ne!(first, second);
    assert_eq!(world.num_saved_states(), 2);

    world.remove_state(first).unwrap();

    assert_eq!(world.num_saved_states(), 1);
    assert_eq!(world.restore_state(first), Err(PhysicsError::UnknownState(first.0)));
    assert!(world.restore_state(second).is_ok());
}

#[test]
fn should_reject_unknown_handles() {
    let (mut world, _) = world_with_table();
    assert_eq!(world.pose(BodyId(42)), Err(PhysicsError::UnknownBody(42)));
    assert_eq!(world.remove_state(StateId(7)), Err(PhysicsError::UnknownState(7)));
}

// ============================================================================
// Constraints
// ============================================================================

#[test]
fn should_carry_constrained_child_with_parent() {
    let (mut world, _) = world_with_table();
    let parent = world.add_body(
        BodyDesc::new("ee", Shape::cuboid([0.04; 3]), BodyKind::Kinematic)
            .with_pose(Pose::from_position([0.5, 0.0, 0.4]))
            .with_collision(false),
    );
    let child = add_box(&mut world, [0.5, 0.0, 0.35]);
    let constraint = world.create_constraint(parent, child).unwrap();

    world.set_pose(parent, Pose::from_position([0.6, 0.1, 0.5])).unwrap();
    world.step_simulation();

    let pos = world.pose(child).unwrap().pos;
    assert!((pos[0] - 0.6).abs() < 1e-6 && (pos[1] - 0.1).abs() < 1e-6 && (pos[2] - 0.45).abs() < 1e-6);

    // Released: falls again.
    world.remove_constraint(constraint).unwrap();
    world.step_simulation();
    assert!(world.pose(child).unwrap().pos[2] < 0.45);
    assert_eq!(world.num_constraints(), 0);
}

#[test]
fn should_reuse_released_constraint_slots() {
    let (mut world, _) = world_with_table();
    let parent = world.add_body(
        BodyDesc::new("ee", Shape::cuboid([0.04; 3]), BodyKind::Kinematic)
            .with_pose(Pose::from_position([0.5, 0.0, 0.4]))
            .with_collision(false),
    );
    let child = add_box(&mut world, [0.5, 0.0, 0.35]);

    for _ in 0..1000 {
        let constraint = world.create_constraint(parent, child).unwrap();
        world.step_simulation();
        world.remove_constraint(constraint).unwrap();
    }
    assert_eq!(world.num_constraints(), 0);
    assert_eq!(world.constraint_capacity(), 1);

    // A live constraint keeps its slot; the next one gets a new slot.
    let held = world.create_constraint(parent, child).unwrap();
    let other = add_box(&mut world, [0.6, 0.0, 0.35]);
    let second = world.create_constraint(parent, other).unwrap();
    assert_ne!(held, second);
    assert_eq!(world.constraint_capacity(), 2);

    world.remove_constraint(held).unwrap();
    assert!(matches!(world.remove_constraint(held), Err(PhysicsError::UnknownConstraint(_))));
    assert_eq!(world.create_constraint(parent, child).unwrap(), held);
    assert_eq!(world.num_constraints(), 2);
}

#[test]
fn should_drag_penetrated_body_with_moving_child() {
    let (mut world, _) = world_with_table();
    let parent = world.add_body(
        BodyDesc::new("ee", Shape::cuboid([0.04; 3]), BodyKind::Kinematic)
            .with_pose(Pose::from_position([0.5, 0.0, 0.1]))
            .with_collision(false),
    );
    let pusher = world.add_body(
        BodyDesc::new("pusher", Shape::cuboid([0.02; 3]), BodyKind::Dynamic)
            .with_pose(Pose::from_position([0.5, 0.0, 0.02])),
    );
    let target = add_box(&mut world, [0.53, 0.0, 0.025]);
    world.create_constraint(parent, pusher).unwrap();

    world.set_pose(parent, Pose::from_position([0.51, 0.0, 0.1])).unwrap();
    world.step_simulation();

    let x = world.pose(target).unwrap().pos[0];
    assert!((x - 0.54).abs() < 1e-5, "target should move with the pusher: {}", x);
}

#[test]
fn should_not_drag_static_bodies() {
    let (mut world, table) = world_with_table();
    let parent = world.add_body(
        BodyDesc::new("ee", Shape::cuboid([0.04; 3]), BodyKind::Kinematic)
            .with_pose(Pose::from_position([0.5, 0.0, 0.1]))
            .with_collision(false),
    );
    let pusher = world.add_body(
        BodyDesc::new("pusher", Shape::cuboid([0.02; 3]), BodyKind::Dynamic)
            .with_pose(Pose::from_position([0.5, 0.0, 0.005])),
    );
    world.create_constraint(parent, pusher).unwrap();
    let table_pose = world.pose(table).unwrap();

    world.set_pose(parent, Pose::from_position([0.55, 0.0, 0.1])).unwrap();
    world.step_simulation();

    assert_eq!(world.pose(table).unwrap(), table_pose);
}

// ============================================================================
// Contact
// ============================================================================

#[test]
fn should_report_touching_within_tolerance() {
    let (mut world, table) = world_with_table();
    let resting = add_box(&mut world, [0.5, 0.0, 0.025]);
    let floating = add_box(&mut world, [0.2, 0.0, 0.2]);

    assert!(world.is_touching(resting, table).unwrap());
    assert!(!world.is_touching(floating, table).unwrap());
    assert!(!world.is_touching(resting, resting).unwrap());

    world.set_enabled(resting, false).unwrap();
    assert!(!world.is_touching(resting, table).unwrap());
}
