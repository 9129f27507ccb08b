//! Environment API tests.
//!
//! These tests define:
//! - Reset validity, reproducibility and the attempt cap
//! - Reasons sampled initial states are discarded
//! - Observation layout
//! - State snapshots and their release at reset
//! - Stability waiting
//! - Object variants and null objects
//! - Object tracker integration

use std::collections::BTreeSet;

use proptest::prelude::*;

use crate::config::{ObjectConfig, ObjectGroupConfig, ObjectTrackerConfig, TaskConfig, TrackerMode};
use crate::constants::*;
use crate::env::{settled_rejection, Env, ResetOptions, ResetRejection};
use crate::error::{ConfigError, TableEnvError};
use crate::math::{Pose, Twist};
use crate::object_state::ObjectState;
use crate::physics::{PhysicsEngine, StateId};
use crate::tests::fixtures::*;
use crate::tracker::PoseBatch;

// ============================================================================
// Reset
// ============================================================================

#[test]
fn should_reset_hook_and_box_onto_table() {
    let mut env = build(hook_box_config(&["pick(hook, table)"], &["on(hook, table)", "on(box, table)"]));

    for seed in 0..5 {
        env.reset(Some(seed), None).unwrap();
        let states = env.object_states();

        // Origins sit at half their height above the table top.
        assert!((states["hook"].pos()[2] - 0.01).abs() < ON_HEIGHT_TOLERANCE, "seed {}", seed);
        assert!((states["box"].pos()[2] - 0.025).abs() < ON_HEIGHT_TOLERANCE, "seed {}", seed);
        assert_close(&states["table"].pos(), &[TABLE_CENTER_X, 0.0, -TABLE_SIZE[2] * 0.5], 1e-6);
    }
}

#[test]
fn should_reproduce_reset_with_same_seed() {
    let config = hook_box_config(&["pick(hook, table)"], &["on(hook, table)", "on(box, table)"]);
    let mut a = build(config.clone());
    let mut b = build(config);

    let obs_a = a.reset(Some(11), None).unwrap();
    let obs_b = b.reset(Some(11), None).unwrap();

    assert_eq!(obs_a, obs_b);
}

#[test]
fn should_select_requested_task() {
    let config = hook_config(&["pick(hook, table)"], &["on(hook, table)"])
        .with_task(TaskConfig::new(["place(hook, table)"], ["inhand(hook)"]));
    let mut env = build(config);

    let options = ResetOptions {
        task: Some(1),
        ..Default::default()
    };
    env.reset(Some(0), Some(options)).unwrap();

    assert_eq!(env.task_idx(), 1);
    assert_eq!(env.get_primitive().to_string(), "place(hook, table)");

    let out_of_range = ResetOptions {
        task: Some(2),
        ..Default::default()
    };
    assert!(matches!(
        env.reset(None, Some(out_of_range)),
        Err(TableEnvError::Config(ConfigError::InvalidParameter { .. }))
    ));
}

#[test]
fn should_give_up_on_contradictory_initial_state() {
    let config = hook_box_config(
        &["pick(box, table)"],
        &["on(box, table)", "inworkspace(box)", "beyondworkspace(box)"],
    )
    .with_max_reset_attempts(Some(3));
    let mut env = build(config);

    assert!(matches!(
        env.reset(Some(0), None),
        Err(TableEnvError::ResetExhausted { attempts: 3 })
    ));
    assert_eq!(env.reset_stats().attempts, 3);
    assert_eq!(env.reset_stats().total_rejected(), 3);
}

#[test]
fn should_retry_while_skeleton_argument_is_null() {
    let config = config(
        vec![ObjectConfig::table(), ObjectConfig::variant("thing", "empty")],
        &["pick(thing, table)"],
        &[],
    )
    .with_object_group(ObjectGroupConfig {
        name: "empty".to_string(),
        objects: Vec::new(),
    })
    .with_max_reset_attempts(Some(5));
    let mut env = build(config);

    assert!(matches!(
        env.reset(Some(0), None),
        Err(TableEnvError::ResetExhausted { attempts: 5 })
    ));
    assert_eq!(env.reset_stats().rejected(ResetRejection::NullArgument), 5);
}

#[test]
fn should_count_rejections_of_successful_reset() {
    let mut env = build(hook_box_config(&["pick(hook, table)"], &["on(hook, table)", "on(box, table)"]));

    for seed in 0..5 {
        env.reset(Some(seed), None).unwrap();
        let stats = env.reset_stats();
        assert!(stats.attempts >= 1);
        assert_eq!(stats.total_rejected(), stats.attempts - 1, "seed {}", seed);
    }
}

#[test]
fn should_reject_scene_that_keeps_moving() {
    let mut env = build(hook_box_config(&["pick(hook, table)"], &["on(hook, table)", "on(box, table)"]));
    env.reset(Some(3), None).unwrap();
    let initial_state = env.task().initial_state().to_vec();
    assert_eq!(settled_rejection(env.scene(), &initial_state), None);

    let body = env.scene().object("box").and_then(|o| o.body()).unwrap();
    let sliding = Twist {
        linear: [0.2, 0.0, 0.0],
        angular: [0.0; 3],
    };
    env.scene_mut().physics_mut().set_twist(body, sliding).unwrap();
    assert!(env.scene().is_any_object_moving());
    assert_eq!(
        settled_rejection(env.scene(), &initial_state),
        Some(ResetRejection::NotSettled)
    );

    // Falling off the table takes precedence over motion.
    env.scene_mut()
        .physics_mut()
        .set_pose(body, Pose::from_position([1.5, 0.0, -0.2]))
        .unwrap();
    assert_eq!(
        settled_rejection(env.scene(), &initial_state),
        Some(ResetRejection::BelowTable)
    );
}

#[test]
fn should_draw_variant_from_group() {
    let boxes = ObjectGroupConfig {
        name: "boxes".to_string(),
        objects: vec![
            ObjectConfig::box_object("small_box", [0.04; 3]),
            ObjectConfig::box_object("large_box", [0.06; 3]),
        ],
    };
    let config = config(
        vec![ObjectConfig::table(), ObjectConfig::variant("box", "boxes")],
        &["pick(box, table)"],
        &["on(box, table)"],
    )
    .with_object_group(boxes);
    let mut env = build(config);

    let mut seen = BTreeSet::new();
    for seed in 0..10 {
        env.reset(Some(seed), None).unwrap();
        let state = env.object_state("box").unwrap();
        let size = state.0[ObjectState::BOX_SIZE.start];
        assert!(size == 0.04 || size == 0.06, "unexpected size {}", size);
        assert!((state.pos()[2] - size * 0.5).abs() < ON_HEIGHT_TOLERANCE);
        seen.insert((size * 100.0).round() as i32);
    }
    assert_eq!(seen.len(), 2, "both variants should be drawn over ten resets");
}

#[test]
fn should_reject_unknown_group() {
    let result = config(
        vec![ObjectConfig::table(), ObjectConfig::variant("box", "crates")],
        &["pick(box, table)"],
        &[],
    )
    .build();

    assert!(matches!(
        result,
        Err(TableEnvError::Config(ConfigError::UnknownGroup(_)))
    ));
}

#[test]
fn should_require_a_table() {
    let result = config(
        vec![ObjectConfig::hook("hook")],
        &["pick(hook, hook)"],
        &[],
    )
    .build();

    assert!(matches!(result, Err(TableEnvError::Config(ConfigError::MissingTable))));
}

// ============================================================================
// Observation
// ============================================================================

#[test]
fn should_lay_out_observation_rows() {
    let mut env = build(hook_config(&["pick(hook, table)"], &["on(hook, table)"]));
    let obs = env.reset(Some(3), None).unwrap();

    let scene = env.scene();
    let ee = scene.robot().ee_state(scene.physics());
    assert_eq!(obs[EE_OBSERVATION_IDX], *ee.as_array());
    assert_eq!(obs[1], *env.object_state("table").unwrap().as_array());
    assert_eq!(obs[2], *env.object_state("hook").unwrap().as_array());
    assert_eq!(obs[3], [0.0; OBJECT_STATE_DIM]);
    assert_eq!(obs[4], [0.0; OBJECT_STATE_DIM]);
    assert_eq!(obs[2][ObjectState::HANDLE_LENGTH], 0.4);
    assert_eq!(obs[1][ObjectState::BOX_SIZE.start], TABLE_SIZE[0]);
}

#[test]
fn should_observe_null_objects_as_zeros() {
    let mut env = build(config(
        vec![ObjectConfig::table(), ObjectConfig::hook("hook"), ObjectConfig::null("ghost")],
        &["pick(hook, table)"],
        &["on(hook, table)"],
    ));
    let obs = env.reset(Some(0), None).unwrap();

    assert_eq!(obs[3], [0.0; OBJECT_STATE_DIM]);
}

#[test]
fn should_leave_scene_unchanged_when_setting_own_observation() {
    let mut env = build(hook_box_config(&["pick(hook, table)"], &["on(hook, table)", "on(box, table)"]));
    let obs = env.reset(Some(4), None).unwrap();

    env.set_observation(&obs);

    for (row, expected) in env.get_observation().iter().zip(obs.iter()) {
        assert_close(row, expected, 1e-4);
    }
}

#[test]
fn should_order_argument_rows_first() {
    let env = build(hook_box_config(&["pick(hook, table)"], &[]));
    // Primitives are [pick, place, pull, push]; rows are ee, table, hook, box.
    let indices = env.get_arg_indices(2, &["box", "hook"]).unwrap();

    assert_eq!(indices, vec![0, 3, 2, 1, 4]);
    assert!(env.get_arg_indices(9, &["box", "hook"]).is_err());
}

#[test]
fn should_report_image_observation_unsupported() {
    let env = build(hook_config(&["pick(hook, table)"], &[]));
    assert!(matches!(env.get_image_observation(), Err(TableEnvError::Unsupported(_))));
}

// ============================================================================
// State Snapshots
// ============================================================================

#[test]
fn should_restore_observation_from_state() {
    let mut env = build(hook_config(&["pick(hook, table)"], &["on(hook, table)", "inworkspace(hook)"]));
    env.reset(Some(8), None).unwrap();
    let before = env.get_observation();
    let id = env.get_state();

    env.step(&[0.0; ACTION_DIM]).unwrap();
    assert_ne!(env.get_observation(), before);

    assert!(env.set_state(id));
    for (row, expected) in env.get_observation().iter().zip(before.iter()) {
        assert_close(row, expected, 1e-6);
    }
    assert!(env.scene().robot().grasped().is_none());
}

#[test]
fn should_restore_grasp_with_state() {
    let mut env = build(hook_config(&["pick(hook, table)"], &["on(hook, table)", "inworkspace(hook)"]));
    env.reset(Some(9), None).unwrap();
    env.step(&[0.0; ACTION_DIM]).unwrap();
    let hook = env.scene().object("hook").and_then(|o| o.body()).unwrap();
    let id = env.get_state();

    env.scene_mut().wait_until_stable(1, 10);
    assert!(env.set_state(id));

    assert!(env.scene().robot().is_grasping(hook));
}

#[test]
fn should_not_accumulate_constraints_across_restores() {
    let mut env = build(hook_config(&["pick(hook, table)"], &["on(hook, table)", "inworkspace(hook)"]));
    env.reset(Some(9), None).unwrap();
    env.step(&[0.0; ACTION_DIM]).unwrap();
    let id = env.get_state();
    assert!(env.scene().robot().grasped().is_some());

    for _ in 0..1000 {
        assert!(env.set_state(id));
    }

    let physics = env.scene().physics();
    assert_eq!(physics.num_constraints(), 1);
    assert_eq!(physics.constraint_capacity(), 1);
}

#[test]
fn should_reject_unknown_state() {
    let mut env = build(hook_config(&["pick(hook, table)"], &["on(hook, table)"]));
    env.reset(Some(0), None).unwrap();
    assert!(!env.set_state(StateId(9999)));
}

#[test]
fn should_release_cached_states_on_reset() {
    let mut env = build(hook_config(&["pick(hook, table)"], &["on(hook, table)"]));
    env.reset(Some(0), None).unwrap();
    let baseline = env.scene().physics().num_saved_states();

    let first = env.get_state();
    env.get_state();
    assert_eq!(env.num_cached_states(), 2);
    assert_eq!(env.scene().physics().num_saved_states(), baseline + 2);

    env.reset(Some(1), None).unwrap();

    assert_eq!(env.num_cached_states(), 0);
    assert_eq!(env.scene().physics().num_saved_states(), baseline);
    assert!(!env.set_state(first));
}

// ============================================================================
// Stability
// ============================================================================

#[test]
fn should_step_at_least_once() {
    let mut env = build(hook_config(&["pick(hook, table)"], &["on(hook, table)"]));
    env.reset(Some(0), None).unwrap();

    assert!(env.wait_until_stable(0, 100) >= 1);
}

#[test]
fn should_wait_for_falling_box_to_land() {
    let mut env = build(hook_box_config(&["pick(hook, table)"], &[]));
    let scene = env.scene_mut();
    let body = scene.object("box").and_then(|o| o.body()).unwrap();
    scene
        .physics_mut()
        .set_pose(body, Pose::from_position([0.6, 0.2, 0.3]))
        .unwrap();

    let iters = env.wait_until_stable(1, DEFAULT_MAX_STABLE_ITERS);

    assert!(iters > 1 && iters < DEFAULT_MAX_STABLE_ITERS, "took {} iterations", iters);
    assert!((env.object_state("box").unwrap().pos()[2] - 0.025).abs() < 1e-4);
    assert!(!env.scene().is_any_object_moving());
}

#[test]
fn should_stop_when_object_falls_below_table() {
    let mut env = build(hook_box_config(&["pick(hook, table)"], &[]));
    let scene = env.scene_mut();
    let body = scene.object("box").and_then(|o| o.body()).unwrap();
    scene
        .physics_mut()
        .set_pose(body, Pose::from_position([1.5, 0.0, 0.05]))
        .unwrap();

    let iters = env.wait_until_stable(1, DEFAULT_MAX_STABLE_ITERS);

    assert!(env.scene().is_any_object_below_table());
    assert!(iters < DEFAULT_MAX_STABLE_ITERS);
}

proptest! {
    #[test]
    fn should_never_exceed_max_iters(max_iters in 1usize..40) {
        let mut env = build(hook_box_config(&["pick(hook, table)"], &[]));
        let scene = env.scene_mut();
        let body = scene.object("box").and_then(|o| o.body()).unwrap();
        scene
            .physics_mut()
            .set_pose(body, Pose::from_position([0.6, 0.2, 1.0]))
            .unwrap();

        // Still falling after 40 steps, so the budget is the only limit.
        prop_assert_eq!(env.wait_until_stable(0, max_iters), max_iters);
    }
}

// ============================================================================
// Object Tracker
// ============================================================================

#[test]
fn should_broadcast_poses_while_stepping() {
    let config = hook_config(&["pick(hook, table)"], &["on(hook, table)"]).with_object_tracker(ObjectTrackerConfig {
        mode: TrackerMode::Broadcast,
        capacity: 1024,
    });
    let mut env = build(config);
    env.reset(Some(0), None).unwrap();

    let batches = env.tracker_handle().unwrap().drain();

    assert!(!batches.is_empty());
    let last = batches.last().unwrap();
    assert!(last.poses.iter().any(|(name, _)| name == "hook"));
    assert!(batches.windows(2).all(|w| w[0].seq < w[1].seq));
}

#[test]
fn should_adopt_live_poses_at_reset() {
    let config = hook_config(&["pick(hook, table)"], &["on(hook, table)", "inworkspace(hook)"])
        .with_object_tracker(ObjectTrackerConfig {
            mode: TrackerMode::Live,
            capacity: 4,
        });
    let mut env = build(config);
    let tracked = Pose::from_position_yaw([0.5, 0.1, 0.01], 0.3);
    assert!(env.tracker_handle().unwrap().send(PoseBatch {
        seq: 1,
        poses: vec![("hook".to_string(), tracked)],
    }));

    env.reset(Some(0), None).unwrap();

    let pos = env.object_state("hook").unwrap().pos();
    assert_close(&pos, &tracked.pos, 1e-6);
}
