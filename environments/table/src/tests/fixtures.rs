//! Scene configurations shared across the test modules.

use crate::config::{ObjectConfig, TableEnvConfig, TaskConfig};
use crate::env::TableEnv;

pub const PRIMITIVES: [&str; 4] = ["pick", "place", "pull", "push"];

/// Config over `objects` with a single task.
pub fn config(objects: Vec<ObjectConfig>, action_skeleton: &[&str], initial_state: &[&str]) -> TableEnvConfig {
    let mut config = TableEnvConfig::new("test_env")
        .with_primitives(PRIMITIVES)
        .with_task(TaskConfig::new(
            action_skeleton.iter().copied(),
            initial_state.iter().copied(),
        ));
    for object in objects {
        config = config.with_object(object);
    }
    config
}

/// Table and a hook.
pub fn hook_config(action_skeleton: &[&str], initial_state: &[&str]) -> TableEnvConfig {
    config(
        vec![ObjectConfig::table(), ObjectConfig::hook("hook")],
        action_skeleton,
        initial_state,
    )
}

/// Table, a hook and a 5 cm box.
pub fn hook_box_config(action_skeleton: &[&str], initial_state: &[&str]) -> TableEnvConfig {
    config(
        vec![
            ObjectConfig::table(),
            ObjectConfig::hook("hook"),
            ObjectConfig::box_object("box", [0.05; 3]),
        ],
        action_skeleton,
        initial_state,
    )
}

pub fn build(config: TableEnvConfig) -> TableEnv {
    config.build().expect("test config should build")
}

pub fn assert_close(a: &[f32], b: &[f32], tolerance: f32) {
    assert_eq!(a.len(), b.len());
    for (x, y) in a.iter().zip(b) {
        assert!((x - y).abs() <= tolerance, "{a:?} != {b:?} (tolerance {tolerance})");
    }
}
