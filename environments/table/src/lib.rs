//! Table-Top Manipulation Environment
//!
//! A simulated robot arm in front of a table with a handful of objects
//! (boxes, hooks, racks). Episodes are defined by tasks: an action skeleton
//! of parameterized primitives such as `pick(hook, table)` and a set of
//! initial-state predicates such as `on(box, table)` that reset samples until
//! they all hold on a physically settled scene.
//!
//! # Features
//!
//! - **Predicate-Sampled Resets**: rejection sampling of initial states with
//!   a diagnostic attempt counter and an optional cap
//! - **Primitive Execution**: pick, place, hook pull and hook push with
//!   normalized 4-D action spaces
//! - **State Snapshots**: opaque handles that restore physics and gripper
//!   state together
//! - **Object Variants**: groups of interchangeable objects drawn at reset
//! - **Recording**: two frame channels exported as animated GIFs
//!
//! # Example
//!
//! ```rust,ignore
//! use table_env::{Env, ObjectConfig, TableEnvConfig, TaskConfig};
//!
//! let mut env = TableEnvConfig::new("pick_hook")
//!     .with_primitives(["pick", "place"])
//!     .with_object(ObjectConfig::table())
//!     .with_object(ObjectConfig::hook("hook"))
//!     .with_task(TaskConfig::new(["pick(hook, table)"], ["on(hook, table)", "inworkspace(hook)"]))
//!     .build()?;
//!
//! let observation = env.reset(Some(42), None)?;
//! let step = env.step(&[0.0; 4])?;
//! assert_eq!(step.reward, 1.0);
//! ```
//!
//! # Physics
//!
//! All components talk to the simulator through the [`PhysicsEngine`] trait
//! and receive it explicitly inside a [`Scene`]. The bundled [`World`] is a
//! headless engine with gravity, support resolution, grasp constraints and
//! snapshots, sufficient for the quasi-static motions of the primitives.

// Core modules
pub mod config;
pub mod constants;
pub mod error;
pub mod math;
pub mod object_state;

// Simulation
pub mod objects;
pub mod physics;
pub mod robot;
pub mod scene;

// Task layer
pub mod predicates;
pub mod primitives;
pub mod task;

// Environments
pub mod env;
pub mod factory;
pub mod variant;

// Integration
pub mod renderer;
pub mod tracker;

// Comprehensive test suite
#[cfg(test)]
pub mod tests;

// Re-exports for convenience
pub use config::{
    ConfigSource, GeometryConfig, ObjectConfig, ObjectGroupConfig, ObjectTrackerConfig, PoseConfig,
    RobotConfig, TableEnvConfig, TaskConfig, TrackerMode, VariantTableEnvConfig,
};
pub use constants::{ACTION_DIM, EE_OBSERVATION_IDX, MAX_NUM_OBJECTS, OBJECT_STATE_DIM};
pub use env::{Env, Observation, ResetOptions, ResetRejection, ResetStats, StepInfo, TableEnv, TableStep};
pub use error::{ConfigError, ControlError, PhysicsError, TableEnvError};
pub use factory::{EnvFactory, EnvSpec};
pub use math::{Aabb, Pose, Twist};
pub use object_state::ObjectState;
pub use physics::{BodyId, PhysicsEngine, StateId, World};
pub use predicates::{Predicate, PredicateKind};
pub use primitives::{ExecutionResult, Primitive, PrimitiveKind};
pub use scene::Scene;
pub use task::Task;
pub use tracker::{ChannelTracker, ObjectTracker, PoseBatch, TrackerHandle};
pub use variant::VariantTableEnv;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
