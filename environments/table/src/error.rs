//! Error types for the table environment.
//!
//! Configuration errors are fatal and surface at construction; control errors
//! are reported through primitive results or logged; sampling and physical
//! validity failures never leave the reset loop.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result type for environment operations.
pub type Result<T> = std::result::Result<T, TableEnvError>;

/// Invalid environment, task or object configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unknown primitive '{name}' (known: {known:?})")]
    UnknownPrimitive { name: String, known: Vec<String> },

    #[error("unknown predicate '{name}'")]
    UnknownPredicate { name: String },

    #[error("'{call}' references object '{name}' which is not in the registry")]
    UnknownObject { name: String, call: String },

    #[error("malformed call '{call}': expected name(arg1, arg2, ...)")]
    MalformedCall { call: String },

    #[error("'{name}' takes {expected} arguments, got {actual}")]
    ArgumentCount {
        name: String,
        expected: usize,
        actual: usize,
    },

    #[error("duplicate object name '{0}'")]
    DuplicateObject(String),

    #[error("scene requires an object named 'table'")]
    MissingTable,

    #[error("{count} objects plus the end-effector exceed the observation capacity of {max} rows")]
    TooManyObjects { count: usize, max: usize },

    #[error("no tasks configured")]
    EmptyTasks,

    #[error("task {0} has an empty action skeleton")]
    EmptySkeleton(usize),

    #[error("unknown object group '{0}'")]
    UnknownGroup(String),

    #[error("unknown environment '{0}'")]
    UnknownEnv(String),

    #[error("invalid parameter '{param}': {message}")]
    InvalidParameter { param: String, message: String },

    #[error("failed to read config {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse config: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Physics engine lookups that referenced something that does not exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PhysicsError {
    #[error("unknown body id {0}")]
    UnknownBody(usize),

    #[error("unknown state id {0}")]
    UnknownState(u64),

    #[error("unknown constraint id {0}")]
    UnknownConstraint(usize),
}

/// Robot control failures. Non-fatal: primitives report them as truncation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ControlError {
    #[error("pose {pos:?} is outside the reachable workspace")]
    Unreachable { pos: [f32; 3] },

    #[error("object '{0}' is not in hand")]
    NotGrasped(String),

    #[error("object '{0}' is not present in the scene")]
    MissingObject(String),

    #[error(transparent)]
    Physics(#[from] PhysicsError),
}

/// Top-level environment error.
#[derive(Debug, Error)]
pub enum TableEnvError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Physics(#[from] PhysicsError),

    #[error("action has {actual} dimensions, primitive '{primitive}' expects {expected}")]
    InvalidAction {
        primitive: String,
        expected: usize,
        actual: usize,
    },

    #[error("no valid initial state found after {attempts} reset attempts")]
    ResetExhausted { attempts: usize },

    #[error("{0} is not supported")]
    Unsupported(&'static str),

    #[error("recording failed: {0}")]
    Recording(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}
