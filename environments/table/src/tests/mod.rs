//! Behavioral tests for the table environment.
//!
//! ## Organization
//!
//! - `fixtures`: Shared scene configurations
//! - `world_tests`: Built-in physics engine (gravity, support, constraints, snapshots)
//! - `predicate_tests`: Predicate parsing, evaluation and sampling
//! - `primitive_tests`: Primitive parsing and execution
//! - `env_tests`: Reset, step, observation and state handling
//! - `recording_tests`: Recording channels and GIF export
//! - `config_tests`: YAML configuration, factory and variant environments

pub mod fixtures;
pub mod world_tests;
pub mod env_tests;
pub mod recording_tests;
