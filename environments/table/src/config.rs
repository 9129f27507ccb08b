//! Configuration types and builders for the table environment.
//!
//! Every config type derives serde and can be read from YAML. Sub-configs that
//! are commonly shared between environments (robot, objects, object groups,
//! tracker) may be given inline or as a path to a separate YAML document:
//!
//! ```yaml
//! name: hook_reach
//! primitives: [pick, place, pull, push]
//! robot_config: configs/robot.yaml
//! objects:
//!   - { name: table, type: table, size: [1.3, 1.2, 0.05] }
//!   - { name: hook, type: hook, head_length: 0.15, handle_length: 0.4, handle_y: 1.0, radius: 0.01 }
//!   - { name: box, type: box, size: [0.05, 0.05, 0.05] }
//! tasks:
//!   - action_skeleton: ["pick(hook, table)", "pull(box, hook)"]
//!     initial_state: ["on(hook, table)", "on(box, table)", "beyondworkspace(box)"]
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::constants::*;
use crate::env::TableEnv;
use crate::error::{ConfigError, TableEnvError};
use crate::math::Pose;
use crate::physics::World;

// ============================================================================
// Loading
// ============================================================================

/// Parse a YAML file into `T`.
pub fn load_yaml<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T, ConfigError> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(serde_yaml::from_str(&contents)?)
}

/// A sub-config given inline or as a path to a YAML document.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConfigSource<T> {
    Path(PathBuf),
    Inline(T),
}

impl<T: Default> Default for ConfigSource<T> {
    fn default() -> Self {
        ConfigSource::Inline(T::default())
    }
}

impl<T: DeserializeOwned + Clone> ConfigSource<T> {
    /// Inline value, or the parsed contents of the referenced file.
    pub fn load(&self) -> Result<T, ConfigError> {
        match self {
            ConfigSource::Path(path) => load_yaml(path),
            ConfigSource::Inline(value) => Ok(value.clone()),
        }
    }
}

impl<T> From<T> for ConfigSource<T> {
    fn from(value: T) -> Self {
        ConfigSource::Inline(value)
    }
}

// ============================================================================
// Objects
// ============================================================================

/// Initial placement of an object.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PoseConfig {
    pub position: [f32; 3],
    #[serde(default)]
    pub yaw: f32,
}

impl PoseConfig {
    pub fn new(position: [f32; 3], yaw: f32) -> Self {
        Self { position, yaw }
    }

    pub fn to_pose(&self) -> Pose {
        Pose::from_position_yaw(self.position, self.yaw)
    }
}

/// Type-specific geometry of an object entry.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GeometryConfig {
    Table {
        #[serde(default = "default_table_size")]
        size: [f32; 3],
    },
    Box {
        size: [f32; 3],
    },
    /// L-shaped tool: a handle along local x with a head at the +x end
    /// extending towards `sign(handle_y)` along local y.
    Hook {
        head_length: f32,
        handle_length: f32,
        #[serde(default = "default_handle_y")]
        handle_y: f32,
        #[serde(default = "default_hook_radius")]
        radius: f32,
    },
    Rack {
        size: [f32; 3],
    },
    /// Placeholder resolved to one member of `group` at every reset.
    Variant {
        group: String,
    },
    /// Absent object.
    #[serde(rename = "none")]
    Null,
}

fn default_table_size() -> [f32; 3] {
    TABLE_SIZE
}

fn default_handle_y() -> f32 {
    1.0
}

fn default_hook_radius() -> f32 {
    0.01
}

/// One object entry.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ObjectConfig {
    pub name: String,
    #[serde(flatten)]
    pub geometry: GeometryConfig,
    /// Defaults to true for tables and racks.
    #[serde(default)]
    pub is_static: Option<bool>,
    #[serde(default)]
    pub color: Option<[u8; 3]>,
    #[serde(default)]
    pub pose: Option<PoseConfig>,
    /// Allowed footprint of the object origin: [[x_min, y_min], [x_max, y_max]].
    #[serde(default)]
    pub pos_limits: Option<[[f32; 2]; 2]>,
}

impl ObjectConfig {
    pub fn new(name: impl Into<String>, geometry: GeometryConfig) -> Self {
        Self {
            name: name.into(),
            geometry,
            is_static: None,
            color: None,
            pose: None,
            pos_limits: None,
        }
    }

    /// The default table, named `table`.
    pub fn table() -> Self {
        Self::new("table", GeometryConfig::Table { size: TABLE_SIZE })
    }

    pub fn box_object(name: impl Into<String>, size: [f32; 3]) -> Self {
        Self::new(name, GeometryConfig::Box { size })
    }

    /// Hook with the default proportions.
    pub fn hook(name: impl Into<String>) -> Self {
        Self::new(
            name,
            GeometryConfig::Hook {
                head_length: 0.15,
                handle_length: 0.4,
                handle_y: 1.0,
                radius: 0.01,
            },
        )
    }

    pub fn rack(name: impl Into<String>, size: [f32; 3]) -> Self {
        Self::new(name, GeometryConfig::Rack { size })
    }

    pub fn variant(name: impl Into<String>, group: impl Into<String>) -> Self {
        Self::new(name, GeometryConfig::Variant { group: group.into() })
    }

    pub fn null(name: impl Into<String>) -> Self {
        Self::new(name, GeometryConfig::Null)
    }

    pub fn with_pose(mut self, position: [f32; 3], yaw: f32) -> Self {
        self.pose = Some(PoseConfig::new(position, yaw));
        self
    }

    pub fn with_static(mut self, is_static: bool) -> Self {
        self.is_static = Some(is_static);
        self
    }

    pub fn with_color(mut self, color: [u8; 3]) -> Self {
        self.color = Some(color);
        self
    }

    pub fn with_pos_limits(mut self, min: [f32; 2], max: [f32; 2]) -> Self {
        self.pos_limits = Some([min, max]);
        self
    }
}

/// A named set of interchangeable variants.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ObjectGroupConfig {
    pub name: String,
    pub objects: Vec<ObjectConfig>,
}

// ============================================================================
// Robot
// ============================================================================

/// Kinematic arm and gripper parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RobotConfig {
    /// Base footprint center on the table plane.
    pub base_position: [f32; 3],
    /// Base box dimensions [x, y, z].
    pub base_size: [f32; 3],
    /// End-effector pose after reset.
    pub home: PoseConfig,
    /// Maximum horizontal distance of the end-effector from the base.
    pub reach: f32,
    /// End-effector height limits.
    pub min_height: f32,
    pub max_height: f32,
    /// Maximum end-effector displacement per simulation step.
    pub max_step: f32,
    /// Slack around an object's bounds within which a grasp succeeds.
    pub grasp_tolerance: f32,
}

impl Default for RobotConfig {
    fn default() -> Self {
        Self {
            base_position: [0.0, 0.0, TABLE_HEIGHT],
            base_size: [0.2, 0.2, 0.3],
            home: PoseConfig::new([0.3, 0.0, 0.4], 0.0),
            reach: 0.8,
            min_height: TABLE_HEIGHT,
            max_height: 0.8,
            max_step: 0.01,
            grasp_tolerance: 0.01,
        }
    }
}

impl RobotConfig {
    pub fn with_home(mut self, position: [f32; 3], yaw: f32) -> Self {
        self.home = PoseConfig::new(position, yaw);
        self
    }

    pub fn with_reach(mut self, reach: f32) -> Self {
        self.reach = reach;
        self
    }

    pub fn with_max_step(mut self, max_step: f32) -> Self {
        self.max_step = max_step;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.reach <= 0.0 {
            return Err(invalid("robot.reach", "must be positive"));
        }
        if self.max_step <= 0.0 {
            return Err(invalid("robot.max_step", "must be positive"));
        }
        if self.min_height >= self.max_height {
            return Err(invalid("robot.min_height", "must be below max_height"));
        }
        if self.base_size.iter().any(|s| *s <= 0.0) {
            return Err(invalid("robot.base_size", "dimensions must be positive"));
        }
        Ok(())
    }
}

// ============================================================================
// Object Tracker
// ============================================================================

/// Direction of pose traffic through a tracker channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackerMode {
    /// Publish simulated poses after every simulation step.
    Broadcast,
    /// Poses come from the real world and replace sampling at reset.
    Live,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ObjectTrackerConfig {
    pub mode: TrackerMode,
    #[serde(default = "default_tracker_capacity")]
    pub capacity: usize,
}

fn default_tracker_capacity() -> usize {
    64
}

// ============================================================================
// Tasks
// ============================================================================

/// Action skeleton and initial-state predicates in `name(arg1, arg2)` syntax.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TaskConfig {
    pub action_skeleton: Vec<String>,
    #[serde(default)]
    pub initial_state: Vec<String>,
}

impl TaskConfig {
    pub fn new<S: Into<String>>(
        action_skeleton: impl IntoIterator<Item = S>,
        initial_state: impl IntoIterator<Item = S>,
    ) -> Self {
        Self {
            action_skeleton: action_skeleton.into_iter().map(Into::into).collect(),
            initial_state: initial_state.into_iter().map(Into::into).collect(),
        }
    }
}

// ============================================================================
// Environment
// ============================================================================

/// Complete table environment configuration.
///
/// # Example
/// ```ignore
/// let env = TableEnvConfig::new("pick_hook")
///     .with_primitives(["pick", "place"])
///     .with_object(ObjectConfig::table())
///     .with_object(ObjectConfig::hook("hook"))
///     .with_task(TaskConfig::new(["pick(hook, table)"], ["on(hook, table)"]))
///     .build()?;
/// ```
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TableEnvConfig {
    #[serde(default = "default_env_name")]
    pub name: String,
    pub primitives: Vec<String>,
    pub tasks: Vec<TaskConfig>,
    #[serde(default)]
    pub robot_config: ConfigSource<RobotConfig>,
    pub objects: ConfigSource<Vec<ObjectConfig>>,
    #[serde(default)]
    pub object_groups: ConfigSource<Vec<ObjectGroupConfig>>,
    #[serde(default)]
    pub object_tracker_config: Option<ConfigSource<ObjectTrackerConfig>>,
    /// Capture every n-th simulation step on the default recording channel.
    #[serde(default = "default_recording_freq")]
    pub recording_freq: usize,
    /// Sampling attempts per initial-state predicate before a reset restarts.
    #[serde(default = "default_max_sample_attempts")]
    pub max_sample_attempts: usize,
    /// Cap on reset attempts. `None` retries forever.
    #[serde(default = "default_max_reset_attempts")]
    pub max_reset_attempts: Option<usize>,
}

fn default_env_name() -> String {
    "TableEnv".to_string()
}

fn default_recording_freq() -> usize {
    10
}

fn default_max_sample_attempts() -> usize {
    10
}

fn default_max_reset_attempts() -> Option<usize> {
    Some(1000)
}

fn invalid(param: &str, message: &str) -> ConfigError {
    ConfigError::InvalidParameter {
        param: param.to_string(),
        message: message.to_string(),
    }
}

impl TableEnvConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            primitives: Vec::new(),
            tasks: Vec::new(),
            robot_config: ConfigSource::default(),
            objects: ConfigSource::Inline(Vec::new()),
            object_groups: ConfigSource::default(),
            object_tracker_config: None,
            recording_freq: default_recording_freq(),
            max_sample_attempts: default_max_sample_attempts(),
            max_reset_attempts: default_max_reset_attempts(),
        }
    }

    /// Load from a YAML file.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let config: Self = load_yaml(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse from a YAML string.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_primitives<S: Into<String>>(mut self, primitives: impl IntoIterator<Item = S>) -> Self {
        self.primitives = primitives.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_task(mut self, task: TaskConfig) -> Self {
        self.tasks.push(task);
        self
    }

    pub fn with_robot(mut self, robot: RobotConfig) -> Self {
        self.robot_config = ConfigSource::Inline(robot);
        self
    }

    /// Append an object. Replaces a path-based object list.
    pub fn with_object(mut self, object: ObjectConfig) -> Self {
        match &mut self.objects {
            ConfigSource::Inline(objects) => objects.push(object),
            ConfigSource::Path(_) => self.objects = ConfigSource::Inline(vec![object]),
        }
        self
    }

    /// Append an object group. Replaces a path-based group list.
    pub fn with_object_group(mut self, group: ObjectGroupConfig) -> Self {
        match &mut self.object_groups {
            ConfigSource::Inline(groups) => groups.push(group),
            ConfigSource::Path(_) => self.object_groups = ConfigSource::Inline(vec![group]),
        }
        self
    }

    pub fn with_object_tracker(mut self, tracker: ObjectTrackerConfig) -> Self {
        self.object_tracker_config = Some(ConfigSource::Inline(tracker));
        self
    }

    pub fn with_recording_freq(mut self, freq: usize) -> Self {
        self.recording_freq = freq;
        self
    }

    pub fn with_max_sample_attempts(mut self, attempts: usize) -> Self {
        self.max_sample_attempts = attempts;
        self
    }

    pub fn with_max_reset_attempts(mut self, attempts: Option<usize>) -> Self {
        self.max_reset_attempts = attempts;
        self
    }

    /// Checks that do not require loading referenced files.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tasks.is_empty() {
            return Err(ConfigError::EmptyTasks);
        }
        if let Some(idx) = self.tasks.iter().position(|t| t.action_skeleton.is_empty()) {
            return Err(ConfigError::EmptySkeleton(idx));
        }
        if self.primitives.is_empty() {
            return Err(invalid("primitives", "at least one primitive is required"));
        }
        if self.recording_freq == 0 {
            return Err(invalid("recording_freq", "must be at least 1"));
        }
        if self.max_sample_attempts == 0 {
            return Err(invalid("max_sample_attempts", "must be at least 1"));
        }
        if self.max_reset_attempts == Some(0) {
            return Err(invalid("max_reset_attempts", "must be at least 1"));
        }
        if let ConfigSource::Inline(robot) = &self.robot_config {
            robot.validate()?;
        }
        if let ConfigSource::Inline(objects) = &self.objects {
            // The end-effector takes one observation row.
            if objects.len() + 1 > MAX_NUM_OBJECTS {
                return Err(ConfigError::TooManyObjects {
                    count: objects.len(),
                    max: MAX_NUM_OBJECTS,
                });
            }
        }
        Ok(())
    }

    /// Build the environment on the built-in physics world.
    pub fn build(self) -> Result<TableEnv<World>, TableEnvError> {
        self.validate()?;
        TableEnv::new(self)
    }
}

// ============================================================================
// Variant Environment
// ============================================================================

/// A set of table environments of which one is drawn at every reset.
///
/// ```yaml
/// name: hook_reach_variants
/// variants:
///   - configs/hook_reach.yaml
///   - configs/hook_reach_rack.yaml
/// ```
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VariantTableEnvConfig {
    #[serde(default = "default_variant_env_name")]
    pub name: String,
    pub variants: Vec<ConfigSource<TableEnvConfig>>,
}

fn default_variant_env_name() -> String {
    "VariantTableEnv".to_string()
}

impl VariantTableEnvConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            variants: Vec::new(),
        }
    }

    pub fn with_variant(mut self, variant: TableEnvConfig) -> Self {
        self.variants.push(ConfigSource::Inline(variant));
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.variants.is_empty() {
            return Err(invalid("variants", "at least one variant is required"));
        }
        for variant in &self.variants {
            if let ConfigSource::Inline(config) = variant {
                config.validate()?;
            }
        }
        Ok(())
    }
}
