//! Table-top manipulation environment.
//!
//! [`TableEnv`] ties the scene, the tasks and the recording channels into
//! the reset/step/observe contract of [`Env`]:
//!
//! - `reset` samples a valid initial state for a random task, retrying until
//!   every initial-state predicate holds on a settled scene.
//! - `step` executes the current primitive with a normalized action and
//!   reports success as reward.
//! - `get_state`/`set_state` snapshot and restore the physics engine together
//!   with the gripper state the engine does not capture.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use crate::config::TableEnvConfig;
use crate::constants::*;
use crate::error::{ConfigError, Result, TableEnvError};
use crate::object_state::ObjectState;
use crate::objects::{ObjectGroup, ObjectRegistry};
use crate::physics::{PhysicsEngine, StateId, World};
use crate::predicates::Predicate;
use crate::primitives::Primitive;
use crate::renderer::{Frame, Recorder};
use crate::robot::{Robot, RobotState};
use crate::scene::Scene;
use crate::task::Task;
use crate::tracker::{ChannelTracker, TrackerHandle};

/// Observation matrix: one state row per object, end-effector first.
pub type Observation = [[f32; OBJECT_STATE_DIM]; MAX_NUM_OBJECTS];

/// Per-call overrides for [`Env::reset`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ResetOptions {
    /// Fixed task index instead of a random one.
    pub task: Option<usize>,
    /// Sampling attempts per initial-state predicate.
    pub max_sample_attempts: Option<usize>,
}

/// Why a sampled initial state was discarded.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ResetRejection {
    /// An action skeleton argument resolved to a null object.
    NullArgument,
    /// A predicate could not be sampled within its attempt budget.
    SamplingFailed,
    BelowTable,
    TouchingBase,
    /// Objects were still moving when the stability budget ran out.
    NotSettled,
    /// An initial-state predicate no longer holds after settling.
    PredicateFailed,
}

/// Attempt and rejection counts of the most recent reset.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ResetStats {
    pub attempts: usize,
    pub rejections: BTreeMap<ResetRejection, usize>,
}

impl ResetStats {
    pub fn rejected(&self, reason: ResetRejection) -> usize {
        self.rejections.get(&reason).copied().unwrap_or(0)
    }

    pub fn total_rejected(&self) -> usize {
        self.rejections.values().sum()
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct StepInfo {
    /// Primitive that was executed, e.g. `pick(hook, table)`.
    pub primitive: String,
    /// Physical action after scaling.
    pub action: [f32; ACTION_DIM],
}

/// Result of [`Env::step`].
#[derive(Clone, Debug, PartialEq)]
pub struct TableStep {
    pub observation: Observation,
    pub reward: f32,
    pub terminated: bool,
    pub truncated: bool,
    pub info: StepInfo,
}

/// Environment interface shared by [`TableEnv`] and the variant wrapper.
pub trait Env {
    fn name(&self) -> &str;

    /// Sample a valid initial state and return its observation.
    fn reset(&mut self, seed: Option<u64>, options: Option<ResetOptions>) -> Result<Observation>;

    /// Execute the current primitive with a normalized action.
    fn step(&mut self, action: &[f32]) -> Result<TableStep>;

    fn get_observation(&self) -> Observation;

    /// Drive the end-effector to row 0 and teleport objects to their rows.
    fn set_observation(&mut self, observation: &Observation);

    /// Snapshot the scene. Handles are valid until the next reset.
    fn get_state(&mut self) -> StateId;

    /// Restore a snapshot. Returns false for unknown handles.
    fn set_state(&mut self, id: StateId) -> bool;

    fn get_primitive(&self) -> &Primitive;

    fn set_primitive(&mut self, primitive: Primitive);

    /// Start recording on the "default" or "timelapse" channel.
    fn record_start(&mut self, prepend_id: Option<&str>, frequency: Option<usize>, mode: &str) -> bool;

    fn record_stop(&mut self, save_id: Option<&str>, mode: &str) -> bool;

    /// Write recordings as GIFs. `mode = None` saves both channels.
    fn record_save(&mut self, path: &Path, reset: bool, mode: Option<&str>) -> Result<bool>;
}

// ============================================================================
// TableEnv
// ============================================================================

pub struct TableEnv<P: PhysicsEngine = World> {
    name: String,
    primitive_names: Vec<String>,
    scene: Scene<P>,
    tasks: Vec<Task>,
    task_idx: usize,
    primitive: Primitive,
    /// Pristine scene right after construction.
    initial_state_id: StateId,
    /// Snapshot cache, drained at every reset.
    states: HashMap<StateId, RobotState>,
    recording_text: String,
    max_sample_attempts: usize,
    max_reset_attempts: Option<usize>,
    reset_stats: ResetStats,
    tracker_handle: Option<TrackerHandle>,
}

impl TableEnv<World> {
    /// Build on the built-in physics world.
    pub fn new(config: TableEnvConfig) -> Result<Self> {
        Self::with_physics(config, World::new())
    }
}

impl<P: PhysicsEngine> TableEnv<P> {
    /// Build on the given physics engine.
    pub fn with_physics(config: TableEnvConfig, mut physics: P) -> Result<Self> {
        config.validate()?;
        let robot_config = config.robot_config.load()?;
        robot_config.validate()?;
        let object_configs = config.objects.load()?;
        if object_configs.len() + 1 > MAX_NUM_OBJECTS {
            return Err(ConfigError::TooManyObjects {
                count: object_configs.len(),
                max: MAX_NUM_OBJECTS,
            }
            .into());
        }

        let robot = Robot::build(robot_config, &mut physics);
        let mut object_groups = BTreeMap::new();
        for group_config in config.object_groups.load()? {
            let group = ObjectGroup::build(&group_config, &mut physics)?;
            object_groups.insert(group_config.name, group);
        }
        let objects = ObjectRegistry::build(&object_configs, &object_groups, &mut physics)?;

        let tasks = config
            .tasks
            .iter()
            .map(|task| Task::create(&config.primitives, &objects, task))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        let primitive = tasks
            .first()
            .and_then(|t| t.action_skeleton().first())
            .cloned()
            .ok_or(ConfigError::EmptyTasks)?;

        let initial_state_id = physics.save_state();
        let mut scene = Scene::new(physics, robot, objects, object_groups, config.recording_freq);

        let tracker_handle = match &config.object_tracker_config {
            Some(source) => {
                let (tracker, handle) = ChannelTracker::new(&source.load()?);
                scene.set_tracker(Box::new(tracker));
                Some(handle)
            }
            None => None,
        };

        let mut env = Self {
            name: config.name,
            primitive_names: config.primitives,
            scene,
            tasks,
            task_idx: 0,
            primitive,
            initial_state_id,
            states: HashMap::new(),
            recording_text: String::new(),
            max_sample_attempts: config.max_sample_attempts,
            max_reset_attempts: config.max_reset_attempts,
            reset_stats: ResetStats::default(),
            tracker_handle,
        };
        env.update_caption();
        Ok(env)
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn scene(&self) -> &Scene<P> {
        &self.scene
    }

    pub fn scene_mut(&mut self) -> &mut Scene<P> {
        &mut self.scene
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn task(&self) -> &Task {
        &self.tasks[self.task_idx]
    }

    pub fn task_idx(&self) -> usize {
        self.task_idx
    }

    pub fn primitive_names(&self) -> &[String] {
        &self.primitive_names
    }

    /// External end of the object tracker, if one is configured.
    pub fn tracker_handle(&self) -> Option<&TrackerHandle> {
        self.tracker_handle.as_ref()
    }

    pub fn reset_stats(&self) -> &ResetStats {
        &self.reset_stats
    }

    /// Number of snapshot handles issued since the last reset.
    pub fn num_cached_states(&self) -> usize {
        self.states.len()
    }

    // ========================================================================
    // Reset
    // ========================================================================

    fn release_cached_states(&mut self) {
        for (id, _) in self.states.drain() {
            if let Err(e) = self.scene.physics.remove_state(id) {
                log::warn!("failed to release snapshot {:?}: {}", id, e);
            }
        }
    }

    /// One pass of the reset loop. Returns why the sampled state was
    /// discarded, or `None` if it is valid.
    fn try_reset(&mut self, max_sample_attempts: usize) -> Result<Option<ResetRejection>> {
        let scene = &mut self.scene;
        scene.robot.remove_grasp_constraint(&mut scene.physics)?;
        scene.physics.restore_state(self.initial_state_id)?;
        scene.robot.reset(&mut scene.physics)?;

        for group in scene.object_groups.values_mut() {
            group.reset(&mut scene.physics, &mut scene.rng)?;
        }
        for object in scene.objects.iter_mut() {
            object.reset(&mut scene.physics, &mut scene.object_groups)?;
        }

        if let Some(tracker) = scene.tracker.as_mut().filter(|t| t.is_live()) {
            let updated = tracker.update_poses(&scene.objects, &mut scene.physics);
            log::debug!("adopted {} tracked object poses", updated);
            return Ok(None);
        }

        let task = &self.tasks[self.task_idx];
        let null_arg = task
            .action_skeleton()
            .iter()
            .flat_map(|p| p.args())
            .find(|arg| scene.objects.get(arg).map_or(true, |o| o.is_null()));
        if let Some(arg) = null_arg {
            log::debug!("action skeleton argument '{}' is a null object", arg);
            return Ok(Some(ResetRejection::NullArgument));
        }

        let initial_state = task.initial_state();
        for predicate in initial_state {
            if !(0..max_sample_attempts).any(|_| predicate.sample(scene, initial_state)) {
                log::debug!("failed to sample {}", predicate);
                return Ok(Some(ResetRejection::SamplingFailed));
            }
        }

        scene.wait_until_stable(1, DEFAULT_MAX_STABLE_ITERS);
        Ok(settled_rejection(scene, initial_state))
    }

    // ========================================================================
    // Observation
    // ========================================================================

    /// Observation rows available to objects, in registry order.
    fn object_rows() -> impl Iterator<Item = usize> {
        (0..MAX_NUM_OBJECTS).filter(|&row| row != EE_OBSERVATION_IDX)
    }

    /// Current state of every object, keyed by name.
    pub fn object_states(&self) -> BTreeMap<String, ObjectState> {
        self.scene
            .objects
            .iter()
            .map(|o| (o.name().to_string(), o.state(&self.scene.physics)))
            .collect()
    }

    pub fn object_state(&self, name: &str) -> Option<ObjectState> {
        self.scene.objects.get(name).map(|o| o.state(&self.scene.physics))
    }

    /// Rendered observations are not provided.
    pub fn get_image_observation(&self) -> Result<Frame> {
        Err(TableEnvError::Unsupported("image observations"))
    }

    // ========================================================================
    // Primitives
    // ========================================================================

    pub fn primitive_from_call(&self, call: &str) -> Result<Primitive> {
        Ok(Primitive::from_action_call(call, &self.primitive_names, &self.scene.objects)?)
    }

    /// Primitive `idx_policy` of the primitive list, bound to `args`.
    pub fn primitive_from_policy(&self, idx_policy: usize, args: &[&str]) -> Result<Primitive> {
        let name = self.primitive_names.get(idx_policy).ok_or_else(|| ConfigError::InvalidParameter {
            param: "idx_policy".to_string(),
            message: format!("{} primitives configured, got index {}", self.primitive_names.len(), idx_policy),
        })?;
        self.primitive_from_call(&format!("{}({})", name, args.join(", ")))
    }

    /// Observation rows ordered end-effector first, then `args`, then the
    /// remaining rows in registry order.
    pub fn get_arg_indices(&self, idx_policy: usize, args: &[&str]) -> Result<Vec<usize>> {
        let primitive = self.primitive_from_policy(idx_policy, args)?;
        let rows: Vec<usize> = Self::object_rows().collect();
        let mut indices = vec![EE_OBSERVATION_IDX];
        for arg in primitive.args() {
            if let Some(row) = self.scene.objects.position(arg).and_then(|i| rows.get(i)) {
                indices.push(*row);
            }
        }
        for row in rows {
            if !indices.contains(&row) {
                indices.push(row);
            }
        }
        Ok(indices)
    }

    // ========================================================================
    // Simulation
    // ========================================================================

    pub fn wait_until_stable(&mut self, min_iters: usize, max_iters: usize) -> usize {
        self.scene.wait_until_stable(min_iters, max_iters)
    }

    pub fn step_simulation(&mut self) {
        self.scene.step_simulation();
    }

    // ========================================================================
    // Rendering & Recording
    // ========================================================================

    pub fn render(&self) -> Frame {
        self.scene.render()
    }

    /// "default", "front", "top", "front_high_res" or "top_high_res".
    pub fn set_render_mode(&mut self, mode: &str) {
        self.scene.renderer.set_mode(mode);
    }

    fn update_caption(&mut self) {
        let caption = if self.recording_text.is_empty() {
            self.primitive.to_string()
        } else {
            format!("{}\n{}", self.primitive, self.recording_text)
        };
        self.scene.renderer.set_caption(caption);
    }

    fn recorder_mut(&mut self, mode: &str) -> Option<&mut Recorder> {
        match mode {
            "default" => Some(&mut self.scene.recorder),
            "timelapse" => Some(&mut self.scene.timelapse),
            _ => {
                log::warn!("unknown recording mode '{}'", mode);
                None
            }
        }
    }

    /// Frames around primitive execution, independent of the step frequency
    /// on the default channel.
    fn capture_frames(&mut self) {
        let scene = &mut self.scene;
        let (renderer, physics) = (&scene.renderer, &scene.physics);
        scene.recorder.add_frame(|| renderer.render(physics), true);
        scene.timelapse.add_frame(|| renderer.render(physics), false);
    }
}

/// Check a sampled scene once it has been given time to settle.
pub(crate) fn settled_rejection<P: PhysicsEngine>(
    scene: &Scene<P>,
    initial_state: &[Predicate],
) -> Option<ResetRejection> {
    if scene.is_any_object_below_table() {
        log::debug!("object fell below the table");
        return Some(ResetRejection::BelowTable);
    }
    if scene.is_any_object_touching_base() {
        log::debug!("object touches the robot base");
        return Some(ResetRejection::TouchingBase);
    }
    if scene.is_any_object_moving() {
        log::debug!("scene did not settle");
        return Some(ResetRejection::NotSettled);
    }
    if let Some(predicate) = initial_state.iter().find(|p| !p.value(scene)) {
        log::debug!("{} does not hold after settling", predicate);
        return Some(ResetRejection::PredicateFailed);
    }
    None
}

/// `<dir>/<stem>_timelapse.gif`
fn timelapse_path(path: &Path) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!("{stem}_timelapse.gif"))
}

impl<P: PhysicsEngine> Env for TableEnv<P> {
    fn name(&self) -> &str {
        &self.name
    }

    fn reset(&mut self, seed: Option<u64>, options: Option<ResetOptions>) -> Result<Observation> {
        let options = options.unwrap_or_default();
        if let Some(seed) = seed {
            self.scene.rng.seed(seed);
        }

        self.release_cached_states();

        self.task_idx = match options.task {
            Some(idx) if idx < self.tasks.len() => idx,
            Some(idx) => {
                return Err(ConfigError::InvalidParameter {
                    param: "task".to_string(),
                    message: format!("{} tasks configured, got index {}", self.tasks.len(), idx),
                }
                .into())
            }
            None => self.scene.rng.usize(..self.tasks.len()),
        };
        if let Some(first) = self.tasks[self.task_idx].action_skeleton().first() {
            self.primitive = first.clone();
        }
        self.recording_text.clear();
        self.update_caption();
        self.reset_stats = ResetStats::default();

        let max_sample_attempts = options
            .max_sample_attempts
            .unwrap_or(self.max_sample_attempts)
            .max(1);
        let mut attempts = 0;
        loop {
            if self.max_reset_attempts.is_some_and(|max| attempts >= max) {
                log::error!("'{}' gave up after {} reset attempts", self.name, attempts);
                return Err(TableEnvError::ResetExhausted { attempts });
            }
            attempts += 1;
            self.reset_stats.attempts = attempts;
            if attempts % 100 == 0 {
                log::warn!(
                    "'{}' still searching for a valid initial state after {} attempts",
                    self.name,
                    attempts
                );
            }
            match self.try_reset(max_sample_attempts)? {
                Some(reason) => *self.reset_stats.rejections.entry(reason).or_default() += 1,
                None => break,
            }
        }
        log::debug!("'{}' reset task {} in {} attempts", self.name, self.task_idx, attempts);

        Ok(self.get_observation())
    }

    fn step(&mut self, action: &[f32]) -> Result<TableStep> {
        let action: [f32; ACTION_DIM] = action.try_into().map_err(|_| TableEnvError::InvalidAction {
            primitive: self.primitive.to_string(),
            expected: ACTION_DIM,
            actual: action.len(),
        })?;
        let scaled = self.primitive.scale_action(&action);
        let formatted: Vec<String> = scaled.iter().map(|v| format!("{v:.2}")).collect();
        self.recording_text = format!("Action: [{}]", formatted.join(", "));
        self.update_caption();

        self.capture_frames();
        let result = self.primitive.execute(&action, &mut self.scene);
        self.capture_frames();

        Ok(TableStep {
            observation: self.get_observation(),
            reward: if result.success { 1.0 } else { 0.0 },
            terminated: !result.truncated,
            truncated: result.truncated,
            info: StepInfo {
                primitive: self.primitive.to_string(),
                action: scaled,
            },
        })
    }

    fn get_observation(&self) -> Observation {
        let physics = &self.scene.physics;
        let mut observation = [[0.0; OBJECT_STATE_DIM]; MAX_NUM_OBJECTS];
        observation[EE_OBSERVATION_IDX] = *self.scene.robot.ee_state(physics).as_array();
        for (row, object) in Self::object_rows().zip(self.scene.objects.iter()) {
            observation[row] = *object.state(physics).as_array();
        }
        observation
    }

    fn set_observation(&mut self, observation: &Observation) {
        let ee_pose = ObjectState::from_row(&observation[EE_OBSERVATION_IDX]).pose();
        if let Err(e) = self.scene.goto_pose(ee_pose) {
            log::warn!("end-effector not moved to observed pose: {}", e);
        }

        let scene = &mut self.scene;
        for (row, object) in Self::object_rows().zip(scene.objects.iter()) {
            if object.is_null() {
                continue;
            }
            let state = ObjectState::from_row(&observation[row]);
            if let Err(e) = object.set_state(&mut scene.physics, &state) {
                log::warn!("state of '{}' not applied: {}", object.name(), e);
            }
        }
    }

    fn get_state(&mut self) -> StateId {
        let id = self.scene.physics.save_state();
        self.states.insert(id, self.scene.robot.get_state());
        id
    }

    fn set_state(&mut self, id: StateId) -> bool {
        let Some(robot_state) = self.states.get(&id).copied() else {
            log::warn!("unknown state id {:?}", id);
            return false;
        };
        let scene = &mut self.scene;
        let restored = scene
            .robot
            .remove_grasp_constraint(&mut scene.physics)
            .and_then(|_| scene.physics.restore_state(id))
            .and_then(|_| scene.robot.set_state(&mut scene.physics, &robot_state));
        match restored {
            Ok(()) => true,
            Err(e) => {
                log::warn!("failed to restore state {:?}: {}", id, e);
                false
            }
        }
    }

    fn get_primitive(&self) -> &Primitive {
        &self.primitive
    }

    fn set_primitive(&mut self, primitive: Primitive) {
        self.primitive = primitive;
        self.update_caption();
    }

    fn record_start(&mut self, prepend_id: Option<&str>, frequency: Option<usize>, mode: &str) -> bool {
        match self.recorder_mut(mode) {
            Some(recorder) => {
                recorder.start(prepend_id, frequency);
                true
            }
            None => false,
        }
    }

    fn record_stop(&mut self, save_id: Option<&str>, mode: &str) -> bool {
        self.recorder_mut(mode).is_some_and(|recorder| recorder.stop(save_id))
    }

    fn record_save(&mut self, path: &Path, reset: bool, mode: Option<&str>) -> Result<bool> {
        match mode {
            Some("timelapse") => self.scene.timelapse.save(&timelapse_path(path), reset),
            Some(mode) => match self.recorder_mut(mode) {
                Some(recorder) => recorder.save(path, reset),
                None => Ok(false),
            },
            None => {
                let saved = self.scene.recorder.save(path, reset)?;
                let saved_timelapse = self.scene.timelapse.save(&timelapse_path(path), reset)?;
                Ok(saved || saved_timelapse)
            }
        }
    }
}
