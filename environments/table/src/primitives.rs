//! Manipulation primitives.
//!
//! A primitive is a parameterized skill bound to scene objects, such as
//! `pick(hook, table)`. Policies act in a normalized `[-1, 1]^4` space;
//! [`Primitive::execute`] scales the action to physical units, drives the
//! robot through a short waypoint sequence, lets the scene settle and checks
//! the primitive's success condition.
//!
//! | Primitive | Action | Success |
//! |---|---|---|
//! | `pick(obj, support)` | grasp offset `[x, y, z, θ]` in the object frame | `obj` is held |
//! | `place(obj, target)` | placement offset `[x, y, z, θ]` on the target top | `on(obj, target)` |
//! | `pull(obj, hook)` | `[r_reach, r_pull, y, θ]` | `obj` moved toward the base |
//! | `push(obj, hook)` | `[r_reach, r_push, y, θ]` | `obj` moved away from the base |

use std::f32::consts::PI;
use std::fmt;

use crate::constants::*;
use crate::error::{ConfigError, ControlError};
use crate::math::{vec_add, vec_scale, Aabb, Pose};
use crate::objects::{Geometry, ObjectRegistry};
use crate::physics::{BodyId, PhysicsEngine};
use crate::predicates::{Predicate, PredicateKind};
use crate::scene::Scene;
use crate::task::parse_call;

/// Gap between an object's footprint and the hook head before a sweep.
const HOOK_STANDOFF: f32 = 0.01;

/// Outcome of one primitive execution.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ExecutionResult {
    pub success: bool,
    /// True if control failed and the episode cannot continue.
    pub truncated: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PrimitiveKind {
    Pick,
    Place,
    Pull,
    Push,
}

impl PrimitiveKind {
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "pick" => Self::Pick,
            "place" => Self::Place,
            "pull" => Self::Pull,
            "push" => Self::Push,
            _ => return None,
        })
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Pick => "pick",
            Self::Place => "place",
            Self::Pull => "pull",
            Self::Push => "push",
        }
    }

    /// Physical action bounds `(low, high)`.
    pub fn action_bounds(&self) -> ([f32; ACTION_DIM], [f32; ACTION_DIM]) {
        match self {
            Self::Pick => ([-0.2, -0.1, -0.05, -PI / 4.0], [0.2, 0.1, 0.05, PI / 4.0]),
            Self::Place => ([-0.4, -0.4, 0.0, -PI / 4.0], [0.4, 0.4, 0.1, PI / 4.0]),
            Self::Pull | Self::Push => ([0.0, 0.1, -0.1, -PI / 6.0], [0.2, 0.4, 0.1, PI / 6.0]),
        }
    }
}

/// A primitive bound to object names.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Primitive {
    kind: PrimitiveKind,
    /// Index of the primitive in the environment's primitive list.
    idx_policy: usize,
    args: Vec<String>,
}

impl fmt::Display for Primitive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.kind.name(), self.args.join(", "))
    }
}

/// Resolved object an action is computed against.
#[derive(Clone, Copy, Debug)]
struct Target {
    body: BodyId,
    pose: Pose,
    aabb: Aabb,
    geometry: Geometry,
}

fn target<P: PhysicsEngine>(scene: &Scene<P>, name: &str) -> Result<Target, ControlError> {
    let missing = || ControlError::MissingObject(name.to_string());
    let object = scene.objects.get(name).ok_or_else(missing)?;
    let body = object.body().ok_or_else(missing)?;
    Ok(Target {
        body,
        pose: scene.physics.pose(body)?,
        aabb: scene.physics.aabb(body)?,
        geometry: *object.geometry(),
    })
}

/// Horizontal distance from the robot base.
fn radius_from_base(base: [f32; 3], pos: [f32; 3]) -> f32 {
    (pos[0] - base[0]).hypot(pos[1] - base[1])
}

impl Primitive {
    /// Parse `name(arg1, arg2)`. The name must be one of `primitive_names`
    /// and every argument must be in the registry.
    pub fn from_action_call(
        call: &str,
        primitive_names: &[String],
        objects: &ObjectRegistry,
    ) -> Result<Self, ConfigError> {
        let (name, args) = parse_call(call)?;
        let unknown = || ConfigError::UnknownPrimitive {
            name: name.clone(),
            known: primitive_names.to_vec(),
        };
        let idx_policy = primitive_names.iter().position(|p| *p == name).ok_or_else(unknown)?;
        let kind = PrimitiveKind::from_name(&name).ok_or_else(unknown)?;
        if args.len() != 2 {
            return Err(ConfigError::ArgumentCount {
                name,
                expected: 2,
                actual: args.len(),
            });
        }
        if let Some(missing) = args.iter().find(|a| !objects.contains(a)) {
            return Err(ConfigError::UnknownObject {
                name: missing.clone(),
                call: call.to_string(),
            });
        }
        Ok(Self {
            kind,
            idx_policy,
            args,
        })
    }

    pub fn kind(&self) -> PrimitiveKind {
        self.kind
    }

    pub fn name(&self) -> &'static str {
        self.kind.name()
    }

    pub fn idx_policy(&self) -> usize {
        self.idx_policy
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    // ========================================================================
    // Action Space
    // ========================================================================

    /// Map a normalized action in `[-1, 1]` to physical units.
    /// Out-of-range components are clipped.
    pub fn scale_action(&self, action: &[f32; ACTION_DIM]) -> [f32; ACTION_DIM] {
        let (low, high) = self.kind.action_bounds();
        std::array::from_fn(|i| {
            let a = action[i].clamp(-1.0, 1.0);
            low[i] + 0.5 * (a + 1.0) * (high[i] - low[i])
        })
    }

    /// Inverse of [`scale_action`](Self::scale_action).
    pub fn normalize_action(&self, action: &[f32; ACTION_DIM]) -> [f32; ACTION_DIM] {
        let (low, high) = self.kind.action_bounds();
        std::array::from_fn(|i| 2.0 * (action[i] - low[i]) / (high[i] - low[i]) - 1.0)
    }

    /// Uniform normalized action.
    pub fn sample_action(&self, rng: &mut fastrand::Rng) -> [f32; ACTION_DIM] {
        std::array::from_fn(|_| rng.f32() * 2.0 - 1.0)
    }

    // ========================================================================
    // Execution
    // ========================================================================

    /// Execute a normalized action.
    ///
    /// Control failures are reported as `{ success: false, truncated: true }`.
    pub fn execute<P: PhysicsEngine>(&self, action: &[f32; ACTION_DIM], scene: &mut Scene<P>) -> ExecutionResult {
        let action = self.scale_action(action);
        let result = match self.kind {
            PrimitiveKind::Pick => self.pick(&action, scene),
            PrimitiveKind::Place => self.place(&action, scene),
            PrimitiveKind::Pull => self.sweep(&action, scene, true),
            PrimitiveKind::Push => self.sweep(&action, scene, false),
        };
        match result {
            Ok(success) => ExecutionResult {
                success,
                truncated: false,
            },
            Err(e) => {
                log::debug!("{} aborted: {}", self, e);
                ExecutionResult {
                    success: false,
                    truncated: true,
                }
            }
        }
    }

    fn pick<P: PhysicsEngine>(&self, action: &[f32; ACTION_DIM], scene: &mut Scene<P>) -> Result<bool, ControlError> {
        let obj = target(scene, &self.args[0])?;
        if scene.robot.grasped().is_some() {
            return Ok(false);
        }

        let mut pos = obj.pose.transform_point([action[0], action[1], action[2]]);
        pos[2] = pos[2].max(scene.robot.config().min_height);
        let grasp_pose = Pose::from_position_yaw(pos, obj.pose.yaw() + action[3]);

        scene.goto_pose(grasp_pose.translated([0.0, 0.0, APPROACH_HEIGHT]))?;
        scene.goto_pose(grasp_pose)?;
        let aabb = scene.physics.aabb(obj.body)?;
        if scene.robot.can_grasp(&scene.physics, &aabb) {
            scene.robot.grasp(&mut scene.physics, obj.body)?;
        }
        scene.goto_pose(grasp_pose.translated([0.0, 0.0, LIFT_HEIGHT]))?;
        scene.settle();

        Ok(scene.robot.is_grasping(obj.body))
    }

    fn place<P: PhysicsEngine>(&self, action: &[f32; ACTION_DIM], scene: &mut Scene<P>) -> Result<bool, ControlError> {
        let obj = target(scene, &self.args[0])?;
        if !scene.robot.is_grasping(obj.body) {
            return Err(ControlError::NotGrasped(self.args[0].clone()));
        }
        let support = target(scene, &self.args[1])?;

        // Keep the current end-effector to object-bottom offset.
        let ee = scene.robot.ee_pose(&scene.physics);
        let hang = ee.pos[2] - obj.aabb.min[2];
        let mut pos = support.pose.transform_point([action[0], action[1], 0.0]);
        pos[2] = support.aabb.max[2] + action[2] + DROP_HEIGHT + hang;
        let place_pose = Pose::from_position_yaw(pos, support.pose.yaw() + action[3]);

        scene.goto_pose(place_pose.translated([0.0, 0.0, APPROACH_HEIGHT]))?;
        scene.goto_pose(place_pose)?;
        scene.robot.remove_grasp_constraint(&mut scene.physics)?;
        scene.goto_pose(place_pose.translated([0.0, 0.0, APPROACH_HEIGHT]))?;
        scene.settle();

        Ok(Predicate::new(PredicateKind::On, &self.args).value(scene))
    }

    /// Pull (`toward = true`) or push the object with the held hook.
    fn sweep<P: PhysicsEngine>(
        &self,
        action: &[f32; ACTION_DIM],
        scene: &mut Scene<P>,
        toward: bool,
    ) -> Result<bool, ControlError> {
        let [r_reach, r_sweep, y, theta] = *action;
        let obj = target(scene, &self.args[0])?;
        let hook = target(scene, &self.args[1])?;
        let Geometry::Hook {
            head_length,
            handle_length,
            handle_y,
            radius,
        } = hook.geometry
        else {
            log::debug!("{}: '{}' is not a hook", self, self.args[1]);
            return Ok(false);
        };
        if !scene.robot.is_grasping(hook.body) {
            return Err(ControlError::NotGrasped(self.args[1].clone()));
        }

        let base = scene.robot.base_position();
        let (dx, dy) = (obj.pose.pos[0] - base[0], obj.pose.pos[1] - base[1]);
        let r_before = dx.hypot(dy);
        if r_before < 1e-6 {
            return Ok(false);
        }
        // Unit ray from the base through the object, and its left normal.
        let u = [dx / r_before, dy / r_before, 0.0];
        let v = [-u[1], u[0], 0.0];

        // Head behind the object to pull, in front of it to push.
        let half = obj.aabb.half_extents();
        let standoff = half[0].max(half[1]) + radius + HOOK_STANDOFF + r_reach;
        let side = if toward { 1.0 } else { -1.0 };
        let head = vec_add(vec_add(obj.pose.pos, vec_scale(u, side * standoff)), vec_scale(v, y));

        let yaw = dy.atan2(dx) + theta;
        let head_local = [
            handle_length * 0.5 + radius,
            handle_y.signum() * (head_length * 0.5 - radius),
            0.0,
        ];
        let head_offset = Pose::from_position_yaw([0.0; 3], yaw).transform_point(head_local);
        let hook_pose = Pose::from_position_yaw(
            [
                head[0] - head_offset[0],
                head[1] - head_offset[1],
                TABLE_HEIGHT + radius + HOOK_SWEEP_CLEARANCE,
            ],
            yaw,
        );

        // End-effector pose that puts the held hook at `hook_pose`.
        let ee = scene.robot.ee_pose(&scene.physics);
        let grip = ee.inverse().compose(&hook.pose);
        let ee_low = hook_pose.compose(&grip.inverse());
        let ee_end = ee_low.translated(vec_scale(u, -side * r_sweep));

        scene.goto_pose(ee_low.translated([0.0, 0.0, APPROACH_HEIGHT]))?;
        scene.goto_pose(ee_low)?;
        scene.goto_pose(ee_end)?;
        scene.goto_pose(ee_end.translated([0.0, 0.0, LIFT_HEIGHT]))?;
        scene.settle();

        let r_after = radius_from_base(base, scene.physics.pose(obj.body)?.pos);
        let moved = if toward { r_before - r_after } else { r_after - r_before };
        Ok(moved >= MIN_SWEEP_DISPLACEMENT)
    }
}
