//! Predicates over scene objects.
//!
//! Each predicate can be evaluated ([`Predicate::value`]) and, for the
//! constructive ones, sampled ([`Predicate::sample`]): one randomized attempt
//! to rearrange the scene so that it holds. A failed sample leaves the scene
//! untouched.
//!
//! | Predicate | Holds when | Sampling |
//! |---|---|---|
//! | `on(a, b)` | `a` rests on top of `b` and is not held | places `a` on `b`, honouring the region and clearance predicates of the context |
//! | `free(a)` | no movable object is within `FREE_CLEARANCE` of `a` | enforced by `on` clearance |
//! | `inhand(a)` | the gripper holds `a` | moves `a` to the gripper and grasps it |
//! | `inworkspace(a)` | `a` lies in the reachable wedge in front of the base | enforced by `on` |
//! | `beyondworkspace(a)` | `a` lies outside the reachable radius | enforced by `on` |
//! | `poslimit(a)` | `a` lies inside its configured position limits | enforced by `on` |
//! | `nonblocking(a, b)` | `b` is off the corridor from the base to `a` | enforced by `on` |

use std::f32::consts::PI;
use std::fmt;

use crate::constants::*;
use crate::error::ConfigError;
use crate::math::{Aabb, Pose, Twist};
use crate::objects::{Object, ObjectRegistry};
use crate::physics::{BodyId, PhysicsEngine};
use crate::scene::Scene;
use crate::task::parse_call;

// ============================================================================
// Geometric Helpers
// ============================================================================

/// True if the pose origin is under the table surface.
pub fn is_below_table(pose: &Pose) -> bool {
    pose.pos[2] < TABLE_HEIGHT
}

/// True if the twist magnitude reaches `MOVING_THRESHOLD`.
pub fn is_moving(twist: &Twist) -> bool {
    twist.norm() >= MOVING_THRESHOLD
}

/// Contact between two bodies. Unknown bodies never touch.
pub fn is_touching<P: PhysicsEngine>(physics: &P, a: BodyId, b: BodyId) -> bool {
    physics.is_touching(a, b).unwrap_or(false)
}

/// Distance and bearing of `pos` from the robot base in the table plane.
fn polar(base: [f32; 3], pos: [f32; 3]) -> (f32, f32) {
    let (dx, dy) = (pos[0] - base[0], pos[1] - base[1]);
    (dx.hypot(dy), dy.atan2(dx))
}

pub fn in_workspace(base: [f32; 3], pos: [f32; 3]) -> bool {
    let (r, bearing) = polar(base, pos);
    (WORKSPACE_MIN_RADIUS..=WORKSPACE_MAX_RADIUS).contains(&r) && bearing.abs() <= WORKSPACE_MAX_ANGLE
}

pub fn beyond_workspace(base: [f32; 3], pos: [f32; 3]) -> bool {
    polar(base, pos).0 > WORKSPACE_MAX_RADIUS
}

fn within_limits(limits: Option<[[f32; 2]; 2]>, pos: [f32; 3]) -> bool {
    match limits {
        Some([min, max]) => (0..2).all(|i| pos[i] >= min[i] && pos[i] <= max[i]),
        None => true,
    }
}

/// True if `obstacle` intrudes on the corridor from the base to `target`.
///
/// The corridor runs from the base past the target by the target's own
/// half-width, and is as wide as both footprints plus `NONBLOCKING_MARGIN`.
pub fn blocks(base: [f32; 3], target: &Aabb, obstacle: &Aabb) -> bool {
    let t_center = target.center();
    let o_center = obstacle.center();
    let (dx, dy) = (t_center[0] - base[0], t_center[1] - base[1]);
    let length = dx.hypot(dy);
    if length < 1e-6 {
        return false;
    }
    let u = [dx / length, dy / length];
    let (ox, oy) = (o_center[0] - base[0], o_center[1] - base[1]);
    let along = ox * u[0] + oy * u[1];
    let across = (ox * u[1] - oy * u[0]).abs();

    let t_half = target.half_extents();
    let o_half = obstacle.half_extents();
    let t_width = t_half[0].max(t_half[1]);
    let o_width = o_half[0].max(o_half[1]);
    along > 0.0
        && along < length + t_width + NONBLOCKING_MARGIN
        && across < t_width + o_width + NONBLOCKING_MARGIN
}

// ============================================================================
// Predicate
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PredicateKind {
    On,
    Free,
    Inhand,
    InWorkspace,
    BeyondWorkspace,
    PosLimit,
    NonBlocking,
}

impl PredicateKind {
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "on" => Self::On,
            "free" => Self::Free,
            "inhand" => Self::Inhand,
            "inworkspace" => Self::InWorkspace,
            "beyondworkspace" => Self::BeyondWorkspace,
            "poslimit" => Self::PosLimit,
            "nonblocking" => Self::NonBlocking,
            _ => return None,
        })
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::On => "on",
            Self::Free => "free",
            Self::Inhand => "inhand",
            Self::InWorkspace => "inworkspace",
            Self::BeyondWorkspace => "beyondworkspace",
            Self::PosLimit => "poslimit",
            Self::NonBlocking => "nonblocking",
        }
    }

    pub fn arity(&self) -> usize {
        match self {
            Self::On | Self::NonBlocking => 2,
            _ => 1,
        }
    }
}

/// A predicate bound to object names.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Predicate {
    kind: PredicateKind,
    args: Vec<String>,
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.kind.name(), self.args.join(", "))
    }
}

/// Where `on` draws candidate positions from.
#[derive(Clone, Copy, Debug)]
enum Region {
    Workspace,
    BeyondWorkspace,
    Limits([[f32; 2]; 2]),
    Surface,
}

impl Predicate {
    /// Parse `name(arg1, ...)`, resolving every argument in `objects`.
    pub fn from_string(call: &str, objects: &ObjectRegistry) -> Result<Self, ConfigError> {
        let (name, args) = parse_call(call)?;
        let kind = PredicateKind::from_name(&name)
            .ok_or_else(|| ConfigError::UnknownPredicate { name: name.clone() })?;
        if args.len() != kind.arity() {
            return Err(ConfigError::ArgumentCount {
                name,
                expected: kind.arity(),
                actual: args.len(),
            });
        }
        if let Some(missing) = args.iter().find(|a| !objects.contains(a)) {
            return Err(ConfigError::UnknownObject {
                name: missing.clone(),
                call: call.to_string(),
            });
        }
        Ok(Self { kind, args })
    }

    /// Build without registry checks. Unknown names evaluate false.
    pub fn new<S: Into<String>>(kind: PredicateKind, args: impl IntoIterator<Item = S>) -> Self {
        Self {
            kind,
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    pub fn kind(&self) -> PredicateKind {
        self.kind
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    fn arg<'a, P: PhysicsEngine>(&self, scene: &'a Scene<P>, i: usize) -> Option<&'a Object> {
        let name = self.args.get(i)?;
        scene.objects.get(name).filter(|o| !o.is_null())
    }

    // ========================================================================
    // Evaluation
    // ========================================================================

    /// Evaluate on the current scene. Predicates over null objects are false.
    pub fn value<P: PhysicsEngine>(&self, scene: &Scene<P>) -> bool {
        let Some(a) = self.arg(scene, 0) else {
            return false;
        };
        let physics = &scene.physics;
        let base = scene.robot.base_position();
        let (Some(a_pose), Some(a_aabb)) = (a.pose(physics), a.aabb(physics)) else {
            return false;
        };

        match self.kind {
            PredicateKind::On => {
                let Some(b_aabb) = self.arg(scene, 1).and_then(|b| b.aabb(physics)) else {
                    return false;
                };
                !a.body().is_some_and(|body| scene.robot.is_grasping(body))
                    && (a_aabb.min[2] - b_aabb.max[2]).abs() <= ON_HEIGHT_TOLERANCE
                    && b_aabb.contains_xy(a_pose.pos)
            }
            PredicateKind::Free => scene
                .objects
                .iter()
                .filter(|o| o.name() != a.name() && !o.is_static())
                .filter_map(|o| o.aabb(physics))
                .all(|other| !a_aabb.within(&other, FREE_CLEARANCE)),
            PredicateKind::Inhand => a.body().is_some_and(|body| scene.robot.is_grasping(body)),
            PredicateKind::InWorkspace => in_workspace(base, a_pose.pos),
            PredicateKind::BeyondWorkspace => beyond_workspace(base, a_pose.pos),
            PredicateKind::PosLimit => within_limits(a.pos_limits(), a_pose.pos),
            PredicateKind::NonBlocking => match self.arg(scene, 1).and_then(|b| b.aabb(physics)) {
                Some(b_aabb) => !blocks(base, &a_aabb, &b_aabb),
                None => false,
            },
        }
    }

    // ========================================================================
    // Sampling
    // ========================================================================

    /// One randomized attempt to make this predicate hold.
    ///
    /// `context` is the full initial-state list; samplers earlier in the list
    /// have already run, later ones are still pending.
    pub fn sample<P: PhysicsEngine>(&self, scene: &mut Scene<P>, context: &[Predicate]) -> bool {
        if self.args.len() != self.kind.arity() {
            return false;
        }
        match self.kind {
            PredicateKind::On => self.sample_on(scene, context),
            PredicateKind::Inhand => self.sample_inhand(scene),
            _ => true,
        }
    }

    /// Objects that a later `on` in `context` will place.
    fn pending<'a>(&self, context: &'a [Predicate]) -> Vec<&'a str> {
        let Some(idx) = context.iter().position(|p| p == self) else {
            return Vec::new();
        };
        context[idx + 1..]
            .iter()
            .filter(|p| p.kind == PredicateKind::On)
            .filter_map(|p| p.args.first().map(String::as_str))
            .collect()
    }

    fn region(&self, context: &[Predicate], limits: Option<[[f32; 2]; 2]>) -> Region {
        let about_a = |kind: PredicateKind| {
            context
                .iter()
                .any(|p| p.kind == kind && p.args.first() == self.args.first())
        };
        if about_a(PredicateKind::InWorkspace) {
            Region::Workspace
        } else if about_a(PredicateKind::BeyondWorkspace) {
            Region::BeyondWorkspace
        } else if let (true, Some(limits)) = (about_a(PredicateKind::PosLimit), limits) {
            Region::Limits(limits)
        } else {
            Region::Surface
        }
    }

    fn sample_on<P: PhysicsEngine>(&self, scene: &mut Scene<P>, context: &[Predicate]) -> bool {
        let a_name = self.args[0].as_str();
        let (Some(a), Some(b)) = (self.arg(scene, 0), self.arg(scene, 1)) else {
            return false;
        };
        let Some(a_body) = a.body() else {
            return false;
        };
        if a.is_table() || scene.robot.is_grasping(a_body) {
            return false;
        }
        let Some(b_aabb) = b.aabb(&scene.physics) else {
            return false;
        };
        let b_name = b.name().to_string();
        let b_is_table = b.is_table();
        let a_limits = a.pos_limits();
        let shape = a.geometry().shape();
        let base = scene.robot.base_position();

        // Candidate pose.
        let region = if b_is_table {
            self.region(context, a_limits)
        } else {
            Region::Surface
        };
        let rng = &mut scene.rng;
        let xy = sample_xy(rng, base, &b_aabb, region, b_is_table);
        let yaw = rng.f32() * 2.0 * PI - PI;
        let floor_pose = Pose::from_position_yaw([xy[0], xy[1], 0.0], yaw);
        let bottom = shape.aabb(&floor_pose).min[2];
        let pose = floor_pose.translated([0.0, 0.0, b_aabb.max[2] + DROP_HEIGHT - bottom]);
        let aabb = shape.aabb(&pose);

        // Support.
        let supported = if b_is_table {
            b_aabb.contains_footprint(&aabb)
        } else {
            b_aabb.contains_xy(pose.pos)
        };
        if !supported {
            return false;
        }

        // Region predicates about `a`.
        let region_ok = context
            .iter()
            .filter(|p| p.args.first().is_some_and(|arg| arg == a_name))
            .all(|p| match p.kind {
                PredicateKind::InWorkspace => in_workspace(base, pose.pos),
                PredicateKind::BeyondWorkspace => beyond_workspace(base, pose.pos),
                PredicateKind::PosLimit => within_limits(a_limits, pose.pos),
                _ => true,
            });
        if !region_ok {
            return false;
        }

        // Clearance from placed objects and the robot base.
        let pending = self.pending(context);
        let physics = &scene.physics;
        let placed = |o: &&Object| {
            o.name() != a_name && o.name() != b_name && !pending.contains(&o.name())
        };
        let crowded = scene
            .objects
            .iter()
            .filter(placed)
            .filter_map(|o| o.aabb(physics))
            .any(|other| aabb.within(&other, SAMPLE_CLEARANCE));
        let near_base = physics
            .aabb(scene.robot.base())
            .is_ok_and(|base_aabb| aabb.within(&base_aabb, SAMPLE_CLEARANCE));
        if crowded || near_base {
            return false;
        }

        // Corridors to and from `a`.
        for p in context.iter().filter(|p| p.kind == PredicateKind::NonBlocking) {
            let [target, obstacle] = p.args.as_slice() else {
                continue;
            };
            let (target, obstacle) = (target.as_str(), obstacle.as_str());
            let other = if target == a_name {
                obstacle
            } else if obstacle == a_name {
                target
            } else {
                continue;
            };
            if pending.contains(&other) {
                continue;
            }
            let Some(other_aabb) = scene.objects.get(other).and_then(|o| o.aabb(physics)) else {
                continue;
            };
            let blocked = if target == a_name {
                blocks(base, &aabb, &other_aabb)
            } else {
                blocks(base, &other_aabb, &aabb)
            };
            if blocked {
                return false;
            }
        }

        let placed = scene
            .physics
            .set_pose(a_body, pose)
            .and_then(|_| scene.physics.set_twist(a_body, Twist::ZERO));
        placed.is_ok()
    }

    fn sample_inhand<P: PhysicsEngine>(&self, scene: &mut Scene<P>) -> bool {
        let Some(body) = self.arg(scene, 0).and_then(|a| a.body()) else {
            return false;
        };
        let ee = scene.robot.ee_pose(&scene.physics);
        let pose = Pose::from_position_yaw(ee.pos, ee.yaw());
        let grasped = scene
            .physics
            .set_pose(body, pose)
            .and_then(|_| scene.robot.grasp(&mut scene.physics, body));
        grasped.is_ok()
    }
}

/// Candidate object origin on a support.
fn sample_xy(rng: &mut fastrand::Rng, base: [f32; 3], support: &Aabb, region: Region, is_table: bool) -> [f32; 2] {
    let uniform = |rng: &mut fastrand::Rng, lo: f32, hi: f32| lo + rng.f32() * (hi - lo);
    let polar = |rng: &mut fastrand::Rng, r: (f32, f32), bearing: f32| {
        let radius = uniform(rng, r.0, r.1);
        let angle = uniform(rng, -bearing, bearing);
        [base[0] + radius * angle.cos(), base[1] + radius * angle.sin()]
    };
    match region {
        Region::Workspace => polar(
            rng,
            (WORKSPACE_MIN_RADIUS, WORKSPACE_MAX_RADIUS),
            WORKSPACE_MAX_ANGLE,
        ),
        Region::BeyondWorkspace => polar(
            rng,
            (WORKSPACE_MAX_RADIUS + 0.05, BEYOND_WORKSPACE_MAX_RADIUS),
            BEYOND_WORKSPACE_MAX_ANGLE,
        ),
        Region::Limits([min, max]) => [uniform(rng, min[0], max[0]), uniform(rng, min[1], max[1])],
        Region::Surface => {
            // Anywhere on a table; the central half of smaller supports.
            let shrink = if is_table { 1.0 } else { 0.5 };
            let c = support.center();
            let h = support.half_extents();
            [
                uniform(rng, c[0] - h[0] * shrink, c[0] + h[0] * shrink),
                uniform(rng, c[1] - h[1] * shrink, c[1] + h[1] * shrink),
            ]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_workspace_regions_disjoint() {
        let base = [0.0; 3];
        assert!(in_workspace(base, [0.5, 0.0, 0.0]));
        assert!(!beyond_workspace(base, [0.5, 0.0, 0.0]));
        assert!(beyond_workspace(base, [0.85, 0.0, 0.0]));
        assert!(!in_workspace(base, [0.85, 0.0, 0.0]));
        assert!(!in_workspace(base, [-0.5, 0.0, 0.0]));
    }

    #[test]
    fn test_blocks_corridor() {
        let base = [0.0; 3];
        let target = Aabb { min: [0.8, -0.025, 0.0], max: [0.85, 0.025, 0.05] };
        let in_the_way = Aabb { min: [0.4, -0.02, 0.0], max: [0.44, 0.02, 0.05] };
        let aside = Aabb { min: [0.4, 0.4, 0.0], max: [0.44, 0.44, 0.05] };
        let behind_base = Aabb { min: [-0.3, -0.02, 0.0], max: [-0.26, 0.02, 0.05] };
        assert!(blocks(base, &target, &in_the_way));
        assert!(!blocks(base, &target, &aside));
        assert!(!blocks(base, &target, &behind_base));
    }

    #[test]
    fn test_motion_thresholds() {
        assert!(!is_moving(&Twist::ZERO));
        let slow = Twist { linear: [0.0, 0.0, 5e-4], angular: [0.0; 3] };
        assert!(!is_moving(&slow));
        let fast = Twist { linear: [0.0, 0.0, -0.04], angular: [0.0; 3] };
        assert!(is_moving(&fast));
        assert!(is_below_table(&Pose::from_position([0.5, 0.0, -0.01])));
        assert!(!is_below_table(&Pose::from_position([0.5, 0.0, 0.02])));
    }
}
