//! Simulation context shared by primitives, predicates and the environment.
//!
//! A [`Scene`] owns the physics engine together with everything that must be
//! advanced in lockstep with it: the robot, the object registry, the optional
//! object tracker and the recorders. Components never reach the engine
//! through global state; they are handed the scene explicitly.

use std::collections::BTreeMap;

use crate::constants::DEFAULT_MAX_STABLE_ITERS;
use crate::error::ControlError;
use crate::math::{quat_nlerp, vec_lerp, vec_norm, vec_sub, Pose};
use crate::objects::{Object, ObjectGroup, ObjectRegistry};
use crate::physics::{PhysicsEngine, World};
use crate::predicates::{is_below_table, is_moving};
use crate::renderer::{Frame, Recorder, Renderer};
use crate::robot::Robot;
use crate::tracker::ObjectTracker;

pub struct Scene<P: PhysicsEngine = World> {
    pub(crate) physics: P,
    pub(crate) robot: Robot,
    pub(crate) objects: ObjectRegistry,
    pub(crate) object_groups: BTreeMap<String, ObjectGroup>,
    pub(crate) tracker: Option<Box<dyn ObjectTracker<P>>>,
    pub(crate) rng: fastrand::Rng,
    pub(crate) renderer: Renderer,
    /// Default channel: one frame every `frequency` simulation steps.
    pub(crate) recorder: Recorder,
    /// Timelapse channel: frames around each primitive execution.
    pub(crate) timelapse: Recorder,
}

impl<P: PhysicsEngine> Scene<P> {
    pub fn new(
        physics: P,
        robot: Robot,
        objects: ObjectRegistry,
        object_groups: BTreeMap<String, ObjectGroup>,
        recording_freq: usize,
    ) -> Self {
        Self {
            physics,
            robot,
            objects,
            object_groups,
            tracker: None,
            rng: fastrand::Rng::new(),
            renderer: Renderer::new(),
            recorder: Recorder::new(recording_freq),
            timelapse: Recorder::new(1),
        }
    }

    pub fn physics(&self) -> &P {
        &self.physics
    }

    pub fn physics_mut(&mut self) -> &mut P {
        &mut self.physics
    }

    pub fn robot(&self) -> &Robot {
        &self.robot
    }

    pub fn objects(&self) -> &ObjectRegistry {
        &self.objects
    }

    pub fn object(&self, name: &str) -> Option<&Object> {
        self.objects.get(name)
    }

    pub fn rng_mut(&mut self) -> &mut fastrand::Rng {
        &mut self.rng
    }

    pub fn set_tracker(&mut self, tracker: Box<dyn ObjectTracker<P>>) {
        self.tracker = Some(tracker);
    }

    pub fn render(&self) -> Frame {
        self.renderer.render(&self.physics)
    }

    // ========================================================================
    // Stepping
    // ========================================================================

    /// Advance physics one step, then record and broadcast.
    pub fn step_simulation(&mut self) {
        self.physics.step_simulation();

        let (renderer, physics) = (&self.renderer, &self.physics);
        self.recorder.add_frame(|| renderer.render(physics), false);

        if let Some(tracker) = self.tracker.as_mut() {
            if !tracker.is_live() {
                tracker.send_poses(&self.objects, &self.physics);
            }
        }
    }

    /// Step until nothing moves, or something falls or touches the robot
    /// base, or `max_iters` is reached. Always steps at least once.
    ///
    /// Returns the number of steps taken.
    pub fn wait_until_stable(&mut self, min_iters: usize, max_iters: usize) -> usize {
        let mut num_iters = 0;
        while num_iters == 0
            || (num_iters < max_iters
                && (num_iters < min_iters || self.is_any_object_moving())
                && !self.is_any_object_below_table()
                && !self.is_any_object_touching_base())
        {
            if let Err(e) = self.robot.update_control(&mut self.physics) {
                log::error!("failed to apply robot command: {}", e);
            }
            self.step_simulation();
            num_iters += 1;
        }
        num_iters
    }

    /// `wait_until_stable` with the default budget.
    pub fn settle(&mut self) -> usize {
        self.wait_until_stable(1, DEFAULT_MAX_STABLE_ITERS)
    }

    // ========================================================================
    // Failure Conditions
    // ========================================================================

    fn dynamic_objects(&self) -> impl Iterator<Item = &Object> {
        self.objects.iter().filter(|o| !o.is_static() && !o.is_null())
    }

    pub fn is_any_object_moving(&self) -> bool {
        self.dynamic_objects()
            .any(|o| o.twist(&self.physics).is_some_and(|t| is_moving(&t)))
    }

    pub fn is_any_object_below_table(&self) -> bool {
        self.dynamic_objects()
            .any(|o| o.pose(&self.physics).is_some_and(|p| is_below_table(&p)))
    }

    pub fn is_any_object_touching_base(&self) -> bool {
        let base = self.robot.base();
        self.dynamic_objects().any(|o| {
            o.body()
                .is_some_and(|b| self.physics.is_touching(b, base).unwrap_or(false))
        })
    }

    // ========================================================================
    // Control
    // ========================================================================

    /// Move the end-effector to `target` along a straight line, stepping the
    /// simulation at every waypoint.
    pub fn goto_pose(&mut self, target: Pose) -> Result<(), ControlError> {
        self.robot.check_reachable(&target)?;
        let start = self.robot.command();
        let distance = vec_norm(vec_sub(target.pos, start.pos));
        let num_steps = ((distance / self.robot.config().max_step).ceil() as usize).max(1);

        for i in 1..=num_steps {
            let waypoint = if i == num_steps {
                target
            } else {
                let t = i as f32 / num_steps as f32;
                Pose {
                    pos: vec_lerp(start.pos, target.pos, t),
                    quat: quat_nlerp(start.quat, target.quat, t),
                }
            };
            self.robot.set_command(waypoint);
            self.robot.update_control(&mut self.physics)?;
            self.step_simulation();
        }
        Ok(())
    }
}
