//! Kinematic arm with a fixed-constraint gripper.
//!
//! The arm is modelled by its end-effector only: a non-colliding kinematic
//! body that tracks a commanded pose. Grasping attaches the object to the
//! end-effector through a physics constraint. Constraints are not part of
//! engine snapshots, so the grasp is carried in [`RobotState`] instead.

use crate::config::RobotConfig;
use crate::error::{ControlError, PhysicsError};
use crate::math::{Aabb, Pose, Twist};
use crate::object_state::ObjectState;
use crate::physics::{BodyDesc, BodyId, BodyKind, ConstraintId, PhysicsEngine, Shape};

/// End-effector cube edge length (m)
const EE_SIZE: f32 = 0.04;

/// Robot state that engine snapshots do not capture.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RobotState {
    pub command: Pose,
    pub grasped: Option<BodyId>,
}

#[derive(Clone, Copy, Debug)]
struct Grasp {
    body: BodyId,
    constraint: ConstraintId,
}

#[derive(Debug)]
pub struct Robot {
    config: RobotConfig,
    base: BodyId,
    ee: BodyId,
    command: Pose,
    grasp: Option<Grasp>,
}

impl Robot {
    /// Create the base and end-effector bodies.
    pub fn build<P: PhysicsEngine>(config: RobotConfig, physics: &mut P) -> Self {
        let [bx, by, bz] = config.base_position;
        let base = physics.add_body(
            BodyDesc::new("robot_base", Shape::cuboid(config.base_size), BodyKind::Static)
                .with_pose(Pose::from_position([bx, by, bz + config.base_size[2] * 0.5]))
                .with_color([90, 90, 90]),
        );
        let home = config.home.to_pose();
        let ee = physics.add_body(
            BodyDesc::new("ee", Shape::cuboid([EE_SIZE; 3]), BodyKind::Kinematic)
                .with_pose(home)
                .with_collision(false)
                .with_color([40, 200, 40]),
        );
        Self {
            config,
            base,
            ee,
            command: home,
            grasp: None,
        }
    }

    pub fn config(&self) -> &RobotConfig {
        &self.config
    }

    pub fn base(&self) -> BodyId {
        self.base
    }

    pub fn ee(&self) -> BodyId {
        self.ee
    }

    pub fn base_position(&self) -> [f32; 3] {
        self.config.base_position
    }

    pub fn command(&self) -> Pose {
        self.command
    }

    pub fn set_command(&mut self, pose: Pose) {
        self.command = pose;
    }

    pub fn ee_pose<P: PhysicsEngine>(&self, physics: &P) -> Pose {
        physics.pose(self.ee).unwrap_or(self.command)
    }

    /// End-effector row of the observation matrix.
    pub fn ee_state<P: PhysicsEngine>(&self, physics: &P) -> ObjectState {
        ObjectState::new(&self.ee_pose(physics), [0.0; 6])
    }

    // ========================================================================
    // Arm
    // ========================================================================

    pub fn is_reachable(&self, pose: &Pose) -> bool {
        let [bx, by, _] = self.config.base_position;
        let radius = (pose.pos[0] - bx).hypot(pose.pos[1] - by);
        radius <= self.config.reach
            && pose.pos[2] >= self.config.min_height
            && pose.pos[2] <= self.config.max_height
            && pose.pos.iter().all(|v| v.is_finite())
    }

    pub fn check_reachable(&self, pose: &Pose) -> Result<(), ControlError> {
        if self.is_reachable(pose) {
            Ok(())
        } else {
            Err(ControlError::Unreachable { pos: pose.pos })
        }
    }

    /// Drive the end-effector to the commanded pose.
    pub fn update_control<P: PhysicsEngine>(&self, physics: &mut P) -> Result<(), PhysicsError> {
        physics.set_pose(self.ee, self.command)?;
        physics.set_twist(self.ee, Twist::ZERO)
    }

    /// Release any grasp and return to the home pose.
    pub fn reset<P: PhysicsEngine>(&mut self, physics: &mut P) -> Result<(), PhysicsError> {
        self.remove_grasp_constraint(physics)?;
        self.command = self.config.home.to_pose();
        self.update_control(physics)
    }

    // ========================================================================
    // Gripper
    // ========================================================================

    pub fn grasped(&self) -> Option<BodyId> {
        self.grasp.map(|g| g.body)
    }

    pub fn is_grasping(&self, body: BodyId) -> bool {
        self.grasped() == Some(body)
    }

    /// True if the end-effector sits within an object's (slackened) bounds.
    pub fn can_grasp<P: PhysicsEngine>(&self, physics: &P, aabb: &Aabb) -> bool {
        aabb.expanded(self.config.grasp_tolerance)
            .contains(self.ee_pose(physics).pos)
    }

    /// Attach `body` to the end-effector at their current relative pose.
    pub fn grasp<P: PhysicsEngine>(&mut self, physics: &mut P, body: BodyId) -> Result<(), PhysicsError> {
        self.remove_grasp_constraint(physics)?;
        let constraint = physics.create_constraint(self.ee, body)?;
        physics.set_twist(body, Twist::ZERO)?;
        self.grasp = Some(Grasp { body, constraint });
        Ok(())
    }

    pub fn remove_grasp_constraint<P: PhysicsEngine>(&mut self, physics: &mut P) -> Result<(), PhysicsError> {
        match self.grasp.take() {
            Some(grasp) => physics.remove_constraint(grasp.constraint),
            None => Ok(()),
        }
    }

    // ========================================================================
    // State
    // ========================================================================

    pub fn get_state(&self) -> RobotState {
        RobotState {
            command: self.command,
            grasped: self.grasped(),
        }
    }

    /// Restore command and grasp. Call after the engine state was restored.
    pub fn set_state<P: PhysicsEngine>(&mut self, physics: &mut P, state: &RobotState) -> Result<(), PhysicsError> {
        self.remove_grasp_constraint(physics)?;
        self.command = state.command;
        self.update_control(physics)?;
        if let Some(body) = state.grasped {
            self.grasp(physics, body)?;
        }
        Ok(())
    }
}
