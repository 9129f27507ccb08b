//! Built-in headless rigid-body engine.
//!
//! A small simulator for quasi-static table-top scenes:
//!
//! - Dynamic bodies fall under gravity and come to rest on the highest solid
//!   surface below each of their parts (or on the floor).
//! - Resting contact removes all velocity (infinite friction, no bounce).
//! - Fixed constraints carry a child along with its parent. A constrained
//!   child that moves horizontally drags every dynamic body it penetrates by
//!   the same displacement, which is how a held hook pulls or pushes.
//! - Snapshots store poses, twists and enabled flags of all bodies.
//! - Removed constraints free their slot for the next one created.

use std::collections::{HashMap, HashSet};

use crate::constants::{FLOOR_HEIGHT, G, PHYSICS_TIMESTEP, SUPPORT_TOLERANCE};
use crate::error::PhysicsError;
use crate::math::{Aabb, Pose, Twist};

use super::{Body, BodyDesc, BodyId, BodyKind, ConstraintId, PhysicsEngine, StateId};

#[derive(Clone, Copy, Debug)]
struct BodySnapshot {
    pose: Pose,
    twist: Twist,
    enabled: bool,
}

#[derive(Clone, Copy, Debug)]
struct Constraint {
    parent: BodyId,
    child: BodyId,
    /// Child pose in the parent frame.
    offset: Pose,
}

/// Headless table-top physics world.
#[derive(Debug)]
pub struct World {
    bodies: Vec<Body>,
    timestep: f32,
    gravity: f32,
    floor_height: f32,
    snapshots: HashMap<StateId, Vec<BodySnapshot>>,
    next_state_id: u64,
    constraints: Vec<Option<Constraint>>,
    num_steps: u64,
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

impl World {
    pub fn new() -> Self {
        Self {
            bodies: Vec::new(),
            timestep: PHYSICS_TIMESTEP,
            gravity: G,
            floor_height: FLOOR_HEIGHT,
            snapshots: HashMap::new(),
            next_state_id: 0,
            constraints: Vec::new(),
            num_steps: 0,
        }
    }

    /// Number of `step_simulation` calls since construction.
    pub fn num_steps(&self) -> u64 {
        self.num_steps
    }

    pub fn num_constraints(&self) -> usize {
        self.constraints.iter().flatten().count()
    }

    /// Allocated constraint slots, live or free.
    pub fn constraint_capacity(&self) -> usize {
        self.constraints.len()
    }

    fn get_mut(&mut self, id: BodyId) -> Result<&mut Body, PhysicsError> {
        self.bodies.get_mut(id.0).ok_or(PhysicsError::UnknownBody(id.0))
    }

    fn constrained_children(&self) -> HashSet<BodyId> {
        self.constraints.iter().flatten().map(|c| c.child).collect()
    }

    // ========================================================================
    // Constraints
    // ========================================================================

    fn apply_constraints(&mut self) {
        let held = self.constrained_children();
        for k in 0..self.constraints.len() {
            let Some(c) = self.constraints[k] else {
                continue;
            };
            let target = self.bodies[c.parent.0].pose.compose(&c.offset);
            let child = &mut self.bodies[c.child.0];
            let prev = child.pose;
            child.pose = target;
            child.twist = Twist::ZERO;

            let delta = [target.pos[0] - prev.pos[0], target.pos[1] - prev.pos[1]];
            if delta != [0.0, 0.0] {
                self.drag_penetrated(c.child, delta, &held);
            }
        }
    }

    /// Move every free dynamic body penetrated by `pusher` horizontally by `delta`.
    fn drag_penetrated(&mut self, pusher: BodyId, delta: [f32; 2], held: &HashSet<BodyId>) {
        if !self.bodies[pusher.0].is_solid() {
            return;
        }
        let pusher_parts = self.bodies[pusher.0].part_aabbs();
        for (j, body) in self.bodies.iter_mut().enumerate() {
            if j == pusher.0
                || body.kind != BodyKind::Dynamic
                || !body.is_solid()
                || held.contains(&BodyId(j))
            {
                continue;
            }
            let penetrated = body
                .part_aabbs()
                .iter()
                .any(|a| pusher_parts.iter().any(|p| p.overlaps(a)));
            if penetrated {
                body.pose.pos[0] += delta[0];
                body.pose.pos[1] += delta[1];
            }
        }
    }

    // ========================================================================
    // Integration
    // ========================================================================

    /// Largest downward displacement body `i` can take before a part lands.
    fn fall_clearance(&self, i: usize) -> f32 {
        let parts = self.bodies[i].part_aabbs();
        parts
            .iter()
            .map(|part| {
                let bottom = part.min[2];
                let support = self
                    .bodies
                    .iter()
                    .enumerate()
                    .filter(|(j, other)| *j != i && other.is_solid())
                    .flat_map(|(_, other)| other.part_aabbs())
                    .filter(|s| s.overlaps_xy(part) && s.max[2] <= bottom + SUPPORT_TOLERANCE)
                    .map(|s| s.max[2])
                    .fold(self.floor_height, f32::max);
                bottom - support
            })
            .fold(f32::INFINITY, f32::min)
    }

    fn integrate(&mut self, i: usize) {
        let dt = self.timestep;
        let clearance = self.fall_clearance(i);
        let body = &mut self.bodies[i];
        let mut twist = body.twist;
        twist.linear[2] -= self.gravity * dt;

        let mut delta = [twist.linear[0] * dt, twist.linear[1] * dt, twist.linear[2] * dt];
        if -delta[2] >= clearance {
            // Landed: resting contact removes all motion.
            delta = [0.0, 0.0, -clearance];
            twist = Twist::ZERO;
        }

        body.pose.pos[0] += delta[0];
        body.pose.pos[1] += delta[1];
        body.pose.pos[2] += delta[2];
        body.twist = twist;
    }
}

impl PhysicsEngine for World {
    fn timestep(&self) -> f32 {
        self.timestep
    }

    fn step_simulation(&mut self) {
        self.apply_constraints();

        let held = self.constrained_children();
        let mut order: Vec<(usize, Aabb)> = self
            .bodies
            .iter()
            .enumerate()
            .filter(|(i, b)| b.kind == BodyKind::Dynamic && b.enabled && !held.contains(&BodyId(*i)))
            .map(|(i, b)| (i, b.aabb()))
            .collect();
        // Lowest first so stacked bodies land on already-settled supports.
        order.sort_by(|a, b| a.1.min[2].total_cmp(&b.1.min[2]));
        for (i, _) in order {
            self.integrate(i);
        }

        self.num_steps += 1;
    }

    fn add_body(&mut self, desc: BodyDesc) -> BodyId {
        self.bodies.push(Body::from(desc));
        BodyId(self.bodies.len() - 1)
    }

    fn body(&self, id: BodyId) -> Result<&Body, PhysicsError> {
        self.bodies.get(id.0).ok_or(PhysicsError::UnknownBody(id.0))
    }

    fn body_ids(&self) -> Vec<BodyId> {
        (0..self.bodies.len()).map(BodyId).collect()
    }

    fn set_pose(&mut self, id: BodyId, pose: Pose) -> Result<(), PhysicsError> {
        self.get_mut(id)?.pose = pose;
        Ok(())
    }

    fn set_twist(&mut self, id: BodyId, twist: Twist) -> Result<(), PhysicsError> {
        self.get_mut(id)?.twist = twist;
        Ok(())
    }

    fn set_enabled(&mut self, id: BodyId, enabled: bool) -> Result<(), PhysicsError> {
        let body = self.get_mut(id)?;
        body.enabled = enabled;
        if !enabled {
            body.twist = Twist::ZERO;
        }
        Ok(())
    }

    fn save_state(&mut self) -> StateId {
        let id = StateId(self.next_state_id);
        self.next_state_id += 1;
        let snapshot = self
            .bodies
            .iter()
            .map(|b| BodySnapshot {
                pose: b.pose,
                twist: b.twist,
                enabled: b.enabled,
            })
            .collect();
        self.snapshots.insert(id, snapshot);
        id
    }

    fn restore_state(&mut self, id: StateId) -> Result<(), PhysicsError> {
        let snapshot = self.snapshots.get(&id).ok_or(PhysicsError::UnknownState(id.0))?;
        for (body, saved) in self.bodies.iter_mut().zip(snapshot) {
            body.pose = saved.pose;
            body.twist = saved.twist;
            body.enabled = saved.enabled;
        }
        Ok(())
    }

    fn remove_state(&mut self, id: StateId) -> Result<(), PhysicsError> {
        self.snapshots
            .remove(&id)
            .map(|_| ())
            .ok_or(PhysicsError::UnknownState(id.0))
    }

    fn num_saved_states(&self) -> usize {
        self.snapshots.len()
    }

    fn create_constraint(&mut self, parent: BodyId, child: BodyId) -> Result<ConstraintId, PhysicsError> {
        let parent_pose = self.body(parent)?.pose;
        let child_pose = self.body(child)?.pose;
        let constraint = Some(Constraint {
            parent,
            child,
            offset: parent_pose.inverse().compose(&child_pose),
        });
        match self.constraints.iter().position(Option::is_none) {
            Some(k) => {
                self.constraints[k] = constraint;
                Ok(ConstraintId(k))
            }
            None => {
                self.constraints.push(constraint);
                Ok(ConstraintId(self.constraints.len() - 1))
            }
        }
    }

    fn remove_constraint(&mut self, id: ConstraintId) -> Result<(), PhysicsError> {
        match self.constraints.get_mut(id.0) {
            Some(slot) if slot.is_some() => {
                *slot = None;
                Ok(())
            }
            _ => Err(PhysicsError::UnknownConstraint(id.0)),
        }
    }
}
