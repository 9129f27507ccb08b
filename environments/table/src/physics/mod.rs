//! Rigid-body physics engine interface.
//!
//! Everything above this module talks to the engine through [`PhysicsEngine`]:
//! body poses and twists, snapshots, fixed constraints and contact queries.
//! [`World`] is the built-in headless implementation.

pub mod world;

pub use world::World;

use crate::constants::CONTACT_TOLERANCE;
use crate::error::PhysicsError;
use crate::math::{Aabb, Pose, Twist};

// ============================================================================
// Handles
// ============================================================================

/// Engine-assigned body handle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BodyId(pub usize);

/// Engine-assigned snapshot handle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StateId(pub u64);

/// Engine-assigned constraint handle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ConstraintId(pub usize);

// ============================================================================
// Bodies
// ============================================================================

/// How the engine advances a body.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BodyKind {
    /// Never moved by the simulation (table, racks, robot base).
    Static,
    /// Integrated under gravity and supported by surfaces below it.
    Dynamic,
    /// Driven only by explicit pose commands.
    Kinematic,
}

/// One box of a compound collision shape, in the body frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoxPart {
    pub offset: [f32; 3],
    pub half_extents: [f32; 3],
}

/// Compound collision shape made of boxes.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Shape {
    pub parts: Vec<BoxPart>,
}

impl Shape {
    /// Single box of full dimensions `size`, centered on the body origin.
    pub fn cuboid(size: [f32; 3]) -> Self {
        Self {
            parts: vec![BoxPart {
                offset: [0.0; 3],
                half_extents: [size[0] * 0.5, size[1] * 0.5, size[2] * 0.5],
            }],
        }
    }

    pub fn with_part(mut self, offset: [f32; 3], half_extents: [f32; 3]) -> Self {
        self.parts.push(BoxPart {
            offset,
            half_extents,
        });
        self
    }

    /// World-frame boxes of every part at `pose`.
    pub fn part_aabbs(&self, pose: &Pose) -> Vec<Aabb> {
        self.parts
            .iter()
            .map(|part| {
                Aabb::from_oriented_box(pose.transform_point(part.offset), part.half_extents, pose.quat)
            })
            .collect()
    }

    /// World-frame box enclosing the whole shape at `pose`.
    pub fn aabb(&self, pose: &Pose) -> Aabb {
        let parts = self.part_aabbs(pose);
        match parts.split_first() {
            Some((first, rest)) => rest.iter().fold(*first, |acc, p| acc.union(p)),
            None => Aabb {
                min: pose.pos,
                max: pose.pos,
            },
        }
    }
}

/// Everything the engine needs to create a body.
#[derive(Clone, Debug)]
pub struct BodyDesc {
    pub name: String,
    pub shape: Shape,
    pub kind: BodyKind,
    pub collides: bool,
    pub enabled: bool,
    pub pose: Pose,
    pub color: [u8; 3],
}

impl BodyDesc {
    pub fn new(name: impl Into<String>, shape: Shape, kind: BodyKind) -> Self {
        Self {
            name: name.into(),
            shape,
            kind,
            collides: true,
            enabled: true,
            pose: Pose::identity(),
            color: [160, 160, 160],
        }
    }

    pub fn with_pose(mut self, pose: Pose) -> Self {
        self.pose = pose;
        self
    }

    pub fn with_color(mut self, color: [u8; 3]) -> Self {
        self.color = color;
        self
    }

    pub fn with_collision(mut self, collides: bool) -> Self {
        self.collides = collides;
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

/// A simulated body.
#[derive(Clone, Debug)]
pub struct Body {
    pub name: String,
    pub shape: Shape,
    pub kind: BodyKind,
    pub collides: bool,
    /// Disabled bodies are parked: not simulated, not collidable, not rendered.
    pub enabled: bool,
    pub pose: Pose,
    pub twist: Twist,
    pub color: [u8; 3],
}

impl Body {
    pub fn aabb(&self) -> Aabb {
        self.shape.aabb(&self.pose)
    }

    pub fn part_aabbs(&self) -> Vec<Aabb> {
        self.shape.part_aabbs(&self.pose)
    }

    /// Enabled and collidable.
    pub fn is_solid(&self) -> bool {
        self.enabled && self.collides
    }
}

impl From<BodyDesc> for Body {
    fn from(desc: BodyDesc) -> Self {
        Self {
            name: desc.name,
            shape: desc.shape,
            kind: desc.kind,
            collides: desc.collides,
            enabled: desc.enabled,
            pose: desc.pose,
            twist: Twist::ZERO,
            color: desc.color,
        }
    }
}

// ============================================================================
// Engine Interface
// ============================================================================

/// Rigid-body engine consumed by the environment.
///
/// Snapshots cover body poses, twists and enabled flags. User constraints are
/// not part of a snapshot; callers that hold constraints must re-create them
/// after `restore_state`.
pub trait PhysicsEngine {
    /// Simulation timestep (s).
    fn timestep(&self) -> f32;

    /// Advance the simulation by one timestep.
    fn step_simulation(&mut self);

    fn add_body(&mut self, desc: BodyDesc) -> BodyId;

    fn body(&self, id: BodyId) -> Result<&Body, PhysicsError>;

    fn body_ids(&self) -> Vec<BodyId>;

    /// Teleport a body. Its twist is left unchanged.
    fn set_pose(&mut self, id: BodyId, pose: Pose) -> Result<(), PhysicsError>;

    fn set_twist(&mut self, id: BodyId, twist: Twist) -> Result<(), PhysicsError>;

    fn set_enabled(&mut self, id: BodyId, enabled: bool) -> Result<(), PhysicsError>;

    /// Save the current state and return its handle.
    fn save_state(&mut self) -> StateId;

    fn restore_state(&mut self, id: StateId) -> Result<(), PhysicsError>;

    /// Release an engine-side snapshot.
    fn remove_state(&mut self, id: StateId) -> Result<(), PhysicsError>;

    fn num_saved_states(&self) -> usize;

    /// Rigidly attach `child` to `parent` at their current relative pose.
    /// Ids of removed constraints may be handed out again.
    fn create_constraint(&mut self, parent: BodyId, child: BodyId) -> Result<ConstraintId, PhysicsError>;

    fn remove_constraint(&mut self, id: ConstraintId) -> Result<(), PhysicsError>;

    fn pose(&self, id: BodyId) -> Result<Pose, PhysicsError> {
        Ok(self.body(id)?.pose)
    }

    fn twist(&self, id: BodyId) -> Result<Twist, PhysicsError> {
        Ok(self.body(id)?.twist)
    }

    fn is_enabled(&self, id: BodyId) -> Result<bool, PhysicsError> {
        Ok(self.body(id)?.enabled)
    }

    fn aabb(&self, id: BodyId) -> Result<Aabb, PhysicsError> {
        Ok(self.body(id)?.aabb())
    }

    fn part_aabbs(&self, id: BodyId) -> Result<Vec<Aabb>, PhysicsError> {
        Ok(self.body(id)?.part_aabbs())
    }

    /// Contact query: both bodies solid and some pair of parts within
    /// `CONTACT_TOLERANCE` of each other.
    fn is_touching(&self, a: BodyId, b: BodyId) -> Result<bool, PhysicsError> {
        let (body_a, body_b) = (self.body(a)?, self.body(b)?);
        if a == b || !body_a.is_solid() || !body_b.is_solid() {
            return Ok(false);
        }
        let parts_b = body_b.part_aabbs();
        Ok(body_a
            .part_aabbs()
            .iter()
            .any(|pa| parts_b.iter().any(|pb| pa.within(pb, CONTACT_TOLERANCE))))
    }
}
