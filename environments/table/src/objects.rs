//! Object registry: named bodies, variant groups and null objects.
//!
//! Objects are created once from config. Variant objects are placeholders
//! that claim one member of an [`ObjectGroup`] at every reset; when the group
//! has no members left they resolve to a null object, which has no body,
//! observes as all zeros and fails every predicate.

use std::collections::{BTreeMap, HashMap};

use crate::config::{GeometryConfig, ObjectConfig, ObjectGroupConfig};
use crate::constants::{TABLE_CENTER_X, TABLE_HEIGHT};
use crate::error::{ConfigError, PhysicsError};
use crate::math::{Aabb, Pose, Twist};
use crate::object_state::ObjectState;
use crate::physics::{BodyDesc, BodyId, BodyKind, PhysicsEngine, Shape};

// ============================================================================
// Geometry
// ============================================================================

/// Resolved shape parameters of a physical object.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Geometry {
    Table { size: [f32; 3] },
    Box { size: [f32; 3] },
    Hook {
        head_length: f32,
        handle_length: f32,
        handle_y: f32,
        radius: f32,
    },
    Rack { size: [f32; 3] },
    Null,
}

impl Geometry {
    /// Geometry of a concrete config entry. Variants have none of their own.
    fn from_config(config: &GeometryConfig) -> Option<Self> {
        Some(match *config {
            GeometryConfig::Table { size } => Geometry::Table { size },
            GeometryConfig::Box { size } => Geometry::Box { size },
            GeometryConfig::Hook {
                head_length,
                handle_length,
                handle_y,
                radius,
            } => Geometry::Hook {
                head_length,
                handle_length,
                handle_y,
                radius,
            },
            GeometryConfig::Rack { size } => Geometry::Rack { size },
            GeometryConfig::Null => Geometry::Null,
            GeometryConfig::Variant { .. } => return None,
        })
    }

    pub fn shape(&self) -> Shape {
        match *self {
            Geometry::Table { size } | Geometry::Box { size } | Geometry::Rack { size } => {
                Shape::cuboid(size)
            }
            Geometry::Hook {
                head_length,
                handle_length,
                handle_y,
                radius,
            } => {
                let side = handle_y.signum();
                Shape::default()
                    .with_part([0.0; 3], [handle_length * 0.5, radius, radius])
                    .with_part(
                        [handle_length * 0.5 + radius, side * (head_length * 0.5 - radius), 0.0],
                        [radius, head_length * 0.5, radius],
                    )
            }
            Geometry::Null => Shape::default(),
        }
    }

    fn default_static(&self) -> bool {
        matches!(self, Geometry::Table { .. } | Geometry::Rack { .. })
    }

    fn default_color(&self) -> [u8; 3] {
        match self {
            Geometry::Table { .. } => [175, 140, 100],
            Geometry::Box { .. } => [200, 60, 60],
            Geometry::Hook { .. } => [60, 80, 200],
            Geometry::Rack { .. } => [120, 90, 60],
            Geometry::Null => [0, 0, 0],
        }
    }

    /// Shape features of the state vector:
    /// [size_x, size_y, size_z, head_length, handle_length, handle_y].
    pub fn features(&self) -> [f32; 6] {
        match *self {
            Geometry::Table { size } | Geometry::Box { size } | Geometry::Rack { size } => {
                [size[0], size[1], size[2], 0.0, 0.0, 0.0]
            }
            Geometry::Hook {
                head_length,
                handle_length,
                handle_y,
                ..
            } => [0.0, 0.0, 0.0, head_length, handle_length, handle_y.signum()],
            Geometry::Null => [0.0; 6],
        }
    }

    /// Pose resting on the default table at slot `idx`.
    fn default_pose(&self, idx: usize) -> Pose {
        match *self {
            Geometry::Table { size } => {
                Pose::from_position([TABLE_CENTER_X, 0.0, TABLE_HEIGHT - size[2] * 0.5])
            }
            _ => {
                let bottom = self.shape().aabb(&Pose::identity()).min[2];
                let y = -0.45 + 0.3 * (idx % 4) as f32;
                Pose::from_position([0.9, y, TABLE_HEIGHT - bottom])
            }
        }
    }
}

fn add_body<P: PhysicsEngine>(
    physics: &mut P,
    config: &ObjectConfig,
    geometry: &Geometry,
    idx: usize,
    enabled: bool,
) -> Option<BodyId> {
    if *geometry == Geometry::Null {
        return None;
    }
    let is_static = config.is_static.unwrap_or_else(|| geometry.default_static());
    let kind = if is_static {
        BodyKind::Static
    } else {
        BodyKind::Dynamic
    };
    let pose = config
        .pose
        .map(|p| p.to_pose())
        .unwrap_or_else(|| geometry.default_pose(idx));
    let desc = BodyDesc::new(config.name.clone(), geometry.shape(), kind)
        .with_pose(pose)
        .with_color(config.color.unwrap_or_else(|| geometry.default_color()))
        .with_enabled(enabled);
    Some(physics.add_body(desc))
}

// ============================================================================
// Object Groups
// ============================================================================

/// One interchangeable member of an object group.
#[derive(Clone, Debug)]
pub struct Variant {
    pub name: String,
    pub geometry: Geometry,
    pub body: Option<BodyId>,
    pub is_static: bool,
    pub pos_limits: Option<[[f32; 2]; 2]>,
}

/// A named set of variants. Members are dealt out in a random order that is
/// reshuffled at every reset; inactive members are parked (disabled).
#[derive(Clone, Debug)]
pub struct ObjectGroup {
    name: String,
    variants: Vec<Variant>,
    order: Vec<usize>,
    cursor: usize,
}

impl ObjectGroup {
    pub fn build<P: PhysicsEngine>(config: &ObjectGroupConfig, physics: &mut P) -> Result<Self, ConfigError> {
        let mut variants = Vec::with_capacity(config.objects.len());
        for (idx, object) in config.objects.iter().enumerate() {
            let geometry = Geometry::from_config(&object.geometry).ok_or_else(|| {
                ConfigError::InvalidParameter {
                    param: format!("object_groups.{}.{}", config.name, object.name),
                    message: "variants cannot be nested".to_string(),
                }
            })?;
            variants.push(Variant {
                name: object.name.clone(),
                geometry,
                body: add_body(physics, object, &geometry, idx, false),
                is_static: object.is_static.unwrap_or_else(|| geometry.default_static()),
                pos_limits: object.pos_limits,
            });
        }
        Ok(Self {
            name: config.name.clone(),
            order: (0..variants.len()).collect(),
            variants,
            cursor: 0,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn variants(&self) -> &[Variant] {
        &self.variants
    }

    /// Reshuffle and park every member.
    pub fn reset<P: PhysicsEngine>(&mut self, physics: &mut P, rng: &mut fastrand::Rng) -> Result<(), PhysicsError> {
        rng.shuffle(&mut self.order);
        self.cursor = 0;
        for body in self.variants.iter().filter_map(|v| v.body) {
            physics.set_enabled(body, false)?;
        }
        Ok(())
    }

    /// Next unclaimed member, or `None` once the group is exhausted.
    pub fn claim(&mut self) -> Option<&Variant> {
        let idx = *self.order.get(self.cursor)?;
        self.cursor += 1;
        self.variants.get(idx)
    }
}

// ============================================================================
// Objects
// ============================================================================

/// A named scene object.
#[derive(Clone, Debug)]
pub struct Object {
    name: String,
    idx_object: usize,
    geometry: Geometry,
    body: Option<BodyId>,
    is_static: bool,
    group: Option<String>,
    pos_limits: Option<[[f32; 2]; 2]>,
}

impl Object {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Position in the registry.
    pub fn idx(&self) -> usize {
        self.idx_object
    }

    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    pub fn body(&self) -> Option<BodyId> {
        self.body
    }

    pub fn is_static(&self) -> bool {
        self.is_static
    }

    pub fn is_null(&self) -> bool {
        self.body.is_none()
    }

    pub fn is_table(&self) -> bool {
        matches!(self.geometry, Geometry::Table { .. })
    }

    /// Group this object draws its variant from.
    pub fn group(&self) -> Option<&str> {
        self.group.as_deref()
    }

    pub fn pos_limits(&self) -> Option<[[f32; 2]; 2]> {
        self.pos_limits
    }

    pub fn pose<P: PhysicsEngine>(&self, physics: &P) -> Option<Pose> {
        self.body.and_then(|b| physics.pose(b).ok())
    }

    pub fn twist<P: PhysicsEngine>(&self, physics: &P) -> Option<Twist> {
        self.body.and_then(|b| physics.twist(b).ok())
    }

    pub fn aabb<P: PhysicsEngine>(&self, physics: &P) -> Option<Aabb> {
        self.body.and_then(|b| physics.aabb(b).ok())
    }

    /// Teleport the object and zero its velocity. No-op for null objects.
    pub fn set_pose<P: PhysicsEngine>(&self, physics: &mut P, pose: Pose) -> Result<(), PhysicsError> {
        if let Some(body) = self.body {
            physics.set_pose(body, pose)?;
            physics.set_twist(body, Twist::ZERO)?;
        }
        Ok(())
    }

    pub fn state<P: PhysicsEngine>(&self, physics: &P) -> ObjectState {
        match self.pose(physics) {
            Some(pose) => ObjectState::new(&pose, self.geometry.features()),
            None => ObjectState::default(),
        }
    }

    pub fn set_state<P: PhysicsEngine>(&self, physics: &mut P, state: &ObjectState) -> Result<(), PhysicsError> {
        self.set_pose(physics, state.pose())
    }

    /// Variant objects claim their next group member; others are unchanged.
    pub fn reset<P: PhysicsEngine>(
        &mut self,
        physics: &mut P,
        groups: &mut BTreeMap<String, ObjectGroup>,
    ) -> Result<(), PhysicsError> {
        let Some(group_name) = self.group.as_ref() else {
            return Ok(());
        };
        let Some(group) = groups.get_mut(group_name) else {
            return Ok(());
        };
        match group.claim().cloned() {
            Some(variant) => {
                self.geometry = variant.geometry;
                self.body = variant.body;
                self.is_static = variant.is_static;
                self.pos_limits = variant.pos_limits;
            }
            None => {
                self.geometry = Geometry::Null;
                self.body = None;
                self.is_static = false;
                self.pos_limits = None;
            }
        }
        if let Some(body) = self.body {
            physics.set_enabled(body, true)?;
            physics.set_twist(body, Twist::ZERO)?;
        }
        Ok(())
    }
}

// ============================================================================
// Registry
// ============================================================================

/// Ordered, name-indexed object collection. Order defines observation rows.
#[derive(Clone, Debug, Default)]
pub struct ObjectRegistry {
    objects: Vec<Object>,
    index: HashMap<String, usize>,
}

impl ObjectRegistry {
    /// Create bodies for every config entry. Requires an object named `table`.
    pub fn build<P: PhysicsEngine>(
        configs: &[ObjectConfig],
        groups: &BTreeMap<String, ObjectGroup>,
        physics: &mut P,
    ) -> Result<Self, ConfigError> {
        let mut registry = Self::default();
        for (idx, config) in configs.iter().enumerate() {
            if registry.index.contains_key(&config.name) {
                return Err(ConfigError::DuplicateObject(config.name.clone()));
            }
            let object = match &config.geometry {
                GeometryConfig::Variant { group } => {
                    if !groups.contains_key(group) {
                        return Err(ConfigError::UnknownGroup(group.clone()));
                    }
                    Object {
                        name: config.name.clone(),
                        idx_object: idx,
                        geometry: Geometry::Null,
                        body: None,
                        is_static: false,
                        group: Some(group.clone()),
                        pos_limits: None,
                    }
                }
                concrete => {
                    let geometry = Geometry::from_config(concrete).unwrap_or(Geometry::Null);
                    Object {
                        name: config.name.clone(),
                        idx_object: idx,
                        body: add_body(physics, config, &geometry, idx, true),
                        is_static: config.is_static.unwrap_or_else(|| geometry.default_static()),
                        geometry,
                        group: None,
                        pos_limits: config.pos_limits,
                    }
                }
            };
            registry.index.insert(object.name.clone(), idx);
            registry.objects.push(object);
        }
        if !registry.get("table").is_some_and(|t| t.is_table()) {
            return Err(ConfigError::MissingTable);
        }
        Ok(registry)
    }

    pub fn get(&self, name: &str) -> Option<&Object> {
        self.index.get(name).map(|&i| &self.objects[i])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Registry position of `name`.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Object> {
        self.objects.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Object> {
        self.objects.iter_mut()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.objects.iter().map(|o| o.name())
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn table(&self) -> Option<&Object> {
        self.get("table")
    }
}
