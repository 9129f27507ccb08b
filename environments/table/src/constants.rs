//! Physical and geometric constants of the table-top scene.
//!
//! The world frame has its origin at the robot base footprint, z up, with the
//! table top at `TABLE_HEIGHT`. All lengths are meters, all angles radians.

use std::f32::consts::PI;

// ============================================================================
// Observation Layout
// ============================================================================

/// Rows in the observation matrix (end-effector + objects).
pub const MAX_NUM_OBJECTS: usize = 5;

/// Row of the observation matrix reserved for the end-effector.
pub const EE_OBSERVATION_IDX: usize = 0;

/// Width of one object state vector.
pub const OBJECT_STATE_DIM: usize = 12;

/// Dimension of every primitive's action vector.
pub const ACTION_DIM: usize = 4;

// ============================================================================
// Simulation
// ============================================================================

/// Physics timestep (s)
pub const PHYSICS_TIMESTEP: f32 = 1.0 / 240.0;

/// Gravitational acceleration (m/s^2)
pub const G: f32 = 9.8;

/// Default settle budget: three seconds of simulated time.
pub const DEFAULT_MAX_STABLE_ITERS: usize = (3.0 / PHYSICS_TIMESTEP) as usize;

/// Twist magnitude above which a body counts as moving.
pub const MOVING_THRESHOLD: f32 = 1e-3;

/// Maximum AABB gap still reported as contact.
pub const CONTACT_TOLERANCE: f32 = 1e-3;

/// A body resting within this distance above a surface is supported by it.
pub const SUPPORT_TOLERANCE: f32 = 5e-3;

/// Height of the catch-all floor below the table.
pub const FLOOR_HEIGHT: f32 = -0.7;

// ============================================================================
// Table
// ============================================================================

/// Height of the table surface.
pub const TABLE_HEIGHT: f32 = 0.0;

/// Default table footprint center (x).
pub const TABLE_CENTER_X: f32 = 0.45;

/// Default table dimensions [x, y, z].
pub const TABLE_SIZE: [f32; 3] = [1.3, 1.2, 0.05];

// ============================================================================
// Workspace
// ============================================================================

/// Inner radius of the reachable workspace around the base.
pub const WORKSPACE_MIN_RADIUS: f32 = 0.4;

/// Outer radius of the reachable workspace around the base.
pub const WORKSPACE_MAX_RADIUS: f32 = 0.7;

/// Half-angle of the workspace wedge in front of the robot.
pub const WORKSPACE_MAX_ANGLE: f32 = PI / 3.0;

/// Outer radius used when sampling poses beyond the workspace.
pub const BEYOND_WORKSPACE_MAX_RADIUS: f32 = 0.95;

/// Half-angle of the wedge used when sampling beyond the workspace.
pub const BEYOND_WORKSPACE_MAX_ANGLE: f32 = PI / 6.0;

// ============================================================================
// Predicates
// ============================================================================

/// Vertical tolerance between an object's bottom and its support's top.
pub const ON_HEIGHT_TOLERANCE: f32 = 0.01;

/// Clearance the sampler keeps between a placed object and its neighbours.
pub const SAMPLE_CLEARANCE: f32 = 0.03;

/// Clearance required for `free(a)`.
pub const FREE_CLEARANCE: f32 = 0.02;

/// Extra half-width of the base-to-object corridor checked by `nonblocking`.
pub const NONBLOCKING_MARGIN: f32 = 0.05;

/// Height above a support at which sampled objects are released.
pub const DROP_HEIGHT: f32 = 1e-3;

// ============================================================================
// Robot
// ============================================================================

/// Height of the approach pose above a grasp or placement.
pub const APPROACH_HEIGHT: f32 = 0.1;

/// Lift after a successful grasp.
pub const LIFT_HEIGHT: f32 = 0.2;

/// Clearance of a hook above the table while sweeping.
pub const HOOK_SWEEP_CLEARANCE: f32 = 5e-3;

/// Minimum radial displacement for pull/push to count as successful.
pub const MIN_SWEEP_DISPLACEMENT: f32 = 0.03;

// ============================================================================
// Camera
// ============================================================================

/// Default render width (px)
pub const RENDER_WIDTH: u32 = 405;

/// Default render height (px)
pub const RENDER_HEIGHT: u32 = 270;

/// High-resolution render width (px)
pub const RENDER_WIDTH_HIGH_RES: u32 = 1620;

/// High-resolution render height (px)
pub const RENDER_HEIGHT_HIGH_RES: u32 = 1080;

/// Vertical field of view (degrees)
pub const CAMERA_FOV_DEG: f32 = 37.8;

/// Near clipping plane
pub const CAMERA_NEAR: f32 = 0.02;

/// Far clipping plane
pub const CAMERA_FAR: f32 = 100.0;
