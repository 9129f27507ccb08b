//! Rigid-body math: quaternions, poses, twists and axis-aligned boxes.
//!
//! Quaternion format is [w, x, y, z] throughout.

use serde::{Deserialize, Serialize};
use std::f32::consts::PI;

// ============================================================================
// Vector Helpers
// ============================================================================

#[inline]
pub fn vec_add(a: [f32; 3], b: [f32; 3]) -> [f32; 3] {
    [a[0] + b[0], a[1] + b[1], a[2] + b[2]]
}

#[inline]
pub fn vec_sub(a: [f32; 3], b: [f32; 3]) -> [f32; 3] {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

#[inline]
pub fn vec_scale(a: [f32; 3], s: f32) -> [f32; 3] {
    [a[0] * s, a[1] * s, a[2] * s]
}

#[inline]
pub fn vec_norm(a: [f32; 3]) -> f32 {
    (a[0] * a[0] + a[1] * a[1] + a[2] * a[2]).sqrt()
}

/// Linear interpolation between two points.
#[inline]
pub fn vec_lerp(a: [f32; 3], b: [f32; 3], t: f32) -> [f32; 3] {
    [
        a[0] + (b[0] - a[0]) * t,
        a[1] + (b[1] - a[1]) * t,
        a[2] + (b[2] - a[2]) * t,
    ]
}

/// Wrap an angle into [-PI, PI).
pub fn wrap_angle(theta: f32) -> f32 {
    (theta + PI).rem_euclid(2.0 * PI) - PI
}

// ============================================================================
// Quaternion Operations
// ============================================================================

/// Normalize a quaternion to unit length.
#[inline]
pub fn quat_normalize(q: [f32; 4]) -> [f32; 4] {
    let norm = (q[0] * q[0] + q[1] * q[1] + q[2] * q[2] + q[3] * q[3]).sqrt();
    if norm < 1e-10 {
        return [1.0, 0.0, 0.0, 0.0];
    }
    let inv_norm = 1.0 / norm;
    [q[0] * inv_norm, q[1] * inv_norm, q[2] * inv_norm, q[3] * inv_norm]
}

/// Multiply two quaternions: q_result = q1 * q2.
#[inline]
pub fn quat_mul(q1: [f32; 4], q2: [f32; 4]) -> [f32; 4] {
    let (w1, x1, y1, z1) = (q1[0], q1[1], q1[2], q1[3]);
    let (w2, x2, y2, z2) = (q2[0], q2[1], q2[2], q2[3]);

    [
        w1 * w2 - x1 * x2 - y1 * y2 - z1 * z2,
        w1 * x2 + x1 * w2 + y1 * z2 - z1 * y2,
        w1 * y2 - x1 * z2 + y1 * w2 + z1 * x2,
        w1 * z2 + x1 * y2 - y1 * x2 + z1 * w2,
    ]
}

#[inline]
pub fn quat_conjugate(q: [f32; 4]) -> [f32; 4] {
    [q[0], -q[1], -q[2], -q[3]]
}

/// Convert quaternion to 3x3 rotation matrix.
/// Returns row-major [r00, r01, r02, r10, r11, r12, r20, r21, r22]
#[inline]
pub fn quat_to_rotation_matrix(q: [f32; 4]) -> [f32; 9] {
    let (w, x, y, z) = (q[0], q[1], q[2], q[3]);

    let xx = x * x;
    let yy = y * y;
    let zz = z * z;
    let xy = x * y;
    let xz = x * z;
    let yz = y * z;
    let wx = w * x;
    let wy = w * y;
    let wz = w * z;

    [
        1.0 - 2.0 * (yy + zz),
        2.0 * (xy - wz),
        2.0 * (xz + wy),
        2.0 * (xy + wz),
        1.0 - 2.0 * (xx + zz),
        2.0 * (yz - wx),
        2.0 * (xz - wy),
        2.0 * (yz + wx),
        1.0 - 2.0 * (xx + yy),
    ]
}

/// Rotate a vector by a unit quaternion.
#[inline]
pub fn quat_rotate(q: [f32; 4], v: [f32; 3]) -> [f32; 3] {
    let r = quat_to_rotation_matrix(q);
    [
        r[0] * v[0] + r[1] * v[1] + r[2] * v[2],
        r[3] * v[0] + r[4] * v[1] + r[5] * v[2],
        r[6] * v[0] + r[7] * v[1] + r[8] * v[2],
    ]
}

/// Convert quaternion to Euler angles (roll, pitch, yaw), ZYX convention.
pub fn quat_to_euler(q: [f32; 4]) -> [f32; 3] {
    let (w, x, y, z) = (q[0], q[1], q[2], q[3]);

    let sinr_cosp = 2.0 * (w * x + y * z);
    let cosr_cosp = 1.0 - 2.0 * (x * x + y * y);
    let roll = sinr_cosp.atan2(cosr_cosp);

    let sinp = 2.0 * (w * y - z * x);
    let pitch = if sinp.abs() >= 1.0 {
        (PI / 2.0).copysign(sinp)
    } else {
        sinp.asin()
    };

    let siny_cosp = 2.0 * (w * z + x * y);
    let cosy_cosp = 1.0 - 2.0 * (y * y + z * z);
    let yaw = siny_cosp.atan2(cosy_cosp);

    [roll, pitch, yaw]
}

/// Convert Euler angles (roll, pitch, yaw) to quaternion, ZYX convention.
pub fn euler_to_quat(rpy: [f32; 3]) -> [f32; 4] {
    let (roll, pitch, yaw) = (rpy[0], rpy[1], rpy[2]);

    let cr = (roll * 0.5).cos();
    let sr = (roll * 0.5).sin();
    let cp = (pitch * 0.5).cos();
    let sp = (pitch * 0.5).sin();
    let cy = (yaw * 0.5).cos();
    let sy = (yaw * 0.5).sin();

    [
        cr * cp * cy + sr * sp * sy,
        sr * cp * cy - cr * sp * sy,
        cr * sp * cy + sr * cp * sy,
        cr * cp * sy - sr * sp * cy,
    ]
}

/// Quaternion to axis-angle vector (axis scaled by angle).
pub fn quat_to_axis_angle(q: [f32; 4]) -> [f32; 3] {
    let mut q = quat_normalize(q);
    if q[0] < 0.0 {
        q = [-q[0], -q[1], -q[2], -q[3]];
    }
    let s = (1.0 - q[0] * q[0]).max(0.0).sqrt();
    if s < 1e-6 {
        return [0.0; 3];
    }
    let angle = 2.0 * q[0].min(1.0).acos();
    [q[1] / s * angle, q[2] / s * angle, q[3] / s * angle]
}

/// Axis-angle vector to quaternion.
pub fn axis_angle_to_quat(aa: [f32; 3]) -> [f32; 4] {
    let angle = vec_norm(aa);
    if angle < 1e-8 {
        return [1.0, 0.0, 0.0, 0.0];
    }
    let (s, c) = (angle * 0.5).sin_cos();
    let k = s / angle;
    [c, aa[0] * k, aa[1] * k, aa[2] * k]
}

/// Normalized linear interpolation, taking the short arc.
pub fn quat_nlerp(a: [f32; 4], b: [f32; 4], t: f32) -> [f32; 4] {
    let dot = a[0] * b[0] + a[1] * b[1] + a[2] * b[2] + a[3] * b[3];
    let b = if dot < 0.0 { [-b[0], -b[1], -b[2], -b[3]] } else { b };
    quat_normalize([
        a[0] + (b[0] - a[0]) * t,
        a[1] + (b[1] - a[1]) * t,
        a[2] + (b[2] - a[2]) * t,
        a[3] + (b[3] - a[3]) * t,
    ])
}

// ============================================================================
// Pose / Twist
// ============================================================================

/// Position and orientation of a rigid body in the world frame.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    pub pos: [f32; 3],
    pub quat: [f32; 4],
}

impl Default for Pose {
    fn default() -> Self {
        Self::identity()
    }
}

impl Pose {
    pub const fn identity() -> Self {
        Self {
            pos: [0.0; 3],
            quat: [1.0, 0.0, 0.0, 0.0],
        }
    }

    pub fn new(pos: [f32; 3], quat: [f32; 4]) -> Self {
        Self {
            pos,
            quat: quat_normalize(quat),
        }
    }

    pub fn from_position(pos: [f32; 3]) -> Self {
        Self {
            pos,
            quat: [1.0, 0.0, 0.0, 0.0],
        }
    }

    /// Pose rotated about the world z axis.
    pub fn from_position_yaw(pos: [f32; 3], yaw: f32) -> Self {
        Self {
            pos,
            quat: euler_to_quat([0.0, 0.0, yaw]),
        }
    }

    pub fn yaw(&self) -> f32 {
        quat_to_euler(self.quat)[2]
    }

    /// self * other: `other` expressed in this frame, mapped to the world.
    pub fn compose(&self, other: &Pose) -> Pose {
        Pose {
            pos: vec_add(self.pos, quat_rotate(self.quat, other.pos)),
            quat: quat_normalize(quat_mul(self.quat, other.quat)),
        }
    }

    pub fn inverse(&self) -> Pose {
        let q_inv = quat_conjugate(self.quat);
        Pose {
            pos: vec_scale(quat_rotate(q_inv, self.pos), -1.0),
            quat: q_inv,
        }
    }

    /// Map a point from this frame into the world frame.
    pub fn transform_point(&self, p: [f32; 3]) -> [f32; 3] {
        vec_add(self.pos, quat_rotate(self.quat, p))
    }

    pub fn translated(&self, delta: [f32; 3]) -> Pose {
        Pose {
            pos: vec_add(self.pos, delta),
            quat: self.quat,
        }
    }
}

/// Linear and angular velocity.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Twist {
    pub linear: [f32; 3],
    pub angular: [f32; 3],
}

impl Twist {
    pub const ZERO: Twist = Twist {
        linear: [0.0; 3],
        angular: [0.0; 3],
    };

    /// Norm of the stacked 6-D velocity vector.
    pub fn norm(&self) -> f32 {
        let l = self.linear;
        let a = self.angular;
        (l[0] * l[0] + l[1] * l[1] + l[2] * l[2] + a[0] * a[0] + a[1] * a[1] + a[2] * a[2])
            .sqrt()
    }
}

// ============================================================================
// Axis-Aligned Bounding Box
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Aabb {
    pub min: [f32; 3],
    pub max: [f32; 3],
}

impl Aabb {
    /// Box of half extents `half` around `center`, rotated by `quat`.
    pub fn from_oriented_box(center: [f32; 3], half: [f32; 3], quat: [f32; 4]) -> Self {
        let r = quat_to_rotation_matrix(quat);
        let mut extent = [0.0f32; 3];
        for (i, e) in extent.iter_mut().enumerate() {
            *e = r[3 * i].abs() * half[0] + r[3 * i + 1].abs() * half[1] + r[3 * i + 2].abs() * half[2];
        }
        Self {
            min: vec_sub(center, extent),
            max: vec_add(center, extent),
        }
    }

    pub fn union(&self, other: &Aabb) -> Aabb {
        Aabb {
            min: [
                self.min[0].min(other.min[0]),
                self.min[1].min(other.min[1]),
                self.min[2].min(other.min[2]),
            ],
            max: [
                self.max[0].max(other.max[0]),
                self.max[1].max(other.max[1]),
                self.max[2].max(other.max[2]),
            ],
        }
    }

    pub fn center(&self) -> [f32; 3] {
        vec_scale(vec_add(self.min, self.max), 0.5)
    }

    pub fn half_extents(&self) -> [f32; 3] {
        vec_scale(vec_sub(self.max, self.min), 0.5)
    }

    pub fn expanded(&self, margin: f32) -> Aabb {
        Aabb {
            min: vec_sub(self.min, [margin; 3]),
            max: vec_add(self.max, [margin; 3]),
        }
    }

    /// True if the boxes intersect with positive volume.
    pub fn overlaps(&self, other: &Aabb) -> bool {
        (0..3).all(|i| self.min[i] < other.max[i] && other.min[i] < self.max[i])
    }

    /// True if the boxes are separated by at most `tolerance` on every axis.
    pub fn within(&self, other: &Aabb, tolerance: f32) -> bool {
        (0..3).all(|i| {
            self.min[i] <= other.max[i] + tolerance && other.min[i] <= self.max[i] + tolerance
        })
    }

    /// True if the xy footprints intersect.
    pub fn overlaps_xy(&self, other: &Aabb) -> bool {
        (0..2).all(|i| self.min[i] < other.max[i] && other.min[i] < self.max[i])
    }

    pub fn contains_xy(&self, p: [f32; 3]) -> bool {
        (0..2).all(|i| p[i] >= self.min[i] && p[i] <= self.max[i])
    }

    /// True if `inner`'s footprint lies inside this box's footprint.
    pub fn contains_footprint(&self, inner: &Aabb) -> bool {
        (0..2).all(|i| inner.min[i] >= self.min[i] && inner.max[i] <= self.max[i])
    }

    pub fn contains(&self, p: [f32; 3]) -> bool {
        (0..3).all(|i| p[i] >= self.min[i] && p[i] <= self.max[i])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(a: &[f32], b: &[f32]) {
        for (x, y) in a.iter().zip(b) {
            assert!((x - y).abs() < 1e-5, "{:?} != {:?}", a, b);
        }
    }

    #[test]
    fn test_axis_angle_roundtrip() {
        let q = euler_to_quat([0.1, -0.2, 1.3]);
        let back = axis_angle_to_quat(quat_to_axis_angle(q));
        assert_close(&q, &back);
    }

    #[test]
    fn test_axis_angle_identity_is_zero() {
        assert_eq!(quat_to_axis_angle([1.0, 0.0, 0.0, 0.0]), [0.0; 3]);
        assert_eq!(axis_angle_to_quat([0.0; 3]), [1.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_pose_compose_inverse() {
        let a = Pose::from_position_yaw([0.3, -0.1, 0.2], 0.7);
        let b = Pose::from_position_yaw([0.05, 0.02, -0.01], -0.3);
        let back = a.inverse().compose(&a.compose(&b));
        assert_close(&back.pos, &b.pos);
        assert_close(&back.quat, &b.quat);
    }

    #[test]
    fn test_rotated_aabb_grows() {
        let aabb = Aabb::from_oriented_box([0.0; 3], [0.2, 0.01, 0.01], euler_to_quat([0.0, 0.0, PI / 2.0]));
        assert!((aabb.half_extents()[1] - 0.2).abs() < 1e-5);
        assert!((aabb.half_extents()[0] - 0.01).abs() < 1e-5);
    }

    #[test]
    fn test_wrap_angle() {
        assert!((wrap_angle(3.0 * PI / 2.0) + PI / 2.0).abs() < 1e-5);
        assert!((wrap_angle(0.25) - 0.25).abs() < 1e-6);
    }
}
