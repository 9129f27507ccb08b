//! Pinhole camera views with look-at view and perspective projection matrices.

use std::f32::consts::PI;

use crate::constants::{CAMERA_FAR, CAMERA_FOV_DEG, CAMERA_NEAR};

/// A named camera looking at the table.
#[derive(Clone, Debug)]
pub struct CameraView {
    name: String,
    eye: [f32; 3],
    /// World -> camera space.
    view_matrix: [[f32; 4]; 4],
    /// Camera -> clip space.
    proj_matrix: [[f32; 4]; 4],
}

impl CameraView {
    pub fn new(
        name: impl Into<String>,
        eye: [f32; 3],
        target: [f32; 3],
        up: [f32; 3],
        fov_deg: f32,
        aspect: f32,
    ) -> Self {
        Self {
            name: name.into(),
            eye,
            view_matrix: compute_view_matrix(eye, target, up),
            proj_matrix: compute_projection_matrix(fov_deg, aspect, CAMERA_NEAR, CAMERA_FAR),
        }
    }

    /// Oblique view from in front of the robot.
    pub fn front(aspect: f32) -> Self {
        Self::new("front", [2.0, 0.0, 1.0], [0.0, 0.0, 0.1], [0.0, 0.0, 1.0], CAMERA_FOV_DEG, aspect)
    }

    /// Bird's-eye view over the workspace.
    pub fn top(aspect: f32) -> Self {
        Self::new("top", [0.3, 0.0, 1.4], [0.3, 0.0, 0.0], [0.0, 1.0, 0.0], CAMERA_FOV_DEG, aspect)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn view_matrix(&self) -> &[[f32; 4]; 4] {
        &self.view_matrix
    }

    pub fn projection_matrix(&self) -> &[[f32; 4]; 4] {
        &self.proj_matrix
    }

    /// Project a world point onto a `width` x `height` image.
    ///
    /// Returns `(x, y, depth)` or `None` if the point is behind the camera.
    pub fn project(&self, point: [f32; 3], width: u32, height: u32) -> Option<(f32, f32, f32)> {
        let cam = mat4_mul_vec4(&self.view_matrix, &[point[0], point[1], point[2], 1.0]);
        if cam[2] >= 0.0 {
            return None;
        }
        let clip = mat4_mul_vec4(&self.proj_matrix, &cam);
        if clip[3].abs() < 1e-10 {
            return None;
        }
        let ndc_x = clip[0] / clip[3];
        let ndc_y = clip[1] / clip[3];
        let x = (ndc_x + 1.0) * 0.5 * width as f32;
        let y = (1.0 - ndc_y) * 0.5 * height as f32;
        Some((x, y, -cam[2]))
    }

    /// Distance from the eye, for painter's-algorithm ordering.
    pub fn distance_to(&self, point: [f32; 3]) -> f32 {
        let d = [point[0] - self.eye[0], point[1] - self.eye[1], point[2] - self.eye[2]];
        (d[0] * d[0] + d[1] * d[1] + d[2] * d[2]).sqrt()
    }
}

fn compute_view_matrix(eye: [f32; 3], target: [f32; 3], up: [f32; 3]) -> [[f32; 4]; 4] {
    let f = normalize([target[0] - eye[0], target[1] - eye[1], target[2] - eye[2]]);
    let r = normalize(cross(&f, &up));
    let u = cross(&r, &f);

    [
        [r[0], u[0], -f[0], 0.0],
        [r[1], u[1], -f[1], 0.0],
        [r[2], u[2], -f[2], 0.0],
        [-dot(&r, &eye), -dot(&u, &eye), dot(&f, &eye), 1.0],
    ]
}

fn compute_projection_matrix(fov_deg: f32, aspect: f32, near: f32, far: f32) -> [[f32; 4]; 4] {
    let f = 1.0 / (fov_deg * PI / 180.0 / 2.0).tan();

    [
        [f / aspect, 0.0, 0.0, 0.0],
        [0.0, f, 0.0, 0.0],
        [0.0, 0.0, (far + near) / (near - far), -1.0],
        [0.0, 0.0, (2.0 * far * near) / (near - far), 0.0],
    ]
}

/// Column-major matrix times vector.
fn mat4_mul_vec4(m: &[[f32; 4]; 4], v: &[f32; 4]) -> [f32; 4] {
    [
        m[0][0] * v[0] + m[1][0] * v[1] + m[2][0] * v[2] + m[3][0] * v[3],
        m[0][1] * v[0] + m[1][1] * v[1] + m[2][1] * v[2] + m[3][1] * v[3],
        m[0][2] * v[0] + m[1][2] * v[1] + m[2][2] * v[2] + m[3][2] * v[3],
        m[0][3] * v[0] + m[1][3] * v[1] + m[2][3] * v[2] + m[3][3] * v[3],
    ]
}

fn normalize(v: [f32; 3]) -> [f32; 3] {
    let len = (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt();
    if len < 1e-10 {
        return [0.0, 0.0, 1.0];
    }
    [v[0] / len, v[1] / len, v[2] / len]
}

fn cross(a: &[f32; 3], b: &[f32; 3]) -> [f32; 3] {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

fn dot(a: &[f32; 3], b: &[f32; 3]) -> f32 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}
