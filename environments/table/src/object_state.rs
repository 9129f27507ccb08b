//! Fixed-width object state vector.
//!
//! Layout (`OBJECT_STATE_DIM` = 12):
//!
//! | Index | Feature |
//! |-------|---------|
//! | 0..3  | position [x, y, z] |
//! | 3..6  | orientation as axis-angle [wx, wy, wz] |
//! | 6..9  | box size [x, y, z] |
//! | 9     | hook head length |
//! | 10    | hook handle length |
//! | 11    | hook handle side (±1) |

use std::f32::consts::PI;
use std::ops::Range;

use crate::constants::OBJECT_STATE_DIM;
use crate::math::{axis_angle_to_quat, quat_to_axis_angle, Pose};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ObjectState(pub [f32; OBJECT_STATE_DIM]);

impl Default for ObjectState {
    fn default() -> Self {
        Self([0.0; OBJECT_STATE_DIM])
    }
}

impl ObjectState {
    pub const POS: Range<usize> = 0..3;
    pub const AXIS_ANGLE: Range<usize> = 3..6;
    pub const BOX_SIZE: Range<usize> = 6..9;
    pub const HEAD_LENGTH: usize = 9;
    pub const HANDLE_LENGTH: usize = 10;
    pub const HANDLE_Y: usize = 11;

    /// State of a body at `pose` with static shape `features`
    /// ([size_x, size_y, size_z, head_length, handle_length, handle_y]).
    pub fn new(pose: &Pose, features: [f32; 6]) -> Self {
        let mut state = Self::default();
        state.set_pose(pose);
        state.0[Self::BOX_SIZE.start..].copy_from_slice(&features);
        state
    }

    pub fn from_row(row: &[f32; OBJECT_STATE_DIM]) -> Self {
        Self(*row)
    }

    pub fn pos(&self) -> [f32; 3] {
        [self.0[0], self.0[1], self.0[2]]
    }

    pub fn pose(&self) -> Pose {
        let aa = [self.0[3], self.0[4], self.0[5]];
        Pose::new(self.pos(), axis_angle_to_quat(aa))
    }

    pub fn set_pose(&mut self, pose: &Pose) {
        self.0[Self::POS].copy_from_slice(&pose.pos);
        self.0[Self::AXIS_ANGLE].copy_from_slice(&quat_to_axis_angle(pose.quat));
    }

    pub fn as_array(&self) -> &[f32; OBJECT_STATE_DIM] {
        &self.0
    }

    /// Documented bounds of every feature: (low, high).
    pub fn range() -> ([f32; OBJECT_STATE_DIM], [f32; OBJECT_STATE_DIM]) {
        (
            [-0.3, -0.7, -0.8, -PI, -PI, -PI, 0.0, 0.0, 0.0, 0.0, 0.0, -1.0],
            [1.2, 0.7, 0.8, PI, PI, PI, 2.0, 2.0, 2.0, 0.3, 0.5, 1.0],
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_layout() {
        let pose = Pose::from_position_yaw([0.5, -0.1, 0.02], 0.4);
        let state = ObjectState::new(&pose, [0.05, 0.05, 0.05, 0.0, 0.0, 0.0]);
        assert_eq!(state.pos(), [0.5, -0.1, 0.02]);
        assert!((state.0[5] - 0.4).abs() < 1e-5);
        assert_eq!(&state.0[ObjectState::BOX_SIZE], &[0.05, 0.05, 0.05]);
        assert!((state.pose().yaw() - 0.4).abs() < 1e-5);
    }

    #[test]
    fn test_range_ordered() {
        let (low, high) = ObjectState::range();
        assert!(low.iter().zip(&high).all(|(l, h)| l < h));
    }
}
