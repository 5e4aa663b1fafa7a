//! Rigid pose (position + orientation).

use nalgebra::{Isometry3, Matrix4, Translation3, UnitQuaternion, Vector3};

/// Rigid pose in a reference frame.
///
/// Orientation is a unit quaternion, position is in meters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose {
    pub position: Vector3<f64>,
    pub orientation: UnitQuaternion<f64>,
}

impl Pose {
    pub fn new(position: Vector3<f64>, orientation: UnitQuaternion<f64>) -> Self {
        Self {
            position,
            orientation,
        }
    }

    pub fn identity() -> Self {
        Self {
            position: Vector3::zeros(),
            orientation: UnitQuaternion::identity(),
        }
    }

    /// Build from a column-major 4x4 rigid transform (as delivered by device APIs).
    ///
    /// Returns `None` if the matrix contains non-finite values.
    pub fn from_column_major(m: &[f64; 16]) -> Option<Self> {
        let mat = Matrix4::from_column_slice(m);
        if mat.iter().any(|v| !v.is_finite()) {
            return None;
        }
        let rotation = mat.fixed_view::<3, 3>(0, 0).into_owned();
        let position = Vector3::new(mat[(0, 3)], mat[(1, 3)], mat[(2, 3)]);
        let orientation =
            UnitQuaternion::from_rotation_matrix(&nalgebra::Rotation3::from_matrix(&rotation));
        Some(Self {
            position,
            orientation,
        })
    }

    /// True when every component is finite.
    pub fn is_finite(&self) -> bool {
        self.position.iter().all(|v| v.is_finite())
            && self.orientation.coords.iter().all(|v| v.is_finite())
    }

    /// Compose: self * other.
    pub fn compose(&self, other: &Pose) -> Pose {
        Pose {
            orientation: self.orientation * other.orientation,
            position: self.orientation * other.position + self.position,
        }
    }

    pub fn inverse(&self) -> Pose {
        let inv = self.orientation.inverse();
        Pose {
            orientation: inv,
            position: -(inv * self.position),
        }
    }

    pub fn to_isometry(&self) -> Isometry3<f64> {
        Isometry3::from_parts(Translation3::from(self.position), self.orientation)
    }

    pub fn to_homogeneous(&self) -> Matrix4<f64> {
        self.to_isometry().to_homogeneous()
    }

    /// Interpolate toward `target` by `t` (lerp on position, slerp on orientation).
    pub fn interpolate(&self, target: &Pose, t: f64) -> Pose {
        let position = self.position.lerp(&target.position, t);
        // slerp is undefined for exactly opposite quaternions; fall back to nlerp there
        let orientation = self
            .orientation
            .try_slerp(&target.orientation, t, 1e-9)
            .unwrap_or_else(|| self.orientation.nlerp(&target.orientation, t));
        Pose {
            position,
            orientation,
        }
    }
}

impl Default for Pose {
    fn default() -> Self {
        Self::identity()
    }
}
