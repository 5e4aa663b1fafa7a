//! Euler angles as authored in the UI, converted to quaternions.

use nalgebra::{UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

/// Axis order for intrinsic Euler rotations.
///
/// `Xyz` means the rotation matrix is `Rx * Ry * Rz`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EulerOrder {
    #[default]
    Xyz,
    Xzy,
    Yxz,
    Yzx,
    Zxy,
    Zyx,
}

/// Euler angles in radians.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct EulerAngles {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    #[serde(default)]
    pub order: EulerOrder,
}

impl EulerAngles {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self {
            x,
            y,
            z,
            order: EulerOrder::Xyz,
        }
    }

    pub fn zero() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }

    pub fn with_order(mut self, order: EulerOrder) -> Self {
        self.order = order;
        self
    }

    pub fn from_degrees(x: f64, y: f64, z: f64) -> Self {
        Self::new(x.to_radians(), y.to_radians(), z.to_radians())
    }

    pub fn to_quaternion(&self) -> UnitQuaternion<f64> {
        let qx = UnitQuaternion::from_axis_angle(&Vector3::x_axis(), self.x);
        let qy = UnitQuaternion::from_axis_angle(&Vector3::y_axis(), self.y);
        let qz = UnitQuaternion::from_axis_angle(&Vector3::z_axis(), self.z);

        match self.order {
            EulerOrder::Xyz => qx * qy * qz,
            EulerOrder::Xzy => qx * qz * qy,
            EulerOrder::Yxz => qy * qx * qz,
            EulerOrder::Yzx => qy * qz * qx,
            EulerOrder::Zxy => qz * qx * qy,
            EulerOrder::Zyx => qz * qy * qx,
        }
    }
}
