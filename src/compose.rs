//! Composition of the tracked pose with user offsets into the render transform.

use nalgebra::{UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

use crate::geometry::EulerAngles;
use crate::tracking::TrackingState;

/// Multiplier applied to the user position offset before adding it to the tracked position.
pub const POSITION_SCALE: f64 = 0.1;

/// Multiplier turning CAD-native units (millimetres) into meters.
pub const SIZE_SCALE: f64 = 0.001;

/// User-authored offset applied on top of the tracked pose.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Position nudge, in units of `position_scale` meters.
    pub position: Vector3<f64>,
    pub rotation: EulerAngles,
    /// Scale in CAD-native units.
    pub scale: Vector3<f64>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            position: Vector3::zeros(),
            rotation: EulerAngles::zero(),
            scale: Vector3::new(1.0, 1.0, 1.0),
        }
    }
}

/// Unit conversion factors for [`compose`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComposeScales {
    pub position_scale: f64,
    pub size_scale: f64,
}

impl Default for ComposeScales {
    fn default() -> Self {
        Self {
            position_scale: POSITION_SCALE,
            size_scale: SIZE_SCALE,
        }
    }
}

/// Final model transform handed to the renderer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub position: Vector3<f64>,
    pub orientation: UnitQuaternion<f64>,
    pub scale: Vector3<f64>,
}

impl Transform {
    pub fn identity() -> Self {
        Self {
            position: Vector3::zeros(),
            orientation: UnitQuaternion::identity(),
            scale: Vector3::new(1.0, 1.0, 1.0),
        }
    }
}

/// Merge the tracked pose with the user offset. Pure and drift-free.
///
/// Untracked: the model rests at the origin with the user rotation and scale.
/// Tracked: the tracked orientation is primary and the user rotation composes
/// on top; the user position nudges the tracked position.
pub fn compose(tracking: &TrackingState, config: &ModelConfig, scales: &ComposeScales) -> Transform {
    let user_rotation = config.rotation.to_quaternion();
    let scale = config.scale * scales.size_scale;

    if !tracking.is_tracking {
        return Transform {
            position: Vector3::zeros(),
            orientation: user_rotation,
            scale,
        };
    }

    Transform {
        position: config.position * scales.position_scale + tracking.position,
        orientation: tracking.orientation * user_rotation,
        scale,
    }
}
