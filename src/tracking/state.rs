//! Latest tracked pose as seen by the rest of the system.

use nalgebra::{UnitQuaternion, Vector3};

use crate::geometry::Pose;

/// Tracked pose of the anchor image or marker.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackingState {
    pub position: Vector3<f64>,
    pub orientation: UnitQuaternion<f64>,
    /// True only while a pose source is live and its most recent tick yielded a pose.
    pub is_tracking: bool,
}

impl TrackingState {
    /// Untracked, identity pose.
    pub fn untracked() -> Self {
        Self {
            position: Vector3::zeros(),
            orientation: UnitQuaternion::identity(),
            is_tracking: false,
        }
    }

    pub fn tracked(pose: &Pose) -> Self {
        Self {
            position: pose.position,
            orientation: pose.orientation,
            is_tracking: true,
        }
    }

    pub fn pose(&self) -> Pose {
        Pose::new(self.position, self.orientation)
    }

    /// Merge the fields present in `update`.
    pub fn apply(&mut self, update: &TrackingUpdate) {
        if let Some(position) = update.position {
            self.position = position;
        }
        if let Some(orientation) = update.orientation {
            self.orientation = orientation;
        }
        if let Some(is_tracking) = update.is_tracking {
            self.is_tracking = is_tracking;
        }
    }
}

impl Default for TrackingState {
    fn default() -> Self {
        Self::untracked()
    }
}

/// Partial update of a [`TrackingState`]. `None` fields are left untouched.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TrackingUpdate {
    pub position: Option<Vector3<f64>>,
    pub orientation: Option<UnitQuaternion<f64>>,
    pub is_tracking: Option<bool>,
}

impl TrackingUpdate {
    /// Full pose with `is_tracking = true`.
    pub fn pose(pose: &Pose) -> Self {
        Self {
            position: Some(pose.position),
            orientation: Some(pose.orientation),
            is_tracking: Some(true),
        }
    }

    pub fn lost() -> Self {
        Self {
            is_tracking: Some(false),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.position.is_none() && self.orientation.is_none() && self.is_tracking.is_none()
    }
}
