//! Perspective camera model used to un-project marker corners.
//!
//! Conventions follow the OpenGL-style clip space used by web renderers:
//! the camera looks down its local -Z axis, +Y is up, NDC spans [-1, 1] on
//! every axis and image rows grow downward.

use nalgebra::{Matrix4, Vector2, Vector3, Vector4};

use super::Pose;

/// Pinhole camera with a symmetric perspective projection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PerspectiveCamera {
    /// Camera pose in world (camera-to-world).
    pub pose: Pose,
    /// Vertical field of view in degrees.
    pub fov_y_deg: f64,
    /// Width / height.
    pub aspect: f64,
    pub near: f64,
    pub far: f64,
}

impl PerspectiveCamera {
    pub fn new(pose: Pose, fov_y_deg: f64, aspect: f64, near: f64, far: f64) -> Self {
        Self {
            pose,
            fov_y_deg,
            aspect,
            near,
            far,
        }
    }

    pub fn projection_matrix(&self) -> Matrix4<f64> {
        Matrix4::new_perspective(self.aspect, self.fov_y_deg.to_radians(), self.near, self.far)
    }

    /// Camera-to-world matrix.
    pub fn world_matrix(&self) -> Matrix4<f64> {
        self.pose.to_homogeneous()
    }

    pub fn position(&self) -> Vector3<f64> {
        self.pose.position
    }

    /// Viewing direction in world frame.
    pub fn forward(&self) -> Vector3<f64> {
        self.pose.orientation * -Vector3::z()
    }

    /// Un-project a point from normalized device coordinates into world space.
    ///
    /// Returns `None` if the projection is singular or the result is not finite.
    pub fn unproject(&self, ndc: &Vector3<f64>) -> Option<Vector3<f64>> {
        let inv_projection = self.projection_matrix().try_inverse()?;
        let clip = Vector4::new(ndc.x, ndc.y, ndc.z, 1.0);
        let world = self.world_matrix() * inv_projection * clip;

        if world.w == 0.0 || !world.w.is_finite() {
            return None;
        }
        let p = world.xyz() / world.w;
        p.iter().all(|v| v.is_finite()).then_some(p)
    }

    /// Project a world point into NDC. Points behind the camera return `None`.
    pub fn project(&self, world: &Vector3<f64>) -> Option<Vector3<f64>> {
        let view = self.world_matrix().try_inverse()?;
        let clip = self.projection_matrix() * view * world.push(1.0);
        if clip.w <= 0.0 {
            return None;
        }
        Some(clip.xyz() / clip.w)
    }
}

/// Convert a pixel coordinate into NDC at the given depth.
pub fn pixel_to_ndc(pixel: &Vector2<f64>, width: f64, height: f64, depth: f64) -> Vector3<f64> {
    Vector3::new(
        pixel.x / width * 2.0 - 1.0,
        -(pixel.y / height) * 2.0 + 1.0,
        depth,
    )
}
