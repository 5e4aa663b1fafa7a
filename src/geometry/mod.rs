//! Geometry utilities: rigid poses, Euler angles, perspective camera.

pub mod camera;
pub mod euler;
pub mod pose;

pub use camera::{PerspectiveCamera, pixel_to_ndc};
pub use euler::{EulerAngles, EulerOrder};
pub use pose::Pose;
