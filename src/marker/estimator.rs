//! World-space pose of a printed marker from its four image corners.
//!
//! Pipeline for one detection:
//! 1. Un-project each corner from NDC through the camera's inverse projection
//! 2. Center = mean of the un-projected corners
//! 3. Orientation from the (right, down, normal) basis of the marker edges
//! 4. Distance = mean of two independent estimates:
//!    - known physical size vs. un-projected edge length
//!    - pinhole model with the raster width standing in for the focal length
//! 5. Position = camera + direction to center * distance
//! 6. Exponential smoothing against the previous estimate
//!
//! Averaging the two distance estimates is a heuristic noise damper, not a
//! calibrated sensor model; both inputs are reported on [`MarkerEstimate`]
//! so a calibrated replacement can be compared against them.

use std::time::Duration;

use nalgebra::{Rotation3, UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::geometry::{pixel_to_ndc, PerspectiveCamera, Pose};
use crate::tracking::{TrackingStore, TrackingUpdate};

use super::detector::QrDetectionResult;

/// Vectors shorter than this are treated as degenerate.
const DEGENERATE_EPS: f64 = 1e-12;

/// Configuration for the marker fallback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarkerConfig {
    /// Minimum time between two scans.
    pub scan_interval_ms: u64,

    /// Capture raster size in pixels.
    pub raster_width: u32,
    pub raster_height: u32,

    /// Luma threshold for binarization.
    pub binarize_threshold: u8,

    /// Physical edge length of the printed marker in meters.
    pub marker_size_m: f64,

    /// Weight of the new estimate in the exponential smoothing, in (0, 1].
    pub smoothing: f64,

    /// NDC depth at which corners are un-projected.
    pub ndc_depth: f64,
}

impl Default for MarkerConfig {
    fn default() -> Self {
        Self {
            scan_interval_ms: 1000,
            raster_width: 480,
            raster_height: 360,
            binarize_threshold: 128,
            marker_size_m: 0.05,
            smoothing: 0.3,
            ndc_depth: 0.5,
        }
    }
}

impl MarkerConfig {
    pub fn scan_interval(&self) -> Duration {
        Duration::from_millis(self.scan_interval_ms)
    }
}

/// Un-smoothed pose estimate for one detection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarkerEstimate {
    pub pose: Pose,
    /// Mean of the un-projected corners.
    pub center: Vector3<f64>,
    pub distance_m: f64,
    pub distance_from_edge_m: f64,
    pub distance_from_pinhole_m: f64,
}

/// Marker pose estimator with temporal smoothing.
#[derive(Debug, Clone)]
pub struct QrPoseEstimator {
    config: MarkerConfig,
    previous: Option<Pose>,
}

impl QrPoseEstimator {
    pub fn new(config: MarkerConfig) -> Self {
        Self {
            config,
            previous: None,
        }
    }

    pub fn config(&self) -> &MarkerConfig {
        &self.config
    }

    /// Last published (smoothed) pose.
    pub fn previous(&self) -> Option<Pose> {
        self.previous
    }

    /// Forget smoothing history.
    pub fn reset(&mut self) {
        self.previous = None;
    }

    /// Raw estimate from one detection. Pure: identical inputs give identical output.
    ///
    /// Returns `None` when the geometry is degenerate or any value is not finite.
    pub fn estimate_raw(
        &self,
        detection: &QrDetectionResult,
        camera: &PerspectiveCamera,
        raster_width: f64,
        raster_height: f64,
    ) -> Option<MarkerEstimate> {
        let mut world = [Vector3::zeros(); 4];
        for (corner, out) in detection.corners.iter().zip(world.iter_mut()) {
            let ndc = pixel_to_ndc(corner, raster_width, raster_height, self.config.ndc_depth);
            *out = camera.unproject(&ndc)?;
        }
        let [top_left, top_right, bottom_right, bottom_left] = world;
        let center = (top_left + top_right + bottom_right + bottom_left) / 4.0;

        let right = (top_right - top_left).try_normalize(DEGENERATE_EPS)?;
        let down = (bottom_left - top_left).try_normalize(DEGENERATE_EPS)?;
        let normal = right.cross(&down).try_normalize(DEGENERATE_EPS)?;
        // Perspective skew leaves right/down slightly non-orthogonal.
        let down = normal.cross(&right);
        let rotation = Rotation3::from_basis_unchecked(&[right, down, normal]);
        let orientation = UnitQuaternion::from_rotation_matrix(&rotation);

        let to_center = center - camera.position();
        let direction = to_center.try_normalize(DEGENERATE_EPS)?;
        let size = self.config.marker_size_m;

        let world_edge = (top_right - top_left).norm();
        let distance_from_edge_m = to_center.norm() * size / world_edge;

        let pixel_width = detection.pixel_width();
        if pixel_width <= DEGENERATE_EPS {
            return None;
        }
        let distance_from_pinhole_m = size * raster_width / pixel_width;

        let distance_m = 0.5 * (distance_from_edge_m + distance_from_pinhole_m);
        let pose = Pose::new(camera.position() + direction * distance_m, orientation);

        if !(pose.is_finite() && distance_m.is_finite() && distance_m > 0.0) {
            return None;
        }
        Some(MarkerEstimate {
            pose,
            center,
            distance_m,
            distance_from_edge_m,
            distance_from_pinhole_m,
        })
    }

    /// Blend `raw` into the smoothing history and return the smoothed pose.
    pub fn smooth(&mut self, raw: &Pose) -> Pose {
        let smoothed = match self.previous {
            Some(prev) => prev.interpolate(raw, self.config.smoothing),
            None => *raw,
        };
        self.previous = Some(smoothed);
        smoothed
    }

    /// Estimate, smooth and publish. Non-finite ticks are dropped silently.
    pub fn process(
        &mut self,
        detection: &QrDetectionResult,
        camera: &PerspectiveCamera,
        raster_width: f64,
        raster_height: f64,
        store: &TrackingStore,
    ) -> Option<Pose> {
        let Some(raw) = self.estimate_raw(detection, camera, raster_width, raster_height) else {
            trace!("marker '{}' produced degenerate geometry", detection.content);
            return None;
        };
        let smoothed = self.smooth(&raw.pose);
        store.update(TrackingUpdate::pose(&smoothed));
        debug!(
            "marker '{}': distance {:.3} m (edge {:.3}, pinhole {:.3})",
            detection.content, raw.distance_m, raw.distance_from_edge_m, raw.distance_from_pinhole_m
        );
        Some(smoothed)
    }
}

impl Default for QrPoseEstimator {
    fn default() -> Self {
        Self::new(MarkerConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::marker::detector::MarkerDetection;
    use approx::assert_relative_eq;
    use std::time::Instant;

    const W: f64 = 480.0;
    const H: f64 = 360.0;

    fn camera() -> PerspectiveCamera {
        PerspectiveCamera::new(Pose::identity(), 70.0, W / H, 0.01, 100.0)
    }

    fn square(x: f64, y: f64, size: f64) -> QrDetectionResult {
        QrDetectionResult::new(MarkerDetection::square(x, y, size, "anchor"), Instant::now())
    }

    #[test]
    fn test_reference_square_gives_positive_distance() {
        let estimator = QrPoseEstimator::default();
        let cam = camera();
        let est = estimator
            .estimate_raw(&square(10.0, 10.0, 100.0), &cam, W, H)
            .unwrap();

        assert!(est.distance_m.is_finite() && est.distance_m > 0.0);
        assert_relative_eq!(est.distance_from_pinhole_m, 0.05 * 480.0 / 100.0, epsilon = 1e-12);
        assert!(est.distance_from_edge_m > 0.0);

        let offset = est.pose.position - cam.position();
        assert_relative_eq!(offset.norm(), est.distance_m, epsilon = 1e-9);
        // in front of the camera, roughly along its forward axis
        assert!(offset.normalize().dot(&cam.forward()) > 0.5);
    }

    #[test]
    fn test_raw_estimate_is_deterministic() {
        let estimator = QrPoseEstimator::default();
        let detection = square(10.0, 10.0, 100.0);
        let a = estimator.estimate_raw(&detection, &camera(), W, H).unwrap();
        let b = estimator.estimate_raw(&detection, &camera(), W, H).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_centered_marker_lies_on_forward_axis() {
        let estimator = QrPoseEstimator::default();
        let est = estimator
            .estimate_raw(&square(190.0, 130.0, 100.0), &camera(), W, H)
            .unwrap();
        assert_relative_eq!(est.pose.position.x, 0.0, epsilon = 1e-9);
        assert_relative_eq!(est.pose.position.y, 0.0, epsilon = 1e-9);
        assert!(est.pose.position.z < 0.0);
    }

    #[test]
    fn test_facing_marker_normal_points_away_from_camera() {
        let estimator = QrPoseEstimator::default();
        let est = estimator
            .estimate_raw(&square(190.0, 130.0, 100.0), &camera(), W, H)
            .unwrap();
        let right = est.pose.orientation * Vector3::x();
        let normal = est.pose.orientation * Vector3::z();
        assert_relative_eq!(right, Vector3::x(), epsilon = 1e-9);
        assert_relative_eq!(normal, -Vector3::z(), epsilon = 1e-9);
    }

    #[test]
    fn test_bigger_marker_is_closer() {
        let estimator = QrPoseEstimator::default();
        let near = estimator
            .estimate_raw(&square(140.0, 80.0, 200.0), &camera(), W, H)
            .unwrap();
        let far = estimator
            .estimate_raw(&square(215.0, 155.0, 50.0), &camera(), W, H)
            .unwrap();
        assert!(near.distance_m < far.distance_m);
    }

    #[test]
    fn test_degenerate_corners_are_dropped() {
        let estimator = QrPoseEstimator::default();
        let collapsed = square(100.0, 100.0, 0.0);
        assert!(estimator.estimate_raw(&collapsed, &camera(), W, H).is_none());
    }

    #[test]
    fn test_non_finite_camera_is_dropped_silently() {
        let mut estimator = QrPoseEstimator::default();
        let store = TrackingStore::new();
        let mut cam = camera();
        cam.pose.position = Vector3::new(f64::NAN, 0.0, 0.0);

        let published = estimator.process(&square(10.0, 10.0, 100.0), &cam, W, H, &store);
        assert!(published.is_none());
        assert!(!store.snapshot().is_tracking);
        assert!(estimator.previous().is_none());
    }

    #[test]
    fn test_first_detection_publishes_raw() {
        let mut estimator = QrPoseEstimator::default();
        let store = TrackingStore::new();
        let detection = square(10.0, 10.0, 100.0);
        let raw = estimator.estimate_raw(&detection, &camera(), W, H).unwrap();

        let published = estimator
            .process(&detection, &camera(), W, H, &store)
            .unwrap();
        assert_eq!(published, raw.pose);
        let state = store.snapshot();
        assert!(state.is_tracking);
        assert_relative_eq!(state.position, raw.pose.position);
    }

    #[test]
    fn test_smoothing_never_exceeds_lerp_bound() {
        let mut estimator = QrPoseEstimator::default();
        let alpha = estimator.config().smoothing;
        let store = TrackingStore::new();
        let cam = camera();
        let sizes = [100.0, 40.0, 220.0, 60.0, 180.0, 90.0];

        let mut prev: Option<Pose> = None;
        for size in sizes {
            let detection = square(240.0 - size / 2.0, 180.0 - size / 2.0, size);
            let raw = estimator.estimate_raw(&detection, &cam, W, H).unwrap();
            let published = estimator.process(&detection, &cam, W, H, &store).unwrap();

            if let Some(p) = prev {
                let step = (published.position - p.position).norm();
                let bound = alpha * (raw.pose.position - p.position).norm();
                assert!(step <= bound + 1e-12, "step {} exceeds bound {}", step, bound);
                assert_relative_eq!(
                    published.position,
                    p.position.lerp(&raw.pose.position, alpha),
                    epsilon = 1e-12
                );
            }
            prev = Some(published);
        }
    }

    #[test]
    fn test_reset_forgets_history() {
        let mut estimator = QrPoseEstimator::default();
        let store = TrackingStore::new();
        estimator.process(&square(10.0, 10.0, 100.0), &camera(), W, H, &store);
        assert!(estimator.previous().is_some());
        estimator.reset();
        assert!(estimator.previous().is_none());
    }
}
