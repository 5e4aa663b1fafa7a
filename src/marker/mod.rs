//! Vision fallback: pose of a printed marker from the live camera feed.
//!
//! Used when the device cannot track the anchor image natively. Scans run
//! at a throttled cadence because 2D marker detection dominates their cost.

pub mod detector;
pub mod estimator;
pub mod raster;
pub mod scanner;
pub mod throttle;

pub use detector::{MarkerDetection, MarkerDetector, QrDetectionResult};
pub use estimator::{MarkerConfig, MarkerEstimate, QrPoseEstimator};
pub use raster::Raster;
pub use scanner::{CameraFeed, MarkerScanner, ScannerState};
pub use throttle::ScanThrottle;
