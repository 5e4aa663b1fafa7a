//! Throttled camera scan loop feeding the marker pose estimator.

use std::time::Instant;

use tracing::{info, trace, warn};

use crate::error::MarkerError;
use crate::geometry::{PerspectiveCamera, Pose};
use crate::tracking::{TrackingStore, TrackingUpdate};

use super::detector::{MarkerDetector, QrDetectionResult};
use super::estimator::{MarkerConfig, QrPoseEstimator};
use super::raster::Raster;
use super::throttle::ScanThrottle;

/// Live camera feed (consumed).
pub trait CameraFeed {
    /// Acquire the camera. Fails when permission is denied or no camera exists.
    fn open(&mut self) -> Result<(), MarkerError>;

    /// Copy the current frame into `raster`. Returns false if no frame is available.
    fn capture(&mut self, raster: &mut Raster) -> bool;

    /// Camera used to render the current frame.
    fn camera(&self) -> PerspectiveCamera;
}

impl<T: CameraFeed + ?Sized> CameraFeed for Box<T> {
    fn open(&mut self) -> Result<(), MarkerError> {
        (**self).open()
    }

    fn capture(&mut self, raster: &mut Raster) -> bool {
        (**self).capture(raster)
    }

    fn camera(&self) -> PerspectiveCamera {
        (**self).camera()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScannerState {
    Stopped,
    Running,
    /// Camera setup failed; the loop never starts.
    Disabled,
}

/// Marker fallback: capture, binarize, detect, estimate, publish.
pub struct MarkerScanner {
    feed: Box<dyn CameraFeed>,
    detector: Box<dyn MarkerDetector>,
    estimator: QrPoseEstimator,
    throttle: ScanThrottle,
    raster: Raster,
    threshold: u8,
    state: ScannerState,
    setup_error: Option<MarkerError>,
}

impl MarkerScanner {
    pub fn new(
        feed: Box<dyn CameraFeed>,
        detector: Box<dyn MarkerDetector>,
        config: MarkerConfig,
    ) -> Self {
        Self {
            feed,
            detector,
            throttle: ScanThrottle::new(config.scan_interval()),
            raster: Raster::new(config.raster_width, config.raster_height),
            threshold: config.binarize_threshold,
            estimator: QrPoseEstimator::new(config),
            state: ScannerState::Stopped,
            setup_error: None,
        }
    }

    pub fn state(&self) -> ScannerState {
        self.state
    }

    pub fn setup_error(&self) -> Option<&MarkerError> {
        self.setup_error.as_ref()
    }

    pub fn estimator(&self) -> &QrPoseEstimator {
        &self.estimator
    }

    /// Open the camera and begin scanning.
    ///
    /// A setup failure is logged once and disables the scanner for good;
    /// later calls return the same error without touching the camera again.
    pub fn start(&mut self) -> Result<(), MarkerError> {
        match self.state {
            ScannerState::Running => Ok(()),
            ScannerState::Disabled => Err(self
                .setup_error
                .clone()
                .unwrap_or_else(|| MarkerError::CameraUnavailable("disabled".into()))),
            ScannerState::Stopped => match self.feed.open() {
                Ok(()) => {
                    info!(
                        "marker scanning started every {} ms",
                        self.throttle.interval().as_millis()
                    );
                    self.state = ScannerState::Running;
                    Ok(())
                }
                Err(e) => {
                    warn!("marker scanning disabled: {}", e);
                    self.state = ScannerState::Disabled;
                    self.setup_error = Some(e.clone());
                    Err(e)
                }
            },
        }
    }

    /// Pause scanning and forget smoothing history.
    pub fn stop(&mut self) {
        if self.state == ScannerState::Running {
            self.state = ScannerState::Stopped;
        }
        self.estimator.reset();
        self.throttle.reset();
    }

    /// Run one scan if the throttle allows it. Returns the published pose, if any.
    pub fn tick(&mut self, now: Instant, store: &TrackingStore) -> Option<Pose> {
        if self.state != ScannerState::Running || !self.throttle.ready(now) {
            return None;
        }
        if !self.feed.capture(&mut self.raster) {
            trace!("camera frame not available");
            return None;
        }
        self.raster.binarize(self.threshold);

        let published = match self.detector.detect(
            self.raster.data(),
            self.raster.width(),
            self.raster.height(),
        ) {
            Some(detection) => {
                let result = QrDetectionResult::new(detection, now);
                let camera = self.feed.camera();
                self.estimator.process(
                    &result,
                    &camera,
                    self.raster.width() as f64,
                    self.raster.height() as f64,
                    store,
                )
            }
            None => None,
        };

        // A scan without a valid pose ends tracking; the last position stays.
        if published.is_none() && store.snapshot().is_tracking {
            trace!("marker lost");
            store.update(TrackingUpdate::lost());
        }
        published
    }
}
