//! Simulated camera feed and scripted marker detector.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::MarkerError;
use crate::geometry::{PerspectiveCamera, Pose};
use crate::marker::{CameraFeed, MarkerDetection, MarkerDetector, Raster};

/// Camera feed that fills every frame with a flat color.
pub struct SimCameraFeed {
    permission: bool,
    camera: PerspectiveCamera,
    fill: [u8; 4],
    open_calls: Arc<AtomicUsize>,
}

impl SimCameraFeed {
    /// Permission granted, identity camera with a 70 degree vertical FOV at 4:3.
    pub fn new() -> Self {
        Self {
            permission: true,
            camera: PerspectiveCamera::new(Pose::identity(), 70.0, 4.0 / 3.0, 0.01, 100.0),
            fill: [128, 128, 128, 255],
            open_calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn with_permission(mut self, granted: bool) -> Self {
        self.permission = granted;
        self
    }

    pub fn with_fill(mut self, rgba: [u8; 4]) -> Self {
        self.fill = rgba;
        self
    }

    /// Counter of `open()` calls, shared with the feed.
    pub fn open_calls(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.open_calls)
    }
}

impl Default for SimCameraFeed {
    fn default() -> Self {
        Self::new()
    }
}

impl CameraFeed for SimCameraFeed {
    fn open(&mut self) -> Result<(), MarkerError> {
        self.open_calls.fetch_add(1, Ordering::SeqCst);
        if self.permission {
            Ok(())
        } else {
            Err(MarkerError::CameraUnavailable("permission denied".into()))
        }
    }

    fn capture(&mut self, raster: &mut Raster) -> bool {
        raster.fill(self.fill);
        true
    }

    fn camera(&self) -> PerspectiveCamera {
        self.camera
    }
}

/// Detector replaying a script of results, then a fallback result forever.
pub struct ScriptedDetector {
    script: Mutex<VecDeque<Option<MarkerDetection>>>,
    fallback: Option<MarkerDetection>,
    calls: Arc<AtomicUsize>,
    last_raster: Arc<Mutex<Option<Vec<u8>>>>,
}

impl ScriptedDetector {
    pub fn scripted(
        script: impl IntoIterator<Item = Option<MarkerDetection>>,
        fallback: Option<MarkerDetection>,
    ) -> Self {
        Self {
            script: Mutex::new(script.into_iter().collect()),
            fallback,
            calls: Arc::new(AtomicUsize::new(0)),
            last_raster: Arc::new(Mutex::new(None)),
        }
    }

    pub fn always(result: Option<MarkerDetection>) -> Self {
        Self::scripted(Vec::new(), result)
    }

    pub fn calls(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }

    /// Copy of the raster passed to the most recent `detect` call.
    pub fn last_raster(&self) -> Arc<Mutex<Option<Vec<u8>>>> {
        Arc::clone(&self.last_raster)
    }
}

impl MarkerDetector for ScriptedDetector {
    fn detect(&self, rgba: &[u8], _width: u32, _height: u32) -> Option<MarkerDetection> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_raster.lock() = Some(rgba.to_vec());
        self.script
            .lock()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone())
    }
}
