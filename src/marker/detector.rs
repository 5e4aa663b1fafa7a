//! 2D marker detection primitive (consumed) and its per-scan result.

use std::time::Instant;

use nalgebra::Vector2;

/// Corners and payload of a marker found in a raster.
///
/// Corner order: top-left, top-right, bottom-right, bottom-left, in pixels.
#[derive(Debug, Clone, PartialEq)]
pub struct MarkerDetection {
    pub corners: [Vector2<f64>; 4],
    pub content: String,
}

impl MarkerDetection {
    pub fn new(corners: [Vector2<f64>; 4], content: impl Into<String>) -> Self {
        Self {
            corners,
            content: content.into(),
        }
    }

    /// Axis-aligned square with top-left corner at `(x, y)`.
    pub fn square(x: f64, y: f64, size: f64, content: impl Into<String>) -> Self {
        Self::new(
            [
                Vector2::new(x, y),
                Vector2::new(x + size, y),
                Vector2::new(x + size, y + size),
                Vector2::new(x, y + size),
            ],
            content,
        )
    }
}

/// Marker detection for one scan, stamped with the scan time.
#[derive(Debug, Clone, PartialEq)]
pub struct QrDetectionResult {
    pub corners: [Vector2<f64>; 4],
    pub content: String,
    pub timestamp: Instant,
}

impl QrDetectionResult {
    pub fn new(detection: MarkerDetection, timestamp: Instant) -> Self {
        Self {
            corners: detection.corners,
            content: detection.content,
            timestamp,
        }
    }

    pub fn top_left(&self) -> Vector2<f64> {
        self.corners[0]
    }

    pub fn top_right(&self) -> Vector2<f64> {
        self.corners[1]
    }

    pub fn bottom_right(&self) -> Vector2<f64> {
        self.corners[2]
    }

    pub fn bottom_left(&self) -> Vector2<f64> {
        self.corners[3]
    }

    /// Apparent width of the top edge in pixels.
    pub fn pixel_width(&self) -> f64 {
        (self.top_right() - self.top_left()).norm()
    }
}

/// Finds a marker in an RGBA raster. `None` means nothing found this scan.
pub trait MarkerDetector {
    fn detect(&self, rgba: &[u8], width: u32, height: u32) -> Option<MarkerDetection>;
}

impl<T: MarkerDetector + ?Sized> MarkerDetector for Box<T> {
    fn detect(&self, rgba: &[u8], width: u32, height: u32) -> Option<MarkerDetection> {
        (**self).detect(rgba, width, height)
    }
}
