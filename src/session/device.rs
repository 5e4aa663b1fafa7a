//! Device spatial-session API consumed by the lifecycle manager.
//!
//! The device never calls back into the manager directly. Frame ticks,
//! device-initiated end events and visibility changes are delivered by the
//! host event loop to [`SessionLifecycleManager`](super::SessionLifecycleManager),
//! tagged with the session and frame registration they belong to.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::geometry::Pose;

use super::pending::Pending;

/// Identifier of a device session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "S{}", self.0)
    }
}

/// Identifier of one frame-callback registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameRequestId(pub u64);

/// Identifier of a registered end-event listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EndListenerId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionMode {
    ImmersiveAr,
    ImmersiveVr,
    Inline,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequiredFeature {
    /// HTML/UI overlay surface drawn over the camera view.
    DomOverlay,
    ImageTracking,
    HitTest,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReferenceSpaceType {
    Viewer,
    #[default]
    Local,
    LocalFloor,
    Unbounded,
}

/// Negotiated coordinate space in which poses are reported.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReferenceSpace {
    pub kind: ReferenceSpaceType,
    /// Pose of this space's origin in the device tracking origin.
    pub origin: Pose,
}

impl ReferenceSpace {
    pub fn new(kind: ReferenceSpaceType) -> Self {
        Self {
            kind,
            origin: Pose::identity(),
        }
    }

    /// Express a device-origin pose in this space.
    pub fn relative(&self, pose: &Pose) -> Pose {
        self.origin.inverse().compose(pose)
    }
}

/// Decoded RGBA bitmap of the image the device should track.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackingImage {
    pub width_px: u32,
    pub height_px: u32,
    pub pixels: Arc<[u8]>,
}

impl TrackingImage {
    pub fn new(width_px: u32, height_px: u32, pixels: impl Into<Arc<[u8]>>) -> Self {
        Self {
            width_px,
            height_px,
            pixels: pixels.into(),
        }
    }

    /// Placeholder for an image whose bitmap has not finished decoding.
    pub fn undecoded(width_px: u32, height_px: u32) -> Self {
        Self::new(width_px, height_px, Vec::new())
    }

    pub fn is_decoded(&self) -> bool {
        self.width_px > 0
            && self.height_px > 0
            && self.pixels.len() == self.width_px as usize * self.height_px as usize * 4
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrackedImageDescriptor {
    pub image: TrackingImage,
    /// Physical width of the printed image in meters.
    pub width_m: f64,
}

/// Options passed to [`SpatialDevice::request_session`].
#[derive(Debug, Clone, PartialEq)]
pub struct SessionOptions {
    pub required_features: Vec<RequiredFeature>,
    pub tracked_images: Vec<TrackedImageDescriptor>,
}

impl SessionOptions {
    /// Image-tracking session with an overlay surface.
    pub fn image_tracking(image: TrackingImage, width_m: f64) -> Self {
        Self {
            required_features: vec![RequiredFeature::DomOverlay, RequiredFeature::ImageTracking],
            tracked_images: vec![TrackedImageDescriptor { image, width_m }],
        }
    }

    pub fn requires(&self, feature: RequiredFeature) -> bool {
        self.required_features.contains(&feature)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageTrackingStatus {
    /// Actively seen by the camera this frame.
    Tracked,
    /// Last known pose, not currently observed.
    Emulated,
}

/// One image-tracking result in a frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImageTrackingResult {
    /// Index into [`SessionOptions::tracked_images`].
    pub index: usize,
    pub status: ImageTrackingStatus,
    /// Pose in the device tracking origin; `None` when the device could not resolve it.
    pub pose: Option<Pose>,
    pub measured_width_m: f64,
}

/// A display-refresh tick delivered for one frame registration.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceFrame {
    pub session: SessionId,
    pub request: FrameRequestId,
    pub timestamp: Duration,
    pub image_results: Vec<ImageTrackingResult>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Visible,
    Hidden,
}

/// Entry point of the device spatial-session API.
pub trait SpatialDevice {
    fn is_supported(&self, mode: SessionMode) -> bool;

    fn request_session(
        &mut self,
        mode: SessionMode,
        options: SessionOptions,
    ) -> Pending<Box<dyn SpatialSession>>;
}

/// A granted device session.
pub trait SpatialSession: Send {
    fn id(&self) -> SessionId;

    fn request_reference_space(&mut self, kind: ReferenceSpaceType) -> Pending<ReferenceSpace>;

    /// Ask for exactly one [`DeviceFrame`] on the next display refresh.
    fn request_frame_callback(&mut self) -> FrameRequestId;

    fn cancel_frame_callback(&mut self, request: FrameRequestId);

    fn add_end_listener(&mut self) -> EndListenerId;

    fn remove_end_listener(&mut self, listener: EndListenerId);

    fn end(&mut self);
}
