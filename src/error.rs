//! Error types for the spatial tracking subsystem.
//!
//! Only fatal conditions are errors. Per-tick misses (no image-tracking pose,
//! no marker in the camera raster) are expressed as `None` results and never
//! reach these types.

use thiserror::Error;

use crate::tracking::store::ListenerId;

/// Failures reported by a device spatial-session API.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeviceError {
    #[error("permission denied")]
    PermissionDenied,

    #[error("feature not supported: {0}")]
    NotSupported(String),

    #[error("device error: {0}")]
    Failed(String),

    #[error("device dropped the request without answering")]
    Dropped,
}

/// Errors surfaced by the session lifecycle manager.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// The device lacks support for camera-tracked sessions. Fatal, no retry.
    #[error("spatial session not supported on this device")]
    SessionUnavailable,

    /// The tracking image has not been decoded yet. The caller waits and retries.
    #[error("tracking image not ready")]
    ResourceNotReady,

    /// `start()` was called while a session was requesting or active.
    #[error("a spatial session is already active")]
    AlreadyActive,

    /// Permission denied or device error during session or reference space negotiation.
    #[error("session negotiation failed: {0}")]
    NegotiationFailed(String),

    /// `end()` was called while negotiation was still pending.
    #[error("session request cancelled")]
    Cancelled,
}

impl SessionError {
    /// Single actionable sentence suitable for showing to the user.
    pub fn user_message(&self) -> &'static str {
        match self {
            SessionError::SessionUnavailable => "AR is not supported on this device.",
            SessionError::ResourceNotReady => "The tracking image is not ready yet, please wait.",
            SessionError::AlreadyActive => "An AR session is already running.",
            SessionError::NegotiationFailed(_) => {
                "Could not start AR. Check camera permissions and try again."
            }
            SessionError::Cancelled => "AR start was cancelled.",
        }
    }
}

impl From<DeviceError> for SessionError {
    fn from(e: DeviceError) -> Self {
        SessionError::NegotiationFailed(e.to_string())
    }
}

/// Errors from the marker (QR) fallback path.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MarkerError {
    #[error("camera unavailable: {0}")]
    CameraUnavailable(String),

    #[error("raster buffer does not match {width}x{height} RGBA")]
    InvalidRaster { width: u32, height: u32 },
}

/// Errors from the tracking store.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("listener {0} is not subscribed")]
    UnknownListener(ListenerId),
}

/// Errors loading or validating configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_error_maps_to_negotiation_failed() {
        let err: SessionError = DeviceError::PermissionDenied.into();
        assert_eq!(
            err,
            SessionError::NegotiationFailed("permission denied".to_string())
        );
    }

    #[test]
    fn test_user_messages_are_distinct() {
        let errors = [
            SessionError::SessionUnavailable,
            SessionError::ResourceNotReady,
            SessionError::AlreadyActive,
            SessionError::NegotiationFailed("x".into()),
            SessionError::Cancelled,
        ];
        for (i, a) in errors.iter().enumerate() {
            for b in errors.iter().skip(i + 1) {
                assert_ne!(a.user_message(), b.user_message());
            }
        }
    }
}
