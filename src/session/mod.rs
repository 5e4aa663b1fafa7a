//! Spatial session lifecycle.
//!
//! - `device`: the consumed device spatial-session API (traits and value types)
//! - `pending`: one-shot pending values for asynchronous negotiation
//! - `state`: lifecycle states, end reasons and broadcast events
//! - `manager`: the state machine owning the session and its frame pump

pub mod device;
pub mod manager;
pub mod pending;
pub mod state;

pub use device::{
    DeviceFrame, ImageTrackingResult, ImageTrackingStatus, ReferenceSpace, ReferenceSpaceType,
    SessionId, SpatialDevice, SpatialSession, TrackingImage, Visibility,
};
pub use manager::{FrameOutcome, RestartPolicy, SessionConfig, SessionLifecycleManager};
pub use pending::{Outcome, Pending, PendingStart};
pub use state::{EndReason, SessionEvent, SessionState};
