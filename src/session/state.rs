//! Session lifecycle state machine and the events it emits.

use std::fmt;

use crate::error::SessionError;

use super::device::SessionId;

/// Lifecycle state of the spatial session.
///
/// `Idle → Requesting → Active → Ending → Idle`; abrupt device termination
/// goes through the same teardown as a user-initiated end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Idle,
    /// Waiting for the device to grant the session.
    Requesting,
    /// Session granted; frame pump running.
    Active,
    /// Teardown in progress.
    Ending,
}

impl SessionState {
    /// True while a session is requested or live.
    pub fn is_busy(&self) -> bool {
        matches!(self, SessionState::Requesting | SessionState::Active)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Idle => "idle",
            SessionState::Requesting => "requesting",
            SessionState::Active => "active",
            SessionState::Ending => "ending",
        };
        f.write_str(name)
    }
}

/// Why a session (or session request) was torn down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndReason {
    User,
    /// The device ended the session (system gesture, permission revoked).
    DeviceEnded,
    /// The surface became hidden.
    Hidden,
    /// `start()` replaced the session under the restart policy.
    Restart,
    /// Reference space negotiation failed after the session was granted.
    NegotiationFailed,
}

/// Notification broadcast to the owning UI/render layer.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Requested,
    /// Session granted, frame pump started.
    Started { session: SessionId },
    /// Reference space negotiated; poses will be published.
    Ready { session: SessionId },
    /// Tracking stopped. `session` is `None` when a pending request was cancelled.
    /// Consumers reinitialize their render context here.
    Ended {
        session: Option<SessionId>,
        reason: EndReason,
    },
    Failed(SessionError),
}
