//! Simulated spatial device for tests and the demo binary.
//!
//! `SimDevice` is a cheap cloneable handle: the manager owns one clone, the
//! test (or replay driver) keeps another to resolve deferred negotiations,
//! generate frames for the outstanding registration, fire device-initiated
//! end events and inspect what the manager asked the device to do.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::error::DeviceError;
use crate::geometry::Pose;
use crate::session::device::{
    DeviceFrame, EndListenerId, FrameRequestId, ImageTrackingResult, ImageTrackingStatus,
    ReferenceSpace, ReferenceSpaceType, SessionId, SessionMode, SessionOptions, SpatialDevice,
    SpatialSession,
};
use crate::session::pending::{pending, Pending, Resolver};

/// Frame interval of the simulated display (60 Hz).
const FRAME_INTERVAL: Duration = Duration::from_micros(16_667);

/// How the simulated device answers a negotiation.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Negotiation {
    #[default]
    Immediate,
    /// Held until the test resolves or rejects it.
    Deferred,
    Fail(DeviceError),
}

/// What the device saw of one session.
#[derive(Debug, Clone)]
pub struct SessionRecord {
    pub id: SessionId,
    pub options: SessionOptions,
    pub ended: bool,
    /// Number of `SpatialSession::end` calls.
    pub end_calls: usize,
    pub end_listeners: Vec<EndListenerId>,
    pub live_frame_requests: Vec<FrameRequestId>,
    pub frame_requests_made: usize,
    pub reference_space_requests: Vec<ReferenceSpaceType>,
}

struct PendingSession {
    id: SessionId,
    options: SessionOptions,
    resolver: Resolver<Box<dyn SpatialSession>>,
}

struct PendingSpace {
    kind: ReferenceSpaceType,
    resolver: Resolver<ReferenceSpace>,
}

struct SimShared {
    supported: bool,
    session_negotiation: Negotiation,
    space_negotiation: Negotiation,
    space_origin: Pose,
    next_id: u64,
    clock: Duration,
    sessions: Vec<SessionRecord>,
    pending_sessions: VecDeque<PendingSession>,
    pending_spaces: VecDeque<PendingSpace>,
}

impl SimShared {
    fn next_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn record_mut(&mut self, id: SessionId) -> Option<&mut SessionRecord> {
        self.sessions.iter_mut().find(|r| r.id == id)
    }
}

/// Scripted device implementing [`SpatialDevice`].
#[derive(Clone)]
pub struct SimDevice {
    shared: Arc<Mutex<SimShared>>,
}

impl SimDevice {
    /// Supported device answering every negotiation immediately.
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Mutex::new(SimShared {
                supported: true,
                session_negotiation: Negotiation::Immediate,
                space_negotiation: Negotiation::Immediate,
                space_origin: Pose::identity(),
                next_id: 0,
                clock: Duration::ZERO,
                sessions: Vec::new(),
                pending_sessions: VecDeque::new(),
                pending_spaces: VecDeque::new(),
            })),
        }
    }

    pub fn with_support(self, supported: bool) -> Self {
        self.shared.lock().supported = supported;
        self
    }

    pub fn with_session_negotiation(self, negotiation: Negotiation) -> Self {
        self.shared.lock().session_negotiation = negotiation;
        self
    }

    pub fn with_reference_space_negotiation(self, negotiation: Negotiation) -> Self {
        self.shared.lock().space_negotiation = negotiation;
        self
    }

    /// Origin of negotiated reference spaces in the device tracking origin.
    pub fn with_space_origin(self, origin: Pose) -> Self {
        self.shared.lock().space_origin = origin;
        self
    }

    /// Grant the oldest deferred session request.
    pub fn resolve_session(&self) -> Option<SessionId> {
        let mut shared = self.shared.lock();
        let request = shared.pending_sessions.pop_front()?;
        shared.sessions.push(SessionRecord::new(request.id, request.options));
        let session = SimSession {
            id: request.id,
            shared: Arc::clone(&self.shared),
        };
        drop(shared);
        request.resolver.resolve(Box::new(session));
        Some(request.id)
    }

    pub fn reject_session(&self, error: DeviceError) -> bool {
        let request = self.shared.lock().pending_sessions.pop_front();
        match request {
            Some(request) => {
                request.resolver.reject(error);
                true
            }
            None => false,
        }
    }

    /// Answer the oldest deferred reference space request.
    pub fn resolve_reference_space(&self) -> bool {
        let (request, origin) = {
            let mut shared = self.shared.lock();
            (shared.pending_spaces.pop_front(), shared.space_origin)
        };
        match request {
            Some(request) => {
                request.resolver.resolve(ReferenceSpace {
                    kind: request.kind,
                    origin,
                });
                true
            }
            None => false,
        }
    }

    pub fn reject_reference_space(&self, error: DeviceError) -> bool {
        let request = self.shared.lock().pending_spaces.pop_front();
        match request {
            Some(request) => {
                request.resolver.reject(error);
                true
            }
            None => false,
        }
    }

    pub fn sessions(&self) -> Vec<SessionRecord> {
        self.shared.lock().sessions.clone()
    }

    pub fn session(&self, id: SessionId) -> Option<SessionRecord> {
        self.shared
            .lock()
            .sessions
            .iter()
            .find(|r| r.id == id)
            .cloned()
    }

    /// Outstanding frame registrations across all live sessions.
    pub fn live_frame_requests(&self) -> usize {
        self.shared
            .lock()
            .sessions
            .iter()
            .filter(|r| !r.ended)
            .map(|r| r.live_frame_requests.len())
            .sum()
    }

    /// Fire the oldest outstanding frame registration of the newest live session.
    ///
    /// The registration is consumed, as a display refresh would.
    pub fn frame(&self, image_results: Vec<ImageTrackingResult>) -> Option<DeviceFrame> {
        let mut shared = self.shared.lock();
        shared.clock += FRAME_INTERVAL;
        let timestamp = shared.clock;
        let record = shared
            .sessions
            .iter_mut()
            .rev()
            .find(|r| !r.ended && !r.live_frame_requests.is_empty())?;
        let request = record.live_frame_requests.remove(0);
        Some(DeviceFrame {
            session: record.id,
            request,
            timestamp,
            image_results,
        })
    }

    /// Frame with a single tracked image at `pose`.
    ///
    /// The pose goes through the column-major matrix form device APIs report.
    pub fn frame_with_pose(&self, pose: Pose) -> Option<DeviceFrame> {
        let mut matrix = [0.0; 16];
        matrix.copy_from_slice(pose.to_homogeneous().as_slice());
        self.frame(vec![ImageTrackingResult {
            index: 0,
            status: ImageTrackingStatus::Tracked,
            pose: Pose::from_column_major(&matrix),
            measured_width_m: 0.0,
        }])
    }

    /// End the newest live session from the device side.
    ///
    /// Returns the session id if an end listener is registered to hear it.
    pub fn fire_end_event(&self) -> Option<SessionId> {
        let mut shared = self.shared.lock();
        let record = shared.sessions.iter_mut().rev().find(|r| !r.ended)?;
        record.ended = true;
        record.live_frame_requests.clear();
        (!record.end_listeners.is_empty()).then_some(record.id)
    }
}

impl Default for SimDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionRecord {
    fn new(id: SessionId, options: SessionOptions) -> Self {
        Self {
            id,
            options,
            ended: false,
            end_calls: 0,
            end_listeners: Vec::new(),
            live_frame_requests: Vec::new(),
            frame_requests_made: 0,
            reference_space_requests: Vec::new(),
        }
    }
}

impl SpatialDevice for SimDevice {
    fn is_supported(&self, mode: SessionMode) -> bool {
        self.shared.lock().supported && mode == SessionMode::ImmersiveAr
    }

    fn request_session(
        &mut self,
        _mode: SessionMode,
        options: SessionOptions,
    ) -> Pending<Box<dyn SpatialSession>> {
        let mut shared = self.shared.lock();
        let id = SessionId(shared.next_id());
        match shared.session_negotiation.clone() {
            Negotiation::Immediate => {
                shared.sessions.push(SessionRecord::new(id, options));
                let session: Box<dyn SpatialSession> = Box::new(SimSession {
                    id,
                    shared: Arc::clone(&self.shared),
                });
                Pending::ready(session)
            }
            Negotiation::Deferred => {
                let (resolver, pending) = pending();
                shared.pending_sessions.push_back(PendingSession {
                    id,
                    options,
                    resolver,
                });
                pending
            }
            Negotiation::Fail(error) => Pending::failed(error),
        }
    }
}

/// Session handed out by [`SimDevice`].
pub struct SimSession {
    id: SessionId,
    shared: Arc<Mutex<SimShared>>,
}

impl SpatialSession for SimSession {
    fn id(&self) -> SessionId {
        self.id
    }

    fn request_reference_space(&mut self, kind: ReferenceSpaceType) -> Pending<ReferenceSpace> {
        let mut shared = self.shared.lock();
        if let Some(record) = shared.record_mut(self.id) {
            record.reference_space_requests.push(kind);
        }
        match shared.space_negotiation.clone() {
            Negotiation::Immediate => Pending::ready(ReferenceSpace {
                kind,
                origin: shared.space_origin,
            }),
            Negotiation::Deferred => {
                let (resolver, pending) = pending();
                shared.pending_spaces.push_back(PendingSpace { kind, resolver });
                pending
            }
            Negotiation::Fail(error) => Pending::failed(error),
        }
    }

    fn request_frame_callback(&mut self) -> FrameRequestId {
        let mut shared = self.shared.lock();
        let request = FrameRequestId(shared.next_id());
        if let Some(record) = shared.record_mut(self.id) {
            record.frame_requests_made += 1;
            if !record.ended {
                record.live_frame_requests.push(request);
            }
        }
        request
    }

    fn cancel_frame_callback(&mut self, request: FrameRequestId) {
        if let Some(record) = self.shared.lock().record_mut(self.id) {
            record.live_frame_requests.retain(|r| *r != request);
        }
    }

    fn add_end_listener(&mut self) -> EndListenerId {
        let mut shared = self.shared.lock();
        let listener = EndListenerId(shared.next_id());
        if let Some(record) = shared.record_mut(self.id) {
            record.end_listeners.push(listener);
        }
        listener
    }

    fn remove_end_listener(&mut self, listener: EndListenerId) {
        if let Some(record) = self.shared.lock().record_mut(self.id) {
            record.end_listeners.retain(|l| *l != listener);
        }
    }

    fn end(&mut self) {
        if let Some(record) = self.shared.lock().record_mut(self.id) {
            record.ended = true;
            record.end_calls += 1;
            record.live_frame_requests.clear();
        }
    }
}
