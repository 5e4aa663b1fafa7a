//! Session lifecycle manager: owns the device session, its frame pump and teardown.
//!
//! The manager is driven cooperatively by the host event loop:
//! - `start()` issues the device request and returns a [`PendingStart`]
//! - `poll()` advances pending negotiations (session grant, reference space,
//!   late sessions from cancelled requests)
//! - `on_frame()`, `on_session_end()` and `on_visibility_change()` deliver
//!   device callbacks
//!
//! At most one session exists at a time, and at most one frame registration
//! is outstanding for it, so the frame loop is the only writer of the
//! [`TrackingStore`] while a session is active.

use crossbeam_channel::{unbounded, Receiver, Sender};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace, warn};

use crate::error::{DeviceError, SessionError};
use crate::geometry::Pose;
use crate::tracking::{TrackingStore, TrackingUpdate};

use super::device::{
    DeviceFrame, EndListenerId, FrameRequestId, ImageTrackingStatus, ReferenceSpace,
    ReferenceSpaceType, SessionId, SessionMode, SessionOptions, SpatialDevice, SpatialSession,
    TrackingImage, Visibility,
};
use super::pending::{pending, Outcome, Pending, PendingStart, Resolver};
use super::state::{EndReason, SessionEvent, SessionState};

/// What `start()` does when a session is already requesting or active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RestartPolicy {
    /// Fail with [`SessionError::AlreadyActive`].
    #[default]
    Reject,
    /// End the current session, then request a new one.
    Restart,
}

/// Configuration for the session lifecycle manager.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Physical width of the printed tracking image in meters.
    pub tracking_image_width_m: f64,

    /// Reference space requested after the session is granted.
    pub reference_space: ReferenceSpaceType,

    pub restart_policy: RestartPolicy,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            tracking_image_width_m: 0.2,
            reference_space: ReferenceSpaceType::Local,
            restart_policy: RestartPolicy::Reject,
        }
    }
}

/// Result of handling one device frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FrameOutcome {
    /// A tracked pose was written to the store (the last one if several).
    Published(Pose),
    /// No valid image-tracking result this tick.
    Miss,
    /// Reference space not negotiated yet; extraction skipped this tick.
    AwaitingReferenceSpace,
    /// Frame belongs to another session or a stale registration.
    Ignored,
}

struct SessionRequest {
    pending: Pending<Box<dyn SpatialSession>>,
    completion: Resolver<(), SessionError>,
}

struct ActiveSession {
    session: Box<dyn SpatialSession>,
    reference_space: Option<ReferenceSpace>,
    pending_space: Option<Pending<ReferenceSpace>>,
    end_listener: Option<EndListenerId>,
    frame_request: Option<FrameRequestId>,
    /// Resolved once the reference space is negotiated.
    completion: Option<Resolver<(), SessionError>>,
}

/// Owns the spatial session state machine.
pub struct SessionLifecycleManager<D: SpatialDevice> {
    device: D,
    store: TrackingStore,
    config: SessionConfig,
    state: SessionState,
    request: Option<SessionRequest>,
    active: Option<ActiveSession>,
    /// Requests cancelled while pending; sessions they yield are ended on arrival.
    abandoned: Vec<Pending<Box<dyn SpatialSession>>>,
    subscribers: Vec<Sender<SessionEvent>>,
}

impl<D: SpatialDevice> SessionLifecycleManager<D> {
    pub fn new(device: D, store: TrackingStore, config: SessionConfig) -> Self {
        Self {
            device,
            store,
            config,
            state: SessionState::Idle,
            request: None,
            active: None,
            abandoned: Vec::new(),
            subscribers: Vec::new(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state == SessionState::Active
    }

    pub fn session_id(&self) -> Option<SessionId> {
        self.active.as_ref().map(|a| a.session.id())
    }

    pub fn reference_space(&self) -> Option<&ReferenceSpace> {
        self.active.as_ref().and_then(|a| a.reference_space.as_ref())
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    /// Number of cancelled requests still waiting for the device to answer.
    pub fn abandoned_requests(&self) -> usize {
        self.abandoned.len()
    }

    /// Receive lifecycle events. Each call creates an independent receiver.
    pub fn events(&mut self) -> Receiver<SessionEvent> {
        let (tx, rx) = unbounded();
        self.subscribers.push(tx);
        rx
    }

    /// Request a camera-tracked session anchored on `tracking_image`.
    ///
    /// Immediate failures are returned directly; negotiation failures settle the
    /// returned [`PendingStart`] with [`SessionError::NegotiationFailed`].
    pub fn start(
        &mut self,
        tracking_image: Option<&TrackingImage>,
    ) -> Result<PendingStart, SessionError> {
        let image = match tracking_image {
            Some(image) if image.is_decoded() => image,
            _ => {
                debug!("session start refused: tracking image not decoded");
                return Err(SessionError::ResourceNotReady);
            }
        };

        if !self.device.is_supported(SessionMode::ImmersiveAr) {
            warn!("session start refused: immersive AR not supported");
            return Err(SessionError::SessionUnavailable);
        }

        if self.state.is_busy() {
            match self.config.restart_policy {
                RestartPolicy::Reject => return Err(SessionError::AlreadyActive),
                RestartPolicy::Restart => {
                    info!("restarting spatial session");
                    self.end_with(EndReason::Restart);
                }
            }
        }

        let options =
            SessionOptions::image_tracking(image.clone(), self.config.tracking_image_width_m);
        let pending_session = self
            .device
            .request_session(SessionMode::ImmersiveAr, options);
        let (completion, pending_start) = pending();

        self.request = Some(SessionRequest {
            pending: pending_session,
            completion,
        });
        // Nothing is tracked until this session's frames say so.
        self.store.reset();
        self.state = SessionState::Requesting;
        info!("spatial session requested");
        self.emit(SessionEvent::Requested);

        // The device may already have answered.
        self.poll();
        Ok(pending_start)
    }

    /// Advance pending negotiations. Call once per host tick.
    pub fn poll(&mut self) {
        self.poll_request();
        self.poll_reference_space();
        self.poll_abandoned();
    }

    /// Handle one display-refresh tick.
    pub fn on_frame(&mut self, frame: &DeviceFrame) -> FrameOutcome {
        let Some(active) = self.active.as_mut() else {
            trace!("frame for {} ignored: no active session", frame.session);
            return FrameOutcome::Ignored;
        };
        if frame.session != active.session.id() || active.frame_request != Some(frame.request) {
            trace!("stale frame registration {:?} ignored", frame.request);
            return FrameOutcome::Ignored;
        }

        // Re-arm the pump before any work so an extraction miss cannot stop it.
        active.frame_request = Some(active.session.request_frame_callback());

        let Some(space) = active.reference_space else {
            return FrameOutcome::AwaitingReferenceSpace;
        };

        let mut published = None;
        for result in &frame.image_results {
            if result.status != ImageTrackingStatus::Tracked {
                continue;
            }
            let Some(pose) = result.pose.map(|p| space.relative(&p)) else {
                continue;
            };
            if !pose.is_finite() {
                continue;
            }
            self.store.update(TrackingUpdate::pose(&pose));
            published = Some(pose);
        }

        match published {
            Some(pose) => FrameOutcome::Published(pose),
            None => {
                if self.store.snapshot().is_tracking {
                    self.store.update(TrackingUpdate::lost());
                }
                FrameOutcome::Miss
            }
        }
    }

    /// End the session (or cancel a pending request). Safe in any state.
    pub fn end(&mut self) {
        self.end_with(EndReason::User);
    }

    /// Device-initiated end event for `session`.
    pub fn on_session_end(&mut self, session: SessionId) {
        let listening = self
            .active
            .as_ref()
            .is_some_and(|a| a.session.id() == session && a.end_listener.is_some());
        if listening {
            info!("device ended session {}", session);
            self.teardown(EndReason::DeviceEnded);
        } else {
            trace!("end event for {} ignored", session);
        }
    }

    /// Hidden surfaces make the device session unreliable: end it.
    pub fn on_visibility_change(&mut self, visibility: Visibility) {
        if visibility == Visibility::Hidden && self.state.is_busy() {
            info!("surface hidden while {}, ending session", self.state);
            self.end_with(EndReason::Hidden);
        }
    }

    /// Returns true if a session or request was torn down.
    fn end_with(&mut self, reason: EndReason) -> bool {
        if let Some(request) = self.request.take() {
            info!("cancelling pending session request ({:?})", reason);
            request.completion.reject(SessionError::Cancelled);
            self.abandoned.push(request.pending);
            self.state = SessionState::Idle;
            self.store.reset();
            self.emit(SessionEvent::Ended {
                session: None,
                reason,
            });
            self.poll_abandoned();
            return true;
        }

        if self.active.is_some() {
            self.teardown(reason);
            return true;
        }

        self.state = SessionState::Idle;
        if self.store.snapshot().is_tracking {
            self.store.reset();
        }
        false
    }

    fn teardown(&mut self, reason: EndReason) {
        let Some(mut active) = self.active.take() else {
            return;
        };
        self.state = SessionState::Ending;
        let id = active.session.id();

        // Listener first, so our own end() cannot re-enter teardown.
        if let Some(listener) = active.end_listener.take() {
            active.session.remove_end_listener(listener);
        }
        if let Some(request) = active.frame_request.take() {
            active.session.cancel_frame_callback(request);
        }
        if reason != EndReason::DeviceEnded {
            active.session.end();
        }
        if let Some(completion) = active.completion.take() {
            completion.reject(SessionError::Cancelled);
        }
        drop(active);

        self.store.reset();
        self.state = SessionState::Idle;
        info!("spatial session {} ended ({:?})", id, reason);
        self.emit(SessionEvent::Ended {
            session: Some(id),
            reason,
        });
    }

    fn poll_request(&mut self) {
        let Some(request) = self.request.take() else {
            return;
        };
        match request.pending.poll() {
            Outcome::Waiting => self.request = Some(request),
            Outcome::Settled(Ok(session)) => self.activate(session, request.completion),
            Outcome::Settled(Err(e)) => self.fail_request(request.completion, e.into()),
            Outcome::Abandoned => self.fail_request(request.completion, DeviceError::Dropped.into()),
        }
    }

    fn activate(&mut self, mut session: Box<dyn SpatialSession>, completion: Resolver<(), SessionError>) {
        let id = session.id();
        let end_listener = session.add_end_listener();
        let pending_space = session.request_reference_space(self.config.reference_space);
        let frame_request = session.request_frame_callback();

        self.active = Some(ActiveSession {
            session,
            reference_space: None,
            pending_space: Some(pending_space),
            end_listener: Some(end_listener),
            frame_request: Some(frame_request),
            completion: Some(completion),
        });
        self.state = SessionState::Active;
        info!("spatial session {} active", id);
        self.emit(SessionEvent::Started { session: id });

        self.poll_reference_space();
    }

    fn poll_reference_space(&mut self) {
        let Some(pending) = self.active.as_mut().and_then(|a| a.pending_space.take()) else {
            return;
        };
        match pending.poll() {
            Outcome::Waiting => {
                if let Some(active) = self.active.as_mut() {
                    active.pending_space = Some(pending);
                }
            }
            Outcome::Settled(Ok(space)) => self.on_reference_space(space),
            Outcome::Settled(Err(e)) => self.fail_active(e.into()),
            Outcome::Abandoned => self.fail_active(DeviceError::Dropped.into()),
        }
    }

    fn on_reference_space(&mut self, space: ReferenceSpace) {
        let Some(active) = self.active.as_mut() else {
            return;
        };
        active.reference_space = Some(space);
        let id = active.session.id();
        if let Some(completion) = active.completion.take() {
            completion.resolve(());
        }
        debug!("reference space {:?} ready for {}", space.kind, id);
        self.emit(SessionEvent::Ready { session: id });
    }

    fn fail_request(&mut self, completion: Resolver<(), SessionError>, error: SessionError) {
        warn!("spatial session request failed: {}", error);
        self.state = SessionState::Idle;
        completion.reject(error.clone());
        self.emit(SessionEvent::Failed(error));
    }

    /// Negotiation failed after the session was granted: clean up partial state.
    fn fail_active(&mut self, error: SessionError) {
        warn!("reference space negotiation failed: {}", error);
        let completion = self.active.as_mut().and_then(|a| a.completion.take());
        self.teardown(EndReason::NegotiationFailed);
        if let Some(completion) = completion {
            completion.reject(error.clone());
        }
        self.emit(SessionEvent::Failed(error));
    }

    fn poll_abandoned(&mut self) {
        self.abandoned.retain(|pending| match pending.poll() {
            Outcome::Waiting => true,
            Outcome::Settled(Ok(mut session)) => {
                info!("ending late session {} from cancelled request", session.id());
                session.end();
                false
            }
            Outcome::Settled(Err(_)) | Outcome::Abandoned => false,
        });
    }

    fn emit(&mut self, event: SessionEvent) {
        self.subscribers
            .retain(|tx| tx.send(event.clone()).is_ok());
    }
}

impl<D: SpatialDevice> Drop for SessionLifecycleManager<D> {
    fn drop(&mut self) {
        self.end_with(EndReason::User);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::device::ImageTrackingResult;
    use crate::sim::{Negotiation, SimDevice};
    use approx::assert_relative_eq;
    use nalgebra::{UnitQuaternion, Vector3};

    fn image() -> TrackingImage {
        TrackingImage::new(2, 2, vec![255u8; 16])
    }

    fn manager(device: SimDevice) -> (SessionLifecycleManager<SimDevice>, TrackingStore) {
        let store = TrackingStore::new();
        let manager = SessionLifecycleManager::new(device, store.clone(), SessionConfig::default());
        (manager, store)
    }

    fn tracked(position: Vector3<f64>) -> ImageTrackingResult {
        ImageTrackingResult {
            index: 0,
            status: ImageTrackingStatus::Tracked,
            pose: Some(Pose::new(position, UnitQuaternion::identity())),
            measured_width_m: 0.2,
        }
    }

    #[test]
    fn test_start_without_image_is_not_ready() {
        let (mut mgr, _store) = manager(SimDevice::new());
        assert_eq!(mgr.start(None).err(), Some(SessionError::ResourceNotReady));
        assert_eq!(mgr.state(), SessionState::Idle);
        assert!(mgr.device().sessions().is_empty());
    }

    #[test]
    fn test_start_with_undecoded_image_is_not_ready() {
        let (mut mgr, _store) = manager(SimDevice::new());
        let undecoded = TrackingImage::undecoded(64, 64);
        assert_eq!(
            mgr.start(Some(&undecoded)).err(),
            Some(SessionError::ResourceNotReady)
        );
    }

    #[test]
    fn test_start_unsupported() {
        let (mut mgr, _store) = manager(SimDevice::new().with_support(false));
        assert_eq!(
            mgr.start(Some(&image())).err(),
            Some(SessionError::SessionUnavailable)
        );
        assert_eq!(mgr.state(), SessionState::Idle);
    }

    #[test]
    fn test_start_immediate_becomes_active() {
        let (mut mgr, _store) = manager(SimDevice::new());
        let started = mgr.start(Some(&image())).unwrap();

        assert_eq!(mgr.state(), SessionState::Active);
        assert!(mgr.reference_space().is_some());
        assert_eq!(started.poll().settled(), Some(Ok(())));

        let record = &mgr.device().sessions()[0];
        assert_eq!(record.options.tracked_images.len(), 1);
        assert_relative_eq!(record.options.tracked_images[0].width_m, 0.2);
        assert_eq!(record.live_frame_requests.len(), 1);
        assert_eq!(record.end_listeners.len(), 1);
    }

    #[test]
    fn test_second_start_is_rejected() {
        let (mut mgr, _store) = manager(SimDevice::new());
        mgr.start(Some(&image())).unwrap();
        assert_eq!(
            mgr.start(Some(&image())).err(),
            Some(SessionError::AlreadyActive)
        );
        assert_eq!(mgr.device().sessions().len(), 1);
        assert_eq!(mgr.device().live_frame_requests(), 1);
    }

    #[test]
    fn test_frame_publishes_pose() {
        let device = SimDevice::new();
        let (mut mgr, store) = manager(device.clone());
        mgr.start(Some(&image())).unwrap();

        let frame = device.frame(vec![tracked(Vector3::new(0.1, 0.2, 0.3))]).unwrap();
        let outcome = mgr.on_frame(&frame);

        assert!(matches!(outcome, FrameOutcome::Published(_)));
        let state = store.snapshot();
        assert!(state.is_tracking);
        assert_relative_eq!(state.position, Vector3::new(0.1, 0.2, 0.3), epsilon = 1e-12);
        // pump re-armed
        assert_eq!(device.live_frame_requests(), 1);
    }

    #[test]
    fn test_frame_before_reference_space_is_skipped() {
        let device =
            SimDevice::new().with_reference_space_negotiation(Negotiation::Deferred);
        let (mut mgr, store) = manager(device.clone());
        let started = mgr.start(Some(&image())).unwrap();
        assert!(started.poll().is_waiting());

        let frame = device.frame(vec![tracked(Vector3::new(1.0, 0.0, 0.0))]).unwrap();
        assert_eq!(mgr.on_frame(&frame), FrameOutcome::AwaitingReferenceSpace);
        assert!(!store.snapshot().is_tracking);
        assert_eq!(device.live_frame_requests(), 1);

        assert!(device.resolve_reference_space());
        mgr.poll();
        assert_eq!(started.poll().settled(), Some(Ok(())));

        let frame = device.frame(vec![tracked(Vector3::new(1.0, 0.0, 0.0))]).unwrap();
        assert!(matches!(mgr.on_frame(&frame), FrameOutcome::Published(_)));
    }

    #[test]
    fn test_emulated_and_unresolved_results_are_misses() {
        let device = SimDevice::new();
        let (mut mgr, store) = manager(device.clone());
        mgr.start(Some(&image())).unwrap();

        let frame = device.frame(vec![tracked(Vector3::new(0.0, 0.0, -1.0))]).unwrap();
        mgr.on_frame(&frame);
        assert!(store.snapshot().is_tracking);

        let mut emulated = tracked(Vector3::new(5.0, 5.0, 5.0));
        emulated.status = ImageTrackingStatus::Emulated;
        let mut unresolved = tracked(Vector3::zeros());
        unresolved.pose = None;
        let frame = device.frame(vec![emulated, unresolved]).unwrap();

        assert_eq!(mgr.on_frame(&frame), FrameOutcome::Miss);
        let state = store.snapshot();
        assert!(!state.is_tracking);
        assert_relative_eq!(state.position, Vector3::new(0.0, 0.0, -1.0));
    }

    #[test]
    fn test_non_finite_pose_not_published() {
        let device = SimDevice::new();
        let (mut mgr, store) = manager(device.clone());
        mgr.start(Some(&image())).unwrap();

        let frame = device
            .frame(vec![tracked(Vector3::new(f64::NAN, 0.0, 0.0))])
            .unwrap();
        assert_eq!(mgr.on_frame(&frame), FrameOutcome::Miss);
        assert!(store.snapshot().position.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_stale_frame_is_ignored() {
        let device = SimDevice::new();
        let (mut mgr, store) = manager(device.clone());
        mgr.start(Some(&image())).unwrap();

        let frame = device.frame(vec![tracked(Vector3::x())]).unwrap();
        mgr.on_frame(&frame);
        store.reset();

        // replaying the consumed registration must not write again
        assert_eq!(mgr.on_frame(&frame), FrameOutcome::Ignored);
        assert!(!store.snapshot().is_tracking);
        assert_eq!(device.live_frame_requests(), 1);
    }

    #[test]
    fn test_end_is_idempotent() {
        let device = SimDevice::new();
        let (mut mgr, store) = manager(device.clone());
        let events = mgr.events();
        mgr.start(Some(&image())).unwrap();
        let frame = device.frame(vec![tracked(Vector3::x())]).unwrap();
        mgr.on_frame(&frame);

        for _ in 0..3 {
            mgr.end();
            assert_eq!(mgr.state(), SessionState::Idle);
            assert!(!store.snapshot().is_tracking);
        }

        let record = &device.sessions()[0];
        assert!(record.ended);
        assert_eq!(record.end_calls, 1);
        assert!(record.end_listeners.is_empty());
        assert!(record.live_frame_requests.is_empty());

        let ended = events
            .try_iter()
            .filter(|e| matches!(e, SessionEvent::Ended { .. }))
            .count();
        assert_eq!(ended, 1);
    }

    #[test]
    fn test_end_in_idle_is_safe() {
        let (mut mgr, store) = manager(SimDevice::new());
        mgr.end();
        mgr.end();
        assert_eq!(mgr.state(), SessionState::Idle);
        assert!(!store.snapshot().is_tracking);
    }

    #[test]
    fn test_device_end_event_runs_teardown_once() {
        let device = SimDevice::new();
        let (mut mgr, store) = manager(device.clone());
        let events = mgr.events();
        mgr.start(Some(&image())).unwrap();
        let frame = device.frame(vec![tracked(Vector3::x())]).unwrap();
        mgr.on_frame(&frame);

        let id = device.fire_end_event().unwrap();
        mgr.on_session_end(id);
        mgr.on_session_end(id);

        assert_eq!(mgr.state(), SessionState::Idle);
        assert!(!store.snapshot().is_tracking);
        // the device already ended the session; we must not end it again
        assert_eq!(device.sessions()[0].end_calls, 0);

        let reasons: Vec<_> = events
            .try_iter()
            .filter_map(|e| match e {
                SessionEvent::Ended { reason, .. } => Some(reason),
                _ => None,
            })
            .collect();
        assert_eq!(reasons, vec![EndReason::DeviceEnded]);
    }

    #[test]
    fn test_hidden_surface_ends_session() {
        let device = SimDevice::new();
        let (mut mgr, store) = manager(device.clone());
        let events = mgr.events();
        mgr.start(Some(&image())).unwrap();
        let frame = device.frame(vec![tracked(Vector3::x())]).unwrap();
        mgr.on_frame(&frame);

        mgr.on_visibility_change(Visibility::Hidden);
        mgr.on_visibility_change(Visibility::Hidden);
        mgr.on_visibility_change(Visibility::Visible);

        assert_eq!(mgr.state(), SessionState::Idle);
        assert!(!store.snapshot().is_tracking);
        let ended: Vec<_> = events
            .try_iter()
            .filter(|e| matches!(e, SessionEvent::Ended { .. }))
            .collect();
        assert_eq!(
            ended,
            vec![SessionEvent::Ended {
                session: Some(SessionId(0)),
                reason: EndReason::Hidden
            }]
        );
    }

    #[test]
    fn test_request_rejection_is_negotiation_failure() {
        let device = SimDevice::new()
            .with_session_negotiation(Negotiation::Fail(DeviceError::PermissionDenied));
        let (mut mgr, _store) = manager(device);
        let started = mgr.start(Some(&image())).unwrap();

        assert_eq!(mgr.state(), SessionState::Idle);
        assert_eq!(
            started.poll().settled(),
            Some(Err(SessionError::NegotiationFailed(
                "permission denied".to_string()
            )))
        );
    }

    #[test]
    fn test_reference_space_failure_cleans_up() {
        let device = SimDevice::new().with_reference_space_negotiation(Negotiation::Fail(
            DeviceError::NotSupported("local".into()),
        ));
        let (mut mgr, store) = manager(device.clone());
        let started = mgr.start(Some(&image())).unwrap();

        assert_eq!(mgr.state(), SessionState::Idle);
        assert!(!store.snapshot().is_tracking);
        assert!(matches!(
            started.poll().settled(),
            Some(Err(SessionError::NegotiationFailed(_)))
        ));
        let record = &device.sessions()[0];
        assert!(record.ended);
        assert!(record.live_frame_requests.is_empty());
    }

    #[test]
    fn test_end_while_requesting_tears_down_late_session() {
        let device = SimDevice::new().with_session_negotiation(Negotiation::Deferred);
        let (mut mgr, _store) = manager(device.clone());
        let started = mgr.start(Some(&image())).unwrap();
        assert_eq!(mgr.state(), SessionState::Requesting);

        mgr.end();
        assert_eq!(mgr.state(), SessionState::Idle);
        assert_eq!(started.poll().settled(), Some(Err(SessionError::Cancelled)));
        assert_eq!(mgr.abandoned_requests(), 1);

        let late = device.resolve_session().unwrap();
        mgr.poll();

        assert_eq!(mgr.state(), SessionState::Idle);
        assert_eq!(mgr.abandoned_requests(), 0);
        let record = device.session(late).unwrap();
        assert!(record.ended);
        assert_eq!(device.live_frame_requests(), 0);
    }

    #[test]
    fn test_restart_policy_replaces_session() {
        let device = SimDevice::new();
        let store = TrackingStore::new();
        let config = SessionConfig {
            restart_policy: RestartPolicy::Restart,
            ..SessionConfig::default()
        };
        let mut mgr = SessionLifecycleManager::new(device.clone(), store, config);

        mgr.start(Some(&image())).unwrap();
        let first = mgr.session_id().unwrap();
        mgr.start(Some(&image())).unwrap();
        let second = mgr.session_id().unwrap();

        assert_ne!(first, second);
        assert!(device.session(first).unwrap().ended);
        assert_eq!(device.live_frame_requests(), 1);
    }

    #[test]
    fn test_start_clears_prior_tracking() {
        let device = SimDevice::new().with_session_negotiation(Negotiation::Deferred);
        let (mut mgr, store) = manager(device);
        store.update(TrackingUpdate::pose(&Pose::new(
            Vector3::new(0.0, 0.0, -0.5),
            UnitQuaternion::identity(),
        )));

        mgr.start(Some(&image())).unwrap();
        assert_eq!(mgr.state(), SessionState::Requesting);
        let state = store.snapshot();
        assert!(!state.is_tracking);
        assert_eq!(state.position, Vector3::zeros());
    }

    #[test]
    fn test_drop_ends_session() {
        let device = SimDevice::new();
        {
            let (mut mgr, _store) = manager(device.clone());
            mgr.start(Some(&image())).unwrap();
        }
        assert!(device.sessions()[0].ended);
    }
}
