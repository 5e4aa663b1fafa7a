//! Anchor system: the object the host event loop talks to.
//!
//! Two clocks drive it. While a device session is active, every device frame
//! publishes the tracked pose and renders. Otherwise the animation clock
//! polls negotiations, runs the marker fallback and renders.

use std::time::Instant;

use crossbeam_channel::Receiver;
use tracing::{debug, info};

use crate::compose::Transform;
use crate::config::AnchorConfig;
use crate::error::SessionError;
use crate::marker::{MarkerScanner, ScannerState};
use crate::render::{ConfigSource, FrameClock, MeshHandle, RenderBridge, Renderer};
use crate::session::{
    DeviceFrame, FrameOutcome, PendingStart, SessionEvent, SessionId, SessionLifecycleManager,
    SessionState, SpatialDevice, TrackingImage, Visibility,
};
use crate::tracking::TrackingStore;

pub struct AnchorSystem<D: SpatialDevice, R: Renderer, C: ConfigSource> {
    store: TrackingStore,
    manager: SessionLifecycleManager<D>,

    /// Marker fallback. Only writes the store while no session exists.
    scanner: Option<MarkerScanner>,

    bridge: RenderBridge<R, C>,

    /// Lifecycle events routed to the render bridge.
    events: Receiver<SessionEvent>,

    started_at: Instant,
}

impl<D: SpatialDevice, R: Renderer, C: ConfigSource> AnchorSystem<D, R, C> {
    pub fn new(device: D, renderer: R, model_config: C, config: &AnchorConfig) -> Self {
        let store = TrackingStore::new();
        let mut manager = SessionLifecycleManager::new(device, store.clone(), config.session.clone());
        let events = manager.events();
        let bridge = RenderBridge::new(renderer, model_config, store.clone(), config.compose);

        Self {
            store,
            manager,
            scanner: None,
            bridge,
            events,
            started_at: Instant::now(),
        }
    }

    /// Attach the marker fallback.
    pub fn with_scanner(mut self, scanner: MarkerScanner) -> Self {
        self.scanner = Some(scanner);
        self
    }

    pub fn set_mesh(&mut self, mesh: Option<MeshHandle>) {
        self.bridge.set_mesh(mesh);
    }

    pub fn store(&self) -> &TrackingStore {
        &self.store
    }

    pub fn manager(&self) -> &SessionLifecycleManager<D> {
        &self.manager
    }

    pub fn manager_mut(&mut self) -> &mut SessionLifecycleManager<D> {
        &mut self.manager
    }

    pub fn scanner(&self) -> Option<&MarkerScanner> {
        self.scanner.as_ref()
    }

    pub fn bridge(&self) -> &RenderBridge<R, C> {
        &self.bridge
    }

    pub fn session_state(&self) -> SessionState {
        self.manager.state()
    }

    /// Independent receiver of lifecycle events for the UI layer.
    pub fn events(&mut self) -> Receiver<SessionEvent> {
        self.manager.events()
    }

    /// Start a device session. The marker fallback pauses for its duration.
    pub fn start_session(
        &mut self,
        tracking_image: Option<&TrackingImage>,
    ) -> Result<PendingStart, SessionError> {
        let result = self.manager.start(tracking_image);
        if result.is_ok() {
            self.pause_scanner();
        }
        self.dispatch_events();
        result
    }

    pub fn end_session(&mut self) {
        self.manager.end();
        self.dispatch_events();
    }

    /// Device display refresh: publish the tracked pose, then render.
    pub fn on_device_frame(&mut self, frame: &DeviceFrame) -> FrameOutcome {
        let outcome = self.manager.on_frame(frame);
        if outcome != FrameOutcome::Ignored {
            self.bridge.tick(FrameClock::Device {
                timestamp: frame.timestamp,
            });
        }
        self.dispatch_events();
        outcome
    }

    /// Animation clock tick. Renders only while no session is active.
    pub fn on_animation_tick(&mut self, now: Instant) -> Option<Transform> {
        self.poll();

        if self.manager.state() == SessionState::Idle {
            self.run_scanner(now);
        } else {
            self.pause_scanner();
        }

        if self.manager.is_active() {
            return None;
        }
        let elapsed = now.saturating_duration_since(self.started_at);
        self.bridge.tick(FrameClock::Animation { elapsed })
    }

    pub fn on_visibility_change(&mut self, visibility: Visibility) {
        self.manager.on_visibility_change(visibility);
        self.dispatch_events();
    }

    /// Device-initiated end event.
    pub fn on_session_end(&mut self, session: SessionId) {
        self.manager.on_session_end(session);
        self.dispatch_events();
    }

    /// Advance pending negotiations and route their events.
    pub fn poll(&mut self) {
        self.manager.poll();
        self.dispatch_events();
    }

    /// End any session and stop the marker fallback.
    pub fn shutdown(&mut self) {
        self.manager.end();
        if let Some(scanner) = self.scanner.as_mut() {
            scanner.stop();
        }
        self.dispatch_events();
    }

    fn run_scanner(&mut self, now: Instant) {
        let Some(scanner) = self.scanner.as_mut() else {
            return;
        };
        if scanner.state() == ScannerState::Stopped && scanner.start().is_err() {
            return;
        }
        if let Some(pose) = scanner.tick(now, &self.store) {
            debug!("marker fallback published {:?}", pose.position);
        }
    }

    fn pause_scanner(&mut self) {
        if let Some(scanner) = self.scanner.as_mut() {
            if scanner.state() == ScannerState::Running {
                info!("pausing marker fallback while a session is live");
                scanner.stop();
            }
        }
    }

    fn dispatch_events(&mut self) {
        while let Ok(event) = self.events.try_recv() {
            self.bridge.on_session_event(&event);
        }
    }
}

impl<D: SpatialDevice, R: Renderer, C: ConfigSource> Drop for AnchorSystem<D, R, C> {
    fn drop(&mut self) {
        self.shutdown();
    }
}
