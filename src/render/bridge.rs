//! Per-tick hand-off of the composed model transform to the renderer.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tracing::{debug, info};

use crate::compose::{compose, ComposeScales, ModelConfig, Transform};
use crate::session::SessionEvent;
use crate::tracking::TrackingStore;

/// Opaque handle to a loaded mesh owned by the renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MeshHandle(pub u64);

/// Which clock drove this tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FrameClock {
    /// Device display refresh while a session is active.
    Device { timestamp: Duration },
    /// Free-running animation clock otherwise.
    Animation { elapsed: Duration },
}

/// What the renderer receives each tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderCommand {
    pub transform: Transform,
    pub mesh: MeshHandle,
    pub clock: FrameClock,
}

/// External renderer / scene-graph host.
pub trait Renderer {
    fn render(&mut self, command: RenderCommand);

    /// Rebuild the render context after a device session tore it down.
    fn reinitialize(&mut self);
}

/// Read-only view of the UI-owned model configuration.
pub trait ConfigSource {
    fn model_config(&self) -> ModelConfig;
}

/// Model configuration shared with a UI layer that updates it asynchronously.
#[derive(Debug, Clone, Default)]
pub struct SharedModelConfig {
    inner: Arc<RwLock<ModelConfig>>,
}

impl SharedModelConfig {
    pub fn new(config: ModelConfig) -> Self {
        Self {
            inner: Arc::new(RwLock::new(config)),
        }
    }

    pub fn set(&self, config: ModelConfig) {
        *self.inner.write() = config;
    }

    pub fn update(&self, f: impl FnOnce(&mut ModelConfig)) {
        f(&mut self.inner.write());
    }
}

impl ConfigSource for SharedModelConfig {
    fn model_config(&self) -> ModelConfig {
        *self.inner.read()
    }
}

impl ConfigSource for ModelConfig {
    fn model_config(&self) -> ModelConfig {
        *self
    }
}

/// Calls `compose` and hands the result to the renderer. No other logic.
pub struct RenderBridge<R: Renderer, C: ConfigSource> {
    renderer: R,
    config: C,
    store: TrackingStore,
    scales: ComposeScales,
    mesh: Option<MeshHandle>,
    frames_rendered: u64,
}

impl<R: Renderer, C: ConfigSource> RenderBridge<R, C> {
    pub fn new(renderer: R, config: C, store: TrackingStore, scales: ComposeScales) -> Self {
        Self {
            renderer,
            config,
            store,
            scales,
            mesh: None,
            frames_rendered: 0,
        }
    }

    pub fn set_mesh(&mut self, mesh: Option<MeshHandle>) {
        self.mesh = mesh;
    }

    pub fn mesh(&self) -> Option<MeshHandle> {
        self.mesh
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut R {
        &mut self.renderer
    }

    pub fn frames_rendered(&self) -> u64 {
        self.frames_rendered
    }

    /// Transform for the current tick, without rendering.
    pub fn current_transform(&self) -> Transform {
        compose(&self.store.snapshot(), &self.config.model_config(), &self.scales)
    }

    /// Compose and render. Returns `None` (and renders nothing) until a mesh is set.
    pub fn tick(&mut self, clock: FrameClock) -> Option<Transform> {
        let mesh = self.mesh?;
        let transform = self.current_transform();
        self.renderer.render(RenderCommand {
            transform,
            mesh,
            clock,
        });
        self.frames_rendered += 1;
        Some(transform)
    }

    /// React to a lifecycle event. A finished session reinitializes the render context.
    pub fn on_session_event(&mut self, event: &SessionEvent) {
        match event {
            SessionEvent::Ended { session, reason } => {
                info!(
                    "reinitializing render context after session {:?} ended ({:?})",
                    session, reason
                );
                self.renderer.reinitialize();
            }
            other => debug!("render bridge: {:?}", other),
        }
    }
}
