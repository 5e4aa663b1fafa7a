//! Render bridge: continuous draw loop feeding the external renderer.

pub mod bridge;

pub use bridge::{
    ConfigSource, FrameClock, MeshHandle, RenderBridge, RenderCommand, Renderer, SharedModelConfig,
};
