//! Top-level orchestration.
//!
//! `AnchorSystem` owns the tracking store and wires the session manager,
//! the marker fallback and the render bridge to the host event loop.

mod anchor_system;

pub use anchor_system::AnchorSystem;
