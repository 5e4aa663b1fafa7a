//! Simulated device, camera and detector.
//!
//! Drives the full pipeline without hardware: integration tests and the
//! replay binary use these in place of a real device backend.

pub mod camera;
pub mod device;

pub use camera::{ScriptedDetector, SimCameraFeed};
pub use device::{Negotiation, SessionRecord, SimDevice, SimSession};
