pub mod compose;
pub mod config;
pub mod error;
pub mod geometry;
pub mod marker;
pub mod render;
pub mod session;
pub mod sim;
pub mod system;
pub mod tracking;
