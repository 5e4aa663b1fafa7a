//! Tracked pose state and its broadcast store.
//!
//! - `state`: the tracked pose record and partial updates
//! - `store`: single-writer, many-reader broadcast with scoped subscriptions

pub mod state;
pub mod store;

pub use state::{TrackingState, TrackingUpdate};
pub use store::{ListenerId, Subscription, TrackingStore};
