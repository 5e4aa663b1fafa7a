//! One-shot pending values for asynchronous device negotiation.
//!
//! A device answers a request through a [`Resolver`]; the requester holds the
//! matching [`Pending`] and checks it cooperatively with [`Pending::poll`]
//! (or blocks with [`Pending::wait`] when it owns its own thread). Both ends
//! are `Send`, so a device backend may resolve from a callback thread.

use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TryRecvError};

use crate::error::{DeviceError, SessionError};

/// Receiving end of a one-shot asynchronous result.
pub struct Pending<T, E = DeviceError> {
    rx: Receiver<Result<T, E>>,
}

/// Sending end of a one-shot asynchronous result.
pub struct Resolver<T, E = DeviceError> {
    tx: Sender<Result<T, E>>,
}

/// State of a [`Pending`] value at the time it was checked.
#[derive(Debug)]
pub enum Outcome<T, E> {
    Settled(Result<T, E>),
    Waiting,
    /// The resolver was dropped without answering.
    Abandoned,
}

/// Completion of [`SessionLifecycleManager::start`](super::SessionLifecycleManager::start).
pub type PendingStart = Pending<(), SessionError>;

/// Create a linked resolver/pending pair.
pub fn pending<T, E>() -> (Resolver<T, E>, Pending<T, E>) {
    let (tx, rx) = bounded(1);
    (Resolver { tx }, Pending { rx })
}

impl<T, E> Pending<T, E> {
    /// Already-resolved value.
    pub fn ready(value: T) -> Self {
        let (resolver, pending) = pending();
        resolver.resolve(value);
        pending
    }

    /// Already-rejected value.
    pub fn failed(error: E) -> Self {
        let (resolver, pending) = pending();
        resolver.reject(error);
        pending
    }

    /// Non-blocking check. A settled value is consumed: later calls report `Abandoned`.
    pub fn poll(&self) -> Outcome<T, E> {
        match self.rx.try_recv() {
            Ok(result) => Outcome::Settled(result),
            Err(TryRecvError::Empty) => Outcome::Waiting,
            Err(TryRecvError::Disconnected) => Outcome::Abandoned,
        }
    }

    /// Block up to `timeout` for the value.
    pub fn wait(&self, timeout: Duration) -> Outcome<T, E> {
        match self.rx.recv_timeout(timeout) {
            Ok(result) => Outcome::Settled(result),
            Err(RecvTimeoutError::Timeout) => Outcome::Waiting,
            Err(RecvTimeoutError::Disconnected) => Outcome::Abandoned,
        }
    }
}

impl<T, E> Resolver<T, E> {
    pub fn resolve(self, value: T) {
        // The requester may have given up; nothing to do then.
        let _ = self.tx.send(Ok(value));
    }

    pub fn reject(self, error: E) {
        let _ = self.tx.send(Err(error));
    }

    pub fn settle(self, result: Result<T, E>) {
        let _ = self.tx.send(result);
    }
}

impl<T, E> Outcome<T, E> {
    pub fn is_waiting(&self) -> bool {
        matches!(self, Outcome::Waiting)
    }

    /// The settled result, if any.
    pub fn settled(self) -> Option<Result<T, E>> {
        match self {
            Outcome::Settled(result) => Some(result),
            _ => None,
        }
    }
}
