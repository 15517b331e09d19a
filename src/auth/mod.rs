//! # Authentication Module
//!
//! The narrow two-way interface between a [`Dispatcher`](crate::dispatcher::Dispatcher)
//! and whatever component manages credentials.
//!
//! ## Overview
//!
//! - The dispatcher implements the receiving side, [`RequestGate`]
//!   (`pause_requests` / `resume_requests`).
//! - At construction the dispatcher hands its [`Authenticator`] a
//!   [`PauseHandle`], the small `{pause, resume}` capability it may call at any
//!   time, for instance when a credential expired and must be refreshed before
//!   further calls go out.
//! - The authenticator also sees every request just before it is executed
//!   ([`Authenticator::authorize`]) and every response before its completion
//!   runs ([`Authenticator::observe`]).
//!
//! Pausing is cooperative: the execution queue stops starting new requests,
//! requests already running finish normally, and response processing carries on.
//!
//! ## State Machine
//!
//! ```text
//!            pause()                resume()
//! Running  ──────────▶  Paused  ──────────▶  Running
//!    ▲  │ resume(): no-op   │ pause(): no-op
//!    └──┘                   └──▶ Paused
//! ```
//!
//! Initial state is [`GateState::Running`]; there is no terminal state.

mod bearer;

pub use bearer::BearerAuthenticator;

use crate::outcome::Outcome;
use crate::request::HttpRequest;
use std::fmt;
use std::sync::{Arc, Weak};

/// Whether the execution queue is currently starting new requests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GateState {
    Running,
    Paused,
}

impl fmt::Display for GateState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GateState::Running => f.write_str("running"),
            GateState::Paused => f.write_str("paused"),
        }
    }
}

/// Receiving side of pause/resume, implemented by the dispatcher
pub trait RequestGate: Send + Sync {
    /// Stop starting queued requests. Idempotent.
    fn pause_requests(&self);
    /// Start queued requests again. Idempotent.
    fn resume_requests(&self);
    fn gate_state(&self) -> GateState;
}

/// `{pause, resume}` capability handed to an [`Authenticator`]
///
/// Holds only a weak reference, so it never keeps a dispatcher alive. Once the
/// dispatcher is gone every call is a no-op and [`PauseHandle::state`] reports
/// `None`.
#[derive(Clone)]
pub struct PauseHandle {
    gate: Weak<dyn RequestGate>,
}

impl PauseHandle {
    pub fn new(gate: Weak<dyn RequestGate>) -> Self {
        Self { gate }
    }

    /// Capability bound to a gate that is kept alive elsewhere
    pub fn for_gate(gate: &Arc<dyn RequestGate>) -> Self {
        Self {
            gate: Arc::downgrade(gate),
        }
    }

    pub fn pause(&self) {
        if let Some(gate) = self.gate.upgrade() {
            gate.pause_requests();
        }
    }

    pub fn resume(&self) {
        if let Some(gate) = self.gate.upgrade() {
            gate.resume_requests();
        }
    }

    pub fn state(&self) -> Option<GateState> {
        self.gate.upgrade().map(|gate| gate.gate_state())
    }
}

impl fmt::Debug for PauseHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PauseHandle")
            .field("state", &self.state())
            .finish()
    }
}

/// Credential manager observing outbound traffic
///
/// Every method has a no-op default so implementors only override what they need.
pub trait Authenticator: Send + Sync {
    /// Receive the dispatcher's pause capability. Called once, at construction.
    fn attach(&self, _gate: PauseHandle) {}

    /// Adjust a request right before it is executed, e.g. to add credentials.
    ///
    /// Runs on an execution worker after the request has passed the pause gate,
    /// so requests queued during a refresh pick up the new credential.
    fn authorize(&self, _request: &mut HttpRequest) {}

    /// Inspect a success or failure on the response worker, before the
    /// request's completion runs. Not called for cancellations.
    fn observe(&self, _request: &HttpRequest, _outcome: &Outcome) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[derive(Default)]
    struct FlagGate {
        paused: AtomicBool,
    }

    impl RequestGate for FlagGate {
        fn pause_requests(&self) {
            self.paused.store(true, Ordering::SeqCst);
        }
        fn resume_requests(&self) {
            self.paused.store(false, Ordering::SeqCst);
        }
        fn gate_state(&self) -> GateState {
            if self.paused.load(Ordering::SeqCst) {
                GateState::Paused
            } else {
                GateState::Running
            }
        }
    }

    #[test]
    fn test_pause_handle_drives_gate() {
        let gate: Arc<dyn RequestGate> = Arc::new(FlagGate::default());
        let handle = PauseHandle::for_gate(&gate);
        assert_eq!(handle.state(), Some(GateState::Running));

        handle.pause();
        handle.pause();
        assert_eq!(handle.state(), Some(GateState::Paused));

        handle.resume();
        handle.resume();
        assert_eq!(handle.state(), Some(GateState::Running));
    }

    #[test]
    fn test_pause_handle_outliving_gate_is_inert() {
        let gate: Arc<dyn RequestGate> = Arc::new(FlagGate::default());
        let handle = PauseHandle::for_gate(&gate);
        drop(gate);
        handle.pause();
        assert_eq!(handle.state(), None);
    }
}
