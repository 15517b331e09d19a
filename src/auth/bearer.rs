use super::{Authenticator, GateState, PauseHandle};
use crate::outcome::Outcome;
use crate::request::HttpRequest;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::OnceLock;
use tracing::{info, warn};

/// Bearer-token authenticator
///
/// Injects `Authorization: Bearer <token>` into every request it authorizes.
/// A `401` observed on the response worker pauses the dispatcher and flags
/// that a refresh is needed; the application performs the refresh and calls
/// [`BearerAuthenticator::finish_refresh`] with the new token, which resumes
/// traffic. Requests that were queued in the meantime go out with the new token.
///
/// How the refresh itself is obtained is left to the application.
#[derive(Default)]
pub struct BearerAuthenticator {
    token: RwLock<Option<String>>,
    gate: OnceLock<PauseHandle>,
    refresh_needed: AtomicBool,
}

impl BearerAuthenticator {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: RwLock::new(Some(token.into())),
            ..Self::default()
        }
    }

    /// Authenticator that sends no credential until one is supplied
    pub fn without_token() -> Self {
        Self::default()
    }

    pub fn token(&self) -> Option<String> {
        self.token.read().clone()
    }

    /// True after a `401` was observed and until `finish_refresh` is called
    pub fn needs_refresh(&self) -> bool {
        self.refresh_needed.load(Ordering::Acquire)
    }

    /// State of the attached dispatcher's gate, if any
    pub fn gate_state(&self) -> Option<GateState> {
        self.gate.get().and_then(PauseHandle::state)
    }

    /// Pause outbound traffic ahead of a credential refresh
    pub fn begin_refresh(&self) {
        self.refresh_needed.store(true, Ordering::Release);
        if let Some(gate) = self.gate.get() {
            info!("Credential refresh started - pausing requests");
            gate.pause();
        }
    }

    /// Store the refreshed credential and resume outbound traffic
    pub fn finish_refresh(&self, token: impl Into<String>) {
        *self.token.write() = Some(token.into());
        self.refresh_needed.store(false, Ordering::Release);
        if let Some(gate) = self.gate.get() {
            info!("Credential refresh finished - resuming requests");
            gate.resume();
        }
    }
}

impl Authenticator for BearerAuthenticator {
    fn attach(&self, gate: PauseHandle) {
        if self.gate.set(gate).is_err() {
            warn!("BearerAuthenticator already attached to a dispatcher - ignoring");
        }
    }

    fn authorize(&self, request: &mut HttpRequest) {
        if let Some(token) = self.token.read().as_deref() {
            request.set_header("Authorization", format!("Bearer {token}"));
        }
    }

    fn observe(&self, request: &HttpRequest, outcome: &Outcome) {
        if outcome.status() == Some(401) && !self.needs_refresh() {
            warn!(
                request_id = %request.id(),
                kind = %request.kind(),
                "Credential rejected - pausing requests until refreshed"
            );
            self.begin_refresh();
        }
    }
}
