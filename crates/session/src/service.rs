// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session state machine and the injectable service that owns it.
//!
//! The service is the single source of truth for authentication state.
//! Only the negotiator's results and the renewal scheduler write it;
//! everything else reads a snapshot or subscribes to transitions.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, RwLock};
use tokio_util::sync::CancellationToken;

use crate::claims::{self, Identity};
use crate::config::AuthConfig;
use crate::error::AuthError;
use crate::idp::{ConfirmOutcome, SignUpOutcome};
use crate::negotiator::{AuthBrowser, AuthOutcome, Negotiator};
use crate::scheduler;
use crate::store::{self, CredentialSet, CredentialStore};

/// Current session state.
///
/// Identity and credentials are present iff the state is authenticated; a
/// transition replaces the whole value, never one field of it.
#[derive(Debug, Clone)]
pub enum SessionState {
    Unauthenticated,
    Authenticating,
    Authenticated { identity: Identity, credentials: CredentialSet },
    RenewalInFlight { identity: Identity, credentials: CredentialSet },
    /// Sign-in failed. Equivalent to `Unauthenticated` plus the recorded
    /// error for display; an identical retry is always possible.
    Failed { error: AuthError },
}

impl SessionState {
    pub fn status(&self) -> SessionStatus {
        match self {
            Self::Unauthenticated => SessionStatus::Unauthenticated,
            Self::Authenticating => SessionStatus::Authenticating,
            Self::Authenticated { .. } => SessionStatus::Authenticated,
            Self::RenewalInFlight { .. } => SessionStatus::RenewalInFlight,
            Self::Failed { .. } => SessionStatus::Failed,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated { .. } | Self::RenewalInFlight { .. })
    }
}

/// Wire-format session status label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Unauthenticated,
    Authenticating,
    Authenticated,
    RenewalInFlight,
    Failed,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unauthenticated => "unauthenticated",
            Self::Authenticating => "authenticating",
            Self::Authenticated => "authenticated",
            Self::RenewalInFlight => "renewal_in_flight",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Events emitted on every state transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SessionEvent {
    Transition { prev: SessionStatus, next: SessionStatus, seq: u64 },
}

/// The injectable session service.
///
/// Owns the state machine, the negotiator, and the lifecycle of the
/// background renewal task: the task starts whenever the session enters
/// `Authenticated` and is cancelled on any transition out of an
/// authenticated state, and on [`SessionService::shutdown`].
pub struct SessionService {
    negotiator: Negotiator,
    store: Arc<dyn CredentialStore>,
    config: AuthConfig,
    state: RwLock<SessionState>,
    state_seq: AtomicU64,
    event_tx: broadcast::Sender<SessionEvent>,
    renew_cancel: Mutex<Option<CancellationToken>>,
}

impl SessionService {
    pub fn new(config: AuthConfig, store: Arc<dyn CredentialStore>) -> Arc<Self> {
        let (event_tx, _) = broadcast::channel(64);
        Arc::new(Self {
            negotiator: Negotiator::new(config.clone(), Arc::clone(&store)),
            store,
            config,
            state: RwLock::new(SessionState::Unauthenticated),
            state_seq: AtomicU64::new(0),
            event_tx,
            renew_cancel: Mutex::new(None),
        })
    }

    /// Subscribe to transition events.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.event_tx.subscribe()
    }

    /// Clone of the current state.
    pub async fn snapshot(&self) -> SessionState {
        self.state.read().await.clone()
    }

    pub async fn status(&self) -> SessionStatus {
        self.state.read().await.status()
    }

    /// Current valid bearer credential, or `None`.
    ///
    /// Downstream REST callers attach this as `Authorization: Bearer …`.
    /// An expired credential is withheld even while the state is still
    /// authenticated — the scheduler will renew or tear down shortly.
    pub async fn bearer_token(&self) -> Option<String> {
        let state = self.state.read().await;
        let credentials = match &*state {
            SessionState::Authenticated { credentials, .. }
            | SessionState::RenewalInFlight { credentials, .. } => credentials,
            _ => return None,
        };
        let decoded = claims::decode(&credentials.id_token).ok()?;
        (decoded.exp > claims::epoch_secs()).then(|| credentials.id_token.clone())
    }

    /// Reconstitute a persisted session at process start.
    ///
    /// Only an unexpired identity credential restores `Authenticated`; an
    /// expired or undecodable set leaves the session signed out rather
    /// than restoring a stale state.
    pub async fn restore(self: &Arc<Self>) -> Result<SessionStatus, AuthError> {
        let Some(credentials) = store::load_credentials(self.store.as_ref())? else {
            return Ok(SessionStatus::Unauthenticated);
        };
        let decoded = match claims::decode(&credentials.id_token) {
            Ok(decoded) => decoded,
            Err(e) => {
                tracing::warn!(err = %e, "persisted identity credential is undecodable");
                return Ok(SessionStatus::Unauthenticated);
            }
        };
        if decoded.exp <= claims::epoch_secs() {
            tracing::info!("persisted session already expired, not restoring");
            return Ok(SessionStatus::Unauthenticated);
        }

        let identity = Identity::from_claims(&decoded);
        self.transition(SessionState::Authenticated { identity, credentials }).await;
        self.ensure_scheduler();
        Ok(SessionStatus::Authenticated)
    }

    /// Register a new account; session state is unchanged (the account is
    /// unconfirmed).
    pub async fn sign_up(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<SignUpOutcome, AuthError> {
        self.negotiator.sign_up(username, email, password).await
    }

    /// Submit the out-of-band confirmation code; does not authenticate.
    pub async fn confirm_sign_up(
        &self,
        username: &str,
        code: &str,
    ) -> Result<ConfirmOutcome, AuthError> {
        self.negotiator.confirm_sign_up(username, code).await
    }

    /// Interactive sign-in.
    ///
    /// Cancellation returns to `Unauthenticated` with no recorded error;
    /// any other failure lands in `Failed` with the error kept for
    /// display. Re-invoking while already authenticated returns the
    /// current identity without running the protocol.
    pub async fn sign_in<B: AuthBrowser>(self: &Arc<Self>, browser: &B) -> Result<Identity, AuthError> {
        {
            let state = self.state.read().await;
            if let SessionState::Authenticated { identity, .. }
            | SessionState::RenewalInFlight { identity, .. } = &*state
            {
                return Ok(identity.clone());
            }
        }

        self.transition(SessionState::Authenticating).await;

        match self.negotiator.sign_in(browser).await {
            Ok(AuthOutcome { identity, credentials }) => {
                self.transition(SessionState::Authenticated {
                    identity: identity.clone(),
                    credentials,
                })
                .await;
                self.ensure_scheduler();
                Ok(identity)
            }
            Err(AuthError::Cancelled) => {
                self.transition(SessionState::Unauthenticated).await;
                Err(AuthError::Cancelled)
            }
            Err(e) => {
                self.transition(SessionState::Failed { error: e.clone() }).await;
                Err(e)
            }
        }
    }

    /// Silent renewal.
    ///
    /// From `Authenticated` this is the scheduler's path: the prior
    /// identity and credentials are retained as last-known-good while the
    /// exchange is in flight, a transient failure returns to them, and a
    /// terminal failure tears the session down. From a signed-out state
    /// with a surviving refresh credential it re-establishes the session
    /// silently.
    pub async fn renew(self: &Arc<Self>) -> Result<Identity, AuthError> {
        let prior = self.begin_renewal().await;
        if prior.is_none() {
            match self.status().await {
                SessionStatus::RenewalInFlight => {
                    return Err(AuthError::InvalidInput("renewal already in flight".to_owned()));
                }
                SessionStatus::Authenticating => {
                    return Err(AuthError::InvalidInput(
                        "interactive sign-in in progress".to_owned(),
                    ));
                }
                _ => {}
            }
        }

        match self.negotiator.renew().await {
            Ok(AuthOutcome { identity, credentials }) => {
                let next = SessionState::Authenticated {
                    identity: identity.clone(),
                    credentials,
                };
                let applied = if prior.is_some() {
                    self.resolve_renewal(next).await
                } else {
                    self.transition(next).await;
                    true
                };
                if !applied {
                    // A sign-out raced the exchange and wins; the renewed
                    // credentials the negotiator just persisted go too.
                    store::clear_credentials(self.store.as_ref())?;
                    return Err(AuthError::Cancelled);
                }
                self.ensure_scheduler();
                Ok(identity)
            }
            Err(e) if e.forces_sign_out() => {
                tracing::info!(err = %e, "renewal failed terminally, signing out");
                self.stop_scheduler();
                if prior.is_some() {
                    let _ = self.resolve_renewal(SessionState::Unauthenticated).await;
                }
                Err(e)
            }
            Err(e) => {
                // Transient failure: keep the last known good session and
                // let the next scheduled tick retry.
                tracing::warn!(err = %e, "renewal failed, retaining current session");
                if let Some((identity, credentials)) = prior {
                    let _ = self
                        .resolve_renewal(SessionState::Authenticated { identity, credentials })
                        .await;
                }
                Err(e)
            }
        }
    }

    /// Sign out. Local state and storage are cleared even when the
    /// best-effort server-side revocation fails; a sign-out landing while
    /// a renewal is in flight wins over the renewal's result.
    pub async fn sign_out(&self) -> Result<(), AuthError> {
        self.stop_scheduler();
        let result = self.negotiator.sign_out().await;
        self.transition(SessionState::Unauthenticated).await;
        result
    }

    /// Stop the background renewal task at app teardown. In-flight
    /// network calls are not aborted; their results are discarded by the
    /// state check in [`SessionService::renew`].
    pub fn shutdown(&self) {
        self.stop_scheduler();
    }

    /// One scheduled renewal attempt. State-guarded: only an
    /// `Authenticated` session starts an exchange, so a tick that fires
    /// while a renewal is already in flight is a no-op.
    pub(crate) async fn renew_tick(self: &Arc<Self>) {
        if !matches!(self.status().await, SessionStatus::Authenticated) {
            return;
        }
        if let Err(e) = self.renew().await {
            tracing::debug!(err = %e, "scheduled renewal attempt failed");
        }
    }

    pub(crate) fn config(&self) -> &AuthConfig {
        &self.config
    }

    pub(crate) fn store(&self) -> &dyn CredentialStore {
        self.store.as_ref()
    }

    #[cfg(test)]
    pub(crate) fn scheduler_active(&self) -> bool {
        self.renew_cancel.lock().as_ref().is_some_and(|c| !c.is_cancelled())
    }

    /// Atomically enter `RenewalInFlight` from `Authenticated`, returning
    /// the retained last-known-good pair. Any other state refuses.
    async fn begin_renewal(&self) -> Option<(Identity, CredentialSet)> {
        let mut state = self.state.write().await;
        let SessionState::Authenticated { identity, credentials } = &*state else {
            return None;
        };
        let snapshot = (identity.clone(), credentials.clone());
        let prev = state.status();
        *state = SessionState::RenewalInFlight {
            identity: snapshot.0.clone(),
            credentials: snapshot.1.clone(),
        };
        drop(state);
        self.emit(prev, SessionStatus::RenewalInFlight);
        Some(snapshot)
    }

    /// Apply a renewal outcome unless the session changed while the
    /// exchange was in flight — a later sign-out supersedes the result.
    /// Returns whether the outcome was applied.
    async fn resolve_renewal(&self, next: SessionState) -> bool {
        let mut state = self.state.write().await;
        if !matches!(&*state, SessionState::RenewalInFlight { .. }) {
            tracing::debug!("renewal outcome discarded, session changed during exchange");
            return false;
        }
        let prev = state.status();
        let next_status = next.status();
        *state = next;
        drop(state);
        self.emit(prev, next_status);
        true
    }

    async fn transition(&self, next: SessionState) {
        let mut state = self.state.write().await;
        let prev = state.status();
        let next_status = next.status();
        *state = next;
        drop(state);
        self.emit(prev, next_status);
    }

    fn emit(&self, prev: SessionStatus, next: SessionStatus) {
        let seq = self.state_seq.fetch_add(1, Ordering::Relaxed) + 1;
        tracing::debug!(prev = %prev, next = %next, seq, "session transition");
        let _ = self.event_tx.send(SessionEvent::Transition { prev, next, seq });
    }

    fn ensure_scheduler(self: &Arc<Self>) {
        let mut slot = self.renew_cancel.lock();
        if slot.as_ref().is_some_and(|c| !c.is_cancelled()) {
            return;
        }
        let cancel = CancellationToken::new();
        *slot = Some(cancel.clone());
        scheduler::spawn_renewal_task(Arc::clone(self), cancel);
    }

    fn stop_scheduler(&self) {
        if let Some(cancel) = self.renew_cancel.lock().take() {
            cancel.cancel();
        }
    }
}

#[cfg(test)]
#[path = "service_tests.rs"]
mod tests;
