// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session lifecycle: token freshness, the shared single-flight refresh,
//! and the cancellable periodic refresh cycle.
//!
//! One [`SessionManager`] is constructed at startup and shared by `Arc`.
//! Every refresh in the process (timer tick, silent login check, or a
//! gateway request that hit a 401) funnels through the same single-flight
//! gate, so at most one refresh network call is ever in flight.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::ClientConfig;
use crate::jwt;
use crate::store::{TokenPair, TokenStore};

/// Events broadcast by the session manager.
///
/// The presentation layer subscribes and reacts; the core never renders
/// dialogs or navigates. [`SessionEvent::Expired`] is the single
/// user-facing auth-failure signal (alert + redirect to login).
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// A refresh produced a fresh access token.
    Refreshed,
    /// A refresh attempt failed. Background paths log and move on.
    RefreshFailed { error: String },
    /// The session is unrecoverable; the user must log in again.
    Expired,
}

/// Outcome of a refresh episode, observed by every caller that joined it.
/// Success carries the new access token.
pub type RefreshOutcome = Result<String, RefreshError>;

/// Why a refresh did not produce a token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshError {
    /// No refresh token in storage; no network call was made.
    MissingCredentials,
    /// The server rejected the refresh token; both tokens were deleted.
    Rejected { status: u16 },
    /// Timeout or network error on every attempt; tokens were preserved.
    Transient { message: String },
}

impl std::fmt::Display for RefreshError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingCredentials => f.write_str("no refresh token stored"),
            Self::Rejected { status } => write!(f, "refresh token rejected (HTTP {status})"),
            Self::Transient { message } => write!(f, "transient refresh failure: {message}"),
        }
    }
}

impl std::error::Error for RefreshError {}

/// Request body for the refresh endpoint.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RefreshRequest<'a> {
    refresh_token: &'a str,
}

/// Success body from the refresh endpoint. The refresh token is not rotated.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RefreshResponse {
    access_token: String,
}

/// Owns the credential pair and keeps the access token fresh.
pub struct SessionManager {
    config: ClientConfig,
    store: TokenStore,
    http: reqwest::Client,
    event_tx: broadcast::Sender<SessionEvent>,
    /// Single-flight gate: `Some` while a refresh episode is in flight.
    /// Concurrent callers subscribe to the episode's outcome instead of
    /// issuing a second network call.
    gate: tokio::sync::Mutex<Option<broadcast::Sender<RefreshOutcome>>>,
    /// Handle for the periodic refresh task; `Some` while running.
    cycle: std::sync::Mutex<Option<CancellationToken>>,
    /// Set once logout begins; suppresses ticks racing with teardown.
    logging_out: AtomicBool,
}

impl SessionManager {
    /// Create the manager and the event stream the presentation layer
    /// subscribes to.
    pub fn new(config: ClientConfig) -> (Arc<Self>, broadcast::Receiver<SessionEvent>) {
        let store = TokenStore::new(&config.state_path());
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .unwrap_or_default();
        let (event_tx, event_rx) = broadcast::channel(16);

        (
            Arc::new(Self {
                config,
                store,
                http,
                event_tx,
                gate: tokio::sync::Mutex::new(None),
                cycle: std::sync::Mutex::new(None),
                logging_out: AtomicBool::new(false),
            }),
            event_rx,
        )
    }

    /// Subscribe to session events.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.event_tx.subscribe()
    }

    /// Store a freshly issued credential pair (login or registration) and
    /// emit [`SessionEvent::Refreshed`]. Resets the logging-out flag so a
    /// new session can begin after a logout.
    pub fn seed(&self, pair: &TokenPair) -> anyhow::Result<()> {
        self.store.save(pair)?;
        self.logging_out.store(false, Ordering::Relaxed);
        let _ = self.event_tx.send(SessionEvent::Refreshed);
        info!("session credentials stored");
        Ok(())
    }

    /// Current access token, if any. No side effects, no network.
    pub fn get_token(&self) -> Option<String> {
        self.store.access_token()
    }

    /// Begin the periodic refresh cycle. Idempotent: a running cycle is
    /// left in place. Always resets the logging-out flag so a session
    /// started after a logout refreshes again.
    pub fn start(self: &Arc<Self>) {
        self.logging_out.store(false, Ordering::Relaxed);

        let mut cycle = self.cycle.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(token) = cycle.as_ref() {
            if !token.is_cancelled() {
                debug!("refresh cycle already running");
                return;
            }
        }
        let cancel = CancellationToken::new();
        *cycle = Some(cancel.clone());
        drop(cycle);

        let manager = Arc::clone(self);
        tokio::spawn(async move {
            manager.run_cycle(cancel).await;
        });
    }

    /// Cancel the periodic refresh cycle. Idempotent.
    pub fn stop(&self) {
        let mut cycle = self.cycle.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(token) = cycle.take() {
            token.cancel();
        }
    }

    /// Tear down the session: suppress in-flight ticks, delete both
    /// tokens, stop the periodic cycle. Must be called before navigating
    /// away from any authenticated surface.
    pub fn clear_tokens(&self) {
        self.logging_out.store(true, Ordering::Relaxed);
        self.store.clear();
        self.stop();
        info!("session cleared");
    }

    /// Periodic refresh task: one tick per interval until cancelled.
    async fn run_cycle(self: Arc<Self>, cancel: CancellationToken) {
        info!(interval_secs = self.config.refresh_interval_secs, "refresh cycle started");
        loop {
            tokio::select! {
                _ = tokio::time::sleep(self.config.refresh_interval()) => {}
                _ = cancel.cancelled() => {
                    debug!("refresh cycle stopped");
                    return;
                }
            }

            if self.logging_out.load(Ordering::Relaxed) {
                debug!("logout in progress, skipping scheduled refresh");
                continue;
            }

            // Background failures never alert. The session is declared
            // dead only once nothing is left to retry with.
            if let Err(e) = self.refresh_if_needed().await {
                warn!("scheduled refresh failed: {e}");
                if self.store.load().is_none() {
                    let _ = self.event_tx.send(SessionEvent::Expired);
                }
            }
        }
    }

    /// Refresh the access token using the stored refresh token.
    ///
    /// Single-flight: if an episode is already in flight, this call joins
    /// it and observes the same outcome instead of issuing a second
    /// network request. The episode itself runs on a detached task, so a
    /// caller cancelled mid-wait (e.g. the bounded login check) never
    /// strands the gate.
    pub async fn refresh_if_needed(self: &Arc<Self>) -> RefreshOutcome {
        let mut rx = {
            let mut gate = self.gate.lock().await;
            match gate.as_ref() {
                Some(tx) => {
                    debug!("joining in-flight refresh episode");
                    tx.subscribe()
                }
                None => {
                    let (tx, rx) = broadcast::channel(1);
                    *gate = Some(tx);
                    let manager = Arc::clone(self);
                    tokio::spawn(async move {
                        manager.run_episode().await;
                    });
                    rx
                }
            }
        };

        match rx.recv().await {
            Ok(outcome) => outcome,
            Err(_) => Err(RefreshError::Transient { message: "refresh episode interrupted".to_owned() }),
        }
    }

    /// Drive one refresh episode to completion and release every waiter
    /// with its outcome.
    async fn run_episode(&self) {
        let outcome = self.do_refresh().await;

        match &outcome {
            Ok(_) => {
                let _ = self.event_tx.send(SessionEvent::Refreshed);
            }
            Err(e) => {
                let _ = self.event_tx.send(SessionEvent::RefreshFailed { error: e.to_string() });
            }
        }

        let mut gate = self.gate.lock().await;
        if let Some(tx) = gate.take() {
            let _ = tx.send(outcome);
        }
    }

    /// One refresh network call with bounded retries.
    ///
    /// An explicit rejection (non-2xx) deletes both tokens and stops
    /// retrying; the refresh token is gone for good. Timeouts and
    /// connection errors retry up to the configured bound and leave the
    /// stored tokens untouched.
    async fn do_refresh(&self) -> RefreshOutcome {
        let Some(refresh_token) = self.store.refresh_token() else {
            debug!("no refresh token stored, nothing to refresh");
            return Err(RefreshError::MissingCredentials);
        };

        let url = format!("{}/users/refresh", self.config.base_url.trim_end_matches('/'));
        let attempts = self.config.refresh_attempts.max(1);
        let mut last_error = String::new();

        for attempt in 1..=attempts {
            let result = self
                .http
                .post(&url)
                .json(&RefreshRequest { refresh_token: &refresh_token })
                .timeout(self.config.refresh_timeout())
                .send()
                .await;

            match result {
                Ok(resp) if resp.status().is_success() => match resp.json::<RefreshResponse>().await {
                    Ok(body) => {
                        if let Err(e) = self.store.set_access_token(&body.access_token) {
                            warn!("failed to persist refreshed access token: {e}");
                        }
                        info!("access token refreshed");
                        return Ok(body.access_token);
                    }
                    Err(e) => {
                        last_error = format!("malformed refresh response: {e}");
                    }
                },
                Ok(resp) => {
                    let status = resp.status().as_u16();
                    warn!(status, "refresh token rejected, clearing session");
                    self.store.clear();
                    return Err(RefreshError::Rejected { status });
                }
                Err(e) => {
                    last_error = e.to_string();
                }
            }

            if attempt < attempts {
                let backoff = self.config.refresh_backoff() * attempt;
                debug!(attempt, "refresh attempt failed, retrying in {backoff:?}: {last_error}");
                tokio::time::sleep(backoff).await;
            }
        }

        warn!(attempts, "refresh failed: {last_error}");
        Err(RefreshError::Transient { message: last_error })
    }

    /// Whether a usable session exists.
    ///
    /// Decodes the access token's `exp` claim without verification, as
    /// an optimistic hint only; the server stays authoritative. An expired
    /// token triggers one refresh bounded by the login-check timeout. A
    /// malformed token means no session. Never alerts; safe for passive
    /// checks.
    pub async fn is_logged_in(self: &Arc<Self>) -> bool {
        let Some(pair) = self.store.load() else {
            return false;
        };

        match jwt::decode_expiry(&pair.access_token) {
            None => {
                debug!("stored access token is malformed");
                false
            }
            Some(exp) if exp > epoch_secs() => true,
            Some(_) => {
                match tokio::time::timeout(
                    self.config.login_check_timeout(),
                    self.refresh_if_needed(),
                )
                .await
                {
                    Ok(Ok(_)) => true,
                    Ok(Err(e)) => {
                        debug!("login-check refresh failed: {e}");
                        false
                    }
                    Err(_) => {
                        debug!("login-check refresh timed out");
                        false
                    }
                }
            }
        }
    }

    /// App-launch hook: if a session exists, fire a non-blocking refresh
    /// and begin the periodic cycle. Errors are logged, never surfaced.
    pub fn refresh_on_start(self: &Arc<Self>) {
        if self.store.load().is_none() {
            debug!("no stored session on start");
            return;
        }
        self.start();
        let manager = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(e) = manager.refresh_if_needed().await {
                warn!("startup refresh failed: {e}");
            }
        });
    }

    /// Foreground-resume hook: fire a non-blocking refresh. Failures are
    /// logged only; the next authenticated request retries the flow.
    pub fn refresh_on_resume(self: &Arc<Self>) {
        let manager = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(e) = manager.refresh_if_needed().await {
                warn!("resume refresh failed: {e}");
            }
        });
    }

    /// Emit the terminal `Expired` signal. Used by the gateway when a
    /// request-triggered refresh cannot recover the session.
    pub(crate) fn notify_expired(&self) {
        let _ = self.event_tx.send(SessionEvent::Expired);
    }
}

fn epoch_secs() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs()
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
