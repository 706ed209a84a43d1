// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Test harness for end-to-end smoke tests.
//!
//! Runs an in-process booking backend and drives either the `chairside`
//! library or the compiled binary against it.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use tokio::net::TcpListener;

/// Fixed test account accepted by the fake backend.
pub const EMAIL: &str = "sam@example.com";
pub const PASSWORD: &str = "hunter2";

/// Install the ring crypto provider for reqwest/rustls. The compiled
/// binary does this in `main`; in-process library tests must do the
/// equivalent before building any `reqwest::Client`, or `build()` panics.
/// Safe to call repeatedly; only the first call has effect.
pub fn ensure_crypto() {
    use std::sync::Once;
    static CRYPTO_INIT: Once = Once::new();
    CRYPTO_INIT.call_once(|| {
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}

const REFRESH_TOKEN: &str = "refresh-token-1";

/// Mint an unsigned JWT-shaped access token with a 1h expiry.
fn mint_access(n: u32) -> String {
    let exp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
        + 3600;
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none"}"#);
    let payload = URL_SAFE_NO_PAD.encode(format!(r#"{{"exp":{exp},"n":{n}}}"#).as_bytes());
    format!("{header}.{payload}.sig")
}

struct BackendState {
    /// The one access token the protected routes currently accept.
    valid_access: Mutex<String>,
    /// Monotonic counter for minted access tokens.
    minted: AtomicU32,
    refresh_calls: AtomicU32,
    accept_refresh: AtomicBool,
    refresh_delay_ms: AtomicU64,
}

/// An in-process booking backend with a login, refresh, and services
/// surface, enough to exercise the whole token lifecycle.
pub struct FakeBackend {
    pub addr: SocketAddr,
    state: Arc<BackendState>,
}

impl FakeBackend {
    pub async fn start() -> anyhow::Result<Self> {
        let state = Arc::new(BackendState {
            valid_access: Mutex::new(String::new()),
            minted: AtomicU32::new(0),
            refresh_calls: AtomicU32::new(0),
            accept_refresh: AtomicBool::new(true),
            refresh_delay_ms: AtomicU64::new(0),
        });

        let login_state = Arc::clone(&state);
        let refresh_state = Arc::clone(&state);
        let services_state = Arc::clone(&state);

        let app = Router::new()
            .route(
                "/auth/login",
                post(move |Json(body): Json<serde_json::Value>| {
                    let state = Arc::clone(&login_state);
                    async move {
                        let email = body.get("email").and_then(|v| v.as_str()).unwrap_or("");
                        let password =
                            body.get("password").and_then(|v| v.as_str()).unwrap_or("");
                        if email != EMAIL || password != PASSWORD {
                            return (
                                StatusCode::UNAUTHORIZED,
                                r#"{"message":"invalid credentials"}"#.to_owned(),
                            );
                        }
                        let access = state.issue_access();
                        (
                            StatusCode::OK,
                            serde_json::json!({
                                "accessToken": access,
                                "refreshToken": REFRESH_TOKEN,
                            })
                            .to_string(),
                        )
                    }
                }),
            )
            .route(
                "/users/refresh",
                post(move |Json(body): Json<serde_json::Value>| {
                    let state = Arc::clone(&refresh_state);
                    async move {
                        state.refresh_calls.fetch_add(1, Ordering::Relaxed);
                        let delay = state.refresh_delay_ms.load(Ordering::Relaxed);
                        if delay > 0 {
                            tokio::time::sleep(Duration::from_millis(delay)).await;
                        }
                        let presented =
                            body.get("refreshToken").and_then(|v| v.as_str()).unwrap_or("");
                        if !state.accept_refresh.load(Ordering::Relaxed)
                            || presented != REFRESH_TOKEN
                        {
                            return (
                                StatusCode::FORBIDDEN,
                                r#"{"message":"refresh token revoked"}"#.to_owned(),
                            );
                        }
                        let access = state.issue_access();
                        (
                            StatusCode::OK,
                            serde_json::json!({ "accessToken": access }).to_string(),
                        )
                    }
                }),
            )
            .route(
                "/services",
                get(move |headers: HeaderMap| {
                    let state = Arc::clone(&services_state);
                    async move {
                        let presented = headers
                            .get("authorization")
                            .and_then(|v| v.to_str().ok())
                            .and_then(|v| v.strip_prefix("Bearer "))
                            .unwrap_or("");
                        let valid = state.valid_access.lock().unwrap_or_else(|e| e.into_inner());
                        if presented != valid.as_str() {
                            return (
                                StatusCode::UNAUTHORIZED,
                                r#"{"message":"unauthorized"}"#.to_owned(),
                            );
                        }
                        (
                            StatusCode::OK,
                            r#"[{"id":1,"name":"Fade","price":25.0,"durationMinutes":30},
                                {"id":2,"name":"Beard trim","price":15.5,"durationMinutes":20}]"#
                                .to_owned(),
                        )
                    }
                }),
            );

        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });

        Ok(Self { addr, state })
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn refresh_calls(&self) -> u32 {
        self.state.refresh_calls.load(Ordering::Relaxed)
    }

    /// Invalidate the access token the client currently holds; only a
    /// refresh will mint an acceptable one again.
    pub fn expire_access_token(&self) {
        let mut valid = self.state.valid_access.lock().unwrap_or_else(|e| e.into_inner());
        *valid = "<rotated-server-side>".to_owned();
    }

    /// Make the refresh endpoint reject all further refresh tokens.
    pub fn revoke_refresh_token(&self) {
        self.state.accept_refresh.store(false, Ordering::Relaxed);
    }

    /// Delay refresh responses, holding an episode open.
    pub fn set_refresh_delay(&self, delay: Duration) {
        self.state.refresh_delay_ms.store(delay.as_millis() as u64, Ordering::Relaxed);
    }
}

impl BackendState {
    /// Mint a new access token and make it the one the API accepts.
    fn issue_access(&self) -> String {
        let n = self.minted.fetch_add(1, Ordering::Relaxed);
        let access = mint_access(n);
        let mut valid = self.valid_access.lock().unwrap_or_else(|e| e.into_inner());
        *valid = access.clone();
        access
    }
}

/// Resolve the path to the compiled `chairside` binary.
pub fn chairside_binary() -> PathBuf {
    let manifest = Path::new(env!("CARGO_MANIFEST_DIR"));
    // tests/specs → tests → workspace root
    let workspace = manifest.parent().and_then(|p| p.parent()).unwrap_or(manifest);
    workspace.join("target").join("debug").join("chairside")
}

/// Run the chairside binary against the given backend and state dir.
pub fn run_cli(
    base_url: &str,
    state_dir: &Path,
    args: &[&str],
) -> anyhow::Result<std::process::Output> {
    let output = Command::new(chairside_binary())
        .env("CHAIRSIDE_BASE_URL", base_url)
        .env("CHAIRSIDE_STATE_DIR", state_dir)
        .args(args)
        .output()?;
    Ok(output)
}

/// Stdout of a CLI run, asserting the process exited successfully.
pub fn cli_stdout(
    base_url: &str,
    state_dir: &Path,
    args: &[&str],
) -> anyhow::Result<String> {
    let output = run_cli(base_url, state_dir, args)?;
    if !output.status.success() {
        anyhow::bail!(
            "chairside {args:?} failed: {}",
            String::from_utf8_lossy(&output.stderr)
        );
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}
