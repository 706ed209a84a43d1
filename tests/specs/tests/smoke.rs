// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! End-to-end smoke tests: the full token lifecycle against a fake
//! booking backend, via the library and via the compiled binary.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chairside::api::{ApiClient, AuthClient};
use chairside::config::ClientConfig;
use chairside::gateway::Gateway;
use chairside::session::SessionManager;
use chairside::store::TokenStore;

use chairside_specs::{cli_stdout, ensure_crypto, run_cli, FakeBackend, EMAIL, PASSWORD};

fn test_config(base_url: &str, dir: &Path) -> ClientConfig {
    ClientConfig {
        base_url: base_url.to_owned(),
        state_dir: Some(dir.to_path_buf()),
        refresh_interval_secs: 600,
        refresh_attempts: 2,
        refresh_timeout_ms: 2000,
        refresh_backoff_ms: 50,
        login_check_timeout_ms: 2000,
        request_timeout_secs: 5,
    }
}

struct Client {
    session: Arc<SessionManager>,
    auth: AuthClient,
    api: ApiClient,
    store: TokenStore,
}

fn client(backend: &FakeBackend, dir: &Path) -> Client {
    ensure_crypto();
    let config = test_config(&backend.base_url(), dir);
    let (session, _events) = SessionManager::new(config.clone());
    let auth = AuthClient::new(&config, Arc::clone(&session));
    let api = ApiClient::new(Gateway::new(&config, Arc::clone(&session)));
    let store = TokenStore::new(dir);
    Client { session, auth, api, store }
}

// -- library ------------------------------------------------------------------

#[tokio::test]
async fn login_then_authenticated_request() -> anyhow::Result<()> {
    let backend = FakeBackend::start().await?;
    let dir = tempfile::tempdir()?;
    let c = client(&backend, dir.path());

    c.auth.login(EMAIL, PASSWORD).await?;
    assert!(c.session.is_logged_in().await);

    let services = c.api.services().await?;
    assert_eq!(services.len(), 2);
    // The fresh token was good on the first try.
    assert_eq!(backend.refresh_calls(), 0);
    Ok(())
}

#[tokio::test]
async fn expired_access_token_recovers_transparently() -> anyhow::Result<()> {
    let backend = FakeBackend::start().await?;
    let dir = tempfile::tempdir()?;
    let c = client(&backend, dir.path());

    c.auth.login(EMAIL, PASSWORD).await?;
    backend.expire_access_token();

    // The 401 is invisible to the caller: refresh + replay happen inside
    // the gateway.
    let services = c.api.services().await?;
    assert_eq!(services.len(), 2);
    assert_eq!(backend.refresh_calls(), 1);

    // The refreshed token was persisted and works for the next call too.
    let services = c.api.services().await?;
    assert_eq!(services.len(), 2);
    assert_eq!(backend.refresh_calls(), 1);
    Ok(())
}

#[tokio::test]
async fn concurrent_requests_share_one_refresh() -> anyhow::Result<()> {
    let backend = FakeBackend::start().await?;
    let dir = tempfile::tempdir()?;
    let c = client(&backend, dir.path());

    c.auth.login(EMAIL, PASSWORD).await?;
    backend.expire_access_token();
    backend.set_refresh_delay(Duration::from_millis(150));

    let api = Arc::new(c.api);
    let tasks: Vec<_> = (0..3)
        .map(|_| {
            let api = Arc::clone(&api);
            tokio::spawn(async move { api.services().await })
        })
        .collect();

    for task in tasks {
        let services = task.await??;
        assert_eq!(services.len(), 2);
    }
    assert_eq!(backend.refresh_calls(), 1);
    Ok(())
}

#[tokio::test]
async fn revoked_refresh_token_ends_the_session() -> anyhow::Result<()> {
    let backend = FakeBackend::start().await?;
    let dir = tempfile::tempdir()?;
    let c = client(&backend, dir.path());

    c.auth.login(EMAIL, PASSWORD).await?;
    backend.expire_access_token();
    backend.revoke_refresh_token();

    let result = c.api.services().await;
    assert!(result.is_err(), "expected session expiry, got {result:?}");
    assert_eq!(backend.refresh_calls(), 1);

    // Terminal rejection wiped the stored pair; the next check answers
    // locally without another network attempt.
    assert_eq!(c.store.load(), None);
    assert!(!c.session.is_logged_in().await);
    assert_eq!(backend.refresh_calls(), 1);
    Ok(())
}

// -- binary -------------------------------------------------------------------

#[tokio::test]
async fn cli_status_without_session_reports_logged_out() -> anyhow::Result<()> {
    let backend = FakeBackend::start().await?;
    let dir = tempfile::tempdir()?;

    let out = cli_stdout(&backend.base_url(), dir.path(), &["status"])?;
    assert!(out.contains("logged out"), "stdout: {out}");
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn cli_login_status_services_logout_flow() -> anyhow::Result<()> {
    let backend = FakeBackend::start().await?;
    let dir = tempfile::tempdir()?;
    let base = backend.base_url();

    let out = cli_stdout(&base, dir.path(), &["login", EMAIL, "--password", PASSWORD])?;
    assert!(out.contains("logged in as"), "stdout: {out}");
    assert!(dir.path().join("tokens.json").exists());

    let out = cli_stdout(&base, dir.path(), &["status"])?;
    assert!(out.contains("logged in"), "stdout: {out}");

    let out = cli_stdout(&base, dir.path(), &["services"])?;
    assert!(out.contains("Fade"), "stdout: {out}");

    let out = cli_stdout(&base, dir.path(), &["logout"])?;
    assert!(out.contains("logged out"), "stdout: {out}");
    assert!(!dir.path().join("tokens.json").exists());

    let out = cli_stdout(&base, dir.path(), &["status"])?;
    assert!(out.contains("logged out"), "stdout: {out}");
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn cli_login_with_bad_password_fails() -> anyhow::Result<()> {
    let backend = FakeBackend::start().await?;
    let dir = tempfile::tempdir()?;

    let output = run_cli(&backend.base_url(), dir.path(), &["login", EMAIL, "--password", "nope"])?;
    assert!(!output.status.success());
    assert!(!dir.path().join("tokens.json").exists());
    Ok(())
}
