// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Durable token storage: load/save the credential pair as JSON with
//! atomic writes. An absent file means no session exists.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// The persisted credential pair.
///
/// Wire keys match the storage layout the mobile clients use
/// (`accessToken` / `refreshToken`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    /// Short-lived bearer credential attached to API requests.
    pub access_token: String,
    /// Long-lived credential used only to obtain new access tokens.
    pub refresh_token: String,
}

/// Resolve the state directory for chairside data.
///
/// Checks `CHAIRSIDE_STATE_DIR`, then `$XDG_STATE_HOME/chairside`,
/// then `$HOME/.local/state/chairside`.
pub fn state_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("CHAIRSIDE_STATE_DIR") {
        return PathBuf::from(dir);
    }
    if let Ok(xdg) = std::env::var("XDG_STATE_HOME") {
        return PathBuf::from(xdg).join("chairside");
    }
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".local/state/chairside");
    }
    PathBuf::from(".chairside")
}

/// File-backed key-value storage for the session's token pair.
///
/// Reads and writes are plain filesystem operations with no network side
/// effects; callers treat them as non-blocking housekeeping.
#[derive(Debug, Clone)]
pub struct TokenStore {
    path: PathBuf,
}

impl TokenStore {
    /// Create a store rooted at the given state directory.
    pub fn new(dir: &Path) -> Self {
        Self { path: dir.join("tokens.json") }
    }

    /// Load the stored pair. A missing or unreadable file means no
    /// session; a malformed file is logged and treated the same way.
    pub fn load(&self) -> Option<TokenPair> {
        let contents = std::fs::read_to_string(&self.path).ok()?;
        match serde_json::from_str(&contents) {
            Ok(pair) => Some(pair),
            Err(e) => {
                warn!(path = %self.path.display(), "failed to parse stored tokens: {e}");
                None
            }
        }
    }

    /// Current access token, if a session exists.
    pub fn access_token(&self) -> Option<String> {
        self.load().map(|p| p.access_token)
    }

    /// Current refresh token, if a session exists.
    pub fn refresh_token(&self) -> Option<String> {
        self.load().map(|p| p.refresh_token)
    }

    /// Persist a pair atomically (write tmp + rename).
    ///
    /// Uses a unique temp filename (PID + counter) so concurrent saves
    /// cannot corrupt each other via a shared `.tmp` file.
    pub fn save(&self, pair: &TokenPair) -> anyhow::Result<()> {
        use std::sync::atomic::{AtomicU32, Ordering};
        static COUNTER: AtomicU32 = AtomicU32::new(0);

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(pair)?;
        let seq = COUNTER.fetch_add(1, Ordering::Relaxed);
        let tmp_name = format!(
            "{}.{}.{}.tmp",
            self.path.file_name().unwrap_or_default().to_string_lossy(),
            std::process::id(),
            seq,
        );
        let tmp_path = self.path.with_file_name(tmp_name);
        std::fs::write(&tmp_path, json)?;
        std::fs::rename(&tmp_path, &self.path)?;
        debug!(path = %self.path.display(), "tokens persisted");
        Ok(())
    }

    /// Replace the access token, leaving the refresh token unchanged.
    ///
    /// Fails when no session is stored: a refresh outcome landing after
    /// logout must not resurrect a cleared session.
    pub fn set_access_token(&self, access_token: &str) -> anyhow::Result<()> {
        let Some(mut pair) = self.load() else {
            anyhow::bail!("no stored session to update");
        };
        pair.access_token = access_token.to_owned();
        self.save(&pair)
    }

    /// Delete the stored pair. Idempotent.
    pub fn clear(&self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "stored tokens cleared"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %self.path.display(), "failed to remove stored tokens: {e}"),
        }
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
