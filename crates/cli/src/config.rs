// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;
use std::time::Duration;

use crate::store;

/// Configuration for the chairside client.
#[derive(Debug, Clone, clap::Args)]
pub struct ClientConfig {
    /// Base URL of the booking backend.
    #[arg(long, default_value = "http://127.0.0.1:3000", env = "CHAIRSIDE_BASE_URL")]
    pub base_url: String,

    /// Directory for persisted session state. Defaults to the platform state dir.
    #[arg(long, env = "CHAIRSIDE_STATE_DIR")]
    pub state_dir: Option<PathBuf>,

    /// Periodic token refresh interval in seconds.
    #[arg(long, default_value_t = 600, env = "CHAIRSIDE_REFRESH_INTERVAL_SECS")]
    pub refresh_interval_secs: u64,

    /// Network attempts per refresh call before a transient failure is reported.
    #[arg(long, default_value_t = 2, env = "CHAIRSIDE_REFRESH_ATTEMPTS")]
    pub refresh_attempts: u32,

    /// Per-attempt refresh timeout in milliseconds.
    #[arg(long, default_value_t = 5000, env = "CHAIRSIDE_REFRESH_TIMEOUT_MS")]
    pub refresh_timeout_ms: u64,

    /// Backoff unit between refresh attempts in milliseconds (scaled by attempt number).
    #[arg(long, default_value_t = 500, env = "CHAIRSIDE_REFRESH_BACKOFF_MS")]
    pub refresh_backoff_ms: u64,

    /// Bound on the silent login-check refresh in milliseconds.
    #[arg(long, default_value_t = 3000, env = "CHAIRSIDE_LOGIN_CHECK_TIMEOUT_MS")]
    pub login_check_timeout_ms: u64,

    /// Outbound API request timeout in seconds.
    #[arg(long, default_value_t = 10, env = "CHAIRSIDE_REQUEST_TIMEOUT_SECS")]
    pub request_timeout_secs: u64,
}

impl ClientConfig {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }

    pub fn refresh_timeout(&self) -> Duration {
        Duration::from_millis(self.refresh_timeout_ms)
    }

    pub fn refresh_backoff(&self) -> Duration {
        Duration::from_millis(self.refresh_backoff_ms)
    }

    pub fn login_check_timeout(&self) -> Duration {
        Duration::from_millis(self.login_check_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Resolved state directory: the explicit override or the platform default.
    pub fn state_path(&self) -> PathBuf {
        self.state_dir.clone().unwrap_or_else(store::state_dir)
    }

    /// Validate cross-field constraints that clap cannot express.
    pub fn validate(&self) -> anyhow::Result<()> {
        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            anyhow::bail!("base URL must be http(s): {}", self.base_url);
        }
        if self.refresh_attempts == 0 {
            anyhow::bail!("refresh attempts must be at least 1");
        }
        if self.refresh_interval_secs == 0 {
            anyhow::bail!("refresh interval must be nonzero");
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
