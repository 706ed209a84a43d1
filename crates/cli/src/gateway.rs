// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Authenticated request gateway.
//!
//! Every outbound API call goes through here: the current access token is
//! attached as a bearer credential, a 401 triggers the session manager's
//! shared single-flight refresh, and the original request is replayed once
//! with the fresh token. All other statuses, error statuses included,
//! pass through unchanged for the caller to interpret.

use std::sync::Arc;

use reqwest::{Method, Response, StatusCode};
use serde::Serialize;
use tracing::{debug, warn};

use crate::config::ClientConfig;
use crate::session::SessionManager;

/// Failure modes surfaced to gateway callers.
#[derive(Debug)]
pub enum RequestError {
    /// Authentication could not be recovered; the caller must re-login.
    /// The session's `Expired` event has already been emitted.
    SessionExpired,
    /// Transport-level failure from the underlying HTTP client.
    Http(reqwest::Error),
}

impl std::fmt::Display for RequestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SessionExpired => f.write_str("session expired"),
            Self::Http(e) => write!(f, "request failed: {e}"),
        }
    }
}

impl std::error::Error for RequestError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::SessionExpired => None,
            Self::Http(e) => Some(e),
        }
    }
}

impl From<reqwest::Error> for RequestError {
    fn from(e: reqwest::Error) -> Self {
        Self::Http(e)
    }
}

/// Wraps outbound API calls with bearer auth and one transparent recovery
/// from token expiry.
pub struct Gateway {
    base_url: String,
    http: reqwest::Client,
    session: Arc<SessionManager>,
}

impl Gateway {
    pub fn new(config: &ClientConfig, session: Arc<SessionManager>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .unwrap_or_default();
        Self { base_url: config.base_url.trim_end_matches('/').to_owned(), http, session }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn build<B: Serialize>(
        &self,
        method: &Method,
        path: &str,
        body: Option<&B>,
        token: Option<&str>,
    ) -> reqwest::RequestBuilder {
        let mut req = self.http.request(method.clone(), self.url(path));
        if let Some(token) = token {
            req = req.bearer_auth(token);
        }
        if let Some(body) = body {
            req = req.json(body);
        }
        req
    }

    /// Issue an authenticated request.
    ///
    /// On a 401, joins (or starts) the shared refresh episode and replays
    /// the request once with the new token. A failed refresh, or a
    /// replay that is rejected again, is terminal: the `Expired` session
    /// event fires and [`RequestError::SessionExpired`] is returned.
    pub async fn request<B: Serialize>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<Response, RequestError> {
        let token = self.session.get_token();
        let resp = self.build(&method, path, body, token.as_deref()).send().await?;
        if resp.status() != StatusCode::UNAUTHORIZED {
            return Ok(resp);
        }

        debug!(%method, path, "request unauthorized, refreshing token");
        let fresh = match self.session.refresh_if_needed().await {
            Ok(token) => token,
            Err(e) => {
                warn!(%method, path, "refresh failed, session expired: {e}");
                self.session.notify_expired();
                return Err(RequestError::SessionExpired);
            }
        };

        let replay = self.build(&method, path, body, Some(&fresh)).send().await?;
        if replay.status() == StatusCode::UNAUTHORIZED {
            // The fresh token was rejected too. One recovery per request;
            // anything past that means the session is gone.
            warn!(%method, path, "replay rejected with fresh token, session expired");
            self.session.notify_expired();
            return Err(RequestError::SessionExpired);
        }
        Ok(replay)
    }

    pub async fn get(&self, path: &str) -> Result<Response, RequestError> {
        self.request::<serde_json::Value>(Method::GET, path, None).await
    }

    pub async fn post<B: Serialize>(&self, path: &str, body: &B) -> Result<Response, RequestError> {
        self.request(Method::POST, path, Some(body)).await
    }

    pub async fn put<B: Serialize>(&self, path: &str, body: &B) -> Result<Response, RequestError> {
        self.request(Method::PUT, path, Some(body)).await
    }

    pub async fn delete(&self, path: &str) -> Result<Response, RequestError> {
        self.request::<serde_json::Value>(Method::DELETE, path, None).await
    }
}

#[cfg(test)]
#[path = "gateway_tests.rs"]
mod tests;
