// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Typed surface over the booking backend.
//!
//! [`AuthClient`] handles the credential exchange that produces the
//! initial token pair; [`ApiClient`] covers the resource endpoints and
//! routes everything through the [`Gateway`]. Wire types are camelCase,
//! matching the backend's JSON.

use std::sync::Arc;

use reqwest::Response;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::config::ClientConfig;
use crate::gateway::{Gateway, RequestError};
use crate::session::SessionManager;
use crate::store::TokenPair;

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

/// Role of an authenticated user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Customer,
    Barber,
}

/// A bookable service offered by the shop.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Service {
    pub id: i64,
    pub name: String,
    pub price: f64,
    pub duration_minutes: u32,
}

/// Lifecycle state of an appointment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Scheduled,
    Completed,
    Cancelled,
}

/// An appointment as returned by the backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Appointment {
    pub id: i64,
    pub customer_id: i64,
    pub barber_id: i64,
    pub service_id: i64,
    /// ISO 8601 start time, in the shop's timezone.
    pub start_time: String,
    pub status: AppointmentStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// Booking request.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAppointment {
    pub barber_id: i64,
    pub service_id: i64,
    pub start_time: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// Reschedule request: only the start time moves.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Reschedule {
    pub start_time: String,
}

/// The authenticated user's profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub id: i64,
    pub name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    pub role: Role,
}

/// Partial profile update; absent fields are left unchanged.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

/// Registration request.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

/// A barber's day off.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DayOff {
    pub id: i64,
    pub barber_id: i64,
    /// ISO 8601 date (no time component).
    pub date: String,
}

/// Rating submission for a completed appointment.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RatingRequest {
    pub appointment_id: i64,
    pub stars: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

/// A stored rating.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rating {
    pub id: i64,
    pub barber_id: i64,
    pub stars: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    pub created_at: String,
}

/// Login request body.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Credentials<'a> {
    email: &'a str,
    password: &'a str,
}

/// Backend error envelope (`{"message": "..."}`).
#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors surfaced by the typed API layer.
#[derive(Debug)]
pub enum ApiError {
    /// Authentication could not be recovered; re-login required.
    SessionExpired,
    /// The backend answered with an error status.
    Status { status: u16, message: String },
    /// Transport-level failure.
    Http(reqwest::Error),
    /// Local persistence failed while storing session credentials.
    Storage(String),
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SessionExpired => f.write_str("session expired"),
            Self::Status { status, message } => write!(f, "HTTP {status}: {message}"),
            Self::Http(e) => write!(f, "request failed: {e}"),
            Self::Storage(msg) => write!(f, "failed to store credentials: {msg}"),
        }
    }
}

impl std::error::Error for ApiError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Http(e) => Some(e),
            _ => None,
        }
    }
}

impl From<RequestError> for ApiError {
    fn from(e: RequestError) -> Self {
        match e {
            RequestError::SessionExpired => Self::SessionExpired,
            RequestError::Http(e) => Self::Http(e),
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        Self::Http(e)
    }
}

/// Decode a success body, or map an error status to [`ApiError::Status`]
/// using the backend's message envelope.
async fn decode<T: DeserializeOwned>(resp: Response) -> Result<T, ApiError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp.json::<T>().await?);
    }
    Err(ApiError::Status { status: status.as_u16(), message: error_message(resp).await })
}

/// Accept any success status, discarding the body.
async fn expect_success(resp: Response) -> Result<(), ApiError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(());
    }
    Err(ApiError::Status { status: status.as_u16(), message: error_message(resp).await })
}

async fn error_message(resp: Response) -> String {
    let status = resp.status();
    match resp.json::<ErrorBody>().await {
        Ok(body) if !body.message.is_empty() => body.message,
        _ => status.canonical_reason().unwrap_or("request failed").to_owned(),
    }
}

// ---------------------------------------------------------------------------
// AuthClient
// ---------------------------------------------------------------------------

/// Pre-session endpoints: the credential exchange that produces the
/// initial token pair. Talks to the backend directly, since there is no bearer
/// token to attach yet.
pub struct AuthClient {
    base_url: String,
    http: reqwest::Client,
    session: Arc<SessionManager>,
}

impl AuthClient {
    pub fn new(config: &ClientConfig, session: Arc<SessionManager>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .unwrap_or_default();
        Self { base_url: config.base_url.trim_end_matches('/').to_owned(), http, session }
    }

    /// Exchange credentials for a token pair and store it as the session.
    pub async fn login(&self, email: &str, password: &str) -> Result<TokenPair, ApiError> {
        let resp = self
            .http
            .post(format!("{}/auth/login", self.base_url))
            .json(&Credentials { email, password })
            .send()
            .await?;
        let pair: TokenPair = decode(resp).await?;
        self.session.seed(&pair).map_err(|e| ApiError::Storage(e.to_string()))?;
        Ok(pair)
    }

    /// Create an account and store the issued token pair as the session.
    pub async fn register(&self, user: &NewUser) -> Result<TokenPair, ApiError> {
        let resp =
            self.http.post(format!("{}/auth/register", self.base_url)).json(user).send().await?;
        let pair: TokenPair = decode(resp).await?;
        self.session.seed(&pair).map_err(|e| ApiError::Storage(e.to_string()))?;
        Ok(pair)
    }
}

// ---------------------------------------------------------------------------
// ApiClient
// ---------------------------------------------------------------------------

/// Typed resource endpoints, all routed through the [`Gateway`].
pub struct ApiClient {
    gateway: Gateway,
}

impl ApiClient {
    pub fn new(gateway: Gateway) -> Self {
        Self { gateway }
    }

    /// List bookable services.
    pub async fn services(&self) -> Result<Vec<Service>, ApiError> {
        decode(self.gateway.get("/services").await?).await
    }

    /// List the current user's appointments.
    pub async fn appointments(&self) -> Result<Vec<Appointment>, ApiError> {
        decode(self.gateway.get("/appointments").await?).await
    }

    /// List a barber's schedule for a given date (barber role).
    pub async fn barber_appointments(&self, date: &str) -> Result<Vec<Appointment>, ApiError> {
        decode(self.gateway.get(&format!("/appointments/barber?date={date}")).await?).await
    }

    /// Book a new appointment.
    pub async fn book(&self, appointment: &NewAppointment) -> Result<Appointment, ApiError> {
        decode(self.gateway.post("/appointments", appointment).await?).await
    }

    /// Move an existing appointment to a new start time.
    pub async fn reschedule(&self, id: i64, change: &Reschedule) -> Result<Appointment, ApiError> {
        decode(self.gateway.put(&format!("/appointments/{id}"), change).await?).await
    }

    /// Cancel an appointment.
    pub async fn cancel(&self, id: i64) -> Result<(), ApiError> {
        expect_success(self.gateway.delete(&format!("/appointments/{id}")).await?).await
    }

    /// Fetch the current user's profile.
    pub async fn profile(&self) -> Result<Profile, ApiError> {
        decode(self.gateway.get("/users/me").await?).await
    }

    /// Apply a partial profile update.
    pub async fn update_profile(&self, update: &ProfileUpdate) -> Result<Profile, ApiError> {
        decode(self.gateway.put("/users/me", update).await?).await
    }

    /// List all barbers (for the booking flow).
    pub async fn barbers(&self) -> Result<Vec<Profile>, ApiError> {
        decode(self.gateway.get("/users/barbers").await?).await
    }

    /// List the current barber's days off.
    pub async fn days_off(&self) -> Result<Vec<DayOff>, ApiError> {
        decode(self.gateway.get("/day-off").await?).await
    }

    /// Add a day off (barber role).
    pub async fn add_day_off(&self, date: &str) -> Result<DayOff, ApiError> {
        decode(self.gateway.post("/day-off", &serde_json::json!({ "date": date })).await?).await
    }

    /// Remove a day off (barber role).
    pub async fn remove_day_off(&self, id: i64) -> Result<(), ApiError> {
        expect_success(self.gateway.delete(&format!("/day-off/{id}")).await?).await
    }

    /// Rate a completed appointment.
    pub async fn rate(&self, rating: &RatingRequest) -> Result<Rating, ApiError> {
        decode(self.gateway.post("/ratings", rating).await?).await
    }

    /// List ratings for a barber.
    pub async fn barber_ratings(&self, barber_id: i64) -> Result<Vec<Rating>, ApiError> {
        decode(self.gateway.get(&format!("/ratings/barber/{barber_id}")).await?).await
    }
}

#[cfg(test)]
#[path = "api_tests.rs"]
mod tests;
