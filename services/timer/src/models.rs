//! Timer session entity and the request/response payloads of the API

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// One countdown instance as stored in `timer_sessions`
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct TimerSession {
    pub session_id: Uuid,
    pub access_token: String,
    pub start_time: DateTime<Utc>,
    /// Length of the countdown in seconds
    pub duration: i32,
    pub is_active: bool,
}

impl TimerSession {
    /// Seconds left at `now`, never negative
    pub fn remaining_seconds(&self, now: DateTime<Utc>) -> i64 {
        let elapsed = (now - self.start_time).num_seconds();
        (i64::from(self.duration) - elapsed).max(0)
    }
}

/// Key used to resolve an active session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionKey {
    /// Exact session identifier
    Id(Uuid),
    /// Most recent active session of the access token
    AccessToken(String),
}

/// Request for starting a timer session
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartRequest {
    #[serde(alias = "access_token")]
    pub access_token: Option<String>,
    pub duration: Option<i64>,
}

/// Response for a started session
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartResponse {
    pub session_id: Uuid,
    pub start_time: DateTime<Utc>,
    pub duration: i32,
    pub message: String,
}

/// Query parameters accepted by the check endpoints
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionLookupQuery {
    #[serde(alias = "access_token")]
    pub access_token: Option<String>,
    #[serde(alias = "session_id")]
    pub session_id: Option<String>,
}

/// Public view of a session
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    pub session_id: Uuid,
    pub start_time: DateTime<Utc>,
    pub duration: i32,
    pub is_active: bool,
    pub remaining_seconds: i64,
}

impl SessionView {
    pub fn at(session: &TimerSession, now: DateTime<Utc>) -> Self {
        Self {
            session_id: session.session_id,
            start_time: session.start_time,
            duration: session.duration,
            is_active: session.is_active,
            remaining_seconds: session.remaining_seconds(now),
        }
    }
}

/// Response for the check endpoints
#[derive(Debug, Serialize)]
pub struct CheckResponse {
    pub session: Option<SessionView>,
}

/// Query parameters for session validation
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateQuery {
    #[serde(alias = "session_id")]
    pub session_id: Option<String>,
}

/// Response for a successful validation
#[derive(Debug, Serialize)]
pub struct ValidateResponse {
    pub valid: bool,
}

/// Request for extending a session
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtendRequest {
    pub session_id: Option<String>,
    #[serde(alias = "access_token")]
    pub access_token: Option<String>,
    pub member_id: Option<String>,
    pub extended_minutes: Option<i64>,
}

/// Response for a granted extension
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtendResponse {
    pub success: bool,
    pub session_id: Uuid,
    pub start_time: DateTime<Utc>,
    pub new_duration: i32,
    /// Seconds actually added to the session
    pub extend_period: i32,
}

/// Request for deactivating a session
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeactivateRequest {
    pub session_id: Option<String>,
    #[serde(alias = "access_token")]
    pub access_token: Option<String>,
}

/// Response for a deactivated session
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeactivateResponse {
    pub success: bool,
    pub session_id: Uuid,
}
