//! HTTP client for the timer API

use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::{Response, StatusCode};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

/// Errors returned by the timer API client
#[derive(Error, Debug)]
pub enum ClientError {
    /// The request never produced a response
    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The token already owns an active session
    #[error("Session {session_id} is already active")]
    Conflict { session_id: Uuid },

    /// The API answered with an error status
    #[error("{message} (HTTP {status})")]
    Api { status: u16, message: String },
}

/// Type alias for client results
pub type ClientResult<T> = Result<T, ClientError>;

/// Session data returned by the API
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub session_id: Uuid,
    pub start_time: DateTime<Utc>,
    pub duration: i64,
    #[serde(default = "active")]
    pub is_active: bool,
}

fn active() -> bool {
    true
}

#[derive(Deserialize)]
struct CheckResponse {
    session: Option<SessionSnapshot>,
}

/// Outcome of an accepted extension
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtendOutcome {
    pub session_id: Uuid,
    pub new_duration: i64,
    /// Seconds granted by the server
    pub extend_period: i64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StartRequest<'a> {
    access_token: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ExtendRequest<'a> {
    session_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    member_id: Option<&'a str>,
    extended_minutes: i64,
}

/// Client for the timer API
#[derive(Debug, Clone)]
pub struct SessionClient {
    http: reqwest::Client,
    base_url: String,
}

impl SessionClient {
    /// Create a client for the API at `base_url`
    pub fn new(base_url: &str, timeout: Duration) -> ClientResult<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/{}", self.base_url, path)
    }

    /// Start a session for `access_token`
    pub async fn start(&self, access_token: &str) -> ClientResult<SessionSnapshot> {
        let response = self
            .http
            .post(self.url("start"))
            .json(&StartRequest { access_token })
            .send()
            .await?;

        decode(response).await
    }

    /// Fetch the active session for a session id or an access token
    pub async fn check(
        &self,
        session_id: Option<Uuid>,
        access_token: Option<&str>,
    ) -> ClientResult<Option<SessionSnapshot>> {
        let mut query: Vec<(&str, String)> = Vec::new();
        if let Some(id) = session_id {
            query.push(("sessionId", id.to_string()));
        }
        if let Some(token) = access_token {
            query.push(("accessToken", token.to_string()));
        }

        let response = self
            .http
            .get(self.url("check-session"))
            .query(&query)
            .send()
            .await?;

        let body: CheckResponse = decode(response).await?;
        Ok(body.session)
    }

    /// Ask the API to extend a session
    pub async fn extend(
        &self,
        session_id: Uuid,
        member_id: Option<&str>,
        extended_minutes: i64,
    ) -> ClientResult<ExtendOutcome> {
        let response = self
            .http
            .post(self.url("extend"))
            .json(&ExtendRequest {
                session_id,
                member_id,
                extended_minutes,
            })
            .send()
            .await?;

        decode(response).await
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> ClientResult<T> {
    let status = response.status();
    if status.is_success() {
        return Ok(response.json().await?);
    }

    let body: Value = response.json().await.unwrap_or(Value::Null);

    if status == StatusCode::CONFLICT {
        if let Some(session_id) = body
            .get("sessionId")
            .and_then(Value::as_str)
            .and_then(|id| Uuid::parse_str(id).ok())
        {
            return Err(ClientError::Conflict { session_id });
        }
    }

    let message = body
        .get("error")
        .and_then(Value::as_str)
        .unwrap_or("Request failed")
        .to_string();

    Err(ClientError::Api {
        status: status.as_u16(),
        message,
    })
}
