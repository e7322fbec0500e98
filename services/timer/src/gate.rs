//! Extension gate: external approval of credit-consuming time extensions

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

/// Verdict of the gate for one extension request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    /// Extension approved for the given number of seconds
    Granted { seconds: i32 },
    /// Extension refused
    Denied { reason: String },
}

/// Failures talking to the gate; none of them grant an extension
#[derive(Error, Debug)]
pub enum GateError {
    /// The request never produced a response
    #[error("Extension gate transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The gate answered with a non-success status
    #[error("Extension gate returned status {0}")]
    Status(u16),

    /// The gate answered with a body that is not JSON
    #[error("Extension gate response could not be decoded: {0}")]
    Decode(String),
}

/// Authorizes session extensions before they are applied
#[async_trait]
pub trait ExtensionGate: Send + Sync {
    /// Ask whether `member_id` may extend by `extended_minutes`
    async fn authorize(
        &self,
        member_id: &str,
        extended_minutes: i32,
    ) -> Result<GateDecision, GateError>;
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GateRequest<'a> {
    member_id: &'a str,
    extended_minutes: i32,
}

/// Gate that posts each request to a webhook
#[derive(Debug, Clone)]
pub struct WebhookGate {
    client: reqwest::Client,
    url: String,
}

impl WebhookGate {
    /// Create a gate for `url` with a per-request timeout
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, GateError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl ExtensionGate for WebhookGate {
    async fn authorize(
        &self,
        member_id: &str,
        extended_minutes: i32,
    ) -> Result<GateDecision, GateError> {
        info!(member_id, extended_minutes, "Requesting extension approval");

        let response = self
            .client
            .post(&self.url)
            .json(&GateRequest {
                member_id,
                extended_minutes,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(GateError::Status(status.as_u16()));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| GateError::Decode(e.to_string()))?;

        Ok(interpret_response(&body, extended_minutes))
    }
}

/// Turn the webhook body into a decision
///
/// Only a literal boolean `true` in `Valid` grants. `ExtendPeriod` is in
/// seconds, may be a number or a numeric string, and falls back to the
/// requested minutes when absent.
pub fn interpret_response(body: &Value, extended_minutes: i32) -> GateDecision {
    if body.get("Valid") != Some(&Value::Bool(true)) {
        warn!("Extension gate denied the request");
        return GateDecision::Denied {
            reason: "Invalid request or insufficient credits".to_string(),
        };
    }

    let period = match body.get("ExtendPeriod") {
        None | Some(Value::Null) => Some(i64::from(extended_minutes) * 60),
        Some(Value::String(text)) => text.trim().parse::<i64>().ok(),
        Some(value) => value
            .as_i64()
            .or_else(|| value.as_f64().map(|f| f.floor() as i64)),
    };

    match period.and_then(|p| i32::try_from(p).ok()) {
        Some(seconds) if seconds > 0 => GateDecision::Granted { seconds },
        _ => {
            warn!(?period, "Extension gate granted an unusable period");
            GateDecision::Denied {
                reason: "Extension period not granted".to_string(),
            }
        }
    }
}
