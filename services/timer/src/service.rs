//! Session service: start, resolve, extend and deactivate timer sessions

use std::{sync::Arc, time::Duration};

use anyhow::Result;
use common::database::{DatabaseConfig, init_pool};
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    gate::{ExtensionGate, GateDecision, GateError, WebhookGate},
    models::{SessionKey, TimerSession},
    repositories::{
        CreateOutcome, MemorySessionStore, PgSessionStore, SessionStore, StoreError,
        postgres::ensure_schema,
    },
    validation,
};

/// Connection prefix selecting the in-memory store
pub const MEMORY_STORE: &str = "memory://";

/// Settings the session service is built from
#[derive(Debug, Clone)]
pub struct SessionServiceConfig {
    /// PostgreSQL URL, or `memory://`
    pub store_connection: String,
    /// Webhook approving extensions; extensions are ungated when absent
    pub extension_gate_url: Option<String>,
    /// Per-request timeout for the webhook
    pub gate_timeout: Duration,
    /// Upper bound of the PostgreSQL pool
    pub max_connections: u32,
}

/// Failures of session operations
#[derive(Error, Debug)]
pub enum SessionError {
    /// Request failed validation; nothing was read or written
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// No matching active session
    #[error("Session not found")]
    NotFound,

    /// The access token already owns an active session
    #[error("Active session {session_id} already exists")]
    Conflict { session_id: Uuid },

    /// The extension gate refused the extension
    #[error("Extension denied: {0}")]
    Denied(String),

    /// Persistence failure
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Extension gate could not be consulted
    #[error(transparent)]
    Gate(#[from] GateError),
}

/// Type alias for session results
pub type SessionResult<T> = Result<T, SessionError>;

/// Parameters of an extend call
#[derive(Debug, Clone, Default)]
pub struct ExtendCommand {
    pub session_id: Option<String>,
    pub access_token: Option<String>,
    pub member_id: Option<String>,
    pub extended_minutes: Option<i64>,
}

/// Result of a granted extension
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extension {
    /// The session after the duration was increased
    pub session: TimerSession,
    /// Seconds added
    pub granted_seconds: i32,
}

/// Timer session operations over a store and an optional gate
#[derive(Clone)]
pub struct SessionService {
    store: Arc<dyn SessionStore>,
    gate: Option<Arc<dyn ExtensionGate>>,
}

impl SessionService {
    /// Create a service from its collaborators
    pub fn new(store: Arc<dyn SessionStore>, gate: Option<Arc<dyn ExtensionGate>>) -> Self {
        Self { store, gate }
    }

    /// Build the store and gate described by `config`
    pub async fn connect(config: &SessionServiceConfig) -> Result<Self> {
        let store: Arc<dyn SessionStore> = if config.store_connection.starts_with(MEMORY_STORE) {
            warn!("Using in-memory session store; sessions are lost on restart");
            Arc::new(MemorySessionStore::new())
        } else {
            let db_config = DatabaseConfig {
                max_connections: config.max_connections,
                ..DatabaseConfig::new(config.store_connection.clone())
            };
            let pool = init_pool(&db_config).await?;
            ensure_schema(&pool).await?;
            Arc::new(PgSessionStore::new(pool))
        };

        let gate = match &config.extension_gate_url {
            Some(url) => {
                info!("Extensions are gated by webhook");
                let gate: Arc<dyn ExtensionGate> =
                    Arc::new(WebhookGate::new(url.clone(), config.gate_timeout)?);
                Some(gate)
            }
            None => None,
        };

        Ok(Self::new(store, gate))
    }

    /// Whether extensions go through the gate
    pub fn is_gated(&self) -> bool {
        self.gate.is_some()
    }

    /// Start a session for `access_token`
    pub async fn start(
        &self,
        access_token: Option<&str>,
        duration: Option<i64>,
    ) -> SessionResult<TimerSession> {
        let access_token =
            validation::validate_access_token(access_token).map_err(SessionError::InvalidInput)?;
        let duration = validation::validate_duration(duration).map_err(SessionError::InvalidInput)?;

        match self.store.create_if_absent(access_token, duration).await? {
            CreateOutcome::Created(session) => {
                info!(session_id = %session.session_id, duration, "Timer session started");
                Ok(session)
            }
            CreateOutcome::Existing(existing) => {
                warn!(session_id = %existing.session_id, "Active session already exists");
                Err(SessionError::Conflict {
                    session_id: existing.session_id,
                })
            }
        }
    }

    /// Resolve the active session named by either key
    ///
    /// `session_id` takes precedence over `access_token`.
    pub async fn resolve(
        &self,
        session_id: Option<&str>,
        access_token: Option<&str>,
    ) -> SessionResult<TimerSession> {
        let Some(key) = session_key(session_id, access_token)? else {
            return Err(SessionError::NotFound);
        };

        self.store
            .find_active(&key)
            .await?
            .ok_or(SessionError::NotFound)
    }

    /// Like [`resolve`](Self::resolve) but maps a missing session to `None`
    pub async fn check(
        &self,
        session_id: Option<&str>,
        access_token: Option<&str>,
    ) -> SessionResult<Option<TimerSession>> {
        match self.resolve(session_id, access_token).await {
            Ok(session) => Ok(Some(session)),
            Err(SessionError::NotFound) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Confirm that `session_id` names an active session
    pub async fn validate(&self, session_id: Option<&str>) -> SessionResult<TimerSession> {
        let session_id = non_blank(session_id)
            .ok_or_else(|| SessionError::InvalidInput("Session ID required".to_string()))?;

        self.resolve(Some(session_id), None).await
    }

    /// Extend an active session, consulting the gate when one is configured
    pub async fn extend(&self, command: &ExtendCommand) -> SessionResult<Extension> {
        let minutes = validation::validate_extended_minutes(command.extended_minutes)
            .map_err(SessionError::InvalidInput)?;
        let member_id = match &self.gate {
            Some(_) => Some(
                validation::validate_member_id(command.member_id.as_deref())
                    .map_err(SessionError::InvalidInput)?,
            ),
            None => None,
        };

        let session = self
            .resolve(
                command.session_id.as_deref(),
                command.access_token.as_deref(),
            )
            .await?;

        let granted_seconds = match (&self.gate, member_id) {
            (Some(gate), Some(member_id)) => match gate.authorize(member_id, minutes).await? {
                GateDecision::Granted { seconds } => seconds,
                GateDecision::Denied { reason } => {
                    warn!(session_id = %session.session_id, %reason, "Extension denied");
                    return Err(SessionError::Denied(reason));
                }
            },
            _ => minutes * 60,
        };

        let updated = self
            .store
            .add_duration(session.session_id, granted_seconds)
            .await?
            .ok_or(SessionError::NotFound)?;

        info!(
            session_id = %updated.session_id,
            granted_seconds,
            new_duration = updated.duration,
            "Timer session extended"
        );

        Ok(Extension {
            session: updated,
            granted_seconds,
        })
    }

    /// End the active session named by either key
    pub async fn deactivate(
        &self,
        session_id: Option<&str>,
        access_token: Option<&str>,
    ) -> SessionResult<TimerSession> {
        let session = self.resolve(session_id, access_token).await?;

        let deactivated = self
            .store
            .deactivate(session.session_id)
            .await?
            .ok_or(SessionError::NotFound)?;

        info!(session_id = %deactivated.session_id, "Timer session deactivated");
        Ok(deactivated)
    }

    /// Check that the store is reachable
    pub async fn health_check(&self) -> SessionResult<bool> {
        Ok(self.store.health_check().await?)
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Pick the lookup key, preferring the session id
///
/// `Ok(None)` means the id is malformed and cannot match any session.
fn session_key(
    session_id: Option<&str>,
    access_token: Option<&str>,
) -> SessionResult<Option<SessionKey>> {
    if let Some(id) = non_blank(session_id) {
        return Ok(Uuid::parse_str(id).ok().map(SessionKey::Id));
    }

    if let Some(token) = non_blank(access_token) {
        return Ok(Some(SessionKey::AccessToken(token.to_string())));
    }

    Err(SessionError::InvalidInput(
        "Session ID or access token required".to_string(),
    ))
}
