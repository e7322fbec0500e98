//! Repositories for timer session persistence

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{SessionKey, TimerSession};

pub mod memory;
pub mod postgres;

pub use memory::MemorySessionStore;
pub use postgres::PgSessionStore;

/// Errors raised by a session store
#[derive(Error, Debug)]
pub enum StoreError {
    /// Query failed in the database
    #[error("Session store query error: {0}")]
    Query(#[from] sqlx::Error),

    /// The store could not complete the operation
    #[error("Session store error: {0}")]
    Backend(String),
}

/// Type alias for store results
pub type StoreResult<T> = Result<T, StoreError>;

/// Outcome of an atomic create-if-absent
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreateOutcome {
    /// A new active session was inserted
    Created(TimerSession),
    /// An active session already existed for the token; nothing was inserted
    Existing(TimerSession),
}

/// Persistence for timer sessions
///
/// Implementations must make `create_if_absent` atomic with respect to the
/// one-active-session-per-token rule.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Insert an active session unless the token already owns one
    async fn create_if_absent(&self, access_token: &str, duration: i32)
    -> StoreResult<CreateOutcome>;

    /// Find an active session by identifier or by access token
    async fn find_active(&self, key: &SessionKey) -> StoreResult<Option<TimerSession>>;

    /// Add `seconds` to an active session's duration
    ///
    /// Returns `None` when no active session has that id.
    async fn add_duration(&self, session_id: Uuid, seconds: i32)
    -> StoreResult<Option<TimerSession>>;

    /// Mark an active session inactive
    ///
    /// Returns `None` when no active session has that id.
    async fn deactivate(&self, session_id: Uuid) -> StoreResult<Option<TimerSession>>;

    /// Check that the store is reachable
    async fn health_check(&self) -> StoreResult<bool>;
}
