//! PostgreSQL-backed session repository

use async_trait::async_trait;
use common::error::{DatabaseError, DatabaseResult};
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use super::{CreateOutcome, SessionStore, StoreError, StoreResult};
use crate::models::{SessionKey, TimerSession};

/// Table layout for timer sessions
///
/// The partial unique index is what keeps a token to one active session.
const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS timer_sessions (
    session_id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    access_token TEXT NOT NULL,
    is_active BOOLEAN NOT NULL DEFAULT TRUE,
    start_time TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    duration INTEGER NOT NULL DEFAULT 600 CHECK (duration > 0)
);

CREATE UNIQUE INDEX IF NOT EXISTS timer_sessions_one_active_per_token
    ON timer_sessions (access_token)
    WHERE is_active;

CREATE INDEX IF NOT EXISTS timer_sessions_token_start_idx
    ON timer_sessions (access_token, start_time DESC);
"#;

/// Create the `timer_sessions` table and its indexes when missing
pub async fn ensure_schema(pool: &PgPool) -> DatabaseResult<()> {
    sqlx::raw_sql(SCHEMA)
        .execute(pool)
        .await
        .map_err(DatabaseError::Schema)?;

    info!("timer_sessions schema ready");
    Ok(())
}

/// Session repository for database operations
#[derive(Clone)]
pub struct PgSessionStore {
    pool: PgPool,
}

impl PgSessionStore {
    /// Create a new session repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn find_by_id(&self, session_id: Uuid) -> StoreResult<Option<TimerSession>> {
        let session = sqlx::query_as::<_, TimerSession>(
            r#"
            SELECT session_id, access_token, start_time, duration, is_active
            FROM timer_sessions
            WHERE session_id = $1 AND is_active = TRUE
            "#,
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(session)
    }

    async fn find_by_token(&self, access_token: &str) -> StoreResult<Option<TimerSession>> {
        let session = sqlx::query_as::<_, TimerSession>(
            r#"
            SELECT session_id, access_token, start_time, duration, is_active
            FROM timer_sessions
            WHERE access_token = $1 AND is_active = TRUE
            ORDER BY start_time DESC
            LIMIT 1
            "#,
        )
        .bind(access_token)
        .fetch_optional(&self.pool)
        .await?;

        Ok(session)
    }
}

#[async_trait]
impl SessionStore for PgSessionStore {
    async fn create_if_absent(
        &self,
        access_token: &str,
        duration: i32,
    ) -> StoreResult<CreateOutcome> {
        let inserted = sqlx::query_as::<_, TimerSession>(
            r#"
            INSERT INTO timer_sessions (access_token, is_active, start_time, duration)
            VALUES ($1, TRUE, NOW(), $2)
            ON CONFLICT (access_token) WHERE is_active DO NOTHING
            RETURNING session_id, access_token, start_time, duration, is_active
            "#,
        )
        .bind(access_token)
        .bind(duration)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(session) = inserted {
            return Ok(CreateOutcome::Created(session));
        }

        // The conflicting row can be deactivated between the insert and this read.
        self.find_by_token(access_token)
            .await?
            .map(CreateOutcome::Existing)
            .ok_or_else(|| {
                StoreError::Backend(
                    "active session disappeared while resolving a conflict".to_string(),
                )
            })
    }

    async fn find_active(&self, key: &SessionKey) -> StoreResult<Option<TimerSession>> {
        match key {
            SessionKey::Id(id) => self.find_by_id(*id).await,
            SessionKey::AccessToken(token) => self.find_by_token(token).await,
        }
    }

    async fn add_duration(
        &self,
        session_id: Uuid,
        seconds: i32,
    ) -> StoreResult<Option<TimerSession>> {
        let session = sqlx::query_as::<_, TimerSession>(
            r#"
            UPDATE timer_sessions
            SET duration = duration + $2
            WHERE session_id = $1 AND is_active = TRUE
            RETURNING session_id, access_token, start_time, duration, is_active
            "#,
        )
        .bind(session_id)
        .bind(seconds)
        .fetch_optional(&self.pool)
        .await?;

        Ok(session)
    }

    async fn deactivate(&self, session_id: Uuid) -> StoreResult<Option<TimerSession>> {
        let session = sqlx::query_as::<_, TimerSession>(
            r#"
            UPDATE timer_sessions
            SET is_active = FALSE
            WHERE session_id = $1 AND is_active = TRUE
            RETURNING session_id, access_token, start_time, duration, is_active
            "#,
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(session)
    }

    async fn health_check(&self) -> StoreResult<bool> {
        common::database::health_check(&self.pool)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))
    }
}
