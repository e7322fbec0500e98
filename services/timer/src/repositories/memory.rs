//! In-memory session repository
//!
//! Selected with a `memory://` store connection. Sessions live only as long
//! as the process; the map lock makes create-if-absent atomic.

use async_trait::async_trait;
use chrono::Utc;
use std::{collections::HashMap, sync::Arc};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{CreateOutcome, SessionStore, StoreError, StoreResult};
use crate::models::{SessionKey, TimerSession};

/// Session repository backed by a process-local map
#[derive(Debug, Clone, Default)]
pub struct MemorySessionStore {
    sessions: Arc<Mutex<HashMap<Uuid, TimerSession>>>,
}

impl MemorySessionStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored rows, active or not
    #[cfg(test)]
    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }

    /// Fetch a row regardless of its active flag
    #[cfg(test)]
    pub async fn get(&self, session_id: Uuid) -> Option<TimerSession> {
        self.sessions.lock().await.get(&session_id).cloned()
    }
}

fn latest_active_for<'a>(
    sessions: &'a HashMap<Uuid, TimerSession>,
    access_token: &str,
) -> Option<&'a TimerSession> {
    sessions
        .values()
        .filter(|s| s.is_active && s.access_token == access_token)
        .max_by_key(|s| s.start_time)
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn create_if_absent(
        &self,
        access_token: &str,
        duration: i32,
    ) -> StoreResult<CreateOutcome> {
        let mut sessions = self.sessions.lock().await;

        if let Some(existing) = latest_active_for(&sessions, access_token) {
            return Ok(CreateOutcome::Existing(existing.clone()));
        }

        let session = TimerSession {
            session_id: Uuid::new_v4(),
            access_token: access_token.to_string(),
            start_time: Utc::now(),
            duration,
            is_active: true,
        };
        sessions.insert(session.session_id, session.clone());

        Ok(CreateOutcome::Created(session))
    }

    async fn find_active(&self, key: &SessionKey) -> StoreResult<Option<TimerSession>> {
        let sessions = self.sessions.lock().await;

        let found = match key {
            SessionKey::Id(id) => sessions.get(id).filter(|s| s.is_active),
            SessionKey::AccessToken(token) => latest_active_for(&sessions, token),
        };

        Ok(found.cloned())
    }

    async fn add_duration(
        &self,
        session_id: Uuid,
        seconds: i32,
    ) -> StoreResult<Option<TimerSession>> {
        let mut sessions = self.sessions.lock().await;

        let Some(session) = sessions.get_mut(&session_id).filter(|s| s.is_active) else {
            return Ok(None);
        };

        session.duration = session
            .duration
            .checked_add(seconds)
            .ok_or_else(|| StoreError::Backend("session duration overflow".to_string()))?;

        Ok(Some(session.clone()))
    }

    async fn deactivate(&self, session_id: Uuid) -> StoreResult<Option<TimerSession>> {
        let mut sessions = self.sessions.lock().await;

        let Some(session) = sessions.get_mut(&session_id).filter(|s| s.is_active) else {
            return Ok(None);
        };
        session.is_active = false;

        Ok(Some(session.clone()))
    }

    async fn health_check(&self) -> StoreResult<bool> {
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_second_create_returns_existing() {
        let store = MemorySessionStore::new();

        let first = store.create_if_absent("tok1", 600).await.unwrap();
        let CreateOutcome::Created(created) = first else {
            panic!("expected a new session");
        };

        let second = store.create_if_absent("tok1", 300).await.unwrap();
        assert_eq!(second, CreateOutcome::Existing(created));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_create_after_deactivate_inserts_new_row() {
        let store = MemorySessionStore::new();

        let CreateOutcome::Created(first) = store.create_if_absent("tok1", 600).await.unwrap()
        else {
            panic!("expected a new session");
        };
        store.deactivate(first.session_id).await.unwrap();

        let outcome = store.create_if_absent("tok1", 600).await.unwrap();
        assert!(matches!(outcome, CreateOutcome::Created(s) if s.session_id != first.session_id));
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn test_find_active_ignores_inactive_rows() {
        let store = MemorySessionStore::new();
        let CreateOutcome::Created(session) = store.create_if_absent("tok1", 600).await.unwrap()
        else {
            panic!("expected a new session");
        };

        store.deactivate(session.session_id).await.unwrap();

        let by_id = store
            .find_active(&SessionKey::Id(session.session_id))
            .await
            .unwrap();
        let by_token = store
            .find_active(&SessionKey::AccessToken("tok1".to_string()))
            .await
            .unwrap();
        assert!(by_id.is_none());
        assert!(by_token.is_none());
    }

    #[tokio::test]
    async fn test_add_duration_on_missing_session_is_none() {
        let store = MemorySessionStore::new();
        let result = store.add_duration(Uuid::new_v4(), 60).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_add_duration_overflow_is_an_error() {
        let store = MemorySessionStore::new();
        let CreateOutcome::Created(session) = store.create_if_absent("tok1", 600).await.unwrap()
        else {
            panic!("expected a new session");
        };

        let result = store.add_duration(session.session_id, i32::MAX).await;
        assert!(matches!(result, Err(StoreError::Backend(_))));
        assert_eq!(store.get(session.session_id).await.unwrap().duration, 600);
    }
}
