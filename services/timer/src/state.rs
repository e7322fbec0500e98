//! Application state shared across handlers

use crate::service::SessionService;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub session_service: SessionService,
}

impl AppState {
    pub fn new(session_service: SessionService) -> Self {
        Self { session_service }
    }
}
