//! Timer service configuration
//!
//! Values come from an optional `timer.toml` in the working directory, then
//! from `TIMER_*` environment variables. `store_connection` falls back to
//! `DATABASE_URL` so the service can share the common database settings.

use std::time::Duration;

use anyhow::{Context, Result};
use common::database::DEFAULT_DATABASE_URL;
use config::{Config, Environment, File};
use serde::Deserialize;

use crate::service::SessionServiceConfig;

/// Settings of the timer service
#[derive(Debug, Clone, Deserialize)]
pub struct TimerConfig {
    /// Address the HTTP server binds to
    pub bind_address: String,
    /// PostgreSQL URL, or `memory://` for the in-memory store
    pub store_connection: String,
    /// Webhook approving extensions
    pub extension_gate_url: Option<String>,
    /// Webhook timeout in seconds
    pub gate_timeout_secs: u64,
    /// Upper bound of the PostgreSQL pool
    pub max_connections: u32,
}

impl TimerConfig {
    /// Load the configuration from `timer.toml` and the environment
    pub fn load() -> Result<Self> {
        let fallback_store =
            std::env::var("DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string());

        Self::from_sources(
            Environment::with_prefix("TIMER").try_parsing(true),
            &fallback_store,
        )
    }

    fn from_sources(environment: Environment, fallback_store: &str) -> Result<Self> {
        let config = Config::builder()
            .set_default("bind_address", "0.0.0.0:3001")?
            .set_default("store_connection", fallback_store)?
            .set_default("gate_timeout_secs", 10_i64)?
            .set_default("max_connections", 5_i64)?
            .add_source(File::with_name("timer").required(false))
            .add_source(environment)
            .build()
            .context("Failed to read timer configuration")?;

        let mut settings: TimerConfig = config
            .try_deserialize()
            .context("Invalid timer configuration")?;

        // An empty variable means "no gate", not a gate at "".
        settings.extension_gate_url = settings
            .extension_gate_url
            .filter(|url| !url.trim().is_empty());

        Ok(settings)
    }

    /// Settings handed to the session service
    pub fn session_service_config(&self) -> SessionServiceConfig {
        SessionServiceConfig {
            store_connection: self.store_connection.clone(),
            extension_gate_url: self.extension_gate_url.clone(),
            gate_timeout: Duration::from_secs(self.gate_timeout_secs),
            max_connections: self.max_connections,
        }
    }
}
