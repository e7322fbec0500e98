//! Display configuration
//!
//! Read from an optional `timer-display.toml`, then `TIMER_DISPLAY_*`
//! environment variables. A command-line argument overrides the access token.

use std::time::Duration;

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;

use crate::display::Resolve;

/// Settings of the timer display
#[derive(Debug, Clone, Deserialize)]
pub struct DisplayConfig {
    /// Base URL of the timer API
    pub api_base_url: String,
    /// Token identifying the owner of the session
    pub access_token: String,
    /// Member identifier forwarded with extension requests
    pub member_id: Option<String>,
    /// Start a session instead of waiting for one
    pub create: bool,
    /// Seconds between polls while waiting for a session
    pub poll_interval_secs: u64,
    /// HTTP timeout in seconds
    pub request_timeout_secs: u64,
}

impl DisplayConfig {
    /// Load the configuration, letting `access_token` override the sources
    pub fn load(access_token: Option<String>) -> Result<Self> {
        Self::from_sources(
            Environment::with_prefix("TIMER_DISPLAY").try_parsing(true),
            access_token,
        )
    }

    fn from_sources(environment: Environment, access_token: Option<String>) -> Result<Self> {
        let config = Config::builder()
            .set_default("api_base_url", "http://localhost:3001")?
            .set_default("create", true)?
            .set_default("poll_interval_secs", 2_i64)?
            .set_default("request_timeout_secs", 10_i64)?
            .add_source(File::with_name("timer-display").required(false))
            .add_source(environment)
            .set_override_option("access_token", access_token)?
            .build()
            .context("Failed to read display configuration")?;

        let settings: DisplayConfig = config
            .try_deserialize()
            .context("Access token required (argument or TIMER_DISPLAY_ACCESS_TOKEN)")?;

        if settings.access_token.trim().is_empty() {
            anyhow::bail!("Access token required");
        }

        Ok(settings)
    }

    /// How the session is obtained
    pub fn resolve(&self) -> Resolve {
        if self.create {
            Resolve::Create {
                access_token: self.access_token.clone(),
            }
        } else {
            Resolve::Poll {
                access_token: self.access_token.clone(),
                interval: Duration::from_secs(self.poll_interval_secs.max(1)),
            }
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn load_with(vars: &[(&str, &str)], token: Option<&str>) -> Result<DisplayConfig> {
        let source = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect::<config::Map<String, String>>();

        DisplayConfig::from_sources(
            Environment::with_prefix("TIMER_DISPLAY")
                .try_parsing(true)
                .source(Some(source)),
            token.map(str::to_string),
        )
    }

    #[test]
    fn test_argument_token_with_defaults() {
        let config = load_with(&[], Some("tok1")).unwrap();
        assert_eq!(config.access_token, "tok1");
        assert_eq!(config.api_base_url, "http://localhost:3001");
        assert!(config.create);
        assert!(matches!(config.resolve(), Resolve::Create { .. }));
    }

    #[test]
    fn test_argument_overrides_environment_token() {
        let config =
            load_with(&[("TIMER_DISPLAY_ACCESS_TOKEN", "from-env")], Some("tok1")).unwrap();
        assert_eq!(config.access_token, "tok1");
    }

    #[test]
    fn test_poll_mode_from_environment() {
        let config = load_with(
            &[
                ("TIMER_DISPLAY_ACCESS_TOKEN", "tok1"),
                ("TIMER_DISPLAY_CREATE", "false"),
                ("TIMER_DISPLAY_POLL_INTERVAL_SECS", "5"),
            ],
            None,
        )
        .unwrap();

        match config.resolve() {
            Resolve::Poll { interval, .. } => assert_eq!(interval, Duration::from_secs(5)),
            other => panic!("expected polling, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_token_is_an_error() {
        assert!(load_with(&[], None).is_err());
        assert!(load_with(&[], Some("  ")).is_err());
    }
}
