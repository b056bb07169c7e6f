//! Service configuration
//!
//! Assembled from the environment with the `VERITAS_` prefix (nested keys
//! use `__`, e.g. `VERITAS_EMAIL__SMTP_HOST`). `validation_enabled` is the
//! deployment-level kill switch for the whole validation layer.

use anyhow::{Context, Result};
use monitoring::EmailConfig;
use serde::Deserialize;
use validation::ValidationConfig;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Optional Postgres DSN; without it the reliability and review stores
    /// run in-memory
    #[serde(default)]
    pub database_url: Option<String>,

    /// Feature flag: disable the entire validation layer with zero
    /// behavioral change to callers
    #[serde(default = "default_true")]
    pub validation_enabled: bool,

    /// SMTP settings for the operational alert address; log-only when absent
    #[serde(default)]
    pub email: Option<EmailConfig>,

    /// How often the monitoring rules are evaluated, in seconds
    #[serde(default = "default_rule_interval")]
    pub rule_interval_secs: u64,

    #[serde(default)]
    pub validation: ValidationConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            database_url: None,
            validation_enabled: true,
            email: None,
            rule_interval_secs: default_rule_interval(),
            validation: ValidationConfig::default(),
        }
    }
}

fn default_listen_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_true() -> bool {
    true
}

fn default_rule_interval() -> u64 {
    60
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let config = config::Config::builder()
            .add_source(
                config::Environment::with_prefix("VERITAS")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to read environment configuration")?;

        let mut app: AppConfig = config
            .try_deserialize()
            .context("Invalid configuration")?;
        // The flag gates the engine itself, not just the endpoint.
        app.validation.enabled = app.validation_enabled;
        Ok(app)
    }
}
