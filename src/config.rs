//! Session Event Configuration
//!
//! Limits and naming for the session event process, loadable from TOML.

use log::debug;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::fs;

/// Default stable name of the session event process
pub const DEFAULT_PROCESS_NAME: &str = "session_events";

/// Configuration for a [`SessionEventProcess`](crate::session::SessionEventProcess)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionEventsConfig {
    /// Stable name the process is registered under
    pub process_name: String,
    /// Maximum number of events waiting for dispatch
    pub queue_capacity: usize,
    /// Buffer size of the diagnostic broadcast channel
    pub diagnostics_capacity: usize,
    /// Reject endpoints that are not connection-oriented
    pub require_connection_oriented: bool,
}

impl Default for SessionEventsConfig {
    fn default() -> Self {
        Self {
            process_name: DEFAULT_PROCESS_NAME.to_string(),
            queue_capacity: 32,
            diagnostics_capacity: 64,
            require_connection_oriented: true,
        }
    }
}

impl SessionEventsConfig {
    /// Parse and validate a TOML document
    ///
    /// Keys may sit at the top level or under a `[session_events]` table.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let value: toml::Value = toml::from_str(content)?;

        let table = match value.get("session_events") {
            Some(section) => section.clone(),
            None => value,
        };

        let config: Self = table.try_into()?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    pub async fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).await?;
        let config = Self::from_toml_str(&content)?;
        debug!("Loaded session event config from {:?}", path);
        Ok(config)
    }

    /// Check limits that the runtime primitives cannot accept
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.process_name.trim().is_empty() {
            return Err(ConfigError::Invalid("process_name must not be empty".to_string()));
        }
        if self.queue_capacity == 0 {
            return Err(ConfigError::Invalid("queue_capacity must be greater than zero".to_string()));
        }
        if self.diagnostics_capacity == 0 {
            return Err(ConfigError::Invalid(
                "diagnostics_capacity must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
