//! Configuration module for the secrets proxy.
//!
//! The proxy is configured via a TOML file, with support for environment
//! variable interpolation using `${VAR_NAME}` syntax.
//!
//! # Example
//!
//! ```toml
//! [database]
//! type = "sqlite"
//! path = "secretgate.db"
//!
//! [directory]
//! default_domain = "prod"
//!
//! [secret_stores.prod]
//! base_url = "https://keywhiz.example.com:4444"
//! ca_bundle = "/etc/secretgate/keywhiz-ca.pem"
//! client_cert = "/etc/secretgate/automation.crt"
//! client_key = "${AUTOMATION_KEY_PATH}"
//! ```

mod database;
mod directory;
mod invitations;
mod observability;
mod secret_store;

use std::path::Path;

pub use database::*;
pub use directory::*;
pub use invitations::*;
pub use observability::*;
pub use secret_store::*;
use serde::{Deserialize, Serialize};

/// Root configuration for the secrets proxy.
///
/// All sections are optional with defaults, but at least one secret store
/// must be configured for the proxy to forward anything.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProxyConfig {
    /// Database configuration for invitation storage.
    /// If omitted, invitations are kept in memory (local dev only).
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Directory lookup and principal derivation.
    #[serde(default)]
    pub directory: DirectoryConfig,

    /// Invitation onboarding settings.
    #[serde(default)]
    pub invitations: InvitationsConfig,

    /// Remote secret stores, one per authorization domain.
    #[serde(default)]
    pub secret_stores: SecretStoresConfig,

    /// Observability configuration (logging).
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl ProxyConfig {
    /// Load configuration from a TOML file.
    ///
    /// Environment variables in the format `${VAR_NAME}` are expanded.
    /// Missing required variables will cause an error.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::Io(e, path.as_ref().to_path_buf()))?;

        Self::from_str(&contents)
    }

    /// Parse configuration from a TOML string.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(contents: &str) -> Result<Self, ConfigError> {
        let expanded = expand_env_vars(contents)?;

        let config: ProxyConfig = toml::from_str(&expanded).map_err(ConfigError::Parse)?;
        config.validate()?;

        Ok(config)
    }

    /// Validate the configuration for consistency and completeness.
    fn validate(&self) -> Result<(), ConfigError> {
        self.database.validate()?;
        self.directory.validate()?;
        self.invitations.validate()?;
        self.secret_stores.validate()?;
        Ok(())
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {1}: {0}")]
    Io(std::io::Error, std::path::PathBuf),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Environment variable not found: {0}")]
    EnvVarNotFound(String),

    #[error("Configuration validation error: {0}")]
    Validation(String),
}

/// Expand environment variables in the format `${VAR_NAME}`.
/// Skips commented lines (lines where content before the variable is a comment).
fn expand_env_vars(input: &str) -> Result<String, ConfigError> {
    let re = regex::Regex::new(r"\$\{([^}]+)\}")
        .map_err(|e| ConfigError::Validation(format!("invalid env pattern: {e}")))?;
    let mut result = String::with_capacity(input.len());

    for line in input.lines() {
        let comment_pos = line.find('#');

        let mut line_result = String::with_capacity(line.len());
        let mut last_end = 0;

        for cap in re.captures_iter(line) {
            let Some(whole) = cap.get(0) else {
                continue;
            };

            // Skip if this variable is inside a comment
            if let Some(pos) = comment_pos
                && whole.start() >= pos
            {
                continue;
            }

            line_result.push_str(&line[last_end..whole.start()]);

            let var_name = &cap[1];
            let value = std::env::var(var_name)
                .map_err(|_| ConfigError::EnvVarNotFound(var_name.to_string()))?;
            line_result.push_str(&value);

            last_end = whole.end();
        }

        line_result.push_str(&line[last_end..]);
        result.push_str(&line_result);
        result.push('\n');
    }

    // Remove trailing newline if input didn't have one
    if !input.ends_with('\n') && result.ends_with('\n') {
        result.pop();
    }

    Ok(result)
}
