use chrono::Duration;
use serde::{Deserialize, Serialize};

use super::ConfigError;

/// Ten years.
pub const MAX_TTL_HOURS: u32 = 87_600;

/// Invitation onboarding settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InvitationsConfig {
    /// Hours an unredeemed invitation stays valid.
    #[serde(default = "default_ttl_hours")]
    pub ttl_hours: u32,
}

impl Default for InvitationsConfig {
    fn default() -> Self {
        Self {
            ttl_hours: default_ttl_hours(),
        }
    }
}

impl InvitationsConfig {
    pub fn ttl(&self) -> Duration {
        Duration::hours(i64::from(self.ttl_hours))
    }

    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if self.ttl_hours == 0 {
            return Err(ConfigError::Validation(
                "invitations.ttl_hours must be greater than zero".into(),
            ));
        }
        if self.ttl_hours > MAX_TTL_HOURS {
            return Err(ConfigError::Validation(format!(
                "invitations.ttl_hours must be at most {MAX_TTL_HOURS}, got {}",
                self.ttl_hours
            )));
        }
        Ok(())
    }
}

// One week
fn default_ttl_hours() -> u32 {
    168
}
