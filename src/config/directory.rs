use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ConfigError;
use crate::auth::{AuthDomain, MatchPolicy};

/// Directory lookup and principal derivation settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DirectoryConfig {
    /// Domain assigned when no `domain_mappings` entry matches.
    #[serde(default)]
    pub default_domain: AuthDomain,

    /// How to pick a record when the directory returns several.
    #[serde(default)]
    pub match_policy: MatchPolicy,

    /// Group DN to authorization domain. First match wins.
    #[serde(default)]
    pub domain_mappings: Vec<DomainMapping>,

    /// Group DN to extra authorities granted on top of `ROLE_USER`.
    #[serde(default)]
    pub role_mappings: Vec<RoleMapping>,

    /// Static directory entries, used when no LDAP collaborator is wired in.
    #[serde(default)]
    pub users: Vec<StaticUserConfig>,
}

impl DirectoryConfig {
    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        for mapping in &self.domain_mappings {
            if mapping.group.trim().is_empty() {
                return Err(ConfigError::Validation(
                    "directory.domain_mappings: group cannot be empty".into(),
                ));
            }
        }
        for mapping in &self.role_mappings {
            if mapping.group.trim().is_empty() {
                return Err(ConfigError::Validation(
                    "directory.role_mappings: group cannot be empty".into(),
                ));
            }
            if mapping.roles.is_empty() || mapping.roles.iter().any(|r| r.trim().is_empty()) {
                return Err(ConfigError::Validation(format!(
                    "directory.role_mappings: '{}' must grant at least one non-empty role",
                    mapping.group
                )));
            }
        }
        for user in &self.users {
            if user.username.trim().is_empty() || user.distinguished_name.trim().is_empty() {
                return Err(ConfigError::Validation(
                    "directory.users: username and distinguished_name are required".into(),
                ));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DomainMapping {
    pub group: String,
    pub domain: AuthDomain,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RoleMapping {
    pub group: String,
    pub roles: Vec<String>,
}

/// A directory entry declared in config.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StaticUserConfig {
    pub username: String,
    pub distinguished_name: String,
    #[serde(default)]
    pub common_name: Option<String>,
    #[serde(default)]
    pub member_of: Vec<String>,
    #[serde(default)]
    pub modified_at: Option<DateTime<Utc>>,
}
