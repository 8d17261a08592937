use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::{
    AuthDomain, DirectoryRecord, IdentityError, IdentityResult, LdapClient, Principal, Role,
};
use crate::config::DirectoryConfig;

/// How to choose between several directory entries for one username.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchPolicy {
    /// Take the first entry in directory order.
    #[default]
    First,
    /// Take the entry with the latest `modified_at`. Ties and entries without
    /// a timestamp fall back to directory order.
    MostRecentlyModified,
    /// Refuse to choose.
    Reject,
}

/// Resolves usernames into [`Principal`]s through the directory.
pub struct IdentityResolver {
    directory: Arc<dyn LdapClient>,
    match_policy: MatchPolicy,
    default_domain: AuthDomain,
    /// (lower-cased group DN, domain)
    domain_mappings: Vec<(String, AuthDomain)>,
    /// (lower-cased group DN, authorities)
    role_mappings: Vec<(String, Vec<String>)>,
}

impl IdentityResolver {
    pub fn new(directory: Arc<dyn LdapClient>, config: &DirectoryConfig) -> Self {
        Self {
            directory,
            match_policy: config.match_policy,
            default_domain: config.default_domain,
            domain_mappings: config
                .domain_mappings
                .iter()
                .map(|m| (normalize_group(&m.group), m.domain))
                .collect(),
            role_mappings: config
                .role_mappings
                .iter()
                .map(|m| (normalize_group(&m.group), m.roles.clone()))
                .collect(),
        }
    }

    /// Look up `username` and build its principal.
    #[tracing::instrument(skip(self))]
    pub async fn resolve(&self, username: &str) -> IdentityResult<Principal> {
        let username = username.trim();
        if username.is_empty() {
            return Err(IdentityError::NotFound(String::new()));
        }

        let records = self.directory.search_user(username).await.map_err(|e| {
            tracing::warn!(error = %e, "Directory search failed");
            IdentityError::from(e)
        })?;

        let record = self.select(username, &records)?;

        let display_name = record
            .display_name()
            .unwrap_or_else(|| username.to_string());
        let roles = self.roles_for(record);
        let domain = self.domain_for(record);

        tracing::debug!(
            dn = %record.distinguished_name,
            domain = %domain,
            roles = roles.len(),
            "Resolved principal"
        );

        Principal::new(username, display_name, roles, domain)
    }

    fn select<'a>(
        &self,
        username: &str,
        records: &'a [DirectoryRecord],
    ) -> IdentityResult<&'a DirectoryRecord> {
        let first = match records {
            [] => return Err(IdentityError::NotFound(username.to_string())),
            [only] => return Ok(only),
            [first, ..] => first,
        };

        tracing::warn!(
            matches = records.len(),
            policy = ?self.match_policy,
            "Username matched several directory entries"
        );

        match self.match_policy {
            MatchPolicy::First => Ok(first),
            MatchPolicy::MostRecentlyModified => {
                let mut best = first;
                for candidate in &records[1..] {
                    // Option ordering puts None below any timestamp
                    if candidate.modified_at > best.modified_at {
                        best = candidate;
                    }
                }
                Ok(best)
            }
            MatchPolicy::Reject => Err(IdentityError::AmbiguousIdentity {
                username: username.to_string(),
                matches: records.len(),
            }),
        }
    }

    fn roles_for(&self, record: &DirectoryRecord) -> Vec<String> {
        let groups: Vec<String> = record.member_of.iter().map(|g| normalize_group(g)).collect();

        let mut roles = vec![Role::User.authority().to_string()];
        for (group, granted) in &self.role_mappings {
            if groups.contains(group) {
                roles.extend(granted.iter().cloned());
            }
        }
        roles
    }

    fn domain_for(&self, record: &DirectoryRecord) -> AuthDomain {
        let groups: Vec<String> = record.member_of.iter().map(|g| normalize_group(g)).collect();

        self.domain_mappings
            .iter()
            .find(|(group, _)| groups.contains(group))
            .map(|(_, domain)| *domain)
            .unwrap_or(self.default_domain)
    }
}

fn normalize_group(dn: &str) -> String {
    dn.trim().to_lowercase()
}
