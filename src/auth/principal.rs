//! The authenticated actor produced by identity resolution.
//!
//! A [`Principal`] is built once per authentication from a directory record
//! and never persisted. It carries the authorities granted to the caller and
//! the [`AuthDomain`] whose secret store serves it.

use std::{collections::BTreeSet, fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use super::IdentityError;

/// Authorization domain. Each domain is served by its own remote secret
/// store.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(try_from = "String", into = "String")]
pub enum AuthDomain {
    #[default]
    Prod,
    Nonprod,
}

impl AuthDomain {
    pub const ALL: [AuthDomain; 2] = [AuthDomain::Prod, AuthDomain::Nonprod];

    pub fn as_str(&self) -> &'static str {
        match self {
            AuthDomain::Prod => "prod",
            AuthDomain::Nonprod => "nonprod",
        }
    }
}

impl fmt::Display for AuthDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown auth domain '{0}' (expected 'prod' or 'nonprod')")]
pub struct ParseAuthDomainError(String);

impl FromStr for AuthDomain {
    type Err = ParseAuthDomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "prod" => Ok(AuthDomain::Prod),
            "nonprod" => Ok(AuthDomain::Nonprod),
            _ => Err(ParseAuthDomainError(s.to_string())),
        }
    }
}

impl TryFrom<String> for AuthDomain {
    type Error = ParseAuthDomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<AuthDomain> for String {
    fn from(domain: AuthDomain) -> Self {
        domain.as_str().to_string()
    }
}

/// Authorities granted by this proxy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Admin,
}

impl Role {
    pub fn authority(&self) -> &'static str {
        match self {
            Role::User => "ROLE_USER",
            Role::Admin => "ROLE_ADMIN",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.authority())
    }
}

/// The authenticated actor making a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Principal {
    username: String,
    display_name: String,
    roles: BTreeSet<String>,
    auth_domain: AuthDomain,
}

impl Principal {
    /// Build a principal. Fails if `roles` is empty or the username is blank.
    pub fn new(
        username: impl Into<String>,
        display_name: impl Into<String>,
        roles: impl IntoIterator<Item = String>,
        auth_domain: AuthDomain,
    ) -> Result<Self, IdentityError> {
        let username = username.into();
        if username.trim().is_empty() {
            return Err(IdentityError::InvalidPrincipal(
                "username cannot be empty".into(),
            ));
        }

        let roles: BTreeSet<String> = roles
            .into_iter()
            .filter(|r| !r.trim().is_empty())
            .collect();
        if roles.is_empty() {
            return Err(IdentityError::InvalidPrincipal(format!(
                "principal '{username}' must hold at least one role"
            )));
        }

        Ok(Self {
            username,
            display_name: display_name.into(),
            roles,
            auth_domain,
        })
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn roles(&self) -> impl Iterator<Item = &str> {
        self.roles.iter().map(String::as_str)
    }

    pub fn auth_domain(&self) -> AuthDomain {
        self.auth_domain
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.has_authority(role.authority())
    }

    pub fn has_authority(&self, authority: &str) -> bool {
        self.roles.contains(authority)
    }
}
