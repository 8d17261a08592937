//! Corporate directory collaborator.
//!
//! The LDAP wire protocol lives outside this crate. Resolution only needs
//! the handful of attributes captured in [`DirectoryRecord`], fetched through
//! the [`LdapClient`] trait. [`StaticDirectory`] serves records declared in
//! config for local development and tests.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::config::StaticUserConfig;

/// Attributes of one directory entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DirectoryRecord {
    pub distinguished_name: String,
    /// The `cn` attribute, when the directory returned one.
    pub common_name: Option<String>,
    /// DNs of the groups the entry belongs to.
    pub member_of: Vec<String>,
    pub modified_at: Option<DateTime<Utc>>,
}

impl DirectoryRecord {
    pub fn new(distinguished_name: impl Into<String>) -> Self {
        Self {
            distinguished_name: distinguished_name.into(),
            common_name: None,
            member_of: Vec::new(),
            modified_at: None,
        }
    }

    pub fn with_common_name(mut self, cn: impl Into<String>) -> Self {
        self.common_name = Some(cn.into());
        self
    }

    pub fn with_groups<I, S>(mut self, groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.member_of = groups.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_modified_at(mut self, at: DateTime<Utc>) -> Self {
        self.modified_at = Some(at);
        self
    }

    /// The entry's common name: the `cn` attribute if present and non-blank,
    /// otherwise the first `CN=` component of the distinguished name.
    pub fn display_name(&self) -> Option<String> {
        if let Some(cn) = &self.common_name
            && !cn.trim().is_empty()
        {
            return Some(cn.trim().to_string());
        }
        first_common_name(&self.distinguished_name)
    }
}

/// Directory query failures.
#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("directory I/O error: {0}")]
    Io(String),

    #[error("directory protocol error: {0}")]
    Protocol(String),
}

/// Directory search collaborator.
#[async_trait]
pub trait LdapClient: Send + Sync {
    /// Find entries for a username. Order is the directory's result order.
    async fn search_user(&self, username: &str) -> Result<Vec<DirectoryRecord>, DirectoryError>;
}

/// In-process directory backed by config entries.
///
/// Usernames match case-insensitively. Several entries may share a username,
/// which exercises the resolver's match policy.
#[derive(Debug, Default)]
pub struct StaticDirectory {
    users: HashMap<String, Vec<DirectoryRecord>>,
}

impl StaticDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(users: &[StaticUserConfig]) -> Self {
        let mut directory = Self::new();
        for user in users {
            directory.insert(
                &user.username,
                DirectoryRecord {
                    distinguished_name: user.distinguished_name.clone(),
                    common_name: user.common_name.clone(),
                    member_of: user.member_of.clone(),
                    modified_at: user.modified_at,
                },
            );
        }
        directory
    }

    pub fn insert(&mut self, username: &str, record: DirectoryRecord) {
        self.users
            .entry(username.trim().to_lowercase())
            .or_default()
            .push(record);
    }

    pub fn with_user(mut self, username: &str, record: DirectoryRecord) -> Self {
        self.insert(username, record);
        self
    }
}

#[async_trait]
impl LdapClient for StaticDirectory {
    async fn search_user(&self, username: &str) -> Result<Vec<DirectoryRecord>, DirectoryError> {
        Ok(self
            .users
            .get(&username.trim().to_lowercase())
            .cloned()
            .unwrap_or_default())
    }
}

/// First `CN` value of a distinguished name, honouring RFC 4514 escapes.
fn first_common_name(dn: &str) -> Option<String> {
    for rdn in split_unescaped(dn, b',') {
        // Multi-valued RDNs join attributes with '+'
        for ava in split_unescaped(rdn, b'+') {
            let Some((attr, value)) = ava.split_once('=') else {
                continue;
            };
            if attr.trim().eq_ignore_ascii_case("cn") {
                let value = unescape_dn_value(value.trim());
                if !value.is_empty() {
                    return Some(value);
                }
            }
        }
    }
    None
}

fn split_unescaped(input: &str, separator: u8) -> Vec<&str> {
    let bytes = input.as_bytes();
    let mut parts = Vec::new();
    let mut start = 0;
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b if b == separator => {
                parts.push(&input[start..i]);
                i += 1;
                start = i;
            }
            _ => i += 1,
        }
    }
    parts.push(&input[start.min(input.len())..]);
    parts
}

fn unescape_dn_value(value: &str) -> String {
    let bytes = value.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == b'\\' && i + 1 < bytes.len() {
            // Hex pair, e.g. \2C
            if i + 2 < bytes.len()
                && bytes[i + 1].is_ascii_hexdigit()
                && bytes[i + 2].is_ascii_hexdigit()
                && let Ok(byte) = u8::from_str_radix(&value[i + 1..i + 3], 16)
            {
                out.push(byte);
                i += 3;
                continue;
            }
            out.push(bytes[i + 1]);
            i += 2;
            continue;
        }
        out.push(bytes[i]);
        i += 1;
    }

    String::from_utf8_lossy(&out).into_owned()
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("CN=Alice Smith,OU=People,DC=example,DC=com", Some("Alice Smith"))]
    #[case("cn=bob,dc=example,dc=com", Some("bob"))]
    #[case("CN=Smith\\, Alice,OU=People,DC=example,DC=com", Some("Smith, Alice"))]
    #[case("CN=Smith\\2C Alice,OU=People", Some("Smith, Alice"))]
    #[case("UID=carol+CN=Carol Jones,OU=People", Some("Carol Jones"))]
    #[case("OU=People,CN=Team Lead,DC=example", Some("Team Lead"))]
    #[case("UID=dave,OU=People,DC=example,DC=com", None)]
    #[case("", None)]
    fn test_first_common_name(#[case] dn: &str, #[case] expected: Option<&str>) {
        assert_eq!(first_common_name(dn).as_deref(), expected);
    }

    #[test]
    fn test_display_name_prefers_attribute() {
        let record = DirectoryRecord::new("CN=asmith,OU=People,DC=example,DC=com")
            .with_common_name("Alice Smith");
        assert_eq!(record.display_name().as_deref(), Some("Alice Smith"));

        let record = DirectoryRecord::new("CN=asmith,OU=People").with_common_name("  ");
        assert_eq!(record.display_name().as_deref(), Some("asmith"));
    }

    #[tokio::test]
    async fn test_static_directory_case_insensitive() {
        let directory = StaticDirectory::new()
            .with_user("Alice", DirectoryRecord::new("CN=Alice,DC=example"))
            .with_user("alice", DirectoryRecord::new("CN=Alice Two,DC=example"));

        let records = directory.search_user("ALICE").await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].distinguished_name, "CN=Alice,DC=example");

        assert!(directory.search_user("bob").await.unwrap().is_empty());
    }
}
