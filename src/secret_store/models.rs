//! Request and response bodies of the `/automation/v2` API.
//!
//! Field names are camelCase on the wire. Unknown fields are ignored and
//! optional fields default, so newer store versions keep decoding.

use std::collections::{BTreeMap, HashMap};

use base64::{Engine as _, engine::general_purpose::STANDARD};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupDetail {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub created_at_seconds: i64,
    #[serde(default)]
    pub updated_at_seconds: i64,
    #[serde(default)]
    pub created_by: Option<String>,
    #[serde(default)]
    pub updated_by: Option<String>,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientDetail {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub created_at_seconds: i64,
    #[serde(default)]
    pub updated_at_seconds: i64,
    /// Absent when the client never connected.
    #[serde(default)]
    pub last_seen_seconds: Option<i64>,
    #[serde(default)]
    pub created_by: Option<String>,
    #[serde(default)]
    pub updated_by: Option<String>,
}

/// Secret metadata. Never carries the secret content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecretDetail {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub checksum: Option<String>,
    #[serde(default)]
    pub created_at_seconds: i64,
    #[serde(default)]
    pub created_by: Option<String>,
    #[serde(default)]
    pub updated_at_seconds: i64,
    #[serde(default)]
    pub updated_by: Option<String>,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
    #[serde(default, rename = "type")]
    pub secret_type: Option<String>,
    /// Expiry as epoch seconds; 0 means none.
    #[serde(default)]
    pub expiry: i64,
    #[serde(default)]
    pub version: Option<i64>,
    #[serde(default)]
    pub content_created_at_seconds: Option<i64>,
    #[serde(default)]
    pub content_created_by: Option<String>,
}

/// Body of `POST secrets/{name}`.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrUpdateSecretRequest {
    /// Base64 of the raw secret bytes.
    pub content: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
    #[serde(default)]
    pub expiry: i64,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub secret_type: Option<String>,
}

impl CreateOrUpdateSecretRequest {
    /// Request carrying `content`, base64-encoded.
    pub fn with_content(content: impl AsRef<[u8]>) -> Self {
        Self {
            content: STANDARD.encode(content),
            ..Default::default()
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn expiry(mut self, epoch_seconds: i64) -> Self {
        self.expiry = epoch_seconds;
        self
    }

    pub fn secret_type(mut self, secret_type: impl Into<String>) -> Self {
        self.secret_type = Some(secret_type.into());
        self
    }
}

// Content stays out of debug output
impl std::fmt::Debug for CreateOrUpdateSecretRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CreateOrUpdateSecretRequest")
            .field("content", &"<redacted>")
            .field("description", &self.description)
            .field("metadata", &self.metadata)
            .field("expiry", &self.expiry)
            .field("secret_type", &self.secret_type)
            .finish()
    }
}

/// Body of `POST secrets`.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSecretRequest {
    pub name: String,
    pub content: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
    #[serde(default)]
    pub expiry: i64,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub secret_type: Option<String>,
    /// Groups the new secret is assigned to.
    #[serde(default)]
    pub groups: Vec<String>,
}

impl CreateSecretRequest {
    pub fn new(name: impl Into<String>, content: impl AsRef<[u8]>) -> Self {
        Self {
            name: name.into(),
            content: STANDARD.encode(content),
            ..Default::default()
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn expiry(mut self, epoch_seconds: i64) -> Self {
        self.expiry = epoch_seconds;
        self
    }

    pub fn secret_type(mut self, secret_type: impl Into<String>) -> Self {
        self.secret_type = Some(secret_type.into());
        self
    }

    pub fn group(mut self, group: impl Into<String>) -> Self {
        self.groups.push(group.into());
        self
    }
}

impl std::fmt::Debug for CreateSecretRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CreateSecretRequest")
            .field("name", &self.name)
            .field("content", &"<redacted>")
            .field("description", &self.description)
            .field("metadata", &self.metadata)
            .field("expiry", &self.expiry)
            .field("secret_type", &self.secret_type)
            .field("groups", &self.groups)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretContentsRequest {
    pub secrets: Vec<String>,
}

/// Contents for a batch of secrets. Names the store could not serve are
/// listed in `missing_secrets`; a partial answer is not an error.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecretContents {
    #[serde(default)]
    pub success_secrets: HashMap<String, String>,
    #[serde(default)]
    pub missing_secrets: Vec<String>,
}

impl SecretContents {
    pub fn is_empty(&self) -> bool {
        self.success_secrets.is_empty() && self.missing_secrets.is_empty()
    }
}

impl std::fmt::Debug for SecretContents {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<&String> = self.success_secrets.keys().collect();
        names.sort();
        f.debug_struct("SecretContents")
            .field("success_secrets", &names)
            .field("missing_secrets", &self.missing_secrets)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateClientRequest {
    pub name: String,
    pub description: String,
    pub groups: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateGroupRequest {
    pub name: String,
    pub description: String,
    pub metadata: BTreeMap<String, String>,
}
