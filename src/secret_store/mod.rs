//! Client for a Keywhiz-style secret store's `/automation/v2` API.
//!
//! Reads work over any transport. Writes (creating secrets, clients and
//! groups) are refused before any I/O unless the transport presents a client
//! certificate. Responses are passed through without reordering or
//! filtering; secret content is never decoded or logged here.

mod error;
pub mod models;
mod registry;

use std::{collections::BTreeMap, sync::Arc};

pub use error::{SecretStoreError, SecretStoreResult};
pub use models::*;
pub use registry::{RegistryError, SecretStoreRegistry};
use serde::de::DeserializeOwned;

use crate::transport::Transport;

const API_ROOT: [&str; 2] = ["automation", "v2"];

#[derive(Debug, Clone)]
pub struct SecretStoreClient {
    transport: Arc<Transport>,
}

impl SecretStoreClient {
    pub fn new(transport: Arc<Transport>) -> Self {
        Self { transport }
    }

    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    pub fn is_client_auth_enabled(&self) -> bool {
        self.transport.is_client_auth_enabled()
    }

    /// Names of all clients.
    #[tracing::instrument(skip(self))]
    pub async fn list_clients(&self) -> SecretStoreResult<Vec<String>> {
        self.get_json(&["clients"], "client list").await
    }

    /// Names of all groups.
    #[tracing::instrument(skip(self))]
    pub async fn list_groups(&self) -> SecretStoreResult<Vec<String>> {
        self.get_json(&["groups"], "group list").await
    }

    #[tracing::instrument(skip(self))]
    pub async fn group_details(&self, group: &str) -> SecretStoreResult<GroupDetail> {
        check_name("group", group)?;
        self.get_json(&["groups", group], "group details").await
    }

    #[tracing::instrument(skip(self))]
    pub async fn clients_in_group(&self, group: &str) -> SecretStoreResult<Vec<ClientDetail>> {
        check_name("group", group)?;
        self.get_json(&["groups", group, "clients"], "group clients")
            .await
    }

    #[tracing::instrument(skip(self))]
    pub async fn client_details(&self, client: &str) -> SecretStoreResult<ClientDetail> {
        check_name("client", client)?;
        self.get_json(&["clients", client], "client details").await
    }

    #[tracing::instrument(skip(self))]
    pub async fn secrets_in_group(&self, group: &str) -> SecretStoreResult<Vec<SecretDetail>> {
        check_name("group", group)?;
        self.get_json(&["groups", group, "secrets"], "group secrets")
            .await
    }

    /// Create `name`, or add a new version if it exists.
    #[tracing::instrument(skip(self, request))]
    pub async fn create_or_update_secret(
        &self,
        name: &str,
        request: &CreateOrUpdateSecretRequest,
    ) -> SecretStoreResult<String> {
        self.require_client_auth("create_or_update_secret")?;
        check_name("secret", name)?;
        self.post(&["secrets", name], request).await
    }

    #[tracing::instrument(skip(self, request), fields(name = %request.name))]
    pub async fn create_secret(&self, request: &CreateSecretRequest) -> SecretStoreResult<String> {
        self.require_client_auth("create_secret")?;
        check_name("secret", &request.name)?;
        for group in &request.groups {
            check_name("group", group)?;
        }
        self.post(&["secrets"], request).await
    }

    #[tracing::instrument(skip(self))]
    pub async fn groups_for_secret(&self, secret: &str) -> SecretStoreResult<Vec<String>> {
        check_name("secret", secret)?;
        self.get_json(&["secrets", secret, "groups"], "secret groups")
            .await
    }

    #[tracing::instrument(skip(self))]
    pub async fn secret_details(&self, secret: &str) -> SecretStoreResult<SecretDetail> {
        check_name("secret", secret)?;
        self.get_json(&["secrets", secret], "secret details").await
    }

    /// Fetch the content of several secrets in one call.
    ///
    /// This is a read even though it is a POST. An empty `names` list returns
    /// an empty result without contacting the store.
    #[tracing::instrument(skip(self, names), fields(count = names.len()))]
    pub async fn secrets_content<S: AsRef<str>>(
        &self,
        names: &[S],
    ) -> SecretStoreResult<SecretContents> {
        if names.is_empty() {
            return Ok(SecretContents::default());
        }

        let mut secrets = Vec::with_capacity(names.len());
        for name in names {
            let name = name.as_ref();
            check_name("secret", name)?;
            secrets.push(name.to_string());
        }

        let body = self
            .transport
            .post(
                &path(&["secrets", "request", "contents"]),
                &SecretContentsRequest { secrets },
            )
            .await?;
        let contents: SecretContents = decode(&body, "secret contents")?;

        if !contents.missing_secrets.is_empty() {
            tracing::debug!(
                missing = contents.missing_secrets.len(),
                "Store did not return every requested secret"
            );
        }
        Ok(contents)
    }

    #[tracing::instrument(skip(self, description))]
    pub async fn create_client(
        &self,
        name: &str,
        description: &str,
        groups: &[String],
    ) -> SecretStoreResult<String> {
        self.require_client_auth("create_client")?;
        check_name("client", name)?;
        for group in groups {
            check_name("group", group)?;
        }

        let request = CreateClientRequest {
            name: name.to_string(),
            description: description.to_string(),
            groups: groups.to_vec(),
        };
        self.post(&["clients"], &request).await
    }

    #[tracing::instrument(skip(self, description, metadata))]
    pub async fn create_group(
        &self,
        name: &str,
        description: &str,
        metadata: BTreeMap<String, String>,
    ) -> SecretStoreResult<String> {
        self.require_client_auth("create_group")?;
        check_name("group", name)?;

        let request = CreateGroupRequest {
            name: name.to_string(),
            description: description.to_string(),
            metadata,
        };
        self.post(&["groups"], &request).await
    }

    fn require_client_auth(&self, operation: &'static str) -> SecretStoreResult<()> {
        if self.transport.is_client_auth_enabled() {
            Ok(())
        } else {
            tracing::warn!(operation, "Refusing write over a transport without client auth");
            Err(SecretStoreError::MutualTlsRequired { operation })
        }
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        segments: &[&str],
        what: &'static str,
    ) -> SecretStoreResult<T> {
        let body = self.transport.get(&path(segments)).await?;
        decode(&body, what)
    }

    async fn post<B: serde::Serialize>(
        &self,
        segments: &[&str],
        request: &B,
    ) -> SecretStoreResult<String> {
        Ok(self.transport.post(&path(segments), request).await?)
    }
}

fn path<'a>(segments: &[&'a str]) -> Vec<&'a str> {
    API_ROOT.iter().copied().chain(segments.iter().copied()).collect()
}

fn decode<T: DeserializeOwned>(body: &str, what: &'static str) -> SecretStoreResult<T> {
    serde_json::from_str(body).map_err(|source| SecretStoreError::Decode { what, source })
}

/// Names travel as single path segments; empty and dot segments would
/// change the addressed resource.
fn check_name(kind: &'static str, name: &str) -> SecretStoreResult<()> {
    if name.is_empty() || name == "." || name == ".." {
        return Err(SecretStoreError::InvalidName {
            kind,
            name: name.to_string(),
        });
    }
    Ok(())
}
