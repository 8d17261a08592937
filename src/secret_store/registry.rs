use std::{collections::HashMap, sync::Arc};

use thiserror::Error;

use super::{SecretStoreClient, SecretStoreError};
use crate::{
    auth::{AuthDomain, Principal},
    config::SecretStoresConfig,
    transport::Transport,
};

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("no secret store configured for domain '{0}'")]
    DomainNotConfigured(AuthDomain),

    #[error(transparent)]
    Store(#[from] SecretStoreError),
}

/// One secret store client per authorization domain.
#[derive(Debug, Clone, Default)]
pub struct SecretStoreRegistry {
    clients: HashMap<AuthDomain, SecretStoreClient>,
}

impl SecretStoreRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a transport for every configured store. Any store whose TLS
    /// material fails to load aborts the whole registry.
    pub fn from_config(config: &SecretStoresConfig) -> Result<Self, RegistryError> {
        let mut registry = Self::new();
        for (domain, store) in config.iter() {
            let transport = Transport::from_config(store).map_err(|e| {
                tracing::error!(%domain, error = %e, "Failed to initialize secret store transport");
                SecretStoreError::from(e)
            })?;

            tracing::info!(
                %domain,
                base_url = %store.base_url,
                client_auth = transport.is_client_auth_enabled(),
                "Secret store configured"
            );
            registry.insert(domain, SecretStoreClient::new(Arc::new(transport)));
        }
        Ok(registry)
    }

    pub fn insert(&mut self, domain: AuthDomain, client: SecretStoreClient) {
        self.clients.insert(domain, client);
    }

    pub fn client_for(&self, domain: AuthDomain) -> Result<&SecretStoreClient, RegistryError> {
        self.clients
            .get(&domain)
            .ok_or(RegistryError::DomainNotConfigured(domain))
    }

    /// The store serving the principal's domain.
    pub fn for_principal(&self, principal: &Principal) -> Result<&SecretStoreClient, RegistryError> {
        self.client_for(principal.auth_domain())
    }

    pub fn domains(&self) -> impl Iterator<Item = AuthDomain> + '_ {
        self.clients.keys().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}
