use std::sync::Arc;

use thiserror::Error;

use crate::{
    auth::{IdentityError, IdentityResolver, LdapClient, Principal, StaticDirectory},
    config::{DatabaseConfig, ProxyConfig},
    db::{DbError, DbPool, InvitationRepo, MemoryInvitationRepo},
    secret_store::{RegistryError, SecretStoreClient, SecretStoreRegistry},
    services::InvitationService,
};

#[derive(Debug, Error)]
pub enum StateError {
    #[error("Failed to initialize database: {0}")]
    Database(#[from] DbError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Identity(#[from] IdentityError),
}

/// Everything a request handler needs, built once from config.
///
/// All members are cheap to clone and safe to share across tasks.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ProxyConfig>,
    pub db: Option<Arc<DbPool>>,
    pub resolver: Arc<IdentityResolver>,
    pub secret_stores: Arc<SecretStoreRegistry>,
    pub invitations: InvitationService,
}

impl AppState {
    /// Build state with the static directory declared under `[directory]`.
    pub async fn new(config: ProxyConfig) -> Result<Self, StateError> {
        let directory = Arc::new(StaticDirectory::from_config(&config.directory.users));
        Self::with_directory(config, directory).await
    }

    /// Build state around an externally supplied directory client.
    pub async fn with_directory(
        config: ProxyConfig,
        directory: Arc<dyn LdapClient>,
    ) -> Result<Self, StateError> {
        let (db, invitation_repo): (Option<Arc<DbPool>>, Arc<dyn InvitationRepo>) =
            match &config.database {
                DatabaseConfig::None => {
                    tracing::warn!(
                        "No database configured. Invitations are kept in memory and will \
                         not survive a restart."
                    );
                    (None, Arc::new(MemoryInvitationRepo::new()))
                }
                #[allow(unreachable_patterns)]
                _ => {
                    let pool = DbPool::from_config(&config.database).await?;
                    if config.database.run_migrations() {
                        pool.run_migrations().await?;
                    }
                    let repo = pool.invitations();
                    (Some(Arc::new(pool)), repo)
                }
            };

        let secret_stores = SecretStoreRegistry::from_config(&config.secret_stores)?;
        if secret_stores.is_empty() {
            tracing::warn!("No secret stores configured");
        }

        let resolver = IdentityResolver::new(directory, &config.directory);
        let invitations = InvitationService::new(invitation_repo, &config.invitations);

        tracing::debug!(
            database = db.is_some(),
            invitation_ttl_hours = config.invitations.ttl_hours,
            "Application state initialized"
        );

        Ok(Self {
            config: Arc::new(config),
            db,
            resolver: Arc::new(resolver),
            secret_stores: Arc::new(secret_stores),
            invitations,
        })
    }

    /// Resolve `username` and pick the secret store serving its domain.
    pub async fn store_for_user(
        &self,
        username: &str,
    ) -> Result<(Principal, &SecretStoreClient), StateError> {
        let principal = self.resolver.resolve(username).await?;
        let client = self.secret_stores.for_principal(&principal)?;
        Ok((principal, client))
    }
}
