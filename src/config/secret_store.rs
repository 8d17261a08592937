use std::{collections::BTreeMap, path::PathBuf, time::Duration};

use serde::{Deserialize, Serialize};

use super::ConfigError;
use crate::auth::AuthDomain;

/// Remote secret stores keyed by authorization domain.
///
/// ```toml
/// [secret_stores.prod]
/// base_url = "https://keywhiz.prod.example.com:4444"
///
/// [secret_stores.nonprod]
/// base_url = "https://keywhiz.dev.example.com:4444"
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SecretStoresConfig(BTreeMap<AuthDomain, SecretStoreConfig>);

impl SecretStoresConfig {
    pub fn get(&self, domain: AuthDomain) -> Option<&SecretStoreConfig> {
        self.0.get(&domain)
    }

    pub fn insert(&mut self, domain: AuthDomain, config: SecretStoreConfig) {
        self.0.insert(domain, config);
    }

    pub fn iter(&self) -> impl Iterator<Item = (AuthDomain, &SecretStoreConfig)> {
        self.0.iter().map(|(domain, config)| (*domain, config))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        for (domain, store) in self.iter() {
            store
                .validate()
                .map_err(|e| ConfigError::Validation(format!("secret_stores.{domain}: {e}")))?;
        }
        Ok(())
    }
}

/// Connection settings for one remote secret store.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SecretStoreConfig {
    /// Root URL of the store, e.g. `https://keywhiz.example.com:4444`.
    /// The `/automation/v2` prefix is added per request.
    pub base_url: String,

    /// CA certificates used to verify the store (PEM bundle or a single DER
    /// certificate).
    #[serde(default)]
    pub ca_bundle: Option<PathBuf>,

    /// Also trust the built-in web PKI roots. Disable to pin trust to
    /// `ca_bundle` alone.
    #[serde(default = "default_true")]
    pub use_builtin_roots: bool,

    /// PEM certificate chain presented to the store (automation channel).
    #[serde(default)]
    pub client_cert: Option<PathBuf>,

    /// PEM private key for `client_cert`.
    #[serde(default)]
    pub client_key: Option<PathBuf>,

    /// Total request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Connection timeout in seconds.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl SecretStoreConfig {
    /// Minimal config for a store URL with default timeouts and no client
    /// identity.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ca_bundle: None,
            use_builtin_roots: true,
            client_cert: None,
            client_key: None,
            timeout_secs: default_timeout(),
            connect_timeout_secs: default_connect_timeout(),
            user_agent: default_user_agent(),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let url = url::Url::parse(&self.base_url)
            .map_err(|e| ConfigError::Validation(format!("invalid base_url: {e}")))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::Validation(format!(
                "base_url must use http or https, got '{}'",
                url.scheme()
            )));
        }
        if url.cannot_be_a_base() {
            return Err(ConfigError::Validation(
                "base_url cannot carry request paths".into(),
            ));
        }
        if self.timeout_secs == 0 || self.connect_timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "timeouts must be greater than zero".into(),
            ));
        }
        if self.client_cert.is_some() != self.client_key.is_some() {
            return Err(ConfigError::Validation(
                "client_cert and client_key must be set together".into(),
            ));
        }
        if self.client_cert.is_some() && url.scheme() != "https" {
            return Err(ConfigError::Validation(
                "client_cert and client_key require an https base_url".into(),
            ));
        }
        if self.ca_bundle.is_none() && !self.use_builtin_roots {
            return Err(ConfigError::Validation(
                "use_builtin_roots = false requires a ca_bundle".into(),
            ));
        }
        Ok(())
    }
}

fn default_true() -> bool {
    true
}

fn default_timeout() -> u64 {
    30
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_user_agent() -> String {
    format!("secretgate/{}", env!("CARGO_PKG_VERSION"))
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn parse(toml: &str) -> SecretStoreConfig {
        toml::from_str(toml).unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = parse(r#"base_url = "https://keywhiz:4444""#);
        assert_eq!(config.timeout(), Duration::from_secs(30));
        assert_eq!(config.connect_timeout(), Duration::from_secs(10));
        assert!(config.use_builtin_roots);
        assert!(config.client_cert.is_none());
        assert!(config.user_agent.starts_with("secretgate/"));
        assert!(config.validate().is_ok());
    }

    #[rstest]
    #[case::bad_url(r#"base_url = "not a url""#)]
    #[case::bad_scheme(r#"base_url = "ftp://keywhiz""#)]
    #[case::no_base(r#"base_url = "mailto:ops@example.com""#)]
    #[case::zero_timeout("base_url = \"https://keywhiz\"\ntimeout_secs = 0")]
    #[case::zero_connect_timeout("base_url = \"https://keywhiz\"\nconnect_timeout_secs = 0")]
    #[case::cert_without_key("base_url = \"https://keywhiz\"\nclient_cert = \"/tmp/c.pem\"")]
    #[case::key_without_cert("base_url = \"https://keywhiz\"\nclient_key = \"/tmp/k.pem\"")]
    #[case::identity_over_http(
        "base_url = \"http://keywhiz:4444\"\nclient_cert = \"/tmp/c.pem\"\nclient_key = \"/tmp/k.pem\""
    )]
    #[case::no_trust("base_url = \"https://keywhiz\"\nuse_builtin_roots = false")]
    fn test_invalid(#[case] toml: &str) {
        let config = parse(toml);
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_domain_keys() {
        let stores: SecretStoresConfig = toml::from_str(
            r#"
            [prod]
            base_url = "https://prod:4444"

            [NonProd]
            base_url = "https://dev:4444"
        "#,
        )
        .unwrap();

        assert_eq!(stores.len(), 2);
        assert_eq!(
            stores.get(AuthDomain::Nonprod).unwrap().base_url,
            "https://dev:4444"
        );
    }

    #[test]
    fn test_unknown_domain_rejected() {
        let result: Result<SecretStoresConfig, _> = toml::from_str(
            r#"
            [staging]
            base_url = "https://staging:4444"
        "#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_validation_names_domain() {
        let mut stores = SecretStoresConfig::default();
        stores.insert(AuthDomain::Prod, SecretStoreConfig::new("nope"));
        let err = stores.validate().unwrap_err();
        assert!(err.to_string().contains("secret_stores.prod"));
    }
}
