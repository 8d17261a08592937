//! HTTPS transport to a remote secret store.
//!
//! A [`Transport`] owns one reqwest client bound to a base URL, a trust store
//! and an optional client identity. Key material is loaded once when the
//! transport is built. When a client identity is present the channel is
//! mutually authenticated and [`Transport::is_client_auth_enabled`] reports
//! it; write operations on the secret store depend on that.
//!
//! Requests are never retried and responses never cached.

mod error;
mod tls;

use std::time::{Duration, Instant};

pub use error::{TransportError, TransportResult};
use reqwest::{Client, Method, RequestBuilder};
use serde::Serialize;
pub use tls::{ClientIdentity, TrustStore};
use url::Url;

use crate::config::SecretStoreConfig;

/// Timeouts and identification for outgoing requests.
#[derive(Debug, Clone)]
pub struct TransportOptions {
    pub timeout: Duration,
    pub connect_timeout: Duration,
    pub user_agent: String,
}

impl Default for TransportOptions {
    fn default() -> Self {
        Self::from(&SecretStoreConfig::new(""))
    }
}

impl From<&SecretStoreConfig> for TransportOptions {
    fn from(config: &SecretStoreConfig) -> Self {
        Self {
            timeout: config.timeout(),
            connect_timeout: config.connect_timeout(),
            user_agent: config.user_agent.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Transport {
    client: Client,
    base_url: Url,
    client_auth_enabled: bool,
}

impl Transport {
    /// Build a transport. Fails with `SecurityConfiguration` if the base URL
    /// cannot carry request paths, a client identity is paired with a
    /// non-HTTPS URL, or the TLS material is rejected.
    pub fn connect(
        base_url: &str,
        trust: &TrustStore,
        identity: Option<ClientIdentity>,
        options: &TransportOptions,
    ) -> TransportResult<Self> {
        let base_url = Url::parse(base_url).map_err(|e| {
            TransportError::SecurityConfiguration(format!("invalid base URL '{base_url}': {e}"))
        })?;
        if base_url.cannot_be_a_base() {
            return Err(TransportError::SecurityConfiguration(format!(
                "base URL '{base_url}' cannot carry request paths"
            )));
        }

        let mut builder = Client::builder()
            .timeout(options.timeout)
            .connect_timeout(options.connect_timeout)
            .user_agent(&options.user_agent)
            .use_rustls_tls();
        builder = trust.apply(builder);

        // A certificate is only presented during a TLS handshake
        if identity.is_some() && base_url.scheme() != "https" {
            return Err(TransportError::SecurityConfiguration(format!(
                "client identity requires an https base URL, got '{base_url}'"
            )));
        }

        let client_auth_enabled = identity.is_some();
        if let Some(identity) = &identity {
            builder = identity.apply(builder);
        }

        let client = builder.build().map_err(|e| {
            TransportError::SecurityConfiguration(format!("failed to build HTTP client: {e}"))
        })?;

        tracing::debug!(
            base_url = %base_url,
            trusted_roots = trust.len(),
            client_auth = client_auth_enabled,
            "Built secret store transport"
        );

        Ok(Self {
            client,
            base_url,
            client_auth_enabled,
        })
    }

    /// Load TLS material named in `config` and build the transport.
    pub fn from_config(config: &SecretStoreConfig) -> TransportResult<Self> {
        let trust = TrustStore::from_config(config)?;
        let identity = ClientIdentity::from_config(config)?;
        Self::connect(
            &config.base_url,
            &trust,
            identity,
            &TransportOptions::from(config),
        )
    }

    /// Mark a plain transport as mutually authenticated so write paths can be
    /// exercised against a local mock server.
    #[cfg(test)]
    pub(crate) fn assume_client_auth(mut self) -> Self {
        self.client_auth_enabled = true;
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// True when the transport presents a client certificate.
    pub fn is_client_auth_enabled(&self) -> bool {
        self.client_auth_enabled
    }

    /// GET `path` and return the response body.
    pub async fn get(&self, path: &[&str]) -> TransportResult<String> {
        let url = self.url_for(path)?;
        let request = self.client.get(url.clone());
        self.execute(Method::GET, &url, request).await
    }

    /// POST `body` as JSON to `path` and return the response body.
    pub async fn post<B>(&self, path: &[&str], body: &B) -> TransportResult<String>
    where
        B: Serialize + ?Sized,
    {
        let url = self.url_for(path)?;
        let request = self.client.post(url.clone()).json(body);
        self.execute(Method::POST, &url, request).await
    }

    /// Append percent-encoded `segments` to the base URL.
    fn url_for(&self, segments: &[&str]) -> TransportResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| {
                TransportError::SecurityConfiguration(format!(
                    "base URL '{}' cannot carry request paths",
                    self.base_url
                ))
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn execute(
        &self,
        method: Method,
        url: &Url,
        request: RequestBuilder,
    ) -> TransportResult<String> {
        let start = Instant::now();

        let response = request.send().await.map_err(|e| {
            tracing::warn!(%method, path = url.path(), error = %e, "Secret store request failed");
            TransportError::from_reqwest(e)
        })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(TransportError::from_reqwest)?;

        tracing::debug!(
            %method,
            path = url.path(),
            status = status.as_u16(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Secret store request completed"
        );

        if !status.is_success() {
            return Err(TransportError::Remote { status, body });
        }
        Ok(body)
    }
}
