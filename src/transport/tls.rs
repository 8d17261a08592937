//! Trust anchors and client identity for the automation channel.

use std::{fmt, path::Path};

use reqwest::{Certificate, ClientBuilder, Identity};

use super::{TransportError, TransportResult};
use crate::config::SecretStoreConfig;

/// Certificates used to verify the remote store.
#[derive(Clone)]
pub struct TrustStore {
    roots: Vec<Certificate>,
    use_builtin_roots: bool,
}

impl TrustStore {
    /// Only the built-in web PKI roots.
    pub fn builtin() -> Self {
        Self {
            roots: Vec::new(),
            use_builtin_roots: true,
        }
    }

    /// Trust the certificates in `bytes`: a PEM bundle, or a single DER
    /// certificate.
    pub fn from_ca_bytes(bytes: &[u8], use_builtin_roots: bool) -> TransportResult<Self> {
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Err(TransportError::SecurityConfiguration(
                "CA bundle is empty".into(),
            ));
        }

        let roots = if contains_pem_marker(bytes) {
            let certs = Certificate::from_pem_bundle(bytes).map_err(|e| {
                TransportError::SecurityConfiguration(format!("invalid PEM CA bundle: {e}"))
            })?;
            if certs.is_empty() {
                return Err(TransportError::SecurityConfiguration(
                    "CA bundle contains no certificates".into(),
                ));
            }
            certs
        } else {
            let cert = Certificate::from_der(bytes).map_err(|e| {
                TransportError::SecurityConfiguration(format!("invalid DER CA certificate: {e}"))
            })?;
            vec![cert]
        };

        Ok(Self {
            roots,
            use_builtin_roots,
        })
    }

    pub fn from_ca_file(path: &Path, use_builtin_roots: bool) -> TransportResult<Self> {
        let bytes = read_material(path, "CA bundle")?;
        Self::from_ca_bytes(&bytes, use_builtin_roots)
    }

    pub fn from_config(config: &SecretStoreConfig) -> TransportResult<Self> {
        match &config.ca_bundle {
            Some(path) => Self::from_ca_file(path, config.use_builtin_roots),
            None => Ok(Self::builtin()),
        }
    }

    pub fn len(&self) -> usize {
        self.roots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    pub(super) fn apply(&self, mut builder: ClientBuilder) -> ClientBuilder {
        builder = builder.tls_built_in_root_certs(self.use_builtin_roots);
        for cert in &self.roots {
            builder = builder.add_root_certificate(cert.clone());
        }
        builder
    }
}

impl fmt::Debug for TrustStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrustStore")
            .field("roots", &self.roots.len())
            .field("use_builtin_roots", &self.use_builtin_roots)
            .finish()
    }
}

/// Client certificate chain and private key presented to the store.
#[derive(Clone)]
pub struct ClientIdentity {
    identity: Identity,
}

impl ClientIdentity {
    pub fn from_pem(cert_chain: &[u8], private_key: &[u8]) -> TransportResult<Self> {
        let mut pem = Vec::with_capacity(cert_chain.len() + private_key.len() + 1);
        pem.extend_from_slice(cert_chain);
        pem.push(b'\n');
        pem.extend_from_slice(private_key);

        let identity = Identity::from_pem(&pem).map_err(|e| {
            TransportError::SecurityConfiguration(format!("invalid client certificate or key: {e}"))
        })?;
        Ok(Self { identity })
    }

    pub fn from_pem_files(cert_path: &Path, key_path: &Path) -> TransportResult<Self> {
        let cert = read_material(cert_path, "client certificate")?;
        let key = read_material(key_path, "client key")?;
        Self::from_pem(&cert, &key)
    }

    /// Load the identity named by `client_cert`/`client_key`, if any.
    pub fn from_config(config: &SecretStoreConfig) -> TransportResult<Option<Self>> {
        match (&config.client_cert, &config.client_key) {
            (Some(cert), Some(key)) => Self::from_pem_files(cert, key).map(Some),
            (None, None) => Ok(None),
            _ => Err(TransportError::SecurityConfiguration(
                "client_cert and client_key must be set together".into(),
            )),
        }
    }

    pub(super) fn apply(&self, builder: ClientBuilder) -> ClientBuilder {
        builder.identity(self.identity.clone())
    }
}

impl fmt::Debug for ClientIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ClientIdentity(..)")
    }
}

fn contains_pem_marker(bytes: &[u8]) -> bool {
    bytes.windows(11).any(|w| w == b"-----BEGIN ")
}

fn read_material(path: &Path, what: &str) -> TransportResult<Vec<u8>> {
    std::fs::read(path).map_err(|e| {
        TransportError::SecurityConfiguration(format!(
            "failed to read {what} {}: {e}",
            path.display()
        ))
    })
}
