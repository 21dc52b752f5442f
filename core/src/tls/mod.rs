/*
 * mod.rs
 * Copyright (C) 2026 The Posterer Authors
 *
 * This file is part of Posterer, a workbench for composing HTTP requests.
 *
 * Posterer is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * Posterer is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with Posterer.  If not, see <http://www.gnu.org/licenses/>.
 */

//! TLS material provider: turns a security level and an optional keystore selection into a
//! rustls client configuration for one request.
//!
//! INSECURE BY DESIGN. When a security level is set, the configuration trusts every server
//! certificate and every host name. Posterer is a manual testing tool for poking at endpoints
//! with broken or self-signed certificates; nothing here is suitable for a production client.
//!
//! Configuration problems (unknown protocol, unreadable keystore, missing alias, unusable key)
//! never fail the request. Each is written to the auditor with a category tag and the request
//! falls back to default transport settings.

mod resolver;
mod verifier;

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio_rustls::rustls::client::ClientConfig;
use tokio_rustls::rustls::crypto::{ring, CryptoProvider};
use tokio_rustls::rustls::sign::CertifiedKey;
use tokio_rustls::rustls::version::{TLS12, TLS13};
use tokio_rustls::rustls::SupportedProtocolVersion;

use crate::audit::Auditor;
use crate::keystore::{subject_name, KeyStoreError, KeyStoreMaterial};

pub use resolver::{AliasPolicy, ClientAuthResolver};
pub use verifier::PromiscuousVerifier;

static TLS12_ONLY: &[&SupportedProtocolVersion] = &[&TLS12];
static TLS13_ONLY: &[&SupportedProtocolVersion] = &[&TLS13];
static TLS_ANY: &[&SupportedProtocolVersion] = &[&TLS13, &TLS12];

/// Configuration failures. Audited and swallowed, never returned to the executor's caller.
#[derive(Debug, thiserror::Error)]
pub enum TlsConfigError {
    #[error("key management: {0}")]
    KeyManagement(String),
    #[error("no such algorithm: {0}")]
    NoSuchAlgorithm(String),
    #[error("keystore: {0}")]
    KeyStore(String),
    #[error("certificate: {0}")]
    Certificate(String),
    #[error("I/O: {0}")]
    Io(String),
}

impl TlsConfigError {
    /// Stable category tag written in front of the audit line.
    pub fn tag(&self) -> &'static str {
        match self {
            TlsConfigError::KeyManagement(_) => "KEY-MANAGEMENT",
            TlsConfigError::NoSuchAlgorithm(_) => "NO-SUCH-ALGORITHM",
            TlsConfigError::KeyStore(_) => "KEYSTORE",
            TlsConfigError::Certificate(_) => "CERTIFICATE",
            TlsConfigError::Io(_) => "IO",
        }
    }
}

impl From<KeyStoreError> for TlsConfigError {
    fn from(e: KeyStoreError) -> Self {
        match e {
            KeyStoreError::Io(io) => TlsConfigError::Io(io.to_string()),
            other => TlsConfigError::KeyStore(other.to_string()),
        }
    }
}

/// Keystore file plus the alias to present for client authentication.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyStoreSelection {
    pub path: PathBuf,
    pub password: String,
    pub alias: String,
}

impl KeyStoreSelection {
    pub fn new(path: impl Into<PathBuf>, password: impl Into<String>, alias: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            password: password.into(),
            alias: alias.into(),
        }
    }
}

/// Answers "did the server ask for a client certificate?" after the handshake.
#[derive(Debug, Clone, Default)]
pub struct ClientAuthProbe(Arc<AtomicBool>);

impl ClientAuthProbe {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn mark(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn observed(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Ready-to-use TLS configuration for one request.
#[derive(Debug, Clone)]
pub struct TlsMaterial {
    config: Arc<ClientConfig>,
    probe: ClientAuthProbe,
}

impl TlsMaterial {
    pub(crate) fn from_parts(config: Arc<ClientConfig>, probe: ClientAuthProbe) -> Self {
        Self { config, probe }
    }

    pub fn config(&self) -> Arc<ClientConfig> {
        self.config.clone()
    }

    pub fn probe(&self) -> &ClientAuthProbe {
        &self.probe
    }

    /// True if the server sent a certificate request during a handshake made with this config.
    pub fn needed_client_auth(&self) -> bool {
        self.probe.observed()
    }
}

pub(crate) fn crypto_provider() -> Arc<CryptoProvider> {
    Arc::new(ring::default_provider())
}

/// Map a security level name to rustls protocol versions.
pub fn protocol_versions(security: &str) -> Result<&'static [&'static SupportedProtocolVersion], TlsConfigError> {
    match security.trim().to_ascii_uppercase().as_str() {
        "TLSV1.2" => Ok(TLS12_ONLY),
        "TLSV1.3" => Ok(TLS13_ONLY),
        "TLS" => Ok(TLS_ANY),
        other => Err(TlsConfigError::NoSuchAlgorithm(format!(
            "{} SSLContext not available",
            if other.is_empty() { "<empty>" } else { security.trim() }
        ))),
    }
}

/// Build the custom TLS configuration for `security`, or `None` when the level is empty or
/// anything goes wrong (the failure is audited and logged).
pub fn provide(
    security: &str,
    keystore: Option<&KeyStoreSelection>,
    auditor: &Auditor,
) -> Option<TlsMaterial> {
    if security.trim().is_empty() {
        return None;
    }
    match build(security, keystore, auditor) {
        Ok(material) => {
            auditor.append(true, format!("TLS context {} ready", security.trim()));
            Some(material)
        }
        Err(e) => {
            tracing::warn!(tag = e.tag(), error = %e, "custom TLS unavailable, using default transport");
            auditor.append(true, format!("[{}] {}; falling back to default transport", e.tag(), e));
            None
        }
    }
}

fn build(
    security: &str,
    keystore: Option<&KeyStoreSelection>,
    auditor: &Auditor,
) -> Result<TlsMaterial, TlsConfigError> {
    let versions = protocol_versions(security)?;
    let provider = crypto_provider();
    let policy = match keystore {
        Some(selection) if !selection.alias.trim().is_empty() => {
            let material = KeyStoreMaterial::load(&selection.path, &selection.password)?;
            auditor.append(
                true,
                format!(
                    "keystore {} ({}) loaded with {} entries",
                    selection.path.display(),
                    material.kind(),
                    material.len()
                ),
            );
            forced_alias(&material, &selection.alias, &provider)?
        }
        _ => AliasPolicy::Observe,
    };
    let probe = ClientAuthProbe::new();
    let config = ClientConfig::builder_with_provider(provider.clone())
        .with_protocol_versions(versions)
        .map_err(|e| TlsConfigError::NoSuchAlgorithm(e.to_string()))?
        .dangerous()
        .with_custom_certificate_verifier(Arc::new(PromiscuousVerifier::new(provider, auditor.clone())))
        .with_client_cert_resolver(Arc::new(ClientAuthResolver::new(policy, probe.clone(), auditor.clone())));
    Ok(TlsMaterial {
        config: Arc::new(config),
        probe,
    })
}

fn forced_alias(
    material: &KeyStoreMaterial,
    alias: &str,
    provider: &CryptoProvider,
) -> Result<AliasPolicy, TlsConfigError> {
    let entry = material
        .entry(alias)
        .ok_or_else(|| TlsConfigError::KeyManagement(format!("alias '{}' not in keystore", alias)))?;
    let key = entry
        .private_key()
        .ok_or_else(|| TlsConfigError::KeyManagement(format!("alias '{}' has no private key", alias)))?;
    let leaf = entry
        .certificate()
        .ok_or_else(|| TlsConfigError::Certificate(format!("alias '{}' has no certificate", alias)))?;
    if x509_parser::parse_x509_certificate(leaf.as_ref()).is_err() {
        return Err(TlsConfigError::Certificate(format!(
            "alias '{}': {}",
            alias,
            subject_name(leaf.as_ref())
        )));
    }
    let signing_key = provider
        .key_provider
        .load_private_key(key)
        .map_err(|e| TlsConfigError::KeyManagement(format!("alias '{}': {}", alias, e)))?;
    Ok(AliasPolicy::Forced {
        alias: alias.to_string(),
        key: Arc::new(CertifiedKey::new(entry.chain().to_vec(), signing_key)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keystore::tests_support::{write_jks, write_p12};

    #[test]
    fn empty_security_means_no_custom_tls() {
        let a = Auditor::new();
        assert!(provide("", None, &a).is_none());
        assert!(provide("   ", None, &a).is_none());
        assert!(a.is_empty());
    }

    #[test]
    fn known_protocols_build() {
        for level in ["TLSv1.2", "tlsv1.3", "TLS"] {
            let a = Auditor::new();
            let m = provide(level, None, &a).expect(level);
            assert!(!m.needed_client_auth());
            assert!(a.render().contains("ready"));
        }
    }

    #[test]
    fn unknown_protocol_degrades_with_tag() {
        let a = Auditor::new();
        assert!(provide("SSLv3", None, &a).is_none());
        assert!(a.render().contains("[NO-SUCH-ALGORITHM]"));
    }

    #[test]
    fn wrong_keystore_password_degrades() {
        let (_dir, path) = write_jks("changeit", "client");
        let a = Auditor::new();
        let selection = KeyStoreSelection::new(&path, "wrong", "client");
        assert!(provide("TLSv1.2", Some(&selection), &a).is_none());
        assert!(a.render().contains("[KEYSTORE]"), "{}", a.render());
    }

    #[test]
    fn missing_keystore_file_degrades_as_io() {
        let a = Auditor::new();
        let selection = KeyStoreSelection::new("/nonexistent/posterer.jks", "x", "client");
        assert!(provide("TLSv1.2", Some(&selection), &a).is_none());
        assert!(a.render().contains("[IO]"));
    }

    #[test]
    fn unknown_alias_degrades_as_key_management() {
        let (_dir, path) = write_jks("changeit", "client");
        let a = Auditor::new();
        let selection = KeyStoreSelection::new(&path, "changeit", "nobody");
        assert!(provide("TLSv1.2", Some(&selection), &a).is_none());
        assert!(a.render().contains("[KEY-MANAGEMENT]"));
    }

    #[test]
    fn trusted_entry_without_key_degrades() {
        let (_dir, path) = write_jks("changeit", "client");
        let a = Auditor::new();
        let selection = KeyStoreSelection::new(&path, "changeit", "trusted-ca");
        assert!(provide("TLSv1.2", Some(&selection), &a).is_none());
        assert!(a.render().contains("has no private key"));
    }

    #[test]
    fn forced_alias_builds() {
        let (_dir, path) = write_jks("changeit", "client");
        let a = Auditor::new();
        let selection = KeyStoreSelection::new(&path, "changeit", "client");
        let material = provide("TLSv1.2", Some(&selection), &a);
        assert!(material.is_some(), "{}", a.render());
        assert!(a.render().contains("(JKS) loaded with 2 entries"));
    }

    #[test]
    fn forced_alias_from_pkcs12_builds() {
        let (_dir, path) = write_p12("changeit", "client", "client.p12");
        let a = Auditor::new();
        let selection = KeyStoreSelection::new(&path, "changeit", "client");
        assert!(provide("TLSv1.2", Some(&selection), &a).is_some(), "{}", a.render());
        let log = a.render();
        assert!(log.contains("(PKCS12) loaded with 1 entries"), "{}", log);
        assert!(log.contains("TLS context TLSv1.2 ready"), "{}", log);
        assert!(!log.contains("falling back"), "{}", log);
    }

    #[test]
    fn pkcs12_key_becomes_forced_policy() {
        let (_dir, path) = write_p12("changeit", "client", "client.p12");
        let material = KeyStoreMaterial::load(&path, "changeit").unwrap();
        let policy = forced_alias(&material, "client", &crypto_provider()).unwrap();
        assert!(matches!(policy, AliasPolicy::Forced { ref alias, .. } if alias == "client"));
    }

    #[test]
    fn pkcs12_wrong_password_degrades() {
        let (_dir, path) = write_p12("changeit", "client", "client.p12");
        let a = Auditor::new();
        let selection = KeyStoreSelection::new(&path, "wrong", "client");
        assert!(provide("TLSv1.2", Some(&selection), &a).is_none());
        assert!(a.render().contains("[KEYSTORE]"), "{}", a.render());
    }
}
