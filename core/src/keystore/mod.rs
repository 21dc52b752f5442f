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

//! Keystore material for TLS client authentication: PKCS#12 and JKS files.
//!
//! A keystore is read and verified in full when it is loaded; a wrong password or a corrupt file
//! fails `KeyStoreMaterial::load` rather than surfacing later during a handshake.

mod jks;

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tokio_rustls::rustls::pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer};

/// First byte of a DER SEQUENCE, which every PKCS#12 PFX starts with.
const DER_SEQUENCE: u8 = 0x30;

/// Errors from reading a keystore file.
#[derive(Debug, thiserror::Error)]
pub enum KeyStoreError {
    #[error("keystore I/O: {0}")]
    Io(#[from] io::Error),
    #[error("malformed keystore: {0}")]
    Format(String),
    /// Integrity check or MAC failed: almost always a wrong password.
    #[error("keystore password incorrect or file tampered with")]
    Password,
    #[error("unsupported key protection: {0}")]
    UnsupportedKeyProtection(String),
    #[error("PKCS#12: {0}")]
    Pkcs12(String),
}

/// Keystore container format, inferred from the file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyStoreType {
    Pkcs12,
    Jks,
}

impl KeyStoreType {
    /// `.p12` and `.pfx` are PKCS#12; anything else is treated as JKS.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("p12") || ext.eq_ignore_ascii_case("pfx") => {
                KeyStoreType::Pkcs12
            }
            _ => KeyStoreType::Jks,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            KeyStoreType::Pkcs12 => "PKCS12",
            KeyStoreType::Jks => "JKS",
        }
    }
}

impl fmt::Display for KeyStoreType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One aliased entry: a certificate chain (leaf first) and, for key entries, the PKCS#8 key.
#[derive(Clone)]
pub struct KeyEntry {
    chain: Vec<CertificateDer<'static>>,
    key: Option<Vec<u8>>,
}

impl KeyEntry {
    pub(crate) fn new(chain: Vec<CertificateDer<'static>>, key: Option<Vec<u8>>) -> Self {
        Self { chain, key }
    }

    /// Leaf certificate, if any.
    pub fn certificate(&self) -> Option<&CertificateDer<'static>> {
        self.chain.first()
    }

    pub fn chain(&self) -> &[CertificateDer<'static>] {
        &self.chain
    }

    pub fn has_private_key(&self) -> bool {
        self.key.is_some()
    }

    /// Private key as rustls expects it. None for trusted-certificate entries.
    pub fn private_key(&self) -> Option<PrivateKeyDer<'static>> {
        self.key
            .as_ref()
            .map(|k| PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(k.clone())))
    }
}

impl fmt::Debug for KeyEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyEntry")
            .field("chain", &self.chain.len())
            .field("has_private_key", &self.key.is_some())
            .finish()
    }
}

/// A loaded keystore: alias to entry, plus where it came from.
#[derive(Debug, Clone)]
pub struct KeyStoreMaterial {
    path: PathBuf,
    password: String,
    kind: KeyStoreType,
    entries: BTreeMap<String, KeyEntry>,
}

impl KeyStoreMaterial {
    /// Read and fully decode the keystore at `path`.
    pub fn load(path: impl AsRef<Path>, password: &str) -> Result<Self, KeyStoreError> {
        let path = path.as_ref();
        let data = fs::read(path)?;
        let mut material = Self::from_bytes(KeyStoreType::from_path(path), &data, password)?;
        material.path = path.to_path_buf();
        tracing::debug!(
            path = %path.display(),
            kind = %material.kind,
            entries = material.entries.len(),
            "keystore loaded"
        );
        Ok(material)
    }

    /// Decode keystore bytes. `kind` is the type implied by the file name; a JKS-named file that
    /// holds PKCS#12 (keytool's default format since Java 9) is read as PKCS#12, and `kind()`
    /// reports the format actually found.
    pub fn from_bytes(kind: KeyStoreType, data: &[u8], password: &str) -> Result<Self, KeyStoreError> {
        let kind = match kind {
            KeyStoreType::Jks if !jks::has_magic(data) && data.first() == Some(&DER_SEQUENCE) => {
                KeyStoreType::Pkcs12
            }
            other => other,
        };
        let entries = match kind {
            KeyStoreType::Jks => jks::decode(data, password)?,
            KeyStoreType::Pkcs12 => decode_pkcs12(data, password)?,
        };
        Ok(Self {
            path: PathBuf::new(),
            password: password.to_string(),
            kind,
            entries,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn password(&self) -> &str {
        &self.password
    }

    pub fn kind(&self) -> KeyStoreType {
        self.kind
    }

    /// Aliases in sorted order.
    pub fn aliases(&self) -> Vec<&str> {
        self.entries.keys().map(String::as_str).collect()
    }

    pub fn entry(&self, alias: &str) -> Option<&KeyEntry> {
        self.entries.get(alias)
    }

    /// Leaf certificate for `alias`.
    pub fn certificate(&self, alias: &str) -> Option<&CertificateDer<'static>> {
        self.entry(alias).and_then(KeyEntry::certificate)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn decode_pkcs12(data: &[u8], password: &str) -> Result<BTreeMap<String, KeyEntry>, KeyStoreError> {
    use p12_keystore::{KeyStore, KeyStoreEntry};

    let store = KeyStore::from_pkcs12(data, password).map_err(|e| match e {
        p12_keystore::error::Error::MacError(_) => KeyStoreError::Password,
        other => KeyStoreError::Pkcs12(other.to_string()),
    })?;
    let mut entries = BTreeMap::new();
    for (alias, entry) in store.entries() {
        let key_entry = match entry {
            KeyStoreEntry::PrivateKeyChain(chain) => KeyEntry::new(
                chain
                    .chain()
                    .iter()
                    .map(|c| CertificateDer::from(c.as_der().to_vec()))
                    .collect(),
                Some(chain.key().to_vec()),
            ),
            KeyStoreEntry::Certificate(cert) => {
                KeyEntry::new(vec![CertificateDer::from(cert.as_der().to_vec())], None)
            }
            #[allow(unreachable_patterns)]
            _ => continue,
        };
        entries.insert(alias.clone(), key_entry);
    }
    Ok(entries)
}

/// Subject distinguished name of a DER certificate, for audit lines. Falls back to a size note
/// when the certificate does not parse.
pub fn subject_name(der: &[u8]) -> String {
    match x509_parser::parse_x509_certificate(der) {
        Ok((_, cert)) => cert.subject().to_string(),
        Err(_) => format!("<unparseable certificate, {} bytes>", der.len()),
    }
}
