/*
 * jks.rs
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

//! Java KeyStore (JKS) decoder.
//!
//! Layout (big-endian): magic 0xFEEDFEED, version (1 or 2), entry count, entries, then a SHA-1
//! integrity digest over `password (UTF-16BE) || "Mighty Aphrodite" || everything before it`.
//! Private keys are protected with Sun's key protector (OID 1.3.6.1.4.1.42.2.17.1.1): a SHA-1
//! keystream seeded by a 20-byte salt, followed by a SHA-1 check digest of the plain key.

use std::collections::BTreeMap;

use sha1::{Digest, Sha1};
use tokio_rustls::rustls::pki_types::CertificateDer;

use super::{KeyEntry, KeyStoreError};

const MAGIC: u32 = 0xFEED_FEED;

/// Whether `data` starts with the JKS magic number.
pub(super) fn has_magic(data: &[u8]) -> bool {
    data.starts_with(&MAGIC.to_be_bytes())
}
const PRIVATE_KEY_TAG: u32 = 1;
const TRUSTED_CERT_TAG: u32 = 2;
const WHITENER: &[u8] = b"Mighty Aphrodite";
const DIGEST_LEN: usize = 20;
/// DER content of OID 1.3.6.1.4.1.42.2.17.1.1.
const KEY_PROTECTOR_OID: &[u8] = &[0x2b, 0x06, 0x01, 0x04, 0x01, 0x2a, 0x02, 0x11, 0x01, 0x01];

fn format_err(msg: &str) -> KeyStoreError {
    KeyStoreError::Format(msg.to_string())
}

/// Password as Java hands it to the digest: each UTF-16 unit big-endian.
fn password_bytes(password: &str) -> Vec<u8> {
    password.encode_utf16().flat_map(|u| u.to_be_bytes()).collect()
}

struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], KeyStoreError> {
        if self.data.len() - self.pos < n {
            return Err(format_err("truncated JKS"));
        }
        let out = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    fn u16(&mut self) -> Result<u16, KeyStoreError> {
        let b = self.take(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    fn u32(&mut self) -> Result<u32, KeyStoreError> {
        let b = self.take(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn u64(&mut self) -> Result<u64, KeyStoreError> {
        let b = self.take(8)?;
        let mut a = [0u8; 8];
        a.copy_from_slice(b);
        Ok(u64::from_be_bytes(a))
    }

    /// Java `writeUTF` string (modified UTF-8 treated as UTF-8).
    fn utf(&mut self) -> Result<String, KeyStoreError> {
        let len = self.u16()? as usize;
        Ok(String::from_utf8_lossy(self.take(len)?).into_owned())
    }

    fn blob(&mut self) -> Result<&'a [u8], KeyStoreError> {
        let len = self.u32()? as usize;
        self.take(len)
    }

    fn certificate(&mut self, version: u32) -> Result<CertificateDer<'static>, KeyStoreError> {
        if version == 2 {
            let cert_type = self.utf()?;
            if cert_type != "X.509" {
                return Err(KeyStoreError::Format(format!("certificate type {}", cert_type)));
            }
        }
        Ok(CertificateDer::from(self.blob()?.to_vec()))
    }
}

/// Decode a JKS file. Fails with `Password` when the integrity digest does not match.
pub(super) fn decode(data: &[u8], password: &str) -> Result<BTreeMap<String, KeyEntry>, KeyStoreError> {
    if data.len() < 12 + DIGEST_LEN {
        return Err(format_err("file too short for JKS"));
    }
    let pw = password_bytes(password);
    let (body, stored_digest) = data.split_at(data.len() - DIGEST_LEN);
    let mut hasher = Sha1::new();
    hasher.update(&pw);
    hasher.update(WHITENER);
    hasher.update(body);
    let digest = hasher.finalize();

    let mut r = Reader::new(body);
    if r.u32()? != MAGIC {
        return Err(format_err("bad JKS magic"));
    }
    if digest.as_slice() != stored_digest {
        return Err(KeyStoreError::Password);
    }
    let version = r.u32()?;
    if version != 1 && version != 2 {
        return Err(KeyStoreError::Format(format!("JKS version {}", version)));
    }
    let count = r.u32()?;
    let mut entries = BTreeMap::new();
    for _ in 0..count {
        let tag = r.u32()?;
        let alias = r.utf()?;
        let _created_millis = r.u64()?;
        let entry = match tag {
            PRIVATE_KEY_TAG => {
                let protected = r.blob()?;
                let chain_len = r.u32()?;
                let mut chain = Vec::with_capacity(chain_len as usize);
                for _ in 0..chain_len {
                    chain.push(r.certificate(version)?);
                }
                let key = recover_key(protected, &pw)?;
                KeyEntry::new(chain, Some(key))
            }
            TRUSTED_CERT_TAG => KeyEntry::new(vec![r.certificate(version)?], None),
            other => return Err(KeyStoreError::Format(format!("entry tag {}", other))),
        };
        entries.insert(alias, entry);
    }
    Ok(entries)
}

/// Minimal DER walk: expect `tag`, return its contents and advance.
fn der_read<'a>(input: &mut &'a [u8], tag: u8) -> Result<&'a [u8], KeyStoreError> {
    let data = *input;
    if data.len() < 2 || data[0] != tag {
        return Err(format_err("unexpected DER tag in protected key"));
    }
    let (len, header) = match data[1] {
        n if n < 0x80 => (n as usize, 2),
        n => {
            let octets = (n & 0x7f) as usize;
            if octets == 0 || octets > 4 || data.len() < 2 + octets {
                return Err(format_err("bad DER length"));
            }
            let len = data[2..2 + octets]
                .iter()
                .fold(0usize, |acc, b| (acc << 8) | *b as usize);
            (len, 2 + octets)
        }
    };
    if data.len() < header + len {
        return Err(format_err("truncated DER value"));
    }
    *input = &data[header + len..];
    Ok(&data[header..header + len])
}

/// Undo Sun's key protector, returning the PKCS#8 PrivateKeyInfo.
fn recover_key(protected: &[u8], password: &[u8]) -> Result<Vec<u8>, KeyStoreError> {
    let mut outer = protected;
    let mut info = der_read(&mut outer, 0x30)?;
    let mut algorithm = der_read(&mut info, 0x30)?;
    let oid = der_read(&mut algorithm, 0x06)?;
    if oid != KEY_PROTECTOR_OID {
        return Err(KeyStoreError::UnsupportedKeyProtection(format!("OID bytes {:02x?}", oid)));
    }
    let data = der_read(&mut info, 0x04)?;
    if data.len() < 2 * DIGEST_LEN {
        return Err(format_err("protected key too short"));
    }
    let salt = &data[..DIGEST_LEN];
    let encrypted = &data[DIGEST_LEN..data.len() - DIGEST_LEN];
    let check = &data[data.len() - DIGEST_LEN..];

    let key = apply_keystream(encrypted, salt, password);
    let mut hasher = Sha1::new();
    hasher.update(password);
    hasher.update(&key);
    if hasher.finalize().as_slice() != check {
        return Err(KeyStoreError::Password);
    }
    Ok(key)
}

/// XOR `input` with the SHA-1 chain `d_i = SHA1(password || d_{i-1})`, `d_0 = salt`.
fn apply_keystream(input: &[u8], salt: &[u8], password: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(input.len());
    let mut digest = salt.to_vec();
    while out.len() < input.len() {
        let mut hasher = Sha1::new();
        hasher.update(password);
        hasher.update(&digest);
        digest = hasher.finalize().to_vec();
        for b in &digest {
            let i = out.len();
            if i == input.len() {
                break;
            }
            out.push(input[i] ^ b);
        }
    }
    out
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    fn der(tag: u8, content: &[u8]) -> Vec<u8> {
        let mut out = vec![tag];
        if content.len() < 0x80 {
            out.push(content.len() as u8);
        } else {
            let len = (content.len() as u32).to_be_bytes();
            let skip = len.iter().take_while(|b| **b == 0).count();
            out.push(0x80 | (4 - skip) as u8);
            out.extend_from_slice(&len[skip..]);
        }
        out.extend_from_slice(content);
        out
    }

    /// Protect a PKCS#8 key the way keytool does.
    fn protect_key(pkcs8: &[u8], password: &str) -> Vec<u8> {
        let pw = password_bytes(password);
        let salt = [7u8; DIGEST_LEN];
        let mut data = salt.to_vec();
        data.extend(apply_keystream(pkcs8, &salt, &pw));
        let mut hasher = Sha1::new();
        hasher.update(&pw);
        hasher.update(pkcs8);
        data.extend_from_slice(&hasher.finalize());
        let mut alg = der(0x06, KEY_PROTECTOR_OID);
        alg.extend(der(0x05, &[]));
        let mut info = der(0x30, &alg);
        info.extend(der(0x04, &data));
        der(0x30, &info)
    }

    fn put_utf(out: &mut Vec<u8>, s: &str) {
        out.extend_from_slice(&(s.len() as u16).to_be_bytes());
        out.extend_from_slice(s.as_bytes());
    }

    fn put_cert(out: &mut Vec<u8>, cert: &[u8]) {
        put_utf(out, "X.509");
        out.extend_from_slice(&(cert.len() as u32).to_be_bytes());
        out.extend_from_slice(cert);
    }

    /// Build a version-2 JKS with one key entry and one trusted certificate entry.
    pub(crate) fn build_jks(password: &str, key_alias: &str, cert: &[u8], pkcs8: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&MAGIC.to_be_bytes());
        out.extend_from_slice(&2u32.to_be_bytes());
        out.extend_from_slice(&2u32.to_be_bytes());

        out.extend_from_slice(&PRIVATE_KEY_TAG.to_be_bytes());
        put_utf(&mut out, key_alias);
        out.extend_from_slice(&0u64.to_be_bytes());
        let protected = protect_key(pkcs8, password);
        out.extend_from_slice(&(protected.len() as u32).to_be_bytes());
        out.extend_from_slice(&protected);
        out.extend_from_slice(&1u32.to_be_bytes());
        put_cert(&mut out, cert);

        out.extend_from_slice(&TRUSTED_CERT_TAG.to_be_bytes());
        put_utf(&mut out, "trusted-ca");
        out.extend_from_slice(&0u64.to_be_bytes());
        put_cert(&mut out, cert);

        let mut hasher = Sha1::new();
        hasher.update(password_bytes(password));
        hasher.update(WHITENER);
        hasher.update(&out);
        out.extend_from_slice(&hasher.finalize());
        out
    }

    #[test]
    fn decodes_key_and_trusted_entries() {
        let cert = b"fake certificate bytes";
        let key = b"fake pkcs8 key, longer than one sha1 block of keystream";
        let data = build_jks("changeit", "client", cert, key);
        let entries = decode(&data, "changeit").unwrap();
        assert_eq!(entries.len(), 2);
        let client = &entries["client"];
        assert!(client.has_private_key());
        assert_eq!(client.certificate().unwrap().as_ref(), cert);
        match client.private_key().unwrap() {
            tokio_rustls::rustls::pki_types::PrivateKeyDer::Pkcs8(k) => {
                assert_eq!(k.secret_pkcs8_der(), key)
            }
            _ => panic!("expected PKCS#8 key"),
        }
        assert!(!entries["trusted-ca"].has_private_key());
    }

    #[test]
    fn wrong_password_fails_integrity_check() {
        let data = build_jks("changeit", "client", b"c", b"k");
        assert!(matches!(decode(&data, "wrong"), Err(KeyStoreError::Password)));
    }

    #[test]
    fn bad_magic_and_truncation() {
        let mut data = build_jks("pw", "a", b"c", b"k");
        assert!(decode(&data[..10], "pw").is_err());
        data[0] = 0;
        assert!(matches!(decode(&data, "pw"), Err(KeyStoreError::Format(_))));
    }

    #[test]
    fn keystream_is_an_involution() {
        let salt = [1u8; DIGEST_LEN];
        let pw = password_bytes("pw");
        let plain: Vec<u8> = (0..97u8).collect();
        let enc = apply_keystream(&plain, &salt, &pw);
        assert_ne!(enc, plain);
        assert_eq!(apply_keystream(&enc, &salt, &pw), plain);
    }
}
