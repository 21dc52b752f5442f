/*
 * resolver.rs
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

//! Client certificate selection.
//!
//! rustls asks the resolver for a certificate only when the server sends a CertificateRequest,
//! so any call to `resolve` means the server wanted client authentication. That is recorded on
//! the probe whatever the policy.

use std::fmt;
use std::sync::Arc;

use tokio_rustls::rustls::client::ResolvesClientCert;
use tokio_rustls::rustls::sign::CertifiedKey;
use tokio_rustls::rustls::SignatureScheme;

use crate::audit::Auditor;

use super::ClientAuthProbe;

/// Which certificate to present when asked.
#[derive(Clone)]
pub enum AliasPolicy {
    /// Present nothing; only record that a certificate was requested.
    Observe,
    /// Always present this alias, whatever issuers or schemes the server hints at.
    Forced { alias: String, key: Arc<CertifiedKey> },
}

impl fmt::Debug for AliasPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AliasPolicy::Observe => f.write_str("Observe"),
            AliasPolicy::Forced { alias, .. } => f.debug_struct("Forced").field("alias", alias).finish(),
        }
    }
}

pub struct ClientAuthResolver {
    policy: AliasPolicy,
    probe: ClientAuthProbe,
    auditor: Auditor,
}

impl ClientAuthResolver {
    pub fn new(policy: AliasPolicy, probe: ClientAuthProbe, auditor: Auditor) -> Self {
        Self { policy, probe, auditor }
    }

    pub fn policy(&self) -> &AliasPolicy {
        &self.policy
    }
}

impl fmt::Debug for ClientAuthResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientAuthResolver")
            .field("policy", &self.policy)
            .finish()
    }
}

impl ResolvesClientCert for ClientAuthResolver {
    fn resolve(
        &self,
        root_hint_subjects: &[&[u8]],
        sigschemes: &[SignatureScheme],
    ) -> Option<Arc<CertifiedKey>> {
        self.probe.mark();
        let chosen = match &self.policy {
            AliasPolicy::Observe => None,
            AliasPolicy::Forced { alias, key } => Some((alias.as_str(), key.clone())),
        };
        self.auditor.append(
            true,
            format!(
                "chooseClientAlias(issuers={}, schemes={}) -> {}",
                root_hint_subjects.len(),
                sigschemes.len(),
                chosen.as_ref().map(|(a, _)| *a).unwrap_or("<none>")
            ),
        );
        chosen.map(|(_, key)| key)
    }

    fn has_certs(&self) -> bool {
        // Observe also reports true so the request still reaches `resolve`.
        true
    }
}
