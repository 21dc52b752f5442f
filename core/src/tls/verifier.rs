/*
 * verifier.rs
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

//! Server certificate verifier that accepts everything and audits every call.
//!
//! Host name checking happens inside certificate verification in rustls, so one verifier covers
//! both the trust manager and the host name verifier. Handshake signatures are still checked
//! against the presented certificate: a peer must hold the key for the certificate it sends,
//! even though the certificate itself is never validated.

use std::fmt;
use std::sync::Arc;

use tokio_rustls::rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use tokio_rustls::rustls::crypto::{verify_tls12_signature, verify_tls13_signature, CryptoProvider};
use tokio_rustls::rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use tokio_rustls::rustls::{DigitallySignedStruct, Error, SignatureScheme};

use crate::audit::Auditor;
use crate::keystore::subject_name;

pub struct PromiscuousVerifier {
    provider: Arc<CryptoProvider>,
    auditor: Auditor,
}

impl PromiscuousVerifier {
    pub fn new(provider: Arc<CryptoProvider>, auditor: Auditor) -> Self {
        Self { provider, auditor }
    }
}

impl fmt::Debug for PromiscuousVerifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PromiscuousVerifier")
    }
}

pub(crate) fn server_name_str(name: &ServerName<'_>) -> String {
    match name {
        ServerName::DnsName(dns) => dns.as_ref().to_string(),
        ServerName::IpAddress(ip) => format!("{:?}", ip),
        other => format!("{:?}", other),
    }
}

impl ServerCertVerifier for PromiscuousVerifier {
    fn verify_server_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        intermediates: &[CertificateDer<'_>],
        server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, Error> {
        self.auditor.append(
            true,
            format!("hostname verification for {} accepted", server_name_str(server_name)),
        );
        self.auditor.append(
            true,
            format!(
                "checkServerTrusted: {} (+{} intermediates) trusted",
                subject_name(end_entity.as_ref()),
                intermediates.len()
            ),
        );
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, Error> {
        let result = verify_tls12_signature(message, cert, dss, &self.provider.signature_verification_algorithms);
        if let Err(e) = &result {
            self.auditor.append(true, format!("TLS 1.2 handshake signature rejected: {}", e));
        }
        result
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, Error> {
        let result = verify_tls13_signature(message, cert, dss, &self.provider.signature_verification_algorithms);
        if let Err(e) = &result {
            self.auditor.append(true, format!("TLS 1.3 handshake signature rejected: {}", e));
        }
        result
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.provider.signature_verification_algorithms.supported_schemes()
    }
}
