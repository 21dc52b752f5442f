/*
 * net.rs
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

//! Transport helpers: TCP connect with timeout, TLS handshake over an established stream, and
//! the default (verifying) TLS configuration used when no security level is chosen.

use std::io;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_rustls::client::TlsStream;
use tokio_rustls::rustls::client::ClientConfig;
use tokio_rustls::rustls::pki_types::ServerName;
use tokio_rustls::rustls::RootCertStore;
use tokio_rustls::TlsConnector;

use crate::audit::Auditor;
use crate::tls::{crypto_provider, AliasPolicy, ClientAuthProbe, ClientAuthResolver, TlsMaterial};

static ROOT_STORE: OnceLock<Arc<RootCertStore>> = OnceLock::new();

/// Build a root certificate store: platform native certs first, then webpki-roots as fallback.
fn build_root_store() -> RootCertStore {
    let mut root_store = RootCertStore::empty();
    match rustls_native_certs::load_native_certs() {
        Ok(certs) => {
            let (added, ignored) = root_store.add_parsable_certificates(certs);
            tracing::debug!(added, ignored, "native root certificates");
        }
        Err(e) => tracing::warn!(error = %e, "could not load native root certificates"),
    }
    if root_store.is_empty() {
        root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    }
    root_store
}

fn root_store() -> Arc<RootCertStore> {
    ROOT_STORE.get_or_init(|| Arc::new(build_root_store())).clone()
}

/// Default TLS settings: verifying, native + Mozilla roots, safe protocol versions. Still
/// observes certificate requests so the UI can learn the endpoint wanted a client certificate.
pub fn default_tls(auditor: &Auditor) -> io::Result<TlsMaterial> {
    let probe = ClientAuthProbe::new();
    let resolver = ClientAuthResolver::new(AliasPolicy::Observe, probe.clone(), auditor.clone());
    let config = ClientConfig::builder_with_provider(crypto_provider())
        .with_safe_default_protocol_versions()
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?
        .with_root_certificates(root_store())
        .with_client_cert_resolver(Arc::new(resolver));
    Ok(TlsMaterial::from_parts(Arc::new(config), probe))
}

/// TCP connect to `authority` (`host:port`), bounded by `limit`.
pub async fn connect_tcp(authority: &str, limit: Duration) -> io::Result<TcpStream> {
    let tcp = timeout(limit, TcpStream::connect(authority))
        .await
        .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "TCP connect timed out"))??;
    tcp.set_nodelay(true)?;
    Ok(tcp)
}

/// TLS handshake over an established TCP stream (direct, or a proxy tunnel).
pub async fn handshake(
    tcp: TcpStream,
    host: &str,
    config: Arc<ClientConfig>,
    limit: Duration,
) -> io::Result<TlsStream<TcpStream>> {
    let server_name: ServerName<'static> = ServerName::try_from(host.to_string())
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "invalid host name"))?;
    let connector = TlsConnector::from(config);
    timeout(limit, connector.connect(server_name, tcp))
        .await
        .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "TLS handshake timed out"))?
        .map_err(|e| io::Error::new(io::ErrorKind::ConnectionAborted, e))
}
