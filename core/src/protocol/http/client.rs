/*
 * client.rs
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

//! HTTP client: open a connection to an endpoint, directly or through a forward proxy.

use std::io;
use std::time::Duration;

use bytes::BytesMut;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;

use crate::audit::Auditor;
use crate::net::{connect_tcp, handshake};
use crate::protocol::http::connection::{HttpConnection, HttpStream};
use crate::protocol::http::h1::{H1ResponseHandler, ParseState, ResponseParser};
use crate::tls::TlsMaterial;
use crate::uri::Endpoint;

/// Upper bound on a proxy's CONNECT response head.
const MAX_TUNNEL_HEAD: usize = 16 * 1024;

/// How to reach the endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Direct,
    /// Forward proxy. Plain HTTP goes in absolute-form; HTTPS is tunnelled with CONNECT.
    Proxy { host: String, port: u16 },
}

impl Route {
    /// Whether the request line must carry the absolute URI instead of the path.
    pub fn uses_absolute_form(&self, endpoint: &Endpoint) -> bool {
        matches!(self, Route::Proxy { .. }) && !endpoint.is_secure()
    }

    fn describe(&self) -> String {
        match self {
            Route::Direct => "direct".to_string(),
            Route::Proxy { host, port } => format!("via proxy {}:{}", host, port),
        }
    }
}

/// HTTP client. `connect` returns a connection ready for one request.
pub struct HttpClient;

impl HttpClient {
    /// Connect to `endpoint`. HTTPS endpoints use `tls`; plain HTTP ignores it.
    /// `limit` bounds each of TCP connect, proxy tunnel setup, and TLS handshake.
    pub async fn connect(
        endpoint: &Endpoint,
        route: &Route,
        tls: Option<&TlsMaterial>,
        limit: Duration,
        auditor: &Auditor,
    ) -> io::Result<HttpConnection> {
        let target = endpoint.socket_authority();
        auditor.append(true, format!("connecting to {} ({})", target, route.describe()));
        let tcp = match route {
            Route::Direct => connect_tcp(&target, limit).await?,
            Route::Proxy { host, port } => {
                let proxy_authority = if host.contains(':') {
                    format!("[{}]:{}", host, port)
                } else {
                    format!("{}:{}", host, port)
                };
                let mut tcp = connect_tcp(&proxy_authority, limit).await?;
                if endpoint.is_secure() {
                    timeout(limit, open_tunnel(&mut tcp, &target))
                        .await
                        .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "proxy CONNECT timed out"))??;
                    auditor.append(true, format!("proxy tunnel to {} established", target));
                }
                tcp
            }
        };
        auditor.append(true, "TCP connection established");

        let stream = match (endpoint.is_secure(), tls) {
            (true, Some(material)) => {
                let tls_stream = handshake(tcp, endpoint.host(), material.config(), limit).await?;
                let (_, session) = tls_stream.get_ref();
                auditor.append(
                    true,
                    format!(
                        "TLS handshake complete: {:?}, {:?}",
                        session.protocol_version(),
                        session.negotiated_cipher_suite().map(|s| s.suite())
                    ),
                );
                HttpStream::Tls(Box::new(tls_stream))
            }
            (true, None) => {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    "https endpoint without TLS configuration",
                ))
            }
            (false, _) => HttpStream::Plain(tcp),
        };
        Ok(HttpConnection::new(stream, limit, auditor.clone()))
    }
}

/// Status-only handler for the proxy's CONNECT response.
#[derive(Default)]
struct TunnelStatus {
    code: Option<u16>,
    line: String,
}

impl H1ResponseHandler for TunnelStatus {
    fn status(&mut self, version: &str, code: u16, reason: Option<&str>) {
        self.code = Some(code);
        self.line = format!("{} {} {}", version, code, reason.unwrap_or("")).trim_end().to_string();
    }
    fn header(&mut self, _name: &str, _value: &str) {}
    fn body_chunk(&mut self, _data: &[u8]) {}
    fn end_body(&mut self) {}
    fn trailer(&mut self, _name: &str, _value: &str) {}
    fn complete(&mut self) {}
}

/// Ask the proxy for a tunnel to `authority` and wait for a 2xx.
async fn open_tunnel(tcp: &mut TcpStream, authority: &str) -> io::Result<()> {
    let req = format!(
        "CONNECT {0} HTTP/1.1\r\nHost: {0}\r\nProxy-Connection: keep-alive\r\n\r\n",
        authority
    );
    tcp.write_all(req.as_bytes()).await?;
    tcp.flush().await?;

    let mut parser = ResponseParser::new();
    let mut status = TunnelStatus::default();
    let mut buf = BytesMut::with_capacity(1024);
    let mut seen = 0usize;
    // Read one byte at a time so nothing past the response head is consumed.
    let mut byte = [0u8; 1];
    while parser.state() != ParseState::HeadersComplete {
        let n = tcp.read(&mut byte).await?;
        if n == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "proxy closed connection during CONNECT",
            ));
        }
        seen += 1;
        if seen > MAX_TUNNEL_HEAD {
            return Err(io::Error::new(io::ErrorKind::InvalidData, "proxy CONNECT response too large"));
        }
        buf.extend_from_slice(&byte);
        parser.receive(&mut buf, &mut status)?;
    }
    match status.code {
        Some(code) if (200..300).contains(&code) => Ok(()),
        _ => Err(io::Error::new(
            io::ErrorKind::ConnectionRefused,
            format!("proxy refused tunnel: {}", status.line),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[test]
    fn absolute_form_only_for_plain_http_via_proxy() {
        let http = Endpoint::parse("http://example.com/x").unwrap();
        let https = Endpoint::parse("https://example.com/x").unwrap();
        let proxy = Route::Proxy { host: "p".to_string(), port: 3128 };
        assert!(proxy.uses_absolute_form(&http));
        assert!(!proxy.uses_absolute_form(&https));
        assert!(!Route::Direct.uses_absolute_form(&http));
    }

    #[tokio::test]
    async fn tunnel_refused_by_proxy() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 1024];
            let _ = sock.read(&mut buf).await;
            let _ = sock
                .write_all(b"HTTP/1.1 403 Forbidden\r\nContent-Length: 0\r\n\r\n")
                .await;
        });
        let mut tcp = TcpStream::connect(addr).await.unwrap();
        let err = open_tunnel(&mut tcp, "example.com:443").await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::ConnectionRefused);
        assert!(err.to_string().contains("403"));
    }

    #[tokio::test]
    async fn tunnel_accepted() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 1024];
            let n = sock.read(&mut buf).await.unwrap();
            let _ = sock.write_all(b"HTTP/1.1 200 Connection established\r\n\r\n").await;
            String::from_utf8_lossy(&buf[..n]).into_owned()
        });
        let mut tcp = TcpStream::connect(addr).await.unwrap();
        open_tunnel(&mut tcp, "example.com:443").await.unwrap();
        let seen = server.await.unwrap();
        assert!(seen.starts_with("CONNECT example.com:443 HTTP/1.1\r\n"));
    }
}
