/*
 * task.rs
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

//! The work of one request: prepare (no network), execute (async), process (once).

use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use tracing::debug;

use crate::audit::Auditor;
use crate::config::ExecutorConfig;
use crate::error::ExecError;
use crate::model::{Proxy, Request};
use crate::net;
use crate::protocol::http::{BufferingHandler, HttpClient, Method, RawResponse, RequestBuilder, Route};
use crate::tls::{self, ClientAuthProbe, KeyStoreSelection, TlsMaterial};
use crate::uri::Endpoint;

/// Everything needed to put one request on the wire.
#[derive(Debug)]
pub struct PreparedRequest {
    pub method: Method,
    pub endpoint: Endpoint,
    pub route: Route,
    pub builder: RequestBuilder,
    pub tls: Option<TlsMaterial>,
    /// Bounds connect, tunnel, handshake and each read.
    pub timeout: Duration,
    pub max_body: usize,
}

impl PreparedRequest {
    /// Probe of the TLS layer in use, if any.
    pub fn probe(&self) -> Option<&ClientAuthProbe> {
        self.tls.as_ref().map(TlsMaterial::probe)
    }
}

/// Build the request without touching the network.
///
/// Method and endpoint are checked before anything else, so a bad verb never loads a keystore.
/// TLS configuration problems are audited and fall back to the default verifying transport.
pub fn prepare(
    request: &Request,
    proxy: Option<&Proxy>,
    keystore: Option<&KeyStoreSelection>,
    config: &ExecutorConfig,
    timeout: Duration,
    auditor: &Auditor,
) -> Result<PreparedRequest, ExecError> {
    let method: Method = request
        .method()
        .parse()
        .map_err(|_| ExecError::UnknownMethod(request.method().trim().to_string()))?;
    let endpoint = Endpoint::parse(request.endpoint()).map_err(ExecError::InvalidEndpoint)?;

    let route = match proxy {
        Some(p) if p.actionable() => {
            let port = p
                .port_number()
                .ok_or_else(|| ExecError::InvalidProxy(format!("port '{}'", p.port.trim())))?;
            Route::Proxy {
                host: p.host.trim().to_string(),
                port,
            }
        }
        _ => Route::Direct,
    };

    let target = if route.uses_absolute_form(&endpoint) {
        endpoint.absolute_form()
    } else {
        endpoint.target().to_string()
    };
    let mut builder = RequestBuilder::new(method, target);
    builder
        .header("Host", endpoint.authority())
        .header("User-Agent", config.user_agent.as_str())
        .header("Accept", "*/*")
        .header("Connection", "close");

    if request.payload().is_empty() {
        if method.permits_body() {
            builder.header("Content-Length", "0");
        }
    } else if method.permits_body() {
        builder
            .header("Content-Type", request.content_type().trim())
            .body(request.payload().as_bytes().to_vec());
        auditor.append(
            true,
            format!(
                "attached {} byte body ({}{})",
                request.payload().len(),
                request.content_type().trim(),
                if request.base64() { ", base64" } else { "" }
            ),
        );
    } else {
        auditor.append(true, format!("{} carries no body; payload not sent", method));
    }

    if request.authenticate() && !request.username().trim().is_empty() {
        let token = STANDARD.encode(format!("{}:{}", request.username(), request.password()));
        builder.header("Authorization", format!("Basic {}", token));
        auditor.append(true, format!("basic authentication as {}", request.username()));
    }

    let mut tls_material = tls::provide(request.security(), keystore, auditor);
    if endpoint.is_secure() && tls_material.is_none() {
        tls_material = Some(net::default_tls(auditor)?);
        auditor.append(true, "using default TLS settings");
    }

    debug!(method = %method, endpoint = %endpoint, route = ?route, "request prepared");
    auditor.append(true, format!("prepared {} {}", method, endpoint));
    Ok(PreparedRequest {
        method,
        endpoint,
        route,
        builder,
        tls: tls_material,
        timeout,
        max_body: config.max_body_bytes,
    })
}

/// Connect, send, and buffer the response. The connection is closed before returning; if the
/// future is dropped (cancellation) the socket is closed when the connection drops.
pub async fn execute(prepared: &PreparedRequest, auditor: &Auditor) -> Result<RawResponse, ExecError> {
    let limit = prepared.timeout;
    let mut connection = HttpClient::connect(
        &prepared.endpoint,
        &prepared.route,
        prepared.tls.as_ref(),
        limit,
        auditor,
    )
    .await
    .map_err(|e| ExecError::from_io(e, limit))?;

    let mut handler = BufferingHandler::new(prepared.max_body);
    let sent = connection.send(&prepared.builder, &mut handler).await;
    connection.close().await;
    sent.map_err(|e| ExecError::from_io(e, limit))?;

    let response = handler
        .into_response()
        .ok_or_else(|| ExecError::Protocol("no status line received".to_string()))?;
    if response.truncated {
        auditor.append(
            true,
            format!("response body truncated to {} bytes", prepared.max_body),
        );
    }
    Ok(response)
}

/// A transport response the task can turn into display text.
pub trait TransportResponse: Send + Sync {
    fn status_line(&self) -> String;
    fn headers(&self) -> Vec<(String, String)>;
    fn body_text(&self) -> String;
}

impl TransportResponse for RawResponse {
    fn status_line(&self) -> String {
        self.status.status_line()
    }

    fn headers(&self) -> Vec<(String, String)> {
        self.headers.clone()
    }

    fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Display form of a response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Processed {
    pub status: String,
    /// `name=value` per line.
    pub headers: String,
    pub body: String,
}

/// Turn a transport response into display text. The status line goes to the postscript.
pub fn process(response: &dyn TransportResponse, auditor: &Auditor) -> Processed {
    let status = response.status_line();
    auditor.postscript(false, &status);
    let mut headers = String::new();
    for (name, value) in response.headers() {
        headers.push_str(&name);
        headers.push('=');
        headers.push_str(&value);
        headers.push('\n');
    }
    Processed {
        status,
        headers,
        body: response.body_text(),
    }
}
