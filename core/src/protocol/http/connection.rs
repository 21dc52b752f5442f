/*
 * connection.rs
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

//! HTTP connection: one TCP or TLS stream, drives the H1 parser, invokes a ResponseHandler.

use bytes::BytesMut;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadBuf};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_rustls::client::TlsStream as TokioTlsStream;

use crate::audit::Auditor;
use crate::protocol::http::h1::{BodyMode, H1ResponseHandler, ParseState, ResponseParser};
use crate::protocol::http::request::RequestBuilder;
use crate::protocol::http::response::Response;
use crate::protocol::http::ResponseHandler;

/// Unified stream: plain TCP or TLS. Implements AsyncRead + AsyncWrite.
pub enum HttpStream {
    Plain(TcpStream),
    Tls(Box<TokioTlsStream<TcpStream>>),
}

impl HttpStream {
    pub fn is_tls(&self) -> bool {
        matches!(self, HttpStream::Tls(_))
    }
}

impl AsyncRead for HttpStream {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match &mut *self {
            HttpStream::Plain(s) => Pin::new(s).poll_read(cx, buf),
            HttpStream::Tls(s) => Pin::new(s.as_mut()).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for HttpStream {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match &mut *self {
            HttpStream::Plain(s) => Pin::new(s).poll_write(cx, buf),
            HttpStream::Tls(s) => Pin::new(s.as_mut()).poll_write(cx, buf),
        }
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match &mut *self {
            HttpStream::Plain(s) => Pin::new(s).poll_flush(cx),
            HttpStream::Tls(s) => Pin::new(s.as_mut()).poll_flush(cx),
        }
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match &mut *self {
            HttpStream::Plain(s) => Pin::new(s).poll_shutdown(cx),
            HttpStream::Tls(s) => Pin::new(s.as_mut()).poll_shutdown(cx),
        }
    }
}

/// Bridges H1 parser callbacks to the user's ResponseHandler, holding back headers until the
/// status is known to be final (1xx responses are dropped).
struct H1Driver<'a> {
    status: &'a mut Option<Response>,
    headers: &'a mut Vec<(String, String)>,
    handler: &'a mut (dyn ResponseHandler + Send),
}

impl H1ResponseHandler for H1Driver<'_> {
    fn status(&mut self, version: &str, code: u16, reason: Option<&str>) {
        let mut response = match reason {
            Some(r) => Response::with_reason(code, r),
            None => Response::new(code),
        };
        response.version = version.to_string();
        *self.status = Some(response);
        self.headers.clear();
    }

    fn header(&mut self, name: &str, value: &str) {
        self.headers.push((name.to_string(), value.to_string()));
    }

    fn body_chunk(&mut self, data: &[u8]) {
        self.handler.body_chunk(data);
    }

    fn end_body(&mut self) {
        self.handler.end_body();
    }

    fn trailer(&mut self, name: &str, value: &str) {
        self.handler.header(name, value);
    }

    fn complete(&mut self) {
        self.handler.complete();
    }
}

/// HTTP connection for a single exchange. Call send() once, then close().
pub struct HttpConnection {
    stream: HttpStream,
    read_buf: BytesMut,
    parser: ResponseParser,
    status: Option<Response>,
    headers: Vec<(String, String)>,
    read_timeout: Duration,
    auditor: Auditor,
}

impl HttpConnection {
    pub fn new(stream: HttpStream, read_timeout: Duration, auditor: Auditor) -> Self {
        Self {
            stream,
            read_buf: BytesMut::with_capacity(8192),
            parser: ResponseParser::new(),
            status: None,
            headers: Vec::new(),
            read_timeout,
            auditor,
        }
    }

    pub fn is_tls(&self) -> bool {
        self.stream.is_tls()
    }

    /// Write the request and run the read loop until the response is complete.
    pub async fn send(
        &mut self,
        request: &RequestBuilder,
        handler: &mut (dyn ResponseHandler + Send),
    ) -> io::Result<()> {
        let result = self.exchange(request, handler).await;
        if let Err(e) = &result {
            handler.failed(e);
        }
        result
    }

    async fn exchange(
        &mut self,
        request: &RequestBuilder,
        handler: &mut (dyn ResponseHandler + Send),
    ) -> io::Result<()> {
        self.parser.reset();
        self.status = None;
        self.headers.clear();

        self.stream.write_all(&request.head_bytes()).await?;
        if let Some(body) = &request.body {
            self.stream.write_all(body).await?;
        }
        self.stream.flush().await?;
        self.auditor.append(
            true,
            format!("request sent: {} {}", request.method.as_str(), request.target),
        );

        let expects_body = request.method.expects_response_body();
        let mut tmp = [0u8; 8192];
        loop {
            let n = timeout(self.read_timeout, self.stream.read(&mut tmp))
                .await
                .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "read timed out"))??;
            if n == 0 {
                let mut driver = H1Driver {
                    status: &mut self.status,
                    headers: &mut self.headers,
                    handler: &mut *handler,
                };
                self.parser.finish_at_eof(&mut driver)?;
                break;
            }
            self.read_buf.extend_from_slice(&tmp[..n]);

            loop {
                let mut driver = H1Driver {
                    status: &mut self.status,
                    headers: &mut self.headers,
                    handler: &mut *handler,
                };
                self.parser.receive(&mut self.read_buf, &mut driver)?;
                if self.parser.state() != ParseState::HeadersComplete {
                    break;
                }
                let Some(status) = self.status.clone() else {
                    break;
                };
                if status.is_interim() {
                    self.auditor.append(true, format!("interim response: {}", status.status_line()));
                    self.parser.expect_final();
                    continue;
                }
                self.auditor.append(true, "response headers received");
                handler.status(&status);
                for (name, value) in &self.headers {
                    handler.header(name, value);
                }
                let mode = BodyMode::for_response(status.code, expects_body, &self.headers);
                if mode != BodyMode::None {
                    handler.start_body();
                }
                let mut driver = H1Driver {
                    status: &mut self.status,
                    headers: &mut self.headers,
                    handler: &mut *handler,
                };
                self.parser.set_body_mode(mode, &mut driver);
            }

            if self.parser.is_done() {
                break;
            }
        }
        self.auditor.append(true, "response complete");
        Ok(())
    }

    /// Shut the stream down. Consumes the connection, so it runs at most once; failures are
    /// logged and otherwise ignored.
    pub async fn close(mut self) {
        if let Err(e) = self.stream.shutdown().await {
            tracing::debug!(error = %e, "HTTP connection shutdown failed");
        }
    }
}
