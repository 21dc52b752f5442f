/*
 * parser.rs
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

//! HTTP/1.1 response push parser: status line, headers, body (Content-Length, chunked, or
//! until close).

use bytes::Buf;
use bytes::BytesMut;
use std::io;

/// Callback for HTTP/1.1 response events. The connection implements this and forwards to
/// its ResponseHandler.
pub trait H1ResponseHandler {
    fn status(&mut self, version: &str, code: u16, reason: Option<&str>);
    fn header(&mut self, name: &str, value: &str);
    fn body_chunk(&mut self, data: &[u8]);
    fn end_body(&mut self);
    fn trailer(&mut self, name: &str, value: &str);
    fn complete(&mut self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseState {
    StatusLine,
    Headers,
    /// Headers done; connection must call set_body_mode() (or expect_final() after a 1xx).
    HeadersComplete,
    Body,
    ChunkSize,
    ChunkData,
    /// CRLF that terminates each chunk's data.
    ChunkDataEnd,
    ChunkTrailer,
    Done,
}

/// How the response body is delimited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyMode {
    None,
    Length(u64),
    Chunked,
    UntilClose,
}

impl BodyMode {
    /// RFC 9112 §6.3: no body for HEAD, 1xx, 204, 304; chunked wins over Content-Length.
    pub fn for_response(code: u16, expects_body: bool, headers: &[(String, String)]) -> Self {
        if !expects_body || (100..200).contains(&code) || code == 204 || code == 304 {
            return BodyMode::None;
        }
        let chunked = headers.iter().any(|(k, v)| {
            k.eq_ignore_ascii_case("transfer-encoding") && v.to_ascii_lowercase().contains("chunked")
        });
        if chunked {
            return BodyMode::Chunked;
        }
        let length = headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case("content-length"))
            .and_then(|(_, v)| v.trim().parse::<u64>().ok());
        match length {
            Some(0) => BodyMode::None,
            Some(n) => BodyMode::Length(n),
            None => BodyMode::UntilClose,
        }
    }
}

/// Push parser for one HTTP/1.1 response. Feed bytes via `receive`; the handler is invoked as
/// complete tokens are parsed.
pub struct ResponseParser {
    state: ParseState,
    /// Body bytes left for Length mode, or bytes left in the current chunk.
    remaining: u64,
}

fn invalid(msg: &str) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, msg.to_string())
}

impl ResponseParser {
    pub fn new() -> Self {
        Self {
            state: ParseState::StatusLine,
            remaining: 0,
        }
    }

    pub fn state(&self) -> ParseState {
        self.state
    }

    pub fn is_done(&self) -> bool {
        self.state == ParseState::Done
    }

    pub fn reset(&mut self) {
        self.state = ParseState::StatusLine;
        self.remaining = 0;
    }

    /// After an interim (1xx) response: discard it and parse the next status line.
    pub fn expect_final(&mut self) {
        if self.state == ParseState::HeadersComplete {
            self.reset();
        }
    }

    fn find_crlf(buf: &[u8]) -> Option<usize> {
        buf.windows(2).position(|w| w == b"\r\n")
    }

    /// Split one CRLF-terminated line off the front of `buf` (without the CRLF).
    fn take_line(buf: &mut BytesMut) -> Option<BytesMut> {
        let end = Self::find_crlf(buf)?;
        let mut line = buf.split_to(end + 2);
        line.truncate(end);
        Some(line)
    }

    /// Consume and parse as much as possible from buf. Partial data remains in buf.
    pub fn receive<H: H1ResponseHandler>(
        &mut self,
        buf: &mut BytesMut,
        handler: &mut H,
    ) -> io::Result<()> {
        while !buf.is_empty() {
            match self.state {
                ParseState::StatusLine => {
                    let Some(line) = Self::take_line(buf) else {
                        return Ok(());
                    };
                    let line = std::str::from_utf8(&line).map_err(|_| invalid("invalid status line UTF-8"))?;
                    if line.is_empty() {
                        // tolerate a stray CRLF before the status line
                        continue;
                    }
                    let mut parts = line.splitn(3, ' ');
                    let version = parts.next().unwrap_or("");
                    if !version.starts_with("HTTP/") {
                        return Err(invalid("malformed status line"));
                    }
                    let code = parts
                        .next()
                        .and_then(|s| s.parse::<u16>().ok())
                        .ok_or_else(|| invalid("malformed status code"))?;
                    let reason = parts.next();
                    handler.status(version, code, reason);
                    self.state = ParseState::Headers;
                }
                ParseState::Headers => {
                    let Some(line) = Self::take_line(buf) else {
                        return Ok(());
                    };
                    if line.is_empty() {
                        self.state = ParseState::HeadersComplete;
                        return Ok(());
                    }
                    let line = std::str::from_utf8(&line).map_err(|_| invalid("invalid header UTF-8"))?;
                    if let Some((name, value)) = line.split_once(':') {
                        handler.header(name.trim(), value.trim());
                    }
                }
                ParseState::HeadersComplete | ParseState::Done => return Ok(()),
                ParseState::Body => {
                    if self.remaining == u64::MAX {
                        let chunk = buf.split_to(buf.len());
                        handler.body_chunk(&chunk);
                        return Ok(());
                    }
                    let n = (self.remaining as usize).min(buf.len());
                    let chunk = buf.split_to(n);
                    handler.body_chunk(&chunk);
                    self.remaining -= n as u64;
                    if self.remaining == 0 {
                        handler.end_body();
                        handler.complete();
                        self.state = ParseState::Done;
                    }
                }
                ParseState::ChunkSize => {
                    let Some(line) = Self::take_line(buf) else {
                        return Ok(());
                    };
                    let line = std::str::from_utf8(&line).map_err(|_| invalid("invalid chunk size"))?;
                    let hex = line.split(';').next().unwrap_or("").trim();
                    self.remaining = u64::from_str_radix(hex, 16).map_err(|_| invalid("invalid chunk size"))?;
                    self.state = if self.remaining == 0 {
                        ParseState::ChunkTrailer
                    } else {
                        ParseState::ChunkData
                    };
                }
                ParseState::ChunkData => {
                    let n = (self.remaining as usize).min(buf.len());
                    let chunk = buf.split_to(n);
                    handler.body_chunk(&chunk);
                    self.remaining -= n as u64;
                    if self.remaining == 0 {
                        self.state = ParseState::ChunkDataEnd;
                    }
                }
                ParseState::ChunkDataEnd => {
                    if buf.len() < 2 {
                        return Ok(());
                    }
                    if &buf[..2] != b"\r\n" {
                        return Err(invalid("missing CRLF after chunk"));
                    }
                    buf.advance(2);
                    self.state = ParseState::ChunkSize;
                }
                ParseState::ChunkTrailer => {
                    let Some(line) = Self::take_line(buf) else {
                        return Ok(());
                    };
                    if line.is_empty() {
                        handler.end_body();
                        handler.complete();
                        self.state = ParseState::Done;
                    } else {
                        let line = std::str::from_utf8(&line).map_err(|_| invalid("invalid trailer"))?;
                        if let Some((name, value)) = line.split_once(':') {
                            handler.trailer(name.trim(), value.trim());
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// Called by the connection once headers are in (state HeadersComplete).
    pub fn set_body_mode<H: H1ResponseHandler>(&mut self, mode: BodyMode, handler: &mut H) {
        if self.state != ParseState::HeadersComplete {
            return;
        }
        match mode {
            BodyMode::None => {
                handler.complete();
                self.state = ParseState::Done;
            }
            BodyMode::Length(n) => {
                self.remaining = n;
                self.state = ParseState::Body;
            }
            BodyMode::Chunked => self.state = ParseState::ChunkSize,
            BodyMode::UntilClose => {
                self.remaining = u64::MAX;
                self.state = ParseState::Body;
            }
        }
    }

    /// The peer closed the connection. Ends a read-until-close body; anywhere else it is an error.
    pub fn finish_at_eof<H: H1ResponseHandler>(&mut self, handler: &mut H) -> io::Result<()> {
        match self.state {
            ParseState::Done => Ok(()),
            ParseState::Body if self.remaining == u64::MAX => {
                handler.end_body();
                handler.complete();
                self.state = ParseState::Done;
                Ok(())
            }
            _ => Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "connection closed before response was complete",
            )),
        }
    }
}

impl Default for ResponseParser {
    fn default() -> Self {
        Self::new()
    }
}
