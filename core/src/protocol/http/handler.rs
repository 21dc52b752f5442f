/*
 * handler.rs
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

//! HTTP response handler trait (push callbacks) and a handler that buffers the whole response.
//!
//! Events: status → header (×n) → start_body → body_chunk (×n) → end_body → trailer headers (×n) → complete.

use bytes::BytesMut;

use crate::protocol::http::response::{RawResponse, Response};

/// Handler for HTTP response events. The connection drives this as data arrives.
///
/// On connection/protocol failure only `failed(error)` is called.
pub trait ResponseHandler {
    /// Final (non-1xx) status line received.
    fn status(&mut self, response: &Response);

    /// Called for each response or trailer header. Name may repeat for multi-value headers.
    fn header(&mut self, name: &str, value: &str);

    /// Called when the response body is about to start. Not called for HEAD, 204, 304.
    fn start_body(&mut self);

    /// Called for each chunk of body data. Data is only valid for the duration of the call.
    fn body_chunk(&mut self, data: &[u8]);

    fn end_body(&mut self);

    /// Response fully received.
    fn complete(&mut self);

    fn failed(&mut self, error: &std::io::Error);
}

/// Collects a response into a `RawResponse`, keeping at most `limit` body bytes.
pub struct BufferingHandler {
    limit: usize,
    status: Option<Response>,
    headers: Vec<(String, String)>,
    body: BytesMut,
    truncated: bool,
    completed: bool,
    error: Option<String>,
}

impl BufferingHandler {
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            status: None,
            headers: Vec::new(),
            body: BytesMut::new(),
            truncated: false,
            completed: false,
            error: None,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.completed
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// The buffered response, once a status line has been seen.
    pub fn into_response(self) -> Option<RawResponse> {
        let status = self.status?;
        Some(RawResponse {
            status,
            headers: self.headers,
            body: self.body.freeze(),
            truncated: self.truncated,
        })
    }
}

impl ResponseHandler for BufferingHandler {
    fn status(&mut self, response: &Response) {
        self.status = Some(response.clone());
    }

    fn header(&mut self, name: &str, value: &str) {
        self.headers.push((name.to_string(), value.to_string()));
    }

    fn start_body(&mut self) {}

    fn body_chunk(&mut self, data: &[u8]) {
        let room = self.limit.saturating_sub(self.body.len());
        if data.len() > room {
            self.truncated = true;
        }
        self.body.extend_from_slice(&data[..data.len().min(room)]);
    }

    fn end_body(&mut self) {}

    fn complete(&mut self) {
        self.completed = true;
    }

    fn failed(&mut self, error: &std::io::Error) {
        self.error = Some(error.to_string());
    }
}
