/*
 * response.rs
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

//! HTTP response status and the buffered response handed back to the executor.

use bytes::Bytes;

/// Status line of a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// Protocol token as sent by the server, e.g. `HTTP/1.1`.
    pub version: String,
    pub code: u16,
    pub reason: Option<String>,
}

impl Response {
    pub fn new(code: u16) -> Self {
        Self {
            version: "HTTP/1.1".to_string(),
            code,
            reason: None,
        }
    }

    pub fn with_reason(code: u16, reason: impl Into<String>) -> Self {
        Self {
            reason: Some(reason.into()),
            ..Self::new(code)
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.code)
    }

    /// 1xx responses precede the final one and are skipped.
    pub fn is_interim(&self) -> bool {
        (100..200).contains(&self.code)
    }

    /// `HTTP/1.1 200 OK`.
    pub fn status_line(&self) -> String {
        match &self.reason {
            Some(r) if !r.is_empty() => format!("{} {} {}", self.version, self.code, r),
            _ => format!("{} {}", self.version, self.code),
        }
    }
}

/// A complete response as read off the wire, not yet formatted for display.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: Response,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
    /// Body exceeded the configured limit and was cut.
    pub truncated: bool,
}

impl RawResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}
