/*
 * request.rs
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

//! Request descriptor: everything needed to fire one HTTP call.
//!
//! Built once from UI input and never mutated afterwards; the executor takes its own copy so
//! later edits in the UI cannot reach an in-flight request.

use super::is_present;

/// One HTTP call as composed by the user.
///
/// `method` stays a string here: an unknown verb is not rejected until the executor prepares the
/// request, where it becomes a task failure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Request {
    endpoint: String,
    method: String,
    payload: String,
    content_type: String,
    base64: bool,
    security: String,
    authenticate: bool,
    username: String,
    password: String,
}

impl Request {
    pub fn new(
        endpoint: impl Into<String>,
        method: impl Into<String>,
        content_type: impl Into<String>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            method: method.into(),
            content_type: content_type.into(),
            ..Self::default()
        }
    }

    /// Set the body text. Empty means no body.
    pub fn with_payload(mut self, payload: impl Into<String>) -> Self {
        self.payload = payload.into();
        self
    }

    /// Mark the payload as base64 text. Informational only; the payload is sent as typed.
    pub fn with_base64(mut self, base64: bool) -> Self {
        self.base64 = base64;
        self
    }

    /// TLS protocol name (e.g. "TLSv1.2"). Empty means default transport settings.
    pub fn with_security(mut self, security: impl Into<String>) -> Self {
        self.security = security.into();
        self
    }

    /// Send HTTP Basic credentials with the request.
    pub fn with_basic_auth(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.authenticate = true;
        self.username = username.into();
        self.password = password.into();
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn payload(&self) -> &str {
        &self.payload
    }

    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    pub fn base64(&self) -> bool {
        self.base64
    }

    pub fn security(&self) -> &str {
        &self.security
    }

    pub fn authenticate(&self) -> bool {
        self.authenticate
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn password(&self) -> &str {
        &self.password
    }

    /// Endpoint, method and content type are all non-blank.
    pub fn actionable(&self) -> bool {
        is_present(&self.endpoint) && is_present(&self.method) && is_present(&self.content_type)
    }

    /// `None` is never actionable.
    pub fn is_actionable(request: Option<&Request>) -> bool {
        request.map(Request::actionable).unwrap_or(false)
    }
}
