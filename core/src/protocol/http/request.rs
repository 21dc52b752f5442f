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

//! HTTP request: method, target, headers, optional body.
//!
//! Built via RequestBuilder; sending is done by the connection (send with handler).

use std::fmt;
use std::str::FromStr;

/// HTTP request method. Only the verbs Posterer can fire; anything else fails to parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Head,
    Post,
    Put,
    Delete,
    Trace,
    Options,
    Patch,
}

impl Method {
    pub const ALL: [Method; 8] = [
        Method::Get,
        Method::Head,
        Method::Post,
        Method::Put,
        Method::Delete,
        Method::Trace,
        Method::Options,
        Method::Patch,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Head => "HEAD",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
            Method::Trace => "TRACE",
            Method::Options => "OPTIONS",
            Method::Patch => "PATCH",
        }
    }

    /// Methods whose requests carry an entity body.
    pub fn permits_body(&self) -> bool {
        matches!(self, Method::Post | Method::Put | Method::Patch)
    }

    /// Responses to HEAD never have a body, whatever the headers say.
    pub fn expects_response_body(&self) -> bool {
        *self != Method::Head
    }
}

impl FromStr for Method {
    type Err = String;

    /// Case-insensitive, surrounding whitespace ignored.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Method::ALL
            .iter()
            .copied()
            .find(|m| m.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| format!("unsupported HTTP method: {}", wanted))
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Mutable request builder: method, target, headers, body.
///
/// Headers keep insertion order; setting a header again replaces the earlier value
/// (case-insensitive name match).
#[derive(Debug, Clone)]
pub struct RequestBuilder {
    pub method: Method,
    /// Origin-form (`/path?q`) or, through a plain HTTP proxy, absolute-form.
    pub target: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Vec<u8>>,
}

impl RequestBuilder {
    pub fn new(method: Method, target: impl Into<String>) -> Self {
        Self {
            method,
            target: target.into(),
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn header(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut Self {
        let name = name.into();
        let value = value.into();
        match self.headers.iter_mut().find(|(k, _)| k.eq_ignore_ascii_case(&name)) {
            Some(slot) => slot.1 = value,
            None => self.headers.push((name, value)),
        }
        self
    }

    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Set the request body; Content-Length is written from its size.
    pub fn body(&mut self, data: Vec<u8>) -> &mut Self {
        self.body = Some(data);
        self
    }

    /// Request line, headers and blank line, ready for the wire.
    pub fn head_bytes(&self) -> Vec<u8> {
        let mut out = format!("{} {} HTTP/1.1\r\n", self.method.as_str(), self.target);
        for (k, v) in &self.headers {
            out.push_str(k);
            out.push_str(": ");
            out.push_str(v);
            out.push_str("\r\n");
        }
        if let Some(body) = &self.body {
            if self.header_value("Content-Length").is_none() {
                out.push_str(&format!("Content-Length: {}\r\n", body.len()));
            }
        }
        out.push_str("\r\n");
        out.into_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_every_supported_verb_case_insensitively() {
        for m in Method::ALL {
            assert_eq!(m.as_str().parse::<Method>().unwrap(), m);
            assert_eq!(m.as_str().to_lowercase().parse::<Method>().unwrap(), m);
        }
        assert_eq!(" patch ".parse::<Method>().unwrap(), Method::Patch);
        assert!("CONNECT".parse::<Method>().is_err());
        assert!("FETCH".parse::<Method>().is_err());
        assert!("".parse::<Method>().is_err());
    }

    #[test]
    fn only_post_put_patch_carry_bodies() {
        let with_body: Vec<Method> = Method::ALL.iter().copied().filter(Method::permits_body).collect();
        assert_eq!(with_body, vec![Method::Post, Method::Put, Method::Patch]);
        assert!(!Method::Head.expects_response_body());
        assert!(Method::Get.expects_response_body());
    }

    #[test]
    fn header_replaces_case_insensitively() {
        let mut r = RequestBuilder::new(Method::Get, "/");
        r.header("Accept", "*/*");
        r.header("accept", "text/plain");
        assert_eq!(r.headers.len(), 1);
        assert_eq!(r.header_value("ACCEPT"), Some("text/plain"));
    }

    #[test]
    fn head_bytes_adds_content_length_for_body() {
        let mut r = RequestBuilder::new(Method::Post, "/submit");
        r.header("Host", "example.com");
        r.body(b"hello".to_vec());
        let head = String::from_utf8(r.head_bytes()).unwrap();
        assert!(head.starts_with("POST /submit HTTP/1.1\r\nHost: example.com\r\n"));
        assert!(head.contains("Content-Length: 5\r\n"));
        assert!(head.ends_with("\r\n\r\n"));
    }

    #[test]
    fn head_bytes_without_body_has_no_length() {
        let r = RequestBuilder::new(Method::Get, "/");
        let head = String::from_utf8(r.head_bytes()).unwrap();
        assert_eq!(head, "GET / HTTP/1.1\r\n\r\n");
    }
}
