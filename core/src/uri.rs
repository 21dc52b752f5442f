/*
 * uri.rs
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

//! Endpoint URLs: absolute `http` / `https` URIs split into the parts the HTTP client needs.
//! Path and query are kept as typed, except that spaces and control characters are
//! percent-encoded so the request line stays well-formed.

use std::fmt;

use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};

/// Request-target characters that must be escaped before going on the wire.
const REQUEST_TARGET: &AsciiSet = &CONTROLS.add(b' ').add(b'"').add(b'<').add(b'>').add(b'`');

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    Http,
    Https,
}

impl Scheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scheme::Http => "http",
            Scheme::Https => "https",
        }
    }

    pub fn default_port(&self) -> u16 {
        match self {
            Scheme::Http => 80,
            Scheme::Https => 443,
        }
    }
}

/// Parsed absolute endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    scheme: Scheme,
    host: String,
    port: u16,
    /// Path plus optional `?query`, always starting with `/`. Fragment dropped.
    target: String,
}

impl Endpoint {
    /// Parse `scheme://[userinfo@]host[:port][/path][?query][#fragment]`.
    /// IPv6 literals are written in brackets (`http://[::1]:8080/`).
    pub fn parse(input: &str) -> Result<Self, String> {
        let input = input.trim();
        let (scheme_str, rest) = input
            .split_once("://")
            .ok_or_else(|| format!("not an absolute URI: {}", input))?;
        let scheme = if scheme_str.eq_ignore_ascii_case("http") {
            Scheme::Http
        } else if scheme_str.eq_ignore_ascii_case("https") {
            Scheme::Https
        } else {
            return Err(format!("unsupported scheme: {}", scheme_str));
        };

        let rest = rest.split('#').next().unwrap_or("");
        let authority_end = rest.find(|c: char| c == '/' || c == '?').unwrap_or(rest.len());
        let authority = &rest[..authority_end];
        let mut target = rest[authority_end..].to_string();
        if !target.starts_with('/') {
            target.insert(0, '/');
        }

        // userinfo is ignored; Basic credentials come from the request descriptor
        let host_port = authority.rsplit('@').next().unwrap_or(authority);
        let (host, port) = split_host_port(host_port)?;
        if host.is_empty() {
            return Err(format!("missing host: {}", input));
        }
        Ok(Self {
            scheme,
            host,
            port: port.unwrap_or_else(|| scheme.default_port()),
            target: utf8_percent_encode(&target, REQUEST_TARGET).to_string(),
        })
    }

    pub fn scheme(&self) -> Scheme {
        self.scheme
    }

    pub fn is_secure(&self) -> bool {
        self.scheme == Scheme::Https
    }

    /// Host without brackets (suitable for DNS / TLS server name).
    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Origin-form request target (`/path?query`).
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Value for the Host header: port omitted when it is the scheme default.
    pub fn authority(&self) -> String {
        let host = if self.host.contains(':') {
            format!("[{}]", self.host)
        } else {
            self.host.clone()
        };
        if self.port == self.scheme.default_port() {
            host
        } else {
            format!("{}:{}", host, self.port)
        }
    }

    /// `host:port` for TCP connect and proxy CONNECT.
    pub fn socket_authority(&self) -> String {
        if self.host.contains(':') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }

    /// Absolute-form request target, used when talking to a forward proxy.
    pub fn absolute_form(&self) -> String {
        format!("{}://{}{}", self.scheme.as_str(), self.authority(), self.target)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.absolute_form())
    }
}

fn split_host_port(s: &str) -> Result<(String, Option<u16>), String> {
    if let Some(inner) = s.strip_prefix('[') {
        let close = inner
            .find(']')
            .ok_or_else(|| format!("unterminated IPv6 literal: {}", s))?;
        let host = inner[..close].to_string();
        let after = &inner[close + 1..];
        let port = match after.strip_prefix(':') {
            Some(p) => Some(parse_port(p)?),
            None if after.is_empty() => None,
            None => return Err(format!("invalid authority: {}", s)),
        };
        return Ok((host, port));
    }
    match s.rsplit_once(':') {
        Some((host, port)) => Ok((host.to_string(), Some(parse_port(port)?))),
        None => Ok((s.to_string(), None)),
    }
}

fn parse_port(p: &str) -> Result<u16, String> {
    p.parse::<u16>()
        .map_err(|_| format!("invalid port: {}", p))
}
