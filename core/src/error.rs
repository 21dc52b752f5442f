/*
 * error.rs
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

//! Request failures surfaced to the caller.
//!
//! Only construction and transport problems live here. TLS configuration problems are audited
//! and swallowed (see `tls::TlsConfigError`), and cancellation is a task state, not an error.

use std::io;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ExecError {
    /// Method string is not one of GET/HEAD/POST/PUT/DELETE/TRACE/OPTIONS/PATCH.
    #[error("unsupported HTTP method: {0}")]
    UnknownMethod(String),
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),
    #[error("invalid proxy: {0}")]
    InvalidProxy(String),
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
    #[error("transport error: {0}")]
    Transport(#[from] io::Error),
    /// Connection ended without a status line.
    #[error("protocol error: {0}")]
    Protocol(String),
    /// The background worker could not be started.
    #[error("worker: {0}")]
    Worker(String),
}

impl ExecError {
    /// Map an I/O failure. Timeouts become `Timeout(limit)`; malformed or truncated responses
    /// become `Protocol`.
    pub fn from_io(e: io::Error, limit: Duration) -> Self {
        match e.kind() {
            io::ErrorKind::TimedOut => ExecError::Timeout(limit),
            io::ErrorKind::InvalidData | io::ErrorKind::UnexpectedEof => {
                ExecError::Protocol(e.to_string())
            }
            _ => ExecError::Transport(e),
        }
    }

    /// True for errors raised before any network activity.
    pub fn is_construction(&self) -> bool {
        matches!(
            self,
            ExecError::UnknownMethod(_) | ExecError::InvalidEndpoint(_) | ExecError::InvalidProxy(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeouts_are_distinguished() {
        let limit = Duration::from_secs(3);
        let t = ExecError::from_io(io::Error::new(io::ErrorKind::TimedOut, "read timed out"), limit);
        assert!(matches!(t, ExecError::Timeout(d) if d == limit));
        let r = ExecError::from_io(io::Error::new(io::ErrorKind::ConnectionRefused, "refused"), limit);
        assert!(matches!(r, ExecError::Transport(_)));
        assert!(r.to_string().contains("refused"));
        let p = ExecError::from_io(io::Error::new(io::ErrorKind::UnexpectedEof, "closed early"), limit);
        assert!(matches!(p, ExecError::Protocol(_)));
    }

    #[test]
    fn construction_classification() {
        assert!(ExecError::UnknownMethod("FETCH".into()).is_construction());
        assert!(!ExecError::Protocol("eof".into()).is_construction());
    }
}
