/*
 * proxy.rs
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

//! Forward proxy descriptor.

use super::is_present;

/// Forward proxy. All fields default to empty; equality and hashing cover all four.
///
/// `user` and `password` are carried for the UI but never sent: proxy authentication is not
/// implemented.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Proxy {
    pub host: String,
    pub port: String,
    pub user: String,
    pub password: String,
}

impl Proxy {
    pub fn new(host: impl Into<String>, port: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: port.into(),
            ..Self::default()
        }
    }

    /// Host and port are both non-blank.
    pub fn actionable(&self) -> bool {
        is_present(&self.host) && is_present(&self.port)
    }

    pub fn is_actionable(proxy: Option<&Proxy>) -> bool {
        proxy.map(Proxy::actionable).unwrap_or(false)
    }

    /// Port as a number, if it parses.
    pub fn port_number(&self) -> Option<u16> {
        self.port.trim().parse().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn actionable_needs_host_and_port() {
        assert!(Proxy::new("proxy.local", "3128").actionable());
        assert!(!Proxy::new("proxy.local", "").actionable());
        assert!(!Proxy::new(" ", "3128").actionable());
        assert!(!Proxy::is_actionable(None));
    }

    #[test]
    fn equality_covers_credentials() {
        let a = Proxy::new("p", "8080");
        let mut b = a.clone();
        assert_eq!(a, b);
        b.user = "alice".to_string();
        assert_ne!(a, b);
        let set: HashSet<Proxy> = [a.clone(), b.clone(), a.clone()].into_iter().collect();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn port_number_parses_trimmed() {
        assert_eq!(Proxy::new("p", " 8080 ").port_number(), Some(8080));
        assert_eq!(Proxy::new("p", "http").port_number(), None);
    }
}
