/*
 * lib.rs
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

//! Posterer core: compose an HTTP/HTTPS request, fire it on a background worker, and read the
//! status, headers, body, timing and audit trail back from a result handle.
//!
//! TLS handling is deliberately permissive when a security level is chosen: server certificates
//! and host names are accepted without verification and every decision is audited. This is a
//! debugging tool, not a general-purpose client.

pub mod audit;
pub mod config;
pub mod error;
pub mod executor;
pub mod keystore;
pub mod model;
pub mod net;
pub mod protocol;
pub mod tls;
pub mod uri;

pub use audit::Auditor;
pub use config::ExecutorConfig;
pub use error::ExecError;
pub use executor::{Executor, RequestTask, Submission, TaskListener, TaskState};
pub use keystore::{KeyStoreError, KeyStoreMaterial, KeyStoreType};
pub use model::{Proxy, Request};
pub use tls::KeyStoreSelection;
