/*
 * mod.rs
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

//! HTTP/1.1 client: push-parsed responses delivered to a `ResponseHandler`.
//!
//! - Buffers: `bytes` crate (BytesMut for the parse buffer).
//! - One connection per request, `Connection: close`; bodies delimited by Content-Length,
//!   chunked transfer coding, or connection close.
//! - TLS via tokio-rustls, directly or through a forward proxy's CONNECT tunnel.

mod handler;
mod request;
mod response;

pub mod h1;

pub use handler::{BufferingHandler, ResponseHandler};
pub use h1::H1ResponseHandler;
pub use request::{Method, RequestBuilder};
pub use response::{RawResponse, Response};

pub mod client;
pub mod connection;

pub use client::{HttpClient, Route};
pub use connection::{HttpConnection, HttpStream};
