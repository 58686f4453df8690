//! A poll driven, incremental HTTP/1.1 engine
//!
//! This crate turns a raw, possibly fragmented, non-blocking byte stream into HTTP/1.1
//! messages and back. No part of it blocks or spawns: every component is a state machine
//! that does as much work as the bytes at hand allow, then reports how far it got.
//!
//! # Features
//!
//! - Incremental parsing of requests and responses delivered in chunks of any size
//! - Content-Length, chunked and read-until-close bodies
//! - Pull based writing with automatic chunked framing for large or unsized bodies
//! - Client and server connection state machines with keep-alive and pipelining
//! - Pluggable non-blocking transports, including tokio TCP streams
//!
//! # Example
//!
//! ```no_run
//! use micro_wire_http::config::HttpConfig;
//! use micro_wire_http::connection::{HttpConnection, TokioTransport};
//! use micro_wire_http::protocol::Response;
//! use tokio::net::TcpListener;
//! use tracing::{error, info};
//!
//! #[tokio::main]
//! async fn main() {
//!     let listener = TcpListener::bind("127.0.0.1:8080").await.unwrap();
//!     loop {
//!         let (stream, _) = listener.accept().await.unwrap();
//!         tokio::spawn(async move {
//!             let mut connection = HttpConnection::server(TokioTransport::new(stream), HttpConfig::default());
//!             loop {
//!                 if let Err(e) = connection.drive().await {
//!                     info!(cause = %e, "connection finished");
//!                     return;
//!                 }
//!                 let request = connection.take_request().unwrap();
//!                 let response = Response::ok(format!("hello {}\r\n", request.path()));
//!                 if let Err(e) = connection.send_response(response) {
//!                     error!(cause = %e, "can't send response");
//!                     return;
//!                 }
//!                 if connection.drive().await.is_err() || connection.next_request().is_err() {
//!                     return;
//!                 }
//!             }
//!         });
//!     }
//! }
//! ```
//!
//! # Architecture
//!
//! The crate is organized into several key modules:
//!
//! - [`codec`]: the message parser and writer, free of any I/O
//! - [`connection`]: the connection state machine and the transports
//! - [`protocol`]: requests, responses, bodies and errors
//! - [`config`]: connection settings
//!
//! # Error Handling
//!
//! - [`protocol::HttpError`]: Top-level error type
//! - [`protocol::ParseError`]: errors while reading a message
//! - [`protocol::SendError`]: errors while writing a message
//!
//! Would-block and transport timeouts are never errors, they surface as
//! [`Poll::Pending`](std::task::Poll::Pending).
//!
//! # Limitations
//!
//! - HTTP/1.1 and HTTP/1.0 only
//! - No TLS, wrap a TLS stream in a [`connection::Transport`] instead
//! - Default header section limit: 8KB
//! - Default maximum number of headers: 64

pub mod codec;
pub mod config;
pub mod connection;
pub mod protocol;
pub mod utils;
