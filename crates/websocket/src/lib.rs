//! A poll driven WebSocket (RFC 6455) engine
//!
//! Built on top of `micro-wire-http`: the opening handshake runs over an
//! [`HttpConnection`](micro_wire_http::connection::HttpConnection), then the same non-blocking
//! transport carries frames.
//!
//! # Features
//!
//! - Client and server handshake with `Sec-WebSocket-Accept` verification and subprotocols
//! - Incremental frame parsing with the payload limit checked before anything is buffered
//! - Automatic pong replies and close echoes
//! - A cloneable [`FrameSender`] to queue frames from other threads or tasks
//! - [`codec::WsCodec`] for use with `tokio_util::codec`
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use micro_wire_http::connection::TokioTransport;
//! use micro_wire_ws::{Entropy, WebSocketConfig, WebSocketConnection, WebSocketState};
//! use tokio::net::TcpListener;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let entropy = Arc::new(Entropy::new());
//!     let listener = TcpListener::bind("127.0.0.1:9001").await?;
//!     let (stream, _) = listener.accept().await?;
//!
//!     let mut ws = WebSocketConnection::server(TokioTransport::new(stream), WebSocketConfig::default(), entropy);
//!     while ws.drive().await.is_ok() && ws.state() != WebSocketState::Closed {
//!         while let Some(frame) = ws.recv() {
//!             if frame.opcode.is_data() {
//!                 ws.send(frame)?;
//!             }
//!         }
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Errors
//!
//! - [`WsError`]: top level error of a connection
//! - [`FrameError`]: malformed or disallowed frames
//! - [`HandshakeError`]: a rejected upgrade request or response

pub mod codec;
mod config;
mod connection;
mod entropy;
mod error;
mod frame;
pub mod handshake;
mod sender;

pub use config::WebSocketConfig;
pub use connection::{ReadState, WebSocketConnection, WebSocketState, WriteState};
pub use entropy::Entropy;
pub use error::{FrameError, HandshakeError, WsError};
pub use frame::{CloseCode, Frame, MAX_CONTROL_PAYLOAD, OpCode};
pub use sender::FrameSender;
