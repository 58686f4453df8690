//! HTTP connection handling module
//!
//! This module binds a [`MessageParser`](crate::codec::MessageParser) and a
//! [`MessageWriter`](crate::codec::MessageWriter) to a [`Transport`] and drives them through
//! the request/response cycle of either side of a connection.
//!
//! # Components
//!
//! - [`HttpConnection`]: the connection state machine, driven by repeated
//!   [`process`](HttpConnection::process) calls
//! - [`Transport`]: the non-blocking byte stream underneath, with [`StdTransport`],
//!   [`TokioTransport`] and the in-memory [`pipe`]
//! - [`ConnectionState`], [`Role`] and [`ReadStrategy`]

mod http_connection;
mod message;
pub mod transport;

pub use http_connection::HttpConnection;
pub use transport::{IoStatus, PipeTransport, StdTransport, TokioTransport, Transport, pipe};

/// Which side of the exchange a connection plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Server,
    Client,
}

/// How much a reading phase pulls from the transport per `process()` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReadStrategy {
    /// Return after one successful read, even if the message is not complete.
    Once,
    /// Keep reading until the message is complete or the transport would block.
    #[default]
    UntilWouldBlock,
}

/// Lifecycle of an [`HttpConnection`]. Exactly one state holds at any time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// A client with no request submitted.
    Idle,
    ServerReadingRequest,
    ServerReadingRequestComplete,
    ServerWritingResponse,
    ServerWritingResponseComplete,
    ClientWritingRequest,
    ClientWritingRequestComplete,
    ClientReadingResponse,
    ClientReadingResponseComplete,
    Error,
    Closed,
}

impl ConnectionState {
    #[inline]
    pub fn is_reading(&self) -> bool {
        matches!(self, ConnectionState::ServerReadingRequest | ConnectionState::ClientReadingResponse)
    }

    #[inline]
    pub fn is_writing(&self) -> bool {
        matches!(self, ConnectionState::ServerWritingResponse | ConnectionState::ClientWritingRequest)
    }

    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(self, ConnectionState::Error | ConnectionState::Closed)
    }
}
