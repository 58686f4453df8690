use std::io;
use thiserror::Error;

use micro_wire_http::protocol::HttpError;

use crate::connection::WebSocketState;

/// Top level error of a [`WebSocketConnection`](crate::WebSocketConnection).
#[derive(Debug, Error)]
pub enum WsError {
    #[error("handshake error: {source}")]
    Handshake {
        #[from]
        source: HandshakeError,
    },

    #[error("frame error: {source}")]
    Frame {
        #[from]
        source: FrameError,
    },

    #[error("http error: {source}")]
    Http {
        #[from]
        source: HttpError,
    },

    #[error("transport error: {source}")]
    Transport { source: io::Error },

    #[error("operation `{operation}` is not allowed in state {state:?}")]
    InvalidState { operation: &'static str, state: WebSocketState },

    #[error("a close frame was already queued")]
    CloseSent,

    #[error("peer closed the connection without a close frame")]
    UnexpectedClose,

    #[error("connection closed")]
    Closed,
}

impl WsError {
    pub fn transport<E: Into<io::Error>>(e: E) -> Self {
        Self::Transport { source: e.into() }
    }

    pub fn invalid_state(operation: &'static str, state: WebSocketState) -> Self {
        Self::InvalidState { operation, state }
    }
}

/// Errors raised while decoding or validating a frame.
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("reserved bits {bits:#x} are set")]
    ReservedBits { bits: u8 },

    #[error("unknown opcode {0:#x}")]
    UnknownOpcode(u8),

    #[error("most significant bit of the 64 bit payload length is set")]
    LengthMsbSet,

    #[error("frame payload of {size} bytes exceeds the limit {max_size}")]
    TooLarge { size: u64, max_size: u64 },

    #[error("control frames must not be fragmented")]
    FragmentedControl,

    #[error("control frame payload of {0} bytes exceeds 125")]
    ControlTooLarge(u64),

    #[error("frame is masked but the peer must not mask")]
    UnexpectedMask,

    #[error("frame is not masked but the peer must mask")]
    MissingMask,

    #[error("payload is not valid utf-8")]
    InvalidUtf8,

    #[error("frame parser already failed")]
    Failed,

    #[error("io error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },
}

/// Errors raised by the opening handshake.
#[derive(Debug, Error)]
pub enum HandshakeError {
    #[error("missing header {0}")]
    MissingHeader(&'static str),

    #[error("invalid value of header {name}: {value:?}")]
    InvalidHeader { name: &'static str, value: String },

    #[error("handshake request must use GET, got {0}")]
    InvalidMethod(String),

    #[error("unsupported websocket version {0:?}")]
    UnsupportedVersion(String),

    #[error("expected status 101, got {0}")]
    InvalidStatus(u16),

    #[error("sec-websocket-accept does not match the key sent")]
    AcceptMismatch,

    #[error("server selected subprotocol {0:?} that was not offered")]
    UnexpectedProtocol(String),
}

impl HandshakeError {
    pub fn invalid_header<S: ToString>(name: &'static str, value: S) -> Self {
        Self::InvalidHeader { name, value: value.to_string() }
    }
}
