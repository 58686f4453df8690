use std::io;
use thiserror::Error;

use crate::connection::ConnectionState;

/// Top level error of an [`HttpConnection`](crate::connection::HttpConnection).
#[derive(Debug, Error)]
pub enum HttpError {
    #[error("request error: {source}")]
    ParseError {
        #[from]
        source: ParseError,
    },

    #[error("response error: {source}")]
    SendError {
        #[from]
        source: SendError,
    },

    #[error("transport error: {source}")]
    Transport { source: io::Error },

    #[error("operation `{operation}` is not allowed in connection state {state:?}")]
    InvalidState { operation: &'static str, state: ConnectionState },

    #[error("connection closed")]
    Closed,
}

impl HttpError {
    pub fn transport<E: Into<io::Error>>(e: E) -> Self {
        Self::Transport { source: e.into() }
    }

    pub fn invalid_state(operation: &'static str, state: ConnectionState) -> Self {
        Self::InvalidState { operation, state }
    }
}

/// Errors raised while turning bytes into a message.
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("header size too large, current: {current_size} exceed the limit {max_size}")]
    TooLargeHeader { current_size: usize, max_size: usize },

    #[error("header line too long, current: {current_size} exceed the limit {max_size}")]
    TooLongLine { current_size: usize, max_size: usize },

    #[error("header number exceed the limit {max_num}")]
    TooManyHeaders { max_num: usize },

    #[error("invalid header: {reason}")]
    InvalidHeader { reason: String },

    #[error("invalid first line: {reason}")]
    InvalidFirstLine { reason: String },

    #[error("invalid http version: {0:?}")]
    InvalidVersion(String),

    #[error("invalid http method")]
    InvalidMethod,

    #[error("invalid http status: {0:?}")]
    InvalidStatus(String),

    #[error("invalid content-length header: {reason}")]
    InvalidContentLength { reason: String },

    #[error("unsupported transfer-encoding: {value}")]
    UnsupportedTransferEncoding { value: String },

    #[error("invalid chunk: {reason}")]
    InvalidChunk { reason: String },

    #[error("invalid body: {reason}")]
    InvalidBody { reason: String },

    #[error("connection closed unexpectedly while {phase}")]
    UnexpectedClose { phase: &'static str },

    #[error("parser already failed")]
    Failed,

    #[error("io error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },
}

impl ParseError {
    pub fn too_large_header(current_size: usize, max_size: usize) -> Self {
        Self::TooLargeHeader { current_size, max_size }
    }

    pub fn too_long_line(current_size: usize, max_size: usize) -> Self {
        Self::TooLongLine { current_size, max_size }
    }

    pub fn too_many_headers(max_num: usize) -> Self {
        Self::TooManyHeaders { max_num }
    }

    pub fn invalid_header<S: ToString>(str: S) -> Self {
        Self::InvalidHeader { reason: str.to_string() }
    }

    pub fn invalid_first_line<S: ToString>(str: S) -> Self {
        Self::InvalidFirstLine { reason: str.to_string() }
    }

    pub fn invalid_body<S: ToString>(str: S) -> Self {
        Self::InvalidBody { reason: str.to_string() }
    }

    pub fn invalid_chunk<S: ToString>(str: S) -> Self {
        Self::InvalidChunk { reason: str.to_string() }
    }

    pub fn invalid_content_length<S: ToString>(str: S) -> Self {
        Self::InvalidContentLength { reason: str.to_string() }
    }

    pub fn unsupported_transfer_encoding<S: ToString>(str: S) -> Self {
        Self::UnsupportedTransferEncoding { value: str.to_string() }
    }

    pub fn io<E: Into<io::Error>>(e: E) -> Self {
        Self::Io { source: e.into() }
    }
}

/// Errors raised while turning a message into bytes.
#[derive(Error, Debug)]
pub enum SendError {
    #[error("invalid header: {reason}")]
    InvalidHeader { reason: String },

    #[error("invalid body: {reason}")]
    InvalidBody { reason: String },

    #[error("content-length header {declared} does not match body size {actual}")]
    ContentLengthMismatch { declared: String, actual: u64 },

    #[error("body of unknown size must be sent chunked")]
    UnknownSizeNotChunked,

    #[error("body source ended early, {remaining} bytes still expected")]
    BodyUnderflow { remaining: u64 },

    #[error("body source reported {reported} bytes for a buffer of {capacity}")]
    BodyOverrun { reported: usize, capacity: usize },

    #[error("writer already failed")]
    Failed,

    #[error("io error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },
}

impl SendError {
    pub fn invalid_header<S: ToString>(str: S) -> Self {
        Self::InvalidHeader { reason: str.to_string() }
    }

    pub fn invalid_body<S: ToString>(str: S) -> Self {
        Self::InvalidBody { reason: str.to_string() }
    }

    pub fn io<E: Into<io::Error>>(e: E) -> Self {
        Self::Io { source: e.into() }
    }
}
