use http::HeaderMap;

use crate::protocol::{Body, ParseError, Request, Response, SendError};

/// Behaviour shared by [`Request`] and [`Response`] so the connection can drive either one
/// through the parser and the writer.
pub trait Message: Send {
    /// The first line without its CRLF.
    fn first_line(&self) -> String;

    fn apply_first_line(&mut self, line: &str) -> Result<(), ParseError>;

    fn headers(&self) -> &HeaderMap;

    fn insert_parsed_header(&mut self, name: &str, value: &str) -> Result<(), ParseError>;

    fn validate_first_line(&self) -> Result<(), SendError>;

    fn parts_mut(&mut self) -> (&mut HeaderMap, &mut Body);

    /// False when the first line alone rules out a body.
    fn may_have_body(&self) -> bool;

    fn clear(&mut self);
}

macro_rules! impl_message {
    ($ty:ty) => {
        impl Message for $ty {
            fn first_line(&self) -> String {
                <$ty>::first_line(self)
            }

            fn apply_first_line(&mut self, line: &str) -> Result<(), ParseError> {
                <$ty>::apply_first_line(self, line)
            }

            fn headers(&self) -> &HeaderMap {
                <$ty>::headers(self)
            }

            fn insert_parsed_header(&mut self, name: &str, value: &str) -> Result<(), ParseError> {
                <$ty>::insert_parsed_header(self, name, value)
            }

            fn validate_first_line(&self) -> Result<(), SendError> {
                <$ty>::validate_first_line(self)
            }

            fn parts_mut(&mut self) -> (&mut HeaderMap, &mut Body) {
                <$ty>::parts_mut(self)
            }

            fn may_have_body(&self) -> bool {
                <$ty>::may_have_body(self)
            }

            fn clear(&mut self) {
                <$ty>::clear(self)
            }
        }
    };
}

impl_message!(Request);
impl_message!(Response);

/// How the body of a parsed message is delimited on the wire.
///
/// This enum is used to determine how the payload should be processed:
/// - Known length: Process exact number of bytes
/// - Chunked: Process using chunked transfer encoding
/// - Until close: Everything up to the transport closing belongs to the body
/// - Empty: No payload to process
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PayloadSize {
    /// Payload with known length in bytes
    Length(u64),
    /// Payload using chunked transfer encoding
    Chunked,
    /// Payload ends when the peer closes the connection
    UntilClose,
    /// Empty payload (no body)
    Empty,
}

impl PayloadSize {
    /// Returns true if the payload uses chunked transfer encoding
    #[inline]
    pub fn is_chunked(&self) -> bool {
        matches!(self, PayloadSize::Chunked)
    }

    /// Returns true if the payload is empty
    #[inline]
    pub fn is_empty(&self) -> bool {
        matches!(self, PayloadSize::Empty | PayloadSize::Length(0))
    }
}

/// What a message writer is told when the body starts streaming.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct BodyPlan {
    /// Frame the body with chunked transfer encoding.
    pub chunked: bool,
    /// Total size if known.
    pub total: Option<u64>,
}

impl BodyPlan {
    pub fn fixed(total: u64) -> Self {
        Self { chunked: false, total: Some(total) }
    }

    pub fn chunked(total: Option<u64>) -> Self {
        Self { chunked: true, total }
    }
}
