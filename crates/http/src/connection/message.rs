//! Glue between a [`Message`] and the codec callback interfaces.

use bytes::BytesMut;
use http::HeaderValue;
use http::header::{CONTENT_LENGTH, TRANSFER_ENCODING};

use crate::codec::{MessageSource, ParseHandler};
use crate::protocol::header::{contains_token, validate_outgoing};
use crate::protocol::{BodyPlan, Message, ParseError, SendError};
use crate::utils::{HEADER_SEPARATOR, ensure};

/// Fills a message from parse events.
pub(crate) struct IncomingMessage<'a> {
    message: &'a mut dyn Message,
}

impl<'a> IncomingMessage<'a> {
    pub(crate) fn new(message: &'a mut dyn Message) -> Self {
        Self { message }
    }

    pub(crate) fn may_have_body(&self) -> bool {
        self.message.may_have_body()
    }
}

impl ParseHandler for IncomingMessage<'_> {
    fn on_first_line(&mut self, line: &str) -> Result<(), ParseError> {
        self.message.apply_first_line(line)
    }

    fn on_header(&mut self, name: &str, value: &str) -> Result<(), ParseError> {
        self.message.insert_parsed_header(name, value)
    }

    fn on_body_part(&mut self, data: &[u8]) -> Result<(), ParseError> {
        self.message.parts_mut().1.write(data).map_err(ParseError::io)
    }

    fn on_complete(&mut self) -> Result<(), ParseError> {
        self.message.parts_mut().1.finish().map_err(ParseError::io)
    }
}

/// Serves a message to the writer.
pub(crate) struct OutgoingMessage<'a> {
    message: &'a mut dyn Message,
    skip_body: bool,
}

impl<'a> OutgoingMessage<'a> {
    /// With `skip_body` the headers are written as prepared but no body follows, as in the
    /// response to a HEAD request.
    pub(crate) fn new(message: &'a mut dyn Message, skip_body: bool) -> Self {
        Self { message, skip_body }
    }
}

impl MessageSource for OutgoingMessage<'_> {
    fn header_count(&self) -> usize {
        1 + self.message.headers().len()
    }

    fn header(&mut self, index: usize, dst: &mut BytesMut) -> Result<(), SendError> {
        if index == 0 {
            dst.extend_from_slice(self.message.first_line().as_bytes());
            return Ok(());
        }

        let (name, value) = self
            .message
            .headers()
            .iter()
            .nth(index - 1)
            .ok_or_else(|| SendError::invalid_header(format!("no header at index {index}")))?;
        dst.extend_from_slice(name.as_str().as_bytes());
        dst.extend_from_slice(HEADER_SEPARATOR);
        dst.extend_from_slice(value.as_bytes());
        Ok(())
    }

    fn start_body_streaming(&mut self) -> Result<BodyPlan, SendError> {
        if self.skip_body {
            return Ok(BodyPlan::fixed(0));
        }
        let chunked = is_chunked_outgoing(self.message.headers().get(TRANSFER_ENCODING));
        let total = self.message.parts_mut().1.size_hint();
        Ok(BodyPlan { chunked, total })
    }

    fn body_part(&mut self, buf: &mut [u8]) -> Result<usize, SendError> {
        self.message.parts_mut().1.read(buf).map_err(SendError::io)
    }
}

fn is_chunked_outgoing(value: Option<&HeaderValue>) -> bool {
    value.is_some_and(|value| contains_token(value, "chunked"))
}

/// Checks an outgoing message and fixes its framing headers before anything is written.
///
/// A body of unknown size, or one larger than `max_chunk_size`, is sent chunked and loses any
/// `Content-Length`. Otherwise `Content-Length` is set, and a declared one must match.
pub(crate) fn prepare_outgoing(message: &mut dyn Message, max_chunk_size: usize) -> Result<(), SendError> {
    message.validate_first_line()?;
    validate_outgoing(message.headers())?;

    if !message.may_have_body() {
        // 1xx, 204 and 304 responses get no framing headers
        let size = message.parts_mut().1.size_hint();
        ensure!(size == Some(0), SendError::invalid_body("this status must not carry a body"));
        return Ok(());
    }

    let (headers, body) = message.parts_mut();
    let size = body.size_hint();
    let chunked = is_chunked_outgoing(headers.get(TRANSFER_ENCODING));

    match size {
        Some(size) if !chunked && size <= max_chunk_size as u64 => {
            if let Some(declared) = headers.get(CONTENT_LENGTH) {
                let matches = declared.to_str().ok().and_then(|v| v.trim().parse::<u64>().ok()) == Some(size);
                if !matches {
                    return Err(SendError::ContentLengthMismatch {
                        declared: String::from_utf8_lossy(declared.as_bytes()).into_owned(),
                        actual: size,
                    });
                }
            } else {
                headers.insert(CONTENT_LENGTH, HeaderValue::from(size));
            }
        }
        _ => {
            headers.remove(CONTENT_LENGTH);
            headers.insert(TRANSFER_ENCODING, HeaderValue::from_static("chunked"));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::MessageWriter;
    use crate::protocol::{Body, BodySource, Request, Response};
    use std::io;

    struct Unsized(Vec<u8>);

    impl BodySource for Unsized {
        fn size_hint(&self) -> Option<u64> {
            None
        }

        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let len = buf.len().min(self.0.len());
            buf[..len].copy_from_slice(&self.0[..len]);
            self.0.drain(..len);
            Ok(len)
        }
    }

    fn write(message: &mut dyn Message, max_chunk_size: usize) -> String {
        prepare_outgoing(message, max_chunk_size).unwrap();
        let mut writer = MessageWriter::new(max_chunk_size);
        let mut src = OutgoingMessage::new(message, false);
        writer.start_streaming(&mut src).unwrap();
        let mut out = Vec::new();
        while let Some(piece) = writer.data() {
            out.extend_from_slice(piece);
            writer.next(&mut src).unwrap();
        }
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn small_body_gets_content_length() {
        let mut response = Response::ok("hello");
        assert_eq!(write(&mut response, 1024), "HTTP/1.1 200 OK\r\ncontent-length: 5\r\n\r\nhello");
    }

    #[test]
    fn large_body_is_chunked() {
        let mut request = Request::post("/upload", "abcdef").with_header("Content-Length", "6").unwrap();
        let out = write(&mut request, 4);
        assert_eq!(out, "POST /upload HTTP/1.1\r\ntransfer-encoding: chunked\r\n\r\n4\r\nabcd\r\n2\r\nef\r\n0\r\n\r\n");
    }

    #[test]
    fn unknown_size_is_chunked() {
        let mut response = Response::ok(Body::from_source(Unsized(b"stream".to_vec())));
        let out = write(&mut response, 1024);
        assert!(out.starts_with("HTTP/1.1 200 OK\r\ntransfer-encoding: chunked\r\n\r\n6\r\nstream\r\n"));
    }

    #[test]
    fn mismatched_content_length() {
        let mut response = Response::ok("hello").with_header("Content-Length", "4").unwrap();
        assert!(matches!(prepare_outgoing(&mut response, 1024), Err(SendError::ContentLengthMismatch { actual: 5, .. })));
    }

    #[test]
    fn bodyless_status_gets_no_framing() {
        let mut response = Response::new(http::StatusCode::SWITCHING_PROTOCOLS).with_header("Upgrade", "websocket").unwrap();
        assert_eq!(write(&mut response, 1024), "HTTP/1.1 101 Switching Protocols\r\nupgrade: websocket\r\n\r\n");

        let mut response = Response::new(http::StatusCode::NO_CONTENT).with_body("oops");
        assert!(matches!(prepare_outgoing(&mut response, 1024), Err(SendError::InvalidBody { .. })));
    }

    #[test]
    fn unsafe_path_is_rejected() {
        let mut request = Request::get("/a b");
        assert!(prepare_outgoing(&mut request, 1024).is_err());
    }

    #[test]
    fn parse_events_fill_the_message() {
        let mut response = Response::default();
        let mut incoming = IncomingMessage::new(&mut response);
        incoming.on_first_line("HTTP/1.1 404 Not Found").unwrap();
        incoming.on_header("Server", "test").unwrap();
        incoming.on_body_part(b"missing").unwrap();
        incoming.on_complete().unwrap();

        assert_eq!(response.status().as_u16(), 404);
        assert_eq!(response.header("server").unwrap(), "test");
        assert_eq!(response.body().as_bytes(), Some(&b"missing"[..]));
    }
}
