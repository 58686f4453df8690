//! Incremental HTTP/1.1 message parser.
//!
//! [`MessageParser`] turns a byte stream delivered in arbitrary fragments into callbacks on a
//! [`ParseHandler`]: the first line, every header, the end of the header section, body parts
//! and completion. It never owns the message being built, the handler is handed over on every
//! call instead.
//!
//! # State machine
//!
//! ```text
//! ReadingFirstLine -> ReadingHeaders -> ReadingHeadersReady                      (manual)
//!                                    -> ReadingHeadersReadyApplyNextBodyState    (auto)
//!                  -> ReadingBodyContentLength | ReadingBodyChunked | ReadingBodyUntilConnectionClose
//!                  -> Complete
//! ```
//!
//! `Error` is reachable from every state and is sticky.
//!
//! When the empty line ending the headers is found the parser stops consuming right after it.
//! In auto mode the next [`insert_data`](MessageParser::insert_data) call selects the body mode
//! and returns `0` so the caller can react to the new state before handing the remaining bytes
//! back. In manual mode the caller selects it with
//! [`apply_body_state`](MessageParser::apply_body_state).

use tracing::{debug, trace, warn};

use crate::codec::chunked_decoder::ChunkedDecoder;
use crate::codec::line_buffer::LineBuffer;
use crate::protocol::header::{is_chunked, is_header_safe, parse_content_length};
use crate::protocol::{ParseError, PayloadSize};
use crate::utils::{HEADER_SEPARATOR, ensure, find_pattern};

/// Maximum number of headers allowed in a message
pub const DEFAULT_MAX_HEADER_COUNT: usize = 64;

/// Maximum size in bytes allowed for the entire header section
pub const DEFAULT_MAX_HEADER_BYTES: usize = 8 * 1024;

/// Maximum size in bytes of one line, the capacity of the line scratch window
pub const DEFAULT_MAX_LINE_BYTES: usize = 4 * 1024;

/// Receiver of parse events.
///
/// Every callback may fail; a failure moves the parser into [`ParserState::Error`].
pub trait ParseHandler {
    fn on_first_line(&mut self, line: &str) -> Result<(), ParseError>;

    fn on_header(&mut self, name: &str, value: &str) -> Result<(), ParseError>;

    /// Called once the empty line is read. `remaining` is the number of bytes of the current
    /// input that follow the header section.
    fn on_headers_complete(&mut self, remaining: usize) -> Result<(), ParseError> {
        let _ = remaining;
        Ok(())
    }

    fn on_body_part(&mut self, data: &[u8]) -> Result<(), ParseError>;

    fn on_complete(&mut self) -> Result<(), ParseError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParserState {
    ReadingFirstLine,
    ReadingHeaders,
    /// Headers are done, waiting for [`MessageParser::apply_body_state`].
    ReadingHeadersReady,
    /// Headers are done, the next `insert_data` call selects the body mode.
    ReadingHeadersReadyApplyNextBodyState,
    ReadingBodyUntilConnectionClose,
    ReadingBodyContentLength,
    ReadingBodyChunked,
    Complete,
    Error,
}

impl ParserState {
    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(self, ParserState::Complete | ParserState::Error)
    }

    #[inline]
    pub fn is_reading_headers(&self) -> bool {
        matches!(self, ParserState::ReadingFirstLine | ParserState::ReadingHeaders)
    }
}

/// Limits and behaviour of a [`MessageParser`].
///
/// The line limit is the capacity of the scratch window one line is collected in; the header
/// limit is the protocol limit for the whole header section. They are checked independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParserConfig {
    pub max_header_count: usize,
    pub max_header_bytes: usize,
    pub max_line_bytes: usize,
    /// Select the body mode on the call after the headers end instead of waiting for
    /// [`MessageParser::apply_body_state`].
    pub auto_body_state: bool,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            max_header_count: DEFAULT_MAX_HEADER_COUNT,
            max_header_bytes: DEFAULT_MAX_HEADER_BYTES,
            max_line_bytes: DEFAULT_MAX_LINE_BYTES,
            auto_body_state: true,
        }
    }
}

impl ParserConfig {
    #[must_use]
    pub fn with_max_header_count(mut self, max_header_count: usize) -> Self {
        self.max_header_count = max_header_count;
        self
    }

    #[must_use]
    pub fn with_max_header_bytes(mut self, max_header_bytes: usize) -> Self {
        self.max_header_bytes = max_header_bytes;
        self
    }

    #[must_use]
    pub fn with_max_line_bytes(mut self, max_line_bytes: usize) -> Self {
        self.max_line_bytes = max_line_bytes;
        self
    }

    #[must_use]
    pub fn with_auto_body_state(mut self, auto_body_state: bool) -> Self {
        self.auto_body_state = auto_body_state;
        self
    }
}

/// Incremental parser for one HTTP message at a time.
#[derive(Debug)]
pub struct MessageParser {
    config: ParserConfig,
    state: ParserState,
    trailing_bytes_as_body: bool,
    expect_body: bool,
    lines: LineBuffer,
    header_count: usize,
    header_bytes: usize,
    transfer_encoding: Option<Vec<u8>>,
    content_length: Option<u64>,
    body_length: u64,
    body_received: u64,
    chunked: ChunkedDecoder,
}

impl Default for MessageParser {
    fn default() -> Self {
        Self::new(ParserConfig::default())
    }
}

impl MessageParser {
    pub fn new(config: ParserConfig) -> Self {
        Self {
            config,
            state: ParserState::ReadingFirstLine,
            trailing_bytes_as_body: false,
            expect_body: true,
            lines: LineBuffer::new(config.max_line_bytes),
            header_count: 0,
            header_bytes: 0,
            transfer_encoding: None,
            content_length: None,
            body_length: 0,
            body_received: 0,
            chunked: ChunkedDecoder::new(config.max_line_bytes),
        }
    }

    /// Resets every counter for a new message.
    ///
    /// With `trailing_bytes_as_body` a message without Content-Length or chunked encoding
    /// reads its body until the connection closes instead of having no body.
    pub fn initialize(&mut self, trailing_bytes_as_body: bool) {
        self.state = ParserState::ReadingFirstLine;
        self.trailing_bytes_as_body = trailing_bytes_as_body;
        self.expect_body = true;
        self.lines.clear();
        self.header_count = 0;
        self.header_bytes = 0;
        self.transfer_encoding = None;
        self.content_length = None;
        self.body_length = 0;
        self.body_received = 0;
        self.chunked.reset();
    }

    /// Declares that the message being parsed has no body whatever its headers say, as for the
    /// response to a HEAD request.
    pub fn set_expect_body(&mut self, expect_body: bool) {
        self.expect_body = expect_body;
    }

    #[inline]
    pub fn state(&self) -> ParserState {
        self.state
    }

    #[inline]
    pub fn config(&self) -> &ParserConfig {
        &self.config
    }

    /// Declared body size once the body mode is selected.
    pub fn payload_size(&self) -> Option<PayloadSize> {
        match self.state {
            ParserState::ReadingBodyContentLength => Some(PayloadSize::Length(self.body_length)),
            ParserState::ReadingBodyChunked => Some(PayloadSize::Chunked),
            ParserState::ReadingBodyUntilConnectionClose => Some(PayloadSize::UntilClose),
            _ => None,
        }
    }

    /// Feeds bytes to the parser and returns how many were consumed.
    ///
    /// Zero-length input is allowed. Unconsumed bytes belong to a later phase: hand them back
    /// after inspecting [`state`](Self::state). Once the parser failed every call returns an
    /// error.
    pub fn insert_data(&mut self, data: &[u8], handler: &mut dyn ParseHandler) -> Result<usize, ParseError> {
        match self.do_insert(data, handler) {
            Ok(consumed) => Ok(consumed),
            Err(e) => Err(self.fail(e)),
        }
    }

    /// Feeds `data` until it is consumed or the parser stops accepting bytes.
    ///
    /// Returns the number of bytes consumed; anything left belongs to the next message.
    pub fn insert_all(&mut self, data: &[u8], handler: &mut dyn ParseHandler) -> Result<usize, ParseError> {
        let mut consumed = 0;
        loop {
            let used = self.insert_data(&data[consumed..], handler)?;
            consumed += used;
            let pending_transition = self.state == ParserState::ReadingHeadersReadyApplyNextBodyState;
            if !pending_transition && (consumed == data.len() || used == 0) {
                return Ok(consumed);
            }
        }
    }

    /// Selects the body mode once headers are complete.
    ///
    /// Only valid in [`ParserState::ReadingHeadersReady`] or
    /// [`ParserState::ReadingHeadersReadyApplyNextBodyState`].
    pub fn apply_body_state(&mut self, handler: &mut dyn ParseHandler) -> Result<(), ParseError> {
        match self.do_apply_body_state(handler) {
            Ok(()) => Ok(()),
            Err(e) => Err(self.fail(e)),
        }
    }

    /// Tells the parser the transport closed.
    ///
    /// Completes a body read until close; anywhere else before completion this is an error.
    pub fn connection_closed(&mut self, handler: &mut dyn ParseHandler) -> Result<(), ParseError> {
        match self.state {
            ParserState::ReadingBodyUntilConnectionClose => {
                debug!(body_size = self.body_received, "connection closed, body complete");
                self.complete(handler).map_err(|e| self.fail(e))
            }
            ParserState::Complete => Ok(()),
            ParserState::Error => Err(ParseError::Failed),
            _ => {
                let phase = if self.state.is_reading_headers() { "reading headers" } else { "reading body" };
                Err(self.fail(ParseError::UnexpectedClose { phase }))
            }
        }
    }

    fn fail(&mut self, e: ParseError) -> ParseError {
        if self.state != ParserState::Error {
            warn!(state = ?self.state, cause = %e, "http parser failed");
            self.state = ParserState::Error;
        }
        e
    }

    fn do_insert(&mut self, data: &[u8], handler: &mut dyn ParseHandler) -> Result<usize, ParseError> {
        match self.state {
            ParserState::ReadingFirstLine | ParserState::ReadingHeaders => self.read_header_lines(data, handler),

            ParserState::ReadingHeadersReady | ParserState::Complete => Ok(0),

            ParserState::ReadingHeadersReadyApplyNextBodyState => {
                self.do_apply_body_state(handler)?;
                Ok(0)
            }

            ParserState::ReadingBodyContentLength => {
                let remaining = self.body_length - self.body_received;
                let len = usize::try_from(remaining).unwrap_or(usize::MAX).min(data.len());
                if len > 0 {
                    handler.on_body_part(&data[..len])?;
                    self.body_received += len as u64;
                }
                if self.body_received == self.body_length {
                    self.complete(handler)?;
                }
                Ok(len)
            }

            ParserState::ReadingBodyChunked => {
                let consumed = self.chunked.decode(data, handler)?;
                self.body_received += consumed as u64;
                if self.chunked.is_finished() {
                    self.complete(handler)?;
                }
                Ok(consumed)
            }

            ParserState::ReadingBodyUntilConnectionClose => {
                if !data.is_empty() {
                    handler.on_body_part(data)?;
                    self.body_received += data.len() as u64;
                }
                Ok(data.len())
            }

            ParserState::Error => Err(ParseError::Failed),
        }
    }

    fn read_header_lines(&mut self, data: &[u8], handler: &mut dyn ParseHandler) -> Result<usize, ParseError> {
        let mut consumed = 0;

        loop {
            let (used, line) = self.lines.next_line(&data[consumed..])?;
            consumed += used;

            let Some(line) = line else {
                let current_size = self.header_bytes + self.lines.pending();
                ensure!(
                    current_size <= self.config.max_header_bytes,
                    ParseError::too_large_header(current_size, self.config.max_header_bytes)
                );
                return Ok(consumed);
            };

            self.header_bytes += line.len() + 2;
            ensure!(
                self.header_bytes <= self.config.max_header_bytes,
                ParseError::too_large_header(self.header_bytes, self.config.max_header_bytes)
            );
            ensure!(is_header_safe(&line), ParseError::invalid_header("line contains bytes outside printable ascii"));

            if self.state == ParserState::ReadingFirstLine {
                ensure!(!line.is_empty(), ParseError::invalid_first_line("empty first line"));
                // header safe bytes are ascii, so this can't fail
                let first_line = std::str::from_utf8(&line).map_err(|e| ParseError::invalid_first_line(e.to_string()))?;
                trace!(first_line, "parsed first line");
                handler.on_first_line(first_line)?;
                self.state = ParserState::ReadingHeaders;
                continue;
            }

            if line.is_empty() {
                let remaining = data.len() - consumed;
                debug!(header_count = self.header_count, header_bytes = self.header_bytes, "parsed header section");
                handler.on_headers_complete(remaining)?;
                self.state = if self.config.auto_body_state {
                    ParserState::ReadingHeadersReadyApplyNextBodyState
                } else {
                    ParserState::ReadingHeadersReady
                };
                return Ok(consumed);
            }

            self.header_count += 1;
            ensure!(self.header_count <= self.config.max_header_count, ParseError::too_many_headers(self.config.max_header_count));
            self.read_header(&line, handler)?;
        }
    }

    fn read_header(&mut self, line: &[u8], handler: &mut dyn ParseHandler) -> Result<(), ParseError> {
        let Some(separator) = find_pattern(line, HEADER_SEPARATOR, 0) else {
            return Err(ParseError::invalid_header(format!("missing separator in {:?}", String::from_utf8_lossy(line))));
        };

        let name = &line[..separator];
        let value = line[separator + HEADER_SEPARATOR.len()..].trim_ascii();
        ensure!(!name.is_empty() && name.trim_ascii() == name, ParseError::invalid_header("malformed header name"));

        if name.eq_ignore_ascii_case(b"transfer-encoding") {
            self.transfer_encoding = Some(value.to_vec());
        } else if name.eq_ignore_ascii_case(b"content-length") {
            let length = parse_content_length(value)?;
            if self.content_length.is_some_and(|existing| existing != length) {
                return Err(ParseError::invalid_content_length("conflicting content-length headers"));
            }
            self.content_length = Some(length);
        }

        // header safe bytes are ascii
        let name = std::str::from_utf8(name).map_err(|e| ParseError::invalid_header(e.to_string()))?;
        let value = std::str::from_utf8(value).map_err(|e| ParseError::invalid_header(e.to_string()))?;
        trace!(name, value, "parsed header");
        handler.on_header(name, value)
    }

    fn do_apply_body_state(&mut self, handler: &mut dyn ParseHandler) -> Result<(), ParseError> {
        ensure!(
            matches!(self.state, ParserState::ReadingHeadersReady | ParserState::ReadingHeadersReadyApplyNextBodyState),
            ParseError::invalid_body(format!("can't select body mode in state {:?}", self.state))
        );

        let payload_size = self.select_payload_size()?;
        debug!(?payload_size, "selected body mode");

        match payload_size {
            PayloadSize::Chunked => {
                self.chunked.reset();
                self.state = ParserState::ReadingBodyChunked;
            }
            PayloadSize::Length(0) | PayloadSize::Empty => self.complete(handler)?,
            PayloadSize::Length(length) => {
                self.body_length = length;
                self.body_received = 0;
                self.state = ParserState::ReadingBodyContentLength;
            }
            PayloadSize::UntilClose => self.state = ParserState::ReadingBodyUntilConnectionClose,
        }
        Ok(())
    }

    fn select_payload_size(&self) -> Result<PayloadSize, ParseError> {
        if !self.expect_body {
            return Ok(PayloadSize::Empty);
        }

        // refer: https://www.rfc-editor.org/rfc/rfc9112.html#name-transfer-encoding
        if let Some(value) = &self.transfer_encoding
            && is_chunked(value)?
        {
            return Ok(PayloadSize::Chunked);
        }

        if let Some(length) = self.content_length {
            return Ok(PayloadSize::Length(length));
        }

        if self.trailing_bytes_as_body {
            return Ok(PayloadSize::UntilClose);
        }

        Ok(PayloadSize::Empty)
    }

    fn complete(&mut self, handler: &mut dyn ParseHandler) -> Result<(), ParseError> {
        self.state = ParserState::Complete;
        trace!(body_size = self.body_received, "message complete");
        handler.on_complete()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Event {
        FirstLine(String),
        Header(String, String),
        HeadersComplete(usize),
        Body(Vec<u8>),
        Complete,
    }

    #[derive(Default)]
    struct Recorder {
        events: Vec<Event>,
        fail_on_header: Option<&'static str>,
    }

    impl Recorder {
        fn body(&self) -> Vec<u8> {
            self.events
                .iter()
                .filter_map(|e| match e {
                    Event::Body(b) => Some(b.clone()),
                    _ => None,
                })
                .flatten()
                .collect()
        }

        fn completions(&self) -> usize {
            self.events.iter().filter(|e| **e == Event::Complete).count()
        }

        /// Events with adjacent body parts merged, so different fragmentations compare equal.
        fn normalized(&self) -> Vec<Event> {
            let mut out: Vec<Event> = Vec::new();
            for event in &self.events {
                match (out.last_mut(), event) {
                    (Some(Event::Body(previous)), Event::Body(next)) => previous.extend_from_slice(next),
                    (_, Event::HeadersComplete(_)) => out.push(Event::HeadersComplete(0)),
                    _ => out.push(event.clone()),
                }
            }
            out
        }
    }

    impl ParseHandler for Recorder {
        fn on_first_line(&mut self, line: &str) -> Result<(), ParseError> {
            self.events.push(Event::FirstLine(line.to_string()));
            Ok(())
        }

        fn on_header(&mut self, name: &str, value: &str) -> Result<(), ParseError> {
            if self.fail_on_header == Some(name) {
                return Err(ParseError::invalid_header("rejected by handler"));
            }
            self.events.push(Event::Header(name.to_string(), value.to_string()));
            Ok(())
        }

        fn on_headers_complete(&mut self, remaining: usize) -> Result<(), ParseError> {
            self.events.push(Event::HeadersComplete(remaining));
            Ok(())
        }

        fn on_body_part(&mut self, data: &[u8]) -> Result<(), ParseError> {
            self.events.push(Event::Body(data.to_vec()));
            Ok(())
        }

        fn on_complete(&mut self) -> Result<(), ParseError> {
            self.events.push(Event::Complete);
            Ok(())
        }
    }

    fn crlf(text: &str) -> Vec<u8> {
        text.replace('\n', "\r\n").into_bytes()
    }

    fn parse_whole(input: &[u8], trailing_bytes_as_body: bool) -> (MessageParser, Recorder, usize) {
        let mut parser = MessageParser::default();
        parser.initialize(trailing_bytes_as_body);
        let mut recorder = Recorder::default();
        let consumed = parser.insert_all(input, &mut recorder).unwrap();
        (parser, recorder, consumed)
    }

    fn parse_byte_by_byte(input: &[u8], trailing_bytes_as_body: bool) -> (MessageParser, Recorder) {
        let mut parser = MessageParser::default();
        parser.initialize(trailing_bytes_as_body);
        let mut recorder = Recorder::default();
        for byte in input {
            let consumed = parser.insert_all(std::slice::from_ref(byte), &mut recorder).unwrap();
            if parser.state() != ParserState::Complete {
                assert_eq!(consumed, 1);
            }
        }
        (parser, recorder)
    }

    #[test]
    fn from_curl() {
        let input = crlf(indoc! {r##"
        GET /index.html HTTP/1.1
        Host: 127.0.0.1:8080
        User-Agent: curl/7.79.1
        Accept: */*

        "##});

        let (parser, recorder, consumed) = parse_whole(&input, false);

        assert_eq!(consumed, input.len());
        assert_eq!(parser.state(), ParserState::Complete);
        assert_eq!(
            recorder.events,
            vec![
                Event::FirstLine("GET /index.html HTTP/1.1".into()),
                Event::Header("Host".into(), "127.0.0.1:8080".into()),
                Event::Header("User-Agent".into(), "curl/7.79.1".into()),
                Event::Header("Accept".into(), "*/*".into()),
                Event::HeadersComplete(0),
                Event::Complete,
            ]
        );
    }

    #[test]
    fn headers_stop_at_the_empty_line() {
        let input = crlf("POST /a HTTP/1.1\nContent-Length: 3\n\n123");

        let mut parser = MessageParser::default();
        parser.initialize(false);
        let mut recorder = Recorder::default();

        let consumed = parser.insert_data(&input, &mut recorder).unwrap();
        assert_eq!(consumed, input.len() - 3);
        assert_eq!(parser.state(), ParserState::ReadingHeadersReadyApplyNextBodyState);
        assert_eq!(recorder.events.last(), Some(&Event::HeadersComplete(3)));

        // the transition call consumes nothing
        assert_eq!(parser.insert_data(&input[consumed..], &mut recorder).unwrap(), 0);
        assert_eq!(parser.state(), ParserState::ReadingBodyContentLength);
        assert_eq!(parser.payload_size(), Some(PayloadSize::Length(3)));

        assert_eq!(parser.insert_data(&input[consumed..], &mut recorder).unwrap(), 3);
        assert_eq!(parser.state(), ParserState::Complete);
        assert_eq!(recorder.body(), b"123");
    }

    #[test]
    fn manual_body_state() {
        let input = crlf("POST /a HTTP/1.1\nTransfer-Encoding: chunked\n\n");

        let mut parser = MessageParser::new(ParserConfig::default().with_auto_body_state(false));
        parser.initialize(false);
        let mut recorder = Recorder::default();

        assert_eq!(parser.insert_data(&input, &mut recorder).unwrap(), input.len());
        assert_eq!(parser.state(), ParserState::ReadingHeadersReady);
        assert_eq!(parser.insert_data(b"0\r\n\r\n", &mut recorder).unwrap(), 0);

        parser.apply_body_state(&mut recorder).unwrap();
        assert_eq!(parser.state(), ParserState::ReadingBodyChunked);
        assert_eq!(parser.insert_data(b"0\r\n\r\n", &mut recorder).unwrap(), 5);
        assert_eq!(parser.state(), ParserState::Complete);
    }

    #[test]
    fn content_length_is_never_exceeded() {
        let input = crlf("HTTP/1.1 200 OK\nContent-Length: 5\n\nhello, next message");
        let (parser, recorder, consumed) = parse_whole(&input, false);

        assert_eq!(parser.state(), ParserState::Complete);
        assert_eq!(recorder.body(), b"hello");
        assert_eq!(input.len() - consumed, ", next message".len());
        assert_eq!(recorder.completions(), 1);
    }

    #[test]
    fn zero_content_length_completes_immediately() {
        let input = crlf("HTTP/1.1 204 No Content\nContent-Length: 0\n\n");
        let (parser, recorder, _) = parse_whole(&input, true);
        assert_eq!(parser.state(), ParserState::Complete);
        assert_eq!(recorder.completions(), 1);
        assert!(recorder.body().is_empty());
    }

    #[test]
    fn chunked_wikipedia() {
        let mut input = crlf("HTTP/1.1 200 OK\nTransfer-Encoding: chunked\n\n");
        input.extend_from_slice(b"4\r\nWiki\r\n5\r\npedia\r\n0\r\n\r\n");

        let (parser, recorder, consumed) = parse_whole(&input, false);
        assert_eq!(consumed, input.len());
        assert_eq!(parser.state(), ParserState::Complete);
        assert_eq!(recorder.body(), b"Wikipedia");
        assert_eq!(recorder.completions(), 1);
    }

    #[test]
    fn until_close_body() {
        let input = crlf("HTTP/1.0 200 OK\nServer: test\n\nsome raw bytes");
        let (mut parser, mut recorder, consumed) = parse_whole(&input, true);

        assert_eq!(consumed, input.len());
        assert_eq!(parser.state(), ParserState::ReadingBodyUntilConnectionClose);
        assert_eq!(recorder.completions(), 0);

        parser.connection_closed(&mut recorder).unwrap();
        assert_eq!(parser.state(), ParserState::Complete);
        assert_eq!(recorder.body(), b"some raw bytes");
        assert_eq!(recorder.completions(), 1);
    }

    #[test]
    fn no_length_without_trailing_body_has_no_body() {
        let input = crlf("HTTP/1.1 200 OK\nServer: test\n\nleftover");
        let (parser, recorder, consumed) = parse_whole(&input, false);
        assert_eq!(parser.state(), ParserState::Complete);
        assert_eq!(input.len() - consumed, "leftover".len());
        assert!(recorder.body().is_empty());
    }

    #[test]
    fn fragmentation_does_not_change_callbacks() {
        let mut chunked = crlf("POST /upload HTTP/1.1\nHost: a\nTransfer-Encoding: chunked\n\n");
        chunked.extend_from_slice(b"4\r\nWiki\r\n5;ext=1\r\npedia\r\nE\r\n in\r\n\r\nchunks.\r\n0\r\nExpires: never\r\n\r\n");
        let length = crlf("HTTP/1.1 200 OK\nContent-Length: 11\nX-Empty: \n\nhello world");
        let until_close = crlf("HTTP/1.1 200 OK\nX-Tab: a\tb\n\nstreamed until the end");

        for (input, trailing) in [(&chunked, false), (&length, false), (&until_close, true)] {
            let (mut whole_parser, mut whole, _) = parse_whole(input, trailing);
            let (mut split_parser, mut split) = parse_byte_by_byte(input, trailing);

            if trailing {
                whole_parser.connection_closed(&mut whole).unwrap();
                split_parser.connection_closed(&mut split).unwrap();
            }

            assert_eq!(whole_parser.state(), ParserState::Complete);
            assert_eq!(split_parser.state(), whole_parser.state());
            assert_eq!(split.normalized(), whole.normalized());
            assert_eq!(split.completions(), 1);
        }
    }

    #[test]
    fn every_split_point_yields_the_same_result() {
        let mut input = crlf("PUT /x HTTP/1.1\nTransfer-Encoding: chunked\n\n");
        input.extend_from_slice(b"3\r\nabc\r\n2\r\nde\r\n0\r\n\r\n");
        let (_, reference, _) = parse_whole(&input, false);

        for split in 0..=input.len() {
            let mut parser = MessageParser::default();
            parser.initialize(false);
            let mut recorder = Recorder::default();
            parser.insert_all(&input[..split], &mut recorder).unwrap();
            parser.insert_all(&input[split..], &mut recorder).unwrap();
            assert_eq!(parser.state(), ParserState::Complete, "split at {split}");
            assert_eq!(recorder.normalized(), reference.normalized(), "split at {split}");
        }
    }

    #[test]
    fn empty_first_line_is_an_error() {
        let mut parser = MessageParser::default();
        parser.initialize(false);
        let mut recorder = Recorder::default();
        assert!(matches!(parser.insert_data(b"\r\nGET / HTTP/1.1\r\n", &mut recorder), Err(ParseError::InvalidFirstLine { .. })));
        assert_eq!(parser.state(), ParserState::Error);

        // sticky
        assert!(matches!(parser.insert_data(b"Host: a\r\n", &mut recorder), Err(ParseError::Failed)));
        assert_eq!(parser.state(), ParserState::Error);
    }

    #[test]
    fn header_without_separator_is_an_error() {
        let input = crlf("GET / HTTP/1.1\nHost:a\n\n");
        let mut parser = MessageParser::default();
        parser.initialize(false);
        assert!(matches!(parser.insert_all(&input, &mut Recorder::default()), Err(ParseError::InvalidHeader { .. })));
        assert_eq!(parser.state(), ParserState::Error);
    }

    #[test]
    fn unsafe_bytes_are_rejected() {
        let mut input = crlf("GET / HTTP/1.1\nX-Bin: ");
        input.extend_from_slice(&[0x01, 0xff]);
        input.extend_from_slice(b"\r\n\r\n");
        let mut parser = MessageParser::default();
        parser.initialize(false);
        assert!(parser.insert_all(&input, &mut Recorder::default()).is_err());
        assert_eq!(parser.state(), ParserState::Error);
    }

    #[test]
    fn too_many_headers() {
        let mut text = String::from("GET / HTTP/1.1\n");
        for i in 0..4 {
            text.push_str(&format!("X-{i}: v\n"));
        }
        text.push('\n');

        let mut parser = MessageParser::new(ParserConfig::default().with_max_header_count(3));
        parser.initialize(false);
        assert!(matches!(parser.insert_all(&crlf(&text), &mut Recorder::default()), Err(ParseError::TooManyHeaders { max_num: 3 })));
    }

    #[test]
    fn line_and_section_limits_are_independent() {
        let long_value = "v".repeat(100);
        let text = format!("GET / HTTP/1.1\nX-Long: {long_value}\n\n");

        let mut parser = MessageParser::new(ParserConfig::default().with_max_line_bytes(64));
        parser.initialize(false);
        assert!(matches!(parser.insert_all(&crlf(&text), &mut Recorder::default()), Err(ParseError::TooLongLine { .. })));

        let mut text = String::from("GET / HTTP/1.1\n");
        for i in 0..10 {
            text.push_str(&format!("X-{i}: {}\n", "v".repeat(20)));
        }
        text.push('\n');
        let mut parser = MessageParser::new(ParserConfig::default().with_max_line_bytes(64).with_max_header_bytes(128));
        parser.initialize(false);
        assert!(matches!(parser.insert_all(&crlf(&text), &mut Recorder::default()), Err(ParseError::TooLargeHeader { .. })));
    }

    #[test]
    fn unsupported_transfer_encoding() {
        let input = crlf("HTTP/1.1 200 OK\nTransfer-Encoding: gzip\n\n");
        let mut parser = MessageParser::default();
        parser.initialize(false);
        assert!(matches!(parser.insert_all(&input, &mut Recorder::default()), Err(ParseError::UnsupportedTransferEncoding { .. })));
        assert_eq!(parser.state(), ParserState::Error);
    }

    #[test]
    fn handler_failure_is_sticky() {
        let input = crlf("GET / HTTP/1.1\nX-Reject: yes\n\n");
        let mut parser = MessageParser::default();
        parser.initialize(false);
        let mut recorder = Recorder { fail_on_header: Some("X-Reject"), ..Recorder::default() };
        assert!(parser.insert_all(&input, &mut recorder).is_err());
        assert_eq!(parser.state(), ParserState::Error);
        assert_eq!(recorder.completions(), 0);

        assert!(parser.connection_closed(&mut recorder).is_err());
        assert_eq!(parser.state(), ParserState::Error);
    }

    #[test]
    fn unexpected_close() {
        let input = crlf("HTTP/1.1 200 OK\nContent-Length: 10\n\nabc");
        let (mut parser, mut recorder, _) = parse_whole(&input, false);
        assert_eq!(parser.state(), ParserState::ReadingBodyContentLength);
        assert!(matches!(parser.connection_closed(&mut recorder), Err(ParseError::UnexpectedClose { .. })));
        assert_eq!(parser.state(), ParserState::Error);
    }

    #[test]
    fn zero_length_input_changes_nothing() {
        let mut parser = MessageParser::default();
        parser.initialize(false);
        let mut recorder = Recorder::default();
        assert_eq!(parser.insert_data(&[], &mut recorder).unwrap(), 0);
        assert_eq!(parser.state(), ParserState::ReadingFirstLine);
        assert!(recorder.events.is_empty());
    }

    #[test]
    fn head_response_has_no_body() {
        let input = crlf("HTTP/1.1 200 OK\nContent-Length: 1234\n\n");
        let mut parser = MessageParser::default();
        parser.initialize(false);
        parser.set_expect_body(false);
        let mut recorder = Recorder::default();
        parser.insert_all(&input, &mut recorder).unwrap();
        assert_eq!(parser.state(), ParserState::Complete);
    }

    #[test]
    fn conflicting_content_length() {
        let input = crlf("HTTP/1.1 200 OK\nContent-Length: 3\nContent-Length: 4\n\n");
        let mut parser = MessageParser::default();
        parser.initialize(false);
        assert!(matches!(parser.insert_all(&input, &mut Recorder::default()), Err(ParseError::InvalidContentLength { .. })));
    }

    #[test]
    fn initialize_resets_for_the_next_message() {
        let first = crlf("HTTP/1.1 200 OK\nContent-Length: 2\n\nok");
        let (mut parser, _, _) = parse_whole(&first, false);
        assert_eq!(parser.state(), ParserState::Complete);

        parser.initialize(false);
        let mut recorder = Recorder::default();
        parser.insert_all(&crlf("HTTP/1.1 200 OK\nTransfer-Encoding: chunked\n\n1\r\nx\r\n0\r\n\r\n"), &mut recorder).unwrap();
        assert_eq!(parser.state(), ParserState::Complete);
        assert_eq!(recorder.body(), b"x");
    }
}
