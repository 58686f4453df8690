//! HTTP codec module for parsing and writing HTTP/1.1 messages
//!
//! Nothing in this module performs I/O. Bytes go in through
//! [`MessageParser::insert_data`] in whatever fragments the transport delivered them, and
//! wire bytes come out of [`MessageWriter::data`] one piece at a time.
//!
//! # Architecture
//!
//! - Parsing:
//!   - [`MessageParser`]: first line, headers and body mode selection
//!   - [`ChunkedDecoder`]: chunked transfer encoding, used by the parser
//!   - [`ParseHandler`]: receives the parse events
//!
//! - Writing:
//!   - [`MessageWriter`]: header section and the three body framings
//!   - [`MessageSource`]: supplies the lines and the body on demand
//!
//! # Example
//!
//! ```
//! use micro_wire_http::codec::{MessageParser, ParseHandler, ParserState};
//! use micro_wire_http::protocol::ParseError;
//!
//! #[derive(Default)]
//! struct Print(Vec<u8>);
//!
//! impl ParseHandler for Print {
//!     fn on_first_line(&mut self, _line: &str) -> Result<(), ParseError> { Ok(()) }
//!     fn on_header(&mut self, _name: &str, _value: &str) -> Result<(), ParseError> { Ok(()) }
//!     fn on_body_part(&mut self, data: &[u8]) -> Result<(), ParseError> {
//!         self.0.extend_from_slice(data);
//!         Ok(())
//!     }
//!     fn on_complete(&mut self) -> Result<(), ParseError> { Ok(()) }
//! }
//!
//! let mut parser = MessageParser::default();
//! parser.initialize(false);
//! let mut handler = Print::default();
//! let input = b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\n\r\nok";
//! parser.insert_all(input, &mut handler).unwrap();
//! assert_eq!(parser.state(), ParserState::Complete);
//! assert_eq!(handler.0, b"ok");
//! ```

pub mod chunked_decoder;
pub(crate) mod line_buffer;
mod message_parser;
mod message_writer;

pub use chunked_decoder::{ChunkedDecoder, ChunkedState};
pub use message_parser::{
    DEFAULT_MAX_HEADER_BYTES, DEFAULT_MAX_HEADER_COUNT, DEFAULT_MAX_LINE_BYTES, MessageParser, ParseHandler, ParserConfig,
    ParserState,
};
pub use message_writer::{DEFAULT_MAX_CHUNK_SIZE, MessageSource, MessageWriter, WriterState};
