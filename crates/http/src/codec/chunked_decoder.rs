//! Decoder implementation for HTTP chunked transfer encoding.
//!
//! This module decodes bodies that use chunked transfer encoding as specified in
//! [RFC 7230 Section 4.1](https://tools.ietf.org/html/rfc7230#section-4.1).
//!
//! The chunked encoding allows the sender to transmit message data in a series of chunks,
//! indicating the size of each chunk before its data. Chunk data is forwarded to the
//! [`ParseHandler`] as it arrives, it is never buffered.

use tracing::trace;

use crate::codec::ParseHandler;
use crate::codec::line_buffer::LineBuffer;
use crate::protocol::ParseError;
use crate::protocol::header::is_header_safe;
use crate::utils::{CRLF, ensure};
use ChunkedState::*;

/// Sub-states of a chunked body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkedState {
    /// Read the chunk size line: hex digits, optional extensions, CRLF
    ReadChunkSize,
    /// Read exactly the announced number of bytes
    ReadChunkData,
    /// Read the CRLF closing a chunk's data
    ReadChunkCrlfAfterData,
    /// Read optional trailer fields up to the final empty line
    ReadTrailer,
    /// Final state after the last chunk and its trailer section
    End,
}

/// Incremental decoder for a chunked body.
#[derive(Debug)]
pub struct ChunkedDecoder {
    state: ChunkedState,
    remaining_size: u64,
    crlf_matched: usize,
    lines: LineBuffer,
}

impl ChunkedDecoder {
    /// Creates a new decoder, ready to read the size of the first chunk.
    ///
    /// `max_line` bounds chunk size lines and trailer lines.
    pub fn new(max_line: usize) -> Self {
        Self { state: ReadChunkSize, remaining_size: 0, crlf_matched: 0, lines: LineBuffer::new(max_line) }
    }

    pub fn reset(&mut self) {
        self.state = ReadChunkSize;
        self.remaining_size = 0;
        self.crlf_matched = 0;
        self.lines.clear();
    }

    #[inline]
    pub fn state(&self) -> ChunkedState {
        self.state
    }

    #[inline]
    pub fn is_finished(&self) -> bool {
        self.state == End
    }

    /// Decodes as much of `data` as the current chunk structure allows.
    ///
    /// Returns the number of bytes consumed. Data parts are delivered through
    /// [`ParseHandler::on_body_part`]; reaching [`ChunkedState::End`] is reported by
    /// [`is_finished`](Self::is_finished), bytes after the terminating empty line are left
    /// unconsumed.
    pub fn decode(&mut self, data: &[u8], handler: &mut dyn ParseHandler) -> Result<usize, ParseError> {
        let mut consumed = 0;

        loop {
            match self.state {
                ReadChunkSize => {
                    let (used, line) = self.lines.next_line(&data[consumed..])?;
                    consumed += used;
                    let Some(line) = line else {
                        return Ok(consumed);
                    };

                    self.remaining_size = parse_chunk_size(&line)?;
                    trace!(chunk_size = self.remaining_size, "read chunk size");
                    self.state = if self.remaining_size == 0 { ReadTrailer } else { ReadChunkData };
                }

                ReadChunkData => {
                    if consumed == data.len() {
                        return Ok(consumed);
                    }

                    // cap remaining bytes at the max capacity of usize
                    let remaining = usize::try_from(self.remaining_size).unwrap_or(usize::MAX);
                    let read_size = remaining.min(data.len() - consumed);
                    handler.on_body_part(&data[consumed..consumed + read_size])?;

                    consumed += read_size;
                    self.remaining_size -= read_size as u64;
                    if self.remaining_size == 0 {
                        self.crlf_matched = 0;
                        self.state = ReadChunkCrlfAfterData;
                    }
                }

                ReadChunkCrlfAfterData => {
                    while self.crlf_matched < CRLF.len() {
                        let Some(&byte) = data.get(consumed) else {
                            return Ok(consumed);
                        };
                        if byte != CRLF[self.crlf_matched] {
                            return Err(ParseError::invalid_chunk("chunk data is not followed by CRLF"));
                        }
                        consumed += 1;
                        self.crlf_matched += 1;
                    }
                    self.state = ReadChunkSize;
                }

                ReadTrailer => {
                    let (used, line) = self.lines.next_line(&data[consumed..])?;
                    consumed += used;
                    let Some(line) = line else {
                        return Ok(consumed);
                    };

                    if line.is_empty() {
                        trace!("finished reading chunked data");
                        self.state = End;
                        return Ok(consumed);
                    }

                    // trailer fields are validated but not surfaced
                    if !is_header_safe(&line) {
                        return Err(ParseError::invalid_chunk("trailer field contains unsafe bytes"));
                    }
                }

                End => return Ok(consumed),
            }
        }
    }
}

/// Parses a chunk size line, ignoring chunk extensions.
fn parse_chunk_size(line: &[u8]) -> Result<u64, ParseError> {
    let invalid = || ParseError::invalid_chunk(format!("invalid chunk size line {:?}", String::from_utf8_lossy(line)));

    let size_end = line.iter().position(|&b| b == b';').unwrap_or(line.len());
    let digits = line[..size_end].trim_ascii();
    ensure!(!digits.is_empty() && digits.len() <= 16, invalid());

    digits.iter().try_fold(0u64, |size, &b| {
        let digit = char::from(b).to_digit(16).ok_or_else(invalid)?;
        Ok((size << 4) | u64::from(digit))
    })
}
