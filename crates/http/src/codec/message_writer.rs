//! Pull based HTTP/1.1 message writer.
//!
//! [`MessageWriter`] never touches the transport. It asks a [`MessageSource`] for the first
//! line, the headers and the body, and exposes the wire bytes one piece at a time through
//! [`data`](MessageWriter::data). The caller writes the piece (possibly over several partial
//! writes) and calls [`next`](MessageWriter::next) to move on.
//!
//! Three body framings are produced:
//!
//! - binary: the body is written verbatim, its size is announced by `Content-Length`
//! - chunked with a known total: each chunk is announced, then filled exactly
//! - chunked with an unknown total: body bytes are pulled first, then their size is announced

use std::fmt::Write as _;
use std::io;

use bytes::BytesMut;
use tracing::{debug, trace, warn};

use crate::protocol::{BodyPlan, SendError};
use crate::utils::CRLF;
use WriterState::*;

/// Default upper bound of one body piece and of one chunk.
pub const DEFAULT_MAX_CHUNK_SIZE: usize = 16 * 1024;

const LAST_CHUNK: &[u8] = b"0\r\n";

/// Provider of everything a [`MessageWriter`] puts on the wire.
pub trait MessageSource {
    /// Number of header lines including the first line.
    fn header_count(&self) -> usize;

    /// Appends header line `index` without its CRLF to `dst`. Index 0 is the first line.
    fn header(&mut self, index: usize, dst: &mut BytesMut) -> Result<(), SendError>;

    /// Called once after the header section, decides the body framing.
    fn start_body_streaming(&mut self) -> Result<BodyPlan, SendError>;

    /// Fills `buf` with body bytes and returns how many were written, `0` once the body is
    /// exhausted.
    fn body_part(&mut self, buf: &mut [u8]) -> Result<usize, SendError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriterState {
    WritingHeaders,
    WritingHeadersEnd,
    WritingBodyBinary,
    WritingBodyChunkedSize,
    WritingBodyChunkedData,
    WritingBodyChunkedDataEnd,
    WritingBodyUnknownSizeChunkSize,
    WritingBodyUnknownSizeChunkData,
    WritingBodyUnknownSizeChunkDataEnd,
    WritingLastChunk,
    WritingFinalCrlf,
    Complete,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Piece {
    Scratch,
    Body,
    Crlf,
    LastChunk,
    Nothing,
}

/// Produces the wire representation of one message at a time.
#[derive(Debug)]
pub struct MessageWriter {
    state: WriterState,
    max_chunk_size: usize,
    header_index: usize,
    total: Option<u64>,
    remaining: u64,
    scratch: BytesMut,
    body: Vec<u8>,
    body_len: usize,
    piece: Piece,
}

impl Default for MessageWriter {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CHUNK_SIZE)
    }
}

impl MessageWriter {
    pub fn new(max_chunk_size: usize) -> Self {
        Self {
            state: Complete,
            max_chunk_size: max_chunk_size.max(1),
            header_index: 0,
            total: None,
            remaining: 0,
            scratch: BytesMut::with_capacity(256),
            body: Vec::new(),
            body_len: 0,
            piece: Piece::Nothing,
        }
    }

    /// Changes the chunk size and resets the writer.
    pub fn initialize(&mut self, max_chunk_size: usize) {
        self.max_chunk_size = max_chunk_size.max(1);
        self.reset();
    }

    #[inline]
    pub fn state(&self) -> WriterState {
        self.state
    }

    #[inline]
    pub fn max_chunk_size(&self) -> usize {
        self.max_chunk_size
    }

    #[inline]
    pub fn is_complete(&self) -> bool {
        self.state == Complete
    }

    /// Declared body size, known once the header section was written.
    pub fn body_total(&self) -> Option<u64> {
        self.total
    }

    /// The current output piece, `None` once the message is complete or the writer failed.
    pub fn data(&self) -> Option<&[u8]> {
        if matches!(self.state, Complete | Error) {
            return None;
        }
        match self.piece {
            Piece::Scratch => Some(self.scratch.as_ref()),
            Piece::Body => Some(&self.body[..self.body_len]),
            Piece::Crlf => Some(CRLF),
            Piece::LastChunk => Some(LAST_CHUNK),
            Piece::Nothing => None,
        }
    }

    /// Starts a new message and prepares its first line as the first piece.
    pub fn start_streaming(&mut self, src: &mut dyn MessageSource) -> Result<(), SendError> {
        self.reset();
        self.state = WritingHeaders;
        let result = if src.header_count() == 0 {
            Err(SendError::invalid_header("message has no first line"))
        } else {
            self.write_header_line(src)
        };
        result.map_err(|e| self.fail(e))
    }

    /// Moves to the next piece once the current one was fully written.
    pub fn next(&mut self, src: &mut dyn MessageSource) -> Result<(), SendError> {
        match self.advance(src) {
            Ok(()) => Ok(()),
            Err(e) => Err(self.fail(e)),
        }
    }

    fn reset(&mut self) {
        self.state = Complete;
        self.header_index = 0;
        self.total = None;
        self.remaining = 0;
        self.scratch.clear();
        self.body_len = 0;
        self.piece = Piece::Nothing;
    }

    fn fail(&mut self, e: SendError) -> SendError {
        if self.state != Error {
            warn!(state = ?self.state, cause = %e, "http writer failed");
            self.state = Error;
        }
        e
    }

    fn advance(&mut self, src: &mut dyn MessageSource) -> Result<(), SendError> {
        match self.state {
            WritingHeaders => {
                self.header_index += 1;
                if self.header_index < src.header_count() {
                    self.write_header_line(src)
                } else {
                    self.state = WritingHeadersEnd;
                    self.piece = Piece::Crlf;
                    Ok(())
                }
            }

            WritingHeadersEnd => {
                let plan = src.start_body_streaming()?;
                debug!(chunked = plan.chunked, total = ?plan.total, "start writing body");
                self.total = plan.total;
                match plan {
                    BodyPlan { chunked: false, total: None } => Err(SendError::UnknownSizeNotChunked),
                    BodyPlan { chunked: false, total: Some(0) } => self.finish(),
                    BodyPlan { chunked: false, total: Some(total) } => {
                        self.remaining = total;
                        self.state = WritingBodyBinary;
                        self.fill_binary(src)
                    }
                    BodyPlan { chunked: true, total: Some(total) } => {
                        self.remaining = total;
                        self.announce_known_chunk()
                    }
                    BodyPlan { chunked: true, total: None } => self.pull_unknown_chunk(src),
                }
            }

            WritingBodyBinary => {
                if self.remaining == 0 {
                    self.finish()
                } else {
                    self.fill_binary(src)
                }
            }

            WritingBodyChunkedSize => {
                self.fill_known_chunk(src)?;
                self.state = WritingBodyChunkedData;
                self.piece = Piece::Body;
                Ok(())
            }

            WritingBodyChunkedData => {
                self.state = WritingBodyChunkedDataEnd;
                self.piece = Piece::Crlf;
                Ok(())
            }

            WritingBodyChunkedDataEnd => self.announce_known_chunk(),

            WritingBodyUnknownSizeChunkSize => {
                self.state = WritingBodyUnknownSizeChunkData;
                self.piece = Piece::Body;
                Ok(())
            }

            WritingBodyUnknownSizeChunkData => {
                self.state = WritingBodyUnknownSizeChunkDataEnd;
                self.piece = Piece::Crlf;
                Ok(())
            }

            WritingBodyUnknownSizeChunkDataEnd => self.pull_unknown_chunk(src),

            WritingLastChunk => {
                self.state = WritingFinalCrlf;
                self.piece = Piece::Crlf;
                Ok(())
            }

            WritingFinalCrlf => self.finish(),

            Complete => Ok(()),

            Error => Err(SendError::Failed),
        }
    }

    fn write_header_line(&mut self, src: &mut dyn MessageSource) -> Result<(), SendError> {
        self.scratch.clear();
        src.header(self.header_index, &mut self.scratch)?;
        trace!(index = self.header_index, line = %String::from_utf8_lossy(&self.scratch), "writing header line");
        self.scratch.extend_from_slice(CRLF);
        self.piece = Piece::Scratch;
        Ok(())
    }

    fn fill_binary(&mut self, src: &mut dyn MessageSource) -> Result<(), SendError> {
        let want = usize::try_from(self.remaining).unwrap_or(usize::MAX).min(self.max_chunk_size);
        let read = self.read_body(src, 0, want)?;
        if read == 0 {
            return Err(SendError::BodyUnderflow { remaining: self.remaining });
        }
        self.body_len = read;
        self.remaining -= read as u64;
        self.piece = Piece::Body;
        Ok(())
    }

    fn announce_known_chunk(&mut self) -> Result<(), SendError> {
        if self.remaining == 0 {
            self.state = WritingLastChunk;
            self.piece = Piece::LastChunk;
            return Ok(());
        }

        let size = usize::try_from(self.remaining).unwrap_or(usize::MAX).min(self.max_chunk_size);
        self.body_len = size;
        self.write_chunk_size(size)?;
        self.state = WritingBodyChunkedSize;
        Ok(())
    }

    /// Fills the announced chunk completely, a source may deliver it in several calls.
    fn fill_known_chunk(&mut self, src: &mut dyn MessageSource) -> Result<(), SendError> {
        let size = self.body_len;
        let mut filled = 0;
        while filled < size {
            let read = self.read_body(src, filled, size)?;
            if read == 0 {
                return Err(SendError::BodyUnderflow { remaining: self.remaining - filled as u64 });
            }
            filled += read;
        }
        self.remaining -= size as u64;
        Ok(())
    }

    fn pull_unknown_chunk(&mut self, src: &mut dyn MessageSource) -> Result<(), SendError> {
        let read = self.read_body(src, 0, self.max_chunk_size)?;
        if read == 0 {
            self.state = WritingLastChunk;
            self.piece = Piece::LastChunk;
            return Ok(());
        }

        self.body_len = read;
        self.write_chunk_size(read)?;
        self.state = WritingBodyUnknownSizeChunkSize;
        Ok(())
    }

    /// Reads body bytes into `self.body[from..to]`.
    fn read_body(&mut self, src: &mut dyn MessageSource, from: usize, to: usize) -> Result<usize, SendError> {
        if self.body.len() < to {
            self.body.resize(to, 0);
        }
        let buf = &mut self.body[from..to];
        let capacity = buf.len();
        let read = src.body_part(buf)?;
        if read > capacity {
            return Err(SendError::BodyOverrun { reported: read, capacity });
        }
        trace!(read, "pulled body bytes");
        Ok(read)
    }

    fn write_chunk_size(&mut self, size: usize) -> Result<(), SendError> {
        self.scratch.clear();
        write!(self.scratch, "{size:X}\r\n").map_err(|e| SendError::io(io::Error::other(e)))?;
        self.piece = Piece::Scratch;
        Ok(())
    }

    fn finish(&mut self) -> Result<(), SendError> {
        trace!("message written");
        self.state = Complete;
        self.piece = Piece::Nothing;
        Ok(())
    }
}
