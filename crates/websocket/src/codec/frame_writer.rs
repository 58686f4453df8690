//! Pull based WebSocket frame writer.

use bytes::{Bytes, BytesMut};
use tracing::trace;

use crate::codec::mask::apply_mask;
use crate::frame::{Frame, OpCode};
use FrameWriterState::*;

/// Largest possible frame header: 2 fixed bytes, 8 length bytes and a 4 byte mask key.
pub const MAX_HEADER_SIZE: usize = 14;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameWriterState {
    Idle,
    WritingHeader,
    WritingPayload,
    Complete,
}

/// Encodes a frame header into `buf`, returning its length.
pub fn encode_header(fin: bool, opcode: OpCode, payload_len: u64, mask_key: Option<[u8; 4]>, buf: &mut [u8; MAX_HEADER_SIZE]) -> usize {
    buf[0] = opcode.as_u8() | if fin { 0x80 } else { 0 };
    let mask_bit = if mask_key.is_some() { 0x80 } else { 0 };

    let mut len = match payload_len {
        0..=125 => {
            // fits in 7 bits
            buf[1] = mask_bit | payload_len as u8;
            2
        }
        126..=0xFFFF => {
            buf[1] = mask_bit | 126;
            buf[2..4].copy_from_slice(&(payload_len as u16).to_be_bytes());
            4
        }
        _ => {
            buf[1] = mask_bit | 127;
            buf[2..10].copy_from_slice(&payload_len.to_be_bytes());
            10
        }
    };

    if let Some(key) = mask_key {
        buf[len..len + 4].copy_from_slice(&key);
        len += 4;
    }
    len
}

/// Produces the wire bytes of one frame in two pieces: the header, then the payload.
#[derive(Debug)]
pub struct FrameWriter {
    state: FrameWriterState,
    header: [u8; MAX_HEADER_SIZE],
    header_len: usize,
    payload: Bytes,
}

impl Default for FrameWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameWriter {
    pub fn new() -> Self {
        Self { state: Idle, header: [0; MAX_HEADER_SIZE], header_len: 0, payload: Bytes::new() }
    }

    #[inline]
    pub fn state(&self) -> FrameWriterState {
        self.state
    }

    /// Starts writing `frame`. With a `mask_key` the payload is copied and masked, the frame
    /// itself is left untouched.
    pub fn start_frame(&mut self, frame: &Frame, mask_key: Option<[u8; 4]>) {
        self.header_len = encode_header(frame.fin, frame.opcode, frame.payload.len() as u64, mask_key, &mut self.header);
        self.payload = match mask_key {
            Some(key) => {
                let mut masked = BytesMut::from(&frame.payload[..]);
                apply_mask(&mut masked, key);
                masked.freeze()
            }
            None => frame.payload.clone(),
        };
        trace!(opcode = ?frame.opcode, len = self.payload.len(), masked = mask_key.is_some(), "start writing frame");
        self.state = WritingHeader;
    }

    /// The current piece, `None` when no frame is in flight.
    pub fn data(&self) -> Option<&[u8]> {
        match self.state {
            WritingHeader => Some(&self.header[..self.header_len]),
            WritingPayload => Some(&self.payload),
            Idle | Complete => None,
        }
    }

    /// Moves to the next piece once the current one was fully written.
    pub fn next(&mut self) {
        self.state = match self.state {
            WritingHeader if !self.payload.is_empty() => WritingPayload,
            WritingHeader | WritingPayload => {
                self.payload = Bytes::new();
                Complete
            }
            other => other,
        };
    }

    #[inline]
    pub fn is_busy(&self) -> bool {
        matches!(self.state, WritingHeader | WritingPayload)
    }
}
