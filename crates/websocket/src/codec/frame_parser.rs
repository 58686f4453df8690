//! Incremental WebSocket frame parser.
//!
//! Bytes are fed through [`FrameParser::insert_data`] in fragments of any size. The header is
//! validated as soon as its fixed two bytes are known, the declared length is checked against
//! the limit before any payload is buffered, and the payload is unmasked in place once it is
//! complete.

use bytes::BytesMut;
use tracing::{trace, warn};

use crate::codec::mask::apply_mask;
use crate::error::FrameError;
use crate::frame::{Frame, MAX_CONTROL_PAYLOAD, OpCode};
use FrameParserState::*;

/// Default limit of a single frame payload.
pub const DEFAULT_MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameParserState {
    /// Waiting for the two fixed header bytes
    ReadingHeader,
    /// Waiting for the 16 bit extended payload length
    ReadingExtendedLength16,
    /// Waiting for the 64 bit extended payload length
    ReadingExtendedLength64,
    ReadingMaskKey,
    ReadingPayload,
    /// A frame is ready, see [`FrameParser::take_frame`]
    Complete,
    Error,
}

/// Which masking the peer must apply to its frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MaskRequirement {
    #[default]
    Any,
    /// Frames must be masked, as frames sent by a client.
    Masked,
    /// Frames must not be masked, as frames sent by a server.
    Unmasked,
}

#[derive(Debug)]
pub struct FrameParser {
    state: FrameParserState,
    max_frame_size: u64,
    mask_requirement: MaskRequirement,
    header: [u8; 8],
    header_len: usize,
    fin: bool,
    opcode: OpCode,
    masked: bool,
    mask_key: [u8; 4],
    payload_len: u64,
    payload: BytesMut,
    frame: Option<Frame>,
}

impl Default for FrameParser {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FRAME_SIZE)
    }
}

impl FrameParser {
    pub fn new(max_frame_size: usize) -> Self {
        Self {
            state: ReadingHeader,
            max_frame_size: max_frame_size as u64,
            mask_requirement: MaskRequirement::Any,
            header: [0; 8],
            header_len: 0,
            fin: false,
            opcode: OpCode::Continuation,
            masked: false,
            mask_key: [0; 4],
            payload_len: 0,
            payload: BytesMut::new(),
            frame: None,
        }
    }

    #[must_use]
    pub fn with_mask_requirement(mut self, mask_requirement: MaskRequirement) -> Self {
        self.mask_requirement = mask_requirement;
        self
    }

    #[inline]
    pub fn state(&self) -> FrameParserState {
        self.state
    }

    #[inline]
    pub fn max_frame_size(&self) -> u64 {
        self.max_frame_size
    }

    /// Feeds bytes and returns how many were consumed.
    ///
    /// Consumption stops at the end of a frame; the remaining bytes belong to the next frame
    /// and must be fed again after [`take_frame`](Self::take_frame).
    pub fn insert_data(&mut self, data: &[u8]) -> Result<usize, FrameError> {
        match self.do_insert(data) {
            Ok(consumed) => Ok(consumed),
            Err(e) => {
                if self.state != Error {
                    warn!(state = ?self.state, cause = %e, "frame parser failed");
                    self.state = Error;
                }
                Err(e)
            }
        }
    }

    /// Hands out the completed frame and rearms the parser for the next one.
    pub fn take_frame(&mut self) -> Option<Frame> {
        if self.state != Complete {
            return None;
        }
        self.state = ReadingHeader;
        self.header_len = 0;
        self.frame.take()
    }

    /// Forgets any partial frame and leaves the error state.
    pub fn reset(&mut self) {
        self.state = ReadingHeader;
        self.header_len = 0;
        self.payload.clear();
        self.frame = None;
    }

    fn do_insert(&mut self, data: &[u8]) -> Result<usize, FrameError> {
        let mut consumed = 0;

        loop {
            match self.state {
                ReadingHeader => {
                    if !self.fill_header(data, &mut consumed, 2) {
                        return Ok(consumed);
                    }
                    self.decode_header()?;
                }

                ReadingExtendedLength16 => {
                    if !self.fill_header(data, &mut consumed, 2) {
                        return Ok(consumed);
                    }
                    let length = u16::from_be_bytes([self.header[0], self.header[1]]);
                    self.on_length(u64::from(length))?;
                }

                ReadingExtendedLength64 => {
                    if !self.fill_header(data, &mut consumed, 8) {
                        return Ok(consumed);
                    }
                    let length = u64::from_be_bytes(self.header);
                    if length & (1 << 63) != 0 {
                        return Err(FrameError::LengthMsbSet);
                    }
                    self.on_length(length)?;
                }

                ReadingMaskKey => {
                    if !self.fill_header(data, &mut consumed, 4) {
                        return Ok(consumed);
                    }
                    self.mask_key.copy_from_slice(&self.header[..4]);
                    self.begin_payload();
                }

                ReadingPayload => {
                    let missing = usize::try_from(self.payload_len - self.payload.len() as u64).unwrap_or(usize::MAX);
                    let take = missing.min(data.len() - consumed);
                    self.payload.extend_from_slice(&data[consumed..consumed + take]);
                    consumed += take;
                    if self.payload.len() as u64 == self.payload_len {
                        self.complete();
                    } else {
                        return Ok(consumed);
                    }
                }

                Complete => return Ok(consumed),

                Error => return Err(FrameError::Failed),
            }
        }
    }

    /// Collects `need` header bytes across calls, returns true once they are all present.
    fn fill_header(&mut self, data: &[u8], consumed: &mut usize, need: usize) -> bool {
        let take = (need - self.header_len).min(data.len() - *consumed);
        self.header[self.header_len..self.header_len + take].copy_from_slice(&data[*consumed..*consumed + take]);
        self.header_len += take;
        *consumed += take;
        if self.header_len < need {
            return false;
        }
        self.header_len = 0;
        true
    }

    fn decode_header(&mut self) -> Result<(), FrameError> {
        let (b0, b1) = (self.header[0], self.header[1]);

        let rsv = b0 & 0x70;
        if rsv != 0 {
            return Err(FrameError::ReservedBits { bits: rsv });
        }
        self.fin = b0 & 0x80 != 0;
        self.opcode = OpCode::from_u8(b0 & 0x0F).ok_or(FrameError::UnknownOpcode(b0 & 0x0F))?;

        self.masked = b1 & 0x80 != 0;
        match (self.mask_requirement, self.masked) {
            (MaskRequirement::Masked, false) => return Err(FrameError::MissingMask),
            (MaskRequirement::Unmasked, true) => return Err(FrameError::UnexpectedMask),
            _ => {}
        }

        let length = b1 & 0x7F;
        if self.opcode.is_control() {
            if !self.fin {
                return Err(FrameError::FragmentedControl);
            }
            if usize::from(length) > MAX_CONTROL_PAYLOAD {
                return Err(FrameError::ControlTooLarge(u64::from(length)));
            }
        }

        match length {
            126 => self.state = ReadingExtendedLength16,
            127 => self.state = ReadingExtendedLength64,
            _ => self.on_length(u64::from(length))?,
        }
        Ok(())
    }

    fn on_length(&mut self, length: u64) -> Result<(), FrameError> {
        if length > self.max_frame_size {
            return Err(FrameError::TooLarge { size: length, max_size: self.max_frame_size });
        }
        self.payload_len = length;
        trace!(opcode = ?self.opcode, fin = self.fin, masked = self.masked, length, "decoded frame header");

        if self.masked {
            self.state = ReadingMaskKey;
        } else {
            self.begin_payload();
        }
        Ok(())
    }

    fn begin_payload(&mut self) {
        self.payload.clear();
        // bounded by max_frame_size above
        self.payload.reserve(usize::try_from(self.payload_len).unwrap_or(0));
        if self.payload_len == 0 {
            self.complete();
        } else {
            self.state = ReadingPayload;
        }
    }

    fn complete(&mut self) {
        let mut payload = self.payload.split();
        if self.masked {
            apply_mask(&mut payload, self.mask_key);
        }
        self.frame = Some(Frame { fin: self.fin, opcode: self.opcode, payload: payload.freeze() });
        self.state = Complete;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_one(parser: &mut FrameParser, data: &[u8]) -> (usize, Option<Frame>) {
        let consumed = parser.insert_data(data).unwrap();
        (consumed, parser.take_frame())
    }

    #[test]
    fn test_parse_small_unmasked() {
        let mut parser = FrameParser::default();
        let (consumed, frame) = parse_one(&mut parser, &[0x81, 0x05, b'H', b'e', b'l', b'l', b'o']);
        assert_eq!(consumed, 7);
        assert_eq!(frame.unwrap(), Frame::text("Hello"));
        assert_eq!(parser.state(), ReadingHeader);
    }

    #[test]
    fn test_parse_small_masked() {
        let mut parser = FrameParser::default().with_mask_requirement(MaskRequirement::Masked);
        let data = [0x81, 0x85, 0x37, 0xfa, 0x21, 0x3d, 0x7f, 0x9f, 0x4d, 0x51, 0x58];
        let (_, frame) = parse_one(&mut parser, &data);
        assert_eq!(frame.unwrap().as_text().unwrap(), "Hello");
    }

    #[test]
    fn test_parse_medium_and_large_lengths() {
        let mut parser = FrameParser::default();
        let mut data = vec![0x82, 126, 0x01, 0x00];
        data.extend(vec![7u8; 256]);
        let (consumed, frame) = parse_one(&mut parser, &data);
        assert_eq!(consumed, data.len());
        assert_eq!(frame.unwrap().payload.len(), 256);

        let mut data = vec![0x82, 127];
        data.extend_from_slice(&70_000u64.to_be_bytes());
        data.extend(vec![1u8; 70_000]);
        let (_, frame) = parse_one(&mut parser, &data);
        assert_eq!(frame.unwrap().payload.len(), 70_000);
    }

    #[test]
    fn test_byte_by_byte() {
        let data = [0x81, 0x85, 0x37, 0xfa, 0x21, 0x3d, 0x7f, 0x9f, 0x4d, 0x51, 0x58];
        let mut parser = FrameParser::default();
        for byte in &data[..data.len() - 1] {
            assert_eq!(parser.insert_data(std::slice::from_ref(byte)).unwrap(), 1);
            assert!(parser.take_frame().is_none());
        }
        assert_eq!(parser.insert_data(&data[data.len() - 1..]).unwrap(), 1);
        assert_eq!(parser.take_frame().unwrap().as_text().unwrap(), "Hello");
    }

    #[test]
    fn test_stops_at_frame_end() {
        let data = [0x89, 0x00, 0x8A, 0x01, b'x'];
        let mut parser = FrameParser::default();

        let consumed = parser.insert_data(&data).unwrap();
        assert_eq!(consumed, 2);
        assert_eq!(parser.state(), Complete);
        assert_eq!(parser.insert_data(&data[consumed..]).unwrap(), 0);
        assert_eq!(parser.take_frame().unwrap(), Frame::ping(""));

        assert_eq!(parser.insert_data(&data[consumed..]).unwrap(), 3);
        assert_eq!(parser.take_frame().unwrap(), Frame::pong("x"));
    }

    #[test]
    fn test_reserved_bits_are_rejected() {
        let mut parser = FrameParser::default();
        assert!(matches!(parser.insert_data(&[0xC1, 0x00]), Err(FrameError::ReservedBits { bits: 0x40 })));
        assert_eq!(parser.state(), Error);
        assert!(matches!(parser.insert_data(&[0x81, 0x00]), Err(FrameError::Failed)));
    }

    #[test]
    fn test_unknown_opcode() {
        let mut parser = FrameParser::default();
        assert!(matches!(parser.insert_data(&[0x83, 0x00]), Err(FrameError::UnknownOpcode(0x3))));
    }

    #[test]
    fn test_oversize_is_rejected_before_payload() {
        let mut parser = FrameParser::new(1024);
        // only the header is supplied, no payload byte
        let result = parser.insert_data(&[0x82, 126, 0x04, 0x01]);
        assert!(matches!(result, Err(FrameError::TooLarge { size: 1025, max_size: 1024 })));

        let mut parser = FrameParser::default();
        let mut header = vec![0x82, 127];
        header.extend_from_slice(&(1u64 << 63).to_be_bytes());
        assert!(matches!(parser.insert_data(&header), Err(FrameError::LengthMsbSet)));
    }

    #[test]
    fn test_control_frame_rules() {
        let mut parser = FrameParser::default();
        assert!(matches!(parser.insert_data(&[0x09, 0x00]), Err(FrameError::FragmentedControl)));

        let mut parser = FrameParser::default();
        assert!(matches!(parser.insert_data(&[0x89, 126, 0x00, 0x7E]), Err(FrameError::ControlTooLarge(126))));
    }

    #[test]
    fn test_mask_requirement() {
        let mut server_side = FrameParser::default().with_mask_requirement(MaskRequirement::Masked);
        assert!(matches!(server_side.insert_data(&[0x81, 0x00]), Err(FrameError::MissingMask)));

        let mut client_side = FrameParser::default().with_mask_requirement(MaskRequirement::Unmasked);
        assert!(matches!(client_side.insert_data(&[0x81, 0x80]), Err(FrameError::UnexpectedMask)));
    }

    #[test]
    fn test_fragmented_message() {
        let mut parser = FrameParser::default();
        let (_, first) = parse_one(&mut parser, &[0x01, 0x03, b'H', b'e', b'l']);
        let (_, second) = parse_one(&mut parser, &[0x80, 0x02, b'l', b'o']);
        let first = first.unwrap();
        let second = second.unwrap();
        assert!(!first.fin);
        assert_eq!(first.opcode, OpCode::Text);
        assert!(second.fin);
        assert_eq!(second.opcode, OpCode::Continuation);
    }

    #[test]
    fn test_reset_after_error() {
        let mut parser = FrameParser::default();
        assert!(parser.insert_data(&[0xF1, 0x00]).is_err());
        parser.reset();
        let (_, frame) = parse_one(&mut parser, &[0x82, 0x01, 0x2a]);
        assert_eq!(frame.unwrap(), Frame::binary(vec![0x2a]));
    }
}
