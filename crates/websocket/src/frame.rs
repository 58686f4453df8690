//! WebSocket frames as seen by the application.

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::FrameError;

/// WebSocket opcode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum OpCode {
    Continuation = 0x0,
    Text = 0x1,
    Binary = 0x2,
    Close = 0x8,
    Ping = 0x9,
    Pong = 0xA,
}

impl OpCode {
    /// Parse opcode from the low nibble of the first header byte
    #[inline]
    pub fn from_u8(byte: u8) -> Option<Self> {
        match byte {
            0x0 => Some(OpCode::Continuation),
            0x1 => Some(OpCode::Text),
            0x2 => Some(OpCode::Binary),
            0x8 => Some(OpCode::Close),
            0x9 => Some(OpCode::Ping),
            0xA => Some(OpCode::Pong),
            _ => None,
        }
    }

    #[inline]
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Check if this is a control frame
    #[inline]
    pub fn is_control(self) -> bool {
        (self as u8) >= 0x8
    }

    /// Check if this is a data frame
    #[inline]
    pub fn is_data(self) -> bool {
        (self as u8) <= 0x2
    }
}

/// Status code carried by a close frame.
///
/// ```
/// use micro_wire_ws::{CloseCode, Frame};
///
/// let frame = Frame::close(CloseCode::GOING_AWAY, "restart");
/// assert_eq!(frame.close_code(), Some(1001));
/// assert_eq!(frame.close_reason(), Some("restart"));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CloseCode(pub u16);

impl CloseCode {
    pub const NORMAL: CloseCode = CloseCode(1000);
    pub const GOING_AWAY: CloseCode = CloseCode(1001);
    pub const PROTOCOL_ERROR: CloseCode = CloseCode(1002);
    pub const UNSUPPORTED_DATA: CloseCode = CloseCode(1003);
    /// Reported locally when a close frame has no status. Never sent.
    pub const NO_STATUS: CloseCode = CloseCode(1005);
    /// Reported locally when the connection dropped without a close frame. Never sent.
    pub const ABNORMAL: CloseCode = CloseCode(1006);
    pub const INVALID_PAYLOAD: CloseCode = CloseCode(1007);
    pub const POLICY_VIOLATION: CloseCode = CloseCode(1008);
    pub const MESSAGE_TOO_BIG: CloseCode = CloseCode(1009);
    pub const MANDATORY_EXTENSION: CloseCode = CloseCode(1010);
    pub const INTERNAL_ERROR: CloseCode = CloseCode(1011);
}

impl From<CloseCode> for u16 {
    fn from(code: CloseCode) -> Self {
        code.0
    }
}

impl From<u16> for CloseCode {
    fn from(code: u16) -> Self {
        CloseCode(code)
    }
}

/// A complete WebSocket frame, payload unmasked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Final fragment flag
    pub fin: bool,
    pub opcode: OpCode,
    pub payload: Bytes,
}

impl Frame {
    pub fn new(fin: bool, opcode: OpCode, payload: impl Into<Bytes>) -> Self {
        Self { fin, opcode, payload: payload.into() }
    }

    #[inline]
    pub fn text(data: impl Into<Bytes>) -> Self {
        Self::new(true, OpCode::Text, data)
    }

    #[inline]
    pub fn binary(data: impl Into<Bytes>) -> Self {
        Self::new(true, OpCode::Binary, data)
    }

    #[inline]
    pub fn ping(data: impl Into<Bytes>) -> Self {
        Self::new(true, OpCode::Ping, data)
    }

    #[inline]
    pub fn pong(data: impl Into<Bytes>) -> Self {
        Self::new(true, OpCode::Pong, data)
    }

    /// A close frame carrying `code` and a UTF-8 `reason`.
    ///
    /// The reason is truncated on a character boundary so the payload fits a control frame.
    pub fn close(code: impl Into<u16>, reason: &str) -> Self {
        let mut end = reason.len().min(MAX_CONTROL_PAYLOAD - 2);
        while !reason.is_char_boundary(end) {
            end -= 1;
        }

        let mut payload = BytesMut::with_capacity(2 + end);
        payload.put_u16(code.into());
        payload.put_slice(&reason.as_bytes()[..end]);
        Self::new(true, OpCode::Close, payload.freeze())
    }

    /// A close frame without status code.
    #[inline]
    pub fn close_empty() -> Self {
        Self::new(true, OpCode::Close, Bytes::new())
    }

    #[inline]
    pub fn is_control(&self) -> bool {
        self.opcode.is_control()
    }

    #[inline]
    pub fn is_close(&self) -> bool {
        self.opcode == OpCode::Close
    }

    /// Status code of a close frame, `None` for other frames or an empty close payload.
    pub fn close_code(&self) -> Option<u16> {
        if !self.is_close() || self.payload.len() < 2 {
            return None;
        }
        Some(u16::from_be_bytes([self.payload[0], self.payload[1]]))
    }

    /// Reason of a close frame, `None` when absent or not UTF-8.
    pub fn close_reason(&self) -> Option<&str> {
        if !self.is_close() || self.payload.len() <= 2 {
            return None;
        }
        std::str::from_utf8(&self.payload[2..]).ok()
    }

    /// Payload as text.
    pub fn as_text(&self) -> Result<&str, FrameError> {
        std::str::from_utf8(&self.payload).map_err(|_| FrameError::InvalidUtf8)
    }

    /// Checks the rules every outgoing frame must follow.
    pub fn validate(&self) -> Result<(), FrameError> {
        if self.is_control() {
            if !self.fin {
                return Err(FrameError::FragmentedControl);
            }
            if self.payload.len() > MAX_CONTROL_PAYLOAD {
                return Err(FrameError::ControlTooLarge(self.payload.len() as u64));
            }
        }
        Ok(())
    }
}

/// Largest payload a control frame may carry.
pub const MAX_CONTROL_PAYLOAD: usize = 125;
