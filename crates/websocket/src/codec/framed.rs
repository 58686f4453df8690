//! [`WsCodec`], the frame codec as a `tokio_util` [`Decoder`] and [`Encoder`].

use std::sync::Arc;

use bytes::{Buf, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::codec::frame_parser::{DEFAULT_MAX_FRAME_SIZE, FrameParser, MaskRequirement};
use crate::codec::frame_writer::{MAX_HEADER_SIZE, encode_header};
use crate::codec::mask::apply_mask;
use crate::entropy::Entropy;
use crate::error::FrameError;
use crate::frame::Frame;

/// Frame codec for `tokio_util::codec::Framed` and friends.
///
/// The server side expects masked frames and sends them unmasked, the client side masks every
/// frame with a fresh key and expects unmasked ones.
#[derive(Debug)]
pub struct WsCodec {
    parser: FrameParser,
    entropy: Option<Arc<Entropy>>,
}

impl WsCodec {
    pub fn server() -> Self {
        Self::server_with_limit(DEFAULT_MAX_FRAME_SIZE)
    }

    pub fn server_with_limit(max_frame_size: usize) -> Self {
        Self { parser: FrameParser::new(max_frame_size).with_mask_requirement(MaskRequirement::Masked), entropy: None }
    }

    pub fn client(entropy: Arc<Entropy>) -> Self {
        Self::client_with_limit(entropy, DEFAULT_MAX_FRAME_SIZE)
    }

    pub fn client_with_limit(entropy: Arc<Entropy>, max_frame_size: usize) -> Self {
        Self {
            parser: FrameParser::new(max_frame_size).with_mask_requirement(MaskRequirement::Unmasked),
            entropy: Some(entropy),
        }
    }
}

impl Decoder for WsCodec {
    type Item = Frame;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let consumed = self.parser.insert_data(src)?;
        src.advance(consumed);
        Ok(self.parser.take_frame())
    }
}

impl Encoder<Frame> for WsCodec {
    type Error = FrameError;

    fn encode(&mut self, frame: Frame, dst: &mut BytesMut) -> Result<(), Self::Error> {
        frame.validate()?;

        let mask_key = self.entropy.as_ref().map(|entropy| entropy.mask_key());
        let mut header = [0u8; MAX_HEADER_SIZE];
        let header_len = encode_header(frame.fin, frame.opcode, frame.payload.len() as u64, mask_key, &mut header);

        dst.reserve(header_len + frame.payload.len());
        dst.extend_from_slice(&header[..header_len]);
        let payload_start = dst.len();
        dst.extend_from_slice(&frame.payload);
        if let Some(key) = mask_key {
            apply_mask(&mut dst[payload_start..], key);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::OpCode;
    use futures::{SinkExt, StreamExt};
    use tokio_util::codec::{FramedRead, FramedWrite};

    #[test]
    fn client_frames_decode_on_the_server() {
        let mut client = WsCodec::client(Arc::new(Entropy::from_seed(1)));
        let mut server = WsCodec::server();

        let mut wire = BytesMut::new();
        client.encode(Frame::text("first"), &mut wire).unwrap();
        client.encode(Frame::new(false, OpCode::Binary, vec![1, 2, 3]), &mut wire).unwrap();
        assert_eq!(wire[1] & 0x80, 0x80);

        assert_eq!(server.decode(&mut wire).unwrap(), Some(Frame::text("first")));
        assert_eq!(server.decode(&mut wire).unwrap(), Some(Frame::new(false, OpCode::Binary, vec![1, 2, 3])));
        assert_eq!(server.decode(&mut wire).unwrap(), None);
        assert!(wire.is_empty());
    }

    #[test]
    fn partial_input_waits_for_more() {
        let mut server = WsCodec::server();
        let mut wire = BytesMut::from(&[0x81, 0x85, 0x37, 0xfa][..]);
        assert_eq!(server.decode(&mut wire).unwrap(), None);
        wire.extend_from_slice(&[0x21, 0x3d, 0x7f, 0x9f, 0x4d, 0x51, 0x58]);
        assert_eq!(server.decode(&mut wire).unwrap(), Some(Frame::text("Hello")));
    }

    #[test]
    fn server_rejects_unmasked_frames() {
        let mut server = WsCodec::server();
        let mut wire = BytesMut::from(&[0x81, 0x00][..]);
        assert!(matches!(server.decode(&mut wire), Err(FrameError::MissingMask)));
    }

    #[test]
    fn invalid_control_frame_is_not_encoded() {
        let mut server = WsCodec::server();
        let mut wire = BytesMut::new();
        assert!(server.encode(Frame::ping(vec![0u8; 200]), &mut wire).is_err());
        assert!(wire.is_empty());
    }

    #[tokio::test]
    async fn framed_over_duplex() {
        let (client_io, server_io) = tokio::io::duplex(4096);
        let mut writer = FramedWrite::new(client_io, WsCodec::client(Arc::new(Entropy::new())));
        let mut reader = FramedRead::new(server_io, WsCodec::server());

        let big = vec![42u8; 1000];
        writer.send(Frame::binary(big.clone())).await.unwrap();
        writer.send(Frame::close(1000u16, "done")).await.unwrap();

        assert_eq!(reader.next().await.unwrap().unwrap().payload, big);
        let close = reader.next().await.unwrap().unwrap();
        assert_eq!(close.close_code(), Some(1000));
    }
}
