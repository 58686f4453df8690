//! WebSocket frame codec.
//!
//! - [`FrameParser`]: incremental, fragmentation independent frame decoding
//! - [`FrameWriter`]: header then payload, pulled piece by piece by the connection
//! - [`WsCodec`]: the same codec behind `tokio_util::codec::{Decoder, Encoder}`
//! - [`apply_mask`]: the RFC 6455 masking transform

mod frame_parser;
mod frame_writer;
mod framed;
mod mask;

pub use frame_parser::{DEFAULT_MAX_FRAME_SIZE, FrameParser, FrameParserState, MaskRequirement};
pub use frame_writer::{FrameWriter, FrameWriterState, MAX_HEADER_SIZE, encode_header};
pub use framed::WsCodec;
pub use mask::apply_mask;
