//! Message body abstractions.
//!
//! A body is produced by a [`BodySource`] when a message is written and consumed by a
//! [`BodySink`] when a message is parsed. [`MemoryBody`] implements both and is what every
//! message carries by default. Callers that stream large payloads plug in their own source or
//! sink through [`Body::from_source`] and [`Body::from_sink`].

use std::fmt;
use std::io;

use bytes::{Bytes, BytesMut};

/// Pull side of a body: the writer asks for up to `buf.len()` bytes at a time.
pub trait BodySource: Send {
    /// Total number of bytes this source will produce, if known up front.
    fn size_hint(&self) -> Option<u64>;

    /// Copies the next bytes into `buf` and returns how many were written.
    ///
    /// Returning `0` means the body is exhausted.
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;
}

/// Push side of a body: the parser hands over every body part as it arrives.
pub trait BodySink: Send {
    fn write(&mut self, data: &[u8]) -> io::Result<()>;

    /// Called exactly once, after the last body part.
    fn finish(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// The default in-memory body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryBody {
    data: BytesMut,
    read_pos: usize,
}

impl MemoryBody {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Rewinds the read cursor so the body can be written again.
    pub fn rewind(&mut self) {
        self.read_pos = 0;
    }

    pub fn clear(&mut self) {
        self.data.clear();
        self.read_pos = 0;
    }

    pub fn into_bytes(self) -> Bytes {
        self.data.freeze()
    }
}

impl From<&[u8]> for MemoryBody {
    fn from(value: &[u8]) -> Self {
        Self { data: BytesMut::from(value), read_pos: 0 }
    }
}

impl From<&str> for MemoryBody {
    fn from(value: &str) -> Self {
        value.as_bytes().into()
    }
}

impl From<Vec<u8>> for MemoryBody {
    fn from(value: Vec<u8>) -> Self {
        Self { data: BytesMut::from(&value[..]), read_pos: 0 }
    }
}

impl From<String> for MemoryBody {
    fn from(value: String) -> Self {
        value.into_bytes().into()
    }
}

impl From<Bytes> for MemoryBody {
    fn from(value: Bytes) -> Self {
        Self { data: BytesMut::from(value), read_pos: 0 }
    }
}

impl BodySource for MemoryBody {
    fn size_hint(&self) -> Option<u64> {
        Some((self.data.len() - self.read_pos) as u64)
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let remaining = &self.data[self.read_pos..];
        let n = remaining.len().min(buf.len());
        buf[..n].copy_from_slice(&remaining[..n]);
        self.read_pos += n;
        Ok(n)
    }
}

impl BodySink for MemoryBody {
    fn write(&mut self, data: &[u8]) -> io::Result<()> {
        self.data.extend_from_slice(data);
        Ok(())
    }
}

/// The body carried by a [`Request`](crate::protocol::Request) or
/// [`Response`](crate::protocol::Response).
#[derive(Default)]
pub enum Body {
    Memory(MemoryBody),
    Source(Box<dyn BodySource>),
    Sink(Box<dyn BodySink>),
    #[default]
    Empty,
}

impl Body {
    pub fn from_source<S: BodySource + 'static>(source: S) -> Self {
        Self::Source(Box::new(source))
    }

    pub fn from_sink<S: BodySink + 'static>(sink: S) -> Self {
        Self::Sink(Box::new(sink))
    }

    /// Returns the in-memory bytes, if this is a memory body.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Body::Memory(memory) => Some(memory.as_bytes()),
            Body::Empty => Some(&[]),
            Body::Source(_) | Body::Sink(_) => None,
        }
    }

    /// Size the writer should announce, `None` if only the source knows when it ends.
    pub fn size_hint(&self) -> Option<u64> {
        match self {
            Body::Memory(memory) => BodySource::size_hint(memory),
            Body::Source(source) => source.size_hint(),
            Body::Sink(_) | Body::Empty => Some(0),
        }
    }

    pub(crate) fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Body::Memory(memory) => BodySource::read(memory, buf),
            Body::Source(source) => source.read(buf),
            Body::Sink(_) | Body::Empty => Ok(0),
        }
    }

    /// Routes a parsed body part, turning an empty body into a memory body on first use.
    pub(crate) fn write(&mut self, data: &[u8]) -> io::Result<()> {
        match self {
            Body::Memory(memory) => BodySink::write(memory, data),
            Body::Sink(sink) => sink.write(data),
            Body::Empty => {
                *self = Body::Memory(MemoryBody::from(data));
                Ok(())
            }
            Body::Source(_) => Err(io::Error::new(io::ErrorKind::Unsupported, "body source can't receive parsed data")),
        }
    }

    pub(crate) fn finish(&mut self) -> io::Result<()> {
        match self {
            Body::Memory(memory) => BodySink::finish(memory),
            Body::Sink(sink) => sink.finish(),
            Body::Empty | Body::Source(_) => Ok(()),
        }
    }

    /// Drops in-memory content; custom sources and sinks are left in place.
    pub fn clear(&mut self) {
        if let Body::Memory(memory) = self {
            memory.clear();
        }
    }
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Body::Memory(memory) => f.debug_tuple("Memory").field(&memory.len()).finish(),
            Body::Source(source) => f.debug_tuple("Source").field(&source.size_hint()).finish(),
            Body::Sink(_) => f.write_str("Sink"),
            Body::Empty => f.write_str("Empty"),
        }
    }
}

macro_rules! memory_body_from {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Body {
                fn from(value: $ty) -> Self {
                    Body::Memory(value.into())
                }
            }
        )*
    };
}

memory_body_from!(&[u8], &str, Vec<u8>, String, Bytes);

impl From<MemoryBody> for Body {
    fn from(value: MemoryBody) -> Self {
        Body::Memory(value)
    }
}
