//! The byte stream a connection is driven over.
//!
//! A [`Transport`] never blocks: every call reports what happened as an [`IoStatus`]. Three
//! implementations are provided:
//!
//! - [`StdTransport`] over any non-blocking `std::io::{Read, Write}` stream
//! - [`TokioTransport`] over a `tokio::net::TcpStream`
//! - [`pipe`], an in-memory duplex pair for wiring a client and a server in one process

use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::sync::{Arc, Mutex};

use tokio::io::{Interest, Ready};
use tokio::net::TcpStream;
use tracing::trace;

/// Outcome of one transport call.
#[derive(Debug)]
pub enum IoStatus {
    /// `n` bytes were transferred.
    Ready(usize),
    /// Nothing can be transferred right now.
    WouldBlock,
    /// The transport's own deadline expired.
    TimedOut,
    /// The peer closed the stream, or it was closed locally.
    Closed,
    Failed(io::Error),
}

impl IoStatus {
    /// Maps a `std::io` result the way non-blocking sockets report their outcome.
    pub fn from_io(result: io::Result<usize>, requested: usize) -> Self {
        match result {
            Ok(0) if requested > 0 => IoStatus::Closed,
            Ok(n) => IoStatus::Ready(n),
            Err(e) => match e.kind() {
                io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted => IoStatus::WouldBlock,
                io::ErrorKind::TimedOut => IoStatus::TimedOut,
                _ => IoStatus::Failed(e),
            },
        }
    }

    #[inline]
    pub fn is_transient(&self) -> bool {
        matches!(self, IoStatus::WouldBlock | IoStatus::TimedOut)
    }
}

/// A non-blocking, bidirectional byte stream.
#[cfg_attr(test, mockall::automock)]
pub trait Transport {
    fn read(&mut self, buf: &mut [u8]) -> IoStatus;

    fn write(&mut self, data: &[u8]) -> IoStatus;

    /// Closes both directions. Calling it again has no effect.
    fn close(&mut self);
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn read(&mut self, buf: &mut [u8]) -> IoStatus {
        (**self).read(buf)
    }

    fn write(&mut self, data: &[u8]) -> IoStatus {
        (**self).write(data)
    }

    fn close(&mut self) {
        (**self).close();
    }
}

/// Adapts a `std::io` stream that was put into non-blocking mode.
///
/// Closing drops the stream.
#[derive(Debug)]
pub struct StdTransport<S> {
    stream: Option<S>,
}

impl<S: Read + Write> StdTransport<S> {
    pub fn new(stream: S) -> Self {
        Self { stream: Some(stream) }
    }

    pub fn get_ref(&self) -> Option<&S> {
        self.stream.as_ref()
    }

    pub fn into_inner(self) -> Option<S> {
        self.stream
    }
}

impl<S: Read + Write> Transport for StdTransport<S> {
    fn read(&mut self, buf: &mut [u8]) -> IoStatus {
        match self.stream.as_mut() {
            Some(stream) => IoStatus::from_io(stream.read(buf), buf.len()),
            None => IoStatus::Closed,
        }
    }

    fn write(&mut self, data: &[u8]) -> IoStatus {
        match self.stream.as_mut() {
            Some(stream) => IoStatus::from_io(stream.write(data), data.len()),
            None => IoStatus::Closed,
        }
    }

    fn close(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            let _ = stream.flush();
        }
    }
}

/// Tokio TCP stream used through its non-blocking `try_read` / `try_write` calls.
///
/// The poll-driven connections never await; [`ready`](Self::ready) lets an async task wait
/// until calling `process()` again makes sense.
#[derive(Debug)]
pub struct TokioTransport {
    stream: Option<TcpStream>,
}

impl TokioTransport {
    pub fn new(stream: TcpStream) -> Self {
        Self { stream: Some(stream) }
    }

    pub fn get_ref(&self) -> Option<&TcpStream> {
        self.stream.as_ref()
    }

    /// Waits until the stream is ready for `interest`. A closed transport is always ready so the
    /// next call reports [`IoStatus::Closed`].
    pub async fn ready(&self, interest: Interest) -> io::Result<Ready> {
        match &self.stream {
            Some(stream) => stream.ready(interest).await,
            None => Ok(Ready::ALL),
        }
    }
}

impl Transport for TokioTransport {
    fn read(&mut self, buf: &mut [u8]) -> IoStatus {
        match &self.stream {
            Some(stream) => IoStatus::from_io(stream.try_read(buf), buf.len()),
            None => IoStatus::Closed,
        }
    }

    fn write(&mut self, data: &[u8]) -> IoStatus {
        match &self.stream {
            Some(stream) => IoStatus::from_io(stream.try_write(data), data.len()),
            None => IoStatus::Closed,
        }
    }

    fn close(&mut self) {
        if self.stream.take().is_some() {
            trace!("tokio transport closed");
        }
    }
}

#[derive(Debug, Default)]
struct Channel {
    data: VecDeque<u8>,
    closed: bool,
}

/// One end of an in-memory duplex stream created by [`pipe`].
///
/// Reads return at most [`set_read_chunk`](Self::set_read_chunk) bytes at a time and writes
/// accept at most [`set_write_chunk`](Self::set_write_chunk) bytes, so short reads and
/// partial writes can be reproduced. Would-block results can be injected.
#[derive(Debug)]
pub struct PipeTransport {
    incoming: Arc<Mutex<Channel>>,
    outgoing: Arc<Mutex<Channel>>,
    read_chunk: usize,
    write_chunk: usize,
    would_block_reads: usize,
    would_block_writes: usize,
}

/// Creates two connected [`PipeTransport`] ends.
pub fn pipe() -> (PipeTransport, PipeTransport) {
    let a_to_b = Arc::new(Mutex::new(Channel::default()));
    let b_to_a = Arc::new(Mutex::new(Channel::default()));
    let a = PipeTransport::new(Arc::clone(&b_to_a), Arc::clone(&a_to_b));
    let b = PipeTransport::new(a_to_b, b_to_a);
    (a, b)
}

impl PipeTransport {
    fn new(incoming: Arc<Mutex<Channel>>, outgoing: Arc<Mutex<Channel>>) -> Self {
        Self { incoming, outgoing, read_chunk: usize::MAX, write_chunk: usize::MAX, would_block_reads: 0, would_block_writes: 0 }
    }

    pub fn set_read_chunk(&mut self, read_chunk: usize) {
        self.read_chunk = read_chunk.max(1);
    }

    pub fn set_write_chunk(&mut self, write_chunk: usize) {
        self.write_chunk = write_chunk.max(1);
    }

    /// The next `count` reads report [`IoStatus::WouldBlock`] whatever is buffered.
    pub fn inject_would_block_reads(&mut self, count: usize) {
        self.would_block_reads = count;
    }

    /// The next `count` writes report [`IoStatus::WouldBlock`].
    pub fn inject_would_block_writes(&mut self, count: usize) {
        self.would_block_writes = count;
    }

    /// Number of bytes written by the peer and not read yet.
    pub fn available(&self) -> usize {
        self.incoming.lock().map_or(0, |channel| channel.data.len())
    }
}

impl Transport for PipeTransport {
    fn read(&mut self, buf: &mut [u8]) -> IoStatus {
        if self.would_block_reads > 0 {
            self.would_block_reads -= 1;
            return IoStatus::WouldBlock;
        }

        let Ok(mut channel) = self.incoming.lock() else {
            return IoStatus::Failed(io::Error::other("pipe lock poisoned"));
        };
        if channel.data.is_empty() {
            return if channel.closed { IoStatus::Closed } else { IoStatus::WouldBlock };
        }

        let len = buf.len().min(self.read_chunk).min(channel.data.len());
        for (dst, src) in buf[..len].iter_mut().zip(channel.data.drain(..len)) {
            *dst = src;
        }
        IoStatus::Ready(len)
    }

    fn write(&mut self, data: &[u8]) -> IoStatus {
        if self.would_block_writes > 0 {
            self.would_block_writes -= 1;
            return IoStatus::WouldBlock;
        }

        let Ok(mut channel) = self.outgoing.lock() else {
            return IoStatus::Failed(io::Error::other("pipe lock poisoned"));
        };
        if channel.closed {
            return IoStatus::Closed;
        }

        let len = data.len().min(self.write_chunk);
        channel.data.extend(&data[..len]);
        IoStatus::Ready(len)
    }

    fn close(&mut self) {
        for channel in [&self.incoming, &self.outgoing] {
            if let Ok(mut channel) = channel.lock() {
                channel.closed = true;
            }
        }
    }
}
