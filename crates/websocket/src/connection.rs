use std::collections::VecDeque;
use std::io;
use std::mem;
use std::sync::Arc;
use std::task::Poll;

use bytes::{Buf, BytesMut};
use micro_wire_http::connection::{ConnectionState, HttpConnection, IoStatus, Role, TokioTransport, Transport};
use micro_wire_http::protocol::HttpError;
use tokio::io::Interest;
use tracing::{debug, error, trace, warn};

use crate::codec::{FrameParser, FrameParserState, FrameWriter, MaskRequirement};
use crate::config::WebSocketConfig;
use crate::entropy::Entropy;
use crate::error::{HandshakeError, WsError};
use crate::frame::{Frame, OpCode};
use crate::handshake::{accept_response, client_request, generate_key, reject_response, validate_request, verify_response};
use crate::sender::{FrameSender, Outbox};

/// Best effort reply to a handshake request that is not even valid HTTP.
const RAW_BAD_REQUEST: &[u8] = b"HTTP/1.1 400 Bad Request\r\ncontent-length: 0\r\nconnection: close\r\n\r\n";

/// Lifecycle of a [`WebSocketConnection`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebSocketState {
    ServerHandshaking,
    ClientHandshaking,
    /// The handshake succeeded, frames flow.
    Connected,
    /// Held while [`WebSocketConnection::process`] works on a connected socket.
    ProcessingConnection,
    Error,
    Closed,
}

impl WebSocketState {
    #[inline]
    pub fn is_handshaking(&self) -> bool {
        matches!(self, WebSocketState::ServerHandshaking | WebSocketState::ClientHandshaking)
    }

    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(self, WebSocketState::Error | WebSocketState::Closed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadState {
    ReadingWaitingFrame,
    ReadingFrameComplete,
    ReadingError,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteState {
    WritingNone,
    WritingFrame,
    WritingFrameComplete,
    WritingError,
}

#[derive(Debug)]
enum Link<T> {
    Handshake(HttpConnection<T>),
    Open(T),
    Detached,
}

/// A WebSocket endpoint driven over a non-blocking [`Transport`].
///
/// The opening handshake runs on an embedded [`HttpConnection`]. Once it succeeds the HTTP
/// machinery is dropped and any bytes received past the handshake go to the frame parser.
///
/// Each [`process`](Self::process) call writes queued frames, then makes one attempt to read
/// a frame. Pings are answered and close frames echoed without the application's help; both
/// are still handed out through [`recv`](Self::recv).
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use micro_wire_http::connection::pipe;
/// use micro_wire_ws::{Entropy, Frame, WebSocketConfig, WebSocketConnection, WebSocketState};
///
/// let entropy = Arc::new(Entropy::new());
/// let (client_end, server_end) = pipe();
/// let mut server = WebSocketConnection::server(server_end, WebSocketConfig::default(), Arc::clone(&entropy));
/// let mut client =
///     WebSocketConnection::client(client_end, WebSocketConfig::default(), entropy, "/chat", Some("localhost")).unwrap();
///
/// while client.state() != WebSocketState::Connected || server.state() != WebSocketState::Connected {
///     let _ = client.process();
///     let _ = server.process();
/// }
///
/// client.send(Frame::text("hello")).unwrap();
/// let _ = client.process();
/// let _ = server.process();
/// assert_eq!(server.recv(), Some(Frame::text("hello")));
/// ```
#[derive(Debug)]
pub struct WebSocketConnection<T> {
    link: Link<T>,
    role: Role,
    config: WebSocketConfig,
    entropy: Arc<Entropy>,
    state: WebSocketState,
    read_state: ReadState,
    write_state: WriteState,
    parser: FrameParser,
    writer: FrameWriter,
    write_offset: usize,
    writing_close: bool,
    read_buf: BytesMut,
    incoming: VecDeque<Frame>,
    outbox: Arc<Outbox>,
    handshake_key: Option<String>,
    rejection: Option<HandshakeError>,
    protocol: Option<String>,
    close_sent: bool,
    close_received: bool,
    error: Option<String>,
}

impl<T: Transport> WebSocketConnection<T> {
    /// The server side, waiting for the upgrade request.
    pub fn server(transport: T, config: WebSocketConfig, entropy: Arc<Entropy>) -> Self {
        let http = HttpConnection::server(transport, config.http);
        Self::new(Link::Handshake(http), Role::Server, config, entropy, WebSocketState::ServerHandshaking)
    }

    /// The client side. The upgrade request for `path` is submitted right away and written by
    /// the first [`process`](Self::process) calls.
    pub fn client(transport: T, config: WebSocketConfig, entropy: Arc<Entropy>, path: &str, host: Option<&str>) -> Result<Self, WsError> {
        let key = generate_key(&entropy);
        let request = client_request(path, host, &key, &config.subprotocols).map_err(HttpError::from)?;

        let mut http = HttpConnection::client(transport, config.http);
        http.send_request(request)?;

        let mut connection = Self::new(Link::Handshake(http), Role::Client, config, entropy, WebSocketState::ClientHandshaking);
        connection.handshake_key = Some(key);
        Ok(connection)
    }

    fn new(link: Link<T>, role: Role, config: WebSocketConfig, entropy: Arc<Entropy>, state: WebSocketState) -> Self {
        let mask_requirement = match role {
            Role::Server => MaskRequirement::Masked,
            Role::Client => MaskRequirement::Unmasked,
        };

        Self {
            link,
            role,
            parser: FrameParser::new(config.max_frame_size).with_mask_requirement(mask_requirement),
            read_buf: BytesMut::with_capacity(config.read_buffer_size),
            config,
            entropy,
            state,
            read_state: ReadState::ReadingWaitingFrame,
            write_state: WriteState::WritingNone,
            writer: FrameWriter::new(),
            write_offset: 0,
            writing_close: false,
            incoming: VecDeque::new(),
            outbox: Arc::new(Outbox::default()),
            handshake_key: None,
            rejection: None,
            protocol: None,
            close_sent: false,
            close_received: false,
            error: None,
        }
    }

    #[inline]
    pub fn state(&self) -> WebSocketState {
        self.state
    }

    #[inline]
    pub fn read_state(&self) -> ReadState {
        self.read_state
    }

    #[inline]
    pub fn write_state(&self) -> WriteState {
        self.write_state
    }

    #[inline]
    pub fn role(&self) -> Role {
        self.role
    }

    pub fn config(&self) -> &WebSocketConfig {
        &self.config
    }

    /// The subprotocol agreed on during the handshake.
    pub fn protocol(&self) -> Option<&str> {
        self.protocol.as_deref()
    }

    /// Description of the error that moved the connection into [`WebSocketState::Error`].
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// True once a close frame was written to the peer.
    pub fn close_sent(&self) -> bool {
        self.close_sent
    }

    /// True once the peer's close frame was read.
    pub fn close_received(&self) -> bool {
        self.close_received
    }

    /// Queues a frame for writing.
    pub fn send(&self, frame: Frame) -> Result<(), WsError> {
        if self.state.is_terminal() {
            return Err(WsError::invalid_state("send", self.state));
        }
        self.outbox.push(frame)
    }

    /// A handle that queues frames on this connection from elsewhere.
    pub fn sender(&self) -> FrameSender {
        FrameSender::new(Arc::clone(&self.outbox))
    }

    /// The oldest received frame not handed out yet.
    pub fn recv(&mut self) -> Option<Frame> {
        self.incoming.pop_front()
    }

    /// Starts the closing handshake. Calling it again, or after the peer's close frame was
    /// echoed, has no effect.
    pub fn close(&self, code: impl Into<u16>, reason: &str) -> Result<(), WsError> {
        if self.state.is_terminal() {
            return Err(WsError::invalid_state("close", self.state));
        }
        if self.close_sent || self.outbox.close_queued() {
            return Ok(());
        }
        match self.outbox.push(Frame::close(code, reason)) {
            Err(WsError::CloseSent) => Ok(()),
            result => result,
        }
    }

    /// Closes the transport right away, without a closing handshake.
    pub fn shutdown(&mut self) {
        if self.state == WebSocketState::Closed {
            return;
        }
        debug!(role = ?self.role, state = ?self.state, "shutting down websocket");
        self.close_transport();
        self.state = WebSocketState::Closed;
    }

    /// Advances the connection.
    ///
    /// - `Poll::Pending`: nothing could be done without waiting on the transport
    /// - `Poll::Ready(Ok(()))`: the handshake completed, a frame was received or the
    ///   connection just closed, see [`state`](Self::state) and [`recv`](Self::recv)
    /// - `Poll::Ready(Err(_))`: the connection failed or was already closed
    pub fn process(&mut self) -> Poll<Result<(), WsError>> {
        match self.state {
            WebSocketState::ServerHandshaking | WebSocketState::ClientHandshaking => self.poll_handshake(),
            WebSocketState::Connected | WebSocketState::ProcessingConnection => self.poll_connected(),
            WebSocketState::Error => Poll::Ready(Err(WsError::invalid_state("process", self.state))),
            WebSocketState::Closed => Poll::Ready(Err(WsError::Closed)),
        }
    }

    fn poll_handshake(&mut self) -> Poll<Result<(), WsError>> {
        let Link::Handshake(mut http) = mem::replace(&mut self.link, Link::Detached) else {
            return Poll::Ready(Err(self.fail(WsError::invalid_state("handshake", self.state))));
        };

        let result = match self.role {
            Role::Server => self.server_handshake(&mut http),
            Role::Client => self.client_handshake(&mut http),
        };

        match result {
            Poll::Pending => {
                self.link = Link::Handshake(http);
                Poll::Pending
            }
            Poll::Ready(Ok(())) => {
                self.open(http);
                Poll::Ready(Ok(()))
            }
            Poll::Ready(Err(e)) => {
                http.close();
                self.link = Link::Handshake(http);
                Poll::Ready(Err(self.fail(e)))
            }
        }
    }

    fn server_handshake(&mut self, http: &mut HttpConnection<T>) -> Poll<Result<(), WsError>> {
        loop {
            match http.process() {
                Poll::Pending => return Poll::Pending,
                Poll::Ready(Err(e)) => {
                    if matches!(e, HttpError::ParseError { .. }) {
                        match http.transport_mut().write(RAW_BAD_REQUEST) {
                            IoStatus::Ready(n) if n == RAW_BAD_REQUEST.len() => debug!("sent 400 reply to invalid upgrade request"),
                            status => debug!(?status, "400 reply to invalid upgrade request not fully sent"),
                        }
                    }
                    return Poll::Ready(Err(e.into()));
                }
                Poll::Ready(Ok(())) => {}
            }

            match http.state() {
                ConnectionState::ServerReadingRequestComplete => {
                    let request = http.take_request()?;
                    let response = match validate_request(&request, &self.config.subprotocols) {
                        Ok(accepted) => {
                            self.protocol.clone_from(&accepted.protocol);
                            accept_response(&accepted).map_err(HttpError::from)?
                        }
                        Err(e) => {
                            warn!(path = request.path(), cause = %e, "rejecting websocket upgrade");
                            let response = reject_response(&e);
                            self.rejection = Some(e);
                            response
                        }
                    };
                    http.send_response(response)?;
                }
                ConnectionState::ServerWritingResponseComplete => {
                    return match self.rejection.take() {
                        Some(rejection) => Poll::Ready(Err(rejection.into())),
                        None => Poll::Ready(Ok(())),
                    };
                }
                state => return Poll::Ready(Err(HttpError::invalid_state("handshake", state).into())),
            }
        }
    }

    fn client_handshake(&mut self, http: &mut HttpConnection<T>) -> Poll<Result<(), WsError>> {
        loop {
            match http.process() {
                Poll::Pending => return Poll::Pending,
                Poll::Ready(Err(e)) => return Poll::Ready(Err(e.into())),
                Poll::Ready(Ok(())) => {}
            }

            match http.state() {
                ConnectionState::ClientWritingRequestComplete => {}
                ConnectionState::ClientReadingResponseComplete => {
                    let response = http.take_response()?;
                    let key = self.handshake_key.take().unwrap_or_default();
                    self.protocol = verify_response(&response, &key, &self.config.subprotocols)?;
                    return Poll::Ready(Ok(()));
                }
                state => return Poll::Ready(Err(HttpError::invalid_state("handshake", state).into())),
            }
        }
    }

    fn open(&mut self, http: HttpConnection<T>) {
        let (transport, leftover) = http.into_parts();
        self.read_buf.extend_from_slice(&leftover);
        self.link = Link::Open(transport);
        self.state = WebSocketState::Connected;
        debug!(role = ?self.role, protocol = ?self.protocol, leftover = self.read_buf.len(), "websocket connected");
    }

    fn poll_connected(&mut self) -> Poll<Result<(), WsError>> {
        self.state = WebSocketState::ProcessingConnection;
        let result = self.connected_step();
        if self.state == WebSocketState::ProcessingConnection {
            self.state = WebSocketState::Connected;
        }

        match result {
            Ok(true) => Poll::Ready(Ok(())),
            Ok(false) => Poll::Pending,
            Err(e) => Poll::Ready(Err(self.fail(e))),
        }
    }

    /// Returns true when the application has something to look at.
    fn connected_step(&mut self) -> Result<bool, WsError> {
        self.flush_writes()?;
        if self.state == WebSocketState::Closed {
            return Ok(true);
        }

        let received = self.read_frame()?;
        if self.state == WebSocketState::Closed {
            return Ok(true);
        }
        if received {
            self.flush_writes()?;
        }

        if self.close_sent && self.close_received && !self.writer.is_busy() {
            debug!(role = ?self.role, "closing handshake complete");
            self.close_transport();
            self.state = WebSocketState::Closed;
            return Ok(true);
        }
        Ok(received || self.state == WebSocketState::Closed)
    }

    /// Writes queued frames until the queue is empty or the transport would block. Frames are
    /// never interleaved.
    fn flush_writes(&mut self) -> Result<(), WsError> {
        let Link::Open(transport) = &mut self.link else {
            return Err(WsError::Closed);
        };

        loop {
            if !self.writer.is_busy() {
                let Some(frame) = self.outbox.pop() else {
                    return Ok(());
                };
                let mask_key = (self.role == Role::Client).then(|| self.entropy.mask_key());
                self.writer.start_frame(&frame, mask_key);
                self.writing_close = frame.is_close();
                self.write_offset = 0;
                self.write_state = WriteState::WritingFrame;
            }

            let Some(piece) = self.writer.data() else {
                return Ok(());
            };
            let piece_len = piece.len();

            match transport.write(&piece[self.write_offset..]) {
                IoStatus::Ready(0) | IoStatus::WouldBlock | IoStatus::TimedOut => return Ok(()),
                IoStatus::Ready(n) => {
                    trace!(written = n, piece_len, offset = self.write_offset, "wrote frame bytes");
                    self.write_offset += n;
                    if self.write_offset < piece_len {
                        continue;
                    }
                    self.write_offset = 0;
                    self.writer.next();
                    if !self.writer.is_busy() {
                        self.write_state = WriteState::WritingFrameComplete;
                        if self.writing_close {
                            debug!(role = ?self.role, "close frame sent");
                            self.close_sent = true;
                        }
                    }
                }
                IoStatus::Closed if self.close_received => {
                    debug!(role = ?self.role, "peer closed the transport after its close frame");
                    transport.close();
                    self.state = WebSocketState::Closed;
                    return Ok(());
                }
                IoStatus::Closed => {
                    self.write_state = WriteState::WritingError;
                    return Err(WsError::transport(io::Error::from(io::ErrorKind::BrokenPipe)));
                }
                IoStatus::Failed(e) => {
                    self.write_state = WriteState::WritingError;
                    return Err(WsError::transport(e));
                }
            }
        }
    }

    /// One attempt to read a frame: buffered bytes first, then a single transport read.
    fn read_frame(&mut self) -> Result<bool, WsError> {
        if self.read_state == ReadState::ReadingFrameComplete {
            self.read_state = ReadState::ReadingWaitingFrame;
        }
        if self.close_received {
            return Ok(false);
        }
        if self.feed_parser()? {
            return Ok(true);
        }

        let Link::Open(transport) = &mut self.link else {
            return Err(WsError::Closed);
        };
        let start = self.read_buf.len();
        self.read_buf.resize(start + self.config.read_buffer_size, 0);
        let status = transport.read(&mut self.read_buf[start..]);
        let read = match &status {
            IoStatus::Ready(n) => *n,
            _ => 0,
        };
        self.read_buf.truncate(start + read);

        match status {
            IoStatus::Ready(0) | IoStatus::WouldBlock | IoStatus::TimedOut => Ok(false),
            IoStatus::Ready(n) => {
                trace!(read = n, "read from transport");
                self.feed_parser()
            }
            IoStatus::Closed if self.close_sent => {
                debug!(role = ?self.role, "transport closed after close frame was sent");
                self.close_transport();
                self.state = WebSocketState::Closed;
                Ok(false)
            }
            IoStatus::Closed => {
                self.read_state = ReadState::ReadingError;
                Err(WsError::UnexpectedClose)
            }
            IoStatus::Failed(e) => {
                self.read_state = ReadState::ReadingError;
                Err(WsError::transport(e))
            }
        }
    }

    /// Feeds buffered bytes to the parser, returns true if a frame completed.
    fn feed_parser(&mut self) -> Result<bool, WsError> {
        if self.read_buf.is_empty() {
            return Ok(false);
        }

        match self.parser.insert_data(&self.read_buf) {
            Ok(used) => self.read_buf.advance(used),
            Err(e) => {
                self.read_state = ReadState::ReadingError;
                return Err(e.into());
            }
        }

        if self.parser.state() != FrameParserState::Complete {
            return Ok(false);
        }
        if let Some(frame) = self.parser.take_frame() {
            self.on_frame(frame);
        }
        Ok(true)
    }

    fn on_frame(&mut self, frame: Frame) {
        trace!(opcode = ?frame.opcode, fin = frame.fin, len = frame.payload.len(), "frame received");
        self.read_state = ReadState::ReadingFrameComplete;

        match frame.opcode {
            OpCode::Ping => {
                if !self.outbox.push_reply(Frame::pong(frame.payload.clone())) {
                    trace!("ping not answered, close already queued");
                }
            }
            OpCode::Close => {
                self.close_received = true;
                let echo = match frame.close_code() {
                    Some(code) => Frame::close(code, ""),
                    None => Frame::close_empty(),
                };
                if self.outbox.push_reply(echo) {
                    debug!(role = ?self.role, code = ?frame.close_code(), "close frame received, echoing");
                } else {
                    debug!(role = ?self.role, code = ?frame.close_code(), "close frame received in reply");
                }
            }
            _ => {}
        }
        self.incoming.push_back(frame);
    }

    fn close_transport(&mut self) {
        match &mut self.link {
            Link::Open(transport) => transport.close(),
            Link::Handshake(http) => http.close(),
            Link::Detached => {}
        }
    }

    fn fail(&mut self, e: WsError) -> WsError {
        error!(role = ?self.role, state = ?self.state, cause = %e, "websocket connection failed");
        self.state = WebSocketState::Error;
        self.error = Some(e.to_string());
        self.close_transport();
        e
    }
}

impl WebSocketConnection<TokioTransport> {
    /// Calls [`process`](Self::process) until it is ready, awaiting socket readiness or a frame
    /// queued through a [`FrameSender`] whenever it returns `Poll::Pending`.
    pub async fn drive(&mut self) -> Result<(), WsError> {
        loop {
            if let Poll::Ready(result) = self.process() {
                return result;
            }

            let (transport, interest) = match &self.link {
                Link::Handshake(http) => {
                    let interest = if http.state().is_writing() { Interest::WRITABLE } else { Interest::READABLE };
                    (http.transport(), interest)
                }
                Link::Open(transport) => {
                    let interest = if self.writer.is_busy() { Interest::READABLE | Interest::WRITABLE } else { Interest::READABLE };
                    (transport, interest)
                }
                Link::Detached => return Err(WsError::Closed),
            };

            tokio::select! {
                ready = transport.ready(interest) => {
                    ready.map_err(WsError::transport)?;
                }
                () = self.outbox.notified(), if !self.state.is_handshaking() => {}
            }
        }
    }
}
