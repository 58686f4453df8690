use std::io;
use std::mem;
use std::task::Poll;

use bytes::{Buf, BytesMut};
use http::Method;
use tokio::io::Interest;
use tracing::{debug, error, trace};

use crate::codec::{MessageParser, MessageWriter, ParserState};
use crate::config::HttpConfig;
use crate::connection::message::{IncomingMessage, OutgoingMessage, prepare_outgoing};
use crate::connection::transport::{IoStatus, TokioTransport, Transport};
use crate::connection::{ConnectionState, ReadStrategy, Role};
use crate::protocol::{Body, BodySink, HttpError, Message, ParseError, Request, Response, SendError};

/// An HTTP/1.1 connection driven over a non-blocking [`Transport`].
///
/// `HttpConnection` owns the parser, the writer and the transport and moves through
/// [`ConnectionState`] as messages are read and written:
///
/// - server: read a request, [`take_request`](Self::take_request),
///   [`send_response`](Self::send_response), write it, then
///   [`next_request`](Self::next_request) for the next one on the same connection
/// - client: [`send_request`](Self::send_request), write it, read the response, then
///   [`take_response`](Self::take_response)
///
/// Nothing blocks. [`process`](Self::process) does as much of the current phase as the
/// transport allows and returns [`Poll::Pending`] when it would have to wait.
///
/// # Example
///
/// ```
/// use std::task::Poll;
/// use micro_wire_http::config::HttpConfig;
/// use micro_wire_http::connection::{ConnectionState, HttpConnection, pipe};
/// use micro_wire_http::protocol::{Request, Response};
///
/// let (client_end, server_end) = pipe();
/// let mut client = HttpConnection::client(client_end, HttpConfig::default());
/// let mut server = HttpConnection::server(server_end, HttpConfig::default());
///
/// client.send_request(Request::get("/hello")).unwrap();
/// while client.state() != ConnectionState::ClientWritingRequestComplete {
///     assert!(client.process().is_ready());
/// }
///
/// assert!(matches!(server.process(), Poll::Ready(Ok(()))));
/// let request = server.take_request().unwrap();
/// assert_eq!(request.path(), "/hello");
///
/// server.send_response(Response::ok("world")).unwrap();
/// assert!(matches!(server.process(), Poll::Ready(Ok(()))));
///
/// assert!(matches!(client.process(), Poll::Ready(Ok(()))));
/// let response = client.take_response().unwrap();
/// assert_eq!(response.body().as_bytes(), Some(&b"world"[..]));
/// ```
#[derive(Debug)]
pub struct HttpConnection<T> {
    transport: T,
    config: HttpConfig,
    role: Role,
    state: ConnectionState,
    parser: MessageParser,
    writer: MessageWriter,
    read_buf: BytesMut,
    write_offset: usize,
    request: Request,
    response: Response,
    head_request: bool,
    message_started: bool,
    pending_body: Option<Body>,
    error: Option<String>,
}

impl<T: Transport> HttpConnection<T> {
    /// Creates the server side, ready to read the first request.
    pub fn server(transport: T, config: HttpConfig) -> Self {
        let mut connection = Self::new(transport, config, Role::Server, ConnectionState::Idle);
        connection.begin_reading(ConnectionState::ServerReadingRequest);
        connection
    }

    /// Creates the client side, idle until a request is submitted.
    pub fn client(transport: T, config: HttpConfig) -> Self {
        Self::new(transport, config, Role::Client, ConnectionState::Idle)
    }

    fn new(transport: T, config: HttpConfig, role: Role, state: ConnectionState) -> Self {
        Self {
            transport,
            config,
            role,
            state,
            parser: MessageParser::new(config.parser),
            writer: MessageWriter::new(config.max_chunk_size),
            read_buf: BytesMut::with_capacity(config.read_buffer_size),
            write_offset: 0,
            request: Request::default(),
            response: Response::default(),
            head_request: false,
            message_started: false,
            pending_body: None,
            error: None,
        }
    }

    #[inline]
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    #[inline]
    pub fn role(&self) -> Role {
        self.role
    }

    #[inline]
    pub fn config(&self) -> &HttpConfig {
        &self.config
    }

    /// Description of the error that moved the connection into [`ConnectionState::Error`].
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Received bytes not consumed by any message yet.
    pub fn buffered(&self) -> &[u8] {
        &self.read_buf
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Closes the transport. The connection stays [`ConnectionState::Closed`].
    pub fn close(&mut self) {
        if self.state != ConnectionState::Closed {
            debug!(state = ?self.state, "closing http connection");
            self.transport.close();
            self.state = ConnectionState::Closed;
        }
    }

    /// Gives up the connection, handing over the transport and the bytes received past the
    /// last message, as needed by a protocol upgrade.
    pub fn into_parts(self) -> (T, BytesMut) {
        (self.transport, self.read_buf)
    }

    /// Routes the body of the next incoming message into `sink` instead of memory.
    ///
    /// The sink is installed when that message starts arriving: the next request on a server,
    /// the next response on a client. The message handed out afterwards carries it as
    /// [`Body::Sink`].
    pub fn set_body_sink<S: BodySink + 'static>(&mut self, sink: S) {
        self.pending_body = Some(Body::from_sink(sink));
    }

    /// Submits a request. Valid while the client is idle or once the previous response was
    /// read.
    pub fn send_request(&mut self, request: Request) -> Result<(), HttpError> {
        if !matches!(self.state, ConnectionState::Idle | ConnectionState::ClientReadingResponseComplete) {
            return Err(HttpError::invalid_state("send_request", self.state));
        }

        self.request = request;
        self.head_request = self.request.method() == Method::HEAD;
        self.start_writing(ConnectionState::ClientWritingRequest)
    }

    /// Hands out the parsed response.
    pub fn take_response(&mut self) -> Result<Response, HttpError> {
        if self.state != ConnectionState::ClientReadingResponseComplete {
            return Err(HttpError::invalid_state("take_response", self.state));
        }
        self.state = ConnectionState::Idle;
        Ok(mem::take(&mut self.response))
    }

    /// Hands out the parsed request.
    pub fn take_request(&mut self) -> Result<Request, HttpError> {
        if self.state != ConnectionState::ServerReadingRequestComplete {
            return Err(HttpError::invalid_state("take_request", self.state));
        }
        Ok(mem::take(&mut self.request))
    }

    /// Submits the response to the request just read.
    pub fn send_response(&mut self, response: Response) -> Result<(), HttpError> {
        if self.state != ConnectionState::ServerReadingRequestComplete {
            return Err(HttpError::invalid_state("send_response", self.state));
        }

        self.response = response;
        self.start_writing(ConnectionState::ServerWritingResponse)
    }

    /// Rearms the server for the next request on the same connection. Bytes of pipelined
    /// requests already received are parsed first.
    pub fn next_request(&mut self) -> Result<(), HttpError> {
        if self.state != ConnectionState::ServerWritingResponseComplete {
            return Err(HttpError::invalid_state("next_request", self.state));
        }

        self.request.clear();
        self.response.clear();
        self.begin_reading(ConnectionState::ServerReadingRequest);
        Ok(())
    }

    /// Advances the current phase.
    ///
    /// - `Poll::Pending`: the transport would block or timed out, call again later
    /// - `Poll::Ready(Ok(()))`: the current phase is complete, see [`state`](Self::state)
    /// - `Poll::Ready(Err(_))`: the connection is in [`ConnectionState::Error`] or
    ///   [`ConnectionState::Closed`]
    pub fn process(&mut self) -> Poll<Result<(), HttpError>> {
        match self.state {
            ConnectionState::ServerReadingRequest | ConnectionState::ClientReadingResponse => self.poll_read(),

            ConnectionState::ServerWritingResponse | ConnectionState::ClientWritingRequest => self.poll_write(),

            ConnectionState::ClientWritingRequestComplete => {
                self.begin_reading(ConnectionState::ClientReadingResponse);
                self.poll_read()
            }

            ConnectionState::Idle
            | ConnectionState::ServerReadingRequestComplete
            | ConnectionState::ServerWritingResponseComplete
            | ConnectionState::ClientReadingResponseComplete => Poll::Ready(Ok(())),

            ConnectionState::Error => Poll::Ready(Err(HttpError::invalid_state("process", self.state))),

            ConnectionState::Closed => Poll::Ready(Err(HttpError::Closed)),
        }
    }

    fn start_writing(&mut self, next_state: ConnectionState) -> Result<(), HttpError> {
        let skip_body = self.role == Role::Server && self.head_request;
        let max_chunk_size = self.config.max_chunk_size;
        let message: &mut dyn Message = match self.role {
            Role::Server => &mut self.response,
            Role::Client => &mut self.request,
        };

        let result = prepare_outgoing(message, max_chunk_size).and_then(|()| {
            let mut source = OutgoingMessage::new(message, skip_body);
            self.writer.start_streaming(&mut source)
        });
        if let Err(e) = result {
            return Err(self.fail(e.into()));
        }

        debug!(role = ?self.role, ?next_state, "start writing message");
        self.write_offset = 0;
        self.state = next_state;
        Ok(())
    }

    fn begin_reading(&mut self, next_state: ConnectionState) {
        self.parser.initialize(self.role == Role::Client || self.config.trailing_bytes_as_body);
        self.message_started = false;
        self.state = next_state;
        trace!(?next_state, buffered = self.read_buf.len(), "start reading message");
    }

    fn poll_read(&mut self) -> Poll<Result<(), HttpError>> {
        let mut did_read = false;

        loop {
            match self.feed_parser() {
                Ok(true) => return Poll::Ready(Ok(self.finish_reading())),
                Ok(false) => {}
                Err(e) => return Poll::Ready(Err(self.fail(e.into()))),
            }

            if did_read && self.config.read_strategy == ReadStrategy::Once {
                return Poll::Pending;
            }

            let start = self.read_buf.len();
            self.read_buf.resize(start + self.config.read_buffer_size, 0);
            let status = self.transport.read(&mut self.read_buf[start..]);
            let read = match &status {
                IoStatus::Ready(n) => *n,
                _ => 0,
            };
            self.read_buf.truncate(start + read);

            match status {
                IoStatus::Ready(0) | IoStatus::WouldBlock | IoStatus::TimedOut => return Poll::Pending,
                IoStatus::Ready(n) => {
                    trace!(read = n, "read from transport");
                    did_read = true;
                }
                IoStatus::Closed => return Poll::Ready(self.on_transport_closed()),
                IoStatus::Failed(e) => return Poll::Ready(Err(self.fail(HttpError::transport(e)))),
            }
        }
    }

    /// Feeds the buffered bytes to the parser, returns true once the message is complete.
    fn feed_parser(&mut self) -> Result<bool, ParseError> {
        let head_request = self.role == Role::Client && self.head_request;
        let message: &mut dyn Message = match self.role {
            Role::Server => &mut self.request,
            Role::Client => &mut self.response,
        };
        if !self.message_started
            && let Some(body) = self.pending_body.take()
        {
            *message.parts_mut().1 = body;
        }
        let mut handler = IncomingMessage::new(message);

        if !self.read_buf.is_empty() {
            self.message_started = true;
        }

        loop {
            let used = self.parser.insert_data(&self.read_buf, &mut handler)?;
            self.read_buf.advance(used);

            match self.parser.state() {
                ParserState::Complete => return Ok(true),
                ParserState::ReadingHeadersReady | ParserState::ReadingHeadersReadyApplyNextBodyState => {
                    if head_request || !handler.may_have_body() {
                        self.parser.set_expect_body(false);
                    }
                    self.parser.apply_body_state(&mut handler)?;
                }
                _ if used == 0 || self.read_buf.is_empty() => return Ok(false),
                _ => {}
            }
        }
    }

    fn finish_reading(&mut self) {
        self.state = match self.role {
            Role::Server => {
                self.head_request = self.request.method() == Method::HEAD;
                ConnectionState::ServerReadingRequestComplete
            }
            Role::Client => ConnectionState::ClientReadingResponseComplete,
        };
        debug!(state = ?self.state, leftover = self.read_buf.len(), "message read");
    }

    fn on_transport_closed(&mut self) -> Result<(), HttpError> {
        if self.role == Role::Server && self.parser.state() == ParserState::ReadingFirstLine && !self.message_started {
            debug!("peer closed the connection between requests");
            self.transport.close();
            self.state = ConnectionState::Closed;
            return Err(HttpError::Closed);
        }

        let message: &mut dyn Message = match self.role {
            Role::Server => &mut self.request,
            Role::Client => &mut self.response,
        };
        let mut handler = IncomingMessage::new(message);
        match self.parser.connection_closed(&mut handler) {
            Ok(()) => {
                self.finish_reading();
                Ok(())
            }
            Err(e) => Err(self.fail(e.into())),
        }
    }

    fn poll_write(&mut self) -> Poll<Result<(), HttpError>> {
        loop {
            let Some(piece) = self.writer.data() else {
                return Poll::Ready(Ok(self.finish_writing()));
            };
            let piece_len = piece.len();
            let status = self.transport.write(&piece[self.write_offset..]);

            match status {
                IoStatus::Ready(0) | IoStatus::WouldBlock | IoStatus::TimedOut => return Poll::Pending,
                IoStatus::Ready(n) => {
                    trace!(written = n, piece_len, offset = self.write_offset, "wrote to transport");
                    self.write_offset += n;
                    if self.write_offset >= piece_len {
                        self.write_offset = 0;
                        if let Err(e) = self.advance_writer() {
                            return Poll::Ready(Err(self.fail(e.into())));
                        }
                    }
                }
                IoStatus::Closed => {
                    let e = SendError::io(io::Error::from(io::ErrorKind::BrokenPipe));
                    return Poll::Ready(Err(self.fail(e.into())));
                }
                IoStatus::Failed(e) => return Poll::Ready(Err(self.fail(HttpError::transport(e)))),
            }
        }
    }

    fn advance_writer(&mut self) -> Result<(), SendError> {
        let skip_body = self.role == Role::Server && self.head_request;
        let message: &mut dyn Message = match self.role {
            Role::Server => &mut self.response,
            Role::Client => &mut self.request,
        };
        self.writer.next(&mut OutgoingMessage::new(message, skip_body))
    }

    fn finish_writing(&mut self) {
        self.state = match self.role {
            Role::Server => ConnectionState::ServerWritingResponseComplete,
            Role::Client => ConnectionState::ClientWritingRequestComplete,
        };
        debug!(state = ?self.state, "message written");
    }

    fn fail(&mut self, e: HttpError) -> HttpError {
        error!(role = ?self.role, state = ?self.state, cause = %e, "http connection failed");
        self.state = ConnectionState::Error;
        self.error = Some(e.to_string());
        e
    }
}

impl HttpConnection<TokioTransport> {
    /// Calls [`process`](Self::process) until the current phase is done, awaiting socket
    /// readiness whenever it returns `Poll::Pending`.
    pub async fn drive(&mut self) -> Result<(), HttpError> {
        loop {
            match self.process() {
                Poll::Ready(result) => return result,
                Poll::Pending => {
                    let interest = if self.state.is_writing() { Interest::WRITABLE } else { Interest::READABLE };
                    self.transport.ready(interest).await.map_err(HttpError::transport)?;
                }
            }
        }
    }
}
