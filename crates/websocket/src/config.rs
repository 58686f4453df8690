use micro_wire_http::config::{DEFAULT_READ_BUFFER_SIZE, HttpConfig};

use crate::codec::DEFAULT_MAX_FRAME_SIZE;

/// Settings of a [`WebSocketConnection`](crate::WebSocketConnection).
///
/// ```
/// use micro_wire_ws::WebSocketConfig;
///
/// let config = WebSocketConfig::default().with_max_frame_size(64 * 1024).with_subprotocol("chat");
/// assert_eq!(config.max_frame_size, 65536);
/// assert_eq!(config.subprotocols, ["chat"]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebSocketConfig {
    /// Frames with a larger payload are rejected before it is read.
    pub max_frame_size: usize,
    pub read_buffer_size: usize,
    /// Subprotocols a client offers, or a server accepts, in order of preference.
    pub subprotocols: Vec<String>,
    /// Settings of the HTTP connection carrying the handshake.
    pub http: HttpConfig,
}

impl Default for WebSocketConfig {
    fn default() -> Self {
        Self {
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
            subprotocols: Vec::new(),
            http: HttpConfig::default(),
        }
    }
}

impl WebSocketConfig {
    #[must_use]
    pub fn with_max_frame_size(mut self, max_frame_size: usize) -> Self {
        self.max_frame_size = max_frame_size;
        self
    }

    #[must_use]
    pub fn with_read_buffer_size(mut self, read_buffer_size: usize) -> Self {
        self.read_buffer_size = read_buffer_size.max(1);
        self
    }

    #[must_use]
    pub fn with_subprotocol(mut self, protocol: impl Into<String>) -> Self {
        self.subprotocols.push(protocol.into());
        self
    }

    #[must_use]
    pub fn with_http(mut self, http: HttpConfig) -> Self {
        self.http = http;
        self
    }
}
