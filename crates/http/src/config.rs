//! Connection level configuration.

use crate::codec::{DEFAULT_MAX_CHUNK_SIZE, ParserConfig};
use crate::connection::ReadStrategy;

/// Default number of bytes requested from the transport per read.
pub const DEFAULT_READ_BUFFER_SIZE: usize = 8 * 1024;

/// Settings of an [`HttpConnection`](crate::connection::HttpConnection).
///
/// ```
/// use micro_wire_http::config::HttpConfig;
/// use micro_wire_http::connection::ReadStrategy;
///
/// let config = HttpConfig::default().with_max_chunk_size(4096).with_read_strategy(ReadStrategy::Once);
/// assert_eq!(config.max_chunk_size, 4096);
/// assert_eq!(config.parser.max_header_count, 64);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpConfig {
    pub read_buffer_size: usize,
    /// Bodies larger than this, or of unknown size, are sent chunked.
    pub max_chunk_size: usize,
    pub read_strategy: ReadStrategy,
    /// A server reads the body of a request without Content-Length or chunked encoding until
    /// the peer closes. Responses are always read this way.
    pub trailing_bytes_as_body: bool,
    pub parser: ParserConfig,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
            max_chunk_size: DEFAULT_MAX_CHUNK_SIZE,
            read_strategy: ReadStrategy::UntilWouldBlock,
            trailing_bytes_as_body: false,
            parser: ParserConfig::default(),
        }
    }
}

impl HttpConfig {
    #[must_use]
    pub fn with_read_buffer_size(mut self, read_buffer_size: usize) -> Self {
        self.read_buffer_size = read_buffer_size.max(1);
        self
    }

    #[must_use]
    pub fn with_max_chunk_size(mut self, max_chunk_size: usize) -> Self {
        self.max_chunk_size = max_chunk_size.max(1);
        self
    }

    #[must_use]
    pub fn with_read_strategy(mut self, read_strategy: ReadStrategy) -> Self {
        self.read_strategy = read_strategy;
        self
    }

    #[must_use]
    pub fn with_trailing_bytes_as_body(mut self, trailing_bytes_as_body: bool) -> Self {
        self.trailing_bytes_as_body = trailing_bytes_as_body;
        self
    }

    #[must_use]
    pub fn with_parser(mut self, parser: ParserConfig) -> Self {
        self.parser = parser;
        self
    }
}
