//! HTTP request representation.
//!
//! A [`Request`] is filled once by a parser through [`Request::apply_first_line`] and the
//! header map, or built by the caller and handed to a writer. It can then be reused with
//! [`Request::clear`].

use http::{HeaderMap, HeaderName, HeaderValue, Method, Version};

use crate::protocol::header::{is_header_safe, to_header_pair};
use crate::protocol::version::{parse_version, version_str};
use crate::protocol::{Body, ParseError, SendError};

#[derive(Debug)]
pub struct Request {
    method: Method,
    path: String,
    version: Version,
    headers: HeaderMap,
    body: Body,
}

impl Default for Request {
    fn default() -> Self {
        Self { method: Method::GET, path: "/".to_string(), version: Version::HTTP_11, headers: HeaderMap::new(), body: Body::Empty }
    }
}

impl Request {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self { method, path: path.into(), ..Self::default() }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>, body: impl Into<Body>) -> Self {
        Self::new(Method::POST, path).with_body(body)
    }

    #[must_use]
    pub fn with_body(mut self, body: impl Into<Body>) -> Self {
        self.body = body.into();
        self
    }

    /// Sets a header, replacing every earlier value of the same name.
    pub fn with_header(mut self, name: &str, value: &str) -> Result<Self, SendError> {
        self.set_header(name, value)?;
        Ok(self)
    }

    /// Sets a header, replacing every earlier value of the same name.
    pub fn set_header(&mut self, name: &str, value: &str) -> Result<(), SendError> {
        let (name, value) = to_header_pair(name, value).map_err(|e| SendError::invalid_header(e.to_string()))?;
        self.headers.insert(name, value);
        Ok(())
    }

    #[inline]
    pub fn method(&self) -> &Method {
        &self.method
    }

    #[inline]
    pub fn path(&self) -> &str {
        &self.path
    }

    #[inline]
    pub fn version(&self) -> Version {
        self.version
    }

    #[inline]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    #[inline]
    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    pub fn header(&self, name: impl http::header::AsHeaderName) -> Option<&HeaderValue> {
        self.headers.get(name)
    }

    #[inline]
    pub fn body(&self) -> &Body {
        &self.body
    }

    #[inline]
    pub fn body_mut(&mut self) -> &mut Body {
        &mut self.body
    }

    pub fn set_body(&mut self, body: impl Into<Body>) {
        self.body = body.into();
    }

    pub fn set_method(&mut self, method: Method) {
        self.method = method;
    }

    pub fn set_path(&mut self, path: impl Into<String>) {
        self.path = path.into();
    }

    pub fn set_version(&mut self, version: Version) {
        self.version = version;
    }

    /// The request line without its trailing CRLF.
    pub fn first_line(&self) -> String {
        format!("{} {} {}", self.method, self.path, version_str(self.version))
    }

    /// Fills method, path and version from a parsed request line.
    pub fn apply_first_line(&mut self, line: &str) -> Result<(), ParseError> {
        let mut parts = line.splitn(3, ' ');
        let (Some(method), Some(path), Some(version)) = (parts.next(), parts.next(), parts.next()) else {
            return Err(ParseError::invalid_first_line(format!("malformed request line {line:?}")));
        };

        if path.is_empty() || version.contains(' ') {
            return Err(ParseError::invalid_first_line(format!("malformed request line {line:?}")));
        }

        self.method = Method::from_bytes(method.as_bytes()).map_err(|_| ParseError::InvalidMethod)?;
        self.path = path.to_string();
        self.version = parse_version(version)?;
        Ok(())
    }

    pub(crate) fn insert_parsed_header(&mut self, name: &str, value: &str) -> Result<(), ParseError> {
        let (name, value) = to_header_pair(name, value)?;
        self.headers.insert(name, value);
        Ok(())
    }

    pub(crate) fn validate_first_line(&self) -> Result<(), SendError> {
        if self.path.is_empty() || self.path.contains(' ') || !is_header_safe(self.path.as_bytes()) {
            return Err(SendError::invalid_header(format!("invalid request path {:?}", self.path)));
        }
        Ok(())
    }

    pub(crate) fn parts_mut(&mut self) -> (&mut HeaderMap, &mut Body) {
        (&mut self.headers, &mut self.body)
    }

    // a request body is always announced by its headers
    pub(crate) fn may_have_body(&self) -> bool {
        true
    }

    /// Resets the request for reuse. Custom body sources or sinks stay installed.
    pub fn clear(&mut self) {
        self.method = Method::GET;
        self.path = "/".to_string();
        self.version = Version::HTTP_11;
        self.headers.clear();
        self.body.clear();
    }

    pub fn remove_header(&mut self, name: &HeaderName) -> Option<HeaderValue> {
        self.headers.remove(name)
    }
}
