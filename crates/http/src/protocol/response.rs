use http::{HeaderMap, HeaderName, HeaderValue, StatusCode, Version};

use crate::protocol::header::{is_header_safe, to_header_pair};
use crate::protocol::version::{parse_version, version_str};
use crate::protocol::{Body, ParseError, SendError};

/// An HTTP response: status line, headers and body.
#[derive(Debug)]
pub struct Response {
    version: Version,
    status: StatusCode,
    reason: Option<String>,
    headers: HeaderMap,
    body: Body,
}

impl Default for Response {
    fn default() -> Self {
        Self { version: Version::HTTP_11, status: StatusCode::OK, reason: None, headers: HeaderMap::new(), body: Body::Empty }
    }
}

impl Response {
    pub fn new(status: StatusCode) -> Self {
        Self { status, ..Self::default() }
    }

    pub fn ok(body: impl Into<Body>) -> Self {
        Self::new(StatusCode::OK).with_body(body)
    }

    #[must_use]
    pub fn with_body(mut self, body: impl Into<Body>) -> Self {
        self.body = body.into();
        self
    }

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
    pub fn status(&self) -> StatusCode {
        self.status
    }

    #[inline]
    pub fn version(&self) -> Version {
        self.version
    }

    /// The reason phrase, falling back to the canonical one for the status.
    pub fn reason(&self) -> &str {
        self.reason.as_deref().or_else(|| self.status.canonical_reason()).unwrap_or("")
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

    pub fn set_status(&mut self, status: StatusCode) {
        self.status = status;
    }

    pub fn set_reason(&mut self, reason: impl Into<String>) {
        self.reason = Some(reason.into());
    }

    pub fn set_version(&mut self, version: Version) {
        self.version = version;
    }

    /// The status line without its trailing CRLF.
    pub fn first_line(&self) -> String {
        format!("{} {} {}", version_str(self.version), self.status.as_str(), self.reason())
    }

    /// Fills version, status and reason from a parsed status line.
    pub fn apply_first_line(&mut self, line: &str) -> Result<(), ParseError> {
        let mut parts = line.splitn(3, ' ');
        let (Some(version), Some(status)) = (parts.next(), parts.next()) else {
            return Err(ParseError::invalid_first_line(format!("malformed status line {line:?}")));
        };

        self.version = parse_version(version)?;
        if status.len() != 3 {
            return Err(ParseError::InvalidStatus(status.to_string()));
        }
        self.status = StatusCode::from_bytes(status.as_bytes()).map_err(|_| ParseError::InvalidStatus(status.to_string()))?;
        self.reason = parts.next().map(str::to_string);
        Ok(())
    }

    /// Statuses that never carry a body, whatever the headers say.
    pub fn is_bodyless_status(&self) -> bool {
        self.status.is_informational() || self.status == StatusCode::NO_CONTENT || self.status == StatusCode::NOT_MODIFIED
    }

    pub(crate) fn insert_parsed_header(&mut self, name: &str, value: &str) -> Result<(), ParseError> {
        let (name, value) = to_header_pair(name, value)?;
        self.headers.insert(name, value);
        Ok(())
    }

    pub(crate) fn validate_first_line(&self) -> Result<(), SendError> {
        if !is_header_safe(self.reason().as_bytes()) {
            return Err(SendError::invalid_header(format!("invalid reason phrase {:?}", self.reason())));
        }
        Ok(())
    }

    pub(crate) fn parts_mut(&mut self) -> (&mut HeaderMap, &mut Body) {
        (&mut self.headers, &mut self.body)
    }

    pub(crate) fn may_have_body(&self) -> bool {
        !self.is_bodyless_status()
    }

    pub fn remove_header(&mut self, name: &HeaderName) -> Option<HeaderValue> {
        self.headers.remove(name)
    }

    /// Resets the response for reuse. Custom body sources or sinks stay installed.
    pub fn clear(&mut self) {
        self.version = Version::HTTP_11;
        self.status = StatusCode::OK;
        self.reason = None;
        self.headers.clear();
        self.body.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_status_line() {
        let mut response = Response::default();
        response.apply_first_line("HTTP/1.1 404 Not Found").unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(response.reason(), "Not Found");

        response.apply_first_line("HTTP/1.0 599 Custom Reason Here").unwrap();
        assert_eq!(response.version(), Version::HTTP_10);
        assert_eq!(response.status().as_u16(), 599);
        assert_eq!(response.reason(), "Custom Reason Here");
    }

    #[test]
    fn status_line_without_reason() {
        let mut response = Response::default();
        response.apply_first_line("HTTP/1.1 204").unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert_eq!(response.reason(), "No Content");
        assert!(response.is_bodyless_status());
    }

    #[test]
    fn reject_bad_status() {
        let mut response = Response::default();
        assert!(response.apply_first_line("HTTP/1.1").is_err());
        assert!(response.apply_first_line("HTTP/1.1 20 OK").is_err());
        assert!(response.apply_first_line("HTTP/1.1 abc OK").is_err());
    }

    #[test]
    fn first_line_uses_canonical_reason() {
        let response = Response::new(StatusCode::SWITCHING_PROTOCOLS);
        assert_eq!(response.first_line(), "HTTP/1.1 101 Switching Protocols");
    }
}
