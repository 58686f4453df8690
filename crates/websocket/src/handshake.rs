//! The opening handshake, RFC 6455 section 4.
//!
//! Pure functions over [`Request`] and [`Response`]. The connection drives them through an
//! embedded HTTP connection.

use base64::prelude::*;
use http::header::{CONNECTION, SEC_WEBSOCKET_ACCEPT, SEC_WEBSOCKET_KEY, SEC_WEBSOCKET_PROTOCOL, SEC_WEBSOCKET_VERSION, UPGRADE};
use http::{HeaderValue, Method, StatusCode};
use micro_wire_http::protocol::header::contains_token;
use micro_wire_http::protocol::{Request, Response, SendError};
use sha1::{Digest, Sha1};
use tracing::debug;

use crate::entropy::Entropy;
use crate::error::HandshakeError;

pub const WEBSOCKET_GUID: &str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

pub const WEBSOCKET_VERSION: &str = "13";

/// `Sec-WebSocket-Accept` value for `key`.
///
/// ```
/// use micro_wire_ws::handshake::accept_key;
///
/// assert_eq!(accept_key("dGhlIHNhbXBsZSBub25jZQ=="), "s3pPLMBiTxaQ9kYGzzhZRbK+xOo=");
/// ```
pub fn accept_key(key: &str) -> String {
    let mut sha1 = Sha1::new();
    sha1.update(key.as_bytes());
    sha1.update(WEBSOCKET_GUID.as_bytes());
    BASE64_STANDARD.encode(sha1.finalize())
}

/// A fresh `Sec-WebSocket-Key`: 16 random bytes, Base64 encoded.
pub fn generate_key(entropy: &Entropy) -> String {
    BASE64_STANDARD.encode(entropy.nonce())
}

/// The upgrade request a client sends.
pub fn client_request(path: &str, host: Option<&str>, key: &str, protocols: &[String]) -> Result<Request, SendError> {
    let mut request = Request::get(path);
    if let Some(host) = host {
        request.set_header("Host", host)?;
    }
    request.set_header("Upgrade", "websocket")?;
    request.set_header("Connection", "Upgrade")?;
    request.set_header("Sec-WebSocket-Key", key)?;
    request.set_header("Sec-WebSocket-Version", WEBSOCKET_VERSION)?;
    if !protocols.is_empty() {
        request.set_header("Sec-WebSocket-Protocol", &protocols.join(", "))?;
    }
    Ok(request)
}

/// Checks the server's answer to a request carrying `key` and offering `offered`. Returns the
/// subprotocol the server selected.
pub fn verify_response(response: &Response, key: &str, offered: &[String]) -> Result<Option<String>, HandshakeError> {
    if response.status() != StatusCode::SWITCHING_PROTOCOLS {
        return Err(HandshakeError::InvalidStatus(response.status().as_u16()));
    }

    check_upgrade_headers(response.header(UPGRADE), response.header(CONNECTION))?;

    let accept = response.header(SEC_WEBSOCKET_ACCEPT).ok_or(HandshakeError::MissingHeader("sec-websocket-accept"))?;
    if accept.as_bytes() != accept_key(key).as_bytes() {
        return Err(HandshakeError::AcceptMismatch);
    }

    let Some(protocol) = response.header(SEC_WEBSOCKET_PROTOCOL) else {
        return Ok(None);
    };
    let protocol = header_str("sec-websocket-protocol", protocol)?;
    if !offered.iter().any(|p| p == protocol) {
        return Err(HandshakeError::UnexpectedProtocol(protocol.to_string()));
    }
    Ok(Some(protocol.to_string()))
}

/// A request that passed [`validate_request`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Accepted {
    pub key: String,
    /// The subprotocol to confirm, if any
    pub protocol: Option<String>,
}

/// Checks an upgrade request.
///
/// The subprotocol is the first one the client offers that appears in `supported`. An empty
/// `supported` list accepts the first offered one.
pub fn validate_request(request: &Request, supported: &[String]) -> Result<Accepted, HandshakeError> {
    if request.method() != Method::GET {
        return Err(HandshakeError::InvalidMethod(request.method().to_string()));
    }

    check_upgrade_headers(request.header(UPGRADE), request.header(CONNECTION))?;

    let version = request.header(SEC_WEBSOCKET_VERSION).ok_or(HandshakeError::MissingHeader("sec-websocket-version"))?;
    if version.as_bytes().trim_ascii() != WEBSOCKET_VERSION.as_bytes() {
        return Err(HandshakeError::UnsupportedVersion(String::from_utf8_lossy(version.as_bytes()).into_owned()));
    }

    let key = request.header(SEC_WEBSOCKET_KEY).ok_or(HandshakeError::MissingHeader("sec-websocket-key"))?;
    let key = header_str("sec-websocket-key", key)?.trim();
    match BASE64_STANDARD.decode(key) {
        Ok(nonce) if nonce.len() == 16 => {}
        _ => return Err(HandshakeError::invalid_header("sec-websocket-key", key)),
    }

    let protocol = match request.header(SEC_WEBSOCKET_PROTOCOL) {
        Some(value) => header_str("sec-websocket-protocol", value)?
            .split(',')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .find(|p| supported.is_empty() || supported.iter().any(|s| s == p))
            .map(str::to_string),
        None => None,
    };

    debug!(path = request.path(), ?protocol, "websocket upgrade request accepted");
    Ok(Accepted { key: key.to_string(), protocol })
}

/// The `101 Switching Protocols` reply to an accepted request.
pub fn accept_response(accepted: &Accepted) -> Result<Response, SendError> {
    let mut response = Response::new(StatusCode::SWITCHING_PROTOCOLS);
    response.set_header("Upgrade", "websocket")?;
    response.set_header("Connection", "Upgrade")?;
    response.set_header("Sec-WebSocket-Accept", &accept_key(&accepted.key))?;
    if let Some(protocol) = &accepted.protocol {
        response.set_header("Sec-WebSocket-Protocol", protocol)?;
    }
    Ok(response)
}

/// The `400 Bad Request` reply to a rejected request.
pub fn reject_response(error: &HandshakeError) -> Response {
    let mut response = Response::new(StatusCode::BAD_REQUEST).with_body(error.to_string());
    if matches!(error, HandshakeError::UnsupportedVersion(_)) {
        response.headers_mut().insert(SEC_WEBSOCKET_VERSION, HeaderValue::from_static(WEBSOCKET_VERSION));
    }
    response
}

fn check_upgrade_headers(upgrade: Option<&HeaderValue>, connection: Option<&HeaderValue>) -> Result<(), HandshakeError> {
    let upgrade = upgrade.ok_or(HandshakeError::MissingHeader("upgrade"))?;
    if !contains_token(upgrade, "websocket") {
        return Err(HandshakeError::invalid_header("upgrade", String::from_utf8_lossy(upgrade.as_bytes())));
    }

    let connection = connection.ok_or(HandshakeError::MissingHeader("connection"))?;
    if !contains_token(connection, "upgrade") {
        return Err(HandshakeError::invalid_header("connection", String::from_utf8_lossy(connection.as_bytes())));
    }
    Ok(())
}

fn header_str<'a>(name: &'static str, value: &'a HeaderValue) -> Result<&'a str, HandshakeError> {
    value.to_str().map_err(|_| HandshakeError::invalid_header(name, String::from_utf8_lossy(value.as_bytes())))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upgrade_request() -> Request {
        client_request("/chat", Some("example.com"), "dGhlIHNhbXBsZSBub25jZQ==", &[]).unwrap()
    }

    #[test]
    fn rfc_accept_vector() {
        assert_eq!(accept_key("dGhlIHNhbXBsZSBub25jZQ=="), "s3pPLMBiTxaQ9kYGzzhZRbK+xOo=");
    }

    #[test]
    fn generated_key_is_sixteen_bytes() {
        let key = generate_key(&Entropy::from_seed(3));
        assert_eq!(BASE64_STANDARD.decode(&key).unwrap().len(), 16);
        assert_eq!(key.len(), 24);
    }

    #[test]
    fn client_request_headers() {
        let request = client_request("/chat", Some("example.com"), "abc", &["chat".to_string(), "superchat".to_string()]).unwrap();
        assert_eq!(request.method(), Method::GET);
        assert_eq!(request.header("upgrade").unwrap(), "websocket");
        assert_eq!(request.header("connection").unwrap(), "Upgrade");
        assert_eq!(request.header("sec-websocket-version").unwrap(), "13");
        assert_eq!(request.header("sec-websocket-protocol").unwrap(), "chat, superchat");
        assert_eq!(request.header("host").unwrap(), "example.com");
    }

    #[test]
    fn accepts_valid_request() {
        let accepted = validate_request(&upgrade_request(), &[]).unwrap();
        assert_eq!(accepted.key, "dGhlIHNhbXBsZSBub25jZQ==");
        assert_eq!(accepted.protocol, None);

        let response = accept_response(&accepted).unwrap();
        assert_eq!(response.status(), StatusCode::SWITCHING_PROTOCOLS);
        assert_eq!(response.header("sec-websocket-accept").unwrap(), "s3pPLMBiTxaQ9kYGzzhZRbK+xOo=");
    }

    #[test]
    fn header_tokens_are_case_insensitive() {
        let mut request = upgrade_request();
        request.set_header("Upgrade", "WebSocket").unwrap();
        request.set_header("Connection", "keep-alive, Upgrade").unwrap();
        assert!(validate_request(&request, &[]).is_ok());
    }

    #[test]
    fn rejects_malformed_requests() {
        let mut request = upgrade_request();
        request.set_method(Method::POST);
        assert!(matches!(validate_request(&request, &[]), Err(HandshakeError::InvalidMethod(_))));

        let mut request = upgrade_request();
        request.remove_header(&UPGRADE);
        assert!(matches!(validate_request(&request, &[]), Err(HandshakeError::MissingHeader("upgrade"))));

        let mut request = upgrade_request();
        request.set_header("Connection", "keep-alive").unwrap();
        assert!(matches!(validate_request(&request, &[]), Err(HandshakeError::InvalidHeader { name: "connection", .. })));

        let mut request = upgrade_request();
        request.set_header("Sec-WebSocket-Version", "8").unwrap();
        let error = validate_request(&request, &[]).unwrap_err();
        assert!(matches!(error, HandshakeError::UnsupportedVersion(_)));
        let rejection = reject_response(&error);
        assert_eq!(rejection.status(), StatusCode::BAD_REQUEST);
        assert_eq!(rejection.header("sec-websocket-version").unwrap(), "13");

        let mut request = upgrade_request();
        request.set_header("Sec-WebSocket-Key", "c2hvcnQ=").unwrap();
        assert!(matches!(validate_request(&request, &[]), Err(HandshakeError::InvalidHeader { name: "sec-websocket-key", .. })));
    }

    #[test]
    fn subprotocol_selection() {
        let mut request = upgrade_request();
        request.set_header("Sec-WebSocket-Protocol", "v1.chat, v2.chat").unwrap();

        assert_eq!(validate_request(&request, &[]).unwrap().protocol.as_deref(), Some("v1.chat"));
        let supported = vec!["v2.chat".to_string()];
        assert_eq!(validate_request(&request, &supported).unwrap().protocol.as_deref(), Some("v2.chat"));
        let supported = vec!["other".to_string()];
        assert_eq!(validate_request(&request, &supported).unwrap().protocol, None);
    }

    #[test]
    fn verifies_server_response() {
        let key = "dGhlIHNhbXBsZSBub25jZQ==";
        let accepted = Accepted { key: key.to_string(), protocol: Some("chat".to_string()) };
        let response = accept_response(&accepted).unwrap();

        let offered = vec!["chat".to_string()];
        assert_eq!(verify_response(&response, key, &offered).unwrap().as_deref(), Some("chat"));
        assert!(matches!(verify_response(&response, key, &[]), Err(HandshakeError::UnexpectedProtocol(_))));
        assert!(matches!(verify_response(&response, "b3RoZXIga2V5IGhlcmUhIQ==", &offered), Err(HandshakeError::AcceptMismatch)));

        let denied = Response::new(StatusCode::FORBIDDEN);
        assert!(matches!(verify_response(&denied, key, &[]), Err(HandshakeError::InvalidStatus(403))));
    }
}
