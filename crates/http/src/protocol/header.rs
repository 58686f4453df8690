//! Header level helpers shared by the parser, the writer and the message types.
//!
//! Every byte that ends up inside a stored header name or value must be printable ASCII,
//! a horizontal tab or a space. CR and LF only ever appear as line delimiters on the wire.

use http::{HeaderMap, HeaderName, HeaderValue};

use crate::protocol::{ParseError, SendError};

/// Returns true if `byte` may appear in a header line or first line.
///
/// obs-text (0x80 and above) is rejected, so every stored value is valid ASCII.
#[inline]
#[must_use]
pub fn is_header_safe_byte(byte: u8) -> bool {
    matches!(byte, b'\t' | b' '..=b'~')
}

/// Returns true if every byte in `line` is header safe.
#[inline]
#[must_use]
pub fn is_header_safe(line: &[u8]) -> bool {
    line.iter().all(|&b| is_header_safe_byte(b))
}

/// Checks if the Transfer-Encoding header value selects chunked encoding.
///
/// According to RFC 7230, chunked must be the last encoding if present. Any other final
/// coding can't be framed by this engine.
pub(crate) fn is_chunked(value: &[u8]) -> Result<bool, ParseError> {
    const CHUNKED: &[u8] = b"chunked";
    match value.rsplit(|b| *b == b',').next() {
        Some(last) if last.trim_ascii().eq_ignore_ascii_case(CHUNKED) => Ok(true),
        Some(last) if last.trim_ascii().eq_ignore_ascii_case(b"identity") => Ok(false),
        _ => Err(ParseError::unsupported_transfer_encoding(String::from_utf8_lossy(value))),
    }
}

/// Parses a Content-Length value.
pub(crate) fn parse_content_length(value: &[u8]) -> Result<u64, ParseError> {
    let trimmed = value.trim_ascii();
    if trimmed.is_empty() || !trimmed.iter().all(u8::is_ascii_digit) {
        return Err(ParseError::invalid_content_length(format!("value {} is not u64", String::from_utf8_lossy(value))));
    }

    std::str::from_utf8(trimmed)
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .ok_or_else(|| ParseError::invalid_content_length(format!("value {} overflows u64", String::from_utf8_lossy(value))))
}

/// Builds a typed header pair from parsed text.
pub(crate) fn to_header_pair(name: &str, value: &str) -> Result<(HeaderName, HeaderValue), ParseError> {
    let header_name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| ParseError::invalid_header(format!("name {name:?}: {e}")))?;
    let header_value = HeaderValue::from_str(value).map_err(|e| ParseError::invalid_header(format!("value of {name}: {e}")))?;
    Ok((header_name, header_value))
}

/// Verifies that every header of an outgoing message can be put on the wire untouched.
pub(crate) fn validate_outgoing(headers: &HeaderMap) -> Result<(), SendError> {
    for (name, value) in headers {
        if !is_header_safe(value.as_bytes()) {
            return Err(SendError::invalid_header(format!("value of {name} contains unsafe bytes")));
        }
    }
    Ok(())
}

/// Returns true if the comma separated header value contains `token`, ignoring ASCII case.
#[must_use]
pub fn contains_token(value: &HeaderValue, token: &str) -> bool {
    value.as_bytes().split(|b| *b == b',').any(|item| item.trim_ascii().eq_ignore_ascii_case(token.as_bytes()))
}
