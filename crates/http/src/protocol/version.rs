use http::Version;

use crate::protocol::ParseError;

/// Parses the textual HTTP version used on the first line of a message.
///
/// Only HTTP/1.0 and HTTP/1.1 are accepted, HTTP/2 and HTTP/3 are framed differently.
pub fn parse_version(text: &str) -> Result<Version, ParseError> {
    match text {
        "HTTP/1.1" => Ok(Version::HTTP_11),
        "HTTP/1.0" => Ok(Version::HTTP_10),
        other => Err(ParseError::InvalidVersion(other.to_string())),
    }
}

/// The wire representation of a supported version.
#[must_use]
pub fn version_str(version: Version) -> &'static str {
    if version == Version::HTTP_10 { "HTTP/1.0" } else { "HTTP/1.1" }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_known_versions() {
        assert_eq!(parse_version("HTTP/1.1").unwrap(), Version::HTTP_11);
        assert_eq!(parse_version("HTTP/1.0").unwrap(), Version::HTTP_10);
        assert!(matches!(parse_version("HTTP/2"), Err(ParseError::InvalidVersion(v)) if v == "HTTP/2"));
        assert!(parse_version("http/1.1").is_err());
    }
}
