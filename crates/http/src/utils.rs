//! Utility macros and functions for the HTTP crate.
//!
//! This module provides helper macros and functions that are used internally
//! by the HTTP crate implementation.

/// A macro for early returns with an error if a condition is not met.
///
/// This is similar to the `assert!` macro, but returns an error instead of panicking.
/// It's useful for validation checks where you want to return early with an error
/// if some condition is not satisfied.
///
/// # Arguments
///
/// * `$predicate` - A boolean expression that should evaluate to true
/// * `$error` - The error value to return if the predicate is false
///
/// # Example
///
/// ```ignore
/// ensure!(header_count < max_header_count, ParseError::too_many_headers(max_header_count));
/// ```
macro_rules! ensure {
    ($predicate:expr, $error:expr) => {
        if !$predicate {
            return Err($error);
        }
    };
}

pub(crate) use ensure;

/// The line terminator used by every HTTP/1.1 framing element.
pub const CRLF: &[u8] = b"\r\n";

/// The separator between a header name and its value.
pub const HEADER_SEPARATOR: &[u8] = b": ";

/// Locates `pattern` inside `haystack`, starting the search at `from`.
///
/// Returns the absolute index of the first match, or `None` when the pattern does not occur
/// in `haystack[from..]`. An empty pattern never matches.
///
/// # Example
///
/// ```
/// use micro_wire_http::utils::find_pattern;
///
/// assert_eq!(find_pattern(b"Host: a\r\n", b"\r\n", 0), Some(7));
/// assert_eq!(find_pattern(b"Host: a\r\n", b": ", 5), None);
/// ```
#[must_use]
pub fn find_pattern(haystack: &[u8], pattern: &[u8], from: usize) -> Option<usize> {
    if pattern.is_empty() || from >= haystack.len() || haystack.len() - from < pattern.len() {
        return None;
    }

    let first = pattern[0];
    let last_start = haystack.len() - pattern.len();
    let mut index = from;
    while index <= last_start {
        match haystack[index..=last_start].iter().position(|&b| b == first) {
            Some(offset) => {
                let candidate = index + offset;
                if &haystack[candidate..candidate + pattern.len()] == pattern {
                    return Some(candidate);
                }
                index = candidate + 1;
            }
            None => return None,
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_crlf() {
        assert_eq!(find_pattern(b"GET / HTTP/1.1\r\nHost: a\r\n", CRLF, 0), Some(14));
        assert_eq!(find_pattern(b"GET / HTTP/1.1\r\nHost: a\r\n", CRLF, 15), Some(23));
    }

    #[test]
    fn respects_start_offset() {
        assert_eq!(find_pattern(b"a: b: c", HEADER_SEPARATOR, 0), Some(1));
        assert_eq!(find_pattern(b"a: b: c", HEADER_SEPARATOR, 2), Some(4));
    }

    #[test]
    fn no_match() {
        assert_eq!(find_pattern(b"abc\r", CRLF, 0), None);
        assert_eq!(find_pattern(b"", CRLF, 0), None);
        assert_eq!(find_pattern(b"abc", b"", 0), None);
        assert_eq!(find_pattern(b"\r\n", CRLF, 2), None);
    }

    #[test]
    fn match_at_the_very_end() {
        assert_eq!(find_pattern(b"xx\r\n", CRLF, 0), Some(2));
        assert_eq!(find_pattern(b"\r\r\n", CRLF, 0), Some(1));
    }
}
