//! CRLF line accumulation across arbitrarily fragmented input.

use bytes::BytesMut;

use crate::protocol::ParseError;
use crate::utils::{CRLF, ensure, find_pattern};

/// Collects one CRLF terminated line at a time.
///
/// Input is copied into a scratch window bounded by `max_line + 2` bytes. The CRLF search
/// restarts one byte before the previously scanned end, so a CR delivered by one call and the
/// LF delivered by the next are still recognised as a terminator. Bytes following the
/// terminator are never reported as consumed.
#[derive(Debug)]
pub(crate) struct LineBuffer {
    buf: BytesMut,
    scan_from: usize,
    max_line: usize,
}

impl LineBuffer {
    pub(crate) fn new(max_line: usize) -> Self {
        Self { buf: BytesMut::with_capacity(max_line.min(1024) + 2), scan_from: 0, max_line }
    }

    /// Bytes of the unfinished line held so far.
    #[inline]
    pub(crate) fn pending(&self) -> usize {
        self.buf.len()
    }

    pub(crate) fn clear(&mut self) {
        self.buf.clear();
        self.scan_from = 0;
    }

    /// Feeds `data` and returns the number of bytes consumed plus the completed line, without
    /// its CRLF, if one was found.
    pub(crate) fn next_line(&mut self, data: &[u8]) -> Result<(usize, Option<BytesMut>), ParseError> {
        let room = (self.max_line + 2).saturating_sub(self.buf.len());
        let take = data.len().min(room);
        self.buf.extend_from_slice(&data[..take]);

        match find_pattern(&self.buf, CRLF, self.scan_from.saturating_sub(1)) {
            Some(end) => {
                let mut line = self.buf.split_to(end + CRLF.len());
                line.truncate(end);
                // whatever follows the terminator came from this call and is handed back
                let leftover = self.buf.len();
                self.buf.clear();
                self.scan_from = 0;
                ensure!(line.len() <= self.max_line, ParseError::too_long_line(line.len(), self.max_line));
                Ok((take - leftover, Some(line)))
            }
            None => {
                self.scan_from = self.buf.len();
                // a trailing CR may still be waiting for its LF
                ensure!(self.buf.len() <= self.max_line + 1, ParseError::too_long_line(self.buf.len(), self.max_line));
                Ok((take, None))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whole_line_in_one_call() {
        let mut lines = LineBuffer::new(64);
        let (used, line) = lines.next_line(b"Host: a\r\nrest").unwrap();
        assert_eq!(used, 9);
        assert_eq!(&line.unwrap()[..], b"Host: a");
        assert_eq!(lines.pending(), 0);
    }

    #[test]
    fn crlf_split_across_calls() {
        let mut lines = LineBuffer::new(64);
        let (used, line) = lines.next_line(b"Host: a\r").unwrap();
        assert_eq!(used, 8);
        assert!(line.is_none());

        let (used, line) = lines.next_line(b"\nAccept: */*\r\n").unwrap();
        assert_eq!(used, 1);
        assert_eq!(&line.unwrap()[..], b"Host: a");
    }

    #[test]
    fn byte_by_byte() {
        let mut lines = LineBuffer::new(64);
        let input = b"abc\r\n";
        for (index, byte) in input.iter().enumerate() {
            let (used, line) = lines.next_line(std::slice::from_ref(byte)).unwrap();
            assert_eq!(used, 1);
            if index == input.len() - 1 {
                assert_eq!(&line.unwrap()[..], b"abc");
            } else {
                assert!(line.is_none());
            }
        }
    }

    #[test]
    fn empty_line() {
        let mut lines = LineBuffer::new(64);
        let (used, line) = lines.next_line(b"\r\nbody").unwrap();
        assert_eq!(used, 2);
        assert!(line.unwrap().is_empty());
    }

    #[test]
    fn line_too_long() {
        let mut lines = LineBuffer::new(4);
        assert!(lines.next_line(b"abcd").unwrap().1.is_none());
        assert!(lines.next_line(b"\r").unwrap().1.is_none());
        assert!(matches!(lines.next_line(b"x"), Err(ParseError::TooLongLine { .. })));

        let mut lines = LineBuffer::new(4);
        assert!(matches!(lines.next_line(b"abcdefgh\r\n"), Err(ParseError::TooLongLine { .. })));
    }
}
