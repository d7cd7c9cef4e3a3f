//! Line framing for the debug protocol
//!
//! The protocol is newline delimited:
//! ```text
//! >Line<[['/tmp/a.py', 10, 'main', '']]\n
//! program output\n
//! >EOT<\n
//! ```
//! Socket reads may split a line anywhere, so bytes are buffered until the
//! newline arrives. A `>EOT<` terminator only marks the end of a flush and
//! is stripped from the tail of a line.

use tracing::warn;

use super::literal::MAX_INPUT_LEN;
use super::tokens::EOT;

/// Longest partial line kept before it is handed on unterminated
pub const MAX_LINE_LEN: usize = MAX_INPUT_LEN + 4096;

/// Accumulates raw bytes and yields complete protocol lines
#[derive(Debug, Default)]
pub struct LineBuffer {
    buf: Vec<u8>,
    /// Bytes of `buf` already known to hold no newline
    scanned: usize,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append received bytes and return every line completed by them
    ///
    /// A partial line longer than [`MAX_LINE_LEN`] is returned as it is,
    /// so a client that never sends a newline cannot grow the buffer.
    pub fn push(&mut self, data: &[u8]) -> Vec<String> {
        self.buf.extend_from_slice(data);

        let mut lines = Vec::new();
        let mut start = 0;
        let mut from = self.scanned;
        while let Some(offset) = self.buf[from..].iter().position(|b| *b == b'\n') {
            let newline = from + offset;
            if let Some(line) = Self::clean(&self.buf[start..newline]) {
                lines.push(line);
            }
            start = newline + 1;
            from = start;
        }
        self.buf.drain(..start);
        self.scanned = self.buf.len();

        if self.buf.len() > MAX_LINE_LEN {
            warn!(
                pending = self.buf.len(),
                "Unterminated line exceeds limit, passing it on"
            );
            if let Some(line) = Self::clean(&self.buf) {
                lines.push(line);
            }
            self.clear();
        }
        lines
    }

    /// Number of buffered bytes not yet forming a complete line
    pub fn pending(&self) -> usize {
        self.buf.len()
    }

    /// Drop any partial line
    pub fn clear(&mut self) {
        self.buf.clear();
        self.scanned = 0;
    }

    fn clean(raw: &[u8]) -> Option<String> {
        let text = String::from_utf8_lossy(raw);
        let text = text.strip_suffix('\r').unwrap_or(&text);
        let text = text.strip_suffix(EOT).unwrap_or(text);
        if text.is_empty() {
            None
        } else {
            Some(text.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_complete_lines() {
        let mut buffer = LineBuffer::new();
        let lines = buffer.push(b">OK<\nhello\n");
        assert_eq!(lines, vec![">OK<", "hello"]);
        assert_eq!(buffer.pending(), 0);
    }

    #[test]
    fn test_split_across_reads() {
        let mut buffer = LineBuffer::new();
        assert!(buffer.push(b">Line<[['/tmp/a.p").is_empty());
        assert!(buffer.pending() > 0);
        let lines = buffer.push(b"y', 3, 'f', '']]\n>Ex");
        assert_eq!(lines, vec![">Line<[['/tmp/a.py', 3, 'f', '']]"]);
        let lines = buffer.push(b"it<0\n");
        assert_eq!(lines, vec![">Exit<0"]);
    }

    #[test]
    fn test_strips_eot_and_cr() {
        let mut buffer = LineBuffer::new();
        let lines = buffer.push(b"output>EOT<\n>EOT<\n>OK<\r\n\n");
        assert_eq!(lines, vec!["output", ">OK<"]);
    }

    #[test]
    fn test_invalid_utf8_is_lossy() {
        let mut buffer = LineBuffer::new();
        let lines = buffer.push(b"caf\xff\n");
        assert_eq!(lines, vec!["caf\u{fffd}"]);
    }

    #[test]
    fn test_unterminated_line_is_capped() {
        let mut buffer = LineBuffer::new();
        let chunk = vec![b'x'; 64 * 1024];
        let mut lines = Vec::new();
        while lines.is_empty() {
            assert!(buffer.pending() <= MAX_LINE_LEN);
            lines = buffer.push(&chunk);
        }
        assert_eq!(lines.len(), 1);
        assert!(lines[0].len() > MAX_LINE_LEN);
        assert_eq!(buffer.pending(), 0);

        let lines = buffer.push(b">OK<\n");
        assert_eq!(lines, vec![">OK<"]);
    }

    #[test]
    fn test_many_small_reads() {
        let mut buffer = LineBuffer::new();
        for b in b">Exit<0" {
            assert!(buffer.push(&[*b]).is_empty());
        }
        assert_eq!(buffer.push(b"\nrest"), vec![">Exit<0"]);
        assert_eq!(buffer.pending(), 4);
    }
}
