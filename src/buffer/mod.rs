//! A refillable line buffer over a pull-based byte source.
//!
//! The parser wants whole lines, but the source (a file, stdin, or any
//! `Read`) hands back arbitrary chunks. `LineBuffer` re-segments those
//! chunks on `\n`, refilling its fixed-capacity buffer as needed, so a
//! line may span any number of refills.

use std::io::Read;

/// Re-segments a byte stream into lines using a fixed-size internal buffer.
pub struct LineBuffer<R> {
    source: R,
    buf: Vec<u8>,
    pos: usize,
    len: usize,
    eof: bool,
}

impl<R: Read> LineBuffer<R> {
    /// Create a line buffer with the given internal capacity in bytes.
    /// Capacities below 1 are bumped to 1.
    pub fn new(capacity: usize, source: R) -> Self {
        Self {
            source,
            buf: vec![0; capacity.max(1)],
            pos: 0,
            len: 0,
            eof: false,
        }
    }

    /// Refill the internal buffer from the source. Returns false once the
    /// source is exhausted. Source errors are treated as end-of-input.
    fn fill(&mut self) -> bool {
        self.pos = 0;
        match self.source.read(&mut self.buf) {
            Ok(0) | Err(_) => {
                self.len = 0;
                false
            }
            Ok(n) => {
                self.len = n;
                true
            }
        }
    }

    /// Read the next line into `dst`, replacing its contents. The trailing
    /// `\n` is included when present; an unterminated final line is returned
    /// as-is. Returns the number of bytes placed in `dst`, 0 at end of input.
    pub fn read_line(&mut self, dst: &mut Vec<u8>) -> usize {
        dst.clear();
        loop {
            if self.pos >= self.len {
                if self.eof || !self.fill() {
                    self.eof = true;
                    break;
                }
            }
            let chunk = &self.buf[self.pos..self.len];
            match chunk.iter().position(|&b| b == b'\n') {
                Some(i) => {
                    dst.extend_from_slice(&chunk[..=i]);
                    self.pos += i + 1;
                    return dst.len();
                }
                None => {
                    dst.extend_from_slice(chunk);
                    self.pos = self.len;
                }
            }
        }
        dst.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{self, Cursor};

    const CONTENTS: &[u8] = b"The cat\nand the\nhat.";

    fn expect_lines(capacity: usize) {
        let mut buffer = LineBuffer::new(capacity, Cursor::new(CONTENTS));
        let mut line = Vec::new();

        assert_eq!(buffer.read_line(&mut line), 8);
        assert_eq!(line, b"The cat\n");

        assert_eq!(buffer.read_line(&mut line), 8);
        assert_eq!(line, b"and the\n");

        assert_eq!(buffer.read_line(&mut line), 4);
        assert_eq!(line, b"hat.");

        assert_eq!(buffer.read_line(&mut line), 0);
        assert_eq!(line, b"");
    }

    #[test]
    fn short_buffer() {
        expect_lines(3);
    }

    #[test]
    fn long_buffer() {
        expect_lines(300);
    }

    #[test]
    fn almost_file_length_buffer() {
        expect_lines(19);
    }

    #[test]
    fn divisible_buffer() {
        expect_lines(10);
    }

    #[test]
    fn byte_buffer() {
        expect_lines(1);
    }

    #[test]
    fn lines_concatenate_to_input() {
        for capacity in [1, 2, 3, 7, 19, 64] {
            let mut buffer = LineBuffer::new(capacity, Cursor::new(CONTENTS));
            let mut line = Vec::new();
            let mut joined = Vec::new();
            while buffer.read_line(&mut line) > 0 {
                joined.extend_from_slice(&line);
            }
            assert_eq!(joined, CONTENTS);
        }
    }

    #[test]
    fn trailing_newline_yields_no_extra_line() {
        let mut buffer = LineBuffer::new(4, Cursor::new(b"one\ntwo\n".as_slice()));
        let mut line = Vec::new();
        assert_eq!(buffer.read_line(&mut line), 4);
        assert_eq!(buffer.read_line(&mut line), 4);
        assert_eq!(buffer.read_line(&mut line), 0);
    }

    struct FailingReader;

    impl Read for FailingReader {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::Other, "boom"))
        }
    }

    #[test]
    fn source_error_is_end_of_input() {
        let mut buffer = LineBuffer::new(8, FailingReader);
        let mut line = Vec::new();
        assert_eq!(buffer.read_line(&mut line), 0);
        assert_eq!(buffer.read_line(&mut line), 0);
    }
}
