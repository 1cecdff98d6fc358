//! Line boundary scanning.
//!
//! The scanner is a pure function over a byte buffer: it locates every
//! newline (`\n`, 0x0A) and splits the buffer into newline-terminated lines
//! plus an unterminated tail. It performs no I/O and never mutates its
//! input, so rescanning the same buffer always yields the same result.

/// Result of scanning a buffer for line boundaries.
///
/// `lines` holds every complete line in order, each including its
/// terminating newline. `tail` is the remainder after the last newline
/// (possibly empty); it is not a line and must be carried over to the next
/// scan.
#[derive(Debug, PartialEq, Eq)]
pub struct Scan<'a> {
    pub lines: Vec<&'a [u8]>,
    pub tail: &'a [u8],
}

/// Split `buf` into complete lines and an unterminated tail.
///
/// A line is a maximal slice ending in `\n`, inclusive of the terminator.
/// Consecutive newlines produce empty lines (a slice that is just `\n`),
/// which are still complete lines. There is no cap on line length; a buffer
/// with no newline at all produces zero lines and a tail equal to the whole
/// buffer.
pub fn scan(buf: &[u8]) -> Scan<'_> {
    let mut lines = Vec::new();
    let mut rest = buf;

    while let Some(idx) = rest.iter().position(|&b| b == b'\n') {
        let (line, remainder) = rest.split_at(idx + 1);
        lines.push(line);
        rest = remainder;
    }

    Scan { lines, tail: rest }
}
