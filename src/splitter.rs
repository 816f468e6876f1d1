//! Physical line splitting over an in-memory buffer.
//!
//! `\n`, `\r` and `\r\n` are all recognized as a single line break. Quoting
//! is never considered at this level: a quoted field cannot span lines.
use std::iter::FusedIterator;

use memchr::memchr2;

/// A line of a buffer, terminator excluded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct LineSpan {
    pub start: usize,
    pub len: usize,
}

impl LineSpan {
    #[inline(always)]
    pub fn new(start: usize, len: usize) -> Self {
        Self { start, len }
    }

    #[inline(always)]
    pub fn end(&self) -> usize {
        self.start + self.len
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the bytes of the line within the buffer it was found in.
    #[inline(always)]
    pub fn slice<'a>(&self, buffer: &'a [u8]) -> &'a [u8] {
        &buffer[self.start..self.end()]
    }
}

/// Returns the position of the first `\n` or `\r` found at or after `start`,
/// or the length of the buffer if there is none.
#[inline]
pub fn find_line_end(buffer: &[u8], start: usize) -> usize {
    if start >= buffer.len() {
        return buffer.len();
    }

    match memchr2(b'\n', b'\r', &buffer[start..]) {
        Some(offset) => start + offset,
        None => buffer.len(),
    }
}

/// Consumes a single line break found at `pos`, treating `\r\n` as one
/// break. Returns `pos` unchanged if there is no terminator there.
#[inline]
pub fn skip_line_ending(buffer: &[u8], pos: usize) -> usize {
    match buffer.get(pos) {
        Some(b'\r') => {
            if buffer.get(pos + 1) == Some(&b'\n') {
                pos + 2
            } else {
                pos + 1
            }
        }
        Some(b'\n') => pos + 1,
        _ => pos,
    }
}

/// Iterator over the lines of a buffer. A buffer ending with a line break
/// does not yield a final empty line.
#[derive(Debug, Clone)]
pub struct Lines<'a> {
    buffer: &'a [u8],
    pos: usize,
}

impl<'a> Lines<'a> {
    #[inline]
    pub(crate) fn starting_at(buffer: &'a [u8], pos: usize) -> Self {
        Self { buffer, pos }
    }

    /// Byte offset of the next line.
    #[inline(always)]
    pub fn position(&self) -> usize {
        self.pos
    }
}

impl Iterator for Lines<'_> {
    type Item = LineSpan;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        if self.pos >= self.buffer.len() {
            return None;
        }

        let end = find_line_end(self.buffer, self.pos);
        let span = LineSpan::new(self.pos, end - self.pos);

        self.pos = skip_line_ending(self.buffer, end);

        Some(span)
    }
}

impl FusedIterator for Lines<'_> {}

/// Returns an iterator over the lines of the given buffer.
#[inline]
pub fn lines(buffer: &[u8]) -> Lines<'_> {
    Lines::starting_at(buffer, 0)
}

/// Counts the lines of a buffer as fast as possible, i.e. without looking
/// at fields at all.
pub fn count_lines(buffer: &[u8]) -> u64 {
    lines(buffer).count() as u64
}

/// Counts the lines of a buffer, ignoring empty ones.
pub fn count_non_empty_lines(buffer: &[u8]) -> u64 {
    lines(buffer).filter(|span| !span.is_empty()).count() as u64
}
