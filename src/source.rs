//! Where lines come from.
//!
//! A [`Source`] hands out physical lines one at a time, terminator excluded.
//! In-memory sources lend slices of their buffer and can be rewound, while
//! stream sources only ever see a window of their input and therefore refuse
//! to do either.
use std::io::Read;

use memchr::memchr2;
use tracing::{debug, trace};

use crate::buffer::ScratchBuffer;
use crate::error::{Error, Result, UnsupportedOperation};
use crate::splitter::{find_line_end, skip_line_ending};
use crate::utils::trim_bom;

/// A physical line read from a [`Source`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Line<'s> {
    pub bytes: &'s [u8],
    /// 1-based.
    pub number: u64,
}

pub trait Source {
    /// Reads the next line, or returns `None` once the input is exhausted.
    fn read_line(&mut self) -> Result<Option<Line<'_>>>;

    fn has_more_data(&mut self) -> Result<bool>;

    /// Rewinds the source to its first line.
    fn reset(&mut self) -> Result<()>;

    /// Borrows the whole input, when it is resident in memory.
    fn buffer(&self) -> Result<&[u8]>;

    /// Number of the last line read, 0 if none was.
    fn line_number(&self) -> u64;
}

impl<S: Source + ?Sized> Source for &mut S {
    fn read_line(&mut self) -> Result<Option<Line<'_>>> {
        (**self).read_line()
    }

    fn has_more_data(&mut self) -> Result<bool> {
        (**self).has_more_data()
    }

    fn reset(&mut self) -> Result<()> {
        (**self).reset()
    }

    fn buffer(&self) -> Result<&[u8]> {
        (**self).buffer()
    }

    fn line_number(&self) -> u64 {
        (**self).line_number()
    }
}

/// A [`Source`] over a buffer already resident in memory.
#[derive(Debug, Clone)]
pub struct SliceSource<'a> {
    bytes: &'a [u8],
    start: usize,
    pos: usize,
    line_number: u64,
}

impl<'a> SliceSource<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        let start = trim_bom(bytes);

        Self {
            bytes,
            start,
            pos: start,
            line_number: 0,
        }
    }

    /// Byte offset of the next line.
    #[inline(always)]
    pub fn position(&self) -> usize {
        self.pos
    }
}

impl Source for SliceSource<'_> {
    #[inline]
    fn read_line(&mut self) -> Result<Option<Line<'_>>> {
        if self.pos >= self.bytes.len() {
            return Ok(None);
        }

        let start = self.pos;
        let end = find_line_end(self.bytes, start);

        self.pos = skip_line_ending(self.bytes, end);
        self.line_number += 1;

        Ok(Some(Line {
            bytes: &self.bytes[start..end],
            number: self.line_number,
        }))
    }

    #[inline]
    fn has_more_data(&mut self) -> Result<bool> {
        Ok(self.pos < self.bytes.len())
    }

    fn reset(&mut self) -> Result<()> {
        self.pos = self.start;
        self.line_number = 0;

        Ok(())
    }

    #[inline(always)]
    fn buffer(&self) -> Result<&[u8]> {
        Ok(self.bytes)
    }

    #[inline(always)]
    fn line_number(&self) -> u64 {
        self.line_number
    }
}

// The BOM is only stripped from the first line, which is always contiguous,
// so that it is found even if it straddles a refill.
#[inline]
fn bom_offset(line_number: u64, line: &[u8]) -> usize {
    if line_number > 0 {
        return 0;
    }

    let bom_len = trim_bom(line);

    if bom_len > 0 {
        trace!("skipped utf-8 bom");
    }

    bom_len
}

/// A [`Source`] reading lines from any [`std::io::Read`] implementation.
///
/// Avoid providing a buffered reader because buffering will be handled for
/// you by the [`StreamSource`].
pub struct StreamSource<R> {
    inner: ScratchBuffer<R>,
    // A CR was the last byte of a refill: a LF starting the next one belongs
    // to the same terminator.
    pending_cr: bool,
    line_number: u64,
}

impl<R: Read> StreamSource<R> {
    pub fn new(reader: R) -> Self {
        Self::with_capacity(8192, reader)
    }

    pub fn with_capacity(capacity: usize, reader: R) -> Self {
        Self {
            inner: ScratchBuffer::with_capacity(capacity, reader),
            pending_cr: false,
            line_number: 0,
        }
    }

    fn prepare(&mut self) -> Result<()> {
        self.inner.reset();

        if self.pending_cr {
            self.pending_cr = false;

            if self.inner.fill_buf()?.first() == Some(&b'\n') {
                self.inner.consume(1);
            }
        }

        Ok(())
    }

    /// Number of bytes consumed from the underlying reader so far.
    #[inline(always)]
    pub fn position(&self) -> u64 {
        self.inner.position()
    }

    /// Return the underlying reader.
    ///
    /// **BEWARE**: Already buffered data will be lost!
    pub fn into_inner(self) -> R {
        self.inner.into_inner()
    }
}

impl<R: Read> Source for StreamSource<R> {
    fn read_line(&mut self) -> Result<Option<Line<'_>>> {
        self.prepare()?;

        loop {
            let input = self.inner.fill_buf()?;
            let len = input.len();

            if len == 0 {
                let line = self.inner.saved();
                let offset = bom_offset(self.line_number, line);

                if line.len() == offset {
                    return Ok(None);
                }

                self.line_number += 1;

                return Ok(Some(Line {
                    bytes: &line[offset..],
                    number: self.line_number,
                }));
            }

            match memchr2(b'\n', b'\r', input) {
                None => {
                    self.inner.save();
                }
                Some(pos) => {
                    let terminator_len = if input[pos] == b'\r' {
                        match input.get(pos + 1) {
                            Some(b'\n') => 2,
                            Some(_) => 1,
                            None => {
                                self.pending_cr = true;
                                1
                            }
                        }
                    } else {
                        1
                    };

                    let bytes = self.inner.flush(pos + terminator_len);
                    let line = &bytes[..bytes.len() - terminator_len];
                    let offset = bom_offset(self.line_number, line);

                    self.line_number += 1;

                    return Ok(Some(Line {
                        bytes: &line[offset..],
                        number: self.line_number,
                    }));
                }
            }
        }
    }

    fn has_more_data(&mut self) -> Result<bool> {
        self.prepare()?;

        Ok(!self.inner.fill_buf()?.is_empty())
    }

    fn reset(&mut self) -> Result<()> {
        debug!("refusing to rewind a stream source");
        Err(Error::unsupported(UnsupportedOperation::Reset))
    }

    fn buffer(&self) -> Result<&[u8]> {
        Err(Error::unsupported(UnsupportedOperation::Buffer))
    }

    #[inline(always)]
    fn line_number(&self) -> u64 {
        self.line_number
    }
}
