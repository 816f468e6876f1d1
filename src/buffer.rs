use std::io::{self, BufRead, BufReader, Read};

/// A [`BufReader`] paired with a scratch buffer, so that a line can be
/// returned as a single slice even when it straddles a refill.
///
/// When a line is entirely contained in the reader's buffer, it is handed out
/// without copying and only consumed on the next call to [`Self::reset`].
/// Otherwise its beginning is accumulated in the scratch buffer.
pub(crate) struct ScratchBuffer<R> {
    inner: BufReader<R>,
    scratch: Vec<u8>,
    pending_consume: Option<usize>,
    position: u64,
}

impl<R: Read> ScratchBuffer<R> {
    pub(crate) fn with_capacity(capacity: usize, reader: R) -> Self {
        Self {
            inner: BufReader::with_capacity(capacity, reader),
            scratch: Vec::with_capacity(capacity),
            pending_consume: None,
            position: 0,
        }
    }

    #[inline(always)]
    pub(crate) fn fill_buf(&mut self) -> io::Result<&[u8]> {
        self.inner.fill_buf()
    }

    #[inline(always)]
    pub(crate) fn consume(&mut self, amt: usize) {
        self.position += amt as u64;
        self.inner.consume(amt);
    }

    /// Moves the whole content of the reader's buffer into the scratch buffer.
    #[inline]
    pub(crate) fn save(&mut self) {
        let bytes = self.inner.buffer();
        let len = bytes.len();

        self.scratch.extend_from_slice(bytes);
        self.consume(len);
    }

    #[inline(always)]
    pub(crate) fn saved(&self) -> &[u8] {
        &self.scratch
    }

    /// Forgets the last flushed bytes, consuming them if they were lent
    /// directly from the reader's buffer.
    #[inline]
    pub(crate) fn reset(&mut self) {
        self.scratch.clear();

        if let Some(amt) = self.pending_consume.take() {
            self.consume(amt);
        }
    }

    /// Returns whatever was saved followed by the first `amt` bytes of the
    /// reader's buffer.
    #[inline]
    pub(crate) fn flush(&mut self, amt: usize) -> &[u8] {
        if self.scratch.is_empty() {
            self.pending_consume = Some(amt);

            &self.inner.buffer()[..amt]
        } else {
            self.scratch.extend_from_slice(&self.inner.buffer()[..amt]);
            self.consume(amt);

            &self.scratch
        }
    }

    /// Number of bytes consumed from the underlying reader so far.
    #[inline(always)]
    pub(crate) fn position(&self) -> u64 {
        self.position + self.pending_consume.unwrap_or(0) as u64
    }

    /// **BEWARE**: already buffered data will be lost!
    pub(crate) fn into_inner(mut self) -> R {
        self.reset();
        self.inner.into_inner()
    }
}
