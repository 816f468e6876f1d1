use std::io::{self, BufWriter, IntoInnerError, Write};

use memchr::memchr2;

use crate::options::ParseOptions;
use crate::records::ByteRecord;
use crate::searcher::Searcher;

/// Decides whether fields must be quoted, and escapes them when they do.
#[derive(Debug, Clone)]
struct Quoter {
    delimiter: u8,
    quote: u8,
    trim_whitespace: bool,
    line_break: bool,
    quote_bounds: Vec<usize>,
    searcher: Searcher,
}

impl Quoter {
    fn new(options: &ParseOptions) -> Self {
        Self {
            delimiter: options.delimiter(),
            quote: options.quote(),
            trim_whitespace: options.trim_whitespace(),
            line_break: false,
            quote_bounds: Vec::new(),
            searcher: Searcher::new(options.delimiter(), options.quote()),
        }
    }

    fn assess_quoting(&mut self, cell: &[u8]) -> bool {
        let mut must_quote = false;

        self.quote_bounds.clear();

        for offset in self.searcher.search(cell) {
            if cell[offset] == self.quote {
                if self.quote_bounds.is_empty() {
                    self.quote_bounds.push(0);
                }

                self.quote_bounds.push(offset);
            }

            must_quote = true;
        }

        if !self.quote_bounds.is_empty() {
            self.quote_bounds.push(cell.len());
        }

        if memchr2(b'\r', b'\n', cell).is_some() {
            self.line_break = true;
            return true;
        }

        must_quote
            || (self.trim_whitespace
                && (cell.first().is_some_and(u8::is_ascii_whitespace)
                    || cell.last().is_some_and(u8::is_ascii_whitespace)))
    }

    fn push_field(&mut self, cell: &[u8], out: &mut Vec<u8>) {
        if !self.assess_quoting(cell) {
            out.extend_from_slice(cell);
            return;
        }

        out.push(self.quote);

        if self.quote_bounds.is_empty() {
            out.extend_from_slice(cell);
        } else {
            // Every slice but the first starts with a quote, which gets doubled
            let windows = self.quote_bounds.windows(2);
            let last_i = windows.len().saturating_sub(1);

            for (i, w) in windows.enumerate() {
                out.extend_from_slice(&cell[w[0]..w[1]]);

                if i != last_i {
                    out.push(self.quote);
                }
            }
        }

        out.push(self.quote);
    }

    /// Returns whether some field contained a line break.
    fn push_record<I, T>(&mut self, fields: I, out: &mut Vec<u8>) -> bool
    where
        I: IntoIterator<Item = T>,
        T: AsRef<[u8]>,
    {
        let mut count: usize = 0;

        self.line_break = false;
        let mut last_is_empty = false;

        for cell in fields {
            let cell = cell.as_ref();

            if count > 0 {
                out.push(self.delimiter);
            }

            self.push_field(cell, out);

            last_is_empty = cell.is_empty();
            count += 1;
        }

        // Otherwise it would be read back as a record without any field
        if count == 1 && last_is_empty {
            out.push(self.quote);
            out.push(self.quote);
        }

        self.line_break
    }
}

/// Formats a single record as a line, terminator excluded, quoting fields
/// only when needed.
///
/// Fields containing `\r` or `\n` are quoted, so that [`tokenize`] reads
/// the result back as-is. Such a line cannot be read back from a whole buffer
/// or stream though, since line breaks always end records there.
///
/// [`tokenize`]: crate::tokenize
pub fn format_record<I, T>(fields: I, options: &ParseOptions) -> Vec<u8>
where
    I: IntoIterator<Item = T>,
    T: AsRef<[u8]>,
{
    let mut line = Vec::new();
    Quoter::new(options).push_record(fields, &mut line);
    line
}

/// A buffered CSV writer.
///
/// Fields are only quoted when they contain the delimiter or the quote char,
/// or when trimming is enabled and they start or end with whitespace.
/// Records are terminated by [`ParseOptions::newline`].
///
/// Since line breaks always end records when reading, records with a field
/// containing `\r` or `\n` are rejected with
/// [`io::ErrorKind::InvalidInput`] and nothing is written.
pub struct Writer<W: Write> {
    buffer: BufWriter<W>,
    quoter: Quoter,
    newline: Vec<u8>,
    scratch: Vec<u8>,
}

impl<W: Write> Writer<W> {
    /// Create a new writer with default options.
    ///
    /// Avoid providing a buffered writer because buffering will be handled for
    /// you by the [`Writer`].
    pub fn from_writer(writer: W) -> Self {
        Self::with_options(writer, &ParseOptions::default())
    }

    pub fn with_options(writer: W, options: &ParseOptions) -> Self {
        Self::with_capacity(writer, 8192, options)
    }

    pub fn with_capacity(writer: W, capacity: usize, options: &ParseOptions) -> Self {
        Self {
            buffer: BufWriter::with_capacity(capacity, writer),
            quoter: Quoter::new(options),
            newline: options.newline().as_bytes().to_vec(),
            scratch: Vec::new(),
        }
    }

    pub fn write_record<I, T>(&mut self, record: I) -> io::Result<()>
    where
        I: IntoIterator<Item = T>,
        T: AsRef<[u8]>,
    {
        self.scratch.clear();

        if self.quoter.push_record(record, &mut self.scratch) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "field contains a line break",
            ));
        }

        self.scratch.extend_from_slice(&self.newline);

        self.buffer.write_all(&self.scratch)
    }

    #[inline]
    pub fn write_byte_record(&mut self, record: &ByteRecord) -> io::Result<()> {
        self.write_record(record.iter())
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.buffer.flush()
    }

    pub fn into_inner(self) -> Result<W, IntoInnerError<BufWriter<W>>> {
        self.buffer.into_inner()
    }
}
