use std::iter::FusedIterator;

use tracing::{debug, trace};

use crate::options::{Dialect, ParseOptions};
use crate::records::{ByteRecord, Row};
use crate::splitter::{find_line_end, lines, skip_line_ending, LineSpan, Lines};
use crate::utils::trim_bom;

/// Where a [`Rows`] enumerator currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnumeratorState {
    /// Nothing has been read yet and there was no header to skip.
    NotStarted,
    /// The header line was consumed, but no row has been read yet.
    HeaderSkipped,
    /// A row has been read from the given 1-based physical line.
    Positioned(u64),
    /// The end of the buffer was reached.
    Exhausted,
}

/// A zero-copy enumerator of the rows of an in-memory buffer.
///
/// Rows borrow the buffer, not the enumerator, so they can be kept around
/// after the enumerator advances. Their field positions are only computed
/// if fields are actually accessed.
///
/// Several enumerators can read the same buffer concurrently, but a single
/// enumerator must not be shared between threads.
#[derive(Debug, Clone)]
pub struct Rows<'a> {
    bytes: &'a [u8],
    dialect: Dialect,
    has_header: bool,
    skip_empty_lines: bool,
    start: usize,
    pos: usize,
    line_number: u64,
    state: EnumeratorState,
    headers: Option<Row<'a>>,
    current: Option<Row<'a>>,
}

impl<'a> Rows<'a> {
    /// Create a new enumerator over the given buffer, skipping its header
    /// line right away if `options` say there is one.
    pub fn new(bytes: &'a [u8], options: &ParseOptions) -> Self {
        let start = trim_bom(bytes);

        let mut rows = Self {
            bytes,
            dialect: options.dialect(),
            has_header: options.has_header(),
            skip_empty_lines: options.skip_empty_lines(),
            start,
            pos: start,
            line_number: 0,
            state: EnumeratorState::NotStarted,
            headers: None,
            current: None,
        };

        rows.skip_header();
        rows
    }

    fn skip_header(&mut self) {
        if !self.has_header {
            return;
        }

        if self.pos >= self.bytes.len() {
            self.state = EnumeratorState::Exhausted;
            return;
        }

        let header = self.next_row();
        debug!(line = header.line_number(), "skipped header line");

        self.headers = Some(header);
        self.state = EnumeratorState::HeaderSkipped;
    }

    #[inline]
    fn next_row(&mut self) -> Row<'a> {
        let end = find_line_end(self.bytes, self.pos);
        let span = LineSpan::new(self.pos, end - self.pos);

        self.pos = skip_line_ending(self.bytes, end);
        self.line_number += 1;

        Row::from_parts(span.slice(self.bytes), span, self.line_number, self.dialect)
    }

    /// Move to the next row. Returns `false` once the buffer is exhausted.
    pub fn advance(&mut self) -> bool {
        if self.state == EnumeratorState::Exhausted {
            return false;
        }

        loop {
            if self.pos >= self.bytes.len() {
                self.state = EnumeratorState::Exhausted;
                self.current = None;
                return false;
            }

            let row = self.next_row();

            if self.skip_empty_lines && row.is_empty() {
                continue;
            }

            trace!(line = self.line_number, len = row.span().len, "advanced to row");

            self.state = EnumeratorState::Positioned(self.line_number);
            self.current = Some(row);

            return true;
        }
    }

    /// The row read by the last successful call to [`Self::advance`].
    #[inline]
    pub fn current(&self) -> Option<&Row<'a>> {
        self.current.as_ref()
    }

    /// The header row, if the enumerator was configured to expect one and
    /// the buffer was not empty.
    #[inline]
    pub fn headers(&self) -> Option<&Row<'a>> {
        self.headers.as_ref()
    }

    #[inline(always)]
    pub fn state(&self) -> EnumeratorState {
        self.state
    }

    /// 1-based physical line number of the last line consumed.
    #[inline(always)]
    pub fn line_number(&self) -> u64 {
        self.line_number
    }

    /// Byte offset of the next line to read.
    #[inline(always)]
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Skip up to `count` rows without looking at their fields. Returns the
    /// number of rows actually skipped, which is zero once exhausted.
    pub fn skip_rows(&mut self, count: usize) -> usize {
        let mut skipped = 0;

        while skipped < count && self.advance() {
            skipped += 1;
        }

        skipped
    }

    /// Rewind the enumerator to the beginning of its buffer.
    pub fn reset(&mut self) {
        self.pos = self.start;
        self.line_number = 0;
        self.state = EnumeratorState::NotStarted;
        self.headers = None;
        self.current = None;

        self.skip_header();
    }

    #[inline]
    fn remaining_lines(&self) -> Lines<'a> {
        Lines::starting_at(self.bytes, self.pos)
    }

    /// Consumes the enumerator and collects the decoded fields of every
    /// remaining row.
    pub fn read_all(self) -> Vec<ByteRecord> {
        self.map(|row| row.to_byte_record()).collect()
    }
}

impl<'a> Iterator for Rows<'a> {
    type Item = Row<'a>;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        if self.advance() {
            self.current.clone()
        } else {
            None
        }
    }

    /// Counting remaining rows only needs to find line ends.
    fn count(self) -> usize {
        if self.state == EnumeratorState::Exhausted {
            return 0;
        }

        let remaining = self.remaining_lines();

        if self.skip_empty_lines {
            remaining.filter(|span| !span.is_empty()).count()
        } else {
            remaining.count()
        }
    }
}

impl FusedIterator for Rows<'_> {}

/// Counts the rows [`Rows`] would yield for this buffer, without
/// tokenizing anything.
pub fn count_records(bytes: &[u8], options: &ParseOptions) -> u64 {
    let bytes = &bytes[trim_bom(bytes)..];
    let mut spans = lines(bytes);

    if options.has_header() {
        spans.next();
    }

    if options.skip_empty_lines() {
        spans.filter(|span| !span.is_empty()).count() as u64
    } else {
        spans.count() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::tokenizer::scan_count;

    fn collect(data: &str, options: &ParseOptions) -> Vec<Vec<String>> {
        Rows::new(data.as_bytes(), options)
            .map(|row| row.to_strings().unwrap())
            .collect()
    }

    #[test]
    fn test_header_skip() {
        let options = ParseOptions::default();
        let data = "Name,Age\nJohn,30\nJane,25";

        assert_eq!(
            collect(data, &options),
            vec![vec!["John", "30"], vec!["Jane", "25"]]
        );

        let rows = Rows::new(data.as_bytes(), &options);
        assert_eq!(rows.state(), EnumeratorState::HeaderSkipped);
        assert_eq!(
            rows.headers().unwrap().to_strings().unwrap(),
            vec!["Name", "Age"]
        );

        let options = options.with_header(false);
        let rows = Rows::new(data.as_bytes(), &options);
        assert_eq!(rows.state(), EnumeratorState::NotStarted);
        assert!(rows.headers().is_none());
        assert_eq!(collect(data, &options).len(), 3);
    }

    #[test]
    fn test_states() {
        let options = ParseOptions::default().with_header(false);
        let mut rows = Rows::new(b"a,b\r\nc,d\n", &options);

        assert_eq!(rows.state(), EnumeratorState::NotStarted);
        assert!(rows.current().is_none());

        assert!(rows.advance());
        assert_eq!(rows.state(), EnumeratorState::Positioned(1));
        assert_eq!(rows.current().unwrap().as_slice(), b"a,b");
        assert_eq!(rows.current().unwrap().span(), LineSpan::new(0, 3));

        assert!(rows.advance());
        assert_eq!(rows.state(), EnumeratorState::Positioned(2));
        assert_eq!(rows.current().unwrap().field(1).unwrap(), &b"d"[..]);
        assert_eq!(rows.position(), 9);

        assert!(!rows.advance());
        assert_eq!(rows.state(), EnumeratorState::Exhausted);
        assert!(rows.current().is_none());

        // Idempotent once exhausted
        assert!(!rows.advance());
        assert_eq!(rows.skip_rows(3), 0);
        assert_eq!(rows.state(), EnumeratorState::Exhausted);

        rows.reset();
        assert_eq!(rows.state(), EnumeratorState::NotStarted);
        assert_eq!(rows.skip_rows(5), 2);
    }

    #[test]
    fn test_empty_inputs() {
        let options = ParseOptions::default();

        let mut rows = Rows::new(b"", &options);
        assert_eq!(rows.state(), EnumeratorState::Exhausted);
        assert!(rows.headers().is_none());
        assert!(!rows.advance());

        let mut rows = Rows::new(b"name\n", &options);
        assert_eq!(rows.state(), EnumeratorState::HeaderSkipped);
        assert!(!rows.advance());
    }

    #[test]
    fn test_empty_lines() {
        let data = "a\n\nb\r\n\r\nc";
        let options = ParseOptions::default().with_header(false);

        let rows = Rows::new(data.as_bytes(), &options)
            .map(|row| row.field_count())
            .collect::<Vec<_>>();
        assert_eq!(rows, vec![1, 0, 1, 0, 1]);

        let options = options.with_skip_empty_lines(true);
        assert_eq!(collect(data, &options), vec![vec!["a"], vec!["b"], vec!["c"]]);
    }

    #[test]
    fn test_bom() {
        let options = ParseOptions::default();
        let rows = Rows::new(b"\xef\xbb\xbfname,age\njohn,45", &options);

        assert_eq!(rows.headers().unwrap().field(0).unwrap(), &b"name"[..]);
        assert_eq!(rows.read_all(), vec![brec!["john", "45"]]);
    }

    #[test]
    fn test_rows_outlive_advance() {
        let options = ParseOptions::default().with_header(false);
        let mut rows = Rows::new(b"a,b\nc,d", &options);

        let first = rows.next().unwrap();
        let second = rows.next().unwrap();

        assert_eq!(first.line_number(), 1);
        assert_eq!(second.line_number(), 2);
        assert_eq!(first.to_byte_record(), brec!["a", "b"]);
        assert_eq!(second.to_byte_record(), brec!["c", "d"]);
    }

    #[test]
    fn test_advancing_does_not_scan() {
        let options = ParseOptions::default();
        let mut rows = Rows::new(b"a,b\nc,d\ne,f", &options);
        let before = scan_count();

        while rows.advance() {}

        assert_eq!(scan_count(), before);
    }

    #[test]
    fn test_count() {
        let tests: &[(&str, u64)] = &[
            ("", 0),
            ("a,b", 1),
            ("a,b\n", 1),
            ("a,b\nc,d\ne,f\n", 3),
            ("a,b\r\nc,d\r\ne,f\r\n", 3),
            ("a\n\nb", 3),
            ("\n", 1),
            ("\"x,y\"\r\"z\"", 2),
        ];

        let options = ParseOptions::default().with_header(false);

        for (data, expected) in tests {
            let bytes = data.as_bytes();

            assert_eq!(count_records(bytes, &options), *expected, "data={:?}", data);
            assert_eq!(Rows::new(bytes, &options).count() as u64, *expected);
            assert_eq!(Rows::new(bytes, &options).collect::<Vec<_>>().len() as u64, *expected);
        }

        let options = ParseOptions::default();

        assert_eq!(count_records(b"h\na\nb\n", &options), 2);
        assert_eq!(count_records(b"h", &options), 0);
        assert_eq!(count_records(b"", &options), 0);

        let mut rows = Rows::new(b"h\na\nb\nc", &options);
        rows.advance();
        assert_eq!(rows.count(), 2);

        let options = options.with_skip_empty_lines(true);
        assert_eq!(count_records(b"h\n\na\n\nb\n", &options), 2);
        assert_eq!(Rows::new(b"h\n\na\n\nb\n", &options).count(), 2);
    }
}
