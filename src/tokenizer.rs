//! Splitting a single line into fields.
//!
//! The tokenizer works in two tiers. A line without any quote char is split
//! on delimiters only, which does not require any state. Otherwise, a small
//! state machine tracks quoted sections, using the amortized [`Searcher`]
//! outside of them and plain `memchr` inside of them.
//!
//! A quoted section can only be opened by a quote char found at the very
//! beginning of a field. Quote chars found anywhere else are regular content.
//! Malformed lines never fail: an unterminated quoted section simply runs
//! until the end of the line and is reported through
//! [`FieldTable::is_unbalanced`].
use std::ops::Index;

use memchr::{memchr, memchr_iter};
use smallvec::SmallVec;

use crate::options::{Dialect, ParseOptions};
use crate::records::ByteRecord;
use crate::searcher::Searcher;
use crate::utils::decode_field_to;

/// Number of field positions stored inline before spilling to the heap.
pub const INLINE_FIELDS: usize = 32;

/// The raw extent of a field within its line, quotes included.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct FieldSpan {
    pub start: usize,
    pub len: usize,
}

impl FieldSpan {
    #[inline(always)]
    pub fn new(start: usize, len: usize) -> Self {
        Self { start, len }
    }

    #[inline(always)]
    pub fn end(&self) -> usize {
        self.start + self.len
    }

    #[inline(always)]
    pub fn slice<'a>(&self, line: &'a [u8]) -> &'a [u8] {
        &line[self.start..self.end()]
    }
}

/// Positions of every field of a line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldTable {
    spans: SmallVec<[FieldSpan; INLINE_FIELDS]>,
    unbalanced: bool,
}

impl FieldTable {
    #[inline(always)]
    pub fn len(&self) -> usize {
        self.spans.len()
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }

    #[inline(always)]
    pub fn get(&self, index: usize) -> Option<FieldSpan> {
        self.spans.get(index).copied()
    }

    #[inline(always)]
    pub fn as_slice(&self) -> &[FieldSpan] {
        &self.spans
    }

    /// Whether the line ended while a quoted section was still open.
    #[inline(always)]
    pub fn is_unbalanced(&self) -> bool {
        self.unbalanced
    }

    /// Whether the positions were stored without any heap allocation.
    #[inline(always)]
    pub fn is_inline(&self) -> bool {
        !self.spans.spilled()
    }
}

impl Index<usize> for FieldTable {
    type Output = FieldSpan;

    #[inline]
    fn index(&self, index: usize) -> &FieldSpan {
        &self.spans[index]
    }
}

#[cfg(test)]
thread_local! {
    pub(crate) static SCANS: std::cell::Cell<usize> = const { std::cell::Cell::new(0) };
}

#[cfg(test)]
pub(crate) fn scan_count() -> usize {
    SCANS.with(|scans| scans.get())
}

/// Finds the positions of the fields of a single line, terminator excluded.
///
/// An empty line has no fields at all, while a line containing a single
/// delimiter has two empty ones.
pub fn scan(line: &[u8], dialect: Dialect) -> FieldTable {
    #[cfg(test)]
    SCANS.with(|scans| scans.set(scans.get() + 1));

    let mut table = FieldTable::default();

    if line.is_empty() {
        return table;
    }

    if memchr(dialect.quote, line).is_none() {
        scan_unquoted(line, dialect.delimiter, &mut table);
    } else {
        scan_quoted(line, dialect, &mut table);
    }

    table
}

#[inline]
fn scan_unquoted(line: &[u8], delimiter: u8, table: &mut FieldTable) {
    let mut start: usize = 0;

    for offset in memchr_iter(delimiter, line) {
        table.spans.push(FieldSpan::new(start, offset - start));
        start = offset + 1;
    }

    table.spans.push(FieldSpan::new(start, line.len() - start));
}

fn scan_quoted(line: &[u8], dialect: Dialect, table: &mut FieldTable) {
    let Dialect {
        delimiter, quote, ..
    } = dialect;

    let len = line.len();
    let searcher = Searcher::new(delimiter, quote);

    // Start of the current field
    let mut start: usize = 0;
    // Scanning cursor
    let mut pos: usize = 0;

    'fields: loop {
        if pos < len && line[pos] == quote {
            pos += 1;

            loop {
                match memchr(quote, &line[pos..]) {
                    None => {
                        table.unbalanced = true;
                        pos = len;
                        break;
                    }
                    Some(offset) => {
                        pos += offset + 1;

                        // Doubled quote, still in the quoted section
                        if pos < len && line[pos] == quote {
                            pos += 1;
                            continue;
                        }

                        break;
                    }
                }
            }
        }

        let base = pos;

        for offset in searcher.search(&line[base..]) {
            let at = base + offset;

            if line[at] != delimiter {
                continue;
            }

            table.spans.push(FieldSpan::new(start, at - start));
            start = at + 1;
            pos = start;

            if pos < len && line[pos] == quote {
                continue 'fields;
            }
        }

        table.spans.push(FieldSpan::new(start, len - start));
        break;
    }
}

/// Splits a line and decodes its fields into `record`, which is cleared
/// first. Reusing the same record amortizes allocations.
pub fn read_record(line: &[u8], dialect: Dialect, record: &mut ByteRecord) {
    let table = scan(line, dialect);

    record.clear();
    record.extend_with_table(line, &table, dialect);
}

/// Splits a line and returns the owned, decoded values of its fields.
pub fn tokenize(line: &[u8], options: &ParseOptions) -> Vec<Vec<u8>> {
    let dialect = options.dialect();
    let table = scan(line, dialect);

    table
        .as_slice()
        .iter()
        .map(|span| {
            let mut value = Vec::with_capacity(span.len);
            decode_field_to(span.slice(line), dialect, &mut value);
            value
        })
        .collect()
}
