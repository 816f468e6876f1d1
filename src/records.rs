use std::borrow::Cow;
use std::cell::OnceCell;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::Index;
use std::str;

use crate::debug;
use crate::error::{Error, ErrorKind, Result};
use crate::options::{Dialect, ParseOptions};
use crate::splitter::LineSpan;
use crate::tokenizer::{scan, FieldTable};
use crate::utils::{decode_field, decode_field_to};

#[inline]
fn decode_utf8(field: usize, value: Cow<'_, [u8]>) -> Result<Cow<'_, str>> {
    let decoded = match value {
        Cow::Borrowed(bytes) => str::from_utf8(bytes)
            .map(Cow::Borrowed)
            .map_err(|error| (field, error)),
        Cow::Owned(bytes) => String::from_utf8(bytes)
            .map(Cow::Owned)
            .map_err(|error| (field, error.utf8_error())),
    };

    decoded.map_err(|(field, error)| Error::new(ErrorKind::Utf8 { field, error }))
}

/// A lazy view of a single CSV line, borrowed from the buffer it was read
/// from.
///
/// Field positions are only computed the first time they are needed, then
/// cached for the lifetime of the row, so that repeated indexed access never
/// rescans the line. Up to [`INLINE_FIELDS`](crate::INLINE_FIELDS) positions
/// are stored without allocating.
///
/// Quotes are stripped, escaped quotes collapsed and whitespace trimmed on
/// each access, never in the cached positions.
///
/// A row is not meant to be shared between threads.
#[derive(Clone)]
pub struct Row<'a> {
    line: &'a [u8],
    span: LineSpan,
    line_number: u64,
    dialect: Dialect,
    table: OnceCell<FieldTable>,
}

impl<'a> Row<'a> {
    /// Create a row over a single line, terminator excluded.
    #[inline]
    pub fn new(line: &'a [u8], options: &ParseOptions) -> Self {
        Self::with_dialect(line, options.dialect())
    }

    #[inline]
    pub fn with_dialect(line: &'a [u8], dialect: Dialect) -> Self {
        Self::from_parts(line, LineSpan::new(0, line.len()), 0, dialect)
    }

    #[inline]
    pub(crate) fn from_parts(
        line: &'a [u8],
        span: LineSpan,
        line_number: u64,
        dialect: Dialect,
    ) -> Self {
        Self {
            line,
            span,
            line_number,
            dialect,
            table: OnceCell::new(),
        }
    }

    #[inline]
    pub(crate) fn at_line(mut self, line_number: u64) -> Self {
        self.line_number = line_number;
        self
    }

    #[inline(always)]
    fn table(&self) -> &FieldTable {
        self.table.get_or_init(|| scan(self.line, self.dialect))
    }

    /// Returns the cached field positions, computing them if necessary.
    #[inline]
    pub fn positions(&self) -> &FieldTable {
        self.table()
    }

    /// Returns whether field positions have already been computed.
    #[inline(always)]
    pub fn is_scanned(&self) -> bool {
        self.table.get().is_some()
    }

    /// Number of fields of the row. An empty line has zero fields.
    #[inline]
    pub fn field_count(&self) -> usize {
        self.table().len()
    }

    /// Alias of [`Self::field_count`].
    #[inline]
    pub fn len(&self) -> usize {
        self.field_count()
    }

    /// Returns whether the row has no fields, i.e. whether its line is empty.
    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.line.is_empty()
    }

    /// Returns the underlying line, delimiters and quotes included.
    #[inline(always)]
    pub fn as_slice(&self) -> &'a [u8] {
        self.line
    }

    /// Position of the line within its buffer.
    #[inline(always)]
    pub fn span(&self) -> LineSpan {
        self.span
    }

    /// 1-based physical line number of the row, or 0 when unknown.
    #[inline(always)]
    pub fn line_number(&self) -> u64 {
        self.line_number
    }

    #[inline(always)]
    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// Returns whether the line ended inside a quoted section.
    #[inline]
    pub fn has_unbalanced_quotes(&self) -> bool {
        self.table().is_unbalanced()
    }

    /// Returns the nth field as found in the line, quotes and escapes
    /// included, if it is not out-of-bounds.
    #[inline]
    pub fn raw_get(&self, index: usize) -> Option<&'a [u8]> {
        self.table().get(index).map(|span| span.slice(self.line))
    }

    /// Returns the nth decoded field, if it is not out-of-bounds.
    ///
    /// A [`Cow::Owned`] will be returned if the field actually needed
    /// unescaping, else a [`Cow::Borrowed`] will be returned.
    #[inline]
    pub fn get(&self, index: usize) -> Option<Cow<'a, [u8]>> {
        self.raw_get(index)
            .map(|cell| decode_field(cell, self.dialect))
    }

    /// Returns the nth decoded field or an
    /// [`OutOfRange`](ErrorKind::OutOfRange) error.
    #[inline]
    pub fn field(&self, index: usize) -> Result<Cow<'a, [u8]>> {
        self.get(index)
            .ok_or_else(|| Error::out_of_range(index, self.field_count()))
    }

    /// Returns the nth raw field or an [`OutOfRange`](ErrorKind::OutOfRange)
    /// error.
    #[inline]
    pub fn raw_field(&self, index: usize) -> Result<&'a [u8]> {
        self.raw_get(index)
            .ok_or_else(|| Error::out_of_range(index, self.field_count()))
    }

    /// Returns the nth decoded field as UTF-8.
    #[inline]
    pub fn field_str(&self, index: usize) -> Result<Cow<'a, str>> {
        decode_utf8(index, self.field(index)?)
    }

    /// Returns an iterator over the row's decoded fields.
    #[inline]
    pub fn iter(&self) -> RowIter<'_, 'a> {
        RowIter {
            row: self,
            current_forward: 0,
            current_backward: self.field_count(),
        }
    }

    /// Returns an iterator over the row's fields, as-is.
    #[inline]
    pub fn raw_iter(&self) -> RawRowIter<'_, 'a> {
        RawRowIter {
            row: self,
            current_forward: 0,
            current_backward: self.field_count(),
        }
    }

    /// Decodes every field into `record`, which is cleared first.
    pub fn read_byte_record(&self, record: &mut ByteRecord) {
        record.clear();
        record.extend_with_table(self.line, self.table(), self.dialect);
    }

    /// Converts the row into a proper, owned [`ByteRecord`] that can outlive
    /// the buffer.
    #[inline]
    pub fn to_byte_record(&self) -> ByteRecord {
        let mut record = ByteRecord::new();
        self.read_byte_record(&mut record);
        record
    }

    /// Decodes every field as an owned UTF-8 string.
    pub fn to_strings(&self) -> Result<Vec<String>> {
        self.iter()
            .enumerate()
            .map(|(i, cell)| decode_utf8(i, cell).map(Cow::into_owned))
            .collect()
    }
}

impl fmt::Debug for Row<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Row(")?;
        f.debug_list()
            .entries(self.raw_iter().map(debug::Bytes))
            .finish()?;
        write!(f, ")")?;
        Ok(())
    }
}

macro_rules! make_row_iterator {
    ($name:ident, $method: ident, $out_type: ty) => {
        pub struct $name<'r, 'a> {
            row: &'r Row<'a>,
            current_forward: usize,
            current_backward: usize,
        }

        impl ExactSizeIterator for $name<'_, '_> {}

        impl<'a> Iterator for $name<'_, 'a> {
            type Item = $out_type;

            #[inline]
            fn next(&mut self) -> Option<Self::Item> {
                if self.current_forward == self.current_backward {
                    None
                } else {
                    let cell = self.row.$method(self.current_forward);

                    self.current_forward += 1;

                    cell
                }
            }

            #[inline]
            fn size_hint(&self) -> (usize, Option<usize>) {
                let size = self.current_backward - self.current_forward;

                (size, Some(size))
            }

            #[inline]
            fn count(self) -> usize
            where
                Self: Sized,
            {
                self.len()
            }
        }

        impl DoubleEndedIterator for $name<'_, '_> {
            #[inline]
            fn next_back(&mut self) -> Option<Self::Item> {
                if self.current_forward == self.current_backward {
                    None
                } else {
                    self.current_backward -= 1;

                    self.row.$method(self.current_backward)
                }
            }
        }
    };
}

make_row_iterator!(RowIter, get, Cow<'a, [u8]>);
make_row_iterator!(RawRowIter, raw_get, &'a [u8]);

/// An owned, decoded representation of a CSV record.
#[derive(Default, Clone, Eq)]
pub struct ByteRecord {
    data: Vec<u8>,
    bounds: Vec<(usize, usize)>,
}

impl ByteRecord {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.bounds.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn clear(&mut self) {
        self.data.clear();
        self.bounds.clear();
    }

    #[inline]
    pub fn truncate(&mut self, len: usize) {
        self.bounds.truncate(len);

        if let Some((_, end)) = self.bounds.last() {
            self.data.truncate(*end);
        } else {
            self.data.clear();
        }
    }

    /// Returns every field's bytes, concatenated.
    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    #[inline]
    pub fn iter(&self) -> ByteRecordIter<'_> {
        ByteRecordIter {
            record: self,
            current_forward: 0,
            current_backward: self.len(),
        }
    }

    #[inline]
    fn next_start(&self) -> usize {
        self.bounds.last().map(|(_, end)| *end).unwrap_or(0)
    }

    #[inline(always)]
    pub fn push_field(&mut self, bytes: &[u8]) {
        let start = self.next_start();

        self.data.extend_from_slice(bytes);
        self.bounds.push((start, self.data.len()));
    }

    pub(crate) fn extend_with_table(&mut self, line: &[u8], table: &FieldTable, dialect: Dialect) {
        for span in table.as_slice() {
            let start = self.next_start();

            decode_field_to(span.slice(line), dialect, &mut self.data);
            self.bounds.push((start, self.data.len()));
        }
    }

    #[inline]
    pub fn get(&self, index: usize) -> Option<&[u8]> {
        self.bounds
            .get(index)
            .copied()
            .map(|(start, end)| &self.data[start..end])
    }

    /// Returns the nth field or an [`OutOfRange`](ErrorKind::OutOfRange)
    /// error.
    #[inline]
    pub fn field(&self, index: usize) -> Result<&[u8]> {
        self.get(index)
            .ok_or_else(|| Error::out_of_range(index, self.len()))
    }

    /// Decodes every field as an owned UTF-8 string.
    pub fn to_strings(&self) -> Result<Vec<String>> {
        self.iter()
            .enumerate()
            .map(|(i, cell)| decode_utf8(i, Cow::Borrowed(cell)).map(Cow::into_owned))
            .collect()
    }
}

impl PartialEq for ByteRecord {
    fn eq(&self, other: &Self) -> bool {
        if self.bounds.len() != other.bounds.len() {
            return false;
        }

        self.iter()
            .zip(other.iter())
            .all(|(self_cell, other_cell)| self_cell == other_cell)
    }
}

impl Hash for ByteRecord {
    #[inline]
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_usize(self.len());

        for cell in self.iter() {
            state.write(cell);
        }
    }
}

impl Index<usize> for ByteRecord {
    type Output = [u8];

    #[inline]
    fn index(&self, i: usize) -> &[u8] {
        match self.get(i) {
            Some(cell) => cell,
            None => panic!("field index {} out of range for record of {} fields", i, self.len()),
        }
    }
}

impl<T: AsRef<[u8]>> Extend<T> for ByteRecord {
    #[inline]
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for x in iter {
            self.push_field(x.as_ref());
        }
    }
}

impl<T: AsRef<[u8]>> FromIterator<T> for ByteRecord {
    #[inline]
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut record = Self::new();
        record.extend(iter);
        record
    }
}

impl<'r> IntoIterator for &'r ByteRecord {
    type IntoIter = ByteRecordIter<'r>;
    type Item = &'r [u8];

    #[inline]
    fn into_iter(self) -> ByteRecordIter<'r> {
        self.iter()
    }
}

impl fmt::Debug for ByteRecord {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "ByteRecord(")?;
        f.debug_list()
            .entries(self.iter().map(debug::Bytes))
            .finish()?;
        write!(f, ")")?;
        Ok(())
    }
}

pub struct ByteRecordIter<'a> {
    record: &'a ByteRecord,
    current_forward: usize,
    current_backward: usize,
}

impl ExactSizeIterator for ByteRecordIter<'_> {}

impl<'a> Iterator for ByteRecordIter<'a> {
    type Item = &'a [u8];

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        if self.current_forward == self.current_backward {
            None
        } else {
            let (start, end) = self.record.bounds[self.current_forward];

            self.current_forward += 1;

            Some(&self.record.data[start..end])
        }
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        let size = self.current_backward - self.current_forward;

        (size, Some(size))
    }

    #[inline]
    fn count(self) -> usize
    where
        Self: Sized,
    {
        self.len()
    }
}

impl DoubleEndedIterator for ByteRecordIter<'_> {
    #[inline]
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.current_forward == self.current_backward {
            None
        } else {
            self.current_backward -= 1;

            let (start, end) = self.record.bounds[self.current_backward];

            Some(&self.record.data[start..end])
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::tokenizer::scan_count;

    #[test]
    fn test_row() -> Result<()> {
        let options = ParseOptions::default();
        let row = Row::new(b"name,\"sur\"\"name\",age", &options);

        assert!(!row.is_scanned());
        assert_eq!(row.field_count(), 3);
        assert!(row.is_scanned());

        let expected: Vec<&[u8]> = vec![b"name", b"sur\"name", b"age"];
        assert_eq!(row.iter().collect::<Vec<_>>(), expected);
        assert_eq!(
            row.iter().rev().collect::<Vec<_>>(),
            expected.iter().rev().copied().collect::<Vec<_>>()
        );
        assert_eq!(
            row.raw_iter().collect::<Vec<_>>(),
            vec![&b"name"[..], b"\"sur\"\"name\"", b"age"]
        );

        for (i, cell) in expected.iter().enumerate() {
            assert_eq!(row.field(i)?, *cell);
        }

        assert!(matches!(row.field(0)?, Cow::Borrowed(_)));
        assert!(matches!(row.field(1)?, Cow::Owned(_)));
        assert_eq!(row.get(3), None);
        assert_eq!(row.iter().len(), 3);
        assert_eq!(row.to_strings()?, vec!["name", "sur\"name", "age"]);
        assert_eq!(row.to_byte_record(), brec!["name", "sur\"name", "age"]);

        Ok(())
    }

    #[test]
    fn test_out_of_range() {
        let options = ParseOptions::default();

        for line in [&b"a,b"[..], b"", b"\"x\",", b"abc"] {
            let row = Row::new(line, &options);
            let len = row.field_count();

            let err = row.field(len).unwrap_err();
            assert!(err.is_out_of_range());
            assert!(matches!(
                err.kind(),
                ErrorKind::OutOfRange { index, len: l } if *index == len && *l == len
            ));
            assert!(row.raw_field(len).is_err());
            assert!(row.field_str(len + 10).is_err());

            let record = row.to_byte_record();
            assert_eq!(record.len(), len);
            assert!(record.field(len).unwrap_err().is_out_of_range());
        }
    }

    #[test]
    fn test_idempotent_positions() {
        let options = ParseOptions::default();
        let row = Row::new(b"\"a\",b,c", &options);

        let before = scan_count();

        let count = row.field_count();
        let first = row.field(0).unwrap();

        for _ in 0..10 {
            assert_eq!(row.field_count(), count);
            assert_eq!(row.field(0).unwrap(), first);
            assert_eq!(row.field(2).unwrap(), Cow::Borrowed(&b"c"[..]));
        }

        row.to_byte_record();
        row.iter().count();

        assert_eq!(scan_count() - before, 1);
    }

    #[test]
    fn test_empty_row() {
        let options = ParseOptions::default();

        let row = Row::new(b"", &options);
        assert!(row.is_empty());
        assert_eq!(row.field_count(), 0);
        assert_eq!(row.iter().next(), None);

        let row = Row::new(b",", &options);
        assert!(!row.is_empty());
        assert_eq!(row.to_byte_record(), brec!["", ""]);
    }

    #[test]
    fn test_field_str() {
        let options = ParseOptions::default();
        let row = Row::new(b"caf\xc3\xa9,\"\xff\"", &options);

        assert_eq!(row.field_str(0).unwrap(), "café");

        let err = row.field_str(1).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::Utf8 { field: 1, .. }));
        assert!(row.to_strings().is_err());
    }

    #[test]
    fn test_row_debug() {
        let row = Row::new(b"a,\"b\"", &ParseOptions::default());

        assert_eq!(format!("{:?}", row), "Row([\"a\", \"\\\"b\\\"\"])");
    }

    #[test]
    fn test_byte_record() {
        let mut record = ByteRecord::new();

        assert_eq!(record.len(), 0);
        assert!(record.is_empty());
        assert_eq!(record.get(0), None);

        record.push_field(b"name");
        record.push_field(b"surname");
        record.push_field(b"age");

        let expected: Vec<&[u8]> = vec![b"name", b"surname", b"age"];
        assert_eq!(record.iter().collect::<Vec<_>>(), expected);

        assert_eq!(record.get(0), Some::<&[u8]>(b"name"));
        assert_eq!(record.get(1), Some::<&[u8]>(b"surname"));
        assert_eq!(record.get(2), Some::<&[u8]>(b"age"));
        assert_eq!(record.get(3), None);
        assert_eq!(&record[1], b"surname");

        record.truncate(1);
        assert_eq!(record, brec!["name"]);

        record.push_field(b"");
        assert_eq!(record, brec!["name", ""]);
        assert_eq!(record.to_strings().unwrap(), vec!["name", ""]);
    }
}
