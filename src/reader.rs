use std::borrow::Cow;
use std::io::Read;

use tracing::{debug, trace};

use crate::error::Result;
use crate::options::ParseOptions;
use crate::records::{ByteRecord, Row};
use crate::rows::Rows;
use crate::source::{SliceSource, Source, StreamSource};
use crate::tokenizer;
use crate::validation::{ValidationReport, Validator};

/// Builds a [`Reader`] with given configuration.
#[derive(Debug, Clone)]
pub struct ReaderBuilder {
    options: ParseOptions,
    validate: bool,
    track_errors: bool,
    max_field_len: Option<usize>,
    required_fields: Vec<usize>,
    buffer_capacity: usize,
}

impl Default for ReaderBuilder {
    fn default() -> Self {
        Self {
            options: ParseOptions::default(),
            validate: false,
            track_errors: true,
            max_field_len: None,
            required_fields: Vec::new(),
            buffer_capacity: 8192,
        }
    }
}

impl ReaderBuilder {
    /// Create a new [`ReaderBuilder`] with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new [`ReaderBuilder`] starting from already existing
    /// [`ParseOptions`].
    pub fn from_options(options: ParseOptions) -> Self {
        Self {
            options,
            ..Self::default()
        }
    }

    /// Set the delimiter to be used by the created [`Reader`].
    ///
    /// This delimiter must be a single byte.
    ///
    /// Will default to a comma.
    pub fn delimiter(&mut self, delimiter: u8) -> &mut Self {
        self.options = std::mem::take(&mut self.options).with_delimiter(delimiter);
        self
    }

    /// Set the quote char to be used by the created [`Reader`].
    ///
    /// This char must be a single byte.
    ///
    /// Will default to a double quote.
    pub fn quote(&mut self, quote: u8) -> &mut Self {
        self.options = std::mem::take(&mut self.options).with_quote(quote);
        self
    }

    /// Indicate whether first line must be understood as a header.
    ///
    /// Will default to `true`.
    pub fn has_header(&mut self, yes: bool) -> &mut Self {
        self.options = std::mem::take(&mut self.options).with_header(yes);
        self
    }

    /// Indicate whether leading & trailing ASCII whitespace should be trimmed
    /// from decoded values.
    ///
    /// Will default to `false`.
    pub fn trim_whitespace(&mut self, yes: bool) -> &mut Self {
        self.options = std::mem::take(&mut self.options).with_trim_whitespace(yes);
        self
    }

    /// Indicate whether empty lines should be ignored instead of being read as
    /// records without any field.
    ///
    /// Will default to `false`.
    pub fn skip_empty_lines(&mut self, yes: bool) -> &mut Self {
        self.options = std::mem::take(&mut self.options).with_skip_empty_lines(yes);
        self
    }

    /// Set the line terminator used when writing records back.
    ///
    /// Will default to `"\r\n"`.
    pub fn newline(&mut self, newline: impl Into<Cow<'static, str>>) -> &mut Self {
        self.options = std::mem::take(&mut self.options).with_newline(newline);
        self
    }

    /// Indicate whether the created [`Reader`] should check every record it
    /// reads and report problems through a [`ValidationReport`].
    ///
    /// Will default to `false`.
    pub fn validate(&mut self, yes: bool) -> &mut Self {
        self.validate = yes;
        self
    }

    /// Indicate whether validation should keep every problem found, or only
    /// count them.
    ///
    /// Will default to `true`.
    pub fn track_errors(&mut self, yes: bool) -> &mut Self {
        self.track_errors = yes;
        self
    }

    /// Set the maximum length of a decoded value, when validating.
    pub fn max_field_len(&mut self, max: Option<usize>) -> &mut Self {
        self.max_field_len = max;
        self
    }

    /// Set the columns that must never be missing or empty, when validating.
    pub fn required_fields(&mut self, fields: Vec<usize>) -> &mut Self {
        self.required_fields = fields;
        self
    }

    /// Set the capacity of the buffer used by readers created with
    /// [`Self::from_reader`].
    pub fn buffer_capacity(&mut self, capacity: usize) -> &mut Self {
        self.buffer_capacity = capacity;
        self
    }

    #[inline(always)]
    pub fn options(&self) -> &ParseOptions {
        &self.options
    }

    fn validator(&self) -> Option<Validator> {
        self.validate.then(|| {
            Validator::new()
                .with_max_field_len(self.max_field_len)
                .with_required_fields(self.required_fields.clone())
                .with_track_errors(self.track_errors)
        })
    }

    /// Create a new [`Reader`] over a buffer already resident in memory.
    pub fn from_bytes<'a>(&self, bytes: &'a [u8]) -> Reader<SliceSource<'a>> {
        self.from_source(SliceSource::new(bytes))
    }

    pub fn from_str<'a>(&self, string: &'a str) -> Reader<SliceSource<'a>> {
        self.from_bytes(string.as_bytes())
    }

    /// Create a new [`Reader`] using the provided reader implementing
    /// [`std::io::Read`].
    pub fn from_reader<R: Read>(&self, reader: R) -> Reader<StreamSource<R>> {
        self.from_source(StreamSource::with_capacity(self.buffer_capacity, reader))
    }

    pub fn from_source<S: Source>(&self, source: S) -> Reader<S> {
        Reader {
            source,
            options: self.options.clone(),
            validator: self.validator(),
            headers: ByteRecord::new(),
            has_read_headers: false,
            records_read: 0,
        }
    }
}

/// An already configured CSV reader, pulling lines from a [`Source`].
///
/// # Configuration
///
/// To configure a [`Reader`], if you need a custom delimiter for instance or
/// if you want to enable validation, check out the [`ReaderBuilder`].
pub struct Reader<S> {
    source: S,
    options: ParseOptions,
    validator: Option<Validator>,
    headers: ByteRecord,
    has_read_headers: bool,
    records_read: u64,
}

impl<'a> Reader<SliceSource<'a>> {
    pub fn from_bytes(bytes: &'a [u8]) -> Self {
        ReaderBuilder::new().from_bytes(bytes)
    }
}

impl<R: Read> Reader<StreamSource<R>> {
    pub fn from_reader(reader: R) -> Self {
        ReaderBuilder::new().from_reader(reader)
    }
}

impl<S: Source> Reader<S> {
    #[inline]
    fn on_first_read(&mut self) -> Result<()> {
        if self.has_read_headers {
            return Ok(());
        }

        self.has_read_headers = true;

        if !self.options.has_header() {
            return Ok(());
        }

        if let Some(line) = self.source.read_line()? {
            let dialect = self.options.dialect();

            match &mut self.validator {
                None => tokenizer::read_record(line.bytes, dialect, &mut self.headers),
                Some(validator) => {
                    let row = Row::with_dialect(line.bytes, dialect).at_line(line.number);

                    validator.validate_header(&row);
                    row.read_byte_record(&mut self.headers);
                }
            }

            debug!(
                line = line.number,
                fields = self.headers.len(),
                "read header"
            );
        }

        Ok(())
    }

    /// Attempt to read the next record into `record`, which is cleared first.
    /// Reusing the same record amortizes allocations.
    ///
    /// Returns `false` once the source is exhausted.
    pub fn read_record(&mut self, record: &mut ByteRecord) -> Result<bool> {
        self.on_first_read()?;

        let dialect = self.options.dialect();

        loop {
            let Some(line) = self.source.read_line()? else {
                if let Some(validator) = &mut self.validator {
                    validator.end_of_input();
                }

                return Ok(false);
            };

            if line.bytes.is_empty() && self.options.skip_empty_lines() {
                continue;
            }

            match &mut self.validator {
                None => tokenizer::read_record(line.bytes, dialect, record),
                Some(validator) => {
                    let row = Row::with_dialect(line.bytes, dialect).at_line(line.number);

                    validator.validate_row(&row);
                    row.read_byte_record(record);
                }
            }

            trace!(line = line.number, fields = record.len(), "read record");

            self.records_read += 1;

            return Ok(true);
        }
    }

    /// Returns the header record, which is empty if the reader was
    /// configured without one.
    pub fn headers(&mut self) -> Result<&ByteRecord> {
        self.on_first_read()?;

        Ok(&self.headers)
    }

    /// Consume the reader to collect every remaining record.
    pub fn read_all(&mut self) -> Result<Vec<ByteRecord>> {
        self.byte_records().collect()
    }

    /// Consume the reader to count the number of remaining records.
    ///
    /// When validation is disabled, lines are counted without ever being
    /// tokenized.
    pub fn count_records(&mut self) -> Result<u64> {
        self.on_first_read()?;

        let mut count: u64 = 0;

        if self.validator.is_none() {
            debug!("counting records without tokenizing");

            let skip_empty_lines = self.options.skip_empty_lines();

            while let Some(line) = self.source.read_line()? {
                if !(skip_empty_lines && line.bytes.is_empty()) {
                    count += 1;
                }
            }

            self.records_read += count;

            return Ok(count);
        }

        let mut record = ByteRecord::new();

        while self.read_record(&mut record)? {
            count += 1;
        }

        Ok(count)
    }

    /// Returns an iterator yielding every remaining record.
    pub fn byte_records(&mut self) -> ByteRecordsIter<'_, S> {
        ByteRecordsIter {
            reader: self,
            record: ByteRecord::new(),
        }
    }

    /// Returns a zero-copy enumerator over the rows of the whole input,
    /// independent from this reader's own position.
    ///
    /// Fails if the source is not resident in memory.
    pub fn rows(&self) -> Result<Rows<'_>> {
        Ok(Rows::new(self.source.buffer()?, &self.options))
    }

    /// Rewind the reader to the beginning of its source, forgetting
    /// everything validation found so far.
    ///
    /// Fails if the source cannot be rewound.
    pub fn reset(&mut self) -> Result<()> {
        self.source.reset()?;

        debug!("reset reader");

        self.headers.clear();
        self.has_read_headers = false;
        self.records_read = 0;

        if let Some(validator) = &mut self.validator {
            validator.reset();
        }

        Ok(())
    }

    /// 1-based number of the last physical line read, header included.
    #[inline(always)]
    pub fn line_number(&self) -> u64 {
        self.source.line_number()
    }

    /// Number of records read so far, header excluded.
    #[inline(always)]
    pub fn records_read(&self) -> u64 {
        self.records_read
    }

    #[inline(always)]
    pub fn has_headers(&self) -> bool {
        self.options.has_header()
    }

    #[inline(always)]
    pub fn options(&self) -> &ParseOptions {
        &self.options
    }

    /// Returns what validation found so far, if it is enabled.
    #[inline]
    pub fn validation(&self) -> Option<&ValidationReport> {
        self.validator.as_ref().map(Validator::report)
    }

    pub fn into_source(self) -> S {
        self.source
    }
}

pub struct ByteRecordsIter<'r, S> {
    reader: &'r mut Reader<S>,
    record: ByteRecord,
}

impl<S: Source> Iterator for ByteRecordsIter<'_, S> {
    type Item = Result<ByteRecord>;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        match self.reader.read_record(&mut self.record) {
            Err(err) => Some(Err(err)),
            Ok(true) => Some(Ok(self.record.clone())),
            Ok(false) => None,
        }
    }
}
