use std::borrow::Cow;

/// The subset of [`ParseOptions`] needed to split a line and decode its
/// fields.
///
/// It is `Copy` so row views can carry it around without borrowing the
/// options they were created from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dialect {
    pub delimiter: u8,
    pub quote: u8,
    pub trim_whitespace: bool,
}

impl Default for Dialect {
    fn default() -> Self {
        Self {
            delimiter: b',',
            quote: b'"',
            trim_whitespace: false,
        }
    }
}

/// Immutable description of a CSV dialect.
///
/// The delimiter and the quote must be single bytes and are expected to be
/// different from each other.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseOptions {
    delimiter: u8,
    quote: u8,
    has_header: bool,
    trim_whitespace: bool,
    skip_empty_lines: bool,
    newline: Cow<'static, str>,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            delimiter: b',',
            quote: b'"',
            has_header: true,
            trim_whitespace: false,
            skip_empty_lines: false,
            newline: Cow::Borrowed("\r\n"),
        }
    }
}

impl ParseOptions {
    /// Create options with a comma delimiter, double quotes, a header row,
    /// no trimming and CRLF output newlines.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the field delimiter.
    ///
    /// Will default to a comma.
    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Set the quote char.
    ///
    /// Will default to a double quote.
    pub fn with_quote(mut self, quote: u8) -> Self {
        self.quote = quote;
        self
    }

    /// Indicate whether the first line must be understood as a header.
    ///
    /// Will default to `true`.
    pub fn with_header(mut self, yes: bool) -> Self {
        self.has_header = yes;
        self
    }

    /// Indicate whether leading & trailing ASCII whitespace must be removed
    /// from field values, after quotes have been stripped.
    ///
    /// Will default to `false`.
    pub fn with_trim_whitespace(mut self, yes: bool) -> Self {
        self.trim_whitespace = yes;
        self
    }

    /// Indicate whether empty lines should be ignored instead of being read
    /// as records with zero fields.
    ///
    /// Will default to `false`.
    pub fn with_skip_empty_lines(mut self, yes: bool) -> Self {
        self.skip_empty_lines = yes;
        self
    }

    /// Set the line terminator used when writing records. Any of `\n`, `\r`
    /// or `\r\n` is always accepted when reading.
    ///
    /// Will default to `\r\n`.
    pub fn with_newline(mut self, newline: impl Into<Cow<'static, str>>) -> Self {
        self.newline = newline.into();
        self
    }

    #[inline(always)]
    pub fn delimiter(&self) -> u8 {
        self.delimiter
    }

    #[inline(always)]
    pub fn quote(&self) -> u8 {
        self.quote
    }

    #[inline(always)]
    pub fn has_header(&self) -> bool {
        self.has_header
    }

    #[inline(always)]
    pub fn trim_whitespace(&self) -> bool {
        self.trim_whitespace
    }

    #[inline(always)]
    pub fn skip_empty_lines(&self) -> bool {
        self.skip_empty_lines
    }

    #[inline(always)]
    pub fn newline(&self) -> &str {
        &self.newline
    }

    #[inline]
    pub fn dialect(&self) -> Dialect {
        Dialect {
            delimiter: self.delimiter,
            quote: self.quote,
            trim_whitespace: self.trim_whitespace,
        }
    }
}
