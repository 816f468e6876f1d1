//! Optional structural checks over rows.
//!
//! Findings are accumulated into a [`ValidationReport`] instead of being
//! raised as errors, so that a full pass over malformed data completes and
//! reports every problem found. Whether they constitute a failure is left to
//! the caller.
use std::fmt;

use memchr::memchr;
use tracing::{debug, trace};

use crate::records::Row;

/// Maximum number of bytes of offending content kept in a [`ValidationError`].
const MAX_CONTENT_LEN: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValidationErrorKind {
    /// The line ended inside a quoted section.
    UnbalancedQuotes,
    /// The record does not have the expected number of fields.
    InconsistentFieldCount { expected: usize, found: usize },
    /// A decoded value is longer than the configured maximum.
    FieldTooLong { max: usize, len: usize },
    /// A required column is either missing or empty.
    EmptyRequiredField,
    /// A value is not valid UTF-8 or contains a NUL byte.
    InvalidCharacters,
    /// The input ended inside a quoted section.
    UnexpectedEndOfFile,
}

impl fmt::Display for ValidationErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::UnbalancedQuotes => f.write_str("unbalanced quotes"),
            Self::InconsistentFieldCount { expected, found } => write!(
                f,
                "expected {} fields but found {}",
                expected, found
            ),
            Self::FieldTooLong { max, len } => write!(
                f,
                "field is {} bytes long, which exceeds the maximum of {}",
                len, max
            ),
            Self::EmptyRequiredField => f.write_str("required field is empty"),
            Self::InvalidCharacters => f.write_str("invalid characters"),
            Self::UnexpectedEndOfFile => f.write_str("unexpected end of file in quoted field"),
        }
    }
}

/// A single structural problem found in the input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub kind: ValidationErrorKind,
    /// 1-based physical line number.
    pub line: u64,
    /// Index of the offending field, if the problem is not about the whole
    /// record.
    pub field: Option<usize>,
    /// The offending content, lossily decoded and possibly truncated.
    pub content: String,
}

impl ValidationError {
    fn new(kind: ValidationErrorKind, line: u64, field: Option<usize>, content: &[u8]) -> Self {
        let content = &content[..content.len().min(MAX_CONTENT_LEN)];

        Self {
            kind,
            line,
            field,
            content: String::from_utf8_lossy(content).into_owned(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.field {
            Some(index) => write!(f, "line {}, field {}: {}", self.line, index, self.kind),
            None => write!(f, "line {}: {}", self.line, self.kind),
        }
    }
}

impl std::error::Error for ValidationError {}

/// Everything a [`Validator`] found so far.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    /// Detailed findings, only kept when error tracking is enabled.
    pub errors: Vec<ValidationError>,
    /// Total number of findings, tracked or not.
    pub error_count: u64,
    pub records_checked: u64,
}

impl ValidationReport {
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.error_count == 0
    }
}

/// Checks rows one at a time, in input order.
#[derive(Debug, Clone)]
pub struct Validator {
    expected_field_count: Option<usize>,
    max_field_len: Option<usize>,
    required_fields: Vec<usize>,
    track_errors: bool,
    // Line of the last checked row, if it had unbalanced quotes.
    last_unbalanced: Option<u64>,
    report: ValidationReport,
}

impl Default for Validator {
    fn default() -> Self {
        Self {
            expected_field_count: None,
            max_field_len: None,
            required_fields: Vec::new(),
            track_errors: true,
            last_unbalanced: None,
            report: ValidationReport::default(),
        }
    }
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject values longer than `max` bytes, once decoded.
    pub fn with_max_field_len(mut self, max: Option<usize>) -> Self {
        self.max_field_len = max;
        self
    }

    /// Reject records where any of those columns is missing or empty.
    pub fn with_required_fields(mut self, fields: Vec<usize>) -> Self {
        self.required_fields = fields;
        self
    }

    /// When `false`, only the number of findings is kept.
    ///
    /// Will default to `true`.
    pub fn with_track_errors(mut self, yes: bool) -> Self {
        self.track_errors = yes;
        self
    }

    /// Fix the number of fields every record must have, typically from a
    /// header. Otherwise the first checked record's count is used.
    pub fn expect_field_count(&mut self, count: usize) {
        debug!(count, "expected field count");
        self.expected_field_count = Some(count);
    }

    #[inline(always)]
    pub fn expected_field_count(&self) -> Option<usize> {
        self.expected_field_count
    }

    fn push(&mut self, kind: ValidationErrorKind, line: u64, field: Option<usize>, content: &[u8]) {
        trace!(line, ?field, %kind, "validation error");

        self.report.error_count += 1;

        if self.track_errors {
            self.report
                .errors
                .push(ValidationError::new(kind, line, field, content));
        }
    }

    fn check_quotes(&mut self, row: &Row<'_>) {
        let line = row.line_number();

        self.last_unbalanced = None;

        if row.has_unbalanced_quotes() {
            self.last_unbalanced = Some(line);
            self.push(
                ValidationErrorKind::UnbalancedQuotes,
                line,
                row.field_count().checked_sub(1),
                row.as_slice(),
            );
        }
    }

    fn check_characters(&mut self, line: u64, index: usize, value: &[u8]) {
        if memchr(0, value).is_some() || std::str::from_utf8(value).is_err() {
            self.push(ValidationErrorKind::InvalidCharacters, line, Some(index), value);
        }
    }

    /// Checks a header row. Its field count becomes the expected one, and
    /// it is not counted as a checked record.
    pub fn validate_header(&mut self, row: &Row<'_>) {
        let line = row.line_number();

        self.check_quotes(row);

        for (index, value) in row.iter().enumerate() {
            self.check_characters(line, index, &value);
        }

        self.expect_field_count(row.field_count());
    }

    /// Checks a single row, recording whatever is wrong with it.
    pub fn validate_row(&mut self, row: &Row<'_>) {
        let line = row.line_number();
        let count = row.field_count();

        self.report.records_checked += 1;
        self.check_quotes(row);

        match self.expected_field_count {
            None => self.expected_field_count = Some(count),
            Some(expected) if expected != count => {
                self.push(
                    ValidationErrorKind::InconsistentFieldCount {
                        expected,
                        found: count,
                    },
                    line,
                    None,
                    row.as_slice(),
                );
            }
            _ => (),
        }

        for (index, value) in row.iter().enumerate() {
            if let Some(max) = self.max_field_len {
                if value.len() > max {
                    self.push(
                        ValidationErrorKind::FieldTooLong {
                            max,
                            len: value.len(),
                        },
                        line,
                        Some(index),
                        &value,
                    );
                }
            }

            self.check_characters(line, index, &value);
        }

        for i in 0..self.required_fields.len() {
            let index = self.required_fields[i];

            if row.get(index).map_or(true, |value| value.is_empty()) {
                self.push(ValidationErrorKind::EmptyRequiredField, line, Some(index), b"");
            }
        }
    }

    /// Signals the input is exhausted. A quoted section left open on the
    /// very last line is reported as an unexpected end of file.
    pub fn end_of_input(&mut self) {
        let Some(line) = self.last_unbalanced.take() else {
            return;
        };

        debug!(line, "input ended inside a quoted section");

        if let Some(error) = self
            .report
            .errors
            .iter_mut()
            .rev()
            .find(|error| error.line == line && error.kind == ValidationErrorKind::UnbalancedQuotes)
        {
            error.kind = ValidationErrorKind::UnexpectedEndOfFile;
        }
    }

    #[inline(always)]
    pub fn report(&self) -> &ValidationReport {
        &self.report
    }

    pub fn into_report(self) -> ValidationReport {
        self.report
    }

    /// Forgets everything found so far, along with the expected field count.
    pub fn reset(&mut self) {
        self.expected_field_count = None;
        self.last_unbalanced = None;
        self.report = ValidationReport::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::options::Dialect;

    fn validate(validator: &mut Validator, lines: &[&str]) {
        validate_from(validator, 1, lines);
    }

    fn validate_from(validator: &mut Validator, first_line: u64, lines: &[&str]) {
        for (i, line) in lines.iter().enumerate() {
            let row = Row::with_dialect(line.as_bytes(), Dialect::default())
                .at_line(first_line + i as u64);
            validator.validate_row(&row);
        }

        validator.end_of_input();
    }

    fn kinds(report: &ValidationReport) -> Vec<(ValidationErrorKind, u64, Option<usize>)> {
        report
            .errors
            .iter()
            .map(|error| (error.kind, error.line, error.field))
            .collect()
    }

    #[test]
    fn test_valid_input() {
        let mut validator = Validator::new();
        validate(&mut validator, &["a,b", "\"c,d\",e", "f,\"g\"\"h\""]);

        let report = validator.report();
        assert!(report.is_valid());
        assert_eq!(report.records_checked, 3);
    }

    #[test]
    fn test_inconsistent_field_count() {
        let mut validator = Validator::new();
        validate(&mut validator, &["a,b", "c", "d,e,f", "g,h"]);

        assert_eq!(
            kinds(validator.report()),
            vec![
                (
                    ValidationErrorKind::InconsistentFieldCount {
                        expected: 2,
                        found: 1
                    },
                    2,
                    None
                ),
                (
                    ValidationErrorKind::InconsistentFieldCount {
                        expected: 2,
                        found: 3
                    },
                    3,
                    None
                ),
            ]
        );
        assert_eq!(validator.report().errors[1].content, "d,e,f");

        let mut validator = Validator::new();
        validator.expect_field_count(3);
        validate(&mut validator, &["a,b"]);
        assert_eq!(validator.report().error_count, 1);
    }

    #[test]
    fn test_unbalanced_quotes() {
        let mut validator = Validator::new();
        validate(&mut validator, &["a,\"b", "c,d", "\"e,f"]);

        assert_eq!(
            kinds(validator.report()),
            vec![
                (ValidationErrorKind::UnbalancedQuotes, 1, Some(1)),
                (ValidationErrorKind::UnexpectedEndOfFile, 3, Some(0)),
                (
                    ValidationErrorKind::InconsistentFieldCount {
                        expected: 2,
                        found: 1
                    },
                    3,
                    None
                ),
            ]
        );
    }

    #[test]
    fn test_header() {
        let mut validator = Validator::new();

        let header = Row::with_dialect(b"id,\"na\xffme", Dialect::default()).at_line(1);
        validator.validate_header(&header);
        validate_from(&mut validator, 2, &["1,a", "2"]);

        let report = validator.report();
        assert_eq!(report.records_checked, 2);
        assert_eq!(validator.expected_field_count(), Some(2));
        assert_eq!(
            kinds(report),
            vec![
                (ValidationErrorKind::UnbalancedQuotes, 1, Some(1)),
                (ValidationErrorKind::InvalidCharacters, 1, Some(1)),
                (
                    ValidationErrorKind::InconsistentFieldCount {
                        expected: 2,
                        found: 1
                    },
                    3,
                    None
                ),
            ]
        );
    }

    #[test]
    fn test_header_only_input() {
        let mut validator = Validator::new();

        let header = Row::with_dialect(b"a,\"b", Dialect::default()).at_line(1);
        validator.validate_header(&header);
        validator.end_of_input();

        assert_eq!(validator.report().records_checked, 0);
        assert_eq!(
            kinds(validator.report()),
            vec![(ValidationErrorKind::UnexpectedEndOfFile, 1, Some(1))]
        );
    }

    #[test]
    fn test_field_checks() {
        let mut validator = Validator::new()
            .with_max_field_len(Some(3))
            .with_required_fields(vec![0, 2]);

        validate(
            &mut validator,
            &["abc,\"defg\",x", ",b,c", "a,b\0,", "a,b"],
        );

        assert_eq!(
            kinds(validator.report()),
            vec![
                (ValidationErrorKind::FieldTooLong { max: 3, len: 4 }, 1, Some(1)),
                (ValidationErrorKind::EmptyRequiredField, 2, Some(0)),
                (ValidationErrorKind::InvalidCharacters, 3, Some(1)),
                (ValidationErrorKind::EmptyRequiredField, 3, Some(2)),
                (
                    ValidationErrorKind::InconsistentFieldCount {
                        expected: 3,
                        found: 2
                    },
                    4,
                    None
                ),
                (ValidationErrorKind::EmptyRequiredField, 4, Some(2)),
            ]
        );
        assert_eq!(validator.report().errors[0].content, "defg");
    }

    #[test]
    fn test_invalid_utf8() {
        let mut validator = Validator::new();
        let row = Row::with_dialect(b"ok,\xff\xfe", Dialect::default()).at_line(1);

        validator.validate_row(&row);

        let report = validator.into_report();
        assert_eq!(report.errors[0].kind, ValidationErrorKind::InvalidCharacters);
        assert_eq!(report.errors[0].field, Some(1));
    }

    #[test]
    fn test_untracked_errors() {
        let mut validator = Validator::new().with_track_errors(false);
        validate(&mut validator, &["a,b", "c", "\"d"]);

        let report = validator.report();
        assert!(!report.is_valid());
        assert!(report.errors.is_empty());
        assert_eq!(report.error_count, 3);
        assert_eq!(report.records_checked, 3);

        validator.reset();
        assert!(validator.report().is_valid());
        assert_eq!(validator.expected_field_count(), None);
    }

    #[test]
    fn test_display() {
        let error = ValidationError::new(
            ValidationErrorKind::InconsistentFieldCount {
                expected: 2,
                found: 3,
            },
            4,
            None,
            b"a,b,c",
        );
        assert_eq!(error.to_string(), "line 4: expected 2 fields but found 3");

        let error = ValidationError::new(ValidationErrorKind::EmptyRequiredField, 2, Some(1), b"");
        assert_eq!(error.to_string(), "line 2, field 1: required field is empty");
    }
}
