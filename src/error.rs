use std::{error, fmt, io, result, str::Utf8Error};

/// Operations that only some data sources are able to perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnsupportedOperation {
    /// Rewinding a source that cannot seek back, e.g. a network stream.
    Reset,
    /// Borrowing the whole input of a source that only sees it line by line.
    Buffer,
}

impl fmt::Display for UnsupportedOperation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Reset => f.write_str("reset"),
            Self::Buffer => f.write_str("zero-copy buffer access"),
        }
    }
}

/// The specific type of an error.
#[derive(Debug)]
#[non_exhaustive]
pub enum ErrorKind {
    /// Wrap a [std::io::Error].
    Io(io::Error),

    /// Indicate that a field was requested past the end of a record.
    OutOfRange {
        /// Requested field index
        index: usize,
        /// Actual number of fields of the record
        len: usize,
    },

    /// Indicate that the data source backing a reader cannot perform the
    /// requested operation.
    Unsupported(UnsupportedOperation),

    /// Indicate that a field could not be decoded as UTF-8.
    Utf8 {
        /// Index of the offending field
        field: usize,
        /// Underlying decoding error
        error: Utf8Error,
    },
}

/// An error occurring when reading/writing CSV data.
///
/// Malformed CSV is never reported through this type: see
/// [`ValidationReport`](crate::ValidationReport) instead.
#[derive(Debug)]
pub struct Error(ErrorKind);

impl Error {
    pub(crate) fn new(kind: ErrorKind) -> Self {
        Self(kind)
    }

    #[inline]
    pub(crate) fn out_of_range(index: usize, len: usize) -> Self {
        Self(ErrorKind::OutOfRange { index, len })
    }

    #[inline]
    pub(crate) fn unsupported(operation: UnsupportedOperation) -> Self {
        Self(ErrorKind::Unsupported(operation))
    }

    /// Return whether the wrapped error is a [`std::io::Error`].
    pub fn is_io_error(&self) -> bool {
        matches!(self.0, ErrorKind::Io(_))
    }

    /// Return whether the error comes from an out-of-range field access.
    pub fn is_out_of_range(&self) -> bool {
        matches!(self.0, ErrorKind::OutOfRange { .. })
    }

    /// Return whether the error comes from an operation the data source
    /// does not support.
    pub fn is_unsupported(&self) -> bool {
        matches!(self.0, ErrorKind::Unsupported(_))
    }

    /// Return a reference to the underlying [`ErrorKind`].
    pub fn kind(&self) -> &ErrorKind {
        &self.0
    }

    /// Unwraps the error into its underlying [`ErrorKind`].
    pub fn into_kind(self) -> ErrorKind {
        self.0
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Self(ErrorKind::Io(err))
    }
}

impl From<Error> for io::Error {
    fn from(err: Error) -> Self {
        match err.0 {
            ErrorKind::Io(err) => err,
            ErrorKind::Unsupported(_) => Self::new(io::ErrorKind::Unsupported, err),
            _ => Self::new(io::ErrorKind::InvalidData, err),
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self.0 {
            ErrorKind::Io(ref err) => Some(err),
            ErrorKind::Utf8 { ref error, .. } => Some(error),
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.0 {
            ErrorKind::Io(ref err) => err.fmt(f),
            ErrorKind::OutOfRange { index, len } => write!(
                f,
                "field index {} is out of range (record has {} fields)",
                index, len
            ),
            ErrorKind::Unsupported(operation) => {
                write!(f, "{} is not supported by this data source", operation)
            }
            ErrorKind::Utf8 { field, ref error } => {
                write!(f, "field {} is not valid UTF-8: {}", field, error)
            }
        }
    }
}

/// A type alias for `Result<T, sepscan::Error>`.
pub type Result<T> = result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(
            Error::out_of_range(3, 3).to_string(),
            "field index 3 is out of range (record has 3 fields)"
        );
        assert_eq!(
            Error::unsupported(UnsupportedOperation::Reset).to_string(),
            "reset is not supported by this data source"
        );
    }

    #[test]
    fn test_into_io_error() {
        let err: io::Error = Error::unsupported(UnsupportedOperation::Buffer).into();
        assert_eq!(err.kind(), io::ErrorKind::Unsupported);

        let err: io::Error = Error::out_of_range(1, 0).into();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);

        let err: io::Error = Error::from(io::Error::other("boom")).into();
        assert_eq!(err.kind(), io::ErrorKind::Other);
    }
}
