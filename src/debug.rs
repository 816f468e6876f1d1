use std::fmt;

/// Debug representation of raw bytes, escaping anything that is not
/// printable ASCII.
pub struct Bytes<'a>(pub &'a [u8]);

impl fmt::Debug for Bytes<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "\"{}\"", self.0.escape_ascii())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bytes() {
        assert_eq!(format!("{:?}", Bytes(b"a,\"b\"\r\n")), "\"a,\\\"b\\\"\\r\\n\"");
    }
}
