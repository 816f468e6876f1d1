use std::borrow::Cow;

use memchr::{memchr, memchr_iter};

use crate::options::Dialect;

const UTF8_BOM: &[u8] = b"\xef\xbb\xbf";

/// Returns the length of the UTF-8 BOM at the beginning of the slice, if any.
#[inline]
pub fn trim_bom(slice: &[u8]) -> usize {
    if slice.starts_with(UTF8_BOM) {
        UTF8_BOM.len()
    } else {
        0
    }
}

/// Splits a cell opening a quoted section into the section itself, escapes
/// still included, and whatever follows its closing quote. Returns `None` if
/// the cell does not start with a quote.
///
/// A section which is never closed runs until the end of the cell.
pub fn unquoted(cell: &[u8], quote: u8) -> Option<(&[u8], &[u8])> {
    let body = match cell.split_first() {
        Some((first, body)) if *first == quote => body,
        _ => return None,
    };

    let mut pos: usize = 0;

    while let Some(offset) = memchr(quote, &body[pos..]) {
        let at = pos + offset;

        // Doubled quote, still in the quoted section
        if body.get(at + 1) == Some(&quote) {
            pos = at + 2;
            continue;
        }

        return Some((&body[..at], &body[at + 1..]));
    }

    Some((body, &body[body.len()..]))
}

/// Collapses doubled quotes of an already unquoted cell into `out`.
///
/// A quote that is not followed by another one is kept as-is.
pub fn unescape_to(cell: &[u8], quote: u8, out: &mut Vec<u8>) {
    let mut last: usize = 0;
    let mut escaped = false;

    for offset in memchr_iter(quote, cell) {
        if escaped {
            // Second quote of a pair, which has already been written
            escaped = false;
            last = offset + 1;
            continue;
        }

        if offset + 1 < cell.len() && cell[offset + 1] == quote {
            out.extend_from_slice(&cell[last..offset + 1]);
            escaped = true;
        }
    }

    out.extend_from_slice(&cell[last..]);
}

/// Collapses doubled quotes of an already unquoted cell, only allocating
/// when the cell actually contains a quote.
#[inline]
pub fn unescape(cell: &[u8], quote: u8) -> Cow<'_, [u8]> {
    if memchr(quote, cell).is_none() {
        return Cow::Borrowed(cell);
    }

    let mut output = Vec::with_capacity(cell.len());
    unescape_to(cell, quote, &mut output);

    Cow::Owned(output)
}

#[inline]
fn trim_owned(mut bytes: Vec<u8>) -> Vec<u8> {
    let trimmed = bytes.trim_ascii();
    let start = trimmed.as_ptr() as usize - bytes.as_ptr() as usize;
    let end = start + trimmed.len();

    bytes.truncate(end);
    bytes.drain(..start);
    bytes
}

/// Removes leading & trailing ASCII whitespace without allocating.
#[inline]
pub fn trim_cow(cell: Cow<'_, [u8]>) -> Cow<'_, [u8]> {
    match cell {
        Cow::Borrowed(bytes) => Cow::Borrowed(bytes.trim_ascii()),
        Cow::Owned(bytes) => Cow::Owned(trim_owned(bytes)),
    }
}

/// Decodes a raw cell: the opening and closing quotes are dropped, doubled
/// quotes within the quoted section are collapsed, anything found after the
/// closing quote is kept verbatim, and whitespace is trimmed if the dialect
/// requires it.
#[inline]
pub fn decode_field(raw: &[u8], dialect: Dialect) -> Cow<'_, [u8]> {
    let value = match unquoted(raw, dialect.quote) {
        None => Cow::Borrowed(raw),
        Some((section, [])) => unescape(section, dialect.quote),
        Some((section, rest)) => {
            let mut output = Vec::with_capacity(section.len() + rest.len());
            unescape_to(section, dialect.quote, &mut output);
            output.extend_from_slice(rest);

            Cow::Owned(output)
        }
    };

    if dialect.trim_whitespace {
        trim_cow(value)
    } else {
        value
    }
}

/// Same as [`decode_field`] but writes the value at the end of `out`.
#[inline]
pub(crate) fn decode_field_to(raw: &[u8], dialect: Dialect, out: &mut Vec<u8>) {
    match unquoted(raw, dialect.quote) {
        Some((section, rest)) if !dialect.trim_whitespace => {
            unescape_to(section, dialect.quote, out);
            out.extend_from_slice(rest);
        }
        _ => out.extend_from_slice(&decode_field(raw, dialect)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(raw: &str, trim: bool) -> String {
        let dialect = Dialect {
            trim_whitespace: trim,
            ..Dialect::default()
        };

        String::from_utf8(decode_field(raw.as_bytes(), dialect).into_owned()).unwrap()
    }

    #[test]
    fn test_trim_bom() {
        assert_eq!(trim_bom(b"\xef\xbb\xbfname"), 3);
        assert_eq!(trim_bom(b"name"), 0);
        assert_eq!(trim_bom(b"\xef\xbb"), 0);
    }

    #[test]
    fn test_unquoted() {
        fn split(cell: &[u8]) -> Option<(&[u8], &[u8])> {
            unquoted(cell, b'"')
        }

        assert_eq!(split(b"\"test\""), Some((&b"test"[..], &b""[..])));
        assert_eq!(split(b"\"\""), Some((&b""[..], &b""[..])));
        assert_eq!(split(b"\"a\"\"b\""), Some((&b"a\"\"b"[..], &b""[..])));
        assert_eq!(split(b"\"ab\"cd"), Some((&b"ab"[..], &b"cd"[..])));
        assert_eq!(split(b"\"a\"b\"c"), Some((&b"a"[..], &b"b\"c"[..])));
        assert_eq!(split(b"\"test"), Some((&b"test"[..], &b""[..])));
        assert_eq!(split(b"\"te\"\"st"), Some((&b"te\"\"st"[..], &b""[..])));
        assert_eq!(split(b"\""), Some((&b""[..], &b""[..])));
        assert_eq!(split(b"test"), None);
        assert_eq!(split(b" \"test\""), None);
        assert_eq!(split(b""), None);
    }

    #[test]
    fn test_unescape() {
        assert_eq!(unescape(b"test", b'"'), Cow::Borrowed(&b"test"[..]));
        assert_eq!(
            unescape(b"a\"\"b", b'"'),
            Cow::<[u8]>::Owned(b"a\"b".to_vec())
        );
        assert_eq!(
            unescape(b"\"\"hello\"\"", b'"'),
            Cow::<[u8]>::Owned(b"\"hello\"".to_vec())
        );
        assert_eq!(
            unescape(b"\"\"\"\"", b'"'),
            Cow::<[u8]>::Owned(b"\"\"".to_vec())
        );
        assert_eq!(
            unescape(b"lone\"quote", b'"'),
            Cow::<[u8]>::Owned(b"lone\"quote".to_vec())
        );
    }

    #[test]
    fn test_decode_field() {
        assert_eq!(decode("hello", false), "hello");
        assert_eq!(decode("\"hello\"", false), "hello");
        assert_eq!(decode("\"a\"\"b\"", false), "a\"b");
        assert_eq!(decode("\"\"", false), "");
        assert_eq!(decode("\" x \"", false), " x ");
        assert_eq!(decode("\" x \"", true), "x");
        assert_eq!(decode("  \"x\"  ", true), "\"x\"");
        assert_eq!(decode("\" a\"\"b \"", true), "a\"b");
        assert_eq!(decode("   ", true), "");
        assert_eq!(decode("ab\"cd\"ef", false), "ab\"cd\"ef");
    }

    #[test]
    fn test_decode_unterminated_field() {
        assert_eq!(decode("\"", false), "");
        assert_eq!(decode("\"abc,def", false), "abc,def");
        assert_eq!(decode("\"a\"\"b", false), "a\"b");
        assert_eq!(decode("\" x ", true), "x");
    }

    #[test]
    fn test_decode_content_after_closing_quote() {
        assert_eq!(decode("\"ab\"cd", false), "abcd");
        assert_eq!(decode("\"a\"\"b\"c\"d", false), "a\"bc\"d");
        assert_eq!(decode("\"a\" ", false), "a ");
        assert_eq!(decode("\"a\" ", true), "a");
        assert_eq!(decode("\" a \"  ", true), "a");
    }

    #[test]
    fn test_decode_field_to() {
        let mut out = Vec::new();

        decode_field_to(b"\"a\"\"b\"", Dialect::default(), &mut out);
        decode_field_to(b"c", Dialect::default(), &mut out);
        decode_field_to(b"\"d\"e", Dialect::default(), &mut out);
        decode_field_to(b"\"f", Dialect::default(), &mut out);

        assert_eq!(out, b"a\"bcdef");
    }
}
