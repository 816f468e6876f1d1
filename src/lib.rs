/*!
The `sepscan` crate provides a tokenizer for delimited text (CSV, TSV and
the like) that splits lines into fields without copying them, computing field
positions only when someone actually asks for a field.

It is built around three layers:

1. a line splitter finding record boundaries, recognizing `\n`, `\r` and
   `\r\n` alike, and never looking at fields at all.
2. a field tokenizer finding the extent of every field of a single line,
   using [`memchr`](https://docs.rs/memchr/latest/memchr/) and SIMD string
   searching to jump from one structural character to the next.
3. row views ([`Row`]) borrowing the buffer they were read from and caching
   their field positions the first time they are needed.

On top of them sit an enumerator over in-memory buffers ([`Rows`]), a
streaming [`Reader`] able to read from anything implementing
[`std::io::Read`], an optional validation layer and a [`Writer`].

# Examples

*Enumerating the rows of an in-memory buffer*

```
use sepscan::{ParseOptions, Rows};

let data = b"name,age\njohn,30\nlucy,25";

for row in Rows::new(data, &ParseOptions::default()) {
    // Positions are only computed here
    dbg!(row.field(0)?);
}
```

*Reading a file while amortizing allocations*

```
use std::fs::File;
use sepscan::{ByteRecord, Reader};

let mut reader = Reader::from_reader(File::open("data.csv")?);
let mut record = ByteRecord::new();

while reader.read_record(&mut record)? {
    for cell in record.iter() {
        dbg!(cell);
    }
}
```

*Using a builder to configure your reader*

```
use std::fs::File;
use sepscan::ReaderBuilder;

let mut reader = ReaderBuilder::new()
    .delimiter(b'\t')
    .validate(true)
    .max_field_len(Some(1024))
    .from_reader(File::open("data.tsv")?);

let count = reader.count_records()?;

if let Some(report) = reader.validation() {
    for error in report.errors.iter() {
        eprintln!("{}", error);
    }
}
```

*Counting records as fast as possible*

```
use sepscan::{count_records, ParseOptions};

println!("{}", count_records(b"name\njohn\nlucy\n", &ParseOptions::default()));
```

# Dialect

Fields are separated by a single-byte delimiter and can be wrapped in a
single-byte quote char, in which case they can contain the delimiter
literally. A doubled quote char inside a quoted field stands for one literal
quote char.

A quoted section can only be opened by a quote char found at the very
beginning of a field. Quote chars found anywhere else are regular content,
so that `ab"cd"ef` is read as-is. Whatever follows the closing quote of a
field is kept too, so that `"ab"cd` is read as `abcd`.

Quoted fields cannot span multiple lines: line breaks are always record
boundaries.

# Malformed data

Malformed data never makes the tokenizer fail. A line ending inside a quoted
section closes its last field anyway, without the opening quote, and records
may have any number of fields. If you need to know about those problems, enable validation (see
[`ReaderBuilder::validate`]) and inspect the resulting [`ValidationReport`].

Only programming errors, like requesting a field past the end of a record or
rewinding a stream, are reported as [`Error`]s.

# Supported targets

- On `x86_64` targets, `sse2` instructions are used.
- On `aarch64` targets, `neon` instructions are used.
- Everywhere else, the library will fallback to
  [SWAR](https://en.wikipedia.org/wiki/SWAR) techniques through the
  [`memchr`](https://docs.rs/memchr/latest/memchr/) crate.

# Design notes

## Lazy positions

A [`Row`] only stores the line it was read from. The first time a field or
the field count is requested, the line is scanned once and the positions of
its fields are cached in the row. Up to [`INLINE_FIELDS`] positions are
stored inline, which means reading a typical row never allocates.

Values are decoded on access: outer quotes are stripped, doubled quotes
collapsed and whitespace trimmed if requested. Decoding only allocates when
doubled quotes had to be collapsed.

## Two-speed search

Lines without any quote char are split using `memchr_iter` over the
delimiter only. Other lines go through a small state machine using an
amortized variant of the [`memchr`](https://docs.rs/memchr/latest/memchr/)
routines outside of quoted sections, where move masks containing more than a
single match are kept and consumed progressively, and plain `memchr` inside
of them to find the closing quote as fast as possible.

## Logging

This crate emits [`tracing`](https://docs.rs/tracing/latest/tracing/) events
(headers, resets, validation findings and, at the `trace` level, every record)
but never installs a subscriber.
*/
#[allow(unused_macros)]
macro_rules! brec {
    () => {{
        $crate::records::ByteRecord::new()
    }};

    ($($x: expr),*) => {{
        let mut r = $crate::records::ByteRecord::new();

        $(
            r.push_field($x.as_bytes());
        )*

        r
    }};
}

mod buffer;
mod debug;
mod error;
mod options;
mod reader;
mod records;
mod rows;
mod searcher;
mod source;
mod splitter;
mod tokenizer;
mod utils;
mod validation;
mod writer;

pub use error::{Error, ErrorKind, Result, UnsupportedOperation};
pub use options::{Dialect, ParseOptions};
pub use reader::{ByteRecordsIter, Reader, ReaderBuilder};
pub use records::{ByteRecord, ByteRecordIter, RawRowIter, Row, RowIter};
pub use rows::{count_records, EnumeratorState, Rows};
pub use searcher::{searcher_simd_instructions, Indices, Searcher};
pub use source::{Line, SliceSource, Source, StreamSource};
pub use splitter::{
    count_lines, count_non_empty_lines, find_line_end, lines, skip_line_ending, LineSpan, Lines,
};
pub use tokenizer::{read_record, scan, tokenize, FieldSpan, FieldTable, INLINE_FIELDS};
pub use utils::{decode_field, trim_bom, unescape, unquoted};
pub use validation::{ValidationError, ValidationErrorKind, ValidationReport, Validator};
pub use writer::{format_record, Writer};
