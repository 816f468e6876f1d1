#![no_main]

use libfuzzer_sys::fuzz_target;

use sepscan::{format_record, tokenize, ParseOptions};

fuzz_target!(|data: &[u8]| {
    let options = ParseOptions::default();
    let fields = data.split(|byte| *byte == b';').collect::<Vec<_>>();

    let line = format_record(&fields, &options);

    assert_eq!(tokenize(&line, &options), fields);
});
