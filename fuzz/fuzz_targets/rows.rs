#![no_main]

use libfuzzer_sys::fuzz_target;

use sepscan::{count_records, ParseOptions, Rows};

fuzz_target!(|data: &[u8]| {
    let options = ParseOptions::default();
    let mut count: u64 = 0;

    for row in Rows::new(data, &options) {
        for i in 0..row.field_count() {
            row.field(i).unwrap();
        }

        assert!(row.field(row.field_count()).is_err());
        count += 1;
    }

    assert_eq!(count, count_records(data, &options));
});
