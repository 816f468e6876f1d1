#![no_main]

use libfuzzer_sys::fuzz_target;

use sepscan::{ByteRecord, ReaderBuilder};

fuzz_target!(|data: &[u8]| {
    let mut builder = ReaderBuilder::new();
    builder.validate(true).buffer_capacity(7);

    let mut streaming = builder.from_reader(data);
    let mut in_memory = builder.from_bytes(data);

    let mut streamed_record = ByteRecord::new();
    let mut record = ByteRecord::new();

    while streaming.read_record(&mut streamed_record).unwrap() {
        assert!(in_memory.read_record(&mut record).unwrap());
        assert_eq!(streamed_record, record);
    }

    assert!(!in_memory.read_record(&mut record).unwrap());
    assert_eq!(streaming.validation(), in_memory.validation());
});
