//! Fuzz testing for the JSON logger's field pairing and line framing.
//!
//! Whatever the message and fields, one call must produce exactly one line
//! holding one JSON object whose envelope cannot be overridden by fields.
//!
//! # Running the Fuzz Tests
//!
//! ```bash
//! cargo +nightly fuzz run fuzz_log_record -- -max_total_time=60
//! ```

#![no_main]

use admission_pipeline::log::{JsonLogger, Logger, MESSAGE_KEY, TIMESTAMP_KEY};
use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use serde_json::Value;

#[derive(Debug, Arbitrary)]
struct Input<'a> {
    message: &'a str,
    fields: Vec<&'a str>,
}

fuzz_target!(|input: Input<'_>| {
    let logger = JsonLogger::new(Vec::new());
    logger
        .log(input.message, &input.fields)
        .expect("writing to a Vec cannot fail");
    let output = logger.into_inner();

    assert_eq!(output.last(), Some(&b'\n'));
    assert_eq!(output.iter().filter(|b| **b == b'\n').count(), 1);

    let record: Value = serde_json::from_slice(&output).expect("record is valid JSON");
    let object = record.as_object().expect("record is a JSON object");
    assert_eq!(object[MESSAGE_KEY], input.message);
    assert!(object[TIMESTAMP_KEY].is_string());

    for pair in input.fields.chunks_exact(2) {
        let key = pair[0];
        if key == MESSAGE_KEY || key == TIMESTAMP_KEY {
            continue;
        }
        // Later duplicates win when the line is parsed back
        let last = input
            .fields
            .chunks_exact(2)
            .rfind(|p| p[0] == key)
            .map(|p| p[1]);
        assert_eq!(object.get(key).and_then(Value::as_str), last);
    }
});
