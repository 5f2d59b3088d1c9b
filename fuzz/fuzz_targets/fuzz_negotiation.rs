//! Fuzz testing for the content negotiation predicates.
//!
//! Arbitrary methods and header bytes must never panic, and the predicates
//! must agree with their documented pass rules:
//!
//! - Retrieval methods (`GET`, `HEAD`) always pass the `Content-Type` check
//! - A value exactly equal to the expected type always passes
//! - `*/*` always passes the `Accept` check
//!
//! # Running the Fuzz Tests
//!
//! ```bash
//! cargo +nightly fuzz run fuzz_negotiation -- -max_total_time=60
//! ```

#![no_main]

use admission_pipeline::middleware::negotiate::ANY_MEDIA_TYPE;
use admission_pipeline::middleware::{accept_acceptable, content_type_acceptable};
use arbitrary::Arbitrary;
use axum::http::{HeaderValue, Method};
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Arbitrary)]
struct Input<'a> {
    method: &'a [u8],
    header: Option<&'a [u8]>,
    expected: &'a str,
}

fuzz_target!(|input: Input<'_>| {
    let Ok(method) = Method::from_bytes(input.method) else {
        return;
    };
    let header = match input.header {
        Some(bytes) => match HeaderValue::from_bytes(bytes) {
            Ok(value) => Some(value),
            Err(_) => return,
        },
        None => None,
    };

    let content_type_ok = content_type_acceptable(&method, header.as_ref(), input.expected);
    let accept_ok = accept_acceptable(header.as_ref(), input.expected);

    if method == Method::GET || method == Method::HEAD {
        assert!(content_type_ok);
    }

    let header_str = header.as_ref().and_then(|v| v.to_str().ok());
    if header_str == Some(input.expected) || header.is_none() {
        assert!(content_type_ok);
        assert!(accept_ok);
    }
    if header_str == Some(ANY_MEDIA_TYPE) {
        assert!(accept_ok);
    }
});
