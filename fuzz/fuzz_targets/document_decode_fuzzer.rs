//! Fuzz target for the JSON document codec's `doc_decode`.
//!
//! Exercises `serde_json` parsing plus the document-to-packet reconstruction
//! path against arbitrary (likely non-UTF-8) byte strings.

#![no_main]

use gltrace_format::doc_decode;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else { return };
    let _ = doc_decode(text);
});
