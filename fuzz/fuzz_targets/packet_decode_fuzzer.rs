//! Fuzz target for the binary packet codec's `decode`/`peek_size`.
//!
//! Decoding arbitrary bytes must never panic; every malformed input is
//! rejected with a `FormatError`.

#![no_main]

use gltrace_format::{decode, peek_size, DEFAULT_SIZE_CEILING};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let _ = peek_size(data, DEFAULT_SIZE_CEILING);
    let _ = decode(data, DEFAULT_SIZE_CEILING);
});
