//! Fuzz target for the ZIP-shape blob archive container parser.
//!
//! `MemoryArchive::deserialize` walks a footer-directed central directory
//! over attacker-controlled byte offsets; it must reject truncated or
//! inconsistent input rather than index out of bounds.

#![no_main]

use gltrace_archive::MemoryArchive;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let _ = MemoryArchive::deserialize(data);
});
