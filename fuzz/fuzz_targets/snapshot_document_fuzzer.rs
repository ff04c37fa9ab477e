//! Fuzz target for the state-snapshot document loader.
//!
//! `load` must reject malformed schema JSON and unresolved blob references
//! cleanly rather than panicking; it is fed an always-empty archive so every
//! well-formed-but-unresolvable `BlobRef` also exercises the resolve-failure
//! path.

#![no_main]

use gltrace_archive::MemoryArchive;
use gltrace_snapshot::load;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let archive = MemoryArchive::new();
    let _ = load(data, &archive);
});
