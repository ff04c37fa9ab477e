//! Cross-crate property: a trace file written by `gltrace-file::TraceWriter`
//! and reopened by `gltrace-file::TraceReader` yields back exactly the
//! packets written, in order, with a frame index matching the swap count
//! (§8 properties "packet round-trip" and "frame index O(1) seek").

use gltrace_file::{ReadOutcome, TraceReader};
use gltrace_harness::build_synthetic_trace;

#[test]
fn packet_stream_round_trips_and_frame_index_matches_swap_count() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("fixture.gltrace");
    let stats = build_synthetic_trace(&path, 4).unwrap();

    let mut reader = TraceReader::open(&path).unwrap();
    assert_eq!(reader.max_frame_index(), stats.frame_count);
    assert!(reader.can_quickly_seek_forward());

    let mut packet_count = 0u64;
    loop {
        match reader.read_next_packet().unwrap() {
            ReadOutcome::Eof => break,
            ReadOutcome::Packet(_) => packet_count += 1,
        }
    }
    assert_eq!(packet_count, stats.packet_count);
}

#[test]
fn seek_to_frame_lands_on_first_packet_of_that_frame() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("fixture.gltrace");
    build_synthetic_trace(&path, 4).unwrap();

    let mut reader = TraceReader::open(&path).unwrap();
    reader.seek_to_frame(2).unwrap();
    let ReadOutcome::Packet(packet) = reader.read_next_packet().unwrap() else {
        panic!("expected a call packet immediately after seeking to frame 2");
    };
    // Each frame starts with glClearColor (entrypoint id 3).
    assert_eq!(packet.entrypoint_id.0, 3);
}
