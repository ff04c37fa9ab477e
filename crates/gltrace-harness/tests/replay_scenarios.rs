//! Cross-crate end-to-end scenarios named verbatim in §8's "seeds for
//! tests": a full replay run against a deterministic driver double, the
//! handle-remap scenario (E2E #5), and trim correctness (E2E #4).

use gltrace_file::TraceReader;
use gltrace_harness::{build_handle_remap_trace, build_synthetic_trace};
use gltrace_harness::fixtures::{NullWindow, RecordingDriver};
use gltrace_replay::{EngineConfig, EngineState, ReplayEngine};
use gltrace_trim::{trim, TrimOptions};
use gltrace_types::HandleNamespace;

#[test]
fn full_replay_reaches_eof_with_no_divergences() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("fixture.gltrace");
    let stats = build_synthetic_trace(&path, 6).unwrap();

    let mut driver = RecordingDriver::new(1000);
    let mut window = NullWindow::default();
    let mut engine = ReplayEngine::open(&path, &mut driver, &mut window, EngineConfig::default()).unwrap();
    engine.run_to_completion().unwrap();

    assert_eq!(engine.state(), EngineState::AtEof);
    assert_eq!(engine.stats().frames, stats.frame_count);
    assert!(engine.diagnostics().is_empty(), "a no-op driver must never diverge from itself");
}

#[test]
fn handle_remap_translates_recorded_handle_to_live_handle() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("fixture.gltrace");
    let trace_handle = 7u32;
    build_handle_remap_trace(&path, trace_handle).unwrap();

    let mut driver = RecordingDriver::new(13);
    let mut window = NullWindow::default();
    let mut engine = ReplayEngine::open(&path, &mut driver, &mut window, EngineConfig::default()).unwrap();
    engine.run_to_completion().unwrap();

    assert_eq!(engine.state(), EngineState::AtEof);
    assert!(engine.diagnostics().is_empty(), "a known handle must never report HandleUnknown");
    assert_eq!(engine.handle_map().live(HandleNamespace::Texture, u64::from(trace_handle)), Some(13));

    let bind_params = driver.last_bind_texture_params.expect("glBindTexture must have dispatched");
    assert_eq!(
        bind_params[1].value_bits, 13,
        "glBindTexture must receive the live handle 13, not the recorded trace handle 7"
    );
}

#[test]
fn trim_produces_a_trace_that_replays_exactly_the_requested_frame_range() {
    let dir = tempfile::tempdir().unwrap();
    let source_path = dir.path().join("source.gltrace");
    let trimmed_path = dir.path().join("trimmed.gltrace");
    build_synthetic_trace(&source_path, 20).unwrap();

    let mut driver = RecordingDriver::new(1000);
    let mut window = NullWindow::default();
    let engine =
        ReplayEngine::open(&source_path, &mut driver, &mut window, EngineConfig::default()).unwrap();

    // Frames 0..4 fall before the synthetic fixture's one-off blend-enable
    // frame (frame_count / 2 = 10), so every copied frame carries the same
    // packet shape and `packets_copied` is exactly predictable.
    let start_frame = 0;
    let length_frames = 5;
    let source_archive = gltrace_archive::MemoryArchive::new();
    let stats = trim(
        &source_path,
        &trimmed_path,
        &engine,
        &source_archive,
        start_frame,
        length_frames,
        TrimOptions::default(),
    )
    .unwrap();

    assert_eq!(stats.frames_copied, length_frames);
    assert_eq!(stats.packets_copied, length_frames * 5);

    let mut reader = TraceReader::open(&trimmed_path).unwrap();
    assert_eq!(reader.max_frame_index(), length_frames);

    let mut trimmed_driver = RecordingDriver::new(1000);
    let mut trimmed_window = NullWindow::default();
    let mut trimmed_engine = ReplayEngine::open(
        &trimmed_path,
        &mut trimmed_driver,
        &mut trimmed_window,
        EngineConfig::default(),
    )
    .unwrap();
    trimmed_engine.run_to_completion().unwrap();

    assert_eq!(trimmed_engine.state(), EngineState::AtEof);
    assert_eq!(trimmed_engine.stats().frames, length_frames);
}
