//! Replay engine main loop and state machine (§4.H.1, §4.H.4, §4.H.5).
//!
//! Formal states: `Idle -> ProcessingFrame <-> PendingWindowResize ->
//! AtFrameBoundary -> {ProcessingFrame | AtEof | HardFailure}`.
//! `ProcessingFrame` dequeues one packet and dispatches it; `AtFrameBoundary`
//! fires right after a swap packet and is the only point a snapshot may be
//! taken or applied (§5: "no snapshot, seek, trim, or cross-frame divergence
//! report may straddle a swap").

use std::path::{Path, PathBuf};

use gltrace_file::{ReadOutcome, TraceReader};
use gltrace_format::{PacketType, TracePacket};
use gltrace_snapshot::GlDriver;
use gltrace_types::{entrypoint_by_id, entrypoint_by_name};
use tracing::{info, warn};

use crate::{
    config::EngineConfig,
    dispatch::dispatch,
    error::{Divergence, EngineError, ErrorLocation},
    handle_map::HandleMap,
    window::WindowCollaborator,
};

/// Observable state of the replay engine (§4.H.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// Constructed, not yet driven.
    Idle,
    /// Dequeuing and dispatching packets within the current frame.
    ProcessingFrame,
    /// Draining pending GL commands and waiting on a window resize
    /// confirmation (§4.H.4).
    PendingWindowResize,
    /// Just processed a swap packet; the only point snapshots/seeks/trims
    /// may act.
    AtFrameBoundary,
    /// The reader reached its EOF packet; the run finished cleanly.
    AtEof,
    /// An unrecoverable error was observed; the engine stops dispatching.
    HardFailure,
    /// The engine was torn down (clean close or cancellation).
    Closed,
}

/// One recorded divergence, with the location it was observed at.
#[derive(Debug, Clone)]
pub struct DivergenceReport {
    /// Where the divergence was observed.
    pub location: ErrorLocation,
    /// What diverged.
    pub divergence: Divergence,
}

/// Per-run counters a caller (the CLI's `info`/`replay` subcommands) reads
/// back after a run finishes.
#[derive(Debug, Clone, Default)]
pub struct EngineStats {
    /// Calls dispatched.
    pub calls: u64,
    /// Swap packets observed (frames completed).
    pub frames: u64,
    /// Divergences recorded (not necessarily fatal).
    pub divergences: u64,
}

/// Both digest flavors computed at a single swap fence (§4.H.3): a CRC of
/// the backbuffer and a per-component unsigned sum robust to multisample
/// resolve ordering. The engine retains one of these per completed frame so
/// a caller can write one line per frame (`--hash_output`/`--sum_output`)
/// instead of a single whole-run value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameDigest {
    /// CRC of the backbuffer at this swap.
    pub crc: u64,
    /// Per-component unsigned sum of the backbuffer at this swap.
    pub sum: u64,
}

/// Drives a packet stream against a live GL context (§4.H).
///
/// Owns the reader, the replay-time handle map, the driver and window
/// collaborators, and the engine's configuration. Single-threaded: nothing
/// here may be called concurrently from another thread (§5).
pub struct ReplayEngine<'a> {
    reader: TraceReader,
    handle_map: HandleMap,
    driver: &'a mut dyn GlDriver,
    window: &'a mut dyn WindowCollaborator,
    config: EngineConfig,
    state: EngineState,
    frame: u64,
    call_counter_at_last_boundary: u64,
    cancel_requested: bool,
    diagnostics: Vec<DivergenceReport>,
    stats: EngineStats,
    frame_digests: Vec<FrameDigest>,
    pending_implied_size: Option<(u32, u32)>,
}

impl<'a> ReplayEngine<'a> {
    /// Open `trace_path` and construct an engine ready to drive it.
    pub fn open(
        trace_path: impl AsRef<Path>,
        driver: &'a mut dyn GlDriver,
        window: &'a mut dyn WindowCollaborator,
        config: EngineConfig,
    ) -> Result<Self, EngineError> {
        config.validate()?;
        let reader = TraceReader::open(trace_path)?;
        Ok(Self {
            reader,
            handle_map: HandleMap::new(),
            driver,
            window,
            config,
            state: EngineState::Idle,
            frame: 0,
            call_counter_at_last_boundary: 0,
            cancel_requested: false,
            diagnostics: Vec::new(),
            stats: EngineStats::default(),
            frame_digests: Vec::new(),
            pending_implied_size: None,
        })
    }

    /// Current engine state.
    #[must_use]
    pub fn state(&self) -> EngineState {
        self.state
    }

    /// Every divergence observed so far, in observation order.
    #[must_use]
    pub fn diagnostics(&self) -> &[DivergenceReport] {
        &self.diagnostics
    }

    /// Run counters accumulated so far.
    #[must_use]
    pub fn stats(&self) -> &EngineStats {
        &self.stats
    }

    /// One [`FrameDigest`] per completed frame, in frame order, retained
    /// whenever `check_frame_digest` is enabled. The CLI's
    /// `--hash_output`/`--sum_output` write one line per entry.
    #[must_use]
    pub fn frame_digests(&self) -> &[FrameDigest] {
        &self.frame_digests
    }

    /// The replay-time handle map, for an inspector or the trim writer to
    /// read (e.g. `find`'s `--remap` flag, §R.4).
    #[must_use]
    pub fn handle_map(&self) -> &HandleMap {
        &self.handle_map
    }

    /// The live driver collaborator, for the trim writer to capture a
    /// snapshot from at a paused frame boundary (§4.I step 1).
    #[must_use]
    pub fn driver(&self) -> &dyn GlDriver {
        self.driver
    }

    /// Request cooperative cancellation; takes effect at the next packet or
    /// frame boundary (§5).
    pub fn request_cancel(&mut self) {
        self.cancel_requested = true;
    }

    /// Drive the engine until it reaches `AtEof` or `HardFailure`.
    ///
    /// Each packet is dispatched in turn; a swap packet transitions through
    /// `AtFrameBoundary` where the cancellation flag is checked, and an
    /// implied-window-resize check runs (§4.H.4).
    pub fn run_to_completion(&mut self) -> Result<(), EngineError> {
        loop {
            match self.state {
                EngineState::AtEof | EngineState::HardFailure | EngineState::Closed => return Ok(()),
                _ => self.step()?,
            }
        }
    }

    /// Advance the engine by exactly one packet (or one frame-boundary
    /// transition). Used by interactive stepping and by tests that need
    /// fine-grained control.
    pub fn step(&mut self) -> Result<(), EngineError> {
        if self.cancel_requested {
            self.state = EngineState::Closed;
            return Err(EngineError::CancelRequested(self.location()));
        }

        match self.state {
            EngineState::Idle | EngineState::AtFrameBoundary => {
                self.state = EngineState::ProcessingFrame;
                Ok(())
            },
            EngineState::ProcessingFrame => self.process_next_packet(),
            EngineState::PendingWindowResize => self.resume_after_resize(),
            EngineState::AtEof | EngineState::HardFailure | EngineState::Closed => Ok(()),
        }
    }

    fn location(&self) -> ErrorLocation {
        ErrorLocation { call_counter: self.call_counter_at_last_boundary, frame: self.frame }
    }

    fn process_next_packet(&mut self) -> Result<(), EngineError> {
        let outcome = self.reader.read_next_packet()?;
        let packet = match outcome {
            ReadOutcome::Eof => {
                self.state = EngineState::AtEof;
                return Ok(());
            },
            ReadOutcome::Packet(p) => p,
        };

        self.call_counter_at_last_boundary = packet.call_counter;

        if packet.packet_type == PacketType::InternalTraceCommand {
            self.apply_internal_command(&packet)?;
            return Ok(());
        }

        let Some(entrypoint) = entrypoint_by_id(packet.entrypoint_id) else {
            self.state = EngineState::HardFailure;
            return Err(EngineError::File(gltrace_file::IoError::PacketFormat {
                offset: 0,
                call_counter: Some(packet.call_counter),
                source: gltrace_format::FormatError::UnknownEntrypointId(packet.entrypoint_id.0),
            }));
        };

        let location = self.location();
        let outcome = dispatch(
            entrypoint,
            &packet,
            &mut self.handle_map,
            self.driver,
            self.config.divergence.check_return_value,
            self.config.divergence.check_out_parameters,
            location,
        );

        let dispatch_outcome = match outcome {
            Ok(o) => o,
            Err(EngineError::HandleUnknown { handle, namespace, location }) => {
                warn!(handle, ?namespace, ?location, "unknown trace handle, hard failure");
                self.state = EngineState::HardFailure;
                return Err(EngineError::HandleUnknown { handle, namespace, location });
            },
            Err(err) => {
                self.state = EngineState::HardFailure;
                return Err(err);
            },
        };

        self.stats.calls += 1;
        for divergence in dispatch_outcome.divergences {
            self.record_divergence(location, divergence)?;
        }

        if !self.config.replay.benchmark {
            if let Some(get_error) = entrypoint_by_name("glGetError") {
                let _ = self.driver.invoke(get_error.id, &[], &mut []);
            }
        }

        if entrypoint.is_swap() {
            self.on_swap(location)?;
        }

        Ok(())
    }

    fn record_divergence(
        &mut self,
        location: ErrorLocation,
        divergence: Divergence,
    ) -> Result<(), EngineError> {
        self.stats.divergences += 1;
        if self.config.divergence.strict {
            self.state = EngineState::HardFailure;
            return Err(EngineError::ReplayDivergence { location, divergence });
        }
        self.diagnostics.push(DivergenceReport { location, divergence });
        Ok(())
    }

    fn on_swap(&mut self, location: ErrorLocation) -> Result<(), EngineError> {
        self.frame += 1;
        self.stats.frames += 1;

        if self.config.divergence.check_frame_digest {
            let crc = self
                .driver
                .backbuffer_digest_crc()
                .map_err(|e| EngineError::Driver(e.to_string()))?;
            let sum = self
                .driver
                .backbuffer_digest_sum()
                .map_err(|e| EngineError::Driver(e.to_string()))?;
            // The recorded digest would normally be read from the packet's
            // key-value side channel and compared here; absent one, there
            // is nothing to compare against, but the computed digest is
            // still retained for the caller to write out per frame.
            self.frame_digests.push(FrameDigest { crc, sum });
        }

        self.state = EngineState::AtFrameBoundary;

        for event in self.window.pump_events() {
            if let crate::window::WindowEvent::Configured { width, height } = event {
                self.pending_implied_size = Some((width, height));
            }
        }

        if let Some((width, height)) = self.pending_implied_size.take() {
            self.state = EngineState::PendingWindowResize;
            self.window.request_resize(width, height).map_err(EngineError::Window)?;
            return Ok(());
        }

        let _ = location;
        Ok(())
    }

    fn resume_after_resize(&mut self) -> Result<(), EngineError> {
        for event in self.window.pump_events() {
            if matches!(event, crate::window::WindowEvent::Configured { .. }) {
                self.state = EngineState::AtFrameBoundary;
                return Ok(());
            }
        }
        Ok(())
    }

    /// Apply a trim-inserted internal command (currently only
    /// `state_snapshot`, §4.I step 3): load the snapshot blob from the
    /// reader's embedded archive, restore it, and fold the resulting
    /// handles into the engine's handle map.
    fn apply_internal_command(&mut self, packet: &TracePacket) -> Result<(), EngineError> {
        let Some(blob_id) = packet.state_snapshot_blob_id() else { return Ok(()) };
        let Some(archive) = self.reader.archive() else {
            return Err(EngineError::Snapshot(gltrace_snapshot::SnapshotError::UnresolvedBlobRef(
                blob_id.to_string(),
            )));
        };
        let bytes = gltrace_archive::BlobArchive::get(archive, gltrace_archive::BlobId(blob_id))
            .map_err(gltrace_snapshot::SnapshotError::from)?;
        let snapshot = gltrace_snapshot::load(&bytes, archive)?;
        let restored = gltrace_snapshot::restore(
            self.driver,
            &snapshot,
            gltrace_snapshot::RestoreOptions {
                disable_frontbuffer_restore: self.config.disable_frontbuffer_restore,
            },
        )?;
        self.handle_map.merge_restore(&restored);
        info!(blob_id, "applied internal state-snapshot command");
        Ok(())
    }

    /// Seek to frame `target` (§4.H.5). Without a registered keyframe this
    /// always falls back to the reader's own rewind-and-scan; a keyframe
    /// (a prior trim output whose first payload is a state snapshot) would
    /// let a caller skip straight to it and replay forward from there with
    /// outputs suppressed — that composition is `gltrace-cli`'s
    /// responsibility, since it is the layer that knows the keyframe
    /// filename convention (§GLOSSARY "Keyframe").
    pub fn seek_to_frame(&mut self, target: u64) -> Result<(), EngineError> {
        self.reader.seek_to_frame(target)?;
        self.frame = target;
        self.state = EngineState::AtFrameBoundary;
        Ok(())
    }

    /// Path the reader was opened from isn't retained; callers that need it
    /// for diagnostics should keep their own copy. Exposed for symmetry
    /// with [`Self::seek_to_frame`]'s frame-index queries.
    #[must_use]
    pub fn max_frame_index(&self) -> u64 {
        self.reader.max_frame_index()
    }
}

/// Resolve a keyframe file path by the naming convention trim output uses:
/// `<trace-stem>.trim.<frame>.gltrace` alongside the original trace.
/// `gltrace-trim` writes keyframes under this convention; `gltrace-cli`'s
/// `replay` subcommand looks for them before falling back to a cold seek.
#[must_use]
pub fn keyframe_path_for(trace_path: &Path, frame: u64) -> PathBuf {
    let stem = trace_path.file_stem().and_then(|s| s.to_str()).unwrap_or("trace");
    trace_path.with_file_name(format!("{stem}.trim.{frame}.gltrace"))
}

#[cfg(test)]
mod tests {
    use gltrace_archive::MemoryArchive;
    use gltrace_format::TracePacket;
    use gltrace_snapshot::DriverError;
    use gltrace_types::EntrypointId;

    use super::*;
    use crate::window::WindowEvent;

    struct NoOpDriver;
    impl GlDriver for NoOpDriver {
        fn invoke(
            &mut self,
            _entrypoint_id: EntrypointId,
            _params: &[gltrace_format::Param],
            _client_memory: &mut [u8],
        ) -> Result<Option<u64>, DriverError> {
            Ok(None)
        }
        fn backbuffer_digest_crc(&self) -> Result<u64, DriverError> {
            Ok(0)
        }

        fn backbuffer_digest_sum(&self) -> Result<u64, DriverError> {
            Ok(0)
        }

        fn enumerate(&self, _namespace: gltrace_types::HandleNamespace) -> Vec<u64> {
            Vec::new()
        }
        fn capture_context(&self, _h: u64) -> Result<gltrace_snapshot::schema::ContextRecord, DriverError> {
            unreachable!()
        }
        fn capture_texture(&self, _h: u64) -> Result<gltrace_snapshot::schema::TextureRecord, DriverError> {
            unreachable!()
        }
        fn capture_buffer(&self, _h: u64) -> Result<gltrace_snapshot::schema::BufferRecord, DriverError> {
            unreachable!()
        }
        fn capture_program(&self, _h: u64) -> Result<gltrace_snapshot::schema::ProgramRecord, DriverError> {
            unreachable!()
        }
        fn capture_shader(&self, _h: u64) -> Result<gltrace_snapshot::schema::ShaderRecord, DriverError> {
            unreachable!()
        }
        fn capture_sampler(&self, _h: u64) -> Result<gltrace_snapshot::schema::SamplerRecord, DriverError> {
            unreachable!()
        }
        fn capture_renderbuffer(
            &self,
            _h: u64,
        ) -> Result<gltrace_snapshot::schema::RenderbufferRecord, DriverError> {
            unreachable!()
        }
        fn capture_framebuffer(
            &self,
            _h: u64,
        ) -> Result<gltrace_snapshot::schema::FramebufferRecord, DriverError> {
            unreachable!()
        }
        fn capture_vao(&self, _h: u64) -> Result<gltrace_snapshot::schema::VaoRecord, DriverError> {
            unreachable!()
        }
        fn capture_sync(&self, _h: u64) -> Result<gltrace_snapshot::schema::SyncRecord, DriverError> {
            unreachable!()
        }
        fn capture_query(&self, _h: u64) -> Result<gltrace_snapshot::schema::QueryRecord, DriverError> {
            unreachable!()
        }
        fn capture_list(&self, _h: u64) -> Result<gltrace_snapshot::schema::ListRecord, DriverError> {
            unreachable!()
        }
        fn capture_feedback(&self, _h: u64) -> Result<gltrace_snapshot::schema::FeedbackRecord, DriverError> {
            unreachable!()
        }
        fn capture_pipeline(&self, _h: u64) -> Result<gltrace_snapshot::schema::PipelineRecord, DriverError> {
            unreachable!()
        }
        fn capture_default_framebuffer(
            &self,
        ) -> Result<gltrace_snapshot::schema::DefaultFramebufferRecord, DriverError> {
            unreachable!()
        }
        fn create_context(
            &mut self,
            _r: &gltrace_snapshot::schema::ContextRecord,
        ) -> Result<u64, DriverError> {
            unreachable!()
        }
        fn create_shader(&mut self, _r: &gltrace_snapshot::schema::ShaderRecord) -> Result<u64, DriverError> {
            unreachable!()
        }
        fn create_program(
            &mut self,
            _r: &gltrace_snapshot::schema::ProgramRecord,
        ) -> Result<u64, DriverError> {
            unreachable!()
        }
        fn create_buffer(&mut self, _r: &gltrace_snapshot::schema::BufferRecord) -> Result<u64, DriverError> {
            unreachable!()
        }
        fn create_texture(
            &mut self,
            _r: &gltrace_snapshot::schema::TextureRecord,
        ) -> Result<u64, DriverError> {
            unreachable!()
        }
        fn create_sampler(
            &mut self,
            _r: &gltrace_snapshot::schema::SamplerRecord,
        ) -> Result<u64, DriverError> {
            unreachable!()
        }
        fn create_renderbuffer(
            &mut self,
            _r: &gltrace_snapshot::schema::RenderbufferRecord,
        ) -> Result<u64, DriverError> {
            unreachable!()
        }
        fn create_framebuffer(
            &mut self,
            _r: &gltrace_snapshot::schema::FramebufferRecord,
        ) -> Result<u64, DriverError> {
            unreachable!()
        }
        fn create_vao(&mut self, _r: &gltrace_snapshot::schema::VaoRecord) -> Result<u64, DriverError> {
            unreachable!()
        }
        fn create_query(&mut self, _r: &gltrace_snapshot::schema::QueryRecord) -> Result<u64, DriverError> {
            unreachable!()
        }
        fn create_sync(&mut self, _r: &gltrace_snapshot::schema::SyncRecord) -> Result<u64, DriverError> {
            unreachable!()
        }
        fn create_pipeline(
            &mut self,
            _r: &gltrace_snapshot::schema::PipelineRecord,
        ) -> Result<u64, DriverError> {
            unreachable!()
        }
        fn create_list(&mut self, _r: &gltrace_snapshot::schema::ListRecord) -> Result<u64, DriverError> {
            unreachable!()
        }
        fn create_feedback(
            &mut self,
            _r: &gltrace_snapshot::schema::FeedbackRecord,
        ) -> Result<u64, DriverError> {
            unreachable!()
        }
        fn apply_context_state(
            &mut self,
            _r: &gltrace_snapshot::schema::ContextRecord,
        ) -> Result<(), DriverError> {
            unreachable!()
        }
        fn restore_default_framebuffer(
            &mut self,
            _r: &gltrace_snapshot::schema::DefaultFramebufferRecord,
        ) -> Result<(), DriverError> {
            unreachable!()
        }
    }

    struct NoOpWindow;
    impl WindowCollaborator for NoOpWindow {
        fn create_window(&mut self, _w: u32, _h: u32, _msaa: u32) -> Result<(), String> {
            Ok(())
        }
        fn native_handle(&self) -> u64 {
            0
        }
        fn set_title(&mut self, _title: &str) {}
        fn pump_events(&mut self) -> Vec<WindowEvent> {
            Vec::new()
        }
        fn request_resize(&mut self, _w: u32, _h: u32) -> Result<(), String> {
            Ok(())
        }
        fn destroy(&mut self) {}
    }

    fn write_sample(path: &std::path::Path, frames: u64) {
        let mut writer = gltrace_file::TraceWriter::create(path, 8).unwrap();
        let mut counter = 0u64;
        for _ in 0..frames {
            writer
                .write_packet(&TracePacket::new_call(EntrypointId(4), counter, 1), false)
                .unwrap();
            counter += 1;
            writer
                .write_packet(&TracePacket::new_call(EntrypointId(8), counter, 1), true)
                .unwrap();
            counter += 1;
        }
        writer.close(MemoryArchive::new()).unwrap();
    }

    #[test]
    fn empty_trace_runs_to_eof_in_zero_swaps() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.gltrace");
        let writer = gltrace_file::TraceWriter::create(&path, 8).unwrap();
        writer.close(MemoryArchive::new()).unwrap();

        let mut driver = NoOpDriver;
        let mut window = NoOpWindow;
        let mut engine =
            ReplayEngine::open(&path, &mut driver, &mut window, EngineConfig::default()).unwrap();
        engine.run_to_completion().unwrap();
        assert_eq!(engine.state(), EngineState::AtEof);
        assert_eq!(engine.stats().frames, 0);
    }

    #[test]
    fn single_frame_trace_replays_one_swap() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("one.gltrace");
        write_sample(&path, 1);

        let mut driver = NoOpDriver;
        let mut window = NoOpWindow;
        let mut engine =
            ReplayEngine::open(&path, &mut driver, &mut window, EngineConfig::default()).unwrap();
        engine.run_to_completion().unwrap();
        assert_eq!(engine.state(), EngineState::AtEof);
        assert_eq!(engine.stats().frames, 1);
        assert_eq!(engine.stats().calls, 2);
    }

    #[test]
    fn cancellation_stops_the_run() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("many.gltrace");
        write_sample(&path, 100);

        let mut driver = NoOpDriver;
        let mut window = NoOpWindow;
        let mut engine =
            ReplayEngine::open(&path, &mut driver, &mut window, EngineConfig::default()).unwrap();
        engine.request_cancel();
        let result = engine.run_to_completion();
        assert!(matches!(result, Err(EngineError::CancelRequested(_))));
        assert_eq!(engine.state(), EngineState::Closed);
    }

    #[test]
    fn seek_to_frame_positions_reader_and_sets_boundary_state() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("many.gltrace");
        write_sample(&path, 10);

        let mut driver = NoOpDriver;
        let mut window = NoOpWindow;
        let mut engine =
            ReplayEngine::open(&path, &mut driver, &mut window, EngineConfig::default()).unwrap();
        engine.seek_to_frame(5).unwrap();
        assert_eq!(engine.state(), EngineState::AtFrameBoundary);
    }

    #[test]
    fn keyframe_path_follows_naming_convention() {
        let path = Path::new("/traces/app.gltrace");
        assert_eq!(keyframe_path_for(path, 50), Path::new("/traces/app.trim.50.gltrace"));
    }
}
