//! Trim writer (§4.I): prepends a state-snapshot restore packet ahead of a
//! copied packet range, producing a shorter, self-contained trace file.
//!
//! The snapshot comes from `gltrace-snapshot::capture`, driven through a
//! [`ReplayEngine`] paused at a frame boundary; the copied packet range
//! comes from an independent [`TraceReader`] seeked into the *original*
//! trace file, since copying is a pure file operation that does not need
//! to re-dispatch those packets against any driver.

use std::path::Path;

use bytes::Bytes;
use gltrace_archive::{BlobArchive, MemoryArchive};
use gltrace_file::{ReadOutcome, TraceReader, TraceWriter};
use gltrace_format::TracePacket;
use gltrace_replay::ReplayEngine;
use gltrace_snapshot::schema::Snapshot;
use gltrace_types::entrypoint_by_id;
use tracing::{info, warn};

use crate::{
    closure::{collect_referenced_handles, expand_transitive_closure, prune_to_closure},
    error::TrimError,
};

/// Flags controlling one trim run (§4.I, §R.4).
#[derive(Debug, Clone, Copy)]
pub struct TrimOptions {
    /// Prune the prefix snapshot to the closure of handles the copied
    /// packet range can actually reach (§4.I step 5).
    pub optimize_snapshot: bool,
    /// Pointer size recorded in the output file's SOF header.
    pub pointer_size: u8,
}

impl Default for TrimOptions {
    fn default() -> Self {
        Self { optimize_snapshot: false, pointer_size: 8 }
    }
}

/// Counters from one completed trim run.
#[derive(Debug, Clone, Default)]
pub struct TrimStats {
    /// Frames actually copied (less than requested if the source trace
    /// ends before `start_frame + length_frames`).
    pub frames_copied: u64,
    /// Packets copied into the output, not counting the synthetic
    /// snapshot-restore packet or the EOF record.
    pub packets_copied: u64,
    /// Object count the prefix snapshot carries after pruning (or its
    /// unpruned count, when `optimize_snapshot` is off).
    pub snapshot_object_count: usize,
}

/// Produce a new trace file at `output_path` whose first packet restores a
/// state snapshot captured from `engine` (paused at a frame boundary ≤
/// `start_frame`) and whose tail is `source_trace_path`'s packets from
/// frame `start_frame` through `start_frame + length_frames - 1` (§4.I).
///
/// `source_archive` is the blob archive `engine`'s driver collaborator
/// writes capture payloads into; every `BlobRef` the captured snapshot
/// carries is resolved against it and copied into the output's own
/// archive. Failure at any step removes the partial output file.
pub fn trim(
    source_trace_path: impl AsRef<Path>,
    output_path: impl AsRef<Path>,
    engine: &ReplayEngine<'_>,
    source_archive: &dyn BlobArchive,
    start_frame: u64,
    length_frames: u64,
    options: TrimOptions,
) -> Result<TrimStats, TrimError> {
    if length_frames == 0 {
        return Err(TrimError::Config("length_frames must be non-zero".to_string()));
    }

    let output_path = output_path.as_ref();
    let result = trim_inner(
        source_trace_path.as_ref(),
        output_path,
        engine,
        source_archive,
        start_frame,
        length_frames,
        options,
    );
    if result.is_err() {
        let _ = std::fs::remove_file(output_path);
    }
    result
}

fn trim_inner(
    source_trace_path: &Path,
    output_path: &Path,
    engine: &ReplayEngine<'_>,
    source_archive: &dyn BlobArchive,
    start_frame: u64,
    length_frames: u64,
    options: TrimOptions,
) -> Result<TrimStats, TrimError> {
    let (suffix, frames_copied) = read_suffix(source_trace_path, start_frame, length_frames)?;
    if frames_copied < length_frames {
        warn!(
            requested = length_frames,
            copied = frames_copied,
            "source trace ended before the requested trim length"
        );
    }

    // Step 5 requires walking the suffix before the snapshot is finalized.
    let mut snapshot = gltrace_snapshot::capture(engine.driver(), engine.handle_map())?;
    if options.optimize_snapshot {
        let packets: Vec<TracePacket> = suffix.iter().map(|(p, _)| p.clone()).collect();
        let mut referenced = collect_referenced_handles(&packets);
        expand_transitive_closure(&snapshot, &mut referenced);
        snapshot = prune_to_closure(snapshot, &referenced);
    }
    let snapshot_object_count = count_objects(&snapshot);

    let mut output_archive = MemoryArchive::new();
    for blob_ref in gltrace_snapshot::all_blob_refs(&snapshot) {
        let bytes = gltrace_snapshot::resolve(source_archive, blob_ref)?;
        output_archive.put(Some(&blob_ref.blob), bytes)?;
    }
    let snapshot_bytes = gltrace_snapshot::save(&snapshot)?;
    let snapshot_blob_id = output_archive.put(None, Bytes::from(snapshot_bytes))?;

    let mut writer = TraceWriter::create(output_path, options.pointer_size)?;
    writer.write_packet(&TracePacket::internal_state_snapshot(0, snapshot_blob_id.0), false)?;
    for (packet, is_swap) in &suffix {
        writer.write_packet(packet, *is_swap)?;
    }
    writer.close(output_archive)?;

    info!(
        start_frame,
        length_frames,
        frames_copied,
        packets_copied = suffix.len(),
        "trim run complete"
    );
    Ok(TrimStats {
        frames_copied,
        packets_copied: suffix.len() as u64,
        snapshot_object_count,
    })
}

/// Read `source_trace_path`'s packets from frame `start_frame` through
/// `start_frame + length_frames - 1`, each tagged with whether it ends its
/// frame, plus the number of complete frames actually found.
fn read_suffix(
    source_trace_path: &Path,
    start_frame: u64,
    length_frames: u64,
) -> Result<(Vec<(TracePacket, bool)>, u64), TrimError> {
    let mut reader = TraceReader::open(source_trace_path)?;
    reader.seek_to_frame(start_frame)?;

    let mut packets = Vec::new();
    let mut frames_seen = 0u64;
    while frames_seen < length_frames {
        match reader.read_next_packet()? {
            ReadOutcome::Eof => break,
            ReadOutcome::Packet(packet) => {
                let is_swap = entrypoint_by_id(packet.entrypoint_id).is_some_and(|e| e.is_swap());
                if is_swap {
                    frames_seen += 1;
                }
                packets.push((packet, is_swap));
            },
        }
    }
    Ok((packets, frames_seen))
}

fn count_objects(snapshot: &Snapshot) -> usize {
    snapshot.contexts.len()
        + snapshot.textures.len()
        + snapshot.buffers.len()
        + snapshot.programs.len()
        + snapshot.shaders.len()
        + snapshot.samplers.len()
        + snapshot.renderbuffers.len()
        + snapshot.framebuffers.len()
        + snapshot.vaos.len()
        + snapshot.syncs.len()
        + snapshot.queries.len()
        + snapshot.lists.len()
        + snapshot.feedbacks.len()
        + snapshot.pipelines.len()
}

#[cfg(test)]
mod tests {
    use gltrace_archive::MemoryArchive;
    use gltrace_format::TracePacket;
    use gltrace_snapshot::{DriverError, schema};
    use gltrace_types::EntrypointId;

    use super::*;
    use crate::error::TrimError;

    struct EmptyDriver;
    impl gltrace_snapshot::GlDriver for EmptyDriver {
        fn invoke(
            &mut self,
            _entrypoint_id: gltrace_types::EntrypointId,
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
        fn capture_context(&self, _h: u64) -> Result<schema::ContextRecord, DriverError> {
            unreachable!()
        }
        fn capture_texture(&self, _h: u64) -> Result<schema::TextureRecord, DriverError> {
            unreachable!()
        }
        fn capture_buffer(&self, _h: u64) -> Result<schema::BufferRecord, DriverError> {
            unreachable!()
        }
        fn capture_program(&self, _h: u64) -> Result<schema::ProgramRecord, DriverError> {
            unreachable!()
        }
        fn capture_shader(&self, _h: u64) -> Result<schema::ShaderRecord, DriverError> {
            unreachable!()
        }
        fn capture_sampler(&self, _h: u64) -> Result<schema::SamplerRecord, DriverError> {
            unreachable!()
        }
        fn capture_renderbuffer(&self, _h: u64) -> Result<schema::RenderbufferRecord, DriverError> {
            unreachable!()
        }
        fn capture_framebuffer(&self, _h: u64) -> Result<schema::FramebufferRecord, DriverError> {
            unreachable!()
        }
        fn capture_vao(&self, _h: u64) -> Result<schema::VaoRecord, DriverError> {
            unreachable!()
        }
        fn capture_sync(&self, _h: u64) -> Result<schema::SyncRecord, DriverError> {
            unreachable!()
        }
        fn capture_query(&self, _h: u64) -> Result<schema::QueryRecord, DriverError> {
            unreachable!()
        }
        fn capture_list(&self, _h: u64) -> Result<schema::ListRecord, DriverError> {
            unreachable!()
        }
        fn capture_feedback(&self, _h: u64) -> Result<schema::FeedbackRecord, DriverError> {
            unreachable!()
        }
        fn capture_pipeline(&self, _h: u64) -> Result<schema::PipelineRecord, DriverError> {
            unreachable!()
        }
        fn capture_default_framebuffer(&self) -> Result<schema::DefaultFramebufferRecord, DriverError> {
            Ok(schema::DefaultFramebufferRecord {
                width: 0,
                height: 0,
                front_color: None,
                back_color: None,
                depth: None,
                stencil: None,
            })
        }
        fn create_context(&mut self, _r: &schema::ContextRecord) -> Result<u64, DriverError> {
            unreachable!()
        }
        fn create_shader(&mut self, _r: &schema::ShaderRecord) -> Result<u64, DriverError> {
            unreachable!()
        }
        fn create_program(&mut self, _r: &schema::ProgramRecord) -> Result<u64, DriverError> {
            unreachable!()
        }
        fn create_buffer(&mut self, _r: &schema::BufferRecord) -> Result<u64, DriverError> {
            unreachable!()
        }
        fn create_texture(&mut self, _r: &schema::TextureRecord) -> Result<u64, DriverError> {
            unreachable!()
        }
        fn create_sampler(&mut self, _r: &schema::SamplerRecord) -> Result<u64, DriverError> {
            unreachable!()
        }
        fn create_renderbuffer(&mut self, _r: &schema::RenderbufferRecord) -> Result<u64, DriverError> {
            unreachable!()
        }
        fn create_framebuffer(&mut self, _r: &schema::FramebufferRecord) -> Result<u64, DriverError> {
            unreachable!()
        }
        fn create_vao(&mut self, _r: &schema::VaoRecord) -> Result<u64, DriverError> {
            unreachable!()
        }
        fn create_query(&mut self, _r: &schema::QueryRecord) -> Result<u64, DriverError> {
            unreachable!()
        }
        fn create_sync(&mut self, _r: &schema::SyncRecord) -> Result<u64, DriverError> {
            unreachable!()
        }
        fn create_pipeline(&mut self, _r: &schema::PipelineRecord) -> Result<u64, DriverError> {
            unreachable!()
        }
        fn create_list(&mut self, _r: &schema::ListRecord) -> Result<u64, DriverError> {
            unreachable!()
        }
        fn create_feedback(&mut self, _r: &schema::FeedbackRecord) -> Result<u64, DriverError> {
            unreachable!()
        }
        fn apply_context_state(&mut self, _r: &schema::ContextRecord) -> Result<(), DriverError> {
            unreachable!()
        }
        fn restore_default_framebuffer(
            &mut self,
            _r: &schema::DefaultFramebufferRecord,
        ) -> Result<(), DriverError> {
            unreachable!()
        }
    }

    struct NoOpWindow;
    impl gltrace_replay::WindowCollaborator for NoOpWindow {
        fn create_window(&mut self, _w: u32, _h: u32, _msaa: u32) -> Result<(), String> {
            Ok(())
        }
        fn native_handle(&self) -> u64 {
            0
        }
        fn set_title(&mut self, _title: &str) {}
        fn pump_events(&mut self) -> Vec<gltrace_replay::WindowEvent> {
            Vec::new()
        }
        fn request_resize(&mut self, _w: u32, _h: u32) -> Result<(), String> {
            Ok(())
        }
        fn destroy(&mut self) {}
    }

    const GL_CLEAR: EntrypointId = EntrypointId(4);
    const SWAP: EntrypointId = EntrypointId(8);

    fn write_sample(path: &Path, frames: u64) {
        let mut writer = TraceWriter::create(path, 8).unwrap();
        let mut counter = 0u64;
        for _ in 0..frames {
            writer.write_packet(&TracePacket::new_call(GL_CLEAR, counter, 1), false).unwrap();
            counter += 1;
            writer.write_packet(&TracePacket::new_call(SWAP, counter, 1), true).unwrap();
            counter += 1;
        }
        writer.close(MemoryArchive::new()).unwrap();
    }

    #[test]
    fn zero_length_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("source.gltrace");
        write_sample(&source, 10);

        let mut driver = EmptyDriver;
        let mut window = NoOpWindow;
        let engine = ReplayEngine::open(&source, &mut driver, &mut window, Default::default()).unwrap();

        let out = dir.path().join("out.gltrace");
        let result = trim(&source, &out, &engine, &MemoryArchive::new(), 0, 0, TrimOptions::default());
        assert!(matches!(result, Err(TrimError::Config(_))));
    }

    #[test]
    fn trim_produces_a_replayable_prefix_plus_suffix() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("source.gltrace");
        write_sample(&source, 20);

        let mut driver = EmptyDriver;
        let mut window = NoOpWindow;
        let engine = ReplayEngine::open(&source, &mut driver, &mut window, Default::default()).unwrap();

        let out = dir.path().join("trimmed.gltrace");
        let stats =
            trim(&source, &out, &engine, &MemoryArchive::new(), 5, 10, TrimOptions::default()).unwrap();
        assert_eq!(stats.frames_copied, 10);
        assert_eq!(stats.packets_copied, 20); // 10 frames * 2 packets/frame

        let mut reader = TraceReader::open(&out).unwrap();
        let first = reader.read_next_packet().unwrap();
        match first {
            ReadOutcome::Packet(p) => {
                assert!(p.state_snapshot_blob_id().is_some());
            },
            ReadOutcome::Eof => panic!("expected the synthetic snapshot packet first"),
        }
        assert_eq!(reader.max_frame_index(), 10);
    }

    #[test]
    fn trim_beyond_end_of_trace_copies_what_exists_and_reports_the_shortfall() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("source.gltrace");
        write_sample(&source, 5);

        let mut driver = EmptyDriver;
        let mut window = NoOpWindow;
        let engine = ReplayEngine::open(&source, &mut driver, &mut window, Default::default()).unwrap();

        let out = dir.path().join("trimmed.gltrace");
        let stats =
            trim(&source, &out, &engine, &MemoryArchive::new(), 2, 100, TrimOptions::default()).unwrap();
        assert_eq!(stats.frames_copied, 3);
    }
}
