//! Synthetic trace fixtures and cross-crate property/integration tests
//! (§8's testable properties, exercised across `gltrace-format`,
//! `gltrace-file`, `gltrace-replay`, and `gltrace-trim` together rather than
//! from each crate's own `tests/`).
//!
//! Every fixture here only uses void-return, no-handle entrypoints
//! (`glClearColor`, `glClear`, `glEnable`/`glDisable`, `glXSwapBuffers`), so
//! replaying a fixture against the headless driver never reports a
//! return-value divergence and never needs a live handle-map entry: a
//! recorded `TracePacket` only carries a `return_value` for entrypoints
//! with a non-void `return_type` (§3.4), and none of these do.

use std::path::Path;

use gltrace_file::{IoError, TraceWriter};
use gltrace_format::{ClientMemRef, Param, TracePacket};
use gltrace_types::{EntrypointId, HandleNamespace, TypeId};

pub mod fixtures;

/// `GL_DEPTH_TEST`.
pub const GL_DEPTH_TEST: u64 = 0x0B71;
/// `GL_BLEND`.
pub const GL_BLEND: u64 = 0x0BE2;

const GEN_TEXTURES: EntrypointId = EntrypointId(0);
const BIND_TEXTURE: EntrypointId = EntrypointId(1);
const CLEAR_COLOR: EntrypointId = EntrypointId(3);
const CLEAR: EntrypointId = EntrypointId(4);
const ENABLE: EntrypointId = EntrypointId(5);
const DISABLE: EntrypointId = EntrypointId(6);
const SWAP_BUFFERS: EntrypointId = EntrypointId(8);

/// Counters describing a fixture [`build_synthetic_trace`] wrote.
#[derive(Debug, Clone, Copy, Default)]
pub struct FixtureStats {
    /// Frames (swap packets) written.
    pub frame_count: u64,
    /// Total packets written, not counting EOF.
    pub packet_count: u64,
    /// `glEnable(GL_DEPTH_TEST)` calls written.
    pub depth_test_enables: u64,
    /// `glEnable(GL_BLEND)` calls written.
    pub blend_enables: u64,
}

/// Write a small, deterministic trace file at `path`.
///
/// Every frame clears the color buffer and toggles `GL_DEPTH_TEST` on then
/// off; the middle frame (`frame_count / 2`) additionally enables
/// `GL_BLEND` once. This is the fixture behind the "exactly two depth-test
/// enables, one blend enable" scenario `find --find_param` is checked
/// against.
pub fn build_synthetic_trace(path: impl AsRef<Path>, frame_count: u64) -> Result<FixtureStats, IoError> {
    let mut writer = TraceWriter::create(path.as_ref(), 8)?;
    let mut call_counter = 0u64;
    let mut stats = FixtureStats::default();
    let blend_frame = frame_count / 2;

    for frame in 0..frame_count {
        write_call(&mut writer, &mut call_counter, CLEAR_COLOR, &[Param::scalar(0), Param::scalar(0), Param::scalar(0), Param::scalar(0)], false)?;
        write_call(&mut writer, &mut call_counter, ENABLE, &[Param::scalar(GL_DEPTH_TEST)], false)?;
        stats.depth_test_enables += 1;
        if frame == blend_frame {
            write_call(&mut writer, &mut call_counter, ENABLE, &[Param::scalar(GL_BLEND)], false)?;
            stats.blend_enables += 1;
        }
        write_call(&mut writer, &mut call_counter, CLEAR, &[Param::scalar(0x4000)], false)?;
        write_call(&mut writer, &mut call_counter, DISABLE, &[Param::scalar(GL_DEPTH_TEST)], false)?;
        write_call(&mut writer, &mut call_counter, SWAP_BUFFERS, &[Param::scalar(0)], true)?;
        stats.frame_count += 1;
    }

    stats.packet_count = call_counter;
    writer.close(gltrace_archive::MemoryArchive::new())?;
    Ok(stats)
}

/// Write a one-frame trace that records `glGenTextures` allocating
/// `trace_handle`, binds it, then swaps — the fixture behind the
/// handle-remap scenario (§8 E2E #5): a live driver hands back a different
/// live handle than the one the recording used, and a correct replay must
/// translate the `glBindTexture` argument through the handle map rather
/// than passing the recorded value straight through.
pub fn build_handle_remap_trace(path: impl AsRef<Path>, trace_handle: u32) -> Result<(), IoError> {
    let mut writer = TraceWriter::create(path.as_ref(), 8)?;
    let mut call_counter = 0u64;

    let mut gen = TracePacket::new_call(GEN_TEXTURES, call_counter, 0);
    gen.client_memory = trace_handle.to_le_bytes().to_vec();
    gen.params = vec![
        Param::scalar(1),
        Param::with_client_mem(
            0,
            ClientMemRef {
                offset: 0,
                element_count: 1,
                element_type: TypeId(7),
                element_namespace: HandleNamespace::Texture,
            },
        ),
    ];
    writer.write_packet(&gen, false)?;
    call_counter += 1;

    write_call(
        &mut writer,
        &mut call_counter,
        BIND_TEXTURE,
        &[Param::scalar(0x0DE1), Param::scalar(u64::from(trace_handle))],
        false,
    )?;
    write_call(&mut writer, &mut call_counter, SWAP_BUFFERS, &[Param::scalar(0)], true)?;

    writer.close(gltrace_archive::MemoryArchive::new())?;
    Ok(())
}

fn write_call(
    writer: &mut TraceWriter,
    call_counter: &mut u64,
    entrypoint_id: EntrypointId,
    params: &[Param],
    ends_frame: bool,
) -> Result<(), IoError> {
    let mut packet = TracePacket::new_call(entrypoint_id, *call_counter, 0);
    packet.params = params.to_vec();
    writer.write_packet(&packet, ends_frame)?;
    *call_counter += 1;
    Ok(())
}
