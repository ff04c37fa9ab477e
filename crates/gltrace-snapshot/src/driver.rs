//! The GL driver collaborator (§6.6).
//!
//! Neither this crate nor `gltrace-replay` link against a real GL
//! implementation: "any driver-returned handle is opaque", and what a call
//! actually does is out of scope. [`GlDriver`] is the seam a host
//! embeds a real driver behind; `gltrace-replay` drives ordinary calls
//! through it, and this crate drives capture/restore through the same
//! trait object so both subsystems share one collaborator.

use gltrace_format::Param;
use gltrace_types::EntrypointId;

use crate::schema::{
    BufferRecord, ContextRecord, FeedbackRecord, FramebufferRecord, ListRecord, PipelineRecord,
    ProgramRecord, QueryRecord, RenderbufferRecord, SamplerRecord, ShaderRecord, SyncRecord,
    TextureRecord, VaoRecord,
};

/// Failure reported by a [`GlDriver`] method. Carried as a plain message —
/// the driver implementation, not this crate, owns the taxonomy of what can
/// go wrong inside it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverError(pub String);

impl std::fmt::Display for DriverError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for DriverError {}

/// A live GL context and object-namespace collaborator.
///
/// Capture methods enumerate and read back live state; restore methods
/// create objects and return the live handle the caller must register in
/// the replay-time handle map. Every method is fallible: a real driver can
/// fail at any GL call boundary (context loss, allocation failure, shader
/// compile failure on restore).
pub trait GlDriver {
    /// Invoke the entrypoint resolved for `entrypoint_id` with pre-remapped
    /// parameters (handle-valued `value_bits` already translated to live
    /// handles) and the call's client-memory scratch. `client_memory` is
    /// pre-populated with the recorded `in`/`inout` bytes at each param's
    /// `client_mem` offset; the driver writes `out` data back into the same
    /// buffer at the same offsets for the engine to read afterward. Returns
    /// the raw return-value word if the entrypoint has one. Used by
    /// `gltrace-replay`'s per-entrypoint dispatch (§4.H.2); snapshot
    /// capture/restore use the more specific methods below instead of
    /// generic invocation.
    fn invoke(
        &mut self,
        entrypoint_id: EntrypointId,
        params: &[Param],
        client_memory: &mut [u8],
    ) -> Result<Option<u64>, DriverError>;

    /// A CRC of the current default-framebuffer backbuffer contents, for
    /// the replay engine's per-swap frame-digest divergence check and
    /// `--hash_output` (§4.H.3).
    fn backbuffer_digest_crc(&self) -> Result<u64, DriverError>;

    /// A per-component unsigned sum of the current default-framebuffer
    /// backbuffer contents, robust to multisample resolve ordering, for
    /// `--sum_output` (§4.H.3).
    fn backbuffer_digest_sum(&self) -> Result<u64, DriverError>;

    /// Live handles of every object in `namespace` reachable from the
    /// currently bound context.
    fn enumerate(&self, namespace: gltrace_types::HandleNamespace) -> Vec<u64>;

    /// Capture side: read back full state for one live context.
    fn capture_context(&self, live_handle: u64) -> Result<ContextRecord, DriverError>;
    /// Capture side: read back full state (including pixel payloads) for
    /// one live texture.
    fn capture_texture(&self, live_handle: u64) -> Result<TextureRecord, DriverError>;
    /// Capture side: read back full state for one live buffer.
    fn capture_buffer(&self, live_handle: u64) -> Result<BufferRecord, DriverError>;
    /// Capture side: read back full state for one live program.
    fn capture_program(&self, live_handle: u64) -> Result<ProgramRecord, DriverError>;
    /// Capture side: read back full state for one live shader.
    fn capture_shader(&self, live_handle: u64) -> Result<ShaderRecord, DriverError>;
    /// Capture side: read back full state for one live sampler.
    fn capture_sampler(&self, live_handle: u64) -> Result<SamplerRecord, DriverError>;
    /// Capture side: read back full state for one live renderbuffer.
    fn capture_renderbuffer(&self, live_handle: u64) -> Result<RenderbufferRecord, DriverError>;
    /// Capture side: read back full state for one live framebuffer.
    fn capture_framebuffer(&self, live_handle: u64) -> Result<FramebufferRecord, DriverError>;
    /// Capture side: read back full state for one live vertex array object.
    fn capture_vao(&self, live_handle: u64) -> Result<VaoRecord, DriverError>;
    /// Capture side: read back full state for one live sync object.
    fn capture_sync(&self, live_handle: u64) -> Result<SyncRecord, DriverError>;
    /// Capture side: read back full state for one live query object.
    fn capture_query(&self, live_handle: u64) -> Result<QueryRecord, DriverError>;
    /// Capture side: read back full state for one live display list.
    fn capture_list(&self, live_handle: u64) -> Result<ListRecord, DriverError>;
    /// Capture side: read back full state for one live transform feedback.
    fn capture_feedback(&self, live_handle: u64) -> Result<FeedbackRecord, DriverError>;
    /// Capture side: read back full state for one live program pipeline.
    fn capture_pipeline(&self, live_handle: u64) -> Result<PipelineRecord, DriverError>;
    /// Capture side: read back the default framebuffer's current pixels.
    fn capture_default_framebuffer(
        &self,
    ) -> Result<crate::schema::DefaultFramebufferRecord, DriverError>;

    /// Restore side: create a context from a record, return its live handle.
    fn create_context(&mut self, record: &ContextRecord) -> Result<u64, DriverError>;
    /// Restore side: create a shader from a record, return its live handle.
    fn create_shader(&mut self, record: &ShaderRecord) -> Result<u64, DriverError>;
    /// Restore side: create a program from a record, return its live handle.
    fn create_program(&mut self, record: &ProgramRecord) -> Result<u64, DriverError>;
    /// Restore side: create a buffer and upload its contents.
    fn create_buffer(&mut self, record: &BufferRecord) -> Result<u64, DriverError>;
    /// Restore side: create a texture and upload its levels.
    fn create_texture(&mut self, record: &TextureRecord) -> Result<u64, DriverError>;
    /// Restore side: create a sampler and set its parameters.
    fn create_sampler(&mut self, record: &SamplerRecord) -> Result<u64, DriverError>;
    /// Restore side: create a renderbuffer and allocate its storage.
    fn create_renderbuffer(&mut self, record: &RenderbufferRecord) -> Result<u64, DriverError>;
    /// Restore side: create a framebuffer and wire its attachments.
    fn create_framebuffer(&mut self, record: &FramebufferRecord) -> Result<u64, DriverError>;
    /// Restore side: create a vertex array object and its attribute state.
    fn create_vao(&mut self, record: &VaoRecord) -> Result<u64, DriverError>;
    /// Restore side: create a query object.
    fn create_query(&mut self, record: &QueryRecord) -> Result<u64, DriverError>;
    /// Restore side: create a sync object.
    fn create_sync(&mut self, record: &SyncRecord) -> Result<u64, DriverError>;
    /// Restore side: create a program pipeline object and bind its
    /// per-stage programs.
    fn create_pipeline(&mut self, record: &PipelineRecord) -> Result<u64, DriverError>;
    /// Restore side: recreate a compatibility-profile display list.
    fn create_list(&mut self, record: &ListRecord) -> Result<u64, DriverError>;
    /// Restore side: recreate a transform feedback object and its bindings.
    fn create_feedback(&mut self, record: &FeedbackRecord) -> Result<u64, DriverError>;

    /// Restore side: rebind per-context state (bindings, enables, viewport,
    /// clear values) from a record onto the currently current context.
    fn apply_context_state(&mut self, record: &ContextRecord) -> Result<(), DriverError>;
    /// Restore side: write the default framebuffer's pixel contents back.
    /// Not called when `disable_frontbuffer_restore` is set.
    fn restore_default_framebuffer(
        &mut self,
        record: &crate::schema::DefaultFramebufferRecord,
    ) -> Result<(), DriverError>;
}
