//! Deterministic in-memory collaborator doubles for cross-crate replay
//! tests: a [`WindowCollaborator`] that never produces events and a
//! [`GlDriver`] that accepts every dispatched call as a no-op except
//! `glGenTextures`, which it answers with a counter-assigned live handle so
//! the handle-remap scenario (§8 E2E #5) can be exercised without a real GL
//! context.

use gltrace_format::Param;
use gltrace_replay::{WindowCollaborator, WindowEvent};
use gltrace_snapshot::{DriverError, GlDriver, schema};
use gltrace_types::{EntrypointId, HandleNamespace, entrypoint_by_name};

/// A window collaborator that pumps no events and never fails a resize.
#[derive(Debug, Default)]
pub struct NullWindow {
    title: String,
}

impl WindowCollaborator for NullWindow {
    fn create_window(&mut self, _width: u32, _height: u32, _msaa: u32) -> Result<(), String> {
        Ok(())
    }

    fn native_handle(&self) -> u64 {
        0
    }

    fn set_title(&mut self, title: &str) {
        self.title = title.to_string();
    }

    fn pump_events(&mut self) -> Vec<WindowEvent> {
        Vec::new()
    }

    fn request_resize(&mut self, _width: u32, _height: u32) -> Result<(), String> {
        Ok(())
    }

    fn destroy(&mut self) {}
}

fn unsupported(what: &str) -> DriverError {
    DriverError(format!("RecordingDriver cannot {what}: test double only"))
}

/// A [`GlDriver`] good enough to drive a synthetic trace's control flow
/// (frame/divergence bookkeeping, handle-map updates) without a real GL
/// implementation. `glGenTextures` hands out live handles from a counter
/// that starts above every handle value the fixtures in this crate ever
/// record, so a trace handle and its live counterpart are always distinct —
/// the shape handle-remap tests need to tell "used the map" apart from
/// "happened to pass the trace handle through unchanged".
#[derive(Debug)]
pub struct RecordingDriver {
    next_live_handle: u64,
    /// The params `glBindTexture` was most recently invoked with,
    /// post-remap, for tests asserting a recorded trace handle was
    /// translated to its live counterpart before the call reached the
    /// driver (§8 E2E #5). `None` until `glBindTexture` is dispatched once.
    pub last_bind_texture_params: Option<Vec<Param>>,
}

impl RecordingDriver {
    /// A fresh driver whose first generated handle is `first_live_handle`.
    #[must_use]
    pub fn new(first_live_handle: u64) -> Self {
        Self { next_live_handle: first_live_handle, last_bind_texture_params: None }
    }
}

impl GlDriver for RecordingDriver {
    fn invoke(
        &mut self,
        entrypoint_id: EntrypointId,
        params: &[Param],
        client_memory: &mut [u8],
    ) -> Result<Option<u64>, DriverError> {
        if entrypoint_by_name("glBindTexture").is_some_and(|e| e.id == entrypoint_id) {
            self.last_bind_texture_params = Some(params.to_vec());
        }
        if entrypoint_by_name("glGenTextures").is_some_and(|e| e.id == entrypoint_id) {
            if let Some(cm) = params.get(1).and_then(|p| p.client_mem) {
                let live = self.next_live_handle;
                self.next_live_handle += 1;
                let start = cm.offset as usize;
                if let Some(slice) = client_memory.get_mut(start..start + 4) {
                    slice.copy_from_slice(&(live as u32).to_le_bytes());
                }
            }
        }
        Ok(None)
    }

    fn backbuffer_digest_crc(&self) -> Result<u64, DriverError> {
        Ok(0)
    }

    fn backbuffer_digest_sum(&self) -> Result<u64, DriverError> {
        Ok(0)
    }

    fn enumerate(&self, _namespace: HandleNamespace) -> Vec<u64> {
        Vec::new()
    }

    fn capture_context(&self, _live_handle: u64) -> Result<schema::ContextRecord, DriverError> {
        Err(unsupported("capture a context"))
    }
    fn capture_texture(&self, _live_handle: u64) -> Result<schema::TextureRecord, DriverError> {
        Err(unsupported("capture a texture"))
    }
    fn capture_buffer(&self, _live_handle: u64) -> Result<schema::BufferRecord, DriverError> {
        Err(unsupported("capture a buffer"))
    }
    fn capture_program(&self, _live_handle: u64) -> Result<schema::ProgramRecord, DriverError> {
        Err(unsupported("capture a program"))
    }
    fn capture_shader(&self, _live_handle: u64) -> Result<schema::ShaderRecord, DriverError> {
        Err(unsupported("capture a shader"))
    }
    fn capture_sampler(&self, _live_handle: u64) -> Result<schema::SamplerRecord, DriverError> {
        Err(unsupported("capture a sampler"))
    }
    fn capture_renderbuffer(
        &self,
        _live_handle: u64,
    ) -> Result<schema::RenderbufferRecord, DriverError> {
        Err(unsupported("capture a renderbuffer"))
    }
    fn capture_framebuffer(
        &self,
        _live_handle: u64,
    ) -> Result<schema::FramebufferRecord, DriverError> {
        Err(unsupported("capture a framebuffer"))
    }
    fn capture_vao(&self, _live_handle: u64) -> Result<schema::VaoRecord, DriverError> {
        Err(unsupported("capture a vertex array object"))
    }
    fn capture_sync(&self, _live_handle: u64) -> Result<schema::SyncRecord, DriverError> {
        Err(unsupported("capture a sync object"))
    }
    fn capture_query(&self, _live_handle: u64) -> Result<schema::QueryRecord, DriverError> {
        Err(unsupported("capture a query object"))
    }
    fn capture_list(&self, _live_handle: u64) -> Result<schema::ListRecord, DriverError> {
        Err(unsupported("capture a display list"))
    }
    fn capture_feedback(&self, _live_handle: u64) -> Result<schema::FeedbackRecord, DriverError> {
        Err(unsupported("capture a transform feedback"))
    }
    fn capture_pipeline(&self, _live_handle: u64) -> Result<schema::PipelineRecord, DriverError> {
        Err(unsupported("capture a program pipeline"))
    }
    fn capture_default_framebuffer(
        &self,
    ) -> Result<schema::DefaultFramebufferRecord, DriverError> {
        Err(unsupported("capture the default framebuffer"))
    }

    fn create_context(&mut self, _record: &schema::ContextRecord) -> Result<u64, DriverError> {
        Err(unsupported("create a context"))
    }
    fn create_shader(&mut self, _record: &schema::ShaderRecord) -> Result<u64, DriverError> {
        Err(unsupported("create a shader"))
    }
    fn create_program(&mut self, _record: &schema::ProgramRecord) -> Result<u64, DriverError> {
        Err(unsupported("create a program"))
    }
    fn create_buffer(&mut self, _record: &schema::BufferRecord) -> Result<u64, DriverError> {
        Err(unsupported("create a buffer"))
    }
    fn create_texture(&mut self, _record: &schema::TextureRecord) -> Result<u64, DriverError> {
        Err(unsupported("create a texture"))
    }
    fn create_sampler(&mut self, _record: &schema::SamplerRecord) -> Result<u64, DriverError> {
        Err(unsupported("create a sampler"))
    }
    fn create_renderbuffer(
        &mut self,
        _record: &schema::RenderbufferRecord,
    ) -> Result<u64, DriverError> {
        Err(unsupported("create a renderbuffer"))
    }
    fn create_framebuffer(
        &mut self,
        _record: &schema::FramebufferRecord,
    ) -> Result<u64, DriverError> {
        Err(unsupported("create a framebuffer"))
    }
    fn create_vao(&mut self, _record: &schema::VaoRecord) -> Result<u64, DriverError> {
        Err(unsupported("create a vertex array object"))
    }
    fn create_query(&mut self, _record: &schema::QueryRecord) -> Result<u64, DriverError> {
        Err(unsupported("create a query object"))
    }
    fn create_sync(&mut self, _record: &schema::SyncRecord) -> Result<u64, DriverError> {
        Err(unsupported("create a sync object"))
    }
    fn create_pipeline(&mut self, _record: &schema::PipelineRecord) -> Result<u64, DriverError> {
        Err(unsupported("create a program pipeline"))
    }
    fn create_list(&mut self, _record: &schema::ListRecord) -> Result<u64, DriverError> {
        Err(unsupported("create a display list"))
    }
    fn create_feedback(&mut self, _record: &schema::FeedbackRecord) -> Result<u64, DriverError> {
        Err(unsupported("create a transform feedback"))
    }

    fn apply_context_state(&mut self, _record: &schema::ContextRecord) -> Result<(), DriverError> {
        Ok(())
    }
    fn restore_default_framebuffer(
        &mut self,
        _record: &schema::DefaultFramebufferRecord,
    ) -> Result<(), DriverError> {
        Ok(())
    }
}
