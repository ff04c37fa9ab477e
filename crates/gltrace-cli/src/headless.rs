//! Headless driver and window stand-ins (§6.6: "neither this crate nor
//! `gltrace-replay` link against a real GL implementation").
//!
//! `gltrace-cli` ships no GL context of its own, so its `replay` subcommand
//! drives the engine against these no-op collaborators: every call dispatch
//! succeeds without producing pixels, which is enough to validate a trace's
//! structure, drive the divergence/digest bookkeeping's control flow, and
//! exercise the trim writer's snapshot capture path end to end. A host that
//! wants pixel-accurate replay embeds a real [`gltrace_snapshot::GlDriver`]
//! instead of this one.

use gltrace_format::Param;
use gltrace_replay::{WindowCollaborator, WindowEvent};
use gltrace_snapshot::{DriverError, GlDriver, schema};
use gltrace_types::{EntrypointId, HandleNamespace};

fn unsupported(what: &str) -> DriverError {
    DriverError(format!("headless driver cannot {what}: no GL context is linked"))
}

/// A [`GlDriver`] that accepts every dispatched call as a no-op and refuses
/// every capture/restore request. Good enough to walk a trace's packet
/// stream and its frame/divergence bookkeeping; not a renderer.
#[derive(Debug, Default)]
pub struct HeadlessDriver;

impl GlDriver for HeadlessDriver {
    fn invoke(
        &mut self,
        _entrypoint_id: EntrypointId,
        _params: &[Param],
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
        Err(unsupported("capture a vertex array"))
    }
    fn capture_sync(&self, _live_handle: u64) -> Result<schema::SyncRecord, DriverError> {
        Err(unsupported("capture a sync object"))
    }
    fn capture_query(&self, _live_handle: u64) -> Result<schema::QueryRecord, DriverError> {
        Err(unsupported("capture a query"))
    }
    fn capture_list(&self, _live_handle: u64) -> Result<schema::ListRecord, DriverError> {
        Err(unsupported("capture a display list"))
    }
    fn capture_feedback(&self, _live_handle: u64) -> Result<schema::FeedbackRecord, DriverError> {
        Err(unsupported("capture a transform feedback object"))
    }
    fn capture_pipeline(&self, _live_handle: u64) -> Result<schema::PipelineRecord, DriverError> {
        Err(unsupported("capture a program pipeline"))
    }
    fn capture_default_framebuffer(
        &self,
    ) -> Result<schema::DefaultFramebufferRecord, DriverError> {
        Ok(schema::DefaultFramebufferRecord {
            width: 0,
            height: 0,
            front_color: None,
            back_color: None,
            depth: None,
            stencil: None,
        })
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
        Err(unsupported("create a vertex array"))
    }
    fn create_query(&mut self, _record: &schema::QueryRecord) -> Result<u64, DriverError> {
        Err(unsupported("create a query"))
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
        Err(unsupported("create a transform feedback object"))
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

/// A [`WindowCollaborator`] that pretends a window of the requested size
/// always exists and never reports input or resize events of its own.
#[derive(Debug, Default)]
pub struct HeadlessWindow {
    width: u32,
    height: u32,
}

impl WindowCollaborator for HeadlessWindow {
    fn create_window(&mut self, width: u32, height: u32, _msaa: u32) -> Result<(), String> {
        self.width = width;
        self.height = height;
        Ok(())
    }

    fn native_handle(&self) -> u64 {
        0
    }

    fn set_title(&mut self, _title: &str) {}

    fn pump_events(&mut self) -> Vec<WindowEvent> {
        Vec::new()
    }

    fn request_resize(&mut self, width: u32, height: u32) -> Result<(), String> {
        self.width = width;
        self.height = height;
        Ok(())
    }

    fn destroy(&mut self) {}
}
