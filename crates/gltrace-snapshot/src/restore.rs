//! State-snapshot restore (§4.G restore algorithm).
//!
//! 1. Create contexts with their recorded attribs and share groups,
//!    populating the handle map for each as it is made.
//! 2. Create every object namespace in the fixed topological order the
//!    schema declares: shaders → programs → buffers → textures → samplers →
//!    renderbuffers → framebuffers → VAOs → queries → sync → pipelines →
//!    lists → feedbacks — each record's cross-references are remapped from
//!    trace handles to the live handles already created for earlier
//!    namespaces before it is handed to the driver.
//! 3. Rebind per-context state and enables.
//! 4. Restore default-framebuffer pixels, unless
//!    [`RestoreOptions::disable_frontbuffer_restore`] is set.

use std::collections::HashMap;

use gltrace_types::HandleNamespace;
use tracing::debug;

use crate::{
    driver::GlDriver,
    error::SnapshotError,
    schema::{
        BufferRecord, FeedbackRecord, FramebufferAttachment, FramebufferRecord, PipelineRecord,
        ProgramRecord, Snapshot, VaoRecord, VertexAttrib,
    },
};

/// Flags controlling what restore actually writes back, mirroring the CLI
/// flags named in §6.4/§R.2.
#[derive(Debug, Clone, Copy, Default)]
pub struct RestoreOptions {
    /// Skip writing the default framebuffer's pixel contents back.
    pub disable_frontbuffer_restore: bool,
}

/// The trace-handle → live-handle mapping built while restoring one
/// snapshot, keyed by namespace. Callers (`gltrace-replay`) merge this into
/// their own handle map after a successful restore.
#[derive(Debug, Default)]
pub struct RestoreHandleMap {
    maps: HashMap<HandleNamespace, HashMap<u64, u64>>,
}

impl RestoreHandleMap {
    fn insert(&mut self, namespace: HandleNamespace, trace_handle: u64, live_handle: u64) {
        self.maps.entry(namespace).or_default().insert(trace_handle, live_handle);
    }

    /// Live handle registered for `trace_handle` in `namespace`, or the
    /// trace handle unchanged if it is the zero sentinel or was never
    /// created (a dangling binding the caller should treat as an error
    /// unless it genuinely denotes "unbound").
    #[must_use]
    pub fn live(&self, namespace: HandleNamespace, trace_handle: u64) -> u64 {
        if trace_handle == 0 {
            return 0;
        }
        self.maps.get(&namespace).and_then(|m| m.get(&trace_handle)).copied().unwrap_or(trace_handle)
    }

    /// Iterate every `(namespace, trace_handle, live_handle)` triple
    /// created during this restore, for merging into a replay-time handle
    /// map.
    pub fn iter(&self) -> impl Iterator<Item = (HandleNamespace, u64, u64)> + '_ {
        self.maps.iter().flat_map(|(ns, m)| m.iter().map(|(&t, &l)| (*ns, t, l)))
    }
}

/// Restore `snapshot` onto `driver`, creating every object it names and
/// returning the live handle map the caller must fold into its own.
pub fn restore(
    driver: &mut dyn GlDriver,
    snapshot: &Snapshot,
    options: RestoreOptions,
) -> Result<RestoreHandleMap, SnapshotError> {
    if snapshot.schema_version != crate::schema::CURRENT_SCHEMA_VERSION {
        return Err(SnapshotError::UnsupportedSchemaVersion(snapshot.schema_version));
    }

    let mut map = RestoreHandleMap::default();

    for record in &snapshot.contexts {
        let share_live = record.share_group.map(|h| map.live(HandleNamespace::Context, h));
        let mut remapped = record.clone();
        remapped.share_group = share_live;
        let live =
            driver.create_context(&remapped).map_err(|e| SnapshotError::Driver(e.to_string()))?;
        map.insert(HandleNamespace::Context, record.handle, live);
    }

    for record in &snapshot.shaders {
        let live =
            driver.create_shader(record).map_err(|e| SnapshotError::Driver(e.to_string()))?;
        map.insert(HandleNamespace::Shader, record.handle, live);
    }

    for record in &snapshot.programs {
        let remapped = remap_program(record, &map);
        let live =
            driver.create_program(&remapped).map_err(|e| SnapshotError::Driver(e.to_string()))?;
        map.insert(HandleNamespace::Program, record.handle, live);
    }

    for record in &snapshot.buffers {
        let live =
            driver.create_buffer(record).map_err(|e| SnapshotError::Driver(e.to_string()))?;
        map.insert(HandleNamespace::Buffer, record.handle, live);
    }

    for record in &snapshot.textures {
        let live =
            driver.create_texture(record).map_err(|e| SnapshotError::Driver(e.to_string()))?;
        map.insert(HandleNamespace::Texture, record.handle, live);
    }

    for record in &snapshot.samplers {
        let live =
            driver.create_sampler(record).map_err(|e| SnapshotError::Driver(e.to_string()))?;
        map.insert(HandleNamespace::Sampler, record.handle, live);
    }

    for record in &snapshot.renderbuffers {
        let live = driver
            .create_renderbuffer(record)
            .map_err(|e| SnapshotError::Driver(e.to_string()))?;
        map.insert(HandleNamespace::Renderbuffer, record.handle, live);
    }

    for record in &snapshot.framebuffers {
        let remapped = remap_framebuffer(record, &map);
        let live = driver
            .create_framebuffer(&remapped)
            .map_err(|e| SnapshotError::Driver(e.to_string()))?;
        map.insert(HandleNamespace::Framebuffer, record.handle, live);
    }

    for record in &snapshot.vaos {
        let remapped = remap_vao(record, &map);
        let live = driver.create_vao(&remapped).map_err(|e| SnapshotError::Driver(e.to_string()))?;
        map.insert(HandleNamespace::VertexArray, record.handle, live);
    }

    for record in &snapshot.queries {
        let live = driver.create_query(record).map_err(|e| SnapshotError::Driver(e.to_string()))?;
        map.insert(HandleNamespace::Query, record.handle, live);
    }

    for record in &snapshot.syncs {
        let live = driver.create_sync(record).map_err(|e| SnapshotError::Driver(e.to_string()))?;
        map.insert(HandleNamespace::Sync, record.handle, live);
    }

    for record in &snapshot.pipelines {
        let remapped = remap_pipeline(record, &map);
        let live = driver
            .create_pipeline(&remapped)
            .map_err(|e| SnapshotError::Driver(e.to_string()))?;
        map.insert(HandleNamespace::Pipeline, record.handle, live);
    }

    for record in &snapshot.lists {
        let live = driver.create_list(record).map_err(|e| SnapshotError::Driver(e.to_string()))?;
        map.insert(HandleNamespace::List, record.handle, live);
    }

    for record in &snapshot.feedbacks {
        let remapped = remap_feedback(record, &map);
        let live = driver
            .create_feedback(&remapped)
            .map_err(|e| SnapshotError::Driver(e.to_string()))?;
        map.insert(HandleNamespace::Feedback, record.handle, live);
    }

    for record in &snapshot.contexts {
        let remapped = remap_context_bindings(record, &map);
        driver.apply_context_state(&remapped).map_err(|e| SnapshotError::Driver(e.to_string()))?;
    }

    if !options.disable_frontbuffer_restore {
        driver
            .restore_default_framebuffer(&snapshot.default_framebuffer)
            .map_err(|e| SnapshotError::Driver(e.to_string()))?;
    }

    debug!(
        contexts = snapshot.contexts.len(),
        textures = snapshot.textures.len(),
        disable_frontbuffer_restore = options.disable_frontbuffer_restore,
        "restored snapshot"
    );
    Ok(map)
}

fn remap_program(record: &ProgramRecord, map: &RestoreHandleMap) -> ProgramRecord {
    ProgramRecord {
        attached_shaders: record
            .attached_shaders
            .iter()
            .map(|&h| map.live(HandleNamespace::Shader, h))
            .collect(),
        ..record.clone()
    }
}

fn remap_framebuffer(record: &FramebufferRecord, map: &RestoreHandleMap) -> FramebufferRecord {
    let attachments = record
        .attachments
        .iter()
        .map(|a| {
            let namespace =
                if a.target == 0x8D41 { HandleNamespace::Renderbuffer } else { HandleNamespace::Texture };
            FramebufferAttachment { object: map.live(namespace, a.object), ..*a }
        })
        .collect();
    FramebufferRecord { attachments, ..record.clone() }
}

fn remap_vao(record: &VaoRecord, map: &RestoreHandleMap) -> VaoRecord {
    let attribs = record
        .attribs
        .iter()
        .map(|a| VertexAttrib {
            buffer_binding: map.live(HandleNamespace::Buffer, a.buffer_binding),
            ..*a
        })
        .collect();
    VaoRecord {
        attribs,
        element_array_buffer: record
            .element_array_buffer
            .map(|h| map.live(HandleNamespace::Buffer, h)),
        ..record.clone()
    }
}

fn remap_pipeline(record: &PipelineRecord, map: &RestoreHandleMap) -> PipelineRecord {
    PipelineRecord {
        programs: record
            .programs
            .iter()
            .map(|&(stage, h)| (stage, map.live(HandleNamespace::Program, h)))
            .collect(),
        ..record.clone()
    }
}

fn remap_feedback(record: &FeedbackRecord, map: &RestoreHandleMap) -> FeedbackRecord {
    let buffer_bindings = record
        .buffer_bindings
        .iter()
        .map(|&(index, h)| (index, map.live(HandleNamespace::Buffer, h)))
        .collect();
    FeedbackRecord { buffer_bindings, ..record.clone() }
}

fn remap_context_bindings(
    record: &crate::schema::ContextRecord,
    map: &RestoreHandleMap,
) -> crate::schema::ContextRecord {
    let mut bindings = record.bindings.clone();
    bindings.current_program = bindings.current_program.map(|h| map.live(HandleNamespace::Program, h));
    bindings.current_vao = bindings.current_vao.map(|h| map.live(HandleNamespace::VertexArray, h));
    bindings.buffer_bindings = bindings
        .buffer_bindings
        .into_iter()
        .map(|(target, h)| (target, map.live(HandleNamespace::Buffer, h)))
        .collect();
    bindings.texture_bindings = bindings
        .texture_bindings
        .into_iter()
        .map(|(unit, target, h)| (unit, target, map.live(HandleNamespace::Texture, h)))
        .collect();
    bindings.draw_framebuffer = map.live(HandleNamespace::Framebuffer, bindings.draw_framebuffer);
    bindings.read_framebuffer = map.live(HandleNamespace::Framebuffer, bindings.read_framebuffer);
    crate::schema::ContextRecord { bindings, ..record.clone() }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handle_map_resolves_zero_as_sentinel_regardless_of_contents() {
        let mut map = RestoreHandleMap::default();
        map.insert(HandleNamespace::Texture, 0, 999);
        assert_eq!(map.live(HandleNamespace::Texture, 0), 0);
    }

    #[test]
    fn handle_map_falls_back_to_trace_handle_when_unmapped() {
        let map = RestoreHandleMap::default();
        assert_eq!(map.live(HandleNamespace::Buffer, 7), 7);
    }

    #[test]
    fn unsupported_schema_version_rejected() {
        struct NoOpDriver;
        impl GlDriver for NoOpDriver {
            fn invoke(
                &mut self,
                _entrypoint_id: gltrace_types::EntrypointId,
                _params: &[gltrace_format::Param],
                _client_memory: &mut [u8],
            ) -> Result<Option<u64>, crate::driver::DriverError> {
                unreachable!()
            }
            fn backbuffer_digest_crc(&self) -> Result<u64, crate::driver::DriverError> {
                unreachable!()
            }
            fn backbuffer_digest_sum(&self) -> Result<u64, crate::driver::DriverError> {
                unreachable!()
            }
            fn enumerate(&self, _namespace: HandleNamespace) -> Vec<u64> {
                Vec::new()
            }
            fn capture_context(
                &self,
                _live_handle: u64,
            ) -> Result<crate::schema::ContextRecord, crate::driver::DriverError> {
                unreachable!()
            }
            fn capture_texture(
                &self,
                _live_handle: u64,
            ) -> Result<crate::schema::TextureRecord, crate::driver::DriverError> {
                unreachable!()
            }
            fn capture_buffer(
                &self,
                _live_handle: u64,
            ) -> Result<BufferRecord, crate::driver::DriverError> {
                unreachable!()
            }
            fn capture_program(
                &self,
                _live_handle: u64,
            ) -> Result<ProgramRecord, crate::driver::DriverError> {
                unreachable!()
            }
            fn capture_shader(
                &self,
                _live_handle: u64,
            ) -> Result<crate::schema::ShaderRecord, crate::driver::DriverError> {
                unreachable!()
            }
            fn capture_sampler(
                &self,
                _live_handle: u64,
            ) -> Result<crate::schema::SamplerRecord, crate::driver::DriverError> {
                unreachable!()
            }
            fn capture_renderbuffer(
                &self,
                _live_handle: u64,
            ) -> Result<crate::schema::RenderbufferRecord, crate::driver::DriverError> {
                unreachable!()
            }
            fn capture_framebuffer(
                &self,
                _live_handle: u64,
            ) -> Result<FramebufferRecord, crate::driver::DriverError> {
                unreachable!()
            }
            fn capture_vao(&self, _live_handle: u64) -> Result<VaoRecord, crate::driver::DriverError> {
                unreachable!()
            }
            fn capture_sync(
                &self,
                _live_handle: u64,
            ) -> Result<crate::schema::SyncRecord, crate::driver::DriverError> {
                unreachable!()
            }
            fn capture_query(
                &self,
                _live_handle: u64,
            ) -> Result<crate::schema::QueryRecord, crate::driver::DriverError> {
                unreachable!()
            }
            fn capture_list(
                &self,
                _live_handle: u64,
            ) -> Result<crate::schema::ListRecord, crate::driver::DriverError> {
                unreachable!()
            }
            fn capture_feedback(
                &self,
                _live_handle: u64,
            ) -> Result<FeedbackRecord, crate::driver::DriverError> {
                unreachable!()
            }
            fn capture_pipeline(
                &self,
                _live_handle: u64,
            ) -> Result<PipelineRecord, crate::driver::DriverError> {
                unreachable!()
            }
            fn create_context(
                &mut self,
                _record: &crate::schema::ContextRecord,
            ) -> Result<u64, crate::driver::DriverError> {
                unreachable!()
            }
            fn create_shader(
                &mut self,
                _record: &crate::schema::ShaderRecord,
            ) -> Result<u64, crate::driver::DriverError> {
                unreachable!()
            }
            fn create_program(&mut self, _record: &ProgramRecord) -> Result<u64, crate::driver::DriverError> {
                unreachable!()
            }
            fn create_buffer(&mut self, _record: &BufferRecord) -> Result<u64, crate::driver::DriverError> {
                unreachable!()
            }
            fn create_texture(
                &mut self,
                _record: &crate::schema::TextureRecord,
            ) -> Result<u64, crate::driver::DriverError> {
                unreachable!()
            }
            fn create_sampler(
                &mut self,
                _record: &crate::schema::SamplerRecord,
            ) -> Result<u64, crate::driver::DriverError> {
                unreachable!()
            }
            fn create_renderbuffer(
                &mut self,
                _record: &crate::schema::RenderbufferRecord,
            ) -> Result<u64, crate::driver::DriverError> {
                unreachable!()
            }
            fn create_framebuffer(&mut self, _record: &FramebufferRecord) -> Result<u64, crate::driver::DriverError> {
                unreachable!()
            }
            fn create_vao(&mut self, _record: &VaoRecord) -> Result<u64, crate::driver::DriverError> {
                unreachable!()
            }
            fn create_query(
                &mut self,
                _record: &crate::schema::QueryRecord,
            ) -> Result<u64, crate::driver::DriverError> {
                unreachable!()
            }
            fn create_sync(
                &mut self,
                _record: &crate::schema::SyncRecord,
            ) -> Result<u64, crate::driver::DriverError> {
                unreachable!()
            }
            fn create_pipeline(&mut self, _record: &PipelineRecord) -> Result<u64, crate::driver::DriverError> {
                unreachable!()
            }
            fn create_list(
                &mut self,
                _record: &crate::schema::ListRecord,
            ) -> Result<u64, crate::driver::DriverError> {
                unreachable!()
            }
            fn create_feedback(&mut self, _record: &FeedbackRecord) -> Result<u64, crate::driver::DriverError> {
                unreachable!()
            }
            fn apply_context_state(
                &mut self,
                _record: &crate::schema::ContextRecord,
            ) -> Result<(), crate::driver::DriverError> {
                unreachable!()
            }
            fn restore_default_framebuffer(
                &mut self,
                _record: &crate::schema::DefaultFramebufferRecord,
            ) -> Result<(), crate::driver::DriverError> {
                unreachable!()
            }
        }

        let mut snapshot = Snapshot::empty();
        snapshot.schema_version = 9999;
        let mut driver = NoOpDriver;
        assert!(matches!(
            restore(&mut driver, &snapshot, RestoreOptions::default()),
            Err(SnapshotError::UnsupportedSchemaVersion(9999))
        ));
    }
}
