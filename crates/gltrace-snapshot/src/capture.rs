//! State-snapshot capture (§4.G capture algorithm).
//!
//! 1. Enumerate every known namespace's live handles through the driver and
//!    read back full state (and any pixel/byte payload, via the driver's
//!    capture methods) for each.
//! 2. Record each context's bindings/enables in the schema's fixed field
//!    order — never hash-map order.
//! 3. Record default-framebuffer pixels last, after every other object is
//!    drained, so the readback reflects the snapshot moment.
//!
//! Every handle written into the resulting [`Snapshot`] is a *trace-side*
//! handle, resolved from the driver's live handle through a
//! [`TraceHandleResolver`] — never the live handle itself, so the document
//! stays meaningful once live handles are torn down.

use gltrace_types::HandleNamespace;
use tracing::debug;

use crate::{
    driver::GlDriver,
    error::SnapshotError,
    resolver::TraceHandleResolver,
    schema::{
        BufferRecord, ContextRecord, FeedbackRecord, FramebufferAttachment, FramebufferRecord,
        ListRecord, ProgramBinary, ProgramRecord, QueryRecord, RenderbufferRecord, SamplerRecord,
        ShaderRecord, Snapshot, SyncRecord, TextureLevel, TextureRecord, VaoRecord, VertexAttrib,
    },
};

/// `GL_TEXTURE_CUBE_MAP` and its six face targets; `image_size` for these
/// never folds in a depth dimension the way a 3D/array texture does (§9
/// open question, resolved: the two paths stay distinct, selected by
/// target).
const CUBE_MAP_TARGETS: [u32; 7] =
    [0x8513, 0x8515, 0x8516, 0x8517, 0x8518, 0x8519, 0x851A];

/// Expected uncompressed byte size of a non-cubemap texture level.
#[must_use]
pub fn general_image_size(width: u32, height: u32, depth: u32, bytes_per_texel: u32) -> u64 {
    u64::from(width) * u64::from(height) * u64::from(depth) * u64::from(bytes_per_texel)
}

/// Expected uncompressed byte size of one cubemap face level. Cubemap faces
/// never carry a depth dimension, unlike a general 3D/array texture level.
#[must_use]
pub fn cubemap_face_image_size(width: u32, height: u32, bytes_per_texel: u32) -> u64 {
    u64::from(width) * u64::from(height) * u64::from(bytes_per_texel)
}

/// True if `target` denotes the cubemap or one of its six face targets.
#[must_use]
pub fn is_cubemap_target(target: u32) -> bool {
    CUBE_MAP_TARGETS.contains(&target)
}

/// Capture full GL state across every context reachable from `driver` into a
/// portable [`Snapshot`] document, resolving every handle through `resolver`.
pub fn capture(
    driver: &dyn GlDriver,
    resolver: &dyn TraceHandleResolver,
) -> Result<Snapshot, SnapshotError> {
    let mut snapshot = Snapshot::empty();

    for live in driver.enumerate(HandleNamespace::Shader) {
        snapshot.shaders.push(capture_shader(driver, resolver, live)?);
    }
    for live in driver.enumerate(HandleNamespace::Program) {
        snapshot.programs.push(capture_program(driver, resolver, live)?);
    }
    for live in driver.enumerate(HandleNamespace::Buffer) {
        snapshot.buffers.push(capture_buffer(driver, resolver, live)?);
    }
    for live in driver.enumerate(HandleNamespace::Texture) {
        snapshot.textures.push(capture_texture(driver, resolver, live)?);
    }
    for live in driver.enumerate(HandleNamespace::Sampler) {
        let record = driver.capture_sampler(live).map_err(|e| SnapshotError::Driver(e.to_string()))?;
        snapshot.samplers.push(SamplerRecord {
            handle: resolver.trace_handle_for(HandleNamespace::Sampler, record.handle),
            ..record
        });
    }
    for live in driver.enumerate(HandleNamespace::Renderbuffer) {
        let record = driver
            .capture_renderbuffer(live)
            .map_err(|e| SnapshotError::Driver(e.to_string()))?;
        snapshot.renderbuffers.push(RenderbufferRecord {
            handle: resolver.trace_handle_for(HandleNamespace::Renderbuffer, record.handle),
            ..record
        });
    }
    for live in driver.enumerate(HandleNamespace::Framebuffer) {
        snapshot.framebuffers.push(capture_framebuffer(driver, resolver, live)?);
    }
    for live in driver.enumerate(HandleNamespace::VertexArray) {
        snapshot.vaos.push(capture_vao(driver, resolver, live)?);
    }
    for live in driver.enumerate(HandleNamespace::Sync) {
        let record = driver.capture_sync(live).map_err(|e| SnapshotError::Driver(e.to_string()))?;
        snapshot.syncs.push(SyncRecord {
            handle: resolver.trace_handle_for(HandleNamespace::Sync, record.handle),
            ..record
        });
    }
    for live in driver.enumerate(HandleNamespace::Query) {
        let record = driver.capture_query(live).map_err(|e| SnapshotError::Driver(e.to_string()))?;
        snapshot.queries.push(QueryRecord {
            handle: resolver.trace_handle_for(HandleNamespace::Query, record.handle),
            ..record
        });
    }
    for live in driver.enumerate(HandleNamespace::List) {
        let record = driver.capture_list(live).map_err(|e| SnapshotError::Driver(e.to_string()))?;
        snapshot.lists.push(ListRecord {
            handle: resolver.trace_handle_for(HandleNamespace::List, record.handle),
            ..record
        });
    }
    for live in driver.enumerate(HandleNamespace::Feedback) {
        snapshot.feedbacks.push(capture_feedback(driver, resolver, live)?);
    }
    for live in driver.enumerate(HandleNamespace::Pipeline) {
        let record = driver.capture_pipeline(live).map_err(|e| SnapshotError::Driver(e.to_string()))?;
        let programs = record
            .programs
            .into_iter()
            .map(|(stage, handle)| (stage, resolver.trace_handle_for(HandleNamespace::Program, handle)))
            .collect();
        snapshot.pipelines.push(crate::schema::PipelineRecord {
            handle: resolver.trace_handle_for(HandleNamespace::Pipeline, record.handle),
            programs,
        });
    }
    for live in driver.enumerate(HandleNamespace::Context) {
        snapshot.contexts.push(capture_context(driver, resolver, live)?);
    }

    // Default framebuffer pixels last: every other object has been drained,
    // so this readback reflects the snapshot moment (§4.G step 3).
    snapshot.default_framebuffer =
        driver.capture_default_framebuffer().map_err(|e| SnapshotError::Driver(e.to_string()))?;

    debug!(
        contexts = snapshot.contexts.len(),
        textures = snapshot.textures.len(),
        buffers = snapshot.buffers.len(),
        programs = snapshot.programs.len(),
        "captured snapshot"
    );
    Ok(snapshot)
}

fn capture_shader(
    driver: &dyn GlDriver,
    resolver: &dyn TraceHandleResolver,
    live: u64,
) -> Result<ShaderRecord, SnapshotError> {
    let record = driver.capture_shader(live).map_err(|e| SnapshotError::Driver(e.to_string()))?;
    Ok(ShaderRecord { handle: resolver.trace_handle_for(HandleNamespace::Shader, record.handle), ..record })
}

fn capture_program(
    driver: &dyn GlDriver,
    resolver: &dyn TraceHandleResolver,
    live: u64,
) -> Result<ProgramRecord, SnapshotError> {
    let record = driver.capture_program(live).map_err(|e| SnapshotError::Driver(e.to_string()))?;
    Ok(ProgramRecord {
        handle: resolver.trace_handle_for(HandleNamespace::Program, record.handle),
        attached_shaders: record
            .attached_shaders
            .into_iter()
            .map(|h| resolver.trace_handle_for(HandleNamespace::Shader, h))
            .collect(),
        binary: record.binary.map(|b| ProgramBinary { format: b.format, blob: b.blob }),
        ..record
    })
}

fn capture_buffer(
    driver: &dyn GlDriver,
    resolver: &dyn TraceHandleResolver,
    live: u64,
) -> Result<BufferRecord, SnapshotError> {
    let record = driver.capture_buffer(live).map_err(|e| SnapshotError::Driver(e.to_string()))?;
    Ok(BufferRecord { handle: resolver.trace_handle_for(HandleNamespace::Buffer, record.handle), ..record })
}

fn capture_texture(
    driver: &dyn GlDriver,
    resolver: &dyn TraceHandleResolver,
    live: u64,
) -> Result<TextureRecord, SnapshotError> {
    let record = driver.capture_texture(live).map_err(|e| SnapshotError::Driver(e.to_string()))?;
    for level in &record.levels {
        check_level_size(record.target, level);
    }
    Ok(TextureRecord { handle: resolver.trace_handle_for(HandleNamespace::Texture, record.handle), ..record })
}

/// Warn (never fail) when a captured level's pixel payload disagrees with
/// the size the format's dimensions predict. Compressed levels are exempt —
/// their byte size depends on the compression scheme, out of this crate's
/// scope (§1 non-goals: the compression algorithm is a collaborator).
fn check_level_size(target: u32, level: &TextureLevel) {
    if level.compressed {
        return;
    }
    let Some(pixels) = &level.pixels else { return };
    // Without a format->bytes-per-texel table (out of scope; that table
    // belongs to the excluded container/compression collaborators) we can
    // only sanity-check that *some* consistent bytes-per-texel exists, by
    // checking the byte count divides evenly into the predicted texel count.
    let texel_count = if is_cubemap_target(target) {
        u64::from(level.width) * u64::from(level.height)
    } else {
        u64::from(level.width) * u64::from(level.height) * u64::from(level.depth)
    };
    if texel_count == 0 {
        return;
    }
    if (pixels.size % texel_count) != 0 {
        debug!(
            target,
            width = level.width,
            height = level.height,
            depth = level.depth,
            declared_size = pixels.size,
            "texture level pixel size is not an even multiple of its texel count"
        );
    }
}

fn capture_framebuffer(
    driver: &dyn GlDriver,
    resolver: &dyn TraceHandleResolver,
    live: u64,
) -> Result<FramebufferRecord, SnapshotError> {
    let record = driver.capture_framebuffer(live).map_err(|e| SnapshotError::Driver(e.to_string()))?;
    let attachments = record
        .attachments
        .into_iter()
        .map(|a| {
            let namespace = if a.target == 0x8D41 /* GL_RENDERBUFFER */ {
                HandleNamespace::Renderbuffer
            } else {
                HandleNamespace::Texture
            };
            FramebufferAttachment { object: resolver.trace_handle_for(namespace, a.object), ..a }
        })
        .collect();
    Ok(FramebufferRecord {
        handle: resolver.trace_handle_for(HandleNamespace::Framebuffer, record.handle),
        attachments,
    })
}

fn capture_vao(
    driver: &dyn GlDriver,
    resolver: &dyn TraceHandleResolver,
    live: u64,
) -> Result<VaoRecord, SnapshotError> {
    let record = driver.capture_vao(live).map_err(|e| SnapshotError::Driver(e.to_string()))?;
    let attribs = record
        .attribs
        .into_iter()
        .map(|a| VertexAttrib {
            buffer_binding: resolver.trace_handle_for(HandleNamespace::Buffer, a.buffer_binding),
            ..a
        })
        .collect();
    Ok(VaoRecord {
        handle: resolver.trace_handle_for(HandleNamespace::VertexArray, record.handle),
        attribs,
        element_array_buffer: record
            .element_array_buffer
            .map(|h| resolver.trace_handle_for(HandleNamespace::Buffer, h)),
    })
}

fn capture_feedback(
    driver: &dyn GlDriver,
    resolver: &dyn TraceHandleResolver,
    live: u64,
) -> Result<FeedbackRecord, SnapshotError> {
    let record = driver.capture_feedback(live).map_err(|e| SnapshotError::Driver(e.to_string()))?;
    let buffer_bindings = record
        .buffer_bindings
        .into_iter()
        .map(|(index, handle)| (index, resolver.trace_handle_for(HandleNamespace::Buffer, handle)))
        .collect();
    Ok(FeedbackRecord {
        handle: resolver.trace_handle_for(HandleNamespace::Feedback, record.handle),
        buffer_bindings,
    })
}

fn capture_context(
    driver: &dyn GlDriver,
    resolver: &dyn TraceHandleResolver,
    live: u64,
) -> Result<ContextRecord, SnapshotError> {
    let record = driver.capture_context(live).map_err(|e| SnapshotError::Driver(e.to_string()))?;
    let mut bindings = record.bindings;
    bindings.current_program =
        bindings.current_program.map(|h| resolver.trace_handle_for(HandleNamespace::Program, h));
    bindings.current_vao =
        bindings.current_vao.map(|h| resolver.trace_handle_for(HandleNamespace::VertexArray, h));
    bindings.buffer_bindings = bindings
        .buffer_bindings
        .into_iter()
        .map(|(target, handle)| (target, resolver.trace_handle_for(HandleNamespace::Buffer, handle)))
        .collect();
    bindings.texture_bindings = bindings
        .texture_bindings
        .into_iter()
        .map(|(unit, target, handle)| {
            (unit, target, resolver.trace_handle_for(HandleNamespace::Texture, handle))
        })
        .collect();
    bindings.draw_framebuffer =
        resolver.trace_handle_for(HandleNamespace::Framebuffer, bindings.draw_framebuffer);
    bindings.read_framebuffer =
        resolver.trace_handle_for(HandleNamespace::Framebuffer, bindings.read_framebuffer);

    Ok(ContextRecord {
        handle: resolver.trace_handle_for(HandleNamespace::Context, record.handle),
        bindings,
        share_group: record
            .share_group
            .map(|h| resolver.trace_handle_for(HandleNamespace::Context, h)),
        ..record
    })
}
