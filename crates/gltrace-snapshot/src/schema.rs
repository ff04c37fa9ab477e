//! The state snapshot document (§3.6, §6.3).
//!
//! A schema-versioned, JSON-shape tree. Large byte payloads never live
//! inline; every pixel/buffer/program-binary payload is a [`BlobRef`]
//! resolved against a companion [`gltrace_archive::BlobArchive`]. Field
//! order within each record is fixed by this struct's declaration order —
//! callers must not depend on hash-map iteration order anywhere in this
//! schema (§4.G.2).

use gltrace_types::HandleNamespace;
use serde::{Deserialize, Serialize};

/// Current schema version this crate reads and writes.
pub const CURRENT_SCHEMA_VERSION: u32 = 1;

/// A reference to a blob living in the snapshot's companion archive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlobRef {
    /// Name (or content-hash hex string) the blob is stored under.
    pub blob: String,
    /// Declared byte size, checked against the resolved blob.
    pub size: u64,
    /// Declared CRC-64/XZ, checked against the resolved blob.
    pub crc: u64,
}

/// One mipmap level of a texture.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextureLevel {
    /// Level width in texels.
    pub width: u32,
    /// Level height in texels (1 for 1D targets).
    pub height: u32,
    /// Level depth in texels/layers (1 for non-array, non-3D targets).
    pub depth: u32,
    /// GL internal format enum.
    pub internal_format: u32,
    /// True if stored compressed (pixel bytes are the compressed payload).
    pub compressed: bool,
    /// Pixel bytes, absent for an uninitialized level.
    pub pixels: Option<BlobRef>,
}

/// A captured texture object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextureRecord {
    /// Trace-side handle.
    pub handle: u64,
    /// GL texture target (`GL_TEXTURE_2D`, `GL_TEXTURE_CUBE_MAP`, ...).
    pub target: u32,
    /// Levels, ordered by level index. For cubemaps, each of the six faces
    /// contributes its own run of levels in face order.
    pub levels: Vec<TextureLevel>,
}

/// A captured buffer object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BufferRecord {
    /// Trace-side handle.
    pub handle: u64,
    /// Last binding target used (informational; buffers may be rebound).
    pub target: u32,
    /// Buffer size in bytes.
    pub size: u64,
    /// Usage hint (`GL_STATIC_DRAW`, ...).
    pub usage: u32,
    /// Buffer contents, absent for a zero-size buffer.
    pub contents: Option<BlobRef>,
}

/// A captured shader object's compiled stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShaderRecord {
    /// Trace-side handle.
    pub handle: u64,
    /// GL shader stage (`GL_VERTEX_SHADER`, ...).
    pub shader_type: u32,
    /// Shader source text.
    pub source: String,
}

/// A program's compiled driver binary, when the driver exposes one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgramBinary {
    /// Driver-defined binary format enum.
    pub format: u32,
    /// Binary payload.
    pub blob: BlobRef,
}

/// A captured program object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgramRecord {
    /// Trace-side handle.
    pub handle: u64,
    /// Handles of shaders attached at capture time.
    pub attached_shaders: Vec<u64>,
    /// Link status as last observed.
    pub link_status: bool,
    /// Attribute name to bound location, in query order.
    pub attribute_locations: Vec<(String, i32)>,
    /// Uniform name to location, in query order.
    pub uniform_locations: Vec<(String, i32)>,
    /// Uniform block name to binding index, in query order.
    pub uniform_block_locations: Vec<(String, u32)>,
    /// Driver binary, preferred over `sources` for restore when present.
    pub binary: Option<ProgramBinary>,
    /// Per-stage source, used to relink when no `binary` was captured or the
    /// restoring driver rejects it.
    pub sources: Vec<(u32, String)>,
}

/// A captured sampler object's parameter set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SamplerRecord {
    /// Trace-side handle.
    pub handle: u64,
    /// `(pname, value)` pairs, in query order.
    pub params: Vec<(String, i32)>,
}

/// A captured renderbuffer object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderbufferRecord {
    /// Trace-side handle.
    pub handle: u64,
    /// Storage internal format.
    pub internal_format: u32,
    /// Storage width in texels.
    pub width: u32,
    /// Storage height in texels.
    pub height: u32,
}

/// One attachment point of a captured framebuffer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FramebufferAttachment {
    /// Attachment point (`GL_COLOR_ATTACHMENT0`, `GL_DEPTH_ATTACHMENT`, ...).
    pub point: u32,
    /// Attached object type (`GL_TEXTURE` or `GL_RENDERBUFFER`).
    pub target: u32,
    /// Handle of the attached texture or renderbuffer.
    pub object: u64,
    /// Mip level, for texture attachments.
    pub level: i32,
    /// Layer/face index, for array or cubemap texture attachments.
    pub layer: i32,
}

/// A captured framebuffer object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FramebufferRecord {
    /// Trace-side handle.
    pub handle: u64,
    /// Non-empty attachment points, in attachment-point order.
    pub attachments: Vec<FramebufferAttachment>,
}

/// One vertex attribute slot of a captured vertex array object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VertexAttrib {
    /// Attribute index.
    pub index: u32,
    /// Whether the attribute array is enabled.
    pub enabled: bool,
    /// Component count (1-4).
    pub size: i32,
    /// Component GL type enum.
    pub component_type: u32,
    /// Whether integer components are normalized to `[-1,1]`/`[0,1]`.
    pub normalized: bool,
    /// Stride in bytes between consecutive elements.
    pub stride: i32,
    /// Byte offset of the first element into the bound buffer.
    pub offset: u64,
    /// Instance divisor (0 = per-vertex).
    pub divisor: u32,
    /// Handle of the buffer bound to this attribute's array binding.
    pub buffer_binding: u64,
}

/// A captured vertex array object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VaoRecord {
    /// Trace-side handle.
    pub handle: u64,
    /// Per-attribute state, ordered by index.
    pub attribs: Vec<VertexAttrib>,
    /// Handle of the bound element array buffer, if any.
    pub element_array_buffer: Option<u64>,
}

/// A captured sync object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncRecord {
    /// Trace-side handle.
    pub handle: u64,
    /// Sync condition (`GL_SYNC_GPU_COMMANDS_COMPLETE`).
    pub condition: u32,
    /// Creation flags (currently always 0 in GL, carried for forward compat).
    pub flags: u32,
}

/// A captured query object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryRecord {
    /// Trace-side handle.
    pub handle: u64,
    /// Query target (`GL_SAMPLES_PASSED`, ...).
    pub target: u32,
    /// Last available result, if the query had completed at capture time.
    pub result: Option<u64>,
}

/// A captured compatibility-profile display list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListRecord {
    /// Trace-side handle.
    pub handle: u64,
    /// Opaque recorded command stream for this list, if the driver exposes
    /// one; otherwise absent and the list is not restorable verbatim.
    pub commands: Option<BlobRef>,
}

/// A captured program pipeline object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineRecord {
    /// Trace-side handle.
    pub handle: u64,
    /// `(stage bitmask, program handle)` pairs, in binding order.
    pub programs: Vec<(u32, u64)>,
}

/// A captured transform feedback object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackRecord {
    /// Trace-side handle.
    pub handle: u64,
    /// `(binding index, buffer handle)` pairs, in binding-index order.
    pub buffer_bindings: Vec<(u32, u64)>,
}

/// Current bindings and enable-state of one context, captured in the order
/// defined by this struct — never hash-map order (§4.G.2).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextBindings {
    /// Currently bound program, if any.
    pub current_program: Option<u64>,
    /// Currently bound vertex array object, if any.
    pub current_vao: Option<u64>,
    /// `(target, handle)` buffer bindings, in target-enum order.
    pub buffer_bindings: Vec<(u32, u64)>,
    /// `(texture unit, target, handle)` texture bindings, in unit order.
    pub texture_bindings: Vec<(u32, u32, u64)>,
    /// Currently bound draw framebuffer, if any (0 = default framebuffer).
    pub draw_framebuffer: u64,
    /// Currently bound read framebuffer, if any (0 = default framebuffer).
    pub read_framebuffer: u64,
}

/// One compatibility-profile matrix stack (`GL_MODELVIEW`, `GL_PROJECTION`,
/// `GL_TEXTURE`), captured only when the context's profile requires it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatrixStack {
    /// Which matrix mode this stack belongs to.
    pub mode: u32,
    /// Stack contents, bottom to top, each a 16-element column-major matrix.
    pub stack: Vec<[f32; 16]>,
}

/// A captured rendering context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextRecord {
    /// Trace-side handle.
    pub handle: u64,
    /// `(attrib name, value)` creation attributes, as recorded.
    pub attribs: Vec<(String, i64)>,
    /// Handle of the context this one shares object namespaces with, if any.
    pub share_group: Option<u64>,
    /// Current bindings.
    pub bindings: ContextBindings,
    /// Capability enums currently enabled (`glEnable`'d).
    pub enables: Vec<u32>,
    /// Compatibility-profile matrix stacks, absent on a core-profile context.
    pub matrix_stacks: Vec<MatrixStack>,
    /// Current viewport `(x, y, width, height)`.
    pub viewport: (i32, i32, i32, i32),
    /// Current scissor box, if scissor test state has ever been set.
    pub scissor: Option<(i32, i32, i32, i32)>,
    /// Current clear color.
    pub clear_color: [f32; 4],
    /// Current clear depth.
    pub clear_depth: f64,
    /// Current clear stencil.
    pub clear_stencil: i32,
    /// `(pname, value)` pixel-store mode pairs, in query order.
    pub pixel_store: Vec<(String, i32)>,
}

/// The default framebuffer's pixel contents, captured last so the readback
/// reflects the snapshot moment (§4.G step 3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DefaultFramebufferRecord {
    /// Drawable width in pixels.
    pub width: u32,
    /// Drawable height in pixels.
    pub height: u32,
    /// Front color buffer, if captured.
    pub front_color: Option<BlobRef>,
    /// Back color buffer, if captured.
    pub back_color: Option<BlobRef>,
    /// Depth buffer, if captured.
    pub depth: Option<BlobRef>,
    /// Stencil buffer, if captured.
    pub stencil: Option<BlobRef>,
}

/// A complete GL state snapshot across every context (§3.6).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Schema version this document was written under.
    pub schema_version: u32,
    /// Captured contexts.
    pub contexts: Vec<ContextRecord>,
    /// Captured textures.
    pub textures: Vec<TextureRecord>,
    /// Captured buffers.
    pub buffers: Vec<BufferRecord>,
    /// Captured programs.
    pub programs: Vec<ProgramRecord>,
    /// Captured shaders.
    pub shaders: Vec<ShaderRecord>,
    /// Captured samplers.
    pub samplers: Vec<SamplerRecord>,
    /// Captured renderbuffers.
    pub renderbuffers: Vec<RenderbufferRecord>,
    /// Captured framebuffers.
    pub framebuffers: Vec<FramebufferRecord>,
    /// Captured vertex array objects.
    pub vaos: Vec<VaoRecord>,
    /// Captured sync objects.
    pub syncs: Vec<SyncRecord>,
    /// Captured query objects.
    pub queries: Vec<QueryRecord>,
    /// Captured display lists.
    pub lists: Vec<ListRecord>,
    /// Captured transform feedback objects.
    pub feedbacks: Vec<FeedbackRecord>,
    /// Captured program pipeline objects.
    pub pipelines: Vec<PipelineRecord>,
    /// Default framebuffer pixel contents.
    pub default_framebuffer: DefaultFramebufferRecord,
}

impl Snapshot {
    /// An empty snapshot at the current schema version, with no contexts
    /// and a zero-size default framebuffer record.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            schema_version: CURRENT_SCHEMA_VERSION,
            contexts: Vec::new(),
            textures: Vec::new(),
            buffers: Vec::new(),
            programs: Vec::new(),
            shaders: Vec::new(),
            samplers: Vec::new(),
            renderbuffers: Vec::new(),
            framebuffers: Vec::new(),
            vaos: Vec::new(),
            syncs: Vec::new(),
            queries: Vec::new(),
            lists: Vec::new(),
            feedbacks: Vec::new(),
            pipelines: Vec::new(),
            default_framebuffer: DefaultFramebufferRecord {
                width: 0,
                height: 0,
                front_color: None,
                back_color: None,
                depth: None,
                stencil: None,
            },
        }
    }

    /// The namespace each handle-bearing section corresponds to, for
    /// binding-validation purposes (§3.6 invariant: "every handle appearing
    /// in a binding refers to a record in the same snapshot").
    #[must_use]
    pub fn known_handles(&self, namespace: HandleNamespace) -> Vec<u64> {
        match namespace {
            HandleNamespace::Texture => self.textures.iter().map(|t| t.handle).collect(),
            HandleNamespace::Buffer => self.buffers.iter().map(|b| b.handle).collect(),
            HandleNamespace::Program => self.programs.iter().map(|p| p.handle).collect(),
            HandleNamespace::Shader => self.shaders.iter().map(|s| s.handle).collect(),
            HandleNamespace::Sampler => self.samplers.iter().map(|s| s.handle).collect(),
            HandleNamespace::Renderbuffer => self.renderbuffers.iter().map(|r| r.handle).collect(),
            HandleNamespace::Framebuffer => self.framebuffers.iter().map(|f| f.handle).collect(),
            HandleNamespace::VertexArray => self.vaos.iter().map(|v| v.handle).collect(),
            HandleNamespace::Sync => self.syncs.iter().map(|s| s.handle).collect(),
            HandleNamespace::Query => self.queries.iter().map(|q| q.handle).collect(),
            HandleNamespace::List => self.lists.iter().map(|l| l.handle).collect(),
            HandleNamespace::Feedback => self.feedbacks.iter().map(|f| f.handle).collect(),
            HandleNamespace::Pipeline => self.pipelines.iter().map(|p| p.handle).collect(),
            HandleNamespace::Context => self.contexts.iter().map(|c| c.handle).collect(),
            HandleNamespace::None | HandleNamespace::Location | HandleNamespace::Fence => Vec::new(),
        }
    }
}
