//! Handle namespace enumeration.
//!
//! A handle namespace is the GL object class a `u32` handle value is
//! interpreted in. Two recordings of the same value in the same namespace
//! refer to the same logical object; equality across namespaces is
//! undefined and must never be assumed by callers.

use serde::{Deserialize, Serialize};

/// A closed enumeration of GL handle namespaces.
///
/// `None` is the namespace of plain scalar parameters that never denote a
/// handle; namespace 0 / value 0 in every other namespace always maps to the
/// live value 0 (see the handle map contract in `gltrace-replay`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[non_exhaustive]
pub enum HandleNamespace {
    /// Not a handle.
    None,
    /// Texture objects.
    Texture,
    /// Buffer objects.
    Buffer,
    /// Shader program objects.
    Program,
    /// Shader objects.
    Shader,
    /// Framebuffer objects.
    Framebuffer,
    /// Renderbuffer objects.
    Renderbuffer,
    /// Sampler objects.
    Sampler,
    /// Query objects.
    Query,
    /// Vertex array objects.
    VertexArray,
    /// Program pipeline objects.
    Pipeline,
    /// Sync objects.
    Sync,
    /// Compatibility-profile display lists.
    List,
    /// Uniform/attribute location "handles" (not GC'd, but remapped like one).
    Location,
    /// Fence objects (legacy `GL_NV_fence`-style).
    Fence,
    /// Transform feedback objects.
    Feedback,
    /// Rendering contexts.
    Context,
}

impl HandleNamespace {
    /// All namespaces that denote GC'd live-mapped objects requiring
    /// entries in the replay-time handle map.
    ///
    /// `Context` is excluded: contexts are tracked by the replay engine's
    /// own context stack rather than the per-namespace handle map used for
    /// ordinary GL objects.
    #[must_use]
    pub const fn all_object_namespaces() -> &'static [Self] {
        &[
            Self::Texture,
            Self::Buffer,
            Self::Program,
            Self::Shader,
            Self::Framebuffer,
            Self::Renderbuffer,
            Self::Sampler,
            Self::Query,
            Self::VertexArray,
            Self::Pipeline,
            Self::Sync,
            Self::List,
            Self::Location,
            Self::Fence,
            Self::Feedback,
        ]
    }

    /// True for namespaces whose handle value 0 is always a valid "no
    /// object" sentinel rather than a real generated handle.
    #[must_use]
    pub const fn zero_is_sentinel(self) -> bool {
        !matches!(self, Self::None)
    }

    /// Stable wire id for this namespace. Part of the trace packet binary
    /// format: both endpoints must agree on these values.
    #[must_use]
    pub const fn to_wire_id(self) -> u16 {
        match self {
            Self::None => 0,
            Self::Texture => 1,
            Self::Buffer => 2,
            Self::Program => 3,
            Self::Shader => 4,
            Self::Framebuffer => 5,
            Self::Renderbuffer => 6,
            Self::Sampler => 7,
            Self::Query => 8,
            Self::VertexArray => 9,
            Self::Pipeline => 10,
            Self::Sync => 11,
            Self::List => 12,
            Self::Location => 13,
            Self::Fence => 14,
            Self::Feedback => 15,
            Self::Context => 16,
        }
    }

    /// Decode a namespace from its wire id. `None` if unrecognized.
    #[must_use]
    pub const fn from_wire_id(id: u16) -> Option<Self> {
        match id {
            0 => Some(Self::None),
            1 => Some(Self::Texture),
            2 => Some(Self::Buffer),
            3 => Some(Self::Program),
            4 => Some(Self::Shader),
            5 => Some(Self::Framebuffer),
            6 => Some(Self::Renderbuffer),
            7 => Some(Self::Sampler),
            8 => Some(Self::Query),
            9 => Some(Self::VertexArray),
            10 => Some(Self::Pipeline),
            11 => Some(Self::Sync),
            12 => Some(Self::List),
            13 => Some(Self::Location),
            14 => Some(Self::Fence),
            15 => Some(Self::Feedback),
            16 => Some(Self::Context),
            _ => None,
        }
    }
}
