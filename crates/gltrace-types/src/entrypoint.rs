//! Entrypoint registry.
//!
//! For every GL/GLX/WGL entrypoint the recorder knows how to serialize, a
//! static record describes its id, signature, and category flags. Like the
//! ctype registry, this table is immutable and process-global: no dynamic
//! loading, no mutation after startup.

use std::sync::LazyLock;

use crate::{ctype::TypeId, namespace::HandleNamespace};

/// Stable identifier for a registered entrypoint. Matches the wire-format
/// `entrypoint_id` field of a trace packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntrypointId(pub u16);

/// Direction of data flow for one parameter relative to the call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamDirection {
    /// Caller supplies the value/memory; the driver only reads it.
    In,
    /// The driver writes the value/memory; the caller's input is ignored.
    Out,
    /// Caller supplies an initial value the driver may read and overwrite.
    InOut,
}

/// Descriptor for one parameter of an entrypoint.
#[derive(Debug, Clone, Copy)]
pub struct ParamDescriptor {
    /// Parameter name, for diagnostics and document form.
    pub name: &'static str,
    /// C type of this parameter.
    pub ctype: TypeId,
    /// Handle namespace the value is interpreted in, or `None` for a plain
    /// scalar.
    pub namespace: HandleNamespace,
    /// Data-flow direction.
    pub direction: ParamDirection,
    /// If true, a trace handle in this parameter with no live mapping is
    /// tolerated (mapped to zero / generated on first use) rather than
    /// treated as a hard `HandleUnknown` error.
    pub tolerate_missing_handle: bool,
}

bitflags::bitflags! {
    /// Category flags attached to an entrypoint descriptor.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct EntrypointFlags: u8 {
        /// Marks a frame boundary (e.g. `glXSwapBuffers`).
        const SWAP = 1 << 0;
        /// Issues rendering work.
        const DRAW = 1 << 1;
        /// Changes the current context (`wglMakeCurrent`, `glXMakeCurrent`).
        const MAKE_CURRENT = 1 << 2;
        /// Known-safe to replay without further scrutiny.
        const WHITELISTED = 1 << 3;
        /// Has an observable side effect beyond its return value (so replay
        /// output comparison / divergence checks apply).
        const HAS_SIDE_EFFECT = 1 << 4;
        /// Appends to a compatibility-profile display list when one is open.
        const IS_LISTABLE = 1 << 5;
        /// Writes newly generated handles into an `out`-direction handle
        /// param; the replayer registers fresh handle-map entries after the
        /// call (§4.H.2 step 4).
        const GENERATES_HANDLES = 1 << 6;
        /// Retires the handles passed in an `in`-direction handle param; the
        /// replayer erases their handle-map entries after the call
        /// (§4.H.2 step 4).
        const DELETES_HANDLES = 1 << 7;
    }
}

/// Descriptor for one registered entrypoint.
#[derive(Debug, Clone)]
pub struct Entrypoint {
    /// Stable id, used as the wire representation.
    pub id: EntrypointId,
    /// Canonical GL/GLX/WGL function name.
    pub name: &'static str,
    /// Return type, or the `GLvoid` id for entrypoints with no return value.
    pub return_type: TypeId,
    /// Parameter list, in call order.
    pub params: &'static [ParamDescriptor],
    /// Category flags.
    pub flags: EntrypointFlags,
}

impl Entrypoint {
    /// True if the entrypoint has a non-void return value.
    #[must_use]
    pub fn has_return_value(&self) -> bool {
        self.return_type != TypeId(0)
    }

    /// True if this entrypoint marks a frame boundary.
    #[must_use]
    pub fn is_swap(&self) -> bool {
        self.flags.contains(EntrypointFlags::SWAP)
    }

    /// True if this entrypoint is known safe to replay without scrutiny.
    #[must_use]
    pub fn is_whitelisted(&self) -> bool {
        self.flags.contains(EntrypointFlags::WHITELISTED)
    }
}

macro_rules! param {
    ($name:expr, $ctype:expr, $ns:expr, $dir:expr) => {
        ParamDescriptor {
            name: $name,
            ctype: TypeId($ctype),
            namespace: $ns,
            direction: $dir,
            tolerate_missing_handle: false,
        }
    };
}

static GEN_TEXTURES_PARAMS: &[ParamDescriptor] = &[
    param!("n", 11, HandleNamespace::None, ParamDirection::In),
    param!("textures", 24, HandleNamespace::Texture, ParamDirection::Out),
];
static BIND_TEXTURE_PARAMS: &[ParamDescriptor] = &[
    param!("target", 16, HandleNamespace::None, ParamDirection::In),
    param!("texture", 7, HandleNamespace::Texture, ParamDirection::In),
];
static DELETE_TEXTURES_PARAMS: &[ParamDescriptor] = &[
    param!("n", 11, HandleNamespace::None, ParamDirection::In),
    param!("textures", 24, HandleNamespace::Texture, ParamDirection::In),
];
static CLEAR_COLOR_PARAMS: &[ParamDescriptor] = &[
    param!("red", 12, HandleNamespace::None, ParamDirection::In),
    param!("green", 12, HandleNamespace::None, ParamDirection::In),
    param!("blue", 12, HandleNamespace::None, ParamDirection::In),
    param!("alpha", 12, HandleNamespace::None, ParamDirection::In),
];
static CLEAR_PARAMS: &[ParamDescriptor] =
    &[param!("mask", 17, HandleNamespace::None, ParamDirection::In)];
static ENABLE_PARAMS: &[ParamDescriptor] =
    &[param!("cap", 16, HandleNamespace::None, ParamDirection::In)];
static GET_ERROR_PARAMS: &[ParamDescriptor] = &[];
static SWAP_BUFFERS_PARAMS: &[ParamDescriptor] =
    &[param!("dpy", 33, HandleNamespace::None, ParamDirection::In)];
static MAKE_CURRENT_PARAMS: &[ParamDescriptor] = &[
    param!("dpy", 33, HandleNamespace::None, ParamDirection::In),
    param!("drawable", 35, HandleNamespace::None, ParamDirection::In),
    param!("ctx", 34, HandleNamespace::Context, ParamDirection::In),
];

/// The complete, static entrypoint table.
///
/// A recorder that observes a call not present here cannot trace it; a
/// replayer that encounters an id it does not recognize here must reject
/// the packet with a `FormatError` (unknown entrypoint id, §7).
static ENTRYPOINT_TABLE: LazyLock<Vec<Entrypoint>> = LazyLock::new(|| {
    vec![
        Entrypoint {
            id: EntrypointId(0),
            name: "glGenTextures",
            return_type: TypeId(0),
            params: GEN_TEXTURES_PARAMS,
            flags: EntrypointFlags::WHITELISTED
                .union(EntrypointFlags::HAS_SIDE_EFFECT)
                .union(EntrypointFlags::GENERATES_HANDLES),
        },
        Entrypoint {
            id: EntrypointId(1),
            name: "glBindTexture",
            return_type: TypeId(0),
            params: BIND_TEXTURE_PARAMS,
            flags: EntrypointFlags::WHITELISTED.union(EntrypointFlags::HAS_SIDE_EFFECT),
        },
        Entrypoint {
            id: EntrypointId(2),
            name: "glDeleteTextures",
            return_type: TypeId(0),
            params: DELETE_TEXTURES_PARAMS,
            flags: EntrypointFlags::WHITELISTED
                .union(EntrypointFlags::HAS_SIDE_EFFECT)
                .union(EntrypointFlags::DELETES_HANDLES),
        },
        Entrypoint {
            id: EntrypointId(3),
            name: "glClearColor",
            return_type: TypeId(0),
            params: CLEAR_COLOR_PARAMS,
            flags: EntrypointFlags::WHITELISTED,
        },
        Entrypoint {
            id: EntrypointId(4),
            name: "glClear",
            return_type: TypeId(0),
            params: CLEAR_PARAMS,
            flags: EntrypointFlags::WHITELISTED
                .union(EntrypointFlags::DRAW)
                .union(EntrypointFlags::HAS_SIDE_EFFECT),
        },
        Entrypoint {
            id: EntrypointId(5),
            name: "glEnable",
            return_type: TypeId(0),
            params: ENABLE_PARAMS,
            flags: EntrypointFlags::WHITELISTED.union(EntrypointFlags::HAS_SIDE_EFFECT),
        },
        Entrypoint {
            id: EntrypointId(6),
            name: "glDisable",
            return_type: TypeId(0),
            params: ENABLE_PARAMS,
            flags: EntrypointFlags::WHITELISTED.union(EntrypointFlags::HAS_SIDE_EFFECT),
        },
        Entrypoint {
            id: EntrypointId(7),
            name: "glGetError",
            return_type: TypeId(16),
            params: GET_ERROR_PARAMS,
            flags: EntrypointFlags::WHITELISTED,
        },
        Entrypoint {
            id: EntrypointId(8),
            name: "glXSwapBuffers",
            return_type: TypeId(0),
            params: SWAP_BUFFERS_PARAMS,
            flags: EntrypointFlags::WHITELISTED.union(EntrypointFlags::SWAP),
        },
        Entrypoint {
            id: EntrypointId(9),
            name: "glXMakeCurrent",
            return_type: TypeId(1),
            params: MAKE_CURRENT_PARAMS,
            flags: EntrypointFlags::WHITELISTED
                .union(EntrypointFlags::MAKE_CURRENT)
                .union(EntrypointFlags::HAS_SIDE_EFFECT),
        },
    ]
});

/// Look up a registered entrypoint by id.
#[must_use]
pub fn entrypoint_by_id(id: EntrypointId) -> Option<&'static Entrypoint> {
    ENTRYPOINT_TABLE.iter().find(|e| e.id == id)
}

/// Look up a registered entrypoint by canonical name.
#[must_use]
pub fn entrypoint_by_name(name: &str) -> Option<&'static Entrypoint> {
    ENTRYPOINT_TABLE.iter().find(|e| e.name == name)
}

/// Iterate over every registered entrypoint, in id order.
pub fn all_entrypoints() -> impl Iterator<Item = &'static Entrypoint> {
    ENTRYPOINT_TABLE.iter()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn swap_buffers_is_flagged_swap() {
        let ep = entrypoint_by_name("glXSwapBuffers").unwrap();
        assert!(ep.is_swap());
    }

    #[test]
    fn ids_are_unique() {
        let mut ids: Vec<u16> = all_entrypoints().map(|e| e.id.0).collect();
        let before = ids.len();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), before, "duplicate entrypoint id");
    }

    #[test]
    fn clear_has_no_return_value() {
        let ep = entrypoint_by_name("glClear").unwrap();
        assert!(!ep.has_return_value());
    }

    #[test]
    fn make_current_has_boolean_return() {
        let ep = entrypoint_by_name("glXMakeCurrent").unwrap();
        assert!(ep.has_return_value());
        assert!(ep.flags.contains(EntrypointFlags::MAKE_CURRENT));
    }
}
