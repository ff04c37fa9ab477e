//! Live-handle → trace-handle resolution, the seam that lets this crate
//! write trace-side handles into a [`crate::schema::Snapshot`] without
//! depending on `gltrace-replay`'s handle map (that dependency would cycle:
//! `gltrace-replay` depends on this crate for capture/restore).
//!
//! `gltrace-replay`'s `HandleMap` implements this trait directly; standalone
//! capture (tests, a future offline inspector) can use [`IdentityResolver`].

use gltrace_types::HandleNamespace;

/// Resolves a live GL handle back to the trace-side handle it was created
/// for, within one namespace.
pub trait TraceHandleResolver {
    /// The trace handle that `live_handle` in `namespace` currently maps
    /// from, or `live_handle` unchanged if this resolver tracks no such
    /// mapping (namespace 0 / value 0 always resolves to 0, per §3.7).
    fn trace_handle_for(&self, namespace: HandleNamespace, live_handle: u64) -> u64;
}

/// A resolver that performs no translation: every live handle is assumed to
/// already be its own trace handle. Used by standalone capture/restore
/// round-trip tests that never go through a replay engine's handle map.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityResolver;

impl TraceHandleResolver for IdentityResolver {
    fn trace_handle_for(&self, _namespace: HandleNamespace, live_handle: u64) -> u64 {
        live_handle
    }
}
