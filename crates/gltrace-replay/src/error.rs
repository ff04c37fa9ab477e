//! Error kinds for the replay engine (§7).

use gltrace_types::{EntrypointId, HandleNamespace};
use thiserror::Error;

/// A location a replay error is reported at: the offending packet's
/// `call_counter` and the frame it fell in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorLocation {
    /// Monotonic call identity of the offending packet.
    pub call_counter: u64,
    /// Frame the packet fell in, counted from 0.
    pub frame: u64,
}

/// One divergence observation (§4.H.3). Recorded as a diagnostic; whether it
/// escalates to [`EngineError::ReplayDivergence`] depends on the engine's
/// strict-mode configuration.
#[derive(Debug, Clone, PartialEq)]
pub enum Divergence {
    /// The entrypoint's return value did not match the recorded one.
    ReturnValue {
        /// Entrypoint the mismatch occurred on.
        entrypoint: EntrypointId,
        /// Recorded return value.
        expected: u64,
        /// Value the driver actually returned.
        actual: u64,
    },
    /// An `out`/`inout` client-memory region did not match byte-for-byte.
    OutParameter {
        /// Entrypoint the mismatch occurred on.
        entrypoint: EntrypointId,
        /// Index of the mismatching param.
        param_index: usize,
    },
    /// A per-swap frame digest did not match the recorded one.
    FrameDigest {
        /// Frame the digest was taken at.
        frame: u64,
        /// Recorded digest.
        expected: u64,
        /// Digest the driver actually produced.
        actual: u64,
    },
}

/// Errors the replay engine can report (§7).
#[derive(Error, Debug)]
pub enum EngineError {
    /// A divergence was observed while the engine runs in strict mode.
    #[error("replay diverged at {location:?}: {divergence:?}")]
    ReplayDivergence {
        /// Where the divergence was observed.
        location: ErrorLocation,
        /// What diverged.
        divergence: Divergence,
    },

    /// A trace handle had no live mapping at a call site that required one.
    #[error("unknown trace handle {handle} in namespace {namespace:?} at {location:?}")]
    HandleUnknown {
        /// The unmapped trace handle.
        handle: u64,
        /// Namespace it was expected to resolve in.
        namespace: HandleNamespace,
        /// Where the lookup failed.
        location: ErrorLocation,
    },

    /// The driver reported an unrecoverable context loss.
    #[error("GL context lost at {0:?}")]
    ContextLost(ErrorLocation),

    /// The engine was asked to stop cooperatively.
    #[error("replay cancelled at {0:?}")]
    CancelRequested(ErrorLocation),

    /// Two configuration flags are mutually incompatible.
    #[error("incompatible engine configuration: {0}")]
    ConfigError(String),

    /// Reading the next packet from the trace file failed.
    #[error("trace file error: {0}")]
    File(#[from] gltrace_file::IoError),

    /// A snapshot capture, restore, or document operation failed.
    #[error("snapshot error: {0}")]
    Snapshot(#[from] gltrace_snapshot::SnapshotError),

    /// The driver collaborator reported a failure.
    #[error("driver error: {0}")]
    Driver(String),

    /// The window collaborator reported a failure.
    #[error("window error: {0}")]
    Window(String),
}
