//! Trace replay engine (§4.H): per-entrypoint dispatch with handle
//! remapping ([`dispatch`]), the state machine driving a trace file through
//! a [`GlDriver`][gltrace_snapshot::GlDriver] collaborator ([`engine`]),
//! three-layer divergence detection ([`divergence`]), the replay-time
//! handle map ([`handle_map`]), and the window-resize collaborator seam
//! ([`window`]).
//!
//! The engine itself never touches `std::env::args` or a config file; it is
//! constructed from a plain [`EngineConfig`], leaving argument parsing to
//! `gltrace-cli`.

pub mod config;
pub mod dispatch;
pub mod divergence;
pub mod engine;
pub mod error;
pub mod handle_map;
pub mod window;

pub use config::{DivergenceConfig, EngineConfig, ReplayConfig};
pub use dispatch::{dispatch, DispatchOutcome};
pub use engine::{
    keyframe_path_for, DivergenceReport, EngineState, EngineStats, FrameDigest, ReplayEngine,
};
pub use error::{Divergence, EngineError, ErrorLocation};
pub use handle_map::HandleMap;
pub use window::{WindowCollaborator, WindowEvent};
