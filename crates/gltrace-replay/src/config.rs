//! Replay engine configuration (§6.4 CLI table, §4.H.3 divergence toggles).
//!
//! `gltrace-cli`'s `clap` layer parses user input into these structs; the
//! engine itself never touches `std::env::args` (the `ServerConfig`
//! pattern: configuration is a plain value handed in at construction).

use std::path::PathBuf;

/// Which divergence checks (§4.H.3) run, and how a failure is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DivergenceConfig {
    /// Compare each entrypoint's return value against the recording.
    pub check_return_value: bool,
    /// Compare each `out`/`inout` client-memory region byte-for-byte.
    pub check_out_parameters: bool,
    /// Compare a per-swap frame digest against the recording.
    pub check_frame_digest: bool,
    /// Transition to `HardFailure` on the first divergence instead of
    /// recording a diagnostic and continuing.
    pub strict: bool,
}

impl Default for DivergenceConfig {
    fn default() -> Self {
        Self {
            check_return_value: true,
            check_out_parameters: true,
            check_frame_digest: true,
            strict: false,
        }
    }
}

/// Replay-run configuration, one field per `replay` subcommand flag named
/// in §6.4.
#[derive(Debug, Clone, Default)]
pub struct ReplayConfig {
    /// Skip the per-packet `glGetError` epilog probe and any screenshot
    /// hashing, to measure raw replay throughput.
    pub benchmark: bool,
    /// Loop forever instead of stopping at EOF.
    pub endless: bool,
    /// First frame of the loop window, when looping a sub-range.
    pub loop_frame: Option<u64>,
    /// Length in frames of the loop window.
    pub loop_len: Option<u64>,
    /// Number of times to repeat the loop window before stopping
    /// (`None` with `endless` means forever).
    pub loop_count: Option<u64>,
    /// Pause at a frame boundary for this frame and wait for a resume
    /// signal, used by interactive stepping.
    pub pause_on_frame: Option<u64>,
    /// Enable interactive stepping (pause / step / seek / trim-now).
    pub interactive: bool,
    /// Request a debug-capable context from the driver collaborator.
    pub force_debug_context: bool,
    /// Write a screenshot of the default framebuffer on every swap.
    pub dump_screenshots: bool,
    /// Path to write per-frame hashes to, if frame-digest checking is on.
    pub hash_output: Option<PathBuf>,
    /// Path to write per-frame checksums to (the "sum" form, §4.H.3's
    /// per-component unsigned sum rather than a CRC).
    pub sum_output: Option<PathBuf>,
}

/// Top-level engine configuration: the parsed replay flags plus the
/// divergence policy and the snapshot-restore option the engine applies
/// whenever it restores a keyframe mid-run (§4.H.5).
#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    /// Replay-run flags.
    pub replay: ReplayConfig,
    /// Divergence-check policy.
    pub divergence: DivergenceConfig,
    /// Skip writing the default framebuffer's pixels back whenever the
    /// engine restores a snapshot (initial open or a seek-driven keyframe
    /// application).
    pub disable_frontbuffer_restore: bool,
}

impl EngineConfig {
    /// Validate flag combinations the CLI's own parser cannot reject
    /// syntactically (§7 `ConfigError`: "incompatible flags, e.g.
    /// `write_snapshot_call` with `trim_frame`" generalizes here to loop
    /// flags that only make sense together).
    pub fn validate(&self) -> Result<(), crate::error::EngineError> {
        if self.replay.loop_len.is_some() && self.replay.loop_frame.is_none() {
            return Err(crate::error::EngineError::ConfigError(
                "loop_len given without loop_frame".to_string(),
            ));
        }
        if self.replay.endless && self.replay.loop_count.is_some() {
            return Err(crate::error::EngineError::ConfigError(
                "endless and loop_count are mutually exclusive".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_divergence_config_checks_everything_non_strict() {
        let cfg = DivergenceConfig::default();
        assert!(cfg.check_return_value && cfg.check_out_parameters && cfg.check_frame_digest);
        assert!(!cfg.strict);
    }

    #[test]
    fn loop_len_without_loop_frame_is_rejected() {
        let mut cfg = EngineConfig::default();
        cfg.replay.loop_len = Some(10);
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn endless_with_loop_count_is_rejected() {
        let mut cfg = EngineConfig::default();
        cfg.replay.endless = true;
        cfg.replay.loop_count = Some(3);
        assert!(cfg.validate().is_err());
    }
}
