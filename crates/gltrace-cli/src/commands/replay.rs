//! `replay`: drive a trace file through the headless driver, reporting
//! divergences and optionally looping a frame range (§4.H, §6.4).

use std::path::PathBuf;

use clap::Args;
use gltrace_replay::{DivergenceConfig, EngineConfig, EngineState, ReplayConfig, ReplayEngine};
use tracing::{info, warn};

use crate::{
    error::CliError,
    headless::{HeadlessDriver, HeadlessWindow},
};

/// `gltrace replay <trace>`.
#[derive(Debug, Args)]
pub struct ReplayArgs {
    /// Trace file to replay.
    pub trace: PathBuf,

    /// Skip the per-packet error probe and screenshot hashing.
    #[arg(long)]
    pub benchmark: bool,

    /// Loop forever instead of stopping at EOF.
    #[arg(long)]
    pub endless: bool,

    /// First frame of the loop window.
    #[arg(long)]
    pub loop_frame: Option<u64>,

    /// Length in frames of the loop window.
    #[arg(long)]
    pub loop_len: Option<u64>,

    /// Number of times to repeat the loop window (ignored with `--endless`).
    #[arg(long)]
    pub loop_count: Option<u64>,

    /// Request a debug-capable context from the driver collaborator.
    #[arg(long)]
    pub force_debug_context: bool,

    /// Write a screenshot of the default framebuffer on every swap.
    #[arg(long)]
    pub dump_screenshots: bool,

    /// Path to write per-frame backbuffer digests to, one per line.
    #[arg(long)]
    pub hash_output: Option<PathBuf>,

    /// Path to write per-frame checksums to, one per line.
    #[arg(long)]
    pub sum_output: Option<PathBuf>,

    /// Stop on the first divergence instead of recording and continuing.
    #[arg(long)]
    pub strict: bool,

    /// Skip return-value divergence checks.
    #[arg(long)]
    pub no_check_return: bool,

    /// Skip out-parameter divergence checks.
    #[arg(long)]
    pub no_check_out_params: bool,

    /// Skip frame-digest divergence checks.
    #[arg(long)]
    pub no_check_frame_digest: bool,

    /// Skip restoring the default framebuffer's pixels whenever a snapshot
    /// is applied.
    #[arg(long)]
    pub disable_frontbuffer_restore: bool,
}

pub fn run(args: ReplayArgs) -> Result<(), CliError> {
    let config = EngineConfig {
        replay: ReplayConfig {
            benchmark: args.benchmark,
            endless: args.endless,
            loop_frame: args.loop_frame,
            loop_len: args.loop_len,
            loop_count: args.loop_count,
            pause_on_frame: None,
            interactive: false,
            force_debug_context: args.force_debug_context,
            dump_screenshots: args.dump_screenshots,
            hash_output: args.hash_output.clone(),
            sum_output: args.sum_output.clone(),
        },
        divergence: DivergenceConfig {
            check_return_value: !args.no_check_return,
            check_out_parameters: !args.no_check_out_params,
            check_frame_digest: !args.no_check_frame_digest,
            strict: args.strict,
        },
        disable_frontbuffer_restore: args.disable_frontbuffer_restore,
    };

    let mut driver = HeadlessDriver::default();
    let mut window = HeadlessWindow::default();
    let mut engine = ReplayEngine::open(&args.trace, &mut driver, &mut window, config)?;

    run_loop(&mut engine, &args)?;

    if let Some(path) = &args.hash_output {
        let crcs: Vec<u64> = engine.frame_digests().iter().map(|d| d.crc).collect();
        write_digest_file(path, &crcs)?;
    }
    if let Some(path) = &args.sum_output {
        let sums: Vec<u64> = engine.frame_digests().iter().map(|d| d.sum).collect();
        write_digest_file(path, &sums)?;
    }

    let stats = engine.stats();
    println!(
        "calls: {}, frames: {}, divergences: {}",
        stats.calls, stats.frames, stats.divergences
    );
    for report in engine.diagnostics() {
        warn!(?report, "divergence recorded");
    }

    if stats.divergences > 0 && args.strict {
        return Err(CliError::Mismatch(format!("{} divergence(s) recorded under --strict", stats.divergences)));
    }
    Ok(())
}

/// Step the engine to completion, or through the requested loop window
/// `loop_count` times (§6.4's `loop_frame`/`loop_len`/`loop_count`/`endless`
/// combination). `--endless` with no loop window just reruns
/// `run_to_completion` until cancelled externally; since this CLI has no
/// interactive cancellation source, it runs exactly one pass.
///
/// Per-frame digests are not collected here: the engine retains one
/// [`gltrace_replay::FrameDigest`] per swap it processes regardless of
/// which path drives it, so `engine.frame_digests()` already holds one
/// entry per recorded frame once this returns.
fn run_loop(engine: &mut ReplayEngine<'_>, args: &ReplayArgs) -> Result<(), CliError> {
    match (args.loop_frame, args.loop_count) {
        (Some(start), Some(count)) => {
            for iteration in 0..count {
                engine.seek_to_frame(start)?;
                run_until_boundary_or_eof(engine)?;
                info!(iteration, "loop window replayed");
            }
        },
        _ => engine.run_to_completion()?,
    }
    if engine.state() != EngineState::AtEof && engine.state() != EngineState::Closed {
        engine.run_to_completion()?;
    }
    Ok(())
}

fn run_until_boundary_or_eof(engine: &mut ReplayEngine<'_>) -> Result<(), CliError> {
    loop {
        match engine.state() {
            EngineState::AtEof | EngineState::HardFailure | EngineState::Closed => break,
            EngineState::AtFrameBoundary => break,
            _ => engine.step()?,
        }
    }
    Ok(())
}

fn write_digest_file(path: &std::path::Path, digests: &[u64]) -> Result<(), CliError> {
    let text = digests.iter().map(u64::to_string).collect::<Vec<_>>().join("\n");
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, text)?;
    Ok(())
}
