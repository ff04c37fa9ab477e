//! `trim`: produce a shorter trace file starting from a restored state
//! snapshot instead of an empty context (§4.I, §6.4).

use std::path::PathBuf;

use clap::Args;
use gltrace_archive::MemoryArchive;
use gltrace_replay::{EngineConfig, ReplayEngine};
use gltrace_trim::TrimOptions;
use tracing::info;

use crate::{
    error::CliError,
    headless::{HeadlessDriver, HeadlessWindow},
};

/// `gltrace trim <trace> <output>`.
#[derive(Debug, Args)]
pub struct TrimArgs {
    /// Source trace file.
    pub trace: PathBuf,

    /// Output (trimmed) trace path.
    pub output: PathBuf,

    /// First frame of the output window.
    #[arg(long)]
    pub frame: u64,

    /// Number of frames to copy from `--frame` onward.
    #[arg(long)]
    pub length: u64,

    /// Prune the prefix snapshot to the handle closure the copied range
    /// actually reaches.
    #[arg(long)]
    pub optimize_snapshot: bool,

    /// Pointer size recorded in the output file's SOF header.
    #[arg(long, default_value_t = 8)]
    pub pointer_size: u8,
}

pub fn run(args: TrimArgs) -> Result<(), CliError> {
    let mut driver = HeadlessDriver::default();
    let mut window = HeadlessWindow::default();
    let mut engine = ReplayEngine::open(&args.trace, &mut driver, &mut window, EngineConfig::default())?;

    engine.seek_to_frame(args.frame)?;

    let options = TrimOptions { optimize_snapshot: args.optimize_snapshot, pointer_size: args.pointer_size };
    let stats = gltrace_trim::trim(
        &args.trace,
        &args.output,
        &engine,
        &MemoryArchive::new(),
        args.frame,
        args.length,
        options,
    )?;

    info!(
        frames_copied = stats.frames_copied,
        packets_copied = stats.packets_copied,
        snapshot_object_count = stats.snapshot_object_count,
        "trim complete"
    );
    println!(
        "wrote {} ({} frame(s), {} packet(s), {} snapshot object(s))",
        args.output.display(),
        stats.frames_copied,
        stats.packets_copied,
        stats.snapshot_object_count
    );
    Ok(())
}
