//! `gltrace`: command-line surface over the trace codec, file, snapshot,
//! replay, and trim crates.
//!
//! Thin by design: every subcommand parses its flags here and hands off to
//! a `commands::*` function that does the actual work, mirroring
//! `lockframe-server`'s `main.rs` wiring a collaborator into a library crate
//! rather than embedding logic in `main` itself.

mod commands;
mod error;
mod headless;

use std::{path::PathBuf, process::ExitCode};

use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::error::CliError;

#[derive(Parser, Debug)]
#[command(name = "gltrace", version, about = "Inspect, replay, and transform GL call traces")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Replay a trace file against the headless driver and report divergences.
    Replay(commands::replay::ReplayArgs),

    /// Dump a trace file's packets to a directory of JSON documents.
    Dump(commands::dump::DumpArgs),

    /// Parse a directory of JSON documents back into a trace file.
    Parse(commands::parse::ParseArgs),

    /// Print a trace file's header fields and a per-entrypoint call histogram.
    Info(commands::info::InfoArgs),

    /// Search a trace file's packets by entrypoint name, handle value, or frame range.
    Find(commands::find::FindArgs),

    /// Pack a loose JSON document plus blob directory into a binary container.
    PackJson(commands::pack::PackJsonArgs),

    /// Unpack a binary container into a loose JSON document plus blob directory.
    UnpackJson(commands::pack::UnpackJsonArgs),

    /// Compare two per-frame hash output files (`replay --hash_output`).
    CompareHashFiles(commands::compare::CompareArgs),

    /// Produce a shorter, snapshot-prefixed trace file covering a frame range.
    Trim(commands::trim::TrimArgs),
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry().with(tracing_subscriber::fmt::layer()).with(filter).init();
}

fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        Command::Replay(args) => commands::replay::run(args),
        Command::Dump(args) => commands::dump::run(args),
        Command::Parse(args) => commands::parse::run(args),
        Command::Info(args) => commands::info::run(args),
        Command::Find(args) => commands::find::run(args),
        Command::PackJson(args) => commands::pack::run_pack(args),
        Command::UnpackJson(args) => commands::pack::run_unpack(args),
        Command::CompareHashFiles(args) => commands::compare::run(args),
        Command::Trim(args) => commands::trim::run(args),
    }
}

fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(CliError::Mismatch(msg)) => {
            tracing::error!("{msg}");
            ExitCode::from(2)
        },
        Err(err) => {
            tracing::error!("{err}");
            ExitCode::FAILURE
        },
    }
}

/// Shared helper: resolve a trace-relative blob archive, falling back to an
/// empty one when a trace carries no embedded archive at all.
pub(crate) fn archive_or_empty(
    reader: &gltrace_file::TraceReader,
) -> gltrace_archive::MemoryArchive {
    match reader.archive() {
        Some(archive) => {
            let mut copy = gltrace_archive::MemoryArchive::new();
            for name in archive.enumerate() {
                if let Ok(bytes) = gltrace_archive::BlobArchive::get_by_name(archive, &name) {
                    let _ = copy.put(Some(&name), bytes);
                }
            }
            copy
        },
        None => gltrace_archive::MemoryArchive::new(),
    }
}

/// Parsed `--output` / positional path pairs share this alias for readability
/// across the subcommand modules.
pub(crate) type PathArg = PathBuf;
