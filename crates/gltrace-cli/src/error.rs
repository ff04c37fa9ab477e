//! CLI-level error type (§7's "stable short tag, human message, location"
//! surfaced as a process exit code).
//!
//! Every subcommand's own fallible steps return this; `main` prints the
//! `Display` form to stderr and maps it to a process exit code, rather than
//! threading `thiserror`-derived per-crate errors all the way up (that
//! texture shift — hand-written enum at the orchestration boundary, derived
//! enums underneath — mirrors `lockframe-server`'s `ServerError` wrapping
//! `lockframe_core`'s driver errors).

use std::fmt;

/// Errors a `gltrace` subcommand can report to `main`.
#[derive(Debug)]
pub enum CliError {
    /// A command-line argument combination `clap` cannot reject
    /// syntactically (mutually exclusive flags, a missing companion flag).
    Usage(String),

    /// Reading or writing a file outside the traced formats themselves
    /// failed (a loose JSON document, a hash-output file, a directory walk).
    Io(std::io::Error),

    /// Trace-file, packet-format, archive, snapshot, replay-engine, or
    /// trim-writer failure from one of the core crates.
    Core(String),

    /// `--verify` (on `dump`/`parse`) or `compare_hash_files` found a
    /// mismatch the user asked to be treated as a failure.
    Mismatch(String),
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Usage(msg) => write!(f, "usage error: {msg}"),
            Self::Io(err) => write!(f, "I/O error: {err}"),
            Self::Core(msg) => write!(f, "{msg}"),
            Self::Mismatch(msg) => write!(f, "mismatch: {msg}"),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<gltrace_file::IoError> for CliError {
    fn from(err: gltrace_file::IoError) -> Self {
        Self::Core(format!("trace file error: {err}"))
    }
}

impl From<gltrace_format::FormatError> for CliError {
    fn from(err: gltrace_format::FormatError) -> Self {
        Self::Core(format!("packet format error: {err}"))
    }
}

impl From<gltrace_archive::ArchiveError> for CliError {
    fn from(err: gltrace_archive::ArchiveError) -> Self {
        Self::Core(format!("archive error: {err}"))
    }
}

impl From<gltrace_snapshot::SnapshotError> for CliError {
    fn from(err: gltrace_snapshot::SnapshotError) -> Self {
        Self::Core(format!("snapshot error: {err}"))
    }
}

impl From<gltrace_replay::EngineError> for CliError {
    fn from(err: gltrace_replay::EngineError) -> Self {
        Self::Core(format!("replay engine error: {err}"))
    }
}

impl From<gltrace_trim::TrimError> for CliError {
    fn from(err: gltrace_trim::TrimError) -> Self {
        Self::Core(format!("trim error: {err}"))
    }
}
