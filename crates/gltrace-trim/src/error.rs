//! Error kinds for the trim writer (§7, scoped to §4.I's failure points).

use thiserror::Error;

/// Errors [`crate::writer::trim`] can report. Every variant corresponds to
/// a step in §4.I that can fail; whichever one fires, the partial output
/// file is removed before the error propagates (mirrors
/// `gltrace_file::TraceWriter::close`'s atomic-or-nothing contract).
#[derive(Error, Debug)]
pub enum TrimError {
    /// `length_frames` was zero, or `start_frame` is beyond the source
    /// trace's last recorded frame.
    #[error("invalid trim range: {0}")]
    Config(String),

    /// Reading the source trace, or writing the trimmed output file,
    /// failed.
    #[error("trace file error: {0}")]
    File(#[from] gltrace_file::IoError),

    /// Capturing, pruning, or serializing the prefix snapshot failed.
    #[error("snapshot error: {0}")]
    Snapshot(#[from] gltrace_snapshot::SnapshotError),

    /// Encoding the internal state-snapshot directive or a copied packet
    /// failed.
    #[error("packet format error: {0}")]
    Format(#[from] gltrace_format::FormatError),

    /// Staging a blob into the output archive, or writing the output file
    /// itself, failed.
    #[error("archive error: {0}")]
    Archive(#[from] gltrace_archive::ArchiveError),

    /// Driving the paused engine or reading its handle map failed.
    #[error("replay engine error: {0}")]
    Engine(#[from] gltrace_replay::EngineError),
}
