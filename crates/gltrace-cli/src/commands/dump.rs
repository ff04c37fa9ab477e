//! `dump`: decode a binary trace file's packets to a directory of JSON
//! documents (§6.4, §8 scenario 1 "round-trip dump/parse").
//!
//! Packets are batched into files of `--packets-per-file` each (default
//! 1000) named `<jsonbase>-NNNNN.json`, so a large trace doesn't become one
//! unwieldy JSON array. The trace's embedded blob archive, if any, is
//! copied alongside as `<jsonbase>.archive.bin` so `parse` can rebuild an
//! equivalent trace file.

use std::{fs, path::PathBuf};

use clap::Args;
use gltrace_archive::BlobArchive;
use gltrace_file::{ReadOutcome, TraceReader};
use gltrace_format::{doc_encode, verify_round_trip, DEFAULT_SIZE_CEILING};
use tracing::info;

use crate::error::CliError;

/// `gltrace dump <trace> <jsonbase>`.
#[derive(Debug, Args)]
pub struct DumpArgs {
    /// Binary trace file to decode.
    pub trace: PathBuf,

    /// Output path prefix; files are written as `<jsonbase>-NNNNN.json`.
    pub jsonbase: PathBuf,

    /// Packets per output file.
    #[arg(long, default_value_t = 1000)]
    pub packets_per_file: usize,

    /// Run `decode(encode(p)) == p` and `doc_decode(doc_encode(p)) == p`
    /// on every packet before writing it, failing the run on a mismatch.
    #[arg(long)]
    pub verify: bool,
}

pub fn run(args: DumpArgs) -> Result<(), CliError> {
    if args.packets_per_file == 0 {
        return Err(CliError::Usage("--packets-per-file must be non-zero".to_string()));
    }

    let mut reader = TraceReader::open(&args.trace)?;

    let archive = crate::archive_or_empty(&reader);
    let archive_path = sidecar_path(&args.jsonbase, "archive.bin");
    if let Some(parent) = archive_path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&archive_path, archive.serialize())?;

    let mut batch: Vec<serde_json::Value> = Vec::with_capacity(args.packets_per_file);
    let mut file_index = 0usize;
    let mut packet_count = 0u64;

    loop {
        let packet = match reader.read_next_packet()? {
            ReadOutcome::Eof => break,
            ReadOutcome::Packet(p) => p,
        };

        if args.verify {
            verify_round_trip(&packet, DEFAULT_SIZE_CEILING)
                .map_err(|e| CliError::Mismatch(format!("packet {}: {e}", packet.call_counter)))?;
        }

        let doc_text = doc_encode(&packet)?;
        let value: serde_json::Value = serde_json::from_str(&doc_text)
            .map_err(|e| CliError::Core(format!("re-parsing encoded document: {e}")))?;
        batch.push(value);
        packet_count += 1;

        if batch.len() >= args.packets_per_file {
            write_batch(&args.jsonbase, file_index, &batch)?;
            file_index += 1;
            batch.clear();
        }
    }

    if !batch.is_empty() {
        write_batch(&args.jsonbase, file_index, &batch)?;
        file_index += 1;
    }

    info!(packet_count, files = file_index, "dump complete");
    Ok(())
}

fn write_batch(jsonbase: &std::path::Path, index: usize, batch: &[serde_json::Value]) -> Result<(), CliError> {
    let path = sidecar_path(jsonbase, &format!("{index:05}.json"));
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let text = serde_json::to_string_pretty(batch)
        .map_err(|e| CliError::Core(format!("serializing packet batch: {e}")))?;
    fs::write(path, text)?;
    Ok(())
}

/// `<jsonbase>-<suffix>` for a packet batch, or `<jsonbase>.<suffix>` for
/// the archive sidecar (the caller passes the right separator via `suffix`
/// already containing the file extension).
fn sidecar_path(jsonbase: &std::path::Path, suffix: &str) -> PathBuf {
    let mut name = jsonbase.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    if suffix.chars().next().is_some_and(|c| c.is_ascii_digit()) {
        name.push("-");
    } else {
        name.push(".");
    }
    name.push(suffix);
    jsonbase.with_file_name(name)
}
