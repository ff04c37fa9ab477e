//! `parse`: the inverse of `dump` — rebuild a binary trace file from a
//! directory of JSON documents (§6.4, §8 scenario 1).

use std::path::PathBuf;

use clap::Args;
use gltrace_archive::MemoryArchive;
use gltrace_file::TraceWriter;
use gltrace_format::doc_decode;
use gltrace_types::entrypoint_by_id;
use tracing::info;

use crate::error::CliError;

/// `gltrace parse <jsonbase> <trace>`.
#[derive(Debug, Args)]
pub struct ParseArgs {
    /// Document path prefix `dump` was given (`<jsonbase>-NNNNN.json`
    /// files plus an optional `<jsonbase>.archive.bin` sidecar).
    pub jsonbase: PathBuf,

    /// Output binary trace path.
    pub trace: PathBuf,

    /// SOF pointer size to record in the rebuilt trace (the original SOF
    /// header is not preserved by the document form).
    #[arg(long, default_value_t = 8)]
    pub pointer_size: u8,
}

pub fn run(args: ParseArgs) -> Result<(), CliError> {
    let batch_files = collect_batch_files(&args.jsonbase)?;
    if batch_files.is_empty() {
        return Err(CliError::Usage(format!(
            "no document batches found for prefix {}",
            args.jsonbase.display()
        )));
    }

    let archive_path = sidecar_path(&args.jsonbase, "archive.bin");
    let archive = if archive_path.is_file() {
        let bytes = std::fs::read(&archive_path)?;
        MemoryArchive::deserialize(&bytes)?
    } else {
        MemoryArchive::new()
    };

    let mut writer = TraceWriter::create(&args.trace, args.pointer_size)?;
    let mut packet_count = 0u64;

    for batch_path in &batch_files {
        let text = std::fs::read_to_string(batch_path)?;
        let values: Vec<serde_json::Value> = serde_json::from_str(&text)
            .map_err(|e| CliError::Core(format!("{}: {e}", batch_path.display())))?;
        for value in values {
            let doc_text = serde_json::to_string(&value)
                .map_err(|e| CliError::Core(format!("re-serializing document entry: {e}")))?;
            let packet = doc_decode(&doc_text)?;
            let is_swap = entrypoint_by_id(packet.entrypoint_id).is_some_and(|e| e.is_swap());
            writer.write_packet(&packet, is_swap)?;
            packet_count += 1;
        }
    }

    writer.close(archive)?;
    info!(packet_count, files = batch_files.len(), "parse complete");
    Ok(())
}

fn collect_batch_files(jsonbase: &std::path::Path) -> Result<Vec<PathBuf>, CliError> {
    let dir = jsonbase.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or_else(|| std::path::Path::new("."));
    let stem = jsonbase.file_name().and_then(|n| n.to_str()).unwrap_or_default().to_string();
    let prefix = format!("{stem}-");

    let mut paths = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        if name.starts_with(&prefix) && name.ends_with(".json") {
            paths.push(entry.path());
        }
    }
    paths.sort();
    Ok(paths)
}

fn sidecar_path(jsonbase: &std::path::Path, suffix: &str) -> PathBuf {
    let mut name = jsonbase.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".");
    name.push(suffix);
    jsonbase.with_file_name(name)
}
