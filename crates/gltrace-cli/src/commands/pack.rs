//! `pack_json` / `unpack_json`: bundle a loose directory of sidecar files
//! (shaders, textures dumped by a recorder) into the same ZIP-shape
//! container format used for a trace's embedded blob archive, and back
//! (§3.5, §6.2).
//!
//! Despite the name (kept for parity with the source tool's flag), the
//! container produced is the binary archive format, not JSON; contents are
//! opaque blobs keyed by file name.

use std::{fs, path::PathBuf};

use bytes::Bytes;
use clap::Args;
use gltrace_archive::{BlobArchive, MemoryArchive};

use crate::error::CliError;

/// `gltrace pack_json <input_dir> <output>`.
#[derive(Debug, Args)]
pub struct PackJsonArgs {
    /// Directory whose files are packed, one archive entry per file.
    pub input_dir: PathBuf,

    /// Output container path.
    pub output: PathBuf,
}

/// `gltrace unpack_json <input> <output_dir>`.
#[derive(Debug, Args)]
pub struct UnpackJsonArgs {
    /// Container to unpack.
    pub input: PathBuf,

    /// Directory to write the contained files into.
    pub output_dir: PathBuf,
}

pub fn run_pack(args: PackJsonArgs) -> Result<(), CliError> {
    let mut archive = MemoryArchive::new();
    let mut entry_count = 0u64;

    for entry in fs::read_dir(&args.input_dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let Some(name) = entry.file_name().to_str().map(str::to_string) else {
            return Err(CliError::Usage(format!("non-UTF-8 file name in {}", args.input_dir.display())));
        };
        let bytes = Bytes::from(fs::read(entry.path())?);
        archive.put(Some(&name), bytes)?;
        entry_count += 1;
    }

    if let Some(parent) = args.output.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&args.output, archive.serialize())?;
    println!("packed {entry_count} file(s) into {}", args.output.display());
    Ok(())
}

pub fn run_unpack(args: UnpackJsonArgs) -> Result<(), CliError> {
    let bytes = fs::read(&args.input)?;
    let archive = MemoryArchive::deserialize(&bytes)?;

    fs::create_dir_all(&args.output_dir)?;
    let mut names = archive.enumerate();
    names.sort();
    for name in &names {
        let contents = archive.get_by_name(name)?;
        fs::write(args.output_dir.join(name), &contents)?;
    }
    println!("unpacked {} file(s) into {}", names.len(), args.output_dir.display());
    Ok(())
}
