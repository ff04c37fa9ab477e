//! `compare_hash_files`: compare two newline-delimited per-frame hash/sum
//! files written by `replay --hash_output`/`--sum_output`, allowing a small
//! per-frame tolerance (§6.4, §8 scenario 3).

use std::path::PathBuf;

use clap::Args;

use crate::error::CliError;

/// `gltrace compare_hash_files <file_a> <file_b>`.
#[derive(Debug, Args)]
pub struct CompareArgs {
    /// First hash-output file.
    pub file_a: PathBuf,

    /// Second hash-output file.
    pub file_b: PathBuf,

    /// Maximum allowed `|a - b|` per frame before it counts as a mismatch.
    #[arg(long, default_value_t = 0)]
    pub threshold: u64,

    /// Tolerate the two files having a different number of frames (§9:
    /// some recordings trail 1-3 extra frames); only the common prefix is
    /// compared. Without this flag a length mismatch is itself a failure.
    #[arg(long)]
    pub ignore_line_count_differences: bool,
}

pub fn run(args: CompareArgs) -> Result<(), CliError> {
    let a = read_values(&args.file_a)?;
    let b = read_values(&args.file_b)?;

    if a.len() != b.len() && !args.ignore_line_count_differences {
        return Err(CliError::Mismatch(format!(
            "{} has {} frame(s), {} has {} frame(s)",
            args.file_a.display(),
            a.len(),
            args.file_b.display(),
            b.len()
        )));
    }

    let mut mismatches = Vec::new();
    for (frame, (va, vb)) in a.iter().zip(b.iter()).enumerate() {
        let diff = va.abs_diff(*vb);
        if diff > args.threshold {
            mismatches.push(format!("frame {frame}: {va} vs {vb} (diff {diff})"));
        }
    }

    if mismatches.is_empty() {
        let compared = a.len().min(b.len());
        if a.len() != b.len() {
            println!(
                "{compared} frame(s) compared (common prefix, {} vs {} total), all within threshold {}",
                a.len(),
                b.len(),
                args.threshold
            );
        } else {
            println!("{compared} frame(s) compared, all within threshold {}", args.threshold);
        }
        return Ok(());
    }

    for line in &mismatches {
        println!("{line}");
    }
    Err(CliError::Mismatch(format!("{} frame(s) exceeded threshold {}", mismatches.len(), args.threshold)))
}

fn read_values(path: &std::path::Path) -> Result<Vec<u64>, CliError> {
    let text = std::fs::read_to_string(path)?;
    text.lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| {
            line.trim().parse::<u64>().map_err(|e| CliError::Usage(format!("{}: {e}", path.display())))
        })
        .collect()
}
