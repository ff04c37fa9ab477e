//! `info`: print a trace file's header fields, per-entrypoint call
//! histogram, swap count, and non-whitelisted-call set (§6.4).

use std::{collections::BTreeMap, path::PathBuf};

use clap::Args;
use gltrace_file::{ReadOutcome, TraceReader};
use gltrace_format::PacketType;
use gltrace_types::entrypoint_by_id;

use crate::error::CliError;

/// `gltrace info <trace>`.
#[derive(Debug, Args)]
pub struct InfoArgs {
    /// Trace file to inspect.
    pub trace: PathBuf,
}

pub fn run(args: InfoArgs) -> Result<(), CliError> {
    let mut reader = TraceReader::open(&args.trace)?;
    let header = reader.header();

    println!("uuid: {}", hex::encode(header.uuid));
    println!("format_version: {}", header.format_version);
    println!("pointer_size: {}", header.pointer_size);
    println!("endianness: {:?}", header.endianness);
    println!("offset_to_first_packet: {}", header.offset_to_first_packet);
    println!("archive_offset: {}", header.archive_offset);
    println!("archive_size: {}", header.archive_size);
    println!("can_quickly_seek_forward: {}", reader.can_quickly_seek_forward());

    let mut histogram: BTreeMap<&'static str, u64> = BTreeMap::new();
    let mut non_whitelisted: BTreeMap<&'static str, u64> = BTreeMap::new();
    let mut swap_count = 0u64;
    let mut call_count = 0u64;

    loop {
        let packet = match reader.read_next_packet()? {
            ReadOutcome::Eof => break,
            ReadOutcome::Packet(p) => p,
        };
        if packet.packet_type != PacketType::Call {
            continue;
        }
        let Some(entrypoint) = entrypoint_by_id(packet.entrypoint_id) else { continue };
        call_count += 1;
        *histogram.entry(entrypoint.name).or_default() += 1;
        if !entrypoint.is_whitelisted() {
            *non_whitelisted.entry(entrypoint.name).or_default() += 1;
        }
        if entrypoint.is_swap() {
            swap_count += 1;
        }
    }

    println!("total_calls: {call_count}");
    println!("swap_count: {swap_count}");
    println!("max_frame_index (indexed): {}", reader.max_frame_index());

    println!("call_histogram:");
    for (name, count) in &histogram {
        println!("  {name}: {count}");
    }

    if non_whitelisted.is_empty() {
        println!("non_whitelisted_calls: none");
    } else {
        println!("non_whitelisted_calls:");
        for (name, count) in &non_whitelisted {
            println!("  {name}: {count}");
        }
    }

    Ok(())
}
