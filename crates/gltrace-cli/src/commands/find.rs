//! `find`: stream packets matching an entrypoint-name regex, a scalar
//! parameter value (optionally scoped to a handle namespace), a frame
//! range, or a call-counter range (§6.4, §8 scenario 2).

use std::path::PathBuf;

use clap::Args;
use gltrace_file::{ReadOutcome, TraceReader};
use gltrace_format::{doc_encode, PacketType, TracePacket};
use gltrace_types::{entrypoint_by_id, HandleNamespace};
use regex::Regex;

use crate::error::CliError;

/// `gltrace find <trace>`.
#[derive(Debug, Args)]
pub struct FindArgs {
    /// Trace file to search.
    pub trace: PathBuf,

    /// Regex matched against the entrypoint's canonical name.
    #[arg(long)]
    pub name: Option<String>,

    /// Match any scalar parameter or return value whose bit pattern equals
    /// this value (decimal, or hex with a `0x` prefix).
    #[arg(long = "find_param", value_parser = parse_u64)]
    pub find_param: Option<u64>,

    /// Restrict `--find_param` matching to params in this handle namespace
    /// (by Rust enum name, e.g. `Texture`).
    #[arg(long)]
    pub namespace: Option<String>,

    /// Inclusive `start..end` frame range.
    #[arg(long, value_parser = parse_range)]
    pub frame_range: Option<(u64, u64)>,

    /// Inclusive `start..end` call-counter range.
    #[arg(long, value_parser = parse_range)]
    pub call_range: Option<(u64, u64)>,
}

fn parse_u64(s: &str) -> Result<u64, String> {
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u64::from_str_radix(hex, 16).map_err(|e| e.to_string())
    } else {
        s.parse::<u64>().map_err(|e| e.to_string())
    }
}

fn parse_range(s: &str) -> Result<(u64, u64), String> {
    let (start, end) = s.split_once("..").ok_or_else(|| format!("expected START..END, got {s:?}"))?;
    Ok((parse_u64(start.trim())?, parse_u64(end.trim())?))
}

pub fn run(args: FindArgs) -> Result<(), CliError> {
    let name_re = args.name.as_deref().map(Regex::new).transpose().map_err(|e| CliError::Usage(e.to_string()))?;
    let namespace = args
        .namespace
        .as_deref()
        .map(parse_namespace)
        .transpose()?;

    let mut reader = TraceReader::open(&args.trace)?;
    let mut frame = 0u64;
    let mut matched = 0u64;

    loop {
        let packet = match reader.read_next_packet()? {
            ReadOutcome::Eof => break,
            ReadOutcome::Packet(p) => p,
        };

        let is_swap = packet.packet_type == PacketType::Call
            && entrypoint_by_id(packet.entrypoint_id).is_some_and(|e| e.is_swap());

        if packet_matches(&packet, frame, &name_re, args.find_param, namespace, args.frame_range, args.call_range) {
            println!("{}", doc_encode(&packet)?);
            matched += 1;
        }

        if is_swap {
            frame += 1;
        }
    }

    println!("# {matched} packet(s) matched");
    Ok(())
}

fn parse_namespace(s: &str) -> Result<HandleNamespace, CliError> {
    for ns in all_namespaces() {
        if format!("{ns:?}").eq_ignore_ascii_case(s) {
            return Ok(ns);
        }
    }
    Err(CliError::Usage(format!("unknown handle namespace {s:?}")))
}

fn all_namespaces() -> [HandleNamespace; 17] {
    [
        HandleNamespace::None,
        HandleNamespace::Texture,
        HandleNamespace::Buffer,
        HandleNamespace::Program,
        HandleNamespace::Shader,
        HandleNamespace::Framebuffer,
        HandleNamespace::Renderbuffer,
        HandleNamespace::Sampler,
        HandleNamespace::Query,
        HandleNamespace::VertexArray,
        HandleNamespace::Pipeline,
        HandleNamespace::Sync,
        HandleNamespace::List,
        HandleNamespace::Location,
        HandleNamespace::Fence,
        HandleNamespace::Feedback,
        HandleNamespace::Context,
    ]
}

#[allow(clippy::too_many_arguments)]
fn packet_matches(
    packet: &TracePacket,
    frame: u64,
    name_re: &Option<Regex>,
    find_param: Option<u64>,
    namespace: Option<HandleNamespace>,
    frame_range: Option<(u64, u64)>,
    call_range: Option<(u64, u64)>,
) -> bool {
    if packet.packet_type != PacketType::Call {
        return false;
    }
    let Some(entrypoint) = entrypoint_by_id(packet.entrypoint_id) else { return false };

    if let Some(re) = name_re {
        if !re.is_match(entrypoint.name) {
            return false;
        }
    }
    if let Some((start, end)) = frame_range {
        if frame < start || frame > end {
            return false;
        }
    }
    if let Some((start, end)) = call_range {
        if packet.call_counter < start || packet.call_counter > end {
            return false;
        }
    }
    if let Some(target) = find_param {
        let in_params = packet.params.iter().enumerate().any(|(i, p)| {
            if p.value_bits != target {
                return false;
            }
            match namespace {
                None => true,
                Some(ns) => entrypoint.params.get(i).is_some_and(|d| d.namespace == ns),
            }
        });
        let in_return = namespace.is_none()
            && packet.return_value.is_some_and(|r| r.value_bits == target);
        if !in_params && !in_return {
            return false;
        }
    }
    true
}
