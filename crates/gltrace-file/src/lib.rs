//! Trace file framing: start-of-file record ([`sof`]), frame-offset index
//! ([`frame_index`]), and the sequential reader/writer over a packet stream
//! ([`reader`], [`writer`]).
//!
//! A trace file is: SOF record, then a stream of [`gltrace_format::TracePacket`]
//! wire records terminated by an EOF packet, then an embedded blob archive
//! (§6.1, §6.2) whose byte range the SOF record points at.

// `reader.rs` memory-maps the trace file (`memmap2::Mmap::map` is unsafe by
// construction); see `gltrace_archive`'s crate-level note for the rationale.
#![allow(unsafe_code)]

pub mod error;
pub mod frame_index;
pub mod reader;
pub mod sof;
pub mod writer;

pub use error::IoError;
pub use reader::{ReadOutcome, TraceReader};
pub use sof::{Endianness, SofHeader, FORMAT_VERSION, SOF_MAGIC, SOF_SIZE};
pub use writer::TraceWriter;
