//! Error kinds for the trace file reader/writer.

use thiserror::Error;

/// Errors opening, reading, or writing a trace file (§7's `FormatError` /
/// `IOError` kinds, scoped to the file-framing layer).
#[derive(Error, Debug)]
pub enum IoError {
    /// The start-of-file record's magic did not match.
    #[error("bad SOF magic: expected {expected:#010x}, got {actual:#010x}")]
    BadSofMagic {
        /// Expected magic.
        expected: u32,
        /// Magic actually read.
        actual: u32,
    },

    /// The SOF record's format version major is not one this reader knows.
    #[error("unsupported trace format version {0}")]
    UnsupportedVersion(u16),

    /// The file is shorter than a valid SOF record.
    #[error("file too short for a start-of-file record: {0} bytes")]
    TooShortForSof(usize),

    /// A packet in the stream failed to decode.
    #[error("packet decode error at byte offset {offset} (call_counter {call_counter:?}): {source}")]
    PacketFormat {
        /// Byte offset of the offending packet.
        offset: u64,
        /// Call counter of the offending packet, if known before the failure.
        call_counter: Option<u64>,
        /// Underlying codec error.
        #[source]
        source: gltrace_format::FormatError,
    },

    /// `read_next_packet` was called after the reader already reached a
    /// terminal error or closed state.
    #[error("reader is in a terminal state and cannot read further")]
    ReaderClosed,

    /// `write_packet` was called after the writer was already closed.
    #[error("writer is already closed")]
    WriterClosed,

    /// `seek_to_frame` was given a frame index beyond the file's indexed
    /// range, with no frame-offset index or trailing scan available.
    #[error("frame {requested} out of range (file has {available} indexed frames)")]
    FrameOutOfRange {
        /// Requested frame index.
        requested: u64,
        /// Number of frames actually indexed.
        available: u64,
    },

    /// Blob archive I/O or format failure.
    #[error("archive error: {0}")]
    Archive(#[from] gltrace_archive::ArchiveError),

    /// Underlying I/O failure (file open, read, write, flush, rename).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
