//! Trace file reader (§4.F).
//!
//! The whole file is memory-mapped once at `open`; packets are decoded by
//! slicing directly into the mapping, so reading never copies more than the
//! one packet `decode` needs. State machine: `Opened -> HeaderRead ->
//! Streaming -> AtEOFPacket`, with any validation/I-O failure moving to a
//! terminal `Failed` state that every later call reports again.

use std::{fs::File, path::Path, sync::Arc};

use gltrace_archive::MappedArchive;
use gltrace_format::{FormatError, TracePacket, peek_size};
use memmap2::Mmap;
use tracing::{debug, warn};

use crate::{error::IoError, frame_index, sof::SofHeader};

/// Internal reader state. Not exposed as a type — `TraceReader` exposes the
/// subset of observations §4.F's state machine requires
/// (`max_frame_index`, `can_quickly_seek_forward`) plus `read_next_packet`'s
/// own `ReadOutcome`.
#[derive(Debug, Clone, PartialEq, Eq)]
enum ReaderState {
    HeaderRead,
    Streaming,
    AtEofPacket,
    Failed(String),
}

/// Outcome of one `read_next_packet` call.
#[derive(Debug)]
pub enum ReadOutcome {
    /// A decoded call or internal-command packet.
    Packet(TracePacket),
    /// The distinguished end-of-file packet was reached.
    Eof,
}

/// A trace file opened for sequential or seek-based reading.
pub struct TraceReader {
    mmap: Arc<Mmap>,
    header: SofHeader,
    archive: Option<MappedArchive>,
    frame_offsets: Vec<u64>,
    pos: u64,
    state: ReaderState,
    ceiling: u32,
}

impl TraceReader {
    /// Open and validate a trace file, lazily indexing frames from the
    /// embedded archive's `frame_file_offsets` entry if present.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, IoError> {
        Self::open_with_ceiling(path, gltrace_format::DEFAULT_SIZE_CEILING)
    }

    /// Like [`Self::open`], with an explicit per-packet size ceiling.
    pub fn open_with_ceiling(path: impl AsRef<Path>, ceiling: u32) -> Result<Self, IoError> {
        let file = File::open(path.as_ref())?;
        // SAFETY: the trace file is treated as read-only for the reader's
        // whole lifetime; concurrent external mutation is a misuse this
        // crate cannot detect, matching every other mmap-backed reader in
        // this workspace (`gltrace_archive::MappedArchive`).
        let mmap = Arc::new(unsafe { Mmap::map(&file)? });

        let header = SofHeader::decode(&mmap)?;
        debug!(uuid = ?header.uuid, version = header.format_version, "trace file SOF read");

        let archive = if header.archive_size > 0 {
            Some(MappedArchive::from_mmap(
                mmap.clone(),
                header.archive_offset as usize,
                header.archive_size as usize,
            )?)
        } else {
            None
        };

        let frame_offsets = match &archive {
            Some(a) => match a.get_by_name(gltrace_archive::FRAME_FILE_OFFSETS_NAME) {
                Ok(bytes) => frame_index::decode(&bytes)?,
                Err(_) => Vec::new(),
            },
            None => Vec::new(),
        };

        Ok(Self {
            mmap,
            header,
            archive,
            frame_offsets,
            pos: header.offset_to_first_packet,
            state: ReaderState::HeaderRead,
            ceiling,
        })
    }

    /// The start-of-file record.
    #[must_use]
    pub fn header(&self) -> &SofHeader {
        &self.header
    }

    /// The embedded blob archive, if the trace file carries one.
    #[must_use]
    pub fn archive(&self) -> Option<&MappedArchive> {
        self.archive.as_ref()
    }

    /// Highest frame index the frame-offset index covers; 0 if the trace
    /// has no swap packets yet observed (or none at all).
    #[must_use]
    pub fn max_frame_index(&self) -> u64 {
        self.frame_offsets.len() as u64
    }

    /// True if `seek_to_frame` can run in O(1) (a frame-offset index is
    /// present) rather than falling back to rewind-and-scan.
    #[must_use]
    pub fn can_quickly_seek_forward(&self) -> bool {
        !self.frame_offsets.is_empty()
    }

    /// Read and decode the next packet in stream order.
    pub fn read_next_packet(&mut self) -> Result<ReadOutcome, IoError> {
        if let ReaderState::Failed(msg) = &self.state {
            return Err(IoError::Archive(gltrace_archive::ArchiveError::CorruptContainer(
                format!("reader already failed: {msg}"),
            )));
        }
        if self.state == ReaderState::AtEofPacket {
            return Err(IoError::ReaderClosed);
        }

        match self.decode_at(self.pos) {
            Ok((packet, consumed)) => {
                self.pos += consumed;
                if packet.packet_type == gltrace_format::PacketType::Eof {
                    self.state = ReaderState::AtEofPacket;
                    Ok(ReadOutcome::Eof)
                } else {
                    self.state = ReaderState::Streaming;
                    Ok(ReadOutcome::Packet(packet))
                }
            },
            Err(err) => {
                warn!(offset = self.pos, error = %err, "trace packet decode failed");
                self.state = ReaderState::Failed(err.to_string());
                Err(err)
            },
        }
    }

    /// Decode the packet starting at absolute file offset `offset`, without
    /// mutating reader state. Returns the packet and its encoded length.
    fn decode_at(&self, offset: u64) -> Result<(TracePacket, u64), IoError> {
        let remaining = self.mmap.get(offset as usize..).unwrap_or_default();
        let size = peek_size(remaining, self.ceiling).map_err(|source| IoError::PacketFormat {
            offset,
            call_counter: None,
            source,
        })?;
        if remaining.len() < size as usize {
            return Err(IoError::PacketFormat {
                offset,
                call_counter: None,
                source: FormatError::Truncated { declared: size, available: remaining.len() },
            });
        }
        let packet = gltrace_format::decode(&remaining[..size as usize], self.ceiling).map_err(
            |source| IoError::PacketFormat { offset, call_counter: None, source },
        )?;
        Ok((packet, u64::from(size)))
    }

    /// Position the reader so the next `read_next_packet` call yields the
    /// first packet of frame `frame`. O(1) when a frame-offset index is
    /// present; otherwise rewinds to the start and replays swaps.
    pub fn seek_to_frame(&mut self, frame: u64) -> Result<(), IoError> {
        if frame > self.frame_offsets.len() as u64 {
            return Err(IoError::FrameOutOfRange {
                requested: frame,
                available: self.frame_offsets.len() as u64,
            });
        }

        if self.can_quickly_seek_forward() {
            self.pos = if frame == 0 {
                self.header.offset_to_first_packet
            } else {
                self.frame_offsets[frame as usize - 1]
            };
            self.state = ReaderState::Streaming;
            return Ok(());
        }

        // No index: rewind and scan, counting swaps as we go.
        self.pos = self.header.offset_to_first_packet;
        self.state = ReaderState::Streaming;
        let mut frames_seen = 0u64;
        while frames_seen < frame {
            match self.read_next_packet()? {
                ReadOutcome::Eof => {
                    return Err(IoError::FrameOutOfRange { requested: frame, available: frames_seen });
                },
                ReadOutcome::Packet(p) => {
                    if is_swap(&p) {
                        frames_seen += 1;
                    }
                },
            }
        }
        Ok(())
    }
}

fn is_swap(packet: &TracePacket) -> bool {
    gltrace_types::entrypoint_by_id(packet.entrypoint_id).is_some_and(|e| e.is_swap())
}

#[cfg(test)]
mod tests {
    use gltrace_archive::MemoryArchive;
    use gltrace_types::EntrypointId;

    use super::*;
    use crate::writer::TraceWriter;

    const GL_CLEAR: EntrypointId = EntrypointId(4);
    const SWAP: EntrypointId = EntrypointId(8);

    fn write_sample(path: &std::path::Path, frames: u64) {
        let mut writer = TraceWriter::create(path, 8).unwrap();
        let mut counter = 0u64;
        for _ in 0..frames {
            writer.write_packet(&TracePacket::new_call(GL_CLEAR, counter, 1), false).unwrap();
            counter += 1;
            writer.write_packet(&TracePacket::new_call(SWAP, counter, 1), true).unwrap();
            counter += 1;
        }
        writer.close(MemoryArchive::new()).unwrap();
    }

    #[test]
    fn empty_trace_opens_and_reports_zero_frames() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.gltrace");
        let writer = TraceWriter::create(&path, 8).unwrap();
        writer.close(MemoryArchive::new()).unwrap();

        let mut reader = TraceReader::open(&path).unwrap();
        assert_eq!(reader.max_frame_index(), 0);
        assert!(matches!(reader.read_next_packet().unwrap(), ReadOutcome::Eof));
    }

    #[test]
    fn single_frame_trace_reports_one_frame() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("one.gltrace");
        write_sample(&path, 1);

        let reader = TraceReader::open(&path).unwrap();
        assert_eq!(reader.max_frame_index(), 1);
    }

    #[test]
    fn seek_then_read_matches_sequential_scan() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("many.gltrace");
        write_sample(&path, 10);

        let mut by_seek = TraceReader::open(&path).unwrap();
        by_seek.seek_to_frame(5).unwrap();
        let ReadOutcome::Packet(seek_packet) = by_seek.read_next_packet().unwrap() else {
            panic!("expected a packet");
        };

        let mut by_scan = TraceReader::open(&path).unwrap();
        let mut frames_seen = 0u64;
        let scanned_packet = loop {
            match by_scan.read_next_packet().unwrap() {
                ReadOutcome::Packet(p) => {
                    if frames_seen == 5 {
                        break p;
                    }
                    if is_swap(&p) {
                        frames_seen += 1;
                    }
                },
                ReadOutcome::Eof => panic!("ran out of packets before frame 5"),
            }
        };

        assert_eq!(seek_packet.call_counter, scanned_packet.call_counter);
    }

    #[test]
    fn seek_past_max_frame_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("short.gltrace");
        write_sample(&path, 2);

        let mut reader = TraceReader::open(&path).unwrap();
        assert!(matches!(reader.seek_to_frame(99), Err(IoError::FrameOutOfRange { .. })));
    }

    #[test]
    fn zero_param_call_and_eof_are_distinguished() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("eof.gltrace");
        write_sample(&path, 0);

        let mut reader = TraceReader::open(&path).unwrap();
        let outcome = reader.read_next_packet().unwrap();
        assert!(matches!(outcome, ReadOutcome::Eof));
        assert!(matches!(
            reader.read_next_packet(),
            Err(IoError::ReaderClosed)
        ));
    }
}
