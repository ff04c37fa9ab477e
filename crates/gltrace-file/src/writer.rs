//! Trace file writer (§4.F, §6.1).
//!
//! Writes directly to a temporary path and renames into place on `close`,
//! so a reader never observes a half-written trace file: either `close`
//! succeeds and the file is complete, or nothing at the final path changes.
//! Failing to call `close` (a dropped writer, or a write error) leaves only
//! the `.tmp` file behind.

use std::{
    fs::File,
    io::{BufWriter, Seek, SeekFrom, Write},
    path::{Path, PathBuf},
};

use gltrace_archive::MemoryArchive;
use gltrace_format::TracePacket;
use tracing::{debug, info};

use crate::{error::IoError, frame_index, sof::SofHeader};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriterState {
    Writing,
    Closed,
}

/// A trace file opened for writing, one packet at a time.
pub struct TraceWriter {
    tmp_path: PathBuf,
    final_path: PathBuf,
    file: BufWriter<File>,
    pos: u64,
    header: SofHeader,
    frame_offsets: Vec<u64>,
    call_counter: u64,
    ceiling: u32,
    state: WriterState,
}

impl TraceWriter {
    /// Create a new trace file at `path`, truncating any prior `.tmp`
    /// leftover from a previous failed write.
    pub fn create(path: impl AsRef<Path>, pointer_size: u8) -> Result<Self, IoError> {
        Self::create_with_ceiling(path, pointer_size, gltrace_format::DEFAULT_SIZE_CEILING)
    }

    /// Like [`Self::create`], with an explicit per-packet size ceiling.
    pub fn create_with_ceiling(
        path: impl AsRef<Path>,
        pointer_size: u8,
        ceiling: u32,
    ) -> Result<Self, IoError> {
        let final_path = path.as_ref().to_path_buf();
        let tmp_path = tmp_path_for(&final_path);

        let uuid = trace_uuid();
        let header = SofHeader::new(uuid, pointer_size);
        let mut file = BufWriter::new(File::create(&tmp_path)?);
        let encoded_header = header.encode();
        file.write_all(&encoded_header)?;

        debug!(path = %final_path.display(), "trace file writer opened");
        Ok(Self {
            tmp_path,
            final_path,
            file,
            pos: encoded_header.len() as u64,
            header,
            frame_offsets: Vec::new(),
            call_counter: 0,
            ceiling,
            state: WriterState::Writing,
        })
    }

    /// Write one packet, assigning it the next monotonic call counter.
    /// `ends_frame` marks a swap packet, recording its offset in the
    /// frame-offset index.
    pub fn write_packet(&mut self, packet: &TracePacket, ends_frame: bool) -> Result<(), IoError> {
        if self.state != WriterState::Writing {
            return Err(IoError::WriterClosed);
        }

        let encoded = gltrace_format::encode(packet, self.ceiling)
            .map_err(|source| IoError::PacketFormat { offset: self.pos, call_counter: Some(packet.call_counter), source })?;
        self.file.write_all(&encoded)?;
        self.pos += encoded.len() as u64;
        self.call_counter = self.call_counter.max(packet.call_counter + 1);

        if ends_frame {
            self.frame_offsets.push(self.pos);
        }
        Ok(())
    }

    /// Write the terminal EOF packet, the frame-offset index and the blob
    /// archive, then atomically rename the temp file into place.
    ///
    /// `archive` carries whatever blobs the caller accumulated (snapshots,
    /// shader sources); the frame-offset index is added to it under
    /// [`gltrace_archive::FRAME_FILE_OFFSETS_NAME`] automatically.
    pub fn close(mut self, mut archive: MemoryArchive) -> Result<(), IoError> {
        let result = self.close_inner(&mut archive);
        match result {
            Ok(()) => {
                info!(path = %self.final_path.display(), frames = self.frame_offsets.len(), "trace file closed");
                Ok(())
            },
            Err(err) => {
                let _ = std::fs::remove_file(&self.tmp_path);
                Err(err)
            },
        }
    }

    fn close_inner(&mut self, archive: &mut MemoryArchive) -> Result<(), IoError> {
        use gltrace_archive::BlobArchive;

        let eof = TracePacket::eof(self.call_counter);
        let encoded_eof = gltrace_format::encode(&eof, self.ceiling)
            .map_err(|source| IoError::PacketFormat { offset: self.pos, call_counter: Some(eof.call_counter), source })?;
        self.file.write_all(&encoded_eof)?;
        self.pos += encoded_eof.len() as u64;

        archive.put(
            Some(gltrace_archive::FRAME_FILE_OFFSETS_NAME),
            frame_index::encode(&self.frame_offsets),
        )?;

        let archive_bytes = archive.serialize();
        let archive_offset = self.pos;
        self.file.write_all(&archive_bytes)?;

        self.header.archive_offset = archive_offset;
        self.header.archive_size = archive_bytes.len() as u64;

        self.file.flush()?;
        let file = self.file.get_mut();
        file.seek(SeekFrom::Start(0))?;
        file.write_all(&self.header.encode())?;
        file.flush()?;

        std::fs::rename(&self.tmp_path, &self.final_path)?;
        self.state = WriterState::Closed;
        Ok(())
    }
}

fn tmp_path_for(final_path: &Path) -> PathBuf {
    let mut name = final_path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    final_path.with_file_name(name)
}

fn trace_uuid() -> [u8; 16] {
    // No RNG dependency is carried for this; the recorder side (outside this
    // crate's scope) is expected to supply a real UUID when one matters for
    // cross-file identity. A zeroed id is a valid, if unidentified, trace.
    [0u8; 16]
}
