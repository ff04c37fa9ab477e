//! Frame-offset index codec.
//!
//! The archive entry named [`gltrace_archive::FRAME_FILE_OFFSETS_NAME`] is a
//! flat `u64` array (little-endian), one entry per swap packet, giving the
//! byte offset of the packet that *ends* that frame. It is what makes
//! `seek_to_frame` O(1) instead of a rewind-and-scan (§4.F, §8 property 5).

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::IoError;

/// Encode a frame-offset index to its archive-entry byte form.
#[must_use]
pub fn encode(offsets: &[u64]) -> Bytes {
    let mut out = BytesMut::with_capacity(offsets.len() * 8);
    for o in offsets {
        out.put_u64_le(*o);
    }
    out.freeze()
}

/// Decode a frame-offset index from its archive-entry byte form.
pub fn decode(bytes: &[u8]) -> Result<Vec<u64>, IoError> {
    if bytes.len() % 8 != 0 {
        return Err(IoError::Archive(gltrace_archive::ArchiveError::CorruptContainer(
            "frame_file_offsets length is not a multiple of 8".to_string(),
        )));
    }
    let mut cursor = bytes;
    let mut offsets = Vec::with_capacity(bytes.len() / 8);
    while cursor.has_remaining() {
        offsets.push(cursor.get_u64_le());
    }
    Ok(offsets)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips() {
        let offsets = vec![64, 512, 4096, u64::MAX];
        let encoded = encode(&offsets);
        let decoded = decode(&encoded).unwrap();
        assert_eq!(offsets, decoded);
    }

    #[test]
    fn empty_round_trips() {
        assert_eq!(decode(&encode(&[])).unwrap(), Vec::<u64>::new());
    }
}
