//! Start-of-file record (§3.5, §6.1).
//!
//! Fixed-size, bit-exact. The magic/version pair is the compatibility key:
//! readers MUST reject an unknown major version rather than guess at the
//! layout that follows.
//!
//! ```text
//! magic(u32) | uuid(16) | format_version(u16) | pointer_size(u8) | endian(u8) |
//! offset_to_first_packet(u64) | archive_offset(u64) | archive_size(u64)
//! ```
//!
//! All multi-byte fields little-endian unless `endian` says otherwise
//! (1 = big-endian recorder host); this reader/writer only ever emits 0.

use bytes::{Buf, BufMut, BytesMut};

use crate::error::IoError;

/// SOF magic: `"GLTF"` (GL Trace File).
pub const SOF_MAGIC: u32 = 0x474C_5446;
/// Current trace format version. Readers reject any other major value.
pub const FORMAT_VERSION: u16 = 1;
/// Encoded size of the start-of-file record.
pub const SOF_SIZE: usize = 4 + 16 + 2 + 1 + 1 + 8 + 8 + 8;

/// Recorder/replayer endianness agreement for the packet stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endianness {
    /// Little-endian (the only form this crate writes).
    Little,
    /// Big-endian (readable, for interop with a foreign recorder).
    Big,
}

/// The trace file's start-of-file record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SofHeader {
    /// Recorder-assigned UUID identifying this trace file.
    pub uuid: [u8; 16],
    /// Trace format version.
    pub format_version: u16,
    /// Recorder's pointer size in bytes (4 or 8).
    pub pointer_size: u8,
    /// Endianness of the packet stream.
    pub endianness: Endianness,
    /// Byte offset of the first packet.
    pub offset_to_first_packet: u64,
    /// Byte offset of the embedded blob archive container, or 0 if none.
    pub archive_offset: u64,
    /// Byte size of the embedded blob archive container, or 0 if none.
    pub archive_size: u64,
}

impl SofHeader {
    /// A fresh header for a newly opened writer, with no archive yet
    /// (patched in by `close()` once the archive is serialized).
    #[must_use]
    pub fn new(uuid: [u8; 16], pointer_size: u8) -> Self {
        Self {
            uuid,
            format_version: FORMAT_VERSION,
            pointer_size,
            endianness: Endianness::Little,
            offset_to_first_packet: SOF_SIZE as u64,
            archive_offset: 0,
            archive_size: 0,
        }
    }

    /// Encode to the fixed-size wire form.
    #[must_use]
    pub fn encode(&self) -> BytesMut {
        let mut out = BytesMut::with_capacity(SOF_SIZE);
        out.put_u32_le(SOF_MAGIC);
        out.put_slice(&self.uuid);
        out.put_u16_le(self.format_version);
        out.put_u8(self.pointer_size);
        out.put_u8(match self.endianness {
            Endianness::Little => 0,
            Endianness::Big => 1,
        });
        out.put_u64_le(self.offset_to_first_packet);
        out.put_u64_le(self.archive_offset);
        out.put_u64_le(self.archive_size);
        debug_assert_eq!(out.len(), SOF_SIZE);
        out
    }

    /// Decode from the start of `bytes`, validating magic and version.
    pub fn decode(bytes: &[u8]) -> Result<Self, IoError> {
        if bytes.len() < SOF_SIZE {
            return Err(IoError::TooShortForSof(bytes.len()));
        }
        let mut cursor = &bytes[..SOF_SIZE];
        let magic = cursor.get_u32_le();
        if magic != SOF_MAGIC {
            return Err(IoError::BadSofMagic { expected: SOF_MAGIC, actual: magic });
        }
        let mut uuid = [0u8; 16];
        cursor.copy_to_slice(&mut uuid);
        let format_version = cursor.get_u16_le();
        if format_version != FORMAT_VERSION {
            return Err(IoError::UnsupportedVersion(format_version));
        }
        let pointer_size = cursor.get_u8();
        let endianness = if cursor.get_u8() == 0 { Endianness::Little } else { Endianness::Big };
        let offset_to_first_packet = cursor.get_u64_le();
        let archive_offset = cursor.get_u64_le();
        let archive_size = cursor.get_u64_le();
        Ok(Self {
            uuid,
            format_version,
            pointer_size,
            endianness,
            offset_to_first_packet,
            archive_offset,
            archive_size,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips() {
        let header = SofHeader::new([7u8; 16], 8);
        let encoded = header.encode();
        let decoded = SofHeader::decode(&encoded).unwrap();
        assert_eq!(header, decoded);
    }

    #[test]
    fn rejects_bad_magic() {
        let header = SofHeader::new([1u8; 16], 8);
        let mut encoded = header.encode();
        encoded[0] ^= 0xFF;
        assert!(matches!(SofHeader::decode(&encoded), Err(IoError::BadSofMagic { .. })));
    }

    #[test]
    fn rejects_unknown_version() {
        let header = SofHeader::new([1u8; 16], 8);
        let mut encoded = header.encode();
        encoded[4..6].copy_from_slice(&99u16.to_le_bytes());
        assert!(matches!(SofHeader::decode(&encoded), Err(IoError::UnsupportedVersion(99))));
    }

    #[test]
    fn rejects_truncated_buffer() {
        let header = SofHeader::new([1u8; 16], 8);
        let encoded = header.encode();
        assert!(matches!(SofHeader::decode(&encoded[..10]), Err(IoError::TooShortForSof(10))));
    }
}
