//! On-disk blob archive container (§6.2).
//!
//! A ZIP-shape container: every entry's raw bytes are written first, back to
//! back, followed by a central directory (name, size, crc, offset) and a
//! fixed-size footer pointing at it. Readers locate the directory from the
//! footer at the tail rather than scanning entries, the same tradeoff ZIP
//! makes for O(1) "what's in here" without touching entry payloads.
//!
//! ```text
//! entries          : [ bytes ]*                      (back to back, no framing)
//! central_directory : count(u32) | [ name_len(u16) name(utf8) size(u64)
//!                                      crc(u64) offset(u64) ]*
//! footer           : magic(u32) | version(u16) | dir_offset(u64) | dir_size(u64)
//! ```
//!
//! All multi-byte fields are little-endian.

use std::sync::LazyLock;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use crc::{Algorithm, Crc};

use crate::error::ArchiveError;

/// Footer magic: `"GLAR"` (GL Archive).
pub const CONTAINER_MAGIC: u32 = 0x474C_4152;
/// Current container format version.
pub const CONTAINER_VERSION: u16 = 1;
/// Fixed footer size: magic(4) + version(2) + dir_offset(8) + dir_size(8).
pub const FOOTER_SIZE: usize = 22;

static ENTRY_CRC: LazyLock<Crc<u64>> = LazyLock::new(|| Crc::<u64>::new(&crc::CRC_64_XZ));

/// One entry's directory record plus its bytes, as produced for serialization.
pub struct ContainerEntry<'a> {
    /// Entry name. The well-known name `frame_file_offsets` carries the
    /// swap-offset index (§3.5, §6.2).
    pub name: &'a str,
    /// Raw entry bytes.
    pub bytes: &'a [u8],
}

struct DirRecord {
    name: String,
    size: u64,
    crc: u64,
    offset: u64,
}

/// Serialize `entries` into the ZIP-shape container format.
#[must_use]
pub fn serialize<'a>(entries: impl IntoIterator<Item = ContainerEntry<'a>>) -> Bytes {
    let mut body = BytesMut::new();
    let mut records = Vec::new();

    for entry in entries {
        let offset = body.len() as u64;
        body.put_slice(entry.bytes);
        records.push(DirRecord {
            name: entry.name.to_string(),
            size: entry.bytes.len() as u64,
            crc: ENTRY_CRC.checksum(entry.bytes),
            offset,
        });
    }

    let dir_offset = body.len() as u64;
    body.put_u32_le(records.len() as u32);
    for r in &records {
        let name_bytes = r.name.as_bytes();
        body.put_u16_le(name_bytes.len() as u16);
        body.put_slice(name_bytes);
        body.put_u64_le(r.size);
        body.put_u64_le(r.crc);
        body.put_u64_le(r.offset);
    }
    let dir_size = body.len() as u64 - dir_offset;

    body.put_u32_le(CONTAINER_MAGIC);
    body.put_u16_le(CONTAINER_VERSION);
    body.put_u64_le(dir_offset);
    body.put_u64_le(dir_size);

    body.freeze()
}

/// One decoded directory record, with its slice range into the entries
/// region (not yet sliced out -- callers index the original byte buffer).
#[derive(Debug, Clone)]
pub struct ParsedEntry {
    /// Entry name.
    pub name: String,
    /// Byte offset into the entries region.
    pub offset: u64,
    /// Length in bytes.
    pub size: u64,
    /// Recorded CRC, checked lazily by callers on read.
    pub crc: u64,
}

/// Parse the central directory out of a whole container buffer. Returns the
/// parsed entries and the byte length of the entries region (everything
/// before `dir_offset`).
pub fn parse_directory(buf: &[u8]) -> Result<(Vec<ParsedEntry>, u64), ArchiveError> {
    if buf.len() < FOOTER_SIZE {
        return Err(ArchiveError::CorruptContainer("buffer shorter than footer".to_string()));
    }
    let footer = &buf[buf.len() - FOOTER_SIZE..];
    let mut f = footer;
    let magic = f.get_u32_le();
    if magic != CONTAINER_MAGIC {
        return Err(ArchiveError::CorruptContainer(format!("bad footer magic {magic:#010x}")));
    }
    let version = f.get_u16_le();
    if version != CONTAINER_VERSION {
        return Err(ArchiveError::CorruptContainer(format!("unsupported container version {version}")));
    }
    let dir_offset = f.get_u64_le();
    let dir_size = f.get_u64_le();

    let entries_region_len = dir_offset;
    let dir_end = dir_offset
        .checked_add(dir_size)
        .ok_or_else(|| ArchiveError::CorruptContainer("dir_offset + dir_size overflow".to_string()))?;
    if dir_end as usize > buf.len() - FOOTER_SIZE {
        return Err(ArchiveError::CorruptContainer("central directory out of bounds".to_string()));
    }

    let mut cursor = &buf[dir_offset as usize..dir_end as usize];
    if cursor.remaining() < 4 {
        return Err(ArchiveError::CorruptContainer("directory truncated".to_string()));
    }
    let count = cursor.get_u32_le();
    let mut entries = Vec::with_capacity(count as usize);
    for _ in 0..count {
        if cursor.remaining() < 2 {
            return Err(ArchiveError::CorruptContainer("directory entry truncated".to_string()));
        }
        let name_len = cursor.get_u16_le() as usize;
        if cursor.remaining() < name_len + 24 {
            return Err(ArchiveError::CorruptContainer("directory entry truncated".to_string()));
        }
        let mut name_bytes = vec![0u8; name_len];
        cursor.copy_to_slice(&mut name_bytes);
        let name = String::from_utf8(name_bytes)
            .map_err(|_| ArchiveError::CorruptContainer("entry name is not utf-8".to_string()))?;
        let size = cursor.get_u64_le();
        let crc = cursor.get_u64_le();
        let offset = cursor.get_u64_le();

        let end = offset.checked_add(size).ok_or_else(|| {
            ArchiveError::CorruptContainer(format!("entry {name:?} offset+size overflow"))
        })?;
        if end > entries_region_len {
            return Err(ArchiveError::EntryOutOfBounds {
                name,
                offset,
                size,
                region_size: entries_region_len,
            });
        }

        entries.push(ParsedEntry { name, offset, size, crc });
    }

    Ok((entries, entries_region_len))
}

/// Verify one parsed entry's bytes (sliced by the caller from the entries
/// region) against its recorded CRC.
pub fn verify_entry_crc(entry: &ParsedEntry, bytes: &[u8]) -> Result<(), ArchiveError> {
    if ENTRY_CRC.checksum(bytes) != entry.crc {
        return Err(ArchiveError::EntryCrcMismatch { name: entry.name.clone() });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_entries() {
        let data = serialize([
            ContainerEntry { name: "a.bin", bytes: b"hello" },
            ContainerEntry { name: "frame_file_offsets", bytes: &[1, 2, 3, 4, 5, 6, 7, 8] },
        ]);

        let (entries, region_len) = parse_directory(&data).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].name, "a.bin");
        let slice = &data[entries[0].offset as usize..(entries[0].offset + entries[0].size) as usize];
        assert_eq!(slice, b"hello");
        verify_entry_crc(&entries[0], slice).unwrap();
        assert!((entries[1].offset + entries[1].size) <= region_len);
    }

    #[test]
    fn empty_container_round_trips() {
        let data = serialize::<std::iter::Empty<ContainerEntry<'_>>>(std::iter::empty());
        let (entries, region_len) = parse_directory(&data).unwrap();
        assert!(entries.is_empty());
        assert_eq!(region_len, 0);
    }

    #[test]
    fn bad_footer_magic_rejected() {
        let mut data = serialize([ContainerEntry { name: "x", bytes: b"y" }]).to_vec();
        let len = data.len();
        data[len - FOOTER_SIZE] ^= 0xFF;
        assert!(matches!(parse_directory(&data), Err(ArchiveError::CorruptContainer(_))));
    }

    #[test]
    fn entry_crc_mismatch_detected() {
        let data = serialize([ContainerEntry { name: "a", bytes: b"hello" }]);
        let (entries, _) = parse_directory(&data).unwrap();
        assert!(verify_entry_crc(&entries[0], b"wrong").is_err());
    }
}
