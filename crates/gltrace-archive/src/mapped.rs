//! Read-only, memory-mapped blob archive.
//!
//! Opened over an existing container byte range (typically the archive
//! region embedded in a trace file, per the SOF's `archive_offset`/
//! `archive_size`, or a standalone `.glarchive` sidecar file). The whole
//! file is mapped once; entry lookups slice directly into the mapping with
//! no copy, which matters for large texture/backbuffer blobs during replay.

use std::{fs::File, path::Path, sync::Arc};

use bytes::Bytes;
use memmap2::Mmap;

use crate::{
    BlobId,
    container::{self, ParsedEntry},
    error::ArchiveError,
};

/// A read-only archive backed by a memory-mapped byte range.
pub struct MappedArchive {
    mmap: Arc<Mmap>,
    /// Byte offset of this archive's container within `mmap` (nonzero when
    /// embedded inside a larger trace file).
    base: usize,
    entries: Vec<ParsedEntry>,
}

impl MappedArchive {
    /// Open a standalone archive file and map it whole.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ArchiveError> {
        let file = File::open(path)?;
        // SAFETY: the archive file is not expected to be mutated concurrently
        // while mapped; the replay engine treats it as read-only for its
        // whole lifetime (§5's "writes go to an independent archive
        // instance").
        let mmap = unsafe { Mmap::map(&file)? };
        Self::from_mmap(Arc::new(mmap), 0, mmap_len(&file)?)
    }

    /// View a sub-range `[base, base + len)` of an already-mapped file as an
    /// archive, for the embedded-in-trace-file case.
    pub fn from_mmap(mmap: Arc<Mmap>, base: usize, len: usize) -> Result<Self, ArchiveError> {
        let end = base.checked_add(len).ok_or_else(|| {
            ArchiveError::CorruptContainer("archive base + len overflow".to_string())
        })?;
        if end > mmap.len() {
            return Err(ArchiveError::CorruptContainer(
                "archive range exceeds mapped file".to_string(),
            ));
        }
        let (entries, _region_len) = container::parse_directory(&mmap[base..end])?;
        Ok(Self { mmap, base, entries })
    }

    fn container_slice(&self) -> &[u8] {
        &self.mmap[self.base..]
    }

    fn entry_bytes(&self, entry: &ParsedEntry) -> Result<&[u8], ArchiveError> {
        let start = entry.offset as usize;
        let end = start + entry.size as usize;
        let slice = &self.container_slice()[start..end];
        container::verify_entry_crc(entry, slice)?;
        Ok(slice)
    }

    /// Retrieve a blob by content-hash id.
    pub fn get(&self, id: BlobId) -> Result<Bytes, ArchiveError> {
        for entry in &self.entries {
            let bytes = self.entry_bytes(entry)?;
            if BlobId::of(bytes) == id {
                return Ok(Bytes::copy_from_slice(bytes));
            }
        }
        Err(ArchiveError::IdNotFound(id))
    }

    /// Retrieve a blob by the name it was stored under.
    pub fn get_by_name(&self, name: &str) -> Result<Bytes, ArchiveError> {
        let entry = self
            .entries
            .iter()
            .find(|e| e.name == name)
            .ok_or_else(|| ArchiveError::NameNotFound(name.to_string()))?;
        Ok(Bytes::copy_from_slice(self.entry_bytes(entry)?))
    }

    /// True if a blob with this id is present.
    #[must_use]
    pub fn contains(&self, id: BlobId) -> bool {
        self.entries.iter().any(|e| self.entry_bytes(e).map(BlobId::of).ok() == Some(id))
    }

    /// Every registered blob name, in directory order.
    #[must_use]
    pub fn enumerate(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.name.clone()).collect()
    }
}

fn mmap_len(file: &File) -> Result<usize, ArchiveError> {
    Ok(file.metadata()?.len() as usize)
}

impl crate::BlobArchive for MappedArchive {
    fn put(&mut self, _name: Option<&str>, _bytes: Bytes) -> Result<BlobId, ArchiveError> {
        Err(ArchiveError::ReadOnly)
    }

    fn get(&self, id: BlobId) -> Result<Bytes, ArchiveError> {
        Self::get(self, id)
    }

    fn get_by_name(&self, name: &str) -> Result<Bytes, ArchiveError> {
        Self::get_by_name(self, name)
    }

    fn contains(&self, id: BlobId) -> bool {
        Self::contains(self, id)
    }

    fn enumerate(&self) -> Vec<String> {
        Self::enumerate(self)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use bytes::Bytes;

    use super::*;
    use crate::{BlobArchive, MemoryArchive};

    #[test]
    fn opens_a_serialized_memory_archive() {
        let mut archive = MemoryArchive::new();
        archive.put(Some("tex.rgba"), Bytes::from_static(&[1, 2, 3, 4])).unwrap();
        let bytes = archive.serialize();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("archive.glarchive");
        std::fs::File::create(&path).unwrap().write_all(&bytes).unwrap();

        let mapped = MappedArchive::open(&path).unwrap();
        assert_eq!(mapped.get_by_name("tex.rgba").unwrap(), Bytes::from_static(&[1, 2, 3, 4]));
        assert_eq!(mapped.enumerate(), vec!["tex.rgba".to_string()]);
    }
}
