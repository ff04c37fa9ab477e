//! In-memory blob archive.
//!
//! Used while a trim run or a recorder is assembling blobs before the first
//! `serialize` call. Mirrors the `HashMap`-backed storage shape of
//! `MemoryStorage` in the teacher's server crate: no internal locking here
//! because callers own a single archive exclusively (§5's "writes go to an
//! independent archive instance").

use std::collections::HashMap;

use bytes::Bytes;

use crate::{
    BlobArchive, BlobId,
    container::{self, ContainerEntry},
    error::ArchiveError,
};

/// A mutable, in-memory blob archive.
#[derive(Debug, Clone, Default)]
pub struct MemoryArchive {
    by_id: HashMap<BlobId, Bytes>,
    names: HashMap<String, BlobId>,
}

impl MemoryArchive {
    /// An empty archive.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Serialize the current contents to the ZIP-shape container format
    /// (§6.2). Entries are emitted in name-sorted order for a deterministic
    /// byte stream.
    #[must_use]
    pub fn serialize(&self) -> Bytes {
        let mut names: Vec<&String> = self.names.keys().collect();
        names.sort();
        let entries = names.iter().map(|name| {
            let id = self.names[*name];
            ContainerEntry { name, bytes: &self.by_id[&id] }
        });
        container::serialize(entries)
    }

    /// Parse a ZIP-shape container byte buffer into a fresh [`MemoryArchive`].
    pub fn deserialize(buf: &[u8]) -> Result<Self, ArchiveError> {
        let (parsed, region_len) = container::parse_directory(buf)?;
        let mut archive = Self::new();
        for entry in &parsed {
            let end = entry.offset + entry.size;
            if end > region_len {
                return Err(ArchiveError::EntryOutOfBounds {
                    name: entry.name.clone(),
                    offset: entry.offset,
                    size: entry.size,
                    region_size: region_len,
                });
            }
            let slice = &buf[entry.offset as usize..end as usize];
            container::verify_entry_crc(entry, slice)?;
            let bytes = Bytes::copy_from_slice(slice);
            let id = BlobId::of(&bytes);
            archive.by_id.insert(id, bytes);
            archive.names.insert(entry.name.clone(), id);
        }
        Ok(archive)
    }
}

impl BlobArchive for MemoryArchive {
    fn put(&mut self, name: Option<&str>, bytes: Bytes) -> Result<BlobId, ArchiveError> {
        let id = BlobId::of(&bytes);
        if let Some(existing) = self.by_id.get(&id) {
            if existing != &bytes {
                return Err(ArchiveError::ContentMismatch { id });
            }
        } else {
            self.by_id.insert(id, bytes.clone());
        }
        if let Some(name) = name {
            self.names.insert(name.to_string(), id);
        } else {
            self.names.entry(id.to_string()).or_insert(id);
        }
        Ok(id)
    }

    fn get(&self, id: BlobId) -> Result<Bytes, ArchiveError> {
        self.by_id.get(&id).cloned().ok_or(ArchiveError::IdNotFound(id))
    }

    fn get_by_name(&self, name: &str) -> Result<Bytes, ArchiveError> {
        let id = self.names.get(name).copied().ok_or_else(|| ArchiveError::NameNotFound(name.to_string()))?;
        self.get(id)
    }

    fn contains(&self, id: BlobId) -> bool {
        self.by_id.contains_key(&id)
    }

    fn enumerate(&self) -> Vec<String> {
        self.names.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serialize_then_deserialize_round_trips() {
        let mut archive = MemoryArchive::new();
        archive.put(Some("shader.glsl"), Bytes::from_static(b"void main(){}")).unwrap();
        archive.put(Some(crate::FRAME_FILE_OFFSETS_NAME), Bytes::from_static(&[0u8; 16])).unwrap();

        let bytes = archive.serialize();
        let restored = MemoryArchive::deserialize(&bytes).unwrap();

        assert_eq!(restored.get_by_name("shader.glsl").unwrap(), Bytes::from_static(b"void main(){}"));
        assert_eq!(restored.enumerate().len(), 2);
    }

    #[test]
    fn put_rejects_content_mismatch_for_same_id() {
        // Practically unreachable without a hash collision; exercised by
        // directly engineering one id to collide via the same bytes twice,
        // which should succeed (not a mismatch).
        let mut archive = MemoryArchive::new();
        let id1 = archive.put(Some("a"), Bytes::from_static(b"x")).unwrap();
        let id2 = archive.put(Some("a"), Bytes::from_static(b"x")).unwrap();
        assert_eq!(id1, id2);
    }
}
