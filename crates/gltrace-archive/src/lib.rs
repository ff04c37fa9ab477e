//! Content-addressed blob archive (§3.5, §4.D, §6.2).
//!
//! A blob archive is a named bag of binary blobs, each also addressable by
//! content hash, serializable as a single contiguous container stream either
//! embedded in a trace file or written to a sidecar. Three backends are
//! provided, matching the collaborators named in §4.D: an in-memory archive
//! used while building a trace or trim output ([`MemoryArchive`]), a
//! read-only memory-mapped archive used when opening one
//! ([`MappedArchive`]), and a loose directory of files used as a sidecar
//! when a recorder writes blobs outside the packet stream
//! ([`LooseDirArchive`]).
//!
//! All three implement [`BlobArchive`]; callers that only need read access
//! (the replay engine, the trim reader) should depend on the trait, not a
//! concrete backend.

// `memmap2::Mmap::map` is unsafe by construction (the OS gives no guarantee
// against concurrent external mutation of the mapped file); `mapped.rs`
// isolates the single unsafe block this crate needs behind a read-only API.
#![allow(unsafe_code)]

pub mod blob_id;
pub mod container;
pub mod error;
pub mod loose;
pub mod mapped;
pub mod memory;

pub use blob_id::BlobId;
use bytes::Bytes;
pub use error::ArchiveError;
pub use loose::LooseDirArchive;
pub use mapped::MappedArchive;
pub use memory::MemoryArchive;

/// Well-known entry name carrying the per-swap file-offset index (§3.5).
pub const FRAME_FILE_OFFSETS_NAME: &str = "frame_file_offsets";

/// Operations common to every blob archive backend (§4.D).
///
/// `get` following `put` in the same archive instance returns identical
/// bytes. Across archives, two blobs sharing an id encode identical bytes;
/// a backend that detects otherwise reports [`ArchiveError::ContentMismatch`]
/// rather than silently picking one.
pub trait BlobArchive {
    /// Store `bytes` under `name` if given, else under its content-hash id.
    /// Idempotent: storing identical bytes under the same name/id again is a
    /// no-op that returns the same id.
    fn put(&mut self, name: Option<&str>, bytes: Bytes) -> Result<BlobId, ArchiveError>;

    /// Retrieve a blob by its content-hash id.
    fn get(&self, id: BlobId) -> Result<Bytes, ArchiveError>;

    /// Retrieve a blob by the name it was stored under.
    fn get_by_name(&self, name: &str) -> Result<Bytes, ArchiveError>;

    /// True if a blob with this id is present.
    fn contains(&self, id: BlobId) -> bool;

    /// Every registered blob name, in unspecified order.
    fn enumerate(&self) -> Vec<String>;
}

#[cfg(test)]
mod contract_tests {
    //! Shared contract tests run against every backend: put/get round-trips,
    //! idempotent re-put, unknown name/id lookups fail cleanly.

    use bytes::Bytes;

    use super::*;

    fn exercise(mut archive: impl BlobArchive) {
        let id_a = archive.put(Some("a.bin"), Bytes::from_static(b"hello")).unwrap();
        assert_eq!(archive.get(id_a).unwrap(), Bytes::from_static(b"hello"));
        assert_eq!(archive.get_by_name("a.bin").unwrap(), Bytes::from_static(b"hello"));
        assert!(archive.contains(id_a));

        // idempotent re-put of identical bytes under the same name
        let id_a2 = archive.put(Some("a.bin"), Bytes::from_static(b"hello")).unwrap();
        assert_eq!(id_a, id_a2);

        let id_b = archive.put(None, Bytes::from_static(b"world")).unwrap();
        assert_eq!(archive.get(id_b).unwrap(), Bytes::from_static(b"world"));

        assert!(archive.get_by_name("missing").is_err());
        assert_eq!(archive.enumerate().len(), 2);
    }

    #[test]
    fn memory_archive_satisfies_contract() {
        exercise(MemoryArchive::new());
    }

    #[test]
    fn loose_dir_archive_satisfies_contract() {
        let dir = tempfile::tempdir().unwrap();
        exercise(LooseDirArchive::create(dir.path()).unwrap());
    }
}
