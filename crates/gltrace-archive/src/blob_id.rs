//! Content-addressed blob identity.

use std::sync::LazyLock;

use crc::{Algorithm, Crc};

static BLOB_CRC: LazyLock<Crc<u64>> = LazyLock::new(|| Crc::<u64>::new(&crc::CRC_64_XZ));

/// A blob's content hash, used as its id when the caller does not supply a
/// name. Two blobs with the same id in the same or different archives are
/// required to carry identical bytes (§4.D); a mismatch is data corruption.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlobId(pub u64);

impl BlobId {
    /// Compute the content-hash id of `bytes`.
    #[must_use]
    pub fn of(bytes: &[u8]) -> Self {
        Self(BLOB_CRC.checksum(bytes))
    }
}

impl std::fmt::Display for BlobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_bytes_hash_identically() {
        assert_eq!(BlobId::of(b"hello"), BlobId::of(b"hello"));
    }

    #[test]
    fn different_bytes_usually_hash_differently() {
        assert_ne!(BlobId::of(b"hello"), BlobId::of(b"world"));
    }
}
