//! Error kinds for the blob archive.

use thiserror::Error;

/// Errors from storing, retrieving, or (de)serializing a blob archive.
#[derive(Error, Debug)]
pub enum ArchiveError {
    /// No blob registered under the requested name.
    #[error("no blob named {0:?} in archive")]
    NameNotFound(String),

    /// No blob registered under the requested content-hash id.
    #[error("no blob with id {0:?} in archive")]
    IdNotFound(crate::BlobId),

    /// Two `put` calls for the same id produced different bytes. Per §4.D
    /// this is data corruption, not a legitimate hash collision.
    #[error("blob id {id:?} collision: existing content does not match new content")]
    ContentMismatch {
        /// The id both puts share.
        id: crate::BlobId,
    },

    /// The on-disk container's central directory or footer was malformed.
    #[error("corrupt archive container: {0}")]
    CorruptContainer(String),

    /// A central-directory entry's `offset + size` fell outside the
    /// entries region.
    #[error("entry {name:?} out of bounds: offset {offset} size {size} region {region_size}")]
    EntryOutOfBounds {
        /// Entry name.
        name: String,
        /// Declared offset.
        offset: u64,
        /// Declared size.
        size: u64,
        /// Size of the entries region actually present.
        region_size: u64,
    },

    /// A stored entry's bytes did not match its recorded CRC.
    #[error("entry {name:?} failed CRC check")]
    EntryCrcMismatch {
        /// Entry name.
        name: String,
    },

    /// Underlying I/O failure (file open, read, write, mmap).
    #[error("archive I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// `put` was called on a read-only backend ([`crate::MappedArchive`]).
    #[error("archive is read-only")]
    ReadOnly,
}
