//! Error kinds for snapshot capture, restore, and document (de)serialization.

use thiserror::Error;

/// Errors capturing, restoring, or (de)serializing a [`crate::schema::Snapshot`].
#[derive(Error, Debug)]
pub enum SnapshotError {
    /// The document's `schema_version` is not one this crate can read.
    #[error("unsupported snapshot schema version {0}")]
    UnsupportedSchemaVersion(u32),

    /// A [`crate::schema::BlobRef`] did not resolve in the companion archive.
    #[error("blob reference {0:?} did not resolve in the companion archive")]
    UnresolvedBlobRef(String),

    /// A binding referred to a handle with no record in the same snapshot.
    #[error("binding referenced handle {handle} in namespace {namespace:?} with no matching record")]
    DanglingBinding {
        /// The handle that had no matching record.
        handle: u64,
        /// The namespace it was expected to be found in.
        namespace: gltrace_types::HandleNamespace,
    },

    /// The driver collaborator reported a failure during capture or restore.
    #[error("driver operation failed: {0}")]
    Driver(String),

    /// Failure serializing or deserializing the JSON-shape document.
    #[error("snapshot document (de)serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// Failure reading or writing a blob in the companion archive.
    #[error("archive error: {0}")]
    Archive(#[from] gltrace_archive::ArchiveError),
}
