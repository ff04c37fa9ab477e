//! Snapshot document (de)serialization against a companion blob archive
//! (§3.6, §6.3).
//!
//! The JSON-shape document produced by [`save`] is a plain
//! [`Snapshot`][crate::schema::Snapshot] with every [`BlobRef`] already
//! `put` into the archive; [`load`] reverses this, resolving and
//! validating every `BlobRef` against the archive before returning the
//! deserialized snapshot.

use std::sync::LazyLock;

use crc::{Algorithm, Crc};
use gltrace_archive::BlobArchive;

use crate::{
    error::SnapshotError,
    schema::{BlobRef, Snapshot, CURRENT_SCHEMA_VERSION},
};

static DOCUMENT_CRC: LazyLock<Crc<u64>> = LazyLock::new(|| Crc::<u64>::new(&crc::CRC_64_XZ));

/// Serialize `snapshot` to its JSON-shape document bytes. The caller is
/// responsible for having already `put` every blob the snapshot's
/// [`BlobRef`]s name into `archive` — `save` only encodes the tree, it does
/// not itself stage blobs (capture does that as it builds the snapshot).
pub fn save(snapshot: &Snapshot) -> Result<Vec<u8>, SnapshotError> {
    Ok(serde_json::to_vec_pretty(snapshot)?)
}

/// Parse a JSON-shape document and validate every [`BlobRef`] it contains
/// resolves in `archive` with matching size and CRC. Returns
/// [`SnapshotError::UnsupportedSchemaVersion`] before attempting any blob
/// resolution if the document's version is not one this crate reads.
pub fn load(bytes: &[u8], archive: &dyn BlobArchive) -> Result<Snapshot, SnapshotError> {
    let snapshot: Snapshot = serde_json::from_slice(bytes)?;
    if snapshot.schema_version != CURRENT_SCHEMA_VERSION {
        return Err(SnapshotError::UnsupportedSchemaVersion(snapshot.schema_version));
    }
    for blob_ref in all_blob_refs(&snapshot) {
        validate_blob_ref(archive, blob_ref)?;
    }
    Ok(snapshot)
}

/// Resolve one [`BlobRef`]'s bytes from `archive`, having already validated
/// it in [`load`]. Kept separate so callers restoring incrementally (e.g.
/// streaming texture levels into a driver) don't have to hold the whole
/// archive's contents in memory at once.
pub fn resolve(archive: &dyn BlobArchive, blob_ref: &BlobRef) -> Result<bytes::Bytes, SnapshotError> {
    let resolved = archive.get_by_name(&blob_ref.blob)?;
    check_blob(blob_ref, &resolved)?;
    Ok(resolved)
}

fn validate_blob_ref(archive: &dyn BlobArchive, blob_ref: &BlobRef) -> Result<(), SnapshotError> {
    resolve(archive, blob_ref).map(|_| ())
}

fn check_blob(blob_ref: &BlobRef, bytes: &[u8]) -> Result<(), SnapshotError> {
    if bytes.len() as u64 != blob_ref.size {
        return Err(SnapshotError::UnresolvedBlobRef(blob_ref.blob.clone()));
    }
    if DOCUMENT_CRC.checksum(bytes) != blob_ref.crc {
        return Err(SnapshotError::UnresolvedBlobRef(blob_ref.blob.clone()));
    }
    Ok(())
}

/// Every [`BlobRef`] reachable from `snapshot`, in the schema's declaration
/// order — texture levels, buffer contents, program binaries, display list
/// commands, and the default framebuffer's four planes. Exposed for callers
/// (the trim writer) that need to copy exactly the blobs a snapshot still
/// references into a fresh archive, without re-deriving this walk.
#[must_use]
pub fn all_blob_refs(snapshot: &Snapshot) -> Vec<&BlobRef> {
    let mut refs = Vec::new();
    for texture in &snapshot.textures {
        for level in &texture.levels {
            if let Some(pixels) = &level.pixels {
                refs.push(pixels);
            }
        }
    }
    for buffer in &snapshot.buffers {
        if let Some(contents) = &buffer.contents {
            refs.push(contents);
        }
    }
    for program in &snapshot.programs {
        if let Some(binary) = &program.binary {
            refs.push(&binary.blob);
        }
    }
    for list in &snapshot.lists {
        if let Some(commands) = &list.commands {
            refs.push(commands);
        }
    }
    let fb = &snapshot.default_framebuffer;
    for blob in [&fb.front_color, &fb.back_color, &fb.depth, &fb.stencil].into_iter().flatten() {
        refs.push(blob);
    }
    refs
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use gltrace_archive::MemoryArchive;

    use super::*;
    use crate::schema::{BufferRecord, TextureLevel, TextureRecord};

    fn put_blob(archive: &mut MemoryArchive, data: &[u8]) -> BlobRef {
        let id = archive.put(None, Bytes::copy_from_slice(data)).unwrap();
        BlobRef { blob: id.to_string(), size: data.len() as u64, crc: DOCUMENT_CRC.checksum(data) }
    }

    #[test]
    fn save_then_load_round_trips_with_resolved_blobs() {
        let mut archive = MemoryArchive::new();
        let pixel_ref = put_blob(&mut archive, b"pixels-data");
        let buffer_ref = put_blob(&mut archive, b"vertex-bytes");

        let mut snapshot = Snapshot::empty();
        snapshot.textures.push(TextureRecord {
            handle: 1,
            target: 0x0DE1,
            levels: vec![TextureLevel {
                width: 4,
                height: 4,
                depth: 1,
                internal_format: 0x1908,
                compressed: false,
                pixels: Some(pixel_ref),
            }],
        });
        snapshot.buffers.push(BufferRecord {
            handle: 2,
            target: 0x8892,
            size: 12,
            usage: 0x88E4,
            contents: Some(buffer_ref),
        });

        let bytes = save(&snapshot).unwrap();
        let loaded = load(&bytes, &archive).unwrap();
        assert_eq!(loaded, snapshot);
    }

    #[test]
    fn load_rejects_unsupported_schema_version() {
        let mut snapshot = Snapshot::empty();
        snapshot.schema_version = 7;
        let bytes = serde_json::to_vec(&snapshot).unwrap();
        let archive = MemoryArchive::new();
        assert!(matches!(
            load(&bytes, &archive),
            Err(SnapshotError::UnsupportedSchemaVersion(7))
        ));
    }

    #[test]
    fn load_rejects_dangling_blob_ref() {
        let mut snapshot = Snapshot::empty();
        snapshot.buffers.push(BufferRecord {
            handle: 1,
            target: 0x8892,
            size: 4,
            usage: 0x88E4,
            contents: Some(BlobRef { blob: "missing".into(), size: 4, crc: 0 }),
        });
        let bytes = serde_json::to_vec(&snapshot).unwrap();
        let archive = MemoryArchive::new();
        assert!(load(&bytes, &archive).is_err());
    }
}
