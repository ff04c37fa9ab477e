//! Loose-directory blob archive.
//!
//! Each blob is one file named after its content-hash id; a sidecar
//! `names.idx` text file (one `name\tid` pair per line) records the
//! name-to-id mapping. Used when a recorder writes blobs directly to disk
//! as it records, rather than holding them in memory until the trace file
//! is closed (§4.D's "loose directory of files" backend, §4.F's "sidecar
//! loose directory under a caller-supplied path").

use std::{
    fs,
    path::{Path, PathBuf},
};

use bytes::Bytes;

use crate::{BlobArchive, BlobId, error::ArchiveError};

const NAMES_INDEX_FILE: &str = "names.idx";

/// A blob archive backed by a directory of loose files.
pub struct LooseDirArchive {
    root: PathBuf,
    names: Vec<(String, BlobId)>,
}

impl LooseDirArchive {
    /// Create (or reuse) a loose directory archive rooted at `root`.
    pub fn create(root: impl AsRef<Path>) -> Result<Self, ArchiveError> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        let names = Self::load_index(&root)?;
        Ok(Self { root, names })
    }

    fn load_index(root: &Path) -> Result<Vec<(String, BlobId)>, ArchiveError> {
        let index_path = root.join(NAMES_INDEX_FILE);
        if !index_path.exists() {
            return Ok(Vec::new());
        }
        let text = fs::read_to_string(index_path)?;
        let mut names = Vec::new();
        for line in text.lines() {
            let Some((name, id_hex)) = line.split_once('\t') else { continue };
            let id = u64::from_str_radix(id_hex, 16)
                .map_err(|_| ArchiveError::CorruptContainer(format!("bad id in names.idx: {id_hex}")))?;
            names.push((name.to_string(), BlobId(id)));
        }
        Ok(names)
    }

    fn save_index(&self) -> Result<(), ArchiveError> {
        let mut text = String::new();
        for (name, id) in &self.names {
            text.push_str(name);
            text.push('\t');
            text.push_str(&format!("{id}"));
            text.push('\n');
        }
        fs::write(self.root.join(NAMES_INDEX_FILE), text)?;
        Ok(())
    }

    fn blob_path(&self, id: BlobId) -> PathBuf {
        self.root.join(format!("{id}.blob"))
    }
}

impl BlobArchive for LooseDirArchive {
    fn put(&mut self, name: Option<&str>, bytes: Bytes) -> Result<BlobId, ArchiveError> {
        let id = BlobId::of(&bytes);
        let path = self.blob_path(id);
        if path.exists() {
            let existing = fs::read(&path)?;
            if existing != bytes.as_ref() {
                return Err(ArchiveError::ContentMismatch { id });
            }
        } else {
            fs::write(&path, &bytes)?;
        }

        let label = name.map_or_else(|| id.to_string(), str::to_string);
        if !self.names.iter().any(|(n, existing_id)| n == &label && *existing_id == id) {
            self.names.retain(|(n, _)| n != &label);
            self.names.push((label, id));
            self.save_index()?;
        }
        Ok(id)
    }

    fn get(&self, id: BlobId) -> Result<Bytes, ArchiveError> {
        let path = self.blob_path(id);
        fs::read(&path).map(Bytes::from).map_err(|_| ArchiveError::IdNotFound(id))
    }

    fn get_by_name(&self, name: &str) -> Result<Bytes, ArchiveError> {
        let id = self
            .names
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, id)| *id)
            .ok_or_else(|| ArchiveError::NameNotFound(name.to_string()))?;
        self.get(id)
    }

    fn contains(&self, id: BlobId) -> bool {
        self.blob_path(id).exists()
    }

    fn enumerate(&self) -> Vec<String> {
        self.names.iter().map(|(n, _)| n.clone()).collect()
    }
}
