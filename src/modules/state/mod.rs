//! Persistent set of listing ids that have already been observed.
//!
//! The full set lives in memory for the process lifetime; only the greatest
//! [`SEEN_CAP`] ids are written back to disk. Loading is best-effort: a
//! missing or corrupt file starts the monitor with an empty memory.

use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::listing::ListingId;

/// Maximum number of ids written to the backing file.
pub const SEEN_CAP: usize = 1000;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("seen store io error: {0}")]
    Io(#[from] io::Error),
    #[error("seen store serialization failed: {0}")]
    Json(#[from] serde_json::Error),
}

/// File-backed seen-id set.
#[derive(Debug, Clone)]
pub struct SeenStore {
    path: PathBuf,
    ids: BTreeSet<ListingId>,
}

impl SeenStore {
    /// Empty store bound to `path`; nothing is read.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ids: BTreeSet::new(),
        }
    }

    /// Read the backing file. Absent, unreadable or corrupt files yield an
    /// empty store.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let mut store = Self::new(path);
        match read_ids(&store.path) {
            Ok(Some(ids)) => store.ids = ids.into_iter().collect(),
            Ok(None) => {}
            Err(err) => {
                log::warn!(
                    "ignoring unreadable seen store {}: {err}",
                    store.path.display()
                );
            }
        }
        store
    }

    pub fn contains(&self, id: &ListingId) -> bool {
        self.ids.contains(id)
    }

    /// Returns true if the id was not present before.
    pub fn insert(&mut self, id: ListingId) -> bool {
        self.ids.insert(id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The ids `save` writes: the greatest [`SEEN_CAP`] in ascending order.
    pub fn persisted_ids(&self) -> Vec<&ListingId> {
        let skip = self.ids.len().saturating_sub(SEEN_CAP);
        self.ids.iter().skip(skip).collect()
    }

    /// Overwrite the backing file. The payload goes to a sibling temp file
    /// first and is renamed into place, so readers never see a partial write.
    pub fn save(&self) -> Result<usize, StoreError> {
        let ids = self.persisted_ids();
        let payload = serde_json::to_vec(&ids)?;

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }

        let tmp = temp_path(&self.path);
        fs::write(&tmp, payload)?;
        fs::rename(&tmp, &self.path)?;
        Ok(ids.len())
    }
}

fn read_ids(path: &Path) -> Result<Option<Vec<ListingId>>, StoreError> {
    let raw = match fs::read(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(err.into()),
    };
    Ok(Some(serde_json::from_slice(&raw)?))
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
