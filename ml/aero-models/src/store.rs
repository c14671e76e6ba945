//! Keyed storage for serialized models.

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use tempfile::NamedTempFile;
use tracing::debug;

use crate::error::{ModelError, Result};

/// File extension used by [`FileStore`].
const BLOB_EXTENSION: &str = "aero";

/// Key-value storage for model blobs.
///
/// Implementations use interior mutability so a store can be shared behind
/// an `Arc` between a trainer and detectors.
pub trait ModelStore: Send + Sync + fmt::Debug {
    /// Stores `blob` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::InvalidKey`] for a malformed key and
    /// [`ModelError::Persistence`] if the write fails.
    fn put(&self, key: &str, blob: &[u8]) -> Result<()>;

    /// Returns the blob stored under `key`, if any.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::InvalidKey`] for a malformed key and
    /// [`ModelError::Persistence`] if the read fails.
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Returns `true` if a blob is stored under `key`.
    ///
    /// # Errors
    ///
    /// See [`ModelStore::get`].
    fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.get(key)?.is_some())
    }

    /// Removes the blob under `key`, returning whether one existed.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::Persistence`] if the removal fails.
    fn delete(&self, key: &str) -> Result<bool>;

    /// Returns all stored keys, sorted.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::Persistence`] if the listing fails.
    fn keys(&self) -> Result<Vec<String>>;
}

/// Checks that `key` is non-empty and free of path separators.
///
/// # Errors
///
/// Returns [`ModelError::InvalidKey`] otherwise.
pub fn validate_key(key: &str) -> Result<()> {
    let bad = key.is_empty()
        || key == "."
        || key == ".."
        || key.starts_with('.')
        || key.contains(['/', '\\', '\0']);
    if bad {
        Err(ModelError::invalid_key(key))
    } else {
        Ok(())
    }
}

/// In-memory store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    blobs: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored blobs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.blobs.read().len()
    }

    /// Returns `true` if nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.blobs.read().is_empty()
    }
}

impl ModelStore for MemoryStore {
    fn put(&self, key: &str, blob: &[u8]) -> Result<()> {
        validate_key(key)?;
        self.blobs.write().insert(key.to_string(), blob.to_vec());
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        validate_key(key)?;
        Ok(self.blobs.read().get(key).cloned())
    }

    fn exists(&self, key: &str) -> Result<bool> {
        validate_key(key)?;
        Ok(self.blobs.read().contains_key(key))
    }

    fn delete(&self, key: &str) -> Result<bool> {
        validate_key(key)?;
        Ok(self.blobs.write().remove(key).is_some())
    }

    fn keys(&self) -> Result<Vec<String>> {
        let mut keys: Vec<String> = self.blobs.read().keys().cloned().collect();
        keys.sort();
        Ok(keys)
    }
}

/// Directory-backed store, one `<key>.aero` file per model.
///
/// Writes go to a hidden temporary file that is renamed into place, so a
/// reader never sees a partially written blob.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// Opens a store rooted at `root`, creating the directory if needed.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::Persistence`] if the directory cannot be created.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)
            .map_err(|e| ModelError::persistence(root.display().to_string(), e.to_string()))?;
        Ok(Self { root })
    }

    /// Returns the store directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(format!("{key}.{BLOB_EXTENSION}"))
    }
}

impl ModelStore for FileStore {
    fn put(&self, key: &str, blob: &[u8]) -> Result<()> {
        validate_key(key)?;
        let fail = |e: io::Error| ModelError::persistence(key, e.to_string());
        // Dropped on any error, which removes the temporary file.
        let mut tmp = NamedTempFile::new_in(&self.root).map_err(fail)?;
        tmp.write_all(blob).map_err(fail)?;
        tmp.as_file().sync_all().map_err(fail)?;
        tmp.persist(self.path_for(key)).map_err(|e| fail(e.error))?;
        debug!(key, bytes = blob.len(), "stored model blob");
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        validate_key(key)?;
        match fs::read(self.path_for(key)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(ModelError::persistence(key, e.to_string())),
        }
    }

    fn exists(&self, key: &str) -> Result<bool> {
        validate_key(key)?;
        Ok(self.path_for(key).is_file())
    }

    fn delete(&self, key: &str) -> Result<bool> {
        validate_key(key)?;
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(ModelError::persistence(key, e.to_string())),
        }
    }

    fn keys(&self) -> Result<Vec<String>> {
        let entries = fs::read_dir(&self.root)
            .map_err(|e| ModelError::persistence(self.root.display().to_string(), e.to_string()))?;
        let mut keys: Vec<String> = entries
            .filter_map(std::result::Result::ok)
            .filter_map(|entry| {
                let path = entry.path();
                if path.extension()? != BLOB_EXTENSION {
                    return None;
                }
                let stem = path.file_stem()?.to_str()?.to_string();
                validate_key(&stem).ok().map(|()| stem)
            })
            .collect();
        keys.sort();
        Ok(keys)
    }
}
