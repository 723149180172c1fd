//! Object storage for actweek
//!
//! The pipeline talks to storage only through [`ObjectStore`]. The bundled
//! implementation maps one bucket onto one directory:
//!
//! ```text
//! <root>/                         # bucket
//!   inbox/<name>.csv              # inbound snapshots (trigger source)
//!   42_requested.csv              # archived snapshots, by ISO week and role
//!   42_completed.csv
//!   42_state.json                 # week record (conditional writes only)
//!   42_ele_report.csv             # published partitions
//!   42_merc_incomplete.csv
//!   .locks/                       # lock files for conditional writes
//! ```

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Component, Path, PathBuf};

use serde::Serialize;

use crate::error::{Error, Result};
use crate::lock::{self, FileLock, DEFAULT_LOCK_TIMEOUT_MS};

/// Directory (relative to the bucket root) holding lock files
pub const LOCKS_DIR: &str = ".locks";

/// Key/value object storage used by the pipeline.
pub trait ObjectStore {
    /// Bucket name, used for logging and trigger validation.
    fn bucket(&self) -> &str;

    fn exists(&self, key: &str) -> Result<bool>;

    /// Read an object. Missing objects are [`Error::ObjectNotFound`].
    fn get(&self, key: &str) -> Result<Vec<u8>>;

    fn put(&self, key: &str, data: &[u8]) -> Result<()>;

    fn copy(&self, src_key: &str, dst_key: &str) -> Result<()>;

    /// Delete an object. Deleting a missing object is not an error.
    fn delete(&self, key: &str) -> Result<()>;

    /// Keys starting with `prefix`, sorted.
    fn list(&self, prefix: &str) -> Result<Vec<String>>;

    /// Conditional write: store `data` only if the current content equals
    /// `expected` (`None` meaning "object must not exist").
    ///
    /// Returns `false` without writing when the precondition fails.
    fn put_if(&self, key: &str, expected: Option<&[u8]>, data: &[u8]) -> Result<bool>;

    /// Read an object if it exists.
    fn get_opt(&self, key: &str) -> Result<Option<Vec<u8>>> {
        match self.get(key) {
            Ok(data) => Ok(Some(data)),
            Err(Error::ObjectNotFound(_)) => Ok(None),
            Err(err) => Err(err),
        }
    }
}

/// Directory-backed bucket.
#[derive(Debug, Clone)]
pub struct FsObjectStore {
    root: PathBuf,
    bucket: String,
}

impl FsObjectStore {
    /// Open (creating if needed) the bucket directory `root/bucket`.
    pub fn open(root: impl AsRef<Path>, bucket: impl Into<String>) -> Result<Self> {
        let bucket = bucket.into();
        validate_key(&bucket)?;
        let root = root.as_ref().join(&bucket);
        fs::create_dir_all(&root)?;
        Ok(Self { root, bucket })
    }

    /// Path to the bucket directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Filesystem path for an object key
    pub fn object_path(&self, key: &str) -> Result<PathBuf> {
        validate_key(key)?;
        Ok(self.root.join(key))
    }

    fn lock_path(&self, key: &str) -> PathBuf {
        let flat = key.replace('/', "__");
        self.root.join(LOCKS_DIR).join(format!("{flat}.lock"))
    }

    fn collect_keys(&self, dir: &Path, prefix: &str, out: &mut Vec<String>) -> Result<()> {
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().to_string();
            if name.starts_with('.') || name.contains(".tmp.") {
                continue;
            }
            let key = if prefix.is_empty() {
                name
            } else {
                format!("{prefix}/{name}")
            };
            if entry.file_type()?.is_dir() {
                self.collect_keys(&entry.path(), &key, out)?;
            } else {
                out.push(key);
            }
        }
        Ok(())
    }
}

impl ObjectStore for FsObjectStore {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.object_path(key)?.is_file())
    }

    fn get(&self, key: &str) -> Result<Vec<u8>> {
        let path = self.object_path(key)?;
        match fs::read(&path) {
            Ok(data) => Ok(data),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                Err(Error::ObjectNotFound(key.to_string()))
            }
            Err(err) => Err(Error::Io(err)),
        }
    }

    fn put(&self, key: &str, data: &[u8]) -> Result<()> {
        let path = self.object_path(key)?;
        lock::write_atomic(&path, data)?;
        tracing::debug!(bucket = %self.bucket, key, bytes = data.len(), "object put");
        Ok(())
    }

    fn copy(&self, src_key: &str, dst_key: &str) -> Result<()> {
        let data = self.get(src_key)?;
        self.put(dst_key, &data)
    }

    fn delete(&self, key: &str) -> Result<()> {
        let path = self.object_path(key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(Error::Io(err)),
        }
    }

    fn list(&self, prefix: &str) -> Result<Vec<String>> {
        let mut keys = Vec::new();
        self.collect_keys(&self.root, "", &mut keys)?;
        keys.retain(|key| key.starts_with(prefix));
        keys.sort();
        Ok(keys)
    }

    fn put_if(&self, key: &str, expected: Option<&[u8]>, data: &[u8]) -> Result<bool> {
        let path = self.object_path(key)?;
        let _lock = FileLock::acquire(self.lock_path(key), DEFAULT_LOCK_TIMEOUT_MS)?;

        let current = match fs::read(&path) {
            Ok(bytes) => Some(bytes),
            Err(err) if err.kind() == ErrorKind::NotFound => None,
            Err(err) => return Err(Error::Io(err)),
        };

        if current.as_deref() != expected {
            tracing::debug!(bucket = %self.bucket, key, "conditional write precondition failed");
            return Ok(false);
        }

        lock::write_atomic(&path, data)?;
        Ok(true)
    }
}

/// Reject keys that could escape the bucket directory.
pub fn validate_key(key: &str) -> Result<()> {
    if key.trim().is_empty() {
        return Err(Error::InvalidKey("key cannot be empty".to_string()));
    }
    if key.contains('\\') || key.contains('\0') {
        return Err(Error::InvalidKey(key.to_string()));
    }
    let path = Path::new(key);
    for component in path.components() {
        match component {
            Component::Normal(part) if !part.to_string_lossy().starts_with('.') => {}
            _ => return Err(Error::InvalidKey(key.to_string())),
        }
    }
    Ok(())
}

/// Append one JSON record as a line to `path`.
pub fn append_jsonl<T: Serialize>(path: &Path, record: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let json = serde_json::to_string(record)?;
    let mut file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)?;

    writeln!(file, "{}", json)?;
    file.sync_all()?;

    Ok(())
}
