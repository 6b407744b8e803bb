//! JSON document storage
//!
//! Every persisted document (poll state, announcement guard, chat registry)
//! is written as a whole: serialize, write `<name>.tmp`, rename over the
//! canonical path. A reader never observes a half-written file.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::Mutex;

/// Storage errors
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Directory of JSON documents sharing one write lock.
///
/// Clones share the lock, so every temp-write-then-rename in the process is
/// serialized no matter which component issued it.
#[derive(Debug, Clone)]
pub struct JsonStore {
    dir: PathBuf,
    write_lock: Arc<Mutex<()>>,
}

impl JsonStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Resolve a file name inside the store directory.
    pub fn path(&self, file_name: &str) -> PathBuf {
        self.dir.join(file_name)
    }

    /// Atomically replace `path` with the JSON encoding of `value`.
    pub async fn write<T: Serialize + ?Sized>(
        &self,
        path: &Path,
        value: &T,
    ) -> Result<(), StorageError> {
        let mut content = serde_json::to_vec_pretty(value)?;
        content.push(b'\n');

        let _guard = self.write_lock.lock().await;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| StorageError::Io {
                    path: parent.to_path_buf(),
                    source,
                })?;
        }

        let tmp_path = tmp_path_for(path);
        tokio::fs::write(&tmp_path, &content)
            .await
            .map_err(|source| StorageError::Io {
                path: tmp_path.clone(),
                source,
            })?;
        tokio::fs::rename(&tmp_path, path)
            .await
            .map_err(|source| StorageError::Io {
                path: path.to_path_buf(),
                source,
            })?;

        tracing::debug!(path = %path.display(), bytes = content.len(), "document written");
        Ok(())
    }

    /// Read a document, treating a missing or unparsable file as absent.
    pub async fn read<T: DeserializeOwned>(&self, path: &Path) -> Option<T> {
        let data = match tokio::fs::read(path).await {
            Ok(data) => data,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return None,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "failed to read document");
                return None;
            }
        };
        match serde_json::from_slice(&data) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "ignoring corrupt document");
                None
            }
        }
    }

    /// Last modification time of a document, if it exists
    pub async fn modified(&self, path: &Path) -> Option<SystemTime> {
        tokio::fs::metadata(path).await.ok()?.modified().ok()
    }

    /// File names in the store directory. A missing directory lists as empty.
    pub async fn list(&self) -> Vec<String> {
        let mut names = Vec::new();
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) => {
                if e.kind() != io::ErrorKind::NotFound {
                    tracing::warn!(dir = %self.dir.display(), error = %e, "failed to list data dir");
                }
                return names;
            }
        };
        loop {
            match entries.next_entry().await {
                Ok(Some(entry)) => {
                    if let Some(name) = entry.file_name().to_str() {
                        names.push(name.to_string());
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    tracing::warn!(dir = %self.dir.display(), error = %e, "failed to list data dir");
                    break;
                }
            }
        }
        names.sort();
        names
    }
}

fn tmp_path_for(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
