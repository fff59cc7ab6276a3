//! JSON file persistence backend.
//!
//! The durable map lives in one pretty-printed JSON file. Saves either
//! replace the file atomically (temp file, fsync, rename) or truncate and
//! rewrite it in place, depending on configuration.

mod codec;
mod writer;

pub use writer::{sweep_stale_temp_files, AtomicFileWriter};

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use tracing::debug;

use crate::error::PersistenceError;
use crate::storage::traits::{DurableMap, ProfileBackend};

/// Backend storing the durable map in a JSON file.
#[derive(Debug)]
pub struct JsonFileBackend {
    path: PathBuf,
    atomic: bool,
    write_lock: Mutex<()>,
}

impl JsonFileBackend {
    /// Create a backend for `path`.
    ///
    /// When `atomic` is set, stale temp files from interrupted saves are
    /// swept from the parent directory.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, atomic: bool) -> Self {
        let path = path.into();
        if atomic {
            match sweep_stale_temp_files(&path) {
                Ok(0) => {}
                Ok(removed) => debug!(path = %path.display(), removed, "removed stale temp files"),
                Err(e) => debug!(path = %path.display(), error = %e, "could not sweep temp files"),
            }
        }
        Self {
            path,
            atomic,
            write_lock: Mutex::new(()),
        }
    }

    /// Path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns true if saves replace the file atomically.
    #[must_use]
    pub const fn is_atomic(&self) -> bool {
        self.atomic
    }

    fn write_err(&self, source: std::io::Error) -> PersistenceError {
        PersistenceError::Write {
            path: self.path.clone(),
            source,
        }
    }

    fn write_bytes(&self, bytes: &[u8]) -> Result<(), PersistenceError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| self.write_err(e))?;
        }

        if self.atomic {
            let mut writer = AtomicFileWriter::create(&self.path).map_err(|e| self.write_err(e))?;
            writer.write_all(bytes).map_err(|e| self.write_err(e))?;
            writer.finalize().map_err(|e| self.write_err(e))
        } else {
            fs::write(&self.path, bytes).map_err(|e| self.write_err(e))
        }
    }
}

impl ProfileBackend for JsonFileBackend {
    fn exists(&self) -> bool {
        self.path.is_file()
    }

    fn load(&self) -> Result<Option<DurableMap>, PersistenceError> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(PersistenceError::Read {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        codec::decode(&bytes).map_err(|source| PersistenceError::Decode {
            path: self.path.clone(),
            source,
        })
    }

    fn save(&self, map: &DurableMap) -> Result<(), PersistenceError> {
        let bytes = codec::encode(map).map_err(PersistenceError::Encode)?;
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.write_bytes(&bytes)
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}
