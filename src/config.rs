//! Store configuration.

use std::path::{Path, PathBuf};

use crate::error::ConfigError;

/// File name used under the user's home directory.
pub const DEFAULT_FILE_NAME: &str = ".friends.json";

/// Configuration for [`AffinityStore`](crate::store::AffinityStore).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Relationship file location.
    pub path: PathBuf,
    /// Replace the file via temp file and rename instead of truncating it.
    pub atomic_save: bool,
    /// Load the file while opening the store.
    pub load_on_open: bool,
    /// Save once when the store is closed or dropped.
    pub save_on_close: bool,
    /// Concurrent resolver calls during bulk import.
    pub import_workers: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_path(),
            atomic_save: true,
            load_on_open: true,
            save_on_close: true,
            import_workers: 4,
        }
    }
}

/// `~/.friends.json`, or `./.friends.json` when no home directory is known.
#[must_use]
pub fn default_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(DEFAULT_FILE_NAME)
}

impl StoreConfig {
    const MAX_IMPORT_WORKERS: usize = 64;

    /// Default configuration pointing at `path`.
    #[must_use]
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    /// Sets the relationship file location.
    #[must_use]
    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = path.into();
        self
    }

    /// Enables or disables atomic replacement on save.
    #[must_use]
    pub fn with_atomic_save(mut self, atomic: bool) -> Self {
        self.atomic_save = atomic;
        self
    }

    /// Enables or disables loading on open.
    #[must_use]
    pub fn with_load_on_open(mut self, load: bool) -> Self {
        self.load_on_open = load;
        self
    }

    /// Enables or disables the final save on close.
    #[must_use]
    pub fn with_save_on_close(mut self, save: bool) -> Self {
        self.save_on_close = save;
        self
    }

    /// Sets the bulk import concurrency.
    #[must_use]
    pub fn with_import_workers(mut self, workers: usize) -> Self {
        self.import_workers = workers;
        self
    }

    /// Relationship file location.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Check the configuration, returning it unchanged when valid.
    pub fn validate(self) -> Result<Self, ConfigError> {
        if self.path.file_name().is_none() {
            return Err(ConfigError::InvalidPath { path: self.path });
        }

        if self.import_workers == 0 || self.import_workers > Self::MAX_IMPORT_WORKERS {
            return Err(ConfigError::ImportWorkersOutOfRange {
                actual: self.import_workers,
                max: Self::MAX_IMPORT_WORKERS,
            });
        }

        Ok(self)
    }
}
