//! Error types for the affinity store.
//!
//! All errors are strongly typed using thiserror. Query, classify and
//! declassify are total and never return these; they surface from
//! resolution, persistence and configuration.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Failures reported by a [`Resolver`](crate::resolver::Resolver).
#[derive(Debug, Error)]
pub enum ResolveError {
    /// The resolver has no such player.
    #[error("No profile found for '{query}'")]
    NotFound {
        /// Identity or name that was looked up.
        query: String,
    },

    /// Transport failure talking to the resolver's source.
    #[error("Resolver I/O failure: {0}")]
    Io(#[from] io::Error),

    /// The resolver refused or could not serve the request.
    #[error("Resolver unavailable: {message}")]
    Unavailable {
        /// Resolver-supplied reason.
        message: String,
    },
}

impl ResolveError {
    /// Creates a not-found error for the given lookup key.
    #[must_use]
    pub fn not_found(query: impl Into<String>) -> Self {
        Self::NotFound {
            query: query.into(),
        }
    }

    /// Creates an unavailable error.
    #[must_use]
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }

    /// Returns true if the resolver positively reported the player as unknown.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Returns true if asking again later could succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        !self.is_not_found()
    }
}

/// Failures reading or writing the relationship file.
#[derive(Debug, Error)]
pub enum PersistenceError {
    /// The file exists but could not be read.
    #[error("Failed to read {}: {source}", .path.display())]
    Read {
        /// File being read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// The file could not be written or replaced.
    #[error("Failed to write {}: {source}", .path.display())]
    Write {
        /// File being written.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// The file contents are not a valid relationship map.
    #[error("Corrupt relationship file {}: {source}", .path.display())]
    Decode {
        /// File being decoded.
        path: PathBuf,
        /// Parse error with line and column.
        #[source]
        source: serde_json::Error,
    },

    /// The durable map could not be serialized.
    #[error("Failed to encode relationships: {0}")]
    Encode(#[source] serde_json::Error),
}

impl PersistenceError {
    /// Returns the file the failure refers to, if any.
    #[must_use]
    pub fn path(&self) -> Option<&std::path::Path> {
        match self {
            Self::Read { path, .. } | Self::Write { path, .. } | Self::Decode { path, .. } => {
                Some(path.as_path())
            }
            Self::Encode(_) => None,
        }
    }

    /// Returns true if the file exists but its contents could not be parsed.
    #[must_use]
    pub const fn is_corrupt(&self) -> bool {
        matches!(self, Self::Decode { .. })
    }
}

/// Invalid store configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configured path has no file name component.
    #[error("Relationship file path must name a file (got '{}')", .path.display())]
    InvalidPath {
        /// Rejected path.
        path: PathBuf,
    },

    /// `import_workers` is zero or above the limit.
    #[error("import_workers must be between 1 and {max} (got {actual})")]
    ImportWorkersOutOfRange {
        /// Configured value.
        actual: usize,
        /// Largest accepted value.
        max: usize,
    },
}

/// Top-level error type for the affinity store.
#[derive(Debug, Error)]
pub enum AffinityError {
    /// See [`ResolveError`].
    #[error("Resolution error: {0}")]
    Resolve(#[from] ResolveError),

    /// See [`PersistenceError`].
    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    /// See [`ConfigError`].
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl AffinityError {
    /// Returns true if this is a persistence error.
    #[must_use]
    pub const fn is_persistence(&self) -> bool {
        matches!(self, Self::Persistence(_))
    }

    /// Returns true if this is a configuration error.
    #[must_use]
    pub const fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }

    /// Returns true if this error is retryable.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Resolve(e) => e.is_retryable(),
            Self::Persistence(e) => !e.is_corrupt(),
            Self::Config(_) => false,
        }
    }
}

/// Result type alias for affinity store operations.
pub type AffinityResult<T> = Result<T, AffinityError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_error_not_found() {
        let err = ResolveError::not_found("Notch");
        assert!(err.is_not_found());
        assert!(!err.is_retryable());
        assert!(format!("{err}").contains("Notch"));
    }

    #[test]
    fn test_resolve_error_io_is_retryable() {
        let err: ResolveError = io::Error::new(io::ErrorKind::TimedOut, "slow api").into();
        assert!(!err.is_not_found());
        assert!(err.is_retryable());
        assert!(format!("{err}").contains("slow api"));
    }

    #[test]
    fn test_persistence_error_path_and_message() {
        let err = PersistenceError::Write {
            path: PathBuf::from("/tmp/.friends.json"),
            source: io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        };
        assert_eq!(err.path(), Some(std::path::Path::new("/tmp/.friends.json")));
        let msg = format!("{err}");
        assert!(msg.contains(".friends.json"));
        assert!(msg.contains("denied"));
        assert!(!err.is_corrupt());
    }

    #[test]
    fn test_persistence_error_decode_is_corrupt() {
        let source = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err = PersistenceError::Decode {
            path: PathBuf::from("friends.json"),
            source,
        };
        assert!(err.is_corrupt());

        let top: AffinityError = err.into();
        assert!(top.is_persistence());
        assert!(!top.is_retryable());
    }

    #[test]
    fn test_config_error_not_retryable() {
        let err: AffinityError = ConfigError::ImportWorkersOutOfRange { actual: 0, max: 64 }.into();
        assert!(err.is_config());
        assert!(!err.is_retryable());
        assert!(format!("{err}").contains("import_workers"));
    }
}
