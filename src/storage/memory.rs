//! In-memory persistence backend.
//!
//! Keeps the last saved map in memory. Intended for tests and for embedders
//! that persist the map through their own channel.

use std::sync::{PoisonError, RwLock};

use crate::error::PersistenceError;
use crate::storage::traits::{DurableMap, ProfileBackend};

/// Thread-safe in-memory backend.
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    saved: RwLock<Option<DurableMap>>,
}

impl InMemoryBackend {
    /// Create a backend with nothing saved.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a backend that already holds a saved map.
    #[must_use]
    pub fn with_saved(map: DurableMap) -> Self {
        Self {
            saved: RwLock::new(Some(map)),
        }
    }

    /// Returns a copy of the last saved map.
    #[must_use]
    pub fn saved(&self) -> Option<DurableMap> {
        self.saved.read().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl ProfileBackend for InMemoryBackend {
    fn exists(&self) -> bool {
        self.saved.read().unwrap_or_else(PoisonError::into_inner).is_some()
    }

    fn load(&self) -> Result<Option<DurableMap>, PersistenceError> {
        Ok(self.saved())
    }

    fn save(&self, map: &DurableMap) -> Result<(), PersistenceError> {
        *self.saved.write().unwrap_or_else(PoisonError::into_inner) = Some(map.clone());
        Ok(())
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}
