//! Abstract persistence contract.
//!
//! A backend stores the durable relationship map as a whole. It has no
//! notion of the volatile cache and no per-entry operations: load reads
//! everything, save replaces everything.

use std::collections::BTreeMap;

use crate::error::PersistenceError;
use crate::profile::{PlayerId, Profile};

/// The persisted map of classified players, ordered by identity.
pub type DurableMap = BTreeMap<PlayerId, Profile>;

/// Storage for the durable relationship map.
///
/// # Safety Considerations
/// - `save` may be called concurrently from several threads; implementations
///   must serialize their writes
/// - A failed `save` must not leave a previously saved map unreadable when the
///   backend claims atomic replacement
pub trait ProfileBackend: Send + Sync {
    /// Returns true if a saved map exists.
    fn exists(&self) -> bool;

    /// Read the saved map. `Ok(None)` means nothing has been saved yet.
    fn load(&self) -> Result<Option<DurableMap>, PersistenceError>;

    /// Replace the saved map.
    fn save(&self, map: &DurableMap) -> Result<(), PersistenceError>;

    /// Human-readable location for log output.
    fn describe(&self) -> String;
}
