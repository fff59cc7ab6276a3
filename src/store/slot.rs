//! Per-identity slot held by the store.
//!
//! One map entry per player: either classified (durable) or cached
//! (volatile). Keeping both states in a single entry is what makes an
//! identity live in exactly one of the two maps at a time.

use std::sync::{Arc, OnceLock};

use crate::profile::Profile;

#[derive(Debug)]
pub(crate) enum Slot {
    /// Explicitly classified; persisted.
    Classified(Profile),
    /// Resolved or resolving on demand; never persisted.
    ///
    /// The cell is shared with in-flight queries so the resolver runs outside
    /// the map lock and at most once.
    Cached(Arc<OnceLock<Profile>>),
}

/// Result of reading a slot without blocking on resolution.
pub(crate) enum Lookup {
    Found(Profile),
    Pending(Arc<OnceLock<Profile>>),
}

impl Slot {
    pub(crate) fn pending() -> Self {
        Self::Cached(Arc::new(OnceLock::new()))
    }

    pub(crate) fn cached(profile: Profile) -> Self {
        Self::Cached(Arc::new(OnceLock::from(profile)))
    }

    pub(crate) fn lookup(&self) -> Lookup {
        match self {
            Self::Classified(profile) => Lookup::Found(profile.clone()),
            Self::Cached(cell) => match cell.get() {
                Some(profile) => Lookup::Found(profile.clone()),
                None => Lookup::Pending(Arc::clone(cell)),
            },
        }
    }

    pub(crate) fn classified(&self) -> Option<&Profile> {
        match self {
            Self::Classified(profile) => Some(profile),
            Self::Cached(_) => None,
        }
    }

    /// Cached profile, if resolution has finished.
    pub(crate) fn cached_profile(&self) -> Option<&Profile> {
        match self {
            Self::Classified(_) => None,
            Self::Cached(cell) => cell.get(),
        }
    }
}
