//! Profile resolution.
//!
//! The store never looks players up itself. It asks a [`Resolver`], which
//! may hit a web API, a local registry or anything else. Resolution happens
//! on the query path and during bulk import.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use crate::error::ResolveError;
use crate::profile::{PlayerId, Profile};

/// Turns an identity or a display name into a [`Profile`].
///
/// Implementations are shared across threads and may block. The store calls
/// `resolve_id` at most once per unresolved identity at a time.
pub trait Resolver: Send + Sync {
    /// Resolve a profile by identity.
    fn resolve_id(&self, id: PlayerId) -> Result<Profile, ResolveError>;

    /// Resolve a profile by display name.
    fn resolve_name(&self, name: &str) -> Result<Profile, ResolveError>;
}

/// Resolver that knows nobody. Every lookup fails with `NotFound`.
#[derive(Debug, Default, Clone, Copy)]
pub struct OfflineResolver;

impl Resolver for OfflineResolver {
    fn resolve_id(&self, id: PlayerId) -> Result<Profile, ResolveError> {
        Err(ResolveError::not_found(id.to_string()))
    }

    fn resolve_name(&self, name: &str) -> Result<Profile, ResolveError> {
        Err(ResolveError::not_found(name))
    }
}

fn normalize_key(s: &str) -> String {
    s.trim().to_ascii_lowercase()
}

#[derive(Debug, Default)]
struct Registry {
    by_id: HashMap<PlayerId, Profile>,
    by_name: HashMap<String, PlayerId>,
}

/// Thread-safe in-memory registry of known players.
///
/// Name lookups are case-insensitive. Registering a profile under an
/// existing id replaces it and drops the old name mapping.
#[derive(Debug, Default)]
pub struct InMemoryResolver {
    registry: RwLock<Registry>,
}

impl InMemoryResolver {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry seeded with the given profiles.
    #[must_use]
    pub fn with_profiles(profiles: impl IntoIterator<Item = Profile>) -> Self {
        let resolver = Self::new();
        for profile in profiles {
            resolver.register(profile);
        }
        resolver
    }

    /// Add or replace a known player.
    pub fn register(&self, profile: Profile) {
        let mut registry = self.registry.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(old) = registry.by_id.get(&profile.id()) {
            let old_key = normalize_key(&old.name);
            registry.by_name.remove(&old_key);
        }
        registry.by_name.insert(normalize_key(&profile.name), profile.id());
        registry.by_id.insert(profile.id(), profile);
    }

    /// Number of known players.
    #[must_use]
    pub fn len(&self) -> usize {
        self.registry.read().unwrap_or_else(PoisonError::into_inner).by_id.len()
    }

    /// Returns true if no players are known.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Resolver for InMemoryResolver {
    fn resolve_id(&self, id: PlayerId) -> Result<Profile, ResolveError> {
        let registry = self.registry.read().unwrap_or_else(PoisonError::into_inner);
        registry
            .by_id
            .get(&id)
            .cloned()
            .ok_or_else(|| ResolveError::not_found(id.to_string()))
    }

    fn resolve_name(&self, name: &str) -> Result<Profile, ResolveError> {
        let registry = self.registry.read().unwrap_or_else(PoisonError::into_inner);
        registry
            .by_name
            .get(&normalize_key(name))
            .and_then(|id| registry.by_id.get(id))
            .cloned()
            .ok_or_else(|| ResolveError::not_found(name))
    }
}
