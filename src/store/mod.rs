//! The relationship store.
//!
//! [`AffinityStore`] answers "what is my relationship with this player?" for
//! any identity. Classified players (friends and enemies) are durable and
//! saved to disk. Everyone else is resolved on first query and cached in
//! memory for the life of the store.
//!
//! # Concurrency
//!
//! The store is `Send + Sync` and meant to be shared by reference or `Arc`.
//! Every identity owns one slot in a sharded map, so classification changes
//! are atomic per identity and never touch other identities. Resolution runs
//! outside the map lock: a slow resolver only blocks callers waiting on that
//! same identity.

mod import;
mod slot;

pub use import::{ImportOutcome, ImportReport};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Instant;

use dashmap::DashMap;
use tracing::{debug, error, info, warn};

use crate::config::StoreConfig;
use crate::error::{AffinityResult, PersistenceError};
use crate::profile::{Affinity, PlayerId, Profile};
use crate::resolver::Resolver;
use crate::storage::{DurableMap, JsonFileBackend, ProfileBackend};
use crate::VERSION;

use slot::{Lookup, Slot};

/// Concurrent friend/enemy store with write-through persistence.
///
/// Open it once, share it, and close it on shutdown. Dropping an open store
/// performs the same final save as [`AffinityStore::close`].
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
/// use affinity_store::{Affinity, AffinityStore, OfflineResolver, PlayerId, Profile, StoreConfig};
///
/// let store = AffinityStore::open(StoreConfig::default(), Arc::new(OfflineResolver))?;
/// let id = PlayerId::from_u128(42);
/// store.classify(Profile::new(id, "Steve").with_affinity(Affinity::Friend));
/// assert!(store.is_friend(id));
/// store.close()?;
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct AffinityStore {
    slots: DashMap<PlayerId, Slot>,
    resolver: RwLock<Arc<dyn Resolver>>,
    backend: Arc<dyn ProfileBackend>,
    config: StoreConfig,
    // Set while the file on disk could not be read; the final save must not
    // replace it with an incomplete map.
    load_failed: AtomicBool,
    closed: bool,
}

impl std::fmt::Debug for AffinityStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AffinityStore")
            .field("location", &self.backend.describe())
            .field("classified", &self.classified_len())
            .field("cached", &self.cached_len())
            .finish_non_exhaustive()
    }
}

impl AffinityStore {
    /// Open the store backed by the JSON file named in `config`.
    ///
    /// Load failures are logged and leave the store empty; they do not fail
    /// the open.
    ///
    /// # Errors
    /// - `AffinityError::Config` if the configuration is invalid
    pub fn open(config: StoreConfig, resolver: Arc<dyn Resolver>) -> AffinityResult<Self> {
        let config = config.validate()?;
        let backend = Arc::new(JsonFileBackend::new(config.path.clone(), config.atomic_save));
        Self::open_with_backend(config, backend, resolver)
    }

    /// Open the store over an arbitrary persistence backend.
    ///
    /// # Errors
    /// - `AffinityError::Config` if the configuration is invalid
    pub fn open_with_backend(
        config: StoreConfig,
        backend: Arc<dyn ProfileBackend>,
        resolver: Arc<dyn Resolver>,
    ) -> AffinityResult<Self> {
        let started = Instant::now();
        let config = config.validate()?;
        info!(version = VERSION, location = %backend.describe(), "opening affinity store");

        let store = Self {
            slots: DashMap::new(),
            resolver: RwLock::new(resolver),
            backend,
            config,
            load_failed: AtomicBool::new(false),
            closed: false,
        };

        if store.config.load_on_open {
            // Failure already logged; the store starts empty.
            let _ = store.load();
        }

        info!(
            classified = store.classified_len(),
            elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            "affinity store ready"
        );
        Ok(store)
    }

    /// Save (when configured) and release the store.
    ///
    /// The final save is skipped while the last load failed, leaving the
    /// unreadable file in place. An explicit [`AffinityStore::save`] still
    /// overwrites it.
    ///
    /// # Errors
    /// Returns the save failure, which has already been logged.
    pub fn close(mut self) -> Result<(), PersistenceError> {
        self.closed = true;
        let result = self.final_save();
        info!(location = %self.backend.describe(), "affinity store closed");
        result
    }

    fn final_save(&self) -> Result<(), PersistenceError> {
        if !self.config.save_on_close {
            return Ok(());
        }
        if self.load_failed.load(Ordering::Acquire) {
            warn!(location = %self.backend.describe(), "last load failed; leaving file untouched");
            return Ok(());
        }
        self.save().map(|_| ())
    }

    /// Read the backing file into the durable map.
    ///
    /// A missing file is first created empty. Entries are classified on top of
    /// the current state; entries already present in memory but absent from the
    /// file are kept. Returns the number of entries read.
    ///
    /// # Errors
    /// Returns the read or decode failure after logging it. The in-memory
    /// state is left untouched.
    pub fn load(&self) -> Result<usize, PersistenceError> {
        if !self.backend.exists() {
            // Logged by save; loading proceeds either way.
            let _ = self.save();
        }

        let loaded = match self.backend.load() {
            Ok(map) => map.unwrap_or_default(),
            Err(e) => {
                error!(location = %self.backend.describe(), error = %e, "failed to load relationships");
                self.load_failed.store(true, Ordering::Release);
                return Err(e);
            }
        };
        self.load_failed.store(false, Ordering::Release);

        let count = loaded.len();
        for (id, mut profile) in loaded {
            if profile.id() != id {
                warn!(key = %id, uuid = %profile.id(), "profile uuid does not match its key; using key");
                profile.rekey(id);
            }
            self.classify(profile);
        }

        debug!(location = %self.backend.describe(), count, "loaded relationships");
        Ok(count)
    }

    /// Write the current durable map to the backing file.
    ///
    /// Classifications made while the save runs may or may not be included.
    /// Returns the number of entries written.
    ///
    /// # Errors
    /// Returns the write failure after logging it. Nothing is retried.
    pub fn save(&self) -> Result<usize, PersistenceError> {
        let snapshot = self.snapshot_durable();
        let count = snapshot.len();
        match self.backend.save(&snapshot) {
            Ok(()) => {
                self.load_failed.store(false, Ordering::Release);
                debug!(location = %self.backend.describe(), count, "saved relationships");
                Ok(count)
            }
            Err(e) => {
                error!(location = %self.backend.describe(), error = %e, "failed to save relationships");
                Err(e)
            }
        }
    }

    /// Returns the profile for `id`, resolving and caching it if needed.
    ///
    /// Never fails. Classified players come straight from the durable map.
    /// Anyone else is resolved once and cached as neutral; when resolution
    /// fails a placeholder profile is cached instead. Concurrent queries for
    /// the same unresolved player share a single resolver call.
    pub fn query(&self, id: PlayerId) -> Profile {
        let existing = self.slots.get(&id).map(|slot| slot.lookup());
        let lookup = match existing {
            Some(lookup) => lookup,
            None => self.slots.entry(id).or_insert_with(Slot::pending).lookup(),
        };

        match lookup {
            Lookup::Found(profile) => profile,
            Lookup::Pending(cell) => cell.get_or_init(|| self.resolve_neutral(id)).clone(),
        }
    }

    fn resolve_neutral(&self, id: PlayerId) -> Profile {
        match self.resolver().resolve_id(id) {
            Ok(mut profile) => {
                if profile.id() != id {
                    warn!(requested = %id, returned = %profile.id(), "resolver returned a different uuid");
                    profile.rekey(id);
                }
                profile.affinity = Affinity::Neutral;
                debug!(%id, name = %profile.name, "resolved player");
                profile
            }
            Err(e) => {
                debug!(%id, error = %e, "resolution failed; caching placeholder");
                Profile::placeholder(id)
            }
        }
    }

    /// Classify a player, replacing any previous state for that identity.
    ///
    /// Friends and enemies enter the durable map (last writer wins, no merge).
    /// A neutral profile cannot be classified: it replaces any durable entry
    /// and becomes the cached profile instead. Returns the stored profile.
    pub fn classify(&self, profile: Profile) -> Profile {
        if profile.affinity.is_classified() {
            debug!(id = %profile.id(), affinity = %profile.affinity, "classified player");
            self.slots.insert(profile.id(), Slot::Classified(profile.clone()));
        } else {
            warn!(id = %profile.id(), "neutral profile stored as unclassified");
            self.slots.insert(profile.id(), Slot::cached(profile.clone()));
        }
        profile
    }

    /// Remove a classification, keeping the profile as neutral in the cache.
    ///
    /// Metadata is preserved; nothing is re-resolved. Returns the now-neutral
    /// profile, or `None` if `id` was not classified.
    pub fn declassify(&self, id: PlayerId) -> Option<Profile> {
        let mut slot = self.slots.get_mut(&id)?;
        let mut profile = slot.classified()?.clone();
        profile.affinity = Affinity::Neutral;
        *slot = Slot::cached(profile.clone());
        drop(slot);

        debug!(%id, "declassified player");
        Some(profile)
    }

    /// Drop a cached (unclassified) profile so the next query resolves again.
    ///
    /// Returns false if nothing was cached or `id` is classified.
    pub fn forget(&self, id: PlayerId) -> bool {
        self.slots
            .remove_if(&id, |_, slot| matches!(slot, Slot::Cached(_)))
            .is_some()
    }

    /// Re-resolve an unclassified player, bypassing the cache.
    ///
    /// Classified players are returned unchanged.
    pub fn refresh(&self, id: PlayerId) -> Profile {
        self.forget(id);
        self.query(id)
    }

    /// Affinity toward `id`. Neutral for anyone not classified.
    pub fn affinity_of(&self, id: PlayerId) -> Affinity {
        self.query(id).affinity
    }

    /// Returns true if `id` is classified as a friend.
    pub fn is_friend(&self, id: PlayerId) -> bool {
        self.affinity_of(id) == Affinity::Friend
    }

    /// Returns true if `id` is classified as an enemy.
    pub fn is_enemy(&self, id: PlayerId) -> bool {
        self.affinity_of(id) == Affinity::Enemy
    }

    /// Returns true if `id` is neutral or was never classified.
    pub fn is_neutral_or_unknown(&self, id: PlayerId) -> bool {
        self.affinity_of(id).is_neutral_or_weaker()
    }

    /// Returns true if `id` is in the durable map. Never resolves.
    #[must_use]
    pub fn is_classified(&self, id: PlayerId) -> bool {
        self.slots
            .get(&id)
            .is_some_and(|slot| slot.classified().is_some())
    }

    /// Cached profile for an unclassified player, without resolving.
    #[must_use]
    pub fn cached(&self, id: PlayerId) -> Option<Profile> {
        self.slots
            .get(&id)
            .and_then(|slot| slot.cached_profile().cloned())
    }

    /// Copy of the durable map.
    #[must_use]
    pub fn snapshot_durable(&self) -> DurableMap {
        self.slots
            .iter()
            .filter_map(|entry| entry.value().classified().map(|p| (*entry.key(), p.clone())))
            .collect()
    }

    /// All classified profiles (friends and enemies).
    #[must_use]
    pub fn classified(&self) -> Vec<Profile> {
        self.snapshot_durable().into_values().collect()
    }

    /// Classified friends only.
    #[must_use]
    pub fn friends(&self) -> Vec<Profile> {
        self.filter_durable(Affinity::Friend)
    }

    /// Classified enemies only.
    #[must_use]
    pub fn enemies(&self) -> Vec<Profile> {
        self.filter_durable(Affinity::Enemy)
    }

    fn filter_durable(&self, affinity: Affinity) -> Vec<Profile> {
        self.snapshot_durable()
            .into_values()
            .filter(|p| p.affinity == affinity)
            .collect()
    }

    /// Number of classified players.
    #[must_use]
    pub fn classified_len(&self) -> usize {
        self.slots
            .iter()
            .filter(|entry| entry.value().classified().is_some())
            .count()
    }

    /// Number of resolved, unclassified players held in memory.
    #[must_use]
    pub fn cached_len(&self) -> usize {
        self.slots
            .iter()
            .filter(|entry| entry.value().cached_profile().is_some())
            .count()
    }

    /// Current resolver.
    #[must_use]
    pub fn resolver(&self) -> Arc<dyn Resolver> {
        Arc::clone(&self.resolver.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Replace the resolver used for future lookups.
    ///
    /// Already cached profiles are kept; use [`AffinityStore::refresh`] to
    /// re-resolve them.
    pub fn set_resolver(&self, resolver: Arc<dyn Resolver>) {
        *self.resolver.write().unwrap_or_else(PoisonError::into_inner) = resolver;
    }

    /// Store configuration.
    #[must_use]
    pub const fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Where the durable map is persisted, for display.
    #[must_use]
    pub fn location(&self) -> String {
        self.backend.describe()
    }
}

impl Drop for AffinityStore {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        // Failure already logged by save.
        let _ = self.final_save();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::error::ResolveError;
    use crate::resolver::{InMemoryResolver, OfflineResolver};
    use crate::storage::InMemoryBackend;

    #[derive(Default)]
    struct CountingResolver {
        inner: InMemoryResolver,
        calls: AtomicUsize,
    }

    impl Resolver for CountingResolver {
        fn resolve_id(&self, id: PlayerId) -> Result<Profile, ResolveError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.resolve_id(id)
        }

        fn resolve_name(&self, name: &str) -> Result<Profile, ResolveError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.resolve_name(name)
        }
    }

    fn memory_store(resolver: Arc<dyn Resolver>) -> (AffinityStore, Arc<InMemoryBackend>) {
        let backend = Arc::new(InMemoryBackend::new());
        let store = AffinityStore::open_with_backend(
            StoreConfig::at("unused.json"),
            backend.clone(),
            resolver,
        )
        .unwrap();
        (store, backend)
    }

    #[test]
    fn query_resolves_once_and_forces_neutral() {
        let id = PlayerId::from_u128(42);
        let resolver = Arc::new(CountingResolver::default());
        resolver.inner.register(
            Profile::new(id, "Alex")
                .with_affinity(Affinity::Friend)
                .with_metadata("meta", "m"),
        );
        let (store, _) = memory_store(resolver.clone());

        let first = store.query(id);
        let second = store.query(id);

        assert_eq!(first.affinity, Affinity::Neutral);
        assert_eq!(first, second);
        assert_eq!(first.meta("meta"), Some(&serde_json::Value::from("m")));
        assert_eq!(resolver.calls.load(Ordering::SeqCst), 1);
        assert_eq!(store.cached_len(), 1);
        assert_eq!(store.classified_len(), 0);
    }

    #[test]
    fn failed_resolution_caches_placeholder() {
        let id = PlayerId::from_u128(7);
        let resolver = Arc::new(CountingResolver::default());
        let (store, _) = memory_store(resolver.clone());

        let profile = store.query(id);
        assert_eq!(profile, Profile::placeholder(id));
        store.query(id);
        assert_eq!(resolver.calls.load(Ordering::SeqCst), 1);
        assert!(store.is_neutral_or_unknown(id));
    }

    #[test]
    fn classify_moves_identity_out_of_cache() {
        let id = PlayerId::from_u128(3);
        let (store, _) = memory_store(Arc::new(OfflineResolver));
        store.query(id);
        assert!(store.cached(id).is_some());

        let stored = store.classify(Profile::new(id, "Steve").with_affinity(Affinity::Enemy));
        assert_eq!(stored.affinity, Affinity::Enemy);
        assert!(store.cached(id).is_none());
        assert!(store.is_classified(id));
        assert!(store.is_enemy(id));
        assert_eq!(store.cached_len(), 0);
    }

    #[test]
    fn classify_overwrites_without_merging_metadata() {
        let id = PlayerId::from_u128(3);
        let (store, _) = memory_store(Arc::new(OfflineResolver));
        store.classify(
            Profile::new(id, "Steve")
                .with_affinity(Affinity::Friend)
                .with_metadata("note", "old"),
        );
        store.classify(Profile::new(id, "Steve2").with_affinity(Affinity::Enemy));

        let p = store.query(id);
        assert_eq!(p.name, "Steve2");
        assert_eq!(p.affinity, Affinity::Enemy);
        assert!(p.meta("note").is_none());
    }

    #[test]
    fn classify_neutral_keeps_durable_map_classified_only() {
        let id = PlayerId::from_u128(8);
        let (store, _) = memory_store(Arc::new(OfflineResolver));
        store.classify(Profile::new(id, "Steve").with_affinity(Affinity::Friend));

        let stored = store.classify(Profile::new(id, "Steve").with_metadata("k", 1));
        assert_eq!(stored.affinity, Affinity::Neutral);
        assert!(!store.is_classified(id));
        assert!(store.snapshot_durable().is_empty());
        assert_eq!(store.cached(id).unwrap().meta("k"), Some(&serde_json::Value::from(1)));
    }

    #[test]
    fn declassify_preserves_metadata_and_skips_resolver() {
        let id = PlayerId::from_u128(42);
        let resolver = Arc::new(CountingResolver::default());
        resolver.inner.register(Profile::new(id, "fresh"));
        let (store, _) = memory_store(resolver.clone());

        store.classify(
            Profile::new(id, "Alex")
                .with_affinity(Affinity::Friend)
                .with_metadata("meta", "m"),
        );
        assert!(store.is_friend(id));

        let moved = store.declassify(id).unwrap();
        assert_eq!(moved.affinity, Affinity::Neutral);
        assert!(!store.is_friend(id));
        assert!(store.is_neutral_or_unknown(id));

        let p = store.query(id);
        assert_eq!(p.name, "Alex");
        assert_eq!(p.meta("meta"), Some(&serde_json::Value::from("m")));
        assert_eq!(resolver.calls.load(Ordering::SeqCst), 0);

        let fresh = store.refresh(id);
        assert_eq!(fresh.name, "fresh");
        assert_eq!(resolver.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn declassify_unknown_is_noop() {
        let id = PlayerId::from_u128(1);
        let (store, _) = memory_store(Arc::new(OfflineResolver));
        assert!(store.declassify(id).is_none());
        store.query(id);
        assert!(store.declassify(id).is_none());
        assert_eq!(store.cached_len(), 1);
    }

    #[test]
    fn forget_only_drops_cached_entries() {
        let cached = PlayerId::from_u128(1);
        let friend = PlayerId::from_u128(2);
        let (store, _) = memory_store(Arc::new(OfflineResolver));
        store.query(cached);
        store.classify(Profile::new(friend, "f").with_affinity(Affinity::Friend));

        assert!(store.forget(cached));
        assert!(!store.forget(cached));
        assert!(!store.forget(friend));
        assert!(store.is_friend(friend));
    }

    #[test]
    fn friends_enemies_and_classified_views() {
        let (store, _) = memory_store(Arc::new(OfflineResolver));
        for (n, affinity) in [(1u128, Affinity::Friend), (2, Affinity::Enemy), (3, Affinity::Friend)] {
            let id = PlayerId::from_u128(n);
            store.classify(Profile::new(id, format!("p{n}")).with_affinity(affinity));
        }
        store.query(PlayerId::from_u128(4));

        assert_eq!(store.friends().len(), 2);
        assert_eq!(store.enemies().len(), 1);
        assert_eq!(store.classified().len(), 3);
        assert_eq!(store.snapshot_durable().len(), 3);
    }

    #[test]
    fn set_resolver_applies_to_new_lookups() {
        let id = PlayerId::from_u128(5);
        let (store, _) = memory_store(Arc::new(OfflineResolver));
        assert_eq!(store.query(id).name, crate::profile::PLACEHOLDER_NAME);

        store.set_resolver(Arc::new(InMemoryResolver::with_profiles([Profile::new(id, "Jeb")])));
        assert_eq!(store.query(id).name, crate::profile::PLACEHOLDER_NAME);
        assert_eq!(store.refresh(id).name, "Jeb");
    }

    #[test]
    fn open_creates_empty_save_and_close_flushes() {
        let backend = Arc::new(InMemoryBackend::new());
        let store = AffinityStore::open_with_backend(
            StoreConfig::at("unused.json"),
            backend.clone(),
            Arc::new(OfflineResolver),
        )
        .unwrap();
        assert_eq!(backend.saved(), Some(DurableMap::new()));

        let id = PlayerId::from_u128(11);
        store.classify(Profile::new(id, "x").with_affinity(Affinity::Friend));
        store.close().unwrap();

        assert!(backend.saved().unwrap().contains_key(&id));
    }

    #[test]
    fn drop_without_close_still_saves() {
        let backend = Arc::new(InMemoryBackend::new());
        let id = PlayerId::from_u128(12);
        {
            let store = AffinityStore::open_with_backend(
                StoreConfig::at("unused.json"),
                backend.clone(),
                Arc::new(OfflineResolver),
            )
            .unwrap();
            store.classify(Profile::new(id, "x").with_affinity(Affinity::Enemy));
        }
        assert_eq!(backend.saved().unwrap()[&id].affinity, Affinity::Enemy);
    }

    #[test]
    fn save_on_close_disabled_skips_final_save() {
        let backend = Arc::new(InMemoryBackend::with_saved(DurableMap::new()));
        let store = AffinityStore::open_with_backend(
            StoreConfig::at("unused.json").with_save_on_close(false),
            backend.clone(),
            Arc::new(OfflineResolver),
        )
        .unwrap();
        store.classify(Profile::new(PlayerId::from_u128(1), "x").with_affinity(Affinity::Friend));
        drop(store);
        assert_eq!(backend.saved(), Some(DurableMap::new()));
    }

    #[test]
    fn load_routes_neutral_entries_to_cache_and_fixes_keys() {
        let friend = PlayerId::from_u128(1);
        let neutral = PlayerId::from_u128(2);
        let mut saved = DurableMap::new();
        saved.insert(friend, Profile::new(PlayerId::from_u128(99), "f").with_affinity(Affinity::Friend));
        saved.insert(neutral, Profile::new(neutral, "n"));

        let store = AffinityStore::open_with_backend(
            StoreConfig::at("unused.json").with_save_on_close(false),
            Arc::new(InMemoryBackend::with_saved(saved)),
            Arc::new(OfflineResolver),
        )
        .unwrap();

        assert_eq!(store.query(friend).id(), friend);
        assert!(store.is_friend(friend));
        assert!(!store.is_classified(PlayerId::from_u128(99)));
        assert!(!store.is_classified(neutral));
        assert_eq!(store.cached(neutral).unwrap().name, "n");
    }

    #[test]
    fn open_rejects_invalid_config() {
        let err = AffinityStore::open_with_backend(
            StoreConfig::at("x.json").with_import_workers(0),
            Arc::new(InMemoryBackend::new()),
            Arc::new(OfflineResolver),
        )
        .unwrap_err();
        assert!(err.is_config());
    }
}
