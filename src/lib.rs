//! # affinity-store - Friend and enemy tracking for game clients
//!
//! Tracks the relationship the local user has declared toward other players.
//! Friends and enemies persist across sessions in a JSON file; everyone else
//! is resolved on demand and cached in memory.
//!
//! ## Core Concepts
//!
//! - **PlayerId**: Stable identity, the only key the store uses
//! - **Affinity**: `Friend`, `Enemy` or `Neutral` (the default)
//! - **Profile**: Identity, affinity and resolver-supplied metadata
//! - **Resolver**: Turns an identity or a name into a profile
//! - **AffinityStore**: The concurrent store tying it together
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use affinity_store::{Affinity, AffinityStore, InMemoryResolver, PlayerId, Profile, StoreConfig};
//!
//! let resolver = Arc::new(InMemoryResolver::new());
//! let store = AffinityStore::open(StoreConfig::default(), resolver)?;
//!
//! let id = PlayerId::from_u128(42);
//! assert_eq!(store.affinity_of(id), Affinity::Neutral);
//!
//! store.classify(Profile::new(id, "Steve").with_affinity(Affinity::Friend));
//! assert!(store.is_friend(id));
//!
//! store.close()?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod profile;
pub mod resolver;
pub mod storage;
pub mod store;

/// Crate version, logged when a store opens.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// Re-export primary types at crate root for convenience
pub use config::StoreConfig;
pub use error::{AffinityError, AffinityResult, ConfigError, PersistenceError, ResolveError};
pub use profile::{Affinity, PlayerId, Profile, PLACEHOLDER_NAME, RESERVED_FIELDS};
pub use resolver::{InMemoryResolver, OfflineResolver, Resolver};
pub use storage::{DurableMap, InMemoryBackend, JsonFileBackend, ProfileBackend};
pub use store::{AffinityStore, ImportOutcome, ImportReport};
