//! Player identity, affinity and profile types.
//!
//! A [`PlayerId`] is the only key the store knows. Everything else on a
//! [`Profile`] besides the affinity is supplied by the resolver and passed
//! through persistence untouched.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Name given to profiles synthesized when resolution fails.
pub const PLACEHOLDER_NAME: &str = "empty";

/// Keys written by [`Profile`] itself. Metadata never holds these.
pub const RESERVED_FIELDS: [&str; 3] = ["name", "uuid", "affinity"];

/// Globally unique, stable player identifier.
///
/// # Examples
///
/// ```
/// use affinity_store::PlayerId;
///
/// let id = PlayerId::from_u128(42);
/// let parsed: PlayerId = id.to_string().parse().unwrap();
/// assert_eq!(id, parsed);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(Uuid);

impl PlayerId {
    /// Creates a new random player ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a player ID from an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Creates a player ID from its 128-bit integer form.
    #[must_use]
    pub const fn from_u128(value: u128) -> Self {
        Self(Uuid::from_u128(value))
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for PlayerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for PlayerId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim()).map(Self)
    }
}

impl From<Uuid> for PlayerId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl From<PlayerId> for Uuid {
    fn from(id: PlayerId) -> Self {
        id.0
    }
}

/// Relationship the local user holds toward a player.
///
/// Ordered from weakest to strongest: `Neutral < Enemy < Friend`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Affinity {
    /// Unclassified. The default for every player.
    #[default]
    Neutral,
    /// Explicitly marked hostile.
    Enemy,
    /// Explicitly marked friendly.
    Friend,
}

impl Affinity {
    /// Returns true for `Friend` and `Enemy`.
    #[must_use]
    pub const fn is_classified(self) -> bool {
        !matches!(self, Self::Neutral)
    }

    /// Returns true if this affinity is neutral or weaker.
    #[must_use]
    pub fn is_neutral_or_weaker(self) -> bool {
        self <= Self::Neutral
    }
}

impl fmt::Display for Affinity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Neutral => write!(f, "neutral"),
            Self::Enemy => write!(f, "enemy"),
            Self::Friend => write!(f, "friend"),
        }
    }
}

/// A player as seen by the local user.
///
/// Serialized as `{"name", "uuid", "affinity", ...}`; any additional fields
/// land in [`Profile::metadata`] and are written back unchanged. The identity
/// is fixed at construction.
///
/// # Examples
///
/// ```
/// use affinity_store::{Affinity, PlayerId, Profile};
///
/// let profile = Profile::new(PlayerId::from_u128(7), "Steve").with_affinity(Affinity::Friend);
/// assert!(profile.is_friend());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    /// Display name supplied by the resolver.
    #[serde(default)]
    pub name: String,

    #[serde(rename = "uuid")]
    id: PlayerId,

    /// Current relationship.
    #[serde(default)]
    pub affinity: Affinity,

    #[serde(flatten)]
    metadata: Map<String, Value>,
}

impl Profile {
    /// Creates a neutral profile with no extra metadata.
    #[must_use]
    pub fn new(id: PlayerId, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id,
            affinity: Affinity::Neutral,
            metadata: Map::new(),
        }
    }

    /// Creates the stand-in profile used when a player cannot be resolved.
    #[must_use]
    pub fn placeholder(id: PlayerId) -> Self {
        Self::new(id, PLACEHOLDER_NAME)
    }

    /// Stable identity.
    #[must_use]
    pub const fn id(&self) -> PlayerId {
        self.id
    }

    /// Re-key a profile arriving from outside the store (file or resolver)
    /// whose embedded identity disagrees with the one it was filed under.
    pub(crate) fn rekey(&mut self, id: PlayerId) {
        self.id = id;
    }

    /// Sets the affinity.
    #[must_use]
    pub fn with_affinity(mut self, affinity: Affinity) -> Self {
        self.affinity = affinity;
        self
    }

    /// Adds or replaces a metadata field. Keys in [`RESERVED_FIELDS`] are ignored.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert_meta(key, value);
        self
    }

    /// Adds or replaces a metadata field.
    ///
    /// Returns false, leaving the profile untouched, if `key` is one of
    /// [`RESERVED_FIELDS`].
    pub fn insert_meta(&mut self, key: impl Into<String>, value: impl Into<Value>) -> bool {
        let key = key.into();
        if RESERVED_FIELDS.contains(&key.as_str()) {
            return false;
        }
        self.metadata.insert(key, value.into());
        true
    }

    /// Removes a metadata field.
    pub fn remove_meta(&mut self, key: &str) -> Option<Value> {
        self.metadata.remove(key)
    }

    /// Returns a metadata field.
    #[must_use]
    pub fn meta(&self, key: &str) -> Option<&Value> {
        self.metadata.get(key)
    }

    /// Opaque resolver-supplied fields.
    #[must_use]
    pub const fn metadata(&self) -> &Map<String, Value> {
        &self.metadata
    }

    /// Returns true if this profile is marked as a friend.
    #[must_use]
    pub fn is_friend(&self) -> bool {
        self.affinity == Affinity::Friend
    }

    /// Returns true if this profile is marked as an enemy.
    #[must_use]
    pub fn is_enemy(&self) -> bool {
        self.affinity == Affinity::Enemy
    }
}
