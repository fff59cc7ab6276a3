//! JSON codec for the relationship file.
//!
//! The file is a single pretty-printed JSON object keyed by hyphenated
//! player UUIDs:
//!
//! ```text
//! {
//!   "069a79f4-44e9-4726-a5be-fca90e38aaf5": {
//!     "name": "Notch",
//!     "uuid": "069a79f4-44e9-4726-a5be-fca90e38aaf5",
//!     "affinity": "FRIEND"
//!   }
//! }
//! ```

use crate::storage::traits::DurableMap;

/// Serialize the map as pretty-printed JSON with a trailing newline.
pub fn encode(map: &DurableMap) -> serde_json::Result<Vec<u8>> {
    let mut out = serde_json::to_vec_pretty(map)?;
    out.push(b'\n');
    Ok(out)
}

/// Deserialize a relationship file.
///
/// Blank input and a literal `null` decode to `None`, matching files that
/// were created but never written.
pub fn decode(bytes: &[u8]) -> serde_json::Result<Option<DurableMap>> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    serde_json::from_slice(bytes)
}
