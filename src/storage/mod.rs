//! Persistence for the durable relationship map.
//!
//! The [`ProfileBackend`] trait is the seam between the store and where
//! classified players are kept between sessions. Two implementations ship:
//! the JSON file used in production and an in-memory one for tests.

pub mod file;
mod memory;
mod traits;

pub use file::JsonFileBackend;
pub use memory::InMemoryBackend;
pub use traits::{DurableMap, ProfileBackend};
