//! Persistent keyed storage
//!
//! The only owner of durable state. Typed stores sit on top of a
//! [`StorageBackend`]; every mutation either commits a complete new
//! document or leaves the previous one untouched, and subscribers are
//! notified only after the write has landed.

mod array;
mod backend;
mod key_value;
mod subscribers;

pub use array::ArrayStore;
pub use backend::{FileBackend, MemoryBackend, StorageBackend};
pub use key_value::KeyValueStore;
pub use subscribers::Subscription;
