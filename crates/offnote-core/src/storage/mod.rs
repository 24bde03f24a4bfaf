//! Durable key-value storage.
//!
//! The key store and the note mirror persist through the `KeyValueStore`
//! trait, so the same logic runs against SQLite on disk or a shared in-memory
//! map in tests.

pub mod memory;
pub mod sqlite;
pub mod traits;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use traits::KeyValueStore;
