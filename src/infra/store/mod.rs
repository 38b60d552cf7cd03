// Key-value store backends.

pub mod in_memory;
pub mod sqlite_store;

pub use in_memory::InMemoryKvStore;
pub use sqlite_store::SqliteKvStore;
