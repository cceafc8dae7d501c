use crate::error::StorageError;

/// Volatile storage, for tests and hosts without a writable disk
pub mod memory;
/// One JSON file per key inside a directory
pub mod file;

pub use file::FileStorage;
pub use memory::InMemoryStorage;

/// Durable key-value store for serialized resources.
///
/// Values are opaque blobs; keys come from
/// [`RefreshParameters::storage_key`](crate::config::RefreshParameters::storage_key).
/// Exactly one refresher should own a given key.
pub trait DiskStorage: Send + Sync {
    /// Overwrites whatever is stored under `key`.
    fn save(&self, key: &str, data: &[u8]) -> Result<(), StorageError>;

    /// `Ok(None)` when nothing was ever stored under `key`.
    fn retrieve(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError>;

    fn delete(&self, key: &str) -> Result<(), StorageError>;
}
