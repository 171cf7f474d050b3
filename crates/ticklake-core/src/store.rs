//! The Store trait — the single interface for all storage operations.
//!
//! Every byte that the raw and normalized layers persist goes through this
//! trait. Implementations live in `ticklake-storage`: a filesystem backend,
//! an S3-compatible object backend, and an embedded document backend.
//! Application code never touches the filesystem or an object store
//! directly.

use async_trait::async_trait;
use bytes::Bytes;

use crate::Result;

/// The unified storage interface for all lake operations.
///
/// Implementations must be `Send + Sync` for use across async tasks.
///
/// # Atomicity
///
/// `put` must be atomic from the perspective of any single reader: a
/// concurrent `get` observes either the previous value or the complete new
/// value, never a torn write. How that is achieved is backend-specific
/// (temp-file-then-rename, provider-atomic PUT, or a single transaction).
///
/// # Concurrent writers
///
/// No locking is provided. Concurrent `put`s to the same key race and the
/// backend's native last-writer-wins semantics apply.
#[async_trait]
pub trait Store: Send + Sync {
    /// Write an object. Overwrites unconditionally if it already exists.
    async fn put(&self, key: &str, data: Bytes) -> Result<()>;

    /// Read an object. Returns [`LakeError::NotFound`](crate::LakeError::NotFound)
    /// if the key does not exist.
    async fn get(&self, key: &str) -> Result<Bytes>;

    /// Check whether an object exists at the given key.
    async fn exists(&self, key: &str) -> Result<bool>;

    /// List all object keys matching the given prefix, sorted
    /// lexicographically.
    async fn list(&self, prefix: &str) -> Result<Vec<String>>;

    /// Delete an object. Does not error if the key does not exist.
    async fn delete(&self, key: &str) -> Result<()>;

    /// Size of an object in bytes, without fetching its payload.
    /// Returns [`LakeError::NotFound`](crate::LakeError::NotFound) if absent.
    async fn size(&self, key: &str) -> Result<u64>;
}
