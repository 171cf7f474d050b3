//! Namespacing decorator for key-space isolation.
//!
//! [`PrefixedStore`] wraps any [`Store`] and rewrites every key to
//! `"<prefix>/<key>"` before delegating. Two decorators with different
//! prefixes over the same inner store never observe each other's keys —
//! this is how the bronze and silver layers (and multiple environments)
//! share one physical backend safely.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use ticklake_core::store::Store;
use ticklake_core::Result;

/// A [`Store`] decorator that scopes all operations under a fixed prefix.
pub struct PrefixedStore {
    inner: Arc<dyn Store>,
    /// Normalised prefix, ending in `/` when non-empty.
    prefix: String,
}

impl PrefixedStore {
    /// Wrap `inner` so every key lives under `prefix`.
    ///
    /// Trailing slashes on `prefix` are normalised away; an empty prefix
    /// makes the decorator transparent.
    pub fn new(inner: Arc<dyn Store>, prefix: impl AsRef<str>) -> Self {
        let trimmed = prefix.as_ref().trim_matches('/');
        let prefix = if trimmed.is_empty() {
            String::new()
        } else {
            format!("{trimmed}/")
        };
        Self { inner, prefix }
    }

    /// The normalised prefix (without trailing slash), for diagnostics.
    pub fn prefix(&self) -> &str {
        self.prefix.trim_end_matches('/')
    }

    fn add_prefix(&self, key: &str) -> String {
        format!("{}{key}", self.prefix)
    }

    fn strip_prefix<'a>(&self, key: &'a str) -> &'a str {
        key.strip_prefix(&self.prefix).unwrap_or(key)
    }
}

#[async_trait]
impl Store for PrefixedStore {
    async fn put(&self, key: &str, data: Bytes) -> Result<()> {
        self.inner.put(&self.add_prefix(key), data).await
    }

    async fn get(&self, key: &str) -> Result<Bytes> {
        self.inner.get(&self.add_prefix(key)).await
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        self.inner.exists(&self.add_prefix(key)).await
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>> {
        let scoped = self.inner.list(&self.add_prefix(prefix)).await?;
        Ok(scoped
            .iter()
            .map(|key| self.strip_prefix(key).to_string())
            .collect())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.inner.delete(&self.add_prefix(key)).await
    }

    async fn size(&self, key: &str) -> Result<u64> {
        self.inner.size(&self.add_prefix(key)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::local::FsBackend;
    use tempfile::TempDir;
    use ticklake_core::error::LakeError;

    async fn inner_store() -> (Arc<dyn Store>, TempDir) {
        let tmp = TempDir::new().unwrap();
        let backend = FsBackend::new(tmp.path()).await.unwrap();
        (Arc::new(backend), tmp)
    }

    #[tokio::test]
    async fn test_keys_are_rewritten() {
        let (inner, _tmp) = inner_store().await;
        let bronze = PrefixedStore::new(inner.clone(), "bronze");
        bronze.put("a.bin", Bytes::from("x")).await.unwrap();

        // Visible through the decorator under the bare key…
        assert_eq!(bronze.get("a.bin").await.unwrap(), Bytes::from("x"));
        // …and through the inner store under the full key.
        assert_eq!(inner.get("bronze/a.bin").await.unwrap(), Bytes::from("x"));
    }

    #[tokio::test]
    async fn test_namespace_isolation() {
        let (inner, _tmp) = inner_store().await;
        let bronze = PrefixedStore::new(inner.clone(), "bronze");
        let silver = PrefixedStore::new(inner.clone(), "silver");

        bronze.put("k.bin", Bytes::from("b")).await.unwrap();
        silver.put("k.bin", Bytes::from("s")).await.unwrap();

        assert_eq!(bronze.list("").await.unwrap(), vec!["k.bin".to_string()]);
        assert_eq!(silver.list("").await.unwrap(), vec!["k.bin".to_string()]);
        assert_eq!(bronze.get("k.bin").await.unwrap(), Bytes::from("b"));
        assert_eq!(silver.get("k.bin").await.unwrap(), Bytes::from("s"));

        // Deleting in one namespace leaves the other untouched.
        bronze.delete("k.bin").await.unwrap();
        assert!(matches!(
            bronze.get("k.bin").await,
            Err(LakeError::NotFound { .. })
        ));
        assert_eq!(silver.get("k.bin").await.unwrap(), Bytes::from("s"));
    }

    #[tokio::test]
    async fn test_list_scopes_further() {
        let (inner, _tmp) = inner_store().await;
        let store = PrefixedStore::new(inner, "bronze");
        store.put("quotes/a.bin", Bytes::from("a")).await.unwrap();
        store.put("info/b.bin", Bytes::from("b")).await.unwrap();

        let keys = store.list("quotes/").await.unwrap();
        assert_eq!(keys, vec!["quotes/a.bin".to_string()]);
    }

    #[tokio::test]
    async fn test_prefix_normalisation() {
        let (inner, _tmp) = inner_store().await;
        let store = PrefixedStore::new(inner.clone(), "deep/ns/");
        assert_eq!(store.prefix(), "deep/ns");
        store.put("k", Bytes::from("v")).await.unwrap();
        assert!(inner.exists("deep/ns/k").await.unwrap());
    }

    #[tokio::test]
    async fn test_empty_prefix_is_transparent() {
        let (inner, _tmp) = inner_store().await;
        let store = PrefixedStore::new(inner.clone(), "");
        store.put("k", Bytes::from("v")).await.unwrap();
        assert!(inner.exists("k").await.unwrap());
    }

    #[tokio::test]
    async fn test_size_forwarded() {
        let (inner, _tmp) = inner_store().await;
        let store = PrefixedStore::new(inner, "ns");
        store.put("k", Bytes::from("123")).await.unwrap();
        assert_eq!(store.size("k").await.unwrap(), 3);
    }
}
