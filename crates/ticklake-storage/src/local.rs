//! Filesystem-backed store for development and single-machine deployments.
//!
//! [`FsBackend`] implements the [`Store`] trait using the local filesystem.
//! Writes go through a temporary sibling file followed by an atomic rename,
//! so a concurrent reader observes either the previous object or the
//! complete new one, never a partial write.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::fs;
use tracing::{debug, instrument};
use uuid::Uuid;

use ticklake_core::error::LakeError;
use ticklake_core::store::Store;
use ticklake_core::Result;

/// A [`Store`] backed by the local filesystem.
///
/// All keys map to paths under the configured `root`. Parent directories
/// are created automatically on `put`.
#[derive(Debug, Clone)]
pub struct FsBackend {
    root: PathBuf,
}

impl FsBackend {
    /// Create a new `FsBackend` rooted at the given directory.
    ///
    /// The directory is created if it does not exist.
    pub async fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root).await.map_err(|e| {
            LakeError::unavailable(
                format!("Failed to create storage root {}", root.display()),
                e,
            )
        })?;
        debug!(root = %root.display(), "FsBackend initialised");
        Ok(Self { root })
    }

    /// Return the full filesystem path for a storage key.
    fn key_to_path(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }

    /// Return the root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl Store for FsBackend {
    #[instrument(skip(self, data), fields(key = %key, size = data.len()))]
    async fn put(&self, key: &str, data: Bytes) -> Result<()> {
        let path = self.key_to_path(key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| {
                LakeError::unavailable(
                    format!("Failed to create parent directories for {}", path.display()),
                    e,
                )
            })?;
        }

        // Write to a temp sibling, then rename over the final path. Rename
        // within one directory is atomic on POSIX, so readers never see a
        // torn object.
        let tmp = path.with_file_name(format!(
            "{}.tmp-{}",
            path.file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            Uuid::new_v4()
        ));
        fs::write(&tmp, &data).await.map_err(|e| {
            LakeError::unavailable(format!("Failed to write {}", tmp.display()), e)
        })?;
        if let Err(e) = fs::rename(&tmp, &path).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(LakeError::unavailable(
                format!("Failed to commit {}", path.display()),
                e,
            ));
        }
        debug!("Put {} bytes to {}", data.len(), key);
        Ok(())
    }

    #[instrument(skip(self), fields(key = %key))]
    async fn get(&self, key: &str) -> Result<Bytes> {
        let path = self.key_to_path(key);
        let data = fs::read(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                LakeError::NotFound {
                    key: key.to_string(),
                }
            } else {
                LakeError::unavailable(format!("Failed to read {}", path.display()), e)
            }
        })?;
        debug!("Get {} bytes from {}", data.len(), key);
        Ok(Bytes::from(data))
    }

    #[instrument(skip(self), fields(key = %key))]
    async fn exists(&self, key: &str) -> Result<bool> {
        let exists = fs::try_exists(self.key_to_path(key)).await.map_err(|e| {
            LakeError::unavailable(format!("Failed to stat {key}"), e)
        })?;
        Ok(exists)
    }

    #[instrument(skip(self), fields(prefix = %prefix))]
    async fn list(&self, prefix: &str) -> Result<Vec<String>> {
        let mut results = Vec::new();
        list_recursive(&self.root, &self.root, prefix, &mut results).await?;
        results.sort();
        debug!("Listed {} keys with prefix '{}'", results.len(), prefix);
        Ok(results)
    }

    #[instrument(skip(self), fields(key = %key))]
    async fn delete(&self, key: &str) -> Result<()> {
        let path = self.key_to_path(key);
        match fs::remove_file(&path).await {
            Ok(()) => {
                debug!("Deleted {}", key);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(LakeError::unavailable(
                format!("Failed to delete {}", path.display()),
                e,
            )),
        }
    }

    #[instrument(skip(self), fields(key = %key))]
    async fn size(&self, key: &str) -> Result<u64> {
        let path = self.key_to_path(key);
        let meta = fs::metadata(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                LakeError::NotFound {
                    key: key.to_string(),
                }
            } else {
                LakeError::unavailable(format!("Failed to stat {}", path.display()), e)
            }
        })?;
        Ok(meta.len())
    }
}

/// Recursively list all files under `dir`, producing keys relative to `base`.
async fn list_recursive(
    base: &Path,
    dir: &Path,
    prefix: &str,
    results: &mut Vec<String>,
) -> Result<()> {
    let mut entries = match fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => {
            return Err(LakeError::unavailable(
                format!("Failed to read directory {}", dir.display()),
                e,
            ))
        }
    };

    while let Some(entry) = entries.next_entry().await.map_err(|e| {
        LakeError::unavailable(
            format!("Failed to read directory entry in {}", dir.display()),
            e,
        )
    })? {
        let path = entry.path();
        if path.is_dir() {
            Box::pin(list_recursive(base, &path, prefix, results)).await?;
        } else {
            let relative = path.strip_prefix(base).map_err(|e| LakeError::Internal {
                message: format!("Path prefix strip failed: {e}"),
            })?;
            // Normalise to forward slashes for cross-platform key consistency
            let key = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy().to_string())
                .collect::<Vec<_>>()
                .join("/");
            if key.starts_with(prefix) {
                results.push(key);
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn test_backend() -> (FsBackend, TempDir) {
        let tmp = TempDir::new().unwrap();
        let backend = FsBackend::new(tmp.path()).await.unwrap();
        (backend, tmp)
    }

    #[tokio::test]
    async fn test_put_and_get() {
        let (backend, _tmp) = test_backend().await;
        backend
            .put("quotes/file.bin", Bytes::from("hello"))
            .await
            .unwrap();
        let data = backend.get("quotes/file.bin").await.unwrap();
        assert_eq!(data, Bytes::from("hello"));
    }

    #[tokio::test]
    async fn test_get_not_found() {
        let (backend, _tmp) = test_backend().await;
        let result = backend.get("nonexistent").await;
        assert!(matches!(result, Err(LakeError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_put_overwrites() {
        let (backend, _tmp) = test_backend().await;
        backend.put("k", Bytes::from("v1")).await.unwrap();
        backend.put("k", Bytes::from("v2")).await.unwrap();
        assert_eq!(backend.get("k").await.unwrap(), Bytes::from("v2"));
    }

    #[tokio::test]
    async fn test_put_leaves_no_temp_files() {
        let (backend, _tmp) = test_backend().await;
        backend
            .put("a/data.parquet", Bytes::from("payload"))
            .await
            .unwrap();
        let keys = backend.list("").await.unwrap();
        assert_eq!(keys, vec!["a/data.parquet".to_string()]);
    }

    #[tokio::test]
    async fn test_list_sorted_and_scoped() {
        let (backend, _tmp) = test_backend().await;
        backend.put("prefix/b.bin", Bytes::from("b")).await.unwrap();
        backend.put("prefix/a.bin", Bytes::from("a")).await.unwrap();
        backend.put("other/c.bin", Bytes::from("c")).await.unwrap();

        let keys = backend.list("prefix/").await.unwrap();
        assert_eq!(keys, vec!["prefix/a.bin".to_string(), "prefix/b.bin".to_string()]);
    }

    #[tokio::test]
    async fn test_list_empty_prefix_lists_everything() {
        let (backend, _tmp) = test_backend().await;
        backend.put("a.bin", Bytes::from("a")).await.unwrap();
        backend.put("b/c.bin", Bytes::from("c")).await.unwrap();
        assert_eq!(backend.list("").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_delete_and_delete_absent() {
        let (backend, _tmp) = test_backend().await;
        backend.put("gone.bin", Bytes::from("x")).await.unwrap();
        backend.delete("gone.bin").await.unwrap();
        assert!(matches!(
            backend.get("gone.bin").await,
            Err(LakeError::NotFound { .. })
        ));
        // Absent delete is a no-op
        backend.delete("never-existed").await.unwrap();
    }

    #[tokio::test]
    async fn test_exists() {
        let (backend, _tmp) = test_backend().await;
        assert!(!backend.exists("missing").await.unwrap());
        backend.put("present", Bytes::from("x")).await.unwrap();
        assert!(backend.exists("present").await.unwrap());
    }

    #[tokio::test]
    async fn test_size() {
        let (backend, _tmp) = test_backend().await;
        backend.put("sized", Bytes::from("12345")).await.unwrap();
        assert_eq!(backend.size("sized").await.unwrap(), 5);
        assert!(matches!(
            backend.size("missing").await,
            Err(LakeError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_put_creates_parent_dirs() {
        let (backend, _tmp) = test_backend().await;
        backend
            .put("deep/nested/dir/file.bin", Bytes::from("deep"))
            .await
            .unwrap();
        assert_eq!(
            backend.get("deep/nested/dir/file.bin").await.unwrap(),
            Bytes::from("deep")
        );
    }

    #[tokio::test]
    async fn test_concurrent_readers_never_see_torn_writes() {
        use std::sync::Arc;

        let (backend, _tmp) = test_backend().await;
        let backend = Arc::new(backend);
        let old = Bytes::from(vec![b'a'; 64 * 1024]);
        let new = Bytes::from(vec![b'b'; 64 * 1024]);
        backend.put("contended", old.clone()).await.unwrap();

        let writer = {
            let backend = backend.clone();
            let new = new.clone();
            tokio::spawn(async move {
                for _ in 0..20 {
                    backend.put("contended", new.clone()).await.unwrap();
                }
            })
        };

        for _ in 0..50 {
            let seen = backend.get("contended").await.unwrap();
            assert!(seen == old || seen == new, "observed a torn object");
        }
        writer.await.unwrap();
    }
}
