//! S3-compatible object storage backend.
//!
//! [`ObjectBackend`] implements the [`Store`] trait using the `object_store`
//! crate, supporting any S3-compatible endpoint: AWS S3, MinIO, Ceph, GCS
//! via S3 compatibility, etc. Per-key PUTs are atomic on the provider side,
//! but a just-completed write is not guaranteed to be immediately visible
//! to every subsequent reader.

use async_trait::async_trait;
use bytes::Bytes;
use futures::TryStreamExt;
use object_store::aws::AmazonS3Builder;
use object_store::path::Path as ObjectPath;
use object_store::{ObjectStore, PutPayload};
use tracing::{debug, instrument};

use ticklake_core::config::BackendConfig;
use ticklake_core::error::LakeError;
use ticklake_core::store::Store;
use ticklake_core::Result;

/// A [`Store`] backed by any S3-compatible object storage.
///
/// Built from a [`BackendConfig`] with `bucket` (required) and optional
/// `endpoint`/`region`. Credentials come from the environment
/// (`AWS_ACCESS_KEY_ID`, `AWS_SECRET_ACCESS_KEY`, `AWS_REGION`). The
/// backend holds no key prefix of its own — namespacing is provided by the
/// [`PrefixedStore`](crate::PrefixedStore) decorator.
pub struct ObjectBackend {
    store: Box<dyn ObjectStore>,
    bucket: String,
}

impl ObjectBackend {
    /// Create a new `ObjectBackend` from a merged backend config.
    ///
    /// Fails with [`LakeError::Config`] when `bucket` is missing and with
    /// [`LakeError::BackendUnavailable`] when the client cannot be built.
    pub fn new(config: &BackendConfig) -> Result<Self> {
        let bucket = config
            .bucket
            .clone()
            .ok_or_else(|| LakeError::config("Object backend requires 'bucket'"))?;

        let mut builder = AmazonS3Builder::from_env().with_bucket_name(&bucket);
        if let Some(region) = &config.region {
            builder = builder.with_region(region);
        }
        // Custom endpoint for MinIO / other S3-compatible services
        if let Some(endpoint) = &config.endpoint {
            builder = builder.with_endpoint(endpoint).with_allow_http(true);
        }

        let store = builder.build().map_err(|e| {
            LakeError::unavailable(format!("Failed to create object client for bucket {bucket}"), e)
        })?;

        debug!(bucket = %bucket, "ObjectBackend initialised");
        Ok(Self {
            store: Box::new(store),
            bucket,
        })
    }

    /// The bucket this backend writes into.
    pub fn bucket(&self) -> &str {
        &self.bucket
    }
}

#[async_trait]
impl Store for ObjectBackend {
    #[instrument(skip(self, data), fields(key = %key, size = data.len()))]
    async fn put(&self, key: &str, data: Bytes) -> Result<()> {
        let path = ObjectPath::from(key);
        self.store
            .put(&path, PutPayload::from(data))
            .await
            .map_err(|e| LakeError::unavailable(format!("Object put failed for {key}"), e))?;
        Ok(())
    }

    #[instrument(skip(self), fields(key = %key))]
    async fn get(&self, key: &str) -> Result<Bytes> {
        let path = ObjectPath::from(key);
        let result = self.store.get(&path).await.map_err(|e| match e {
            object_store::Error::NotFound { .. } => LakeError::NotFound {
                key: key.to_string(),
            },
            other => LakeError::unavailable(format!("Object get failed for {key}"), other),
        })?;
        let bytes = result
            .bytes()
            .await
            .map_err(|e| LakeError::unavailable(format!("Object get bytes failed for {key}"), e))?;
        Ok(bytes)
    }

    #[instrument(skip(self), fields(key = %key))]
    async fn exists(&self, key: &str) -> Result<bool> {
        let path = ObjectPath::from(key);
        match self.store.head(&path).await {
            Ok(_) => Ok(true),
            Err(object_store::Error::NotFound { .. }) => Ok(false),
            Err(e) => Err(LakeError::unavailable(
                format!("Object head failed for {key}"),
                e,
            )),
        }
    }

    #[instrument(skip(self), fields(prefix = %prefix))]
    async fn list(&self, prefix: &str) -> Result<Vec<String>> {
        let scope = if prefix.is_empty() {
            None
        } else {
            Some(ObjectPath::from(prefix))
        };

        let mut results = Vec::new();
        let mut stream = self.store.list(scope.as_ref());
        while let Some(meta) = stream.try_next().await.map_err(|e| {
            LakeError::unavailable(format!("Object list failed for prefix {prefix}"), e)
        })? {
            results.push(meta.location.to_string());
        }

        results.sort();
        Ok(results)
    }

    #[instrument(skip(self), fields(key = %key))]
    async fn delete(&self, key: &str) -> Result<()> {
        let path = ObjectPath::from(key);
        // Provider delete is idempotent for most S3-compatibles, but some
        // surface NotFound; both count as deleted here.
        match self.store.delete(&path).await {
            Ok(()) => Ok(()),
            Err(object_store::Error::NotFound { .. }) => Ok(()),
            Err(e) => Err(LakeError::unavailable(
                format!("Object delete failed for {key}"),
                e,
            )),
        }
    }

    #[instrument(skip(self), fields(key = %key))]
    async fn size(&self, key: &str) -> Result<u64> {
        let path = ObjectPath::from(key);
        match self.store.head(&path).await {
            Ok(meta) => Ok(meta.size as u64),
            Err(object_store::Error::NotFound { .. }) => Err(LakeError::NotFound {
                key: key.to_string(),
            }),
            Err(e) => Err(LakeError::unavailable(
                format!("Object head failed for {key}"),
                e,
            )),
        }
    }
}
