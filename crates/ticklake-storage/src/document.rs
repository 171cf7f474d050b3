//! Embedded document-store backend.
//!
//! [`DocBackend`] implements the [`Store`] trait over a `redb` database.
//! Objects live in one table indexed by the composite
//! (namespace, path) pair from [`StorageKey`]; every `put` is an upsert
//! inside a single write transaction, which gives the same
//! old-value-or-new-value guarantee the other backends provide.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use redb::{Database, ReadableTable, TableDefinition};
use tracing::{debug, instrument};

use ticklake_core::error::LakeError;
use ticklake_core::store::Store;
use ticklake_core::types::StorageKey;
use ticklake_core::Result;

/// The single object table, keyed by (namespace, path).
const OBJECTS: TableDefinition<(&str, &str), &[u8]> = TableDefinition::new("objects");

/// A [`Store`] backed by an embedded transactional document database.
///
/// The database handle is held for the lifetime of the backend instance;
/// the registry releases it at shutdown. All database calls are blocking
/// and run on the tokio blocking pool.
pub struct DocBackend {
    db: Arc<Database>,
    path: PathBuf,
}

impl DocBackend {
    /// Open (or create) the database file at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                LakeError::unavailable(
                    format!("Failed to create database directory {}", parent.display()),
                    e,
                )
            })?;
        }
        let db = Database::create(&path).map_err(|e| {
            LakeError::unavailable(format!("Failed to open database {}", path.display()), e)
        })?;
        debug!(path = %path.display(), "DocBackend initialised");
        Ok(Self {
            db: Arc::new(db),
            path,
        })
    }

    /// The database file path.
    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    /// Run a blocking database operation on the blocking pool.
    async fn run<T, F>(&self, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Database) -> Result<T> + Send + 'static,
    {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || op(&db))
            .await
            .map_err(|e| LakeError::Internal {
                message: format!("Blocking task panicked: {e}"),
            })?
    }
}

/// Map any redb error into a backend failure with context.
fn db_err(context: &str, e: impl std::error::Error + Send + Sync + 'static) -> LakeError {
    LakeError::unavailable(context.to_string(), e)
}

#[async_trait]
impl Store for DocBackend {
    #[instrument(skip(self, data), fields(key = %key, size = data.len()))]
    async fn put(&self, key: &str, data: Bytes) -> Result<()> {
        let key = key.to_string();
        self.run(move |db| {
            let parts = StorageKey::split(&key);
            let tx = db
                .begin_write()
                .map_err(|e| db_err("Failed to begin write transaction", e))?;
            {
                let mut table = tx
                    .open_table(OBJECTS)
                    .map_err(|e| db_err("Failed to open object table", e))?;
                table
                    .insert((parts.namespace.as_str(), parts.path.as_str()), data.as_ref())
                    .map_err(|e| db_err(&format!("Upsert failed for {key}"), e))?;
            }
            tx.commit()
                .map_err(|e| db_err(&format!("Commit failed for {key}"), e))?;
            Ok(())
        })
        .await
    }

    #[instrument(skip(self), fields(key = %key))]
    async fn get(&self, key: &str) -> Result<Bytes> {
        let key = key.to_string();
        self.run(move |db| {
            let parts = StorageKey::split(&key);
            let tx = db
                .begin_read()
                .map_err(|e| db_err("Failed to begin read transaction", e))?;
            let table = match tx.open_table(OBJECTS) {
                Ok(table) => table,
                // A fresh database has no table yet: nothing is stored.
                Err(redb::TableError::TableDoesNotExist(_)) => {
                    return Err(LakeError::NotFound { key })
                }
                Err(e) => return Err(db_err("Failed to open object table", e)),
            };
            let value = table
                .get((parts.namespace.as_str(), parts.path.as_str()))
                .map_err(|e| db_err(&format!("Lookup failed for {key}"), e))?;
            match value {
                Some(guard) => Ok(Bytes::from(guard.value().to_vec())),
                None => Err(LakeError::NotFound { key }),
            }
        })
        .await
    }

    #[instrument(skip(self), fields(key = %key))]
    async fn exists(&self, key: &str) -> Result<bool> {
        match self.get(key).await {
            Ok(_) => Ok(true),
            Err(LakeError::NotFound { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    #[instrument(skip(self), fields(prefix = %prefix))]
    async fn list(&self, prefix: &str) -> Result<Vec<String>> {
        let prefix = prefix.to_string();
        self.run(move |db| {
            let tx = db
                .begin_read()
                .map_err(|e| db_err("Failed to begin read transaction", e))?;
            let table = match tx.open_table(OBJECTS) {
                Ok(table) => table,
                Err(redb::TableError::TableDoesNotExist(_)) => return Ok(Vec::new()),
                Err(e) => return Err(db_err("Failed to open object table", e)),
            };
            let mut results = Vec::new();
            for item in table
                .iter()
                .map_err(|e| db_err("Failed to iterate object table", e))?
            {
                let (composite, _) =
                    item.map_err(|e| db_err("Failed to read object table entry", e))?;
                let (namespace, path) = composite.value();
                let key = StorageKey::new(namespace, path).join();
                if key.starts_with(&prefix) {
                    results.push(key);
                }
            }
            results.sort();
            Ok(results)
        })
        .await
    }

    #[instrument(skip(self), fields(key = %key))]
    async fn delete(&self, key: &str) -> Result<()> {
        let key = key.to_string();
        self.run(move |db| {
            let parts = StorageKey::split(&key);
            let tx = db
                .begin_write()
                .map_err(|e| db_err("Failed to begin write transaction", e))?;
            {
                let mut table = tx
                    .open_table(OBJECTS)
                    .map_err(|e| db_err("Failed to open object table", e))?;
                // Absent keys are a no-op, matching the Store contract.
                table
                    .remove((parts.namespace.as_str(), parts.path.as_str()))
                    .map_err(|e| db_err(&format!("Remove failed for {key}"), e))?;
            }
            tx.commit()
                .map_err(|e| db_err(&format!("Commit failed for {key}"), e))?;
            Ok(())
        })
        .await
    }

    #[instrument(skip(self), fields(key = %key))]
    async fn size(&self, key: &str) -> Result<u64> {
        let data = self.get(key).await?;
        Ok(data.len() as u64)
    }
}
