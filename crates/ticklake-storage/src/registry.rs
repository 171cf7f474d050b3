//! Registry for named, configuration-driven storage backends.
//!
//! [`StoreRegistry`] maps backend names to [`BackendConfig`]s and resolves
//! them into live [`Store`] instances. Resolution merges `extends` chains
//! (cycle-safe), constructs the backend for the merged config, applies the
//! configured namespace prefix, and caches the result — repeated
//! `resolve` calls for the same name return the same instance, so
//! connection-holding backends are built once per process.
//!
//! Dotted names append further namespace prefixes to a base backend:
//! `resolve("prod.images.thumbnails")` resolves the `prod` config and wraps
//! it with the prefix `images/thumbnails`. Backends whose merged configs
//! share identical connection parameters share one underlying instance, so
//! several prefixed views of the same database file or bucket coexist
//! without reopening it.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info};

use ticklake_core::config::{resolve_chain, BackendConfig, BackendKind};
use ticklake_core::error::LakeError;
use ticklake_core::store::Store;
use ticklake_core::Result;

use crate::document::DocBackend;
use crate::local::FsBackend;
use crate::object::ObjectBackend;
use crate::prefixed::PrefixedStore;

/// Connection identity of a merged config, ignoring the namespace prefix.
/// Two configs with equal identity materialize into one shared instance.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct BackendIdentity {
    kind: BackendKind,
    root: Option<PathBuf>,
    bucket: Option<String>,
    endpoint: Option<String>,
    region: Option<String>,
}

impl BackendIdentity {
    fn of(config: &BackendConfig, kind: BackendKind) -> Self {
        Self {
            kind,
            root: config.root.clone(),
            bucket: config.bucket.clone(),
            endpoint: config.endpoint.clone(),
            region: config.region.clone(),
        }
    }
}

#[derive(Default)]
struct RegistryCache {
    /// Fully resolved stores, keyed by the requested (possibly dotted) name.
    named: HashMap<String, Arc<dyn Store>>,
    /// Raw backend instances, keyed by connection identity.
    bases: HashMap<BackendIdentity, Arc<dyn Store>>,
}

/// Resolves named backend configurations into cached [`Store`] instances.
pub struct StoreRegistry {
    configs: HashMap<String, BackendConfig>,
    cache: Mutex<RegistryCache>,
}

impl StoreRegistry {
    /// Create a registry over a set of named backend configurations.
    pub fn new(configs: HashMap<String, BackendConfig>) -> Self {
        Self {
            configs,
            cache: Mutex::new(RegistryCache::default()),
        }
    }

    /// Split a dotted name into its base config name and namespace path.
    ///
    /// `"prod"` → `("prod", "")`; `"prod.images.thumbs"` →
    /// `("prod", "images/thumbs")`.
    pub fn parse_name(name: &str) -> (&str, String) {
        match name.split_once('.') {
            Some((base, rest)) => (base, rest.split('.').collect::<Vec<_>>().join("/")),
            None => (name, String::new()),
        }
    }

    /// Resolve a name to its fully merged configuration without
    /// constructing a backend. Dotted suffixes are ignored here; they only
    /// affect prefixing.
    pub fn resolve_config(&self, name: &str) -> Result<BackendConfig> {
        let (base_name, _) = Self::parse_name(name);
        resolve_chain(&self.configs, base_name)
    }

    /// Resolve a name into a live store, constructing and caching it on
    /// first use.
    ///
    /// Fails with [`LakeError::Config`] for unknown names or cyclic
    /// `extends` chains, and with [`LakeError::BackendUnavailable`] when
    /// the backend cannot be constructed. Construction is never retried
    /// here — a failed resolve leaves no cache entry behind.
    pub async fn resolve(&self, name: &str) -> Result<Arc<dyn Store>> {
        let mut cache = self.cache.lock().await;
        if let Some(store) = cache.named.get(name) {
            debug!(name, "Registry cache hit");
            return Ok(Arc::clone(store));
        }

        let (base_name, dotted) = Self::parse_name(name);
        let merged = resolve_chain(&self.configs, base_name)?;
        let kind = merged.kind.ok_or_else(|| {
            LakeError::config(format!("Backend '{base_name}' resolved without a kind"))
        })?;

        let identity = BackendIdentity::of(&merged, kind);
        let base = match cache.bases.get(&identity) {
            Some(base) => Arc::clone(base),
            None => {
                let base = build_backend(kind, &merged, base_name).await?;
                cache.bases.insert(identity, Arc::clone(&base));
                base
            }
        };

        let prefix = match (merged.prefix.as_deref().unwrap_or(""), dotted.as_str()) {
            ("", "") => String::new(),
            (config_prefix, "") => config_prefix.to_string(),
            ("", dotted) => dotted.to_string(),
            (config_prefix, dotted) => format!("{config_prefix}/{dotted}"),
        };
        let store: Arc<dyn Store> = if prefix.is_empty() {
            base
        } else {
            Arc::new(PrefixedStore::new(base, &prefix))
        };

        cache.named.insert(name.to_string(), Arc::clone(&store));
        info!(name, base = base_name, prefix = %prefix, "Resolved backend");
        Ok(store)
    }

    /// All configured backend names, sorted.
    pub fn backend_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.configs.keys().cloned().collect();
        names.sort();
        names
    }

    /// Release every cached backend instance.
    ///
    /// Connection-holding backends (document/object stores) drop their
    /// handles here; subsequent `resolve` calls reconstruct them.
    pub async fn close(&self) {
        let mut cache = self.cache.lock().await;
        let released = cache.named.len();
        cache.named.clear();
        cache.bases.clear();
        info!(released, "Registry closed");
    }
}

/// Construct a raw backend for a merged config.
async fn build_backend(
    kind: BackendKind,
    config: &BackendConfig,
    name: &str,
) -> Result<Arc<dyn Store>> {
    match kind {
        BackendKind::Filesystem => {
            let root = config.root.clone().ok_or_else(|| {
                LakeError::config(format!("Filesystem backend '{name}' requires 'root'"))
            })?;
            Ok(Arc::new(FsBackend::new(root).await?))
        }
        BackendKind::Object => Ok(Arc::new(ObjectBackend::new(config)?)),
        BackendKind::Document => {
            let root = config.root.clone().ok_or_else(|| {
                LakeError::config(format!("Document backend '{name}' requires 'root'"))
            })?;
            Ok(Arc::new(DocBackend::new(root)?))
        }
    }
}
