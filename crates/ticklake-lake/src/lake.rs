//! The lake context: configuration in, wired layers out.
//!
//! [`Lake`] replaces any notion of a process-global registry: it is an
//! explicitly constructed object owning the [`StoreRegistry`] and the two
//! layers, passed to whoever needs them, and shut down explicitly.

use tracing::info;

use ticklake_core::config::LakeConfig;
use ticklake_core::Result;
use ticklake_storage::StoreRegistry;

use crate::bronze::BronzeLayer;
use crate::silver::SilverLayer;

/// A fully wired data lake: registry plus bronze and silver layers bound
/// to the backends named in the configuration.
pub struct Lake {
    registry: StoreRegistry,
    bronze: BronzeLayer,
    silver: SilverLayer,
}

impl Lake {
    /// Resolve the configured layer bindings and wire the layers.
    ///
    /// Backend construction failures surface as
    /// [`LakeError::BackendUnavailable`](ticklake_core::LakeError::BackendUnavailable);
    /// bad bindings as [`LakeError::Config`](ticklake_core::LakeError::Config).
    pub async fn open(config: LakeConfig) -> Result<Self> {
        let registry = StoreRegistry::new(config.backends);
        let raw_store = registry.resolve(&config.layers.raw).await?;
        let normalized_store = registry.resolve(&config.layers.normalized).await?;

        let bronze = BronzeLayer::new(raw_store);
        let silver = SilverLayer::new(normalized_store, bronze.clone());

        info!(
            raw = %config.layers.raw,
            normalized = %config.layers.normalized,
            "Lake opened"
        );
        Ok(Self {
            registry,
            bronze,
            silver,
        })
    }

    /// The raw (bronze) layer.
    pub fn bronze(&self) -> &BronzeLayer {
        &self.bronze
    }

    /// The normalized (silver) layer.
    pub fn silver(&self) -> &SilverLayer {
        &self.silver
    }

    /// The backend registry, for resolving additional named stores.
    pub fn registry(&self) -> &StoreRegistry {
        &self.registry
    }

    /// Release all registry-held backend instances.
    pub async fn shutdown(&self) {
        self.registry.close().await;
        info!("Lake shut down");
    }
}
