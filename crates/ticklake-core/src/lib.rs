//! ticklake core contracts, configuration, and errors.
//!
//! This crate provides the foundational building blocks for the ticklake
//! data lake: the [`Store`] capability trait, the partition/key model,
//! backend configuration with inheritance, and the unified error type.

pub mod config;
pub mod error;
pub mod store;
pub mod types;

pub use config::{BackendConfig, BackendKind, LakeConfig};
pub use error::LakeError;
pub use store::Store;
pub use types::{Partition, PartitionState, StorageKey};

/// Convenience Result type using [`LakeError`].
pub type Result<T> = std::result::Result<T, LakeError>;
