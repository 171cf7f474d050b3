//! Store implementations for ticklake.
//!
//! This crate provides concrete implementations of the
//! [`Store`](ticklake_core::Store) trait:
//!
//! - [`FsBackend`] — local filesystem with temp-then-rename commit
//! - [`ObjectBackend`] — S3-compatible object storage
//! - [`DocBackend`] — embedded transactional document storage
//!
//! plus the [`PrefixedStore`] namespacing decorator and the
//! [`StoreRegistry`] that resolves named backend configurations into
//! cached instances.

pub mod document;
pub mod local;
pub mod object;
pub mod prefixed;
pub mod registry;

pub use document::DocBackend;
pub use local::FsBackend;
pub use object::ObjectBackend;
pub use prefixed::PrefixedStore;
pub use registry::StoreRegistry;
