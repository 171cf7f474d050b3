//! The ticklake data-lake layers.
//!
//! This crate builds the partitioned write/read/validate protocol on top
//! of the [`Store`](ticklake_core::Store) contract:
//!
//! - [`BronzeLayer`] — raw, lineage-tagged storage of API responses
//! - [`SilverLayer`] — validated, schema-cast daily prices
//! - [`Lake`] — the explicitly constructed context wiring configuration,
//!   registry, and layers together

pub mod bronze;
pub mod codec;
pub mod lake;
pub mod quotes;
pub mod silver;

pub use bronze::{BronzeLayer, DateFilter, EndpointStats, StorageStats};
pub use lake::Lake;
pub use quotes::DailyPrice;
pub use silver::{SilverLayer, DAILY_PRICES_TABLE, DAILY_QUOTES_ENDPOINT};
