//! Silver layer: validated, normalized daily prices built from bronze.
//!
//! Normalization reads a raw partition, casts it to the typed
//! `daily_prices` schema, and runs the quality gate over every row. The
//! commit is all-or-nothing: a single offending row aborts the partition
//! and leaves any previously committed version untouched — failures are
//! reported to the caller, never persisted.

use std::sync::Arc;

use bytes::Bytes;
use chrono::NaiveDate;
use tracing::{debug, info, warn};

use ticklake_core::error::LakeError;
use ticklake_core::store::Store;
use ticklake_core::types::{Partition, PartitionState};
use ticklake_core::Result;

use crate::bronze::{BronzeLayer, DateFilter, EmptySentinel};
use crate::codec;
use crate::quotes::{
    daily_prices_from_batch, daily_prices_to_batch, extract_daily_prices, DailyPrice,
};

/// The normalized table this layer maintains.
pub const DAILY_PRICES_TABLE: &str = "daily_prices";

/// The raw endpoint it is built from.
pub const DAILY_QUOTES_ENDPOINT: &str = "daily_quotes";

/// The normalized (silver) layer over a resolved [`Store`].
pub struct SilverLayer {
    store: Arc<dyn Store>,
    bronze: BronzeLayer,
}

impl SilverLayer {
    /// Create a silver layer writing through `store` and reading raw data
    /// from `bronze` (which may sit on a different backend).
    pub fn new(store: Arc<dyn Store>, bronze: BronzeLayer) -> Self {
        Self { store, bronze }
    }

    /// Normalize one day of raw daily quotes into the `daily_prices`
    /// partition.
    ///
    /// Returns the number of committed rows, or `None` when the raw
    /// partition was never fetched. A fetched-but-empty raw partition
    /// commits the silver empty sentinel and returns `Some(0)`. Successful
    /// runs overwrite any prior version of the partition; failed
    /// validation leaves it untouched and surfaces
    /// [`LakeError::Validation`] naming the offending rows.
    pub async fn normalize_daily_quotes(&self, date: NaiveDate) -> Result<Option<u64>> {
        let partition = Partition::new(DAILY_PRICES_TABLE, date);

        match self
            .bronze
            .partition_state(DAILY_QUOTES_ENDPOINT, date)
            .await?
        {
            PartitionState::Absent => {
                warn!(date = %date, "No raw daily quotes; nothing to normalize");
                return Ok(None);
            }
            PartitionState::Empty => {
                let sentinel = EmptySentinel::new(DAILY_PRICES_TABLE, date, None);
                self.store
                    .put(&partition.sentinel_key(), sentinel.to_bytes()?)
                    .await?;
                self.store.delete(&partition.data_key()).await?;
                info!(date = %date, "Raw partition is empty; committed silver sentinel");
                return Ok(Some(0));
            }
            PartitionState::Populated => {}
        }

        let batches = self
            .bronze
            .read_raw_data(DAILY_QUOTES_ENDPOINT, DateFilter::On(date))
            .await?;
        let merged = codec::concat(&batches)?.ok_or_else(|| LakeError::Internal {
            message: format!("Populated raw partition for {date} read back no batches"),
        })?;

        // Validate everything before touching storage, so a failed gate
        // cannot disturb the previously committed partition.
        let (mut rows, failures) = extract_daily_prices(&merged, date)?;
        if !failures.is_empty() {
            return Err(LakeError::Validation {
                partition: partition.to_string(),
                failures,
            });
        }
        rows.sort_by(|a, b| (a.code.as_str(), a.date).cmp(&(b.code.as_str(), b.date)));

        let batch = daily_prices_to_batch(&rows)?;
        let parquet = codec::write_parquet_bytes(&batch)?;
        self.store
            .put(&partition.data_key(), Bytes::from(parquet))
            .await?;
        self.store.delete(&partition.sentinel_key()).await?;

        info!(
            date = %date,
            rows = rows.len(),
            key = %partition.data_key(),
            "Committed normalized partition"
        );
        Ok(Some(rows.len() as u64))
    }

    /// Read normalized daily prices over an inclusive date range, merged
    /// across partitions and sorted by (date, code).
    ///
    /// `codes`, when given, restricts the result to that set of
    /// instrument codes.
    pub async fn read_daily_prices(
        &self,
        codes: Option<&[String]>,
        range: (NaiveDate, NaiveDate),
    ) -> Result<Vec<DailyPrice>> {
        let (start, end) = range;
        let keys = self
            .store
            .list(&format!("{DAILY_PRICES_TABLE}/"))
            .await?;

        let mut partitions: Vec<Partition> = keys
            .iter()
            .filter(|key| Partition::is_data_key(key))
            .filter_map(|key| Partition::parse_key(key))
            .filter(|p| p.table == DAILY_PRICES_TABLE && p.date >= start && p.date <= end)
            .collect();
        partitions.sort_by_key(|p| p.date);

        let mut rows = Vec::new();
        for partition in &partitions {
            let data = self.store.get(&partition.data_key()).await?;
            for batch in codec::read_parquet_bytes(data)? {
                rows.extend(daily_prices_from_batch(&batch)?);
            }
        }

        if let Some(codes) = codes {
            rows.retain(|r| codes.iter().any(|c| c == &r.code));
        }
        rows.sort_by(|a, b| (a.date, a.code.as_str()).cmp(&(b.date, b.code.as_str())));
        debug!(
            partitions = partitions.len(),
            rows = rows.len(),
            "Read daily prices"
        );
        Ok(rows)
    }

    /// The state of one `daily_prices` partition.
    pub async fn partition_state(&self, date: NaiveDate) -> Result<PartitionState> {
        let partition = Partition::new(DAILY_PRICES_TABLE, date);
        if self.store.exists(&partition.data_key()).await? {
            Ok(PartitionState::Populated)
        } else if self.store.exists(&partition.sentinel_key()).await? {
            Ok(PartitionState::Empty)
        } else {
            Ok(PartitionState::Absent)
        }
    }
}
