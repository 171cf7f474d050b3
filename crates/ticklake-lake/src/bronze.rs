//! Bronze layer: partitioned raw storage of ingested API responses.
//!
//! Every ingestion call commits exactly one object per (endpoint, date)
//! partition: a Parquet data object for non-empty responses, or an
//! explicit empty sentinel for fetched-but-empty ones. The sentinel is
//! what makes "fetched, zero rows" distinguishable from "never fetched"
//! on read. Reingesting a partition overwrites it wholesale — ingestion
//! is safe to replay under at-least-once delivery, with last-writer-wins
//! semantics between concurrent writers.

use std::collections::BTreeMap;
use std::sync::Arc;

use arrow::record_batch::RecordBatch;
use bytes::Bytes;
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use ticklake_core::error::LakeError;
use ticklake_core::store::Store;
use ticklake_core::types::{Partition, PartitionState, DATE_FORMAT};
use ticklake_core::Result;

use crate::codec;

/// Date restriction for raw reads. A single date and a range are mutually
/// exclusive by construction; [`DateFilter::from_parts`] enforces that for
/// callers translating optional request parameters.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DateFilter {
    /// Every committed partition of the endpoint.
    All,
    /// Exactly one partition date.
    On(NaiveDate),
    /// All partitions within `[start, end]`, inclusive.
    Between(NaiveDate, NaiveDate),
}

impl DateFilter {
    /// Build a filter from optional single-date and range parameters,
    /// rejecting the contradictory case where both are supplied.
    pub fn from_parts(
        date: Option<NaiveDate>,
        range: Option<(NaiveDate, NaiveDate)>,
    ) -> Result<Self> {
        match (date, range) {
            (Some(_), Some(_)) => Err(LakeError::InvalidQuery {
                message: "Cannot specify both a single date and a date range".into(),
            }),
            (Some(date), None) => Ok(Self::On(date)),
            (None, Some((start, end))) => Ok(Self::Between(start, end)),
            (None, None) => Ok(Self::All),
        }
    }

    fn matches(&self, date: NaiveDate) -> bool {
        match *self {
            Self::All => true,
            Self::On(d) => d == date,
            Self::Between(start, end) => date >= start && date <= end,
        }
    }
}

/// The fetched-empty sentinel document, carrying the same lineage fields
/// the data object's columns would.
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct EmptySentinel {
    /// Endpoint (bronze) or table (silver) the partition belongs to.
    pub source: String,
    /// Partition date, `YYYY-MM-DD`.
    pub partition_date: String,
    /// When the empty response was recorded, RFC 3339.
    pub written_at: String,
    /// Optional request metadata.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

impl EmptySentinel {
    pub(crate) fn new(source: &str, date: NaiveDate, metadata: Option<Value>) -> Self {
        Self {
            source: source.to_string(),
            partition_date: date.format(DATE_FORMAT).to_string(),
            written_at: Utc::now().to_rfc3339(),
            metadata,
        }
    }

    pub(crate) fn to_bytes(&self) -> Result<Bytes> {
        let json = serde_json::to_vec(self)
            .map_err(|e| LakeError::schema(format!("Failed to encode empty sentinel: {e}")))?;
        Ok(Bytes::from(json))
    }
}

/// Per-endpoint storage statistics.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct EndpointStats {
    /// Number of dates with a committed data object.
    pub dates: u64,
    /// Number of committed objects (data and sentinels).
    pub files: u64,
    /// Total committed bytes.
    pub bytes: u64,
}

/// Aggregate storage statistics for the bronze layer.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct StorageStats {
    /// Stats per endpoint, sorted by name.
    pub endpoints: BTreeMap<String, EndpointStats>,
    /// Total committed objects across endpoints.
    pub total_files: u64,
    /// Total committed bytes across endpoints.
    pub total_bytes: u64,
}

/// The raw (bronze) layer over a resolved [`Store`].
#[derive(Clone)]
pub struct BronzeLayer {
    store: Arc<dyn Store>,
}

impl BronzeLayer {
    /// Create a bronze layer writing through the given store.
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Store one API response as the (endpoint, date) partition.
    ///
    /// Non-empty `rows` become a lineage-tagged Parquet data object; an
    /// empty `rows` commits the explicit empty sentinel instead of
    /// skipping the write. Either way the partition converges to exactly
    /// one committed object, so replaying an ingestion is idempotent.
    /// Returns the committed key.
    pub async fn store_raw_response(
        &self,
        endpoint: &str,
        rows: &[Value],
        date: NaiveDate,
        metadata: Option<Value>,
    ) -> Result<String> {
        let partition = Partition::new(endpoint, date);

        if rows.is_empty() {
            warn!(endpoint, date = %date, "No rows to store; committing empty sentinel");
            let sentinel = EmptySentinel::new(endpoint, date, metadata);
            self.store
                .put(&partition.sentinel_key(), sentinel.to_bytes()?)
                .await?;
            // Drop a stale data object from a previous non-empty ingest.
            self.store.delete(&partition.data_key()).await?;
            return Ok(partition.sentinel_key());
        }

        let date_str = date.format(DATE_FORMAT).to_string();
        let ingested_at = Utc::now().to_rfc3339();
        let batch = codec::rows_to_batch(rows)?;
        let tagged =
            codec::append_lineage(&batch, endpoint, &date_str, &ingested_at, metadata.as_ref())?;
        let parquet = codec::write_parquet_bytes(&tagged)?;

        self.store
            .put(&partition.data_key(), Bytes::from(parquet))
            .await?;
        self.store.delete(&partition.sentinel_key()).await?;

        info!(
            endpoint,
            date = %date,
            rows = tagged.num_rows(),
            key = %partition.data_key(),
            "Committed raw partition"
        );
        Ok(partition.data_key())
    }

    /// Read raw partitions for an endpoint, concatenated in ascending
    /// date order.
    ///
    /// Empty-sentinel partitions contribute zero rows; a filter matching
    /// nothing yields an empty vec, not an error.
    pub async fn read_raw_data(
        &self,
        endpoint: &str,
        filter: DateFilter,
    ) -> Result<Vec<RecordBatch>> {
        let mut partitions: Vec<Partition> = self
            .committed_partitions(endpoint)
            .await?
            .into_iter()
            .filter(|(_, is_data)| *is_data)
            .map(|(partition, _)| partition)
            .filter(|p| filter.matches(p.date))
            .collect();
        partitions.sort_by_key(|p| p.date);

        let mut batches = Vec::new();
        for partition in &partitions {
            let data = self.store.get(&partition.data_key()).await?;
            batches.extend(codec::read_parquet_bytes(data)?);
        }
        debug!(
            endpoint,
            partitions = partitions.len(),
            batches = batches.len(),
            "Read raw data"
        );
        Ok(batches)
    }

    /// Dates with a committed data or sentinel object, ascending.
    ///
    /// Objects left in an intermediate state by interrupted writes never
    /// match the committed key layout and are excluded.
    pub async fn list_available_dates(&self, endpoint: &str) -> Result<Vec<NaiveDate>> {
        let mut dates: Vec<NaiveDate> = self
            .committed_partitions(endpoint)
            .await?
            .into_iter()
            .map(|(partition, _)| partition.date)
            .collect();
        dates.sort_unstable();
        dates.dedup();
        Ok(dates)
    }

    /// The state of one (endpoint, date) partition.
    ///
    /// If a crash between the two writes of a partition rewrite left both
    /// objects behind, the data object wins.
    pub async fn partition_state(
        &self,
        endpoint: &str,
        date: NaiveDate,
    ) -> Result<PartitionState> {
        let partition = Partition::new(endpoint, date);
        if self.store.exists(&partition.data_key()).await? {
            Ok(PartitionState::Populated)
        } else if self.store.exists(&partition.sentinel_key()).await? {
            Ok(PartitionState::Empty)
        } else {
            Ok(PartitionState::Absent)
        }
    }

    /// Aggregate per-endpoint statistics over all committed objects.
    pub async fn get_storage_stats(&self) -> Result<StorageStats> {
        let mut stats = StorageStats::default();
        for key in self.store.list("").await? {
            let Some(partition) = Partition::parse_key(&key) else {
                continue;
            };
            let size = self.store.size(&key).await?;
            let entry = stats.endpoints.entry(partition.table).or_default();
            if Partition::is_data_key(&key) {
                entry.dates += 1;
            }
            entry.files += 1;
            entry.bytes += size;
            stats.total_files += 1;
            stats.total_bytes += size;
        }
        Ok(stats)
    }

    /// All committed partitions of an endpoint as (partition, is_data)
    /// pairs, unsorted and undeduplicated.
    async fn committed_partitions(&self, endpoint: &str) -> Result<Vec<(Partition, bool)>> {
        let keys = self.store.list(&format!("{endpoint}/")).await?;
        Ok(keys
            .iter()
            .filter_map(|key| {
                let partition = Partition::parse_key(key)?;
                (partition.table == endpoint)
                    .then(|| (partition, Partition::is_data_key(key)))
            })
            .collect())
    }
}
