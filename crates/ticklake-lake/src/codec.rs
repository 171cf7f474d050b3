//! Columnar codec: JSON rows in, Parquet bytes out, and back.
//!
//! API responses arrive as JSON objects. The codec infers an Arrow schema
//! from them, decodes them into a `RecordBatch`, appends the lineage
//! columns the raw layer stamps on every row, and serialises batches as
//! Parquet (LZ4) for storage.

use std::sync::Arc;

use arrow::array::{ArrayRef, StringArray};
use arrow::datatypes::{DataType, Field, FieldRef, Schema, SchemaRef};
use arrow::json::reader::infer_json_schema_from_iterator;
use arrow::json::ReaderBuilder;
use arrow::record_batch::RecordBatch;
use bytes::Bytes;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use serde_json::Value;

use ticklake_core::error::LakeError;
use ticklake_core::Result;

/// Lineage column: originating endpoint name.
pub const COL_ENDPOINT: &str = "_endpoint";
/// Lineage column: partition date as `YYYY-MM-DD`.
pub const COL_PARTITION_DATE: &str = "_partition_date";
/// Lineage column: ingestion timestamp, RFC 3339.
pub const COL_INGESTED_AT: &str = "_ingested_at";
/// Lineage column: optional request metadata as a JSON string.
pub const COL_METADATA: &str = "_metadata";

/// Decode JSON rows into a single `RecordBatch` with an inferred schema.
///
/// Fails with [`LakeError::Schema`] on an empty slice or rows that do not
/// decode under the inferred schema.
pub fn rows_to_batch(rows: &[Value]) -> Result<RecordBatch> {
    if rows.is_empty() {
        return Err(LakeError::schema("Cannot build a batch from zero rows"));
    }

    let schema = infer_json_schema_from_iterator(rows.iter().map(Ok))
        .map_err(|e| LakeError::schema(format!("Schema inference failed: {e}")))?;
    let mut decoder = ReaderBuilder::new(Arc::new(schema))
        .build_decoder()
        .map_err(|e| LakeError::schema(format!("Failed to build JSON decoder: {e}")))?;
    decoder
        .serialize(rows)
        .map_err(|e| LakeError::schema(format!("Failed to decode rows: {e}")))?;
    decoder
        .flush()
        .map_err(|e| LakeError::schema(format!("Failed to flush decoded rows: {e}")))?
        .ok_or_else(|| LakeError::schema("Decoder produced no batch"))
}

/// Append the lineage columns to a batch.
///
/// `_metadata` is always present so partitions written with and without
/// request metadata stay concat-compatible; it is null when no metadata
/// was supplied.
pub fn append_lineage(
    batch: &RecordBatch,
    endpoint: &str,
    partition_date: &str,
    ingested_at: &str,
    metadata: Option<&Value>,
) -> Result<RecordBatch> {
    let rows = batch.num_rows();
    let metadata_json = metadata.map(|m| m.to_string());

    let mut fields: Vec<FieldRef> = batch.schema().fields().iter().cloned().collect();
    let mut columns: Vec<ArrayRef> = batch.columns().to_vec();

    let lineage: [(&str, bool, ArrayRef); 4] = [
        (
            COL_ENDPOINT,
            false,
            Arc::new(StringArray::from(vec![endpoint; rows])),
        ),
        (
            COL_PARTITION_DATE,
            false,
            Arc::new(StringArray::from(vec![partition_date; rows])),
        ),
        (
            COL_INGESTED_AT,
            false,
            Arc::new(StringArray::from(vec![ingested_at; rows])),
        ),
        (
            COL_METADATA,
            true,
            Arc::new(StringArray::from(vec![metadata_json.as_deref(); rows])),
        ),
    ];
    for (name, nullable, column) in lineage {
        fields.push(Arc::new(Field::new(name, DataType::Utf8, nullable)));
        columns.push(column);
    }

    RecordBatch::try_new(Arc::new(Schema::new(fields)), columns)
        .map_err(|e| LakeError::schema(format!("Failed to append lineage columns: {e}")))
}

/// Serialise a `RecordBatch` to Parquet bytes in memory with LZ4 compression.
pub fn write_parquet_bytes(batch: &RecordBatch) -> Result<Vec<u8>> {
    let props = WriterProperties::builder()
        .set_compression(Compression::LZ4_RAW)
        .build();

    let mut buf: Vec<u8> = Vec::new();
    {
        let mut writer = ArrowWriter::try_new(&mut buf, batch.schema(), Some(props))
            .map_err(|e| LakeError::schema(format!("Failed to create Parquet writer: {e}")))?;
        writer
            .write(batch)
            .map_err(|e| LakeError::schema(format!("Failed to write Parquet data: {e}")))?;
        writer
            .close()
            .map_err(|e| LakeError::schema(format!("Failed to close Parquet writer: {e}")))?;
    }
    Ok(buf)
}

/// Deserialise Parquet bytes into record batches.
pub fn read_parquet_bytes(data: Bytes) -> Result<Vec<RecordBatch>> {
    let reader = ParquetRecordBatchReaderBuilder::try_new(data)
        .map_err(|e| LakeError::schema(format!("Failed to open Parquet reader: {e}")))?
        .build()
        .map_err(|e| LakeError::schema(format!("Failed to build Parquet reader: {e}")))?;

    let mut batches = Vec::new();
    for batch in reader {
        batches
            .push(batch.map_err(|e| LakeError::schema(format!("Failed to read Parquet batch: {e}")))?);
    }
    Ok(batches)
}

/// Concatenate batches that share a schema into one. `None` for no input.
pub fn concat(batches: &[RecordBatch]) -> Result<Option<RecordBatch>> {
    let Some(first) = batches.first() else {
        return Ok(None);
    };
    let schema: SchemaRef = first.schema();
    let merged = arrow::compute::concat_batches(&schema, batches)
        .map_err(|e| LakeError::schema(format!("Failed to concatenate record batches: {e}")))?;
    Ok(Some(merged))
}
