//! The normalized daily-price record and its quality gate.
//!
//! [`DailyPrice`] is one validated, schema-cast row of the silver
//! `daily_prices` table. [`extract_daily_prices`] pulls typed rows out of
//! a raw bronze batch, collecting one failure description per row that
//! violates the gate; the caller aborts the whole partition if any row
//! fails.

use std::sync::Arc;

use arrow::array::{
    Array, ArrayRef, Date32Array, Float64Array, Int64Array, StringArray,
};
use arrow::compute::cast;
use arrow::datatypes::{DataType, Date32Type, Field, Schema};
use arrow::record_batch::RecordBatch;
use chrono::NaiveDate;

use ticklake_core::error::LakeError;
use ticklake_core::types::DATE_FORMAT;
use ticklake_core::Result;

/// One validated row of the `daily_prices` table.
#[derive(Clone, Debug, PartialEq)]
pub struct DailyPrice {
    /// Instrument code.
    pub code: String,
    /// Trading date.
    pub date: NaiveDate,
    /// Opening price.
    pub open: f64,
    /// Intraday high.
    pub high: f64,
    /// Intraday low.
    pub low: f64,
    /// Closing price.
    pub close: f64,
    /// Traded volume.
    pub volume: i64,
    /// Traded value, when the feed provides it.
    pub turnover_value: Option<f64>,
    /// Corporate-action multiplier; 1.0 when the feed omits it.
    pub adjustment_factor: f64,
    /// Derived: `close * adjustment_factor`.
    pub adjusted_close: f64,
}

/// Source column names in raw `daily_quotes` batches.
const SRC_CODE: &str = "Code";
const SRC_DATE: &str = "Date";
const SRC_OPEN: &str = "Open";
const SRC_HIGH: &str = "High";
const SRC_LOW: &str = "Low";
const SRC_CLOSE: &str = "Close";
const SRC_VOLUME: &str = "Volume";
const SRC_TURNOVER: &str = "TurnoverValue";
const SRC_ADJ_FACTOR: &str = "AdjustmentFactor";

/// A raw column cast to `Utf8`, or `None` if the batch lacks it.
fn utf8_column(batch: &RecordBatch, name: &str) -> Result<Option<StringArray>> {
    let Some(column) = batch.column_by_name(name) else {
        return Ok(None);
    };
    let casted = cast(column, &DataType::Utf8)
        .map_err(|e| LakeError::schema(format!("Cannot cast column '{name}' to string: {e}")))?;
    Ok(Some(
        casted
            .as_any()
            .downcast_ref::<StringArray>()
            .expect("cast to Utf8 yields StringArray")
            .clone(),
    ))
}

/// A raw column cast to `Float64`, or `None` if the batch lacks it.
/// Unparseable values surface as nulls and are caught by the row gate.
fn f64_column(batch: &RecordBatch, name: &str) -> Result<Option<Float64Array>> {
    let Some(column) = batch.column_by_name(name) else {
        return Ok(None);
    };
    let casted = cast(column, &DataType::Float64)
        .map_err(|e| LakeError::schema(format!("Cannot cast column '{name}' to float: {e}")))?;
    Ok(Some(
        casted
            .as_any()
            .downcast_ref::<Float64Array>()
            .expect("cast to Float64 yields Float64Array")
            .clone(),
    ))
}

fn opt_value(array: &Option<Float64Array>, row: usize) -> Option<f64> {
    array.as_ref().and_then(|a| a.is_valid(row).then(|| a.value(row)))
}

/// Extract and validate typed rows from a raw `daily_quotes` batch.
///
/// Returns the rows that passed alongside one description per offending
/// row. Rows whose `Date` column is null or missing inherit
/// `partition_date`. Structural problems that no row can recover from
/// (a missing required column) produce a single failure entry.
pub fn extract_daily_prices(
    batch: &RecordBatch,
    partition_date: NaiveDate,
) -> Result<(Vec<DailyPrice>, Vec<String>)> {
    let mut failures = Vec::new();
    for required in [SRC_CODE, SRC_OPEN, SRC_HIGH, SRC_LOW, SRC_CLOSE, SRC_VOLUME] {
        if batch.column_by_name(required).is_none() {
            failures.push(format!("missing required column '{required}'"));
        }
    }
    if !failures.is_empty() {
        return Ok((Vec::new(), failures));
    }

    let codes = utf8_column(batch, SRC_CODE)?.expect("required column present");
    let dates = utf8_column(batch, SRC_DATE)?;
    let opens = f64_column(batch, SRC_OPEN)?;
    let highs = f64_column(batch, SRC_HIGH)?;
    let lows = f64_column(batch, SRC_LOW)?;
    let closes = f64_column(batch, SRC_CLOSE)?;
    let volumes = f64_column(batch, SRC_VOLUME)?;
    let turnovers = f64_column(batch, SRC_TURNOVER)?;
    let factors = f64_column(batch, SRC_ADJ_FACTOR)?;

    let mut rows = Vec::with_capacity(batch.num_rows());
    for i in 0..batch.num_rows() {
        let code = codes
            .is_valid(i)
            .then(|| codes.value(i).to_string())
            .filter(|c| !c.is_empty());
        let label = code.clone().unwrap_or_else(|| "?".into());
        let mut fail = |reason: &str| failures.push(format!("row {i} (code {label}): {reason}"));

        let Some(code) = code else {
            fail("null code");
            continue;
        };

        let date = match &dates {
            Some(col) if col.is_valid(i) => {
                match NaiveDate::parse_from_str(col.value(i), DATE_FORMAT) {
                    Ok(date) => date,
                    Err(_) => {
                        fail(&format!("unparseable date '{}'", col.value(i)));
                        continue;
                    }
                }
            }
            _ => partition_date,
        };

        let (open, high, low, close) = match (
            opt_value(&opens, i),
            opt_value(&highs, i),
            opt_value(&lows, i),
            opt_value(&closes, i),
        ) {
            (Some(o), Some(h), Some(l), Some(c)) => (o, h, l, c),
            _ => {
                fail("null price field");
                continue;
            }
        };
        let Some(volume) = opt_value(&volumes, i) else {
            fail("null volume");
            continue;
        };

        if open <= 0.0 || high <= 0.0 || low <= 0.0 || close <= 0.0 {
            fail("non-positive price");
            continue;
        }
        if high < low {
            fail("high < low");
            continue;
        }
        if open < low || open > high {
            fail("open outside [low, high]");
            continue;
        }
        if close < low || close > high {
            fail("close outside [low, high]");
            continue;
        }
        if volume < 0.0 {
            fail("negative volume");
            continue;
        }

        let adjustment_factor = opt_value(&factors, i).unwrap_or(1.0);
        let close_adj = close * adjustment_factor;
        rows.push(DailyPrice {
            code,
            date,
            open,
            high,
            low,
            close,
            volume: volume as i64,
            turnover_value: opt_value(&turnovers, i),
            adjustment_factor,
            adjusted_close: close_adj,
        });
    }

    Ok((rows, failures))
}

/// The Arrow schema of a committed `daily_prices` partition.
fn daily_prices_schema() -> Schema {
    Schema::new(vec![
        Field::new("code", DataType::Utf8, false),
        Field::new("date", DataType::Date32, false),
        Field::new("open", DataType::Float64, false),
        Field::new("high", DataType::Float64, false),
        Field::new("low", DataType::Float64, false),
        Field::new("close", DataType::Float64, false),
        Field::new("volume", DataType::Int64, false),
        Field::new("turnover_value", DataType::Float64, true),
        Field::new("adjustment_factor", DataType::Float64, false),
        Field::new("adjusted_close", DataType::Float64, false),
    ])
}

/// Build the columnar form of a set of validated rows.
pub fn daily_prices_to_batch(rows: &[DailyPrice]) -> Result<RecordBatch> {
    let columns: Vec<ArrayRef> = vec![
        Arc::new(StringArray::from(
            rows.iter().map(|r| r.code.as_str()).collect::<Vec<_>>(),
        )),
        Arc::new(Date32Array::from(
            rows.iter()
                .map(|r| Date32Type::from_naive_date(r.date))
                .collect::<Vec<_>>(),
        )),
        Arc::new(Float64Array::from(
            rows.iter().map(|r| r.open).collect::<Vec<_>>(),
        )),
        Arc::new(Float64Array::from(
            rows.iter().map(|r| r.high).collect::<Vec<_>>(),
        )),
        Arc::new(Float64Array::from(
            rows.iter().map(|r| r.low).collect::<Vec<_>>(),
        )),
        Arc::new(Float64Array::from(
            rows.iter().map(|r| r.close).collect::<Vec<_>>(),
        )),
        Arc::new(Int64Array::from(
            rows.iter().map(|r| r.volume).collect::<Vec<_>>(),
        )),
        Arc::new(Float64Array::from(
            rows.iter().map(|r| r.turnover_value).collect::<Vec<_>>(),
        )),
        Arc::new(Float64Array::from(
            rows.iter().map(|r| r.adjustment_factor).collect::<Vec<_>>(),
        )),
        Arc::new(Float64Array::from(
            rows.iter().map(|r| r.adjusted_close).collect::<Vec<_>>(),
        )),
    ];

    RecordBatch::try_new(Arc::new(daily_prices_schema()), columns)
        .map_err(|e| LakeError::schema(format!("Failed to build daily_prices batch: {e}")))
}

/// Decode a committed `daily_prices` batch back into typed rows.
pub fn daily_prices_from_batch(batch: &RecordBatch) -> Result<Vec<DailyPrice>> {
    fn col<'a, T: 'static>(batch: &'a RecordBatch, name: &str) -> Result<&'a T> {
        batch
            .column_by_name(name)
            .and_then(|c| c.as_any().downcast_ref::<T>())
            .ok_or_else(|| {
                LakeError::schema(format!("daily_prices partition missing column '{name}'"))
            })
    }

    let codes: &StringArray = col(batch, "code")?;
    let dates: &Date32Array = col(batch, "date")?;
    let opens: &Float64Array = col(batch, "open")?;
    let highs: &Float64Array = col(batch, "high")?;
    let lows: &Float64Array = col(batch, "low")?;
    let closes: &Float64Array = col(batch, "close")?;
    let volumes: &Int64Array = col(batch, "volume")?;
    let turnovers: &Float64Array = col(batch, "turnover_value")?;
    let factors: &Float64Array = col(batch, "adjustment_factor")?;
    let adjusted: &Float64Array = col(batch, "adjusted_close")?;

    let mut rows = Vec::with_capacity(batch.num_rows());
    for i in 0..batch.num_rows() {
        rows.push(DailyPrice {
            code: codes.value(i).to_string(),
            date: Date32Type::to_naive_date(dates.value(i)),
            open: opens.value(i),
            high: highs.value(i),
            low: lows.value(i),
            close: closes.value(i),
            volume: volumes.value(i),
            turnover_value: turnovers.is_valid(i).then(|| turnovers.value(i)),
            adjustment_factor: factors.value(i),
            adjusted_close: adjusted.value(i),
        });
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::rows_to_batch;
    use serde_json::json;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn quote(code: &str, open: f64, high: f64, low: f64, close: f64) -> serde_json::Value {
        json!({
            "Code": code,
            "Date": "2024-01-15",
            "Open": open,
            "High": high,
            "Low": low,
            "Close": close,
            "Volume": 1000,
            "AdjustmentFactor": 1.0,
        })
    }

    #[test]
    fn test_extract_valid_rows() {
        let batch = rows_to_batch(&[
            quote("A", 95.0, 105.0, 90.0, 100.0),
            quote("B", 95.0, 105.0, 90.0, 100.0),
        ])
        .unwrap();
        let (rows, failures) = extract_daily_prices(&batch, date("2024-01-15")).unwrap();
        assert!(failures.is_empty());
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].code, "A");
        assert_eq!(rows[0].date, date("2024-01-15"));
        assert_eq!(rows[0].adjusted_close, 100.0);
    }

    #[test]
    fn test_extract_flags_high_below_low() {
        let batch = rows_to_batch(&[quote("C", 95.0, 90.0, 105.0, 100.0)]).unwrap();
        let (rows, failures) = extract_daily_prices(&batch, date("2024-01-15")).unwrap();
        assert!(rows.is_empty());
        assert_eq!(failures.len(), 1);
        assert!(failures[0].contains("high < low"));
        assert!(failures[0].contains("code C"));
    }

    #[test]
    fn test_extract_flags_non_positive_price() {
        let batch = rows_to_batch(&[quote("D", -1.0, 105.0, 90.0, 100.0)]).unwrap();
        let (_, failures) = extract_daily_prices(&batch, date("2024-01-15")).unwrap();
        assert_eq!(failures.len(), 1);
        assert!(failures[0].contains("non-positive price"));
    }

    #[test]
    fn test_extract_flags_close_outside_range() {
        let batch = rows_to_batch(&[quote("E", 95.0, 105.0, 90.0, 110.0)]).unwrap();
        let (_, failures) = extract_daily_prices(&batch, date("2024-01-15")).unwrap();
        assert!(failures[0].contains("close outside"));
    }

    #[test]
    fn test_extract_flags_null_required_field() {
        let mut row = quote("F", 95.0, 105.0, 90.0, 100.0);
        row["Close"] = serde_json::Value::Null;
        // A second, valid row keeps the column in the inferred schema.
        let batch = rows_to_batch(&[row, quote("G", 95.0, 105.0, 90.0, 100.0)]).unwrap();
        let (rows, failures) = extract_daily_prices(&batch, date("2024-01-15")).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(failures.len(), 1);
        assert!(failures[0].contains("null price field"));
    }

    #[test]
    fn test_extract_missing_required_column() {
        let batch = rows_to_batch(&[json!({"Code": "H", "Close": 100.0})]).unwrap();
        let (rows, failures) = extract_daily_prices(&batch, date("2024-01-15")).unwrap();
        assert!(rows.is_empty());
        assert!(failures.iter().any(|f| f.contains("'Open'")));
    }

    #[test]
    fn test_extract_defaults_adjustment_factor() {
        let row = json!({
            "Code": "I",
            "Open": 95.0, "High": 105.0, "Low": 90.0, "Close": 100.0,
            "Volume": 10,
        });
        let batch = rows_to_batch(&[row]).unwrap();
        let (rows, failures) = extract_daily_prices(&batch, date("2024-01-15")).unwrap();
        assert!(failures.is_empty());
        assert_eq!(rows[0].adjustment_factor, 1.0);
        assert_eq!(rows[0].adjusted_close, 100.0);
        // No Date column: the partition date is inherited.
        assert_eq!(rows[0].date, date("2024-01-15"));
    }

    #[test]
    fn test_extract_applies_adjustment_factor() {
        let mut row = quote("J", 95.0, 105.0, 90.0, 100.0);
        row["AdjustmentFactor"] = json!(0.5);
        let batch = rows_to_batch(&[row]).unwrap();
        let (rows, _) = extract_daily_prices(&batch, date("2024-01-15")).unwrap();
        assert_eq!(rows[0].adjusted_close, 50.0);
    }

    #[test]
    fn test_batch_roundtrip() {
        let rows = vec![
            DailyPrice {
                code: "A".into(),
                date: date("2024-01-15"),
                open: 95.0,
                high: 105.0,
                low: 90.0,
                close: 100.0,
                volume: 1000,
                turnover_value: Some(100_000.0),
                adjustment_factor: 1.0,
                adjusted_close: 100.0,
            },
            DailyPrice {
                code: "B".into(),
                date: date("2024-01-16"),
                open: 10.0,
                high: 12.0,
                low: 9.0,
                close: 11.0,
                volume: 50,
                turnover_value: None,
                adjustment_factor: 2.0,
                adjusted_close: 22.0,
            },
        ];
        let batch = daily_prices_to_batch(&rows).unwrap();
        assert_eq!(daily_prices_from_batch(&batch).unwrap(), rows);
    }
}
