//! Conversion of raw `alertcity` records into canonical rows.
//!
//! The API returns loosely typed JSON objects. Field names are fixed
//! (`SE`, `data_iniSE`, `casos`, ...), but numbers may arrive as integers or
//! floats and any field may be `null`. Conversion is strict enough to reject
//! values that cannot be stored without loss, and lenient everywhere else.

use chrono::{DateTime, NaiveDate};
use serde_json::{Map, Value};

use crate::error::AppError;
use crate::models::NewWeeklyReport;

/// Rows produced from one territory's payload.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Normalized {
    pub rows: Vec<NewWeeklyReport>,
    /// Records without a period-start timestamp. Not an error.
    pub skipped: usize,
    /// Records that failed conversion and were logged.
    pub malformed: usize,
}

/// Normalizes every record of a territory payload.
///
/// Records that fail conversion are logged and dropped; they never fail the
/// territory or the batch.
pub fn normalize_records(geocode: &str, records: &[Value]) -> Normalized {
    let mut out = Normalized::default();
    for record in records {
        match normalize_record(geocode, record) {
            Ok(Some(row)) => out.rows.push(row),
            Ok(None) => out.skipped += 1,
            Err(e) => {
                tracing::warn!(geocode, error = %e, "Dropping malformed weekly record");
                out.malformed += 1;
            }
        }
    }
    out
}

/// Converts a single raw record.
///
/// # Returns
///
/// - `Ok(None)` if the record has no (or an empty) `data_iniSE`
/// - `Ok(Some(row))` on success
/// - `Err(AppError::InvalidRecord)` if any field cannot be converted
pub fn normalize_record(
    geocode: &str,
    record: &Value,
) -> Result<Option<NewWeeklyReport>, AppError> {
    let obj = record
        .as_object()
        .ok_or_else(|| AppError::InvalidRecord("record is not a JSON object".to_string()))?;

    let period_start_date = match obj.get("data_iniSE") {
        Some(value) if !is_falsy(value) => epoch_millis_to_date(value)?,
        _ => return Ok(None),
    };

    let se = obj
        .get("SE")
        .ok_or_else(|| AppError::InvalidRecord("missing SE".to_string()))
        .and_then(week_identifier)?;

    Ok(Some(NewWeeklyReport {
        geocode: geocode.to_string(),
        se,
        period_start_date,
        reported_cases: int_field(obj, "casos")?,
        estimated_cases: float_field(obj, "casos_est")?,
        estimated_cases_min: int_field(obj, "casos_est_min")?,
        estimated_cases_max: int_field(obj, "casos_est_max")?,
        alert_level: int_field(obj, "nivel")?,
        population: float_field(obj, "pop")?,
        reproduction_number: float_field(obj, "Rt")?,
    }))
}

/// JSON values that count as "absent" for the period-start field.
fn is_falsy(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
    }
}

fn epoch_millis_to_date(value: &Value) -> Result<NaiveDate, AppError> {
    let millis = match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .ok_or_else(|| AppError::InvalidRecord(format!("data_iniSE out of range: {}", n)))?,
        other => {
            return Err(AppError::InvalidRecord(format!(
                "data_iniSE is not a number: {}",
                other
            )));
        }
    };

    DateTime::from_timestamp_millis(millis)
        .map(|dt| dt.date_naive())
        .ok_or_else(|| AppError::InvalidRecord(format!("data_iniSE out of range: {}", millis)))
}

/// Parses `SE`. Accepts integers, floats (truncated) and numeric strings.
fn week_identifier(value: &Value) -> Result<i32, AppError> {
    let parsed = match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.trunc() as i64)),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    };
    parsed
        .and_then(|v| i32::try_from(v).ok())
        .ok_or_else(|| AppError::InvalidRecord(format!("non-numeric SE: {}", value)))
}

fn int_field(obj: &Map<String, Value>, key: &str) -> Result<Option<i32>, AppError> {
    match obj.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => {
            let as_int = n.as_i64().or_else(|| {
                n.as_f64()
                    .filter(|f| f.fract() == 0.0 && f.is_finite())
                    .map(|f| f as i64)
            });
            as_int
                .and_then(|v| i32::try_from(v).ok())
                .map(Some)
                .ok_or_else(|| AppError::InvalidRecord(format!("{} is not an integer: {}", key, n)))
        }
        Some(other) => Err(AppError::InvalidRecord(format!(
            "{} is not numeric: {}",
            key, other
        ))),
    }
}

fn float_field(obj: &Map<String, Value>, key: &str) -> Result<Option<f64>, AppError> {
    match obj.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n
            .as_f64()
            .map(Some)
            .ok_or_else(|| AppError::InvalidRecord(format!("{} out of range: {}", key, n))),
        Some(other) => Err(AppError::InvalidRecord(format!(
            "{} is not numeric: {}",
            key, other
        ))),
    }
}
