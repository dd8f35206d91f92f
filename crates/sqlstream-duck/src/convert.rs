//! Conversion between sqlstream values and DuckDB values

use chrono::{DateTime, NaiveDate, NaiveTime};
use duckdb::types::{TimeUnit, ToSql, ToSqlOutput, Value as DuckValue, ValueRef};
use sqlstream_ir::Value;

use crate::error::DuckError;

/// 0001-01-01 is day 1; DuckDB counts days from the Unix epoch.
const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;

/// Binds a [`Value`] to a `?` placeholder.
///
/// Temporal values are bound as ISO text and cast by DuckDB to the
/// parameter type it inferred from the column.
pub(crate) struct Param<'a>(pub &'a Value);

impl ToSql for Param<'_> {
    fn to_sql(&self) -> duckdb::Result<ToSqlOutput<'_>> {
        Ok(match self.0 {
            Value::Null => ToSqlOutput::Owned(DuckValue::Null),
            Value::Bool(b) => ToSqlOutput::Owned(DuckValue::Boolean(*b)),
            Value::Int(i) => ToSqlOutput::Owned(DuckValue::BigInt(*i)),
            Value::Float(f) => ToSqlOutput::Owned(DuckValue::Double(*f)),
            Value::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
            Value::Bytes(b) => ToSqlOutput::Borrowed(ValueRef::Blob(b)),
            Value::Date(d) => ToSqlOutput::Owned(DuckValue::Text(d.to_string())),
            Value::Time(t) => ToSqlOutput::Owned(DuckValue::Text(t.to_string())),
            Value::Timestamp(ts) => {
                ToSqlOutput::Owned(DuckValue::Text(ts.format("%Y-%m-%d %H:%M:%S%.f").to_string()))
            }
        })
    }
}

fn to_micros(unit: TimeUnit, value: i64) -> i64 {
    match unit {
        TimeUnit::Second => value.saturating_mul(1_000_000),
        TimeUnit::Millisecond => value.saturating_mul(1_000),
        TimeUnit::Microsecond => value,
        TimeUnit::Nanosecond => value / 1_000,
    }
}

/// Read one cell. `column` only names the cell in errors.
pub(crate) fn value_from_ref(value: ValueRef<'_>, column: &str) -> Result<Value, DuckError> {
    let unsupported = |type_name: &str| DuckError::UnsupportedValue {
        column: column.to_string(),
        type_name: type_name.to_string(),
    };

    let value = match value {
        ValueRef::Null => Value::Null,
        ValueRef::Boolean(b) => Value::Bool(b),
        ValueRef::TinyInt(i) => Value::Int(i64::from(i)),
        ValueRef::SmallInt(i) => Value::Int(i64::from(i)),
        ValueRef::Int(i) => Value::Int(i64::from(i)),
        ValueRef::BigInt(i) => Value::Int(i),
        ValueRef::UTinyInt(i) => Value::Int(i64::from(i)),
        ValueRef::USmallInt(i) => Value::Int(i64::from(i)),
        ValueRef::UInt(i) => Value::Int(i64::from(i)),
        // out-of-range wide integers keep their digits as text
        ValueRef::UBigInt(i) => i64::try_from(i).map_or_else(|_| Value::Text(i.to_string()), Value::Int),
        ValueRef::HugeInt(i) => i64::try_from(i).map_or_else(|_| Value::Text(i.to_string()), Value::Int),
        ValueRef::Float(f) => Value::Float(f64::from(f)),
        ValueRef::Double(f) => Value::Float(f),
        ValueRef::Decimal(d) => {
            let text = d.to_string();
            text.parse::<f64>().map_or(Value::Text(text), Value::Float)
        }
        ValueRef::Text(bytes) => Value::Text(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => Value::Bytes(bytes.to_vec()),
        ValueRef::Date32(days) => days
            .checked_add(UNIX_EPOCH_DAYS_FROM_CE)
            .and_then(NaiveDate::from_num_days_from_ce_opt)
            .map(Value::Date)
            .ok_or_else(|| unsupported("DATE"))?,
        ValueRef::Time64(unit, v) => {
            let micros = to_micros(unit, v);
            let secs = u32::try_from(micros.div_euclid(1_000_000)).map_err(|_| unsupported("TIME"))?;
            let nanos = u32::try_from(micros.rem_euclid(1_000_000) * 1_000).map_err(|_| unsupported("TIME"))?;
            NaiveTime::from_num_seconds_from_midnight_opt(secs, nanos)
                .map(Value::Time)
                .ok_or_else(|| unsupported("TIME"))?
        }
        ValueRef::Timestamp(unit, v) => DateTime::from_timestamp_micros(to_micros(unit, v))
            .map(|dt| Value::Timestamp(dt.naive_utc()))
            .ok_or_else(|| unsupported("TIMESTAMP"))?,
        other => return Err(unsupported(&format!("{:?}", other.data_type()))),
    };
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_date_from_epoch_days() {
        let value = value_from_ref(ValueRef::Date32(19_723), "d").unwrap();
        assert_eq!(value, Value::Date(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()));
    }

    #[test]
    fn test_time_units() {
        let value = value_from_ref(ValueRef::Time64(TimeUnit::Microsecond, 3_723_000_000), "t").unwrap();
        assert_eq!(value, Value::Time(NaiveTime::from_hms_opt(1, 2, 3).unwrap()));
    }

    #[test]
    fn test_wide_integers() {
        assert_eq!(value_from_ref(ValueRef::UBigInt(7), "n").unwrap(), Value::Int(7));
        assert_eq!(
            value_from_ref(ValueRef::UBigInt(u64::MAX), "n").unwrap(),
            Value::Text(u64::MAX.to_string())
        );
    }
}
