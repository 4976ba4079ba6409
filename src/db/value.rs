use chrono::{DateTime, NaiveDate, Utc};
use duckdb::types::{TimeUnit, Value};
use std::fmt;

// Days between 0001-01-01 and 1970-01-01
const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;

/// A single cell of a fetched row.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Null,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Null => f.write_str("NULL"),
            CellValue::Boolean(b) => write!(f, "{}", b),
            CellValue::Integer(n) => write!(f, "{}", n),
            CellValue::Float(x) => write!(f, "{}", x),
            CellValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<Value> for CellValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => CellValue::Null,
            Value::Boolean(b) => CellValue::Boolean(b),
            Value::TinyInt(n) => CellValue::Integer(n.into()),
            Value::SmallInt(n) => CellValue::Integer(n.into()),
            Value::Int(n) => CellValue::Integer(n.into()),
            Value::BigInt(n) => CellValue::Integer(n),
            // SUM over integers yields HUGEINT
            Value::HugeInt(n) => i64::try_from(n)
                .map(CellValue::Integer)
                .unwrap_or_else(|_| CellValue::Text(n.to_string())),
            Value::UTinyInt(n) => CellValue::Integer(n.into()),
            Value::USmallInt(n) => CellValue::Integer(n.into()),
            Value::UInt(n) => CellValue::Integer(n.into()),
            Value::UBigInt(n) => i64::try_from(n)
                .map(CellValue::Integer)
                .unwrap_or_else(|_| CellValue::Text(n.to_string())),
            Value::Float(x) => CellValue::Float(x.into()),
            Value::Double(x) => CellValue::Float(x),
            Value::Decimal(d) => CellValue::Text(d.to_string()),
            Value::Text(s) => CellValue::Text(s),
            Value::Date32(days) => format_date(days),
            Value::Timestamp(unit, raw) => format_timestamp(unit, raw),
            other => CellValue::Text(format!("{:?}", other)),
        }
    }
}

fn format_date(days: i32) -> CellValue {
    days.checked_add(UNIX_EPOCH_DAYS_FROM_CE)
        .and_then(NaiveDate::from_num_days_from_ce_opt)
        .map(|date| CellValue::Text(date.format("%Y-%m-%d").to_string()))
        .unwrap_or_else(|| CellValue::Text(format!("date({})", days)))
}

fn format_timestamp(unit: TimeUnit, raw: i64) -> CellValue {
    let micros = match unit {
        TimeUnit::Second => raw.checked_mul(1_000_000),
        TimeUnit::Millisecond => raw.checked_mul(1_000),
        TimeUnit::Microsecond => Some(raw),
        TimeUnit::Nanosecond => Some(raw / 1_000),
    };
    micros
        .and_then(DateTime::<Utc>::from_timestamp_micros)
        .map(|ts| CellValue::Text(ts.format("%Y-%m-%d %H:%M:%S").to_string()))
        .unwrap_or_else(|| CellValue::Text(format!("timestamp({})", raw)))
}
