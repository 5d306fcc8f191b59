//! Attribute casting
//!
//! Casts normalize driver-provided values on read (SQLite hands back
//! strings for most things) and serialize rich values on write.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde_json::Value as JsonValue;

use crate::backends::DatabaseValue;

/// Declared cast for one attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CastType {
    Int,
    Float,
    Bool,
    String,
    Json,
    Date,
    DateTime,
    Timestamp,
}

/// Apply a declared cast to a value coming off the wire
pub fn cast_on_read(value: DatabaseValue, cast: CastType) -> DatabaseValue {
    if value.is_null() {
        return DatabaseValue::Null;
    }
    match cast {
        CastType::Int => match &value {
            DatabaseValue::Int32(_) | DatabaseValue::Int64(_) => value,
            _ => value
                .as_i64()
                .map(DatabaseValue::Int64)
                .unwrap_or(DatabaseValue::Null),
        },
        CastType::Float => match value {
            DatabaseValue::Float64(_) => value,
            DatabaseValue::Int32(i) => DatabaseValue::Float64(i as f64),
            DatabaseValue::Int64(i) => DatabaseValue::Float64(i as f64),
            DatabaseValue::String(s) => s
                .parse::<f64>()
                .map(DatabaseValue::Float64)
                .unwrap_or(DatabaseValue::Null),
            _ => DatabaseValue::Null,
        },
        CastType::Bool => match value {
            DatabaseValue::Bool(_) => value,
            DatabaseValue::Int32(i) => DatabaseValue::Bool(i != 0),
            DatabaseValue::Int64(i) => DatabaseValue::Bool(i != 0),
            DatabaseValue::String(s) => {
                DatabaseValue::Bool(matches!(s.as_str(), "1" | "true" | "t" | "yes"))
            }
            _ => DatabaseValue::Null,
        },
        CastType::String => match value {
            DatabaseValue::String(_) => value,
            other => DatabaseValue::String(
                other
                    .to_json()
                    .as_str()
                    .map(str::to_string)
                    .unwrap_or_else(|| other.to_json().to_string()),
            ),
        },
        CastType::Json => match value {
            DatabaseValue::Json(_) => value,
            DatabaseValue::String(s) => serde_json::from_str::<JsonValue>(&s)
                .map(DatabaseValue::Json)
                .unwrap_or(DatabaseValue::Null),
            _ => DatabaseValue::Null,
        },
        CastType::Date => match value {
            DatabaseValue::Date(_) => value,
            DatabaseValue::DateTime(dt) => DatabaseValue::Date(dt.date_naive()),
            DatabaseValue::String(s) => NaiveDate::parse_from_str(&s, "%Y-%m-%d")
                .map(DatabaseValue::Date)
                .unwrap_or(DatabaseValue::Null),
            _ => DatabaseValue::Null,
        },
        CastType::DateTime => match value {
            DatabaseValue::DateTime(_) => value,
            DatabaseValue::String(s) => parse_datetime(&s)
                .map(DatabaseValue::DateTime)
                .unwrap_or(DatabaseValue::Null),
            DatabaseValue::Int64(secs) => Utc
                .timestamp_opt(secs, 0)
                .single()
                .map(DatabaseValue::DateTime)
                .unwrap_or(DatabaseValue::Null),
            _ => DatabaseValue::Null,
        },
        CastType::Timestamp => match value {
            DatabaseValue::Int64(_) => value,
            DatabaseValue::Int32(i) => DatabaseValue::Int64(i as i64),
            DatabaseValue::DateTime(dt) => DatabaseValue::Int64(dt.timestamp()),
            DatabaseValue::String(s) => parse_datetime(&s)
                .map(|dt| DatabaseValue::Int64(dt.timestamp()))
                .or_else(|| s.parse::<i64>().ok().map(DatabaseValue::Int64))
                .unwrap_or(DatabaseValue::Null),
            _ => DatabaseValue::Null,
        },
    }
}

/// Serialize a value for storage. Date and datetime instances become
/// canonical strings whether or not a cast is declared for the column.
pub fn cast_for_save(value: &DatabaseValue) -> DatabaseValue {
    match value {
        DatabaseValue::DateTime(dt) => {
            DatabaseValue::String(dt.format("%Y-%m-%d %H:%M:%S").to_string())
        }
        DatabaseValue::Date(d) => DatabaseValue::String(d.format("%Y-%m-%d").to_string()),
        other => other.clone(),
    }
}

fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
        .ok()
        .map(|naive| Utc.from_utc_datetime(&naive))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn int_cast_parses_driver_strings() {
        assert_eq!(
            cast_on_read(DatabaseValue::String("42".into()), CastType::Int),
            DatabaseValue::Int64(42)
        );
        assert_eq!(
            cast_on_read(DatabaseValue::Null, CastType::Int),
            DatabaseValue::Null
        );
    }

    #[test]
    fn bool_cast_accepts_integers_and_words() {
        assert_eq!(
            cast_on_read(DatabaseValue::Int64(1), CastType::Bool),
            DatabaseValue::Bool(true)
        );
        assert_eq!(
            cast_on_read(DatabaseValue::String("false".into()), CastType::Bool),
            DatabaseValue::Bool(false)
        );
    }

    #[test]
    fn json_cast_parses_stored_text() {
        let value = cast_on_read(
            DatabaseValue::String(r#"{"a":1}"#.into()),
            CastType::Json,
        );
        assert_eq!(value, DatabaseValue::Json(serde_json::json!({"a": 1})));
    }

    #[test]
    fn datetime_cast_accepts_sql_format() {
        let value = cast_on_read(
            DatabaseValue::String("2024-06-01 12:30:00".into()),
            CastType::DateTime,
        );
        match value {
            DatabaseValue::DateTime(dt) => assert_eq!(dt.timestamp(), 1717245000),
            other => panic!("expected datetime, got {:?}", other),
        }
    }

    #[test]
    fn save_serializes_temporal_values() {
        let dt = Utc.with_ymd_and_hms(2024, 6, 1, 12, 30, 0).unwrap();
        assert_eq!(
            cast_for_save(&DatabaseValue::DateTime(dt)),
            DatabaseValue::String("2024-06-01 12:30:00".into())
        );
        let d = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        assert_eq!(
            cast_for_save(&DatabaseValue::Date(d)),
            DatabaseValue::String("2024-06-01".into())
        );
    }
}
