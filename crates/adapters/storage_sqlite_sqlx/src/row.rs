//! Column decoding helpers shared by the row wrappers.

use std::collections::BTreeMap;
use std::str::FromStr;

use serde::de::DeserializeOwned;
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use certflow_domain::time::Timestamp;
use certflow_domain::value::FieldValue;

fn decode_error(err: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> sqlx::Error {
    sqlx::Error::Decode(err.into())
}

/// Read an RFC 3339 text column.
pub(crate) fn timestamp(row: &SqliteRow, column: &str) -> Result<Timestamp, sqlx::Error> {
    let text: String = row.try_get(column)?;
    chrono::DateTime::parse_from_rfc3339(&text)
        .map(|dt| dt.to_utc())
        .map_err(decode_error)
}

/// Read a JSON text column.
pub(crate) fn json<T: DeserializeOwned>(row: &SqliteRow, column: &str) -> Result<T, sqlx::Error> {
    let text: String = row.try_get(column)?;
    serde_json::from_str(&text).map_err(decode_error)
}

/// Read a text column through [`FromStr`].
pub(crate) fn parsed<T>(row: &SqliteRow, column: &str) -> Result<T, sqlx::Error>
where
    T: FromStr,
    T::Err: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let text: String = row.try_get(column)?;
    text.parse().map_err(decode_error)
}

/// Read a nullable text column through [`FromStr`].
pub(crate) fn parsed_opt<T>(row: &SqliteRow, column: &str) -> Result<Option<T>, sqlx::Error>
where
    T: FromStr,
    T::Err: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let text: Option<String> = row.try_get(column)?;
    text.map(|text| text.parse().map_err(decode_error))
        .transpose()
}

/// Read a non-negative integer column.
pub(crate) fn count(row: &SqliteRow, column: &str) -> Result<u64, sqlx::Error> {
    let value: i64 = row.try_get(column)?;
    u64::try_from(value).map_err(decode_error)
}

pub(crate) type Attributes = BTreeMap<String, FieldValue>;

/// Encode a value as a JSON text column.
pub(crate) fn to_json<T: serde::Serialize>(value: &T) -> Result<String, serde_json::Error> {
    serde_json::to_string(value)
}

/// Clamp a counter into an `SQLite` integer.
pub(crate) fn to_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}
