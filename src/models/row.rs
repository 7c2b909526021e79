// ABOUTME: Loosely-typed source row and the coercions records are built with
// ABOUTME: Maps column names to raw SQLite values and parses timestamps, dates and UUIDs

use crate::error::RowError;
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::types::Value;
use std::collections::HashMap;
use uuid::Uuid;

/// Fixed pattern source timestamps are stored in, once the UTC offset is completed.
///
/// Source values look like `2021-06-16 20:14:09.221838+00`; the two-digit
/// offset is padded to `+0000` before parsing. chrono treats `%.f` as
/// optional, so [`parse_timestamp`] checks the fraction separately.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f%z";

/// Digits allowed after the seconds' decimal point
const MAX_FRACTION_DIGITS: usize = 6;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// One row of a source table, keyed by column name
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRow {
    values: HashMap<String, Value>,
}

impl RawRow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert, mostly used by tests
    pub fn with(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(column.into(), value.into());
        self
    }

    /// Capture a SQLite result row using the statement's column names
    pub fn from_sqlite(columns: &[String], row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        let mut values = HashMap::with_capacity(columns.len());
        for (idx, name) in columns.iter().enumerate() {
            values.insert(name.clone(), row.get::<_, Value>(idx)?);
        }
        Ok(Self { values })
    }

    fn required(&self, column: &str) -> Result<&Value, RowError> {
        self.values
            .get(column)
            .ok_or_else(|| RowError::MissingField(column.to_string()))
    }

    /// Value of a column that must be present; SQL NULL maps to `None`
    fn nullable(&self, column: &str) -> Result<Option<&Value>, RowError> {
        match self.required(column)? {
            Value::Null => Ok(None),
            value => Ok(Some(value)),
        }
    }

    /// Value of a column that may be absent altogether
    fn optional(&self, column: &str) -> Option<&Value> {
        match self.values.get(column) {
            None | Some(Value::Null) => None,
            Some(value) => Some(value),
        }
    }

    pub fn text(&self, column: &str) -> Result<String, RowError> {
        match self.nullable(column)? {
            Some(value) => as_text(column, value).map(str::to_string),
            None => Err(unexpected(column, "text", &Value::Null)),
        }
    }

    pub fn nullable_text(&self, column: &str) -> Result<Option<String>, RowError> {
        self.nullable(column)?
            .map(|value| as_text(column, value).map(str::to_string))
            .transpose()
    }

    pub fn optional_text(&self, column: &str) -> Result<Option<String>, RowError> {
        self.optional(column)
            .map(|value| as_text(column, value).map(str::to_string))
            .transpose()
    }

    pub fn uuid(&self, column: &str) -> Result<Uuid, RowError> {
        match self.nullable(column)? {
            Some(value) => to_uuid(column, value),
            None => Err(unexpected(column, "UUID", &Value::Null)),
        }
    }

    pub fn optional_uuid(&self, column: &str) -> Result<Option<Uuid>, RowError> {
        self.optional(column)
            .map(|value| to_uuid(column, value))
            .transpose()
    }

    pub fn timestamp(&self, column: &str) -> Result<DateTime<Utc>, RowError> {
        match self.nullable(column)? {
            Some(value) => parse_timestamp(column, as_text(column, value)?),
            None => Err(unexpected(column, "timestamp", &Value::Null)),
        }
    }

    pub fn optional_date(&self, column: &str) -> Result<Option<NaiveDate>, RowError> {
        self.optional(column)
            .map(|value| {
                let raw = as_text(column, value)?;
                NaiveDate::parse_from_str(raw, DATE_FORMAT).map_err(|source| RowError::Date {
                    field: column.to_string(),
                    value: raw.to_string(),
                    source,
                })
            })
            .transpose()
    }

    pub fn optional_float(&self, column: &str) -> Result<Option<f64>, RowError> {
        match self.optional(column) {
            None => Ok(None),
            Some(Value::Real(f)) => Ok(Some(*f)),
            Some(Value::Integer(i)) => Ok(Some(*i as f64)),
            Some(other) => Err(unexpected(column, "number", other)),
        }
    }
}

impl FromIterator<(String, Value)> for RawRow {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

/// Parse a source timestamp string into a UTC timestamp
///
/// The source keeps a truncated `+00` offset, so the minutes are appended
/// before parsing against [`TIMESTAMP_FORMAT`]. The seconds must carry a
/// fraction of 1 to 6 digits, which is kept at full precision.
///
/// # Examples
///
/// ```
/// # use sqlite_to_postgres::models::row::parse_timestamp;
/// use chrono::Timelike;
/// let ts = parse_timestamp("created_at", "2021-06-16 20:14:09.221838+00").unwrap();
/// assert_eq!(ts.nanosecond(), 221_838_000);
/// ```
pub fn parse_timestamp(field: &str, raw: &str) -> Result<DateTime<Utc>, RowError> {
    let invalid = |reason: String| RowError::Timestamp {
        field: field.to_string(),
        value: raw.to_string(),
        reason,
    };

    let digits = fraction_digits(raw);
    if !(1..=MAX_FRACTION_DIGITS).contains(&digits) {
        return Err(invalid(format!(
            "expected 1 to {} fractional second digits, found {}",
            MAX_FRACTION_DIGITS, digits
        )));
    }

    let padded = format!("{}00", raw);
    DateTime::parse_from_str(&padded, TIMESTAMP_FORMAT)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| invalid(e.to_string()))
}

/// Digits following the seconds field's decimal point, 0 when there is none
fn fraction_digits(raw: &str) -> usize {
    raw.rsplit_once(':')
        .and_then(|(_, seconds)| seconds.split_once('.'))
        .map(|(_, fraction)| fraction.bytes().take_while(u8::is_ascii_digit).count())
        .unwrap_or(0)
}

fn as_text<'a>(column: &str, value: &'a Value) -> Result<&'a str, RowError> {
    match value {
        Value::Text(s) => Ok(s.as_str()),
        other => Err(unexpected(column, "text", other)),
    }
}

fn to_uuid(column: &str, value: &Value) -> Result<Uuid, RowError> {
    match value {
        Value::Text(s) => Uuid::parse_str(s).map_err(|source| RowError::Uuid {
            field: column.to_string(),
            value: s.clone(),
            source,
        }),
        Value::Blob(bytes) => Uuid::from_slice(bytes).map_err(|source| RowError::Uuid {
            field: column.to_string(),
            value: format!("<{} byte blob>", bytes.len()),
            source,
        }),
        other => Err(unexpected(column, "UUID", other)),
    }
}

fn unexpected(column: &str, expected: &'static str, found: &Value) -> RowError {
    RowError::UnexpectedType {
        field: column.to_string(),
        expected,
        found: type_name(found),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "NULL",
        Value::Integer(_) => "integer",
        Value::Real(_) => "real",
        Value::Text(_) => "text",
        Value::Blob(_) => "blob",
    }
}
