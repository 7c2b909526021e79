// ABOUTME: Error types shared by the reader, writer and record model
// ABOUTME: Distinguishes malformed rows from source and destination store failures

use std::path::PathBuf;
use thiserror::Error;

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Why a single source row could not be mapped into a record
#[derive(Debug, Error)]
pub enum RowError {
    #[error("missing field '{0}'")]
    MissingField(String),

    #[error("field '{field}' is {found}, expected {expected}")]
    UnexpectedType {
        field: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("field '{field}' has unparseable timestamp '{value}': {reason}")]
    Timestamp {
        field: String,
        value: String,
        reason: String,
    },

    #[error("field '{field}' has unparseable date '{value}': {source}")]
    Date {
        field: String,
        value: String,
        #[source]
        source: chrono::ParseError,
    },

    #[error("field '{field}' has invalid UUID '{value}': {source}")]
    Uuid {
        field: String,
        value: String,
        #[source]
        source: uuid::Error,
    },
}

#[derive(Debug, Error)]
pub enum EtlError {
    /// A source row failed to map to its record type
    #[error("malformed row in table '{table}': {source}")]
    MalformedRow {
        table: String,
        #[source]
        source: RowError,
    },

    /// Opening or reading the SQLite source failed
    #[error("source database {}: {source}", path.display())]
    SourceIo {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Connecting to or writing the PostgreSQL destination failed
    #[error("destination table '{table}': {source}")]
    DestinationIo {
        table: String,
        #[source]
        source: BoxError,
    },

    /// The background scan of a source table stopped before finishing
    #[error("scan of table '{table}' aborted: {source}")]
    ScanAborted {
        table: String,
        #[source]
        source: tokio::task::JoinError,
    },

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl EtlError {
    pub fn malformed(table: impl Into<String>, source: RowError) -> Self {
        EtlError::MalformedRow {
            table: table.into(),
            source,
        }
    }

    pub fn source_io(path: impl Into<PathBuf>, source: rusqlite::Error) -> Self {
        EtlError::SourceIo {
            path: path.into(),
            source,
        }
    }

    /// `source` is a driver error, or the connection-open error chain
    pub fn destination_io(table: impl Into<String>, source: impl Into<BoxError>) -> Self {
        EtlError::DestinationIo {
            table: table.into(),
            source: source.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_malformed_row_message_names_table_and_field() {
        let err = EtlError::malformed("genre", RowError::MissingField("name".to_string()));
        let msg = err.to_string();
        assert!(msg.contains("genre"));
        assert!(msg.contains("missing field 'name'"));
    }

    #[test]
    fn test_source_io_message_includes_path() {
        let err = EtlError::source_io(
            "/data/db.sqlite",
            rusqlite::Error::InvalidQuery,
        );
        assert!(err.to_string().contains("/data/db.sqlite"));
    }

    #[test]
    fn test_connection_failure_is_destination_error_for_table() {
        let cause = anyhow::anyhow!("Connection refused (os error 111)")
            .context("Failed to connect to localhost:5432/postgres after retries");
        let err = EtlError::destination_io("person", cause);

        assert!(matches!(err, EtlError::DestinationIo { ref table, .. } if table == "person"));
        assert!(err.to_string().contains("after retries"));

        let root = std::error::Error::source(&err)
            .and_then(std::error::Error::source)
            .map(|e| e.to_string());
        assert_eq!(root.as_deref(), Some("Connection refused (os error 111)"));
    }
}
