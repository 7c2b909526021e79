// ABOUTME: SQLite source access for the loader
// ABOUTME: Opens read-only connections and exposes the paged table reader

pub mod reader;

pub use reader::{extract, extract_pages};

use crate::error::EtlError;
use crate::utils::validate_identifier;
use rusqlite::{Connection, OpenFlags};
use std::path::Path;

/// Open the source database read-only
///
/// The file must already exist; a missing path is reported instead of
/// silently creating an empty database. Failures are logged with the path.
pub fn open_source(path: &Path) -> Result<Connection, EtlError> {
    tracing::debug!("Opening source database {}", path.display());

    Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
    .map_err(|e| {
        tracing::error!("Failed to open connection to {}: {}", path.display(), e);
        EtlError::source_io(path, e)
    })
}

/// Count the rows of a source table
pub fn count_rows(path: &Path, table: &str) -> Result<u64, EtlError> {
    validate_identifier(table).map_err(|e| EtlError::Config(e.to_string()))?;

    let conn = open_source(path)?;
    let count: i64 = conn
        .query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| {
            row.get(0)
        })
        .map_err(|e| {
            tracing::error!(
                "Failed to count rows of '{}' in {}: {}",
                table,
                path.display(),
                e
            );
            EtlError::source_io(path, e)
        })?;

    Ok(count as u64)
}
