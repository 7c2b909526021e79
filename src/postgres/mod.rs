// ABOUTME: PostgreSQL destination module
// ABOUTME: Exports connection management and the batched upsert writer

pub mod connection;
pub mod writer;

pub use connection::{connect, connect_with_retry};
pub use writer::{load, load_table, BatchSink, LoadStats, PgSink, UpsertStatement};

use anyhow::{Context, Result};
use tokio_postgres::Client;

/// Count the rows of `<schema>.<table>` at the destination
pub async fn count_rows(client: &Client, schema: &str, table: &str) -> Result<u64> {
    crate::utils::validate_identifier(schema)?;
    crate::utils::validate_identifier(table)?;

    let sql = format!("SELECT COUNT(*) FROM {}.{}", schema, table);
    let row = client
        .query_one(sql.as_str(), &[])
        .await
        .with_context(|| format!("Failed to count rows in {}.{}", schema, table))?;

    let count: i64 = row.get(0);
    Ok(count as u64)
}
