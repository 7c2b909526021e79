// ABOUTME: Batched, idempotent loading of records into PostgreSQL tables
// ABOUTME: Regroups a record stream into fixed-size batches and commits each one

use crate::config::MAX_BIND_PARAMETERS;
use crate::error::EtlError;
use crate::models::Record;
use crate::utils::validate_identifier;
use futures::stream::{Stream, StreamExt};
use std::marker::PhantomData;
use tokio_postgres::types::ToSql;
use tokio_postgres::Client;

/// Insert statement for one destination table that skips existing ids
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpsertStatement {
    target: String,
    columns: Vec<String>,
}

impl UpsertStatement {
    pub fn new(schema: &str, table: &str, fields: &[&str]) -> Result<Self, EtlError> {
        for identifier in [schema, table].iter().chain(fields) {
            validate_identifier(identifier).map_err(|e| EtlError::Config(e.to_string()))?;
        }
        if !fields.contains(&"id") {
            return Err(EtlError::Config(format!(
                "table '{}' has no id column to detect conflicts on",
                table
            )));
        }

        Ok(Self {
            target: format!("{}.{}", schema, table),
            columns: fields.iter().map(|f| f.to_string()).collect(),
        })
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    /// Largest batch that stays under the bind-parameter limit
    pub fn max_rows(&self) -> usize {
        MAX_BIND_PARAMETERS / self.columns.len()
    }

    /// SQL for a batch of `rows` records, parameters numbered row by row
    ///
    /// ```
    /// # use sqlite_to_postgres::postgres::writer::UpsertStatement;
    /// let stmt = UpsertStatement::new("test", "person", &["id", "full_name"]).unwrap();
    /// assert_eq!(
    ///     stmt.sql(2),
    ///     "INSERT INTO test.person (id, full_name) VALUES ($1, $2), ($3, $4) ON CONFLICT (id) DO NOTHING"
    /// );
    /// ```
    pub fn sql(&self, rows: usize) -> String {
        let width = self.columns.len();
        let values: Vec<String> = (0..rows)
            .map(|row| {
                let placeholders: Vec<String> = (1..=width)
                    .map(|col| format!("${}", row * width + col))
                    .collect();
                format!("({})", placeholders.join(", "))
            })
            .collect();

        format!(
            "INSERT INTO {} ({}) VALUES {} ON CONFLICT (id) DO NOTHING",
            self.target,
            self.columns.join(", "),
            values.join(", ")
        )
    }
}

/// Destination for batches of records
///
/// A batch is handed over whole and must be durably committed before
/// `write_batch` returns. The result is the number of rows actually inserted;
/// rows whose id already exists are skipped.
#[allow(async_fn_in_trait)]
pub trait BatchSink<R> {
    async fn write_batch(&mut self, batch: Vec<R>) -> Result<u64, EtlError>;
}

/// Counters for one table's load
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadStats {
    pub batches: u64,
    pub rows_read: u64,
    pub rows_inserted: u64,
}

impl LoadStats {
    /// Rows skipped because their id already existed at the destination
    pub fn rows_skipped(&self) -> u64 {
        self.rows_read.saturating_sub(self.rows_inserted)
    }
}

/// Drain `records` into `sink`, `batch_size` records at a time
///
/// Each batch is committed before the next one is assembled, so a failure
/// leaves every earlier batch in place. An error item in the stream aborts the
/// load before the batch containing it is written.
pub async fn load<R, S, K>(records: S, sink: &mut K, batch_size: usize) -> Result<LoadStats, EtlError>
where
    S: Stream<Item = Result<R, EtlError>>,
    K: BatchSink<R>,
{
    if batch_size == 0 {
        return Err(EtlError::Config(
            "batch size must be greater than zero".to_string(),
        ));
    }

    let mut batches = std::pin::pin!(records.chunks(batch_size));
    let mut stats = LoadStats::default();

    while let Some(chunk) = batches.next().await {
        let batch = chunk.into_iter().collect::<Result<Vec<R>, EtlError>>()?;
        let rows = batch.len() as u64;

        let inserted = sink.write_batch(batch).await?;

        stats.batches += 1;
        stats.rows_read += rows;
        stats.rows_inserted += inserted;
        tracing::debug!(
            "Committed batch {} ({} rows, {} new)",
            stats.batches,
            rows,
            inserted
        );
    }

    Ok(stats)
}

/// [`BatchSink`] that runs one multi-row upsert per batch in its own transaction
pub struct PgSink<'a, R> {
    client: &'a mut Client,
    statement: UpsertStatement,
    table: String,
    _record: PhantomData<fn() -> R>,
}

impl<'a, R: Record> PgSink<'a, R> {
    pub fn new(client: &'a mut Client, schema: &str, table: &str) -> Result<Self, EtlError> {
        Ok(Self {
            client,
            statement: UpsertStatement::new(schema, table, R::FIELDS)?,
            table: table.to_string(),
            _record: PhantomData,
        })
    }
}

impl<R: Record> BatchSink<R> for PgSink<'_, R> {
    async fn write_batch(&mut self, batch: Vec<R>) -> Result<u64, EtlError> {
        if batch.is_empty() {
            return Ok(0);
        }
        if batch.len() > self.statement.max_rows() {
            return Err(EtlError::Config(format!(
                "batch of {} rows exceeds the {} row limit for {}",
                batch.len(),
                self.statement.max_rows(),
                self.statement.target()
            )));
        }

        let sql = self.statement.sql(batch.len());
        let params: Vec<&(dyn ToSql + Sync)> = batch.iter().flat_map(|r| r.params()).collect();
        let table = self.table.as_str();
        let dest_err = |e: tokio_postgres::Error| {
            tracing::error!("Failed to write batch to '{}': {}", table, e);
            EtlError::destination_io(table, e)
        };

        let tx = self.client.transaction().await.map_err(dest_err)?;
        let inserted = tx.execute(sql.as_str(), &params).await.map_err(dest_err)?;
        tx.commit().await.map_err(dest_err)?;

        Ok(inserted)
    }
}

/// Load a record stream into `<schema>.<table>` over an open connection
pub async fn load_table<R, S>(
    client: &mut Client,
    records: S,
    schema: &str,
    table: &str,
    batch_size: usize,
) -> Result<LoadStats, EtlError>
where
    R: Record,
    S: Stream<Item = Result<R, EtlError>>,
{
    let mut sink = PgSink::<R>::new(client, schema, table)?;
    load(records, &mut sink, batch_size).await
}
