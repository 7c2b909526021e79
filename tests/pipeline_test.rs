// ABOUTME: End-to-end pipeline tests from a SQLite file into an in-memory sink
// ABOUTME: Covers batching bounds, ordering, idempotent reloads and malformed rows

use rusqlite::{params, Connection};
use sqlite_to_postgres::error::EtlError;
use sqlite_to_postgres::models::{Filmwork, Genre, Record};
use sqlite_to_postgres::postgres::{self, BatchSink, LoadStats};
use sqlite_to_postgres::sqlite;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use uuid::Uuid;

const TS: &str = "2021-06-16 20:14:09.221838+00";

/// Primary-key keyed store that skips ids it already holds
struct MemorySink<R> {
    rows: BTreeMap<Uuid, R>,
    batch_sizes: Vec<usize>,
    submitted: Vec<Uuid>,
}

impl<R> MemorySink<R> {
    fn new() -> Self {
        Self {
            rows: BTreeMap::new(),
            batch_sizes: Vec::new(),
            submitted: Vec::new(),
        }
    }
}

impl<R: Record> BatchSink<R> for MemorySink<R> {
    async fn write_batch(&mut self, batch: Vec<R>) -> Result<u64, EtlError> {
        self.batch_sizes.push(batch.len());
        let mut inserted = 0;
        for record in batch {
            self.submitted.push(record.id());
            self.rows.entry(record.id()).or_insert_with(|| {
                inserted += 1;
                record
            });
        }
        Ok(inserted)
    }
}

/// Same reader-to-writer wiring the driver uses, with the sink swapped out
async fn transfer<R: Record>(
    source: &Path,
    sink: &mut MemorySink<R>,
    chunk_size: usize,
    batch_size: usize,
) -> Result<LoadStats, EtlError> {
    let records = sqlite::extract::<R>(source, R::TABLE, chunk_size);
    postgres::load(records, sink, batch_size).await
}

fn create_genre_table(dir: &TempDir) -> PathBuf {
    let path = dir.path().join("db.sqlite");
    let conn = Connection::open(&path).unwrap();
    conn.execute_batch(
        "CREATE TABLE genre (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            description TEXT,
            created_at TEXT,
            updated_at TEXT
        );",
    )
    .unwrap();
    path
}

fn insert_genres(path: &Path, ids: std::ops::RangeInclusive<u128>) {
    let mut conn = Connection::open(path).unwrap();
    let tx = conn.transaction().unwrap();
    for i in ids {
        tx.execute(
            "INSERT INTO genre VALUES (?1, ?2, ?3, ?4, ?4)",
            params![
                Uuid::from_u128(i).to_string(),
                format!("Genre {}", i),
                format!("Description {}", i),
                TS
            ],
        )
        .unwrap();
    }
    tx.commit().unwrap();
}

#[tokio::test]
async fn test_load_and_reload_genre_table() {
    let dir = TempDir::new().unwrap();
    let path = create_genre_table(&dir);
    insert_genres(&path, 1..=120);

    let mut sink = MemorySink::<Genre>::new();
    let stats = transfer::<Genre>(&path, &mut sink, 50, 50)
        .await
        .unwrap();

    assert_eq!(stats.batches, 3);
    assert_eq!(sink.batch_sizes, vec![50, 50, 20]);
    assert_eq!(stats.rows_inserted, 120);
    assert_eq!(sink.rows.len(), 120);

    // ids come out ascending and are submitted in that order
    let expected: Vec<Uuid> = (1..=120).map(Uuid::from_u128).collect();
    assert_eq!(sink.submitted, expected);

    let first_run = sink.rows.clone();
    insert_genres(&path, 121..=130);

    let stats = transfer::<Genre>(&path, &mut sink, 50, 50)
        .await
        .unwrap();

    assert_eq!(stats.batches, 3);
    assert_eq!(stats.rows_read, 130);
    assert_eq!(stats.rows_inserted, 10);
    assert_eq!(stats.rows_skipped(), 120);
    assert_eq!(sink.rows.len(), 130);
    for (id, genre) in &first_run {
        assert_eq!(sink.rows.get(id), Some(genre));
    }
}

#[tokio::test]
async fn test_loaded_rows_match_source_values() {
    let dir = TempDir::new().unwrap();
    let path = create_genre_table(&dir);
    insert_genres(&path, 1..=3);

    let mut sink = MemorySink::<Genre>::new();
    transfer::<Genre>(&path, &mut sink, 50, 50)
        .await
        .unwrap();

    let genre = &sink.rows[&Uuid::from_u128(2)];
    assert_eq!(genre.name, "Genre 2");
    assert_eq!(genre.description.as_deref(), Some("Description 2"));
    assert_eq!(
        genre.created_at.to_rfc3339(),
        "2021-06-16T20:14:09.221838+00:00"
    );
}

#[tokio::test]
async fn test_page_and_batch_sizes_are_independent() {
    let dir = TempDir::new().unwrap();
    let path = create_genre_table(&dir);
    insert_genres(&path, 1..=120);

    let mut sink = MemorySink::<Genre>::new();
    let stats = transfer::<Genre>(&path, &mut sink, 30, 50)
        .await
        .unwrap();

    assert_eq!(sink.batch_sizes, vec![50, 50, 20]);
    assert_eq!(stats.rows_inserted, 120);
}

#[tokio::test]
async fn test_malformed_timestamp_writes_nothing_from_its_chunk() {
    let dir = TempDir::new().unwrap();
    let path = create_genre_table(&dir);
    insert_genres(&path, 1..=20);

    let conn = Connection::open(&path).unwrap();
    conn.execute(
        "UPDATE genre SET created_at = '2021/06/16 20:14' WHERE id = ?1",
        params![Uuid::from_u128(5).to_string()],
    )
    .unwrap();
    drop(conn);

    let mut sink = MemorySink::<Genre>::new();
    let err = transfer::<Genre>(&path, &mut sink, 50, 50)
        .await
        .unwrap_err();

    assert!(matches!(err, EtlError::MalformedRow { .. }));
    assert!(err.to_string().contains("created_at"));
    assert!(sink.rows.is_empty());
    assert!(sink.batch_sizes.is_empty());
}

#[tokio::test]
async fn test_missing_source_table_is_source_error() {
    let dir = TempDir::new().unwrap();
    let path = create_genre_table(&dir);

    let mut sink = MemorySink::<Filmwork>::new();
    let err = transfer::<Filmwork>(&path, &mut sink, 50, 50)
        .await
        .unwrap_err();

    assert!(matches!(err, EtlError::SourceIo { .. }));
    assert!(err.to_string().contains("db.sqlite"));
}

#[tokio::test]
async fn test_film_work_defaults_fill_missing_columns() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("db.sqlite");
    let conn = Connection::open(&path).unwrap();
    conn.execute_batch(
        "CREATE TABLE film_work (
            id TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            description TEXT,
            creation_date DATE,
            rating FLOAT,
            created_at TEXT,
            updated_at TEXT
        );",
    )
    .unwrap();
    conn.execute(
        "INSERT INTO film_work VALUES (?1, 'Alien', NULL, '1979-05-25', NULL, ?2, ?2)",
        params![Uuid::from_u128(1).to_string(), TS],
    )
    .unwrap();
    drop(conn);

    let mut sink = MemorySink::<Filmwork>::new();
    transfer::<Filmwork>(&path, &mut sink, 50, 50)
        .await
        .unwrap();

    let film = &sink.rows[&Uuid::from_u128(1)];
    assert_eq!(film.rating, 0.0);
    assert_eq!(film.kind, "movie");
    assert_eq!(film.file_path, None);
    assert_eq!(film.creation_date.unwrap().to_string(), "1979-05-25");
}
