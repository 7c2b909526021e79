// ABOUTME: Typed record model for every table the loader copies
// ABOUTME: Defines the Record contract and the ordered table selection

pub mod entities;
pub mod row;

pub use entities::{Filmwork, Genre, GenreFilmwork, Person, PersonFilmwork};
pub use row::RawRow;

use crate::error::RowError;
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;
use tokio_postgres::types::ToSql;
use uuid::Uuid;

/// A row type that can be read from SQLite and bound into a PostgreSQL insert
///
/// `FIELDS` is the column list of the generated insert, and `params` must
/// return values in exactly that order.
pub trait Record: Sized + Send + 'static {
    /// Table name, identical on source and destination
    const TABLE: &'static str;

    /// Destination column names in binding order
    const FIELDS: &'static [&'static str];

    /// Build a record from a source row, coercing timestamps as needed
    fn from_row(row: &RawRow) -> Result<Self, RowError>;

    /// Primary key
    fn id(&self) -> Uuid;

    /// Field values in `FIELDS` order
    fn params(&self) -> Vec<&(dyn ToSql + Sync)>;
}

/// Tables the loader knows how to copy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableKind {
    Genre,
    Person,
    FilmWork,
    GenreFilmWork,
    PersonFilmWork,
}

impl TableKind {
    pub const ALL: [TableKind; 5] = [
        TableKind::Genre,
        TableKind::Person,
        TableKind::FilmWork,
        TableKind::GenreFilmWork,
        TableKind::PersonFilmWork,
    ];

    pub fn table_name(self) -> &'static str {
        match self {
            TableKind::Genre => Genre::TABLE,
            TableKind::Person => Person::TABLE,
            TableKind::FilmWork => Filmwork::TABLE,
            TableKind::GenreFilmWork => GenreFilmwork::TABLE,
            TableKind::PersonFilmWork => PersonFilmwork::TABLE,
        }
    }

    pub fn field_count(self) -> usize {
        match self {
            TableKind::Genre => Genre::FIELDS.len(),
            TableKind::Person => Person::FIELDS.len(),
            TableKind::FilmWork => Filmwork::FIELDS.len(),
            TableKind::GenreFilmWork => GenreFilmwork::FIELDS.len(),
            TableKind::PersonFilmWork => PersonFilmwork::FIELDS.len(),
        }
    }
}

impl fmt::Display for TableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table_name())
    }
}

impl FromStr for TableKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim();
        TableKind::ALL
            .into_iter()
            .find(|kind| kind.table_name() == name)
            .ok_or_else(|| {
                let known: Vec<&str> = TableKind::ALL.iter().map(|k| k.table_name()).collect();
                format!("unknown table '{}' (known: {})", name, known.join(", "))
            })
    }
}
