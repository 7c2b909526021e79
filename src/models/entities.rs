// ABOUTME: Record definitions for genre, person, film_work and their association tables
// ABOUTME: Each record maps one source row 1:1 onto destination columns

use super::{RawRow, Record};
use crate::error::RowError;
use chrono::{DateTime, NaiveDate, Utc};
use tokio_postgres::types::ToSql;
use uuid::Uuid;

pub const DEFAULT_RATING: f64 = 0.0;
pub const DEFAULT_FILMWORK_TYPE: &str = "movie";

#[derive(Debug, Clone, PartialEq)]
pub struct Genre {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Record for Genre {
    const TABLE: &'static str = "genre";
    const FIELDS: &'static [&'static str] =
        &["id", "name", "description", "created_at", "updated_at"];

    fn from_row(row: &RawRow) -> Result<Self, RowError> {
        Ok(Genre {
            id: row.uuid("id")?,
            name: row.text("name")?,
            description: row.nullable_text("description")?,
            created_at: row.timestamp("created_at")?,
            updated_at: row.timestamp("updated_at")?,
        })
    }

    fn id(&self) -> Uuid {
        self.id
    }

    fn params(&self) -> Vec<&(dyn ToSql + Sync)> {
        vec![
            &self.id,
            &self.name,
            &self.description,
            &self.created_at,
            &self.updated_at,
        ]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Person {
    pub id: Uuid,
    pub full_name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Record for Person {
    const TABLE: &'static str = "person";
    const FIELDS: &'static [&'static str] = &["id", "full_name", "created_at", "updated_at"];

    fn from_row(row: &RawRow) -> Result<Self, RowError> {
        Ok(Person {
            id: row.uuid("id")?,
            full_name: row.text("full_name")?,
            created_at: row.timestamp("created_at")?,
            updated_at: row.timestamp("updated_at")?,
        })
    }

    fn id(&self) -> Uuid {
        self.id
    }

    fn params(&self) -> Vec<&(dyn ToSql + Sync)> {
        vec![&self.id, &self.full_name, &self.created_at, &self.updated_at]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Filmwork {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub creation_date: Option<NaiveDate>,
    pub file_path: Option<String>,
    pub rating: f64,
    /// Stored in the `type` column
    pub kind: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Record for Filmwork {
    const TABLE: &'static str = "film_work";
    const FIELDS: &'static [&'static str] = &[
        "id",
        "title",
        "description",
        "creation_date",
        "file_path",
        "rating",
        "type",
        "created_at",
        "updated_at",
    ];

    /// Missing ids are generated here, per row; missing `rating` and `type`
    /// fall back to [`DEFAULT_RATING`] and [`DEFAULT_FILMWORK_TYPE`].
    fn from_row(row: &RawRow) -> Result<Self, RowError> {
        Ok(Filmwork {
            id: row.optional_uuid("id")?.unwrap_or_else(Uuid::new_v4),
            title: row.text("title")?,
            description: row.optional_text("description")?,
            creation_date: row.optional_date("creation_date")?,
            file_path: row.optional_text("file_path")?,
            rating: row.optional_float("rating")?.unwrap_or(DEFAULT_RATING),
            kind: row
                .optional_text("type")?
                .unwrap_or_else(|| DEFAULT_FILMWORK_TYPE.to_string()),
            created_at: row.timestamp("created_at")?,
            updated_at: row.timestamp("updated_at")?,
        })
    }

    fn id(&self) -> Uuid {
        self.id
    }

    fn params(&self) -> Vec<&(dyn ToSql + Sync)> {
        vec![
            &self.id,
            &self.title,
            &self.description,
            &self.creation_date,
            &self.file_path,
            &self.rating,
            &self.kind,
            &self.created_at,
            &self.updated_at,
        ]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GenreFilmwork {
    pub id: Uuid,
    pub film_work_id: Uuid,
    pub genre_id: Uuid,
    pub created_at: DateTime<Utc>,
}

impl Record for GenreFilmwork {
    const TABLE: &'static str = "genre_film_work";
    const FIELDS: &'static [&'static str] = &["id", "film_work_id", "genre_id", "created_at"];

    fn from_row(row: &RawRow) -> Result<Self, RowError> {
        Ok(GenreFilmwork {
            id: row.uuid("id")?,
            film_work_id: row.uuid("film_work_id")?,
            genre_id: row.uuid("genre_id")?,
            created_at: row.timestamp("created_at")?,
        })
    }

    fn id(&self) -> Uuid {
        self.id
    }

    fn params(&self) -> Vec<&(dyn ToSql + Sync)> {
        vec![&self.id, &self.film_work_id, &self.genre_id, &self.created_at]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PersonFilmwork {
    pub id: Uuid,
    pub film_work_id: Uuid,
    pub person_id: Uuid,
    pub role: String,
    pub created_at: DateTime<Utc>,
}

impl Record for PersonFilmwork {
    const TABLE: &'static str = "person_film_work";
    const FIELDS: &'static [&'static str] =
        &["id", "film_work_id", "person_id", "role", "created_at"];

    fn from_row(row: &RawRow) -> Result<Self, RowError> {
        Ok(PersonFilmwork {
            id: row.uuid("id")?,
            film_work_id: row.uuid("film_work_id")?,
            person_id: row.uuid("person_id")?,
            role: row.text("role")?,
            created_at: row.timestamp("created_at")?,
        })
    }

    fn id(&self) -> Uuid {
        self.id
    }

    fn params(&self) -> Vec<&(dyn ToSql + Sync)> {
        vec![
            &self.id,
            &self.film_work_id,
            &self.person_id,
            &self.role,
            &self.created_at,
        ]
    }
}
