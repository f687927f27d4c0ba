use async_trait::async_trait;
use chrono::{DateTime, Datelike, Utc};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use sqlx::{FromRow, PgPool, Row};

use crate::database::manager::{with_deadline, DatabaseError, QUERY_TIMEOUT};
use crate::database::versioned::{ConditionalUpdate, Versioned};
use crate::filter::{Filters, Metadata};
use crate::validator::{unique, Validator};

/// Running time in minutes. Travels over JSON as `"<n> mins"`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, sqlx::Type)]
#[sqlx(transparent)]
pub struct Runtime(pub i32);

impl Serialize for Runtime {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("{} mins", self.0))
    }
}

impl<'de> Deserialize<'de> for Runtime {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.split_once(' ')
            .filter(|(_, unit)| *unit == "mins")
            .and_then(|(n, _)| n.parse::<i32>().ok())
            .map(Runtime)
            .ok_or_else(|| de::Error::custom("invalid runtime format"))
    }
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Movie {
    pub id: i64,
    #[serde(skip)]
    pub created_at: DateTime<Utc>,
    pub title: String,
    #[serde(skip_serializing_if = "is_zero_year")]
    pub year: i32,
    #[serde(skip_serializing_if = "is_zero_runtime")]
    pub runtime: Runtime,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub genres: Vec<String>,
    pub version: i32,
}

fn is_zero_year(year: &i32) -> bool {
    *year == 0
}

fn is_zero_runtime(runtime: &Runtime) -> bool {
    runtime.0 == 0
}

impl Movie {
    pub fn new(title: String, year: i32, runtime: Runtime, genres: Vec<String>) -> Self {
        Self {
            id: 0,
            created_at: Utc::now(),
            title,
            year,
            runtime,
            genres,
            version: 0,
        }
    }

    pub fn validate(&self, v: &mut Validator) {
        v.check(!self.title.is_empty(), "title", "must be provided");
        v.check(self.title.len() <= 500, "title", "must not be more than 500 bytes long");

        v.check(self.year != 0, "year", "must be provided");
        v.check(self.year >= 1888, "year", "must be greater than 1888");
        v.check(self.year <= Utc::now().year(), "year", "must not be in the future");

        v.check(self.runtime.0 != 0, "runtime", "must be provided");
        v.check(self.runtime.0 > 0, "runtime", "must be a positive integer");

        v.check(!self.genres.is_empty(), "genres", "must contain at least 1 genre");
        v.check(self.genres.len() <= 5, "genres", "must not contain more than 5 genres");
        v.check(unique(&self.genres), "genres", "must not contain duplicate values");
    }
}

impl Versioned for Movie {
    fn id(&self) -> i64 {
        self.id
    }

    fn version(&self) -> i32 {
        self.version
    }

    fn set_version(&mut self, version: i32) {
        self.version = version;
    }
}

pub const MOVIE_SORT_SAFELIST: &[&str] = &[
    "id", "title", "year", "runtime", "-id", "-title", "-year", "-runtime",
];

#[derive(Clone)]
pub struct MovieModel {
    pool: PgPool,
}

impl MovieModel {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn insert(&self, movie: &mut Movie) -> Result<(), DatabaseError> {
        let query = r#"
            INSERT INTO movies (title, year, runtime, genres)
            VALUES ($1, $2, $3, $4)
            RETURNING id, created_at, version
        "#;

        let row = with_deadline(QUERY_TIMEOUT, async {
            Ok::<_, DatabaseError>(sqlx::query(query)
                .bind(&movie.title)
                .bind(movie.year)
                .bind(movie.runtime)
                .bind(&movie.genres)
                .fetch_one(&self.pool)
                .await?)
        })
        .await?;

        movie.id = row.try_get("id")?;
        movie.created_at = row.try_get("created_at")?;
        movie.version = row.try_get("version")?;
        Ok(())
    }

    pub async fn get(&self, id: i64) -> Result<Movie, DatabaseError> {
        if id < 1 {
            return Err(DatabaseError::NotFound);
        }

        let query = r#"
            SELECT id, created_at, title, year, runtime, genres, version
            FROM movies
            WHERE id = $1
        "#;

        with_deadline(QUERY_TIMEOUT, async {
            sqlx::query_as::<_, Movie>(query)
                .bind(id)
                .fetch_one(&self.pool)
                .await
                .map_err(DatabaseError::from_row_lookup)
        })
        .await
    }

    pub async fn delete(&self, id: i64) -> Result<(), DatabaseError> {
        if id < 1 {
            return Err(DatabaseError::NotFound);
        }

        let result = with_deadline(QUERY_TIMEOUT, async {
            Ok::<_, DatabaseError>(sqlx::query("DELETE FROM movies WHERE id = $1")
                .bind(id)
                .execute(&self.pool)
                .await?)
        })
        .await?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound);
        }
        Ok(())
    }

    /// Lists movies matching `title` (full text) and containing every genre in `genres`.
    pub async fn get_all(
        &self,
        title: &str,
        genres: &[String],
        filters: &Filters,
    ) -> Result<(Vec<Movie>, Metadata), DatabaseError> {
        // sort column comes from the validated safelist, never from raw input
        let query = format!(
            r#"
            SELECT count(*) OVER() AS total_records, id, created_at, title, year, runtime, genres, version
            FROM movies
            WHERE (to_tsvector('simple', title) @@ plainto_tsquery('simple', $1) OR $1 = '')
            AND (genres @> $2 OR $2 = '{{}}')
            ORDER BY {} {}, id ASC
            LIMIT $3 OFFSET $4
            "#,
            filters.sort_column(),
            filters.sort_direction()
        );

        let rows = with_deadline(QUERY_TIMEOUT, async {
            Ok::<_, DatabaseError>(sqlx::query(&query)
                .bind(title)
                .bind(genres)
                .bind(filters.limit())
                .bind(filters.offset())
                .fetch_all(&self.pool)
                .await?)
        })
        .await?;

        let mut total_records = 0;
        let mut movies = Vec::with_capacity(rows.len());
        for row in &rows {
            total_records = row.try_get("total_records")?;
            movies.push(Movie::from_row(row)?);
        }

        let metadata = Metadata::calculate(total_records, filters.page, filters.page_size);
        Ok((movies, metadata))
    }
}

#[async_trait]
impl ConditionalUpdate<Movie> for MovieModel {
    async fn update_if_version(&self, movie: &Movie) -> Result<Option<i32>, DatabaseError> {
        let query = r#"
            UPDATE movies
            SET title = $1, year = $2, runtime = $3, genres = $4, version = version + 1
            WHERE id = $5 AND version = $6
            RETURNING version
        "#;

        let version = sqlx::query_scalar::<_, i32>(query)
            .bind(&movie.title)
            .bind(movie.year)
            .bind(movie.runtime)
            .bind(&movie.genres)
            .bind(movie.id)
            .bind(movie.version)
            .fetch_optional(&self.pool)
            .await?;

        Ok(version)
    }
}
