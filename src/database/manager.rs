use std::future::Future;
use std::time::Duration;

use sqlx::{postgres::PgPoolOptions, PgPool};
use thiserror::Error;
use tracing::info;

use crate::config::DatabaseConfig;

/// Deadline applied to every individual query.
pub const QUERY_TIMEOUT: Duration = Duration::from_secs(3);

/// Deadline for the connectivity check performed when the pool is opened.
const PING_TIMEOUT: Duration = Duration::from_secs(5);

/// Errors from the storage layer
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Missing configuration: {0}")]
    ConfigMissing(&'static str),

    #[error("record not found")]
    NotFound,

    #[error("edit conflict")]
    EditConflict,

    #[error("duplicate email")]
    DuplicateEmail,

    #[error("missing password hash for user")]
    MissingPasswordHash,

    #[error("query exceeded deadline of {0:?}")]
    Timeout(Duration),

    #[error(transparent)]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

impl DatabaseError {
    /// Maps a missing row onto `NotFound`, leaving every other failure intact.
    pub fn from_row_lookup(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DatabaseError::NotFound,
            other => DatabaseError::Sqlx(other),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, DatabaseError::NotFound)
    }
}

/// Runs a storage call under `deadline`. Expiry is reported as `Timeout`,
/// which callers treat like any other storage failure.
pub async fn with_deadline<T, F>(deadline: Duration, fut: F) -> Result<T, DatabaseError>
where
    F: Future<Output = Result<T, DatabaseError>>,
{
    match tokio::time::timeout(deadline, fut).await {
        Ok(result) => result,
        Err(_) => Err(DatabaseError::Timeout(deadline)),
    }
}

/// Opens the connection pool and verifies connectivity.
pub async fn open_pool(config: &DatabaseConfig) -> Result<PgPool, DatabaseError> {
    if config.dsn.is_empty() {
        return Err(DatabaseError::ConfigMissing("CINEVAULT_DB_DSN"));
    }

    let pool = PgPoolOptions::new()
        .max_connections(config.max_open_conns)
        .min_connections(config.min_idle_conns)
        .idle_timeout(config.max_idle_time)
        .acquire_timeout(PING_TIMEOUT)
        .connect_lazy(&config.dsn)?;

    with_deadline(PING_TIMEOUT, async {
        sqlx::query("SELECT 1").execute(&pool).await?;
        Ok::<_, DatabaseError>(())
    })
    .await?;

    if config.migrate {
        sqlx::migrate!("./migrations").run(&pool).await?;
        info!("database migrations applied");
    }

    Ok(pool)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn deadline_expiry_is_reported_as_timeout() {
        let result: Result<(), DatabaseError> = with_deadline(QUERY_TIMEOUT, async {
            tokio::time::sleep(Duration::from_secs(10)).await;
            Ok(())
        })
        .await;

        assert!(matches!(result, Err(DatabaseError::Timeout(d)) if d == QUERY_TIMEOUT));
    }

    #[tokio::test]
    async fn deadline_passes_through_results() {
        let ok = with_deadline(QUERY_TIMEOUT, async { Ok::<_, DatabaseError>(7) }).await;
        assert_eq!(ok.unwrap(), 7);

        let err = with_deadline(QUERY_TIMEOUT, async { Err::<(), _>(DatabaseError::NotFound) }).await;
        assert!(err.unwrap_err().is_not_found());
    }

    #[test]
    fn missing_row_maps_to_not_found() {
        assert!(DatabaseError::from_row_lookup(sqlx::Error::RowNotFound).is_not_found());
        assert!(!DatabaseError::from_row_lookup(sqlx::Error::PoolTimedOut).is_not_found());
    }

    #[tokio::test]
    async fn open_pool_requires_dsn() {
        let config = DatabaseConfig {
            dsn: String::new(),
            max_open_conns: 1,
            min_idle_conns: 0,
            max_idle_time: Duration::from_secs(60),
            migrate: false,
        };
        assert!(matches!(
            open_pool(&config).await,
            Err(DatabaseError::ConfigMissing(_))
        ));
    }
}
