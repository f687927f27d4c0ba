//! Optimistic concurrency control for versioned records.
//!
//! Every mutable record carries a `version` counter. Writers submit the
//! version they read; storage applies the change and bumps the counter in a
//! single conditional statement, so there is no window between checking the
//! version and writing. When the statement matches no row, somebody else
//! won the race and the caller gets [`DatabaseError::EditConflict`]. It is
//! the caller's job to re-read and retry.
//!
//! Existence is not inspected here. Handlers read the record first and
//! report `NotFound` from that read, so a zero-row conditional write is
//! always classified as a conflict, for every record kind.

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use super::manager::{with_deadline, DatabaseError, QUERY_TIMEOUT};

/// A record protected by a version counter.
pub trait Versioned {
    fn id(&self) -> i64;
    fn version(&self) -> i32;
    fn set_version(&mut self, version: i32);
}

/// Storage side of the compare-and-swap contract.
#[async_trait]
pub trait ConditionalUpdate<R>: Send + Sync
where
    R: Versioned + Send + Sync,
{
    /// Persists `record` and increments its version, but only when the stored
    /// row with `record.id()` still has `record.version()`. Returns the new
    /// version, or `None` when no row matched.
    async fn update_if_version(&self, record: &R) -> Result<Option<i32>, DatabaseError>;
}

#[derive(Debug, Clone, Copy)]
pub struct ConcurrencyGuard {
    deadline: Duration,
}

impl Default for ConcurrencyGuard {
    fn default() -> Self {
        Self::new(QUERY_TIMEOUT)
    }
}

impl ConcurrencyGuard {
    pub fn new(deadline: Duration) -> Self {
        Self { deadline }
    }

    /// Writes `record` through `store` if nobody else changed it since it was read.
    /// On success the new version is stored back into `record` and returned.
    pub async fn update<R, S>(&self, store: &S, record: &mut R) -> Result<i32, DatabaseError>
    where
        R: Versioned + Send + Sync,
        S: ConditionalUpdate<R> + ?Sized,
    {
        let expected = record.version();

        match with_deadline(self.deadline, store.update_if_version(record)).await? {
            Some(new_version) => {
                debug_assert_eq!(new_version, expected + 1, "version must advance by one");
                record.set_version(new_version);
                Ok(new_version)
            }
            None => {
                debug!(id = record.id(), expected, "conditional update matched no row");
                Err(DatabaseError::EditConflict)
            }
        }
    }
}
