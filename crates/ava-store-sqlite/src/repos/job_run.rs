// crates/ava-store-sqlite/src/repos/job_run.rs
// ============================================================================
// Module: Job Run Repo
// Description: SqliteStore's implementation of ava_core::repo::JobRunRepo.
// ============================================================================

use async_trait::async_trait;
use ava_core::model::job_run::JobRun;
use ava_core::repo::JobRunRepo;
use ava_core::repo::JobRunRepoError;
use rusqlite::OptionalExtension;
use rusqlite::params;
use time::OffsetDateTime;

use crate::codec::decode;
use crate::codec::encode;
use crate::store::SqliteStore;
use crate::time_fmt::rfc3339;

fn to_store_err(err: crate::error::SqliteStoreError) -> JobRunRepoError {
    JobRunRepoError::Store(err.as_store_message())
}

fn to_rusqlite_err(err: crate::error::SqliteStoreError) -> rusqlite::Error {
    rusqlite::Error::ToSqlConversionFailure(Box::new(err))
}

fn row_entity(row: &rusqlite::Row<'_>) -> rusqlite::Result<(Vec<u8>, String)> {
    Ok((row.get(0)?, row.get(1)?))
}

fn save(conn: &rusqlite::Connection, run: &JobRun) -> rusqlite::Result<()> {
    let (bytes, hash) = encode(run).map_err(to_rusqlite_err)?;
    conn.execute(
        "INSERT INTO job_runs (id, job_name, started_at, json, hash)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(id) DO UPDATE SET
            json = excluded.json,
            hash = excluded.hash",
        params![run.id.as_str(), run.job_name, rfc3339(run.started_at), bytes, hash],
    )?;
    Ok(())
}

#[async_trait]
impl JobRunRepo for SqliteStore {
    async fn create(&self, run: JobRun) -> Result<(), JobRunRepoError> {
        self.with_write(|conn| save(conn, &run)).map_err(to_store_err)
    }

    async fn complete(&self, run: JobRun) -> Result<(), JobRunRepoError> {
        self.with_write(|conn| save(conn, &run)).map_err(to_store_err)
    }

    async fn fail(&self, run: JobRun) -> Result<(), JobRunRepoError> {
        self.with_write(|conn| save(conn, &run)).map_err(to_store_err)
    }

    async fn get_last_run(&self, job_name: &str) -> Result<Option<JobRun>, JobRunRepoError> {
        let row = self
            .with_read(|conn| {
                conn.query_row(
                    "SELECT json, hash FROM job_runs WHERE job_name = ?1 ORDER BY started_at DESC LIMIT 1",
                    params![job_name],
                    row_entity,
                )
                .optional()
            })
            .map_err(to_store_err)?;
        match row {
            Some((bytes, hash)) => Ok(Some(decode(&bytes, &hash).map_err(to_store_err)?)),
            None => Ok(None),
        }
    }

    async fn prune_older_than(&self, older_than: OffsetDateTime) -> Result<u64, JobRunRepoError> {
        let deleted = self
            .with_write(|conn| {
                conn.execute("DELETE FROM job_runs WHERE started_at < ?1", params![rfc3339(older_than)])
            })
            .map_err(to_store_err)?;
        Ok(deleted.try_into().unwrap_or(0))
    }

    async fn readiness(&self) -> Result<(), JobRunRepoError> {
        self.with_read(|conn| conn.query_row("SELECT 1", [], |_| Ok(())))
            .map_err(to_store_err)
    }
}

#[cfg(test)]
mod tests {
    #![allow(
        clippy::panic,
        clippy::unwrap_used,
        clippy::expect_used,
        reason = "Test-only panic-based assertions are permitted."
    )]

    use ava_core::identifiers::JobRunId;
    use ava_core::model::job_run::TriggeredBy;
    use time::macros::datetime;

    use super::*;
    use crate::connection::SqliteStoreConfig;

    #[tokio::test]
    async fn get_last_run_returns_most_recent_by_job_name() {
        let store = SqliteStore::open(SqliteStoreConfig::in_memory()).expect("open");
        let first = JobRun::start(
            JobRunId::from("jr-1"),
            "nightly_batch",
            TriggeredBy::Scheduler,
            datetime!(2026-01-01 00:00:00 UTC),
        );
        let mut second = JobRun::start(
            JobRunId::from("jr-2"),
            "nightly_batch",
            TriggeredBy::Scheduler,
            datetime!(2026-01-02 00:00:00 UTC),
        );
        second.complete(datetime!(2026-01-02 00:05:00 UTC), "ok");
        store.create(first).await.expect("create first");
        store.complete(second.clone()).await.expect("create second");
        let last = store.get_last_run("nightly_batch").await.expect("get last").expect("some");
        assert_eq!(last.id.as_str(), "jr-2");
    }
}
