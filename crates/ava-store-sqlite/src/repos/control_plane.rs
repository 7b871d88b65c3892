// crates/ava-store-sqlite/src/repos/control_plane.rs
// ============================================================================
// Module: Control Plane Repo
// Description: SqliteStore's implementation of ava_core::repo::ExperimentRepo
//              and ava_core::repo::RolloutRepo.
// ============================================================================

use async_trait::async_trait;
use ava_core::identifiers::ExperimentId;
use ava_core::identifiers::RolloutId;
use ava_core::identifiers::SiteUrl;
use ava_core::model::experiment::Experiment;
use ava_core::model::experiment::ExperimentStatus;
use ava_core::model::rollout::Rollout;
use ava_core::model::rollout::RolloutStatus;
use ava_core::repo::ControlPlaneRepoError;
use ava_core::repo::ExperimentRepo;
use ava_core::repo::RolloutRepo;
use rusqlite::OptionalExtension;
use rusqlite::params;

use crate::codec::decode;
use crate::codec::encode;
use crate::store::SqliteStore;

fn to_store_err(err: crate::error::SqliteStoreError) -> ControlPlaneRepoError {
    ControlPlaneRepoError::Store(err.as_store_message())
}

fn to_rusqlite_err(err: crate::error::SqliteStoreError) -> rusqlite::Error {
    rusqlite::Error::ToSqlConversionFailure(Box::new(err))
}

fn row_entity(row: &rusqlite::Row<'_>) -> rusqlite::Result<(Vec<u8>, String)> {
    Ok((row.get(0)?, row.get(1)?))
}

const fn experiment_status_label(status: ExperimentStatus) -> &'static str {
    match status {
        ExperimentStatus::Draft => "draft",
        ExperimentStatus::Running => "running",
        ExperimentStatus::Paused => "paused",
        ExperimentStatus::Ended => "ended",
    }
}

const fn rollout_status_label(status: RolloutStatus) -> &'static str {
    match status {
        RolloutStatus::Pending => "pending",
        RolloutStatus::Rolling => "rolling",
        RolloutStatus::Paused => "paused",
        RolloutStatus::Completed => "completed",
        RolloutStatus::RolledBack => "rolled_back",
    }
}

fn save_experiment(conn: &rusqlite::Connection, experiment: &Experiment) -> rusqlite::Result<()> {
    let (bytes, hash) = encode(experiment).map_err(to_rusqlite_err)?;
    conn.execute(
        "INSERT INTO experiments (id, site_url, status, json, hash)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(id) DO UPDATE SET
            site_url = excluded.site_url,
            status = excluded.status,
            json = excluded.json,
            hash = excluded.hash",
        params![
            experiment.id.as_str(),
            experiment.site_url.as_ref().map(SiteUrl::as_str),
            experiment_status_label(experiment.status),
            bytes,
            hash,
        ],
    )?;
    Ok(())
}

fn save_rollout(conn: &rusqlite::Connection, rollout: &Rollout) -> rusqlite::Result<()> {
    let (bytes, hash) = encode(rollout).map_err(to_rusqlite_err)?;
    conn.execute(
        "INSERT INTO rollouts (id, site_url, status, json, hash)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(id) DO UPDATE SET
            site_url = excluded.site_url,
            status = excluded.status,
            json = excluded.json,
            hash = excluded.hash",
        params![
            rollout.id.as_str(),
            rollout.site_url.as_str(),
            rollout_status_label(rollout.status),
            bytes,
            hash,
        ],
    )?;
    Ok(())
}

#[async_trait]
impl ExperimentRepo for SqliteStore {
    async fn create(&self, experiment: Experiment) -> Result<(), ControlPlaneRepoError> {
        self.with_write(|conn| save_experiment(conn, &experiment)).map_err(to_store_err)
    }

    async fn get(&self, id: &ExperimentId) -> Result<Experiment, ControlPlaneRepoError> {
        let row = self
            .with_read(|conn| {
                conn.query_row(
                    "SELECT json, hash FROM experiments WHERE id = ?1",
                    params![id.as_str()],
                    row_entity,
                )
                .optional()
            })
            .map_err(to_store_err)?;
        let (bytes, hash) = row.ok_or(ControlPlaneRepoError::NotFound)?;
        decode(&bytes, &hash).map_err(to_store_err)
    }

    async fn update(&self, experiment: Experiment) -> Result<(), ControlPlaneRepoError> {
        self.with_write(|conn| save_experiment(conn, &experiment)).map_err(to_store_err)
    }

    async fn readiness(&self) -> Result<(), ControlPlaneRepoError> {
        self.with_read(|conn| conn.query_row("SELECT 1", [], |_| Ok(())))
            .map_err(to_store_err)
    }
}

#[async_trait]
impl RolloutRepo for SqliteStore {
    async fn create(&self, rollout: Rollout) -> Result<(), ControlPlaneRepoError> {
        self.with_write(|conn| save_rollout(conn, &rollout)).map_err(to_store_err)
    }

    async fn get(&self, id: &RolloutId) -> Result<Rollout, ControlPlaneRepoError> {
        let row = self
            .with_read(|conn| {
                conn.query_row(
                    "SELECT json, hash FROM rollouts WHERE id = ?1",
                    params![id.as_str()],
                    row_entity,
                )
                .optional()
            })
            .map_err(to_store_err)?;
        let (bytes, hash) = row.ok_or(ControlPlaneRepoError::NotFound)?;
        decode(&bytes, &hash).map_err(to_store_err)
    }

    async fn update(&self, rollout: Rollout) -> Result<(), ControlPlaneRepoError> {
        self.with_write(|conn| save_rollout(conn, &rollout)).map_err(to_store_err)
    }

    async fn list_rolling(&self) -> Result<Vec<Rollout>, ControlPlaneRepoError> {
        let rows = self
            .with_read(|conn| {
                let mut stmt =
                    conn.prepare("SELECT json, hash FROM rollouts WHERE status = ?1")?;
                stmt.query_map(params![rollout_status_label(RolloutStatus::Rolling)], row_entity)?
                    .collect::<rusqlite::Result<Vec<_>>>()
            })
            .map_err(to_store_err)?;
        rows.into_iter()
            .map(|(bytes, hash)| decode(&bytes, &hash).map_err(to_store_err))
            .collect()
    }

    async fn get_active_rollout(&self, site_url: &SiteUrl) -> Result<Option<Rollout>, ControlPlaneRepoError> {
        let row = self
            .with_read(|conn| {
                conn.query_row(
                    "SELECT json, hash FROM rollouts WHERE site_url = ?1 AND status = ?2",
                    params![site_url.as_str(), rollout_status_label(RolloutStatus::Rolling)],
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

    async fn advance_stage(&self, id: &RolloutId, stage_index: usize) -> Result<(), ControlPlaneRepoError> {
        let mut rollout = self.get(id).await?;
        if stage_index <= rollout.current_stage {
            return Err(ControlPlaneRepoError::InvariantViolation(format!(
                "rollout {} already at or past stage {stage_index}",
                id.as_str()
            )));
        }
        if stage_index >= rollout.stages.len() {
            return Err(ControlPlaneRepoError::InvariantViolation(format!(
                "stage index {stage_index} is out of range for rollout {}",
                id.as_str()
            )));
        }
        rollout.current_stage = stage_index;
        self.with_write(|conn| save_rollout(conn, &rollout)).map_err(to_store_err)
    }

    async fn readiness(&self) -> Result<(), ControlPlaneRepoError> {
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

    use ava_core::model::rollout::ChangeType;
    use ava_core::model::rollout::HealthCriteria;
    use ava_core::model::rollout::RolloutStage;

    use super::*;
    use crate::connection::SqliteStoreConfig;

    fn sample_rollout(id: &str, site_url: &str) -> Rollout {
        Rollout {
            id: RolloutId::from(id),
            name: "widen nudge cap".to_owned(),
            site_url: SiteUrl::from(site_url),
            change_type: ChangeType::EvalEngine(ava_core::model::experiment::EvalEngine::Auto),
            stages: vec![
                RolloutStage {
                    percent: 10,
                    duration_hours: 24,
                    health_checks: HealthCriteria {
                        min_sample_size: 100,
                        min_conversion_rate: 0.05,
                        max_dismissal_rate: 0.5,
                    },
                },
                RolloutStage {
                    percent: 100,
                    duration_hours: 24,
                    health_checks: HealthCriteria {
                        min_sample_size: 100,
                        min_conversion_rate: 0.05,
                        max_dismissal_rate: 0.5,
                    },
                },
            ],
            status: RolloutStatus::Rolling,
            current_stage: 0,
            started_at: None,
            experiment_id: None,
            last_health_check: None,
            last_health_status: None,
        }
    }

    #[tokio::test]
    async fn advance_stage_rejects_non_advancing_index() {
        let store = SqliteStore::open(SqliteStoreConfig::in_memory()).expect("open");
        let rollout = sample_rollout("r-1", "https://shop.example.com");
        store.create(rollout.clone()).await.expect("create");
        let result = store.advance_stage(&rollout.id, 0).await;
        assert!(matches!(result, Err(ControlPlaneRepoError::InvariantViolation(_))));
    }

    #[tokio::test]
    async fn advance_stage_applies_forward_move() {
        let store = SqliteStore::open(SqliteStoreConfig::in_memory()).expect("open");
        let rollout = sample_rollout("r-2", "https://shop.example.com");
        store.create(rollout.clone()).await.expect("create");
        store.advance_stage(&rollout.id, 1).await.expect("advance");
        let fetched = store.get(&rollout.id).await.expect("get");
        assert_eq!(fetched.current_stage, 1);
    }

    #[tokio::test]
    async fn get_active_rollout_finds_rolling_rollout_for_site() {
        let store = SqliteStore::open(SqliteStoreConfig::in_memory()).expect("open");
        let rollout = sample_rollout("r-3", "https://shop.example.com");
        store.create(rollout.clone()).await.expect("create");
        let found = store
            .get_active_rollout(&SiteUrl::from("https://shop.example.com"))
            .await
            .expect("find");
        assert!(found.is_some());
    }
}
