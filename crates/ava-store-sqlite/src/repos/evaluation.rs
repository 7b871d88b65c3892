// crates/ava-store-sqlite/src/repos/evaluation.rs
// ============================================================================
// Module: Evaluation Repo
// Description: SqliteStore's implementation of ava_core::repo::EvaluationRepo.
// ============================================================================

use async_trait::async_trait;
use ava_core::identifiers::EvaluationId;
use ava_core::identifiers::SessionId;
use ava_core::model::evaluation::Evaluation;
use ava_core::repo::EvaluationRepo;
use ava_core::repo::EvaluationRepoError;
use rusqlite::OptionalExtension;
use rusqlite::params;

use crate::codec::decode;
use crate::codec::encode;
use crate::store::SqliteStore;
use crate::time_fmt::rfc3339;

fn to_store_err(err: crate::error::SqliteStoreError) -> EvaluationRepoError {
    EvaluationRepoError::Store(err.as_store_message())
}

fn row_entity(row: &rusqlite::Row<'_>) -> rusqlite::Result<(Vec<u8>, String)> {
    Ok((row.get(0)?, row.get(1)?))
}

#[async_trait]
impl EvaluationRepo for SqliteStore {
    async fn create(&self, evaluation: Evaluation) -> Result<(), EvaluationRepoError> {
        let (bytes, hash) = encode(&evaluation).map_err(to_store_err)?;
        self.with_write(|conn| {
            conn.execute(
                "INSERT INTO evaluations (id, session_id, evaluated_at, json, hash)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    evaluation.id.as_str(),
                    evaluation.session_id.as_str(),
                    rfc3339(evaluation.evaluated_at),
                    bytes,
                    hash,
                ],
            )
        })
        .map_err(to_store_err)
    }

    async fn get(&self, id: &EvaluationId) -> Result<Evaluation, EvaluationRepoError> {
        let row = self
            .with_read(|conn| {
                conn.query_row(
                    "SELECT json, hash FROM evaluations WHERE id = ?1",
                    params![id.as_str()],
                    row_entity,
                )
                .optional()
            })
            .map_err(to_store_err)?;
        let (bytes, hash) = row.ok_or(EvaluationRepoError::NotFound)?;
        decode(&bytes, &hash).map_err(to_store_err)
    }

    async fn get_by_session(&self, session_id: &SessionId) -> Result<Vec<Evaluation>, EvaluationRepoError> {
        let rows = self
            .with_read(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT json, hash FROM evaluations WHERE session_id = ?1 ORDER BY evaluated_at DESC",
                )?;
                let rows = stmt
                    .query_map(params![session_id.as_str()], row_entity)?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                Ok(rows)
            })
            .map_err(to_store_err)?;
        rows.into_iter()
            .map(|(bytes, hash)| decode(&bytes, &hash).map_err(to_store_err))
            .collect()
    }

    async fn readiness(&self) -> Result<(), EvaluationRepoError> {
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

    use ava_core::model::evaluation::Decision;
    use ava_core::model::evaluation::MswimResult;
    use ava_core::model::evaluation::MswimSignals;
    use ava_core::model::evaluation::Tier;
    use ava_core::model::scoring_config::SignalWeights;
    use time::macros::datetime;

    use super::*;
    use crate::connection::SqliteStoreConfig;

    fn sample_evaluation(id: &str, session_id: &str) -> Evaluation {
        Evaluation {
            id: EvaluationId::from(id),
            session_id: SessionId::from(session_id),
            evaluated_at: datetime!(2026-01-01 00:00:00 UTC),
            result: MswimResult {
                signals: MswimSignals::new(50, 50, 50, 50, 50),
                weights_used: SignalWeights::defaults(),
                composite_score: 50.0,
                tier: Tier::Nudge,
                gate_override: None,
                decision: Decision::Fire,
                reasoning: "test".to_owned(),
            },
            engine_used: "fast".to_owned(),
        }
    }

    #[tokio::test]
    async fn create_then_get_round_trips() {
        let store = SqliteStore::open(SqliteStoreConfig::in_memory()).expect("open");
        let evaluation = sample_evaluation("ev-1", "s-1");
        store.create(evaluation.clone()).await.expect("create");
        let fetched = store.get(&evaluation.id).await.expect("get");
        assert_eq!(fetched.id, evaluation.id);
        assert_eq!(fetched.engine_used, "fast");
    }

    #[tokio::test]
    async fn get_by_session_orders_most_recent_first() {
        let store = SqliteStore::open(SqliteStoreConfig::in_memory()).expect("open");
        let mut first = sample_evaluation("ev-1", "s-1");
        first.evaluated_at = datetime!(2026-01-01 00:00:00 UTC);
        let mut second = sample_evaluation("ev-2", "s-1");
        second.evaluated_at = datetime!(2026-01-01 00:05:00 UTC);
        store.create(first).await.expect("create first");
        store.create(second).await.expect("create second");
        let evaluations = store.get_by_session(&SessionId::from("s-1")).await.expect("list");
        assert_eq!(evaluations[0].id.as_str(), "ev-2");
        assert_eq!(evaluations[1].id.as_str(), "ev-1");
    }
}
