// crates/ava-store-sqlite/src/repos/intervention.rs
// ============================================================================
// Module: Intervention Repo
// Description: SqliteStore's implementation of ava_core::repo::InterventionRepo.
// ============================================================================

use async_trait::async_trait;
use ava_core::identifiers::InterventionId;
use ava_core::identifiers::SessionId;
use ava_core::model::intervention::Intervention;
use ava_core::model::intervention::InterventionStatus;
use ava_core::repo::InterventionRepo;
use ava_core::repo::InterventionRepoError;
use rusqlite::OptionalExtension;
use rusqlite::params;
use time::OffsetDateTime;

use crate::codec::decode;
use crate::codec::encode;
use crate::store::SqliteStore;
use crate::time_fmt::rfc3339;

fn to_store_err(err: crate::error::SqliteStoreError) -> InterventionRepoError {
    InterventionRepoError::Store(err.as_store_message())
}

fn row_entity(row: &rusqlite::Row<'_>) -> rusqlite::Result<(Vec<u8>, String)> {
    Ok((row.get(0)?, row.get(1)?))
}

/// Stable lowercase status label, matching the model's `#[serde(rename_all
/// = "snake_case")]`.
const fn status_label(status: InterventionStatus) -> &'static str {
    match status {
        InterventionStatus::Sent => "sent",
        InterventionStatus::Delivered => "delivered",
        InterventionStatus::Dismissed => "dismissed",
        InterventionStatus::Converted => "converted",
        InterventionStatus::Ignored => "ignored",
    }
}

fn save(conn: &rusqlite::Connection, intervention: &Intervention) -> rusqlite::Result<()> {
    let (bytes, hash) = encode(intervention).map_err(to_rusqlite_err)?;
    conn.execute(
        "INSERT INTO interventions (id, session_id, status, created_at, json, hash)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         ON CONFLICT(id) DO UPDATE SET
            status = excluded.status,
            json = excluded.json,
            hash = excluded.hash",
        params![
            intervention.id.as_str(),
            intervention.session_id.as_str(),
            status_label(intervention.status),
            rfc3339(intervention.created_at),
            bytes,
            hash,
        ],
    )?;
    Ok(())
}

fn to_rusqlite_err(err: crate::error::SqliteStoreError) -> rusqlite::Error {
    rusqlite::Error::ToSqlConversionFailure(Box::new(err))
}

#[async_trait]
impl InterventionRepo for SqliteStore {
    async fn create(&self, intervention: Intervention) -> Result<(), InterventionRepoError> {
        self.with_write(|conn| save(conn, &intervention)).map_err(to_store_err)
    }

    async fn get(&self, id: &InterventionId) -> Result<Intervention, InterventionRepoError> {
        let row = self
            .with_read(|conn| {
                conn.query_row(
                    "SELECT json, hash FROM interventions WHERE id = ?1",
                    params![id.as_str()],
                    row_entity,
                )
                .optional()
            })
            .map_err(to_store_err)?;
        let (bytes, hash) = row.ok_or(InterventionRepoError::NotFound)?;
        decode(&bytes, &hash).map_err(to_store_err)
    }

    async fn get_by_session(&self, session_id: &SessionId) -> Result<Vec<Intervention>, InterventionRepoError> {
        let rows = self
            .with_read(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT json, hash FROM interventions WHERE session_id = ?1 ORDER BY created_at DESC",
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

    async fn list(&self, status: Option<InterventionStatus>) -> Result<Vec<Intervention>, InterventionRepoError> {
        let rows = self
            .with_read(|conn| match status {
                Some(status) => {
                    let mut stmt = conn.prepare(
                        "SELECT json, hash FROM interventions WHERE status = ?1 ORDER BY created_at DESC",
                    )?;
                    stmt.query_map(params![status_label(status)], row_entity)?
                        .collect::<rusqlite::Result<Vec<_>>>()
                }
                None => {
                    let mut stmt =
                        conn.prepare("SELECT json, hash FROM interventions ORDER BY created_at DESC")?;
                    stmt.query_map([], row_entity)?.collect::<rusqlite::Result<Vec<_>>>()
                }
            })
            .map_err(to_store_err)?;
        rows.into_iter()
            .map(|(bytes, hash)| decode(&bytes, &hash).map_err(to_store_err))
            .collect()
    }

    async fn update_status(
        &self,
        id: &InterventionId,
        next: InterventionStatus,
        at: OffsetDateTime,
    ) -> Result<(), InterventionRepoError> {
        let mut intervention = self.get(id).await?;
        if !intervention.try_transition(next, at) {
            return Err(InterventionRepoError::InvalidTransition);
        }
        self.with_write(|conn| save(conn, &intervention)).map_err(to_store_err)
    }

    async fn readiness(&self) -> Result<(), InterventionRepoError> {
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

    use ava_core::identifiers::EvaluationId;
    use ava_core::model::evaluation::Tier;
    use ava_core::model::intervention::InterventionType;
    use serde_json::json;
    use time::macros::datetime;

    use super::*;
    use crate::connection::SqliteStoreConfig;

    fn sample_intervention(id: &str, session_id: &str) -> Intervention {
        Intervention {
            id: InterventionId::from(id),
            session_id: SessionId::from(session_id),
            evaluation_id: EvaluationId::from("ev-1"),
            intervention_type: InterventionType::Nudge,
            friction_id: None,
            action_code: "cart_reminder".to_owned(),
            message: Some("Need help?".to_owned()),
            mswim_score: 65.0,
            tier_at_fire: Tier::Nudge,
            payload: json!({"type": "nudge"}),
            created_at: datetime!(2026-01-01 00:00:00 UTC),
            status: InterventionStatus::Sent,
            conversion_action: None,
            status_updated_at: datetime!(2026-01-01 00:00:00 UTC),
        }
    }

    #[tokio::test]
    async fn create_then_get_round_trips() {
        let store = SqliteStore::open(SqliteStoreConfig::in_memory()).expect("open");
        let intervention = sample_intervention("i-1", "s-1");
        store.create(intervention.clone()).await.expect("create");
        let fetched = store.get(&intervention.id).await.expect("get");
        assert_eq!(fetched.status, InterventionStatus::Sent);
    }

    #[tokio::test]
    async fn update_status_rejects_non_monotonic_transition() {
        let store = SqliteStore::open(SqliteStoreConfig::in_memory()).expect("open");
        let mut intervention = sample_intervention("i-2", "s-1");
        intervention.status = InterventionStatus::Dismissed;
        store.create(intervention.clone()).await.expect("create");
        let result = store
            .update_status(&intervention.id, InterventionStatus::Delivered, datetime!(2026-01-01 00:01:00 UTC))
            .await;
        assert!(matches!(result, Err(InterventionRepoError::InvalidTransition)));
    }

    #[tokio::test]
    async fn update_status_applies_valid_transition() {
        let store = SqliteStore::open(SqliteStoreConfig::in_memory()).expect("open");
        let intervention = sample_intervention("i-3", "s-1");
        store.create(intervention.clone()).await.expect("create");
        store
            .update_status(&intervention.id, InterventionStatus::Delivered, datetime!(2026-01-01 00:01:00 UTC))
            .await
            .expect("valid transition");
        let fetched = store.get(&intervention.id).await.expect("get");
        assert_eq!(fetched.status, InterventionStatus::Delivered);
    }

    #[tokio::test]
    async fn list_filters_by_status() {
        let store = SqliteStore::open(SqliteStoreConfig::in_memory()).expect("open");
        let mut sent = sample_intervention("i-4", "s-1");
        sent.status = InterventionStatus::Sent;
        let mut dismissed = sample_intervention("i-5", "s-1");
        dismissed.status = InterventionStatus::Dismissed;
        store.create(sent).await.expect("create sent");
        store.create(dismissed).await.expect("create dismissed");
        let only_dismissed = store.list(Some(InterventionStatus::Dismissed)).await.expect("list");
        assert_eq!(only_dismissed.len(), 1);
        assert_eq!(only_dismissed[0].id.as_str(), "i-5");
    }
}
