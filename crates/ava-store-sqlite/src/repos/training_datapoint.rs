// crates/ava-store-sqlite/src/repos/training_datapoint.rs
// ============================================================================
// Module: Training Datapoint Repo
// Description: SqliteStore's implementation of
//              ava_core::repo::TrainingDatapointRepo.
// ============================================================================

use std::collections::HashMap;

use async_trait::async_trait;
use ava_core::identifiers::FrictionId;
use ava_core::model::evaluation::Tier;
use ava_core::model::training_datapoint::OutcomeLabel;
use ava_core::model::training_datapoint::TrainingDatapoint;
use ava_core::repo::OutcomeDistribution;
use ava_core::repo::TierOutcomeCell;
use ava_core::repo::TrainingDatapointFilter;
use ava_core::repo::TrainingDatapointRepo;
use ava_core::repo::TrainingDatapointRepoError;
use rusqlite::params;
use rusqlite::types::Value;

use crate::codec::decode;
use crate::codec::encode;
use crate::store::SqliteStore;
use crate::time_fmt::rfc3339;

fn to_store_err(err: crate::error::SqliteStoreError) -> TrainingDatapointRepoError {
    TrainingDatapointRepoError::Store(err.as_store_message())
}

const fn outcome_label(outcome: OutcomeLabel) -> &'static str {
    match outcome {
        OutcomeLabel::DeliveredTimeout => "delivered_timeout",
        OutcomeLabel::Dismissed => "dismissed",
        OutcomeLabel::Converted => "converted",
        OutcomeLabel::Ignored => "ignored",
    }
}

fn outcome_from_label(label: &str) -> Option<OutcomeLabel> {
    match label {
        "delivered_timeout" => Some(OutcomeLabel::DeliveredTimeout),
        "dismissed" => Some(OutcomeLabel::Dismissed),
        "converted" => Some(OutcomeLabel::Converted),
        "ignored" => Some(OutcomeLabel::Ignored),
        _ => None,
    }
}

const fn tier_label(tier: Tier) -> &'static str {
    match tier {
        Tier::Monitor => "MONITOR",
        Tier::Passive => "PASSIVE",
        Tier::Nudge => "NUDGE",
        Tier::Active => "ACTIVE",
        Tier::Escalate => "ESCALATE",
    }
}

fn tier_from_label(label: &str) -> Option<Tier> {
    match label {
        "MONITOR" => Some(Tier::Monitor),
        "PASSIVE" => Some(Tier::Passive),
        "NUDGE" => Some(Tier::Nudge),
        "ACTIVE" => Some(Tier::Active),
        "ESCALATE" => Some(Tier::Escalate),
        _ => None,
    }
}

/// Builds the `WHERE ...` fragment and its bound parameters for a
/// [`TrainingDatapointFilter`]. Empty filters produce an empty fragment.
fn filter_clause(filter: &TrainingDatapointFilter) -> (String, Vec<Value>) {
    let mut clauses = Vec::new();
    let mut values = Vec::new();
    if let Some(outcome) = filter.outcome {
        clauses.push("outcome = ?");
        values.push(Value::Text(outcome_label(outcome).to_owned()));
    }
    if let Some(tier) = filter.tier {
        clauses.push("tier = ?");
        values.push(Value::Text(tier_label(tier).to_owned()));
    }
    if let Some(site_url) = &filter.site_url {
        clauses.push("site_url = ?");
        values.push(Value::Text(site_url.as_str().to_owned()));
    }
    if let Some(friction_id) = &filter.friction_id {
        clauses.push("friction_id = ?");
        values.push(Value::Text(friction_id.as_str().to_owned()));
    }
    if let Some(since) = filter.since {
        clauses.push("created_at >= ?");
        values.push(Value::Text(rfc3339(since)));
    }
    if let Some(until) = filter.until {
        clauses.push("created_at <= ?");
        values.push(Value::Text(rfc3339(until)));
    }
    let sql = if clauses.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", clauses.join(" AND "))
    };
    (sql, values)
}

fn row_entity(row: &rusqlite::Row<'_>) -> rusqlite::Result<(Vec<u8>, String)> {
    Ok((row.get(0)?, row.get(1)?))
}

#[async_trait]
impl TrainingDatapointRepo for SqliteStore {
    async fn create(&self, datapoint: TrainingDatapoint) -> Result<(), TrainingDatapointRepoError> {
        let (bytes, hash) = encode(&datapoint).map_err(to_store_err)?;
        let friction_id: Option<&str> = datapoint.friction_id.as_ref().map(FrictionId::as_str);
        self.with_write(|conn| {
            conn.execute(
                "INSERT OR IGNORE INTO training_datapoints
                    (id, intervention_id, outcome, tier, site_url, friction_id, created_at, json, hash)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    datapoint.id.as_str(),
                    datapoint.intervention_id.as_str(),
                    outcome_label(datapoint.outcome),
                    tier_label(datapoint.tier_at_fire),
                    datapoint.session_context.site_url.as_str(),
                    friction_id,
                    rfc3339(datapoint.created_at),
                    bytes,
                    hash,
                ],
            )
        })
        .map_err(to_store_err)
    }

    async fn list(
        &self,
        filter: &TrainingDatapointFilter,
    ) -> Result<Vec<TrainingDatapoint>, TrainingDatapointRepoError> {
        let (where_sql, values) = filter_clause(filter);
        let sql = format!("SELECT json, hash FROM training_datapoints{where_sql} ORDER BY created_at DESC");
        let rows = self
            .with_read(|conn| {
                let mut stmt = conn.prepare(&sql)?;
                stmt.query_map(rusqlite::params_from_iter(values.iter()), row_entity)?
                    .collect::<rusqlite::Result<Vec<_>>>()
            })
            .map_err(to_store_err)?;
        rows.into_iter()
            .map(|(bytes, hash)| decode(&bytes, &hash).map_err(to_store_err))
            .collect()
    }

    async fn outcome_distribution(
        &self,
        filter: &TrainingDatapointFilter,
    ) -> Result<OutcomeDistribution, TrainingDatapointRepoError> {
        let (where_sql, values) = filter_clause(filter);
        let sql = format!("SELECT outcome, COUNT(*) FROM training_datapoints{where_sql} GROUP BY outcome");
        let rows = self
            .with_read(|conn| {
                let mut stmt = conn.prepare(&sql)?;
                stmt.query_map(rusqlite::params_from_iter(values.iter()), |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
                })?
                .collect::<rusqlite::Result<Vec<_>>>()
            })
            .map_err(to_store_err)?;
        let counts = rows
            .into_iter()
            .filter_map(|(label, count)| {
                outcome_from_label(&label).map(|outcome| (outcome, count.try_into().unwrap_or(0)))
            })
            .collect();
        Ok(OutcomeDistribution { counts })
    }

    async fn tier_outcome_cross_tab(
        &self,
        filter: &TrainingDatapointFilter,
    ) -> Result<Vec<TierOutcomeCell>, TrainingDatapointRepoError> {
        let (where_sql, values) = filter_clause(filter);
        let sql =
            format!("SELECT tier, outcome, COUNT(*) FROM training_datapoints{where_sql} GROUP BY tier, outcome");
        let rows = self
            .with_read(|conn| {
                let mut stmt = conn.prepare(&sql)?;
                stmt.query_map(rusqlite::params_from_iter(values.iter()), |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?, row.get::<_, i64>(2)?))
                })?
                .collect::<rusqlite::Result<Vec<_>>>()
            })
            .map_err(to_store_err)?;
        let cells = rows
            .into_iter()
            .filter_map(|(tier_label, outcome_label, count)| {
                let tier = tier_from_label(&tier_label)?;
                let outcome = outcome_from_label(&outcome_label)?;
                Some(TierOutcomeCell { tier, outcome, count: count.try_into().unwrap_or(0) })
            })
            .collect();
        Ok(cells)
    }

    async fn count(&self, filter: &TrainingDatapointFilter) -> Result<u64, TrainingDatapointRepoError> {
        let (where_sql, values) = filter_clause(filter);
        let sql = format!("SELECT COUNT(*) FROM training_datapoints{where_sql}");
        let count: i64 = self
            .with_read(|conn| {
                conn.query_row(&sql, rusqlite::params_from_iter(values.iter()), |row| row.get(0))
            })
            .map_err(to_store_err)?;
        Ok(count.try_into().unwrap_or(0))
    }

    async fn readiness(&self) -> Result<(), TrainingDatapointRepoError> {
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

    use ava_core::identifiers::InterventionId;
    use ava_core::identifiers::SessionId;
    use ava_core::identifiers::SiteUrl;
    use ava_core::identifiers::TrainingDatapointId;
    use ava_core::model::event::DeviceType;
    use ava_core::model::event::PageType;
    use ava_core::model::event::ReferrerType;
    use ava_core::model::evaluation::Decision;
    use ava_core::model::evaluation::MswimSignals;
    use ava_core::model::intervention::InterventionType;
    use ava_core::model::scoring_config::SignalWeights;
    use ava_core::model::training_datapoint::SessionContextSnapshot;
    use time::macros::datetime;

    use super::*;
    use crate::connection::SqliteStoreConfig;

    fn sample_datapoint(id: &str, intervention_id: &str, outcome: OutcomeLabel) -> TrainingDatapoint {
        TrainingDatapoint {
            id: TrainingDatapointId::from(id),
            intervention_id: InterventionId::from(intervention_id),
            session_id: SessionId::from("s-1"),
            session_context: SessionContextSnapshot {
                site_url: SiteUrl::from("https://shop.example.com"),
                device_type: DeviceType::Desktop,
                referrer_type: ReferrerType::Direct,
                is_logged_in: false,
                is_repeat_visitor: false,
                cart_value: 0.0,
                cart_item_count: 0,
                session_age_sec: 120,
                page_type: PageType::Cart,
            },
            narrative: None,
            detected_frictions: Vec::new(),
            signals: MswimSignals::new(50, 50, 50, 50, 50),
            composite_score: 50.0,
            weights_used: SignalWeights::defaults(),
            decision: Decision::Fire,
            gate_override: None,
            intervention_type: InterventionType::Nudge,
            action_code: "cart_reminder".to_owned(),
            friction_id: None,
            outcome,
            conversion_action: None,
            outcome_delay_ms: 1000,
            created_at: datetime!(2026-01-01 00:00:00 UTC),
            tier_at_fire: Tier::Nudge,
        }
    }

    #[tokio::test]
    async fn create_is_idempotent_on_intervention_id() {
        let store = SqliteStore::open(SqliteStoreConfig::in_memory()).expect("open");
        let datapoint = sample_datapoint("td-1", "i-1", OutcomeLabel::Converted);
        store.create(datapoint.clone()).await.expect("create");
        store.create(datapoint).await.expect("duplicate create is a no-op");
        let count = store.count(&TrainingDatapointFilter::default()).await.expect("count");
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn outcome_distribution_counts_by_outcome() {
        let store = SqliteStore::open(SqliteStoreConfig::in_memory()).expect("open");
        store
            .create(sample_datapoint("td-2", "i-2", OutcomeLabel::Converted))
            .await
            .expect("create");
        store
            .create(sample_datapoint("td-3", "i-3", OutcomeLabel::Dismissed))
            .await
            .expect("create");
        let distribution = store
            .outcome_distribution(&TrainingDatapointFilter::default())
            .await
            .expect("distribution");
        assert_eq!(distribution.counts.len(), 2);
    }
}
