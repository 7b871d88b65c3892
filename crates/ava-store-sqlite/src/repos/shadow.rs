// crates/ava-store-sqlite/src/repos/shadow.rs
// ============================================================================
// Module: Shadow Comparison Repo
// Description: SqliteStore's implementation of
//              ava_core::repo::ShadowComparisonRepo.
// ============================================================================

use async_trait::async_trait;
use ava_core::identifiers::SiteUrl;
use ava_core::model::shadow::ShadowComparison;
use ava_core::repo::ShadowComparisonFilter;
use ava_core::repo::ShadowComparisonRepo;
use ava_core::repo::ShadowComparisonRepoError;
use ava_core::repo::ShadowComparisonStats;
use rusqlite::params;
use rusqlite::types::Value;
use time::OffsetDateTime;

use crate::codec::decode;
use crate::codec::encode;
use crate::store::SqliteStore;
use crate::time_fmt::rfc3339;

fn to_store_err(err: crate::error::SqliteStoreError) -> ShadowComparisonRepoError {
    ShadowComparisonRepoError::Store(err.as_store_message())
}

fn row_entity(row: &rusqlite::Row<'_>) -> rusqlite::Result<(Vec<u8>, String)> {
    Ok((row.get(0)?, row.get(1)?))
}

fn filter_clause(filter: &ShadowComparisonFilter) -> (String, Vec<Value>) {
    let mut clauses = Vec::new();
    let mut values = Vec::new();
    if let Some(session_id) = &filter.session_id {
        clauses.push("session_id = ?");
        values.push(Value::Text(session_id.as_str().to_owned()));
    }
    if let Some(tier_match) = filter.tier_match {
        clauses.push("tier_match = ?");
        values.push(Value::Integer(i64::from(tier_match)));
    }
    if let Some(decision_match) = filter.decision_match {
        clauses.push("decision_match = ?");
        values.push(Value::Integer(i64::from(decision_match)));
    }
    if let Some(min_divergence) = filter.min_divergence {
        clauses.push("composite_divergence >= ?");
        values.push(Value::Real(min_divergence));
    }
    let sql = if clauses.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", clauses.join(" AND "))
    };
    (sql, values)
}

#[async_trait]
impl ShadowComparisonRepo for SqliteStore {
    async fn create(&self, comparison: ShadowComparison) -> Result<(), ShadowComparisonRepoError> {
        let (bytes, hash) = encode(&comparison).map_err(to_store_err)?;
        self.with_write(|conn| {
            conn.execute(
                "INSERT INTO shadow_comparisons
                    (id, session_id, site_url, tier_match, decision_match, composite_divergence, recorded_at, json, hash)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    comparison.id.as_str(),
                    comparison.session_id.as_str(),
                    comparison.site_url.as_str(),
                    i64::from(comparison.tier_match),
                    i64::from(comparison.decision_match),
                    comparison.composite_divergence,
                    rfc3339(comparison.recorded_at),
                    bytes,
                    hash,
                ],
            )
        })
        .map_err(to_store_err)
    }

    async fn list(&self, filter: &ShadowComparisonFilter) -> Result<Vec<ShadowComparison>, ShadowComparisonRepoError> {
        let (where_sql, values) = filter_clause(filter);
        let sql = format!("SELECT json, hash FROM shadow_comparisons{where_sql} ORDER BY recorded_at DESC");
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

    async fn stats(
        &self,
        site_url: Option<&SiteUrl>,
        since: OffsetDateTime,
    ) -> Result<ShadowComparisonStats, ShadowComparisonRepoError> {
        let (where_sql, mut values) = scope_clause(site_url);
        values.push(Value::Text(rfc3339(since)));
        let recorded_filter = if where_sql.is_empty() { " WHERE recorded_at >= ?" } else { " AND recorded_at >= ?" };
        let sql = format!(
            "SELECT COUNT(*), COALESCE(AVG(composite_divergence), 0.0),
                    COALESCE(AVG(tier_match), 0.0), COALESCE(AVG(decision_match), 0.0)
             FROM shadow_comparisons{where_sql}{recorded_filter}"
        );
        let (sample_size, avg_divergence, tier_rate, decision_rate): (i64, f64, f64, f64) = self
            .with_read(|conn| {
                conn.query_row(&sql, rusqlite::params_from_iter(values.iter()), |row| {
                    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
                })
            })
            .map_err(to_store_err)?;
        Ok(ShadowComparisonStats {
            sample_size: sample_size.try_into().unwrap_or(0),
            avg_composite_divergence: avg_divergence,
            tier_agreement_rate: tier_rate,
            decision_agreement_rate: decision_rate,
        })
    }

    async fn top_divergences(
        &self,
        since: OffsetDateTime,
        limit: usize,
    ) -> Result<Vec<ShadowComparison>, ShadowComparisonRepoError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = self
            .with_read(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT json, hash FROM shadow_comparisons
                     WHERE recorded_at >= ?1
                     ORDER BY composite_divergence DESC
                     LIMIT ?2",
                )?;
                stmt.query_map(params![rfc3339(since), limit], row_entity)?
                    .collect::<rusqlite::Result<Vec<_>>>()
            })
            .map_err(to_store_err)?;
        rows.into_iter()
            .map(|(bytes, hash)| decode(&bytes, &hash).map_err(to_store_err))
            .collect()
    }

    async fn readiness(&self) -> Result<(), ShadowComparisonRepoError> {
        self.with_read(|conn| conn.query_row("SELECT 1", [], |_| Ok(())))
            .map_err(to_store_err)
    }
}

fn scope_clause(site_url: Option<&SiteUrl>) -> (String, Vec<Value>) {
    match site_url {
        Some(site_url) => (" WHERE site_url = ?".to_owned(), vec![Value::Text(site_url.as_str().to_owned())]),
        None => (String::new(), Vec::new()),
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

    use ava_core::identifiers::SessionId;
    use ava_core::identifiers::ShadowComparisonId;
    use ava_core::model::evaluation::Decision;
    use ava_core::model::evaluation::MswimResult;
    use ava_core::model::evaluation::MswimSignals;
    use ava_core::model::evaluation::Tier;
    use ava_core::model::scoring_config::SignalWeights;
    use ava_core::model::shadow::ShadowSide;
    use time::macros::datetime;

    use super::*;
    use crate::connection::SqliteStoreConfig;

    fn side(composite: f64, tier: Tier) -> ShadowSide {
        ShadowSide {
            result: MswimResult {
                signals: MswimSignals::new(50, 50, 50, 50, 50),
                weights_used: SignalWeights::defaults(),
                composite_score: composite,
                tier,
                gate_override: None,
                decision: Decision::Fire,
                reasoning: "test".to_owned(),
            },
        }
    }

    #[tokio::test]
    async fn stats_aggregate_over_recorded_comparisons() {
        let store = SqliteStore::open(SqliteStoreConfig::in_memory()).expect("open");
        let comparison = ShadowComparison::from_sides(
            ShadowComparisonId::from("sc-1"),
            SessionId::from("s-1"),
            SiteUrl::from("https://shop.example.com"),
            None,
            side(60.0, Tier::Nudge),
            side(65.0, Tier::Nudge),
            datetime!(2026-01-01 00:00:00 UTC),
        );
        store.create(comparison).await.expect("create");
        let stats = store
            .stats(Some(&SiteUrl::from("https://shop.example.com")), datetime!(2025-12-31 00:00:00 UTC))
            .await
            .expect("stats");
        assert_eq!(stats.sample_size, 1);
        assert!((stats.tier_agreement_rate - 1.0).abs() < f64::EPSILON);
    }
}
