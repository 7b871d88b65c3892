// crates/ava-store-sqlite/src/repos/drift.rs
// ============================================================================
// Module: Drift Repo
// Description: SqliteStore's implementation of ava_core::repo::DriftSnapshotRepo
//              and ava_core::repo::DriftAlertRepo.
// ============================================================================

use async_trait::async_trait;
use ava_core::identifiers::DriftAlertId;
use ava_core::identifiers::SiteUrl;
use ava_core::model::drift::DriftAlert;
use ava_core::model::drift::DriftAlertType;
use ava_core::model::drift::DriftSnapshot;
use ava_core::model::drift::WindowType;
use ava_core::repo::DriftAlertRepo;
use ava_core::repo::DriftRepoError;
use ava_core::repo::DriftSnapshotRepo;
use rusqlite::OptionalExtension;
use rusqlite::params;
use time::OffsetDateTime;

use crate::codec::decode;
use crate::codec::encode;
use crate::store::SqliteStore;
use crate::time_fmt::rfc3339;

fn to_store_err(err: crate::error::SqliteStoreError) -> DriftRepoError {
    DriftRepoError::Store(err.as_store_message())
}

fn row_entity(row: &rusqlite::Row<'_>) -> rusqlite::Result<(Vec<u8>, String)> {
    Ok((row.get(0)?, row.get(1)?))
}

const fn window_type_label(window_type: WindowType) -> &'static str {
    match window_type {
        WindowType::OneHour => "one_hour",
        WindowType::TwentyFourHours => "twenty_four_hours",
        WindowType::SevenDays => "seven_days",
    }
}

const fn alert_type_label(alert_type: DriftAlertType) -> &'static str {
    match alert_type {
        DriftAlertType::TierAgreementLow => "TIER_AGREEMENT_LOW",
        DriftAlertType::DecisionAgreementLow => "DECISION_AGREEMENT_LOW",
        DriftAlertType::CompositeDivergenceHigh => "COMPOSITE_DIVERGENCE_HIGH",
        DriftAlertType::SignalShift => "SIGNAL_SHIFT",
        DriftAlertType::ConversionDrop => "CONVERSION_DROP",
    }
}

#[async_trait]
impl DriftSnapshotRepo for SqliteStore {
    async fn create(&self, snapshot: DriftSnapshot) -> Result<(), DriftRepoError> {
        let (bytes, hash) = encode(&snapshot).map_err(to_store_err)?;
        self.with_write(|conn| {
            conn.execute(
                "INSERT INTO drift_snapshots (id, window_type, site_url, window_end, json, hash)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    snapshot.id.as_str(),
                    window_type_label(snapshot.window_type),
                    snapshot.site_url.as_ref().map(SiteUrl::as_str),
                    rfc3339(snapshot.window_end),
                    bytes,
                    hash,
                ],
            )
        })
        .map_err(to_store_err)
    }

    async fn list(
        &self,
        window_type: WindowType,
        site_url: Option<&SiteUrl>,
    ) -> Result<Vec<DriftSnapshot>, DriftRepoError> {
        let rows = self
            .with_read(|conn| match site_url {
                Some(site_url) => {
                    let mut stmt = conn.prepare(
                        "SELECT json, hash FROM drift_snapshots
                         WHERE window_type = ?1 AND site_url = ?2
                         ORDER BY window_end DESC",
                    )?;
                    stmt.query_map(params![window_type_label(window_type), site_url.as_str()], row_entity)?
                        .collect::<rusqlite::Result<Vec<_>>>()
                }
                None => {
                    let mut stmt = conn.prepare(
                        "SELECT json, hash FROM drift_snapshots
                         WHERE window_type = ?1 AND site_url IS NULL
                         ORDER BY window_end DESC",
                    )?;
                    stmt.query_map(params![window_type_label(window_type)], row_entity)?
                        .collect::<rusqlite::Result<Vec<_>>>()
                }
            })
            .map_err(to_store_err)?;
        rows.into_iter()
            .map(|(bytes, hash)| decode(&bytes, &hash).map_err(to_store_err))
            .collect()
    }

    async fn prune_older_than(&self, older_than: OffsetDateTime) -> Result<u64, DriftRepoError> {
        let deleted = self
            .with_write(|conn| {
                conn.execute("DELETE FROM drift_snapshots WHERE window_end < ?1", params![rfc3339(older_than)])
            })
            .map_err(to_store_err)?;
        Ok(deleted.try_into().unwrap_or(0))
    }

    async fn readiness(&self) -> Result<(), DriftRepoError> {
        self.with_read(|conn| conn.query_row("SELECT 1", [], |_| Ok(())))
            .map_err(to_store_err)
    }
}

#[async_trait]
impl DriftAlertRepo for SqliteStore {
    async fn create(&self, alert: DriftAlert) -> Result<(), DriftRepoError> {
        let (bytes, hash) = encode(&alert).map_err(to_store_err)?;
        self.with_write(|conn| {
            conn.execute(
                "INSERT INTO drift_alerts (id, alert_type, site_url, acknowledged, detected_at, json, hash)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    alert.id.as_str(),
                    alert_type_label(alert.alert_type),
                    alert.site_url.as_ref().map(SiteUrl::as_str),
                    i64::from(alert.acknowledged),
                    rfc3339(alert.detected_at),
                    bytes,
                    hash,
                ],
            )
        })
        .map_err(to_store_err)
    }

    async fn list(&self, unacknowledged_only: bool) -> Result<Vec<DriftAlert>, DriftRepoError> {
        let rows = self
            .with_read(|conn| {
                if unacknowledged_only {
                    let mut stmt = conn.prepare(
                        "SELECT json, hash FROM drift_alerts WHERE acknowledged = 0 ORDER BY detected_at DESC",
                    )?;
                    stmt.query_map([], row_entity)?.collect::<rusqlite::Result<Vec<_>>>()
                } else {
                    let mut stmt =
                        conn.prepare("SELECT json, hash FROM drift_alerts ORDER BY detected_at DESC")?;
                    stmt.query_map([], row_entity)?.collect::<rusqlite::Result<Vec<_>>>()
                }
            })
            .map_err(to_store_err)?;
        rows.into_iter()
            .map(|(bytes, hash)| decode(&bytes, &hash).map_err(to_store_err))
            .collect()
    }

    async fn find_unacknowledged(
        &self,
        alert_type: DriftAlertType,
        site_url: Option<&SiteUrl>,
    ) -> Result<Option<DriftAlert>, DriftRepoError> {
        let row = self
            .with_read(|conn| match site_url {
                Some(site_url) => conn
                    .query_row(
                        "SELECT json, hash FROM drift_alerts
                         WHERE alert_type = ?1 AND site_url = ?2 AND acknowledged = 0",
                        params![alert_type_label(alert_type), site_url.as_str()],
                        row_entity,
                    )
                    .optional(),
                None => conn
                    .query_row(
                        "SELECT json, hash FROM drift_alerts
                         WHERE alert_type = ?1 AND site_url IS NULL AND acknowledged = 0",
                        params![alert_type_label(alert_type)],
                        row_entity,
                    )
                    .optional(),
            })
            .map_err(to_store_err)?;
        match row {
            Some((bytes, hash)) => Ok(Some(decode(&bytes, &hash).map_err(to_store_err)?)),
            None => Ok(None),
        }
    }

    async fn acknowledge(&self, id: &DriftAlertId, at: OffsetDateTime) -> Result<(), DriftRepoError> {
        let row = self
            .with_read(|conn| {
                conn.query_row(
                    "SELECT json, hash FROM drift_alerts WHERE id = ?1",
                    params![id.as_str()],
                    row_entity,
                )
                .optional()
            })
            .map_err(to_store_err)?;
        let (bytes, hash) = row.ok_or(DriftRepoError::NotFound)?;
        let mut alert: DriftAlert = decode(&bytes, &hash).map_err(to_store_err)?;
        alert.acknowledged = true;
        alert.acknowledged_at = Some(at);
        let (bytes, hash) = encode(&alert).map_err(to_store_err)?;
        self.with_write(|conn| {
            conn.execute(
                "UPDATE drift_alerts SET acknowledged = 1, json = ?2, hash = ?3 WHERE id = ?1",
                params![id.as_str(), bytes, hash],
            )
        })
        .map_err(to_store_err)?;
        Ok(())
    }

    async fn prune_older_than(&self, older_than: OffsetDateTime) -> Result<u64, DriftRepoError> {
        let deleted = self
            .with_write(|conn| {
                conn.execute("DELETE FROM drift_alerts WHERE detected_at < ?1", params![rfc3339(older_than)])
            })
            .map_err(to_store_err)?;
        Ok(deleted.try_into().unwrap_or(0))
    }

    async fn readiness(&self) -> Result<(), DriftRepoError> {
        self.with_read(|conn| conn.query_row("SELECT 1", [], |_| Ok(())))
            .map_err(to_store_err)
    }
}
