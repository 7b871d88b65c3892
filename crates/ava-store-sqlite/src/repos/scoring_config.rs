// crates/ava-store-sqlite/src/repos/scoring_config.rs
// ============================================================================
// Module: Scoring Config Repo
// Description: SqliteStore's implementation of ava_core::repo::ScoringConfigRepo.
// ============================================================================

use async_trait::async_trait;
use ava_core::identifiers::ScoringConfigId;
use ava_core::identifiers::SiteUrl;
use ava_core::model::scoring_config::ScoringConfig;
use ava_core::repo::ScoringConfigRepo;
use ava_core::repo::ScoringConfigRepoError;
use rusqlite::OptionalExtension;
use rusqlite::params;

use crate::codec::decode;
use crate::codec::encode;
use crate::store::SqliteStore;

fn to_store_err(err: crate::error::SqliteStoreError) -> ScoringConfigRepoError {
    ScoringConfigRepoError::Store(err.as_store_message())
}

fn row_entity(row: &rusqlite::Row<'_>) -> rusqlite::Result<(Vec<u8>, String)> {
    Ok((row.get(0)?, row.get(1)?))
}

fn to_rusqlite_err(err: crate::error::SqliteStoreError) -> rusqlite::Error {
    rusqlite::Error::ToSqlConversionFailure(Box::new(err))
}

fn save(conn: &rusqlite::Connection, config: &ScoringConfig) -> rusqlite::Result<()> {
    let (bytes, hash) = encode(config).map_err(to_rusqlite_err)?;
    conn.execute(
        "INSERT INTO scoring_configs (id, site_url, is_active, json, hash)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(id) DO UPDATE SET
            site_url = excluded.site_url,
            is_active = excluded.is_active,
            json = excluded.json,
            hash = excluded.hash",
        params![
            config.id.as_str(),
            config.site_url.as_ref().map(SiteUrl::as_str),
            i64::from(config.is_active),
            bytes,
            hash,
        ],
    )?;
    Ok(())
}

fn load_by_id(conn: &rusqlite::Connection, id: &ScoringConfigId) -> rusqlite::Result<Option<(Vec<u8>, String)>> {
    conn.query_row(
        "SELECT json, hash FROM scoring_configs WHERE id = ?1",
        params![id.as_str()],
        row_entity,
    )
    .optional()
}

#[async_trait]
impl ScoringConfigRepo for SqliteStore {
    async fn list(&self, site_url: Option<&SiteUrl>) -> Result<Vec<ScoringConfig>, ScoringConfigRepoError> {
        let rows = self
            .with_read(|conn| match site_url {
                Some(site_url) => {
                    let mut stmt =
                        conn.prepare("SELECT json, hash FROM scoring_configs WHERE site_url = ?1")?;
                    stmt.query_map(params![site_url.as_str()], row_entity)?
                        .collect::<rusqlite::Result<Vec<_>>>()
                }
                None => {
                    let mut stmt =
                        conn.prepare("SELECT json, hash FROM scoring_configs WHERE site_url IS NULL")?;
                    stmt.query_map([], row_entity)?.collect::<rusqlite::Result<Vec<_>>>()
                }
            })
            .map_err(to_store_err)?;
        rows.into_iter()
            .map(|(bytes, hash)| decode(&bytes, &hash).map_err(to_store_err))
            .collect()
    }

    async fn get(&self, id: &ScoringConfigId) -> Result<ScoringConfig, ScoringConfigRepoError> {
        let row = self.with_read(|conn| load_by_id(conn, id)).map_err(to_store_err)?;
        let (bytes, hash) = row.ok_or(ScoringConfigRepoError::NotFound)?;
        decode(&bytes, &hash).map_err(to_store_err)
    }

    async fn create(&self, config: ScoringConfig) -> Result<(), ScoringConfigRepoError> {
        self.with_write(|conn| save(conn, &config)).map_err(to_store_err)
    }

    async fn update(&self, config: ScoringConfig) -> Result<(), ScoringConfigRepoError> {
        self.with_write(|conn| save(conn, &config)).map_err(to_store_err)
    }

    async fn activate(&self, id: &ScoringConfigId) -> Result<(), ScoringConfigRepoError> {
        let target = self.get(id).await?;
        let scope = target.site_url.clone();
        self.with_write(|conn| {
            let rows = match &scope {
                Some(site_url) => {
                    let mut stmt =
                        conn.prepare("SELECT json, hash FROM scoring_configs WHERE site_url = ?1")?;
                    stmt.query_map(params![site_url.as_str()], row_entity)?
                        .collect::<rusqlite::Result<Vec<_>>>()?
                }
                None => {
                    let mut stmt =
                        conn.prepare("SELECT json, hash FROM scoring_configs WHERE site_url IS NULL")?;
                    stmt.query_map([], row_entity)?.collect::<rusqlite::Result<Vec<_>>>()?
                }
            };
            for (bytes, hash) in rows {
                let mut config: ScoringConfig = decode(&bytes, &hash).map_err(to_rusqlite_err)?;
                config.is_active = config.id == *id;
                save(conn, &config)?;
            }
            Ok(())
        })
        .map_err(to_store_err)
    }

    async fn delete(&self, id: &ScoringConfigId) -> Result<(), ScoringConfigRepoError> {
        let config = self.get(id).await?;
        if config.is_active {
            return Err(ScoringConfigRepoError::Store(
                "refusing to delete the active scoring config".to_owned(),
            ));
        }
        self.with_write(|conn| conn.execute("DELETE FROM scoring_configs WHERE id = ?1", params![id.as_str()]))
            .map_err(to_store_err)?;
        Ok(())
    }

    async fn get_active_config(&self, site_url: &SiteUrl) -> Result<ScoringConfig, ScoringConfigRepoError> {
        let row = self
            .with_read(|conn| {
                conn.query_row(
                    "SELECT json, hash FROM scoring_configs WHERE site_url = ?1 AND is_active = 1",
                    params![site_url.as_str()],
                    row_entity,
                )
                .optional()
            })
            .map_err(to_store_err)?;
        if let Some((bytes, hash)) = row {
            return decode(&bytes, &hash).map_err(to_store_err);
        }
        let global = self
            .with_read(|conn| {
                conn.query_row(
                    "SELECT json, hash FROM scoring_configs WHERE site_url IS NULL AND is_active = 1",
                    [],
                    row_entity,
                )
                .optional()
            })
            .map_err(to_store_err)?;
        let (bytes, hash) = global.ok_or(ScoringConfigRepoError::NotFound)?;
        decode(&bytes, &hash).map_err(to_store_err)
    }

    async fn readiness(&self) -> Result<(), ScoringConfigRepoError> {
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

    use ava_core::model::scoring_config::GateConfig;
    use ava_core::model::scoring_config::SignalWeights;
    use ava_core::model::scoring_config::TierThresholds;

    use super::*;
    use crate::connection::SqliteStoreConfig;

    fn sample_config(id: &str, site_url: Option<&str>, is_active: bool) -> ScoringConfig {
        ScoringConfig {
            id: ScoringConfigId::from(id),
            site_url: site_url.map(SiteUrl::from),
            is_active,
            weights: SignalWeights::defaults(),
            tier_thresholds: TierThresholds::defaults(),
            gate_config: GateConfig::defaults(),
        }
    }

    #[tokio::test]
    async fn activate_deactivates_siblings_in_scope() {
        let store = SqliteStore::open(SqliteStoreConfig::in_memory()).expect("open");
        let first = sample_config("c-1", Some("https://shop.example.com"), true);
        let second = sample_config("c-2", Some("https://shop.example.com"), false);
        store.create(first.clone()).await.expect("create first");
        store.create(second.clone()).await.expect("create second");
        store.activate(&second.id).await.expect("activate second");
        let refreshed_first = store.get(&first.id).await.expect("get first");
        let refreshed_second = store.get(&second.id).await.expect("get second");
        assert!(!refreshed_first.is_active);
        assert!(refreshed_second.is_active);
    }

    #[tokio::test]
    async fn get_active_config_falls_back_to_global() {
        let store = SqliteStore::open(SqliteStoreConfig::in_memory()).expect("open");
        let global = sample_config("global-1", None, true);
        store.create(global).await.expect("create global");
        let resolved = store
            .get_active_config(&SiteUrl::from("https://shop.example.com"))
            .await
            .expect("resolve");
        assert_eq!(resolved.id.as_str(), "global-1");
    }

    #[tokio::test]
    async fn delete_refuses_to_remove_active_config() {
        let store = SqliteStore::open(SqliteStoreConfig::in_memory()).expect("open");
        let config = sample_config("c-3", None, true);
        store.create(config.clone()).await.expect("create");
        let result = store.delete(&config.id).await;
        assert!(result.is_err());
    }
}
