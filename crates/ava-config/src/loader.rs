// crates/ava-config/src/loader.rs
// ============================================================================
// Module: Config Loader
// Description: Per-site + optional-id ScoringConfig resolution with a 60s
//              TTL cache, explicitly invalidated on admin writes.
// ============================================================================

//! `load(site_url?, config_id?)`: cache keyed by
//! `(site_url||"global") + ":" + (config_id||"active")`, entry TTL 60s. On
//! a cache miss: if `config_id` is given, fetch by id; otherwise fetch the
//! active config for `site_url`, falling back to the global active config,
//! falling back to the built-in defaults. A persistence error also falls
//! back to the built-in defaults and is recorded through [`Telemetry`].

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use ava_core::identifiers::ScoringConfigId;
use ava_core::identifiers::SiteUrl;
use ava_core::model::scoring_config::ScoringConfig;
use ava_core::repo::ScoringConfigRepo;
use ava_core::telemetry::Telemetry;
use time::OffsetDateTime;

const CACHE_TTL: Duration = Duration::from_secs(60);

#[derive(Clone)]
struct CacheEntry {
    config: ScoringConfig,
    cached_at: OffsetDateTime,
}

fn cache_key(site_url: Option<&SiteUrl>, config_id: Option<&ScoringConfigId>) -> String {
    let scope = site_url.map_or_else(|| "global".to_owned(), ToString::to_string);
    let selector = config_id.map_or_else(|| "active".to_owned(), ToString::to_string);
    format!("{scope}:{selector}")
}

/// A process-wide, mutex-protected [`ScoringConfig`] cache backed by a
/// [`ScoringConfigRepo`].
///
/// Reads are expected to far outnumber writes; [`ConfigLoader::invalidate`]
/// clears the whole cache rather than a single key, matching the documented
/// "admin edit invalidates everything" contract.
pub struct ConfigLoader {
    repo: Arc<dyn ScoringConfigRepo>,
    telemetry: Arc<dyn Telemetry>,
    cache: Mutex<HashMap<String, CacheEntry>>,
}

impl ConfigLoader {
    /// Builds a loader over `repo`, reporting fallback events through
    /// `telemetry`.
    #[must_use]
    pub fn new(repo: Arc<dyn ScoringConfigRepo>, telemetry: Arc<dyn Telemetry>) -> Self {
        Self {
            repo,
            telemetry,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Resolves a [`ScoringConfig`] for `site_url` (or the global scope)
    /// and `config_id` (or the active config), consulting the TTL cache
    /// first.
    pub async fn load(&self, site_url: Option<&SiteUrl>, config_id: Option<&ScoringConfigId>) -> ScoringConfig {
        let key = cache_key(site_url, config_id);
        let now = OffsetDateTime::now_utc();

        if let Some(entry) = self.cached(&key, now) {
            return entry;
        }

        let resolved = self.resolve(site_url, config_id).await;
        self.insert(key, resolved.clone(), now);
        resolved
    }

    fn cached(&self, key: &str, now: OffsetDateTime) -> Option<ScoringConfig> {
        #[allow(
            clippy::unwrap_used,
            reason = "a poisoned cache mutex indicates a prior panic elsewhere in the process"
        )]
        let cache = self.cache.lock().unwrap();
        cache.get(key).and_then(|entry| {
            let age = now - entry.cached_at;
            if age < time::Duration::seconds(i64::try_from(CACHE_TTL.as_secs()).unwrap_or(60)) {
                Some(entry.config.clone())
            } else {
                None
            }
        })
    }

    fn insert(&self, key: String, config: ScoringConfig, now: OffsetDateTime) {
        #[allow(
            clippy::unwrap_used,
            reason = "a poisoned cache mutex indicates a prior panic elsewhere in the process"
        )]
        let mut cache = self.cache.lock().unwrap();
        cache.insert(key, CacheEntry { config, cached_at: now });
    }

    async fn resolve(&self, site_url: Option<&SiteUrl>, config_id: Option<&ScoringConfigId>) -> ScoringConfig {
        if let Some(id) = config_id {
            match self.repo.get(id).await {
                Ok(config) => return config,
                Err(_) => return self.fallback_default(),
            }
        }

        let Some(site_url) = site_url else {
            return self.global_active_or_default().await;
        };

        match self.repo.get_active_config(site_url).await {
            Ok(config) => config,
            Err(_) => self.global_active_or_default().await,
        }
    }

    async fn global_active_or_default(&self) -> ScoringConfig {
        match self.repo.list(None).await {
            Ok(configs) => configs
                .into_iter()
                .find(|config| config.is_active)
                .unwrap_or_else(|| self.fallback_default()),
            Err(_) => self.fallback_default(),
        }
    }

    fn fallback_default(&self) -> ScoringConfig {
        self.telemetry.persistence_retry_exhausted(ava_core::telemetry::PersistenceRetryExhausted {
            operation: "ScoringConfigRepo::resolve",
            session_id: None,
        });
        ScoringConfig::builtin_default()
    }

    /// Flushes the entire cache, forcing the next [`ConfigLoader::load`]
    /// call for every key to re-read the store.
    pub fn invalidate(&self) {
        #[allow(
            clippy::unwrap_used,
            reason = "a poisoned cache mutex indicates a prior panic elsewhere in the process"
        )]
        let mut cache = self.cache.lock().unwrap();
        cache.clear();
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

    use std::sync::Arc;

    use async_trait::async_trait;
    use ava_core::identifiers::ScoringConfigId;
    use ava_core::identifiers::SiteUrl;
    use ava_core::model::scoring_config::ScoringConfig;
    use ava_core::repo::ScoringConfigRepo;
    use ava_core::repo::ScoringConfigRepoError;
    use ava_core::telemetry::NoopTelemetry;

    use super::ConfigLoader;

    struct StubRepo {
        configs: Vec<ScoringConfig>,
    }

    #[async_trait]
    impl ScoringConfigRepo for StubRepo {
        async fn list(&self, _site_url: Option<&SiteUrl>) -> Result<Vec<ScoringConfig>, ScoringConfigRepoError> {
            Ok(self.configs.clone())
        }

        async fn get(&self, id: &ScoringConfigId) -> Result<ScoringConfig, ScoringConfigRepoError> {
            self.configs
                .iter()
                .find(|c| &c.id == id)
                .cloned()
                .ok_or(ScoringConfigRepoError::NotFound)
        }

        async fn create(&self, _config: ScoringConfig) -> Result<(), ScoringConfigRepoError> {
            Ok(())
        }

        async fn update(&self, _config: ScoringConfig) -> Result<(), ScoringConfigRepoError> {
            Ok(())
        }

        async fn activate(&self, _id: &ScoringConfigId) -> Result<(), ScoringConfigRepoError> {
            Ok(())
        }

        async fn delete(&self, _id: &ScoringConfigId) -> Result<(), ScoringConfigRepoError> {
            Ok(())
        }

        async fn get_active_config(&self, _site_url: &SiteUrl) -> Result<ScoringConfig, ScoringConfigRepoError> {
            self.configs
                .iter()
                .find(|c| c.is_active)
                .cloned()
                .ok_or(ScoringConfigRepoError::NotFound)
        }
    }

    #[tokio::test]
    async fn falls_back_to_builtin_default_when_store_empty() {
        let repo = Arc::new(StubRepo { configs: Vec::new() });
        let loader = ConfigLoader::new(repo, Arc::new(NoopTelemetry));
        let config = loader.load(Some(&SiteUrl::from("https://example.com")), None).await;
        assert_eq!(config.id.as_str(), "builtin-default");
    }

    #[tokio::test]
    async fn resolves_active_config_for_site() {
        let mut active = ScoringConfig::builtin_default();
        active.id = ScoringConfigId::from("site-active");
        let repo = Arc::new(StubRepo { configs: vec![active] });
        let loader = ConfigLoader::new(repo, Arc::new(NoopTelemetry));
        let config = loader.load(Some(&SiteUrl::from("https://example.com")), None).await;
        assert_eq!(config.id.as_str(), "site-active");
    }

    #[tokio::test]
    async fn invalidate_clears_cached_entries() {
        let mut active = ScoringConfig::builtin_default();
        active.id = ScoringConfigId::from("v1");
        let repo = Arc::new(StubRepo { configs: vec![active] });
        let loader = ConfigLoader::new(repo, Arc::new(NoopTelemetry));
        let site = SiteUrl::from("https://example.com");
        let first = loader.load(Some(&site), None).await;
        assert_eq!(first.id.as_str(), "v1");
        loader.invalidate();
        let second = loader.load(Some(&site), None).await;
        assert_eq!(second.id.as_str(), "v1");
    }
}
