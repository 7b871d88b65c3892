// crates/ava-config/src/boot.rs
// ============================================================================
// Module: Boot Configuration
// Description: Environment-derived process configuration, validated once at
//              startup and never reloaded without a restart.
// ============================================================================

//! Distinct from [`crate::loader::ConfigLoader`]'s per-site
//! [`ava_core::model::scoring_config::ScoringConfig`], which can change at
//! runtime. `AvaConfig` covers ports, generative-model credentials, MSWIM
//! defaults, batch sizes, drift thresholds, and job-runner timers. A
//! validation failure here is a `ConfigurationError` and the process aborts
//! at boot.

use std::env;
use std::time::Duration;

use ava_core::error::AvaError;
use ava_core::model::experiment::EvalEngine;
use ava_core::model::scoring_config::GateConfig;
use ava_core::model::scoring_config::SignalWeights;
use ava_core::model::scoring_config::TierThresholds;

/// Drift-detection thresholds read at boot.
#[derive(Debug, Clone, Copy)]
pub struct DriftThresholds {
    /// Minimum acceptable tier-agreement rate before a warning is raised.
    pub tier_agreement_floor: f64,
    /// Minimum acceptable decision-agreement rate before a warning is raised.
    pub decision_agreement_floor: f64,
    /// Maximum acceptable mean composite divergence before a warning is raised.
    pub max_composite_divergence: f64,
    /// Minimum per-signal mean shift, vs. the 7-day baseline, to warn.
    pub signal_shift_threshold: f64,
    /// Minimum conversion-rate drop, vs. the 7-day baseline, to critically alert.
    pub conversion_rate_drop_percent: f64,
    /// Days a drift snapshot or alert is retained before pruning.
    pub retention_days: u32,
}

impl DriftThresholds {
    /// The documented defaults.
    #[must_use]
    pub const fn defaults() -> Self {
        Self {
            tier_agreement_floor: 0.70,
            decision_agreement_floor: 0.75,
            max_composite_divergence: 15.0,
            signal_shift_threshold: 10.0,
            conversion_rate_drop_percent: 0.20,
            retention_days: 90,
        }
    }
}

/// Generative-model endpoint and credentials.
#[derive(Debug, Clone)]
pub struct GenerativeModelConfig {
    /// API key used to authenticate with the generative-model endpoint.
    pub api_key: String,
    /// Model identifier requested from the endpoint.
    pub model: String,
    /// Per-call timeout; on expiry the evaluator falls back to synthesized
    /// hints for that evaluation.
    pub call_timeout: Duration,
}

/// Process-wide configuration, derived from the environment and validated
/// once at boot.
///
/// # Invariants
/// - `default_weights`'s weights are each in `[0, 1]`.
/// - `default_thresholds` is strictly increasing.
#[derive(Debug, Clone)]
pub struct AvaConfig {
    /// HTTP listen port for the (externally implemented) transport.
    pub port: u16,
    /// WebSocket listen port for the (externally implemented) widget channel.
    pub ws_port: u16,
    /// Generative-model endpoint configuration.
    pub generative_model: GenerativeModelConfig,
    /// Site-wide default signal weights, absent a site-specific config.
    pub default_weights: SignalWeights,
    /// Site-wide default tier thresholds, absent a site-specific config.
    pub default_thresholds: TierThresholds,
    /// Site-wide default gate parameters, absent a site-specific config.
    pub default_gate_config: GateConfig,
    /// Session evaluator batch-flush interval.
    pub batch_interval: Duration,
    /// Session evaluator batch-flush size trigger.
    pub batch_max_events: usize,
    /// Maximum events retained in a session's context window.
    pub max_context_events: usize,
    /// Whether shadow evaluation is enabled.
    pub shadow_enabled: bool,
    /// Default evaluation engine selector, absent a variant override.
    pub eval_engine: EvalEngine,
    /// Hour of day (UTC) the nightly batch job runs.
    pub nightly_hour_utc: u8,
    /// Hours between canary health checks.
    pub canary_check_interval_hours: u32,
    /// Whether the hourly drift snapshot timer is enabled.
    pub hourly_snapshot_enabled: bool,
    /// Drift-detection thresholds.
    pub drift_thresholds: DriftThresholds,
}

impl AvaConfig {
    /// Loads configuration from environment variables, applying documented
    /// defaults for everything but the generative-model credentials.
    ///
    /// # Errors
    /// Returns `AvaError::ConfigurationError` if a required variable is
    /// missing or if the loaded values fail validation.
    pub fn from_env() -> Result<Self, AvaError> {
        let config = Self {
            port: env_parsed("AVA_PORT", 8080)?,
            ws_port: env_parsed("AVA_WS_PORT", 8081)?,
            generative_model: GenerativeModelConfig {
                api_key: env::var("AVA_GENERATIVE_API_KEY").map_err(|_| {
                    AvaError::ConfigurationError("AVA_GENERATIVE_API_KEY is required".to_owned())
                })?,
                model: env::var("AVA_GENERATIVE_MODEL")
                    .unwrap_or_else(|_| "default-narrative-model".to_owned()),
                call_timeout: Duration::from_millis(env_parsed("AVA_GENERATIVE_TIMEOUT_MS", 2000)?),
            },
            default_weights: SignalWeights::defaults(),
            default_thresholds: TierThresholds::defaults(),
            default_gate_config: GateConfig::defaults(),
            batch_interval: Duration::from_millis(env_parsed("AVA_BATCH_INTERVAL_MS", 5000)?),
            batch_max_events: env_parsed("AVA_BATCH_MAX_EVENTS", 10)?,
            max_context_events: env_parsed("AVA_MAX_CONTEXT_EVENTS", 50)?,
            shadow_enabled: env_parsed("AVA_SHADOW_ENABLED", false)?,
            eval_engine: EvalEngine::Auto,
            nightly_hour_utc: env_parsed("AVA_NIGHTLY_HOUR_UTC", 2)?,
            canary_check_interval_hours: env_parsed("AVA_CANARY_CHECK_INTERVAL_HOURS", 4)?,
            hourly_snapshot_enabled: env_parsed("AVA_HOURLY_SNAPSHOT_ENABLED", true)?,
            drift_thresholds: DriftThresholds::defaults(),
        };
        config.validate()?;
        Ok(config)
    }

    /// Validates the loaded configuration against `AvaError::ConfigurationError`:
    /// a failure here is fatal and aborts boot.
    ///
    /// # Errors
    /// Returns `AvaError::ConfigurationError` describing the first invariant
    /// that did not hold.
    pub fn validate(&self) -> Result<(), AvaError> {
        if !self.default_weights.is_valid() {
            return Err(AvaError::ConfigurationError(
                "default signal weights must each lie in [0, 1]".to_owned(),
            ));
        }
        if !self.default_thresholds.is_monotonic() {
            return Err(AvaError::ConfigurationError(
                "default tier thresholds must be strictly increasing".to_owned(),
            ));
        }
        if self.generative_model.api_key.trim().is_empty() {
            return Err(AvaError::ConfigurationError(
                "generative model api key must not be empty".to_owned(),
            ));
        }
        Ok(())
    }
}

trait EnvParsable: Sized {
    fn parse_env(raw: &str) -> Option<Self>;
}

impl EnvParsable for u16 {
    fn parse_env(raw: &str) -> Option<Self> {
        raw.parse().ok()
    }
}

impl EnvParsable for u32 {
    fn parse_env(raw: &str) -> Option<Self> {
        raw.parse().ok()
    }
}

impl EnvParsable for u64 {
    fn parse_env(raw: &str) -> Option<Self> {
        raw.parse().ok()
    }
}

impl EnvParsable for usize {
    fn parse_env(raw: &str) -> Option<Self> {
        raw.parse().ok()
    }
}

impl EnvParsable for u8 {
    fn parse_env(raw: &str) -> Option<Self> {
        raw.parse().ok()
    }
}

impl EnvParsable for bool {
    fn parse_env(raw: &str) -> Option<Self> {
        raw.parse().ok()
    }
}

fn env_parsed<T: EnvParsable>(key: &str, default: T) -> Result<T, AvaError> {
    match env::var(key) {
        Ok(raw) => T::parse_env(&raw)
            .ok_or_else(|| AvaError::ConfigurationError(format!("{key} is not valid: {raw}"))),
        Err(env::VarError::NotPresent) => Ok(default),
        Err(env::VarError::NotUnicode(_)) => {
            Err(AvaError::ConfigurationError(format!("{key} is not valid unicode")))
        }
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

    use super::AvaConfig;
    use super::DriftThresholds;
    use super::GenerativeModelConfig;
    use std::time::Duration;

    fn sample() -> AvaConfig {
        AvaConfig {
            port: 8080,
            ws_port: 8081,
            generative_model: GenerativeModelConfig {
                api_key: "test-key".to_owned(),
                model: "test-model".to_owned(),
                call_timeout: Duration::from_millis(2000),
            },
            default_weights: SignalWeights::defaults(),
            default_thresholds: TierThresholds::defaults(),
            default_gate_config: GateConfig::defaults(),
            batch_interval: Duration::from_millis(5000),
            batch_max_events: 10,
            max_context_events: 50,
            shadow_enabled: false,
            eval_engine: ava_core::model::experiment::EvalEngine::Auto,
            nightly_hour_utc: 2,
            canary_check_interval_hours: 4,
            hourly_snapshot_enabled: true,
            drift_thresholds: DriftThresholds::defaults(),
        }
    }

    #[test]
    fn valid_config_passes_validation() {
        assert!(sample().validate().is_ok());
    }

    #[test]
    fn empty_api_key_fails_validation() {
        let mut config = sample();
        config.generative_model.api_key = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn non_monotonic_thresholds_fail_validation() {
        let mut config = sample();
        config.default_thresholds = TierThresholds {
            monitor: 50,
            passive: 40,
            nudge: 64,
            active: 79,
        };
        assert!(config.validate().is_err());
    }
}
