// crates/ava-core/src/model/scoring_config.rs
// ============================================================================
// Module: Scoring Config
// Description: Per-site (or global) weighting, tier thresholds, and gate
//              parameters consumed by the MSWIM engine.
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::identifiers::ScoringConfigId;
use crate::identifiers::SiteUrl;

/// The five MSWIM signal weights. Not required to sum to exactly 1.0, but
/// each weight must lie in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SignalWeights {
    /// Weight applied to the intent signal.
    pub intent: f64,
    /// Weight applied to the friction signal.
    pub friction: f64,
    /// Weight applied to the clarity signal.
    pub clarity: f64,
    /// Weight applied to the receptivity signal.
    pub receptivity: f64,
    /// Weight applied to the value signal.
    pub value: f64,
}

impl SignalWeights {
    /// The documented defaults: intent 0.25, friction 0.25, clarity 0.15,
    /// receptivity 0.20, value 0.15.
    #[must_use]
    pub const fn defaults() -> Self {
        Self {
            intent: 0.25,
            friction: 0.25,
            clarity: 0.15,
            receptivity: 0.20,
            value: 0.15,
        }
    }

    /// Returns `true` if every weight lies in `[0, 1]`.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        [self.intent, self.friction, self.clarity, self.receptivity, self.value]
            .into_iter()
            .all(|w| (0.0..=1.0).contains(&w))
    }
}

/// The four tier-boundary thresholds. Strictly increasing:
/// `monitor < passive < nudge < active`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierThresholds {
    /// Lower composite bound for the `MONITOR` tier.
    pub monitor: u32,
    /// Lower composite bound for the `PASSIVE` tier.
    pub passive: u32,
    /// Lower composite bound for the `NUDGE` tier.
    pub nudge: u32,
    /// Lower composite bound for the `ACTIVE` tier.
    pub active: u32,
}

impl TierThresholds {
    /// The documented defaults: monitor 29, passive 49, nudge 64, active 79.
    #[must_use]
    pub const fn defaults() -> Self {
        Self {
            monitor: 29,
            passive: 49,
            nudge: 64,
            active: 79,
        }
    }

    /// Returns `true` if the thresholds are strictly increasing.
    #[must_use]
    pub const fn is_monotonic(&self) -> bool {
        self.monitor < self.passive && self.passive < self.nudge && self.nudge < self.active
    }
}

/// Per-tier session caps, cooldowns, and suppression counts consumed by the
/// gate engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateConfig {
    /// Minimum session age, in seconds, before any non-escalate intervention.
    pub min_session_age_sec: u64,
    /// Dismissal count at or above which the session is fully suppressed.
    pub dismissals_to_suppress: u32,
    /// Cooldown, in seconds, after an `active`-tier fire before another
    /// sub-escalate intervention may fire.
    pub cooldown_after_active_sec: u64,
    /// Cooldown, in seconds, after a `nudge`-tier fire before another
    /// nudge-or-below intervention may fire.
    pub cooldown_after_nudge_sec: u64,
    /// Per-session cap on `active`-tier interventions.
    pub active_cap_per_session: u32,
    /// Per-session cap on `nudge`-tier interventions.
    pub nudge_cap_per_session: u32,
    /// Per-session cap on interventions at any non-passive, non-monitor tier.
    pub non_passive_cap_per_session: u32,
}

impl GateConfig {
    /// Conservative defaults used when no site-specific config is set.
    #[must_use]
    pub const fn defaults() -> Self {
        Self {
            min_session_age_sec: 30,
            dismissals_to_suppress: 3,
            cooldown_after_active_sec: 300,
            cooldown_after_nudge_sec: 120,
            active_cap_per_session: 2,
            nudge_cap_per_session: 3,
            non_passive_cap_per_session: 5,
        }
    }
}

/// Weights, thresholds, and gate parameters for a site (or the global
/// default), at most one `is_active` per `site_url`.
///
/// # Invariants
/// - [`TierThresholds::is_monotonic`] holds.
/// - Every weight in [`SignalWeights`] lies in `[0, 1]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringConfig {
    /// Unique identifier.
    pub id: ScoringConfigId,
    /// Site this config applies to, or `None` for the global default.
    pub site_url: Option<SiteUrl>,
    /// Whether this is the active config for its scope.
    pub is_active: bool,
    /// Signal weights.
    pub weights: SignalWeights,
    /// Tier boundary thresholds.
    pub tier_thresholds: TierThresholds,
    /// Gate parameters.
    pub gate_config: GateConfig,
}

impl ScoringConfig {
    /// Builds the built-in global default config, used as the final
    /// fallback by the config loader (see `ava_config`).
    #[must_use]
    pub fn builtin_default() -> Self {
        Self {
            id: ScoringConfigId::from("builtin-default"),
            site_url: None,
            is_active: true,
            weights: SignalWeights::defaults(),
            tier_thresholds: TierThresholds::defaults(),
            gate_config: GateConfig::defaults(),
        }
    }

    /// Returns `true` if this config's weights and thresholds both satisfy
    /// their documented invariants.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.weights.is_valid() && self.tier_thresholds.is_monotonic()
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

    use super::ScoringConfig;
    use super::TierThresholds;

    #[test]
    fn builtin_default_is_valid() {
        assert!(ScoringConfig::builtin_default().is_valid());
    }

    #[test]
    fn non_monotonic_thresholds_are_invalid() {
        let thresholds = TierThresholds {
            monitor: 30,
            passive: 29,
            nudge: 64,
            active: 79,
        };
        assert!(!thresholds.is_monotonic());
    }
}
