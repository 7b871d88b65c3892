// crates/ava-core/src/model/drift.rs
// ============================================================================
// Module: Drift
// Description: Window-scoped snapshots of shadow/production agreement, and
//              the alerts raised from them.
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use time::OffsetDateTime;

use crate::identifiers::DriftAlertId;
use crate::identifiers::DriftSnapshotId;
use crate::identifiers::SiteUrl;

/// Width of a [`DriftSnapshot`]'s aggregation window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowType {
    /// One hour.
    OneHour,
    /// Twenty-four hours.
    TwentyFourHours,
    /// Seven days.
    SevenDays,
}

/// Per-signal mean shift vector between the current window and a baseline.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct SignalShiftVector {
    /// Shift in mean intent signal.
    pub intent: f64,
    /// Shift in mean friction signal.
    pub friction: f64,
    /// Shift in mean clarity signal.
    pub clarity: f64,
    /// Shift in mean receptivity signal.
    pub receptivity: f64,
    /// Shift in mean value signal.
    pub value: f64,
}

impl SignalShiftVector {
    /// Returns the largest absolute shift across all five signals.
    #[must_use]
    pub fn max_abs(&self) -> f64 {
        [self.intent, self.friction, self.clarity, self.receptivity, self.value]
            .into_iter()
            .map(f64::abs)
            .fold(0.0, f64::max)
    }
}

/// A window-scoped aggregate of shadow/production agreement and terminal
/// outcome rates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriftSnapshot {
    /// Unique identifier.
    pub id: DriftSnapshotId,
    /// Width of the aggregation window.
    pub window_type: WindowType,
    /// Start of the aggregation window.
    pub window_start: OffsetDateTime,
    /// End of the aggregation window.
    pub window_end: OffsetDateTime,
    /// Site this snapshot is scoped to, or `None` for all sites.
    pub site_url: Option<SiteUrl>,
    /// Fraction of shadow comparisons where the tier matched.
    pub tier_agreement_rate: f64,
    /// Fraction of shadow comparisons where the decision matched.
    pub decision_agreement_rate: f64,
    /// Mean absolute composite divergence across shadow comparisons.
    pub avg_composite_divergence: f64,
    /// Per-signal mean shift vector against the 7-day baseline.
    pub signal_shift: SignalShiftVector,
    /// Conversion rate over terminal outcomes in the window.
    pub conversion_rate: f64,
    /// Dismissal rate over terminal outcomes in the window.
    pub dismissal_rate: f64,
    /// Number of shadow comparisons aggregated.
    pub comparison_sample_size: u64,
    /// Number of terminal outcomes aggregated.
    pub outcome_sample_size: u64,
}

/// Severity of a [`DriftAlert`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertSeverity {
    /// Worth investigating, not yet urgent.
    Warning,
    /// Requires prompt attention.
    Critical,
}

/// The kind of drift condition a [`DriftAlert`] reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DriftAlertType {
    /// `tierAgreementRate` fell below its floor.
    TierAgreementLow,
    /// `decisionAgreementRate` fell below its floor.
    DecisionAgreementLow,
    /// `avgCompositeDivergence` exceeded its ceiling.
    CompositeDivergenceHigh,
    /// A signal's mean shifted beyond the configured threshold.
    SignalShift,
    /// Conversion rate dropped beyond the configured threshold vs. baseline.
    ConversionDrop,
}

impl DriftAlertType {
    /// The severity this alert type is always raised at.
    #[must_use]
    pub const fn default_severity(self) -> AlertSeverity {
        match self {
            Self::ConversionDrop => AlertSeverity::Critical,
            Self::TierAgreementLow
            | Self::DecisionAgreementLow
            | Self::CompositeDivergenceHigh
            | Self::SignalShift => AlertSeverity::Warning,
        }
    }
}

/// A raised drift alert, de-duplicated by `(alert_type, site_url)` while
/// unacknowledged.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriftAlert {
    /// Unique identifier.
    pub id: DriftAlertId,
    /// Severity of the condition.
    pub severity: AlertSeverity,
    /// Kind of condition detected.
    pub alert_type: DriftAlertType,
    /// Human-readable description including the offending metric value.
    pub message: String,
    /// Site this alert concerns, or `None` for a platform-wide alert.
    pub site_url: Option<SiteUrl>,
    /// Instant the alert was raised.
    pub detected_at: OffsetDateTime,
    /// Whether an operator has acknowledged the alert.
    pub acknowledged: bool,
    /// Instant the alert was acknowledged, if it has been.
    pub acknowledged_at: Option<OffsetDateTime>,
}
