// crates/ava-control/src/drift.rs
// ============================================================================
// Module: Drift Detector
// Description: Window-scoped shadow/production agreement snapshots and the
//              alerts raised when they breach configured thresholds.
// ============================================================================

//! Computes a [`DriftSnapshot`] for a window by combining
//! [`ShadowComparisonRepo::stats`] (tier/decision agreement, composite
//! divergence) with [`TrainingDatapointRepo::outcome_distribution`]
//! (conversion/dismissal rates). `signal_shift` has no dedicated
//! aggregate-query repo method, so it is estimated from
//! [`ShadowComparisonRepo::top_divergences`] samples of the current window
//! and of the seven days preceding it; because that method is sorted by
//! worst divergence rather than drawn uniformly at random, the estimate is
//! biased toward comparisons that already disagree and should be read as a
//! lower bound on how representative it is, not an exact mean.

use std::sync::Arc;

use ava_core::clock::Clock;
use ava_core::identifiers::DriftAlertId;
use ava_core::identifiers::DriftSnapshotId;
use ava_core::identifiers::SiteUrl;
use ava_core::model::drift::AlertSeverity;
use ava_core::model::drift::DriftAlert;
use ava_core::model::drift::DriftAlertType;
use ava_core::model::drift::DriftSnapshot;
use ava_core::model::drift::SignalShiftVector;
use ava_core::model::drift::WindowType;
use ava_core::model::training_datapoint::OutcomeLabel;
use ava_core::repo::DriftAlertRepo;
use ava_core::repo::DriftRepoError;
use ava_core::repo::DriftSnapshotRepo;
use ava_core::repo::ShadowComparisonRepo;
use ava_core::repo::ShadowComparisonRepoError;
use ava_core::repo::TrainingDatapointFilter;
use ava_core::repo::TrainingDatapointRepo;
use ava_core::repo::TrainingDatapointRepoError;
use ava_core::telemetry::DriftAlertRaised;
use ava_core::telemetry::Telemetry;
use thiserror::Error;
use time::Duration;
use time::OffsetDateTime;

use crate::ids::IdGenerator;

/// Upper bound on how many shadow comparisons are pulled per window when
/// estimating [`SignalShiftVector`]; keeps a single drift check bounded
/// regardless of traffic volume.
const SIGNAL_SAMPLE_LIMIT: usize = 500;
/// Minimum comparisons required before a shadow-agreement alert is
/// evaluated at all, to avoid flagging drift off a handful of sessions.
const MIN_COMPARISON_SAMPLE: u64 = 20;
/// Minimum terminal outcomes required before a conversion-drop alert is
/// evaluated.
const MIN_OUTCOME_SAMPLE: u64 = 20;

/// Failure modes of a [`DriftDetector`] operation.
#[derive(Debug, Error)]
pub enum DriftError {
    /// No record matches the given identifier.
    #[error("drift record not found")]
    NotFound,
    /// A repository call failed.
    #[error("store error: {0}")]
    Store(String),
}

impl From<DriftRepoError> for DriftError {
    fn from(value: DriftRepoError) -> Self {
        match value {
            DriftRepoError::NotFound => Self::NotFound,
            DriftRepoError::Store(message) => Self::Store(message),
        }
    }
}

impl From<ShadowComparisonRepoError> for DriftError {
    fn from(value: ShadowComparisonRepoError) -> Self {
        match value {
            ShadowComparisonRepoError::Store(message) => Self::Store(message),
        }
    }
}

impl From<TrainingDatapointRepoError> for DriftError {
    fn from(value: TrainingDatapointRepoError) -> Self {
        match value {
            TrainingDatapointRepoError::Store(message) => Self::Store(message),
        }
    }
}

/// The thresholds a drift check evaluates the twenty-four-hour window
/// against.
#[derive(Debug, Clone, Copy)]
pub struct DriftThresholds {
    /// Floor below which [`DriftAlertType::TierAgreementLow`] fires.
    pub min_tier_agreement_rate: f64,
    /// Floor below which [`DriftAlertType::DecisionAgreementLow`] fires.
    pub min_decision_agreement_rate: f64,
    /// Ceiling above which [`DriftAlertType::CompositeDivergenceHigh`] fires.
    pub max_avg_composite_divergence: f64,
    /// Ceiling above which [`DriftAlertType::SignalShift`] fires, on the
    /// same 0-100 scale as [`ava_core::model::evaluation::MswimSignals`].
    pub max_signal_shift: f64,
    /// Fractional drop (relative to the seven-day baseline) beyond which
    /// [`DriftAlertType::ConversionDrop`] fires.
    pub max_conversion_drop_ratio: f64,
}

impl Default for DriftThresholds {
    fn default() -> Self {
        Self {
            min_tier_agreement_rate: 0.8,
            min_decision_agreement_rate: 0.85,
            max_avg_composite_divergence: 10.0,
            max_signal_shift: 15.0,
            max_conversion_drop_ratio: 0.2,
        }
    }
}

/// Computes drift snapshots and raises de-duplicated alerts from them.
pub struct DriftDetector {
    /// Shadow-comparison source for agreement and divergence statistics.
    shadow_repo: Arc<dyn ShadowComparisonRepo>,
    /// Terminal-outcome source for conversion and dismissal rates.
    datapoint_repo: Arc<dyn TrainingDatapointRepo>,
    /// Snapshot store.
    snapshot_repo: Arc<dyn DriftSnapshotRepo>,
    /// Alert store.
    alert_repo: Arc<dyn DriftAlertRepo>,
    /// Wall-clock source.
    clock: Arc<dyn Clock>,
    /// Observability sink for raised alerts.
    telemetry: Arc<dyn Telemetry>,
    /// Threshold set a check is evaluated against.
    thresholds: DriftThresholds,
    /// Mints [`DriftSnapshotId`]s.
    snapshot_ids: IdGenerator,
    /// Mints [`DriftAlertId`]s.
    alert_ids: IdGenerator,
}

impl DriftDetector {
    /// Builds a detector from its collaborating repositories and the
    /// thresholds a check evaluates against.
    #[must_use]
    #[allow(clippy::too_many_arguments, reason = "Composition root wiring every collaborator explicitly, matching the evaluator's constructor shape.")]
    pub fn new(
        shadow_repo: Arc<dyn ShadowComparisonRepo>,
        datapoint_repo: Arc<dyn TrainingDatapointRepo>,
        snapshot_repo: Arc<dyn DriftSnapshotRepo>,
        alert_repo: Arc<dyn DriftAlertRepo>,
        clock: Arc<dyn Clock>,
        telemetry: Arc<dyn Telemetry>,
        thresholds: DriftThresholds,
    ) -> Self {
        Self {
            shadow_repo,
            datapoint_repo,
            snapshot_repo,
            alert_repo,
            clock,
            telemetry,
            thresholds,
            snapshot_ids: IdGenerator::new("drift-snap"),
            alert_ids: IdGenerator::new("drift-alert"),
        }
    }

    /// Computes, persists, and returns a snapshot for `window_type` ending
    /// now, optionally scoped to `site_url`.
    ///
    /// # Errors
    /// Returns [`DriftError::Store`] if any underlying repository call
    /// fails.
    pub async fn compute_window_snapshot(
        &self,
        window_type: WindowType,
        site_url: Option<&SiteUrl>,
    ) -> Result<DriftSnapshot, DriftError> {
        let now = self.clock.now();
        let window_start = now - window_duration(window_type);

        let shadow_stats = self.shadow_repo.stats(site_url, window_start).await?;
        let datapoint_filter = TrainingDatapointFilter { site_url: site_url.cloned(), since: Some(window_start), ..TrainingDatapointFilter::default() };
        let distribution = self.datapoint_repo.outcome_distribution(&datapoint_filter).await?;
        let outcome_sample_size = distribution.counts.iter().map(|&(_, count)| count).sum();
        let conversion_rate = rate_of(&distribution, OutcomeLabel::Converted, outcome_sample_size);
        let dismissal_rate = rate_of(&distribution, OutcomeLabel::Dismissed, outcome_sample_size);

        let signal_shift = self.estimate_signal_shift(window_start, now, site_url).await?;

        let snapshot = DriftSnapshot {
            id: DriftSnapshotId::from(self.snapshot_ids.issue()),
            window_type,
            window_start,
            window_end: now,
            site_url: site_url.cloned(),
            tier_agreement_rate: shadow_stats.tier_agreement_rate,
            decision_agreement_rate: shadow_stats.decision_agreement_rate,
            avg_composite_divergence: shadow_stats.avg_composite_divergence,
            signal_shift,
            conversion_rate,
            dismissal_rate,
            comparison_sample_size: shadow_stats.sample_size,
            outcome_sample_size,
        };
        self.snapshot_repo.create(snapshot.clone()).await?;
        Ok(snapshot)
    }

    /// Estimates the per-signal mean shift of the production side's signals
    /// in `[window_start, window_end]` against the seven days preceding
    /// `window_start`, sampling both sides via
    /// [`ShadowComparisonRepo::top_divergences`].
    async fn estimate_signal_shift(
        &self,
        window_start: OffsetDateTime,
        _window_end: OffsetDateTime,
        _site_url: Option<&SiteUrl>,
    ) -> Result<SignalShiftVector, DriftError> {
        // `top_divergences` has no site scoping, so this estimate is always
        // platform-wide regardless of the snapshot's own `site_url`.
        let current = self.shadow_repo.top_divergences(window_start, SIGNAL_SAMPLE_LIMIT).await?;
        let baseline_start = window_start - Duration::days(7);
        let baseline_candidates = self.shadow_repo.top_divergences(baseline_start, SIGNAL_SAMPLE_LIMIT).await?;
        let baseline: Vec<_> = baseline_candidates.into_iter().filter(|comparison| comparison.recorded_at < window_start).collect();

        let current_mean = mean_signals(&current);
        let baseline_mean = mean_signals(&baseline);
        Ok(SignalShiftVector {
            intent: current_mean.intent - baseline_mean.intent,
            friction: current_mean.friction - baseline_mean.friction,
            clarity: current_mean.clarity - baseline_mean.clarity,
            receptivity: current_mean.receptivity - baseline_mean.receptivity,
            value: current_mean.value - baseline_mean.value,
        })
    }

    /// Computes 24-hour and 7-day platform-wide snapshots and raises any
    /// newly-breached, not-already-unacknowledged alerts.
    ///
    /// No repository lists the distinct set of known site urls, so this
    /// check runs platform-wide only; per-site checks require the caller
    /// to call [`DriftDetector::compute_window_snapshot`] directly for each
    /// site it tracks.
    ///
    /// # Errors
    /// Returns [`DriftError::Store`] if computing either snapshot fails.
    pub async fn run_drift_check(&self) -> Result<Vec<DriftAlert>, DriftError> {
        let daily = self.compute_window_snapshot(WindowType::TwentyFourHours, None).await?;
        let weekly = self.compute_window_snapshot(WindowType::SevenDays, None).await?;

        let mut candidates = Vec::new();
        if daily.comparison_sample_size >= MIN_COMPARISON_SAMPLE {
            if daily.tier_agreement_rate < self.thresholds.min_tier_agreement_rate {
                candidates.push((
                    DriftAlertType::TierAgreementLow,
                    format!("tier agreement rate {:.3} fell below floor {:.3}", daily.tier_agreement_rate, self.thresholds.min_tier_agreement_rate),
                ));
            }
            if daily.decision_agreement_rate < self.thresholds.min_decision_agreement_rate {
                candidates.push((
                    DriftAlertType::DecisionAgreementLow,
                    format!(
                        "decision agreement rate {:.3} fell below floor {:.3}",
                        daily.decision_agreement_rate, self.thresholds.min_decision_agreement_rate
                    ),
                ));
            }
            if daily.avg_composite_divergence > self.thresholds.max_avg_composite_divergence {
                candidates.push((
                    DriftAlertType::CompositeDivergenceHigh,
                    format!(
                        "average composite divergence {:.2} exceeded ceiling {:.2}",
                        daily.avg_composite_divergence, self.thresholds.max_avg_composite_divergence
                    ),
                ));
            }
            let max_shift = daily.signal_shift.max_abs();
            if max_shift > self.thresholds.max_signal_shift {
                candidates.push((DriftAlertType::SignalShift, format!("largest signal shift {max_shift:.2} exceeded ceiling {:.2}", self.thresholds.max_signal_shift)));
            }
        }

        if daily.outcome_sample_size >= MIN_OUTCOME_SAMPLE && weekly.outcome_sample_size >= MIN_OUTCOME_SAMPLE {
            let floor = weekly.conversion_rate * (1.0 - self.thresholds.max_conversion_drop_ratio);
            if daily.conversion_rate < floor {
                candidates.push((
                    DriftAlertType::ConversionDrop,
                    format!("24h conversion rate {:.3} fell below {:.3} (7d baseline {:.3})", daily.conversion_rate, floor, weekly.conversion_rate),
                ));
            }
        }

        let mut raised = Vec::with_capacity(candidates.len());
        for (alert_type, message) in candidates {
            if let Some(alert) = self.maybe_raise_alert(alert_type, None, message).await? {
                raised.push(alert);
            }
        }
        Ok(raised)
    }

    async fn maybe_raise_alert(&self, alert_type: DriftAlertType, site_url: Option<SiteUrl>, message: String) -> Result<Option<DriftAlert>, DriftError> {
        if self.alert_repo.find_unacknowledged(alert_type, site_url.as_ref()).await?.is_some() {
            return Ok(None);
        }
        let severity = alert_type.default_severity();
        let alert = DriftAlert {
            id: DriftAlertId::from(self.alert_ids.issue()),
            severity,
            alert_type,
            message,
            site_url,
            detected_at: self.clock.now(),
            acknowledged: false,
            acknowledged_at: None,
        };
        self.alert_repo.create(alert.clone()).await?;
        self.telemetry.drift_alert_raised(DriftAlertRaised {
            alert_id: alert.id.clone(),
            site_url: alert.site_url.clone(),
            alert_type: alert_type_name(alert_type),
            severity: severity_name(severity),
        });
        Ok(Some(alert))
    }

    /// Marks an alert acknowledged.
    ///
    /// # Errors
    /// Returns [`DriftError::NotFound`] if no such alert exists.
    pub async fn acknowledge_alert(&self, id: &DriftAlertId) -> Result<(), DriftError> {
        let now = self.clock.now();
        self.alert_repo.acknowledge(id, now).await?;
        Ok(())
    }
}

/// Duration a [`WindowType`] spans.
fn window_duration(window_type: WindowType) -> Duration {
    match window_type {
        WindowType::OneHour => Duration::hours(1),
        WindowType::TwentyFourHours => Duration::hours(24),
        WindowType::SevenDays => Duration::days(7),
    }
}

/// Mean of the production side's raw signals across `comparisons`, zeroed
/// when the sample is empty.
fn mean_signals(comparisons: &[ava_core::model::shadow::ShadowComparison]) -> ava_core::model::drift::SignalShiftVector {
    if comparisons.is_empty() {
        return SignalShiftVector::default();
    }
    let len = comparisons.len() as f64;
    let mut sum = SignalShiftVector::default();
    for comparison in comparisons {
        let signals = comparison.production.result.signals;
        sum.intent += f64::from(signals.intent);
        sum.friction += f64::from(signals.friction);
        sum.clarity += f64::from(signals.clarity);
        sum.receptivity += f64::from(signals.receptivity);
        sum.value += f64::from(signals.value);
    }
    SignalShiftVector { intent: sum.intent / len, friction: sum.friction / len, clarity: sum.clarity / len, receptivity: sum.receptivity / len, value: sum.value / len }
}

/// Computes a single outcome label's share of `total`, or `0.0` when
/// `total` is zero rather than dividing by it.
fn rate_of(distribution: &ava_core::repo::OutcomeDistribution, label: OutcomeLabel, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let count = distribution.counts.iter().find(|&&(outcome, _)| outcome == label).map_or(0, |&(_, count)| count);
    count as f64 / total as f64
}

/// Stable `SCREAMING_SNAKE_CASE` name for a [`DriftAlertType`], matching its
/// serde representation, for telemetry events.
const fn alert_type_name(alert_type: DriftAlertType) -> &'static str {
    match alert_type {
        DriftAlertType::TierAgreementLow => "TIER_AGREEMENT_LOW",
        DriftAlertType::DecisionAgreementLow => "DECISION_AGREEMENT_LOW",
        DriftAlertType::CompositeDivergenceHigh => "COMPOSITE_DIVERGENCE_HIGH",
        DriftAlertType::SignalShift => "SIGNAL_SHIFT",
        DriftAlertType::ConversionDrop => "CONVERSION_DROP",
    }
}

/// Stable lowercase name for an [`AlertSeverity`], for telemetry events.
const fn severity_name(severity: AlertSeverity) -> &'static str {
    match severity {
        AlertSeverity::Warning => "warning",
        AlertSeverity::Critical => "critical",
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

    use std::sync::Mutex;

    use async_trait::async_trait;
    use ava_core::clock::FixedClock;
    use ava_core::identifiers::ShadowComparisonId;
    use ava_core::model::evaluation::Decision;
    use ava_core::model::evaluation::MswimResult;
    use ava_core::model::evaluation::MswimSignals;
    use ava_core::model::evaluation::Tier;
    use ava_core::model::scoring_config::SignalWeights;
    use ava_core::model::shadow::ShadowComparison;
    use ava_core::model::shadow::ShadowSide;
    use ava_core::model::training_datapoint::TrainingDatapoint;
    use ava_core::repo::ShadowComparisonFilter;
    use ava_core::repo::TierOutcomeCell;
    use ava_core::telemetry::RecordingTelemetry;
    use time::macros::datetime;

    use super::*;

    struct FakeShadowRepo {
        stats: ShadowComparisonStats,
        comparisons: Vec<ShadowComparison>,
    }

    use ava_core::repo::ShadowComparisonStats;

    #[async_trait]
    impl ShadowComparisonRepo for FakeShadowRepo {
        async fn create(&self, _comparison: ShadowComparison) -> Result<(), ShadowComparisonRepoError> {
            Ok(())
        }

        async fn list(&self, _filter: &ShadowComparisonFilter) -> Result<Vec<ShadowComparison>, ShadowComparisonRepoError> {
            Ok(self.comparisons.clone())
        }

        async fn stats(&self, _site_url: Option<&SiteUrl>, _since: OffsetDateTime) -> Result<ShadowComparisonStats, ShadowComparisonRepoError> {
            Ok(self.stats)
        }

        async fn top_divergences(&self, since: OffsetDateTime, limit: usize) -> Result<Vec<ShadowComparison>, ShadowComparisonRepoError> {
            Ok(self.comparisons.iter().filter(|comparison| comparison.recorded_at >= since).take(limit).cloned().collect())
        }
    }

    struct FakeDatapointRepo {
        distribution: ava_core::repo::OutcomeDistribution,
    }

    #[async_trait]
    impl TrainingDatapointRepo for FakeDatapointRepo {
        async fn create(&self, _datapoint: TrainingDatapoint) -> Result<(), TrainingDatapointRepoError> {
            Ok(())
        }

        async fn list(&self, _filter: &TrainingDatapointFilter) -> Result<Vec<TrainingDatapoint>, TrainingDatapointRepoError> {
            Ok(Vec::new())
        }

        async fn outcome_distribution(&self, _filter: &TrainingDatapointFilter) -> Result<ava_core::repo::OutcomeDistribution, TrainingDatapointRepoError> {
            Ok(self.distribution.clone())
        }

        async fn tier_outcome_cross_tab(&self, _filter: &TrainingDatapointFilter) -> Result<Vec<TierOutcomeCell>, TrainingDatapointRepoError> {
            Ok(Vec::new())
        }

        async fn count(&self, _filter: &TrainingDatapointFilter) -> Result<u64, TrainingDatapointRepoError> {
            Ok(self.distribution.counts.iter().map(|&(_, count)| count).sum())
        }
    }

    struct FakeSnapshotRepo {
        created: Mutex<Vec<DriftSnapshot>>,
    }

    #[async_trait]
    impl DriftSnapshotRepo for FakeSnapshotRepo {
        async fn create(&self, snapshot: DriftSnapshot) -> Result<(), DriftRepoError> {
            self.created.lock().expect("lock").push(snapshot);
            Ok(())
        }

        async fn list(&self, _window_type: WindowType, _site_url: Option<&SiteUrl>) -> Result<Vec<DriftSnapshot>, DriftRepoError> {
            Ok(self.created.lock().expect("lock").clone())
        }

        async fn prune_older_than(&self, _older_than: OffsetDateTime) -> Result<u64, DriftRepoError> {
            Ok(0)
        }
    }

    struct FakeAlertRepo {
        created: Mutex<Vec<DriftAlert>>,
    }

    #[async_trait]
    impl DriftAlertRepo for FakeAlertRepo {
        async fn create(&self, alert: DriftAlert) -> Result<(), DriftRepoError> {
            self.created.lock().expect("lock").push(alert);
            Ok(())
        }

        async fn list(&self, _unacknowledged_only: bool) -> Result<Vec<DriftAlert>, DriftRepoError> {
            Ok(self.created.lock().expect("lock").clone())
        }

        async fn find_unacknowledged(&self, alert_type: DriftAlertType, site_url: Option<&SiteUrl>) -> Result<Option<DriftAlert>, DriftRepoError> {
            Ok(self
                .created
                .lock()
                .expect("lock")
                .iter()
                .find(|alert| !alert.acknowledged && alert.alert_type == alert_type && alert.site_url.as_ref() == site_url)
                .cloned())
        }

        async fn acknowledge(&self, id: &DriftAlertId, at: OffsetDateTime) -> Result<(), DriftRepoError> {
            let mut guard = self.created.lock().expect("lock");
            let alert = guard.iter_mut().find(|alert| &alert.id == id).ok_or(DriftRepoError::NotFound)?;
            alert.acknowledged = true;
            alert.acknowledged_at = Some(at);
            Ok(())
        }

        async fn prune_older_than(&self, _older_than: OffsetDateTime) -> Result<u64, DriftRepoError> {
            Ok(0)
        }
    }

    fn mswim_result(tier: Tier, intent: i32) -> MswimResult {
        let signals = MswimSignals::new(intent, 50, 50, 50, 50);
        let weights = SignalWeights::defaults();
        let composite = signals.composite(&weights);
        MswimResult { signals, weights_used: weights, composite_score: composite, tier, gate_override: None, decision: Decision::Fire, reasoning: String::new() }
    }

    fn comparison(id: &str, recorded_at: OffsetDateTime, tier_match: bool) -> ShadowComparison {
        let production = ShadowSide { result: mswim_result(Tier::Nudge, 60) };
        let shadow = if tier_match { ShadowSide { result: mswim_result(Tier::Nudge, 60) } } else { ShadowSide { result: mswim_result(Tier::Escalate, 90) } };
        ShadowComparison::from_sides(
            ShadowComparisonId::from(id.to_owned()),
            ava_core::identifiers::SessionId::from("s-1"),
            SiteUrl::from("https://shop.example.com"),
            None,
            production,
            shadow,
            recorded_at,
        )
    }

    #[tokio::test]
    async fn compute_window_snapshot_combines_shadow_and_outcome_stats() {
        let clock = Arc::new(FixedClock::new(datetime!(2026-01-10 00:00:00 UTC)));
        let shadow_repo = Arc::new(FakeShadowRepo {
            stats: ShadowComparisonStats { sample_size: 40, avg_composite_divergence: 2.0, tier_agreement_rate: 0.95, decision_agreement_rate: 0.97 },
            comparisons: vec![comparison("c-1", datetime!(2026-01-09 12:00:00 UTC), true)],
        });
        let datapoint_repo = Arc::new(FakeDatapointRepo {
            distribution: ava_core::repo::OutcomeDistribution { counts: vec![(OutcomeLabel::Converted, 30), (OutcomeLabel::Dismissed, 10)] },
        });
        let snapshot_repo = Arc::new(FakeSnapshotRepo { created: Mutex::new(Vec::new()) });
        let alert_repo = Arc::new(FakeAlertRepo { created: Mutex::new(Vec::new()) });
        let telemetry = Arc::new(RecordingTelemetry::new());

        let detector = DriftDetector::new(shadow_repo, datapoint_repo, snapshot_repo, alert_repo, clock, telemetry, DriftThresholds::default());
        let snapshot = detector.compute_window_snapshot(WindowType::TwentyFourHours, None).await.expect("compute");
        assert_eq!(snapshot.comparison_sample_size, 40);
        assert_eq!(snapshot.outcome_sample_size, 40);
        assert!((snapshot.conversion_rate - 0.75).abs() < 1e-9);
    }

    #[tokio::test]
    async fn run_drift_check_raises_and_deduplicates_tier_agreement_alert() {
        let clock = Arc::new(FixedClock::new(datetime!(2026-01-10 00:00:00 UTC)));
        let shadow_repo = Arc::new(FakeShadowRepo {
            stats: ShadowComparisonStats { sample_size: 100, avg_composite_divergence: 1.0, tier_agreement_rate: 0.5, decision_agreement_rate: 0.99 },
            comparisons: vec![],
        });
        let datapoint_repo = Arc::new(FakeDatapointRepo { distribution: ava_core::repo::OutcomeDistribution { counts: vec![(OutcomeLabel::Converted, 50)] } });
        let snapshot_repo = Arc::new(FakeSnapshotRepo { created: Mutex::new(Vec::new()) });
        let alert_repo = Arc::new(FakeAlertRepo { created: Mutex::new(Vec::new()) });
        let telemetry = Arc::new(RecordingTelemetry::new());

        let detector = DriftDetector::new(shadow_repo, datapoint_repo, snapshot_repo, alert_repo.clone(), clock, telemetry.clone(), DriftThresholds::default());
        let first = detector.run_drift_check().await.expect("first check");
        assert!(first.iter().any(|alert| alert.alert_type == DriftAlertType::TierAgreementLow));
        assert_eq!(telemetry.events().len(), first.len());

        let second = detector.run_drift_check().await.expect("second check");
        assert!(second.is_empty(), "unacknowledged alert of the same type must not be re-raised");
    }
}
