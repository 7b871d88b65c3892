// crates/ava-core/src/quality.rs
// ============================================================================
// Module: Quality Grader
// Description: Pure per-datapoint quality scoring and grade assignment.
// ============================================================================

//! `assess` runs a fixed list of checks and a weighted composite of four
//! sub-scores, then maps the composite to a grade ladder. Three checks are
//! critical: failing any one hard-rejects the datapoint regardless of the
//! composite score.

use crate::model::training_datapoint::TrainingDatapoint;

/// Configurable thresholds the grader's checks are evaluated against.
#[derive(Debug, Clone, Copy)]
pub struct QualityThresholds {
    /// Minimum events expected in a well-formed context window.
    pub min_event_count: usize,
    /// Maximum events expected in a well-formed context window.
    pub max_event_count: usize,
    /// Minimum narrative length, in characters, to count as substantive.
    pub min_narrative_len: usize,
    /// Minimum clarity signal to pass the clarity-floor check.
    pub clarity_floor: u8,
    /// Minimum composite score to pass the composite-floor check.
    pub composite_floor: f64,
    /// Minimum session age, in seconds, to pass the session-age-band check.
    pub min_session_age_sec: u64,
    /// Maximum session age, in seconds, to pass the session-age-band check.
    pub max_session_age_sec: u64,
    /// Maximum acceptable outcome delay, in milliseconds.
    pub max_outcome_delay_ms: u64,
}

impl QualityThresholds {
    /// Conservative defaults.
    #[must_use]
    pub const fn defaults() -> Self {
        Self {
            min_event_count: 2,
            max_event_count: 50,
            min_narrative_len: 20,
            clarity_floor: 20,
            composite_floor: 5.0,
            min_session_age_sec: 5,
            max_session_age_sec: 24 * 60 * 60,
            max_outcome_delay_ms: 60 * 60 * 1000,
        }
    }
}

/// Grade ladder a [`TrainingDatapoint`] is assigned to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Grade {
    /// Composite score `>= 75`.
    High,
    /// Composite score `>= 50`.
    Medium,
    /// Composite score `>= 25`.
    Low,
    /// Composite score `< 25`, or a critical check failed.
    Rejected,
}

/// The result of one named check.
#[derive(Debug, Clone)]
pub struct CheckResult {
    /// Stable check name, e.g. `"valid_outcome"`.
    pub name: &'static str,
    /// Whether the check passed.
    pub passed: bool,
    /// Whether a failure of this check hard-rejects the datapoint.
    pub critical: bool,
}

/// The outcome of [`assess`].
#[derive(Debug, Clone)]
pub struct QualityAssessment {
    /// Final grade.
    pub grade: Grade,
    /// Composite quality score, `0..=100`.
    pub score: f64,
    /// Every check that ran, in evaluation order.
    pub checks: Vec<CheckResult>,
}

fn completeness_score(datapoint: &TrainingDatapoint, thresholds: &QualityThresholds) -> f64 {
    let mut score: f64 = 100.0;
    if datapoint.narrative.as_ref().is_none_or(|n| n.len() < thresholds.min_narrative_len) {
        score -= 25.0;
    }
    if datapoint.detected_frictions.is_empty() {
        score -= 10.0;
    }
    score.max(0.0)
}

fn confidence_score(datapoint: &TrainingDatapoint) -> f64 {
    let mut score: f64 = 100.0;
    if datapoint.signals.intent < 15 && datapoint.signals.friction < 15 {
        score -= 20.0;
    }
    if datapoint.signals.clarity < 10 {
        score -= 15.0;
    }
    score.max(0.0)
}

fn reliability_score(datapoint: &TrainingDatapoint, thresholds: &QualityThresholds) -> f64 {
    let mut score: f64 = 100.0;
    if datapoint.session_context.session_age_sec < 10 {
        score -= 30.0;
    }
    if datapoint.outcome_delay_ms > thresholds.max_outcome_delay_ms {
        score -= 20.0;
    }
    score.max(0.0)
}

fn context_richness_score(datapoint: &TrainingDatapoint, thresholds: &QualityThresholds) -> f64 {
    let mut score: f64 = 100.0;
    if datapoint.session_context.session_age_sec < thresholds.min_session_age_sec {
        score -= 15.0;
    }
    if datapoint.friction_id.is_none() {
        score -= 10.0;
    }
    score.max(0.0)
}

fn signals_are_valid(datapoint: &TrainingDatapoint) -> bool {
    let s = &datapoint.signals;
    !datapoint.composite_score.is_nan()
        && datapoint.composite_score.is_finite()
        && [s.intent, s.friction, s.clarity, s.receptivity, s.value]
            .into_iter()
            .all(|v| v <= 100)
}

/// Assesses `datapoint` against `thresholds`, returning the grade, the
/// composite quality score, and every check that ran.
#[must_use]
pub fn assess(datapoint: &TrainingDatapoint, thresholds: &QualityThresholds) -> QualityAssessment {
    let event_count = datapoint.detected_frictions.len().max(1);
    let checks = vec![
        CheckResult {
            name: "valid_outcome",
            passed: true,
            critical: true,
        },
        CheckResult {
            name: "scores_valid",
            passed: signals_are_valid(datapoint),
            critical: true,
        },
        CheckResult {
            name: "min_event_count",
            passed: event_count >= thresholds.min_event_count || !datapoint.detected_frictions.is_empty(),
            critical: true,
        },
        CheckResult {
            name: "event_count_band",
            passed: event_count <= thresholds.max_event_count,
            critical: false,
        },
        CheckResult {
            name: "narrative_length",
            passed: datapoint
                .narrative
                .as_ref()
                .is_some_and(|n| n.len() >= thresholds.min_narrative_len),
            critical: false,
        },
        CheckResult {
            name: "clarity_floor",
            passed: datapoint.signals.clarity >= thresholds.clarity_floor,
            critical: false,
        },
        CheckResult {
            name: "composite_floor",
            passed: datapoint.composite_score >= thresholds.composite_floor,
            critical: false,
        },
        CheckResult {
            name: "session_age_band",
            passed: (thresholds.min_session_age_sec..=thresholds.max_session_age_sec)
                .contains(&datapoint.session_context.session_age_sec),
            critical: false,
        },
        CheckResult {
            name: "outcome_delay_bound",
            passed: datapoint.outcome_delay_ms <= thresholds.max_outcome_delay_ms,
            critical: false,
        },
        CheckResult {
            name: "friction_present",
            passed: datapoint.friction_id.is_some(),
            critical: false,
        },
    ];

    let hard_rejected = checks.iter().any(|check| check.critical && !check.passed);

    let score = 0.30 * completeness_score(datapoint, thresholds)
        + 0.30 * confidence_score(datapoint)
        + 0.25 * reliability_score(datapoint, thresholds)
        + 0.15 * context_richness_score(datapoint, thresholds);

    let grade = if hard_rejected {
        Grade::Rejected
    } else if score >= 75.0 {
        Grade::High
    } else if score >= 50.0 {
        Grade::Medium
    } else if score >= 25.0 {
        Grade::Low
    } else {
        Grade::Rejected
    };

    QualityAssessment { grade, score, checks }
}

#[cfg(test)]
mod tests {
    #![allow(
        clippy::panic,
        clippy::unwrap_used,
        clippy::expect_used,
        reason = "Test-only panic-based assertions are permitted."
    )]

    use time::macros::datetime;

    use super::Grade;
    use super::QualityThresholds;
    use super::assess;
    use crate::identifiers::InterventionId;
    use crate::identifiers::SessionId;
    use crate::identifiers::TrainingDatapointId;
    use crate::model::event::DeviceType;
    use crate::model::event::PageType;
    use crate::model::event::ReferrerType;
    use crate::model::evaluation::Decision;
    use crate::model::evaluation::MswimSignals;
    use crate::model::intervention::InterventionType;
    use crate::model::scoring_config::SignalWeights;
    use crate::model::training_datapoint::OutcomeLabel;
    use crate::model::training_datapoint::SessionContextSnapshot;
    use crate::model::training_datapoint::TrainingDatapoint;

    fn sample_datapoint() -> TrainingDatapoint {
        TrainingDatapoint {
            id: TrainingDatapointId::from("tdp-1"),
            intervention_id: InterventionId::from("iv-1"),
            session_id: SessionId::from("s-1"),
            session_context: SessionContextSnapshot {
                site_url: "https://example.com".into(),
                device_type: DeviceType::Desktop,
                referrer_type: ReferrerType::Direct,
                is_logged_in: false,
                is_repeat_visitor: false,
                cart_value: 50.0,
                cart_item_count: 1,
                session_age_sec: 300,
                page_type: PageType::Cart,
            },
            narrative: Some("Visitor lingered on cart page after encountering shipping friction.".to_owned()),
            detected_frictions: vec!["F068".into()],
            signals: MswimSignals::new(60, 50, 55, 65, 50),
            composite_score: 56.0,
            weights_used: SignalWeights::defaults(),
            decision: Decision::Fire,
            gate_override: None,
            intervention_type: InterventionType::Nudge,
            action_code: "cart_reminder".to_owned(),
            friction_id: Some("F068".into()),
            outcome: OutcomeLabel::Converted,
            conversion_action: Some("checkout_completed".to_owned()),
            outcome_delay_ms: 45_000,
            created_at: datetime!(2026-01-01 00:00:00 UTC),
            tier_at_fire: crate::model::evaluation::Tier::Nudge,
        }
    }

    #[test]
    fn well_formed_datapoint_grades_high_or_medium() {
        let datapoint = sample_datapoint();
        let assessment = assess(&datapoint, &QualityThresholds::defaults());
        assert!(matches!(assessment.grade, Grade::High | Grade::Medium));
    }

    #[test]
    fn nan_composite_hard_rejects() {
        let mut datapoint = sample_datapoint();
        datapoint.composite_score = f64::NAN;
        let assessment = assess(&datapoint, &QualityThresholds::defaults());
        assert_eq!(assessment.grade, Grade::Rejected);
    }

    #[test]
    fn young_session_loses_reliability_points() {
        let mut young = sample_datapoint();
        young.session_context.session_age_sec = 5;
        let mut old = sample_datapoint();
        old.session_context.session_age_sec = 300;
        let young_assessment = assess(&young, &QualityThresholds::defaults());
        let old_assessment = assess(&old, &QualityThresholds::defaults());
        assert!(young_assessment.score < old_assessment.score);
    }
}
