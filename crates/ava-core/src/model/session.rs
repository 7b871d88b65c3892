// crates/ava-core/src/model/session.rs
// ============================================================================
// Module: Session
// Description: Visitor session identity, status, and the running counters
//              the gate engine consumes as its sole view of session history.
// ============================================================================

use std::collections::BTreeSet;

use serde::Deserialize;
use serde::Serialize;
use time::OffsetDateTime;

use crate::identifiers::FrictionId;
use crate::identifiers::SessionId;
use crate::identifiers::SessionKey;
use crate::identifiers::SiteUrl;
use crate::identifiers::VisitorKey;
use crate::model::event::DeviceType;
use crate::model::event::ReferrerType;
use crate::model::intervention::InterventionType;

/// Lifecycle status of a [`Session`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Last seen within the idle threshold.
    Active,
    /// Last seen beyond the idle threshold but not yet ended.
    Idle,
    /// Explicitly ended (widget close, checkout completion, timeout reap).
    Ended,
}

/// A visitor session tracked for the duration of a storefront visit.
///
/// # Invariants
/// - `last_seen_at >= started_at`.
/// - `status == Active` iff `now - last_seen_at < idle_threshold`, enforced
///   by [`Session::refresh_status`] rather than by construction, since it
///   depends on wall-clock time the type itself does not read.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Primary identifier.
    pub session_id: SessionId,
    /// Widget-supplied visitor identity, stable across sessions.
    pub visitor_key: VisitorKey,
    /// Widget-supplied per-session key.
    pub session_key: SessionKey,
    /// Storefront origin.
    pub site_url: SiteUrl,
    /// Instant the session was first observed.
    pub started_at: OffsetDateTime,
    /// Instant of the most recently ingested event.
    pub last_seen_at: OffsetDateTime,
    /// Lifecycle status.
    pub status: SessionStatus,
    /// Device class of the visitor.
    pub device_type: DeviceType,
    /// Referrer classification at session start.
    pub referrer_type: ReferrerType,
    /// Whether the visitor is authenticated.
    pub is_logged_in: bool,
    /// Whether the visitor has a prior session on this site.
    pub is_repeat_visitor: bool,
    /// Current cart value, in the storefront's base currency unit.
    pub cart_value: f64,
    /// Current cart item count.
    pub cart_item_count: u32,
    /// Materialized view of event+intervention history the gate engine reads.
    pub running_counters: SessionRunningCounters,
}

impl Session {
    /// Returns the session age in whole seconds as of `now`.
    #[must_use]
    pub fn age_seconds(&self, now: OffsetDateTime) -> u64 {
        crate::clock::seconds_between(self.started_at, now)
    }

    /// Recomputes [`Session::status`] from `now` and `idle_threshold_secs`,
    /// leaving `Ended` sessions untouched.
    pub fn refresh_status(&mut self, now: OffsetDateTime, idle_threshold_secs: u64) {
        if self.status == SessionStatus::Ended {
            return;
        }
        let idle_for = crate::clock::seconds_between(self.last_seen_at, now);
        self.status = if idle_for < idle_threshold_secs {
            SessionStatus::Active
        } else {
            SessionStatus::Idle
        };
    }
}

/// Per-type last-fired timestamps, used by the cooldown gates.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LastInterventionAt {
    /// Timestamp of the most recent `active`-tier intervention.
    pub active: Option<OffsetDateTime>,
    /// Timestamp of the most recent `nudge`-tier intervention.
    pub nudge: Option<OffsetDateTime>,
    /// Timestamp of the most recent `passive`-tier intervention.
    pub passive: Option<OffsetDateTime>,
    /// Timestamp of the most recent `escalate`-tier intervention.
    pub escalate: Option<OffsetDateTime>,
}

impl LastInterventionAt {
    /// Records `fired_at` against the slot for `intervention_type`.
    pub fn record(&mut self, intervention_type: InterventionType, fired_at: OffsetDateTime) {
        let slot = match intervention_type {
            InterventionType::Passive => &mut self.passive,
            InterventionType::Nudge => &mut self.nudge,
            InterventionType::Active => &mut self.active,
            InterventionType::Escalate => &mut self.escalate,
        };
        *slot = Some(fired_at);
    }
}

/// Boolean condition flags derived from recent events, consumed by the
/// force-passive / force-escalate gates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionFlags {
    /// A client-observed script or request error occurred recently.
    pub has_technical_error: bool,
    /// An out-of-stock condition was observed recently.
    pub has_out_of_stock: bool,
    /// A shipping-related issue was observed recently.
    pub has_shipping_issue: bool,
    /// A payment attempt failed recently.
    pub has_payment_failure: bool,
    /// Checkout stalled past its expected duration.
    pub has_checkout_timeout: bool,
    /// The visitor searched the help/support surface recently.
    pub has_help_search: bool,
}

/// An updatable materialized view of a session's event and intervention
/// history; the sole state the gate engine consumes about history.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionRunningCounters {
    /// Total interventions fired across the session's lifetime.
    pub total_interventions_fired: u32,
    /// Total interventions explicitly dismissed.
    pub total_dismissals: u32,
    /// Total `nudge`-tier interventions fired.
    pub total_nudges: u32,
    /// Total `active`-tier interventions fired.
    pub total_active: u32,
    /// Total interventions fired at a tier other than `passive`.
    pub total_non_passive: u32,
    /// Per-type last-fired timestamps.
    pub last_intervention_at: LastInterventionAt,
    /// Friction ids already intervened on this session.
    pub friction_ids_already_intervened: BTreeSet<FrictionId>,
    /// Whether the visitor opened the widget without a triggered prompt.
    pub widget_opened_voluntarily: bool,
    /// Accumulated idle seconds since the last interaction.
    pub idle_seconds: u64,
    /// Condition flags derived from recent events.
    pub flags: SessionFlags,
}

impl SessionRunningCounters {
    /// Updates counters and flags to reflect a fired intervention.
    pub fn record_intervention_fired(
        &mut self,
        intervention_type: InterventionType,
        friction_id: Option<FrictionId>,
        fired_at: OffsetDateTime,
    ) {
        self.total_interventions_fired += 1;
        match intervention_type {
            InterventionType::Nudge => self.total_nudges += 1,
            InterventionType::Active => self.total_active += 1,
            InterventionType::Passive | InterventionType::Escalate => {}
        }
        if intervention_type != InterventionType::Passive {
            self.total_non_passive += 1;
        }
        self.last_intervention_at.record(intervention_type, fired_at);
        if let Some(friction_id) = friction_id {
            self.friction_ids_already_intervened.insert(friction_id);
        }
    }

    /// Updates counters to reflect a dismissal outcome.
    pub fn record_dismissal(&mut self) {
        self.total_dismissals += 1;
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

    use time::macros::datetime;

    use super::InterventionType;
    use super::SessionRunningCounters;

    #[test]
    fn record_intervention_fired_updates_non_passive_count() {
        let mut counters = SessionRunningCounters::default();
        counters.record_intervention_fired(
            InterventionType::Nudge,
            None,
            datetime!(2026-01-01 00:00:00 UTC),
        );
        assert_eq!(counters.total_nudges, 1);
        assert_eq!(counters.total_non_passive, 1);
        counters.record_intervention_fired(
            InterventionType::Passive,
            None,
            datetime!(2026-01-01 00:00:01 UTC),
        );
        assert_eq!(counters.total_non_passive, 1);
        assert_eq!(counters.total_interventions_fired, 2);
    }
}
