// crates/ava-engine/src/session_buffer.rs
// ============================================================================
// Module: Session Buffer
// Description: Per-session event window, running counters, and the
//              process-wide registry of per-session locks guarding them.
// ============================================================================

//! A [`SessionState`] accumulates the bounded context window and running
//! counters one session's events feed into, between flushes. [`SessionBuffers`]
//! is the process-wide map from [`SessionId`] to an independently-lockable
//! `SessionState`, so flushing one session never blocks ingestion for any
//! other.

use std::collections::HashMap;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Mutex;

use ava_core::identifiers::SessionId;
use ava_core::model::event::TrackEvent;
use ava_core::model::session::Session;
use ava_core::model::session::SessionRunningCounters;
use time::Duration;
use time::OffsetDateTime;
use tokio::sync::Mutex as AsyncMutex;

/// Maps an ingested event's `event_type` to the [`SessionFlags`] bit it
/// sets, if any.
///
/// No teacher or `ava-core` analog defines this mapping; the event-type
/// vocabulary is this workspace's own.
fn apply_event_type_flags(flags: &mut ava_core::model::session::SessionFlags, event_type: &str) {
    match event_type {
        "technical_error" => flags.has_technical_error = true,
        "out_of_stock" => flags.has_out_of_stock = true,
        "shipping_issue" => flags.has_shipping_issue = true,
        "payment_failure" => flags.has_payment_failure = true,
        "checkout_timeout" => flags.has_checkout_timeout = true,
        "help_search" => flags.has_help_search = true,
        _ => {}
    }
}

/// The accumulated state of one session between flushes: its identity
/// record, a bounded window of recent events, and the running counters the
/// gate engine consults.
pub struct SessionState {
    /// The session's identity and cart/device/referrer snapshot.
    pub session: Session,
    /// Most recent events, oldest first, capped at `max_context_events`.
    events: VecDeque<TrackEvent>,
    /// Cap on `events`' length; the oldest event is dropped past this.
    max_context_events: usize,
    /// When this session's buffer should next be flushed, if a flush has
    /// been scheduled since the last one completed.
    pub flush_due_at: Option<OffsetDateTime>,
    /// When the generative model last completed a call for this session,
    /// used by the `auto` engine's cooldown rule.
    pub last_generative_call_at: Option<OffsetDateTime>,
}

impl SessionState {
    /// Builds an empty buffer over `session`, retaining at most
    /// `max_context_events` events.
    #[must_use]
    pub const fn new(session: Session, max_context_events: usize) -> Self {
        Self {
            session,
            events: VecDeque::new(),
            max_context_events,
            flush_due_at: None,
            last_generative_call_at: None,
        }
    }

    /// Appends `event` to the context window, evicting the oldest event if
    /// the window is full, and folds it into the session's running counters
    /// and flags.
    pub fn ingest(&mut self, event: TrackEvent) {
        apply_event_type_flags(&mut self.session.running_counters.flags, &event.event_type);
        self.session.last_seen_at = event.timestamp;
        if self.events.len() >= self.max_context_events {
            self.events.pop_front();
        }
        self.events.push_back(event);
    }

    /// Returns whether a flush is due: either `batch_max_events` events have
    /// accumulated since the last flush, or `flush_due_at` has elapsed.
    #[must_use]
    pub fn flush_due(&self, now: OffsetDateTime, batch_max_events: usize) -> bool {
        if self.events.len() >= batch_max_events {
            return true;
        }
        self.flush_due_at.is_some_and(|due| now >= due)
    }

    /// Schedules the next flush `batch_interval` from `now`, unless one is
    /// already scheduled.
    pub fn ensure_flush_scheduled(&mut self, now: OffsetDateTime, batch_interval: Duration) {
        if self.flush_due_at.is_none() {
            self.flush_due_at = Some(now + batch_interval);
        }
    }

    /// The events currently buffered, oldest first.
    #[must_use]
    pub fn events(&self) -> &VecDeque<TrackEvent> {
        &self.events
    }

    /// Clears the buffered events and the flush schedule after a flush has
    /// completed, leaving running counters untouched.
    pub fn clear_after_flush(&mut self) {
        self.events.clear();
        self.flush_due_at = None;
    }

    /// The session's running counters, as consulted by the gate engine.
    #[must_use]
    pub const fn running_counters(&self) -> &SessionRunningCounters {
        &self.session.running_counters
    }
}

/// The process-wide registry of per-session buffers, each independently
/// lockable so a flush in progress for one session never blocks ingestion
/// for another.
///
/// Grounded on the per-key guard convention of a run-state store that hands
/// out one lock per logical key rather than a single global lock.
pub struct SessionBuffers {
    inner: Mutex<HashMap<SessionId, Arc<AsyncMutex<SessionState>>>>,
}

impl SessionBuffers {
    /// Builds an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the buffer lock for `session_id`, inserting a fresh
    /// `SessionState` built from `make_session` if none is registered yet.
    pub fn get_or_insert_with(
        &self,
        session_id: &SessionId,
        make_session: impl FnOnce() -> SessionState,
    ) -> Arc<AsyncMutex<SessionState>> {
        #[allow(
            clippy::unwrap_used,
            reason = "a poisoned registry mutex indicates a prior panic elsewhere in the process"
        )]
        let mut inner = self.inner.lock().unwrap();
        inner
            .entry(session_id.clone())
            .or_insert_with(|| Arc::new(AsyncMutex::new(make_session())))
            .clone()
    }

    /// Returns `session_id`'s buffer lock, if one is registered.
    #[must_use]
    pub fn get(&self, session_id: &SessionId) -> Option<Arc<AsyncMutex<SessionState>>> {
        #[allow(
            clippy::unwrap_used,
            reason = "a poisoned registry mutex indicates a prior panic elsewhere in the process"
        )]
        let inner = self.inner.lock().unwrap();
        inner.get(session_id).cloned()
    }

    /// Removes `session_id`'s buffer entirely, used once a session ends.
    pub fn remove(&self, session_id: &SessionId) {
        #[allow(
            clippy::unwrap_used,
            reason = "a poisoned registry mutex indicates a prior panic elsewhere in the process"
        )]
        let mut inner = self.inner.lock().unwrap();
        inner.remove(session_id);
    }

    /// The number of sessions currently buffered.
    #[must_use]
    pub fn len(&self) -> usize {
        #[allow(
            clippy::unwrap_used,
            reason = "a poisoned registry mutex indicates a prior panic elsewhere in the process"
        )]
        let inner = self.inner.lock().unwrap();
        inner.len()
    }

    /// Whether no sessions are currently buffered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every session id currently buffered, for the job runner's
    /// flush-due sweep.
    #[must_use]
    pub fn session_ids(&self) -> Vec<SessionId> {
        #[allow(
            clippy::unwrap_used,
            reason = "a poisoned registry mutex indicates a prior panic elsewhere in the process"
        )]
        let inner = self.inner.lock().unwrap();
        inner.keys().cloned().collect()
    }
}

impl Default for SessionBuffers {
    fn default() -> Self {
        Self::new()
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

    use ava_core::identifiers::SessionId;
    use ava_core::model::event::DeviceType;
    use ava_core::model::event::EventCategory;
    use ava_core::model::event::PageType;
    use ava_core::model::event::ReferrerType;
    use ava_core::model::event::TrackEvent;
    use ava_core::model::session::Session;
    use ava_core::model::session::SessionRunningCounters;
    use ava_core::model::session::SessionStatus;
    use time::macros::datetime;

    use super::SessionBuffers;
    use super::SessionState;

    fn sample_session() -> Session {
        Session {
            session_id: SessionId::from("s-1"),
            visitor_key: "v-1".into(),
            session_key: "sk-1".into(),
            site_url: "https://example.com".into(),
            started_at: datetime!(2026-01-01 00:00:00 UTC),
            last_seen_at: datetime!(2026-01-01 00:00:00 UTC),
            status: SessionStatus::Active,
            device_type: DeviceType::Desktop,
            referrer_type: ReferrerType::Direct,
            is_logged_in: false,
            is_repeat_visitor: false,
            cart_value: 0.0,
            cart_item_count: 0,
            running_counters: SessionRunningCounters::default(),
        }
    }

    fn sample_event(event_type: &str, at: time::OffsetDateTime) -> TrackEvent {
        TrackEvent::new(
            "e-1".into(),
            SessionId::from("s-1"),
            at,
            EventCategory::Technical,
            event_type.to_owned(),
            PageType::Checkout,
            DeviceType::Desktop,
            ReferrerType::Direct,
        )
    }

    #[test]
    fn ingest_sets_flag_from_event_type() {
        let mut state = SessionState::new(sample_session(), 50);
        state.ingest(sample_event("payment_failure", datetime!(2026-01-01 00:01:00 UTC)));
        assert!(state.running_counters().flags.has_payment_failure);
        assert_eq!(state.events().len(), 1);
    }

    #[test]
    fn window_evicts_oldest_event_past_cap() {
        let mut state = SessionState::new(sample_session(), 2);
        for i in 0..3 {
            state.ingest(sample_event("scroll", datetime!(2026-01-01 00:00:00 UTC) + time::Duration::minutes(i)));
        }
        assert_eq!(state.events().len(), 2);
    }

    #[test]
    fn flush_due_on_event_count_trigger() {
        let mut state = SessionState::new(sample_session(), 50);
        state.ingest(sample_event("scroll", datetime!(2026-01-01 00:00:00 UTC)));
        state.ingest(sample_event("scroll", datetime!(2026-01-01 00:00:01 UTC)));
        assert!(state.flush_due(datetime!(2026-01-01 00:00:01 UTC), 2));
    }

    #[tokio::test]
    async fn registry_returns_same_lock_for_repeated_lookups() {
        let buffers = SessionBuffers::new();
        let session_id = SessionId::from("s-1");
        let first = buffers.get_or_insert_with(&session_id, || SessionState::new(sample_session(), 50));
        let second = buffers.get_or_insert_with(&session_id, || SessionState::new(sample_session(), 50));
        assert!(Arc::ptr_eq(&first, &second));
    }
}
