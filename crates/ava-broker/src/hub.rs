// crates/ava-broker/src/hub.rs
// ============================================================================
// Module: Broadcast Hub
// Description: Channel-scoped, session-filterable best-effort fan-out.
// Dependencies: ava-core, tokio, serde_json
// ============================================================================

//! ## Overview
//! [`BroadcastHub`] generalizes the one-sender-per-destination shape of a
//! `tokio::sync::mpsc`-backed channel sink into a registry of subscribers
//! per named channel, each optionally filtered by session id. Publication
//! snapshots the subscriber list under a brief lock so sends proceed
//! lock-free; a subscriber whose receiver has been dropped is reaped on the
//! next publish to that channel, mirroring a `try_send`-then-drop delivery
//! contract.
//!
//! Delivery is best-effort: a full channel silently drops the message for
//! that subscriber rather than blocking the publisher, and a closed channel
//! marks the subscriber for removal. Neither case is surfaced to the
//! caller, matching the "broadcast failures are swallowed" contract.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::PoisonError;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use ava_core::identifiers::SessionId;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use crate::channel::Channel;

/// Default per-subscriber channel capacity.
///
/// Chosen generously relative to the batch-interval cadence of the session
/// evaluator: a subscriber lagging by more than this many frames is almost
/// certainly gone, at which point `try_send` returning `Full` simply drops
/// the newest frame rather than blocking the publisher.
pub const DEFAULT_SUBSCRIBER_CAPACITY: usize = 64;

/// Opaque handle identifying one subscription, returned by
/// [`BroadcastHub::subscribe`] and required by [`BroadcastHub::unsubscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriptionId(u64);

struct Subscriber {
    id: SubscriptionId,
    session_filter: Option<SessionId>,
    sender: mpsc::Sender<Arc<Value>>,
}

/// Registry of subscribers per named [`Channel`], with best-effort
/// broadcast and session-scoped filtering.
///
/// Cheap to clone and share: internally `Arc`-equivalent state behind a
/// `Mutex`, safe under concurrent subscribe/unsubscribe/broadcast.
pub struct BroadcastHub {
    subscribers: Mutex<HashMap<Channel, Vec<Subscriber>>>,
    next_id: AtomicU64,
}

impl Default for BroadcastHub {
    fn default() -> Self {
        Self::new()
    }
}

impl BroadcastHub {
    /// Creates an empty hub.
    #[must_use]
    pub fn new() -> Self {
        Self { subscribers: Mutex::new(HashMap::new()), next_id: AtomicU64::new(1) }
    }

    /// Registers a new subscriber on `channel`, optionally filtered to
    /// frames published for `session_filter`, with
    /// [`DEFAULT_SUBSCRIBER_CAPACITY`] buffered frames.
    ///
    /// Returns the subscription handle and the receiver the caller reads
    /// frames from.
    #[must_use]
    pub fn subscribe(&self, channel: Channel, session_filter: Option<SessionId>) -> (SubscriptionId, mpsc::Receiver<Arc<Value>>) {
        self.subscribe_with_capacity(channel, session_filter, DEFAULT_SUBSCRIBER_CAPACITY)
    }

    /// As [`Self::subscribe`], with an explicit buffer capacity.
    #[must_use]
    pub fn subscribe_with_capacity(
        &self,
        channel: Channel,
        session_filter: Option<SessionId>,
        capacity: usize,
    ) -> (SubscriptionId, mpsc::Receiver<Arc<Value>>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let mut guard = self.lock_subscribers();
        guard.entry(channel).or_default().push(Subscriber { id, session_filter, sender });
        (id, receiver)
    }

    /// Removes a subscription from `channel`, if still present.
    ///
    /// A no-op if the id was already reaped by a prior broadcast.
    pub fn unsubscribe(&self, channel: Channel, id: SubscriptionId) {
        let mut guard = self.lock_subscribers();
        if let Some(entries) = guard.get_mut(&channel) {
            entries.retain(|sub| sub.id != id);
        }
    }

    /// Returns the number of live subscribers on `channel`.
    #[must_use]
    pub fn subscriber_count(&self, channel: Channel) -> usize {
        self.lock_subscribers().get(&channel).map_or(0, Vec::len)
    }

    /// Delivers `payload` to every subscriber on `channel`, regardless of
    /// session filter.
    pub fn broadcast_to_channel(&self, channel: Channel, payload: Value) {
        self.publish(channel, None, payload);
    }

    /// Delivers `payload` to every subscriber on `channel` whose session
    /// filter is unset or matches `session_id`.
    pub fn broadcast_to_channel_for_session(&self, channel: Channel, session_id: &SessionId, payload: Value) {
        self.publish(channel, Some(session_id), payload);
    }

    fn publish(&self, channel: Channel, session_id: Option<&SessionId>, payload: Value) {
        let snapshot: Vec<(SubscriptionId, Option<SessionId>, mpsc::Sender<Arc<Value>>)> = {
            let guard = self.lock_subscribers();
            guard
                .get(&channel)
                .map(|entries| {
                    entries.iter().map(|sub| (sub.id, sub.session_filter.clone(), sub.sender.clone())).collect()
                })
                .unwrap_or_default()
        };

        let payload = Arc::new(payload);
        let mut closed = Vec::new();
        for (id, filter, sender) in snapshot {
            if let Some(session_id) = session_id
                && filter.as_ref().is_some_and(|filter| filter != session_id)
            {
                continue;
            }
            match sender.try_send(Arc::clone(&payload)) {
                Ok(()) | Err(TrySendError::Full(_)) => {}
                Err(TrySendError::Closed(_)) => closed.push(id),
            }
        }

        if !closed.is_empty() {
            let mut guard = self.lock_subscribers();
            if let Some(entries) = guard.get_mut(&channel) {
                entries.retain(|sub| !closed.contains(&sub.id));
            }
        }
    }

    fn lock_subscribers(&self) -> std::sync::MutexGuard<'_, HashMap<Channel, Vec<Subscriber>>> {
        self.subscribers.lock().unwrap_or_else(PoisonError::into_inner)
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

    use ava_core::identifiers::SessionId;
    use serde_json::json;

    use super::BroadcastHub;
    use super::Channel;

    #[tokio::test]
    async fn broadcast_delivers_to_subscriber() {
        let hub = BroadcastHub::new();
        let (_id, mut rx) = hub.subscribe(Channel::Dashboard, None);
        hub.broadcast_to_channel(Channel::Dashboard, json!({"kind": "evaluation"}));
        let received = rx.recv().await.expect("expected a frame");
        assert_eq!(received["kind"], "evaluation");
    }

    #[tokio::test]
    async fn session_filter_excludes_other_sessions() {
        let hub = BroadcastHub::new();
        let session = SessionId::new("sess-a");
        let other = SessionId::new("sess-b");
        let (_id, mut rx) = hub.subscribe(Channel::Widget, Some(session.clone()));
        hub.broadcast_to_channel_for_session(Channel::Widget, &other, json!({"kind": "intervention"}));
        assert!(rx.try_recv().is_err());
        hub.broadcast_to_channel_for_session(Channel::Widget, &session, json!({"kind": "intervention"}));
        assert!(rx.try_recv().is_ok());
    }

    #[tokio::test]
    async fn unsubscribe_removes_subscriber() {
        let hub = BroadcastHub::new();
        let (id, _rx) = hub.subscribe(Channel::Demo, None);
        assert_eq!(hub.subscriber_count(Channel::Demo), 1);
        hub.unsubscribe(Channel::Demo, id);
        assert_eq!(hub.subscriber_count(Channel::Demo), 0);
    }

    #[tokio::test]
    async fn dropped_receiver_is_reaped_on_next_publish() {
        let hub = BroadcastHub::new();
        let (_id, rx) = hub.subscribe(Channel::Dashboard, None);
        drop(rx);
        hub.broadcast_to_channel(Channel::Dashboard, json!({"kind": "evaluation"}));
        assert_eq!(hub.subscriber_count(Channel::Dashboard), 0);
    }
}
