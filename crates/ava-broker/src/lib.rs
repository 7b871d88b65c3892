// crates/ava-broker/src/lib.rs
// ============================================================================
// Crate: ava-broker
// Description: Channel-scoped, session-filterable best-effort broadcast hub.
// ============================================================================

//! ## Overview
//! `ava-broker` is the fan-out layer between the session evaluator and the
//! widget/dashboard transports the rest of this workspace does not
//! implement. [`BroadcastHub`] is its single exported type: a registry of
//! subscribers per [`Channel`], safe under concurrent
//! subscribe/unsubscribe/broadcast, with best-effort delivery.

pub mod channel;
pub mod hub;

pub use channel::Channel;
pub use hub::BroadcastHub;
pub use hub::DEFAULT_SUBSCRIBER_CAPACITY;
pub use hub::SubscriptionId;
