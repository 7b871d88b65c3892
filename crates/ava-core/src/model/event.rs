// crates/ava-core/src/model/event.rs
// ============================================================================
// Module: Track Event
// Description: Immutable per-visitor event ingested from the widget channel.
// ============================================================================

//! Track events are the raw substrate the session evaluator buffers and the
//! signal adjusters read context from. An event is immutable once ingested.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use time::OffsetDateTime;

use crate::identifiers::EventId;
use crate::identifiers::FrictionId;
use crate::identifiers::SessionId;

/// Coarse category of a [`TrackEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventCategory {
    /// Page-to-page movement.
    Navigation,
    /// Query/filter/sort interactions.
    Search,
    /// Product detail page interactions.
    Product,
    /// Cart view and mutation.
    Cart,
    /// Checkout funnel steps.
    Checkout,
    /// Login, registration, profile interactions.
    Account,
    /// Scroll, hover, dwell-style engagement signals.
    Engagement,
    /// Client-observed errors (script errors, failed requests).
    Technical,
    /// Widget lifecycle events (open, close, ping).
    System,
}

/// Page type the event occurred on, used by the intent adjuster's funnel
/// lookup (see [`crate::signals::adjust_intent`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageType {
    /// Marketing or home landing page.
    Landing,
    /// Category listing page.
    Category,
    /// Search results page.
    SearchResults,
    /// Product detail page.
    Pdp,
    /// Cart page.
    Cart,
    /// Checkout page.
    Checkout,
    /// Account/profile page.
    Account,
    /// Anything not otherwise classified.
    Other,
}

/// Coarse device class reported by the widget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceType {
    /// Desktop/laptop form factor.
    Desktop,
    /// Phone or small tablet form factor.
    Mobile,
    /// Tablet form factor.
    Tablet,
}

impl DeviceType {
    /// Returns `true` for device types the receptivity adjuster treats as
    /// mobile (see [`crate::signals::compute_receptivity`]).
    #[must_use]
    pub const fn is_mobile(self) -> bool {
        matches!(self, Self::Mobile)
    }
}

/// Coarse referrer classification reported by the widget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferrerType {
    /// No referrer (direct navigation or bookmark).
    Direct,
    /// A search engine results page.
    Search,
    /// A social network.
    Social,
    /// Paid acquisition (ads, affiliate).
    Paid,
    /// Any other external referrer.
    Other,
}

/// An immutable, per-visitor event ingested from the widget channel.
///
/// # Invariants
/// - `scroll_depth_pct`, when present, is clamped to `0..=100` by the
///   constructor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackEvent {
    /// Identifier assigned at ingress.
    pub id: EventId,
    /// Session the event belongs to.
    pub session_id: SessionId,
    /// Ingress timestamp.
    pub timestamp: OffsetDateTime,
    /// Coarse event category.
    pub category: EventCategory,
    /// Free-form, widget-supplied event type, e.g. `"add_to_cart"`.
    pub event_type: String,
    /// Page type the event occurred on.
    pub page_type: PageType,
    /// Opaque widget-supplied signal map, JSON-serialized at rest.
    pub raw_signals: BTreeMap<String, Value>,
    /// Friction catalog id detected for this event, if any.
    pub friction_id: Option<FrictionId>,
    /// Page URL the event occurred on.
    pub page_url: Option<String>,
    /// Scroll depth at time of event, percent, clamped `0..=100`.
    pub scroll_depth_pct: Option<u8>,
    /// Time spent on the page before this event fired, in milliseconds.
    pub time_on_page_ms: Option<u64>,
    /// Device class reported by the widget.
    pub device_type: DeviceType,
    /// Referrer classification reported by the widget.
    pub referrer_type: ReferrerType,
}

impl TrackEvent {
    /// Builds a [`TrackEvent`], clamping `scroll_depth_pct` into range.
    #[must_use]
    #[allow(clippy::too_many_arguments, reason = "Mirrors the widget's flat wire schema.")]
    pub fn new(
        id: EventId,
        session_id: SessionId,
        timestamp: OffsetDateTime,
        category: EventCategory,
        event_type: impl Into<String>,
        page_type: PageType,
        device_type: DeviceType,
        referrer_type: ReferrerType,
    ) -> Self {
        Self {
            id,
            session_id,
            timestamp,
            category,
            event_type: event_type.into(),
            page_type,
            raw_signals: BTreeMap::new(),
            friction_id: None,
            page_url: None,
            scroll_depth_pct: None,
            time_on_page_ms: None,
            device_type,
            referrer_type,
        }
    }

    /// Returns `true` if this event carries a friction-catalog id.
    #[must_use]
    pub const fn has_friction(&self) -> bool {
        self.friction_id.is_some()
    }

    /// Sets the scroll depth, clamping into `0..=100`.
    pub fn set_scroll_depth_pct(&mut self, pct: u8) {
        self.scroll_depth_pct = Some(pct.min(100));
    }
}
