// crates/ava-store-sqlite/src/repos/event.rs
// ============================================================================
// Module: Event Repo
// Description: SqliteStore's implementation of ava_core::repo::EventRepo.
// ============================================================================

use std::collections::HashMap;

use async_trait::async_trait;
use ava_core::identifiers::SessionId;
use ava_core::identifiers::SiteUrl;
use ava_core::model::event::PageType;
use ava_core::model::event::TrackEvent;
use ava_core::repo::EventRepo;
use ava_core::repo::EventRepoError;
use ava_core::repo::FunnelStepCounts;
use rusqlite::params;
use time::OffsetDateTime;

use crate::codec::decode;
use crate::codec::encode;
use crate::store::SqliteStore;
use crate::time_fmt::rfc3339;

/// Canonical funnel order the dashboard renders step counts in.
const FUNNEL_ORDER: [(PageType, &str); 8] = [
    (PageType::Landing, "landing"),
    (PageType::Category, "category"),
    (PageType::SearchResults, "search_results"),
    (PageType::Pdp, "pdp"),
    (PageType::Cart, "cart"),
    (PageType::Checkout, "checkout"),
    (PageType::Account, "account"),
    (PageType::Other, "other"),
];

fn to_store_err(err: crate::error::SqliteStoreError) -> EventRepoError {
    EventRepoError::Store(err.as_store_message())
}

fn row_entity(row: &rusqlite::Row<'_>) -> rusqlite::Result<(Vec<u8>, String)> {
    Ok((row.get(0)?, row.get(1)?))
}

#[async_trait]
impl EventRepo for SqliteStore {
    async fn append(&self, event: TrackEvent) -> Result<(), EventRepoError> {
        let (bytes, hash) = encode(&event).map_err(to_store_err)?;
        let page_type = FUNNEL_ORDER
            .iter()
            .find(|(pt, _)| *pt == event.page_type)
            .map_or("other", |(_, label)| *label);
        self.with_write(|conn| {
            conn.execute(
                "INSERT INTO events (id, session_id, page_type, ts, json, hash)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    event.id.as_str(),
                    event.session_id.as_str(),
                    page_type,
                    rfc3339(event.timestamp),
                    bytes,
                    hash,
                ],
            )
        })
        .map_err(to_store_err)
    }

    async fn list_by_session(
        &self,
        session_id: &SessionId,
        limit: usize,
    ) -> Result<Vec<TrackEvent>, EventRepoError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = self
            .with_read(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT json, hash FROM events WHERE session_id = ?1 ORDER BY ts DESC LIMIT ?2",
                )?;
                let rows = stmt
                    .query_map(params![session_id.as_str(), limit], row_entity)?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                Ok(rows)
            })
            .map_err(to_store_err)?;
        let mut events = rows
            .into_iter()
            .map(|(bytes, hash)| decode::<TrackEvent>(&bytes, &hash).map_err(to_store_err))
            .collect::<Result<Vec<_>, _>>()?;
        events.reverse();
        Ok(events)
    }

    async fn funnel_step_counts(
        &self,
        site_url: &SiteUrl,
        since: OffsetDateTime,
    ) -> Result<FunnelStepCounts, EventRepoError> {
        let counts = self
            .with_read(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT e.page_type, COUNT(*) FROM events e
                     JOIN sessions s ON s.session_id = e.session_id
                     WHERE s.site_url = ?1 AND e.ts >= ?2
                     GROUP BY e.page_type",
                )?;
                let rows = stmt
                    .query_map(params![site_url.as_str(), rfc3339(since)], |row| {
                        Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
                    })?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                Ok(rows)
            })
            .map_err(to_store_err)?;
        let by_page: HashMap<String, u64> = counts
            .into_iter()
            .map(|(page, count)| (page, count.try_into().unwrap_or(0)))
            .collect();
        let steps = FUNNEL_ORDER
            .iter()
            .map(|(_, label)| ((*label).to_owned(), by_page.get(*label).copied().unwrap_or(0)))
            .collect();
        Ok(FunnelStepCounts { steps })
    }

    async fn readiness(&self) -> Result<(), EventRepoError> {
        self.with_read(|conn| conn.query_row("SELECT 1", [], |_| Ok(())))
            .map_err(to_store_err)
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

    use ava_core::identifiers::EventId;
    use ava_core::model::event::DeviceType;
    use ava_core::model::event::EventCategory;
    use ava_core::model::event::ReferrerType;
    use time::macros::datetime;

    use super::*;
    use crate::connection::SqliteStoreConfig;

    fn sample_event(id: &str, session_id: &str, at: OffsetDateTime) -> TrackEvent {
        TrackEvent::new(
            EventId::from(id),
            SessionId::from(session_id),
            at,
            EventCategory::Navigation,
            "page_view",
            PageType::Landing,
            DeviceType::Desktop,
            ReferrerType::Direct,
        )
    }

    #[tokio::test]
    async fn list_by_session_returns_oldest_first() {
        let store = SqliteStore::open(SqliteStoreConfig::in_memory()).expect("open");
        store
            .append(sample_event("e-1", "s-1", datetime!(2026-01-01 00:00:00 UTC)))
            .await
            .expect("append");
        store
            .append(sample_event("e-2", "s-1", datetime!(2026-01-01 00:01:00 UTC)))
            .await
            .expect("append");
        let events = store.list_by_session(&SessionId::from("s-1"), 10).await.expect("list");
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].id.as_str(), "e-1");
        assert_eq!(events[1].id.as_str(), "e-2");
    }
}
