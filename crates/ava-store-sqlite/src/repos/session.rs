// crates/ava-store-sqlite/src/repos/session.rs
// ============================================================================
// Module: Session Repo
// Description: SqliteStore's implementation of ava_core::repo::SessionRepo.
// ============================================================================

use async_trait::async_trait;
use ava_core::identifiers::SessionId;
use ava_core::identifiers::SessionKey;
use ava_core::identifiers::VisitorKey;
use ava_core::model::session::Session;
use ava_core::model::session::SessionStatus;
use ava_core::repo::SessionRepo;
use ava_core::repo::SessionRepoError;
use rusqlite::OptionalExtension;
use rusqlite::params;
use time::OffsetDateTime;

use crate::codec::decode;
use crate::codec::encode;
use crate::store::SqliteStore;
use crate::time_fmt::rfc3339;

fn to_store_err(err: crate::error::SqliteStoreError) -> SessionRepoError {
    SessionRepoError::Store(err.as_store_message())
}

fn save(conn: &rusqlite::Connection, session: &Session) -> rusqlite::Result<()> {
    let (bytes, hash) = encode(session).map_err(to_rusqlite_err)?;
    conn.execute(
        "INSERT INTO sessions (session_id, visitor_key, session_key, site_url, last_seen_at, json, hash)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
         ON CONFLICT(session_id) DO UPDATE SET
            visitor_key = excluded.visitor_key,
            session_key = excluded.session_key,
            site_url = excluded.site_url,
            last_seen_at = excluded.last_seen_at,
            json = excluded.json,
            hash = excluded.hash",
        params![
            session.session_id.as_str(),
            session.visitor_key.as_str(),
            session.session_key.as_str(),
            session.site_url.as_str(),
            rfc3339(session.last_seen_at),
            bytes,
            hash,
        ],
    )?;
    Ok(())
}

fn to_rusqlite_err(err: crate::error::SqliteStoreError) -> rusqlite::Error {
    rusqlite::Error::ToSqlConversionFailure(Box::new(err))
}

fn row_entity(row: &rusqlite::Row<'_>) -> rusqlite::Result<(Vec<u8>, String)> {
    Ok((row.get(0)?, row.get(1)?))
}

#[async_trait]
impl SessionRepo for SqliteStore {
    async fn upsert(&self, session: Session) -> Result<(), SessionRepoError> {
        self.with_write(|conn| save(conn, &session)).map_err(to_store_err)
    }

    async fn lookup_by(
        &self,
        visitor_key: &VisitorKey,
        session_key: &SessionKey,
    ) -> Result<Option<Session>, SessionRepoError> {
        let row = self
            .with_read(|conn| {
                conn.query_row(
                    "SELECT json, hash FROM sessions WHERE visitor_key = ?1 AND session_key = ?2",
                    params![visitor_key.as_str(), session_key.as_str()],
                    row_entity,
                )
                .optional()
            })
            .map_err(to_store_err)?;
        match row {
            Some((bytes, hash)) => {
                let session = decode(&bytes, &hash).map_err(to_store_err)?;
                Ok(Some(session))
            }
            None => Ok(None),
        }
    }

    async fn get(&self, session_id: &SessionId) -> Result<Session, SessionRepoError> {
        let row = self
            .with_read(|conn| {
                conn.query_row(
                    "SELECT json, hash FROM sessions WHERE session_id = ?1",
                    params![session_id.as_str()],
                    row_entity,
                )
                .optional()
            })
            .map_err(to_store_err)?;
        let (bytes, hash) = row.ok_or(SessionRepoError::NotFound)?;
        decode(&bytes, &hash).map_err(to_store_err)
    }

    async fn list_since(&self, since: OffsetDateTime) -> Result<Vec<Session>, SessionRepoError> {
        let rows = self
            .with_read(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT json, hash FROM sessions WHERE last_seen_at >= ?1 ORDER BY last_seen_at",
                )?;
                let rows = stmt
                    .query_map(params![rfc3339(since)], row_entity)?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                Ok(rows)
            })
            .map_err(to_store_err)?;
        rows.into_iter()
            .map(|(bytes, hash)| decode(&bytes, &hash).map_err(to_store_err))
            .collect()
    }

    async fn mark_ended(&self, session_id: &SessionId, at: OffsetDateTime) -> Result<(), SessionRepoError> {
        let mut session = self.get(session_id).await?;
        session.status = SessionStatus::Ended;
        if at > session.last_seen_at {
            session.last_seen_at = at;
        }
        self.with_write(|conn| save(conn, &session)).map_err(to_store_err)
    }

    async fn update(&self, session: Session) -> Result<(), SessionRepoError> {
        self.with_write(|conn| save(conn, &session)).map_err(to_store_err)
    }

    async fn readiness(&self) -> Result<(), SessionRepoError> {
        self.with_read(|conn| conn.query_row("SELECT 1", [], |_| Ok(())))
            .map_err(to_store_err)
    }
}
