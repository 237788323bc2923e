//! Reply detection.
//!
//! The engine only needs one question answered: "when did this contact last
//! send us anything?" [`ReplySource`] abstracts that over whatever message
//! store is available; [`ChatDbReplySource`] is the Messages.app adapter.
//! Lookups are strictly read-only.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OpenFlags, OptionalExtension};

use crate::error::ReplyError;
use crate::phone::PhoneKey;

/// Read-only source of inbound-message timestamps.
#[async_trait]
pub trait ReplySource: Send + Sync {
    /// Most recent inbound message timestamp for `key`, or `None` if the
    /// contact has never written in. Errors are surfaced so the engine can
    /// apply its fail-safe policy; absence of evidence is not proof of
    /// silence.
    async fn last_inbound_at(&self, key: &PhoneKey) -> Result<Option<DateTime<Utc>>, ReplyError>;
}

/// Seconds between the Unix epoch and Apple's 2001-01-01 reference date.
const APPLE_EPOCH_OFFSET: i64 = 978_307_200;

/// Convert an Apple absolute timestamp to UTC. Recent macOS versions store
/// nanoseconds, older ones seconds; values past ~year 33658 in seconds are
/// taken to be nanoseconds.
fn apple_to_utc(ts: i64) -> Option<DateTime<Utc>> {
    let secs = if ts > 1_000_000_000_000 {
        ts / 1_000_000_000
    } else {
        ts
    };
    DateTime::from_timestamp(secs + APPLE_EPOCH_OFFSET, 0)
}

/// Reply source backed by the macOS Messages database (`chat.db`).
///
/// Requires Full Disk Access for the invoking terminal. Opens the database
/// immutable and read-only, which is safe while Messages.app is running.
pub struct ChatDbReplySource {
    db_path: PathBuf,
}

impl ChatDbReplySource {
    pub fn new(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: db_path.into(),
        }
    }

    fn query_last_inbound(
        db_path: &Path,
        key: &str,
    ) -> Result<Option<DateTime<Utc>>, ReplyError> {
        if !db_path.exists() {
            return Err(ReplyError::Unavailable {
                reason: format!("chat.db not found at {}", db_path.display()),
            });
        }

        let uri = format!("file:{}?immutable=1", db_path.display());
        let conn = Connection::open_with_flags(
            uri,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_URI,
        )
        .map_err(|e| ReplyError::Unavailable {
            reason: format!("cannot open {} (missing Full Disk Access?): {e}", db_path.display()),
        })?;

        // Handle ids come in as "+19195550123", "tel:919-555-0123", etc.;
        // match on the canonical 10-digit tail.
        let sql = "\
            SELECT message.date
            FROM message
            JOIN handle ON handle.ROWID = message.handle_id
            WHERE message.is_from_me = 0
              AND REPLACE(REPLACE(REPLACE(handle.id,'-',''),' ',''),'tel:','') LIKE ?1
            ORDER BY message.date DESC
            LIMIT 1";
        let pattern = format!("%{key}");
        let raw: Option<i64> = conn
            .query_row(sql, [&pattern], |row| row.get::<_, Option<i64>>(0))
            .optional()
            .map_err(|e| ReplyError::Query {
                reason: e.to_string(),
            })?
            .flatten();

        Ok(raw.and_then(apple_to_utc))
    }
}

#[async_trait]
impl ReplySource for ChatDbReplySource {
    async fn last_inbound_at(&self, key: &PhoneKey) -> Result<Option<DateTime<Utc>>, ReplyError> {
        let db_path = self.db_path.clone();
        let key = key.as_str().to_string();
        tokio::task::spawn_blocking(move || Self::query_last_inbound(&db_path, &key))
            .await
            .map_err(|e| ReplyError::Unavailable {
                reason: format!("lookup task failed: {e}"),
            })?
    }
}
