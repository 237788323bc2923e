//! Contact record store — campaign progress persisted as a JSON file.
//!
//! The file is a single JSON object mapping canonical phone key to
//! [`ProgressRecord`]. Keys are kept in a `BTreeMap` so the file is sorted
//! and stable, which makes it diffable and safe to hand-edit (deleting a
//! key resets that contact to a fresh, pre-contact state).

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::error::StoreError;
use crate::phone::PhoneKey;

/// Per-contact campaign progress.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressRecord {
    /// Set exactly once, when the initial message is confirmed sent.
    /// Reference point for all reply detection; never changes afterward.
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    /// Step indices already sent (0 = initial, 1..N = follow-ups).
    #[serde(default)]
    pub sent_steps: BTreeSet<usize>,
    /// Terminal flag: once true, nothing is ever sent to this contact again.
    #[serde(default)]
    pub halted: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub halted_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub halt_reason: Option<String>,
}

impl ProgressRecord {
    /// Record a confirmed send of `step` at `now`. The first confirmed send
    /// pins `started_at`; later sends never move it.
    pub fn mark_sent(&mut self, step: usize, now: DateTime<Utc>) {
        if self.started_at.is_none() {
            self.started_at = Some(now);
        }
        self.sent_steps.insert(step);
    }

    /// Permanently suppress further sends to this contact.
    pub fn halt(&mut self, now: DateTime<Utc>, reason: impl Into<String>) {
        self.halted = true;
        self.halted_at = Some(now);
        self.halt_reason = Some(reason.into());
    }
}

/// The full persisted state: canonical phone key → progress record.
pub type Records = BTreeMap<String, ProgressRecord>;

/// File-backed store for campaign progress. Single-writer: one run at a
/// time owns the file.
#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load all records. A missing file is an empty campaign; a file that
    /// exists but does not parse is fatal (`StoreError::Corrupt`).
    pub async fn load(&self) -> Result<Records, StoreError> {
        match fs::read_to_string(&self.path).await {
            Ok(raw) => serde_json::from_str(&raw).map_err(|source| StoreError::Corrupt {
                path: self.path.clone(),
                source,
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Records::new()),
            Err(source) => Err(StoreError::Io {
                path: self.path.clone(),
                source,
            }),
        }
    }

    /// Persist all records atomically: write a sibling temp file, then
    /// rename over the target, so a crash mid-write leaves the previous
    /// valid state intact.
    pub async fn save(&self, records: &Records) -> Result<(), StoreError> {
        let json = serde_json::to_string_pretty(records).map_err(|source| StoreError::Corrupt {
            path: self.path.clone(),
            source,
        })?;
        let tmp = self.path.with_extension("tmp");
        let io_err = |source| StoreError::Io {
            path: self.path.clone(),
            source,
        };
        fs::write(&tmp, json).await.map_err(io_err)?;
        fs::rename(&tmp, &self.path).await.map_err(io_err)?;
        Ok(())
    }

    /// Fetch the record for `key`, creating a fresh zero-state record in the
    /// in-memory map if none exists. Nothing is persisted until `save`.
    pub fn get_or_create<'a>(&self, records: &'a mut Records, key: &PhoneKey) -> &'a mut ProgressRecord {
        records.entry(key.as_str().to_string()).or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_in(dir: &tempfile::TempDir) -> StateStore {
        StateStore::new(dir.path().join("state.json"))
    }

    #[tokio::test]
    async fn missing_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        assert!(store.load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn save_and_reload_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        let now = Utc::now();

        let mut records = Records::new();
        let key = PhoneKey::parse("+19195550123").unwrap();
        let rec = store.get_or_create(&mut records, &key);
        rec.mark_sent(0, now);
        store.save(&records).await.unwrap();

        let loaded = store.load().await.unwrap();
        let rec = loaded.get("9195550123").unwrap();
        assert_eq!(rec.started_at, Some(now));
        assert!(rec.sent_steps.contains(&0));
        assert!(!rec.halted);
    }

    #[tokio::test]
    async fn corrupt_file_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        tokio::fs::write(store.path(), "{not json")
            .await
            .unwrap();
        let err = store.load().await.unwrap_err();
        assert!(matches!(err, StoreError::Corrupt { .. }));
    }

    #[tokio::test]
    async fn save_does_not_leave_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        store.save(&Records::new()).await.unwrap();
        assert!(store.path().exists());
        assert!(!store.path().with_extension("tmp").exists());
    }

    #[test]
    fn started_at_is_pinned_by_first_send() {
        let mut rec = ProgressRecord::default();
        let day0 = Utc::now();
        let day2 = day0 + chrono::Duration::days(2);
        rec.mark_sent(0, day0);
        rec.mark_sent(1, day2);
        assert_eq!(rec.started_at, Some(day0));
        assert_eq!(rec.sent_steps.iter().copied().collect::<Vec<_>>(), vec![0, 1]);
    }
}
