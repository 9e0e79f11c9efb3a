// src/snapshot/mod.rs
//! Dated snapshot folders on the remote backend.
//!
//! A snapshot is one folder per calendar date holding `data.json` (the
//! [`SnapshotDocument`]), an `assets/` tree of note-scoped subfolders, and a
//! flat `file-assets/` folder.

pub mod locator;
pub mod naming;
pub mod retention;

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::entity::{NoteCollection, NoteLibrary};
use crate::error::{NotesyncError, Result};

pub use self::locator::{locate_latest, SNAPSHOT_LOOKBACK_DAYS};
pub use self::naming::{RemoteLayout, DOCUMENT_FILE, FILE_ASSETS_DIR, NOTE_ASSETS_DIR};
pub use self::retention::{enforce_retention, list_snapshot_dates, RetentionReport};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotData {
    #[serde(default)]
    pub notes: NoteCollection,
    #[serde(default)]
    pub lock_status: BTreeMap<String, String>,
    #[serde(default)]
    pub is_locked: BTreeMap<String, bool>,
}

/// Wire form of `data.json`.
///
/// `deletedAt` is an extension carrying tombstone instants in epoch
/// milliseconds; documents without it are accepted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotDocument {
    pub data: SnapshotData,
    #[serde(default)]
    pub labels: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_ids: Option<BTreeSet<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<BTreeMap<String, i64>>,
}

impl SnapshotDocument {
    pub fn from_library(library: &NoteLibrary) -> Self {
        let (deleted_ids, deleted_at) = if library.tombstones.is_empty() {
            (None, None)
        } else {
            (
                Some(library.deleted_ids()),
                Some(
                    library
                        .tombstones
                        .iter()
                        .map(|(id, at)| (id.clone(), at.timestamp_millis()))
                        .collect(),
                ),
            )
        };
        Self {
            data: SnapshotData {
                notes: library.notes.clone(),
                lock_status: library.lock_status.clone(),
                is_locked: library.is_locked.clone(),
            },
            labels: library.labels.clone(),
            deleted_ids,
            deleted_at,
        }
    }

    /// Convert to a library. Map keys are authoritative for note ids.
    /// Tombstones without a recorded instant are stamped with `now`.
    pub fn into_library(self, now: DateTime<Utc>) -> NoteLibrary {
        let deleted_at = self.deleted_at.unwrap_or_default();
        let mut tombstones: BTreeMap<String, DateTime<Utc>> = self
            .deleted_ids
            .unwrap_or_default()
            .into_iter()
            .map(|id| {
                let at = deleted_at
                    .get(&id)
                    .and_then(|ms| Utc.timestamp_millis_opt(*ms).single())
                    .unwrap_or(now);
                (id, at)
            })
            .collect();
        for (id, ms) in deleted_at {
            if let Some(at) = Utc.timestamp_millis_opt(ms).single() {
                tombstones.entry(id).or_insert(at);
            }
        }

        let notes = self
            .data
            .notes
            .into_iter()
            .map(|(id, mut note)| {
                note.id = id.clone();
                (id, note)
            })
            .collect();

        NoteLibrary {
            notes,
            labels: self.labels,
            lock_status: self.data.lock_status,
            is_locked: self.data.is_locked,
            tombstones,
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(|e| NotesyncError::InvalidSnapshot(e.to_string()))
    }
}
