// src/entity/library.rs
use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Duration, Utc};

use super::{Note, NoteCollection};
use crate::error::{NotesyncError, Result};

/// Deleted note id → instant of deletion.
pub type Tombstones = BTreeMap<String, DateTime<Utc>>;

/// Everything a device syncs: notes plus the side tables that travel with them.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NoteLibrary {
    pub notes: NoteCollection,
    pub labels: BTreeSet<String>,
    pub lock_status: BTreeMap<String, String>,
    pub is_locked: BTreeMap<String, bool>,
    pub tombstones: Tombstones,
}

impl NoteLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a note; its labels join the label set.
    pub fn upsert(&mut self, note: Note) {
        self.labels.extend(note.labels.iter().cloned());
        self.tombstones.remove(&note.id);
        self.notes.insert(note.id.clone(), note);
    }

    /// Delete a note and leave a tombstone so a stale remote copy cannot
    /// bring it back on the next import.
    pub fn delete_note(&mut self, id: &str, now: DateTime<Utc>) -> Result<Note> {
        let note = self
            .notes
            .remove(id)
            .ok_or_else(|| NotesyncError::NoteNotFound(id.to_string()))?;
        self.lock_status.remove(id);
        self.is_locked.remove(id);
        self.tombstones.insert(id.to_string(), now);
        Ok(note)
    }

    pub fn deleted_ids(&self) -> BTreeSet<String> {
        self.tombstones.keys().cloned().collect()
    }

    /// Drop tombstones older than `ttl`. Returns how many were removed.
    pub fn prune_tombstones(&mut self, now: DateTime<Utc>, ttl: Duration) -> usize {
        let cutoff = now - ttl;
        let before = self.tombstones.len();
        self.tombstones.retain(|_, deleted_at| *deleted_at >= cutoff);
        before - self.tombstones.len()
    }
}
