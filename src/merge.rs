// src/merge.rs
//! Deterministic merge of two note libraries.
//!
//! Notes merge by whole-note last-writer-wins on `updatedAt`; labels and
//! tombstones are unions; lock tables are shallow key-wise merges where the
//! imported side overrides the keys it defines. Tombstoned ids never survive.

use std::cmp::Ordering;

use crate::entity::{Note, NoteLibrary};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MergeStats {
    /// Notes whose merged value came from the local side.
    pub from_local: usize,
    /// Notes whose merged value came from the imported side.
    pub from_imported: usize,
    /// Notes dropped because one side holds a tombstone for them.
    pub suppressed: usize,
}

pub fn merge(local: &NoteLibrary, imported: &NoteLibrary) -> NoteLibrary {
    merge_with_stats(local, imported).0
}

pub fn merge_with_stats(local: &NoteLibrary, imported: &NoteLibrary) -> (NoteLibrary, MergeStats) {
    let mut stats = MergeStats::default();
    let mut merged = NoteLibrary::new();

    merged.tombstones = local.tombstones.clone();
    for (id, at) in &imported.tombstones {
        merged
            .tombstones
            .entry(id.clone())
            .and_modify(|existing| *existing = (*existing).max(*at))
            .or_insert(*at);
    }

    for (id, note) in &local.notes {
        if merged.tombstones.contains_key(id) {
            stats.suppressed += 1;
            continue;
        }
        let winner = match imported.notes.get(id) {
            Some(other) if prefer_imported(note, other) => {
                stats.from_imported += 1;
                other
            }
            _ => {
                stats.from_local += 1;
                note
            }
        };
        merged.notes.insert(id.clone(), winner.clone());
    }
    for (id, note) in &imported.notes {
        if local.notes.contains_key(id) {
            continue;
        }
        if merged.tombstones.contains_key(id) {
            stats.suppressed += 1;
            continue;
        }
        stats.from_imported += 1;
        merged.notes.insert(id.clone(), note.clone());
    }

    merged.labels = local.labels.union(&imported.labels).cloned().collect();

    merged.lock_status = local.lock_status.clone();
    merged.lock_status.extend(
        imported
            .lock_status
            .iter()
            .map(|(k, v)| (k.clone(), v.clone())),
    );
    merged.is_locked = local.is_locked.clone();
    merged
        .is_locked
        .extend(imported.is_locked.iter().map(|(k, v)| (k.clone(), *v)));
    for id in merged.tombstones.keys() {
        merged.lock_status.remove(id);
        merged.is_locked.remove(id);
    }

    (merged, stats)
}

/// Strictly newer wins. Equal timestamps fall back to comparing the
/// serialized notes so either argument order picks the same note.
fn prefer_imported(local: &Note, imported: &Note) -> bool {
    match imported.updated_at.cmp(&local.updated_at) {
        Ordering::Greater => true,
        Ordering::Less => false,
        Ordering::Equal => {
            let a = serde_json::to_vec(local).ok();
            let b = serde_json::to_vec(imported).ok();
            b > a
        }
    }
}
