// src/entity/note.rs
use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::ContentNode;

/// Note id → note. Ordered so serialized snapshots are stable.
pub type NoteCollection = BTreeMap<String, Note>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: ContentNode,
    #[serde(default)]
    pub labels: BTreeSet<String>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub is_bookmarked: bool,
    #[serde(default)]
    pub is_archived: bool,
    #[serde(default)]
    pub is_locked: bool,
}

impl Note {
    pub fn new(title: String) -> Self {
        let now = now_millis();
        Self {
            id: Uuid::new_v4().to_string(),
            title,
            content: ContentNode::empty_doc(),
            labels: BTreeSet::new(),
            created_at: now,
            updated_at: now,
            is_bookmarked: false,
            is_archived: false,
            is_locked: false,
        }
    }
}

/// Current instant at the millisecond precision notes are stored with.
pub fn now_millis() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}
