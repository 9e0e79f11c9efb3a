// src/snapshot/naming.rs
//! Remote folder layout and dated folder names.

use chrono::NaiveDate;

use crate::remote::{join_path, normalize_path};

pub const DOCUMENT_FILE: &str = "data.json";
pub const NOTE_ASSETS_DIR: &str = "assets";
pub const FILE_ASSETS_DIR: &str = "file-assets";

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Where snapshots live: `<root>/<app_name> <YYYY-MM-DD>/...`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteLayout {
    root: String,
    app_name: String,
}

impl RemoteLayout {
    pub fn new(root: &str, app_name: impl Into<String>) -> Self {
        Self {
            root: normalize_path(root),
            app_name: app_name.into(),
        }
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    pub fn app_name(&self) -> &str {
        &self.app_name
    }

    pub fn folder_name(&self, date: NaiveDate) -> String {
        format!("{} {}", self.app_name, date.format(DATE_FORMAT))
    }

    pub fn folder_path(&self, date: NaiveDate) -> String {
        join_path(&self.root, &self.folder_name(date))
    }

    pub fn document_path(&self, date: NaiveDate) -> String {
        join_path(&self.folder_path(date), DOCUMENT_FILE)
    }

    pub fn note_assets_path(&self, date: NaiveDate) -> String {
        join_path(&self.folder_path(date), NOTE_ASSETS_DIR)
    }

    pub fn file_assets_path(&self, date: NaiveDate) -> String {
        join_path(&self.folder_path(date), FILE_ASSETS_DIR)
    }

    /// Date encoded in a snapshot folder name, or `None` for any other entry.
    pub fn parse_folder_date(&self, name: &str) -> Option<NaiveDate> {
        let date = name.strip_prefix(&self.app_name)?.strip_prefix(' ')?;
        if date.len() != 10 {
            return None;
        }
        NaiveDate::parse_from_str(date, DATE_FORMAT).ok()
    }
}
