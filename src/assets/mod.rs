// src/assets/mod.rs
//! Binary assets referenced from note content.
//!
//! Locally, note-scoped assets live in `note-assets/<noteId>/<file>` and
//! shared file attachments in `file-assets/<file>`. A snapshot mirrors these
//! as `assets/<noteId>/<file>` and `file-assets/<file>`.

mod reconcile;

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::Result;
use crate::remote::{join_path, RemoteStore};
use crate::snapshot::RemoteLayout;

pub use self::reconcile::{reconcile, ReconcileReport};

const STAGING_PREFIX: &str = ".notesync-";
const STAGING_SUFFIX: &str = ".part";

#[derive(Debug, Clone)]
pub struct LocalAssets {
    note_assets: PathBuf,
    file_assets: PathBuf,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct UploadReport {
    pub note_assets: usize,
    pub file_assets: usize,
}

impl LocalAssets {
    pub fn new(note_assets: impl Into<PathBuf>, file_assets: impl Into<PathBuf>) -> Self {
        Self {
            note_assets: note_assets.into(),
            file_assets: file_assets.into(),
        }
    }

    pub fn note_assets_dir(&self) -> &Path {
        &self.note_assets
    }

    pub fn file_assets_dir(&self) -> &Path {
        &self.file_assets
    }

    /// Note ids that own a local asset folder.
    pub async fn note_ids(&self) -> Result<Vec<String>> {
        let mut ids = Vec::new();
        for (name, is_dir) in read_dir_sorted(&self.note_assets).await? {
            if is_dir {
                ids.push(name);
            }
        }
        Ok(ids)
    }

    /// Files in one note's asset folder. Missing folders are empty.
    pub async fn note_files(&self, note_id: &str) -> Result<Vec<String>> {
        files_in(&self.note_assets.join(note_id)).await
    }

    pub async fn shared_files(&self) -> Result<Vec<String>> {
        files_in(&self.file_assets).await
    }

    /// Write a file unless one with that name already exists.
    /// Returns `false` when the existing file was kept.
    ///
    /// Bytes go to a staging file first and are hard-linked into place, so
    /// a failed write never leaves a truncated asset under the final name.
    pub(crate) async fn write_new(&self, path: &Path, bytes: &[u8]) -> Result<bool> {
        let dir = path.parent().unwrap_or_else(|| Path::new("."));
        tokio::fs::create_dir_all(dir).await?;
        let staging = dir.join(format!(
            "{}{}{}",
            STAGING_PREFIX,
            Uuid::new_v4(),
            STAGING_SUFFIX
        ));

        let placed = stage_and_link(&staging, path, bytes).await;
        if let Err(e) = tokio::fs::remove_file(&staging).await {
            if e.kind() != ErrorKind::NotFound {
                warn!(path = ?staging, error = %e, "Failed to remove staging file");
            }
        }
        placed
    }

    /// Mirror both local asset roots into the snapshot folder for `date`.
    /// The snapshot folder must already exist.
    pub async fn upload<S: RemoteStore>(
        &self,
        store: &S,
        layout: &RemoteLayout,
        date: NaiveDate,
    ) -> Result<UploadReport> {
        let mut report = UploadReport::default();

        let remote_notes = layout.note_assets_path(date);
        store.create_folder(&remote_notes).await?;
        for note_id in self.note_ids().await? {
            let files = self.note_files(&note_id).await?;
            if files.is_empty() {
                continue;
            }
            let remote_dir = join_path(&remote_notes, &note_id);
            store.create_folder(&remote_dir).await?;
            for file in files {
                let bytes = tokio::fs::read(self.note_assets.join(&note_id).join(&file)).await?;
                store
                    .upload_file(&join_path(&remote_dir, &file), bytes)
                    .await?;
                report.note_assets += 1;
            }
        }

        let remote_files = layout.file_assets_path(date);
        store.create_folder(&remote_files).await?;
        for file in self.shared_files().await? {
            let bytes = tokio::fs::read(self.file_assets.join(&file)).await?;
            store
                .upload_file(&join_path(&remote_files, &file), bytes)
                .await?;
            report.file_assets += 1;
        }

        debug!(
            note_assets = report.note_assets,
            file_assets = report.file_assets,
            "Uploaded assets"
        );
        Ok(report)
    }
}

async fn stage_and_link(staging: &Path, path: &Path, bytes: &[u8]) -> Result<bool> {
    let mut file = tokio::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(staging)
        .await?;
    file.write_all(bytes).await?;
    file.sync_all().await?;
    drop(file);
    match tokio::fs::hard_link(staging, path).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(false),
        Err(e) => Err(e.into()),
    }
}

/// Leftover from an interrupted `write_new`.
fn is_staging(name: &str) -> bool {
    name.starts_with(STAGING_PREFIX) && name.ends_with(STAGING_SUFFIX)
}

/// Entry names that are safe to use as a single local path component.
pub(crate) fn is_plain_name(name: &str) -> bool {
    !name.is_empty() && name != "." && name != ".." && !name.contains(['/', '\\'])
}

async fn files_in(dir: &Path) -> Result<Vec<String>> {
    Ok(read_dir_sorted(dir)
        .await?
        .into_iter()
        .filter(|(name, is_dir)| !is_dir && !is_staging(name))
        .map(|(name, _)| name)
        .collect())
}

async fn read_dir_sorted(dir: &Path) -> Result<Vec<(String, bool)>> {
    let mut rd = match tokio::fs::read_dir(dir).await {
        Ok(rd) => rd,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };
    let mut out = Vec::new();
    while let Some(entry) = rd.next_entry().await? {
        let Ok(name) = entry.file_name().into_string() else {
            warn!(path = ?entry.path(), "Skipping asset with non UTF-8 name");
            continue;
        };
        out.push((name, entry.file_type().await?.is_dir()));
    }
    out.sort();
    Ok(out)
}
