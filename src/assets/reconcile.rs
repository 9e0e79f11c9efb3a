// src/assets/reconcile.rs
use std::collections::BTreeSet;

use chrono::NaiveDate;
use tracing::{debug, info, warn};

use super::{is_plain_name, LocalAssets};
use crate::error::Result;
use crate::remote::{join_path, RemoteEntry, RemoteStore};
use crate::snapshot::RemoteLayout;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileReport {
    pub downloaded: usize,
    /// Remote files already present locally by name.
    pub skipped: usize,
}

/// Download assets the snapshot has and the device lacks.
///
/// Identity is the file name within its root (and note folder); a local file
/// with the same name is never overwritten, even if its bytes differ.
pub async fn reconcile<S: RemoteStore>(
    store: &S,
    local: &LocalAssets,
    layout: &RemoteLayout,
    date: NaiveDate,
) -> Result<ReconcileReport> {
    let mut report = ReconcileReport::default();

    let remote_notes = layout.note_assets_path(date);
    for entry in list_or_empty(store, &remote_notes).await? {
        if !entry.is_dir() || !is_plain_name(&entry.name) {
            continue;
        }
        let note_id = entry.name;
        let present: BTreeSet<String> = local.note_files(&note_id).await?.into_iter().collect();
        let remote_dir = join_path(&remote_notes, &note_id);
        let target_dir = local.note_assets_dir().join(&note_id);
        copy_missing(store, local, &remote_dir, &target_dir, &present, &mut report).await?;
    }

    let remote_files = layout.file_assets_path(date);
    let present: BTreeSet<String> = local.shared_files().await?.into_iter().collect();
    copy_missing(
        store,
        local,
        &remote_files,
        local.file_assets_dir(),
        &present,
        &mut report,
    )
    .await?;

    info!(
        downloaded = report.downloaded,
        skipped = report.skipped,
        "Assets reconciled"
    );
    Ok(report)
}

async fn copy_missing<S: RemoteStore>(
    store: &S,
    local: &LocalAssets,
    remote_dir: &str,
    target_dir: &std::path::Path,
    present: &BTreeSet<String>,
    report: &mut ReconcileReport,
) -> Result<()> {
    for entry in list_or_empty(store, remote_dir).await? {
        if entry.is_dir() {
            continue;
        }
        if !is_plain_name(&entry.name) {
            warn!(dir = %remote_dir, name = %entry.name, "Skipping asset with unsafe name");
            continue;
        }
        if present.contains(&entry.name) {
            report.skipped += 1;
            continue;
        }
        let bytes = store
            .download_file(&join_path(remote_dir, &entry.name))
            .await?;
        if local.write_new(&target_dir.join(&entry.name), &bytes).await? {
            debug!(dir = %remote_dir, name = %entry.name, "Downloaded asset");
            report.downloaded += 1;
        } else {
            report.skipped += 1;
        }
    }
    Ok(())
}

async fn list_or_empty<S: RemoteStore>(store: &S, path: &str) -> Result<Vec<RemoteEntry>> {
    match store.list_directory(path).await {
        Ok(entries) => Ok(entries),
        Err(e) if e.is_not_found() => Ok(Vec::new()),
        Err(e) => Err(e),
    }
}
