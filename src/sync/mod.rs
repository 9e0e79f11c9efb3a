// src/sync/mod.rs
//! Export and import of dated snapshots.
//!
//! Export writes today's snapshot folder from the local library and then
//! trims old folders. Import finds the newest usable snapshot, pulls in
//! missing assets, merges, and persists the result through the vault.

mod progress;
pub mod retry;

use std::num::NonZeroUsize;

use chrono::{Duration, NaiveDate};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::assets::{self, ReconcileReport, UploadReport};
use crate::codec;
use crate::config::SyncConfig;
use crate::entity::{now_millis, NoteLibrary};
use crate::error::{NotesyncError, Result};
use crate::merge::{merge_with_stats, MergeStats};
use crate::remote::RemoteStore;
use crate::snapshot::{
    enforce_retention, list_snapshot_dates, locate_latest, RemoteLayout, RetentionReport,
    SnapshotDocument,
};
use crate::storage::LocalVault;

pub use progress::{ProgressCallback, SyncProgress, SyncStage};
pub use retry::{retry_transient, RetryPolicy};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportReport {
    pub date: NaiveDate,
    pub folder: String,
    /// An earlier snapshot for the same date was replaced.
    pub replaced: bool,
    pub notes: usize,
    pub tombstones: usize,
    pub pruned_tombstones: usize,
    pub uploads: UploadReport,
    pub retention: RetentionReport,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportReport {
    pub date: NaiveDate,
    pub folder: String,
    pub notes: usize,
    pub merge: MergeStats,
    pub assets: ReconcileReport,
}

pub struct SyncOrchestrator<S> {
    store: S,
    layout: RemoteLayout,
    vault: LocalVault,
    retention_limit: NonZeroUsize,
    tombstone_ttl: Option<Duration>,
    cancel: CancellationToken,
    progress: Option<ProgressCallback>,
}

impl<S: RemoteStore> SyncOrchestrator<S> {
    pub fn new(store: S, layout: RemoteLayout, vault: LocalVault) -> Self {
        let defaults = SyncConfig::default();
        Self {
            store,
            layout,
            vault,
            retention_limit: defaults.retention_limit,
            tombstone_ttl: defaults.tombstone_ttl(),
            cancel: CancellationToken::new(),
            progress: None,
        }
    }

    pub fn from_config(store: S, config: &SyncConfig, vault: LocalVault) -> Self {
        let layout = RemoteLayout::new(&config.sync_root, config.app_name.clone());
        Self::new(store, layout, vault)
            .with_retention_limit(config.retention_limit)
            .with_tombstone_ttl(config.tombstone_ttl())
    }

    pub fn with_retention_limit(mut self, limit: NonZeroUsize) -> Self {
        self.retention_limit = limit;
        self
    }

    pub fn with_tombstone_ttl(mut self, ttl: Option<Duration>) -> Self {
        self.tombstone_ttl = ttl;
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn with_progress(mut self, callback: impl Fn(SyncProgress) + Send + Sync + 'static) -> Self {
        self.progress = Some(Box::new(callback));
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn layout(&self) -> &RemoteLayout {
        &self.layout
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    fn report(&self, stage: SyncStage, percent: u8) {
        if let Some(callback) = &self.progress {
            callback(SyncProgress::new(stage, percent));
        }
    }

    fn checkpoint(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            warn!("Sync cancelled");
            return Err(NotesyncError::Cancelled);
        }
        Ok(())
    }

    /// Write `library` as the snapshot for `today`, replacing any snapshot
    /// already made that day, then apply retention.
    ///
    /// Not atomic: a failure part-way leaves a folder without `data.json`,
    /// which import skips and the next export replaces.
    pub async fn export(&self, library: &NoteLibrary, today: NaiveDate) -> Result<ExportReport> {
        self.checkpoint()?;
        self.report(SyncStage::Preparing, 0);

        let mut snapshot = library.clone();
        let pruned_tombstones = match self.tombstone_ttl {
            Some(ttl) => snapshot.prune_tombstones(now_millis(), ttl),
            None => 0,
        };
        codec::encode_library(&mut snapshot);
        let document = SnapshotDocument::from_library(&snapshot).to_bytes()?;

        let folder = self.layout.folder_path(today);
        info!(folder = %folder, notes = snapshot.notes.len(), "Exporting snapshot");

        if self.layout.root() != "/" {
            self.store.create_folder(self.layout.root()).await?;
        }
        let replaced = self.store.folder_exists(&folder).await?;
        if replaced {
            info!(folder = %folder, "Replacing snapshot from earlier today");
            self.store.delete_folder(&folder).await?;
        }
        self.store.create_folder(&folder).await?;

        self.checkpoint()?;
        self.report(SyncStage::Uploading, 20);
        let uploads = self
            .vault
            .assets()
            .upload(&self.store, &self.layout, today)
            .await?;
        self.checkpoint()?;
        self.store
            .upload_file(&self.layout.document_path(today), document)
            .await?;

        self.report(SyncStage::Retention, 80);
        let limit = self.retention_limit.get();
        let retention = match enforce_retention(&self.store, &self.layout, limit).await {
            Ok(report) => report,
            Err(e) => {
                warn!(error = %e, "Retention skipped");
                RetentionReport::default()
            }
        };

        self.report(SyncStage::Done, 100);
        info!(
            folder = %folder,
            note_assets = uploads.note_assets,
            file_assets = uploads.file_assets,
            "Export complete"
        );
        Ok(ExportReport {
            date: today,
            folder,
            replaced,
            notes: snapshot.notes.len(),
            tombstones: snapshot.tombstones.len(),
            pruned_tombstones,
            uploads,
            retention,
        })
    }

    /// Merge the newest usable snapshot into `library` and persist the
    /// result. On any error the vault's note document is left unchanged.
    pub async fn import(
        &self,
        library: &NoteLibrary,
        today: NaiveDate,
    ) -> Result<(NoteLibrary, ImportReport)> {
        self.checkpoint()?;
        self.report(SyncStage::Locating, 0);
        let date = locate_latest(&self.store, &self.layout, today).await?;
        let folder = self.layout.folder_path(date);
        info!(folder = %folder, "Importing snapshot");

        self.checkpoint()?;
        self.report(SyncStage::Downloading, 20);
        let bytes = self
            .store
            .download_file(&self.layout.document_path(date))
            .await?;
        let mut remote = SnapshotDocument::from_bytes(&bytes)?.into_library(now_millis());

        self.checkpoint()?;
        self.report(SyncStage::Reconciling, 40);
        let assets =
            assets::reconcile(&self.store, &self.vault.assets(), &self.layout, date).await?;

        self.checkpoint()?;
        self.report(SyncStage::Merging, 70);
        codec::decode_library(&mut remote);
        let (merged, stats) = merge_with_stats(library, &remote);

        self.checkpoint()?;
        self.report(SyncStage::Saving, 90);
        self.vault.save(&merged)?;

        self.report(SyncStage::Done, 100);
        info!(
            folder = %folder,
            notes = merged.notes.len(),
            from_local = stats.from_local,
            from_imported = stats.from_imported,
            suppressed = stats.suppressed,
            "Import complete"
        );
        let report = ImportReport {
            date,
            folder,
            notes: merged.notes.len(),
            merge: stats,
            assets,
        };
        Ok((merged, report))
    }

    /// Snapshot dates present on the backend, newest first.
    pub async fn list_snapshots(&self) -> Result<Vec<NaiveDate>> {
        let mut dates = list_snapshot_dates(&self.store, &self.layout).await?;
        dates.reverse();
        Ok(dates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::Note;
    use crate::remote::FsStore;
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 19).unwrap()
    }

    fn orchestrator(local: &TempDir, remote: &TempDir) -> SyncOrchestrator<FsStore> {
        let vault = LocalVault::init(local.path(), &SyncConfig::default()).unwrap();
        SyncOrchestrator::new(
            FsStore::new(remote.path()),
            RemoteLayout::new("/sync", "Notes"),
            vault,
        )
    }

    #[tokio::test]
    async fn test_progress_reaches_done() {
        let local = TempDir::new().unwrap();
        let remote = TempDir::new().unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let sync = orchestrator(&local, &remote).with_progress(move |p| sink.lock().unwrap().push(p));

        sync.export(&NoteLibrary::new(), day()).await.unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen.first().unwrap().stage, SyncStage::Preparing);
        assert_eq!(*seen.last().unwrap(), SyncProgress::new(SyncStage::Done, 100));
        assert!(seen.windows(2).all(|w| w[0].percent <= w[1].percent));
    }

    #[tokio::test]
    async fn test_cancelled_token_stops_before_any_write() {
        let local = TempDir::new().unwrap();
        let remote = TempDir::new().unwrap();
        let token = CancellationToken::new();
        let sync = orchestrator(&local, &remote).with_cancellation(token.clone());
        token.cancel();

        let err = sync.export(&NoteLibrary::new(), day()).await.unwrap_err();

        assert!(matches!(err, NotesyncError::Cancelled));
        assert!(sync.list_snapshots().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_export_encodes_asset_paths() {
        let local = TempDir::new().unwrap();
        let remote = TempDir::new().unwrap();
        let sync = orchestrator(&local, &remote);
        let mut lib = NoteLibrary::new();
        let mut note = Note::new("Pic".to_string());
        note.content = crate::entity::ContentNode::container(
            "doc",
            vec![crate::entity::ContentNode::asset("image", "note-assets/n/cat.png")],
        );
        lib.upsert(note);

        sync.export(&lib, day()).await.unwrap();

        let raw = std::fs::read_to_string(
            remote.path().join("sync/Notes 2026-10-19/data.json"),
        )
        .unwrap();
        assert!(raw.contains("assets://n/cat.png"));
        assert!(!raw.contains("note-assets/"));
    }

    #[tokio::test]
    async fn test_list_snapshots_newest_first() {
        let local = TempDir::new().unwrap();
        let remote = TempDir::new().unwrap();
        let sync = orchestrator(&local, &remote);
        let yesterday = day().pred_opt().unwrap();

        sync.export(&NoteLibrary::new(), yesterday).await.unwrap();
        sync.export(&NoteLibrary::new(), day()).await.unwrap();

        assert_eq!(sync.list_snapshots().await.unwrap(), vec![day(), yesterday]);
    }
}
