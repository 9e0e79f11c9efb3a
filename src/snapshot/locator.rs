// src/snapshot/locator.rs
use chrono::{Days, NaiveDate};
use tracing::{debug, warn};

use super::{RemoteLayout, DOCUMENT_FILE};
use crate::error::{NotesyncError, Result};
use crate::remote::RemoteStore;

/// Days probed by [`locate_latest`], counting today.
pub const SNAPSHOT_LOOKBACK_DAYS: u32 = 30;

/// Newest usable snapshot date in `today - 29 ..= today`.
///
/// A folder is usable when it exists and contains the snapshot document;
/// a folder left behind by an interrupted export is skipped.
pub async fn locate_latest<S: RemoteStore>(
    store: &S,
    layout: &RemoteLayout,
    today: NaiveDate,
) -> Result<NaiveDate> {
    for offset in 0..SNAPSHOT_LOOKBACK_DAYS {
        let Some(date) = today.checked_sub_days(Days::new(u64::from(offset))) else {
            break;
        };
        let folder = layout.folder_path(date);
        if !store.folder_exists(&folder).await? {
            continue;
        }
        let entries = store.list_directory(&folder).await?;
        if entries
            .iter()
            .any(|entry| !entry.is_dir() && entry.name == DOCUMENT_FILE)
        {
            debug!(folder = %folder, "Located snapshot");
            return Ok(date);
        }
        warn!(folder = %folder, "Skipping snapshot folder without {}", DOCUMENT_FILE);
    }
    Err(NotesyncError::SnapshotNotFound {
        days: SNAPSHOT_LOOKBACK_DAYS,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::FsStore;
    use tempfile::TempDir;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 19).unwrap()
    }

    async fn snapshot_at(store: &FsStore, layout: &RemoteLayout, days_ago: u64) {
        let date = today() - Days::new(days_ago);
        store.create_folder(&layout.folder_path(date)).await.unwrap();
        store
            .upload_file(&layout.document_path(date), b"{}".to_vec())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_locates_newest_within_window() {
        let dir = TempDir::new().unwrap();
        let store = FsStore::new(dir.path());
        let layout = RemoteLayout::new("/sync", "Notes");
        snapshot_at(&store, &layout, 12).await;
        snapshot_at(&store, &layout, 3).await;

        let found = locate_latest(&store, &layout, today()).await.unwrap();
        assert_eq!(found, today() - Days::new(3));
    }

    #[tokio::test]
    async fn test_window_boundary() {
        let dir = TempDir::new().unwrap();
        let store = FsStore::new(dir.path());
        let layout = RemoteLayout::new("/sync", "Notes");

        snapshot_at(&store, &layout, 30).await;
        let err = locate_latest(&store, &layout, today()).await.unwrap_err();
        assert!(matches!(err, NotesyncError::SnapshotNotFound { days: 30 }));

        snapshot_at(&store, &layout, 29).await;
        let found = locate_latest(&store, &layout, today()).await.unwrap();
        assert_eq!(found, today() - Days::new(29));
    }

    #[tokio::test]
    async fn test_partial_folder_is_skipped() {
        let dir = TempDir::new().unwrap();
        let store = FsStore::new(dir.path());
        let layout = RemoteLayout::new("/sync", "Notes");
        snapshot_at(&store, &layout, 2).await;
        store
            .create_folder(&layout.note_assets_path(today()))
            .await
            .unwrap();

        let found = locate_latest(&store, &layout, today()).await.unwrap();
        assert_eq!(found, today() - Days::new(2));
    }

    #[tokio::test]
    async fn test_empty_backend_is_snapshot_not_found() {
        let dir = TempDir::new().unwrap();
        let store = FsStore::new(dir.path());
        let layout = RemoteLayout::new("/sync", "Notes");
        let err = locate_latest(&store, &layout, today()).await.unwrap_err();
        assert!(err.to_string().contains("Nothing to import"));
    }
}
