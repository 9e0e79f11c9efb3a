use std::num::NonZeroUsize;

use chrono::{Days, NaiveDate, TimeZone, Utc};
use notesync::entity::{ContentNode, Note, NoteLibrary};
use notesync::remote::{FsStore, RemoteEntry, RemoteStore};
use notesync::snapshot::RemoteLayout;
use notesync::sync::SyncOrchestrator;
use notesync::{LocalVault, NotesyncError, Result, SyncConfig};
use tempfile::TempDir;

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 10, 19).unwrap()
}

struct Device {
    _dir: TempDir,
    vault: LocalVault,
}

impl Device {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let vault = LocalVault::init(dir.path(), &SyncConfig::default()).unwrap();
        Self { _dir: dir, vault }
    }

    fn sync<S: RemoteStore>(&self, store: S) -> SyncOrchestrator<S> {
        SyncOrchestrator::new(store, RemoteLayout::new("/sync", "Notes"), self.vault.clone())
    }

    fn put_asset(&self, rel: &str, bytes: &[u8]) {
        let path = self.vault.dir().join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, bytes).unwrap();
    }
}

fn note(id: &str, title: &str, updated_ms: i64) -> Note {
    let mut n = Note::new(title.to_string());
    n.id = id.to_string();
    n.created_at = Utc.timestamp_millis_opt(0).unwrap();
    n.updated_at = Utc.timestamp_millis_opt(updated_ms).unwrap();
    n
}

#[tokio::test]
async fn test_roundtrip_between_devices_restores_local_asset_paths() {
    let remote = TempDir::new().unwrap();
    let phone = Device::new();
    let laptop = Device::new();

    let mut lib = NoteLibrary::new();
    let mut pic = note("n1", "Cat", 10);
    pic.content = ContentNode::container(
        "doc",
        vec![
            ContentNode::asset("image", "note-assets/n1/cat.png"),
            ContentNode::asset("fileEmbed", "file-assets/report.pdf"),
        ],
    );
    lib.upsert(pic);
    phone.vault.save(&lib).unwrap();
    phone.put_asset("note-assets/n1/cat.png", b"meow");
    phone.put_asset("file-assets/report.pdf", b"%PDF");

    phone
        .sync(FsStore::new(remote.path()))
        .export(&lib, today())
        .await
        .unwrap();

    let (merged, report) = laptop
        .sync(FsStore::new(remote.path()))
        .import(&NoteLibrary::new(), today())
        .await
        .unwrap();

    assert_eq!(report.assets.downloaded, 2);
    assert_eq!(
        merged.notes["n1"].content.asset_paths(),
        vec!["note-assets/n1/cat.png", "file-assets/report.pdf"]
    );
    assert_eq!(merged, laptop.vault.load().unwrap());
    assert_eq!(
        std::fs::read(laptop.vault.dir().join("note-assets/n1/cat.png")).unwrap(),
        b"meow"
    );
    assert_eq!(
        std::fs::read(laptop.vault.dir().join("file-assets/report.pdf")).unwrap(),
        b"%PDF"
    );
}

#[tokio::test]
async fn test_same_day_export_replaces_folder() {
    let remote = TempDir::new().unwrap();
    let device = Device::new();
    let sync = device.sync(FsStore::new(remote.path()));

    device.put_asset("file-assets/old.txt", b"old");
    sync.export(&NoteLibrary::new(), today()).await.unwrap();
    std::fs::remove_file(device.vault.dir().join("file-assets/old.txt")).unwrap();

    let mut lib = NoteLibrary::new();
    lib.upsert(note("n1", "Second", 1));
    let report = sync.export(&lib, today()).await.unwrap();

    assert!(report.replaced);
    let folder = remote.path().join("sync/Notes 2026-10-19");
    assert!(!folder.join("file-assets/old.txt").exists());
    let data = std::fs::read_to_string(folder.join("data.json")).unwrap();
    assert!(data.contains("Second"));
    assert_eq!(sync.list_snapshots().await.unwrap(), vec![today()]);
}

#[tokio::test]
async fn test_retention_keeps_newest_limit() {
    let remote = TempDir::new().unwrap();
    let device = Device::new();
    let sync = device
        .sync(FsStore::new(remote.path()))
        .with_retention_limit(NonZeroUsize::new(3).unwrap());

    let mut last = None;
    for offset in (0..6u64).rev() {
        let date = today() - Days::new(offset);
        last = Some(sync.export(&NoteLibrary::new(), date).await.unwrap());
    }

    let report = last.unwrap();
    assert_eq!(report.retention.deleted.len(), 1);
    let dates = sync.list_snapshots().await.unwrap();
    assert_eq!(
        dates,
        vec![today(), today() - Days::new(1), today() - Days::new(2)]
    );
}

#[tokio::test]
async fn test_concurrent_edits_newer_wins_both_ways() {
    let remote = TempDir::new().unwrap();
    let a = Device::new();
    let b = Device::new();

    let mut lib_a = NoteLibrary::new();
    lib_a.upsert(note("shared", "edited on a", 100));
    lib_a.upsert(note("only-a", "A", 1));
    let mut lib_b = NoteLibrary::new();
    lib_b.upsert(note("shared", "edited on b", 200));
    lib_b.upsert(note("only-b", "B", 1));

    a.sync(FsStore::new(remote.path()))
        .export(&lib_a, today() - Days::new(1))
        .await
        .unwrap();
    let (merged_b, _) = b
        .sync(FsStore::new(remote.path()))
        .import(&lib_b, today())
        .await
        .unwrap();

    assert_eq!(merged_b.notes.len(), 3);
    assert_eq!(merged_b.notes["shared"].title, "edited on b");

    b.sync(FsStore::new(remote.path()))
        .export(&merged_b, today())
        .await
        .unwrap();
    let (merged_a, _) = a
        .sync(FsStore::new(remote.path()))
        .import(&lib_a, today())
        .await
        .unwrap();

    assert_eq!(merged_a.notes, merged_b.notes);
}

#[tokio::test]
async fn test_deleted_note_is_not_resurrected_by_stale_snapshot() {
    let remote = TempDir::new().unwrap();
    let device = Device::new();
    let sync = device.sync(FsStore::new(remote.path()));

    let mut lib = NoteLibrary::new();
    lib.upsert(note("doomed", "Delete me", 1));
    lib.upsert(note("kept", "Keep me", 1));
    sync.export(&lib, today() - Days::new(2)).await.unwrap();

    lib.delete_note("doomed", Utc::now()).unwrap();
    let (merged, report) = sync.import(&lib, today()).await.unwrap();

    assert!(!merged.notes.contains_key("doomed"));
    assert!(merged.notes.contains_key("kept"));
    assert_eq!(report.merge.suppressed, 1);
    assert!(merged.tombstones.contains_key("doomed"));
}

#[tokio::test]
async fn test_failed_import_leaves_local_notes_untouched() {
    let remote = TempDir::new().unwrap();
    let device = Device::new();
    let mut lib = NoteLibrary::new();
    lib.upsert(note("n1", "Local", 1));
    device.vault.save(&lib).unwrap();
    let before = std::fs::read(device.vault.notes_path()).unwrap();

    let folder = remote.path().join("sync/Notes 2026-10-19");
    std::fs::create_dir_all(&folder).unwrap();
    std::fs::write(folder.join("data.json"), b"{ truncated").unwrap();

    let err = device
        .sync(FsStore::new(remote.path()))
        .import(&lib, today())
        .await
        .unwrap_err();

    assert!(matches!(err, NotesyncError::InvalidSnapshot(_)));
    assert_eq!(std::fs::read(device.vault.notes_path()).unwrap(), before);
}

#[tokio::test]
async fn test_import_skips_partial_folder_for_older_snapshot() {
    let remote = TempDir::new().unwrap();
    let device = Device::new();
    let sync = device.sync(FsStore::new(remote.path()));
    let mut lib = NoteLibrary::new();
    lib.upsert(note("n1", "Complete", 1));
    sync.export(&lib, today() - Days::new(1)).await.unwrap();
    std::fs::create_dir_all(remote.path().join("sync/Notes 2026-10-19/assets")).unwrap();

    let (_, report) = sync.import(&NoteLibrary::new(), today()).await.unwrap();

    assert_eq!(report.date, today() - Days::new(1));
    assert_eq!(report.notes, 1);
}

/// Delegates to a directory store but refuses to delete one folder.
struct StubbornStore {
    inner: FsStore,
    undeletable: String,
}

impl RemoteStore for StubbornStore {
    async fn folder_exists(&self, path: &str) -> Result<bool> {
        self.inner.folder_exists(path).await
    }

    async fn create_folder(&self, path: &str) -> Result<()> {
        self.inner.create_folder(path).await
    }

    async fn delete_folder(&self, path: &str) -> Result<()> {
        if path == self.undeletable {
            return Err(NotesyncError::Transport("connection reset".to_string()));
        }
        self.inner.delete_folder(path).await
    }

    async fn list_directory(&self, path: &str) -> Result<Vec<RemoteEntry>> {
        self.inner.list_directory(path).await
    }

    async fn upload_file(&self, path: &str, bytes: Vec<u8>) -> Result<()> {
        self.inner.upload_file(path, bytes).await
    }

    async fn download_file(&self, path: &str) -> Result<Vec<u8>> {
        self.inner.download_file(path).await
    }
}

#[tokio::test]
async fn test_retention_failures_do_not_fail_export() {
    let remote = TempDir::new().unwrap();
    let device = Device::new();
    let layout = RemoteLayout::new("/sync", "Notes");
    let oldest = today() - Days::new(3);
    let next = today() - Days::new(2);
    let store = StubbornStore {
        inner: FsStore::new(remote.path()),
        undeletable: layout.folder_path(oldest),
    };
    for date in [oldest, next, today() - Days::new(1)] {
        store.create_folder(&layout.folder_path(date)).await.unwrap();
    }

    let sync = device.sync(store).with_retention_limit(NonZeroUsize::new(2).unwrap());
    let report = sync.export(&NoteLibrary::new(), today()).await.unwrap();

    assert_eq!(report.retention.failed, vec![oldest]);
    assert_eq!(report.retention.deleted, vec![next]);
    assert!(remote.path().join("sync/Notes 2026-10-19/data.json").exists());
}

#[tokio::test]
async fn test_nothing_to_import_on_empty_backend() {
    let remote = TempDir::new().unwrap();
    let device = Device::new();

    let err = device
        .sync(FsStore::new(remote.path()))
        .import(&NoteLibrary::new(), today())
        .await
        .unwrap_err();

    assert!(matches!(err, NotesyncError::SnapshotNotFound { days: 30 }));
}
