//! Backend managed by the host platform (e.g. a cloud-drive container the
//! mobile shell exposes through a native module).
//!
//! The host implements [`NativeBridge`] with plain blocking calls; the store
//! runs them on tokio's blocking pool.

use std::sync::Arc;

use tracing::info;

use super::{RemoteEntry, RemoteStore};
use crate::error::{NotesyncError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeErrorKind {
    NotFound,
    /// `mkdir` on a directory that is already there.
    AlreadyExists,
    Unauthorized,
    Unavailable,
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeError {
    pub kind: BridgeErrorKind,
    pub message: String,
}

impl BridgeError {
    pub fn new(kind: BridgeErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl From<BridgeError> for NotesyncError {
    fn from(e: BridgeError) -> Self {
        match e.kind {
            BridgeErrorKind::NotFound => NotesyncError::NotFound(e.message),
            BridgeErrorKind::AlreadyExists => {
                NotesyncError::Protocol(format!("already exists: {}", e.message))
            }
            BridgeErrorKind::Unauthorized => NotesyncError::Auth(e.message),
            BridgeErrorKind::Unavailable => NotesyncError::Transport(e.message),
            BridgeErrorKind::Other => NotesyncError::Protocol(e.message),
        }
    }
}

pub type BridgeResult<T> = std::result::Result<T, BridgeError>;

/// Host-side file operations. Same contract as [`RemoteStore`].
pub trait NativeBridge: Send + Sync {
    fn exists(&self, path: &str) -> BridgeResult<bool>;
    fn mkdir(&self, path: &str) -> BridgeResult<()>;
    fn remove_dir(&self, path: &str) -> BridgeResult<()>;
    fn list(&self, path: &str) -> BridgeResult<Vec<RemoteEntry>>;
    fn write(&self, path: &str, bytes: &[u8]) -> BridgeResult<()>;
    fn read(&self, path: &str) -> BridgeResult<Vec<u8>>;

    /// Re-establish the host session after an `Unauthorized` failure.
    fn refresh_session(&self) -> BridgeResult<()> {
        Ok(())
    }
}

#[derive(Clone)]
pub struct BridgeStore {
    bridge: Arc<dyn NativeBridge>,
}

impl BridgeStore {
    pub fn new(bridge: Arc<dyn NativeBridge>) -> Self {
        Self { bridge }
    }

    /// Run one bridge call off the async executor, refreshing the host
    /// session once if it reports `Unauthorized`.
    async fn call<T, F>(&self, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: Fn(&dyn NativeBridge) -> BridgeResult<T> + Send + 'static,
    {
        let bridge = self.bridge.clone();
        let joined = tokio::task::spawn_blocking(move || match op(bridge.as_ref()) {
            Err(e) if e.kind == BridgeErrorKind::Unauthorized => {
                info!(reason = %e.message, "Bridge session rejected, refreshing once");
                bridge.refresh_session()?;
                op(bridge.as_ref())
            }
            other => other,
        })
        .await
        .map_err(|e| NotesyncError::Transport(format!("bridge task failed: {}", e)))?;
        Ok(joined?)
    }
}

impl RemoteStore for BridgeStore {
    async fn folder_exists(&self, path: &str) -> Result<bool> {
        let path = path.to_string();
        self.call(move |b| b.exists(&path)).await
    }

    async fn create_folder(&self, path: &str) -> Result<()> {
        let path = path.to_string();
        self.call(move |b| match b.mkdir(&path) {
            Err(e) if e.kind == BridgeErrorKind::AlreadyExists => Ok(()),
            other => other,
        })
        .await
    }

    async fn delete_folder(&self, path: &str) -> Result<()> {
        let path = path.to_string();
        self.call(move |b| match b.remove_dir(&path) {
            Err(e) if e.kind == BridgeErrorKind::NotFound => Ok(()),
            other => other,
        })
        .await
    }

    async fn list_directory(&self, path: &str) -> Result<Vec<RemoteEntry>> {
        let path = path.to_string();
        self.call(move |b| b.list(&path)).await
    }

    async fn upload_file(&self, path: &str, bytes: Vec<u8>) -> Result<()> {
        let path = path.to_string();
        self.call(move |b| b.write(&path, &bytes)).await
    }

    async fn download_file(&self, path: &str) -> Result<Vec<u8>> {
        let path = path.to_string();
        self.call(move |b| b.read(&path)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// In-memory host store: directories and files keyed by full path.
    #[derive(Default)]
    struct MemoryBridge {
        dirs: Mutex<Vec<String>>,
        files: Mutex<BTreeMap<String, Vec<u8>>>,
        expired: AtomicBool,
        refreshes: AtomicUsize,
    }

    impl MemoryBridge {
        fn check_session(&self) -> BridgeResult<()> {
            if self.expired.load(Ordering::SeqCst) {
                Err(BridgeError::new(BridgeErrorKind::Unauthorized, "session expired"))
            } else {
                Ok(())
            }
        }
    }

    impl NativeBridge for MemoryBridge {
        fn exists(&self, path: &str) -> BridgeResult<bool> {
            self.check_session()?;
            Ok(self.dirs.lock().unwrap().iter().any(|d| d == path))
        }

        fn mkdir(&self, path: &str) -> BridgeResult<()> {
            self.check_session()?;
            let mut dirs = self.dirs.lock().unwrap();
            if dirs.iter().any(|d| d == path) {
                return Err(BridgeError::new(BridgeErrorKind::AlreadyExists, path));
            }
            dirs.push(path.to_string());
            Ok(())
        }

        fn remove_dir(&self, path: &str) -> BridgeResult<()> {
            self.check_session()?;
            let mut dirs = self.dirs.lock().unwrap();
            let before = dirs.len();
            dirs.retain(|d| d != path && !d.starts_with(&format!("{}/", path)));
            if dirs.len() == before {
                return Err(BridgeError::new(BridgeErrorKind::NotFound, path));
            }
            self.files
                .lock()
                .unwrap()
                .retain(|f, _| !f.starts_with(&format!("{}/", path)));
            Ok(())
        }

        fn list(&self, path: &str) -> BridgeResult<Vec<RemoteEntry>> {
            self.check_session()?;
            let prefix = format!("{}/", path);
            let mut out: Vec<RemoteEntry> = self
                .dirs
                .lock()
                .unwrap()
                .iter()
                .filter_map(|d| d.strip_prefix(&prefix))
                .filter(|rest| !rest.contains('/'))
                .map(RemoteEntry::directory)
                .collect();
            out.extend(
                self.files
                    .lock()
                    .unwrap()
                    .keys()
                    .filter_map(|f| f.strip_prefix(&prefix))
                    .filter(|rest| !rest.contains('/'))
                    .map(RemoteEntry::file),
            );
            Ok(out)
        }

        fn write(&self, path: &str, bytes: &[u8]) -> BridgeResult<()> {
            self.check_session()?;
            self.files
                .lock()
                .unwrap()
                .insert(path.to_string(), bytes.to_vec());
            Ok(())
        }

        fn read(&self, path: &str) -> BridgeResult<Vec<u8>> {
            self.check_session()?;
            self.files
                .lock()
                .unwrap()
                .get(path)
                .cloned()
                .ok_or_else(|| BridgeError::new(BridgeErrorKind::NotFound, path))
        }

        fn refresh_session(&self) -> BridgeResult<()> {
            self.refreshes.fetch_add(1, Ordering::SeqCst);
            self.expired.store(false, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_bridge_store_folder_lifecycle() {
        let bridge = Arc::new(MemoryBridge::default());
        let store = BridgeStore::new(bridge.clone());

        store.create_folder("/Notes").await.unwrap();
        store.create_folder("/Notes").await.unwrap();
        assert!(store.folder_exists("/Notes").await.unwrap());
        assert_eq!(bridge.dirs.lock().unwrap().len(), 1);

        store
            .upload_file("/Notes/data.json", b"{}".to_vec())
            .await
            .unwrap();
        assert_eq!(
            store.list_directory("/Notes").await.unwrap(),
            vec![RemoteEntry::file("data.json")]
        );
        assert_eq!(store.download_file("/Notes/data.json").await.unwrap(), b"{}");

        store.delete_folder("/Notes").await.unwrap();
        store.delete_folder("/Notes").await.unwrap();
        assert!(!store.folder_exists("/Notes").await.unwrap());
        assert!(store.download_file("/Notes/data.json").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_bridge_store_refreshes_expired_session_once() {
        let bridge = Arc::new(MemoryBridge::default());
        bridge.expired.store(true, Ordering::SeqCst);
        let store = BridgeStore::new(bridge.clone());

        store.create_folder("/Notes").await.unwrap();

        assert_eq!(bridge.refreshes.load(Ordering::SeqCst), 1);
        assert!(bridge.dirs.lock().unwrap().contains(&"/Notes".to_string()));
    }

    #[test]
    fn test_bridge_error_mapping() {
        let err: NotesyncError = BridgeError::new(BridgeErrorKind::Unavailable, "offline").into();
        assert!(err.is_retryable());
        let err: NotesyncError = BridgeError::new(BridgeErrorKind::NotFound, "/x").into();
        assert!(err.is_not_found());
        let err: NotesyncError = BridgeError::new(BridgeErrorKind::Unauthorized, "nope").into();
        assert!(matches!(err, NotesyncError::Auth(_)));
        let err: NotesyncError = BridgeError::new(BridgeErrorKind::AlreadyExists, "/x").into();
        assert!(matches!(err, NotesyncError::Protocol(_)));
    }

    #[tokio::test]
    async fn test_create_existing_folder_is_ok_for_strict_host() {
        let bridge = Arc::new(MemoryBridge::default());
        bridge.mkdir("/Notes").unwrap();
        assert!(matches!(
            bridge.mkdir("/Notes"),
            Err(BridgeError { kind: BridgeErrorKind::AlreadyExists, .. })
        ));

        BridgeStore::new(bridge.clone())
            .create_folder("/Notes")
            .await
            .unwrap();
        assert_eq!(bridge.dirs.lock().unwrap().len(), 1);
    }
}
