//! Directory-backed store: remote paths resolve under a local root.
//! Used for mounted drives and as the backend in tests.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use super::{segments, RemoteEntry, RemoteStore};
use crate::error::{NotesyncError, Result};

#[derive(Debug, Clone)]
pub struct FsStore {
    root: PathBuf,
}

impl FsStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> Result<PathBuf> {
        let mut out = self.root.clone();
        for segment in segments(path) {
            if segment == ".." || segment == "." {
                return Err(NotesyncError::Protocol(format!(
                    "relative segment in remote path: {}",
                    path
                )));
            }
            out.push(segment);
        }
        Ok(out)
    }
}

fn not_found(path: &str, e: std::io::Error) -> NotesyncError {
    if e.kind() == ErrorKind::NotFound {
        NotesyncError::NotFound(path.to_string())
    } else {
        NotesyncError::Io(e)
    }
}

impl RemoteStore for FsStore {
    async fn folder_exists(&self, path: &str) -> Result<bool> {
        match tokio::fs::metadata(self.resolve(path)?).await {
            Ok(meta) => Ok(meta.is_dir()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn create_folder(&self, path: &str) -> Result<()> {
        tokio::fs::create_dir_all(self.resolve(path)?).await?;
        Ok(())
    }

    async fn delete_folder(&self, path: &str) -> Result<()> {
        match tokio::fs::remove_dir_all(self.resolve(path)?).await {
            Err(e) if e.kind() != ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }

    async fn list_directory(&self, path: &str) -> Result<Vec<RemoteEntry>> {
        let mut dir = tokio::fs::read_dir(self.resolve(path)?)
            .await
            .map_err(|e| not_found(path, e))?;
        let mut entries = Vec::new();
        while let Some(entry) = dir.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if entry.file_type().await?.is_dir() {
                entries.push(RemoteEntry::directory(name));
            } else {
                entries.push(RemoteEntry::file(name));
            }
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    async fn upload_file(&self, path: &str, bytes: Vec<u8>) -> Result<()> {
        let target = self.resolve(path)?;
        if let Some(parent) = target.parent() {
            if !tokio::fs::try_exists(parent).await? {
                return Err(NotesyncError::NotFound(format!("parent of {}", path)));
            }
        }
        tokio::fs::write(&target, bytes).await?;
        Ok(())
    }

    async fn download_file(&self, path: &str) -> Result<Vec<u8>> {
        tokio::fs::read(self.resolve(path)?)
            .await
            .map_err(|e| not_found(path, e))
    }
}
