//! Remote storage backends.
//!
//! Every backend exposes the same folder/file surface through [`RemoteStore`].
//! Paths are `/`-separated and rooted at the backend's own root.

pub mod auth;
mod bridge;
mod fs;
mod rest;
mod webdav;

use serde::{Deserialize, Serialize};

use crate::error::Result;

pub use auth::{AuthHeader, Credentials, RefreshableToken, StaticCredentials};
pub use bridge::{BridgeError, BridgeErrorKind, BridgeStore, NativeBridge};
pub use fs::FsStore;
pub use rest::{RestStore, DEFAULT_API_URL, DEFAULT_CONTENT_URL};
pub use webdav::WebDavStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Directory,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteEntry {
    pub name: String,
    pub kind: EntryKind,
}

impl RemoteEntry {
    pub fn file(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: EntryKind::File,
        }
    }

    pub fn directory(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: EntryKind::Directory,
        }
    }

    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Directory
    }
}

/// Uniform folder/file interface over a remote backend.
///
/// `create_folder` and `delete_folder` are idempotent, `upload_file`
/// overwrites, and `download_file` fails with `NotFound` when the file is
/// absent. Backends that see an auth failure refresh their credentials once and
/// retry before surfacing `Auth`.
#[allow(async_fn_in_trait)]
pub trait RemoteStore {
    async fn folder_exists(&self, path: &str) -> Result<bool>;
    async fn create_folder(&self, path: &str) -> Result<()>;
    async fn delete_folder(&self, path: &str) -> Result<()>;
    /// Immediate children only.
    async fn list_directory(&self, path: &str) -> Result<Vec<RemoteEntry>>;
    async fn upload_file(&self, path: &str, bytes: Vec<u8>) -> Result<()>;
    async fn download_file(&self, path: &str) -> Result<Vec<u8>>;
}

impl<S: RemoteStore> RemoteStore for &S {
    async fn folder_exists(&self, path: &str) -> Result<bool> {
        (**self).folder_exists(path).await
    }

    async fn create_folder(&self, path: &str) -> Result<()> {
        (**self).create_folder(path).await
    }

    async fn delete_folder(&self, path: &str) -> Result<()> {
        (**self).delete_folder(path).await
    }

    async fn list_directory(&self, path: &str) -> Result<Vec<RemoteEntry>> {
        (**self).list_directory(path).await
    }

    async fn upload_file(&self, path: &str, bytes: Vec<u8>) -> Result<()> {
        (**self).upload_file(path, bytes).await
    }

    async fn download_file(&self, path: &str) -> Result<Vec<u8>> {
        (**self).download_file(path).await
    }
}

/// Any configured backend, dispatched by variant.
pub enum AnyStore {
    Rest(RestStore),
    WebDav(WebDavStore),
    Bridge(BridgeStore),
    Fs(FsStore),
}

impl AnyStore {
    pub fn backend_name(&self) -> &'static str {
        match self {
            AnyStore::Rest(_) => "rest",
            AnyStore::WebDav(_) => "webdav",
            AnyStore::Bridge(_) => "bridge",
            AnyStore::Fs(_) => "local",
        }
    }
}

macro_rules! dispatch {
    ($self:ident, $store:ident => $call:expr) => {
        match $self {
            AnyStore::Rest($store) => $call,
            AnyStore::WebDav($store) => $call,
            AnyStore::Bridge($store) => $call,
            AnyStore::Fs($store) => $call,
        }
    };
}

impl RemoteStore for AnyStore {
    async fn folder_exists(&self, path: &str) -> Result<bool> {
        dispatch!(self, s => s.folder_exists(path).await)
    }

    async fn create_folder(&self, path: &str) -> Result<()> {
        dispatch!(self, s => s.create_folder(path).await)
    }

    async fn delete_folder(&self, path: &str) -> Result<()> {
        dispatch!(self, s => s.delete_folder(path).await)
    }

    async fn list_directory(&self, path: &str) -> Result<Vec<RemoteEntry>> {
        dispatch!(self, s => s.list_directory(path).await)
    }

    async fn upload_file(&self, path: &str, bytes: Vec<u8>) -> Result<()> {
        dispatch!(self, s => s.upload_file(path, bytes).await)
    }

    async fn download_file(&self, path: &str) -> Result<Vec<u8>> {
        dispatch!(self, s => s.download_file(path).await)
    }
}

/// Join a remote directory path and a child name with a single `/`.
pub fn join_path(base: &str, leaf: &str) -> String {
    let base = base.trim_end_matches('/');
    let leaf = leaf.trim_start_matches('/');
    if base.is_empty() {
        format!("/{}", leaf)
    } else {
        format!("{}/{}", base, leaf)
    }
}

/// Normalize a user-supplied remote path to `/a/b` form. The backend root is `/`.
pub fn normalize_path(path: &str) -> String {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    format!("/{}", segments.join("/"))
}

/// Non-empty path segments.
pub(crate) fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}
