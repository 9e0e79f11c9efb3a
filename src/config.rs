// src/config.rs
//! Vault configuration (`config.yaml`).
//!
//! Secrets may be left out of the file and supplied through
//! `NOTESYNC_TOKEN` (REST) or `NOTESYNC_WEBDAV_PASSWORD` (WebDAV).

use std::fs;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{NotesyncError, Result};
use crate::remote::{
    AnyStore, FsStore, RestStore, StaticCredentials, WebDavStore, DEFAULT_API_URL,
    DEFAULT_CONTENT_URL,
};

pub const TOKEN_ENV: &str = "NOTESYNC_TOKEN";
pub const WEBDAV_PASSWORD_ENV: &str = "NOTESYNC_WEBDAV_PASSWORD";

pub const DEFAULT_RETENTION_LIMIT: NonZeroUsize = NonZeroUsize::MIN.saturating_add(4);
pub const DEFAULT_TOMBSTONE_TTL_DAYS: u32 = 90;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Prefix of dated snapshot folder names.
    pub app_name: String,
    /// Remote folder holding the snapshot folders.
    pub sync_root: String,
    /// Dated snapshots kept after an export. Zero is rejected when parsing.
    pub retention_limit: NonZeroUsize,
    /// `None` keeps tombstones forever.
    pub tombstone_ttl_days: Option<u32>,
    pub backend: BackendConfig,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            app_name: "Notes".to_string(),
            sync_root: "/".to_string(),
            retention_limit: DEFAULT_RETENTION_LIMIT,
            tombstone_ttl_days: Some(DEFAULT_TOMBSTONE_TTL_DAYS),
            backend: BackendConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum BackendConfig {
    Rest {
        #[serde(default = "default_api_url")]
        api_url: String,
        #[serde(default = "default_content_url")]
        content_url: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        token: Option<String>,
    },
    #[serde(rename = "webdav")]
    WebDav {
        url: String,
        username: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        password: Option<String>,
    },
    /// A directory, e.g. a mounted drive. Relative paths resolve against
    /// the directory holding the vault.
    Local { path: PathBuf },
}

impl Default for BackendConfig {
    fn default() -> Self {
        BackendConfig::Local {
            path: PathBuf::from("notesync-remote"),
        }
    }
}

fn default_api_url() -> String {
    DEFAULT_API_URL.to_string()
}

fn default_content_url() -> String {
    DEFAULT_CONTENT_URL.to_string()
}

impl SyncConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        let config: SyncConfig = serde_yaml::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        self.validate()?;
        fs::write(path, serde_yaml::to_string(self)?)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.app_name.trim().is_empty() || self.app_name.contains('/') {
            return Err(NotesyncError::Config(format!(
                "app_name must be a non-empty folder name, got {:?}",
                self.app_name
            )));
        }
        if let BackendConfig::WebDav { url, .. } = &self.backend {
            url::Url::parse(url)
                .map_err(|e| NotesyncError::Config(format!("invalid WebDAV url {}: {}", url, e)))?;
        }
        Ok(())
    }

    pub fn tombstone_ttl(&self) -> Option<chrono::Duration> {
        self.tombstone_ttl_days
            .map(|days| chrono::Duration::days(i64::from(days)))
    }

    /// Fill secrets from the environment when set.
    pub fn with_env_secrets(self) -> Self {
        self.with_secrets(
            std::env::var(TOKEN_ENV).ok(),
            std::env::var(WEBDAV_PASSWORD_ENV).ok(),
        )
    }

    fn with_secrets(mut self, token: Option<String>, password: Option<String>) -> Self {
        match &mut self.backend {
            BackendConfig::Rest { token: slot, .. } => {
                if let Some(token) = token.filter(|t| !t.is_empty()) {
                    *slot = Some(token);
                }
            }
            BackendConfig::WebDav { password: slot, .. } => {
                if let Some(password) = password {
                    *slot = Some(password);
                }
            }
            BackendConfig::Local { .. } => {}
        }
        self
    }

    /// Build the configured backend. `base_dir` anchors relative local paths.
    pub fn build_store(&self, base_dir: &Path) -> Result<AnyStore> {
        match &self.backend {
            BackendConfig::Rest {
                api_url,
                content_url,
                token,
            } => {
                let token = token.clone().ok_or_else(|| {
                    NotesyncError::Config(format!("REST backend needs a token ({} is unset)", TOKEN_ENV))
                })?;
                let creds = Arc::new(StaticCredentials::bearer(token));
                Ok(AnyStore::Rest(RestStore::new(
                    api_url.as_str(),
                    content_url.as_str(),
                    creds,
                )?))
            }
            BackendConfig::WebDav {
                url,
                username,
                password,
            } => {
                let password = password.clone().ok_or_else(|| {
                    NotesyncError::Config(format!(
                        "WebDAV backend needs a password ({} is unset)",
                        WEBDAV_PASSWORD_ENV
                    ))
                })?;
                let creds = Arc::new(StaticCredentials::basic(username.as_str(), password));
                Ok(AnyStore::WebDav(WebDavStore::new(url, creds)?))
            }
            BackendConfig::Local { path } => {
                let root = if path.is_absolute() {
                    path.clone()
                } else {
                    base_dir.join(path)
                };
                Ok(AnyStore::Fs(FsStore::new(root)))
            }
        }
    }
}
