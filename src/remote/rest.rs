//! Bearer-token REST backend.
//!
//! Speaks the Dropbox v2 HTTP shape: JSON RPC calls on the API host and
//! binary transfers on the content host with the call arguments in the
//! `Dropbox-API-Arg` header.

use std::sync::Arc;

use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use super::auth::{with_auth_retry, AuthHeader, Credentials};
use super::{normalize_path, EntryKind, RemoteEntry, RemoteStore};
use crate::error::{NotesyncError, Result};

pub const DEFAULT_API_URL: &str = "https://api.dropboxapi.com";
pub const DEFAULT_CONTENT_URL: &str = "https://content.dropboxapi.com";

const API_ARG_HEADER: &str = "Dropbox-API-Arg";

pub struct RestStore {
    client: Client,
    api_url: String,
    content_url: String,
    credentials: Arc<dyn Credentials>,
}

#[derive(Deserialize)]
struct ListFolderPage {
    entries: Vec<ListedEntry>,
    cursor: String,
    has_more: bool,
}

#[derive(Deserialize)]
struct ListedEntry {
    #[serde(rename = ".tag")]
    tag: String,
    name: String,
}

impl RestStore {
    pub fn new(
        api_url: impl Into<String>,
        content_url: impl Into<String>,
        credentials: Arc<dyn Credentials>,
    ) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("notesync/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            api_url: api_url.into().trim_end_matches('/').to_string(),
            content_url: content_url.into().trim_end_matches('/').to_string(),
            credentials,
        })
    }

    /// The API addresses the backend root as the empty string.
    fn api_path(path: &str) -> String {
        let normalized = normalize_path(path);
        if normalized == "/" {
            String::new()
        } else {
            normalized
        }
    }

    async fn rpc(&self, endpoint: &str, body: &Value, auth: AuthHeader) -> Result<Response> {
        let url = format!("{}/2/{}", self.api_url, endpoint);
        debug!(endpoint, "REST rpc");
        let request = auth.apply(self.client.post(&url)).json(body);
        let response = request.send().await?;
        check_status(response, endpoint).await
    }

    async fn content_call(
        &self,
        endpoint: &str,
        arg: &Value,
        body: Option<Vec<u8>>,
        auth: AuthHeader,
    ) -> Result<Response> {
        let url = format!("{}/2/{}", self.content_url, endpoint);
        debug!(endpoint, "REST content call");
        let mut request = auth
            .apply(self.client.post(&url))
            .header(API_ARG_HEADER, header_safe_json(arg));
        if let Some(bytes) = body {
            request = request
                .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
                .body(bytes);
        }
        let response = request.send().await?;
        check_status(response, endpoint).await
    }

    async fn list_page(&self, endpoint: &str, body: &Value) -> Result<ListFolderPage> {
        let response =
            with_auth_retry(&*self.credentials, |auth| self.rpc(endpoint, body, auth)).await?;
        response
            .json::<ListFolderPage>()
            .await
            .map_err(|e| NotesyncError::Protocol(format!("bad list_folder response: {}", e)))
    }
}

/// Map a non-success response onto the error taxonomy.
async fn check_status(response: Response, endpoint: &str) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(classify_failure(status, &body, endpoint))
}

fn classify_failure(status: StatusCode, body: &str, endpoint: &str) -> NotesyncError {
    match status {
        StatusCode::UNAUTHORIZED => NotesyncError::Auth(format!("{}: {}", endpoint, body)),
        StatusCode::CONFLICT => {
            let summary = serde_json::from_str::<Value>(body)
                .ok()
                .and_then(|v| v.get("error_summary").and_then(Value::as_str).map(String::from))
                .unwrap_or_else(|| body.to_string());
            if summary.contains("not_found") {
                NotesyncError::NotFound(summary)
            } else {
                NotesyncError::Protocol(format!("{} conflict: {}", endpoint, summary))
            }
        }
        StatusCode::TOO_MANY_REQUESTS | StatusCode::REQUEST_TIMEOUT => {
            NotesyncError::Transport(format!("{} returned {}", endpoint, status))
        }
        s if s.is_server_error() => {
            NotesyncError::Transport(format!("{} returned {}", endpoint, status))
        }
        _ => NotesyncError::Protocol(format!("{} returned {}: {}", endpoint, status, body)),
    }
}

/// Header values must be ASCII; escape everything else as JSON `\u` units.
fn header_safe_json(value: &Value) -> String {
    let raw = value.to_string();
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        if c.is_ascii() {
            out.push(c);
        } else {
            let mut units = [0u16; 2];
            for unit in c.encode_utf16(&mut units) {
                out.push_str(&format!("\\u{:04x}", unit));
            }
        }
    }
    out
}

fn is_existing_folder(err: &NotesyncError) -> bool {
    matches!(err, NotesyncError::Protocol(msg) if msg.contains("conflict/folder"))
}

impl RemoteStore for RestStore {
    async fn folder_exists(&self, path: &str) -> Result<bool> {
        let body = json!({ "path": Self::api_path(path) });
        let result = with_auth_retry(&*self.credentials, |auth| {
            self.rpc("files/get_metadata", &body, auth)
        })
        .await;
        match result {
            Ok(response) => {
                let meta: Value = response.json().await.map_err(|e| {
                    NotesyncError::Protocol(format!("bad get_metadata response: {}", e))
                })?;
                Ok(meta.get(".tag").and_then(Value::as_str) == Some("folder"))
            }
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn create_folder(&self, path: &str) -> Result<()> {
        let body = json!({ "path": Self::api_path(path), "autorename": false });
        let result = with_auth_retry(&*self.credentials, |auth| {
            self.rpc("files/create_folder_v2", &body, auth)
        })
        .await;
        match result {
            Ok(_) => Ok(()),
            Err(e) if is_existing_folder(&e) => Ok(()),
            Err(e) => Err(e),
        }
    }

    async fn delete_folder(&self, path: &str) -> Result<()> {
        let body = json!({ "path": Self::api_path(path) });
        let result = with_auth_retry(&*self.credentials, |auth| {
            self.rpc("files/delete_v2", &body, auth)
        })
        .await;
        match result {
            Ok(_) => Ok(()),
            Err(e) if e.is_not_found() => Ok(()),
            Err(e) => Err(e),
        }
    }

    async fn list_directory(&self, path: &str) -> Result<Vec<RemoteEntry>> {
        let mut page = self
            .list_page(
                "files/list_folder",
                &json!({ "path": Self::api_path(path), "recursive": false }),
            )
            .await?;
        let mut entries = Vec::new();
        loop {
            entries.extend(page.entries.into_iter().filter_map(|e| {
                let kind = match e.tag.as_str() {
                    "folder" => EntryKind::Directory,
                    "file" => EntryKind::File,
                    _ => return None,
                };
                Some(RemoteEntry { name: e.name, kind })
            }));
            if !page.has_more {
                break;
            }
            page = self
                .list_page(
                    "files/list_folder/continue",
                    &json!({ "cursor": page.cursor }),
                )
                .await?;
        }
        Ok(entries)
    }

    async fn upload_file(&self, path: &str, bytes: Vec<u8>) -> Result<()> {
        let arg = json!({
            "path": Self::api_path(path),
            "mode": "overwrite",
            "autorename": false,
            "mute": true
        });
        with_auth_retry(&*self.credentials, |auth| {
            self.content_call("files/upload", &arg, Some(bytes.clone()), auth)
        })
        .await?;
        Ok(())
    }

    async fn download_file(&self, path: &str) -> Result<Vec<u8>> {
        let arg = json!({ "path": Self::api_path(path) });
        let response = with_auth_retry(&*self.credentials, |auth| {
            self.content_call("files/download", &arg, None, auth)
        })
        .await?;
        let bytes = response.bytes().await?;
        Ok(bytes.to_vec())
    }
}
