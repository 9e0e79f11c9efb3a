//! Basic-Auth WebDAV backend.

use std::sync::Arc;

use percent_encoding::percent_decode_str;
use quick_xml::events::Event;
use quick_xml::Reader;
use reqwest::{Client, Method, Response, StatusCode};
use tracing::debug;
use url::Url;

use super::auth::{with_auth_retry, AuthHeader, Credentials};
use super::{segments, EntryKind, RemoteEntry, RemoteStore};
use crate::error::{NotesyncError, Result};

const PROPFIND_BODY: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<d:propfind xmlns:d="DAV:"><d:prop><d:resourcetype/></d:prop></d:propfind>"#;

pub struct WebDavStore {
    client: Client,
    base: Url,
    credentials: Arc<dyn Credentials>,
}

impl WebDavStore {
    pub fn new(base_url: &str, credentials: Arc<dyn Credentials>) -> Result<Self> {
        let base = Url::parse(base_url)
            .map_err(|e| NotesyncError::Config(format!("invalid WebDAV url '{}': {}", base_url, e)))?;
        if base.cannot_be_a_base() {
            return Err(NotesyncError::Config(format!(
                "WebDAV url '{}' cannot hold paths",
                base_url
            )));
        }
        let client = Client::builder()
            .user_agent(concat!("notesync/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            base,
            credentials,
        })
    }

    /// Resolve a remote path against the base URL, percent-encoding each
    /// segment. Collections get a trailing slash.
    fn url_for(&self, path: &str, collection: bool) -> Result<Url> {
        let mut url = self.base.clone();
        {
            let mut segs = url.path_segments_mut().map_err(|_| {
                NotesyncError::Config(format!("WebDAV url '{}' cannot hold paths", self.base))
            })?;
            segs.pop_if_empty();
            for seg in segments(path) {
                segs.push(seg);
            }
            if collection {
                segs.push("");
            }
        }
        Ok(url)
    }

    async fn send(
        &self,
        method: Method,
        url: &Url,
        auth: AuthHeader,
        depth: Option<&str>,
        body: Option<Vec<u8>>,
    ) -> Result<Response> {
        debug!(method = %method, url = %url, "WebDAV request");
        let mut request = auth.apply(self.client.request(method, url.clone()));
        if let Some(depth) = depth {
            request = request
                .header("Depth", depth)
                .header(reqwest::header::CONTENT_TYPE, "application/xml; charset=utf-8");
        }
        if let Some(bytes) = body {
            request = request.body(bytes);
        }
        Ok(request.send().await?)
    }

    /// Send with one auth refresh on 401/403; other statuses are returned as-is.
    async fn request(
        &self,
        method: Method,
        url: &Url,
        depth: Option<&str>,
        body: Option<Vec<u8>>,
    ) -> Result<Response> {
        with_auth_retry(&*self.credentials, |auth| {
            let method = method.clone();
            let body = body.clone();
            async move {
                let response = self.send(method, url, auth, depth, body).await?;
                match response.status() {
                    StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(NotesyncError::Auth(
                        format!("{} rejected credentials ({})", url, response.status()),
                    )),
                    _ => Ok(response),
                }
            }
        })
        .await
    }
}

fn dav_method(name: &str) -> Result<Method> {
    Method::from_bytes(name.as_bytes())
        .map_err(|e| NotesyncError::Protocol(format!("invalid method {}: {}", name, e)))
}

fn status_error(status: StatusCode, what: &str) -> NotesyncError {
    match status {
        StatusCode::NOT_FOUND => NotesyncError::NotFound(what.to_string()),
        StatusCode::TOO_MANY_REQUESTS | StatusCode::REQUEST_TIMEOUT => {
            NotesyncError::Transport(format!("{} returned {}", what, status))
        }
        s if s.is_server_error() => NotesyncError::Transport(format!("{} returned {}", what, status)),
        _ => NotesyncError::Protocol(format!("{} returned {}", what, status)),
    }
}

/// One `<response>` of a multistatus body.
#[derive(Debug, PartialEq)]
struct DavResource {
    href: String,
    collection: bool,
}

/// Pull `<href>` and `<collection/>` out of a multistatus document,
/// independent of the namespace prefix the server picked.
fn parse_multistatus(xml: &str) -> Result<Vec<DavResource>> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut resources = Vec::new();
    let mut current: Option<DavResource> = None;
    let mut in_href = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"response" => {
                    current = Some(DavResource {
                        href: String::new(),
                        collection: false,
                    })
                }
                b"href" => in_href = true,
                b"collection" => {
                    if let Some(res) = current.as_mut() {
                        res.collection = true;
                    }
                }
                _ => {}
            },
            Ok(Event::Empty(e)) => {
                if e.local_name().as_ref() == b"collection" {
                    if let Some(res) = current.as_mut() {
                        res.collection = true;
                    }
                }
            }
            Ok(Event::Text(t)) => {
                if in_href {
                    if let Some(res) = current.as_mut() {
                        let text = t.unescape().map_err(|e| {
                            NotesyncError::Protocol(format!("bad href in multistatus: {}", e))
                        })?;
                        res.href.push_str(&text);
                    }
                }
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"href" => in_href = false,
                b"response" => {
                    if let Some(res) = current.take() {
                        resources.push(res);
                    }
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                return Err(NotesyncError::Protocol(format!(
                    "malformed multistatus at {}: {}",
                    reader.buffer_position(),
                    e
                )))
            }
        }
    }
    Ok(resources)
}

/// Decoded path of an href, which may be absolute or server-relative.
fn href_path(href: &str) -> String {
    let raw_path = match Url::parse(href) {
        Ok(url) => url.path().to_string(),
        Err(_) => href.to_string(),
    };
    percent_decode_str(raw_path.trim_end_matches('/'))
        .decode_utf8_lossy()
        .into_owned()
}

impl WebDavStore {
    /// One MKCOL. `Ok(false)` means the parent collection is missing.
    async fn mkcol(&self, path: &str) -> Result<bool> {
        let url = self.url_for(path, true)?;
        let response = self.request(dav_method("MKCOL")?, &url, None, None).await?;
        match response.status() {
            s if s.is_success() => Ok(true),
            // RFC 4918: MKCOL on an existing resource.
            StatusCode::METHOD_NOT_ALLOWED => Ok(true),
            StatusCode::CONFLICT => Ok(false),
            status => Err(status_error(status, url.as_str())),
        }
    }
}

impl RemoteStore for WebDavStore {
    async fn folder_exists(&self, path: &str) -> Result<bool> {
        let url = self.url_for(path, true)?;
        let body = PROPFIND_BODY.as_bytes().to_vec();
        let response = self.request(dav_method("PROPFIND")?, &url, Some("0"), Some(body)).await?;
        match response.status() {
            StatusCode::MULTI_STATUS | StatusCode::OK => {
                let xml = response.text().await?;
                Ok(parse_multistatus(&xml)?
                    .first()
                    .map(|r| r.collection)
                    .unwrap_or(true))
            }
            StatusCode::NOT_FOUND => Ok(false),
            status => Err(status_error(status, url.as_str())),
        }
    }

    async fn create_folder(&self, path: &str) -> Result<()> {
        if self.mkcol(path).await? {
            return Ok(());
        }
        // 409: an ancestor is missing. MKCOL is not recursive, so build the
        // chain top-down and try the target again.
        debug!(path = %path, "Creating missing parent collections");
        let parts: Vec<&str> = segments(path).collect();
        for depth in 1..parts.len() {
            let ancestor = format!("/{}", parts[..depth].join("/"));
            if !self.mkcol(&ancestor).await? {
                return Err(NotesyncError::NotFound(format!(
                    "parent collection of {}",
                    ancestor
                )));
            }
        }
        if self.mkcol(path).await? {
            Ok(())
        } else {
            Err(NotesyncError::NotFound(format!("parent collection of {}", path)))
        }
    }

    async fn delete_folder(&self, path: &str) -> Result<()> {
        let url = self.url_for(path, true)?;
        let response = self.request(Method::DELETE, &url, None, None).await?;
        match response.status() {
            s if s.is_success() => Ok(()),
            StatusCode::NOT_FOUND => Ok(()),
            status => Err(status_error(status, url.as_str())),
        }
    }

    async fn list_directory(&self, path: &str) -> Result<Vec<RemoteEntry>> {
        let url = self.url_for(path, true)?;
        let body = PROPFIND_BODY.as_bytes().to_vec();
        let response = self.request(dav_method("PROPFIND")?, &url, Some("1"), Some(body)).await?;
        let status = response.status();
        if status != StatusCode::MULTI_STATUS && status != StatusCode::OK {
            return Err(status_error(status, url.as_str()));
        }
        let xml = response.text().await?;
        let own_path = href_path(url.as_str());

        let entries = parse_multistatus(&xml)?
            .into_iter()
            .filter_map(|res| {
                let path = href_path(&res.href);
                if path == own_path {
                    return None;
                }
                let name = path.rsplit('/').next()?.to_string();
                if name.is_empty() {
                    return None;
                }
                let kind = if res.collection {
                    EntryKind::Directory
                } else {
                    EntryKind::File
                };
                Some(RemoteEntry { name, kind })
            })
            .collect();
        Ok(entries)
    }

    async fn upload_file(&self, path: &str, bytes: Vec<u8>) -> Result<()> {
        let url = self.url_for(path, false)?;
        let response = self.request(Method::PUT, &url, None, Some(bytes)).await?;
        match response.status() {
            s if s.is_success() => Ok(()),
            StatusCode::CONFLICT => Err(NotesyncError::NotFound(format!(
                "parent collection of {}",
                path
            ))),
            status => Err(status_error(status, url.as_str())),
        }
    }

    async fn download_file(&self, path: &str) -> Result<Vec<u8>> {
        let url = self.url_for(path, false)?;
        let response = self.request(Method::GET, &url, None, None).await?;
        match response.status() {
            StatusCode::OK => Ok(response.bytes().await?.to_vec()),
            StatusCode::NOT_FOUND => Err(NotesyncError::NotFound(path.to_string())),
            status => Err(status_error(status, url.as_str())),
        }
    }
}
