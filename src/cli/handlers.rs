use std::env;
use std::io::{self, Read};
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDate};
use serde_json::json;
use tokio_util::sync::CancellationToken;

use super::commands::BackendKind;
use crate::config::{BackendConfig, SyncConfig};
use crate::entity::{now_millis, ContentNode, Note, NoteLibrary};
use crate::error::{NotesyncError, Result};
use crate::remote::AnyStore;
use crate::storage::{LocalVault, VAULT_DIR};
use crate::sync::{retry_transient, RetryPolicy, SyncOrchestrator};

/// Find the vault root by looking for .notesync/ in the current directory
/// and its ancestors.
fn find_vault_root() -> PathBuf {
    let cwd = env::current_dir().unwrap_or_else(|_| PathBuf::from("."));

    let mut current = cwd.as_path();
    loop {
        if current.join(VAULT_DIR).exists() {
            return current.to_path_buf();
        }
        match current.parent() {
            Some(parent) => current = parent,
            None => return cwd,
        }
    }
}

fn parse_date(date: Option<String>) -> Result<NaiveDate> {
    match date {
        Some(s) => NaiveDate::parse_from_str(&s, "%Y-%m-%d")
            .map_err(|_| NotesyncError::Config(format!("invalid date '{}', expected YYYY-MM-DD", s))),
        None => Ok(Local::now().date_naive()),
    }
}

fn short_id(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}

/// Resolve a full note id or a unique prefix of one.
fn resolve_note_id(library: &NoteLibrary, query: &str) -> Result<String> {
    if library.notes.contains_key(query) {
        return Ok(query.to_string());
    }
    let mut matches = library.notes.keys().filter(|id| id.starts_with(query));
    match (matches.next(), matches.next()) {
        (Some(id), None) => Ok(id.clone()),
        _ => Err(NotesyncError::NoteNotFound(query.to_string())),
    }
}

/// Cancel `token` on Ctrl-C. The returned handle is aborted by the caller.
fn cancel_on_ctrl_c(token: CancellationToken) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("Cancelling...");
            token.cancel();
        }
    })
}

struct Session {
    vault: LocalVault,
    config: SyncConfig,
    sync: SyncOrchestrator<AnyStore>,
}

fn open_session(root: &Path) -> Result<Session> {
    let vault = LocalVault::open(root)?;
    let config = vault.load_config()?.with_env_secrets();
    let store = config.build_store(root)?;
    tracing::debug!(backend = store.backend_name(), "Opened backend");
    let sync = SyncOrchestrator::from_config(store, &config, vault.clone());
    Ok(Session {
        vault,
        config,
        sync,
    })
}

pub fn handle_init(
    backend: BackendKind,
    remote: Option<String>,
    username: Option<String>,
    app_name: String,
    sync_root: String,
    retention: NonZeroUsize,
) -> Result<()> {
    let root = env::current_dir()?;

    let backend = match backend {
        BackendKind::Local => BackendConfig::Local {
            path: remote
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("notesync-remote")),
        },
        BackendKind::Webdav => BackendConfig::WebDav {
            url: remote.ok_or_else(|| {
                NotesyncError::Config("--remote <URL> is required for webdav".to_string())
            })?,
            username: username.ok_or_else(|| {
                NotesyncError::Config("--username is required for webdav".to_string())
            })?,
            password: None,
        },
        BackendKind::Rest => BackendConfig::Rest {
            api_url: remote.unwrap_or_else(|| crate::remote::DEFAULT_API_URL.to_string()),
            content_url: crate::remote::DEFAULT_CONTENT_URL.to_string(),
            token: None,
        },
    };
    let config = SyncConfig {
        app_name,
        sync_root,
        retention_limit: retention,
        backend,
        ..SyncConfig::default()
    };

    let vault = LocalVault::init(&root, &config)?;

    println!("Initialized notesync vault in {}", vault.dir().display());
    Ok(())
}

pub fn handle_add(title: String, labels: Vec<String>, stdin: bool, json: bool) -> Result<()> {
    let root = find_vault_root();
    let vault = LocalVault::open(&root)?;
    let mut library = vault.load()?;

    let mut note = Note::new(title);
    note.labels = labels.into_iter().collect();

    if stdin {
        let mut body = String::new();
        io::stdin().read_to_string(&mut body)?;
        let paragraphs: Vec<ContentNode> = body
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| ContentNode::paragraph(vec![ContentNode::text(line)]))
            .collect();
        if !paragraphs.is_empty() {
            note.content = ContentNode::container("doc", paragraphs);
        }
    }

    library.upsert(note.clone());
    vault.save(&library)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&note)?);
    } else {
        println!("Created note ({}) - {}", short_id(&note.id), note.title);
    }
    Ok(())
}

pub fn handle_delete(id: String, force: bool) -> Result<()> {
    let root = find_vault_root();
    let vault = LocalVault::open(&root)?;
    let mut library = vault.load()?;

    let id = resolve_note_id(&library, &id)?;

    if !force {
        let title = library
            .notes
            .get(&id)
            .map(|n| n.title.clone())
            .unwrap_or_default();
        eprintln!("Delete note ({}) - {}? [y/N] ", short_id(&id), title);

        if atty::is(atty::Stream::Stdin) {
            let mut input = String::new();
            io::stdin().read_line(&mut input)?;
            if !input.trim().eq_ignore_ascii_case("y") {
                println!("Cancelled.");
                return Ok(());
            }
        } else {
            return Err(NotesyncError::Config(
                "Use --force to delete in non-interactive mode".to_string(),
            ));
        }
    }

    let note = library.delete_note(&id, now_millis())?;
    vault.save(&library)?;

    println!("Deleted note ({}) - {}", short_id(&note.id), note.title);
    Ok(())
}

pub fn handle_list(json: bool) -> Result<()> {
    let root = find_vault_root();
    let vault = LocalVault::open(&root)?;
    let library = vault.load()?;

    if json {
        let notes: Vec<&Note> = library.notes.values().collect();
        println!("{}", serde_json::to_string_pretty(&notes)?);
    } else if library.notes.is_empty() {
        println!("No notes found.");
    } else {
        println!("Notes:\n");
        for note in library.notes.values() {
            let marker = if note.is_bookmarked { "*" } else { " " };
            println!("  {}({}) {}", marker, short_id(&note.id), note.title);
            if !note.labels.is_empty() {
                let labels: Vec<&str> = note.labels.iter().map(String::as_str).collect();
                println!("      labels: {}", labels.join(", "));
            }
        }
    }
    Ok(())
}

pub async fn handle_export(date: Option<String>, json: bool) -> Result<()> {
    let date = parse_date(date)?;
    let root = find_vault_root();
    let Session {
        vault,
        config,
        sync,
    } = open_session(&root)?;
    let mut library = vault.load()?;

    let watcher = cancel_on_ctrl_c(sync.cancellation_token());
    let result = retry_transient(&RetryPolicy::default(), || sync.export(&library, date)).await;
    watcher.abort();
    let report = result?;

    // Expired tombstones left the snapshot; drop them locally too.
    if report.pruned_tombstones > 0 {
        if let Some(ttl) = config.tombstone_ttl() {
            library.prune_tombstones(now_millis(), ttl);
            vault.save(&library)?;
        }
    }

    if json {
        let value = json!({
            "date": report.date.to_string(),
            "folder": report.folder,
            "replaced": report.replaced,
            "notes": report.notes,
            "tombstones": report.tombstones,
            "prunedTombstones": report.pruned_tombstones,
            "noteAssets": report.uploads.note_assets,
            "fileAssets": report.uploads.file_assets,
            "retention": {
                "kept": report.retention.kept.iter().map(|d| d.to_string()).collect::<Vec<_>>(),
                "deleted": report.retention.deleted.iter().map(|d| d.to_string()).collect::<Vec<_>>(),
                "failed": report.retention.failed.iter().map(|d| d.to_string()).collect::<Vec<_>>(),
            },
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else {
        println!(
            "Exported {} notes to {}{}",
            report.notes,
            report.folder,
            if report.replaced { " (replaced)" } else { "" }
        );
        if !report.retention.deleted.is_empty() {
            println!(
                "  removed {} old snapshot(s)",
                report.retention.deleted.len()
            );
        }
    }
    Ok(())
}

pub async fn handle_import(date: Option<String>, json: bool) -> Result<()> {
    let date = parse_date(date)?;
    let root = find_vault_root();
    let Session { vault, sync, .. } = open_session(&root)?;
    let library = vault.load()?;

    let watcher = cancel_on_ctrl_c(sync.cancellation_token());
    let result = retry_transient(&RetryPolicy::default(), || sync.import(&library, date)).await;
    watcher.abort();

    let (_, report) = match result {
        Ok(done) => done,
        Err(e @ NotesyncError::SnapshotNotFound { .. }) => {
            println!("{}", e);
            return Ok(());
        }
        Err(e) => return Err(e),
    };

    if json {
        let value = json!({
            "date": report.date.to_string(),
            "folder": report.folder,
            "notes": report.notes,
            "fromLocal": report.merge.from_local,
            "fromImported": report.merge.from_imported,
            "suppressed": report.merge.suppressed,
            "assetsDownloaded": report.assets.downloaded,
            "assetsSkipped": report.assets.skipped,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else {
        println!(
            "Imported {} ({} notes, {} updated from snapshot, {} assets downloaded)",
            report.folder, report.notes, report.merge.from_imported, report.assets.downloaded
        );
    }
    Ok(())
}

pub async fn handle_snapshots(json: bool) -> Result<()> {
    let root = find_vault_root();
    let Session { sync, .. } = open_session(&root)?;

    let dates = retry_transient(&RetryPolicy::default(), || sync.list_snapshots()).await?;

    if json {
        let names: Vec<String> = dates
            .iter()
            .map(|d| sync.layout().folder_name(*d))
            .collect();
        println!("{}", serde_json::to_string_pretty(&names)?);
    } else if dates.is_empty() {
        println!("No snapshots found.");
    } else {
        println!("Snapshots ({}):\n", sync.store().backend_name());
        for date in dates {
            println!("  {}", sync.layout().folder_name(date));
        }
    }
    Ok(())
}
