use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::debug;

use crate::assets::LocalAssets;
use crate::config::SyncConfig;
use crate::entity::NoteLibrary;
use crate::error::{NotesyncError, Result};
use crate::snapshot::SnapshotDocument;

pub const VAULT_DIR: &str = ".notesync";
const NOTES_FILE: &str = "notes.json";
const CONFIG_FILE: &str = "config.yaml";
const NOTE_ASSETS_DIR: &str = "note-assets";
const FILE_ASSETS_DIR: &str = "file-assets";

/// On-disk note store: `notes.json` plus the two local asset roots.
#[derive(Debug, Clone)]
pub struct LocalVault {
    dir: PathBuf,
}

impl LocalVault {
    /// Create a new vault under `root` with an empty library.
    pub fn init(root: &Path, config: &SyncConfig) -> Result<Self> {
        let dir = root.join(VAULT_DIR);
        if dir.exists() {
            return Err(NotesyncError::AlreadyInitialized);
        }
        config.validate()?;

        fs::create_dir_all(dir.join(NOTE_ASSETS_DIR))?;
        fs::create_dir_all(dir.join(FILE_ASSETS_DIR))?;

        let vault = Self { dir };
        config.save(&vault.config_path())?;
        vault.save(&NoteLibrary::new())?;
        Ok(vault)
    }

    /// Open an existing vault under `root`.
    pub fn open(root: &Path) -> Result<Self> {
        let dir = root.join(VAULT_DIR);
        if !dir.join(NOTES_FILE).exists() {
            return Err(NotesyncError::NotInitialized);
        }
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn config_path(&self) -> PathBuf {
        self.dir.join(CONFIG_FILE)
    }

    pub fn notes_path(&self) -> PathBuf {
        self.dir.join(NOTES_FILE)
    }

    pub fn assets(&self) -> LocalAssets {
        LocalAssets::new(self.dir.join(NOTE_ASSETS_DIR), self.dir.join(FILE_ASSETS_DIR))
    }

    pub fn load_config(&self) -> Result<SyncConfig> {
        SyncConfig::load(&self.config_path())
    }

    pub fn load(&self) -> Result<NoteLibrary> {
        let bytes = fs::read(self.notes_path())?;
        let doc: SnapshotDocument = serde_json::from_slice(&bytes)?;
        Ok(doc.into_library(Utc::now()))
    }

    /// Write the library through a temp file and rename, so a failed write
    /// leaves the previous `notes.json` intact.
    pub fn save(&self, library: &NoteLibrary) -> Result<()> {
        let bytes = SnapshotDocument::from_library(library).to_bytes()?;
        let tmp = self.dir.join(format!("{}.tmp", NOTES_FILE));
        fs::write(&tmp, bytes)?;
        fs::rename(&tmp, self.notes_path())?;
        debug!(notes = library.notes.len(), "Saved library");
        Ok(())
    }
}
