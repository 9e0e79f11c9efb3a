use thiserror::Error;

#[derive(Error, Debug)]
pub enum NotesyncError {
    #[error("Not a notesync vault. Run 'notesync init' first.")]
    NotInitialized,

    #[error("Already initialized. Remove the vault directory to reinitialize.")]
    AlreadyInitialized,

    #[error("Note not found: {0}")]
    NoteNotFound(String),

    /// Network-level failure talking to a backend. Safe to retry.
    #[error("Transport error: {0}")]
    Transport(String),

    /// Credentials were rejected, after the single refresh attempt.
    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Remote path not found: {0}")]
    NotFound(String),

    #[error("Backend returned an unexpected response: {0}")]
    Protocol(String),

    #[error("Nothing to import: no snapshot found in the last {days} days")]
    SnapshotNotFound { days: u32 },

    #[error("Invalid snapshot: {0}")]
    InvalidSnapshot(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Sync cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl NotesyncError {
    /// Whether the caller may retry the failed operation with backoff.
    pub fn is_retryable(&self) -> bool {
        matches!(self, NotesyncError::Transport(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, NotesyncError::NotFound(_))
    }
}

impl From<reqwest::Error> for NotesyncError {
    fn from(e: reqwest::Error) -> Self {
        NotesyncError::Transport(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, NotesyncError>;
