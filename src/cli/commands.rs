use std::num::NonZeroUsize;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser, Debug)]
#[command(name = "notesync")]
#[command(version, about = "Snapshot sync for a local note vault")]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Local,
    Webdav,
    Rest,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize a vault in the current directory
    Init {
        /// Remote backend to sync with
        #[arg(long, value_enum, default_value = "local")]
        backend: BackendKind,

        /// Folder for the local backend, or server URL for webdav/rest
        #[arg(long)]
        remote: Option<String>,

        /// WebDAV user name
        #[arg(long)]
        username: Option<String>,

        /// Prefix of dated snapshot folders
        #[arg(long, default_value = "Notes")]
        app_name: String,

        /// Remote folder that holds the snapshots
        #[arg(long, default_value = "/")]
        sync_root: String,

        /// Number of dated snapshots to keep
        #[arg(long, default_value = "5")]
        retention: NonZeroUsize,
    },

    /// Add a note
    Add {
        /// Note title
        title: String,

        /// Labels (can be specified multiple times)
        #[arg(long = "label", short = 'l')]
        labels: Vec<String>,

        /// Read the note body from stdin
        #[arg(long)]
        stdin: bool,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Delete a note, leaving a tombstone for the next sync
    Delete {
        /// Note id or unique id prefix
        id: String,

        /// Skip confirmation prompt
        #[arg(long, short = 'f')]
        force: bool,
    },

    /// List notes
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Export today's snapshot to the backend
    Export {
        /// Snapshot date (YYYY-MM-DD), defaults to today
        #[arg(long)]
        date: Option<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Import and merge the newest snapshot from the backend
    Import {
        /// Search backward from this date (YYYY-MM-DD), defaults to today
        #[arg(long)]
        date: Option<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// List snapshots on the backend
    Snapshots {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}
