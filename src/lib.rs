pub mod assets;
pub mod cli;
pub mod codec;
pub mod config;
pub mod entity;
pub mod error;
pub mod merge;
pub mod remote;
pub mod snapshot;
pub mod storage;
pub mod sync;

pub use config::SyncConfig;
pub use error::{NotesyncError, Result};
pub use storage::LocalVault;
pub use sync::SyncOrchestrator;
