mod commands;
mod handlers;

pub use commands::{BackendKind, Cli, Commands};
pub use handlers::{
    handle_add, handle_delete, handle_export, handle_import, handle_init, handle_list,
    handle_snapshots,
};
