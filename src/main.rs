use clap::Parser;
use notesync::cli::{
    handle_add, handle_delete, handle_export, handle_import, handle_init, handle_list,
    handle_snapshots, Cli, Commands,
};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("notesync=info")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Init {
            backend,
            remote,
            username,
            app_name,
            sync_root,
            retention,
        } => handle_init(backend, remote, username, app_name, sync_root, retention),
        Commands::Add {
            title,
            labels,
            stdin,
            json,
        } => handle_add(title, labels, stdin, json),
        Commands::Delete { id, force } => handle_delete(id, force),
        Commands::List { json } => handle_list(json),
        Commands::Export { date, json } => handle_export(date, json).await,
        Commands::Import { date, json } => handle_import(date, json).await,
        Commands::Snapshots { json } => handle_snapshots(json).await,
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
