use anyhow::Result;
use clap::Parser;
use motorpool::cli::{Cli, Commands};
use motorpool::config::Config;
use motorpool::console::Console;
use motorpool::db::{Db, IN_MEMORY};
use motorpool::engine::model::CharacterId;
use motorpool::engine::plugin::VehiclePlugin;
use motorpool::engine::query::{accessible_to, menu_entries};
use motorpool::host::{ConsoleChannel, SessionTable};
use motorpool::store::SqliteStore;
use std::sync::Arc;
use tracing::info;

fn init_simple_tracing(verbose: bool) {
    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Open the configured database and the vehicle collection inside it.
async fn open_store(config: &Config) -> Result<SqliteStore> {
    info!(
        "Connecting to database at {}...",
        config.database.path.display()
    );

    let db_path_str = config.database.path.to_string_lossy().to_string();
    if db_path_str != IN_MEMORY
        && let Some(parent) = config.database.path.parent()
        && !parent.as_os_str().is_empty()
        && !parent.exists()
    {
        std::fs::create_dir_all(parent)?;
    }

    let db = Db::open_with_retry(&db_path_str, 3, std::time::Duration::from_millis(100))
        .await
        .map_err(|e| anyhow::anyhow!("Failed to connect to database: {}", e))?;
    Ok(SqliteStore::open(Arc::new(db), &config.database.collection).await?)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse the command-line arguments.
    let cli = Cli::parse();

    let config =
        Config::load().map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))?;
    init_simple_tracing(config.logging.verbose);

    // Dispatch to the appropriate command handler.
    match cli.command.unwrap_or(Commands::Console) {
        Commands::Console => {
            let store = Arc::new(open_store(&config).await?);
            let sessions = Arc::new(SessionTable::new());
            let plugin = VehiclePlugin::new(
                config,
                store.clone(),
                store,
                sessions.clone(),
                Arc::new(ConsoleChannel),
            );
            info!("Motorpool console ready, type help for commands");
            Console::new(plugin, sessions).run().await?;
        }
        Commands::InitDb => {
            let store = open_store(&config).await?;
            info!(collection = store.collection(), "Database initialized");
        }
        Commands::List { character, json } => {
            let store = open_store(&config).await?;
            let records = accessible_to(&store, &CharacterId::new(character)).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&records)?);
            } else {
                for entry in menu_entries(&records) {
                    println!("{}  {}", entry.label, entry.vehicle);
                }
            }
        }
    }

    Ok(())
}
