use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

use registry_admin::config::ServerConfig;
use registry_admin::server::{AppState, create_router};
use registry_admin::store::{Bootstrap, DEFAULT_ADMIN_PASSWORD, SqliteStore, Store};

#[derive(Parser)]
#[command(name = "registry-admin")]
#[command(about = "Users, groups and access rules for a private container registry", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the database and its seed records
    Init {
        /// Data directory for the database
        #[arg(long, default_value = "./data")]
        data_dir: String,

        /// Password of the seed admin user
        #[arg(long, default_value = DEFAULT_ADMIN_PASSWORD)]
        admin_password: String,
    },

    /// Start the server
    Serve {
        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Port to bind to
        #[arg(long, short, default_value = "8080")]
        port: u16,

        /// Data directory for the database
        #[arg(long, default_value = "./data")]
        data_dir: String,

        /// Password of the seed admin user, applied on first start only
        #[arg(long, default_value = DEFAULT_ADMIN_PASSWORD)]
        admin_password: String,
    },
}

fn open_store(config: &ServerConfig, shutdown: CancellationToken) -> anyhow::Result<(SqliteStore, Bootstrap)> {
    fs::create_dir_all(&config.data_dir)?;

    let store = SqliteStore::new(config.db_path()).with_admin_password(&config.admin_password);
    let bootstrap = store.connect(shutdown)?;
    Ok((store, bootstrap))
}

fn run_init(config: &ServerConfig) -> anyhow::Result<()> {
    let (store, bootstrap) = open_store(config, CancellationToken::new())?;

    println!("Database: {}", store.path().display());
    for table in &bootstrap.tables {
        println!("  {:<14} {}", table.table, table.outcome);
    }
    if bootstrap.is_warm_start() {
        println!("Already initialized.");
    } else if bootstrap.created().any(|t| t == "users") {
        println!("Default admin user: admin");
    }

    store.close()?;
    Ok(())
}

async fn run_serve(config: ServerConfig) -> anyhow::Result<()> {
    let shutdown = CancellationToken::new();
    let (store, bootstrap) = open_store(&config, shutdown.clone())?;

    if bootstrap.is_warm_start() {
        info!("Using existing database {}", store.path().display());
    } else {
        info!("Database bootstrapped: {bootstrap}");
    }

    let state = Arc::new(AppState::new(Arc::new(store)));
    let app = create_router(state);
    let addr = config.socket_addr()?;

    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for shutdown signal: {e}");
            }
            info!("Shutting down");
            shutdown.cancel();
        })
        .await?;

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("registry_admin=info".parse()?))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Init {
            data_dir,
            admin_password,
        } => {
            let config = ServerConfig {
                data_dir: PathBuf::from(data_dir),
                admin_password,
                ..Default::default()
            };
            run_init(&config)?;
        }
        Commands::Serve {
            host,
            port,
            data_dir,
            admin_password,
        } => {
            let config = ServerConfig {
                host,
                port,
                data_dir: PathBuf::from(data_dir),
                admin_password,
            };
            run_serve(config).await?;
        }
    }

    Ok(())
}
