use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use fleetdeck::{api, Config};
use fleetdeck_core::db::Database;

#[derive(Parser)]
#[command(name = "fleetdeck")]
#[command(about = "Agent fleet tracking dashboard")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the Fleetdeck server
    Serve {
        /// Port for HTTP API
        #[arg(short, long, default_value = "3000")]
        port: u16,

        /// Database file (defaults to the platform data directory)
        #[arg(long)]
        db: Option<std::path::PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "fleetdeck=debug,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let (port, db_path) = match cli.command {
        Some(Commands::Serve { port, db }) => (port, db),
        // Default: start server
        None => (3000, None),
    };

    let db = match db_path {
        Some(path) => Database::open(path)?,
        None => Database::open_default()?,
    };
    db.migrate()?;

    let config = Config::from_env();
    if config.github_token.is_some() {
        tracing::info!("GitHub sync enabled (GITHUB_TOKEN set)");
    } else {
        tracing::info!("GitHub sync disabled (set GITHUB_TOKEN to enable)");
    }
    match &config.gateway {
        Some(gateway) => tracing::info!("session gateway: {}", gateway.base_url),
        None => tracing::info!(
            "session gateway disabled (set FLEETDECK_GATEWAY_URL and FLEETDECK_GATEWAY_TOKEN to enable)"
        ),
    }

    let app = api::create_router(api::AppState::new(db, &config));

    let listener = tokio::net::TcpListener::bind(format!("127.0.0.1:{}", port)).await?;
    tracing::info!("Fleetdeck server listening on http://127.0.0.1:{}", port);

    axum::serve(listener, app).await?;

    Ok(())
}
