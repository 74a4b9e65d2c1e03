use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};

use fitbuddy_core::channel::whatsapp::WhatsAppGateway;
use fitbuddy_core::config::{self, Config};
use fitbuddy_core::dispatch::{CancelRegistry, ExerciseDispatcher};
use fitbuddy_core::engine::Engine;
use fitbuddy_core::service::http::{run_server, AppState};
use fitbuddy_core::service::websession::WebSessionStore;
use fitbuddy_core::session::memory_store::InMemorySessionStore;
use fitbuddy_core::storage::Database;
use fitbuddy_core::token::TokenBridge;

#[derive(Parser)]
#[command(
    name = "fitbuddy",
    about = "💪 fitbuddy - WhatsApp workout bot",
    version = fitbuddy_core::VERSION,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the webhook and web dashboard server
    Serve {
        /// Listen port (overrides config)
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Initialize the fitbuddy config file
    Init,
    /// Seed the exercise catalog with demo data
    Seed,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("fitbuddy=info".parse().unwrap())
                .add_directive("fitbuddy_core=info".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { port } => cmd_serve(port).await?,
        Commands::Init => cmd_init()?,
        Commands::Seed => cmd_seed()?,
    }

    Ok(())
}

async fn cmd_serve(port: Option<u16>) -> Result<()> {
    let config = config::load_config(None);
    let port = port.unwrap_or(config.web.port);

    if let Err(e) = config.require_gateway() {
        tracing::warn!("{e}; outbound chat messages will fail until credentials are set");
    }

    let db = Database::open(config.database_path())?;
    let directory = Arc::new(db.clone());
    let catalog = Arc::new(db.clone());
    let bridge = Arc::new(TokenBridge::new(Arc::new(db.clone())));

    let gateway = Arc::new(WhatsAppGateway::new(config.gateway.clone()));
    let sessions = Arc::new(InMemorySessionStore::new(Duration::from_secs(
        config.sessions.idle_ttl_secs,
    )));
    let cancels = CancelRegistry::new();
    let dispatcher = Arc::new(ExerciseDispatcher::new(
        catalog.clone(),
        gateway.clone(),
        cancels.clone(),
        Duration::from_millis(config.dispatch.pacing_ms),
    ));
    let engine = Arc::new(Engine::new(
        sessions,
        directory.clone(),
        gateway,
        bridge.clone(),
        dispatcher,
        cancels,
        config.web.base_url.clone(),
    ));

    let state = Arc::new(AppState {
        engine,
        bridge,
        directory,
        catalog,
        workouts: db,
        web_sessions: WebSessionStore::new(Duration::from_secs(config.web.session_ttl_secs)),
        config,
    });

    run_server(state, port).await
}

fn cmd_init() -> Result<()> {
    let path = config::get_config_path();
    if path.exists() {
        println!("Config already exists at {}", path.display());
        return Ok(());
    }
    config::save_config(&Config::default(), Some(&path))?;
    println!("Wrote default config to {}", path.display());
    println!("Set WHATSAPP_ACCESS_TOKEN / WHATSAPP_PHONE_NUMBER_ID or edit the file.");
    Ok(())
}

fn cmd_seed() -> Result<()> {
    let config = config::load_config(None);
    let db = Database::open(config.database_path())?;
    let count = db.seed_demo_exercises()?;
    println!("Seeded {count} exercises into {}", config.database_path().display());
    Ok(())
}
