use std::path::PathBuf;

use clap::Parser;
use tracing::{info, warn};

use voicewidget_backend::logging::{LoggingConfig, log_welcome, parse_log_level, setup_logging};
use voicewidget_backend::{BackendConfig, VERSION, serve};

/// Storefront backend for the voice widget
#[derive(Parser, Debug)]
#[command(name = "voicewidget-backend", version, about)]
struct Args {
    /// Address to listen on (overrides BIND_ADDRESS)
    #[arg(short, long)]
    bind: Option<String>,

    /// Inventory JSON file (overrides INVENTORY_PATH)
    #[arg(short, long)]
    inventory: Option<PathBuf>,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let dotenv = dotenvy::dotenv();

    let mut logging = LoggingConfig::new(parse_log_level(&args.log_level)?);
    if args.json_logs {
        logging = logging.with_json();
    }
    setup_logging(&logging)?;
    log_welcome("voicewidget-backend", VERSION);

    match dotenv {
        Ok(path) => info!("Loaded environment from {}", path.display()),
        Err(e) => info!("No .env file loaded: {}", e),
    }

    let mut config = BackendConfig::from_env()?;
    if let Some(bind) = args.bind {
        config.bind_address = bind;
    }
    if let Some(inventory) = args.inventory {
        config.inventory_path = inventory;
    }

    if config.livekit_url.is_empty() {
        warn!("LIVEKIT_URL is not set; clients will be unable to connect");
    }

    serve(config).await
}
