//! fairstake API server binary

use clap::Parser;
use fairstake::api::{ApiConfig, ApiServer};
use fairstake::broadcast::ChannelBroadcaster;
use fairstake::config::FairstakeConfig;
use fairstake::games::GameEngine;
use fairstake::storage::Storage;
use fairstake::store::KvStore;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "fairstake")]
#[command(about = "Provably-fair wagering backend core", long_about = None)]
struct Args {
    /// API server host
    #[arg(long, default_value = "0.0.0.0")]
    host: String,

    /// API server port
    #[arg(long, default_value = "8080")]
    port: u16,

    /// Database directory
    #[arg(long, default_value = "./DB/fairstake_data")]
    db_path: String,

    /// Allowed CORS origins (comma-separated, use * for all)
    #[arg(long, default_value = "*")]
    cors_origins: String,

    /// Request timeout in seconds
    #[arg(long, default_value = "30")]
    timeout: u64,

    /// Server seed override (hex). Generated when absent.
    #[arg(long)]
    server_seed: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fairstake=info,tower_http=info".into()),
        )
        .init();

    let mut config = FairstakeConfig::production();
    config.storage.data_directory = args.db_path.clone();
    config.validate()?;

    let storage = Storage::open_with_config(&config.storage)?;
    let store = KvStore::new(storage);

    let broadcaster = Arc::new(ChannelBroadcaster::new(1024));
    let engine = match args.server_seed {
        Some(seed) => GameEngine::with_server_seed(
            store,
            broadcaster.clone(),
            config.engine.clone(),
            seed,
        ),
        None => GameEngine::new(store, broadcaster.clone(), config.engine.clone()),
    };

    // Background reaper for abandoned games.
    let _reaper = engine.spawn_reaper();

    let api_config = ApiConfig {
        host: args.host,
        port: args.port,
        allowed_origins: args
            .cors_origins
            .split(',')
            .map(|s| s.trim().to_string())
            .collect(),
        request_timeout_secs: args.timeout,
    };

    ApiServer::new(api_config, engine).run().await
}
