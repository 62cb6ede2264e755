// tknz-server: Token launch service.
// Assembles partially-signed launch transactions, records confirmed launches,
// and claims pool fees on behalf of deployers.

use std::sync::Arc;

use solana_client::nonblocking::rpc_client::RpcClient;
use tracing_subscriber::EnvFilter;

mod allocator;
mod assembler;
mod config;
mod curve;
mod error;
mod handlers;
mod metadata;
mod registry;
mod store;

use allocator::SequenceAllocator;
use assembler::TransactionAssembler;
use config::{AppConfig, CONFIG_INDEX_COUNTER_KEY};
use handlers::AppState;
use metadata::MetadataPublisher;
use registry::{LaunchRecorder, PoolRegistryWriter};
use store::{KvStore, RedisStore};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = match AppConfig::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            eprintln!();
            eprintln!("Required environment variables:");
            eprintln!("  REDIS_URL             Key-value store connection URL");
            eprintln!();
            eprintln!("Optional environment variables:");
            eprintln!("  BIND_ADDR             Listen address (default: 0.0.0.0:8787)");
            eprintln!("  SOLANA_RPC_URL        RPC URL (default: mainnet-beta)");
            eprintln!("  METADATA_UPLOAD_URL   Metadata upload endpoint");
            eprintln!("  TREASURY_SECRET_KEY   Treasury keypair as a JSON byte array");
            eprintln!("  MIN_DEPOSIT_SOL       Minimum pool deposit (default: 0.01)");
            eprintln!("  DEFAULT_INITIAL_PRICE Starting price in SOL/token");
            std::process::exit(1);
        }
    };
    let config = Arc::new(config);

    let store: Arc<dyn KvStore> = match RedisStore::connect(&config.redis_url).await {
        Ok(s) => Arc::new(s),
        Err(e) => {
            eprintln!("Store connection error: {}", e);
            std::process::exit(1);
        }
    };

    let rpc = Arc::new(RpcClient::new(config.rpc_url.clone()));

    let state = Arc::new(AppState {
        publisher: MetadataPublisher::new(config.metadata_upload_url.clone()),
        allocator: SequenceAllocator::new(store.clone(), CONFIG_INDEX_COUNTER_KEY),
        assembler: TransactionAssembler::new(rpc.clone()),
        registry: PoolRegistryWriter::new(store.clone()),
        recorder: LaunchRecorder::new(store.clone()),
        store,
        rpc,
        config: config.clone(),
    });

    let app = handlers::router(state);

    tracing::info!(addr = %config.bind_addr, "tknz-server listening");
    let listener = match tokio::net::TcpListener::bind(&config.bind_addr).await {
        Ok(l) => l,
        Err(e) => {
            eprintln!("Failed to bind {}: {}", config.bind_addr, e);
            std::process::exit(1);
        }
    };
    if let Err(e) = axum::serve(listener, app).await {
        eprintln!("Server error: {}", e);
        std::process::exit(1);
    }
}
