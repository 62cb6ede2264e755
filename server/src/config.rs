//! Service configuration, read once at startup and passed into components.
//!
//! Nothing here is consulted ambiently at request time: the treasury keypair,
//! store URLs, and launch defaults all travel through `AppConfig`.

use solana_sdk::signature::Keypair;
use std::sync::Arc;

/// Counter key for the sequence allocator.
pub const CONFIG_INDEX_COUNTER_KEY: &str = "counters:dbcConfigIndex";

/// Default starting price in SOL per token.
pub const DEFAULT_INITIAL_PRICE: f64 = 0.00001;

/// Minimum pool deposit in SOL; requests below this are clamped up to guard
/// against micro-pools.
pub const DEFAULT_SOL_DEPOSIT: f64 = 0.01;

/// Ticker symbols that can never be launched (case-insensitive).
pub const RESERVED_TICKERS: [&str; 4] = ["SOL", "USDC", "USDT", "TKNZ"];

pub struct AppConfig {
    pub bind_addr: String,
    pub rpc_url: String,
    pub redis_url: String,
    pub metadata_upload_url: String,
    /// Holds LP positions and collected swap fees. Optional: without it the
    /// creator wallet receives the fee-claimer role and /claim-fees is
    /// unavailable.
    pub treasury_keypair: Option<Arc<Keypair>>,
    pub min_deposit_sol: f64,
    pub default_initial_price: f64,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, String> {
        let bind_addr =
            std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8787".to_string());

        let rpc_url = std::env::var("SOLANA_RPC_URL")
            .unwrap_or_else(|_| "https://api.mainnet-beta.solana.com".to_string());

        let redis_url =
            std::env::var("REDIS_URL").map_err(|_| "REDIS_URL is required".to_string())?;

        let metadata_upload_url = std::env::var("METADATA_UPLOAD_URL")
            .unwrap_or_else(|_| "https://pump.fun/api/ipfs".to_string());

        let treasury_keypair = match std::env::var("TREASURY_SECRET_KEY") {
            Ok(raw) => {
                let bytes: Vec<u8> = serde_json::from_str(&raw)
                    .map_err(|e| format!("Invalid TREASURY_SECRET_KEY: {}", e))?;
                let kp = Keypair::from_bytes(&bytes)
                    .map_err(|e| format!("Invalid TREASURY_SECRET_KEY: {}", e))?;
                Some(Arc::new(kp))
            }
            Err(_) => None,
        };

        let min_deposit_sol: f64 = match std::env::var("MIN_DEPOSIT_SOL") {
            Ok(v) => v
                .parse()
                .map_err(|e| format!("Invalid MIN_DEPOSIT_SOL: {}", e))?,
            Err(_) => DEFAULT_SOL_DEPOSIT,
        };

        let default_initial_price: f64 = match std::env::var("DEFAULT_INITIAL_PRICE") {
            Ok(v) => v
                .parse()
                .map_err(|e| format!("Invalid DEFAULT_INITIAL_PRICE: {}", e))?,
            Err(_) => DEFAULT_INITIAL_PRICE,
        };

        Ok(Self {
            bind_addr,
            rpc_url,
            redis_url,
            metadata_upload_url,
            treasury_keypair,
            min_deposit_sol,
            default_initial_price,
        })
    }
}
