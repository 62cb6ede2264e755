//! HTTP surface: request shapes, validation, and the three launch endpoints.
//!
//! Bodies are decoded from raw bytes so malformed JSON maps to the same 400
//! shape as every other validation failure. All side-effecting work is
//! delegated to the components on `AppState`; handlers own ordering and
//! validation only.

use std::str::FromStr;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use axum::{
    body::Bytes,
    extract::{Request, State},
    http::{header, HeaderValue, Method, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_sdk::{
    instruction::Instruction,
    message::{v0, VersionedMessage},
    native_token::LAMPORTS_PER_SOL,
    pubkey::Pubkey,
    signature::Signature,
    signer::Signer,
    system_instruction,
    transaction::VersionedTransaction,
};
use spl_associated_token_account::{
    get_associated_token_address, instruction::create_associated_token_account_idempotent,
};

use crate::allocator::SequenceAllocator;
use crate::assembler::{AssemblyInputs, TransactionAssembler};
use crate::config::{AppConfig, RESERVED_TICKERS};
use crate::curve::{build_curve_config, CurveInputs, CurveOverrides};
use crate::error::ApiError;
use crate::metadata::MetadataPublisher;
use crate::registry::{pool_key, LaunchRecorder, PoolRegistryWriter};
use crate::store::KvStore;

// ── Shared state ────────────────────────────────────────────────────────────

pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn KvStore>,
    pub publisher: MetadataPublisher,
    pub allocator: SequenceAllocator,
    pub assembler: TransactionAssembler,
    pub registry: PoolRegistryWriter,
    pub recorder: LaunchRecorder,
    pub rpc: Arc<RpcClient>,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/create-launch", post(create_launch))
        .route("/confirm-launch", post(confirm_launch))
        .route("/claim-fees", post(claim_fees))
        .route("/version", get(version))
        .layer(axum::middleware::from_fn(cors))
        .with_state(state)
}

/// Permissive CORS on every response; preflight short-circuits to 204.
pub async fn cors(req: Request, next: Next) -> Response {
    if req.method() == Method::OPTIONS {
        let mut resp = StatusCode::NO_CONTENT.into_response();
        apply_cors_headers(&mut resp);
        return resp;
    }
    let mut resp = next.run(req).await;
    apply_cors_headers(&mut resp);
    resp
}

fn apply_cors_headers(resp: &mut Response) {
    let headers = resp.headers_mut();
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("Content-Type, Authorization"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("POST, GET, OPTIONS"),
    );
}

// ── Request / response shapes ───────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenDescriptor {
    pub name: String,
    pub ticker: String,
    pub description: String,
    pub image_url: String,
    pub website_url: Option<String>,
    pub twitter: Option<String>,
    pub telegram: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortalParams {
    /// Starting price in SOL per token.
    pub initial_price: Option<f64>,
    /// SOL to deposit into the pool. Explicit 0 means launch without an
    /// initial buy.
    pub amount: Option<f64>,
    /// Service fee in SOL, echoed back in the response.
    pub priority_fee: Option<f64>,
    /// Accepted for compatibility; not enforced.
    pub slippage: Option<f64>,
    /// Pool-seed token amount; overrides the amount/price calculation.
    pub pool_supply: Option<u64>,
    /// Existing mint to reuse instead of creating one.
    pub mint: Option<String>,
    /// Existing pool to reuse instead of deriving one.
    pub pool: Option<String>,
    /// Typed curve overrides; unknown fields are rejected.
    pub curve_config: Option<CurveOverrides>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateLaunchRequest {
    pub wallet_address: String,
    pub token: TokenDescriptor,
    pub decimals: Option<u8>,
    pub initial_supply: Option<u64>,
    pub is_lock_liquidity: Option<bool>,
    pub portal_params: Option<PortalParams>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateLaunchResponse {
    /// Base64 envelopes in submission order.
    pub transactions: Vec<String>,
    pub mint: String,
    pub ata: String,
    pub metadata_uri: String,
    pub pool: String,
    pub decimals: u8,
    pub initial_supply: u64,
    /// Raw units as a decimal string; can exceed the JSON-safe integer range.
    pub initial_supply_raw: String,
    pub deposit_sol: f64,
    pub deposit_lamports: u64,
    pub fee_sol: f64,
    pub fee_lamports: u64,
    pub is_lock_liquidity: bool,
}

#[derive(Debug, Deserialize)]
struct ClaimFeesRequest {
    pool: String,
    signature: String,
}

// ── POST /create-launch ─────────────────────────────────────────────────────

async fn create_launch(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<CreateLaunchResponse>, ApiError> {
    handle_create_launch(&state, &body).await.map(Json)
}

async fn handle_create_launch(
    state: &AppState,
    body: &[u8],
) -> Result<CreateLaunchResponse, ApiError> {
    let req: CreateLaunchRequest = parse_body(body)?;

    // All validation runs before any upload, allocation, or assembly, so a
    // bad request burns no index and touches no upstream service.
    let payer = Pubkey::from_str(&req.wallet_address)
        .map_err(|_| ApiError::Validation("invalid walletAddress".to_string()))?;

    if req.token.name.trim().is_empty() || req.token.ticker.trim().is_empty() {
        return Err(ApiError::Validation(
            "token name and ticker are required".to_string(),
        ));
    }
    let ticker_upper = req.token.ticker.trim().to_uppercase();
    if RESERVED_TICKERS.contains(&ticker_upper.as_str()) {
        return Err(ApiError::Validation(format!(
            "ticker {} is reserved",
            ticker_upper
        )));
    }

    let decimals = req.decimals.unwrap_or(9);
    if decimals > 18 {
        return Err(ApiError::Validation(
            "invalid decimals; must be between 0 and 18".to_string(),
        ));
    }
    let initial_supply = req.initial_supply.unwrap_or(1_000_000_000);
    let is_lock_liquidity = req.is_lock_liquidity.unwrap_or(true);

    let portal = req.portal_params.unwrap_or_default();
    let mint_override = portal
        .mint
        .as_deref()
        .map(Pubkey::from_str)
        .transpose()
        .map_err(|_| ApiError::Validation("invalid mint override".to_string()))?;
    let pool_override = portal
        .pool
        .as_deref()
        .map(Pubkey::from_str)
        .transpose()
        .map_err(|_| ApiError::Validation("invalid pool override".to_string()))?;

    // An explicit zero deposit keeps the pool but skips the initial buy;
    // absent or sub-minimum amounts clamp up to the configured minimum.
    let skip_initial_buy = portal.amount == Some(0.0);
    let requested_deposit_sol = portal.amount.filter(|a| *a > 0.0);

    tracing::info!(
        wallet = %payer,
        ticker = %ticker_upper,
        decimals,
        initial_supply,
        "assembling launch"
    );

    let published = state.publisher.publish(&req.token).await?;
    let slot = state.allocator.allocate().await?;

    let treasury = state.config.treasury_keypair.as_ref().map(|kp| kp.pubkey());
    let fee_claimer = treasury.unwrap_or(payer);
    let pool_creator = treasury.unwrap_or(payer);

    let curve = build_curve_config(
        &CurveInputs {
            decimals,
            requested_deposit_sol,
            initial_price: portal.initial_price,
            pool_supply: portal.pool_supply,
            activation_ts: epoch_secs(),
            min_deposit_sol: state.config.min_deposit_sol,
            default_initial_price: state.config.default_initial_price,
            fee_claimer,
            leftover_receiver: payer,
        },
        &portal.curve_config.unwrap_or_default(),
    )?;

    let assembled = state
        .assembler
        .assemble(
            &AssemblyInputs {
                payer,
                name: req.token.name.clone(),
                symbol: req.token.ticker.clone(),
                metadata_uri: published.uri.clone(),
                decimals,
                initial_supply_ui: initial_supply,
                config_address: slot.address,
                pool_creator,
                mint_override,
                pool_override,
                skip_initial_buy,
            },
            &curve,
        )
        .await?;

    // Registry write is best effort: the envelopes are already built and the
    // client can submit them regardless.
    state
        .registry
        .record(
            &assembled.pool.to_string(),
            &req.wallet_address,
            &assembled.mint.to_string(),
        )
        .await;

    let (deposit_sol, deposit_lamports) = if skip_initial_buy {
        (0.0, 0)
    } else {
        (curve.effective_deposit_sol, curve.deposit_lamports)
    };
    let fee_sol = portal.priority_fee.unwrap_or(0.0).max(0.0);
    let fee_lamports = (fee_sol * LAMPORTS_PER_SOL as f64).round() as u64;

    Ok(CreateLaunchResponse {
        transactions: assembled.transactions,
        mint: assembled.mint.to_string(),
        ata: assembled.ata.to_string(),
        metadata_uri: published.uri,
        pool: assembled.pool.to_string(),
        decimals,
        initial_supply,
        initial_supply_raw: assembled.initial_supply_raw.to_string(),
        deposit_sol,
        deposit_lamports,
        fee_sol,
        fee_lamports,
        is_lock_liquidity,
    })
}

// ── POST /confirm-launch ────────────────────────────────────────────────────

async fn confirm_launch(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    handle_confirm_launch(&state, &body).await.map(Json)
}

async fn handle_confirm_launch(state: &AppState, body: &[u8]) -> Result<Value, ApiError> {
    let payload: Value = parse_body(body)?;
    let mint = payload
        .get("mint")
        .and_then(Value::as_str)
        .ok_or_else(|| ApiError::Validation("missing mint".to_string()))?;
    Pubkey::from_str(mint).map_err(|_| ApiError::Validation("invalid mint".to_string()))?;

    let created_at = state.recorder.record(mint, &payload).await?;
    tracing::info!(mint, created_at, "launch confirmed");
    Ok(json!({ "success": true, "createdAt": created_at }))
}

// ── POST /claim-fees ────────────────────────────────────────────────────────

async fn claim_fees(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let req: ClaimFeesRequest = parse_body(&body)?;

    let key = pool_key(&req.pool);
    let deployer = lookup(&*state.store, &key, "deployer").await?;
    let mint = lookup(&*state.store, &key, "mint").await?;
    let (deployer, mint) = match (deployer, mint) {
        (Some(d), Some(m)) => (d, m),
        _ => return Err(ApiError::UnknownPool),
    };

    let deployer = Pubkey::from_str(&deployer)
        .map_err(|_| ApiError::Misconfiguration("corrupt registry entry".to_string()))?;
    let mint = Pubkey::from_str(&mint)
        .map_err(|_| ApiError::Misconfiguration("corrupt registry entry".to_string()))?;
    let pool = Pubkey::from_str(&req.pool)
        .map_err(|_| ApiError::Validation("invalid pool address".to_string()))?;

    verify_claim_signature(&req.signature, &req.pool, &deployer)?;

    let treasury = state
        .config
        .treasury_keypair
        .as_ref()
        .ok_or_else(|| ApiError::Misconfiguration("no treasury key configured".to_string()))?
        .clone();

    // Claim everything into the treasury, then forward half of each side to
    // the deployer.
    let quote_mint = spl_token::native_mint::id();
    let token_vault = tknz_sdk::damm::derive_token_vault(&mint, &pool);
    let quote_vault = tknz_sdk::damm::derive_token_vault(&quote_mint, &pool);
    let fee_token = vault_balance(&state.rpc, &token_vault).await?;
    let fee_lamports = vault_balance(&state.rpc, &quote_vault).await?;
    let half_token = fee_token / 2;
    let half_lamports = fee_lamports / 2;

    let treasury_pubkey = treasury.pubkey();
    let treasury_token = get_associated_token_address(&treasury_pubkey, &mint);
    let treasury_quote = get_associated_token_address(&treasury_pubkey, &quote_mint);
    let deployer_token = get_associated_token_address(&deployer, &mint);

    let mut instructions: Vec<Instruction> = vec![tknz_sdk::damm::claim_position_fee(
        &pool,
        &treasury_pubkey,
        &treasury_pubkey,
        &treasury_token,
        &treasury_quote,
        &mint,
        &quote_mint,
    )];
    instructions.push(create_associated_token_account_idempotent(
        &treasury_pubkey,
        &deployer,
        &mint,
        &spl_token::id(),
    ));
    if half_token > 0 {
        instructions.push(
            spl_token::instruction::transfer(
                &spl_token::id(),
                &treasury_token,
                &deployer_token,
                &treasury_pubkey,
                &[],
                half_token,
            )
            .map_err(|e| ApiError::Validation(format!("invalid transfer amount: {}", e)))?,
        );
    }
    if half_lamports > 0 {
        instructions.push(system_instruction::transfer(
            &treasury_pubkey,
            &deployer,
            half_lamports,
        ));
    }

    let blockhash = state
        .rpc
        .get_latest_blockhash()
        .await
        .map_err(|e| rpc_err(format!("blockhash fetch failed: {}", e)))?;
    let message = v0::Message::try_compile(&treasury_pubkey, &instructions, &[], blockhash)
        .map_err(|e| ApiError::Validation(format!("message compilation failed: {}", e)))?;
    let tx = VersionedTransaction::try_new(VersionedMessage::V0(message), &[treasury.as_ref()])
        .map_err(|e| ApiError::Misconfiguration(format!("treasury signing failed: {}", e)))?;

    let signature = state
        .rpc
        .send_and_confirm_transaction(&tx)
        .await
        .map_err(|e| rpc_err(format!("claim submission failed: {}", e)))?;

    tracing::info!(pool = %pool, %deployer, %signature, "fees claimed and split");
    Ok(Json(json!({ "signature": signature.to_string() })))
}

/// Detached ed25519 check over `ClaimFees:<pool>`, signature base58-encoded.
fn verify_claim_signature(
    signature: &str,
    pool: &str,
    deployer: &Pubkey,
) -> Result<(), ApiError> {
    let sig = Signature::from_str(signature).map_err(|_| ApiError::SignatureVerification)?;
    let message = format!("ClaimFees:{}", pool);
    if !sig.verify(deployer.as_ref(), message.as_bytes()) {
        return Err(ApiError::SignatureVerification);
    }
    Ok(())
}

async fn lookup(store: &dyn KvStore, key: &str, field: &str) -> Result<Option<String>, ApiError> {
    store
        .hget(key, field)
        .await
        .map_err(|reason| ApiError::Upstream {
            dependency: "store",
            reason,
        })
}

async fn vault_balance(rpc: &RpcClient, vault: &Pubkey) -> Result<u64, ApiError> {
    let balance = rpc
        .get_token_account_balance(vault)
        .await
        .map_err(|e| rpc_err(format!("vault balance query failed: {}", e)))?;
    balance
        .amount
        .parse::<u64>()
        .map_err(|e| rpc_err(format!("unparseable vault balance: {}", e)))
}

// ── GET /version ────────────────────────────────────────────────────────────

async fn version() -> Json<Value> {
    Json(json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

// ── Helpers ─────────────────────────────────────────────────────────────────

fn parse_body<T: serde::de::DeserializeOwned>(body: &[u8]) -> Result<T, ApiError> {
    serde_json::from_slice(body)
        .map_err(|e| ApiError::Validation(format!("invalid request body: {}", e)))
}

fn epoch_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

fn rpc_err(reason: String) -> ApiError {
    ApiError::Upstream {
        dependency: "rpc",
        reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CONFIG_INDEX_COUNTER_KEY;
    use crate::registry::token_key;
    use crate::store::memory::MemoryStore;
    use solana_sdk::signature::Keypair;

    fn test_state(store: Arc<MemoryStore>) -> AppState {
        let config = Arc::new(AppConfig {
            bind_addr: "127.0.0.1:0".to_string(),
            rpc_url: "http://127.0.0.1:0".to_string(),
            redis_url: "redis://127.0.0.1:0".to_string(),
            metadata_upload_url: "http://127.0.0.1:0".to_string(),
            treasury_keypair: None,
            min_deposit_sol: 0.01,
            default_initial_price: 0.00001,
        });
        let rpc = Arc::new(RpcClient::new(config.rpc_url.clone()));
        let kv: Arc<dyn KvStore> = store;
        AppState {
            publisher: MetadataPublisher::new(config.metadata_upload_url.clone()),
            allocator: SequenceAllocator::new(kv.clone(), CONFIG_INDEX_COUNTER_KEY),
            assembler: TransactionAssembler::new(rpc.clone()),
            registry: PoolRegistryWriter::new(kv.clone()),
            recorder: LaunchRecorder::new(kv.clone()),
            store: kv,
            config,
            rpc,
        }
    }

    fn launch_body(ticker: &str, wallet: &str) -> Vec<u8> {
        serde_json::to_vec(&json!({
            "walletAddress": wallet,
            "token": {
                "name": "Test Token",
                "ticker": ticker,
                "description": "a token",
                "imageUrl": "data:image/png;base64,AAAA",
            },
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn reserved_ticker_is_rejected_before_any_side_effect() {
        let store = Arc::new(MemoryStore::new());
        let state = test_state(store.clone());
        let wallet = Pubkey::new_unique().to_string();

        for ticker in ["SOL", "usdc", "Usdt", "tknz"] {
            let err = handle_create_launch(&state, &launch_body(ticker, &wallet))
                .await
                .unwrap_err();
            assert!(matches!(err, ApiError::Validation(_)), "ticker {}", ticker);
        }

        // No index was burned: the next allocation is still the first.
        let slot = state.allocator.allocate().await.unwrap();
        assert_eq!(slot.index, 1);
    }

    #[tokio::test]
    async fn malformed_wallet_is_a_validation_error() {
        let state = test_state(Arc::new(MemoryStore::new()));
        let err = handle_create_launch(&state, &launch_body("GOOD", "not-a-pubkey"))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }

    #[tokio::test]
    async fn malformed_json_is_a_validation_error() {
        let state = test_state(Arc::new(MemoryStore::new()));
        let err = handle_create_launch(&state, b"{not json")
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }

    #[tokio::test]
    async fn excessive_decimals_are_rejected() {
        let state = test_state(Arc::new(MemoryStore::new()));
        let wallet = Pubkey::new_unique().to_string();
        let body = serde_json::to_vec(&json!({
            "walletAddress": wallet,
            "token": {
                "name": "Test", "ticker": "GOOD",
                "description": "d", "imageUrl": "data:image/png;base64,AAAA",
            },
            "decimals": 19,
        }))
        .unwrap();
        let err = handle_create_launch(&state, &body).await.unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }

    #[tokio::test]
    async fn confirm_requires_a_well_formed_mint() {
        let state = test_state(Arc::new(MemoryStore::new()));

        let err = handle_confirm_launch(&state, br#"{"name":"x"}"#)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));

        let err = handle_confirm_launch(&state, br#"{"mint":"nope"}"#)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }

    #[tokio::test]
    async fn confirm_records_and_reports_the_timestamp() {
        let store = Arc::new(MemoryStore::new());
        let state = test_state(store.clone());
        let mint = Pubkey::new_unique().to_string();
        let body = serde_json::to_vec(&json!({ "mint": mint, "name": "Test" })).unwrap();

        let resp = handle_confirm_launch(&state, &body).await.unwrap();
        assert_eq!(resp["success"], json!(true));
        assert!(resp["createdAt"].as_i64().unwrap() > 0);
        assert!(store.hash_len(&token_key(&mint)) >= 2);
    }

    #[test]
    fn claim_signature_verifies_against_the_deployer_key() {
        let deployer = Keypair::new();
        let pool = Pubkey::new_unique().to_string();
        let message = format!("ClaimFees:{}", pool);
        let sig = deployer.sign_message(message.as_bytes());

        assert!(
            verify_claim_signature(&sig.to_string(), &pool, &deployer.pubkey()).is_ok()
        );

        // Wrong key
        let other = Keypair::new();
        assert!(matches!(
            verify_claim_signature(&sig.to_string(), &pool, &other.pubkey()),
            Err(ApiError::SignatureVerification)
        ));

        // Wrong pool
        let other_pool = Pubkey::new_unique().to_string();
        assert!(matches!(
            verify_claim_signature(&sig.to_string(), &other_pool, &deployer.pubkey()),
            Err(ApiError::SignatureVerification)
        ));

        // Not base58
        assert!(matches!(
            verify_claim_signature("!!!", &pool, &deployer.pubkey()),
            Err(ApiError::SignatureVerification)
        ));
    }
}
