//! Transaction assembler: turns a validated launch into an ordered list of
//! partially-signed, size-bounded transaction envelopes.
//!
//! The pipeline is Draft (operations collected) → Grouped (packed under the
//! byte ceiling) → Signed (server-held keys applied) → Serialized (base64).
//! Operation construction is pure so the ordering and packing rules are
//! testable without a network; only rent, blockhashes, and nothing else come
//! from RPC.

use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD as BASE64_STANDARD, Engine};
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_program::program_pack::Pack;
use solana_sdk::{
    hash::Hash,
    instruction::Instruction,
    message::{v0, VersionedMessage},
    pubkey::Pubkey,
    signature::{Keypair, Signature},
    signer::Signer,
    system_instruction,
    transaction::VersionedTransaction,
};
use spl_associated_token_account::{
    get_associated_token_address, instruction::create_associated_token_account_idempotent,
};
use tknz_sdk::constants::MAX_TRANSACTION_SIZE;
use tknz_sdk::{dbc, metadata};

use crate::curve::CurveBuild;
use crate::error::ApiError;

/// One on-chain operation plus any server-held keypairs whose signature the
/// containing envelope will need.
#[derive(Clone)]
pub struct Operation {
    pub instruction: Instruction,
    pub signers: Vec<Arc<Keypair>>,
}

impl Operation {
    fn plain(instruction: Instruction) -> Self {
        Self {
            instruction,
            signers: Vec::new(),
        }
    }

    fn with_signer(instruction: Instruction, signer: Arc<Keypair>) -> Self {
        Self {
            instruction,
            signers: vec![signer],
        }
    }
}

/// Resolved inputs for one launch. Everything here is already validated.
pub struct AssemblyInputs {
    pub payer: Pubkey,
    pub name: String,
    pub symbol: String,
    pub metadata_uri: String,
    pub decimals: u8,
    pub initial_supply_ui: u64,
    pub config_address: Pubkey,
    /// Pool creator / fee custodian (treasury when configured, else payer).
    pub pool_creator: Pubkey,
    /// Existing mint to reuse; suppresses the mint-creation envelope.
    pub mint_override: Option<Pubkey>,
    /// Existing pool to reuse; suppresses pool derivation.
    pub pool_override: Option<Pubkey>,
    /// Caller explicitly asked for a zero deposit: create the pool, skip the
    /// initial buy.
    pub skip_initial_buy: bool,
}

pub struct AssembledLaunch {
    /// Base64-serialized envelopes, in submission order.
    pub transactions: Vec<String>,
    pub mint: Pubkey,
    pub ata: Pubkey,
    pub pool: Pubkey,
    pub initial_supply_raw: u128,
}

// ── Operation construction (pure) ───────────────────────────────────────────

pub struct LaunchOperations {
    /// First envelope: mint account creation; needs the mint keypair's
    /// co-signature, so it is never packed with anything else.
    pub mint_ops: Vec<Operation>,
    /// Second stream: metadata, config, pool, initial buy — packed greedily.
    pub pool_ops: Vec<Operation>,
    pub mint: Pubkey,
    pub ata: Pubkey,
    pub pool: Pubkey,
    pub initial_supply_raw: u128,
}

/// Build the full ordered operation list. `rent_lamports` is the
/// rent-exemption minimum for a mint account, fetched by the caller.
pub fn build_operations(
    inputs: &AssemblyInputs,
    curve: &CurveBuild,
    rent_lamports: u64,
) -> Result<LaunchOperations, ApiError> {
    let quote_mint = spl_token::native_mint::id();

    // Override short-circuits key generation; well-formedness was validated
    // at the boundary. Ownership of the reused address is NOT verified.
    let (mint, mint_keypair) = match inputs.mint_override {
        Some(existing) => (existing, None),
        None => {
            let kp = Arc::new(Keypair::new());
            (kp.pubkey(), Some(kp))
        }
    };
    let ata = get_associated_token_address(&inputs.payer, &mint);

    let multiplier = 10u128
        .checked_pow(inputs.decimals as u32)
        .ok_or_else(|| ApiError::Validation("decimals out of range".to_string()))?;
    let initial_supply_raw = (inputs.initial_supply_ui as u128)
        .checked_mul(multiplier)
        .ok_or_else(|| {
            ApiError::Validation("initialSupply overflows at the requested decimals".to_string())
        })?;
    let total_mint_raw = initial_supply_raw
        .checked_add(curve.pool_supply_raw)
        .filter(|t| *t <= u64::MAX as u128)
        .ok_or_else(|| {
            ApiError::Validation(
                "initialSupply plus pool supply exceeds the mintable range".to_string(),
            )
        })? as u64;

    let mut mint_ops = Vec::new();
    if let Some(kp) = &mint_keypair {
        mint_ops.push(Operation::with_signer(
            system_instruction::create_account(
                &inputs.payer,
                &mint,
                rent_lamports,
                spl_token::state::Mint::LEN as u64,
                &spl_token::id(),
            ),
            kp.clone(),
        ));
        mint_ops.push(Operation::plain(
            spl_token::instruction::initialize_mint2(
                &spl_token::id(),
                &mint,
                &inputs.payer,
                None,
                inputs.decimals,
            )
            .map_err(|e| ApiError::Validation(format!("invalid mint parameters: {}", e)))?,
        ));
        mint_ops.push(Operation::plain(create_associated_token_account_idempotent(
            &inputs.payer,
            &inputs.payer,
            &mint,
            &spl_token::id(),
        )));
        // Zero total supply is legal; the mint-to is simply omitted.
        if total_mint_raw > 0 {
            mint_ops.push(Operation::plain(
                spl_token::instruction::mint_to(
                    &spl_token::id(),
                    &mint,
                    &ata,
                    &inputs.payer,
                    &[],
                    total_mint_raw,
                )
                .map_err(|e| ApiError::Validation(format!("invalid mint amount: {}", e)))?,
            ));
        }
    }

    let pool = match inputs.pool_override {
        Some(existing) => existing,
        None => dbc::derive_pool_address(&quote_mint, &mint, &inputs.config_address),
    };

    let mut pool_ops = Vec::new();
    if mint_keypair.is_some() {
        pool_ops.push(Operation::plain(metadata::create_metadata_account_v3(
            &mint,
            &inputs.payer,
            &inputs.payer,
            &inputs.payer,
            &inputs.name,
            &inputs.symbol,
            &inputs.metadata_uri,
        )));
    }
    pool_ops.push(Operation::plain(dbc::create_config(
        &inputs.config_address,
        &curve.fee_claimer,
        &curve.leftover_receiver,
        &quote_mint,
        &inputs.payer,
        &curve.params,
    )));
    pool_ops.push(Operation::plain(dbc::initialize_virtual_pool_with_spl_token(
        &inputs.config_address,
        &inputs.pool_creator,
        &mint,
        &quote_mint,
        &inputs.payer,
        &inputs.name,
        &inputs.symbol,
        &inputs.metadata_uri,
    )));
    if !inputs.skip_initial_buy && curve.deposit_lamports > 0 {
        let quote_ata = get_associated_token_address(&inputs.payer, &quote_mint);
        pool_ops.push(Operation::plain(dbc::swap(
            &inputs.config_address,
            &pool,
            &mint,
            &quote_mint,
            &quote_ata,
            &ata,
            &inputs.payer,
            curve.deposit_lamports,
            0,
        )));
    }

    Ok(LaunchOperations {
        mint_ops,
        pool_ops,
        mint,
        ata,
        pool,
        initial_supply_raw,
    })
}

// ── Packing ─────────────────────────────────────────────────────────────────

/// Greedy first-fit packer: append operations in order, seal the current bin
/// as soon as the next operation would push the estimate over `ceiling`, and
/// start a new bin with that operation. Operations are never split or
/// reordered; every input operation lands in exactly one bin.
pub fn pack_operations<T, E>(ops: Vec<T>, estimate: E, ceiling: usize) -> Result<Vec<Vec<T>>, ApiError>
where
    E: Fn(&[T]) -> Result<usize, ApiError>,
{
    let mut bins: Vec<Vec<T>> = Vec::new();
    let mut current: Vec<T> = Vec::new();

    for op in ops {
        current.push(op);
        let size = estimate(&current)?;
        if size > ceiling {
            let overflow = current.pop().filter(|_| !current.is_empty()).ok_or_else(|| {
                ApiError::Validation(
                    "a single operation exceeds the transaction size ceiling".to_string(),
                )
            })?;
            bins.push(std::mem::take(&mut current));
            current.push(overflow);
            if estimate(&current)? > ceiling {
                return Err(ApiError::Validation(
                    "a single operation exceeds the transaction size ceiling".to_string(),
                ));
            }
        }
    }
    if !current.is_empty() {
        bins.push(current);
    }
    Ok(bins)
}

/// Serialized size of the envelope a set of operations would compile into,
/// with a placeholder blockhash and empty signature slots. The placeholder
/// does not change the size: the blockhash field is fixed-width.
pub fn estimate_envelope_size(payer: &Pubkey, ops: &[Operation]) -> Result<usize, ApiError> {
    let instructions: Vec<Instruction> =
        ops.iter().map(|op| op.instruction.clone()).collect();
    let message = v0::Message::try_compile(payer, &instructions, &[], Hash::default())
        .map_err(|e| ApiError::Validation(format!("message compilation failed: {}", e)))?;
    let tx = unsigned_transaction(message);
    bincode::serialize(&tx)
        .map(|bytes| bytes.len())
        .map_err(|e| ApiError::Validation(format!("serialization failed: {}", e)))
}

fn unsigned_transaction(message: v0::Message) -> VersionedTransaction {
    let required = message.header.num_required_signatures as usize;
    VersionedTransaction {
        signatures: vec![Signature::default(); required],
        message: VersionedMessage::V0(message),
    }
}

/// Sign the message with every held keypair that appears among the required
/// signers, leaving the remaining slots (the client's) empty.
fn partially_sign(
    message: v0::Message,
    keypairs: &[Arc<Keypair>],
) -> VersionedTransaction {
    let mut tx = unsigned_transaction(message);
    let serialized = tx.message.serialize();
    let required = tx.signatures.len();
    let static_keys = tx.message.static_account_keys();
    for kp in keypairs {
        if let Some(pos) = static_keys
            .iter()
            .take(required)
            .position(|k| *k == kp.pubkey())
        {
            tx.signatures[pos] = kp.sign_message(&serialized);
        }
    }
    tx
}

// ── Assembly ────────────────────────────────────────────────────────────────

pub struct TransactionAssembler {
    rpc: Arc<RpcClient>,
}

impl TransactionAssembler {
    pub fn new(rpc: Arc<RpcClient>) -> Self {
        Self { rpc }
    }

    /// Build, group, co-sign, and serialize every envelope for the launch.
    /// Any upstream failure aborts the whole assembly: partial envelope
    /// lists are never returned.
    pub async fn assemble(
        &self,
        inputs: &AssemblyInputs,
        curve: &CurveBuild,
    ) -> Result<AssembledLaunch, ApiError> {
        let rent_lamports = if inputs.mint_override.is_none() {
            self.rpc
                .get_minimum_balance_for_rent_exemption(spl_token::state::Mint::LEN)
                .await
                .map_err(|e| rpc_err(format!("rent exemption query failed: {}", e)))?
        } else {
            0
        };

        let ops = build_operations(inputs, curve, rent_lamports)?;

        // Group: the mint envelope stands alone (fresh-key co-signature);
        // the second stream is packed under the byte ceiling.
        let payer = inputs.payer;
        let mut envelopes: Vec<Vec<Operation>> = Vec::new();
        if !ops.mint_ops.is_empty() {
            if estimate_envelope_size(&payer, &ops.mint_ops)? > MAX_TRANSACTION_SIZE {
                return Err(ApiError::Validation(
                    "mint creation envelope exceeds the transaction size ceiling".to_string(),
                ));
            }
            envelopes.push(ops.mint_ops);
        }
        envelopes.extend(pack_operations(
            ops.pool_ops,
            |candidate| estimate_envelope_size(&payer, candidate),
            MAX_TRANSACTION_SIZE,
        )?);

        // Sign + serialize. Each envelope gets its own blockhash: envelopes
        // may be submitted at different times.
        let mut transactions = Vec::with_capacity(envelopes.len());
        for envelope in &envelopes {
            let blockhash = self
                .rpc
                .get_latest_blockhash()
                .await
                .map_err(|e| rpc_err(format!("blockhash fetch failed: {}", e)))?;
            let instructions: Vec<Instruction> =
                envelope.iter().map(|op| op.instruction.clone()).collect();
            let message = v0::Message::try_compile(&payer, &instructions, &[], blockhash)
                .map_err(|e| ApiError::Validation(format!("message compilation failed: {}", e)))?;
            let signers: Vec<Arc<Keypair>> = envelope
                .iter()
                .flat_map(|op| op.signers.iter().cloned())
                .collect();
            let tx = partially_sign(message, &signers);
            let bytes = bincode::serialize(&tx)
                .map_err(|e| ApiError::Validation(format!("serialization failed: {}", e)))?;
            transactions.push(BASE64_STANDARD.encode(bytes));
        }

        Ok(AssembledLaunch {
            transactions,
            mint: ops.mint,
            ata: ops.ata,
            pool: ops.pool,
            initial_supply_raw: ops.initial_supply_raw,
        })
    }
}

fn rpc_err(reason: String) -> ApiError {
    ApiError::Upstream {
        dependency: "rpc",
        reason,
    }
}
