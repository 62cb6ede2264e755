//! Dynamic Bonding Curve instruction builders — sequenced config accounts,
//! virtual pool creation, and swaps against the curve.
//!
//! Anchor program: discriminators are the first 8 bytes of
//! `sha256("global:<instruction_name>")`.
//!
//! Instructions:
//!   create_config
//!   initialize_virtual_pool_with_spl_token
//!   swap

use borsh::BorshSerialize;
use solana_program::{
    instruction::{AccountMeta, Instruction},
    pubkey::Pubkey,
    system_program,
};

use crate::anchor_discriminator;
use crate::constants::*;

// ── Param Structs (exact borsh match to the program) ────────────────────────

/// Base/dynamic fee schedule in basis points.
#[derive(BorshSerialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct PoolFeeParameters {
    pub base_fee_bps: u16,
    pub dynamic_fee_bps: u16,
}

/// One liquidity curve segment: constant liquidity up to `sqrt_price`.
#[derive(BorshSerialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct LiquidityPoint {
    pub sqrt_price: u128,
    pub liquidity: u128,
}

/// Full curve configuration written into the sequenced config account.
/// Segments must be strictly increasing in `sqrt_price` and the starting
/// sqrt price must not exceed the first segment bound; the builder on the
/// server side enforces both before this ever reaches the wire.
#[derive(BorshSerialize, Clone, Debug, PartialEq, Eq)]
pub struct ConfigParameters {
    pub pool_fees: PoolFeeParameters,
    pub collect_fee_mode: u8,
    pub activation_type: u8,
    pub activation_value: u64,
    pub migration_quote_threshold: u64,
    pub migration_option: u8,
    pub partner_lp_percentage: u8,
    pub partner_locked_lp_percentage: u8,
    pub creator_lp_percentage: u8,
    pub creator_locked_lp_percentage: u8,
    pub migration_fee_option: u8,
    pub token_type: u8,
    pub token_decimal: u8,
    pub sqrt_start_price: u128,
    pub curve: Vec<LiquidityPoint>,
}

#[derive(BorshSerialize)]
struct InitializePoolParameters {
    name: String,
    symbol: String,
    uri: String,
}

#[derive(BorshSerialize)]
struct SwapParameters {
    amount_in: u64,
    minimum_amount_out: u64,
}

// ── PDA Helpers ─────────────────────────────────────────────────────────────

/// Config account for a sequence-allocator index: `["config", index_le]`.
pub fn derive_config_address(index: u64) -> (Pubkey, u8) {
    Pubkey::find_program_address(&[CONFIG_SEED, &index.to_le_bytes()], &DBC_PROGRAM_ID)
}

/// Pool account for a (quote, base, config) triple. The two mints are
/// ordered by raw bytes, larger first, so either argument order derives the
/// same address.
pub fn derive_pool_address(quote_mint: &Pubkey, base_mint: &Pubkey, config: &Pubkey) -> Pubkey {
    let (first, second) = if quote_mint.to_bytes() > base_mint.to_bytes() {
        (quote_mint, base_mint)
    } else {
        (base_mint, quote_mint)
    };
    Pubkey::find_program_address(
        &[POOL_SEED, config.as_ref(), first.as_ref(), second.as_ref()],
        &DBC_PROGRAM_ID,
    )
    .0
}

pub fn derive_pool_authority() -> (Pubkey, u8) {
    Pubkey::find_program_address(&[POOL_AUTHORITY_SEED], &DBC_PROGRAM_ID)
}

pub fn derive_token_vault(mint: &Pubkey, pool: &Pubkey) -> Pubkey {
    Pubkey::find_program_address(
        &[TOKEN_VAULT_SEED, mint.as_ref(), pool.as_ref()],
        &DBC_PROGRAM_ID,
    )
    .0
}

// ── Instruction Builders ────────────────────────────────────────────────────

/// Create a sequenced curve-config account.
///
/// Accounts:
///   0. `[writable]` config PDA (seeds: ["config", index_le])
///   1. `[]` fee_claimer
///   2. `[]` leftover_receiver
///   3. `[]` quote_mint
///   4. `[signer, writable]` payer
///   5. `[]` system_program
pub fn create_config(
    config: &Pubkey,
    fee_claimer: &Pubkey,
    leftover_receiver: &Pubkey,
    quote_mint: &Pubkey,
    payer: &Pubkey,
    params: &ConfigParameters,
) -> Instruction {
    let mut data = anchor_discriminator("create_config").to_vec();
    params.serialize(&mut data).unwrap();

    Instruction {
        program_id: DBC_PROGRAM_ID,
        accounts: vec![
            AccountMeta::new(*config, false),
            AccountMeta::new_readonly(*fee_claimer, false),
            AccountMeta::new_readonly(*leftover_receiver, false),
            AccountMeta::new_readonly(*quote_mint, false),
            AccountMeta::new(*payer, true),
            AccountMeta::new_readonly(system_program::id(), false),
        ],
        data,
    }
}

/// Create the virtual pool for `base_mint` against an existing config.
///
/// Accounts:
///   0. `[]` config PDA
///   1. `[]` pool_authority PDA
///   2. `[]` creator
///   3. `[writable]` base_mint
///   4. `[]` quote_mint
///   5. `[writable]` pool PDA
///   6. `[writable]` base_vault PDA
///   7. `[writable]` quote_vault PDA
///   8. `[signer, writable]` payer
///   9. `[]` token_program
///  10. `[]` system_program
#[allow(clippy::too_many_arguments)]
pub fn initialize_virtual_pool_with_spl_token(
    config: &Pubkey,
    creator: &Pubkey,
    base_mint: &Pubkey,
    quote_mint: &Pubkey,
    payer: &Pubkey,
    name: &str,
    symbol: &str,
    uri: &str,
) -> Instruction {
    let (pool_authority, _) = derive_pool_authority();
    let pool = derive_pool_address(quote_mint, base_mint, config);
    let base_vault = derive_token_vault(base_mint, &pool);
    let quote_vault = derive_token_vault(quote_mint, &pool);

    let params = InitializePoolParameters {
        name: name.to_string(),
        symbol: symbol.to_string(),
        uri: uri.to_string(),
    };
    let mut data = anchor_discriminator("initialize_virtual_pool_with_spl_token").to_vec();
    params.serialize(&mut data).unwrap();

    Instruction {
        program_id: DBC_PROGRAM_ID,
        accounts: vec![
            AccountMeta::new_readonly(*config, false),
            AccountMeta::new_readonly(pool_authority, false),
            AccountMeta::new_readonly(*creator, false),
            AccountMeta::new(*base_mint, false),
            AccountMeta::new_readonly(*quote_mint, false),
            AccountMeta::new(pool, false),
            AccountMeta::new(base_vault, false),
            AccountMeta::new(quote_vault, false),
            AccountMeta::new(*payer, true),
            AccountMeta::new_readonly(spl_token::id(), false),
            AccountMeta::new_readonly(system_program::id(), false),
        ],
        data,
    }
}

/// Swap quote for base against the curve (the launch's initial buy).
///
/// Accounts:
///   0. `[]` pool_authority PDA
///   1. `[]` config PDA
///   2. `[writable]` pool PDA
///   3. `[writable]` input_token_account (payer's quote account)
///   4. `[writable]` output_token_account (payer's base account)
///   5. `[writable]` base_vault PDA
///   6. `[writable]` quote_vault PDA
///   7. `[]` base_mint
///   8. `[]` quote_mint
///   9. `[signer]` payer
///  10. `[]` token_program
#[allow(clippy::too_many_arguments)]
pub fn swap(
    config: &Pubkey,
    pool: &Pubkey,
    base_mint: &Pubkey,
    quote_mint: &Pubkey,
    input_token_account: &Pubkey,
    output_token_account: &Pubkey,
    payer: &Pubkey,
    amount_in: u64,
    minimum_amount_out: u64,
) -> Instruction {
    let (pool_authority, _) = derive_pool_authority();
    let base_vault = derive_token_vault(base_mint, pool);
    let quote_vault = derive_token_vault(quote_mint, pool);

    let params = SwapParameters {
        amount_in,
        minimum_amount_out,
    };
    let mut data = anchor_discriminator("swap").to_vec();
    params.serialize(&mut data).unwrap();

    Instruction {
        program_id: DBC_PROGRAM_ID,
        accounts: vec![
            AccountMeta::new_readonly(pool_authority, false),
            AccountMeta::new_readonly(*config, false),
            AccountMeta::new(*pool, false),
            AccountMeta::new(*input_token_account, false),
            AccountMeta::new(*output_token_account, false),
            AccountMeta::new(base_vault, false),
            AccountMeta::new(quote_vault, false),
            AccountMeta::new_readonly(*base_mint, false),
            AccountMeta::new_readonly(*quote_mint, false),
            AccountMeta::new_readonly(*payer, true),
            AccountMeta::new_readonly(spl_token::id(), false),
        ],
        data,
    }
}
