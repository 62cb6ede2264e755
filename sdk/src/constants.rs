//! Program IDs, PDA seeds, and fixed launch parameters.

use solana_program::pubkey::Pubkey;

// ── Program IDs ─────────────────────────────────────────────────────────────

/// Metaplex Token Metadata program.
pub const TOKEN_METADATA_PROGRAM_ID: Pubkey =
    solana_program::pubkey!("metaqbxxUerdq28cj1RbAWkYQm3ybzjb6a8bt518x1s");

/// Dynamic Bonding Curve program — config + virtual pool + swaps.
pub const DBC_PROGRAM_ID: Pubkey =
    solana_program::pubkey!("dbcij3LWUppWqq96dh6gJWwBifmcGfLSB5D4DuSMaqN");

/// Constant-product AMM program — holds migrated liquidity positions; the
/// fee-claim flow collects position fees from it.
pub const DAMM_PROGRAM_ID: Pubkey =
    solana_program::pubkey!("cpamdpZCGKUy5JxQXB4dcpGPiikHawvSWAd6mEn1sGG");

// ── PDA Seeds ───────────────────────────────────────────────────────────────

// Token Metadata
pub const METADATA_SEED: &[u8] = b"metadata";

// Dynamic Bonding Curve
pub const CONFIG_SEED: &[u8] = b"config";
pub const POOL_SEED: &[u8] = b"pool";
pub const POOL_AUTHORITY_SEED: &[u8] = b"pool_authority";
pub const TOKEN_VAULT_SEED: &[u8] = b"token_vault";

// CP-AMM
pub const POSITION_SEED: &[u8] = b"position";
pub const POSITION_NFT_ACCOUNT_SEED: &[u8] = b"position_nft_account";

// ── Transport Limits ────────────────────────────────────────────────────────

/// Hard per-transaction serialized-size ceiling (IPv6 MTU minus headers).
pub const MAX_TRANSACTION_SIZE: usize = 1232;

// ── Launch Defaults ─────────────────────────────────────────────────────────

/// Maximum representable sqrt price for a curve segment (Q64.64 upper bound
/// used by the bonding-curve program).
pub const MAX_SQRT_PRICE: u128 = 79_226_673_521_066_979_257_578_248_091;

/// On-chain metadata field limits enforced by Token Metadata.
pub const MAX_NAME_LEN: usize = 32;
pub const MAX_SYMBOL_LEN: usize = 10;
