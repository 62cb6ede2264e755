//! CP-AMM instruction builder — position fee claiming for the fee-split flow.
//!
//! Anchor program; only `claim_position_fee` is needed here. The claim pulls
//! both sides' accrued fees into the position owner's token accounts; the
//! caller splits them afterwards with plain token/system transfers.

use solana_program::{
    instruction::{AccountMeta, Instruction},
    pubkey::Pubkey,
};

use crate::anchor_discriminator;
use crate::constants::*;

// ── PDA Helpers ─────────────────────────────────────────────────────────────

pub fn derive_pool_authority() -> (Pubkey, u8) {
    Pubkey::find_program_address(&[POOL_AUTHORITY_SEED], &DAMM_PROGRAM_ID)
}

pub fn derive_position_address(pool: &Pubkey, position_nft_mint: &Pubkey) -> Pubkey {
    Pubkey::find_program_address(
        &[POSITION_SEED, pool.as_ref(), position_nft_mint.as_ref()],
        &DAMM_PROGRAM_ID,
    )
    .0
}

pub fn derive_position_nft_account(position_nft_mint: &Pubkey) -> Pubkey {
    Pubkey::find_program_address(
        &[POSITION_NFT_ACCOUNT_SEED, position_nft_mint.as_ref()],
        &DAMM_PROGRAM_ID,
    )
    .0
}

pub fn derive_token_vault(mint: &Pubkey, pool: &Pubkey) -> Pubkey {
    Pubkey::find_program_address(
        &[TOKEN_VAULT_SEED, mint.as_ref(), pool.as_ref()],
        &DAMM_PROGRAM_ID,
    )
    .0
}

// ── Instruction Builders ────────────────────────────────────────────────────

/// Claim all accrued position fees into the owner's token accounts.
///
/// Accounts:
///   0. `[]` pool_authority PDA
///   1. `[]` pool
///   2. `[writable]` position PDA
///   3. `[]` position_nft_account PDA
///   4. `[signer]` owner
///   5. `[writable]` token_a_account (owner's)
///   6. `[writable]` token_b_account (owner's)
///   7. `[writable]` token_a_vault PDA
///   8. `[writable]` token_b_vault PDA
///   9. `[]` token_a_mint
///  10. `[]` token_b_mint
///  11. `[]` token_a_program
///  12. `[]` token_b_program
#[allow(clippy::too_many_arguments)]
pub fn claim_position_fee(
    pool: &Pubkey,
    position_nft_mint: &Pubkey,
    owner: &Pubkey,
    token_a_account: &Pubkey,
    token_b_account: &Pubkey,
    token_a_mint: &Pubkey,
    token_b_mint: &Pubkey,
) -> Instruction {
    let (pool_authority, _) = derive_pool_authority();
    let position = derive_position_address(pool, position_nft_mint);
    let position_nft_account = derive_position_nft_account(position_nft_mint);
    let token_a_vault = derive_token_vault(token_a_mint, pool);
    let token_b_vault = derive_token_vault(token_b_mint, pool);

    let data = anchor_discriminator("claim_position_fee").to_vec();

    Instruction {
        program_id: DAMM_PROGRAM_ID,
        accounts: vec![
            AccountMeta::new_readonly(pool_authority, false),
            AccountMeta::new_readonly(*pool, false),
            AccountMeta::new(position, false),
            AccountMeta::new_readonly(position_nft_account, false),
            AccountMeta::new_readonly(*owner, true),
            AccountMeta::new(*token_a_account, false),
            AccountMeta::new(*token_b_account, false),
            AccountMeta::new(token_a_vault, false),
            AccountMeta::new(token_b_vault, false),
            AccountMeta::new_readonly(*token_a_mint, false),
            AccountMeta::new_readonly(*token_b_mint, false),
            AccountMeta::new_readonly(spl_token::id(), false),
            AccountMeta::new_readonly(spl_token::id(), false),
        ],
        data,
    }
}
