//! Token Metadata instruction builder — on-chain metadata attachment for a
//! freshly created mint.
//!
//! Only the single instruction the launch pipeline needs is covered:
//!   33 = CreateMetadataAccountV3

use borsh::BorshSerialize;
use solana_program::{
    instruction::{AccountMeta, Instruction},
    pubkey::Pubkey,
    system_program, sysvar,
};

use crate::constants::*;

const IX_CREATE_METADATA_ACCOUNT_V3: u8 = 33;

// ── Param Structs (exact borsh match to the program) ────────────────────────

#[derive(BorshSerialize, Clone)]
pub struct Creator {
    pub address: Pubkey,
    pub verified: bool,
    pub share: u8,
}

#[derive(BorshSerialize, Clone)]
pub struct Collection {
    pub verified: bool,
    pub key: Pubkey,
}

#[derive(BorshSerialize, Clone)]
pub struct Uses {
    pub use_method: u8,
    pub remaining: u64,
    pub total: u64,
}

#[derive(BorshSerialize, Clone)]
pub enum CollectionDetails {
    V1 { size: u64 },
}

/// The `DataV2` payload: display fields plus royalty/collection wiring.
#[derive(BorshSerialize, Clone)]
pub struct DataV2 {
    pub name: String,
    pub symbol: String,
    pub uri: String,
    pub seller_fee_basis_points: u16,
    pub creators: Option<Vec<Creator>>,
    pub collection: Option<Collection>,
    pub uses: Option<Uses>,
}

#[derive(BorshSerialize)]
struct CreateMetadataAccountV3Args {
    data: DataV2,
    is_mutable: bool,
    collection_details: Option<CollectionDetails>,
}

// ── PDA Helpers ─────────────────────────────────────────────────────────────

pub fn find_metadata_account(mint: &Pubkey) -> (Pubkey, u8) {
    Pubkey::find_program_address(
        &[
            METADATA_SEED,
            TOKEN_METADATA_PROGRAM_ID.as_ref(),
            mint.as_ref(),
        ],
        &TOKEN_METADATA_PROGRAM_ID,
    )
}

// ── Instruction Builders ────────────────────────────────────────────────────

/// Create the metadata account for `mint`. Name and symbol are truncated to
/// the program's byte limits.
///
/// Accounts:
///   0. `[writable]` metadata PDA (seeds: ["metadata", program, mint])
///   1. `[]` mint
///   2. `[signer]` mint_authority
///   3. `[signer, writable]` payer
///   4. `[signer]` update_authority
///   5. `[]` system_program
///   6. `[]` rent sysvar
pub fn create_metadata_account_v3(
    mint: &Pubkey,
    mint_authority: &Pubkey,
    payer: &Pubkey,
    update_authority: &Pubkey,
    name: &str,
    symbol: &str,
    uri: &str,
) -> Instruction {
    let (metadata_pda, _) = find_metadata_account(mint);

    let args = CreateMetadataAccountV3Args {
        data: DataV2 {
            name: truncate(name, MAX_NAME_LEN),
            symbol: truncate(symbol, MAX_SYMBOL_LEN),
            uri: uri.to_string(),
            seller_fee_basis_points: 0,
            creators: None,
            collection: None,
            uses: None,
        },
        is_mutable: true,
        collection_details: None,
    };
    let mut data = vec![IX_CREATE_METADATA_ACCOUNT_V3];
    args.serialize(&mut data).unwrap();

    Instruction {
        program_id: TOKEN_METADATA_PROGRAM_ID,
        accounts: vec![
            AccountMeta::new(metadata_pda, false),
            AccountMeta::new_readonly(*mint, false),
            AccountMeta::new_readonly(*mint_authority, true),
            AccountMeta::new(*payer, true),
            AccountMeta::new_readonly(*update_authority, true),
            AccountMeta::new_readonly(system_program::id(), false),
            AccountMeta::new_readonly(sysvar::rent::id(), false),
        ],
        data,
    }
}

// Field limits are enforced on-chain in bytes, not chars.
fn truncate(value: &str, max_bytes: usize) -> String {
    if value.len() <= max_bytes {
        return value.to_string();
    }
    let mut end = max_bytes;
    while !value.is_char_boundary(end) {
        end -= 1;
    }
    value[..end].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metadata_pda_is_deterministic() {
        let mint = Pubkey::new_unique();
        assert_eq!(find_metadata_account(&mint), find_metadata_account(&mint));
    }

    #[test]
    fn name_and_symbol_are_truncated() {
        let mint = Pubkey::new_unique();
        let auth = Pubkey::new_unique();
        let long_name = "x".repeat(64);
        let ix = create_metadata_account_v3(
            &mint,
            &auth,
            &auth,
            &auth,
            &long_name,
            "VERYLONGSYMBOL",
            "ipfs://meta",
        );
        assert_eq!(ix.program_id, TOKEN_METADATA_PROGRAM_ID);
        assert_eq!(ix.data[0], IX_CREATE_METADATA_ACCOUNT_V3);
        // Borsh strings carry a u32 length prefix; the name follows the tag.
        let name_len = u32::from_le_bytes(ix.data[1..5].try_into().unwrap()) as usize;
        assert_eq!(name_len, MAX_NAME_LEN);
    }

    #[test]
    fn truncation_is_byte_bounded_at_char_boundaries() {
        // 2-byte chars: 40 chars = 80 bytes, cut cleanly at 32 bytes.
        let two_byte = truncate(&"é".repeat(40), MAX_NAME_LEN);
        assert_eq!(two_byte.len(), MAX_NAME_LEN);
        assert!(two_byte.chars().all(|c| c == 'é'));

        // 3-byte chars: 32 is not a boundary, so the cut backs off to 30.
        let three_byte = truncate(&"日".repeat(12), MAX_NAME_LEN);
        assert_eq!(three_byte.len(), 30);
        assert!(three_byte.chars().all(|c| c == '日'));

        assert_eq!(truncate("short", MAX_NAME_LEN), "short");
    }

    #[test]
    fn signer_flags_match_the_account_contract() {
        let mint = Pubkey::new_unique();
        let user = Pubkey::new_unique();
        let ix = create_metadata_account_v3(&mint, &user, &user, &user, "Test", "TST", "u");
        assert!(ix.accounts[2].is_signer); // mint authority
        assert!(ix.accounts[3].is_signer && ix.accounts[3].is_writable); // payer
        assert!(ix.accounts[4].is_signer); // update authority
    }
}
