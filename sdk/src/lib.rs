//! TKNZ SDK — instruction builders and constants for the token-launch pipeline.
//!
//! Pure computation only: borsh parameter structs, `AccountMeta` lists, and
//! PDA derivations for the three third-party programs the launch service
//! composes (Token Metadata, the dynamic bonding curve, and the CP-AMM used
//! for fee claiming).

pub mod constants;
pub mod damm;
pub mod dbc;
pub mod metadata;

use sha2::{Digest, Sha256};

/// Anchor instruction discriminator: first 8 bytes of `sha256("global:<name>")`.
pub fn anchor_discriminator(name: &str) -> [u8; 8] {
    let mut hasher = Sha256::new();
    hasher.update(b"global:");
    hasher.update(name.as_bytes());
    let digest = hasher.finalize();
    let mut out = [0u8; 8];
    out.copy_from_slice(&digest[..8]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discriminator_is_stable_and_distinct() {
        let a = anchor_discriminator("create_config");
        let b = anchor_discriminator("swap");
        assert_eq!(a, anchor_discriminator("create_config"));
        assert_ne!(a, b);
    }
}
