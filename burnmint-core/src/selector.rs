//! Deterministic media selection from a transaction hash.
//!
//! The external verifier re-derives the selection on its side, so this
//! arithmetic is frozen: last 8 hex digits, parsed as `u32`, `mod N`, plus one.

use crate::error::{BurnProofError, Result};

/// Number of trailing hex digits read from the hash.
pub const SELECTOR_SUFFIX_LEN: usize = 8;

/// Map a transaction hash onto a media id in `1..=catalog_size`.
pub fn select(tx_hash: &str, catalog_size: u32) -> Result<u32> {
    if catalog_size == 0 {
        return Err(BurnProofError::InvalidCatalogSize);
    }
    let suffix = hash_suffix(tx_hash)?;
    let h = u32::from_str_radix(suffix, 16)
        .map_err(|_| BurnProofError::InvalidTransactionHash(tx_hash.to_string()))?;
    Ok(h % catalog_size + 1)
}

fn hash_suffix(tx_hash: &str) -> Result<&str> {
    let invalid = || BurnProofError::InvalidTransactionHash(tx_hash.to_string());
    if !tx_hash.is_ascii() || tx_hash.len() < SELECTOR_SUFFIX_LEN {
        return Err(invalid());
    }
    let suffix = &tx_hash[tx_hash.len() - SELECTOR_SUFFIX_LEN..];
    // from_str_radix tolerates a leading '+', which is not a hex digit.
    if !suffix.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(invalid());
    }
    Ok(suffix)
}
