//! Small, self-contained primitives the engine needs at exact byte/field
//! granularity (account checksum, bundle identity hashes). The heavier
//! per-chain cryptography (BIP32/39 derivation, secp256k1, ed25519) stays
//! an external collaborator per spec §1 and lives in `account.rs` behind
//! the chain-specific sub-account constructors.

use md5::Digest as _;
use sha2::{Digest, Sha256};

/// 16-bit running-sum checksum over bytes modulo 255 (GLOSSARY: Fletcher-16).
/// Matches `checksumFletcher16` in the original C implementation bit for
/// bit: two accumulators, each reduced mod 255 every byte.
pub fn fletcher16(data: &[u8]) -> u16 {
    let mut sum1: u16 = 0;
    let mut sum2: u16 = 0;
    for &byte in data {
        sum1 = (sum1 + byte as u16) % 255;
        sum2 = (sum2 + sum1) % 255;
    }
    (sum2 << 8) | sum1
}

/// The account's file-system identifier: the first 32 hex characters of
/// `SHA256(SHA256(btc_master_public_key_bytes))` (spec §4.3).
pub fn account_fs_identifier(btc_mpk_bytes: &[u8]) -> String {
    let first = Sha256::digest(btc_mpk_bytes);
    let second = Sha256::digest(first);
    hex::encode(second)[..32].to_string()
}

/// MD5 over a transaction bundle's serialization, used as its identity
/// (spec §3, §4.7). MD5 is kept solely for this legacy identity digest --
/// it is not used anywhere auth- or integrity-sensitive.
pub fn md5_hex(data: &[u8]) -> String {
    let digest = md5::Md5::digest(data);
    hex::encode(digest)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fletcher16_known_vector() {
        // "abcde" -> widely quoted Fletcher-16 test vector.
        assert_eq!(fletcher16(b"abcde"), 0xC8F0);
    }

    #[test]
    fn fletcher16_empty() {
        assert_eq!(fletcher16(b""), 0);
    }
}
