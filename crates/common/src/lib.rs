//! Shared primitives for the storage synchronization engine: Ethereum
//! base types, RLP codecs for accounts and block headers, ABI calldata
//! encoding, and Merkle-Patricia proof walking.

pub mod calldata;
pub mod constants;
pub mod serde_utils;
pub mod trie;
pub mod types;

pub use ethereum_types::{Address, Bloom, H64, H256, U64, U256};

use keccak_hash::keccak as keccak_raw;

/// Keccak-256 of arbitrary bytes.
pub fn keccak<T: AsRef<[u8]>>(data: T) -> H256 {
    keccak_raw(data.as_ref())
}

/// Left-pad a big-endian integer to a full 32-byte storage word.
pub fn pad32(value: U256) -> H256 {
    H256(value.to_big_endian())
}

/// Interpret a 32-byte storage word as a big-endian integer.
pub fn word_to_u256(word: H256) -> U256 {
    U256::from_big_endian(word.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pad32_round_trips() {
        let v = U256::from(0x2a);
        let word = pad32(v);
        assert_eq!(word.as_bytes()[31], 0x2a);
        assert_eq!(word_to_u256(word), v);
    }

    #[test]
    fn keccak_empty_matches_known_constant() {
        assert_eq!(keccak([]), constants::EMPTY_KECCAK_HASH);
    }
}
