use ethereum_types::{H256, U256};
use rlp::RlpStream;

use crate::constants::{EMPTY_KECCAK_HASH, EMPTY_TRIE_HASH};

/// The four-field account record stored in the world-state trie.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountState {
    pub nonce: u64,
    pub balance: U256,
    pub storage_root: H256,
    pub code_hash: H256,
}

impl AccountState {
    /// RLP record `[nonce, balance, storageRoot, codeHash]`, the exact
    /// value the state-trie leaf carries.
    pub fn rlp_bytes(&self) -> Vec<u8> {
        let mut stream = RlpStream::new_list(4);
        stream.append(&self.nonce);
        stream.append(&self.balance);
        stream.append(&self.storage_root);
        stream.append(&self.code_hash);
        stream.out().to_vec()
    }
}

impl Default for AccountState {
    fn default() -> Self {
        Self {
            nonce: 0,
            balance: U256::zero(),
            storage_root: EMPTY_TRIE_HASH,
            code_hash: EMPTY_KECCAK_HASH,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn account_record_shape() {
        let account = AccountState {
            nonce: 1,
            balance: U256::from(1_000_000_000u64),
            storage_root: EMPTY_TRIE_HASH,
            code_hash: EMPTY_KECCAK_HASH,
        };
        let encoded = account.rlp_bytes();
        let rlp = rlp::Rlp::new(&encoded);
        assert_eq!(rlp.item_count().unwrap(), 4);
        assert_eq!(rlp.val_at::<u64>(0).unwrap(), 1);
        assert_eq!(rlp.val_at::<U256>(1).unwrap(), account.balance);
        assert_eq!(rlp.val_at::<H256>(2).unwrap(), EMPTY_TRIE_HASH);
        assert_eq!(rlp.val_at::<H256>(3).unwrap(), EMPTY_KECCAK_HASH);
    }

    #[test]
    fn zero_fields_encode_minimally() {
        let encoded = AccountState::default().rlp_bytes();
        let rlp = rlp::Rlp::new(&encoded);
        // Zero nonce and balance must be the RLP empty string, not 0x00.
        assert!(rlp.at(0).unwrap().is_empty());
        assert!(rlp.at(1).unwrap().is_empty());
    }
}
