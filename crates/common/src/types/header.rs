use bytes::Bytes;
use ethereum_types::{Address, Bloom, H64, H256, U256};
use rlp::RlpStream;

use crate::keccak;

/// Block header reduced to the fields that participate in the canonical
/// header hash on pre-London chains.
///
/// PoW headers carry `mixHash` and `nonce`; PoA (clique/aura) headers
/// produced by some nodes omit both, and the RLP list shrinks from 15 to
/// 13 items accordingly. Re-hashing the encoding must reproduce the block
/// hash the node reports, so the variant is decided by field presence
/// rather than configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlockHeader {
    pub parent_hash: H256,
    pub uncles_hash: H256,
    pub coinbase: Address,
    pub state_root: H256,
    pub transactions_root: H256,
    pub receipts_root: H256,
    pub logs_bloom: Bloom,
    pub difficulty: U256,
    pub number: u64,
    pub gas_limit: u64,
    pub gas_used: u64,
    pub timestamp: u64,
    pub extra_data: Bytes,
    pub mix_hash: Option<H256>,
    pub nonce: Option<H64>,
}

impl BlockHeader {
    fn is_pow(&self) -> bool {
        self.mix_hash.is_some() && self.nonce.is_some()
    }

    /// RLP encoding of the header; hashing this with Keccak-256 yields
    /// the canonical block hash.
    pub fn encode(&self) -> Vec<u8> {
        let field_count = if self.is_pow() { 15 } else { 13 };
        let mut stream = RlpStream::new_list(field_count);
        stream.append(&self.parent_hash);
        stream.append(&self.uncles_hash);
        stream.append(&self.coinbase);
        stream.append(&self.state_root);
        stream.append(&self.transactions_root);
        stream.append(&self.receipts_root);
        stream.append(&self.logs_bloom);
        stream.append(&self.difficulty);
        stream.append(&self.number);
        stream.append(&self.gas_limit);
        stream.append(&self.gas_used);
        stream.append(&self.timestamp);
        stream.append(&self.extra_data.to_vec());
        if let (Some(mix_hash), Some(nonce)) = (self.mix_hash, self.nonce) {
            stream.append(&mix_hash);
            stream.append(&nonce);
        }
        stream.out().to_vec()
    }

    /// Keccak-256 of the RLP encoding.
    pub fn hash(&self) -> H256 {
        keccak(self.encode())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_header() -> BlockHeader {
        BlockHeader {
            parent_hash: H256::repeat_byte(0x11),
            uncles_hash: H256::repeat_byte(0x22),
            coinbase: Address::repeat_byte(0x33),
            state_root: H256::repeat_byte(0x44),
            transactions_root: H256::repeat_byte(0x55),
            receipts_root: H256::repeat_byte(0x66),
            logs_bloom: Bloom::zero(),
            difficulty: U256::from(131_072),
            number: 42,
            gas_limit: 8_000_000,
            gas_used: 21_000,
            timestamp: 1_600_000_000,
            extra_data: Bytes::from_static(b"clique"),
            mix_hash: None,
            nonce: None,
        }
    }

    #[test]
    fn poa_header_has_13_fields() {
        let encoded = sample_header().encode();
        let rlp = rlp::Rlp::new(&encoded);
        assert_eq!(rlp.item_count().unwrap(), 13);
        assert_eq!(rlp.val_at::<u64>(8).unwrap(), 42);
        assert_eq!(rlp.val_at::<Vec<u8>>(12).unwrap(), b"clique".to_vec());
    }

    #[test]
    fn pow_header_appends_mix_hash_and_nonce() {
        let mut header = sample_header();
        header.mix_hash = Some(H256::repeat_byte(0x77));
        header.nonce = Some(H64::repeat_byte(0x88));
        let encoded = header.encode();
        let rlp = rlp::Rlp::new(&encoded);
        assert_eq!(rlp.item_count().unwrap(), 15);
        assert_eq!(rlp.val_at::<H256>(13).unwrap(), H256::repeat_byte(0x77));
        assert_eq!(rlp.val_at::<H64>(14).unwrap(), H64::repeat_byte(0x88));
    }

    #[test]
    fn mix_hash_without_nonce_is_poa() {
        let mut header = sample_header();
        header.mix_hash = Some(H256::zero());
        let rlp_bytes = header.encode();
        assert_eq!(rlp::Rlp::new(&rlp_bytes).item_count().unwrap(), 13);
    }

    #[test]
    fn integer_fields_are_minimal_big_endian() {
        let mut header = sample_header();
        header.gas_used = 0;
        header.difficulty = U256::zero();
        let encoded = header.encode();
        let rlp = rlp::Rlp::new(&encoded);
        // Zero integers must encode as the empty string, never as 0x00.
        assert!(rlp.at(7).unwrap().is_empty());
        assert!(rlp.at(10).unwrap().is_empty());
        // Non-zero integers carry no leading zero bytes.
        assert_eq!(rlp.at(11).unwrap().data().unwrap().len(), 4);
    }

    #[test]
    fn hash_commits_to_every_field() {
        let header = sample_header();
        let mut other = header.clone();
        other.gas_used += 1;
        assert_ne!(header.hash(), other.hash());
        assert_eq!(header.hash(), keccak(header.encode()));
    }
}
