//! EIP-1186 proof assembly.
//!
//! Fetches an account+storage proof bundle, canonicalizes it (32-byte
//! keys, minimal big-endian values) and renders the RLP payload the proxy
//! contract consumes: `[account, accountProof, [[key, value, nodes], …]]`.
//! Every assembled proof is verified locally against the roots it claims
//! before it is allowed anywhere near a transaction.

use bytes::Bytes;
use chainmirror_common::trie::verify_proof;
use chainmirror_common::types::AccountState;
use chainmirror_common::{keccak, pad32};
use ethereum_types::{Address, H256, U256};
use rlp::RlpStream;
use tracing::debug;

use chainmirror_rpc::types::GetProofBundle;
use chainmirror_rpc::EthClient;

use crate::errors::EngineError;

/// One canonicalized storage proof: 32-byte key, integer value, and the
/// trie nodes from the storage root to the leaf.
#[derive(Debug, Clone)]
pub struct StorageEntry {
    pub key: H256,
    pub value: U256,
    pub nodes: Vec<Bytes>,
}

/// A locally-verifiable account+storage proof pinned to one block.
#[derive(Debug, Clone)]
pub struct AssembledProof {
    pub address: Address,
    pub block_number: u64,
    pub state_root: H256,
    pub account: AccountState,
    pub account_nodes: Vec<Bytes>,
    pub storage_entries: Vec<StorageEntry>,
}

impl AssembledProof {
    pub fn from_bundle(
        block_number: u64,
        state_root: H256,
        bundle: GetProofBundle,
    ) -> AssembledProof {
        let account = bundle.account_state();
        let storage_entries = bundle
            .storage_proof
            .into_iter()
            .map(|entry| StorageEntry {
                key: pad32(entry.key),
                value: entry.value,
                nodes: entry.proof,
            })
            .collect();
        AssembledProof {
            address: bundle.address,
            block_number,
            state_root,
            account,
            account_nodes: bundle.account_proof,
            storage_entries,
        }
    }

    pub fn storage_root(&self) -> H256 {
        self.account.storage_root
    }

    /// The account proof alone, as the RLP node list the relay's
    /// `verifyMigrateContract` takes.
    pub fn account_proof_rlp(&self) -> Vec<u8> {
        let mut stream = RlpStream::new();
        append_nodes(&mut stream, &self.account_nodes);
        stream.out().to_vec()
    }

    /// The full payload for `updateStorage`:
    /// `[accountRecord, accountProof, storageProofs]`.
    pub fn to_rlp(&self) -> Vec<u8> {
        let mut stream = RlpStream::new_list(3);
        stream.append(&self.account.rlp_bytes());
        append_nodes(&mut stream, &self.account_nodes);
        stream.begin_list(self.storage_entries.len());
        for entry in &self.storage_entries {
            stream.begin_list(3);
            stream.append(&entry.key);
            stream.append(&entry.value);
            append_nodes(&mut stream, &entry.nodes);
        }
        stream.out().to_vec()
    }

    /// Keys and left-padded values in proof order, the shape `addStorage`
    /// takes during bulk migration.
    pub fn keys_and_values(&self) -> (Vec<H256>, Vec<H256>) {
        let keys = self.storage_entries.iter().map(|e| e.key).collect();
        let values = self.storage_entries.iter().map(|e| pad32(e.value)).collect();
        (keys, values)
    }

    /// Local verification: the account proof must terminate at the state
    /// root with this account record, and every storage proof must
    /// terminate at the account's storage root with its claimed value
    /// (absence is acceptable only for zero values).
    pub fn verify(&self) -> Result<(), EngineError> {
        let account_path = keccak(self.address.as_bytes());
        let account_nodes: Vec<Vec<u8>> =
            self.account_nodes.iter().map(|n| n.to_vec()).collect();
        let found = verify_proof(self.state_root, account_path.as_bytes(), &account_nodes)?;
        if found.as_deref() != Some(self.account.rlp_bytes().as_slice()) {
            return Err(EngineError::Verification(format!(
                "account proof for {:#x} does not match the state root {:#x}",
                self.address, self.state_root
            )));
        }

        let storage_root = self.storage_root();
        for entry in &self.storage_entries {
            let path = keccak(entry.key.as_bytes());
            let nodes: Vec<Vec<u8>> = entry.nodes.iter().map(|n| n.to_vec()).collect();
            let found = verify_proof(storage_root, path.as_bytes(), &nodes)?;
            let valid = match &found {
                Some(value) => value.as_slice() == rlp::encode(&entry.value).as_ref(),
                None => entry.value.is_zero(),
            };
            if !valid {
                return Err(EngineError::Verification(format!(
                    "storage proof for key {:#x} does not yield value {:#x}",
                    entry.key, entry.value
                )));
            }
        }
        debug!(
            address = %format!("{:#x}", self.address),
            block = self.block_number,
            entries = self.storage_entries.len(),
            "proof verified locally"
        );
        Ok(())
    }
}

fn append_nodes(stream: &mut RlpStream, nodes: &[Bytes]) {
    stream.begin_list(nodes.len());
    for node in nodes {
        stream.append(&node.to_vec());
    }
}

/// Fetch and canonicalize a proof for `keys` at `block`, verifying it
/// locally before handing it back.
pub async fn assemble_proof(
    client: &EthClient,
    address: Address,
    keys: &[H256],
    block: u64,
) -> Result<AssembledProof, EngineError> {
    let header = client.get_block_by_number(block.into(), false).await?;
    let bundle = client.get_proof(address, keys, block.into()).await?;
    let proof = AssembledProof::from_bundle(block, header.state_root, bundle);
    proof.verify()?;
    Ok(proof)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chainmirror_common::constants::EMPTY_KECCAK_HASH;

    // hex-prefix encoding, duplicated from the trie walker's tests to
    // build fixture nodes
    fn compact_encode(nibbles: &[u8], is_leaf: bool) -> Vec<u8> {
        let mut flag: u8 = if is_leaf { 2 } else { 0 };
        let mut out = Vec::new();
        let rest = if nibbles.len() % 2 == 1 {
            flag |= 1;
            out.push((flag << 4) | nibbles[0]);
            &nibbles[1..]
        } else {
            out.push(flag << 4);
            nibbles
        };
        for pair in rest.chunks(2) {
            out.push((pair[0] << 4) | pair[1]);
        }
        out
    }

    fn to_nibbles(path: &[u8]) -> Vec<u8> {
        path.iter().flat_map(|b| [b >> 4, b & 0x0f]).collect()
    }

    fn leaf_node(path: &[u8], value: &[u8]) -> Vec<u8> {
        let mut stream = RlpStream::new_list(2);
        stream.append(&compact_encode(&to_nibbles(path), true));
        stream.append(&value.to_vec());
        stream.out().to_vec()
    }

    /// One-slot contract: a single storage leaf plus a single account
    /// leaf, with roots derived from the fixture nodes themselves.
    fn fixture() -> AssembledProof {
        let address = Address::repeat_byte(0xaa);
        let key = pad32(U256::one());
        let value = U256::from(0x2a);

        let storage_leaf = leaf_node(
            keccak(key.as_bytes()).as_bytes(),
            rlp::encode(&value).as_ref(),
        );
        let storage_root = keccak(&storage_leaf);

        let account = AccountState {
            nonce: 1,
            balance: U256::zero(),
            storage_root,
            code_hash: EMPTY_KECCAK_HASH,
        };
        let account_leaf = leaf_node(keccak(address.as_bytes()).as_bytes(), &account.rlp_bytes());
        let state_root = keccak(&account_leaf);

        AssembledProof {
            address,
            block_number: 7,
            state_root,
            account,
            account_nodes: vec![Bytes::from(account_leaf)],
            storage_entries: vec![StorageEntry {
                key,
                value,
                nodes: vec![Bytes::from(storage_leaf)],
            }],
        }
    }

    #[test]
    fn fixture_proof_verifies() {
        fixture().verify().unwrap();
    }

    #[test]
    fn wrong_value_fails_verification() {
        let mut proof = fixture();
        proof.storage_entries[0].value = U256::from(0x2b);
        assert!(matches!(
            proof.verify(),
            Err(EngineError::Verification(_))
        ));
    }

    #[test]
    fn wrong_state_root_fails_verification() {
        let mut proof = fixture();
        proof.state_root = H256::repeat_byte(0x01);
        assert!(proof.verify().is_err());
    }

    #[test]
    fn zero_value_accepts_absence_proof() {
        let mut proof = fixture();
        // A key that is not in the one-leaf storage trie, claimed zero.
        proof.storage_entries.push(StorageEntry {
            key: pad32(U256::from(9)),
            value: U256::zero(),
            nodes: proof.storage_entries[0].nodes.clone(),
        });
        proof.verify().unwrap();
    }

    #[test]
    fn payload_shape() {
        let proof = fixture();
        let payload = proof.to_rlp();
        let outer = rlp::Rlp::new(&payload);
        assert_eq!(outer.item_count().unwrap(), 3);

        // account record travels as a nested RLP blob
        let account = outer.at(0).unwrap().data().unwrap().to_vec();
        assert_eq!(account, proof.account.rlp_bytes());

        let account_nodes = outer.at(1).unwrap();
        assert_eq!(account_nodes.item_count().unwrap(), 1);
        assert_eq!(
            account_nodes.at(0).unwrap().data().unwrap(),
            proof.account_nodes[0].as_ref()
        );

        let storage = outer.at(2).unwrap();
        assert_eq!(storage.item_count().unwrap(), 1);
        let entry = storage.at(0).unwrap();
        assert_eq!(entry.item_count().unwrap(), 3);
        assert_eq!(entry.at(0).unwrap().data().unwrap().len(), 32);
        assert_eq!(entry.val_at::<U256>(1).unwrap(), U256::from(0x2a));
        assert_eq!(entry.at(2).unwrap().item_count().unwrap(), 1);
    }

    #[test]
    fn account_proof_rlp_is_a_plain_node_list() {
        let proof = fixture();
        let encoded = proof.account_proof_rlp();
        let rlp = rlp::Rlp::new(&encoded);
        assert!(rlp.is_list());
        assert_eq!(rlp.item_count().unwrap(), 1);
    }

    #[test]
    fn keys_and_values_are_padded_words() {
        let proof = fixture();
        let (keys, values) = proof.keys_and_values();
        assert_eq!(keys, vec![pad32(U256::one())]);
        assert_eq!(values, vec![pad32(U256::from(0x2a))]);
    }

    #[test]
    fn bundle_canonicalization_pads_keys() {
        let bundle: GetProofBundle = serde_json::from_value(serde_json::json!({
            "address": "0x00000000000000000000000000000000000000aa",
            "accountProof": ["0x80"],
            "balance": "0x0",
            "codeHash": "0xc5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470",
            "nonce": "0x0",
            "storageHash": "0x56e81f171bcc55a6ff8345e692c0f86e5b48e01b996cadc001622fb5e363b421",
            "storageProof": [{"key": "0x1", "value": "0x2a", "proof": []}]
        }))
        .unwrap();
        let proof = AssembledProof::from_bundle(1, H256::zero(), bundle);
        assert_eq!(proof.storage_entries[0].key, pad32(U256::one()));
    }
}
