//! Serde mirrors of the node payloads the engine consumes.

use std::collections::HashMap;

use bytes::Bytes;
use chainmirror_common::serde_utils;
use chainmirror_common::types::{AccountState, BlockHeader};
use ethereum_types::{Address, Bloom, H64, H256, U64, U256};
use serde::Deserialize;
use serde_json::Value;

/// JSON-RPC response envelope.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum RpcResponse {
    Success(RpcSuccessResponse),
    Error(RpcErrorResponse),
}

#[derive(Debug, Deserialize)]
pub struct RpcSuccessResponse {
    pub result: Value,
}

#[derive(Debug, Deserialize)]
pub struct RpcErrorResponse {
    pub error: RpcErrorMetadata,
}

#[derive(Debug, Deserialize)]
pub struct RpcErrorMetadata {
    pub code: i64,
    pub message: String,
}

/// Block as returned by `eth_getBlockByNumber`, reduced to the fields the
/// engine reads. `mixHash`/`nonce` stay optional: PoA nodes may omit them
/// and the header codec keys its variant off their presence.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcBlock {
    pub hash: H256,
    pub parent_hash: H256,
    pub sha3_uncles: H256,
    pub miner: Address,
    pub state_root: H256,
    pub transactions_root: H256,
    pub receipts_root: H256,
    pub logs_bloom: Bloom,
    #[serde(default)]
    pub difficulty: U256,
    pub number: U64,
    pub gas_limit: U64,
    pub gas_used: U64,
    pub timestamp: U64,
    #[serde(with = "serde_utils::bytes")]
    pub extra_data: Bytes,
    #[serde(default)]
    pub mix_hash: Option<H256>,
    #[serde(default)]
    pub nonce: Option<H64>,
    #[serde(default)]
    pub transactions: BlockTransactions,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum BlockTransactions {
    Hashes(Vec<H256>),
    Full(Vec<RpcTransaction>),
}

impl Default for BlockTransactions {
    fn default() -> Self {
        BlockTransactions::Hashes(Vec::new())
    }
}

impl RpcBlock {
    pub fn header(&self) -> BlockHeader {
        BlockHeader {
            parent_hash: self.parent_hash,
            uncles_hash: self.sha3_uncles,
            coinbase: self.miner,
            state_root: self.state_root,
            transactions_root: self.transactions_root,
            receipts_root: self.receipts_root,
            logs_bloom: self.logs_bloom,
            difficulty: self.difficulty,
            number: self.number.as_u64(),
            gas_limit: self.gas_limit.as_u64(),
            gas_used: self.gas_used.as_u64(),
            timestamp: self.timestamp.as_u64(),
            extra_data: self.extra_data.clone(),
            mix_hash: self.mix_hash,
            nonce: self.nonce,
        }
    }

    pub fn full_transactions(&self) -> &[RpcTransaction] {
        match &self.transactions {
            BlockTransactions::Full(txs) => txs,
            BlockTransactions::Hashes(_) => &[],
        }
    }
}

/// Transaction as returned by `eth_getTransactionByHash` /
/// `eth_getBlockByNumber(.., true)`. `creates` is the Parity/OpenEthereum
/// extension naming the deployed contract for creation transactions.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcTransaction {
    pub hash: H256,
    pub from: Address,
    #[serde(default)]
    pub to: Option<Address>,
    #[serde(default)]
    pub creates: Option<Address>,
    #[serde(default, with = "serde_utils::bytes")]
    pub input: Bytes,
    #[serde(default)]
    pub block_number: Option<U64>,
    pub nonce: U64,
    #[serde(default)]
    pub value: U256,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcReceipt {
    pub transaction_hash: H256,
    #[serde(default)]
    pub status: Option<U64>,
    #[serde(default)]
    pub contract_address: Option<Address>,
    #[serde(default)]
    pub block_number: Option<U64>,
    pub gas_used: U64,
}

impl RpcReceipt {
    /// Post-Byzantium success flag; receipts without a status field are
    /// treated as successful.
    pub fn succeeded(&self) -> bool {
        self.status.map_or(true, |s| s.as_u64() == 1)
    }
}

/// EIP-1186 `eth_getProof` response.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetProofBundle {
    pub address: Address,
    #[serde(with = "serde_utils::bytes_vec")]
    pub account_proof: Vec<Bytes>,
    pub balance: U256,
    pub code_hash: H256,
    pub nonce: U64,
    pub storage_hash: H256,
    #[serde(default)]
    pub storage_proof: Vec<StorageProofEntry>,
}

impl GetProofBundle {
    pub fn account_state(&self) -> AccountState {
        AccountState {
            nonce: self.nonce.as_u64(),
            balance: self.balance,
            storage_root: self.storage_hash,
            code_hash: self.code_hash,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageProofEntry {
    pub key: U256,
    #[serde(default)]
    pub value: U256,
    #[serde(with = "serde_utils::bytes_vec")]
    pub proof: Vec<Bytes>,
}

/// `trace_replayTransaction(hash, ["stateDiff"])` result.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceReplay {
    #[serde(default)]
    pub state_diff: Option<HashMap<Address, AccountStateDiff>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AccountStateDiff {
    #[serde(default)]
    pub storage: HashMap<H256, Delta>,
}

/// One storage-slot entry of a `stateDiff`: unchanged (`"="`), created
/// (`{"+": value}`), removed (`{"-": value}`) or altered
/// (`{"*": {from, to}}`).
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Delta {
    Unchanged(String),
    Changed(DeltaKind),
}

#[derive(Debug, Clone, Deserialize)]
pub enum DeltaKind {
    #[serde(rename = "+")]
    Added(H256),
    #[serde(rename = "-")]
    Removed(H256),
    #[serde(rename = "*")]
    Altered(AlteredDelta),
}

#[derive(Debug, Clone, Deserialize)]
pub struct AlteredDelta {
    pub from: H256,
    pub to: H256,
}

impl Delta {
    /// The slot value after the transaction, `None` when untouched.
    /// Removals surface as the zero word so the mirror can clear the slot.
    pub fn new_value(&self) -> Option<H256> {
        match self {
            Delta::Unchanged(_) => None,
            Delta::Changed(DeltaKind::Added(value)) => Some(*value),
            Delta::Changed(DeltaKind::Removed(_)) => Some(H256::zero()),
            Delta::Changed(DeltaKind::Altered(delta)) => Some(delta.to),
        }
    }
}
