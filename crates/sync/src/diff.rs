//! Differential slot discovery.
//!
//! Three interchangeable strategies produce the same shape of result: the
//! key-ascending list of slots whose values disagree between the newest
//! source block and the previously synchronized state.

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::str::FromStr;

use chainmirror_common::types::{BlockIdentifier, BlockTag};
use chainmirror_common::word_to_u256;
use chainmirror_rpc::types::TraceReplay;
use chainmirror_rpc::EthClient;
use ethereum_types::{Address, H256, U256};
use tracing::{debug, info};

use crate::enumerator::enumerate_storage_keys;
use crate::errors::EngineError;

/// One disagreeing slot: `src_value` is the value the mirror must adopt,
/// `target_value` the value the other side currently holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotDiff {
    pub key: H256,
    pub src_value: U256,
    pub target_value: U256,
}

/// Key-ascending list of disagreeing slots.
pub type Diff = Vec<SlotDiff>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyKind {
    /// Enumerate both contracts and compare current values. Needs the
    /// Parity extension on both endpoints.
    Storage,
    /// Enumerate the source once, compare `eth_getProof` values at the old
    /// and new block. Standard methods only; blind to keys created after
    /// the enumeration block.
    GetProof,
    /// Replay every transaction addressed to (or creating) the contract
    /// and fold the `stateDiff` storage entries. No node extensions
    /// beyond tracing.
    SrcTx,
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StrategyKind::Storage => "storage",
            StrategyKind::GetProof => "getProof",
            StrategyKind::SrcTx => "srcTx",
        };
        f.write_str(name)
    }
}

impl FromStr for StrategyKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "storage" => Ok(StrategyKind::Storage),
            "getproof" | "get-proof" => Ok(StrategyKind::GetProof),
            "srctx" | "src-tx" => Ok(StrategyKind::SrcTx),
            other => Err(format!("unknown diff strategy: {other}")),
        }
    }
}

/// Diff computation over a fixed (source contract, proxy) pair.
pub struct DiffEngine<'a> {
    pub source: &'a EthClient,
    pub target: &'a EthClient,
    pub src_address: Address,
    pub proxy_address: Option<Address>,
    pub page_size: usize,
}

impl DiffEngine<'_> {
    /// `diff(srcAddress, fromBlock, toBlock)`; `from > to` yields an empty
    /// diff rather than an error.
    pub async fn diff(
        &self,
        kind: StrategyKind,
        from_block: u64,
        to_block: u64,
    ) -> Result<Diff, EngineError> {
        if from_block > to_block {
            debug!(from_block, to_block, "source ahead of target, empty diff");
            return Ok(Diff::new());
        }
        let diff = match kind {
            StrategyKind::Storage => self.storage_diff(to_block).await?,
            StrategyKind::GetProof => self.get_proof_diff(from_block, to_block).await?,
            StrategyKind::SrcTx => self.src_tx_diff(from_block, to_block).await?,
        };
        info!(%kind, from_block, to_block, changed = diff.len(), "diff computed");
        Ok(diff)
    }

    /// Enumerate source and proxy, compare current values slot by slot.
    async fn storage_diff(&self, to_block: u64) -> Result<Diff, EngineError> {
        let proxy = self.proxy_address.ok_or_else(|| {
            EngineError::Config("storage strategy requires a proxy address".to_string())
        })?;
        let src_block = BlockIdentifier::Number(to_block);
        let proxy_block = BlockIdentifier::Tag(BlockTag::Latest);

        let src_keys =
            enumerate_storage_keys(self.source, self.src_address, src_block, self.page_size)
                .await?;
        let proxy_keys =
            enumerate_storage_keys(self.target, proxy, proxy_block, self.page_size).await?;

        // union, preserving source enumeration order first
        let mut keys = src_keys;
        let mut seen: HashSet<H256> = keys.iter().copied().collect();
        for key in proxy_keys {
            if seen.insert(key) {
                keys.push(key);
            }
        }

        let src_values = self
            .source
            .batch(keys.iter().copied(), |key| async move {
                self.source
                    .get_storage_at(self.src_address, key, src_block)
                    .await
            })
            .await?;
        let proxy_values = self
            .target
            .batch(keys.iter().copied(), |key| async move {
                self.target.get_storage_at(proxy, key, proxy_block).await
            })
            .await?;

        Ok(collect_diff(
            keys.into_iter()
                .zip(src_values.into_iter().zip(proxy_values))
                .map(|(key, (src, target))| (key, src, target)),
        ))
    }

    /// Compare `eth_getProof` values for the source key set at the old and
    /// new block.
    async fn get_proof_diff(&self, from_block: u64, to_block: u64) -> Result<Diff, EngineError> {
        let keys = enumerate_storage_keys(
            self.source,
            self.src_address,
            BlockIdentifier::Number(to_block),
            self.page_size,
        )
        .await?;

        let chunks: Vec<Vec<H256>> = keys.chunks(self.page_size).map(<[H256]>::to_vec).collect();
        let old_bundles = self
            .source
            .batch(chunks.clone(), |chunk| async move {
                self.source
                    .get_proof(self.src_address, &chunk, from_block.into())
                    .await
            })
            .await?;
        let new_bundles = self
            .source
            .batch(chunks, |chunk| async move {
                self.source
                    .get_proof(self.src_address, &chunk, to_block.into())
                    .await
            })
            .await?;

        // both bundle sets were requested with identical key chunks, so
        // their entries pair up positionally
        let old_entries = old_bundles.iter().flat_map(|b| &b.storage_proof);
        let new_entries = new_bundles.iter().flat_map(|b| &b.storage_proof);
        Ok(collect_diff(old_entries.zip(new_entries).map(|(old, new)| {
            (
                chainmirror_common::pad32(new.key),
                new.value,
                old.value,
            )
        })))
    }

    /// Replay the window's transactions and fold their storage deltas.
    async fn src_tx_diff(&self, from_block: u64, to_block: u64) -> Result<Diff, EngineError> {
        let mut final_values: BTreeMap<H256, H256> = BTreeMap::new();

        // Blocks are folded strictly in order: block N is fully collected
        // before N+1 is admitted, so last-write-wins is deterministic.
        for block_number in (from_block + 1)..=to_block {
            let block = self
                .source
                .get_block_by_number(block_number.into(), true)
                .await?;
            let replay_hashes = self.collect_contract_transactions(&block).await?;
            if replay_hashes.is_empty() {
                continue;
            }
            debug!(
                block_number,
                transactions = replay_hashes.len(),
                "replaying contract transactions"
            );
            let replays = self
                .source
                .batch(replay_hashes, |hash| async move {
                    self.source.trace_replay_transaction(hash).await
                })
                .await?;
            for replay in &replays {
                fold_replay(&mut final_values, self.src_address, replay);
            }
        }

        // baseline: the slot values at the start of the window
        let keys: Vec<H256> = final_values.keys().copied().collect();
        let baseline = self
            .source
            .batch(keys.iter().copied(), |key| async move {
                self.source
                    .get_storage_at(self.src_address, key, from_block.into())
                    .await
            })
            .await?;

        Ok(collect_diff(keys.into_iter().zip(baseline).map(
            |(key, old)| (key, word_to_u256(final_values[&key]), old),
        )))
    }

    /// Transactions of `block` addressed to the contract or creating it,
    /// in block order. Creations without the Parity `creates` field fall
    /// back to a receipt lookup.
    async fn collect_contract_transactions(
        &self,
        block: &chainmirror_rpc::types::RpcBlock,
    ) -> Result<Vec<H256>, EngineError> {
        let transactions = block.full_transactions();

        let unresolved: Vec<H256> = transactions
            .iter()
            .filter(|tx| tx.to.is_none() && tx.creates.is_none())
            .map(|tx| tx.hash)
            .collect();
        let mut created_here: HashSet<H256> = HashSet::new();
        if !unresolved.is_empty() {
            let receipts = self
                .source
                .batch(unresolved.iter().copied(), |hash| async move {
                    self.source.get_transaction_receipt(hash).await
                })
                .await?;
            for (hash, receipt) in unresolved.into_iter().zip(receipts) {
                if receipt.and_then(|r| r.contract_address) == Some(self.src_address) {
                    created_here.insert(hash);
                }
            }
        }

        Ok(transactions
            .iter()
            .filter(|tx| {
                tx.to == Some(self.src_address)
                    || tx.creates == Some(self.src_address)
                    || created_here.contains(&tx.hash)
            })
            .map(|tx| tx.hash)
            .collect())
    }
}

/// Fold one replay's storage entries for `contract` into the running
/// final-value map. Replays without an entry for the contract are benign.
fn fold_replay(final_values: &mut BTreeMap<H256, H256>, contract: Address, replay: &TraceReplay) {
    let Some(state_diff) = &replay.state_diff else {
        return;
    };
    let Some(account_diff) = state_diff.get(&contract) else {
        debug!(%contract, "replay carries no state diff for the contract");
        return;
    };
    for (key, delta) in &account_diff.storage {
        if let Some(value) = delta.new_value() {
            final_values.insert(*key, value);
        }
    }
}

/// Keep the disagreeing slots, ordered key-ascending.
fn collect_diff(pairs: impl IntoIterator<Item = (H256, U256, U256)>) -> Diff {
    let mut map: BTreeMap<H256, (U256, U256)> = BTreeMap::new();
    for (key, src, target) in pairs {
        if src != target {
            map.insert(key, (src, target));
        }
    }
    map.into_iter()
        .map(|(key, (src_value, target_value))| SlotDiff {
            key,
            src_value,
            target_value,
        })
        .collect()
}

/// Smallest block at which `address` has code: binary search over
/// `eth_getCode` between genesis and the chain head.
pub async fn find_deployment_block(
    client: &EthClient,
    address: Address,
) -> Result<u64, EngineError> {
    let latest = client.block_number().await?;
    let code = client.get_code(address, latest.into()).await?;
    if code.is_empty() {
        return Err(EngineError::NotFound(format!(
            "no code at {address:#x} at the chain head"
        )));
    }
    let (mut lo, mut hi) = (0u64, latest);
    while lo < hi {
        let mid = lo + (hi - lo) / 2;
        let code = client.get_code(address, mid.into()).await?;
        if code.is_empty() {
            lo = mid + 1;
        } else {
            hi = mid;
        }
    }
    debug!(%address, block = hi, "deployment block found");
    Ok(hi)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(n: u64) -> H256 {
        H256::from_low_u64_be(n)
    }

    #[test]
    fn strategy_names_round_trip() {
        for kind in [StrategyKind::Storage, StrategyKind::GetProof, StrategyKind::SrcTx] {
            assert_eq!(kind.to_string().parse::<StrategyKind>().unwrap(), kind);
        }
        assert!("magic".parse::<StrategyKind>().is_err());
    }

    #[test]
    fn collect_diff_is_key_ascending_and_skips_agreements() {
        let diff = collect_diff(vec![
            (key(9), U256::from(1), U256::from(2)),
            (key(3), U256::from(5), U256::from(5)), // agreement, dropped
            (key(1), U256::zero(), U256::from(7)),  // zeroing entry kept
        ]);
        assert_eq!(diff.len(), 2);
        assert_eq!(diff[0].key, key(1));
        assert!(diff[0].src_value.is_zero());
        assert_eq!(diff[1].key, key(9));
    }

    #[test]
    fn diff_key_sets_are_symmetric_under_reversal() {
        let forward = collect_diff(vec![
            (key(1), U256::from(1), U256::from(2)),
            (key(2), U256::from(3), U256::from(3)),
            (key(3), U256::zero(), U256::from(9)),
        ]);
        let backward = collect_diff(vec![
            (key(1), U256::from(2), U256::from(1)),
            (key(2), U256::from(3), U256::from(3)),
            (key(3), U256::from(9), U256::zero()),
        ]);
        let keys = |d: &Diff| d.iter().map(|s| s.key).collect::<Vec<_>>();
        assert_eq!(keys(&forward), keys(&backward));
    }

    fn replay_fixture(entries: serde_json::Value) -> TraceReplay {
        serde_json::from_value(serde_json::json!({
            "stateDiff": {
                "0x00000000000000000000000000000000000000aa": { "storage": entries }
            }
        }))
        .unwrap()
    }

    #[test]
    fn fold_replay_applies_all_delta_kinds() {
        let contract = Address::from_low_u64_be(0xaa);
        let mut values = BTreeMap::new();
        let replay = replay_fixture(serde_json::json!({
            "0x0000000000000000000000000000000000000000000000000000000000000001":
                { "*": { "from": format!("{:#066x}", 1), "to": format!("{:#066x}", 0x539) } },
            "0x0000000000000000000000000000000000000000000000000000000000000002":
                { "+": format!("{:#066x}", 0x3e8) },
            "0x0000000000000000000000000000000000000000000000000000000000000003":
                { "-": format!("{:#066x}", 5) },
            "0x0000000000000000000000000000000000000000000000000000000000000004": "="
        }));
        fold_replay(&mut values, contract, &replay);
        assert_eq!(values[&key(1)], key(0x539));
        assert_eq!(values[&key(2)], key(0x3e8));
        assert_eq!(values[&key(3)], H256::zero());
        assert!(!values.contains_key(&key(4)));
    }

    #[test]
    fn fold_replay_last_write_wins() {
        let contract = Address::from_low_u64_be(0xaa);
        let mut values = BTreeMap::new();
        let first = replay_fixture(serde_json::json!({
            "0x0000000000000000000000000000000000000000000000000000000000000001":
                { "+": format!("{:#066x}", 100) },
        }));
        let second = replay_fixture(serde_json::json!({
            "0x0000000000000000000000000000000000000000000000000000000000000001":
                { "*": { "from": format!("{:#066x}", 100), "to": format!("{:#066x}", 200) } },
        }));
        fold_replay(&mut values, contract, &first);
        fold_replay(&mut values, contract, &second);
        assert_eq!(values[&key(1)], key(200));
    }

    #[test]
    fn fold_replay_ignores_other_contracts_and_missing_diffs() {
        let mut values = BTreeMap::new();
        let replay = replay_fixture(serde_json::json!({
            "0x0000000000000000000000000000000000000000000000000000000000000001":
                { "+": format!("{:#066x}", 1) },
        }));
        fold_replay(&mut values, Address::from_low_u64_be(0xbb), &replay);
        assert!(values.is_empty());

        let empty: TraceReplay = serde_json::from_value(serde_json::json!({})).unwrap();
        fold_replay(&mut values, Address::from_low_u64_be(0xaa), &empty);
        assert!(values.is_empty());
    }

    #[test]
    fn slot_zeroed_inside_window_still_emits_zero_entry() {
        // A slot created then deleted within the window folds to zero; with
        // a non-zero baseline the diff must carry the zeroing entry.
        let contract = Address::from_low_u64_be(0xaa);
        let mut values = BTreeMap::new();
        let create = replay_fixture(serde_json::json!({
            "0x0000000000000000000000000000000000000000000000000000000000000007":
                { "+": format!("{:#066x}", 123) },
        }));
        let delete = replay_fixture(serde_json::json!({
            "0x0000000000000000000000000000000000000000000000000000000000000007":
                { "-": format!("{:#066x}", 123) },
        }));
        fold_replay(&mut values, contract, &create);
        fold_replay(&mut values, contract, &delete);

        let diff = collect_diff(values.iter().map(|(k, v)| {
            (*k, word_to_u256(*v), U256::from(55)) // baseline: old value 55
        }));
        assert_eq!(diff.len(), 1);
        assert!(diff[0].src_value.is_zero());
        assert_eq!(diff[0].target_value, U256::from(55));
    }
}
