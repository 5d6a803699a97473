//! Migration coordinator.
//!
//! Drives the relay/logic/proxy trio through the engine state machine:
//! initial bulk migration anchored by an on-chain verified proof, then
//! incremental proof-backed updates. The engine is the exclusive writer of
//! its relay/proxy pair; all parallelism is bounded I/O fan-out.

use std::fmt;

use bytes::Bytes;
use chainmirror_common::calldata::{
    decode_address, decode_bool, decode_uint, encode_calldata, encode_values, Value,
};
use chainmirror_common::types::{BlockIdentifier, BlockTag};
use chainmirror_rpc::signer::wait_for_successful_receipt;
use chainmirror_rpc::types::RpcReceipt;
use chainmirror_rpc::{EthClient, LocalSigner, NodeSigner, Signer, TxOverrides};
use ethereum_types::{Address, H256, U256};
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::diff::{Diff, DiffEngine, StrategyKind};
use crate::enumerator::enumerate_storage_keys;
use crate::errors::EngineError;
use crate::proof::assemble_proof;
use crate::{cloner, diff};

const ADD_BLOCK_SIGNATURE: &str = "addBlock(bytes32,uint256)";
const GET_STATE_ROOT_SIGNATURE: &str = "getStateRoot(uint256)";
const GET_SOURCE_SIGNATURE: &str = "getSource()";
const GET_MIGRATION_STATE_SIGNATURE: &str = "getMigrationState(address)";
const GET_CURRENT_BLOCK_NUMBER_SIGNATURE: &str = "getCurrentBlockNumber(address)";
const GET_LATEST_BLOCK_NUMBER_SIGNATURE: &str = "getLatestBlockNumber()";
const VERIFY_MIGRATE_CONTRACT_SIGNATURE: &str =
    "verifyMigrateContract(bytes,bytes,bytes,address,uint256,uint256)";
const ADD_STORAGE_SIGNATURE: &str = "addStorage(bytes32[],bytes32[])";
const UPDATE_STORAGE_SIGNATURE: &str = "updateStorage(bytes,uint256)";
const GET_SOURCE_ADDRESS_SIGNATURE: &str = "getSourceAddress()";
const GET_LOGIC_ADDRESS_SIGNATURE: &str = "getLogicAddress()";
const GET_RELAY_ADDRESS_SIGNATURE: &str = "getRelayAddress()";

/// Receipt polls before a submitted transaction is considered lost.
const RECEIPT_RETRIES: u64 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Uninitialized,
    Initialized,
    LogicDeployed,
    ProxyDeployed,
    Migrated,
    Synchronizing,
    Failed,
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EngineState::Uninitialized => "Uninitialized",
            EngineState::Initialized => "Initialized",
            EngineState::LogicDeployed => "LogicDeployed",
            EngineState::ProxyDeployed => "ProxyDeployed",
            EngineState::Migrated => "Migrated",
            EngineState::Synchronizing => "Synchronizing",
            EngineState::Failed => "Failed",
        };
        f.write_str(name)
    }
}

/// Result of a completed initial migration.
#[derive(Debug, Clone)]
pub struct MigrationReport {
    pub relay: Address,
    pub logic: Address,
    pub proxy: Address,
    pub src_block: u64,
    pub keys_migrated: usize,
    pub chunk_transactions: usize,
    pub total_gas: U256,
    pub verify_tx: H256,
}

/// Result of an incremental synchronization; an empty diff is a
/// successful no-op, not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    NoOp,
    Applied {
        update_tx: H256,
        keys: usize,
        src_block: u64,
    },
}

pub struct SyncEngine {
    cfg: EngineConfig,
    source: EthClient,
    target: EthClient,
    signer: Option<Signer>,
    state: EngineState,
    relay_address: Option<Address>,
    proxy_address: Option<Address>,
    logic_address: Option<Address>,
    /// Source block the proxy is synchronized to.
    src_block: Option<u64>,
}

impl SyncEngine {
    pub fn new(cfg: EngineConfig) -> Result<Self, EngineError> {
        cfg.validate()?;
        let source = EthClient::new_with_config(
            &cfg.source_url,
            cfg.source_api_key.clone(),
            cfg.batch_size,
        )?;
        let target = EthClient::new_with_config(
            &cfg.target_url,
            cfg.target_api_key.clone(),
            cfg.batch_size,
        )?;
        Ok(Self {
            relay_address: cfg.relay_address,
            proxy_address: cfg.proxy_address,
            logic_address: cfg.logic_address,
            cfg,
            source,
            target,
            signer: None,
            state: EngineState::Uninitialized,
            src_block: None,
        })
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn relay_address(&self) -> Option<Address> {
        self.relay_address
    }

    pub fn proxy_address(&self) -> Option<Address> {
        self.proxy_address
    }

    pub fn logic_address(&self) -> Option<Address> {
        self.logic_address
    }

    pub fn source_client(&self) -> &EthClient {
        &self.source
    }

    pub fn target_client(&self) -> &EthClient {
        &self.target
    }

    /// Resolve deployer credentials, attach to pre-existing contracts and
    /// read back the migration flag.
    pub async fn init(&mut self) -> Result<(), EngineError> {
        self.require_state("init", EngineState::Uninitialized)?;

        let signer = match (&self.cfg.keystore_path, &self.cfg.keystore_password) {
            (Some(path), Some(password)) => {
                let chain_id = self.target.chain_id().await?;
                let local = LocalSigner::from_keystore(path, password, chain_id)?;
                info!(address = %format!("{:#x}", local.address()), "using keystore signer");
                Signer::Local(local)
            }
            _ => {
                let accounts = self.target.accounts().await?;
                let address = *accounts.first().ok_or_else(|| {
                    EngineError::Config(
                        "no keystore configured and the target node exposes no unlocked account"
                            .to_string(),
                    )
                })?;
                info!(address = %format!("{address:#x}"), "using unlocked node account");
                Signer::Node(NodeSigner { address })
            }
        };
        self.signer = Some(signer);

        if let Some(relay) = self.relay_address {
            let registered = decode_address(
                &self
                    .call_contract(relay, GET_SOURCE_SIGNATURE, &[])
                    .await?,
            )
            .map_err(EngineError::from)?;
            if registered != self.cfg.source_address {
                return Err(EngineError::Config(format!(
                    "relay {relay:#x} tracks source {registered:#x}, not {:#x}",
                    self.cfg.source_address
                )));
            }
        }

        if let Some(proxy) = self.proxy_address {
            let source = decode_address(
                &self
                    .call_contract(proxy, GET_SOURCE_ADDRESS_SIGNATURE, &[])
                    .await?,
            )
            .map_err(EngineError::from)?;
            if source != self.cfg.source_address {
                return Err(EngineError::Config(format!(
                    "proxy {proxy:#x} mirrors {source:#x}, not {:#x}",
                    self.cfg.source_address
                )));
            }
            let logic = decode_address(
                &self
                    .call_contract(proxy, GET_LOGIC_ADDRESS_SIGNATURE, &[])
                    .await?,
            )
            .map_err(EngineError::from)?;
            let relay = decode_address(
                &self
                    .call_contract(proxy, GET_RELAY_ADDRESS_SIGNATURE, &[])
                    .await?,
            )
            .map_err(EngineError::from)?;
            self.logic_address = Some(logic);
            self.relay_address = Some(relay);

            if self.migration_state(proxy).await? {
                self.src_block = Some(self.relay_current_block(proxy).await?);
                self.state = EngineState::Migrated;
                info!(
                    proxy = %format!("{proxy:#x}"),
                    src_block = ?self.src_block,
                    "attached to a migrated proxy"
                );
                return Ok(());
            }
            warn!(
                proxy = %format!("{proxy:#x}"),
                "proxy exists but the relay reports it unmigrated; run the initial migration first"
            );
        }

        self.state = EngineState::Initialized;
        Ok(())
    }

    /// Initial migration: deploy missing contracts, bulk-copy every slot
    /// and have the relay verify the copy against the attested source
    /// state root.
    pub async fn migrate_src_contract(
        &mut self,
        src_block: BlockIdentifier,
    ) -> Result<MigrationReport, EngineError> {
        self.require_state("migrateSrcContract", EngineState::Initialized)?;

        // ── pre-flight: nothing on-chain happens until all of this holds ──
        let head = self.source.block_number().await?;
        let block = match src_block {
            BlockIdentifier::Number(n) => n,
            BlockIdentifier::Tag(BlockTag::Latest) => head,
            other => {
                return Err(EngineError::Config(format!(
                    "unsupported source block tag for migration: {other}"
                )))
            }
        };
        if block > head {
            return Err(EngineError::Verification(format!(
                "source block {block} is beyond the source chain head {head}"
            )));
        }

        let code = self
            .source
            .get_code(self.cfg.source_address, block.into())
            .await?;
        if code.is_empty() {
            return Err(EngineError::NotFound(format!(
                "no code at source address {:#x} at block {block}",
                self.cfg.source_address
            )));
        }
        if self.relay_address.is_none() && self.cfg.relay_initcode.is_none() {
            return Err(EngineError::Config(
                "no relay address and no relay initcode artifact".to_string(),
            ));
        }
        if self.cfg.proxy_initcode.is_none() {
            return Err(EngineError::Config(
                "no proxy initcode artifact".to_string(),
            ));
        }

        let keys =
            enumerate_storage_keys(&self.source, self.cfg.source_address, block.into(), self.cfg.page_size)
                .await?;
        info!(block, keys = keys.len(), "enumerated source storage");
        let proof = assemble_proof(&self.source, self.cfg.source_address, &keys, block).await?;

        // ── on-chain phase: any failure leaves the pair re-runnable only
        // from scratch ──
        match self.drive_migration(block, proof).await {
            Ok(report) => {
                self.state = EngineState::Migrated;
                self.src_block = Some(block);
                info!(
                    proxy = %format!("{:#x}", report.proxy),
                    gas = %report.total_gas,
                    "initial migration complete"
                );
                Ok(report)
            }
            Err(e) => {
                self.state = EngineState::Failed;
                Err(e)
            }
        }
    }

    async fn drive_migration(
        &mut self,
        src_block: u64,
        proof: crate::proof::AssembledProof,
    ) -> Result<MigrationReport, EngineError> {
        let signer = self.signer()?.clone();

        let relay = match self.relay_address {
            Some(relay) => relay,
            None => {
                let initcode = self.cfg.relay_initcode.clone().ok_or_else(|| {
                    EngineError::Config("no relay initcode artifact".to_string())
                })?;
                let (relay, _) = self.deploy_contract(&signer, initcode, &[], "relay").await?;
                self.relay_address = Some(relay);
                relay
            }
        };

        // anchor the attested source state root
        self.send_contract(
            &signer,
            relay,
            encode_calldata(
                ADD_BLOCK_SIGNATURE,
                &[
                    Value::FixedBytes(proof.state_root),
                    Value::Uint(U256::from(src_block)),
                ],
            )?,
        )
        .await?;
        debug!(src_block, state_root = %format!("{:#x}", proof.state_root), "state root registered");

        let logic_initcode =
            cloner::clone_contract(&self.source, self.cfg.source_address, src_block.into()).await?;
        let (logic, _) = self
            .deploy_contract(&signer, Bytes::from(logic_initcode), &[], "logic")
            .await?;
        self.logic_address = Some(logic);
        self.state = EngineState::LogicDeployed;

        let proxy_initcode = self
            .cfg
            .proxy_initcode
            .clone()
            .ok_or_else(|| EngineError::Config("no proxy initcode artifact".to_string()))?;
        let constructor_args = encode_values(&[
            Value::Address(relay),
            Value::Address(logic),
            Value::Address(self.cfg.source_address),
        ])?;
        let (proxy, _) = self
            .deploy_contract(&signer, proxy_initcode, &constructor_args, "proxy")
            .await?;
        self.proxy_address = Some(proxy);
        self.state = EngineState::ProxyDeployed;

        let (chunk_transactions, total_gas) =
            self.bulk_migrate(&signer, proxy, &proof).await?;

        let verify_tx = self
            .verify_migration(&signer, relay, proxy, &proof, src_block)
            .await?;

        if !self.migration_state(proxy).await? {
            return Err(EngineError::Verification(
                "relay migration flag is still false after verifyMigrateContract".to_string(),
            ));
        }

        Ok(MigrationReport {
            relay,
            logic,
            proxy,
            src_block,
            keys_migrated: proof.storage_entries.len(),
            chunk_transactions,
            total_gas,
            verify_tx,
        })
    }

    /// Split the key/value set into chunks of K pairs and dispatch at most
    /// B chunk transactions concurrently. Nonces are pre-assigned for the
    /// local signer so concurrent submissions cannot collide.
    async fn bulk_migrate(
        &self,
        signer: &Signer,
        proxy: Address,
        proof: &crate::proof::AssembledProof,
    ) -> Result<(usize, U256), EngineError> {
        let (keys, values) = proof.keys_and_values();
        if keys.is_empty() {
            return Ok((0, U256::zero()));
        }
        let chunk_size = self.cfg.chunk_size;
        let gas_price = self.target.gas_price().await?;
        let base_nonce = match signer {
            Signer::Local(local) => Some(
                self.target
                    .get_nonce(local.address(), BlockIdentifier::Tag(BlockTag::Pending))
                    .await?,
            ),
            Signer::Node(_) => None,
        };

        let mut submissions = Vec::new();
        for (index, (key_chunk, value_chunk)) in keys
            .chunks(chunk_size)
            .zip(values.chunks(chunk_size))
            .enumerate()
        {
            let calldata = encode_calldata(
                ADD_STORAGE_SIGNATURE,
                &[
                    Value::Array(key_chunk.iter().map(|k| Value::FixedBytes(*k)).collect()),
                    Value::Array(value_chunk.iter().map(|v| Value::FixedBytes(*v)).collect()),
                ],
            )?;
            submissions.push((base_nonce.map(|n| n + index as u64), calldata));
        }
        let chunk_count = submissions.len();
        info!(
            keys = keys.len(),
            chunks = chunk_count,
            chunk_size,
            "bulk migration starting"
        );

        let target = &self.target;
        let gas_limit = self.cfg.gas_limit;
        let tx_hashes: Vec<H256> = target
            .batch(submissions, |(nonce, calldata)| async move {
                signer
                    .send_transaction(
                        target,
                        Some(proxy),
                        Bytes::from(calldata),
                        TxOverrides {
                            nonce,
                            gas_limit: Some(gas_limit),
                            gas_price: Some(gas_price),
                            value: U256::zero(),
                        },
                    )
                    .await
            })
            .await?;

        let receipts: Vec<RpcReceipt> = target
            .batch(tx_hashes, |hash| async move {
                wait_for_successful_receipt(hash, target, RECEIPT_RETRIES).await
            })
            .await
            .map_err(|e| EngineError::Fatal(format!("bulk migration chunk failed: {e}")))?;

        let total_gas = receipts
            .iter()
            .fold(U256::zero(), |acc, r| acc + U256::from(r.gas_used.as_u64()));
        Ok((chunk_count, total_gas))
    }

    /// Post-migration verification: prove the proxy's rebuilt storage on
    /// the target chain against the attested source root.
    async fn verify_migration(
        &self,
        signer: &Signer,
        relay: Address,
        proxy: Address,
        src_proof: &crate::proof::AssembledProof,
        src_block: u64,
    ) -> Result<H256, EngineError> {
        let target_block = self.target.block_number().await?;
        let block = self
            .target
            .get_block_by_number(target_block.into(), false)
            .await?;
        let header = block.header();
        let encoded_header = header.encode();
        if header.hash() != block.hash {
            return Err(EngineError::Verification(format!(
                "re-encoded target header hashes to {:#x}, node reports {:#x}",
                header.hash(),
                block.hash
            )));
        }

        let proxy_bundle = self
            .target
            .get_proof(proxy, &[], target_block.into())
            .await?;
        let proxy_proof = crate::proof::AssembledProof::from_bundle(
            target_block,
            block.state_root,
            proxy_bundle,
        );
        proxy_proof.verify()?;

        let calldata = encode_calldata(
            VERIFY_MIGRATE_CONTRACT_SIGNATURE,
            &[
                Value::Bytes(Bytes::from(src_proof.account_proof_rlp())),
                Value::Bytes(Bytes::from(proxy_proof.account_proof_rlp())),
                Value::Bytes(Bytes::from(encoded_header)),
                Value::Address(proxy),
                Value::Uint(U256::from(target_block)),
                Value::Uint(U256::from(src_block)),
            ],
        )?;
        let receipt = self.send_contract(signer, relay, calldata).await?;
        info!(
            tx_hash = %format!("{:#x}", receipt.transaction_hash),
            target_block,
            "migration verification submitted"
        );
        Ok(receipt.transaction_hash)
    }

    /// Incremental synchronization: prove `changed_keys` at `target_block`
    /// on the source chain and apply them through one `updateStorage`
    /// transaction. An empty key list is a successful no-op.
    pub async fn migrate_changes_to_proxy(
        &mut self,
        changed_keys: &[H256],
        target_block: u64,
    ) -> Result<SyncOutcome, EngineError> {
        self.require_state("migrateChangesToProxy", EngineState::Migrated)?;
        if changed_keys.is_empty() {
            debug!("empty diff, nothing to synchronize");
            return Ok(SyncOutcome::NoOp);
        }
        if let Some(current) = self.src_block {
            if current > target_block {
                debug!(current, target_block, "proxy already ahead, nothing to do");
                return Ok(SyncOutcome::NoOp);
            }
        }

        self.state = EngineState::Synchronizing;
        match self.drive_update(changed_keys, target_block).await {
            Ok(update_tx) => {
                self.state = EngineState::Migrated;
                self.src_block = Some(target_block);
                info!(
                    keys = changed_keys.len(),
                    target_block,
                    tx_hash = %format!("{update_tx:#x}"),
                    "incremental update applied"
                );
                Ok(SyncOutcome::Applied {
                    update_tx,
                    keys: changed_keys.len(),
                    src_block: target_block,
                })
            }
            Err(e) => {
                self.state = EngineState::Failed;
                Err(e)
            }
        }
    }

    async fn drive_update(
        &self,
        changed_keys: &[H256],
        target_block: u64,
    ) -> Result<H256, EngineError> {
        let signer = self.signer()?.clone();
        let relay = self
            .relay_address
            .ok_or_else(|| EngineError::Config("no relay address".to_string()))?;
        let proxy = self
            .proxy_address
            .ok_or_else(|| EngineError::Config("no proxy address".to_string()))?;

        let proof = assemble_proof(
            &self.source,
            self.cfg.source_address,
            changed_keys,
            target_block,
        )
        .await?;

        self.send_contract(
            &signer,
            relay,
            encode_calldata(
                ADD_BLOCK_SIGNATURE,
                &[
                    Value::FixedBytes(proof.state_root),
                    Value::Uint(U256::from(target_block)),
                ],
            )?,
        )
        .await?;

        let receipt = self
            .send_contract(
                &signer,
                proxy,
                encode_calldata(
                    UPDATE_STORAGE_SIGNATURE,
                    &[
                        Value::Bytes(Bytes::from(proof.to_rlp())),
                        Value::Uint(U256::from(target_block)),
                    ],
                )?,
            )
            .await?;
        Ok(receipt.transaction_hash)
    }

    /// Compute a diff and apply it in one step.
    pub async fn sync_once(&mut self, strategy: StrategyKind) -> Result<SyncOutcome, EngineError> {
        self.require_state("sync", EngineState::Migrated)?;
        let from = match self.src_block {
            Some(block) => block,
            None => self.get_current_block_number().await?,
        };
        let to = match self.cfg.target_block_tag {
            BlockIdentifier::Number(n) => n,
            _ => self.source.block_number().await?,
        };
        if from >= to {
            debug!(from, to, "source has not advanced");
            return Ok(SyncOutcome::NoOp);
        }
        let diff = self.compute_diff(strategy, from, to).await?;
        let keys: Vec<H256> = diff.iter().map(|slot| slot.key).collect();
        self.migrate_changes_to_proxy(&keys, to).await
    }

    pub async fn compute_diff(
        &self,
        strategy: StrategyKind,
        from_block: u64,
        to_block: u64,
    ) -> Result<Diff, EngineError> {
        let engine = DiffEngine {
            source: &self.source,
            target: &self.target,
            src_address: self.cfg.source_address,
            proxy_address: self.proxy_address,
            page_size: self.cfg.page_size,
        };
        engine.diff(strategy, from_block, to_block).await
    }

    pub async fn find_deployment_block(&self) -> Result<u64, EngineError> {
        diff::find_deployment_block(&self.source, self.cfg.source_address).await
    }

    /// Newest source block the relay holds a state root for.
    pub async fn get_latest_block_number(&self) -> Result<u64, EngineError> {
        let relay = self
            .relay_address
            .ok_or_else(|| EngineError::Config("no relay address".to_string()))?;
        let ret = self
            .call_contract(relay, GET_LATEST_BLOCK_NUMBER_SIGNATURE, &[])
            .await?;
        Ok(decode_uint(&ret).map_err(EngineError::from)?.as_u64())
    }

    /// Source block the relay reports the proxy synchronized to; rewrites
    /// the engine's cached block so subsequent diffs start there.
    pub async fn get_current_block_number(&mut self) -> Result<u64, EngineError> {
        let proxy = self
            .proxy_address
            .ok_or_else(|| EngineError::Config("no proxy address".to_string()))?;
        let current = self.relay_current_block(proxy).await?;
        self.src_block = Some(current);
        Ok(current)
    }

    /// Attested state root for a source block, straight from the relay.
    pub async fn get_state_root(&self, block_number: u64) -> Result<H256, EngineError> {
        let relay = self
            .relay_address
            .ok_or_else(|| EngineError::Config("no relay address".to_string()))?;
        let ret = self
            .call_contract(
                relay,
                GET_STATE_ROOT_SIGNATURE,
                &[Value::Uint(U256::from(block_number))],
            )
            .await?;
        chainmirror_common::calldata::decode_bytes32(&ret).map_err(EngineError::from)
    }

    async fn relay_current_block(&self, proxy: Address) -> Result<u64, EngineError> {
        let relay = self
            .relay_address
            .ok_or_else(|| EngineError::Config("no relay address".to_string()))?;
        let ret = self
            .call_contract(
                relay,
                GET_CURRENT_BLOCK_NUMBER_SIGNATURE,
                &[Value::Address(proxy)],
            )
            .await?;
        Ok(decode_uint(&ret).map_err(EngineError::from)?.as_u64())
    }

    async fn migration_state(&self, proxy: Address) -> Result<bool, EngineError> {
        let relay = self
            .relay_address
            .ok_or_else(|| EngineError::Config("no relay address".to_string()))?;
        let ret = self
            .call_contract(
                relay,
                GET_MIGRATION_STATE_SIGNATURE,
                &[Value::Address(proxy)],
            )
            .await?;
        decode_bool(&ret).map_err(EngineError::from)
    }

    async fn call_contract(
        &self,
        to: Address,
        signature: &str,
        args: &[Value],
    ) -> Result<Bytes, EngineError> {
        let calldata = encode_calldata(signature, args)?;
        Ok(self
            .target
            .call(to, &calldata, BlockIdentifier::Tag(BlockTag::Latest))
            .await?)
    }

    async fn send_contract(
        &self,
        signer: &Signer,
        to: Address,
        calldata: Vec<u8>,
    ) -> Result<RpcReceipt, EngineError> {
        let tx_hash = signer
            .send_transaction(
                &self.target,
                Some(to),
                Bytes::from(calldata),
                TxOverrides {
                    gas_limit: Some(self.cfg.gas_limit),
                    ..Default::default()
                },
            )
            .await?;
        Ok(wait_for_successful_receipt(tx_hash, &self.target, RECEIPT_RETRIES).await?)
    }

    async fn deploy_contract(
        &self,
        signer: &Signer,
        initcode: Bytes,
        constructor_args: &[u8],
        label: &str,
    ) -> Result<(Address, RpcReceipt), EngineError> {
        let mut data = initcode.to_vec();
        data.extend_from_slice(constructor_args);
        let tx_hash = signer
            .send_transaction(
                &self.target,
                None,
                Bytes::from(data),
                TxOverrides {
                    gas_limit: Some(self.cfg.gas_limit),
                    ..Default::default()
                },
            )
            .await?;
        let receipt = wait_for_successful_receipt(tx_hash, &self.target, RECEIPT_RETRIES).await?;
        let address = receipt.contract_address.ok_or_else(|| {
            EngineError::Fatal(format!("{label} deployment receipt carries no address"))
        })?;
        info!(
            %label,
            address = %format!("{address:#x}"),
            tx_hash = %format!("{tx_hash:#x}"),
            "contract deployed"
        );
        Ok((address, receipt))
    }

    fn signer(&self) -> Result<&Signer, EngineError> {
        self.signer
            .as_ref()
            .ok_or_else(|| EngineError::Config("engine not initialized".to_string()))
    }

    fn require_state(
        &self,
        operation: &'static str,
        required: EngineState,
    ) -> Result<(), EngineError> {
        if self.state != required {
            return Err(EngineError::State {
                operation,
                required: required.to_string(),
                actual: self.state.to_string(),
            });
        }
        Ok(())
    }
}
