use std::path::PathBuf;

use bytes::Bytes;
use chainmirror_common::types::BlockIdentifier;
use chainmirror_sync::config::{
    DEFAULT_BATCH_SIZE, DEFAULT_CHUNK_SIZE, DEFAULT_GAS_LIMIT, DEFAULT_PAGE_SIZE,
};
use chainmirror_sync::{EngineConfig, StrategyKind};
use clap::{Parser, Subcommand};
use ethereum_types::Address;

#[derive(Parser)]
#[command(
    name = "chainmirror",
    about = "Mirror a source-chain contract's storage onto a target-chain proxy"
)]
pub struct Cli {
    #[arg(
        long = "source-rpc-url",
        value_name = "RPC_URL",
        env = "CHAINMIRROR_SOURCE_RPC_URL",
        help_heading = "Endpoint options",
        help = "Source-chain JSON-RPC endpoint (archive node)."
    )]
    pub source_url: String,
    #[arg(
        long = "target-rpc-url",
        value_name = "RPC_URL",
        env = "CHAINMIRROR_TARGET_RPC_URL",
        help_heading = "Endpoint options",
        help = "Target-chain JSON-RPC endpoint."
    )]
    pub target_url: String,
    #[arg(
        long = "source-api-key",
        value_name = "KEY",
        env = "CHAINMIRROR_SOURCE_API_KEY",
        help_heading = "Endpoint options"
    )]
    pub source_api_key: Option<String>,
    #[arg(
        long = "target-api-key",
        value_name = "KEY",
        env = "CHAINMIRROR_TARGET_API_KEY",
        help_heading = "Endpoint options"
    )]
    pub target_api_key: Option<String>,
    #[arg(
        long = "keystore",
        value_name = "PATH",
        env = "CHAINMIRROR_KEYSTORE_PATH",
        help_heading = "Signer options",
        help = "Encrypted JSON keystore of the target-chain deployer; without it the first unlocked node account signs."
    )]
    pub keystore_path: Option<PathBuf>,
    #[arg(
        long = "keystore-password",
        value_name = "PASSWORD",
        env = "CHAINMIRROR_KEYSTORE_PASSWORD",
        help_heading = "Signer options"
    )]
    pub keystore_password: Option<String>,
    #[arg(
        long,
        default_value_t = DEFAULT_GAS_LIMIT,
        value_name = "UINT64",
        env = "CHAINMIRROR_GAS_LIMIT",
        help_heading = "Transaction options"
    )]
    pub gas_limit: u64,
    #[arg(
        long,
        default_value_t = DEFAULT_BATCH_SIZE,
        value_name = "COUNT",
        env = "CHAINMIRROR_BATCH_SIZE",
        help_heading = "Transaction options",
        help = "Bound on in-flight RPC calls per pipeline stage."
    )]
    pub batch_size: usize,
    #[arg(
        long,
        default_value_t = DEFAULT_CHUNK_SIZE,
        value_name = "COUNT",
        env = "CHAINMIRROR_CHUNK_SIZE",
        help_heading = "Transaction options",
        help = "Key/value pairs per bulk-migration transaction."
    )]
    pub chunk_size: usize,
    #[arg(
        long,
        default_value_t = DEFAULT_PAGE_SIZE,
        value_name = "COUNT",
        env = "CHAINMIRROR_PAGE_SIZE",
        help_heading = "Transaction options",
        help = "Storage keys per enumeration page (max 256)."
    )]
    pub page_size: usize,
    #[arg(
        long = "source-address",
        value_name = "ADDRESS",
        env = "CHAINMIRROR_SOURCE_ADDRESS",
        help_heading = "Contract options",
        help = "The mirrored contract on the source chain."
    )]
    pub source_address: Address,
    #[arg(
        long = "relay-address",
        value_name = "ADDRESS",
        env = "CHAINMIRROR_RELAY_ADDRESS",
        help_heading = "Contract options"
    )]
    pub relay_address: Option<Address>,
    #[arg(
        long = "proxy-address",
        value_name = "ADDRESS",
        env = "CHAINMIRROR_PROXY_ADDRESS",
        help_heading = "Contract options"
    )]
    pub proxy_address: Option<Address>,
    #[arg(
        long = "logic-address",
        value_name = "ADDRESS",
        env = "CHAINMIRROR_LOGIC_ADDRESS",
        help_heading = "Contract options"
    )]
    pub logic_address: Option<Address>,
    #[arg(
        long = "relay-initcode",
        value_name = "PATH",
        env = "CHAINMIRROR_RELAY_INITCODE",
        help_heading = "Contract options",
        help = "Hex file with the compiled relay initcode; required when no relay address is given."
    )]
    pub relay_initcode: Option<PathBuf>,
    #[arg(
        long = "proxy-initcode",
        value_name = "PATH",
        env = "CHAINMIRROR_PROXY_INITCODE",
        help_heading = "Contract options",
        help = "Hex file with the compiled proxy initcode; its constructor takes (relay, logic, source)."
    )]
    pub proxy_initcode: Option<PathBuf>,
    #[arg(
        long = "src-block",
        value_name = "BLOCK",
        default_value = "latest",
        env = "CHAINMIRROR_SRC_BLOCK",
        help_heading = "Contract options",
        help = "Source block the initial migration anchors to (number or `latest`)."
    )]
    pub src_block_tag: BlockIdentifier,
    #[arg(
        long = "target-block",
        value_name = "BLOCK",
        default_value = "latest",
        env = "CHAINMIRROR_TARGET_BLOCK",
        help_heading = "Contract options",
        help = "Source block incremental synchronization catches up to (number or `latest`)."
    )]
    pub target_block_tag: BlockIdentifier,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the initial migration: deploy relay/logic/proxy, bulk-copy
    /// every storage slot and verify the copy on-chain.
    Migrate,
    /// Apply the changes since the synchronized block to the proxy.
    Sync {
        #[arg(
            long,
            value_name = "STRATEGY",
            default_value = "srcTx",
            help = "Diff strategy: storage, getProof or srcTx."
        )]
        strategy: StrategyKind,
        #[arg(
            long,
            value_name = "SECONDS",
            help = "Repeat the synchronization cycle every SECONDS."
        )]
        interval: Option<u64>,
    },
    /// Compute and print a diff without writing anything.
    Diff {
        #[arg(long, value_name = "STRATEGY", default_value = "srcTx")]
        strategy: StrategyKind,
        #[arg(long = "from-block", value_name = "NUMBER")]
        from_block: u64,
        #[arg(long = "to-block", value_name = "NUMBER")]
        to_block: u64,
    },
    /// Dump the full storage key set of the source contract.
    Keys {
        #[arg(
            long = "block",
            value_name = "BLOCK",
            default_value = "latest",
            help = "Block to enumerate at (number or `latest`)."
        )]
        block: BlockIdentifier,
    },
    /// Binary-search the block at which the source contract was deployed.
    DeploymentBlock,
}

impl Cli {
    pub fn engine_config(&self) -> eyre::Result<EngineConfig> {
        let mut cfg = EngineConfig::new(
            self.source_url.clone(),
            self.target_url.clone(),
            self.source_address,
        );
        cfg.source_api_key = self.source_api_key.clone();
        cfg.target_api_key = self.target_api_key.clone();
        cfg.keystore_path = self
            .keystore_path
            .as_ref()
            .map(|p| p.to_string_lossy().into_owned());
        cfg.keystore_password = self.keystore_password.clone();
        cfg.gas_limit = self.gas_limit;
        cfg.batch_size = self.batch_size;
        cfg.chunk_size = self.chunk_size;
        cfg.page_size = self.page_size;
        cfg.relay_address = self.relay_address;
        cfg.proxy_address = self.proxy_address;
        cfg.logic_address = self.logic_address;
        cfg.src_block_tag = self.src_block_tag;
        cfg.target_block_tag = self.target_block_tag;
        cfg.relay_initcode = self
            .relay_initcode
            .as_deref()
            .map(read_hex_artifact)
            .transpose()?;
        cfg.proxy_initcode = self
            .proxy_initcode
            .as_deref()
            .map(read_hex_artifact)
            .transpose()?;
        Ok(cfg)
    }
}

/// Read a compiled-contract artifact: a file holding the initcode as hex,
/// with or without the `0x` prefix.
fn read_hex_artifact(path: &std::path::Path) -> eyre::Result<Bytes> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| eyre::eyre!("failed to read artifact {}: {e}", path.display()))?;
    let trimmed = contents.trim().trim_start_matches("0x");
    let bytes = hex::decode(trimmed)
        .map_err(|e| eyre::eyre!("artifact {} is not valid hex: {e}", path.display()))?;
    if bytes.is_empty() {
        return Err(eyre::eyre!("artifact {} is empty", path.display()));
    }
    Ok(Bytes::from(bytes))
}
