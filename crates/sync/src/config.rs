use bytes::Bytes;
use chainmirror_common::types::{BlockIdentifier, BlockTag};
use ethereum_types::Address;

use crate::errors::EngineError;

/// Default bound on in-flight RPC calls per pipeline stage.
pub const DEFAULT_BATCH_SIZE: usize = 50;
/// Default key/value pairs per `addStorage` transaction.
pub const DEFAULT_CHUNK_SIZE: usize = 100;
/// Default gas limit for engine-submitted transactions.
pub const DEFAULT_GAS_LIMIT: u64 = 10_000_000;
/// Storage-key page size; matches the largest page the Parity endpoint
/// serves.
pub const DEFAULT_PAGE_SIZE: usize = 256;

/// Immutable engine configuration.
///
/// Addresses may be pre-existing (attach) or absent (minted during
/// `migrate_src_contract`); initcode artifacts are required exactly when
/// the corresponding address has to be deployed.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Source-chain endpoint URL.
    pub source_url: String,
    /// Target-chain endpoint URL.
    pub target_url: String,
    pub source_api_key: Option<String>,
    pub target_api_key: Option<String>,
    /// Encrypted JSON keystore for the target-chain deployer; with
    /// `keystore_password` absent the engine falls back to the first
    /// unlocked node account.
    pub keystore_path: Option<String>,
    pub keystore_password: Option<String>,
    pub gas_limit: u64,
    /// Bound *B* on in-flight RPC calls per stage.
    pub batch_size: usize,
    /// Chunk *K*: key/value pairs per bulk-migration transaction.
    pub chunk_size: usize,
    /// Page size for trie enumeration, capped at 256.
    pub page_size: usize,
    pub relay_address: Option<Address>,
    pub proxy_address: Option<Address>,
    pub logic_address: Option<Address>,
    /// The mirrored contract on the source chain.
    pub source_address: Address,
    pub src_block_tag: BlockIdentifier,
    pub target_block_tag: BlockIdentifier,
    /// Compiled relay initcode; required when `relay_address` is absent
    /// and a migration is driven.
    pub relay_initcode: Option<Bytes>,
    /// Compiled proxy initcode (constructor takes relay, logic, source);
    /// required when `proxy_address` is absent and a migration is driven.
    pub proxy_initcode: Option<Bytes>,
}

impl EngineConfig {
    pub fn new(source_url: String, target_url: String, source_address: Address) -> Self {
        Self {
            source_url,
            target_url,
            source_api_key: None,
            target_api_key: None,
            keystore_path: None,
            keystore_password: None,
            gas_limit: DEFAULT_GAS_LIMIT,
            batch_size: DEFAULT_BATCH_SIZE,
            chunk_size: DEFAULT_CHUNK_SIZE,
            page_size: DEFAULT_PAGE_SIZE,
            relay_address: None,
            proxy_address: None,
            logic_address: None,
            source_address,
            src_block_tag: BlockIdentifier::Tag(BlockTag::Latest),
            target_block_tag: BlockIdentifier::Tag(BlockTag::Latest),
            relay_initcode: None,
            proxy_initcode: None,
        }
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        if self.source_address.is_zero() {
            return Err(EngineError::Config(
                "source address must not be zero".to_string(),
            ));
        }
        if self.keystore_path.is_some() && self.keystore_password.is_none() {
            return Err(EngineError::Config(
                "keystore path given without a password".to_string(),
            ));
        }
        if self.chunk_size == 0 {
            return Err(EngineError::Config("chunk size must be > 0".to_string()));
        }
        if self.batch_size == 0 {
            return Err(EngineError::Config("batch size must be > 0".to_string()));
        }
        if self.page_size == 0 || self.page_size > DEFAULT_PAGE_SIZE {
            return Err(EngineError::Config(format!(
                "page size must be in 1..={DEFAULT_PAGE_SIZE}"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> EngineConfig {
        EngineConfig::new(
            "http://localhost:8545".to_string(),
            "http://localhost:8546".to_string(),
            Address::repeat_byte(0xaa),
        )
    }

    #[test]
    fn defaults_are_valid() {
        assert!(base().validate().is_ok());
    }

    #[test]
    fn keystore_requires_password() {
        let mut cfg = base();
        cfg.keystore_path = Some("deployer.json".to_string());
        assert!(matches!(cfg.validate(), Err(EngineError::Config(_))));
        cfg.keystore_password = Some("hunter2".to_string());
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn page_size_is_capped() {
        let mut cfg = base();
        cfg.page_size = 257;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn zero_source_address_is_rejected() {
        let mut cfg = base();
        cfg.source_address = Address::zero();
        assert!(cfg.validate().is_err());
    }
}
