//! Target-chain transaction signing.
//!
//! Two signer flavours: a local secp256k1 key (optionally decrypted from an
//! encrypted JSON keystore) producing EIP-155 legacy raw transactions, or
//! an unlocked node account where the node itself signs.

use std::path::Path;
use std::time::Duration;

use bytes::Bytes;
use chainmirror_common::keccak;
use chainmirror_common::types::{BlockIdentifier, BlockTag};
use ethereum_types::{Address, H256, U256};
use rlp::RlpStream;
use secp256k1::{Message, PublicKey, SecretKey, SECP256K1};
use tracing::debug;

use crate::client::EthClient;
use crate::errors::EthClientError;
use crate::types::RpcReceipt;

/// Gas limit applied when neither the caller nor the configuration
/// overrides it.
pub const DEFAULT_GAS_LIMIT: u64 = 10_000_000;

/// Per-transaction knobs; unset fields are resolved against the node
/// (pending nonce, current gas price) at submission time.
#[derive(Debug, Clone, Default)]
pub struct TxOverrides {
    pub nonce: Option<u64>,
    pub gas_limit: Option<u64>,
    pub gas_price: Option<U256>,
    pub value: U256,
}

#[derive(Debug, Clone)]
pub enum Signer {
    Local(LocalSigner),
    Node(NodeSigner),
}

#[derive(Debug, Clone)]
pub struct LocalSigner {
    secret_key: SecretKey,
    address: Address,
    chain_id: u64,
}

#[derive(Debug, Clone)]
pub struct NodeSigner {
    pub address: Address,
}

/// Unsigned legacy transaction body.
#[derive(Debug, Clone)]
pub struct LegacyTx {
    pub nonce: u64,
    pub gas_price: U256,
    pub gas_limit: u64,
    pub to: Option<Address>,
    pub value: U256,
    pub data: Bytes,
}

impl LocalSigner {
    pub fn new(secret_key: SecretKey, chain_id: u64) -> Self {
        let address = address_from_secret_key(&secret_key);
        Self {
            secret_key,
            address,
            chain_id,
        }
    }

    /// Decrypt a Web3 Secret Storage keystore file.
    pub fn from_keystore(
        path: impl AsRef<Path>,
        password: &str,
        chain_id: u64,
    ) -> Result<Self, EthClientError> {
        let key_bytes = eth_keystore::decrypt_key(path, password)
            .map_err(|e| EthClientError::Keystore(e.to_string()))?;
        let secret_key = SecretKey::from_slice(&key_bytes)
            .map_err(|e| EthClientError::Keystore(e.to_string()))?;
        Ok(Self::new(secret_key, chain_id))
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// EIP-155 signing: the payload commits to the chain id, and the
    /// recovery id is folded into `v = chain_id * 2 + 35 + rec`.
    pub fn sign_transaction(&self, tx: &LegacyTx) -> Vec<u8> {
        let payload = rlp_tx(tx, SigningFields::ChainId(self.chain_id));
        let digest = keccak(&payload);

        let message = Message::from_digest(digest.0);
        let signature = SECP256K1.sign_ecdsa_recoverable(&message, &self.secret_key);
        let (recovery_id, compact) = signature.serialize_compact();

        let v = self.chain_id * 2 + 35 + recovery_id.to_i32() as u64;
        let r = U256::from_big_endian(&compact[..32]);
        let s = U256::from_big_endian(&compact[32..]);
        rlp_tx(tx, SigningFields::Signature { v, r, s })
    }
}

enum SigningFields {
    ChainId(u64),
    Signature { v: u64, r: U256, s: U256 },
}

fn rlp_tx(tx: &LegacyTx, tail: SigningFields) -> Vec<u8> {
    let mut stream = RlpStream::new_list(9);
    stream.append(&tx.nonce);
    stream.append(&tx.gas_price);
    stream.append(&tx.gas_limit);
    match tx.to {
        Some(to) => stream.append(&to),
        None => stream.append_empty_data(),
    };
    stream.append(&tx.value);
    stream.append(&tx.data.to_vec());
    match tail {
        SigningFields::ChainId(chain_id) => {
            stream.append(&chain_id);
            stream.append(&0u8);
            stream.append(&0u8);
        }
        SigningFields::Signature { v, r, s } => {
            stream.append(&v);
            stream.append(&r);
            stream.append(&s);
        }
    }
    stream.out().to_vec()
}

fn address_from_secret_key(secret_key: &SecretKey) -> Address {
    let public_key = PublicKey::from_secret_key(SECP256K1, secret_key);
    let uncompressed = public_key.serialize_uncompressed();
    // skip the 0x04 marker, keep the low 20 bytes of the hash
    Address::from_slice(&keccak(&uncompressed[1..]).as_bytes()[12..])
}

/// `CREATE` address: `keccak(rlp([sender, nonce]))[12..]`.
pub fn create_address(sender: Address, nonce: u64) -> Address {
    let mut stream = RlpStream::new_list(2);
    stream.append(&sender);
    stream.append(&nonce);
    Address::from_slice(&keccak(stream.out().to_vec()).as_bytes()[12..])
}

impl Signer {
    pub fn address(&self) -> Address {
        match self {
            Signer::Local(signer) => signer.address,
            Signer::Node(signer) => signer.address,
        }
    }

    /// Submit a transaction through this signer. Missing overrides are
    /// resolved against the node; the returned hash still has to be
    /// awaited with [`wait_for_transaction_receipt`].
    pub async fn send_transaction(
        &self,
        client: &EthClient,
        to: Option<Address>,
        data: Bytes,
        overrides: TxOverrides,
    ) -> Result<H256, EthClientError> {
        let gas_limit = overrides.gas_limit.unwrap_or(DEFAULT_GAS_LIMIT);
        let gas_price = match overrides.gas_price {
            Some(price) => price,
            None => client.gas_price().await?,
        };
        match self {
            Signer::Local(signer) => {
                let nonce = match overrides.nonce {
                    Some(nonce) => nonce,
                    None => {
                        client
                            .get_nonce(signer.address, BlockIdentifier::Tag(BlockTag::Pending))
                            .await?
                    }
                };
                let tx = LegacyTx {
                    nonce,
                    gas_price,
                    gas_limit,
                    to,
                    value: overrides.value,
                    data,
                };
                let raw = signer.sign_transaction(&tx);
                client.send_raw_transaction(&raw).await
            }
            Signer::Node(signer) => {
                client
                    .send_transaction(
                        signer.address,
                        to,
                        overrides.value,
                        &data,
                        gas_limit,
                        gas_price,
                    )
                    .await
            }
        }
    }
}

/// Poll for a transaction receipt; gives up after `max_attempts` polls.
pub async fn wait_for_transaction_receipt(
    hash: H256,
    client: &EthClient,
    max_attempts: u64,
) -> Result<RpcReceipt, EthClientError> {
    for attempt in 0..max_attempts {
        if let Some(receipt) = client.get_transaction_receipt(hash).await? {
            debug!(tx_hash = %format!("{hash:#x}"), attempt, "transaction included");
            return Ok(receipt);
        }
        tokio::time::sleep(Duration::from_millis(500)).await;
    }
    Err(EthClientError::ReceiptTimeout(hash, max_attempts))
}

/// Like [`wait_for_transaction_receipt`] but treats a reverted receipt as
/// an error.
pub async fn wait_for_successful_receipt(
    hash: H256,
    client: &EthClient,
    max_attempts: u64,
) -> Result<RpcReceipt, EthClientError> {
    let receipt = wait_for_transaction_receipt(hash, client, max_attempts).await?;
    if !receipt.succeeded() {
        return Err(EthClientError::TransactionReverted(hash));
    }
    Ok(receipt)
}
