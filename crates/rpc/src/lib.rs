//! Typed JSON-RPC facade over the source and target nodes, plus the
//! transaction signing layer used for target-chain writes.

pub mod client;
pub mod errors;
pub mod signer;
pub mod types;

pub use client::EthClient;
pub use errors::EthClientError;
pub use signer::{
    create_address, wait_for_successful_receipt, wait_for_transaction_receipt, LocalSigner,
    NodeSigner, Signer, TxOverrides,
};
