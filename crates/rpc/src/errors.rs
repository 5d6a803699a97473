use ethereum_types::H256;

/// Failures surfaced by the RPC facade and the signing layer.
///
/// Any of these is fatal for the operation that triggered it: the engine
/// performs no transport-level retries (the caller restarts from a block
/// checkpoint instead).
#[derive(Debug, thiserror::Error)]
pub enum EthClientError {
    #[error("invalid endpoint url: {0}")]
    InvalidUrl(String),
    #[error("{method} request failed: {cause}")]
    Http { method: String, cause: String },
    #[error("{method} JSON-RPC error {code}: {message}")]
    Rpc {
        method: String,
        code: i64,
        message: String,
    },
    #[error("{method} response parse error: {cause}")]
    Parse { method: String, cause: String },
    #[error("transaction {0:#x} reverted on-chain")]
    TransactionReverted(H256),
    #[error("no receipt for transaction {0:#x} after {1} attempts")]
    ReceiptTimeout(H256, u64),
    #[error("keystore error: {0}")]
    Keystore(String),
    #[error("signer error: {0}")]
    Signer(String),
}
