use chainmirror_common::calldata::CalldataError;
use chainmirror_common::trie::ProofError;
use chainmirror_rpc::EthClientError;

/// Engine-level failures.
///
/// `NoOp` situations (empty diff, source block beyond target) are not
/// errors; they surface as [`crate::SyncOutcome::NoOp`].
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Missing or inconsistent configuration (credentials, addresses,
    /// artifacts).
    #[error("configuration error: {0}")]
    Config(String),
    /// The queried entity does not exist on-chain (no code, unknown block).
    #[error("not found: {0}")]
    NotFound(String),
    /// A node method failed; inside a fan-out this aborts the whole batch.
    #[error("rpc error: {0}")]
    Rpc(#[from] EthClientError),
    /// Local or on-chain proof verification failed.
    #[error("verification failed: {0}")]
    Verification(String),
    /// Operation requested in the wrong state-machine state.
    #[error("invalid engine state: {operation} requires {required}, engine is {actual}")]
    State {
        operation: &'static str,
        required: String,
        actual: String,
    },
    /// Unrecoverable mid-migration failure; the on-chain pair must be
    /// re-driven from scratch.
    #[error("fatal: {0}")]
    Fatal(String),
}

impl From<CalldataError> for EngineError {
    fn from(e: CalldataError) -> Self {
        EngineError::Fatal(format!("calldata encoding: {e}"))
    }
}

impl From<ProofError> for EngineError {
    fn from(e: ProofError) -> Self {
        EngineError::Verification(e.to_string())
    }
}
