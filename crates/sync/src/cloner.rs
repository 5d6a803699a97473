//! Runtime-bytecode cloning.
//!
//! The logic copy deployed on the target chain must be byte-identical to
//! the source contract's runtime code. Instead of replaying the original
//! constructor, the runtime bytes are wrapped in a minimal initcode stub
//! that returns them verbatim; constructor-set slots arrive through the
//! storage migration instead.

use chainmirror_common::types::BlockIdentifier;
use chainmirror_rpc::EthClient;
use ethereum_types::Address;

use crate::errors::EngineError;

/// `PUSH2 len PUSH1 offset PUSH1 0 CODECOPY PUSH2 len PUSH1 0 RETURN`
///
/// The stub's own length: 3 + 2 + 2 + 1 + 3 + 2 + 1 bytes. CODECOPY's
/// source offset is this same value, so the copy starts at the first
/// runtime byte.
const STUB_LEN: usize = 14;

/// Wrap runtime bytecode in a deployable initcode stub.
pub fn clone_initcode(runtime: &[u8]) -> Result<Vec<u8>, EngineError> {
    if runtime.is_empty() {
        return Err(EngineError::NotFound(
            "cannot clone empty runtime bytecode".to_string(),
        ));
    }
    let len = u16::try_from(runtime.len()).map_err(|_| {
        EngineError::Fatal(format!(
            "runtime bytecode of {} bytes exceeds the PUSH2 stub range",
            runtime.len()
        ))
    })?;
    let [len_hi, len_lo] = len.to_be_bytes();

    let mut initcode = Vec::with_capacity(STUB_LEN + runtime.len());
    initcode.extend_from_slice(&[
        0x61, len_hi, len_lo, // PUSH2 len
        0x60, STUB_LEN as u8, // PUSH1 offset of the runtime bytes
        0x60, 0x00, // PUSH1 0
        0x39, // CODECOPY
        0x61, len_hi, len_lo, // PUSH2 len
        0x60, 0x00, // PUSH1 0
        0xf3, // RETURN
    ]);
    initcode.extend_from_slice(runtime);
    Ok(initcode)
}

/// Fetch the source contract's runtime code at `block` and wrap it for
/// deployment.
pub async fn clone_contract(
    client: &EthClient,
    address: Address,
    block: BlockIdentifier,
) -> Result<Vec<u8>, EngineError> {
    let runtime = client.get_code(address, block).await?;
    if runtime.is_empty() {
        return Err(EngineError::NotFound(format!(
            "no code at {address:#x} at block {block}"
        )));
    }
    clone_initcode(&runtime)
}
