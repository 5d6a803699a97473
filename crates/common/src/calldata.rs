//! Minimal ABI calldata encoding for the relay/proxy surface.
//!
//! Covers exactly the parameter kinds those contracts take: `address`,
//! `uint256`, `bytes32`, `bool`, dynamic `bytes`, and `bytes32[]`.

use bytes::Bytes;
use ethereum_types::{Address, H256, U256};

use crate::keccak;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Address(Address),
    Uint(U256),
    FixedBytes(H256),
    Bool(bool),
    Bytes(Bytes),
    Array(Vec<Value>),
}

#[derive(Debug, thiserror::Error)]
pub enum CalldataError {
    #[error("unsupported array element in calldata: {0}")]
    UnsupportedArrayElement(String),
    #[error("return data too short: expected at least {expected} bytes, got {got}")]
    ShortReturnData { expected: usize, got: usize },
}

impl Value {
    fn is_dynamic(&self) -> bool {
        matches!(self, Value::Bytes(_) | Value::Array(_))
    }

    /// Single-word encoding of a static value.
    fn head_word(&self) -> [u8; 32] {
        let mut word = [0u8; 32];
        match self {
            Value::Address(addr) => word[12..].copy_from_slice(addr.as_bytes()),
            Value::Uint(value) => word = value.to_big_endian(),
            Value::FixedBytes(bytes) => word.copy_from_slice(bytes.as_bytes()),
            Value::Bool(flag) => word[31] = *flag as u8,
            Value::Bytes(_) | Value::Array(_) => unreachable!("dynamic value has no head word"),
        }
        word
    }

    fn tail_bytes(&self) -> Result<Vec<u8>, CalldataError> {
        match self {
            Value::Bytes(data) => {
                let mut out = Value::Uint(U256::from(data.len())).head_word().to_vec();
                out.extend_from_slice(data);
                // pad to a word boundary
                let rem = data.len() % 32;
                if rem != 0 {
                    out.extend(std::iter::repeat(0u8).take(32 - rem));
                }
                Ok(out)
            }
            Value::Array(items) => {
                let mut out = Value::Uint(U256::from(items.len())).head_word().to_vec();
                for item in items {
                    if item.is_dynamic() {
                        return Err(CalldataError::UnsupportedArrayElement(format!("{item:?}")));
                    }
                    out.extend_from_slice(&item.head_word());
                }
                Ok(out)
            }
            _ => unreachable!("static value has no tail"),
        }
    }
}

/// Keccak-based 4-byte function selector for a canonical signature such as
/// `addBlock(bytes32,uint256)`. Whitespace is tolerated and stripped.
pub fn selector(signature: &str) -> [u8; 4] {
    let canonical: String = signature.chars().filter(|c| !c.is_whitespace()).collect();
    let hash = keccak(canonical.as_bytes());
    let mut out = [0u8; 4];
    out.copy_from_slice(&hash.as_bytes()[..4]);
    out
}

/// ABI-encode `selector ‖ head ‖ tail` for a call to `signature`.
pub fn encode_calldata(signature: &str, values: &[Value]) -> Result<Vec<u8>, CalldataError> {
    let mut calldata = selector(signature).to_vec();
    calldata.extend(encode_values(values)?);
    Ok(calldata)
}

/// ABI-encode a value sequence without a selector (constructor arguments).
pub fn encode_values(values: &[Value]) -> Result<Vec<u8>, CalldataError> {
    let head_size = 32 * values.len();
    let mut head = Vec::with_capacity(head_size);
    let mut tail = Vec::new();
    for value in values {
        if value.is_dynamic() {
            let offset = Value::Uint(U256::from(head_size + tail.len()));
            head.extend_from_slice(&offset.head_word());
            tail.extend(value.tail_bytes()?);
        } else {
            head.extend_from_slice(&value.head_word());
        }
    }
    head.extend(tail);
    Ok(head)
}

fn return_word(data: &[u8]) -> Result<[u8; 32], CalldataError> {
    if data.len() < 32 {
        return Err(CalldataError::ShortReturnData {
            expected: 32,
            got: data.len(),
        });
    }
    let mut word = [0u8; 32];
    word.copy_from_slice(&data[..32]);
    Ok(word)
}

/// First return word as a big-endian integer.
pub fn decode_uint(data: &[u8]) -> Result<U256, CalldataError> {
    Ok(U256::from_big_endian(&return_word(data)?))
}

/// First return word as a right-aligned address.
pub fn decode_address(data: &[u8]) -> Result<Address, CalldataError> {
    Ok(Address::from_slice(&return_word(data)?[12..]))
}

/// First return word as a boolean.
pub fn decode_bool(data: &[u8]) -> Result<bool, CalldataError> {
    Ok(!decode_uint(data)?.is_zero())
}

/// First return word verbatim.
pub fn decode_bytes32(data: &[u8]) -> Result<H256, CalldataError> {
    Ok(H256(return_word(data)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selector_matches_known_transfer_hash() {
        // keccak("transfer(address,uint256)") starts with a9059cbb.
        assert_eq!(selector("transfer(address,uint256)"), [0xa9, 0x05, 0x9c, 0xbb]);
        // Whitespace in a signature does not change the selector.
        assert_eq!(
            selector("transfer(address, uint256)"),
            [0xa9, 0x05, 0x9c, 0xbb]
        );
    }

    #[test]
    fn static_arguments_pack_one_word_each() {
        let calldata = encode_calldata(
            "addBlock(bytes32,uint256)",
            &[
                Value::FixedBytes(H256::repeat_byte(0xab)),
                Value::Uint(U256::from(7)),
            ],
        )
        .unwrap();
        assert_eq!(calldata.len(), 4 + 64);
        assert_eq!(&calldata[4..36], H256::repeat_byte(0xab).as_bytes());
        assert_eq!(calldata[67], 7);
    }

    #[test]
    fn address_is_right_aligned() {
        let addr = Address::repeat_byte(0x42);
        let encoded = encode_values(&[Value::Address(addr)]).unwrap();
        assert_eq!(&encoded[..12], &[0u8; 12]);
        assert_eq!(&encoded[12..], addr.as_bytes());
    }

    #[test]
    fn dynamic_bytes_layout() {
        let calldata = encode_calldata(
            "updateStorage(bytes,uint256)",
            &[
                Value::Bytes(Bytes::from_static(&[0xde, 0xad, 0xbe, 0xef])),
                Value::Uint(U256::from(99)),
            ],
        )
        .unwrap();
        let args = &calldata[4..];
        // head: offset to bytes (0x40), then the uint.
        assert_eq!(U256::from_big_endian(&args[..32]), U256::from(0x40));
        assert_eq!(U256::from_big_endian(&args[32..64]), U256::from(99));
        // tail: length then right-padded payload.
        assert_eq!(U256::from_big_endian(&args[64..96]), U256::from(4));
        assert_eq!(&args[96..100], &[0xde, 0xad, 0xbe, 0xef]);
        assert_eq!(&args[100..128], &[0u8; 28]);
        assert_eq!(args.len(), 128);
    }

    #[test]
    fn two_arrays_get_distinct_offsets() {
        let keys = vec![
            Value::FixedBytes(H256::repeat_byte(1)),
            Value::FixedBytes(H256::repeat_byte(2)),
        ];
        let values = vec![
            Value::FixedBytes(H256::repeat_byte(3)),
            Value::FixedBytes(H256::repeat_byte(4)),
        ];
        let calldata = encode_calldata(
            "addStorage(bytes32[],bytes32[])",
            &[Value::Array(keys), Value::Array(values)],
        )
        .unwrap();
        let args = &calldata[4..];
        // offsets: 0x40 and 0x40 + (1 + 2) * 32 = 0xa0.
        assert_eq!(U256::from_big_endian(&args[..32]), U256::from(0x40));
        assert_eq!(U256::from_big_endian(&args[32..64]), U256::from(0xa0));
        assert_eq!(U256::from_big_endian(&args[64..96]), U256::from(2));
        assert_eq!(&args[96..128], H256::repeat_byte(1).as_bytes());
        assert_eq!(&args[192..224], H256::repeat_byte(3).as_bytes());
    }

    #[test]
    fn nested_dynamic_arrays_are_rejected() {
        let nested = Value::Array(vec![Value::Bytes(Bytes::new())]);
        assert!(encode_values(&[nested]).is_err());
    }

    #[test]
    fn return_word_decoding() {
        let mut ret = [0u8; 32];
        ret[31] = 1;
        assert!(decode_bool(&ret).unwrap());
        assert_eq!(decode_uint(&ret).unwrap(), U256::one());
        assert!(decode_uint(&ret[..16]).is_err());

        let mut addr_ret = [0u8; 32];
        addr_ret[12..].copy_from_slice(Address::repeat_byte(0x99).as_bytes());
        assert_eq!(decode_address(&addr_ret).unwrap(), Address::repeat_byte(0x99));
    }
}
