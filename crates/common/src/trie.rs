//! Verify-only Merkle-Patricia proof walking.
//!
//! Walks an ordered node list (as returned by `eth_getProof`) from a trie
//! root towards a keccak-derived path, resolving children either through
//! their 32-byte hash reference or inline when a node is embedded in its
//! parent. No trie is materialized; the walk either terminates at the
//! key's value, proves the key absent, or fails.

use ethereum_types::H256;
use rlp::Rlp;

use crate::constants::EMPTY_TRIE_HASH;
use crate::keccak;

#[derive(Debug, thiserror::Error)]
pub enum ProofError {
    #[error("proof node {index} does not hash to its reference")]
    HashMismatch { index: usize },
    #[error("malformed trie node: {0}")]
    Rlp(#[from] rlp::DecoderError),
    #[error("malformed trie node: {0}")]
    Malformed(String),
    #[error("proof ended before reaching the key")]
    Truncated,
}

enum NodeRef {
    Hash(H256),
    Inline(Vec<u8>),
}

/// Walk `nodes` from `root` along the nibble expansion of `path`.
///
/// Returns the raw value bytes stored at the key (for Ethereum tries this
/// is itself an RLP encoding), or `None` when the proof demonstrates the
/// key is not present in the trie.
pub fn verify_proof(
    root: H256,
    path: &[u8],
    nodes: &[Vec<u8>],
) -> Result<Option<Vec<u8>>, ProofError> {
    let nibbles = to_nibbles(path);
    let mut position = 0usize;
    let mut next = NodeRef::Hash(root);
    let mut supplied = nodes.iter().enumerate();

    loop {
        let node_bytes = match next {
            NodeRef::Hash(expected) => match supplied.next() {
                Some((index, node)) => {
                    if keccak(node) != expected {
                        return Err(ProofError::HashMismatch { index });
                    }
                    node.clone()
                }
                None if expected == EMPTY_TRIE_HASH => return Ok(None),
                None => return Err(ProofError::Truncated),
            },
            NodeRef::Inline(bytes) => bytes,
        };

        let node = Rlp::new(&node_bytes);
        match node.item_count()? {
            17 => {
                if position == nibbles.len() {
                    let value = node.at(16)?;
                    return Ok(if value.is_empty() {
                        None
                    } else {
                        Some(value.data()?.to_vec())
                    });
                }
                let child = node.at(nibbles[position] as usize)?;
                position += 1;
                match child_ref(&child)? {
                    Some(reference) => next = reference,
                    // nil child: the key is not in the trie
                    None => return Ok(None),
                }
            }
            2 => {
                let (prefix, is_leaf) = compact_decode(node.at(0)?.data()?)?;
                let remaining = &nibbles[position..];
                if is_leaf {
                    return Ok(if remaining == prefix.as_slice() {
                        Some(node.at(1)?.data()?.to_vec())
                    } else {
                        None
                    });
                }
                if !remaining.starts_with(&prefix) {
                    return Ok(None);
                }
                position += prefix.len();
                match child_ref(&node.at(1)?)? {
                    Some(reference) => next = reference,
                    None => {
                        return Err(ProofError::Malformed(
                            "extension node with nil child".to_string(),
                        ))
                    }
                }
            }
            other => {
                return Err(ProofError::Malformed(format!(
                    "trie node with {other} items"
                )))
            }
        }
    }
}

fn child_ref(child: &Rlp<'_>) -> Result<Option<NodeRef>, ProofError> {
    if child.is_list() {
        // nodes shorter than 32 bytes are embedded in their parent
        return Ok(Some(NodeRef::Inline(child.as_raw().to_vec())));
    }
    let data = child.data()?;
    match data.len() {
        0 => Ok(None),
        32 => Ok(Some(NodeRef::Hash(H256::from_slice(data)))),
        len => Err(ProofError::Malformed(format!(
            "child reference of {len} bytes"
        ))),
    }
}

fn to_nibbles(path: &[u8]) -> Vec<u8> {
    let mut nibbles = Vec::with_capacity(path.len() * 2);
    for byte in path {
        nibbles.push(byte >> 4);
        nibbles.push(byte & 0x0f);
    }
    nibbles
}

/// Hex-prefix decoding: returns the nibble sequence and the leaf flag.
fn compact_decode(encoded: &[u8]) -> Result<(Vec<u8>, bool), ProofError> {
    let first = *encoded
        .first()
        .ok_or_else(|| ProofError::Malformed("empty compact encoding".to_string()))?;
    let flag = first >> 4;
    if flag > 3 {
        return Err(ProofError::Malformed(format!(
            "invalid compact flag {flag}"
        )));
    }
    let is_leaf = flag >= 2;
    let mut nibbles = Vec::with_capacity(encoded.len() * 2);
    if flag & 1 == 1 {
        nibbles.push(first & 0x0f);
    }
    for byte in &encoded[1..] {
        nibbles.push(byte >> 4);
        nibbles.push(byte & 0x0f);
    }
    Ok((nibbles, is_leaf))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rlp::RlpStream;

    fn compact_encode(nibbles: &[u8], is_leaf: bool) -> Vec<u8> {
        let mut flag: u8 = if is_leaf { 2 } else { 0 };
        let mut out = Vec::new();
        let rest = if nibbles.len() % 2 == 1 {
            flag |= 1;
            out.push((flag << 4) | nibbles[0]);
            &nibbles[1..]
        } else {
            out.push(flag << 4);
            nibbles
        };
        for pair in rest.chunks(2) {
            out.push((pair[0] << 4) | pair[1]);
        }
        out
    }

    fn leaf_node(path_nibbles: &[u8], value: &[u8]) -> Vec<u8> {
        let mut stream = RlpStream::new_list(2);
        stream.append(&compact_encode(path_nibbles, true));
        stream.append(&value.to_vec());
        stream.out().to_vec()
    }

    #[test]
    fn single_leaf_inclusion() {
        let path = [0xabu8; 32];
        let value = b"stored value".to_vec();
        let leaf = leaf_node(&to_nibbles(&path), &value);
        let root = keccak(&leaf);

        let got = verify_proof(root, &path, &[leaf]).unwrap();
        assert_eq!(got, Some(value));
    }

    #[test]
    fn single_leaf_excludes_other_key() {
        let path = [0xabu8; 32];
        let leaf = leaf_node(&to_nibbles(&path), b"value");
        let root = keccak(&leaf);

        let other = [0xcdu8; 32];
        assert_eq!(verify_proof(root, &other, &[leaf]).unwrap(), None);
    }

    #[test]
    fn branch_with_hashed_leaves() {
        // Two keys diverging at the very first nibble (0x1... vs 0x2...).
        let path_a = [0x11u8; 32];
        let path_b = [0x22u8; 32];
        let value_a = [0xaau8; 32].to_vec();
        let value_b = [0xbbu8; 32].to_vec();

        let leaf_a = leaf_node(&to_nibbles(&path_a)[1..], &value_a);
        let leaf_b = leaf_node(&to_nibbles(&path_b)[1..], &value_b);
        assert!(leaf_a.len() >= 32, "leaf must be hash-referenced");

        let mut branch = RlpStream::new_list(17);
        for slot in 0..17 {
            match slot {
                1 => branch.append(&keccak(&leaf_a)),
                2 => branch.append(&keccak(&leaf_b)),
                _ => branch.append_empty_data(),
            };
        }
        let branch = branch.out().to_vec();
        let root = keccak(&branch);

        let got = verify_proof(root, &path_a, &[branch.clone(), leaf_a]).unwrap();
        assert_eq!(got, Some(value_a));

        let got = verify_proof(root, &path_b, &[branch.clone(), leaf_b]).unwrap();
        assert_eq!(got, Some(value_b));

        // Nibble 3 has a nil child: proof of absence needs the branch only.
        let absent = [0x33u8; 32];
        assert_eq!(verify_proof(root, &absent, &[branch]).unwrap(), None);
    }

    #[test]
    fn extension_then_branch() {
        // Shared prefix of one nibble, then divergence.
        let path_a = [0x51u8, 0x11, 0x11, 0x11];
        let path_b = [0x52u8, 0x22, 0x22, 0x22];
        let value_a = [0xaau8; 32].to_vec();
        let value_b = [0xbbu8; 32].to_vec();

        // after the shared nibble 5, branch on nibble 1 vs 2
        let leaf_a = leaf_node(&to_nibbles(&path_a)[2..], &value_a);
        let leaf_b = leaf_node(&to_nibbles(&path_b)[2..], &value_b);

        let mut branch = RlpStream::new_list(17);
        for slot in 0..17 {
            match slot {
                1 => branch.append(&keccak(&leaf_a)),
                2 => branch.append(&keccak(&leaf_b)),
                _ => branch.append_empty_data(),
            };
        }
        let branch = branch.out().to_vec();

        let mut extension = RlpStream::new_list(2);
        extension.append(&compact_encode(&[5], false));
        extension.append(&keccak(&branch));
        let extension = extension.out().to_vec();
        let root = keccak(&extension);

        let got = verify_proof(root, &path_a, &[extension, branch, leaf_a]).unwrap();
        assert_eq!(got, Some(value_a));
    }

    #[test]
    fn tampered_node_is_rejected() {
        let path = [0xabu8; 32];
        let leaf = leaf_node(&to_nibbles(&path), b"value");
        let root = keccak(&leaf);

        let mut tampered = leaf.clone();
        *tampered.last_mut().unwrap() ^= 1;
        let err = verify_proof(root, &path, &[tampered]).unwrap_err();
        assert!(matches!(err, ProofError::HashMismatch { index: 0 }));
    }

    #[test]
    fn empty_trie_proves_absence() {
        let got = verify_proof(EMPTY_TRIE_HASH, &[0x11u8; 32], &[]).unwrap();
        assert_eq!(got, None);
    }

    #[test]
    fn truncated_proof_is_an_error() {
        let root = H256::repeat_byte(0x42);
        let err = verify_proof(root, &[0u8; 32], &[]).unwrap_err();
        assert!(matches!(err, ProofError::Truncated));
    }
}
