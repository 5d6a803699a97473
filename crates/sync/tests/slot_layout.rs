//! Solidity storage-layout scenarios against the engine's canonical
//! key/value handling: value types occupy their declaration slots, mapping
//! entries live at `keccak256(pad32(key) ‖ pad32(slot))`.

use chainmirror_common::{keccak, pad32, word_to_u256};
use chainmirror_sync::diff::{Diff, SlotDiff};
use ethereum_types::{Address, H256, U256};

/// `contract { uint a; uint b = 42; address owner; }` — after deployment
/// the non-zero slots are slot 1 (b) and slot 2 (owner).
#[test]
fn value_types_occupy_declaration_slots() {
    let slot_b = pad32(U256::one());
    let slot_owner = pad32(U256::from(2));
    assert_eq!(slot_b, H256::from_low_u64_be(1));

    let b_value = pad32(U256::from(42));
    assert_eq!(b_value.as_bytes()[31], 0x2a);

    // the owner address is stored left-padded to a full word
    let owner = Address::repeat_byte(0x77);
    let owner_word = pad32(U256::from_big_endian(owner.as_bytes()));
    assert_eq!(&owner_word.as_bytes()[..12], &[0u8; 12]);
    assert_eq!(&owner_word.as_bytes()[12..], owner.as_bytes());
    assert_ne!(slot_b, slot_owner);
}

/// `mapping(uint => uint)` at slot 3: entry `m` lives at
/// `keccak256(pad32(m) ‖ pad32(3))`.
#[test]
fn mapping_entry_slot_derivation() {
    let mapping_slot = U256::from(3);
    let m = U256::from(0xbeef);

    let mut preimage = [0u8; 64];
    preimage[..32].copy_from_slice(pad32(m).as_bytes());
    preimage[32..].copy_from_slice(pad32(mapping_slot).as_bytes());
    let entry_slot = keccak(preimage);

    // the derived slot is unrelated to the declaration slots
    assert_ne!(entry_slot, H256::from_low_u64_be(3));
    // and it is stable: same key, same slot
    assert_eq!(entry_slot, keccak(preimage));

    // v = 1000 stored there round-trips through word padding
    let value = pad32(U256::from(1000));
    assert_eq!(word_to_u256(value), U256::from(0x3e8));
}

/// A diff over the scenario contract after `setA(1337)`: slot 0 flips from
/// zero to 0x539 and is the only entry.
#[test]
fn diff_shape_for_a_single_write() {
    let diff: Diff = vec![SlotDiff {
        key: H256::from_low_u64_be(0),
        src_value: U256::from(0x539),
        target_value: U256::zero(),
    }];
    assert_eq!(diff.len(), 1);
    assert_eq!(diff[0].src_value, U256::from(1337));
    assert!(diff[0].target_value.is_zero());
}
