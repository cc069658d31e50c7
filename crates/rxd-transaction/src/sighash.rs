//! Signature hash computation.
//!
//! Implements the BIP143-style double-hash preimage used on this chain:
//! the hash commits to the value being spent and requires the fork-id
//! bit as replay protection. Hash types without the fork-id bit are
//! rejected rather than silently hashed.

use rxd_primitives::hash::sha256d;
use rxd_primitives::util::{ByteWriter, VarInt};

use crate::transaction::Transaction;
use crate::TransactionError;

// -----------------------------------------------------------------------
// Sighash flag constants
// -----------------------------------------------------------------------

/// Sign all inputs and all outputs (the default).
pub const SIGHASH_ALL: u32 = 0x01;

/// Sign all inputs but no outputs.
pub const SIGHASH_NONE: u32 = 0x02;

/// Sign all inputs and only the output matching the signed input index.
pub const SIGHASH_SINGLE: u32 = 0x03;

/// Replay-protection bit, mandatory on this chain.
pub const SIGHASH_FORKID: u32 = 0x40;

/// Sign only the current input, allowing other inputs to change.
pub const SIGHASH_ANYONECANPAY: u32 = 0x80;

/// Mask extracting the base sighash type from the low five bits.
pub const SIGHASH_MASK: u32 = 0x1F;

/// The chain's fork-id value, carried in the high 24 bits of the
/// serialized hash type. Zero for this chain.
pub const FORK_ID: u32 = 0;

/// The standard hash type: ALL | FORKID.
pub const SIGHASH_ALL_FORKID: u32 = SIGHASH_ALL | SIGHASH_FORKID;

/// Extract the base variant (ALL, NONE, SINGLE) from a hash type.
pub fn base_type(hash_type: u32) -> u32 {
    hash_type & SIGHASH_MASK
}

/// Check the fork-id bit.
pub fn has_fork_id(hash_type: u32) -> bool {
    hash_type & SIGHASH_FORKID != 0
}

/// Check the anyone-can-pay bit.
pub fn has_anyone_can_pay(hash_type: u32) -> bool {
    hash_type & SIGHASH_ANYONECANPAY != 0
}

// -----------------------------------------------------------------------
// Signature hash
// -----------------------------------------------------------------------

/// Compute the 32-byte message hash signed for `input_index`.
///
/// `script_code` is the sub-script being satisfied (from the most recent
/// code separator, signature pushes removed); `amount` is the value of
/// the output being spent.
///
/// Fails with `MissingForkId` when the hash type lacks the fork-id bit
/// and with `InvalidTransaction` when the input index is out of range.
pub fn signature_hash(
    tx: &Transaction,
    input_index: usize,
    script_code: &[u8],
    hash_type: u32,
    amount: i64,
) -> Result<[u8; 32], TransactionError> {
    let preimage = calc_preimage(tx, input_index, script_code, hash_type, amount)?;
    Ok(sha256d(&preimage))
}

/// Compute the raw preimage bytes before the final double hash.
///
/// Layout (little-endian where numeric):
/// 1. version (4)
/// 2. hashPrevouts (32) — sha256d of all outpoints, or zeros under
///    ANYONECANPAY
/// 3. hashSequence (32) — sha256d of all sequences, or zeros under
///    ANYONECANPAY / SINGLE / NONE
/// 4. this input's outpoint (36)
/// 5. VarInt(len) ‖ script_code
/// 6. amount (8)
/// 7. this input's sequence (4)
/// 8. hashOutputs (32) — all outputs for ALL, the matching output for
///    SINGLE when one exists, zeros otherwise
/// 9. lock_time (4)
/// 10. hash type widened to 4 bytes with the fork-id in the high 24 bits
pub fn calc_preimage(
    tx: &Transaction,
    input_index: usize,
    script_code: &[u8],
    hash_type: u32,
    amount: i64,
) -> Result<Vec<u8>, TransactionError> {
    if !has_fork_id(hash_type) {
        return Err(TransactionError::MissingForkId(hash_type));
    }
    if input_index >= tx.inputs.len() {
        return Err(TransactionError::InvalidTransaction(format!(
            "input index {} out of range (tx has {} inputs)",
            input_index,
            tx.inputs.len()
        )));
    }

    let input = &tx.inputs[input_index];
    let base = base_type(hash_type);
    let anyone_can_pay = has_anyone_can_pay(hash_type);

    let hash_prevouts = if !anyone_can_pay {
        prevouts_hash(tx)
    } else {
        [0u8; 32]
    };

    let hash_sequence = if !anyone_can_pay && base != SIGHASH_SINGLE && base != SIGHASH_NONE {
        sequence_hash(tx)
    } else {
        [0u8; 32]
    };

    let hash_outputs = if base != SIGHASH_SINGLE && base != SIGHASH_NONE {
        outputs_hash(tx, None)
    } else if base == SIGHASH_SINGLE && input_index < tx.outputs.len() {
        outputs_hash(tx, Some(input_index))
    } else {
        [0u8; 32]
    };

    let mut writer = ByteWriter::with_capacity(156 + script_code.len());
    writer.write_i32_le(tx.version);
    writer.write_bytes(&hash_prevouts);
    writer.write_bytes(&hash_sequence);
    input.prevout.write_to(&mut writer);
    writer.write_varint(VarInt::from(script_code.len()));
    writer.write_bytes(script_code);
    writer.write_i64_le(amount);
    writer.write_u32_le(input.sequence);
    writer.write_bytes(&hash_outputs);
    writer.write_u32_le(tx.lock_time);
    writer.write_u32_le(hash_type | (FORK_ID << 8));

    Ok(writer.into_bytes())
}

fn prevouts_hash(tx: &Transaction) -> [u8; 32] {
    let mut writer = ByteWriter::with_capacity(tx.inputs.len() * 36);
    for input in &tx.inputs {
        input.prevout.write_to(&mut writer);
    }
    sha256d(writer.as_bytes())
}

fn sequence_hash(tx: &Transaction) -> [u8; 32] {
    let mut writer = ByteWriter::with_capacity(tx.inputs.len() * 4);
    for input in &tx.inputs {
        writer.write_u32_le(input.sequence);
    }
    sha256d(writer.as_bytes())
}

fn outputs_hash(tx: &Transaction, single: Option<usize>) -> [u8; 32] {
    let mut writer = ByteWriter::new();
    match single {
        None => {
            for output in &tx.outputs {
                writer.write_bytes(&output.to_bytes());
            }
        }
        Some(index) => writer.write_bytes(&tx.outputs[index].to_bytes()),
    }
    sha256d(writer.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::TransactionInput;
    use crate::outpoint::Outpoint;
    use crate::output::TransactionOutput;
    use rxd_script::Script;

    fn sample_tx() -> Transaction {
        let mut tx = Transaction::new();
        for i in 0..2u8 {
            let mut input = TransactionInput::new(Outpoint::new([i; 32], i as u32));
            input.sequence = 0xFFFF_FFFE;
            tx.inputs.push(input);
        }
        tx.outputs.push(TransactionOutput::new(
            10_000,
            Script::from_bytes(&[0x51]),
        ));
        tx.outputs.push(TransactionOutput::new(
            20_000,
            Script::from_bytes(&[0x52]),
        ));
        tx.lock_time = 5;
        tx
    }

    #[test]
    fn test_rejects_missing_forkid() {
        let tx = sample_tx();
        let err = signature_hash(&tx, 0, &[0x51], SIGHASH_ALL, 1000).unwrap_err();
        assert!(matches!(err, TransactionError::MissingForkId(0x01)));
    }

    #[test]
    fn test_rejects_bad_input_index() {
        let tx = sample_tx();
        assert!(signature_hash(&tx, 2, &[0x51], SIGHASH_ALL_FORKID, 1000).is_err());
    }

    #[test]
    fn test_all_commits_to_outputs() {
        let mut tx = sample_tx();
        let before = signature_hash(&tx, 0, &[0x51], SIGHASH_ALL_FORKID, 1000).unwrap();
        tx.outputs[1].value += 1;
        let after = signature_hash(&tx, 0, &[0x51], SIGHASH_ALL_FORKID, 1000).unwrap();
        assert_ne!(before, after);
    }

    #[test]
    fn test_none_masks_outputs() {
        let mut tx = sample_tx();
        let flags = SIGHASH_NONE | SIGHASH_FORKID;
        let before = signature_hash(&tx, 0, &[0x51], flags, 1000).unwrap();
        tx.outputs[1].value += 1;
        let after = signature_hash(&tx, 0, &[0x51], flags, 1000).unwrap();
        assert_eq!(before, after);
    }

    #[test]
    fn test_single_commits_to_matching_output_only() {
        let mut tx = sample_tx();
        let flags = SIGHASH_SINGLE | SIGHASH_FORKID;
        let before = signature_hash(&tx, 0, &[0x51], flags, 1000).unwrap();

        // output 1 is not the matching output for input 0
        tx.outputs[1].value += 1;
        let after = signature_hash(&tx, 0, &[0x51], flags, 1000).unwrap();
        assert_eq!(before, after);

        tx.outputs[0].value += 1;
        let changed = signature_hash(&tx, 0, &[0x51], flags, 1000).unwrap();
        assert_ne!(before, changed);
    }

    #[test]
    fn test_anyone_can_pay_masks_other_inputs() {
        let mut tx = sample_tx();
        let flags = SIGHASH_ALL_FORKID | SIGHASH_ANYONECANPAY;
        let before = signature_hash(&tx, 0, &[0x51], flags, 1000).unwrap();
        tx.inputs[1].sequence = 1;
        let after = signature_hash(&tx, 0, &[0x51], flags, 1000).unwrap();
        assert_eq!(before, after);

        // without ANYONECANPAY the same edit changes the hash
        let plain_before = signature_hash(&sample_tx(), 0, &[0x51], SIGHASH_ALL_FORKID, 1000).unwrap();
        let plain_after = signature_hash(&tx, 0, &[0x51], SIGHASH_ALL_FORKID, 1000).unwrap();
        assert_ne!(plain_before, plain_after);
    }

    #[test]
    fn test_commits_to_amount_and_script_code() {
        let tx = sample_tx();
        let a = signature_hash(&tx, 0, &[0x51], SIGHASH_ALL_FORKID, 1000).unwrap();
        let b = signature_hash(&tx, 0, &[0x51], SIGHASH_ALL_FORKID, 1001).unwrap();
        let c = signature_hash(&tx, 0, &[0x52], SIGHASH_ALL_FORKID, 1000).unwrap();
        assert_ne!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_preimage_layout_prefix() {
        let tx = sample_tx();
        let preimage = calc_preimage(&tx, 0, &[0x51], SIGHASH_ALL_FORKID, 1000).unwrap();
        // version
        assert_eq!(&preimage[..4], &2i32.to_le_bytes());
        // outpoint of input 0 sits after the two 32-byte hashes
        assert_eq!(&preimage[68..100], &[0u8; 32]);
        assert_eq!(&preimage[100..104], &0u32.to_le_bytes());
        // trailing hash type
        let n = preimage.len();
        assert_eq!(&preimage[n - 4..], &SIGHASH_ALL_FORKID.to_le_bytes());
        assert_eq!(&preimage[n - 8..n - 4], &5u32.to_le_bytes());
    }
}
