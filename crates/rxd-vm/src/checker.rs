//! Signature authority abstraction.
//!
//! The dispatcher talks to a [`SignatureChecker`] and never branches on
//! which implementation is behind it: the production implementation
//! computes real sighashes and verifies ECDSA; the allow-list
//! implementation deterministically accepts a declared set of
//! (signature, pubkey) pairs so the debugger can step scripts without
//! keys.

use rxd_primitives::ecdsa::verify_der_prehash;
use rxd_primitives::hash::sha256;
use rxd_script::Script;
use rxd_transaction::input::{
    SEQUENCE_FINAL, SEQUENCE_LOCKTIME_DISABLE_FLAG, SEQUENCE_LOCKTIME_MASK,
    SEQUENCE_LOCKTIME_TYPE_FLAG,
};
use rxd_transaction::sighash::signature_hash;
use rxd_transaction::{Transaction, TransactionError};

use crate::config::LOCKTIME_THRESHOLD;
use crate::error::{ExecError, ExecErrorCode};

/// The operations the dispatcher needs from a signature authority.
pub trait SignatureChecker {
    /// Verify a transaction signature. `sig` carries the trailing
    /// hash-type byte; `script_code` is the sub-script being satisfied.
    fn check_sig(
        &self,
        sig: &[u8],
        pub_key: &[u8],
        script_code: &Script,
    ) -> Result<bool, ExecError>;

    /// Verify a data signature over sha256(`message`). `sig` is bare
    /// DER with no hash-type byte.
    fn check_data_sig(
        &self,
        sig: &[u8],
        message: &[u8],
        pub_key: &[u8],
    ) -> Result<bool, ExecError>;

    /// Check an absolute lock-time requirement against the transaction.
    fn check_lock_time(&self, lock_time: i64) -> bool;

    /// Check a relative lock-time (sequence) requirement against the
    /// transaction input.
    fn check_sequence(&self, sequence: i64) -> bool;
}

/// Lock-time comparison shared by the absolute and relative checks:
/// both operands must be on the same side of `threshold`, and the
/// requirement must not exceed the transaction value.
fn lock_time_satisfied(tx_value: i64, threshold: i64, required: i64) -> bool {
    if (tx_value < threshold) != (required < threshold) {
        return false;
    }
    required <= tx_value
}

// -----------------------------------------------------------------------
// Production implementation
// -----------------------------------------------------------------------

/// Signature checker backed by a real transaction: computes the fork-id
/// sighash and verifies ECDSA over secp256k1.
pub struct TransactionSignatureChecker<'a> {
    tx: &'a Transaction,
    input_index: usize,
    amount: i64,
}

impl<'a> TransactionSignatureChecker<'a> {
    /// Create a checker for one input of `tx` spending `amount`.
    pub fn new(tx: &'a Transaction, input_index: usize, amount: i64) -> Self {
        TransactionSignatureChecker {
            tx,
            input_index,
            amount,
        }
    }
}

impl SignatureChecker for TransactionSignatureChecker<'_> {
    fn check_sig(
        &self,
        sig: &[u8],
        pub_key: &[u8],
        script_code: &Script,
    ) -> Result<bool, ExecError> {
        if sig.is_empty() {
            return Ok(false);
        }
        let hash_type = sig[sig.len() - 1] as u32;
        let der = &sig[..sig.len() - 1];

        let hash = signature_hash(
            self.tx,
            self.input_index,
            script_code.to_bytes(),
            hash_type,
            self.amount,
        )
        .map_err(|e| match e {
            TransactionError::MissingForkId(t) => ExecError::new(
                ExecErrorCode::MustUseForkId,
                format!("sighash type 0x{:02x} lacks the fork-id bit", t),
            ),
            other => ExecError::new(ExecErrorCode::InvalidTxInputIndex, other.to_string()),
        })?;

        Ok(verify_der_prehash(pub_key, der, &hash))
    }

    fn check_data_sig(
        &self,
        sig: &[u8],
        message: &[u8],
        pub_key: &[u8],
    ) -> Result<bool, ExecError> {
        if sig.is_empty() {
            return Ok(false);
        }
        let hash = sha256(message);
        Ok(verify_der_prehash(pub_key, sig, &hash))
    }

    fn check_lock_time(&self, lock_time: i64) -> bool {
        if !lock_time_satisfied(self.tx.lock_time as i64, LOCKTIME_THRESHOLD, lock_time) {
            return false;
        }
        // A finalized input ignores lock time entirely.
        match self.tx.inputs.get(self.input_index) {
            Some(input) => input.sequence != SEQUENCE_FINAL,
            None => false,
        }
    }

    fn check_sequence(&self, sequence: i64) -> bool {
        let input = match self.tx.inputs.get(self.input_index) {
            Some(input) => input,
            None => return false,
        };
        if self.tx.version < 2 {
            return false;
        }
        let tx_sequence = input.sequence as i64;
        if tx_sequence & SEQUENCE_LOCKTIME_DISABLE_FLAG as i64 != 0 {
            return false;
        }

        let mask = (SEQUENCE_LOCKTIME_TYPE_FLAG | SEQUENCE_LOCKTIME_MASK) as i64;
        lock_time_satisfied(
            tx_sequence & mask,
            SEQUENCE_LOCKTIME_TYPE_FLAG as i64,
            sequence & mask,
        )
    }
}

// -----------------------------------------------------------------------
// Debugger implementation
// -----------------------------------------------------------------------

/// Deterministic checker for stepping scripts without keys: accepts a
/// declared set of (signature, pubkey) pairs, or everything.
#[derive(Debug, Default)]
pub struct AllowListSignatureChecker {
    allowed: Vec<(Vec<u8>, Vec<u8>)>,
    accept_all: bool,
}

impl AllowListSignatureChecker {
    /// An empty allow list: every signature check fails cleanly.
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept every non-empty (signature, pubkey) pair.
    pub fn accept_all() -> Self {
        AllowListSignatureChecker {
            allowed: Vec::new(),
            accept_all: true,
        }
    }

    /// Declare one (signature, pubkey) pair as valid. The signature is
    /// matched exactly as it appears on the stack.
    pub fn allow(&mut self, sig: impl Into<Vec<u8>>, pub_key: impl Into<Vec<u8>>) -> &mut Self {
        self.allowed.push((sig.into(), pub_key.into()));
        self
    }

    fn accepts(&self, sig: &[u8], pub_key: &[u8]) -> bool {
        if sig.is_empty() {
            return false;
        }
        if self.accept_all {
            return !pub_key.is_empty();
        }
        self.allowed
            .iter()
            .any(|(s, p)| s == sig && p == pub_key)
    }
}

impl SignatureChecker for AllowListSignatureChecker {
    fn check_sig(
        &self,
        sig: &[u8],
        pub_key: &[u8],
        _script_code: &Script,
    ) -> Result<bool, ExecError> {
        Ok(self.accepts(sig, pub_key))
    }

    fn check_data_sig(
        &self,
        sig: &[u8],
        _message: &[u8],
        pub_key: &[u8],
    ) -> Result<bool, ExecError> {
        Ok(self.accepts(sig, pub_key))
    }

    fn check_lock_time(&self, _lock_time: i64) -> bool {
        true
    }

    fn check_sequence(&self, _sequence: i64) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rxd_transaction::{Outpoint, TransactionInput};

    fn tx_with_sequence(version: i32, sequence: u32, lock_time: u32) -> Transaction {
        let mut tx = Transaction::new();
        tx.version = version;
        let mut input = TransactionInput::new(Outpoint::new([1; 32], 0));
        input.sequence = sequence;
        tx.inputs.push(input);
        tx.lock_time = lock_time;
        tx
    }

    #[test]
    fn test_lock_time_type_mismatch() {
        // tx uses a height, requirement uses a timestamp
        let tx = tx_with_sequence(2, 0, 100);
        let checker = TransactionSignatureChecker::new(&tx, 0, 0);
        assert!(!checker.check_lock_time(600_000_000));
        assert!(checker.check_lock_time(99));
        assert!(!checker.check_lock_time(101));
    }

    #[test]
    fn test_lock_time_final_sequence_fails() {
        let tx = tx_with_sequence(2, SEQUENCE_FINAL, 100);
        let checker = TransactionSignatureChecker::new(&tx, 0, 0);
        assert!(!checker.check_lock_time(50));
    }

    #[test]
    fn test_sequence_requires_v2() {
        let tx = tx_with_sequence(1, 10, 0);
        let checker = TransactionSignatureChecker::new(&tx, 0, 0);
        assert!(!checker.check_sequence(5));

        let tx = tx_with_sequence(2, 10, 0);
        let checker = TransactionSignatureChecker::new(&tx, 0, 0);
        assert!(checker.check_sequence(5));
        assert!(!checker.check_sequence(11));
    }

    #[test]
    fn test_sequence_disable_bit_on_tx_fails() {
        let tx = tx_with_sequence(2, SEQUENCE_LOCKTIME_DISABLE_FLAG | 10, 0);
        let checker = TransactionSignatureChecker::new(&tx, 0, 0);
        assert!(!checker.check_sequence(5));
    }

    #[test]
    fn test_sequence_unit_flag_must_match() {
        let tx = tx_with_sequence(2, SEQUENCE_LOCKTIME_TYPE_FLAG as u32 | 10, 0);
        let checker = TransactionSignatureChecker::new(&tx, 0, 0);
        // height-based requirement against a time-based tx sequence
        assert!(!checker.check_sequence(5));
        assert!(checker.check_sequence(SEQUENCE_LOCKTIME_TYPE_FLAG as i64 | 5));
    }

    #[test]
    fn test_allow_list() {
        let mut checker = AllowListSignatureChecker::new();
        let script = Script::new();
        assert!(!checker.check_sig(&[1, 2, 3], &[4], &script).unwrap());

        checker.allow(vec![1, 2, 3], vec![4]);
        assert!(checker.check_sig(&[1, 2, 3], &[4], &script).unwrap());
        assert!(!checker.check_sig(&[1, 2, 3], &[5], &script).unwrap());

        let everything = AllowListSignatureChecker::accept_all();
        assert!(everything.check_sig(&[9], &[9], &script).unwrap());
        assert!(!everything.check_sig(&[], &[9], &script).unwrap());
    }
}
