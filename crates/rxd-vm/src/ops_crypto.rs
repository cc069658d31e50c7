//! Hashing and signature opcodes.

use rxd_primitives::hash::{
    blake3_256, hash160, hash512_256, k12_256, ripemd160, sha1, sha256, sha256d, sha512_256,
};
use rxd_script::chunk::remove_pushes_of;
use rxd_script::opcodes::*;
use rxd_script::Script;
use rxd_transaction::sighash::{has_fork_id, SIGHASH_MASK};

use crate::config::{MAX_BLAKE3_INPUT_SIZE, MAX_K12_INPUT_SIZE, MAX_PUBKEYS_PER_MULTISIG};
use crate::error::{ExecError, ExecErrorCode};
use crate::flags::VerifyFlags;
use crate::vm::Vm;

/// Half the secp256k1 group order, big-endian. An S value above this is
/// non-canonical under LOW_S.
const HALF_ORDER: [u8; 32] = [
    0x7F, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF,
    0xFF, 0x5D, 0x57, 0x6E, 0x73, 0x57, 0xA4, 0x50, 0x1D, 0xDF, 0xE9, 0x2F, 0x46, 0x68, 0x1B,
    0x20, 0xA0,
];

impl Vm<'_> {
    pub(crate) fn op_hash(&mut self, opcode: u8) -> Result<(), ExecError> {
        let data = self.popd()?;
        let digest: Vec<u8> = match opcode {
            OP_RIPEMD160 => ripemd160(&data).to_vec(),
            OP_SHA1 => sha1(&data).to_vec(),
            OP_SHA256 => sha256(&data).to_vec(),
            OP_HASH160 => hash160(&data).to_vec(),
            OP_HASH256 => sha256d(&data).to_vec(),
            OP_SHA512_256 => sha512_256(&data).to_vec(),
            OP_HASH512_256 => hash512_256(&data).to_vec(),
            OP_BLAKE3 => {
                if data.len() > MAX_BLAKE3_INPUT_SIZE {
                    return Err(ExecError::new(
                        ExecErrorCode::PushSize,
                        format!(
                            "BLAKE3 input of {} bytes exceeds the single-chunk bound",
                            data.len()
                        ),
                    ));
                }
                blake3_256(&data).to_vec()
            }
            OP_K12 => {
                if data.len() > MAX_K12_INPUT_SIZE {
                    return Err(ExecError::new(
                        ExecErrorCode::PushSize,
                        format!(
                            "K12 input of {} bytes exceeds the single-block bound",
                            data.len()
                        ),
                    ));
                }
                k12_256(&data).to_vec()
            }
            _ => unreachable!("op_hash dispatched for non-hash opcode"),
        };
        self.push(digest);
        Ok(())
    }

    /// The script code for a signature check: the sub-script from the
    /// most recent code separator with all pushes of the raw signature
    /// bytes removed.
    pub(crate) fn script_code_for(&self, full_sig: &[u8]) -> Script {
        let sub = self.sub_script();
        Script::from_bytes(&remove_pushes_of(sub.to_bytes(), full_sig))
    }

    pub(crate) fn op_checksig(&mut self) -> Result<(), ExecError> {
        let pub_key = self.popd()?;
        let full_sig = self.popd()?;

        let valid = self.check_sig_encoded(&full_sig, &pub_key)?;
        if !valid && self.flags.contains(VerifyFlags::NULLFAIL) && !full_sig.is_empty() {
            return Err(ExecError::from_code(ExecErrorCode::SigNullFail));
        }
        self.push_bool(valid);
        Ok(())
    }

    /// Validate encodings and verify one transaction signature.
    fn check_sig_encoded(&self, full_sig: &[u8], pub_key: &[u8]) -> Result<bool, ExecError> {
        if full_sig.is_empty() {
            return Ok(false);
        }
        let hash_type = full_sig[full_sig.len() - 1] as u32;
        let der = &full_sig[..full_sig.len() - 1];

        self.check_hash_type_encoding(hash_type)?;
        self.check_signature_encoding(der)?;
        self.check_pub_key_encoding(pub_key)?;

        // A signature without the fork-id bit can never verify on this
        // chain.
        if self.flags.contains(VerifyFlags::SIGHASH_FORKID) && !has_fork_id(hash_type) {
            if self.flags.contains(VerifyFlags::STRICTENC)
                || (self.flags.contains(VerifyFlags::NULLFAIL) && !der.is_empty())
            {
                return Err(ExecError::from_code(ExecErrorCode::MustUseForkId));
            }
            return Ok(false);
        }

        let script_code = self.script_code_for(full_sig);
        self.checker.check_sig(full_sig, pub_key, &script_code)
    }

    pub(crate) fn op_checkmultisig(&mut self) -> Result<(), ExecError> {
        let key_count = self.pop_num()?;
        if key_count < 0 || key_count > MAX_PUBKEYS_PER_MULTISIG {
            return Err(ExecError::new(
                ExecErrorCode::InvalidStackOperation,
                format!("pubkey count {} is invalid", key_count),
            ));
        }

        self.state_mut().op_count += key_count as u64;
        if self.state().op_count > crate::config::MAX_OPS_PER_SCRIPT {
            return Err(ExecError::from_code(ExecErrorCode::OpCount));
        }

        let mut pub_keys = Vec::with_capacity(key_count as usize);
        for _ in 0..key_count {
            pub_keys.push(self.popd()?);
        }

        let sig_count = self.pop_num()?;
        if sig_count < 0 || sig_count > key_count {
            return Err(ExecError::new(
                ExecErrorCode::InvalidStackOperation,
                format!(
                    "signature count {} is invalid for {} pubkeys",
                    sig_count, key_count
                ),
            ));
        }

        let mut signatures = Vec::with_capacity(sig_count as usize);
        for _ in 0..sig_count {
            signatures.push(self.popd()?);
        }

        // The off-by-one consumes one extra element (the Satoshi bug).
        let dummy = self.popd()?;
        if self.flags.contains(VerifyFlags::NULLDUMMY) && !dummy.is_empty() {
            return Err(ExecError::new(
                ExecErrorCode::SigNullDummy,
                format!("multisig dummy has {} bytes", dummy.len()),
            ));
        }

        let mut success = true;
        let mut remaining_keys = key_count;
        let mut key_index = 0usize;
        let mut sig_index = 0usize;
        let mut remaining_sigs = sig_count;

        while remaining_sigs > 0 {
            if remaining_sigs > remaining_keys {
                success = false;
                break;
            }
            let signature = signatures[sig_index].clone();
            let pub_key = pub_keys[key_index].clone();
            key_index += 1;
            remaining_keys -= 1;

            if self.check_sig_encoded(&signature, &pub_key)? {
                sig_index += 1;
                remaining_sigs -= 1;
            }
        }

        if !success
            && self.flags.contains(VerifyFlags::NULLFAIL)
            && signatures.iter().any(|sig| !sig.is_empty())
        {
            return Err(ExecError::from_code(ExecErrorCode::SigNullFail));
        }

        self.push_bool(success);
        Ok(())
    }

    pub(crate) fn op_checkdatasig(&mut self) -> Result<(), ExecError> {
        let pub_key = self.popd()?;
        let message = self.popd()?;
        let signature = self.popd()?;

        let mut valid = false;
        if !signature.is_empty() {
            // data signatures are bare DER with no hash-type byte
            self.check_signature_encoding(&signature)?;
            self.check_pub_key_encoding(&pub_key)?;
            valid = self.checker.check_data_sig(&signature, &message, &pub_key)?;
        }

        if !valid && self.flags.contains(VerifyFlags::NULLFAIL) && !signature.is_empty() {
            return Err(ExecError::from_code(ExecErrorCode::SigNullFail));
        }
        self.push_bool(valid);
        Ok(())
    }

    // -----------------------------------------------------------------
    // Encoding checks
    // -----------------------------------------------------------------

    fn check_hash_type_encoding(&self, hash_type: u32) -> Result<(), ExecError> {
        if !self.flags.contains(VerifyFlags::STRICTENC) {
            return Ok(());
        }
        let base = hash_type & SIGHASH_MASK;
        if !(1..=3).contains(&base) {
            return Err(ExecError::new(
                ExecErrorCode::SigHashType,
                format!("invalid hash type 0x{:02x}", hash_type),
            ));
        }
        Ok(())
    }

    pub(crate) fn check_pub_key_encoding(&self, pub_key: &[u8]) -> Result<(), ExecError> {
        if !self.flags.contains(VerifyFlags::STRICTENC) {
            return Ok(());
        }
        let compressed = pub_key.len() == 33 && matches!(pub_key[0], 0x02 | 0x03);
        let uncompressed = pub_key.len() == 65 && pub_key[0] == 0x04;
        if compressed || uncompressed {
            Ok(())
        } else {
            Err(ExecError::from_code(ExecErrorCode::PubKeyType))
        }
    }

    /// DER structure checks on a signature without its hash-type byte.
    pub(crate) fn check_signature_encoding(&self, sig: &[u8]) -> Result<(), ExecError> {
        if !self.flags.contains_any(&[
            VerifyFlags::DERSIG,
            VerifyFlags::LOW_S,
            VerifyFlags::STRICTENC,
        ]) {
            return Ok(());
        }
        if sig.is_empty() {
            return Ok(());
        }

        if sig.len() < 8 || sig.len() > 72 {
            return Err(ExecError::new(
                ExecErrorCode::SigBadLength,
                format!("signature of {} bytes", sig.len()),
            ));
        }
        if sig[0] != 0x30 {
            return Err(ExecError::new(
                ExecErrorCode::SigDer,
                "signature is not a DER sequence",
            ));
        }
        if sig[1] as usize != sig.len() - 2 {
            return Err(ExecError::new(
                ExecErrorCode::SigDer,
                "signature length byte mismatch",
            ));
        }

        let r_len = sig[3] as usize;
        let s_type_offset = 4 + r_len;
        if s_type_offset + 1 >= sig.len() {
            return Err(ExecError::new(ExecErrorCode::SigDer, "S component missing"));
        }
        let s_len = sig[s_type_offset + 1] as usize;
        let s_offset = s_type_offset + 2;
        if s_offset + s_len != sig.len() {
            return Err(ExecError::new(ExecErrorCode::SigDer, "invalid S length"));
        }

        if sig[2] != 0x02 {
            return Err(ExecError::new(ExecErrorCode::SigDer, "missing R integer marker"));
        }
        if r_len == 0 {
            return Err(ExecError::new(ExecErrorCode::SigDer, "R length is zero"));
        }
        if sig[4] & 0x80 != 0 {
            return Err(ExecError::new(ExecErrorCode::SigDer, "R is negative"));
        }
        if r_len > 1 && sig[4] == 0x00 && sig[5] & 0x80 == 0 {
            return Err(ExecError::new(
                ExecErrorCode::SigDer,
                "R has excess padding",
            ));
        }

        if sig[s_type_offset] != 0x02 {
            return Err(ExecError::new(ExecErrorCode::SigDer, "missing S integer marker"));
        }
        if s_len == 0 {
            return Err(ExecError::new(ExecErrorCode::SigDer, "S length is zero"));
        }
        if sig[s_offset] & 0x80 != 0 {
            return Err(ExecError::new(ExecErrorCode::SigDer, "S is negative"));
        }
        if s_len > 1 && sig[s_offset] == 0x00 && sig[s_offset + 1] & 0x80 == 0 {
            return Err(ExecError::new(
                ExecErrorCode::SigDer,
                "S has excess padding",
            ));
        }

        if self.flags.contains(VerifyFlags::LOW_S)
            && s_exceeds_half_order(&sig[s_offset..s_offset + s_len])
        {
            return Err(ExecError::from_code(ExecErrorCode::SigHighS));
        }

        Ok(())
    }
}

/// Compare a big-endian S component against half the group order.
fn s_exceeds_half_order(s: &[u8]) -> bool {
    let significant: &[u8] = {
        let mut trimmed = s;
        while trimmed.len() > 1 && trimmed[0] == 0x00 {
            trimmed = &trimmed[1..];
        }
        trimmed
    };
    if significant.len() > 32 {
        return true;
    }
    if significant.len() < 32 {
        return false;
    }
    significant > &HALF_ORDER[..]
}
