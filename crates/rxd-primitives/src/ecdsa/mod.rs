//! ECDSA verification over secp256k1.
//!
//! Standalone verification for DER-encoded signatures against SEC1 public
//! keys and a precomputed 32-byte message digest, as the script engine's
//! signature opcodes require.

use k256::ecdsa::signature::hazmat::PrehashVerifier;
use k256::ecdsa::{Signature, VerifyingKey};

/// Verify a DER-encoded ECDSA signature over a 32-byte digest.
///
/// `pub_key` is a SEC1-encoded public key (33-byte compressed or 65-byte
/// uncompressed). High-S signatures are normalized before verification;
/// canonicality enforcement (LOW_S) is a script-flag concern handled by
/// the caller.
///
/// Returns `false` for any malformed key or signature rather than an
/// error: a signature that cannot be parsed simply does not verify.
pub fn verify_der_prehash(pub_key: &[u8], der_sig: &[u8], digest: &[u8; 32]) -> bool {
    let verifying_key = match VerifyingKey::from_sec1_bytes(pub_key) {
        Ok(vk) => vk,
        Err(_) => return false,
    };
    let signature = match Signature::from_der(der_sig) {
        Ok(sig) => sig,
        Err(_) => return false,
    };
    let signature = signature.normalize_s().unwrap_or(signature);
    verifying_key.verify_prehash(digest, &signature).is_ok()
}
