//! Hash function primitives for the Radiant script debugger.
//!
//! Provides every digest the script engine's crypto opcodes reach for:
//! SHA-256 (single and double), RIPEMD-160, HASH160, SHA-1, SHA-512/256
//! (single and double), single-chunk BLAKE3, and single-block
//! KangarooTwelve.

use ripemd::Ripemd160;
use sha1::Sha1;
use sha2::{Digest, Sha256, Sha512_256};
use tiny_keccak::{Hasher, KangarooTwelve};

/// Compute SHA-256 of the input data.
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Compute double SHA-256 (SHA-256d) of the input data.
///
/// This is the standard Bitcoin-family hash used for transaction IDs and
/// the OP_HASH256 opcode.
pub fn sha256d(data: &[u8]) -> [u8; 32] {
    sha256(&sha256(data))
}

/// Compute RIPEMD-160 of the input data.
pub fn ripemd160(data: &[u8]) -> [u8; 20] {
    let mut hasher = Ripemd160::new();
    hasher.update(data);
    let result = hasher.finalize();
    let mut output = [0u8; 20];
    output.copy_from_slice(&result);
    output
}

/// Compute HASH160: RIPEMD-160(SHA-256(data)).
pub fn hash160(data: &[u8]) -> [u8; 20] {
    ripemd160(&sha256(data))
}

/// Compute SHA-1 of the input data (legacy, for OP_SHA1).
pub fn sha1(data: &[u8]) -> [u8; 20] {
    let mut hasher = Sha1::new();
    hasher.update(data);
    let result = hasher.finalize();
    let mut output = [0u8; 20];
    output.copy_from_slice(&result);
    output
}

/// Compute SHA-512/256 of the input data (OP_SHA512_256).
pub fn sha512_256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha512_256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Compute double SHA-512/256 of the input data (OP_HASH512_256).
pub fn hash512_256(data: &[u8]) -> [u8; 32] {
    sha512_256(&sha512_256(data))
}

/// Compute BLAKE3 of the input data (OP_BLAKE3).
///
/// The script engine restricts inputs to a single BLAKE3 chunk
/// (1024 bytes); that bound is enforced by the opcode, not here.
pub fn blake3_256(data: &[u8]) -> [u8; 32] {
    *blake3::hash(data).as_bytes()
}

/// Compute KangarooTwelve of the input data with an empty customization
/// string (OP_K12).
///
/// The script engine restricts inputs to a single K12 block
/// (8192 bytes); that bound is enforced by the opcode, not here.
pub fn k12_256(data: &[u8]) -> [u8; 32] {
    let mut k12 = KangarooTwelve::new(b"");
    k12.update(data);
    let mut output = [0u8; 32];
    k12.finalize(&mut output);
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_empty() {
        assert_eq!(
            hex::encode(sha256(b"")),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_sha256_abc() {
        assert_eq!(
            hex::encode(sha256(b"abc")),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_sha256d() {
        // sha256d("hello") - well-known double hash vector
        assert_eq!(
            hex::encode(sha256d(b"hello")),
            "9595c9df90075148eb06860365df33584b75bff782a510c6cd4883a419833d50"
        );
    }

    #[test]
    fn test_hash160() {
        // hash160 of an empty input
        assert_eq!(
            hex::encode(hash160(b"")),
            "b472a266d0bd89c13706a4132ccfb16f7c3b9fcb"
        );
    }

    #[test]
    fn test_sha1_abc() {
        assert_eq!(
            hex::encode(sha1(b"abc")),
            "a9993e364706816aba3e25717850c26c9cd0d89d"
        );
    }

    #[test]
    fn test_sha512_256_abc() {
        assert_eq!(
            hex::encode(sha512_256(b"abc")),
            "53048e2681941ef99b2e29b76b4c7dabe4c2d0c634fc6d46e0e2f13107e7af23"
        );
    }

    #[test]
    fn test_blake3_is_deterministic() {
        let a = blake3_256(b"abc");
        let b = blake3_256(b"abc");
        assert_eq!(a, b);
        assert_ne!(a, blake3_256(b"abd"));
    }

    #[test]
    fn test_blake3_abc() {
        // Official BLAKE3 test vector for "abc"
        assert_eq!(
            hex::encode(blake3_256(b"abc")),
            "6437b3ac38465133ffb63b75273a8db548c558465d79db03fd359c6cd5bd9d85"
        );
    }

    #[test]
    fn test_k12_is_deterministic() {
        let a = k12_256(b"abc");
        let b = k12_256(b"abc");
        assert_eq!(a, b);
        assert_ne!(a, k12_256(b"abd"));
        assert_ne!(a, blake3_256(b"abc"));
    }
}
