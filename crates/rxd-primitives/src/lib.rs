//! Radiant debugger primitives - hashing, serialization, and curve operations.
//!
//! This crate provides the foundational building blocks for the debugger:
//! - Hash functions (SHA-256, SHA-256d, RIPEMD-160, SHA-1, SHA-512/256,
//!   BLAKE3, KangarooTwelve)
//! - Chain hash type for transaction identification
//! - ECDSA signature verification over secp256k1
//! - Variable-length integer encoding and byte cursor types

pub mod chainhash;
pub mod ecdsa;
pub mod hash;
pub mod util;

mod error;
pub use error::PrimitivesError;
