//! Interpreter resource limits.
//!
//! The two hard execution bounds (operation count and combined stack
//! size) together with the per-element size bound guarantee that
//! pathological scripts terminate.

use crate::flags::VerifyFlags;
use rxd_script::scriptnum::{MAX_NUM_SIZE_EXTENDED, MAX_NUM_SIZE_LEGACY};

/// Maximum byte size of a single stack element.
pub const MAX_SCRIPT_ELEMENT_SIZE: usize = 32_000_000;

/// Maximum script byte length.
pub const MAX_SCRIPT_SIZE: usize = rxd_script::script::MAX_SCRIPT_SIZE;

/// Maximum number of non-push opcodes executed per VM.
pub const MAX_OPS_PER_SCRIPT: u64 = 32_000_000;

/// Maximum combined element count of the main and alt stacks.
pub const MAX_STACK_SIZE: usize = 32_000_000;

/// Maximum number of public keys per CHECKMULTISIG.
pub const MAX_PUBKEYS_PER_MULTISIG: i64 = 20;

/// Lock-time values at or above this are Unix timestamps, below it
/// block heights.
pub const LOCKTIME_THRESHOLD: i64 = 500_000_000;

/// Maximum input size for OP_BLAKE3 (one BLAKE3 chunk).
pub const MAX_BLAKE3_INPUT_SIZE: usize = 1024;

/// Maximum input size for OP_K12 (one KangarooTwelve block).
pub const MAX_K12_INPUT_SIZE: usize = 8192;

/// Maximum width for numbers used by OP_CHECKLOCKTIMEVERIFY and
/// OP_CHECKSEQUENCEVERIFY.
pub const MAX_LOCKTIME_NUM_SIZE: usize = 5;

/// The numeric width implied by a flag set: 8 bytes with extended
/// integers, 4 without.
pub fn max_num_length(flags: VerifyFlags) -> usize {
    if flags.contains(VerifyFlags::EXTENDED_INTEGERS) {
        MAX_NUM_SIZE_EXTENDED
    } else {
        MAX_NUM_SIZE_LEGACY
    }
}
