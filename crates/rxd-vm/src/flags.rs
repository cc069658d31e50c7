//! Script verification flags (bitmask).

use std::ops::{BitAnd, BitOr, BitOrAssign};

/// Verification flags controlling interpreter behavior for one run.
///
/// The legacy-vs-extended backend split is purely a matter of which
/// flags are set: the legacy profile omits `EXTENDED_INTEGERS`,
/// `NATIVE_INTROSPECTION`, and `ENHANCED_REFERENCES`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VerifyFlags(pub u32);

impl VerifyFlags {
    /// No flags set.
    pub const NONE: VerifyFlags = VerifyFlags(0);
    /// Evaluate the redeem-script phase for P2SH lock scripts.
    pub const P2SH: VerifyFlags = VerifyFlags(1 << 0);
    /// Reject non-canonical signature and public key encodings.
    pub const STRICTENC: VerifyFlags = VerifyFlags(1 << 1);
    /// Require strict DER encoding for signatures.
    pub const DERSIG: VerifyFlags = VerifyFlags(1 << 2);
    /// Require the signature S value in the lower half of the curve order.
    pub const LOW_S: VerifyFlags = VerifyFlags(1 << 3);
    /// Require the CHECKMULTISIG dummy element to be empty.
    pub const NULLDUMMY: VerifyFlags = VerifyFlags(1 << 4);
    /// Require the unlocking script to contain only push opcodes.
    pub const SIGPUSHONLY: VerifyFlags = VerifyFlags(1 << 5);
    /// Require minimal encodings for data pushes and numbers.
    pub const MINIMALDATA: VerifyFlags = VerifyFlags(1 << 6);
    /// Make the reserved NOP opcodes fail.
    pub const DISCOURAGE_UPGRADABLE_NOPS: VerifyFlags = VerifyFlags(1 << 7);
    /// Require exactly one stack element after execution.
    pub const CLEANSTACK: VerifyFlags = VerifyFlags(1 << 8);
    /// Upgrade OP_NOP2 to OP_CHECKLOCKTIMEVERIFY.
    pub const CHECKLOCKTIMEVERIFY: VerifyFlags = VerifyFlags(1 << 9);
    /// Upgrade OP_NOP3 to OP_CHECKSEQUENCEVERIFY.
    pub const CHECKSEQUENCEVERIFY: VerifyFlags = VerifyFlags(1 << 10);
    /// Require OP_IF/OP_NOTIF conditions to be exactly empty or {0x01}.
    pub const MINIMALIF: VerifyFlags = VerifyFlags(1 << 13);
    /// Require empty signatures on failed CHECK(MULTI)SIG operations.
    pub const NULLFAIL: VerifyFlags = VerifyFlags(1 << 14);
    /// Require the fork-id bit in signature hash types.
    pub const SIGHASH_FORKID: VerifyFlags = VerifyFlags(1 << 16);
    /// Enable 8-byte numerics, shifts, and OP_2MUL/OP_2DIV.
    pub const EXTENDED_INTEGERS: VerifyFlags = VerifyFlags(1 << 24);
    /// Enable the native introspection opcodes.
    pub const NATIVE_INTROSPECTION: VerifyFlags = VerifyFlags(1 << 25);
    /// Enable the reference opcodes.
    pub const ENHANCED_REFERENCES: VerifyFlags = VerifyFlags(1 << 26);
    /// Enable OP_PUSH_TX_STATE.
    pub const PUSH_TX_STATE: VerifyFlags = VerifyFlags(1 << 27);

    /// The standard flag set for mainnet script verification.
    pub fn standard() -> Self {
        Self::P2SH
            | Self::STRICTENC
            | Self::DERSIG
            | Self::LOW_S
            | Self::SIGPUSHONLY
            | Self::MINIMALDATA
            | Self::DISCOURAGE_UPGRADABLE_NOPS
            | Self::CLEANSTACK
            | Self::CHECKLOCKTIMEVERIFY
            | Self::CHECKSEQUENCEVERIFY
            | Self::MINIMALIF
            | Self::NULLFAIL
            | Self::SIGHASH_FORKID
            | Self::EXTENDED_INTEGERS
            | Self::NATIVE_INTROSPECTION
            | Self::ENHANCED_REFERENCES
    }

    /// The consensus-mandatory flag set.
    pub fn mandatory() -> Self {
        Self::P2SH | Self::SIGHASH_FORKID
    }

    /// Return true if every bit of `flag` is set.
    pub fn contains(self, flag: VerifyFlags) -> bool {
        self.0 & flag.0 == flag.0
    }

    /// Return true if any of the given flags is set.
    pub fn contains_any(self, flags: &[VerifyFlags]) -> bool {
        flags.iter().any(|f| self.contains(*f))
    }

    /// Set the given flag bits.
    pub fn insert(&mut self, flag: VerifyFlags) {
        self.0 |= flag.0;
    }
}

impl BitOr for VerifyFlags {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        VerifyFlags(self.0 | rhs.0)
    }
}

impl BitOrAssign for VerifyFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for VerifyFlags {
    type Output = Self;
    fn bitand(self, rhs: Self) -> Self {
        VerifyFlags(self.0 & rhs.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contains() {
        let flags = VerifyFlags::P2SH | VerifyFlags::CLEANSTACK;
        assert!(flags.contains(VerifyFlags::P2SH));
        assert!(flags.contains(VerifyFlags::CLEANSTACK));
        assert!(!flags.contains(VerifyFlags::MINIMALDATA));
        assert!(flags.contains_any(&[VerifyFlags::MINIMALDATA, VerifyFlags::P2SH]));
    }

    #[test]
    fn test_standard_includes_mandatory() {
        let standard = VerifyFlags::standard();
        assert!(standard.contains(VerifyFlags::mandatory()));
        assert!(standard.contains(VerifyFlags::EXTENDED_INTEGERS));
        assert!(!standard.contains(VerifyFlags::PUSH_TX_STATE));
    }
}
