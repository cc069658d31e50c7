//! The closed script-error taxonomy.
//!
//! Every observable failure of the interpreter is one of these
//! discriminants. Errors travel as values: the dispatcher returns them,
//! the VM turns them into a `done`/`success`/`error` state transition,
//! and the verification entry point reports them at the boundary.

use std::fmt;

/// Stable identifiers for every way script execution can fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExecErrorCode {
    // Structural
    ScriptSize,
    PushSize,
    OpCount,
    StackSize,
    BadOpcode,
    DisabledOpcode,
    UnbalancedConditional,

    // Stack
    InvalidStackOperation,
    InvalidAltstackOperation,

    // Verify
    Verify,
    EqualVerify,
    NumEqualVerify,
    CheckSigVerify,
    CheckMultiSigVerify,

    // Encoding
    SigDer,
    SigHighS,
    SigHashType,
    SigNullDummy,
    SigNullFail,
    SigPushOnly,
    SigBadLength,
    PubKeyType,
    MinimalData,
    MinimalIf,
    CleanStack,
    MustUseForkId,

    // Numeric
    InvalidNumberRange,
    DivByZero,
    ModByZero,
    ImpossibleEncoding,

    // Locktime
    NegativeLocktime,
    UnsatisfiedLocktime,

    // Evaluation
    EvalFalse,
    OpReturn,

    // Introspection
    ContextNotPresent,
    InvalidTxInputIndex,
    InvalidTxOutputIndex,

    // Reference
    InvalidReference,
    ReferenceNotFound,
    SingletonMismatch,
    InvalidStateSeparator,
}

impl ExecErrorCode {
    /// The stable identifier of this error kind.
    pub fn label(&self) -> &'static str {
        use ExecErrorCode::*;
        match self {
            ScriptSize => "SCRIPT_SIZE",
            PushSize => "PUSH_SIZE",
            OpCount => "OP_COUNT",
            StackSize => "STACK_SIZE",
            BadOpcode => "BAD_OPCODE",
            DisabledOpcode => "DISABLED_OPCODE",
            UnbalancedConditional => "UNBALANCED_CONDITIONAL",
            InvalidStackOperation => "INVALID_STACK_OPERATION",
            InvalidAltstackOperation => "INVALID_ALTSTACK_OPERATION",
            Verify => "VERIFY",
            EqualVerify => "EQUALVERIFY",
            NumEqualVerify => "NUMEQUALVERIFY",
            CheckSigVerify => "CHECKSIGVERIFY",
            CheckMultiSigVerify => "CHECKMULTISIGVERIFY",
            SigDer => "SIG_DER",
            SigHighS => "SIG_HIGH_S",
            SigHashType => "SIG_HASHTYPE",
            SigNullDummy => "SIG_NULLDUMMY",
            SigNullFail => "SIG_NULLFAIL",
            SigPushOnly => "SIG_PUSHONLY",
            SigBadLength => "SIG_BADLENGTH",
            PubKeyType => "PUBKEYTYPE",
            MinimalData => "MINIMALDATA",
            MinimalIf => "MINIMALIF",
            CleanStack => "CLEANSTACK",
            MustUseForkId => "MUST_USE_FORKID",
            InvalidNumberRange => "INVALID_NUMBER_RANGE",
            DivByZero => "DIV_BY_ZERO",
            ModByZero => "MOD_BY_ZERO",
            ImpossibleEncoding => "IMPOSSIBLE_ENCODING",
            NegativeLocktime => "NEGATIVE_LOCKTIME",
            UnsatisfiedLocktime => "UNSATISFIED_LOCKTIME",
            EvalFalse => "EVAL_FALSE",
            OpReturn => "OP_RETURN",
            ContextNotPresent => "CONTEXT_NOT_PRESENT",
            InvalidTxInputIndex => "INVALID_TX_INPUT_INDEX",
            InvalidTxOutputIndex => "INVALID_TX_OUTPUT_INDEX",
            InvalidReference => "INVALID_REFERENCE",
            ReferenceNotFound => "REFERENCE_NOT_FOUND",
            SingletonMismatch => "SINGLETON_MISMATCH",
            InvalidStateSeparator => "INVALID_STATE_SEPARATOR",
        }
    }

    /// A human-readable description of this error kind.
    pub fn message(&self) -> &'static str {
        use ExecErrorCode::*;
        match self {
            ScriptSize => "script is too big",
            PushSize => "push value size limit exceeded",
            OpCount => "operation limit exceeded",
            StackSize => "stack size limit exceeded",
            BadOpcode => "opcode missing or not understood",
            DisabledOpcode => "attempted to use a disabled opcode",
            UnbalancedConditional => "invalid OP_IF construction",
            InvalidStackOperation => "operation not valid with the current stack size",
            InvalidAltstackOperation => "operation not valid with the current altstack size",
            Verify => "script failed an OP_VERIFY operation",
            EqualVerify => "script failed an OP_EQUALVERIFY operation",
            NumEqualVerify => "script failed an OP_NUMEQUALVERIFY operation",
            CheckSigVerify => "script failed an OP_CHECKSIGVERIFY operation",
            CheckMultiSigVerify => "script failed an OP_CHECKMULTISIGVERIFY operation",
            SigDer => "non-canonical DER signature",
            SigHighS => "non-canonical signature: S value is unnecessarily high",
            SigHashType => "signature hash type missing or not understood",
            SigNullDummy => "dummy CHECKMULTISIG argument must be zero",
            SigNullFail => "signature must be zero for failed CHECK(MULTI)SIG operation",
            SigPushOnly => "only push operators allowed in signature scripts",
            SigBadLength => "signature is the wrong length",
            PubKeyType => "public key is neither compressed nor uncompressed",
            MinimalData => "data push larger than necessary",
            MinimalIf => "OP_IF/NOTIF argument must be minimal",
            CleanStack => "stack size must be exactly one after execution",
            MustUseForkId => "signature must use the fork-id sighash",
            InvalidNumberRange => "numeric value out of range",
            DivByZero => "division by zero",
            ModByZero => "modulo by zero",
            ImpossibleEncoding => "the requested encoding is impossible to satisfy",
            NegativeLocktime => "negative locktime",
            UnsatisfiedLocktime => "locktime requirement not satisfied",
            EvalFalse => "script evaluated without error but finished with a false/empty top stack element",
            OpReturn => "OP_RETURN was encountered",
            ContextNotPresent => "introspection context not available",
            InvalidTxInputIndex => "transaction input index out of range",
            InvalidTxOutputIndex => "transaction output index out of range",
            InvalidReference => "invalid reference",
            ReferenceNotFound => "required reference not found",
            SingletonMismatch => "singleton reference mismatch",
            InvalidStateSeparator => "invalid state separator",
        }
    }
}

impl fmt::Display for ExecErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// A script execution error: a taxonomy member plus a description of
/// the specific occurrence.
#[derive(Debug, Clone)]
pub struct ExecError {
    /// The taxonomy discriminant.
    pub code: ExecErrorCode,
    /// What specifically went wrong.
    pub description: String,
}

impl ExecError {
    /// Create an error with a specific description.
    pub fn new(code: ExecErrorCode, description: impl Into<String>) -> Self {
        ExecError {
            code,
            description: description.into(),
        }
    }

    /// Create an error with the generic description for its kind.
    pub fn from_code(code: ExecErrorCode) -> Self {
        ExecError {
            code,
            description: code.message().to_string(),
        }
    }
}

impl fmt::Display for ExecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code.label(), self.description)
    }
}

impl std::error::Error for ExecError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_labels_are_stable() {
        assert_eq!(ExecErrorCode::EvalFalse.label(), "EVAL_FALSE");
        assert_eq!(ExecErrorCode::MustUseForkId.label(), "MUST_USE_FORKID");
        assert_eq!(ExecErrorCode::DivByZero.label(), "DIV_BY_ZERO");
        assert_eq!(
            ExecErrorCode::InvalidAltstackOperation.label(),
            "INVALID_ALTSTACK_OPERATION"
        );
    }

    #[test]
    fn test_display_carries_code_and_description() {
        let err = ExecError::new(ExecErrorCode::PushSize, "element of 33000001 bytes");
        assert_eq!(err.to_string(), "PUSH_SIZE: element of 33000001 bytes");
    }
}
