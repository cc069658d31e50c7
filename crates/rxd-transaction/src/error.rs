/// Error types for transaction operations.
#[derive(Debug, thiserror::Error)]
pub enum TransactionError {
    /// The transaction structure is invalid (e.g. an out-of-range input
    /// index).
    #[error("invalid transaction: {0}")]
    InvalidTransaction(String),

    /// An error occurred during binary/hex serialization or
    /// deserialization.
    #[error("serialization error: {0}")]
    SerializationError(String),

    /// A signature hash was requested for a hash type without the
    /// mandatory fork-id bit.
    #[error("sighash type 0x{0:02x} is missing the fork-id bit")]
    MissingForkId(u32),

    /// An underlying script error (forwarded from `rxd-script`).
    #[error("script error: {0}")]
    Script(#[from] rxd_script::ScriptError),

    /// An underlying primitives error (forwarded from `rxd-primitives`).
    #[error("primitives error: {0}")]
    Primitives(#[from] rxd_primitives::PrimitivesError),
}
