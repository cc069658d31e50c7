/// Unified error type for primitives operations.
#[derive(Debug, thiserror::Error)]
pub enum PrimitivesError {
    /// Invalid hash value or hash string.
    #[error("invalid hash: {0}")]
    InvalidHash(String),

    /// Invalid public key data.
    #[error("invalid public key: {0}")]
    InvalidPublicKey(String),

    /// Invalid signature data.
    #[error("invalid signature: {0}")]
    InvalidSignature(String),

    /// Unexpected end of input data.
    #[error("unexpected end of data")]
    UnexpectedEof,

    /// Hex decoding error.
    #[error("hex decode error: {0}")]
    HexDecode(#[from] hex::FromHexError),
}
