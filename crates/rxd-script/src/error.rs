/// Error types for script parsing and construction.
#[derive(Debug, thiserror::Error)]
pub enum ScriptError {
    /// Invalid hex string.
    #[error("invalid hex: {0}")]
    InvalidHex(String),

    /// Hex decoding error.
    #[error("hex decode error: {0}")]
    HexDecode(#[from] hex::FromHexError),

    /// A push or embedded operand extends past the end of the script.
    #[error("script truncated")]
    DataTooSmall,

    /// Push data exceeds the maximum allowed size.
    #[error("data too big")]
    DataTooBig,

    /// Script byte length exceeds the maximum allowed size.
    #[error("script too large: {0} bytes")]
    ScriptTooLarge(usize),

    /// An ASM token is neither a known opcode name nor valid hex.
    #[error("unknown opcode name: {0}")]
    UnknownOpcodeName(String),

    /// An embedded reference operand is missing or the wrong length.
    #[error("reference operand must be 36 bytes")]
    BadReferenceOperand,
}
