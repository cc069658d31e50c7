//! Outpoint: a reference to a specific output of a prior transaction.

use rxd_primitives::chainhash::Hash;
use rxd_primitives::util::{ByteReader, ByteWriter};

use crate::TransactionError;

/// Byte length of the wire reference form: 32-byte txid + 4-byte vout.
pub const REF_SIZE: usize = 36;

/// The output index marking a null outpoint (coinbase).
pub const NULL_VOUT: u32 = 0xFFFF_FFFF;

/// A (txid, vout) pair identifying the output being spent.
///
/// The txid is stored in internal (little-endian) byte order. The
/// 36-byte reference form `txid ‖ vout-LE` is the unit tracked by the
/// reference opcodes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Outpoint {
    /// Transaction ID of the source transaction, internal byte order.
    pub txid: [u8; 32],
    /// Index of the output within the source transaction.
    pub vout: u32,
}

impl Outpoint {
    /// Create an outpoint from its parts.
    pub fn new(txid: [u8; 32], vout: u32) -> Self {
        Outpoint { txid, vout }
    }

    /// Create the null outpoint used by coinbase inputs.
    pub fn null() -> Self {
        Outpoint {
            txid: [0u8; 32],
            vout: NULL_VOUT,
        }
    }

    /// Check for the null (coinbase) outpoint.
    pub fn is_null(&self) -> bool {
        self.vout == NULL_VOUT && self.txid == [0u8; 32]
    }

    /// Serialize to the 36-byte reference form: txid ‖ vout-LE.
    pub fn to_ref(&self) -> [u8; REF_SIZE] {
        let mut reference = [0u8; REF_SIZE];
        reference[..32].copy_from_slice(&self.txid);
        reference[32..].copy_from_slice(&self.vout.to_le_bytes());
        reference
    }

    /// Parse the 36-byte reference form.
    pub fn from_ref(reference: &[u8]) -> Result<Self, TransactionError> {
        if reference.len() != REF_SIZE {
            return Err(TransactionError::InvalidTransaction(format!(
                "reference must be {} bytes, got {}",
                REF_SIZE,
                reference.len()
            )));
        }
        let mut txid = [0u8; 32];
        txid.copy_from_slice(&reference[..32]);
        let vout = u32::from_le_bytes([reference[32], reference[33], reference[34], reference[35]]);
        Ok(Outpoint { txid, vout })
    }

    /// Deserialize from a reader: 32-byte txid then LE32 vout.
    pub fn read_from(reader: &mut ByteReader) -> Result<Self, TransactionError> {
        let txid_bytes = reader.read_bytes(32).map_err(|e| {
            TransactionError::SerializationError(format!("reading outpoint txid: {}", e))
        })?;
        let mut txid = [0u8; 32];
        txid.copy_from_slice(txid_bytes);
        let vout = reader.read_u32_le().map_err(|e| {
            TransactionError::SerializationError(format!("reading outpoint index: {}", e))
        })?;
        Ok(Outpoint { txid, vout })
    }

    /// Serialize into a writer.
    pub fn write_to(&self, writer: &mut ByteWriter) {
        writer.write_bytes(&self.txid);
        writer.write_u32_le(self.vout);
    }

    /// Return the txid as a display-order chain hash.
    pub fn txid_hash(&self) -> Hash {
        Hash::new(self.txid)
    }
}

impl std::fmt::Display for Outpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.txid_hash(), self.vout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ref_roundtrip() {
        let outpoint = Outpoint::new([0xAB; 32], 7);
        let reference = outpoint.to_ref();
        assert_eq!(reference[..32], [0xAB; 32]);
        assert_eq!(&reference[32..], &7u32.to_le_bytes());
        assert_eq!(Outpoint::from_ref(&reference).unwrap(), outpoint);
    }

    #[test]
    fn test_from_ref_rejects_wrong_length() {
        assert!(Outpoint::from_ref(&[0u8; 35]).is_err());
        assert!(Outpoint::from_ref(&[0u8; 37]).is_err());
    }

    #[test]
    fn test_null() {
        assert!(Outpoint::null().is_null());
        assert!(!Outpoint::new([1; 32], NULL_VOUT).is_null());
        assert!(!Outpoint::new([0; 32], 0).is_null());
    }
}
