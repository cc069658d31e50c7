//! Transaction output with value and locking script.

use rxd_primitives::util::{ByteReader, ByteWriter, VarInt};
use rxd_script::Script;

use crate::TransactionError;

/// A single output in a transaction.
///
/// # Wire format
///
/// | Field          | Size           |
/// |----------------|----------------|
/// | value          | 8 bytes (LE)   |
/// | script length  | VarInt         |
/// | script_pubkey  | variable       |
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransactionOutput {
    /// The value in photons locked by this output.
    pub value: i64,
    /// The locking script (scriptPubKey) defining spending conditions.
    pub script_pubkey: Script,
}

impl TransactionOutput {
    /// Create an output from a value and locking script.
    pub fn new(value: i64, script_pubkey: Script) -> Self {
        TransactionOutput {
            value,
            script_pubkey,
        }
    }

    /// Deserialize an output from a reader.
    pub fn read_from(reader: &mut ByteReader) -> Result<Self, TransactionError> {
        let value = reader.read_i64_le().map_err(|e| {
            TransactionError::SerializationError(format!("reading output value: {}", e))
        })?;

        let script_len = reader.read_varint().map_err(|e| {
            TransactionError::SerializationError(format!("reading script length: {}", e))
        })?;
        let script_bytes = reader.read_bytes(script_len.value() as usize).map_err(|e| {
            TransactionError::SerializationError(format!("reading locking script: {}", e))
        })?;

        Ok(TransactionOutput {
            value,
            script_pubkey: Script::from_bytes(script_bytes),
        })
    }

    /// Serialize this output into a writer.
    pub fn write_to(&self, writer: &mut ByteWriter) {
        writer.write_i64_le(self.value);
        let script_bytes = self.script_pubkey.to_bytes();
        writer.write_varint(VarInt::from(script_bytes.len()));
        writer.write_bytes(script_bytes);
    }

    /// Serialize this output to a byte vector (also the form hashed by
    /// the signature-hash computation).
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut writer = ByteWriter::new();
        self.write_to(&mut writer);
        writer.into_bytes()
    }
}
