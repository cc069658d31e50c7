//! Transaction input referencing a previous output.

use rxd_primitives::util::{ByteReader, ByteWriter, VarInt};
use rxd_script::Script;

use crate::outpoint::Outpoint;
use crate::TransactionError;

/// Sequence number indicating a finalized input (no relative lock-time).
pub const SEQUENCE_FINAL: u32 = 0xFFFF_FFFF;

/// Sequence bit disabling relative lock-time semantics.
pub const SEQUENCE_LOCKTIME_DISABLE_FLAG: u32 = 1 << 31;

/// Sequence bit selecting time-based (rather than height-based) locks.
pub const SEQUENCE_LOCKTIME_TYPE_FLAG: u32 = 1 << 22;

/// Mask extracting the lock-time value from a sequence number.
pub const SEQUENCE_LOCKTIME_MASK: u32 = 0x0000_FFFF;

/// A single input in a transaction.
///
/// References the output being spent by its outpoint, supplies the
/// unlocking script (scriptSig), and carries a sequence number.
///
/// # Wire format
///
/// | Field            | Size             |
/// |------------------|------------------|
/// | prev txid        | 32 bytes         |
/// | prev vout        | 4 bytes (LE)     |
/// | script length    | VarInt           |
/// | script_sig       | variable         |
/// | sequence         | 4 bytes (LE)     |
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransactionInput {
    /// The outpoint being spent.
    pub prevout: Outpoint,
    /// The unlocking script (scriptSig).
    pub script_sig: Script,
    /// Sequence number. Defaults to `SEQUENCE_FINAL`.
    pub sequence: u32,
}

impl TransactionInput {
    /// Create an input spending the given outpoint with an empty
    /// unlocking script and a final sequence.
    pub fn new(prevout: Outpoint) -> Self {
        TransactionInput {
            prevout,
            script_sig: Script::new(),
            sequence: SEQUENCE_FINAL,
        }
    }

    /// Check whether the input is finalized.
    pub fn is_final(&self) -> bool {
        self.sequence == SEQUENCE_FINAL
    }

    /// Deserialize an input from a reader.
    pub fn read_from(reader: &mut ByteReader) -> Result<Self, TransactionError> {
        let prevout = Outpoint::read_from(reader)?;

        let script_len = reader.read_varint().map_err(|e| {
            TransactionError::SerializationError(format!("reading script length: {}", e))
        })?;
        let script_bytes = reader.read_bytes(script_len.value() as usize).map_err(|e| {
            TransactionError::SerializationError(format!("reading unlocking script: {}", e))
        })?;

        let sequence = reader.read_u32_le().map_err(|e| {
            TransactionError::SerializationError(format!("reading sequence: {}", e))
        })?;

        Ok(TransactionInput {
            prevout,
            script_sig: Script::from_bytes(script_bytes),
            sequence,
        })
    }

    /// Serialize this input into a writer.
    pub fn write_to(&self, writer: &mut ByteWriter) {
        self.prevout.write_to(writer);
        let script_bytes = self.script_sig.to_bytes();
        writer.write_varint(VarInt::from(script_bytes.len()));
        writer.write_bytes(script_bytes);
        writer.write_u32_le(self.sequence);
    }
}
