//! Script chunk parsing and encoding.
//!
//! A chunk is one opcode together with any bytes it carries: push
//! payloads, embedded 36-byte reference operands, or the unreachable
//! tail after a top-level OP_RETURN. Chunks back the ASM codec and the
//! signature-removal pass used when computing script code.

use crate::opcodes::*;
use crate::ScriptError;

/// A single parsed element of a script.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScriptChunk {
    /// The opcode byte. For direct pushes (1-75 bytes) this is the length.
    pub op: u8,
    /// The byte payload, if this chunk carries one.
    pub data: Option<Vec<u8>>,
}

impl ScriptChunk {
    /// Serialize this chunk back to script bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        let data = self.data.as_deref().unwrap_or(&[]);
        let mut out = vec![self.op];
        match self.op {
            0x01..=0x4b => out.extend_from_slice(data),
            OP_PUSHDATA1 => {
                out.push(data.len() as u8);
                out.extend_from_slice(data);
            }
            OP_PUSHDATA2 => {
                out.extend_from_slice(&(data.len() as u16).to_le_bytes());
                out.extend_from_slice(data);
            }
            OP_PUSHDATA4 => {
                out.extend_from_slice(&(data.len() as u32).to_le_bytes());
                out.extend_from_slice(data);
            }
            op if has_ref_operand(op) => out.extend_from_slice(data),
            // Trailing OP_RETURN payloads are raw bytes, not a push.
            OP_RETURN => out.extend_from_slice(data),
            _ => {}
        }
        out
    }

    /// Return true if this chunk is a data push carrying `needle` exactly.
    pub fn pushes(&self, needle: &[u8]) -> bool {
        self.op <= OP_PUSHDATA4 && self.data.as_deref() == Some(needle)
    }
}

/// Decode raw script bytes into chunks.
///
/// Handles direct pushes, OP_PUSHDATA1/2/4, embedded reference operands,
/// and a top-level OP_RETURN consuming the rest of the script as opaque
/// data (inside a conditional it stays a plain opcode).
pub fn decode_script(bytes: &[u8]) -> Result<Vec<ScriptChunk>, ScriptError> {
    let mut chunks = Vec::new();
    let mut pos = 0;
    let mut conditional_depth: i32 = 0;

    while pos < bytes.len() {
        let op = bytes[pos];

        match op {
            OP_IF | OP_NOTIF | OP_VERIF | OP_VERNOTIF => {
                conditional_depth += 1;
                chunks.push(ScriptChunk { op, data: None });
                pos += 1;
            }
            OP_ENDIF => {
                conditional_depth -= 1;
                chunks.push(ScriptChunk { op, data: None });
                pos += 1;
            }
            OP_RETURN if conditional_depth <= 0 => {
                let data = if pos + 1 < bytes.len() {
                    Some(bytes[pos + 1..].to_vec())
                } else {
                    None
                };
                chunks.push(ScriptChunk { op, data });
                pos = bytes.len();
            }
            OP_PUSHDATA1 => {
                if pos + 2 > bytes.len() {
                    return Err(ScriptError::DataTooSmall);
                }
                let length = bytes[pos + 1] as usize;
                pos += 2;
                if pos + length > bytes.len() {
                    return Err(ScriptError::DataTooSmall);
                }
                chunks.push(ScriptChunk {
                    op,
                    data: Some(bytes[pos..pos + length].to_vec()),
                });
                pos += length;
            }
            OP_PUSHDATA2 => {
                if pos + 3 > bytes.len() {
                    return Err(ScriptError::DataTooSmall);
                }
                let length = u16::from_le_bytes([bytes[pos + 1], bytes[pos + 2]]) as usize;
                pos += 3;
                if pos + length > bytes.len() {
                    return Err(ScriptError::DataTooSmall);
                }
                chunks.push(ScriptChunk {
                    op,
                    data: Some(bytes[pos..pos + length].to_vec()),
                });
                pos += length;
            }
            OP_PUSHDATA4 => {
                if pos + 5 > bytes.len() {
                    return Err(ScriptError::DataTooSmall);
                }
                let length = u32::from_le_bytes([
                    bytes[pos + 1],
                    bytes[pos + 2],
                    bytes[pos + 3],
                    bytes[pos + 4],
                ]) as usize;
                pos += 5;
                if pos + length > bytes.len() {
                    return Err(ScriptError::DataTooSmall);
                }
                chunks.push(ScriptChunk {
                    op,
                    data: Some(bytes[pos..pos + length].to_vec()),
                });
                pos += length;
            }
            0x01..=0x4b => {
                let length = op as usize;
                if pos + 1 + length > bytes.len() {
                    return Err(ScriptError::DataTooSmall);
                }
                chunks.push(ScriptChunk {
                    op,
                    data: Some(bytes[pos + 1..pos + 1 + length].to_vec()),
                });
                pos += 1 + length;
            }
            op if has_ref_operand(op) => {
                if pos + 1 + REF_SIZE > bytes.len() {
                    return Err(ScriptError::DataTooSmall);
                }
                chunks.push(ScriptChunk {
                    op,
                    data: Some(bytes[pos + 1..pos + 1 + REF_SIZE].to_vec()),
                });
                pos += 1 + REF_SIZE;
            }
            _ => {
                chunks.push(ScriptChunk { op, data: None });
                pos += 1;
            }
        }
    }

    Ok(chunks)
}

/// Compute the push prefix bytes for a payload of the given length.
pub fn push_data_prefix(data_len: usize) -> Result<Vec<u8>, ScriptError> {
    if data_len <= 75 {
        Ok(vec![data_len as u8])
    } else if data_len <= 0xFF {
        Ok(vec![OP_PUSHDATA1, data_len as u8])
    } else if data_len <= 0xFFFF {
        let mut buf = vec![OP_PUSHDATA2];
        buf.extend_from_slice(&(data_len as u16).to_le_bytes());
        Ok(buf)
    } else if data_len <= 0xFFFF_FFFF {
        let mut buf = vec![OP_PUSHDATA4];
        buf.extend_from_slice(&(data_len as u32).to_le_bytes());
        Ok(buf)
    } else {
        Err(ScriptError::DataTooBig)
    }
}

/// Remove every push of exactly `needle` from `bytes`, re-encoding the
/// remaining chunks unchanged.
///
/// Used when deriving the script code for a signature check: the raw
/// signature bytes are removed from the sub-script before hashing.
pub fn remove_pushes_of(bytes: &[u8], needle: &[u8]) -> Vec<u8> {
    match decode_script(bytes) {
        Ok(chunks) => {
            let mut out = Vec::with_capacity(bytes.len());
            for chunk in &chunks {
                if !chunk.pushes(needle) {
                    out.extend_from_slice(&chunk.to_bytes());
                }
            }
            out
        }
        // An undecodable script cannot contain a removable push.
        Err(_) => bytes.to_vec(),
    }
}
