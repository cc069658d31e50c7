//! The script type: an ordered byte sequence with a decoding cursor.
//!
//! Scripts appear in transaction inputs (unlocking) and outputs
//! (locking). Decoding is unambiguous: length-prefixed pushes and
//! embedded reference operands never extend past the end of the script.

use std::fmt;

use crate::chunk::{decode_script, push_data_prefix};
use crate::opcodes::*;
use crate::scriptnum;
use crate::ScriptError;

/// Maximum script byte length.
pub const MAX_SCRIPT_SIZE: usize = 32_000_000;

/// A Radiant script, represented as a byte vector newtype.
#[derive(Clone, PartialEq, Eq, Default, Hash)]
pub struct Script(Vec<u8>);

impl Script {
    // -----------------------------------------------------------------------
    // Constructors
    // -----------------------------------------------------------------------

    /// Create a new empty script.
    pub fn new() -> Self {
        Script(Vec::new())
    }

    /// Create a script from raw bytes.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Script(bytes.to_vec())
    }

    /// Create a script from a hex-encoded string.
    pub fn from_hex(hex_str: &str) -> Result<Self, ScriptError> {
        Ok(Script(hex::decode(hex_str)?))
    }

    /// Create a script from a space-separated ASM string.
    ///
    /// Known opcode names are emitted directly; hex tokens become data
    /// pushes with a minimal prefix. An embedded-reference opcode name
    /// consumes the following token as its 36-byte hex operand.
    pub fn from_asm(asm: &str) -> Result<Self, ScriptError> {
        let mut script = Script::new();
        let mut tokens = asm.split_whitespace().peekable();
        while let Some(token) = tokens.next() {
            if let Some(opcode) = string_to_opcode(token) {
                if has_ref_operand(opcode) {
                    let operand = tokens
                        .next()
                        .ok_or(ScriptError::BadReferenceOperand)?;
                    let bytes = hex::decode(operand)?;
                    let operand: [u8; REF_SIZE] = bytes
                        .try_into()
                        .map_err(|_| ScriptError::BadReferenceOperand)?;
                    script.append_push_ref(opcode, &operand);
                } else {
                    script.append_opcode(opcode);
                }
            } else {
                let data = hex::decode(token)
                    .map_err(|_| ScriptError::UnknownOpcodeName(token.to_string()))?;
                script.append_push_data(&data)?;
            }
        }
        Ok(script)
    }

    // -----------------------------------------------------------------------
    // Serialization
    // -----------------------------------------------------------------------

    /// Encode the script as a lowercase hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }

    /// Convert the script to its ASM representation.
    ///
    /// Data pushes render as hex; embedded-reference opcodes render as
    /// their name followed by the operand hex; everything else renders
    /// by name. Undecodable scripts render as an empty string.
    pub fn to_asm(&self) -> String {
        let chunks = match decode_script(&self.0) {
            Ok(chunks) => chunks,
            Err(_) => return String::new(),
        };
        let mut parts = Vec::with_capacity(chunks.len());
        for chunk in &chunks {
            match (&chunk.data, chunk.op) {
                (Some(data), op) if op <= OP_PUSHDATA4 && op != OP_0 => {
                    let s = hex::encode(data);
                    if !s.is_empty() {
                        parts.push(s);
                    }
                }
                (Some(data), op) => {
                    parts.push(opcode_to_string(op).to_string());
                    parts.push(hex::encode(data));
                }
                (None, op) => parts.push(opcode_to_string(op).to_string()),
            }
        }
        parts.join(" ")
    }

    /// Return a reference to the underlying bytes.
    pub fn to_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Consume the script and return the underlying bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    /// Return the script length in bytes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if the script is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    // -----------------------------------------------------------------------
    // Decoding cursor
    // -----------------------------------------------------------------------

    /// Decode one opcode at the byte offset `*pc`, returning the opcode
    /// and any payload it carries, and advancing `*pc` past it.
    ///
    /// Payloads are push data for push opcodes and the embedded 36-byte
    /// operand for reference opcodes; all other opcodes return an empty
    /// payload. Fails without advancing when the payload would extend
    /// past the end of the script.
    pub fn get_op(&self, pc: &mut usize) -> Result<(u8, Vec<u8>), ScriptError> {
        let bytes = &self.0;
        if *pc >= bytes.len() {
            return Err(ScriptError::DataTooSmall);
        }
        let opcode = bytes[*pc];
        let mut cursor = *pc + 1;

        let data = match opcode {
            0x01..=0x4b => {
                let length = opcode as usize;
                Self::take(bytes, &mut cursor, length)?
            }
            OP_PUSHDATA1 => {
                let length = Self::take(bytes, &mut cursor, 1)?[0] as usize;
                Self::take(bytes, &mut cursor, length)?
            }
            OP_PUSHDATA2 => {
                let len_bytes = Self::take(bytes, &mut cursor, 2)?;
                let length = u16::from_le_bytes([len_bytes[0], len_bytes[1]]) as usize;
                Self::take(bytes, &mut cursor, length)?
            }
            OP_PUSHDATA4 => {
                let len_bytes = Self::take(bytes, &mut cursor, 4)?;
                let length =
                    u32::from_le_bytes([len_bytes[0], len_bytes[1], len_bytes[2], len_bytes[3]])
                        as usize;
                Self::take(bytes, &mut cursor, length)?
            }
            op if has_ref_operand(op) => Self::take(bytes, &mut cursor, REF_SIZE)?,
            _ => Vec::new(),
        };

        *pc = cursor;
        Ok((opcode, data))
    }

    fn take(bytes: &[u8], cursor: &mut usize, n: usize) -> Result<Vec<u8>, ScriptError> {
        if *cursor + n > bytes.len() {
            return Err(ScriptError::DataTooSmall);
        }
        let slice = bytes[*cursor..*cursor + n].to_vec();
        *cursor += n;
        Ok(slice)
    }

    // -----------------------------------------------------------------------
    // Classification
    // -----------------------------------------------------------------------

    /// Check for the Pay-to-Script-Hash pattern:
    /// OP_HASH160 <20 bytes> OP_EQUAL.
    pub fn is_p2sh(&self) -> bool {
        let b = &self.0;
        b.len() == 23 && b[0] == OP_HASH160 && b[1] == OP_DATA_20 && b[22] == OP_EQUAL
    }

    /// Check for the Pay-to-Public-Key-Hash pattern:
    /// OP_DUP OP_HASH160 <20 bytes> OP_EQUALVERIFY OP_CHECKSIG.
    pub fn is_p2pkh(&self) -> bool {
        let b = &self.0;
        b.len() == 25
            && b[0] == OP_DUP
            && b[1] == OP_HASH160
            && b[2] == OP_DATA_20
            && b[23] == OP_EQUALVERIFY
            && b[24] == OP_CHECKSIG
    }

    /// Check that the script consists only of data pushes.
    pub fn is_push_only(&self) -> bool {
        let mut pc = 0;
        while pc < self.0.len() {
            match self.get_op(&mut pc) {
                Ok((opcode, _)) if is_push_opcode(opcode) => {}
                _ => return false,
            }
        }
        true
    }

    /// Check that the script can never be spent: it starts with
    /// OP_RETURN or exceeds the maximum script size.
    pub fn is_unspendable(&self) -> bool {
        (!self.0.is_empty() && self.0[0] == OP_RETURN) || self.0.len() > MAX_SCRIPT_SIZE
    }

    // -----------------------------------------------------------------------
    // State separator
    // -----------------------------------------------------------------------

    /// Return the byte offset of the first OP_STATESEPARATOR, if any.
    pub fn state_separator_index(&self) -> Option<usize> {
        let mut pc = 0;
        while pc < self.0.len() {
            let at = pc;
            match self.get_op(&mut pc) {
                Ok((OP_STATESEPARATOR, _)) => return Some(at),
                Ok(_) => {}
                Err(_) => return None,
            }
        }
        None
    }

    /// Count OP_STATESEPARATOR occurrences (a valid script has at most one).
    pub fn state_separator_count(&self) -> usize {
        let mut pc = 0;
        let mut count = 0;
        while pc < self.0.len() {
            match self.get_op(&mut pc) {
                Ok((OP_STATESEPARATOR, _)) => count += 1,
                Ok(_) => {}
                Err(_) => break,
            }
        }
        count
    }

    /// Return the state script: the bytes before the state separator,
    /// or an empty script when there is no separator.
    pub fn state_script(&self) -> Script {
        match self.state_separator_index() {
            Some(index) => Script(self.0[..index].to_vec()),
            None => Script::new(),
        }
    }

    /// Return the code script: the bytes after the state separator, or
    /// the whole script when there is no separator.
    pub fn code_script(&self) -> Script {
        match self.state_separator_index() {
            Some(index) => Script(self.0[index + 1..].to_vec()),
            None => self.clone(),
        }
    }

    // -----------------------------------------------------------------------
    // Building
    // -----------------------------------------------------------------------

    /// Append a bare opcode.
    pub fn append_opcode(&mut self, opcode: u8) -> &mut Self {
        self.0.push(opcode);
        self
    }

    /// Append a sequence of bare opcodes.
    pub fn append_opcodes(&mut self, opcodes: &[u8]) -> &mut Self {
        self.0.extend_from_slice(opcodes);
        self
    }

    /// Append a data push with a minimal push prefix.
    pub fn append_push_data(&mut self, data: &[u8]) -> Result<&mut Self, ScriptError> {
        let prefix = push_data_prefix(data.len())?;
        self.0.extend_from_slice(&prefix);
        self.0.extend_from_slice(data);
        Ok(self)
    }

    /// Append the minimal push of a numeric value: OP_0, OP_1NEGATE,
    /// OP_1..OP_16, or a sign-magnitude push for anything else.
    pub fn append_num(&mut self, n: i64) -> &mut Self {
        match n {
            0 => self.0.push(OP_0),
            -1 => self.0.push(OP_1NEGATE),
            1..=16 => self.0.push(OP_1 + (n as u8) - 1),
            _ => {
                // scriptnum encodings are at most 9 bytes; the prefix
                // cannot fail
                let encoded = scriptnum::serialize(n);
                self.0.push(encoded.len() as u8);
                self.0.extend_from_slice(&encoded);
            }
        }
        self
    }

    /// Append a reference opcode with its embedded 36-byte operand.
    pub fn append_push_ref(&mut self, opcode: u8, reference: &[u8; REF_SIZE]) -> &mut Self {
        debug_assert!(has_ref_operand(opcode));
        self.0.push(opcode);
        self.0.extend_from_slice(reference);
        self
    }
}

impl fmt::Debug for Script {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Script({})", self.to_hex())
    }
}

impl fmt::Display for Script {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_op_walks_pushes() {
        let script = Script::from_hex("0102aa4c03bbccdd76").unwrap();
        let mut pc = 0;
        let (op, data) = script.get_op(&mut pc).unwrap();
        assert_eq!(op, 0x01);
        assert_eq!(data, vec![0x02]);
        let (op, data) = script.get_op(&mut pc).unwrap();
        assert_eq!(op, 0xAA);
        assert!(data.is_empty());
        let (op, data) = script.get_op(&mut pc).unwrap();
        assert_eq!(op, OP_PUSHDATA1);
        assert_eq!(data, vec![0xBB, 0xCC, 0xDD]);
        let (op, _) = script.get_op(&mut pc).unwrap();
        assert_eq!(op, OP_DUP);
        assert_eq!(pc, script.len());
    }

    #[test]
    fn test_get_op_truncation_does_not_advance() {
        let script = Script::from_bytes(&[0x05, 0x01]);
        let mut pc = 0;
        assert!(script.get_op(&mut pc).is_err());
        assert_eq!(pc, 0);
    }

    #[test]
    fn test_p2sh_and_p2pkh_patterns() {
        let mut p2sh = Script::new();
        p2sh.append_opcode(OP_HASH160);
        p2sh.append_push_data(&[0u8; 20]).unwrap();
        p2sh.append_opcode(OP_EQUAL);
        assert!(p2sh.is_p2sh());
        assert!(!p2sh.is_p2pkh());

        let mut p2pkh = Script::new();
        p2pkh.append_opcodes(&[OP_DUP, OP_HASH160]);
        p2pkh.append_push_data(&[0u8; 20]).unwrap();
        p2pkh.append_opcodes(&[OP_EQUALVERIFY, OP_CHECKSIG]);
        assert!(p2pkh.is_p2pkh());
        assert!(!p2pkh.is_p2sh());
    }

    #[test]
    fn test_push_only() {
        let mut script = Script::new();
        script.append_num(5);
        script.append_push_data(&[1, 2, 3]).unwrap();
        assert!(script.is_push_only());
        script.append_opcode(OP_ADD);
        assert!(!script.is_push_only());
    }

    #[test]
    fn test_unspendable() {
        assert!(Script::from_bytes(&[OP_RETURN]).is_unspendable());
        assert!(Script::from_bytes(&[OP_RETURN, 0x01, 0x02]).is_unspendable());
        assert!(!Script::from_bytes(&[OP_1]).is_unspendable());
        assert!(!Script::new().is_unspendable());
    }

    #[test]
    fn test_state_separator_queries() {
        let mut script = Script::new();
        script.append_push_data(&[0xAA, 0xBB]).unwrap();
        script.append_opcode(OP_STATESEPARATOR);
        script.append_opcodes(&[OP_DUP, OP_HASH256]);

        let index = script.state_separator_index().unwrap();
        assert_eq!(index, 3);
        assert_eq!(script.state_separator_count(), 1);
        assert_eq!(script.state_script().to_bytes(), &[0x02, 0xAA, 0xBB]);
        assert_eq!(script.code_script().to_bytes(), &[OP_DUP, OP_HASH256]);

        let plain = Script::from_bytes(&[OP_1]);
        assert_eq!(plain.state_separator_index(), None);
        assert!(plain.state_script().is_empty());
        assert_eq!(plain.code_script(), plain);
    }

    #[test]
    fn test_separator_inside_push_is_data() {
        // 0xbd as push payload must not register as a separator
        let mut script = Script::new();
        script.append_push_data(&[OP_STATESEPARATOR]).unwrap();
        assert_eq!(script.state_separator_index(), None);
    }

    #[test]
    fn test_append_num_minimal_forms() {
        let mut script = Script::new();
        script.append_num(0);
        script.append_num(-1);
        script.append_num(16);
        script.append_num(17);
        script.append_num(-5);
        assert_eq!(
            script.to_bytes(),
            &[OP_0, OP_1NEGATE, OP_16, 0x01, 0x11, 0x01, 0x85]
        );
    }

    #[test]
    fn test_asm_roundtrip() {
        let asm = "OP_DUP OP_HASH160 aabbccddeeff00112233445566778899aabbccdd OP_EQUALVERIFY OP_CHECKSIG";
        let script = Script::from_asm(asm).unwrap();
        assert!(script.is_p2pkh());
        assert_eq!(script.to_asm(), asm);
    }

    #[test]
    fn test_asm_ref_operand() {
        let operand = "aa".repeat(36);
        let asm = format!("OP_PUSHINPUTREF {} OP_DROP", operand);
        let script = Script::from_asm(&asm).unwrap();
        assert_eq!(script.len(), 1 + 36 + 1);
        assert_eq!(script.to_asm(), asm);

        assert!(Script::from_asm("OP_PUSHINPUTREF aabb").is_err());
        assert!(Script::from_asm("OP_PUSHINPUTREF").is_err());
    }

    #[test]
    fn test_from_asm_rejects_unknown_token() {
        assert!(Script::from_asm("OP_NONSENSE").is_err());
        assert!(Script::from_asm("zzzz").is_err());
    }
}
