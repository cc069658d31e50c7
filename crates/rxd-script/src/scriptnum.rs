//! Variable-length signed integer codec for script numbers.
//!
//! Stack numbers are sign-magnitude little-endian byte strings: the high
//! bit of the final byte carries the sign, and zero is the empty string.
//! Numeric opcodes operate on 4-byte integers by default and 8-byte
//! integers when extended integers are enabled; an encoding wider than
//! the configured maximum is an error, never a silent truncation.

/// Maximum script number width without extended integers.
pub const MAX_NUM_SIZE_LEGACY: usize = 4;

/// Maximum script number width with extended integers.
pub const MAX_NUM_SIZE_EXTENDED: usize = 8;

/// Numeric codec failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ScriptNumError {
    /// The encoding is wider than the configured maximum.
    #[error("numeric value of {len} bytes exceeds the max allowed of {max}")]
    Overflow {
        /// Actual encoded length.
        len: usize,
        /// Configured maximum length.
        max: usize,
    },

    /// The encoding carries a redundant leading sign byte under
    /// minimal-data rules.
    #[error("numeric value is not minimally encoded")]
    NotMinimal,
}

/// Serialize `n` to its shortest sign-magnitude little-endian encoding.
///
/// Zero serializes to the empty byte string. When the top magnitude byte
/// would collide with the sign bit, an extra byte (0x00 positive, 0x80
/// negative) is appended; otherwise the sign is folded into the top byte.
pub fn serialize(n: i64) -> Vec<u8> {
    if n == 0 {
        return Vec::new();
    }

    let negative = n < 0;
    let mut magnitude = n.unsigned_abs();
    let mut result = Vec::new();
    while magnitude > 0 {
        result.push((magnitude & 0xFF) as u8);
        magnitude >>= 8;
    }

    let top = result[result.len() - 1];
    if top & 0x80 != 0 {
        result.push(if negative { 0x80 } else { 0x00 });
    } else if negative {
        let last = result.len() - 1;
        result[last] |= 0x80;
    }

    result
}

/// Deserialize a sign-magnitude little-endian encoding into an i64.
///
/// Fails when the encoding is wider than `max_len` (or wider than 8
/// bytes outright), or when `require_minimal` is set and the encoding
/// carries a redundant trailing 0x00/0x80 byte. The exact form `{0x80}`
/// is negative zero and decodes to 0 even under minimal-data rules.
pub fn deserialize(bytes: &[u8], max_len: usize, require_minimal: bool) -> Result<i64, ScriptNumError> {
    let limit = max_len.min(MAX_NUM_SIZE_EXTENDED);
    if bytes.len() > limit {
        return Err(ScriptNumError::Overflow {
            len: bytes.len(),
            max: limit,
        });
    }

    if require_minimal && !is_minimally_encoded(bytes) && bytes != [0x80] {
        return Err(ScriptNumError::NotMinimal);
    }

    if bytes.is_empty() {
        return Ok(0);
    }

    let mut value: u64 = 0;
    for (i, &b) in bytes.iter().enumerate() {
        value |= (b as u64) << (8 * i);
    }

    if bytes[bytes.len() - 1] & 0x80 != 0 {
        let sign_mask = 0x80u64 << (8 * (bytes.len() - 1));
        Ok(-((value & !sign_mask) as i64))
    } else {
        Ok(value as i64)
    }
}

/// Check whether an encoding is minimal: the final byte may only be a
/// bare sign byte (0x00/0x80) when the preceding byte needs its high bit.
pub fn is_minimally_encoded(bytes: &[u8]) -> bool {
    if bytes.is_empty() {
        return true;
    }
    if bytes[bytes.len() - 1] & 0x7F == 0 {
        if bytes.len() == 1 || bytes[bytes.len() - 2] & 0x80 == 0 {
            return false;
        }
    }
    true
}

/// Reduce an encoding to its minimal form without reinterpreting the
/// value (used by OP_BIN2NUM).
pub fn minimally_encode(data: &[u8]) -> Vec<u8> {
    if data.is_empty() {
        return Vec::new();
    }

    let mut data = data.to_vec();
    let last = data[data.len() - 1];

    if last & 0x7F != 0 {
        return data;
    }
    if data.len() == 1 {
        return Vec::new();
    }
    if data[data.len() - 2] & 0x80 != 0 {
        return data;
    }

    // Walk back over padding bytes; re-attach the sign to the first
    // significant byte.
    let mut i = data.len() - 1;
    while i > 0 {
        if data[i - 1] != 0 {
            if data[i - 1] & 0x80 != 0 {
                data[i] = last;
                return data[..=i].to_vec();
            } else {
                data[i - 1] |= last;
                return data[..i].to_vec();
            }
        }
        i -= 1;
    }

    Vec::new()
}
