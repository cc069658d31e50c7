//! Radiant opcode definitions.
//!
//! Covers the Bitcoin-compatible opcode range plus the Radiant
//! extensions: re-enabled splice/bitwise/multiplicative opcodes, the
//! SHA-512/256 pair, native transaction introspection, reference
//! tracking, state separators, and the BLAKE3/K12 hash opcodes.

// Push value
pub const OP_0: u8 = 0x00;
pub const OP_FALSE: u8 = OP_0;
pub const OP_DATA_1: u8 = 0x01;
pub const OP_DATA_20: u8 = 0x14;
pub const OP_DATA_32: u8 = 0x20;
pub const OP_DATA_33: u8 = 0x21;
pub const OP_DATA_36: u8 = 0x24;
pub const OP_DATA_65: u8 = 0x41;
pub const OP_DATA_75: u8 = 0x4b;
pub const OP_PUSHDATA1: u8 = 0x4c;
pub const OP_PUSHDATA2: u8 = 0x4d;
pub const OP_PUSHDATA4: u8 = 0x4e;
pub const OP_1NEGATE: u8 = 0x4f;
pub const OP_RESERVED: u8 = 0x50;
pub const OP_1: u8 = 0x51;
pub const OP_TRUE: u8 = OP_1;
pub const OP_2: u8 = 0x52;
pub const OP_3: u8 = 0x53;
pub const OP_4: u8 = 0x54;
pub const OP_5: u8 = 0x55;
pub const OP_6: u8 = 0x56;
pub const OP_7: u8 = 0x57;
pub const OP_8: u8 = 0x58;
pub const OP_9: u8 = 0x59;
pub const OP_10: u8 = 0x5a;
pub const OP_11: u8 = 0x5b;
pub const OP_12: u8 = 0x5c;
pub const OP_13: u8 = 0x5d;
pub const OP_14: u8 = 0x5e;
pub const OP_15: u8 = 0x5f;
pub const OP_16: u8 = 0x60;

// Control
pub const OP_NOP: u8 = 0x61;
pub const OP_VER: u8 = 0x62;
pub const OP_IF: u8 = 0x63;
pub const OP_NOTIF: u8 = 0x64;
pub const OP_VERIF: u8 = 0x65;
pub const OP_VERNOTIF: u8 = 0x66;
pub const OP_ELSE: u8 = 0x67;
pub const OP_ENDIF: u8 = 0x68;
pub const OP_VERIFY: u8 = 0x69;
pub const OP_RETURN: u8 = 0x6a;

// Stack operations
pub const OP_TOALTSTACK: u8 = 0x6b;
pub const OP_FROMALTSTACK: u8 = 0x6c;
pub const OP_2DROP: u8 = 0x6d;
pub const OP_2DUP: u8 = 0x6e;
pub const OP_3DUP: u8 = 0x6f;
pub const OP_2OVER: u8 = 0x70;
pub const OP_2ROT: u8 = 0x71;
pub const OP_2SWAP: u8 = 0x72;
pub const OP_IFDUP: u8 = 0x73;
pub const OP_DEPTH: u8 = 0x74;
pub const OP_DROP: u8 = 0x75;
pub const OP_DUP: u8 = 0x76;
pub const OP_NIP: u8 = 0x77;
pub const OP_OVER: u8 = 0x78;
pub const OP_PICK: u8 = 0x79;
pub const OP_ROLL: u8 = 0x7a;
pub const OP_ROT: u8 = 0x7b;
pub const OP_SWAP: u8 = 0x7c;
pub const OP_TUCK: u8 = 0x7d;

// Splice operations (re-enabled in Radiant)
pub const OP_CAT: u8 = 0x7e;
pub const OP_SPLIT: u8 = 0x7f;
pub const OP_NUM2BIN: u8 = 0x80;
pub const OP_BIN2NUM: u8 = 0x81;
pub const OP_SIZE: u8 = 0x82;

// Bit logic
pub const OP_INVERT: u8 = 0x83;
pub const OP_AND: u8 = 0x84;
pub const OP_OR: u8 = 0x85;
pub const OP_XOR: u8 = 0x86;
pub const OP_EQUAL: u8 = 0x87;
pub const OP_EQUALVERIFY: u8 = 0x88;
pub const OP_RESERVED1: u8 = 0x89;
pub const OP_RESERVED2: u8 = 0x8a;

// Numeric
pub const OP_1ADD: u8 = 0x8b;
pub const OP_1SUB: u8 = 0x8c;
pub const OP_2MUL: u8 = 0x8d;
pub const OP_2DIV: u8 = 0x8e;
pub const OP_NEGATE: u8 = 0x8f;
pub const OP_ABS: u8 = 0x90;
pub const OP_NOT: u8 = 0x91;
pub const OP_0NOTEQUAL: u8 = 0x92;
pub const OP_ADD: u8 = 0x93;
pub const OP_SUB: u8 = 0x94;
pub const OP_MUL: u8 = 0x95;
pub const OP_DIV: u8 = 0x96;
pub const OP_MOD: u8 = 0x97;
pub const OP_LSHIFT: u8 = 0x98;
pub const OP_RSHIFT: u8 = 0x99;
pub const OP_BOOLAND: u8 = 0x9a;
pub const OP_BOOLOR: u8 = 0x9b;
pub const OP_NUMEQUAL: u8 = 0x9c;
pub const OP_NUMEQUALVERIFY: u8 = 0x9d;
pub const OP_NUMNOTEQUAL: u8 = 0x9e;
pub const OP_LESSTHAN: u8 = 0x9f;
pub const OP_GREATERTHAN: u8 = 0xa0;
pub const OP_LESSTHANOREQUAL: u8 = 0xa1;
pub const OP_GREATERTHANOREQUAL: u8 = 0xa2;
pub const OP_MIN: u8 = 0xa3;
pub const OP_MAX: u8 = 0xa4;
pub const OP_WITHIN: u8 = 0xa5;

// Crypto
pub const OP_RIPEMD160: u8 = 0xa6;
pub const OP_SHA1: u8 = 0xa7;
pub const OP_SHA256: u8 = 0xa8;
pub const OP_HASH160: u8 = 0xa9;
pub const OP_HASH256: u8 = 0xaa;
pub const OP_CODESEPARATOR: u8 = 0xab;
pub const OP_CHECKSIG: u8 = 0xac;
pub const OP_CHECKSIGVERIFY: u8 = 0xad;
pub const OP_CHECKMULTISIG: u8 = 0xae;
pub const OP_CHECKMULTISIGVERIFY: u8 = 0xaf;

// Expansion
pub const OP_NOP1: u8 = 0xb0;
pub const OP_CHECKLOCKTIMEVERIFY: u8 = 0xb1;
pub const OP_NOP2: u8 = OP_CHECKLOCKTIMEVERIFY;
pub const OP_CHECKSEQUENCEVERIFY: u8 = 0xb2;
pub const OP_NOP3: u8 = OP_CHECKSEQUENCEVERIFY;
pub const OP_NOP4: u8 = 0xb3;
pub const OP_NOP5: u8 = 0xb4;
pub const OP_NOP6: u8 = 0xb5;
pub const OP_NOP7: u8 = 0xb6;
pub const OP_NOP8: u8 = 0xb7;
pub const OP_NOP9: u8 = 0xb8;
pub const OP_NOP10: u8 = 0xb9;

// More crypto (BCH-derived)
pub const OP_CHECKDATASIG: u8 = 0xba;
pub const OP_CHECKDATASIGVERIFY: u8 = 0xbb;

// Additional byte string operations
pub const OP_REVERSEBYTES: u8 = 0xbc;

// State separator
pub const OP_STATESEPARATOR: u8 = 0xbd;
pub const OP_STATESEPARATORINDEX_UTXO: u8 = 0xbe;
pub const OP_STATESEPARATORINDEX_OUTPUT: u8 = 0xbf;

// Native introspection
pub const OP_INPUTINDEX: u8 = 0xc0;
pub const OP_ACTIVEBYTECODE: u8 = 0xc1;
pub const OP_TXVERSION: u8 = 0xc2;
pub const OP_TXINPUTCOUNT: u8 = 0xc3;
pub const OP_TXOUTPUTCOUNT: u8 = 0xc4;
pub const OP_TXLOCKTIME: u8 = 0xc5;
pub const OP_UTXOVALUE: u8 = 0xc6;
pub const OP_UTXOBYTECODE: u8 = 0xc7;
pub const OP_OUTPOINTTXHASH: u8 = 0xc8;
pub const OP_OUTPOINTINDEX: u8 = 0xc9;
pub const OP_INPUTBYTECODE: u8 = 0xca;
pub const OP_INPUTSEQUENCENUMBER: u8 = 0xcb;
pub const OP_OUTPUTVALUE: u8 = 0xcc;
pub const OP_OUTPUTBYTECODE: u8 = 0xcd;

// SHA512/256 functions
pub const OP_SHA512_256: u8 = 0xce;
pub const OP_HASH512_256: u8 = 0xcf;

// Reference opcodes
pub const OP_PUSHINPUTREF: u8 = 0xd0;
pub const OP_REQUIREINPUTREF: u8 = 0xd1;
pub const OP_DISALLOWPUSHINPUTREF: u8 = 0xd2;
pub const OP_DISALLOWPUSHINPUTREFSIBLING: u8 = 0xd3;
pub const OP_REFHASHDATASUMMARY_UTXO: u8 = 0xd4;
pub const OP_REFHASHVALUESUM_UTXOS: u8 = 0xd5;
pub const OP_REFHASHDATASUMMARY_OUTPUT: u8 = 0xd6;
pub const OP_REFHASHVALUESUM_OUTPUTS: u8 = 0xd7;
pub const OP_PUSHINPUTREFSINGLETON: u8 = 0xd8;
pub const OP_REFTYPE_UTXO: u8 = 0xd9;
pub const OP_REFTYPE_OUTPUT: u8 = 0xda;
pub const OP_REFVALUESUM_UTXOS: u8 = 0xdb;
pub const OP_REFVALUESUM_OUTPUTS: u8 = 0xdc;
pub const OP_REFOUTPUTCOUNT_UTXOS: u8 = 0xdd;
pub const OP_REFOUTPUTCOUNT_OUTPUTS: u8 = 0xde;
pub const OP_REFOUTPUTCOUNTZEROVALUED_UTXOS: u8 = 0xdf;
pub const OP_REFOUTPUTCOUNTZEROVALUED_OUTPUTS: u8 = 0xe0;
pub const OP_REFDATASUMMARY_UTXO: u8 = 0xe1;
pub const OP_REFDATASUMMARY_OUTPUT: u8 = 0xe2;
pub const OP_CODESCRIPTHASHVALUESUM_UTXOS: u8 = 0xe3;
pub const OP_CODESCRIPTHASHVALUESUM_OUTPUTS: u8 = 0xe4;
pub const OP_CODESCRIPTHASHOUTPUTCOUNT_UTXOS: u8 = 0xe5;
pub const OP_CODESCRIPTHASHOUTPUTCOUNT_OUTPUTS: u8 = 0xe6;
pub const OP_CODESCRIPTHASHZEROVALUEDOUTPUTCOUNT_UTXOS: u8 = 0xe7;
pub const OP_CODESCRIPTHASHZEROVALUEDOUTPUTCOUNT_OUTPUTS: u8 = 0xe8;
pub const OP_CODESCRIPTBYTECODE_UTXO: u8 = 0xe9;
pub const OP_CODESCRIPTBYTECODE_OUTPUT: u8 = 0xea;
pub const OP_STATESCRIPTBYTECODE_UTXO: u8 = 0xeb;
pub const OP_STATESCRIPTBYTECODE_OUTPUT: u8 = 0xec;
pub const OP_PUSH_TX_STATE: u8 = 0xed;

// PoW hash opcodes
pub const OP_BLAKE3: u8 = 0xee;
pub const OP_K12: u8 = 0xef;

/// Byte length of a reference operand (32-byte txid + 4-byte vout).
pub const REF_SIZE: usize = 36;

/// Return true if the opcode only pushes data (0x00-0x60, excluding the
/// reserved byte between OP_0 and the small integers counts as push for
/// the push-only rule, matching consensus behavior).
pub fn is_push_opcode(opcode: u8) -> bool {
    opcode <= OP_16
}

/// Return true if the opcode carries an embedded 36-byte reference
/// operand immediately after the opcode byte.
pub fn has_ref_operand(opcode: u8) -> bool {
    matches!(
        opcode,
        OP_PUSHINPUTREF
            | OP_REQUIREINPUTREF
            | OP_DISALLOWPUSHINPUTREF
            | OP_DISALLOWPUSHINPUTREFSIBLING
            | OP_PUSHINPUTREFSINGLETON
    )
}

/// Return true if the opcode is a native introspection opcode.
pub fn is_introspection_opcode(opcode: u8) -> bool {
    (OP_INPUTINDEX..=OP_OUTPUTBYTECODE).contains(&opcode)
}

/// Return true if the opcode queries state-separator positions or the
/// state/code script slices of a coin or output.
pub fn is_state_separator_query(opcode: u8) -> bool {
    matches!(
        opcode,
        OP_STATESEPARATORINDEX_UTXO
            | OP_STATESEPARATORINDEX_OUTPUT
            | OP_CODESCRIPTBYTECODE_UTXO
            | OP_CODESCRIPTBYTECODE_OUTPUT
            | OP_STATESCRIPTBYTECODE_UTXO
            | OP_STATESCRIPTBYTECODE_OUTPUT
    )
}

/// Return true if the opcode belongs to the reference-tracking family.
pub fn is_reference_opcode(opcode: u8) -> bool {
    (OP_PUSHINPUTREF..=OP_CODESCRIPTHASHZEROVALUEDOUTPUTCOUNT_OUTPUTS).contains(&opcode)
}

/// Return the canonical name of an opcode.
///
/// Direct data pushes (0x01-0x4b) have no individual names; they render
/// as their payload in ASM output.
pub fn opcode_to_string(opcode: u8) -> &'static str {
    match opcode {
        OP_0 => "OP_0",
        0x01..=0x4b => "OP_PUSHBYTES",
        OP_PUSHDATA1 => "OP_PUSHDATA1",
        OP_PUSHDATA2 => "OP_PUSHDATA2",
        OP_PUSHDATA4 => "OP_PUSHDATA4",
        OP_1NEGATE => "OP_1NEGATE",
        OP_RESERVED => "OP_RESERVED",
        OP_1 => "OP_1",
        OP_2 => "OP_2",
        OP_3 => "OP_3",
        OP_4 => "OP_4",
        OP_5 => "OP_5",
        OP_6 => "OP_6",
        OP_7 => "OP_7",
        OP_8 => "OP_8",
        OP_9 => "OP_9",
        OP_10 => "OP_10",
        OP_11 => "OP_11",
        OP_12 => "OP_12",
        OP_13 => "OP_13",
        OP_14 => "OP_14",
        OP_15 => "OP_15",
        OP_16 => "OP_16",
        OP_NOP => "OP_NOP",
        OP_VER => "OP_VER",
        OP_IF => "OP_IF",
        OP_NOTIF => "OP_NOTIF",
        OP_VERIF => "OP_VERIF",
        OP_VERNOTIF => "OP_VERNOTIF",
        OP_ELSE => "OP_ELSE",
        OP_ENDIF => "OP_ENDIF",
        OP_VERIFY => "OP_VERIFY",
        OP_RETURN => "OP_RETURN",
        OP_TOALTSTACK => "OP_TOALTSTACK",
        OP_FROMALTSTACK => "OP_FROMALTSTACK",
        OP_2DROP => "OP_2DROP",
        OP_2DUP => "OP_2DUP",
        OP_3DUP => "OP_3DUP",
        OP_2OVER => "OP_2OVER",
        OP_2ROT => "OP_2ROT",
        OP_2SWAP => "OP_2SWAP",
        OP_IFDUP => "OP_IFDUP",
        OP_DEPTH => "OP_DEPTH",
        OP_DROP => "OP_DROP",
        OP_DUP => "OP_DUP",
        OP_NIP => "OP_NIP",
        OP_OVER => "OP_OVER",
        OP_PICK => "OP_PICK",
        OP_ROLL => "OP_ROLL",
        OP_ROT => "OP_ROT",
        OP_SWAP => "OP_SWAP",
        OP_TUCK => "OP_TUCK",
        OP_CAT => "OP_CAT",
        OP_SPLIT => "OP_SPLIT",
        OP_NUM2BIN => "OP_NUM2BIN",
        OP_BIN2NUM => "OP_BIN2NUM",
        OP_SIZE => "OP_SIZE",
        OP_INVERT => "OP_INVERT",
        OP_AND => "OP_AND",
        OP_OR => "OP_OR",
        OP_XOR => "OP_XOR",
        OP_EQUAL => "OP_EQUAL",
        OP_EQUALVERIFY => "OP_EQUALVERIFY",
        OP_RESERVED1 => "OP_RESERVED1",
        OP_RESERVED2 => "OP_RESERVED2",
        OP_1ADD => "OP_1ADD",
        OP_1SUB => "OP_1SUB",
        OP_2MUL => "OP_2MUL",
        OP_2DIV => "OP_2DIV",
        OP_NEGATE => "OP_NEGATE",
        OP_ABS => "OP_ABS",
        OP_NOT => "OP_NOT",
        OP_0NOTEQUAL => "OP_0NOTEQUAL",
        OP_ADD => "OP_ADD",
        OP_SUB => "OP_SUB",
        OP_MUL => "OP_MUL",
        OP_DIV => "OP_DIV",
        OP_MOD => "OP_MOD",
        OP_LSHIFT => "OP_LSHIFT",
        OP_RSHIFT => "OP_RSHIFT",
        OP_BOOLAND => "OP_BOOLAND",
        OP_BOOLOR => "OP_BOOLOR",
        OP_NUMEQUAL => "OP_NUMEQUAL",
        OP_NUMEQUALVERIFY => "OP_NUMEQUALVERIFY",
        OP_NUMNOTEQUAL => "OP_NUMNOTEQUAL",
        OP_LESSTHAN => "OP_LESSTHAN",
        OP_GREATERTHAN => "OP_GREATERTHAN",
        OP_LESSTHANOREQUAL => "OP_LESSTHANOREQUAL",
        OP_GREATERTHANOREQUAL => "OP_GREATERTHANOREQUAL",
        OP_MIN => "OP_MIN",
        OP_MAX => "OP_MAX",
        OP_WITHIN => "OP_WITHIN",
        OP_RIPEMD160 => "OP_RIPEMD160",
        OP_SHA1 => "OP_SHA1",
        OP_SHA256 => "OP_SHA256",
        OP_HASH160 => "OP_HASH160",
        OP_HASH256 => "OP_HASH256",
        OP_CODESEPARATOR => "OP_CODESEPARATOR",
        OP_CHECKSIG => "OP_CHECKSIG",
        OP_CHECKSIGVERIFY => "OP_CHECKSIGVERIFY",
        OP_CHECKMULTISIG => "OP_CHECKMULTISIG",
        OP_CHECKMULTISIGVERIFY => "OP_CHECKMULTISIGVERIFY",
        OP_NOP1 => "OP_NOP1",
        OP_CHECKLOCKTIMEVERIFY => "OP_CHECKLOCKTIMEVERIFY",
        OP_CHECKSEQUENCEVERIFY => "OP_CHECKSEQUENCEVERIFY",
        OP_NOP4 => "OP_NOP4",
        OP_NOP5 => "OP_NOP5",
        OP_NOP6 => "OP_NOP6",
        OP_NOP7 => "OP_NOP7",
        OP_NOP8 => "OP_NOP8",
        OP_NOP9 => "OP_NOP9",
        OP_NOP10 => "OP_NOP10",
        OP_CHECKDATASIG => "OP_CHECKDATASIG",
        OP_CHECKDATASIGVERIFY => "OP_CHECKDATASIGVERIFY",
        OP_REVERSEBYTES => "OP_REVERSEBYTES",
        OP_STATESEPARATOR => "OP_STATESEPARATOR",
        OP_STATESEPARATORINDEX_UTXO => "OP_STATESEPARATORINDEX_UTXO",
        OP_STATESEPARATORINDEX_OUTPUT => "OP_STATESEPARATORINDEX_OUTPUT",
        OP_INPUTINDEX => "OP_INPUTINDEX",
        OP_ACTIVEBYTECODE => "OP_ACTIVEBYTECODE",
        OP_TXVERSION => "OP_TXVERSION",
        OP_TXINPUTCOUNT => "OP_TXINPUTCOUNT",
        OP_TXOUTPUTCOUNT => "OP_TXOUTPUTCOUNT",
        OP_TXLOCKTIME => "OP_TXLOCKTIME",
        OP_UTXOVALUE => "OP_UTXOVALUE",
        OP_UTXOBYTECODE => "OP_UTXOBYTECODE",
        OP_OUTPOINTTXHASH => "OP_OUTPOINTTXHASH",
        OP_OUTPOINTINDEX => "OP_OUTPOINTINDEX",
        OP_INPUTBYTECODE => "OP_INPUTBYTECODE",
        OP_INPUTSEQUENCENUMBER => "OP_INPUTSEQUENCENUMBER",
        OP_OUTPUTVALUE => "OP_OUTPUTVALUE",
        OP_OUTPUTBYTECODE => "OP_OUTPUTBYTECODE",
        OP_SHA512_256 => "OP_SHA512_256",
        OP_HASH512_256 => "OP_HASH512_256",
        OP_PUSHINPUTREF => "OP_PUSHINPUTREF",
        OP_REQUIREINPUTREF => "OP_REQUIREINPUTREF",
        OP_DISALLOWPUSHINPUTREF => "OP_DISALLOWPUSHINPUTREF",
        OP_DISALLOWPUSHINPUTREFSIBLING => "OP_DISALLOWPUSHINPUTREFSIBLING",
        OP_REFHASHDATASUMMARY_UTXO => "OP_REFHASHDATASUMMARY_UTXO",
        OP_REFHASHVALUESUM_UTXOS => "OP_REFHASHVALUESUM_UTXOS",
        OP_REFHASHDATASUMMARY_OUTPUT => "OP_REFHASHDATASUMMARY_OUTPUT",
        OP_REFHASHVALUESUM_OUTPUTS => "OP_REFHASHVALUESUM_OUTPUTS",
        OP_PUSHINPUTREFSINGLETON => "OP_PUSHINPUTREFSINGLETON",
        OP_REFTYPE_UTXO => "OP_REFTYPE_UTXO",
        OP_REFTYPE_OUTPUT => "OP_REFTYPE_OUTPUT",
        OP_REFVALUESUM_UTXOS => "OP_REFVALUESUM_UTXOS",
        OP_REFVALUESUM_OUTPUTS => "OP_REFVALUESUM_OUTPUTS",
        OP_REFOUTPUTCOUNT_UTXOS => "OP_REFOUTPUTCOUNT_UTXOS",
        OP_REFOUTPUTCOUNT_OUTPUTS => "OP_REFOUTPUTCOUNT_OUTPUTS",
        OP_REFOUTPUTCOUNTZEROVALUED_UTXOS => "OP_REFOUTPUTCOUNTZEROVALUED_UTXOS",
        OP_REFOUTPUTCOUNTZEROVALUED_OUTPUTS => "OP_REFOUTPUTCOUNTZEROVALUED_OUTPUTS",
        OP_REFDATASUMMARY_UTXO => "OP_REFDATASUMMARY_UTXO",
        OP_REFDATASUMMARY_OUTPUT => "OP_REFDATASUMMARY_OUTPUT",
        OP_CODESCRIPTHASHVALUESUM_UTXOS => "OP_CODESCRIPTHASHVALUESUM_UTXOS",
        OP_CODESCRIPTHASHVALUESUM_OUTPUTS => "OP_CODESCRIPTHASHVALUESUM_OUTPUTS",
        OP_CODESCRIPTHASHOUTPUTCOUNT_UTXOS => "OP_CODESCRIPTHASHOUTPUTCOUNT_UTXOS",
        OP_CODESCRIPTHASHOUTPUTCOUNT_OUTPUTS => "OP_CODESCRIPTHASHOUTPUTCOUNT_OUTPUTS",
        OP_CODESCRIPTHASHZEROVALUEDOUTPUTCOUNT_UTXOS => {
            "OP_CODESCRIPTHASHZEROVALUEDOUTPUTCOUNT_UTXOS"
        }
        OP_CODESCRIPTHASHZEROVALUEDOUTPUTCOUNT_OUTPUTS => {
            "OP_CODESCRIPTHASHZEROVALUEDOUTPUTCOUNT_OUTPUTS"
        }
        OP_CODESCRIPTBYTECODE_UTXO => "OP_CODESCRIPTBYTECODE_UTXO",
        OP_CODESCRIPTBYTECODE_OUTPUT => "OP_CODESCRIPTBYTECODE_OUTPUT",
        OP_STATESCRIPTBYTECODE_UTXO => "OP_STATESCRIPTBYTECODE_UTXO",
        OP_STATESCRIPTBYTECODE_OUTPUT => "OP_STATESCRIPTBYTECODE_OUTPUT",
        OP_PUSH_TX_STATE => "OP_PUSH_TX_STATE",
        OP_BLAKE3 => "OP_BLAKE3",
        OP_K12 => "OP_K12",
        _ => "OP_UNKNOWN",
    }
}

/// Parse an opcode from its canonical name, including the aliases
/// OP_FALSE, OP_TRUE, OP_NOP2, and OP_NOP3.
pub fn string_to_opcode(name: &str) -> Option<u8> {
    match name {
        "OP_FALSE" => return Some(OP_0),
        "OP_TRUE" => return Some(OP_1),
        "OP_NOP2" => return Some(OP_CHECKLOCKTIMEVERIFY),
        "OP_NOP3" => return Some(OP_CHECKSEQUENCEVERIFY),
        _ => {}
    }
    // Names are unique over the full byte range, so a scan is enough.
    for opcode in 0u8..=0xFF {
        let s = opcode_to_string(opcode);
        if s != "OP_UNKNOWN" && s != "OP_PUSHBYTES" && s == name {
            return Some(opcode);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_roundtrip() {
        for opcode in [
            OP_0,
            OP_DUP,
            OP_CHECKSIG,
            OP_CAT,
            OP_PUSHINPUTREF,
            OP_STATESEPARATOR,
            OP_TXINPUTCOUNT,
            OP_BLAKE3,
            OP_K12,
            OP_CODESCRIPTHASHZEROVALUEDOUTPUTCOUNT_OUTPUTS,
        ] {
            let name = opcode_to_string(opcode);
            assert_eq!(string_to_opcode(name), Some(opcode), "{}", name);
        }
    }

    #[test]
    fn test_aliases() {
        assert_eq!(string_to_opcode("OP_TRUE"), Some(OP_1));
        assert_eq!(string_to_opcode("OP_FALSE"), Some(OP_0));
        assert_eq!(string_to_opcode("OP_NOP2"), Some(OP_CHECKLOCKTIMEVERIFY));
    }

    #[test]
    fn test_predicates() {
        assert!(is_push_opcode(OP_0));
        assert!(is_push_opcode(OP_16));
        assert!(!is_push_opcode(OP_NOP));
        assert!(has_ref_operand(OP_PUSHINPUTREF));
        assert!(has_ref_operand(OP_PUSHINPUTREFSINGLETON));
        assert!(!has_ref_operand(OP_REFVALUESUM_UTXOS));
        assert!(is_introspection_opcode(OP_INPUTINDEX));
        assert!(is_introspection_opcode(OP_OUTPUTBYTECODE));
        assert!(!is_introspection_opcode(OP_SHA512_256));
        assert!(is_state_separator_query(OP_STATESCRIPTBYTECODE_OUTPUT));
    }
}
