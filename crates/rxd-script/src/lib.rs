//! Radiant script bytecode model.
//!
//! Provides the `Script` type with its decoding cursor, the full Radiant
//! opcode table (Bitcoin opcodes plus re-enabled splice/bitwise ops,
//! native introspection, reference tracking, and state separators),
//! chunk-level parsing for ASM output, and the variable-length signed
//! integer codec used by numeric opcodes.

pub mod chunk;
pub mod opcodes;
pub mod script;
pub mod scriptnum;

mod error;
pub use chunk::ScriptChunk;
pub use error::ScriptError;
pub use script::Script;
