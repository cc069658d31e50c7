//! Radiant transaction model.
//!
//! Provides the transaction value types (outpoint, input, output,
//! transaction, spent coin), canonical little-endian wire serialization
//! with VarInt counts, txid computation, and the BIP143-style fork-id
//! signature hash.

pub mod coin;
pub mod input;
pub mod outpoint;
pub mod output;
pub mod sighash;
pub mod transaction;

mod error;
pub use coin::Coin;
pub use error::TransactionError;
pub use input::TransactionInput;
pub use outpoint::Outpoint;
pub use output::TransactionOutput;
pub use transaction::Transaction;
