//! The spent UTXO as seen by the script engine.

use rxd_script::Script;

/// A coin (unspent transaction output) being consumed by an input.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Coin {
    /// Value of the output in photons.
    pub value: i64,
    /// The locking script of the output.
    pub script_pubkey: Script,
    /// Block height of the creating transaction (0 if unconfirmed).
    pub height: u32,
    /// Whether the creating transaction was a coinbase.
    pub is_coinbase: bool,
}

impl Coin {
    /// Create a coin from a value and locking script, unconfirmed and
    /// non-coinbase.
    pub fn new(value: i64, script_pubkey: Script) -> Self {
        Coin {
            value,
            script_pubkey,
            height: 0,
            is_coinbase: false,
        }
    }

    /// Create a coin with full metadata.
    pub fn with_height(value: i64, script_pubkey: Script, height: u32, is_coinbase: bool) -> Self {
        Coin {
            value,
            script_pubkey,
            height,
            is_coinbase,
        }
    }
}

impl Default for Coin {
    fn default() -> Self {
        Coin::new(0, Script::new())
    }
}
