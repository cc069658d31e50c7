#![deny(missing_docs)]

//! Radiant script debugger core.
//!
//! Re-exports the debugger components for convenient single-crate
//! usage: hash/curve primitives, the script bytecode model, the
//! transaction model with fork-id sighash, and the stepwise script VM
//! with its verification entry points.

pub use rxd_primitives as primitives;
pub use rxd_script as script;
pub use rxd_transaction as transaction;
pub use rxd_vm as vm;
