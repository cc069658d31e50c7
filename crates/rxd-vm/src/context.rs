//! Execution context for introspection and reference opcodes.
//!
//! Built once per (transaction, spent coins, input index). Scans every
//! spent coin's locking script and every output script for reference
//! opcodes and state separators, then folds the per-script summaries
//! into aggregate maps so the summary-query opcodes answer in O(1).
//! The context is immutable after construction and shared read-only by
//! the VM, the dispatcher, and the verifier.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use rxd_primitives::hash::{sha256, sha256d};
use rxd_primitives::util::{ByteWriter, VarInt};
use rxd_script::opcodes::*;
use rxd_script::Script;
use rxd_transaction::{Coin, Transaction};

use crate::error::{ExecError, ExecErrorCode};

/// A 36-byte reference: txid ‖ vout-LE.
pub type RefId = [u8; REF_SIZE];

/// Reference summary of a single script (one coin or one output).
#[derive(Debug, Clone, Default)]
pub struct PushRefSummary {
    /// Value of the coin or output carrying this script.
    pub value: i64,
    /// Operands of OP_PUSHINPUTREF and OP_PUSHINPUTREFSINGLETON.
    pub push_refs: BTreeSet<RefId>,
    /// Operands of OP_REQUIREINPUTREF.
    pub require_refs: BTreeSet<RefId>,
    /// Operands of OP_DISALLOWPUSHINPUTREFSIBLING.
    pub sibling_disallow_refs: BTreeSet<RefId>,
    /// Operands of OP_PUSHINPUTREFSINGLETON.
    pub singleton_refs: BTreeSet<RefId>,
    /// SHA-256 of each push ref, for the REFHASH queries.
    pub push_ref_hashes: BTreeSet<[u8; 32]>,
    /// Double SHA-256 of the code script.
    pub code_script_hash: [u8; 32],
    /// Byte offset of the first OP_STATESEPARATOR, if present.
    pub state_separator_index: Option<u32>,
}

impl PushRefSummary {
    fn scan(script: &Script, value: i64) -> Self {
        let mut summary = PushRefSummary {
            value,
            code_script_hash: sha256d(script.code_script().to_bytes()),
            ..Default::default()
        };

        let mut pc = 0;
        while pc < script.len() {
            let at = pc;
            let (opcode, operand) = match script.get_op(&mut pc) {
                Ok(decoded) => decoded,
                Err(_) => break,
            };
            if has_ref_operand(opcode) && operand.len() == REF_SIZE {
                let mut reference = [0u8; REF_SIZE];
                reference.copy_from_slice(&operand);
                match opcode {
                    OP_PUSHINPUTREF => {
                        summary.push_ref_hashes.insert(sha256(&reference));
                        summary.push_refs.insert(reference);
                    }
                    OP_PUSHINPUTREFSINGLETON => {
                        summary.push_ref_hashes.insert(sha256(&reference));
                        summary.push_refs.insert(reference);
                        summary.singleton_refs.insert(reference);
                    }
                    OP_REQUIREINPUTREF => {
                        summary.require_refs.insert(reference);
                    }
                    OP_DISALLOWPUSHINPUTREFSIBLING => {
                        summary.sibling_disallow_refs.insert(reference);
                    }
                    _ => {}
                }
            } else if opcode == OP_STATESEPARATOR && summary.state_separator_index.is_none() {
                summary.state_separator_index = Some(at as u32);
            }
        }

        summary
    }

    /// Serialize the reference data summary:
    /// value-LE8 ‖ sha256(script) ‖ VarInt(n_refs) ‖ sorted refs.
    fn data_summary(&self, script: &Script) -> Vec<u8> {
        let mut writer = ByteWriter::with_capacity(8 + 32 + 1 + self.push_refs.len() * REF_SIZE);
        writer.write_i64_le(self.value);
        writer.write_bytes(&sha256(script.to_bytes()));
        writer.write_varint(VarInt::from(self.push_refs.len()));
        for reference in &self.push_refs {
            writer.write_bytes(reference);
        }
        writer.into_bytes()
    }
}

/// Aggregated per-key statistics across a set of scripts.
#[derive(Debug, Clone, Copy, Default)]
struct RefStats {
    value_sum: i64,
    count: u32,
    zero_valued: u32,
}

/// Read-only aggregate derived from (tx, spent coins, input index).
#[derive(Debug)]
pub struct ExecutionContext {
    tx: Arc<Transaction>,
    coins: Vec<Coin>,
    input_index: usize,

    input_summaries: Vec<PushRefSummary>,
    output_summaries: Vec<PushRefSummary>,
    input_push_refs: BTreeSet<RefId>,
    output_push_refs: BTreeSet<RefId>,

    utxo_ref_stats: BTreeMap<RefId, RefStats>,
    output_ref_stats: BTreeMap<RefId, RefStats>,
    utxo_ref_hash_value: BTreeMap<[u8; 32], i64>,
    output_ref_hash_value: BTreeMap<[u8; 32], i64>,
    utxo_csh_stats: BTreeMap<[u8; 32], RefStats>,
    output_csh_stats: BTreeMap<[u8; 32], RefStats>,
}

impl ExecutionContext {
    /// Build a context. `coins[i]` must be the UTXO spent by
    /// `tx.inputs[i]`, and `input_index` must name an existing input.
    pub fn new(
        tx: Arc<Transaction>,
        coins: Vec<Coin>,
        input_index: usize,
    ) -> Result<Self, ExecError> {
        if coins.len() != tx.inputs.len() {
            return Err(ExecError::new(
                ExecErrorCode::ContextNotPresent,
                format!(
                    "{} coins supplied for {} inputs",
                    coins.len(),
                    tx.inputs.len()
                ),
            ));
        }
        if input_index >= tx.inputs.len() {
            return Err(ExecError::new(
                ExecErrorCode::InvalidTxInputIndex,
                format!(
                    "input index {} out of range (tx has {} inputs)",
                    input_index,
                    tx.inputs.len()
                ),
            ));
        }

        let input_summaries: Vec<PushRefSummary> = coins
            .iter()
            .map(|coin| PushRefSummary::scan(&coin.script_pubkey, coin.value))
            .collect();
        let output_summaries: Vec<PushRefSummary> = tx
            .outputs
            .iter()
            .map(|output| PushRefSummary::scan(&output.script_pubkey, output.value))
            .collect();

        let mut context = ExecutionContext {
            tx,
            coins,
            input_index,
            input_summaries,
            output_summaries,
            input_push_refs: BTreeSet::new(),
            output_push_refs: BTreeSet::new(),
            utxo_ref_stats: BTreeMap::new(),
            output_ref_stats: BTreeMap::new(),
            utxo_ref_hash_value: BTreeMap::new(),
            output_ref_hash_value: BTreeMap::new(),
            utxo_csh_stats: BTreeMap::new(),
            output_csh_stats: BTreeMap::new(),
        };
        context.aggregate();
        Ok(context)
    }

    fn aggregate(&mut self) {
        for summary in &self.input_summaries {
            self.input_push_refs.extend(summary.push_refs.iter().copied());
            for reference in &summary.push_refs {
                let stats = self.utxo_ref_stats.entry(*reference).or_default();
                stats.value_sum += summary.value;
                stats.count += 1;
                if summary.value == 0 {
                    stats.zero_valued += 1;
                }
            }
            for hash in &summary.push_ref_hashes {
                *self.utxo_ref_hash_value.entry(*hash).or_default() += summary.value;
            }
            let csh = self.utxo_csh_stats.entry(summary.code_script_hash).or_default();
            csh.value_sum += summary.value;
            csh.count += 1;
            if summary.value == 0 {
                csh.zero_valued += 1;
            }
        }

        for summary in &self.output_summaries {
            self.output_push_refs.extend(summary.push_refs.iter().copied());
            for reference in &summary.push_refs {
                let stats = self.output_ref_stats.entry(*reference).or_default();
                stats.value_sum += summary.value;
                stats.count += 1;
                if summary.value == 0 {
                    stats.zero_valued += 1;
                }
            }
            for hash in &summary.push_ref_hashes {
                *self.output_ref_hash_value.entry(*hash).or_default() += summary.value;
            }
            let csh = self
                .output_csh_stats
                .entry(summary.code_script_hash)
                .or_default();
            csh.value_sum += summary.value;
            csh.count += 1;
            if summary.value == 0 {
                csh.zero_valued += 1;
            }
        }
    }

    // -----------------------------------------------------------------
    // Transaction accessors
    // -----------------------------------------------------------------

    /// The transaction being validated.
    pub fn tx(&self) -> &Transaction {
        &self.tx
    }

    /// Index of the input being validated.
    pub fn input_index(&self) -> usize {
        self.input_index
    }

    /// Number of transaction inputs.
    pub fn input_count(&self) -> usize {
        self.tx.inputs.len()
    }

    /// Number of transaction outputs.
    pub fn output_count(&self) -> usize {
        self.tx.outputs.len()
    }

    /// Transaction version.
    pub fn tx_version(&self) -> i32 {
        self.tx.version
    }

    /// Transaction lock time.
    pub fn lock_time(&self) -> u32 {
        self.tx.lock_time
    }

    /// Check an input index against the spent-coin list.
    pub fn is_valid_input_index(&self, index: i64) -> bool {
        index >= 0 && (index as usize) < self.coins.len()
    }

    /// Check an output index.
    pub fn is_valid_output_index(&self, index: i64) -> bool {
        index >= 0 && (index as usize) < self.tx.outputs.len()
    }

    // -----------------------------------------------------------------
    // Input / output accessors (lazy: sentinel values on misuse, the
    // dispatcher validates indices strictly first)
    // -----------------------------------------------------------------

    /// Value of the coin spent by input `index` (0 when out of range).
    pub fn utxo_value(&self, index: usize) -> i64 {
        self.coins.get(index).map(|c| c.value).unwrap_or(0)
    }

    /// Locking script of the coin spent by input `index`.
    pub fn utxo_bytecode(&self, index: usize) -> Script {
        self.coins
            .get(index)
            .map(|c| c.script_pubkey.clone())
            .unwrap_or_default()
    }

    /// Txid of the outpoint spent by input `index` (internal order).
    pub fn outpoint_tx_hash(&self, index: usize) -> [u8; 32] {
        self.tx
            .inputs
            .get(index)
            .map(|i| i.prevout.txid)
            .unwrap_or([0u8; 32])
    }

    /// Vout of the outpoint spent by input `index`.
    pub fn outpoint_index(&self, index: usize) -> u32 {
        self.tx
            .inputs
            .get(index)
            .map(|i| i.prevout.vout)
            .unwrap_or(0)
    }

    /// Unlocking script of input `index`.
    pub fn input_bytecode(&self, index: usize) -> Script {
        self.tx
            .inputs
            .get(index)
            .map(|i| i.script_sig.clone())
            .unwrap_or_default()
    }

    /// Sequence number of input `index`.
    pub fn input_sequence(&self, index: usize) -> u32 {
        self.tx
            .inputs
            .get(index)
            .map(|i| i.sequence)
            .unwrap_or(0)
    }

    /// Value of output `index` (0 when out of range).
    pub fn output_value(&self, index: usize) -> i64 {
        self.tx.outputs.get(index).map(|o| o.value).unwrap_or(0)
    }

    /// Locking script of output `index`.
    pub fn output_bytecode(&self, index: usize) -> Script {
        self.tx
            .outputs
            .get(index)
            .map(|o| o.script_pubkey.clone())
            .unwrap_or_default()
    }

    // -----------------------------------------------------------------
    // State separator accessors
    // -----------------------------------------------------------------

    /// Byte offset of the state separator in the coin spent by input
    /// `index`, or 0 when absent (the whole script is code script).
    pub fn state_separator_index_utxo(&self, index: usize) -> u32 {
        self.input_summaries
            .get(index)
            .and_then(|s| s.state_separator_index)
            .unwrap_or(0)
    }

    /// Byte offset of the state separator in output `index`, or 0.
    pub fn state_separator_index_output(&self, index: usize) -> u32 {
        self.output_summaries
            .get(index)
            .and_then(|s| s.state_separator_index)
            .unwrap_or(0)
    }

    /// Code script (bytes after the separator) of the coin spent by
    /// input `index`.
    pub fn code_script_utxo(&self, index: usize) -> Script {
        self.coins
            .get(index)
            .map(|c| c.script_pubkey.code_script())
            .unwrap_or_default()
    }

    /// State script (bytes before the separator) of the coin spent by
    /// input `index`.
    pub fn state_script_utxo(&self, index: usize) -> Script {
        self.coins
            .get(index)
            .map(|c| c.script_pubkey.state_script())
            .unwrap_or_default()
    }

    /// Code script of output `index`.
    pub fn code_script_output(&self, index: usize) -> Script {
        self.tx
            .outputs
            .get(index)
            .map(|o| o.script_pubkey.code_script())
            .unwrap_or_default()
    }

    /// State script of output `index`.
    pub fn state_script_output(&self, index: usize) -> Script {
        self.tx
            .outputs
            .get(index)
            .map(|o| o.script_pubkey.state_script())
            .unwrap_or_default()
    }

    // -----------------------------------------------------------------
    // Reference summaries and aggregate queries
    // -----------------------------------------------------------------

    /// Per-coin reference summary.
    pub fn input_summary(&self, index: usize) -> Option<&PushRefSummary> {
        self.input_summaries.get(index)
    }

    /// Per-output reference summary.
    pub fn output_summary(&self, index: usize) -> Option<&PushRefSummary> {
        self.output_summaries.get(index)
    }

    /// Union of all push refs across spent coins.
    pub fn input_push_refs(&self) -> &BTreeSet<RefId> {
        &self.input_push_refs
    }

    /// Union of all push refs across outputs.
    pub fn output_push_refs(&self) -> &BTreeSet<RefId> {
        &self.output_push_refs
    }

    /// Σ value[i] over spent coins whose push set contains `reference`.
    pub fn ref_value_sum_utxos(&self, reference: &RefId) -> i64 {
        self.utxo_ref_stats
            .get(reference)
            .map(|s| s.value_sum)
            .unwrap_or(0)
    }

    /// Σ value over outputs whose push set contains `reference`.
    pub fn ref_value_sum_outputs(&self, reference: &RefId) -> i64 {
        self.output_ref_stats
            .get(reference)
            .map(|s| s.value_sum)
            .unwrap_or(0)
    }

    /// Count of spent coins whose push set contains `reference`.
    pub fn ref_count_utxos(&self, reference: &RefId) -> u32 {
        self.utxo_ref_stats
            .get(reference)
            .map(|s| s.count)
            .unwrap_or(0)
    }

    /// Count of outputs whose push set contains `reference`.
    pub fn ref_count_outputs(&self, reference: &RefId) -> u32 {
        self.output_ref_stats
            .get(reference)
            .map(|s| s.count)
            .unwrap_or(0)
    }

    /// Count of zero-valued spent coins whose push set contains
    /// `reference`.
    pub fn ref_zero_valued_count_utxos(&self, reference: &RefId) -> u32 {
        self.utxo_ref_stats
            .get(reference)
            .map(|s| s.zero_valued)
            .unwrap_or(0)
    }

    /// Count of zero-valued outputs whose push set contains `reference`.
    pub fn ref_zero_valued_count_outputs(&self, reference: &RefId) -> u32 {
        self.output_ref_stats
            .get(reference)
            .map(|s| s.zero_valued)
            .unwrap_or(0)
    }

    /// Σ value over spent coins containing a ref whose SHA-256 equals
    /// `ref_hash`.
    pub fn ref_hash_value_sum_utxos(&self, ref_hash: &[u8; 32]) -> i64 {
        self.utxo_ref_hash_value.get(ref_hash).copied().unwrap_or(0)
    }

    /// Σ value over outputs containing a ref whose SHA-256 equals
    /// `ref_hash`.
    pub fn ref_hash_value_sum_outputs(&self, ref_hash: &[u8; 32]) -> i64 {
        self.output_ref_hash_value
            .get(ref_hash)
            .copied()
            .unwrap_or(0)
    }

    /// Classification of `reference` across spent coins:
    /// 0 absent, 1 push ref, 2 singleton.
    pub fn ref_type_utxo(&self, reference: &RefId) -> i64 {
        Self::ref_type(&self.input_summaries, reference)
    }

    /// Classification of `reference` across outputs.
    pub fn ref_type_output(&self, reference: &RefId) -> i64 {
        Self::ref_type(&self.output_summaries, reference)
    }

    fn ref_type(summaries: &[PushRefSummary], reference: &RefId) -> i64 {
        let mut found = 0;
        for summary in summaries {
            if summary.singleton_refs.contains(reference) {
                return 2;
            }
            if summary.push_refs.contains(reference) {
                found = 1;
            }
        }
        found
    }

    /// Σ value over spent coins whose code-script hash equals `hash`.
    pub fn code_script_hash_value_sum_utxos(&self, hash: &[u8; 32]) -> i64 {
        self.utxo_csh_stats.get(hash).map(|s| s.value_sum).unwrap_or(0)
    }

    /// Σ value over outputs whose code-script hash equals `hash`.
    pub fn code_script_hash_value_sum_outputs(&self, hash: &[u8; 32]) -> i64 {
        self.output_csh_stats
            .get(hash)
            .map(|s| s.value_sum)
            .unwrap_or(0)
    }

    /// Count of spent coins whose code-script hash equals `hash`.
    pub fn code_script_hash_count_utxos(&self, hash: &[u8; 32]) -> u32 {
        self.utxo_csh_stats.get(hash).map(|s| s.count).unwrap_or(0)
    }

    /// Count of outputs whose code-script hash equals `hash`.
    pub fn code_script_hash_count_outputs(&self, hash: &[u8; 32]) -> u32 {
        self.output_csh_stats.get(hash).map(|s| s.count).unwrap_or(0)
    }

    /// Count of zero-valued spent coins whose code-script hash equals
    /// `hash`.
    pub fn code_script_hash_zero_valued_count_utxos(&self, hash: &[u8; 32]) -> u32 {
        self.utxo_csh_stats
            .get(hash)
            .map(|s| s.zero_valued)
            .unwrap_or(0)
    }

    /// Count of zero-valued outputs whose code-script hash equals
    /// `hash`.
    pub fn code_script_hash_zero_valued_count_outputs(&self, hash: &[u8; 32]) -> u32 {
        self.output_csh_stats
            .get(hash)
            .map(|s| s.zero_valued)
            .unwrap_or(0)
    }

    /// Reference data summary of the coin spent by input `index`:
    /// value-LE8 ‖ sha256(script) ‖ VarInt(n_refs) ‖ sorted refs.
    pub fn ref_data_summary_utxo(&self, index: usize) -> Vec<u8> {
        match (self.input_summaries.get(index), self.coins.get(index)) {
            (Some(summary), Some(coin)) => summary.data_summary(&coin.script_pubkey),
            _ => Vec::new(),
        }
    }

    /// Reference data summary of output `index`.
    pub fn ref_data_summary_output(&self, index: usize) -> Vec<u8> {
        match (self.output_summaries.get(index), self.tx.outputs.get(index)) {
            (Some(summary), Some(output)) => summary.data_summary(&output.script_pubkey),
            _ => Vec::new(),
        }
    }

    /// Double SHA-256 of the reference data summary of the coin spent
    /// by input `index`.
    pub fn ref_hash_data_summary_utxo(&self, index: usize) -> [u8; 32] {
        sha256d(&self.ref_data_summary_utxo(index))
    }

    /// Double SHA-256 of the reference data summary of output `index`.
    pub fn ref_hash_data_summary_output(&self, index: usize) -> [u8; 32] {
        sha256d(&self.ref_data_summary_output(index))
    }

    /// True if `reference` appears in the push set of a spent coin
    /// other than `input_index` (the sibling-disallow test).
    pub fn ref_in_other_input(&self, reference: &RefId, input_index: usize) -> bool {
        self.input_summaries
            .iter()
            .enumerate()
            .any(|(i, summary)| i != input_index && summary.push_refs.contains(reference))
    }
}
