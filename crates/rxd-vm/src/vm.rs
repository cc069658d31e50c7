//! The stepwise virtual machine.
//!
//! Owns the current execution snapshot exclusively; every step pushes
//! the prior snapshot onto a history vector so execution can be
//! rewound. Opcode failures are state transitions (`done`, `success`,
//! `error`), never unwinding: a failed step leaves the machine
//! inspectable and the pre-failure state one `rewind` away.

use std::collections::BTreeSet;
use std::sync::Arc;

use rxd_script::opcodes::*;
use rxd_script::script::MAX_SCRIPT_SIZE;
use rxd_script::{scriptnum, Script};

use crate::artifact::{Artifact, SourceMapEntry};
use crate::checker::SignatureChecker;
use crate::config::{MAX_OPS_PER_SCRIPT, MAX_SCRIPT_ELEMENT_SIZE, MAX_STACK_SIZE};
use crate::context::{ExecutionContext, RefId};
use crate::error::{ExecError, ExecErrorCode};
use crate::flags::VerifyFlags;
use crate::stack::{self, as_bool, from_bool};

/// Which script the machine is currently executing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// The input's unlocking script.
    Unlock,
    /// The output's locking script, run on the unlock result stack.
    Lock,
    /// The redeem script popped from the stack for a P2SH lock.
    Redeem,
}

/// One execution snapshot: everything needed to display the machine
/// and to resume or rewind it.
#[derive(Debug, Clone)]
pub struct VmState {
    /// The main data stack, bottom first.
    pub stack: Vec<Vec<u8>>,
    /// The alternate stack.
    pub altstack: Vec<Vec<u8>>,
    /// The script being executed in the current phase.
    pub script: Script,
    /// Byte offset of the next opcode.
    pub pc: usize,
    /// Index of the next opcode within the current script.
    pub opcode_index: usize,
    /// Non-push opcodes executed so far, across all phases.
    pub op_count: u64,
    /// Conditional execution frames (IF/NOTIF push, ELSE toggles,
    /// ENDIF pops).
    pub cond_stack: Vec<bool>,
    /// Current phase.
    pub phase: Phase,
    /// Execution has halted.
    pub done: bool,
    /// Execution halted successfully with a truthy top element.
    pub success: bool,
    /// The failure discriminant, when execution halted on an error.
    pub error: Option<ExecErrorCode>,
    /// Byte offset just past the most recent OP_CODESEPARATOR.
    pub last_code_separator: usize,
    /// References pushed by OP_PUSHINPUTREF.
    pub push_refs: BTreeSet<RefId>,
    /// References consumed by OP_REQUIREINPUTREF (validated after
    /// execution).
    pub require_refs: BTreeSet<RefId>,
    /// References declared by OP_PUSHINPUTREFSINGLETON.
    pub singleton_refs: BTreeSet<RefId>,
    /// References declared by OP_DISALLOWPUSHINPUTREF.
    pub disallow_refs: BTreeSet<RefId>,
    /// References declared by OP_DISALLOWPUSHINPUTREFSIBLING.
    pub disallow_sibling_refs: BTreeSet<RefId>,
    /// The unlock-phase result stack, held for the P2SH redeem phase.
    pub(crate) saved_unlock_stack: Vec<Vec<u8>>,
}

impl VmState {
    fn initial(script: Script, phase: Phase) -> Self {
        VmState {
            stack: Vec::new(),
            altstack: Vec::new(),
            script,
            pc: 0,
            opcode_index: 0,
            op_count: 0,
            cond_stack: Vec::new(),
            phase,
            done: false,
            success: false,
            error: None,
            last_code_separator: 0,
            push_refs: BTreeSet::new(),
            require_refs: BTreeSet::new(),
            singleton_refs: BTreeSet::new(),
            disallow_refs: BTreeSet::new(),
            disallow_sibling_refs: BTreeSet::new(),
            saved_unlock_stack: Vec::new(),
        }
    }
}

/// Observer payload for one executed opcode.
pub struct StepEvent<'a> {
    /// The opcode byte.
    pub opcode: u8,
    /// Push data or embedded operand, empty otherwise.
    pub operand: &'a [u8],
    /// The machine state before the opcode ran.
    pub before: &'a VmState,
    /// The machine state after the opcode ran.
    pub after: &'a VmState,
}

type StepObserver<'a> = Box<dyn FnMut(&StepEvent<'_>) + 'a>;

/// The stepwise script machine.
pub struct Vm<'a> {
    state: VmState,
    initial: VmState,
    history: Vec<VmState>,
    history_limit: Option<usize>,
    lock_script: Script,
    p2sh: bool,
    pub(crate) flags: VerifyFlags,
    pub(crate) checker: &'a dyn SignatureChecker,
    pub(crate) context: Option<Arc<ExecutionContext>>,
    last_error: Option<ExecError>,
    observer: Option<StepObserver<'a>>,
    artifact: Option<Artifact>,
}

impl<'a> std::fmt::Debug for Vm<'a> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Vm")
            .field("state", &self.state)
            .field("initial", &self.initial)
            .field("history", &self.history)
            .field("history_limit", &self.history_limit)
            .field("lock_script", &self.lock_script)
            .field("p2sh", &self.p2sh)
            .field("flags", &self.flags)
            .field("last_error", &self.last_error)
            .field("artifact", &self.artifact)
            .finish()
    }
}

impl<'a> Vm<'a> {
    /// Create a machine over an unlocking and locking script pair.
    ///
    /// Validates script sizes, the at-most-one state separator rule,
    /// and the push-only requirements implied by `SIGPUSHONLY` and a
    /// P2SH lock script. An empty unlocking script starts the machine
    /// directly in the Lock phase.
    pub fn new(
        unlock_script: &Script,
        lock_script: &Script,
        flags: VerifyFlags,
        checker: &'a dyn SignatureChecker,
        context: Option<Arc<ExecutionContext>>,
    ) -> Result<Self, ExecError> {
        for (script, which) in [(unlock_script, "unlocking"), (lock_script, "locking")] {
            if script.len() > MAX_SCRIPT_SIZE {
                return Err(ExecError::new(
                    ExecErrorCode::ScriptSize,
                    format!("{} script is {} bytes", which, script.len()),
                ));
            }
            if script.state_separator_count() > 1 {
                return Err(ExecError::new(
                    ExecErrorCode::InvalidStateSeparator,
                    format!("{} script has more than one state separator", which),
                ));
            }
        }

        if flags.contains(VerifyFlags::SIGPUSHONLY) && !unlock_script.is_push_only() {
            return Err(ExecError::new(
                ExecErrorCode::SigPushOnly,
                "unlocking script is not push only",
            ));
        }

        let p2sh = flags.contains(VerifyFlags::P2SH) && lock_script.is_p2sh();
        if p2sh && !unlock_script.is_push_only() {
            return Err(ExecError::new(
                ExecErrorCode::SigPushOnly,
                "pay-to-script-hash unlocking script is not push only",
            ));
        }

        let initial = if unlock_script.is_empty() {
            VmState::initial(lock_script.clone(), Phase::Lock)
        } else {
            VmState::initial(unlock_script.clone(), Phase::Unlock)
        };

        Ok(Vm {
            state: initial.clone(),
            initial,
            history: Vec::new(),
            history_limit: None,
            lock_script: lock_script.clone(),
            p2sh,
            flags,
            checker,
            context,
            last_error: None,
            observer: None,
            artifact: None,
        })
    }

    /// Cap the history depth; the oldest snapshots are dropped once
    /// the cap is reached. The default is unbounded.
    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = Some(limit);
        self
    }

    /// Install an observer fired after every executed opcode, before
    /// the next step begins.
    pub fn set_step_observer(&mut self, observer: impl FnMut(&StepEvent<'_>) + 'a) {
        self.observer = Some(Box::new(observer));
    }

    /// Attach a compiled-contract artifact for source-level mapping.
    pub fn load_artifact(&mut self, artifact: Artifact) {
        self.artifact = Some(artifact);
    }

    /// Map the current opcode index to a source range, when an
    /// artifact with a source map is loaded.
    pub fn current_source_location(&self) -> Option<&SourceMapEntry> {
        self.artifact
            .as_ref()
            .and_then(|a| a.source_location(self.state.opcode_index))
    }

    // -----------------------------------------------------------------
    // Inspection
    // -----------------------------------------------------------------

    /// The current snapshot.
    pub fn state(&self) -> &VmState {
        &self.state
    }

    /// Whether execution has halted.
    pub fn is_done(&self) -> bool {
        self.state.done
    }

    /// Whether the machine is at its initial state with no history.
    pub fn is_at_start(&self) -> bool {
        self.history.is_empty()
    }

    /// The failure discriminant, if execution halted on an error.
    pub fn error(&self) -> Option<ExecErrorCode> {
        self.state.error
    }

    /// The most recent failure with its full description.
    pub fn last_error(&self) -> Option<&ExecError> {
        self.last_error.as_ref()
    }

    /// Number of snapshots available to rewind through.
    pub fn history_depth(&self) -> usize {
        self.history.len()
    }

    // -----------------------------------------------------------------
    // Execution control
    // -----------------------------------------------------------------

    /// Execute until halted; returns whether the run succeeded.
    pub fn run(&mut self) -> bool {
        while self.step() {}
        self.state.success
    }

    /// Execute one opcode (or one phase transition) and return whether
    /// execution can continue. The pre-step snapshot is pushed onto the
    /// history first, so a failed step can be rewound.
    pub fn step(&mut self) -> bool {
        if self.state.done {
            return false;
        }
        self.push_history();

        if self.state.pc >= self.state.script.len() {
            return self.advance_phase();
        }

        let mut pc = self.state.pc;
        let (opcode, operand) = match self.state.script.get_op(&mut pc) {
            Ok(decoded) => decoded,
            Err(_) => {
                self.fail(ExecErrorCode::BadOpcode, "truncated opcode payload");
                return false;
            }
        };

        if let Err(e) = self.execute_opcode(opcode, &operand, pc) {
            self.fail(e.code, e.description);
            return false;
        }

        self.state.pc = pc;
        self.state.opcode_index += 1;

        if self.state.stack.len() + self.state.altstack.len() > MAX_STACK_SIZE {
            self.fail(
                ExecErrorCode::StackSize,
                format!(
                    "combined stack size {} exceeds the limit",
                    self.state.stack.len() + self.state.altstack.len()
                ),
            );
            return false;
        }

        self.notify_observer(opcode, &operand);
        !self.state.done
    }

    /// Restore the previous snapshot. Returns false when the machine
    /// is at its initial state.
    pub fn rewind(&mut self) -> bool {
        match self.history.pop() {
            Some(previous) => {
                self.state = previous;
                self.last_error = None;
                true
            }
            None => false,
        }
    }

    /// Restore the initial state and clear the history.
    pub fn reset(&mut self) {
        self.state = self.initial.clone();
        self.history.clear();
        self.last_error = None;
    }

    // -----------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------

    fn push_history(&mut self) {
        if let Some(limit) = self.history_limit {
            if self.history.len() >= limit && limit > 0 {
                self.history.remove(0);
            }
            if limit == 0 {
                return;
            }
        }
        self.history.push(self.state.clone());
    }

    fn fail(&mut self, code: ExecErrorCode, description: impl Into<String>) {
        self.state.done = true;
        self.state.success = false;
        self.state.error = Some(code);
        self.last_error = Some(ExecError::new(code, description));
    }

    fn finish(&mut self) -> bool {
        self.state.done = true;
        let top_true = self.state.stack.last().map(|t| as_bool(t)).unwrap_or(false);
        if top_true {
            self.state.success = true;
        } else {
            self.state.success = false;
            self.state.error = Some(ExecErrorCode::EvalFalse);
            self.last_error = Some(ExecError::from_code(ExecErrorCode::EvalFalse));
        }
        false
    }

    /// Handle the end of the current phase script: Unlock feeds Lock,
    /// a P2SH Lock feeds Redeem, everything else finishes the run.
    fn advance_phase(&mut self) -> bool {
        if !self.state.cond_stack.is_empty() {
            self.fail(
                ExecErrorCode::UnbalancedConditional,
                "end of script reached inside a conditional",
            );
            return false;
        }

        match self.state.phase {
            Phase::Unlock => {
                if self.p2sh {
                    self.state.saved_unlock_stack = self.state.stack.clone();
                }
                self.state.altstack.clear();
                self.state.script = self.lock_script.clone();
                self.state.pc = 0;
                self.state.opcode_index = 0;
                self.state.last_code_separator = 0;
                self.state.phase = Phase::Lock;
                true
            }
            Phase::Lock if self.p2sh => {
                let lock_result = self.state.stack.last().map(|t| as_bool(t)).unwrap_or(false);
                if !lock_result {
                    return self.finish();
                }

                let mut saved = std::mem::take(&mut self.state.saved_unlock_stack);
                let redeem_bytes = match saved.pop() {
                    Some(bytes) => bytes,
                    None => {
                        self.fail(
                            ExecErrorCode::InvalidStackOperation,
                            "no redeem script on the unlock stack",
                        );
                        return false;
                    }
                };
                let redeem = Script::from_bytes(&redeem_bytes);
                if redeem.state_separator_count() > 1 {
                    self.fail(
                        ExecErrorCode::InvalidStateSeparator,
                        "redeem script has more than one state separator",
                    );
                    return false;
                }

                self.state.stack = saved;
                self.state.altstack.clear();
                self.state.script = redeem;
                self.state.pc = 0;
                self.state.opcode_index = 0;
                self.state.last_code_separator = 0;
                self.state.phase = Phase::Redeem;
                true
            }
            _ => self.finish(),
        }
    }

    fn notify_observer(&mut self, opcode: u8, operand: &[u8]) {
        let Vm {
            observer,
            history,
            state,
            ..
        } = self;
        if let (Some(observer), Some(before)) = (observer.as_mut(), history.last()) {
            observer(&StepEvent {
                opcode,
                operand,
                before,
                after: state,
            });
        }
    }

    /// Which capability flag an opcode requires, if any.
    fn required_flag(opcode: u8) -> Option<VerifyFlags> {
        match opcode {
            OP_2MUL | OP_2DIV | OP_LSHIFT | OP_RSHIFT => Some(VerifyFlags::EXTENDED_INTEGERS),
            OP_PUSH_TX_STATE => Some(VerifyFlags::PUSH_TX_STATE),
            op if is_introspection_opcode(op) || is_state_separator_query(op) => {
                Some(VerifyFlags::NATIVE_INTROSPECTION)
            }
            op if is_reference_opcode(op) => Some(VerifyFlags::ENHANCED_REFERENCES),
            _ => None,
        }
    }

    fn execute_opcode(
        &mut self,
        opcode: u8,
        operand: &[u8],
        new_pc: usize,
    ) -> Result<(), ExecError> {
        if operand.len() > MAX_SCRIPT_ELEMENT_SIZE {
            return Err(ExecError::new(
                ExecErrorCode::PushSize,
                format!("element of {} bytes exceeds the limit", operand.len()),
            ));
        }

        // Always-illegal opcodes poison the script even when skipped.
        if matches!(opcode, OP_VERIF | OP_VERNOTIF) {
            return Err(ExecError::new(
                ExecErrorCode::BadOpcode,
                format!("attempt to execute {}", opcode_to_string(opcode)),
            ));
        }

        if opcode > OP_16 {
            self.state.op_count += 1;
            if self.state.op_count > MAX_OPS_PER_SCRIPT {
                return Err(ExecError::from_code(ExecErrorCode::OpCount));
            }
        }

        let executing = self.is_branch_executing();
        let conditional = matches!(opcode, OP_IF | OP_NOTIF | OP_ELSE | OP_ENDIF);
        if !executing && !conditional {
            return Ok(());
        }

        if let Some(flag) = Self::required_flag(opcode) {
            if !self.flags.contains(flag) {
                return Err(ExecError::new(
                    ExecErrorCode::DisabledOpcode,
                    format!("{} requires a capability flag", opcode_to_string(opcode)),
                ));
            }
        }

        if executing
            && opcode <= OP_PUSHDATA4
            && self.flags.contains(VerifyFlags::MINIMALDATA)
        {
            self.check_minimal_push(opcode, operand)?;
        }

        self.dispatch(opcode, operand, executing, new_pc)
    }

    fn dispatch(
        &mut self,
        opcode: u8,
        operand: &[u8],
        executing: bool,
        new_pc: usize,
    ) -> Result<(), ExecError> {
        match opcode {
            // Pushes
            OP_0 => {
                self.push(Vec::new());
                Ok(())
            }
            0x01..=0x4b | OP_PUSHDATA1 | OP_PUSHDATA2 | OP_PUSHDATA4 => {
                self.push(operand.to_vec());
                Ok(())
            }
            OP_1NEGATE => {
                self.push_num(-1);
                Ok(())
            }
            op if (OP_1..=OP_16).contains(&op) => {
                self.push(vec![op - OP_1 + 1]);
                Ok(())
            }

            // Flow control
            OP_NOP => Ok(()),
            OP_IF => self.op_if(executing, false),
            OP_NOTIF => self.op_if(executing, true),
            OP_ELSE => self.op_else(),
            OP_ENDIF => self.op_endif(),
            OP_VERIFY => self.verify_top(ExecErrorCode::Verify),
            OP_RETURN => Err(ExecError::from_code(ExecErrorCode::OpReturn)),
            OP_CHECKLOCKTIMEVERIFY => self.op_check_lock_time_verify(),
            OP_CHECKSEQUENCEVERIFY => self.op_check_sequence_verify(),
            OP_NOP1 | OP_NOP4 | OP_NOP5 | OP_NOP6 | OP_NOP7 | OP_NOP8 | OP_NOP9 | OP_NOP10 => {
                self.op_nop_reserved(opcode)
            }

            // Reserved
            OP_RESERVED | OP_VER | OP_RESERVED1 | OP_RESERVED2 => Err(ExecError::new(
                ExecErrorCode::BadOpcode,
                format!("attempt to execute reserved opcode {}", opcode_to_string(opcode)),
            )),

            // Stack
            OP_TOALTSTACK => self.op_to_alt_stack(),
            OP_FROMALTSTACK => self.op_from_alt_stack(),
            OP_2DROP => self.op_drop_n(2),
            OP_2DUP => self.op_dup_n(2),
            OP_3DUP => self.op_dup_n(3),
            OP_2OVER => self.op_over_n(2),
            OP_2ROT => self.op_rot_n(2),
            OP_2SWAP => self.op_swap_n(2),
            OP_IFDUP => self.op_ifdup(),
            OP_DEPTH => self.op_depth(),
            OP_DROP => self.op_drop_n(1),
            OP_DUP => self.op_dup_n(1),
            OP_NIP => self.op_nip(),
            OP_OVER => self.op_over_n(1),
            OP_PICK => self.op_pick(),
            OP_ROLL => self.op_roll(),
            OP_ROT => self.op_rot_n(1),
            OP_SWAP => self.op_swap_n(1),
            OP_TUCK => self.op_tuck(),

            // Splice
            OP_CAT => self.op_cat(),
            OP_SPLIT => self.op_split(),
            OP_NUM2BIN => self.op_num2bin(),
            OP_BIN2NUM => self.op_bin2num(),
            OP_SIZE => self.op_size(),
            OP_REVERSEBYTES => self.op_reverse_bytes(),

            // Bitwise
            OP_INVERT => self.op_invert(),
            OP_AND => self.op_bitwise(|a, b| a & b),
            OP_OR => self.op_bitwise(|a, b| a | b),
            OP_XOR => self.op_bitwise(|a, b| a ^ b),
            OP_EQUAL => self.op_equal(),
            OP_EQUALVERIFY => {
                self.op_equal()?;
                self.verify_top(ExecErrorCode::EqualVerify)
            }

            // Arithmetic
            OP_1ADD => self.op_unary_num(|n| n.checked_add(1)),
            OP_1SUB => self.op_unary_num(|n| n.checked_sub(1)),
            OP_2MUL => self.op_unary_num(|n| n.checked_mul(2)),
            OP_2DIV => self.op_unary_num(|n| Some(n / 2)),
            OP_NEGATE => self.op_unary_num(|n| n.checked_neg()),
            OP_ABS => self.op_unary_num(|n| n.checked_abs()),
            OP_NOT => self.op_not(),
            OP_0NOTEQUAL => self.op_0notequal(),
            OP_ADD => self.op_binary_num(|a, b| a.checked_add(b)),
            OP_SUB => self.op_binary_num(|a, b| a.checked_sub(b)),
            OP_MUL => self.op_binary_num(|a, b| a.checked_mul(b)),
            OP_DIV => self.op_div(),
            OP_MOD => self.op_mod(),
            OP_LSHIFT => self.op_lshift(),
            OP_RSHIFT => self.op_rshift(),
            OP_BOOLAND => self.op_bool_binop(|a, b| a != 0 && b != 0),
            OP_BOOLOR => self.op_bool_binop(|a, b| a != 0 || b != 0),
            OP_NUMEQUAL => self.op_bool_binop(|a, b| a == b),
            OP_NUMEQUALVERIFY => {
                self.op_bool_binop(|a, b| a == b)?;
                self.verify_top(ExecErrorCode::NumEqualVerify)
            }
            OP_NUMNOTEQUAL => self.op_bool_binop(|a, b| a != b),
            OP_LESSTHAN => self.op_bool_binop(|a, b| a < b),
            OP_GREATERTHAN => self.op_bool_binop(|a, b| a > b),
            OP_LESSTHANOREQUAL => self.op_bool_binop(|a, b| a <= b),
            OP_GREATERTHANOREQUAL => self.op_bool_binop(|a, b| a >= b),
            OP_MIN => self.op_binary_num(|a, b| Some(a.min(b))),
            OP_MAX => self.op_binary_num(|a, b| Some(a.max(b))),
            OP_WITHIN => self.op_within(),

            // Crypto
            OP_RIPEMD160 | OP_SHA1 | OP_SHA256 | OP_HASH160 | OP_HASH256 | OP_SHA512_256
            | OP_HASH512_256 | OP_BLAKE3 | OP_K12 => self.op_hash(opcode),
            OP_CODESEPARATOR => {
                self.state.last_code_separator = new_pc;
                Ok(())
            }
            OP_CHECKSIG => self.op_checksig(),
            OP_CHECKSIGVERIFY => {
                self.op_checksig()?;
                self.verify_top(ExecErrorCode::CheckSigVerify)
            }
            OP_CHECKMULTISIG => self.op_checkmultisig(),
            OP_CHECKMULTISIGVERIFY => {
                self.op_checkmultisig()?;
                self.verify_top(ExecErrorCode::CheckMultiSigVerify)
            }
            OP_CHECKDATASIG => self.op_checkdatasig(),
            OP_CHECKDATASIGVERIFY => {
                self.op_checkdatasig()?;
                self.verify_top(ExecErrorCode::CheckSigVerify)
            }

            // State separator: a no-op at execution time (multiplicity
            // is validated at construction)
            OP_STATESEPARATOR => Ok(()),

            // Introspection and references
            op if is_introspection_opcode(op)
                || is_state_separator_query(op)
                || is_reference_opcode(op)
                || op == OP_PUSH_TX_STATE =>
            {
                self.dispatch_introspection(op, operand)
            }

            _ => Err(ExecError::new(
                ExecErrorCode::BadOpcode,
                format!("invalid opcode 0x{:02x}", opcode),
            )),
        }
    }

    // -----------------------------------------------------------------
    // Stack and numeric helpers shared by the opcode files
    // -----------------------------------------------------------------

    pub(crate) fn is_branch_executing(&self) -> bool {
        self.state.cond_stack.iter().all(|&executing| executing)
    }

    pub(crate) fn state_mut(&mut self) -> &mut VmState {
        &mut self.state
    }

    pub(crate) fn push(&mut self, element: Vec<u8>) {
        self.state.stack.push(element);
    }

    pub(crate) fn popd(&mut self) -> Result<Vec<u8>, ExecError> {
        stack::pop(&mut self.state.stack, ExecErrorCode::InvalidStackOperation)
    }

    pub(crate) fn popa(&mut self) -> Result<Vec<u8>, ExecError> {
        stack::pop(
            &mut self.state.altstack,
            ExecErrorCode::InvalidAltstackOperation,
        )
    }

    pub(crate) fn peek(&self, depth: usize) -> Result<Vec<u8>, ExecError> {
        stack::peek(&self.state.stack, depth)
    }

    pub(crate) fn remove_at(&mut self, depth: usize) -> Result<Vec<u8>, ExecError> {
        stack::remove_at(&mut self.state.stack, depth)
    }

    pub(crate) fn max_num_length(&self) -> usize {
        crate::config::max_num_length(self.flags)
    }

    pub(crate) fn require_minimal(&self) -> bool {
        self.flags.contains(VerifyFlags::MINIMALDATA)
    }

    pub(crate) fn num_from_bytes(&self, bytes: &[u8], max_len: usize) -> Result<i64, ExecError> {
        scriptnum::deserialize(bytes, max_len, self.require_minimal()).map_err(|e| match e {
            scriptnum::ScriptNumError::Overflow { .. } => {
                ExecError::new(ExecErrorCode::InvalidNumberRange, e.to_string())
            }
            scriptnum::ScriptNumError::NotMinimal => {
                ExecError::new(ExecErrorCode::MinimalData, e.to_string())
            }
        })
    }

    pub(crate) fn pop_num(&mut self) -> Result<i64, ExecError> {
        let bytes = self.popd()?;
        self.num_from_bytes(&bytes, self.max_num_length())
    }

    pub(crate) fn push_num(&mut self, n: i64) {
        self.push(scriptnum::serialize(n));
    }

    pub(crate) fn push_bool(&mut self, value: bool) {
        self.push(from_bool(value));
    }

    pub(crate) fn pop_bool(&mut self) -> Result<bool, ExecError> {
        let bytes = self.popd()?;
        Ok(as_bool(&bytes))
    }

    pub(crate) fn verify_top(&mut self, code: ExecErrorCode) -> Result<(), ExecError> {
        if self.pop_bool()? {
            Ok(())
        } else {
            Err(ExecError::from_code(code))
        }
    }

    /// The sub-script from the most recent code separator to the end
    /// of the current phase script.
    pub(crate) fn sub_script(&self) -> Script {
        let bytes = self.state.script.to_bytes();
        Script::from_bytes(&bytes[self.state.last_code_separator.min(bytes.len())..])
    }

    fn check_minimal_push(&self, opcode: u8, data: &[u8]) -> Result<(), ExecError> {
        let minimal = match data.len() {
            0 => opcode == OP_0,
            1 if (1..=16).contains(&data[0]) => opcode == OP_1 + data[0] - 1,
            1 if data[0] == 0x81 => opcode == OP_1NEGATE,
            len if len <= 75 => opcode as usize == len,
            len if len <= 255 => opcode == OP_PUSHDATA1,
            len if len <= 65535 => opcode == OP_PUSHDATA2,
            _ => true,
        };
        if minimal {
            Ok(())
        } else {
            Err(ExecError::new(
                ExecErrorCode::MinimalData,
                format!(
                    "data push of {} bytes uses a non-minimal opcode {}",
                    data.len(),
                    opcode_to_string(opcode)
                ),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checker::AllowListSignatureChecker;

    fn run_lock_script(script: &[u8], flags: VerifyFlags) -> (bool, Option<ExecErrorCode>, Vec<Vec<u8>>) {
        let checker = AllowListSignatureChecker::new();
        let unlock = Script::new();
        let lock = Script::from_bytes(script);
        let mut vm = Vm::new(&unlock, &lock, flags, &checker, None).unwrap();
        let success = vm.run();
        (success, vm.error(), vm.state().stack.clone())
    }

    #[test]
    fn test_empty_scripts_fail_with_eval_false() {
        let (success, error, _) = run_lock_script(&[], VerifyFlags::NONE);
        assert!(!success);
        assert_eq!(error, Some(ExecErrorCode::EvalFalse));
    }

    #[test]
    fn test_simple_add() {
        let (success, _, stack) =
            run_lock_script(&[OP_1, OP_2, OP_ADD, OP_3, OP_NUMEQUAL], VerifyFlags::NONE);
        assert!(success);
        assert_eq!(stack, vec![vec![1]]);
    }

    #[test]
    fn test_step_and_rewind_invariant() {
        let checker = AllowListSignatureChecker::new();
        let unlock = Script::new();
        let lock = Script::from_bytes(&[OP_1, OP_2, OP_ADD]);
        let mut vm = Vm::new(&unlock, &lock, VerifyFlags::NONE, &checker, None).unwrap();

        assert!(vm.is_at_start());
        assert!(vm.step());
        assert!(vm.step());
        assert_eq!(vm.state().stack.len(), 2);

        assert!(vm.rewind());
        assert_eq!(vm.state().stack.len(), 1);
        assert!(vm.rewind());
        assert_eq!(vm.state().stack.len(), 0);
        assert!(vm.is_at_start());
        assert!(!vm.rewind());
    }

    #[test]
    fn test_rewind_after_failure_recovers_pre_fault_state() {
        let checker = AllowListSignatureChecker::new();
        let unlock = Script::new();
        let lock = Script::from_bytes(&[OP_5, OP_0, OP_DIV]);
        let mut vm = Vm::new(&unlock, &lock, VerifyFlags::NONE, &checker, None).unwrap();

        while vm.step() {}
        assert!(vm.is_done());
        assert_eq!(vm.error(), Some(ExecErrorCode::DivByZero));

        assert!(vm.rewind());
        assert!(!vm.is_done());
        assert_eq!(vm.state().error, None);
        assert_eq!(vm.state().stack.len(), 2);
    }

    #[test]
    fn test_reset() {
        let checker = AllowListSignatureChecker::new();
        let unlock = Script::new();
        let lock = Script::from_bytes(&[OP_1, OP_2]);
        let mut vm = Vm::new(&unlock, &lock, VerifyFlags::NONE, &checker, None).unwrap();
        vm.run();
        assert!(vm.is_done());
        vm.reset();
        assert!(!vm.is_done());
        assert!(vm.is_at_start());
        assert!(vm.state().stack.is_empty());
    }

    #[test]
    fn test_history_limit_drops_oldest() {
        let checker = AllowListSignatureChecker::new();
        let unlock = Script::new();
        let lock = Script::from_bytes(&[OP_1, OP_2, OP_3, OP_4]);
        let mut vm = Vm::new(&unlock, &lock, VerifyFlags::NONE, &checker, None)
            .unwrap()
            .with_history_limit(2);
        vm.step();
        vm.step();
        vm.step();
        assert_eq!(vm.history_depth(), 2);
        assert!(vm.rewind());
        assert!(vm.rewind());
        assert!(!vm.rewind());
        // the oldest snapshot is gone; we are two steps in, not at start
        assert_eq!(vm.state().stack.len(), 1);
    }

    #[test]
    fn test_observer_sees_each_step_in_order() {
        let checker = AllowListSignatureChecker::new();
        let unlock = Script::new();
        let lock = Script::from_bytes(&[OP_1, OP_2, OP_ADD]);
        let mut vm = Vm::new(&unlock, &lock, VerifyFlags::NONE, &checker, None).unwrap();

        let seen = std::rc::Rc::new(std::cell::RefCell::new(Vec::new()));
        let sink = seen.clone();
        vm.set_step_observer(move |event| {
            sink.borrow_mut()
                .push((event.opcode, event.before.stack.len(), event.after.stack.len()));
        });
        vm.run();
        drop(vm);

        assert_eq!(
            *seen.borrow(),
            vec![(OP_1, 0, 1), (OP_2, 1, 2), (OP_ADD, 2, 1)]
        );
    }

    #[test]
    fn test_unlock_to_lock_transition_clears_altstack() {
        let checker = AllowListSignatureChecker::new();
        let unlock = Script::from_bytes(&[OP_1, OP_5, OP_TOALTSTACK]);
        let lock = Script::from_bytes(&[OP_DEPTH, OP_1, OP_NUMEQUAL]);
        let mut vm = Vm::new(&unlock, &lock, VerifyFlags::NONE, &checker, None).unwrap();
        assert!(vm.run());
        assert!(vm.state().altstack.is_empty());
        assert_eq!(vm.state().phase, Phase::Lock);
    }

    #[test]
    fn test_minimal_push_enforcement() {
        // OP_PUSHDATA1 for a 1-byte value 5 is non-minimal
        let script = [OP_PUSHDATA1, 0x01, 0x05];
        let (success, error, _) = run_lock_script(&script, VerifyFlags::MINIMALDATA);
        assert!(!success);
        assert_eq!(error, Some(ExecErrorCode::MinimalData));

        let (success, _, _) = run_lock_script(&script, VerifyFlags::NONE);
        assert!(success);
    }

    #[test]
    fn test_verif_is_always_bad() {
        let script = [OP_0, OP_IF, OP_VERIF, OP_ENDIF, OP_1];
        let (success, error, _) = run_lock_script(&script, VerifyFlags::NONE);
        assert!(!success);
        assert_eq!(error, Some(ExecErrorCode::BadOpcode));
    }

    #[test]
    fn test_disabled_without_extended_integers() {
        let (success, error, _) = run_lock_script(&[OP_1, OP_2MUL], VerifyFlags::NONE);
        assert!(!success);
        assert_eq!(error, Some(ExecErrorCode::DisabledOpcode));

        let (success, _, stack) =
            run_lock_script(&[OP_1, OP_2MUL], VerifyFlags::EXTENDED_INTEGERS);
        assert!(success);
        assert_eq!(stack, vec![vec![2]]);
    }

    #[test]
    fn test_sigpushonly_rejected_at_construction() {
        let checker = AllowListSignatureChecker::new();
        let unlock = Script::from_bytes(&[OP_1, OP_1, OP_ADD]);
        let lock = Script::from_bytes(&[OP_1]);
        let err = Vm::new(
            &unlock,
            &lock,
            VerifyFlags::SIGPUSHONLY,
            &checker,
            None,
        )
        .unwrap_err();
        assert_eq!(err.code, ExecErrorCode::SigPushOnly);
    }

    #[test]
    fn test_duplicate_state_separator_rejected() {
        let checker = AllowListSignatureChecker::new();
        let unlock = Script::new();
        let lock = Script::from_bytes(&[OP_1, OP_STATESEPARATOR, OP_STATESEPARATOR]);
        let err = Vm::new(&unlock, &lock, VerifyFlags::NONE, &checker, None).unwrap_err();
        assert_eq!(err.code, ExecErrorCode::InvalidStateSeparator);
    }

    #[test]
    fn test_single_state_separator_is_noop() {
        let (success, _, stack) =
            run_lock_script(&[OP_1, OP_STATESEPARATOR, OP_2], VerifyFlags::NONE);
        assert!(success);
        assert_eq!(stack.len(), 2);
    }
}
