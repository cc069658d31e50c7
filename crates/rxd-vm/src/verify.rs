//! Verification entry points.
//!
//! Composes the unlocking and locking scripts through the stepwise VM
//! and enforces the post-execution conditions: a truthy top element,
//! the optional clean-stack rule, and the deferred reference
//! constraints against the execution context.

use std::sync::Arc;

use rxd_script::Script;
use rxd_transaction::Transaction;

use crate::checker::{SignatureChecker, TransactionSignatureChecker};
use crate::context::ExecutionContext;
use crate::error::{ExecError, ExecErrorCode};
use crate::flags::VerifyFlags;
use crate::vm::{Vm, VmState};

/// Verify one input: compose `unlock_script` with `lock_script` for
/// `tx.inputs[input_index]` spending `amount`, under `flags`.
///
/// `context` enables the introspection and reference opcodes and the
/// deferred reference validation; without it those opcodes fail with
/// `CONTEXT_NOT_PRESENT`.
pub fn verify(
    unlock_script: &Script,
    lock_script: &Script,
    tx: &Transaction,
    input_index: usize,
    amount: i64,
    flags: VerifyFlags,
    context: Option<Arc<ExecutionContext>>,
) -> Result<(), ExecError> {
    let checker = TransactionSignatureChecker::new(tx, input_index, amount);
    verify_script(unlock_script, lock_script, flags, &checker, context)
}

/// Verify a script pair with an explicit signature checker.
pub fn verify_script(
    unlock_script: &Script,
    lock_script: &Script,
    flags: VerifyFlags,
    checker: &dyn SignatureChecker,
    context: Option<Arc<ExecutionContext>>,
) -> Result<(), ExecError> {
    let mut vm = Vm::new(unlock_script, lock_script, flags, checker, context.clone())?;
    vm.run();
    finish_verification(&vm, flags, context.as_deref())
}

/// Run a single script on an empty stack and return the final stack.
pub fn eval_script(
    script: &Script,
    flags: VerifyFlags,
    checker: &dyn SignatureChecker,
    context: Option<Arc<ExecutionContext>>,
) -> Result<Vec<Vec<u8>>, ExecError> {
    let unlock = Script::new();
    let mut vm = Vm::new(&unlock, script, flags, checker, context)?;
    vm.run();
    if !vm.state().success {
        return Err(take_error(&vm));
    }
    Ok(vm.state().stack.clone())
}

fn take_error(vm: &Vm<'_>) -> ExecError {
    match vm.last_error() {
        Some(error) => error.clone(),
        None => ExecError::from_code(vm.error().unwrap_or(ExecErrorCode::EvalFalse)),
    }
}

fn finish_verification(
    vm: &Vm<'_>,
    flags: VerifyFlags,
    context: Option<&ExecutionContext>,
) -> Result<(), ExecError> {
    if !vm.state().success {
        return Err(take_error(vm));
    }

    if flags.contains(VerifyFlags::CLEANSTACK) && vm.state().stack.len() != 1 {
        return Err(ExecError::new(
            ExecErrorCode::CleanStack,
            format!("{} items left on the stack", vm.state().stack.len()),
        ));
    }

    validate_references(vm.state(), context)
}

/// The deferred reference constraints of the reference opcodes:
/// require refs must appear in a spent coin's push set, singletons in
/// at most one coin and one output, disallowed refs in no coin, and
/// sibling-disallowed refs in no coin other than the one being spent.
fn validate_references(
    state: &VmState,
    context: Option<&ExecutionContext>,
) -> Result<(), ExecError> {
    let tracked = state.require_refs.len()
        + state.singleton_refs.len()
        + state.disallow_refs.len()
        + state.disallow_sibling_refs.len();
    if tracked == 0 {
        return Ok(());
    }

    let context = context.ok_or_else(|| {
        ExecError::new(
            ExecErrorCode::ContextNotPresent,
            "reference constraints require an execution context",
        )
    })?;

    for reference in &state.require_refs {
        if !context.input_push_refs().contains(reference) {
            return Err(ExecError::new(
                ExecErrorCode::ReferenceNotFound,
                format!("required reference {} not found", hex::encode(reference)),
            ));
        }
    }

    for reference in &state.singleton_refs {
        if context.ref_count_utxos(reference) > 1 || context.ref_count_outputs(reference) > 1 {
            return Err(ExecError::new(
                ExecErrorCode::SingletonMismatch,
                format!(
                    "singleton reference {} appears more than once",
                    hex::encode(reference)
                ),
            ));
        }
    }

    for reference in &state.disallow_refs {
        if context.input_push_refs().contains(reference) {
            return Err(ExecError::new(
                ExecErrorCode::InvalidReference,
                format!(
                    "disallowed reference {} appears in a spent coin",
                    hex::encode(reference)
                ),
            ));
        }
    }

    for reference in &state.disallow_sibling_refs {
        if context.ref_in_other_input(reference, context.input_index()) {
            return Err(ExecError::new(
                ExecErrorCode::InvalidReference,
                format!(
                    "sibling-disallowed reference {} appears in another spent coin",
                    hex::encode(reference)
                ),
            ));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checker::AllowListSignatureChecker;
    use rxd_primitives::hash::hash160;
    use rxd_script::opcodes::*;
    use rxd_transaction::{Outpoint, TransactionInput};

    fn dummy_tx() -> Transaction {
        let mut tx = Transaction::new();
        tx.inputs
            .push(TransactionInput::new(Outpoint::new([7; 32], 0)));
        tx
    }

    #[test]
    fn test_verify_simple_pair() {
        let tx = dummy_tx();
        let mut unlock = Script::new();
        unlock.append_num(2);
        let lock = Script::from_bytes(&[OP_3, OP_ADD, OP_5, OP_NUMEQUAL]);
        verify(&unlock, &lock, &tx, 0, 0, VerifyFlags::NONE, None).unwrap();
    }

    #[test]
    fn test_verify_surfaces_eval_false() {
        let tx = dummy_tx();
        let unlock = Script::new();
        let lock = Script::from_bytes(&[OP_1, OP_2, OP_NUMEQUAL]);
        let err = verify(&unlock, &lock, &tx, 0, 0, VerifyFlags::NONE, None).unwrap_err();
        assert_eq!(err.code, ExecErrorCode::EvalFalse);
    }

    #[test]
    fn test_cleanstack() {
        let tx = dummy_tx();
        let mut unlock = Script::new();
        unlock.append_num(7);
        let lock = Script::from_bytes(&[OP_1]);
        // two items remain
        let err = verify(
            &unlock,
            &lock,
            &tx,
            0,
            0,
            VerifyFlags::CLEANSTACK,
            None,
        )
        .unwrap_err();
        assert_eq!(err.code, ExecErrorCode::CleanStack);

        verify(&unlock, &lock, &tx, 0, 0, VerifyFlags::NONE, None).unwrap();
    }

    #[test]
    fn test_p2sh_redeem_phase() {
        let tx = dummy_tx();
        // redeem script: OP_2 OP_ADD OP_3 OP_NUMEQUAL
        let redeem = Script::from_bytes(&[OP_2, OP_ADD, OP_3, OP_NUMEQUAL]);
        let redeem_hash = hash160(redeem.to_bytes());

        let mut lock = Script::new();
        lock.append_opcode(OP_HASH160);
        lock.append_push_data(&redeem_hash).unwrap();
        lock.append_opcode(OP_EQUAL);
        assert!(lock.is_p2sh());

        let mut unlock = Script::new();
        unlock.append_num(1);
        unlock.append_push_data(redeem.to_bytes()).unwrap();

        verify(
            &unlock,
            &lock,
            &tx,
            0,
            0,
            VerifyFlags::P2SH | VerifyFlags::CLEANSTACK,
            None,
        )
        .unwrap();

        // a wrong argument fails inside the redeem phase
        let mut bad_unlock = Script::new();
        bad_unlock.append_num(2);
        bad_unlock.append_push_data(redeem.to_bytes()).unwrap();
        let err = verify(
            &bad_unlock,
            &lock,
            &tx,
            0,
            0,
            VerifyFlags::P2SH,
            None,
        )
        .unwrap_err();
        assert_eq!(err.code, ExecErrorCode::EvalFalse);
    }

    #[test]
    fn test_p2sh_requires_push_only_unlock() {
        let tx = dummy_tx();
        let redeem = Script::from_bytes(&[OP_1]);
        let redeem_hash = hash160(redeem.to_bytes());
        let mut lock = Script::new();
        lock.append_opcode(OP_HASH160);
        lock.append_push_data(&redeem_hash).unwrap();
        lock.append_opcode(OP_EQUAL);

        let mut unlock = Script::new();
        unlock.append_num(1);
        unlock.append_num(1);
        unlock.append_opcode(OP_ADD);
        unlock.append_push_data(redeem.to_bytes()).unwrap();

        let err = verify(&unlock, &lock, &tx, 0, 0, VerifyFlags::P2SH, None).unwrap_err();
        assert_eq!(err.code, ExecErrorCode::SigPushOnly);
    }

    #[test]
    fn test_without_p2sh_flag_pattern_is_plain_script() {
        let tx = dummy_tx();
        let redeem = Script::from_bytes(&[OP_2, OP_ADD, OP_3, OP_NUMEQUAL]);
        let redeem_hash = hash160(redeem.to_bytes());
        let mut lock = Script::new();
        lock.append_opcode(OP_HASH160);
        lock.append_push_data(&redeem_hash).unwrap();
        lock.append_opcode(OP_EQUAL);

        let mut unlock = Script::new();
        unlock.append_push_data(redeem.to_bytes()).unwrap();

        // the hash comparison alone succeeds; no redeem phase runs
        verify(&unlock, &lock, &tx, 0, 0, VerifyFlags::NONE, None).unwrap();
    }

    #[test]
    fn test_eval_script_returns_stack() {
        let checker = AllowListSignatureChecker::new();
        let mut script = Script::new();
        script.append_num(4);
        script.append_num(5);
        let stack = eval_script(&script, VerifyFlags::NONE, &checker, None).unwrap();
        assert_eq!(stack, vec![vec![4], vec![5]]);
    }
}
