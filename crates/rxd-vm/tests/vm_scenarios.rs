//! End-to-end interpreter scenarios over the public API.

use std::sync::Arc;

use rxd_script::opcodes::*;
use rxd_script::Script;
use rxd_transaction::{Coin, Outpoint, Transaction, TransactionInput, TransactionOutput};
use rxd_vm::{
    AllowListSignatureChecker, ExecErrorCode, ExecutionContext, VerifyFlags, Vm,
};

fn run_lock(
    script: &Script,
    flags: VerifyFlags,
    context: Option<Arc<ExecutionContext>>,
) -> (bool, Option<ExecErrorCode>, Vec<Vec<u8>>) {
    let checker = AllowListSignatureChecker::new();
    let unlock = Script::new();
    let mut vm = Vm::new(&unlock, script, flags, &checker, context).unwrap();
    let ok = vm.run();
    (ok, vm.error(), vm.state().stack.clone())
}

#[test]
fn scenario_small_arithmetic() {
    let script = Script::from_bytes(&[OP_1, OP_2, OP_ADD, OP_3, OP_NUMEQUAL]);
    let (ok, _, stack) = run_lock(&script, VerifyFlags::NONE, None);
    assert!(ok);
    assert_eq!(stack, vec![vec![0x01]]);
}

#[test]
fn scenario_extended_multiplication() {
    let script = Script::from_bytes(&[OP_3, OP_4, OP_MUL]);
    let (ok, _, stack) = run_lock(&script, VerifyFlags::EXTENDED_INTEGERS, None);
    assert!(ok);
    assert_eq!(stack, vec![vec![0x0C]]);
}

#[test]
fn scenario_splice_roundtrip() {
    let mut script = Script::new();
    script.append_push_data(&[0xAA]).unwrap();
    script.append_push_data(&[0xBB]).unwrap();
    script.append_opcode(OP_CAT);
    script.append_num(1);
    script.append_opcode(OP_SPLIT);
    script.append_push_data(&[0xBB]).unwrap();
    script.append_opcode(OP_EQUALVERIFY);
    script.append_opcodes(&[OP_SIZE, OP_1, OP_NUMEQUAL]);

    let (ok, error, _) = run_lock(&script, VerifyFlags::NONE, None);
    assert!(ok, "splice roundtrip failed: {:?}", error);
}

#[test]
fn scenario_conditional() {
    let script = Script::from_bytes(&[OP_0, OP_IF, OP_0, OP_ELSE, OP_1, OP_ENDIF]);
    let (ok, _, stack) = run_lock(&script, VerifyFlags::NONE, None);
    assert!(ok);
    assert_eq!(stack, vec![vec![0x01]]);
}

#[test]
fn scenario_division_by_zero() {
    let script = Script::from_bytes(&[OP_5, OP_0, OP_DIV]);
    let (ok, error, _) = run_lock(&script, VerifyFlags::NONE, None);
    assert!(!ok);
    assert_eq!(error, Some(ExecErrorCode::DivByZero));
}

#[test]
fn scenario_unbalanced_if() {
    let script = Script::from_bytes(&[OP_1, OP_IF, OP_1]);
    let (ok, error, _) = run_lock(&script, VerifyFlags::NONE, None);
    assert!(!ok);
    assert_eq!(error, Some(ExecErrorCode::UnbalancedConditional));
}

fn introspection_context() -> Arc<ExecutionContext> {
    let mut tx = Transaction::new();
    tx.inputs
        .push(TransactionInput::new(Outpoint::new([1; 32], 0)));
    tx.inputs
        .push(TransactionInput::new(Outpoint::new([2; 32], 1)));
    tx.outputs.push(TransactionOutput::new(
        90_000,
        Script::from_bytes(&[OP_1]),
    ));
    tx.lock_time = 42;
    let coins = vec![
        Coin::new(60_000, Script::from_bytes(&[OP_1])),
        Coin::new(40_000, Script::from_bytes(&[OP_2])),
    ];
    Arc::new(ExecutionContext::new(Arc::new(tx), coins, 0).unwrap())
}

#[test]
fn scenario_introspection_counts() {
    let script = Script::from_bytes(&[
        OP_TXINPUTCOUNT,
        OP_2,
        OP_NUMEQUAL,
        OP_VERIFY,
        OP_TXOUTPUTCOUNT,
        OP_1,
        OP_NUMEQUAL,
    ]);
    let (ok, error, _) = run_lock(
        &script,
        VerifyFlags::NATIVE_INTROSPECTION,
        Some(introspection_context()),
    );
    assert!(ok, "introspection failed: {:?}", error);
}

#[test]
fn scenario_blake3_determinism() {
    let mut script = Script::new();
    script.append_push_data(b"abc").unwrap();
    script.append_opcode(OP_BLAKE3);
    script.append_push_data(b"abc").unwrap();
    script.append_opcode(OP_BLAKE3);
    script.append_opcode(OP_EQUAL);
    let (ok, _, stack) = run_lock(&script, VerifyFlags::NONE, None);
    assert!(ok);
    assert_eq!(stack, vec![vec![0x01]]);
}

#[test]
fn scenario_sighash_forkid_enforcement() {
    // a structurally valid DER signature with hash type 0x01 (no
    // fork-id bit)
    let mut sig = vec![0x30, 0x06, 0x02, 0x01, 0x01, 0x02, 0x01, 0x01];
    sig.push(0x01);

    let mut script = Script::new();
    script.append_push_data(&sig).unwrap();
    script.append_push_data(&[0x02; 33]).unwrap();
    script.append_opcode(OP_CHECKSIG);

    // without NULLFAIL: false is pushed
    let (ok, _, stack) = run_lock(&script, VerifyFlags::SIGHASH_FORKID, None);
    assert!(!ok);
    assert_eq!(stack, vec![Vec::<u8>::new()]);

    // with NULLFAIL: the fork-id violation is surfaced
    let (ok, error, _) = run_lock(
        &script,
        VerifyFlags::SIGHASH_FORKID | VerifyFlags::NULLFAIL,
        None,
    );
    assert!(!ok);
    assert_eq!(error, Some(ExecErrorCode::MustUseForkId));
}

#[test]
fn scenario_step_rewind_invariant() {
    let checker = AllowListSignatureChecker::new();
    let unlock = Script::new();
    let lock = Script::from_bytes(&[OP_1, OP_2, OP_ADD]);
    let mut vm = Vm::new(&unlock, &lock, VerifyFlags::NONE, &checker, None).unwrap();

    assert!(vm.step());
    assert!(vm.step());
    assert_eq!(vm.state().stack.len(), 2);

    assert!(vm.rewind());
    assert_eq!(vm.state().stack.len(), 1);
    assert!(vm.rewind());
    assert_eq!(vm.state().stack.len(), 0);
    assert!(vm.is_at_start());
}

#[test]
fn scenario_introspection_without_context_fails() {
    let script = Script::from_bytes(&[OP_TXINPUTCOUNT]);
    let (ok, error, _) = run_lock(&script, VerifyFlags::NATIVE_INTROSPECTION, None);
    assert!(!ok);
    assert_eq!(error, Some(ExecErrorCode::ContextNotPresent));
}

#[test]
fn scenario_introspection_requires_capability() {
    let script = Script::from_bytes(&[OP_TXINPUTCOUNT]);
    let (ok, error, _) = run_lock(&script, VerifyFlags::NONE, Some(introspection_context()));
    assert!(!ok);
    assert_eq!(error, Some(ExecErrorCode::DisabledOpcode));
}

#[test]
fn scenario_utxo_and_output_queries() {
    let context = introspection_context();

    let mut script = Script::new();
    script.append_num(1);
    script.append_opcode(OP_UTXOVALUE);
    let (ok, _, stack) = run_lock(
        &script,
        VerifyFlags::NATIVE_INTROSPECTION,
        Some(context.clone()),
    );
    assert!(ok);
    // 40 000 = 0x9C40 LE, plus a sign byte for the high bit
    assert_eq!(stack, vec![vec![0x40, 0x9C, 0x00]]);

    let mut script = Script::new();
    script.append_num(0);
    script.append_opcode(OP_OUTPUTBYTECODE);
    let (ok, _, stack) = run_lock(
        &script,
        VerifyFlags::NATIVE_INTROSPECTION,
        Some(context.clone()),
    );
    assert!(ok);
    assert_eq!(stack, vec![vec![OP_1]]);

    let mut script = Script::new();
    script.append_num(0);
    script.append_opcode(OP_OUTPOINTTXHASH);
    let (ok, _, stack) = run_lock(
        &script,
        VerifyFlags::NATIVE_INTROSPECTION,
        Some(context.clone()),
    );
    assert!(ok);
    assert_eq!(stack, vec![vec![1u8; 32]]);

    let mut script = Script::new();
    script.append_num(1);
    script.append_opcode(OP_INPUTSEQUENCENUMBER);
    let (ok, _, stack) = run_lock(
        &script,
        VerifyFlags::NATIVE_INTROSPECTION,
        Some(context),
    );
    assert!(ok);
    // final sequence 0xFFFFFFFF as a script number
    assert_eq!(stack, vec![vec![0xFF, 0xFF, 0xFF, 0xFF, 0x00]]);
}

#[test]
fn scenario_index_bounds_checked_strictly() {
    let context = introspection_context();

    let mut script = Script::new();
    script.append_num(2);
    script.append_opcode(OP_UTXOVALUE);
    let (ok, error, _) = run_lock(
        &script,
        VerifyFlags::NATIVE_INTROSPECTION,
        Some(context.clone()),
    );
    assert!(!ok);
    assert_eq!(error, Some(ExecErrorCode::InvalidTxInputIndex));

    let mut script = Script::new();
    script.append_num(-1);
    script.append_opcode(OP_OUTPUTVALUE);
    let (ok, error, _) = run_lock(&script, VerifyFlags::NATIVE_INTROSPECTION, Some(context));
    assert!(!ok);
    assert_eq!(error, Some(ExecErrorCode::InvalidTxOutputIndex));
}

#[test]
fn scenario_active_bytecode_tracks_code_separator() {
    let script = Script::from_bytes(&[OP_1, OP_CODESEPARATOR, OP_ACTIVEBYTECODE]);
    let (ok, _, stack) = run_lock(&script, VerifyFlags::NATIVE_INTROSPECTION, None);
    assert!(ok);
    // only the bytes after the separator remain active
    assert_eq!(stack, vec![vec![1], vec![OP_ACTIVEBYTECODE]]);
}

#[test]
fn scenario_push_tx_state() {
    let context = introspection_context();
    let txid = context.tx().txid();

    let mut script = Script::new();
    script.append_num(0);
    script.append_opcode(OP_PUSH_TX_STATE);
    let (ok, _, stack) = run_lock(
        &script,
        VerifyFlags::PUSH_TX_STATE,
        Some(context.clone()),
    );
    assert!(ok);
    assert_eq!(stack, vec![txid.to_vec()]);

    // undefined selectors are rejected
    let mut script = Script::new();
    script.append_num(1);
    script.append_opcode(OP_PUSH_TX_STATE);
    let (ok, error, _) = run_lock(&script, VerifyFlags::PUSH_TX_STATE, Some(context));
    assert!(!ok);
    assert_eq!(error, Some(ExecErrorCode::BadOpcode));
}

#[test]
fn scenario_op_count_is_bounded() {
    // a short script cannot trip the 32M bound; just confirm push-only
    // scripts leave the counter untouched while ops count
    let checker = AllowListSignatureChecker::new();
    let unlock = Script::new();
    let lock = Script::from_bytes(&[OP_1, OP_2, OP_ADD, OP_DUP, OP_DROP]);
    let mut vm = Vm::new(&unlock, &lock, VerifyFlags::NONE, &checker, None).unwrap();
    vm.run();
    assert_eq!(vm.state().op_count, 3);
}

#[test]
fn scenario_script_size_limit() {
    let checker = AllowListSignatureChecker::new();
    let unlock = Script::new();
    let lock = Script::from_bytes(&vec![OP_NOP; 32_000_001]);
    let err = Vm::new(&unlock, &lock, VerifyFlags::NONE, &checker, None).unwrap_err();
    assert_eq!(err.code, ExecErrorCode::ScriptSize);
}
