//! Flow control, verification, and lock-time opcodes.

use rxd_script::opcodes::*;

use crate::config::MAX_LOCKTIME_NUM_SIZE;
use crate::error::{ExecError, ExecErrorCode};
use crate::flags::VerifyFlags;
use crate::stack::as_bool;
use crate::vm::Vm;

impl Vm<'_> {
    /// Pop a conditional argument. Under MINIMALIF it must be exactly
    /// empty or {0x01}.
    fn pop_condition(&mut self) -> Result<bool, ExecError> {
        if self.flags.contains(VerifyFlags::MINIMALIF) {
            let element = self.popd()?;
            if element.len() > 1 || (element.len() == 1 && element[0] != 1) {
                return Err(ExecError::new(
                    ExecErrorCode::MinimalIf,
                    "conditional argument must be empty or 0x01",
                ));
            }
            return Ok(as_bool(&element));
        }
        self.pop_bool()
    }

    /// OP_IF / OP_NOTIF. The condition is popped only when the
    /// enclosing frame is executing; a skipped branch pushes a false
    /// frame so nesting stays balanced.
    pub(crate) fn op_if(&mut self, executing: bool, negate: bool) -> Result<(), ExecError> {
        let mut branch = false;
        if executing {
            let condition = self.pop_condition()?;
            branch = condition != negate;
        }
        self.state_mut().cond_stack.push(branch);
        Ok(())
    }

    pub(crate) fn op_else(&mut self) -> Result<(), ExecError> {
        match self.state_mut().cond_stack.last_mut() {
            Some(top) => {
                *top = !*top;
                Ok(())
            }
            None => Err(ExecError::new(
                ExecErrorCode::UnbalancedConditional,
                "OP_ELSE without a matching OP_IF",
            )),
        }
    }

    pub(crate) fn op_endif(&mut self) -> Result<(), ExecError> {
        match self.state_mut().cond_stack.pop() {
            Some(_) => Ok(()),
            None => Err(ExecError::new(
                ExecErrorCode::UnbalancedConditional,
                "OP_ENDIF without a matching OP_IF",
            )),
        }
    }

    /// The reserved upgrade NOPs: silent unless discouraged.
    pub(crate) fn op_nop_reserved(&mut self, opcode: u8) -> Result<(), ExecError> {
        if self.flags.contains(VerifyFlags::DISCOURAGE_UPGRADABLE_NOPS) {
            return Err(ExecError::new(
                ExecErrorCode::DisabledOpcode,
                format!(
                    "{} is reserved for soft-fork upgrades",
                    opcode_to_string(opcode)
                ),
            ));
        }
        Ok(())
    }

    /// OP_CHECKLOCKTIMEVERIFY: the upgraded OP_NOP2. Peeks (never
    /// pops) the required lock time.
    pub(crate) fn op_check_lock_time_verify(&mut self) -> Result<(), ExecError> {
        if !self.flags.contains(VerifyFlags::CHECKLOCKTIMEVERIFY) {
            return self.op_nop_reserved(OP_NOP2);
        }

        let top = self.peek(0)?;
        let lock_time = self.num_from_bytes(&top, MAX_LOCKTIME_NUM_SIZE)?;
        if lock_time < 0 {
            return Err(ExecError::new(
                ExecErrorCode::NegativeLocktime,
                format!("negative lock time {}", lock_time),
            ));
        }
        if !self.checker.check_lock_time(lock_time) {
            return Err(ExecError::new(
                ExecErrorCode::UnsatisfiedLocktime,
                format!("lock time {} not satisfied", lock_time),
            ));
        }
        Ok(())
    }

    /// OP_CHECKSEQUENCEVERIFY: the upgraded OP_NOP3.
    pub(crate) fn op_check_sequence_verify(&mut self) -> Result<(), ExecError> {
        if !self.flags.contains(VerifyFlags::CHECKSEQUENCEVERIFY) {
            return self.op_nop_reserved(OP_NOP3);
        }

        let top = self.peek(0)?;
        let sequence = self.num_from_bytes(&top, MAX_LOCKTIME_NUM_SIZE)?;
        if sequence < 0 {
            return Err(ExecError::new(
                ExecErrorCode::NegativeLocktime,
                format!("negative sequence {}", sequence),
            ));
        }
        // The stack operand's disable bit turns the check off.
        if sequence & (1 << 31) != 0 {
            return Ok(());
        }
        if !self.checker.check_sequence(sequence) {
            return Err(ExecError::new(
                ExecErrorCode::UnsatisfiedLocktime,
                format!("sequence {} not satisfied", sequence),
            ));
        }
        Ok(())
    }
}
