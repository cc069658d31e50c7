//! Stack manipulation opcodes.

use crate::error::{ExecError, ExecErrorCode};
use crate::stack::as_bool;
use crate::vm::Vm;

impl Vm<'_> {
    pub(crate) fn op_to_alt_stack(&mut self) -> Result<(), ExecError> {
        let element = self.popd()?;
        self.state_mut().altstack.push(element);
        Ok(())
    }

    pub(crate) fn op_from_alt_stack(&mut self) -> Result<(), ExecError> {
        let element = self.popa()?;
        self.push(element);
        Ok(())
    }

    pub(crate) fn op_drop_n(&mut self, n: usize) -> Result<(), ExecError> {
        for _ in 0..n {
            self.popd()?;
        }
        Ok(())
    }

    pub(crate) fn op_dup_n(&mut self, n: usize) -> Result<(), ExecError> {
        // peeking at a fixed depth walks the group as copies pile on top
        for _ in 0..n {
            let element = self.peek(n - 1)?;
            self.push(element);
        }
        Ok(())
    }

    pub(crate) fn op_over_n(&mut self, n: usize) -> Result<(), ExecError> {
        let depth = 2 * n - 1;
        for _ in 0..n {
            let element = self.peek(depth)?;
            self.push(element);
        }
        Ok(())
    }

    pub(crate) fn op_rot_n(&mut self, n: usize) -> Result<(), ExecError> {
        let depth = 3 * n - 1;
        for _ in 0..n {
            let element = self.remove_at(depth)?;
            self.push(element);
        }
        Ok(())
    }

    pub(crate) fn op_swap_n(&mut self, n: usize) -> Result<(), ExecError> {
        let depth = 2 * n - 1;
        for _ in 0..n {
            let element = self.remove_at(depth)?;
            self.push(element);
        }
        Ok(())
    }

    pub(crate) fn op_ifdup(&mut self) -> Result<(), ExecError> {
        let top = self.peek(0)?;
        if as_bool(&top) {
            self.push(top);
        }
        Ok(())
    }

    pub(crate) fn op_depth(&mut self) -> Result<(), ExecError> {
        let depth = self.state().stack.len() as i64;
        self.push_num(depth);
        Ok(())
    }

    pub(crate) fn op_nip(&mut self) -> Result<(), ExecError> {
        self.remove_at(1)?;
        Ok(())
    }

    pub(crate) fn op_pick(&mut self) -> Result<(), ExecError> {
        let n = self.pop_num()?;
        if n < 0 || n as usize >= self.state().stack.len() {
            return Err(ExecError::new(
                ExecErrorCode::InvalidStackOperation,
                format!("pick depth {} is invalid", n),
            ));
        }
        let element = self.peek(n as usize)?;
        self.push(element);
        Ok(())
    }

    pub(crate) fn op_roll(&mut self) -> Result<(), ExecError> {
        let n = self.pop_num()?;
        if n < 0 || n as usize >= self.state().stack.len() {
            return Err(ExecError::new(
                ExecErrorCode::InvalidStackOperation,
                format!("roll depth {} is invalid", n),
            ));
        }
        let element = self.remove_at(n as usize)?;
        self.push(element);
        Ok(())
    }

    pub(crate) fn op_tuck(&mut self) -> Result<(), ExecError> {
        let top = self.popd()?;
        let second = self.popd()?;
        self.push(top.clone());
        self.push(second);
        self.push(top);
        Ok(())
    }
}
