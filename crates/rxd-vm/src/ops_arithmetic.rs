//! Numeric opcodes.
//!
//! Operands are bounded by the configured numeric width; overflow of
//! the 64-bit result range is a failure, never a silent wrap.

use crate::error::{ExecError, ExecErrorCode};
use crate::vm::Vm;

impl Vm<'_> {
    pub(crate) fn op_unary_num(
        &mut self,
        f: impl FnOnce(i64) -> Option<i64>,
    ) -> Result<(), ExecError> {
        let n = self.pop_num()?;
        let result = f(n).ok_or_else(|| {
            ExecError::new(
                ExecErrorCode::InvalidNumberRange,
                format!("result overflows for operand {}", n),
            )
        })?;
        self.push_num(result);
        Ok(())
    }

    pub(crate) fn op_binary_num(
        &mut self,
        f: impl FnOnce(i64, i64) -> Option<i64>,
    ) -> Result<(), ExecError> {
        let b = self.pop_num()?;
        let a = self.pop_num()?;
        let result = f(a, b).ok_or_else(|| {
            ExecError::new(
                ExecErrorCode::InvalidNumberRange,
                format!("result overflows for operands {} and {}", a, b),
            )
        })?;
        self.push_num(result);
        Ok(())
    }

    pub(crate) fn op_bool_binop(
        &mut self,
        f: impl FnOnce(i64, i64) -> bool,
    ) -> Result<(), ExecError> {
        let b = self.pop_num()?;
        let a = self.pop_num()?;
        self.push_num(if f(a, b) { 1 } else { 0 });
        Ok(())
    }

    pub(crate) fn op_not(&mut self) -> Result<(), ExecError> {
        let n = self.pop_num()?;
        self.push_num(if n == 0 { 1 } else { 0 });
        Ok(())
    }

    pub(crate) fn op_0notequal(&mut self) -> Result<(), ExecError> {
        let n = self.pop_num()?;
        self.push_num(if n != 0 { 1 } else { 0 });
        Ok(())
    }

    pub(crate) fn op_div(&mut self) -> Result<(), ExecError> {
        let divisor = self.pop_num()?;
        let dividend = self.pop_num()?;
        if divisor == 0 {
            return Err(ExecError::from_code(ExecErrorCode::DivByZero));
        }
        // i64::MIN / -1 is the one remaining overflow
        let quotient = dividend.checked_div(divisor).ok_or_else(|| {
            ExecError::from_code(ExecErrorCode::InvalidNumberRange)
        })?;
        self.push_num(quotient);
        Ok(())
    }

    pub(crate) fn op_mod(&mut self) -> Result<(), ExecError> {
        let divisor = self.pop_num()?;
        let dividend = self.pop_num()?;
        if divisor == 0 {
            return Err(ExecError::from_code(ExecErrorCode::ModByZero));
        }
        let remainder = dividend.checked_rem(divisor).ok_or_else(|| {
            ExecError::from_code(ExecErrorCode::InvalidNumberRange)
        })?;
        self.push_num(remainder);
        Ok(())
    }

    pub(crate) fn op_within(&mut self) -> Result<(), ExecError> {
        let max = self.pop_num()?;
        let min = self.pop_num()?;
        let x = self.pop_num()?;
        self.push_num(if min <= x && x < max { 1 } else { 0 });
        Ok(())
    }

    /// Shift amount validation shared by LSHIFT and RSHIFT: the amount
    /// must be non-negative and no larger than the operand bit length.
    fn pop_shift_operands(&mut self) -> Result<(Vec<u8>, usize), ExecError> {
        let amount = self.pop_num()?;
        let data = self.popd()?;
        if amount < 0 {
            return Err(ExecError::new(
                ExecErrorCode::InvalidNumberRange,
                "shift amount is negative",
            ));
        }
        if amount as usize > data.len() * 8 {
            return Err(ExecError::new(
                ExecErrorCode::InvalidNumberRange,
                format!(
                    "shift of {} exceeds {} operand bits",
                    amount,
                    data.len() * 8
                ),
            ));
        }
        Ok((data, amount as usize))
    }

    pub(crate) fn op_lshift(&mut self) -> Result<(), ExecError> {
        let (data, amount) = self.pop_shift_operands()?;
        let byte_shift = amount / 8;
        let bit_shift = amount % 8;

        // bits move toward lower indices; bits shifted out are discarded
        let mut result = vec![0u8; data.len()];
        for i in (0..data.len()).rev() {
            if byte_shift > i {
                continue;
            }
            let k = i - byte_shift;
            result[k] |= data[i] << bit_shift;
            if bit_shift > 0 && k >= 1 {
                result[k - 1] |= data[i] >> (8 - bit_shift);
            }
        }
        self.push(result);
        Ok(())
    }

    pub(crate) fn op_rshift(&mut self) -> Result<(), ExecError> {
        let (data, amount) = self.pop_shift_operands()?;
        let byte_shift = amount / 8;
        let bit_shift = amount % 8;

        let mut result = vec![0u8; data.len()];
        for (i, &byte) in data.iter().enumerate() {
            let k = i + byte_shift;
            if k < data.len() {
                result[k] |= byte >> bit_shift;
            }
            if bit_shift > 0 && k + 1 < data.len() {
                result[k + 1] |= byte << (8 - bit_shift);
            }
        }
        self.push(result);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::checker::AllowListSignatureChecker;
    use crate::error::ExecErrorCode;
    use crate::flags::VerifyFlags;
    use crate::vm::Vm;
    use rxd_script::opcodes::*;
    use rxd_script::Script;

    fn run_extended(script: &Script) -> (bool, Option<ExecErrorCode>, Vec<Vec<u8>>) {
        let checker = AllowListSignatureChecker::new();
        let unlock = Script::new();
        let mut vm = Vm::new(
            &unlock,
            script,
            VerifyFlags::EXTENDED_INTEGERS,
            &checker,
            None,
        )
        .unwrap();
        let ok = vm.run();
        (ok, vm.error(), vm.state().stack.clone())
    }

    fn script(build: impl FnOnce(&mut Script)) -> Script {
        let mut s = Script::new();
        build(&mut s);
        s
    }

    #[test]
    fn test_mul() {
        let (ok, _, stack) = run_extended(&script(|s| {
            s.append_opcodes(&[OP_3, OP_4, OP_MUL]);
        }));
        assert!(ok);
        assert_eq!(stack, vec![vec![0x0C]]);
    }

    #[test]
    fn test_div_truncates_toward_zero() {
        let (_, _, stack) = run_extended(&script(|s| {
            s.append_num(7);
            s.append_num(2);
            s.append_opcode(OP_DIV);
        }));
        assert_eq!(stack, vec![vec![3]]);

        let (_, _, stack) = run_extended(&script(|s| {
            s.append_num(-7);
            s.append_num(2);
            s.append_opcode(OP_DIV);
            s.append_opcode(OP_NEGATE);
        }));
        // -7 / 2 = -3, negated back to 3
        assert_eq!(stack, vec![vec![3]]);
    }

    #[test]
    fn test_div_by_zero() {
        let (ok, error, _) = run_extended(&script(|s| {
            s.append_opcodes(&[OP_5, OP_0, OP_DIV]);
        }));
        assert!(!ok);
        assert_eq!(error, Some(ExecErrorCode::DivByZero));
    }

    #[test]
    fn test_mod_by_zero() {
        let (ok, error, _) = run_extended(&script(|s| {
            s.append_opcodes(&[OP_5, OP_0, OP_MOD]);
        }));
        assert!(!ok);
        assert_eq!(error, Some(ExecErrorCode::ModByZero));
    }

    #[test]
    fn test_mod_truncated_remainder() {
        let (_, _, stack) = run_extended(&script(|s| {
            s.append_num(7);
            s.append_num(3);
            s.append_opcode(OP_MOD);
        }));
        assert_eq!(stack, vec![vec![1]]);

        // truncated division: remainder keeps the dividend's sign
        let (_, _, stack) = run_extended(&script(|s| {
            s.append_num(-7);
            s.append_num(3);
            s.append_opcode(OP_MOD);
            s.append_opcode(OP_NEGATE);
        }));
        assert_eq!(stack, vec![vec![1]]);
    }

    #[test]
    fn test_add_overflow_fails() {
        let (ok, error, _) = run_extended(&script(|s| {
            s.append_num(i64::MAX);
            s.append_num(1);
            s.append_opcode(OP_ADD);
        }));
        assert!(!ok);
        assert_eq!(error, Some(ExecErrorCode::InvalidNumberRange));
    }

    #[test]
    fn test_2mul_overflow_fails() {
        let (ok, error, _) = run_extended(&script(|s| {
            s.append_num(i64::MAX);
            s.append_opcode(OP_2MUL);
        }));
        assert!(!ok);
        assert_eq!(error, Some(ExecErrorCode::InvalidNumberRange));
    }

    #[test]
    fn test_2div_truncates_toward_zero() {
        let (_, _, stack) = run_extended(&script(|s| {
            s.append_num(7);
            s.append_opcode(OP_2DIV);
        }));
        assert_eq!(stack, vec![vec![3]]);

        // -3 / 2 = -1
        let (_, _, stack) = run_extended(&script(|s| {
            s.append_num(-3);
            s.append_opcode(OP_2DIV);
        }));
        assert_eq!(stack, vec![vec![0x81]]);
    }

    #[test]
    fn test_operand_width_respected() {
        // a 5-byte operand is out of range without extended integers
        let checker = AllowListSignatureChecker::new();
        let unlock = Script::new();
        let lock = script(|s| {
            s.append_push_data(&[0xFF, 0xFF, 0xFF, 0xFF, 0x7F]).unwrap();
            s.append_opcode(OP_1ADD);
        });
        let mut vm = Vm::new(&unlock, &lock, VerifyFlags::NONE, &checker, None).unwrap();
        assert!(!vm.run());
        assert_eq!(vm.error(), Some(ExecErrorCode::InvalidNumberRange));

        // extended width accepts it
        let (ok, _, _) = run_extended(&lock);
        assert!(ok);
    }

    #[test]
    fn test_comparisons() {
        let (_, _, stack) = run_extended(&script(|s| {
            s.append_opcodes(&[OP_3, OP_5, OP_LESSTHAN]);
        }));
        assert_eq!(stack, vec![vec![1]]);

        let (_, _, stack) = run_extended(&script(|s| {
            s.append_opcodes(&[OP_3, OP_5, OP_GREATERTHANOREQUAL]);
        }));
        assert_eq!(stack, vec![Vec::<u8>::new()]);

        let (_, _, stack) = run_extended(&script(|s| {
            s.append_opcodes(&[OP_3, OP_2, OP_5, OP_WITHIN]);
        }));
        assert_eq!(stack, vec![vec![1]]);
    }

    #[test]
    fn test_min_max() {
        let (_, _, stack) = run_extended(&script(|s| {
            s.append_opcodes(&[OP_3, OP_5, OP_MIN, OP_3, OP_5, OP_MAX]);
        }));
        assert_eq!(stack, vec![vec![3], vec![5]]);
    }

    #[test]
    fn test_lshift_small() {
        let (_, _, stack) = run_extended(&script(|s| {
            s.append_push_data(&[0x01]).unwrap();
            s.append_num(1);
            s.append_opcode(OP_LSHIFT);
        }));
        assert_eq!(stack, vec![vec![0x02]]);
    }

    #[test]
    fn test_lshift_discards_overflow() {
        let (_, _, stack) = run_extended(&script(|s| {
            s.append_push_data(&[0x80, 0x01]).unwrap();
            s.append_num(1);
            s.append_opcode(OP_LSHIFT);
        }));
        // the top bit of byte 0 falls off; byte 1's low bit carries in
        assert_eq!(stack, vec![vec![0x00, 0x02]]);
    }

    #[test]
    fn test_rshift() {
        let (_, _, stack) = run_extended(&script(|s| {
            s.append_push_data(&[0x80]).unwrap();
            s.append_num(7);
            s.append_opcode(OP_RSHIFT);
        }));
        assert_eq!(stack, vec![vec![0x01]]);
    }

    #[test]
    fn test_shift_bounds() {
        let (ok, error, _) = run_extended(&script(|s| {
            s.append_push_data(&[0x01]).unwrap();
            s.append_num(9);
            s.append_opcode(OP_LSHIFT);
        }));
        assert!(!ok);
        assert_eq!(error, Some(ExecErrorCode::InvalidNumberRange));

        let (ok, error, _) = run_extended(&script(|s| {
            s.append_push_data(&[0x01]).unwrap();
            s.append_num(-1);
            s.append_opcode(OP_RSHIFT);
        }));
        assert!(!ok);
        assert_eq!(error, Some(ExecErrorCode::InvalidNumberRange));

        // a full-width shift clears the value
        let (_, _, stack) = run_extended(&script(|s| {
            s.append_push_data(&[0xFF]).unwrap();
            s.append_num(8);
            s.append_opcode(OP_RSHIFT);
        }));
        assert_eq!(stack, vec![vec![0x00]]);
    }
}
