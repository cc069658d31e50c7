//! Splice, bitwise, and equality opcodes.

use rxd_script::scriptnum;

use crate::config::MAX_SCRIPT_ELEMENT_SIZE;
use crate::error::{ExecError, ExecErrorCode};
use crate::vm::Vm;

impl Vm<'_> {
    pub(crate) fn op_cat(&mut self) -> Result<(), ExecError> {
        let tail = self.popd()?;
        let mut head = self.popd()?;
        if head.len() + tail.len() > MAX_SCRIPT_ELEMENT_SIZE {
            return Err(ExecError::new(
                ExecErrorCode::PushSize,
                format!(
                    "concatenated size {} exceeds the element limit",
                    head.len() + tail.len()
                ),
            ));
        }
        head.extend_from_slice(&tail);
        self.push(head);
        Ok(())
    }

    pub(crate) fn op_split(&mut self) -> Result<(), ExecError> {
        let position = self.pop_num()?;
        let data = self.popd()?;
        if position < 0 || position as usize > data.len() {
            return Err(ExecError::new(
                ExecErrorCode::InvalidStackOperation,
                format!(
                    "split position {} is invalid for {} bytes",
                    position,
                    data.len()
                ),
            ));
        }
        let position = position as usize;
        self.push(data[..position].to_vec());
        self.push(data[position..].to_vec());
        Ok(())
    }

    pub(crate) fn op_num2bin(&mut self) -> Result<(), ExecError> {
        let size = self.pop_num()?;
        let data = self.popd()?;

        if size < 0 || size as usize > MAX_SCRIPT_ELEMENT_SIZE {
            return Err(ExecError::new(
                ExecErrorCode::PushSize,
                format!("requested width {} is invalid", size),
            ));
        }
        let size = size as usize;

        let mut encoded = scriptnum::minimally_encode(&data);
        if encoded.len() > size {
            return Err(ExecError::new(
                ExecErrorCode::ImpossibleEncoding,
                format!("value needs {} bytes, {} requested", encoded.len(), size),
            ));
        }
        if encoded.len() == size {
            self.push(encoded);
            return Ok(());
        }

        // Widen: move the sign bit onto a fresh top byte, zero-pad in
        // between.
        let mut sign = 0x00u8;
        if let Some(last) = encoded.last_mut() {
            sign = *last & 0x80;
            *last &= 0x7F;
        }
        while encoded.len() < size - 1 {
            encoded.push(0x00);
        }
        encoded.push(sign);
        self.push(encoded);
        Ok(())
    }

    pub(crate) fn op_bin2num(&mut self) -> Result<(), ExecError> {
        let data = self.popd()?;
        let minimal = scriptnum::minimally_encode(&data);
        if minimal.len() > self.max_num_length() {
            return Err(ExecError::new(
                ExecErrorCode::InvalidNumberRange,
                format!(
                    "minimized value of {} bytes exceeds the numeric width {}",
                    minimal.len(),
                    self.max_num_length()
                ),
            ));
        }
        self.push(minimal);
        Ok(())
    }

    pub(crate) fn op_size(&mut self) -> Result<(), ExecError> {
        let top = self.peek(0)?;
        self.push_num(top.len() as i64);
        Ok(())
    }

    pub(crate) fn op_reverse_bytes(&mut self) -> Result<(), ExecError> {
        let mut data = self.popd()?;
        data.reverse();
        self.push(data);
        Ok(())
    }

    pub(crate) fn op_invert(&mut self) -> Result<(), ExecError> {
        let data = self.popd()?;
        self.push(data.iter().map(|b| !b).collect());
        Ok(())
    }

    pub(crate) fn op_bitwise(&mut self, f: fn(u8, u8) -> u8) -> Result<(), ExecError> {
        let b = self.popd()?;
        let a = self.popd()?;
        if a.len() != b.len() {
            return Err(ExecError::new(
                ExecErrorCode::InvalidStackOperation,
                format!("operand lengths differ: {} vs {}", a.len(), b.len()),
            ));
        }
        self.push(a.iter().zip(b.iter()).map(|(&x, &y)| f(x, y)).collect());
        Ok(())
    }

    pub(crate) fn op_equal(&mut self) -> Result<(), ExecError> {
        let b = self.popd()?;
        let a = self.popd()?;
        self.push_bool(a == b);
        Ok(())
    }
}
