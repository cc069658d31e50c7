//! Native introspection, state-separator query, and reference opcodes.
//!
//! These opcodes read the precomputed execution context; they never
//! recompute anything from the live stack. Index arguments are
//! bounds-checked strictly here even though the context itself answers
//! out-of-range queries with sentinels.

use std::sync::Arc;

use rxd_script::opcodes::*;

use crate::context::{ExecutionContext, RefId};
use crate::error::{ExecError, ExecErrorCode};
use crate::vm::Vm;

impl Vm<'_> {
    fn require_context(&self) -> Result<Arc<ExecutionContext>, ExecError> {
        match &self.context {
            Some(context) => Ok(Arc::clone(context)),
            None => Err(ExecError::from_code(ExecErrorCode::ContextNotPresent)),
        }
    }

    fn pop_input_index(&mut self, context: &ExecutionContext) -> Result<usize, ExecError> {
        let index = self.pop_num()?;
        if !context.is_valid_input_index(index) {
            return Err(ExecError::new(
                ExecErrorCode::InvalidTxInputIndex,
                format!(
                    "input index {} out of range for {} inputs",
                    index,
                    context.input_count()
                ),
            ));
        }
        Ok(index as usize)
    }

    fn pop_output_index(&mut self, context: &ExecutionContext) -> Result<usize, ExecError> {
        let index = self.pop_num()?;
        if !context.is_valid_output_index(index) {
            return Err(ExecError::new(
                ExecErrorCode::InvalidTxOutputIndex,
                format!(
                    "output index {} out of range for {} outputs",
                    index,
                    context.output_count()
                ),
            ));
        }
        Ok(index as usize)
    }

    fn pop_reference(&mut self) -> Result<RefId, ExecError> {
        let element = self.popd()?;
        element.as_slice().try_into().map_err(|_| {
            ExecError::new(
                ExecErrorCode::InvalidReference,
                format!("reference must be {} bytes, got {}", REF_SIZE, element.len()),
            )
        })
    }

    fn pop_hash32(&mut self) -> Result<[u8; 32], ExecError> {
        let element = self.popd()?;
        element.as_slice().try_into().map_err(|_| {
            ExecError::new(
                ExecErrorCode::InvalidReference,
                format!("hash must be 32 bytes, got {}", element.len()),
            )
        })
    }

    fn operand_reference(operand: &[u8]) -> Result<RefId, ExecError> {
        operand.try_into().map_err(|_| {
            ExecError::new(
                ExecErrorCode::InvalidReference,
                format!("embedded operand must be {} bytes", REF_SIZE),
            )
        })
    }

    pub(crate) fn dispatch_introspection(
        &mut self,
        opcode: u8,
        operand: &[u8],
    ) -> Result<(), ExecError> {
        match opcode {
            // Transaction-level introspection
            OP_INPUTINDEX => {
                let context = self.require_context()?;
                self.push_num(context.input_index() as i64);
                Ok(())
            }
            OP_ACTIVEBYTECODE => {
                // the currently executing code section, no context needed
                let active = self.sub_script();
                self.push(active.into_bytes());
                Ok(())
            }
            OP_TXVERSION => {
                let context = self.require_context()?;
                self.push_num(context.tx_version() as i64);
                Ok(())
            }
            OP_TXINPUTCOUNT => {
                let context = self.require_context()?;
                self.push_num(context.input_count() as i64);
                Ok(())
            }
            OP_TXOUTPUTCOUNT => {
                let context = self.require_context()?;
                self.push_num(context.output_count() as i64);
                Ok(())
            }
            OP_TXLOCKTIME => {
                let context = self.require_context()?;
                self.push_num(context.lock_time() as i64);
                Ok(())
            }

            // Per-input introspection
            OP_UTXOVALUE => {
                let context = self.require_context()?;
                let index = self.pop_input_index(&context)?;
                self.push_num(context.utxo_value(index));
                Ok(())
            }
            OP_UTXOBYTECODE => {
                let context = self.require_context()?;
                let index = self.pop_input_index(&context)?;
                self.push(context.utxo_bytecode(index).into_bytes());
                Ok(())
            }
            OP_OUTPOINTTXHASH => {
                let context = self.require_context()?;
                let index = self.pop_input_index(&context)?;
                self.push(context.outpoint_tx_hash(index).to_vec());
                Ok(())
            }
            OP_OUTPOINTINDEX => {
                let context = self.require_context()?;
                let index = self.pop_input_index(&context)?;
                self.push_num(context.outpoint_index(index) as i64);
                Ok(())
            }
            OP_INPUTBYTECODE => {
                let context = self.require_context()?;
                let index = self.pop_input_index(&context)?;
                self.push(context.input_bytecode(index).into_bytes());
                Ok(())
            }
            OP_INPUTSEQUENCENUMBER => {
                let context = self.require_context()?;
                let index = self.pop_input_index(&context)?;
                self.push_num(context.input_sequence(index) as i64);
                Ok(())
            }

            // Per-output introspection
            OP_OUTPUTVALUE => {
                let context = self.require_context()?;
                let index = self.pop_output_index(&context)?;
                self.push_num(context.output_value(index));
                Ok(())
            }
            OP_OUTPUTBYTECODE => {
                let context = self.require_context()?;
                let index = self.pop_output_index(&context)?;
                self.push(context.output_bytecode(index).into_bytes());
                Ok(())
            }

            // State separator queries
            OP_STATESEPARATORINDEX_UTXO => {
                let context = self.require_context()?;
                let index = self.pop_input_index(&context)?;
                self.push_num(context.state_separator_index_utxo(index) as i64);
                Ok(())
            }
            OP_STATESEPARATORINDEX_OUTPUT => {
                let context = self.require_context()?;
                let index = self.pop_output_index(&context)?;
                self.push_num(context.state_separator_index_output(index) as i64);
                Ok(())
            }
            OP_CODESCRIPTBYTECODE_UTXO => {
                let context = self.require_context()?;
                let index = self.pop_input_index(&context)?;
                self.push(context.code_script_utxo(index).into_bytes());
                Ok(())
            }
            OP_CODESCRIPTBYTECODE_OUTPUT => {
                let context = self.require_context()?;
                let index = self.pop_output_index(&context)?;
                self.push(context.code_script_output(index).into_bytes());
                Ok(())
            }
            OP_STATESCRIPTBYTECODE_UTXO => {
                let context = self.require_context()?;
                let index = self.pop_input_index(&context)?;
                self.push(context.state_script_utxo(index).into_bytes());
                Ok(())
            }
            OP_STATESCRIPTBYTECODE_OUTPUT => {
                let context = self.require_context()?;
                let index = self.pop_output_index(&context)?;
                self.push(context.state_script_output(index).into_bytes());
                Ok(())
            }

            // Reference declarations (validated after execution)
            OP_PUSHINPUTREF => {
                let reference = Self::operand_reference(operand)?;
                self.state_mut().push_refs.insert(reference);
                self.push(reference.to_vec());
                Ok(())
            }
            OP_PUSHINPUTREFSINGLETON => {
                let reference = Self::operand_reference(operand)?;
                self.state_mut().singleton_refs.insert(reference);
                self.push(reference.to_vec());
                Ok(())
            }
            OP_REQUIREINPUTREF => {
                Self::operand_reference(operand)?;
                let reference = self.pop_reference()?;
                self.state_mut().require_refs.insert(reference);
                Ok(())
            }
            OP_DISALLOWPUSHINPUTREF => {
                let reference = Self::operand_reference(operand)?;
                self.state_mut().disallow_refs.insert(reference);
                Ok(())
            }
            OP_DISALLOWPUSHINPUTREFSIBLING => {
                let reference = Self::operand_reference(operand)?;
                self.state_mut().disallow_sibling_refs.insert(reference);
                Ok(())
            }

            // Reference summary queries
            OP_REFVALUESUM_UTXOS => {
                let context = self.require_context()?;
                let reference = self.pop_reference()?;
                self.push_num(context.ref_value_sum_utxos(&reference));
                Ok(())
            }
            OP_REFVALUESUM_OUTPUTS => {
                let context = self.require_context()?;
                let reference = self.pop_reference()?;
                self.push_num(context.ref_value_sum_outputs(&reference));
                Ok(())
            }
            OP_REFOUTPUTCOUNT_UTXOS => {
                let context = self.require_context()?;
                let reference = self.pop_reference()?;
                self.push_num(context.ref_count_utxos(&reference) as i64);
                Ok(())
            }
            OP_REFOUTPUTCOUNT_OUTPUTS => {
                let context = self.require_context()?;
                let reference = self.pop_reference()?;
                self.push_num(context.ref_count_outputs(&reference) as i64);
                Ok(())
            }
            OP_REFOUTPUTCOUNTZEROVALUED_UTXOS => {
                let context = self.require_context()?;
                let reference = self.pop_reference()?;
                self.push_num(context.ref_zero_valued_count_utxos(&reference) as i64);
                Ok(())
            }
            OP_REFOUTPUTCOUNTZEROVALUED_OUTPUTS => {
                let context = self.require_context()?;
                let reference = self.pop_reference()?;
                self.push_num(context.ref_zero_valued_count_outputs(&reference) as i64);
                Ok(())
            }
            OP_REFHASHVALUESUM_UTXOS => {
                let context = self.require_context()?;
                let hash = self.pop_hash32()?;
                self.push_num(context.ref_hash_value_sum_utxos(&hash));
                Ok(())
            }
            OP_REFHASHVALUESUM_OUTPUTS => {
                let context = self.require_context()?;
                let hash = self.pop_hash32()?;
                self.push_num(context.ref_hash_value_sum_outputs(&hash));
                Ok(())
            }
            OP_REFHASHDATASUMMARY_UTXO => {
                let context = self.require_context()?;
                let index = self.pop_input_index(&context)?;
                self.push(context.ref_hash_data_summary_utxo(index).to_vec());
                Ok(())
            }
            OP_REFHASHDATASUMMARY_OUTPUT => {
                let context = self.require_context()?;
                let index = self.pop_output_index(&context)?;
                self.push(context.ref_hash_data_summary_output(index).to_vec());
                Ok(())
            }
            OP_REFDATASUMMARY_UTXO => {
                let context = self.require_context()?;
                let index = self.pop_input_index(&context)?;
                self.push(context.ref_data_summary_utxo(index));
                Ok(())
            }
            OP_REFDATASUMMARY_OUTPUT => {
                let context = self.require_context()?;
                let index = self.pop_output_index(&context)?;
                self.push(context.ref_data_summary_output(index));
                Ok(())
            }
            OP_REFTYPE_UTXO => {
                let context = self.require_context()?;
                let reference = self.pop_reference()?;
                self.push_num(context.ref_type_utxo(&reference));
                Ok(())
            }
            OP_REFTYPE_OUTPUT => {
                let context = self.require_context()?;
                let reference = self.pop_reference()?;
                self.push_num(context.ref_type_output(&reference));
                Ok(())
            }

            // Code-script-hash queries
            OP_CODESCRIPTHASHVALUESUM_UTXOS => {
                let context = self.require_context()?;
                let hash = self.pop_hash32()?;
                self.push_num(context.code_script_hash_value_sum_utxos(&hash));
                Ok(())
            }
            OP_CODESCRIPTHASHVALUESUM_OUTPUTS => {
                let context = self.require_context()?;
                let hash = self.pop_hash32()?;
                self.push_num(context.code_script_hash_value_sum_outputs(&hash));
                Ok(())
            }
            OP_CODESCRIPTHASHOUTPUTCOUNT_UTXOS => {
                let context = self.require_context()?;
                let hash = self.pop_hash32()?;
                self.push_num(context.code_script_hash_count_utxos(&hash) as i64);
                Ok(())
            }
            OP_CODESCRIPTHASHOUTPUTCOUNT_OUTPUTS => {
                let context = self.require_context()?;
                let hash = self.pop_hash32()?;
                self.push_num(context.code_script_hash_count_outputs(&hash) as i64);
                Ok(())
            }
            OP_CODESCRIPTHASHZEROVALUEDOUTPUTCOUNT_UTXOS => {
                let context = self.require_context()?;
                let hash = self.pop_hash32()?;
                self.push_num(context.code_script_hash_zero_valued_count_utxos(&hash) as i64);
                Ok(())
            }
            OP_CODESCRIPTHASHZEROVALUEDOUTPUTCOUNT_OUTPUTS => {
                let context = self.require_context()?;
                let hash = self.pop_hash32()?;
                self.push_num(context.code_script_hash_zero_valued_count_outputs(&hash) as i64);
                Ok(())
            }

            // Transaction state
            OP_PUSH_TX_STATE => {
                let context = self.require_context()?;
                let selector = self.pop_num()?;
                match selector {
                    0 => {
                        self.push(context.tx().txid().to_vec());
                        Ok(())
                    }
                    other => Err(ExecError::new(
                        ExecErrorCode::BadOpcode,
                        format!("undefined tx-state selector {}", other),
                    )),
                }
            }

            _ => Err(ExecError::new(
                ExecErrorCode::BadOpcode,
                format!("invalid opcode 0x{:02x}", opcode),
            )),
        }
    }
}
