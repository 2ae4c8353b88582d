// SPDX-License-Identifier: LGPL-2.1-or-later
// See Notices.txt for copyright information

//! inlining analysis
//!
//! Decides, per instruction result, whether the source-producing writer may
//! substitute the defining expression at the value's single use site or
//! must bind it to a named temporary. A result is a candidate only when it
//! has exactly one use and no name. Candidates from unsequenced
//! instructions inline freely; candidates from sequenced instructions
//! (loads, stores, calls and friends) may only be inlined when substitution
//! keeps their execution order, which is tracked with an ordered
//! pending-resolution list scanned against each instruction's operands from
//! the right.
//!
//! The disassembler deliberately ignores all of this; only the writer path
//! consumes it.

use crate::block::Block;
use crate::global_state::IdRef;
use crate::instructions::{Inst, InstData};
use crate::module::Module;
use crate::values::{Usage, Value, ValueUse};
use hashbrown::{HashMap, HashSet};

/// every use of every value in a module, collected in one deterministic
/// traversal
#[derive(Debug, Default)]
pub struct UseCounts<'g> {
    usages: HashMap<IdRef<'g, Value<'g>>, Vec<Usage>>,
}

impl<'g> UseCounts<'g> {
    /// collect the uses of all values in `module`
    pub fn for_module(module: &Module<'g>) -> Self {
        let mut counts = UseCounts::default();
        let mut next_instruction = 0usize;
        let mut blocks: Vec<Block<'g>> = Vec::new();
        counts.record_insts(&module.root_block, &mut next_instruction, &mut blocks);
        for function in &module.functions {
            blocks.push(function.body);
        }
        while !blocks.is_empty() {
            let block = blocks.remove(0);
            if let Some(body) = block.body() {
                counts.record_insts(&body.instructions, &mut next_instruction, &mut blocks);
                for (operand_index, operand) in body.terminator.operands().iter().enumerate() {
                    counts.record_use(operand.value(), next_instruction, operand_index);
                }
                next_instruction += 1;
            }
        }
        counts
    }
    fn record_insts(
        &mut self,
        insts: &[Inst<'g>],
        next_instruction: &mut usize,
        blocks: &mut Vec<Block<'g>>,
    ) {
        for inst in insts {
            let instruction = *next_instruction;
            *next_instruction += 1;
            for (operand_index, operand) in inst.data.operands().iter().enumerate() {
                self.record_use(operand.value(), instruction, operand_index);
            }
            match &inst.data {
                InstData::If(if_) => {
                    blocks.push(if_.true_block);
                    if let Some(false_block) = if_.false_block {
                        blocks.push(false_block);
                    }
                }
                InstData::Loop(l) => {
                    if let Some(initializer) = l.initializer {
                        blocks.push(initializer);
                    }
                    blocks.push(l.body);
                    if let Some(continuing) = l.continuing {
                        blocks.push(continuing);
                    }
                }
                InstData::Switch(s) => {
                    for case in &s.cases {
                        blocks.push(case.block);
                    }
                }
                _ => {}
            }
        }
    }
    fn record_use(&mut self, value: IdRef<'g, Value<'g>>, instruction: usize, operand_index: usize) {
        self.usages.entry(value).or_default().push(Usage {
            instruction,
            operand_index,
        });
    }
    /// the number of uses of `value`
    pub fn count(&self, value: IdRef<'g, Value<'g>>) -> usize {
        self.usages.get(&value).map_or(0, Vec::len)
    }
    /// the recorded usages of `value`
    pub fn usages(&self, value: IdRef<'g, Value<'g>>) -> &[Usage] {
        self.usages.get(&value).map_or(&[], Vec::as_slice)
    }
}

/// the per-value inline/materialize decisions for a module
#[derive(Debug, Default)]
pub struct InlineDecisions<'g> {
    can_inline: HashSet<IdRef<'g, Value<'g>>>,
}

impl<'g> InlineDecisions<'g> {
    /// compute decisions for every block of `module`
    pub fn for_module(module: &Module<'g>, uses: &UseCounts<'g>) -> Self {
        let mut decisions = InlineDecisions::default();
        let mut blocks: Vec<Block<'g>> = Vec::new();
        for function in &module.functions {
            blocks.push(function.body);
        }
        while let Some(block) = blocks.pop() {
            decisions.mark_block(block, uses);
            if let Some(body) = block.body() {
                for inst in &body.instructions {
                    match &inst.data {
                        InstData::If(if_) => {
                            blocks.push(if_.true_block);
                            blocks.extend(if_.false_block);
                        }
                        InstData::Loop(l) => {
                            blocks.extend(l.initializer);
                            blocks.push(l.body);
                            blocks.extend(l.continuing);
                        }
                        InstData::Switch(s) => {
                            blocks.extend(s.cases.iter().map(|case| case.block));
                        }
                        _ => {}
                    }
                }
            }
        }
        decisions
    }

    /// run the pending-resolution scan over one block, adding its
    /// inlinable results
    pub fn mark_block(&mut self, block: Block<'g>, uses: &UseCounts<'g>) {
        let body = match block.body() {
            Some(body) => body,
            None => return,
        };
        // an ordered list of possibly-inlinable values returned by
        // sequenced instructions that have not yet been marked-for or
        // ruled-out-for inlining
        let mut pending_resolution: Vec<IdRef<'g, Value<'g>>> = Vec::new();

        let scan_operands = |pending_resolution: &mut Vec<IdRef<'g, Value<'g>>>,
                             can_inline: &mut HashSet<IdRef<'g, Value<'g>>>,
                             operands: &[ValueUse<'g>],
                             sequenced: &mut bool| {
            // walk the operands starting with the right-most
            for operand in operands.iter().rev() {
                let value = operand.value();
                if let Some(position) = pending_resolution.iter().position(|&v| v == value) {
                    if position + 1 == pending_resolution.len() {
                        // the most recent pending sequenced value; inlining
                        // it here keeps the sequencing order
                        pending_resolution.pop();
                        can_inline.insert(value);
                        *sequenced = true;
                    } else {
                        // inlining would reorder it past the values pushed
                        // after it; it and everything pending before it
                        // must become named temporaries
                        pending_resolution.drain(0..=position);
                    }
                }
            }
        };

        for inst in &body.instructions {
            let mut sequenced = inst.data.is_sequenced();
            scan_operands(
                &mut pending_resolution,
                &mut self.can_inline,
                &inst.data.operands(),
                &mut sequenced,
            );

            let results = inst.data.result_values();
            if results.len() == 1 {
                let result = results[0];
                if uses.count(result) == 1 && result.name.get().is_empty() {
                    if sequenced {
                        pending_resolution.push(result);
                    } else {
                        self.can_inline.insert(result);
                    }
                    continue;
                }
            }

            // the results (if any) were ruled out for inlining
            if sequenced {
                pending_resolution.clear();
            }
        }

        let mut sequenced = false;
        scan_operands(
            &mut pending_resolution,
            &mut self.can_inline,
            &body.terminator.operands(),
            &mut sequenced,
        );
    }

    /// `true` if the writer may substitute `value`'s defining expression at
    /// its single use site
    pub fn can_inline(&self, value: IdRef<'g, Value<'g>>) -> bool {
        self.can_inline.contains(&value)
    }
}

#[cfg(test)]
mod tests {
    use super::{InlineDecisions, UseCounts};
    use crate::instructions::{Binary, BinaryOp, Inst, Load, Store, Terminator, Var};
    use crate::types::{Access, AddressSpace};
    use crate::values::{ValueDefinition, ValueUse};
    use crate::{Function, FunctionKind, GlobalState, Module, Type};

    #[test]
    fn test_single_use_inlines_multi_use_materializes() {
        let global_state = GlobalState::new();
        let global_state = &global_state;
        let i32_ty = Type::i32(global_state);
        let param = ValueDefinition::new(i32_ty, "p", global_state);
        let param_use = ValueUse::new(param.value());
        let function = Function::new(
            "f",
            vec![param],
            i32_ty,
            FunctionKind::Ordinary,
            global_state,
        );
        let sum = ValueDefinition::new(i32_ty, "", global_state);
        let sum_value = sum.value();
        let product = ValueDefinition::new(i32_ty, "", global_state);
        let product_value = product.value();
        function
            .body
            .set_body(
                vec![
                    Inst::without_location(Binary {
                        op: BinaryOp::Add,
                        operands: [param_use, ValueUse::from_const(1i32, global_state)],
                        result: sum,
                    }),
                    // the sum is used twice, so it must be materialized
                    Inst::without_location(Binary {
                        op: BinaryOp::Multiply,
                        operands: [ValueUse::new(sum_value), ValueUse::new(sum_value)],
                        result: product,
                    }),
                ],
                Terminator::Return {
                    value: Some(ValueUse::new(product_value)),
                },
            )
            .unwrap();
        let mut module = Module::new();
        module.functions.push(function);

        let uses = UseCounts::for_module(&module);
        assert_eq!(uses.count(sum_value), 2);
        assert_eq!(uses.count(product_value), 1);

        let decisions = InlineDecisions::for_module(&module, &uses);
        assert!(!decisions.can_inline(sum_value));
        assert!(decisions.can_inline(product_value));
    }

    #[test]
    fn test_intervening_store_blocks_inlining() {
        let global_state = GlobalState::new();
        let global_state = &global_state;
        let i32_ty = Type::i32(global_state);
        let void_ty = Type::void(global_state);
        let ptr_ty = Type::pointer(
            AddressSpace::Function,
            i32_ty,
            Access::ReadWrite,
            global_state,
        );
        let function = Function::new(
            "f",
            Vec::new(),
            void_ty,
            FunctionKind::Ordinary,
            global_state,
        );
        let var = Var {
            initializer: Some(ValueUse::from_const(0i32, global_state)),
            binding_point: None,
            result: ValueDefinition::new(ptr_ty, "v", global_state),
        };
        let pointer = var.result.value();
        let loaded = ValueDefinition::new(i32_ty, "", global_state);
        let loaded_value = loaded.value();
        let sum = ValueDefinition::new(i32_ty, "", global_state);
        let sum_value = sum.value();
        function
            .body
            .set_body(
                vec![
                    Inst::without_location(var),
                    Inst::without_location(Load {
                        pointer: ValueUse::new(pointer),
                        result: loaded,
                    }),
                    // this store must not be reordered past the load above,
                    // so the load cannot be inlined into the add below
                    Inst::without_location(Store {
                        pointer: ValueUse::new(pointer),
                        value: ValueUse::from_const(7i32, global_state),
                    }),
                    Inst::without_location(Binary {
                        op: BinaryOp::Add,
                        operands: [
                            ValueUse::new(loaded_value),
                            ValueUse::from_const(1i32, global_state),
                        ],
                        result: sum,
                    }),
                    Inst::without_location(Store {
                        pointer: ValueUse::new(pointer),
                        value: ValueUse::new(sum_value),
                    }),
                ],
                Terminator::Return { value: None },
            )
            .unwrap();
        let mut module = Module::new();
        module.functions.push(function);

        let uses = UseCounts::for_module(&module);
        let decisions = InlineDecisions::for_module(&module, &uses);
        assert!(!decisions.can_inline(loaded_value));
        // the add itself is unsequenced and single-use; it still inlines
        assert!(decisions.can_inline(sum_value));
    }

    #[test]
    fn test_chained_sequenced_loads_inline() {
        let global_state = GlobalState::new();
        let global_state = &global_state;
        let i32_ty = Type::i32(global_state);
        let void_ty = Type::void(global_state);
        let ptr_ty = Type::pointer(
            AddressSpace::Function,
            i32_ty,
            Access::ReadWrite,
            global_state,
        );
        let function = Function::new(
            "f",
            Vec::new(),
            void_ty,
            FunctionKind::Ordinary,
            global_state,
        );
        let var = Var {
            initializer: Some(ValueUse::from_const(0i32, global_state)),
            binding_point: None,
            result: ValueDefinition::new(ptr_ty, "v", global_state),
        };
        let pointer = var.result.value();
        let loaded = ValueDefinition::new(i32_ty, "", global_state);
        let loaded_value = loaded.value();
        let sum = ValueDefinition::new(i32_ty, "", global_state);
        let sum_value = sum.value();
        function
            .body
            .set_body(
                vec![
                    Inst::without_location(var),
                    Inst::without_location(Load {
                        pointer: ValueUse::new(pointer),
                        result: loaded,
                    }),
                    Inst::without_location(Binary {
                        op: BinaryOp::Add,
                        operands: [
                            ValueUse::new(loaded_value),
                            ValueUse::from_const(1i32, global_state),
                        ],
                        result: sum,
                    }),
                    Inst::without_location(Store {
                        pointer: ValueUse::new(pointer),
                        value: ValueUse::new(sum_value),
                    }),
                ],
                Terminator::Return { value: None },
            )
            .unwrap();
        let mut module = Module::new();
        module.functions.push(function);

        let uses = UseCounts::for_module(&module);
        let decisions = InlineDecisions::for_module(&module, &uses);
        // load -> add -> store chains keep their order when substituted
        assert!(decisions.can_inline(loaded_value));
        assert!(decisions.can_inline(sum_value));

        // the analysis is deterministic: a second run decides identically
        let uses_again = UseCounts::for_module(&module);
        let decisions_again = InlineDecisions::for_module(&module, &uses_again);
        for value in [pointer, loaded_value, sum_value] {
            assert_eq!(
                decisions.can_inline(value),
                decisions_again.can_inline(value)
            );
        }
    }
}
