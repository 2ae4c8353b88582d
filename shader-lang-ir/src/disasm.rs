// SPDX-License-Identifier: LGPL-2.1-or-later
// See Notices.txt for copyright information

//! the disassembler
//!
//! Renders a module as deterministic, complete text: every instruction on
//! its own line, every result named, `%bN` block labels assigned in
//! traversal order. Unlike the source-producing writer, no inlining is
//! applied here; disassembly favors debuggability over readability.

use crate::block::Block;
use crate::debug::Location;
use crate::function::{Function, FunctionKind, PipelineStage};
use crate::global_state::Interned;
use crate::instructions::{CallTarget, CaseSelector, Inst, InstData, Terminator};
use crate::module::Module;
use crate::text::{ToText, ToTextState};
use crate::values::{ValueDefinition, ValueUse};
use std::fmt;

const SWIZZLE_LETTERS: [char; 4] = ['x', 'y', 'z', 'w'];

/// render `module` as deterministic disassembly text
pub fn disassemble(module: &Module) -> String {
    module.display().to_string()
}

/// the object form of the disassembler: the rendered text plus the source
/// locations of each instruction, in the same traversal order the text was
/// produced in. The location table is a side channel; it never changes the
/// instruction stream itself.
#[derive(Debug)]
pub struct Disassembler<'g> {
    text: String,
    locations: Vec<Option<Interned<'g, Location<'g>>>>,
}

impl<'g> Disassembler<'g> {
    /// disassemble `module`
    pub fn new(module: &Module<'g>) -> Self {
        let mut locations = Vec::new();
        fn collect<'g>(
            insts: &[Inst<'g>],
            locations: &mut Vec<Option<Interned<'g, Location<'g>>>>,
        ) {
            for inst in insts {
                locations.push(inst.location);
                match &inst.data {
                    InstData::If(if_) => {
                        collect_block(Some(if_.true_block), locations);
                        collect_block(if_.false_block, locations);
                    }
                    InstData::Loop(l) => {
                        collect_block(l.initializer, locations);
                        collect_block(Some(l.body), locations);
                        collect_block(l.continuing, locations);
                    }
                    InstData::Switch(s) => {
                        for case in &s.cases {
                            collect_block(Some(case.block), locations);
                        }
                    }
                    _ => {}
                }
            }
        }
        fn collect_block<'g>(
            block: Option<Block<'g>>,
            locations: &mut Vec<Option<Interned<'g, Location<'g>>>>,
        ) {
            if let Some(block) = block {
                if let Some(body) = block.body() {
                    collect(&body.instructions, locations);
                }
            }
        }
        collect(&module.root_block, &mut locations);
        for function in &module.functions {
            collect_block(Some(function.body), &mut locations);
        }
        Disassembler {
            text: disassemble(module),
            locations,
        }
    }
    /// the rendered text
    pub fn text(&self) -> &str {
        &self.text
    }
    /// the source location of the `index`th instruction in traversal order
    /// (the order instruction lines appear in the text), if known
    pub fn instruction_location(&self, index: usize) -> Option<Interned<'g, Location<'g>>> {
        self.locations.get(index).copied().flatten()
    }
    /// the number of instructions in the module
    pub fn instruction_count(&self) -> usize {
        self.locations.len()
    }
}

impl<'g> ToText<'g> for Module<'g> {
    fn to_text(&self, state: &mut ToTextState<'g, '_>) -> fmt::Result {
        writeln!(state, "module {{")?;
        state.indent(|state| {
            for inst in &self.root_block {
                inst.to_text(state)?;
                writeln!(state)?;
            }
            for function in &self.functions {
                function.to_text(state)?;
                writeln!(state)?;
            }
            Ok(())
        })?;
        write!(state, "}}")
    }
}

impl<'g> ToText<'g> for Function<'g> {
    fn to_text(&self, state: &mut ToTextState<'g, '_>) -> fmt::Result {
        write!(state, "fn {}(", self.name)?;
        let mut first = true;
        for param in &self.params {
            if !std::mem::replace(&mut first, false) {
                write!(state, ", ")?;
            }
            definition_to_text(param, state)?;
        }
        write!(state, ") -> {}", self.return_type)?;
        if let FunctionKind::EntryPoint {
            stage,
            workgroup_size,
        } = self.kind
        {
            match stage {
                PipelineStage::Vertex => write!(state, " @vertex")?,
                PipelineStage::Fragment => write!(state, " @fragment")?,
                PipelineStage::Compute => write!(state, " @compute")?,
            }
            if let Some([x, y, z]) = workgroup_size {
                write!(state, " @workgroup_size({}, {}, {})", x, y, z)?;
            }
        }
        writeln!(state, " {{")?;
        state.indent(|state| block_to_text(self.body, state))?;
        write!(state, "}}")
    }
}

impl_display_as_to_text!(<'g> Function<'g>);

fn definition_to_text<'g>(
    definition: &ValueDefinition<'g>,
    state: &mut ToTextState<'g, '_>,
) -> fmt::Result {
    let text = state.value_text(definition.value());
    write!(state, "{} : {}", text, definition.value().value_type)
}

fn use_to_text<'g>(use_: &ValueUse<'g>, state: &mut ToTextState<'g, '_>) -> fmt::Result {
    let text = state.value_text(use_.value());
    write!(state, "{}", text)
}

fn use_list_to_text<'g>(
    uses: &[ValueUse<'g>],
    leading_comma: bool,
    state: &mut ToTextState<'g, '_>,
) -> fmt::Result {
    let mut first = !leading_comma;
    for use_ in uses {
        if !std::mem::replace(&mut first, false) {
            write!(state, ", ")?;
        }
        use_to_text(use_, state)?;
    }
    Ok(())
}

/// the `%1 : ty = ` prefix for instruction results; parenthesized when an
/// instruction has several results, absent when it has none
fn results_prefix_to_text<'g>(
    results: &[ValueDefinition<'g>],
    state: &mut ToTextState<'g, '_>,
) -> fmt::Result {
    match results {
        [] => Ok(()),
        [result] => {
            definition_to_text(result, state)?;
            write!(state, " = ")
        }
        results => {
            write!(state, "(")?;
            let mut first = true;
            for result in results {
                if !std::mem::replace(&mut first, false) {
                    write!(state, ", ")?;
                }
                definition_to_text(result, state)?;
            }
            write!(state, ") = ")
        }
    }
}

/// print a block: its label, parameters, instructions and terminator
fn block_to_text<'g>(block: Block<'g>, state: &mut ToTextState<'g, '_>) -> fmt::Result {
    let label = state.block_label(block);
    write!(state, "{}", label)?;
    if !block.params.is_empty() {
        write!(state, " (")?;
        let mut first = true;
        for param in &block.params {
            if !std::mem::replace(&mut first, false) {
                write!(state, ", ")?;
            }
            definition_to_text(param, state)?;
        }
        write!(state, ")")?;
    }
    writeln!(state, " {{")?;
    state.indent(|state| match block.body() {
        Some(body) => {
            for inst in &body.instructions {
                inst.to_text(state)?;
                writeln!(state)?;
            }
            body.terminator.to_text(state)?;
            writeln!(state)
        }
        None => writeln!(state, "<unsealed>"),
    })?;
    writeln!(state, "}}")
}

impl<'g> ToText<'g> for Inst<'g> {
    fn to_text(&self, state: &mut ToTextState<'g, '_>) -> fmt::Result {
        self.data.to_text(state)
    }
}

impl<'g> ToText<'g> for InstData<'g> {
    fn to_text(&self, state: &mut ToTextState<'g, '_>) -> fmt::Result {
        match self {
            InstData::Unary(v) => {
                definition_to_text(&v.result, state)?;
                write!(state, " = {} ", v.op.text())?;
                use_to_text(&v.operand, state)
            }
            InstData::Binary(v) => {
                definition_to_text(&v.result, state)?;
                write!(state, " = {} ", v.op.text())?;
                use_to_text(&v.operands[0], state)?;
                write!(state, ", ")?;
                use_to_text(&v.operands[1], state)
            }
            InstData::Access(v) => {
                definition_to_text(&v.result, state)?;
                write!(state, " = access ")?;
                use_to_text(&v.base, state)?;
                use_list_to_text(&v.indices, true, state)
            }
            InstData::Load(v) => {
                definition_to_text(&v.result, state)?;
                write!(state, " = load ")?;
                use_to_text(&v.pointer, state)
            }
            InstData::Store(v) => {
                write!(state, "store ")?;
                use_to_text(&v.pointer, state)?;
                write!(state, ", ")?;
                use_to_text(&v.value, state)
            }
            InstData::LoadVectorElement(v) => {
                definition_to_text(&v.result, state)?;
                write!(state, " = load_vector_element ")?;
                use_to_text(&v.pointer, state)?;
                write!(state, ", ")?;
                use_to_text(&v.index, state)
            }
            InstData::StoreVectorElement(v) => {
                write!(state, "store_vector_element ")?;
                use_to_text(&v.pointer, state)?;
                write!(state, ", ")?;
                use_to_text(&v.index, state)?;
                write!(state, ", ")?;
                use_to_text(&v.value, state)
            }
            InstData::Var(v) => {
                definition_to_text(&v.result, state)?;
                write!(state, " = var")?;
                if let Some(initializer) = &v.initializer {
                    write!(state, " ")?;
                    use_to_text(initializer, state)?;
                }
                if let Some(binding_point) = v.binding_point {
                    write!(
                        state,
                        " @binding_point({}, {})",
                        binding_point.group, binding_point.binding
                    )?;
                }
                Ok(())
            }
            InstData::Let(v) => {
                definition_to_text(&v.result, state)?;
                write!(state, " = let ")?;
                use_to_text(&v.value, state)
            }
            InstData::Call(v) => {
                definition_to_text(&v.result, state)?;
                match &v.target {
                    CallTarget::Function(function) => {
                        write!(state, " = call %{}", function.name)?;
                        use_list_to_text(&v.arguments, true, state)
                    }
                    CallTarget::Builtin(builtin) => {
                        write!(state, " = {} ", builtin.text())?;
                        use_list_to_text(&v.arguments, false, state)
                    }
                }
            }
            InstData::Construct(v) => {
                definition_to_text(&v.result, state)?;
                write!(state, " = construct")?;
                if !v.arguments.is_empty() {
                    write!(state, " ")?;
                    use_list_to_text(&v.arguments, false, state)?;
                }
                Ok(())
            }
            InstData::Convert(v) => {
                definition_to_text(&v.result, state)?;
                write!(state, " = convert ")?;
                use_to_text(&v.argument, state)
            }
            InstData::Bitcast(v) => {
                definition_to_text(&v.result, state)?;
                write!(state, " = bitcast ")?;
                use_to_text(&v.argument, state)
            }
            InstData::Swizzle(v) => {
                definition_to_text(&v.result, state)?;
                write!(state, " = swizzle ")?;
                use_to_text(&v.vector, state)?;
                write!(state, ", ")?;
                for &index in &v.indices {
                    write!(state, "{}", SWIZZLE_LETTERS[index as usize])?;
                }
                Ok(())
            }
            InstData::Discard(_) => write!(state, "discard"),
            InstData::If(v) => {
                results_prefix_to_text(&v.results, state)?;
                write!(state, "if ")?;
                use_to_text(&v.condition, state)?;
                let true_label = state.block_label(v.true_block);
                write!(state, " [t: {}", true_label)?;
                if let Some(false_block) = v.false_block {
                    let false_label = state.block_label(false_block);
                    write!(state, ", f: {}", false_label)?;
                }
                writeln!(state, "] {{")?;
                state.indent(|state| {
                    block_to_text(v.true_block, state)?;
                    if let Some(false_block) = v.false_block {
                        block_to_text(false_block, state)?;
                    }
                    Ok(())
                })?;
                write!(state, "}}")
            }
            InstData::Loop(v) => {
                results_prefix_to_text(&v.results, state)?;
                write!(state, "loop [")?;
                let mut first = true;
                if let Some(initializer) = v.initializer {
                    let label = state.block_label(initializer);
                    write!(state, "i: {}", label)?;
                    first = false;
                }
                let body_label = state.block_label(v.body);
                if !std::mem::replace(&mut first, false) {
                    write!(state, ", ")?;
                }
                write!(state, "b: {}", body_label)?;
                if let Some(continuing) = v.continuing {
                    let label = state.block_label(continuing);
                    write!(state, ", c: {}", label)?;
                }
                writeln!(state, "] {{")?;
                state.indent(|state| {
                    if let Some(initializer) = v.initializer {
                        block_to_text(initializer, state)?;
                    }
                    block_to_text(v.body, state)?;
                    if let Some(continuing) = v.continuing {
                        block_to_text(continuing, state)?;
                    }
                    Ok(())
                })?;
                write!(state, "}}")
            }
            InstData::Switch(v) => {
                results_prefix_to_text(&v.results, state)?;
                write!(state, "switch ")?;
                use_to_text(&v.condition, state)?;
                write!(state, " [")?;
                let mut first = true;
                for case in &v.cases {
                    if !std::mem::replace(&mut first, false) {
                        write!(state, ", ")?;
                    }
                    write!(state, "c: (")?;
                    for selector in &case.selectors {
                        match selector {
                            CaseSelector::Value(value) => write!(state, "{}, ", value)?,
                            CaseSelector::Default => write!(state, "default, ")?,
                        }
                    }
                    let label = state.block_label(case.block);
                    write!(state, "{})", label)?;
                }
                writeln!(state, "] {{")?;
                state.indent(|state| {
                    for case in &v.cases {
                        block_to_text(case.block, state)?;
                    }
                    Ok(())
                })?;
                write!(state, "}}")
            }
        }
    }
}

impl<'g> ToText<'g> for Terminator<'g> {
    fn to_text(&self, state: &mut ToTextState<'g, '_>) -> fmt::Result {
        match self {
            Terminator::Return { value } => {
                write!(state, "return")?;
                if let Some(value) = value {
                    write!(state, " ")?;
                    use_to_text(value, state)?;
                }
                Ok(())
            }
            Terminator::ExitIf { arguments, .. }
            | Terminator::ExitSwitch { arguments, .. }
            | Terminator::ExitLoop { arguments, .. }
            | Terminator::Continue { arguments, .. }
            | Terminator::NextIteration { arguments, .. } => {
                write!(state, "{}", self.text())?;
                if !arguments.is_empty() {
                    write!(state, " ")?;
                    use_list_to_text(arguments, false, state)?;
                }
                Ok(())
            }
            Terminator::BreakIf { condition, .. } => {
                write!(state, "break_if ")?;
                use_to_text(condition, state)
            }
            Terminator::Unreachable => write!(state, "unreachable"),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::instructions::{Binary, BinaryOp, IfData, Var};
    use crate::prelude::*;
    use crate::types::{Access, AddressSpace};
    use crate::values::{ValueDefinition, ValueUse};
    use crate::GlobalState;
    use crate::{FunctionKind, Module, Type};
    use crate::global_state::Allocate;

    #[test]
    fn test_disassemble_function() {
        let global_state = GlobalState::new();
        let global_state = &global_state;
        let i32_ty = Type::i32(global_state);

        let param = ValueDefinition::new(i32_ty, "p", global_state);
        let param_value = param.value();
        let function = Function::new(
            "add_one",
            vec![param],
            i32_ty,
            FunctionKind::Ordinary,
            global_state,
        );
        let result = ValueDefinition::new(i32_ty, "", global_state);
        let result_value = result.value();
        let add = Inst::without_location(Binary {
            op: BinaryOp::Add,
            operands: [
                ValueUse::new(param_value),
                ValueUse::from_const(1i32, global_state),
            ],
            result,
        });
        function
            .body
            .set_body(
                vec![add],
                Terminator::Return {
                    value: Some(ValueUse::new(result_value)),
                },
            )
            .unwrap();
        let mut module = Module::new();
        module.functions.push(function);

        let expected = concat!(
            "module {\n",
            "    fn add_one(%p : i32) -> i32 {\n",
            "        %b1 {\n",
            "            %1 : i32 = add %p, 1i\n",
            "            return %1\n",
            "        }\n",
            "    }\n",
            "}",
        );
        assert_eq!(super::disassemble(&module), expected);
        // stable across repeated runs
        assert_eq!(super::disassemble(&module), expected);
    }

    #[test]
    fn test_disassemble_if_and_var() {
        let global_state = GlobalState::new();
        let global_state = &global_state;
        let bool_ty = Type::bool(global_state);
        let i32_ty = Type::i32(global_state);
        let void_ty = Type::void(global_state);
        let ptr_ty = Type::pointer(
            AddressSpace::Function,
            i32_ty,
            Access::ReadWrite,
            global_state,
        );

        let cond = ValueDefinition::new(bool_ty, "c", global_state);
        let cond_value = cond.value();
        let function = Function::new(
            "main",
            vec![cond],
            void_ty,
            FunctionKind::Ordinary,
            global_state,
        );

        let var = Var {
            initializer: Some(ValueUse::from_const(0i32, global_state)),
            binding_point: None,
            result: ValueDefinition::new(ptr_ty, "v", global_state),
        };
        let var_pointer = var.result.value();

        let true_block = BlockData::new(global_state);
        let false_block = BlockData::new(global_state);
        let if_data = global_state.alloc(IfData {
            condition: ValueUse::new(cond_value),
            true_block,
            false_block: Some(false_block),
            results: Vec::new(),
        });
        true_block
            .set_body(
                vec![Inst::without_location(crate::instructions::Store {
                    pointer: ValueUse::new(var_pointer),
                    value: ValueUse::from_const(1i32, global_state),
                })],
                Terminator::ExitIf {
                    target: IfRef::new(if_data),
                    arguments: Vec::new(),
                },
            )
            .unwrap();
        false_block
            .set_body(
                Vec::new(),
                Terminator::ExitIf {
                    target: IfRef::new(if_data),
                    arguments: Vec::new(),
                },
            )
            .unwrap();
        function
            .body
            .set_body(
                vec![
                    Inst::without_location(var),
                    Inst::without_location(if_data),
                ],
                Terminator::Return { value: None },
            )
            .unwrap();
        let mut module = Module::new();
        module.functions.push(function);

        let expected = concat!(
            "module {\n",
            "    fn main(%c : bool) -> void {\n",
            "        %b1 {\n",
            "            %v : ptr<function, i32, read_write> = var 0i\n",
            "            if %c [t: %b2, f: %b3] {\n",
            "                %b2 {\n",
            "                    store %v, 1i\n",
            "                    exit_if\n",
            "                }\n",
            "                %b3 {\n",
            "                    exit_if\n",
            "                }\n",
            "            }\n",
            "            return\n",
            "        }\n",
            "    }\n",
            "}",
        );
        assert_eq!(super::disassemble(&module), expected);
    }
}
