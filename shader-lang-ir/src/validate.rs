// SPDX-License-Identifier: LGPL-2.1-or-later
// See Notices.txt for copyright information

//! the validator
//!
//! Checks a built module for structural and dataflow consistency before any
//! pass or backend consumes it. Each failed check reports one diagnostic
//! and checking continues where that is safe; only a structurally broken
//! block (one that was never sealed) stops traversal of that block, since
//! its contents cannot be walked.

use crate::block::Block;
use crate::debug::Location;
use crate::diag::Diagnostics;
use crate::function::FunctionData;
use crate::global_state::{GlobalState, IdRef, Internable, Interned};
use crate::instructions::{
    Access, Binary, BinaryOp, Bitcast, BuiltinFn, Call, CallTarget, CaseSelector, Construct,
    Convert, IfData, Inst, InstData, Let, Load, LoadVectorElement, LoopData, Store,
    StoreVectorElement, SwitchData, Swizzle, Terminator, Unary, UnaryOp, Var,
};
use crate::module::Module;
use crate::types::Type;
use crate::values::{Value, ValueDefinition, ValueUse};
use hashbrown::HashSet;

/// check that `module` is internally consistent.
///
/// `global_state` must be the state the module was built against; it is
/// needed to intern types derived while re-walking access chains.
pub fn validate<'g>(
    module: &Module<'g>,
    global_state: &'g GlobalState<'g>,
) -> Result<(), Diagnostics<'g>> {
    let mut validator = Validator {
        global_state,
        diagnostics: Diagnostics::new(),
        scopes: Vec::new(),
        defined: HashSet::new(),
        visited_blocks: HashSet::new(),
        control_stack: Vec::new(),
        current_function: None,
        module_functions: module.functions.iter().map(|f| f.value()).collect(),
    };
    validator.module(module);
    if validator.diagnostics.is_empty() {
        Ok(())
    } else {
        Err(validator.diagnostics)
    }
}

#[derive(Copy, Clone, Eq, PartialEq)]
enum LoopRegion {
    Initializer,
    Body,
    Continuing,
}

#[derive(Copy, Clone)]
enum ControlItem<'g> {
    If(IdRef<'g, IfData<'g>>),
    Switch(IdRef<'g, SwitchData<'g>>),
    Loop {
        target: IdRef<'g, LoopData<'g>>,
        region: LoopRegion,
    },
}

/// where a block sits in its owner, which decides the terminators and
/// parameters it may have
#[derive(Copy, Clone)]
enum BlockPos<'g> {
    FunctionBody,
    IfBranch,
    SwitchCase,
    LoopInitializer,
    LoopBody,
    LoopContinuing(IdRef<'g, LoopData<'g>>),
}

struct Validator<'g> {
    global_state: &'g GlobalState<'g>,
    diagnostics: Diagnostics<'g>,
    scopes: Vec<HashSet<IdRef<'g, Value<'g>>>>,
    defined: HashSet<IdRef<'g, Value<'g>>>,
    visited_blocks: HashSet<Block<'g>>,
    control_stack: Vec<ControlItem<'g>>,
    current_function: Option<IdRef<'g, FunctionData<'g>>>,
    module_functions: HashSet<IdRef<'g, FunctionData<'g>>>,
}

impl<'g> Validator<'g> {
    fn error(&mut self, message: impl Into<String>, location: Option<Interned<'g, Location<'g>>>) {
        self.diagnostics.add_error(message, location);
    }

    fn push_scope(&mut self) {
        self.scopes.push(HashSet::new());
    }
    fn pop_scope(&mut self) {
        self.scopes.pop();
    }
    fn define(&mut self, definition: &ValueDefinition<'g>) {
        let value = definition.value();
        if !self.defined.insert(value) {
            self.error(
                format!("value {} is defined twice", describe_value(value)),
                None,
            );
            return;
        }
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(value);
        }
    }
    fn is_defined(&self, value: IdRef<'g, Value<'g>>) -> bool {
        value.const_value.get().is_some() || self.scopes.iter().any(|scope| scope.contains(&value))
    }
    fn check_operand(
        &mut self,
        operand: &ValueUse<'g>,
        location: Option<Interned<'g, Location<'g>>>,
        what: &str,
    ) {
        if !self.is_defined(operand.value()) {
            self.error(
                format!(
                    "{} operand {} is not defined at its use (definition must \
                     structurally dominate the use)",
                    what,
                    describe_value(operand.value())
                ),
                location,
            );
        }
    }

    fn module(&mut self, module: &Module<'g>) {
        // the root block holds module-scope variable declarations only
        self.push_scope();
        for inst in &module.root_block {
            match &inst.data {
                InstData::Var(var) => {
                    if let Some(initializer) = &var.initializer {
                        self.check_operand(initializer, inst.location, "var initializer");
                    }
                    self.check_var(var, inst.location);
                    self.define(&var.result);
                }
                _ => {
                    self.error(
                        "module root block may only contain var declarations",
                        inst.location,
                    );
                }
            }
        }
        for function in &module.functions {
            self.function(function.value());
        }
        self.pop_scope();
    }

    fn function(&mut self, function: IdRef<'g, FunctionData<'g>>) {
        self.current_function = Some(function);
        self.push_scope();
        for param in &function.params {
            if param.value().value_type.is_void() {
                self.error(
                    format!("function {}: parameter type may not be void", function.name),
                    None,
                );
            }
            self.define(param);
        }
        self.block(function.body, BlockPos::FunctionBody);
        self.pop_scope();
        assert!(self.control_stack.is_empty(), "unbalanced control stack");
        self.current_function = None;
    }

    /// walk a block in a fresh scope
    fn block(&mut self, block: Block<'g>, pos: BlockPos<'g>) {
        self.push_scope();
        self.block_in_current_scope(block, pos);
        self.pop_scope();
    }

    /// walk a block, defining its values into the current scope; loop
    /// validation uses this to keep initializer definitions visible in the
    /// body and body definitions visible in the continuing region
    fn block_in_current_scope(&mut self, block: Block<'g>, pos: BlockPos<'g>) {
        if !self.visited_blocks.insert(block) {
            self.error(
                "block is owned by more than one control instruction".to_string(),
                None,
            );
            return;
        }
        let params_allowed = matches!(pos, BlockPos::LoopBody | BlockPos::LoopContinuing(_));
        if !block.params.is_empty() && !params_allowed {
            self.error(
                "only loop body and continuing blocks may declare block parameters",
                None,
            );
        }
        for param in &block.params {
            self.define(param);
        }
        let body = match block.body() {
            Some(body) => body,
            None => {
                // structural violation; this block's contents cannot be
                // traversed, but sibling checks continue
                self.error("block does not end in a terminator instruction", None);
                return;
            }
        };
        for inst in &body.instructions {
            self.inst(inst);
        }
        self.terminator(&body.terminator, pos);
    }

    fn inst(&mut self, inst: &Inst<'g>) {
        let location = inst.location;
        for (index, operand) in inst.data.operands().iter().enumerate() {
            self.check_operand(operand, location, &format!("instruction (operand {})", index));
        }
        match &inst.data {
            InstData::Unary(v) => self.check_unary(v, location),
            InstData::Binary(v) => self.check_binary(v, location),
            InstData::Access(v) => self.check_access(v, location),
            InstData::Load(v) => self.check_load(v, location),
            InstData::Store(v) => self.check_store(v, location),
            InstData::LoadVectorElement(v) => self.check_load_vector_element(v, location),
            InstData::StoreVectorElement(v) => self.check_store_vector_element(v, location),
            InstData::Var(v) => self.check_var(v, location),
            InstData::Let(v) => self.check_let(v, location),
            InstData::Call(v) => self.check_call(v, location),
            InstData::Construct(v) => self.check_construct(v, location),
            InstData::Convert(v) => self.check_convert(v, location),
            InstData::Bitcast(v) => self.check_bitcast(v, location),
            InstData::Swizzle(v) => self.check_swizzle(v, location),
            InstData::Discard(_) => {}
            InstData::If(v) => {
                self.check_if(*v, location);
            }
            InstData::Loop(v) => {
                self.check_loop(*v, location);
            }
            InstData::Switch(v) => {
                self.check_switch(*v, location);
            }
        }
        // results become visible after the instruction, including after the
        // nested blocks of a control instruction
        match &inst.data {
            InstData::If(v) => {
                for result in &v.results {
                    self.define(result);
                }
            }
            InstData::Loop(v) => {
                for result in &v.results {
                    self.define(result);
                }
            }
            InstData::Switch(v) => {
                for result in &v.results {
                    self.define(result);
                }
            }
            InstData::Store(_) | InstData::StoreVectorElement(_) | InstData::Discard(_) => {}
            InstData::Unary(v) => self.define(&v.result),
            InstData::Binary(v) => self.define(&v.result),
            InstData::Access(v) => self.define(&v.result),
            InstData::Load(v) => self.define(&v.result),
            InstData::LoadVectorElement(v) => self.define(&v.result),
            InstData::Var(v) => self.define(&v.result),
            InstData::Let(v) => self.define(&v.result),
            InstData::Call(v) => self.define(&v.result),
            InstData::Construct(v) => self.define(&v.result),
            InstData::Convert(v) => self.define(&v.result),
            InstData::Bitcast(v) => self.define(&v.result),
            InstData::Swizzle(v) => self.define(&v.result),
        }
    }

    fn check_unary(&mut self, v: &Unary<'g>, location: Option<Interned<'g, Location<'g>>>) {
        let operand = v.operand.value_type();
        let valid = match v.op {
            UnaryOp::Negation => is_numeric_scalar_or_vector(operand.get()),
            UnaryOp::Complement => is_integer_scalar_or_vector(operand.get()),
            UnaryOp::Not => is_bool_scalar_or_vector(operand.get()),
        };
        if !valid {
            self.error(
                format!("{}: invalid operand type {}", v.op.text(), operand),
                location,
            );
        }
        if v.result.value().value_type != operand {
            self.error(
                format!(
                    "{}: result type {} does not match operand type {}",
                    v.op.text(),
                    v.result.value().value_type,
                    operand
                ),
                location,
            );
        }
    }

    fn check_binary(&mut self, v: &Binary<'g>, location: Option<Interned<'g, Location<'g>>>) {
        let lhs = v.operands[0].value_type();
        let rhs = v.operands[1].value_type();
        let result = v.result.value().value_type;
        let op = v.op;
        let fail = |this: &mut Self, why: &str| {
            this.error(
                format!("{}: {} (operands {}, {})", op.text(), why, lhs, rhs),
                location,
            );
        };
        if op.is_comparison() {
            if lhs != rhs {
                return fail(self, "operand types must match");
            }
            let ordered = !matches!(op, BinaryOp::Equal | BinaryOp::NotEqual);
            let operand_ok = if ordered {
                is_numeric_scalar_or_vector(lhs.get())
            } else {
                is_numeric_scalar_or_vector(lhs.get()) || is_bool_scalar_or_vector(lhs.get())
            };
            if !operand_ok {
                return fail(self, "invalid operand type");
            }
            let expected = bool_shape_of(lhs, self.global_state);
            if result != expected {
                return fail(self, "comparison result must be boolean");
            }
            return;
        }
        match op {
            BinaryOp::And | BinaryOp::Or => {
                if lhs != rhs
                    || !(is_integer_scalar_or_vector(lhs.get()) || is_bool_scalar_or_vector(lhs.get()))
                {
                    return fail(self, "operands must be matching integer or bool types");
                }
                if result != lhs {
                    return fail(self, "result type must match the operand type");
                }
            }
            BinaryOp::Xor => {
                if lhs != rhs || !is_integer_scalar_or_vector(lhs.get()) {
                    return fail(self, "operands must be matching integer types");
                }
                if result != lhs {
                    return fail(self, "result type must match the operand type");
                }
            }
            BinaryOp::ShiftLeft | BinaryOp::ShiftRight => {
                if !is_integer_scalar_or_vector(lhs.get()) {
                    return fail(self, "shifted value must be an integer type");
                }
                if !is_u32_shape_matching(lhs.get(), rhs.get()) {
                    return fail(self, "shift amount must be u32 with the same shape");
                }
                if result != lhs {
                    return fail(self, "result type must match the shifted type");
                }
            }
            BinaryOp::Add
            | BinaryOp::Subtract
            | BinaryOp::Divide
            | BinaryOp::Modulo
            | BinaryOp::Multiply => {
                let expected = arithmetic_result_type(
                    op,
                    lhs,
                    rhs,
                    self.global_state,
                );
                match expected {
                    Some(expected) => {
                        if result != expected {
                            return fail(self, "result type does not match the operand types");
                        }
                    }
                    None => return fail(self, "invalid operand types"),
                }
            }
            _ => unreachable!("comparisons are handled above"),
        }
    }

    fn check_access(&mut self, v: &Access<'g>, location: Option<Interned<'g, Location<'g>>>) {
        if v.indices.is_empty() {
            self.error("access requires at least one index", location);
            return;
        }
        let base = v.base.value_type();
        let pointer_parts = base.pointer_parts();
        let mut current = match base.pointee() {
            Some(pointee) => pointee,
            None => base,
        };
        for index in &v.indices {
            if !index.value_type().is_integer_scalar() {
                self.error(
                    format!("access index must be an integer scalar, not {}", index.value_type()),
                    location,
                );
                return;
            }
            let const_index = index
                .value()
                .const_value
                .get()
                .and_then(|c| c.get().as_integer());
            match current.indexed_type(const_index, self.global_state) {
                Some(next) => current = next,
                None => {
                    self.error(
                        format!("access does not index into type {}", current),
                        location,
                    );
                    return;
                }
            }
        }
        let expected = match pointer_parts {
            Some((space, access)) => {
                Type::pointer(space, current, access, self.global_state)
            }
            None => current,
        };
        if v.result.value().value_type != expected {
            self.error(
                format!(
                    "access result type {} does not match accessed type {}",
                    v.result.value().value_type,
                    expected
                ),
                location,
            );
        }
    }

    fn check_load(&mut self, v: &Load<'g>, location: Option<Interned<'g, Location<'g>>>) {
        match v.pointer.value_type().pointer_parts() {
            Some((_, access)) => {
                if matches!(access, crate::types::Access::Write) {
                    self.error("load through a write-only pointer", location);
                }
                let pointee = v.pointer.value_type().pointee().unwrap();
                if v.result.value().value_type != pointee {
                    self.error(
                        format!(
                            "load result type {} does not match pointee type {}",
                            v.result.value().value_type,
                            pointee
                        ),
                        location,
                    );
                }
            }
            None => self.error(
                format!("load requires a pointer operand, not {}", v.pointer.value_type()),
                location,
            ),
        }
    }

    fn check_store(&mut self, v: &Store<'g>, location: Option<Interned<'g, Location<'g>>>) {
        match v.pointer.value_type().pointer_parts() {
            Some((_, access)) => {
                if matches!(access, crate::types::Access::Read) {
                    self.error("store through a read-only pointer", location);
                }
                let pointee = v.pointer.value_type().pointee().unwrap();
                if v.value.value_type() != pointee {
                    self.error(
                        format!(
                            "store value type {} does not match pointee type {}",
                            v.value.value_type(),
                            pointee
                        ),
                        location,
                    );
                }
            }
            None => self.error(
                format!("store requires a pointer operand, not {}", v.pointer.value_type()),
                location,
            ),
        }
    }

    fn vector_pointee(
        &mut self,
        pointer: &ValueUse<'g>,
        what: &str,
        location: Option<Interned<'g, Location<'g>>>,
    ) -> Option<Interned<'g, Type<'g>>> {
        let pointee = pointer.value_type().pointee();
        let elem = pointee.and_then(|pointee| pointee.vector_parts().map(|(elem, _)| elem));
        if elem.is_none() {
            self.error(
                format!(
                    "{} requires a pointer-to-vector operand, not {}",
                    what,
                    pointer.value_type()
                ),
                location,
            );
        }
        elem
    }

    fn check_load_vector_element(
        &mut self,
        v: &LoadVectorElement<'g>,
        location: Option<Interned<'g, Location<'g>>>,
    ) {
        if !v.index.value_type().is_integer_scalar() {
            self.error("vector element index must be an integer scalar", location);
        }
        if let Some(elem) = self.vector_pointee(&v.pointer, "load_vector_element", location) {
            if v.result.value().value_type != elem {
                self.error(
                    format!(
                        "load_vector_element result type {} does not match element type {}",
                        v.result.value().value_type,
                        elem
                    ),
                    location,
                );
            }
        }
    }

    fn check_store_vector_element(
        &mut self,
        v: &StoreVectorElement<'g>,
        location: Option<Interned<'g, Location<'g>>>,
    ) {
        if !v.index.value_type().is_integer_scalar() {
            self.error("vector element index must be an integer scalar", location);
        }
        if let Some(elem) = self.vector_pointee(&v.pointer, "store_vector_element", location) {
            if v.value.value_type() != elem {
                self.error(
                    format!(
                        "store_vector_element value type {} does not match element type {}",
                        v.value.value_type(),
                        elem
                    ),
                    location,
                );
            }
        }
    }

    fn check_var(&mut self, v: &Var<'g>, location: Option<Interned<'g, Location<'g>>>) {
        match v.result.value().value_type.pointee() {
            Some(pointee) => {
                if let Some(initializer) = &v.initializer {
                    if initializer.value_type() != pointee {
                        self.error(
                            format!(
                                "var initializer type {} does not match stored type {}",
                                initializer.value_type(),
                                pointee
                            ),
                            location,
                        );
                    }
                }
            }
            None => self.error(
                format!(
                    "var result must be pointer-typed, not {}",
                    v.result.value().value_type
                ),
                location,
            ),
        }
    }

    fn check_let(&mut self, v: &Let<'g>, location: Option<Interned<'g, Location<'g>>>) {
        if v.result.value().value_type != v.value.value_type() {
            self.error(
                format!(
                    "let result type {} does not match value type {}",
                    v.result.value().value_type,
                    v.value.value_type()
                ),
                location,
            );
        }
    }

    fn check_call(&mut self, v: &Call<'g>, location: Option<Interned<'g, Location<'g>>>) {
        match &v.target {
            CallTarget::Function(function) => {
                if !self.module_functions.contains(&function.value()) {
                    self.error(
                        format!("call target {} is not a function of this module", function.name),
                        location,
                    );
                    return;
                }
                if v.arguments.len() != function.params.len() {
                    self.error(
                        format!(
                            "call to {} has {} arguments, expected {}",
                            function.name,
                            v.arguments.len(),
                            function.params.len()
                        ),
                        location,
                    );
                    return;
                }
                for (argument, param) in v.arguments.iter().zip(&function.params) {
                    if argument.value_type() != param.value().value_type {
                        self.error(
                            format!(
                                "call to {}: argument type {} does not match parameter type {}",
                                function.name,
                                argument.value_type(),
                                param.value().value_type
                            ),
                            location,
                        );
                    }
                }
                if v.result.value().value_type != function.return_type {
                    self.error(
                        format!(
                            "call to {}: result type {} does not match return type {}",
                            function.name,
                            v.result.value().value_type,
                            function.return_type
                        ),
                        location,
                    );
                }
            }
            CallTarget::Builtin(builtin) => {
                let expected = builtin_arity(*builtin);
                if v.arguments.len() != expected {
                    self.error(
                        format!(
                            "call to {} has {} arguments, expected {}",
                            builtin.text(),
                            v.arguments.len(),
                            expected
                        ),
                        location,
                    );
                }
            }
        }
    }

    fn check_construct(&mut self, v: &Construct<'g>, location: Option<Interned<'g, Location<'g>>>) {
        let result = v.result.value().value_type;
        if v.arguments.is_empty() {
            // zero-value construction is valid for any constructible type
            if result.is_void() || result.is_pointer() {
                self.error(
                    format!("cannot construct a value of type {}", result),
                    location,
                );
            }
            return;
        }
        let ok = match result.get() {
            Type::Bool | Type::Int(_) | Type::Float(_) => {
                v.arguments.len() == 1 && v.arguments[0].value_type() == result
            }
            Type::Vector { size, elem } => {
                if v.arguments.len() == 1 && v.arguments[0].value_type() == *elem {
                    true // splat
                } else {
                    let mut components = 0u32;
                    let mut valid = true;
                    for argument in &v.arguments {
                        match argument.value_type().get() {
                            ty if ty == elem.get() => components += 1,
                            Type::Vector {
                                size: arg_size,
                                elem: arg_elem,
                            } if arg_elem == elem => components += arg_size,
                            _ => valid = false,
                        }
                    }
                    valid && components == *size
                }
            }
            Type::Matrix {
                columns,
                rows,
                elem,
            } => {
                v.arguments.len() == *columns as usize
                    && v.arguments.iter().all(|argument| {
                        argument.value_type().vector_parts() == Some((*elem, *rows))
                    })
            }
            Type::Array { elem, count } => {
                v.arguments.len() == *count as usize
                    && v.arguments.iter().all(|argument| argument.value_type() == *elem)
            }
            Type::Struct { members, .. } => {
                v.arguments.len() == members.len()
                    && v.arguments
                        .iter()
                        .zip(members)
                        .all(|(argument, member)| argument.value_type() == member.ty)
            }
            Type::Void | Type::Pointer { .. } => false,
        };
        if !ok {
            self.error(
                format!("invalid arguments for construction of {}", result),
                location,
            );
        }
    }

    fn check_convert(&mut self, v: &Convert<'g>, location: Option<Interned<'g, Location<'g>>>) {
        let from = v.argument.value_type();
        let to = v.result.value().value_type;
        let ok = match (from.get(), to.get()) {
            (a, b) if a.is_scalar() && b.is_scalar() => true,
            (
                Type::Vector { size: a, .. },
                Type::Vector { size: b, .. },
            ) => a == b,
            _ => false,
        };
        if !ok {
            self.error(
                format!("cannot convert {} to {}", from, to),
                location,
            );
        }
    }

    fn check_bitcast(&mut self, v: &Bitcast<'g>, location: Option<Interned<'g, Location<'g>>>) {
        let from = v.argument.value_type();
        let to = v.result.value().value_type;
        let is_32bit = |ty: &Type<'g>| matches!(ty, Type::Int(_) | Type::Float(crate::types::FloatType::F32));
        let ok = match (from.get(), to.get()) {
            (a, b) if is_32bit(a) && is_32bit(b) => true,
            (
                Type::Vector { size: a, elem: ae },
                Type::Vector { size: b, elem: be },
            ) => a == b && is_32bit(ae.get()) && is_32bit(be.get()),
            _ => false,
        };
        if !ok {
            self.error(
                format!("cannot bitcast {} to {}", from, to),
                location,
            );
        }
    }

    fn check_swizzle(&mut self, v: &Swizzle<'g>, location: Option<Interned<'g, Location<'g>>>) {
        let source = v.vector.value_type();
        let (elem, size) = match source.vector_parts() {
            Some(parts) => parts,
            None => {
                self.error(
                    format!("swizzle requires a vector operand, not {}", source),
                    location,
                );
                return;
            }
        };
        if v.indices.is_empty() || v.indices.len() > 4 {
            self.error("swizzle must use between 1 and 4 indices", location);
            return;
        }
        for &index in &v.indices {
            if index >= size {
                self.error(
                    format!("swizzle index {} is out of range for {}", index, source),
                    location,
                );
            }
        }
        let expected = if v.indices.len() == 1 {
            elem
        } else {
            Type::vector(v.indices.len() as u32, elem, self.global_state)
        };
        if v.result.value().value_type != expected {
            self.error(
                format!(
                    "swizzle result type {} does not match expected type {}",
                    v.result.value().value_type,
                    expected
                ),
                location,
            );
        }
    }

    fn check_if(&mut self, v: IdRef<'g, IfData<'g>>, location: Option<Interned<'g, Location<'g>>>) {
        if !v.condition.value_type().is_bool() {
            self.error(
                format!("if condition type must be bool, not {}", v.condition.value_type()),
                location,
            );
        }
        self.control_stack.push(ControlItem::If(v));
        self.block(v.true_block, BlockPos::IfBranch);
        if let Some(false_block) = v.false_block {
            self.block(false_block, BlockPos::IfBranch);
        }
        self.control_stack.pop();
    }

    fn check_loop(
        &mut self,
        v: IdRef<'g, LoopData<'g>>,
        location: Option<Interned<'g, Location<'g>>>,
    ) {
        if !v.body.params.is_empty() && v.initializer.is_none() {
            self.error(
                "loop with body block parameters must have an initializer",
                location,
            );
        }
        // scopes nest initializer > body > continuing, so initializer
        // values are visible below and body values are visible in the
        // continuing region
        self.push_scope();
        if let Some(initializer) = v.initializer {
            self.control_stack.push(ControlItem::Loop {
                target: v,
                region: LoopRegion::Initializer,
            });
            self.block_in_current_scope(initializer, BlockPos::LoopInitializer);
            self.control_stack.pop();
        }
        self.push_scope();
        self.control_stack.push(ControlItem::Loop {
            target: v,
            region: LoopRegion::Body,
        });
        self.block_in_current_scope(v.body, BlockPos::LoopBody);
        self.control_stack.pop();
        if let Some(continuing) = v.continuing {
            self.push_scope();
            self.control_stack.push(ControlItem::Loop {
                target: v,
                region: LoopRegion::Continuing,
            });
            self.block_in_current_scope(continuing, BlockPos::LoopContinuing(v));
            self.control_stack.pop();
            self.pop_scope();
        }
        self.pop_scope();
        self.pop_scope();
    }

    fn check_switch(
        &mut self,
        v: IdRef<'g, SwitchData<'g>>,
        location: Option<Interned<'g, Location<'g>>>,
    ) {
        let condition_type = v.condition.value_type();
        if !condition_type.is_integer_scalar() {
            self.error(
                format!(
                    "switch condition type must be an integer scalar, not {}",
                    condition_type
                ),
                location,
            );
        }
        if v.cases.is_empty() {
            self.error("switch requires at least one case", location);
        }
        let mut default_count = 0usize;
        let mut seen_selectors: HashSet<u64> = HashSet::new();
        for case in &v.cases {
            for selector in &case.selectors {
                match selector {
                    CaseSelector::Default => default_count += 1,
                    CaseSelector::Value(value) => {
                        if value.get().get_type(self.global_state) != condition_type {
                            self.error(
                                format!(
                                    "switch selector {} does not match condition type {}",
                                    value, condition_type
                                ),
                                location,
                            );
                        }
                        if let Some(bits) = value.get().as_integer() {
                            if !seen_selectors.insert(bits) {
                                self.error(
                                    format!("duplicate switch selector {}", value),
                                    location,
                                );
                            }
                        }
                    }
                }
            }
        }
        if default_count == 0 {
            self.error("missing default case for switch", location);
        } else if default_count > 1 {
            self.error("switch may have only one default selector", location);
        }
        self.control_stack.push(ControlItem::Switch(v));
        for case in &v.cases {
            self.block(case.block, BlockPos::SwitchCase);
        }
        self.control_stack.pop();
    }

    fn terminator(&mut self, terminator: &Terminator<'g>, pos: BlockPos<'g>) {
        for (index, operand) in terminator.operands().iter().enumerate() {
            self.check_operand(operand, None, &format!("terminator (operand {})", index));
        }
        match terminator {
            Terminator::Return { value } => {
                let function = self
                    .current_function
                    .expect("terminator outside of a function");
                match (value, function.return_type.is_void()) {
                    (Some(_), true) => {
                        self.error("unexpected return value in a void function", None)
                    }
                    (None, false) => self.error("expected a return value", None),
                    (Some(value), false) => {
                        if value.value_type() != function.return_type {
                            self.error(
                                format!(
                                    "return value type {} does not match function return type {}",
                                    value.value_type(),
                                    function.return_type
                                ),
                                None,
                            );
                        }
                    }
                    (None, true) => {}
                }
            }
            Terminator::ExitIf { target, arguments } => {
                match self.control_stack.last().copied() {
                    Some(ControlItem::If(top)) if top == target.get() => {}
                    Some(_) => self.error(
                        "exit_if target jumps over other control instructions",
                        None,
                    ),
                    None => self.error("exit_if found outside all control instructions", None),
                }
                self.check_exit_arguments("exit_if", arguments, &target.get().results);
            }
            Terminator::ExitSwitch { target, arguments } => {
                self.check_exit_crossing_ifs(
                    "exit_switch",
                    |item| matches!(item, ControlItem::Switch(s) if *s == target.get()),
                );
                self.check_exit_arguments("exit_switch", arguments, &target.get().results);
            }
            Terminator::ExitLoop { target, arguments } => {
                self.check_exit_crossing_ifs(
                    "exit_loop",
                    |item| matches!(item, ControlItem::Loop { target: l, .. } if *l == target.get()),
                );
                if self.loop_region(target.get()) == Some(LoopRegion::Continuing) {
                    self.error("loop exit jumps out of the continuing block", None);
                }
                self.check_exit_arguments("exit_loop", arguments, &target.get().results);
            }
            Terminator::Continue { target, arguments } => {
                if self.loop_region(target.get()) != Some(LoopRegion::Body) {
                    self.error("continue must be used from within its loop's body", None);
                }
                match target.get().continuing {
                    Some(continuing) => self.check_exit_arguments(
                        "continue",
                        arguments,
                        &continuing.params,
                    ),
                    None => {
                        if !arguments.is_empty() {
                            self.error(
                                "continue passes arguments but the loop has no continuing block",
                                None,
                            );
                        }
                    }
                }
            }
            Terminator::NextIteration { target, arguments } => {
                match self.loop_region(target.get()) {
                    Some(LoopRegion::Initializer) | Some(LoopRegion::Continuing) => {}
                    _ => self.error(
                        "next_iteration must be used from its loop's initializer or continuing \
                         block",
                        None,
                    ),
                }
                self.check_exit_arguments("next_iteration", arguments, &target.get().body.params);
            }
            Terminator::BreakIf { target, condition } => {
                if !condition.value_type().is_bool() {
                    self.error(
                        format!(
                            "break_if condition type must be bool, not {}",
                            condition.value_type()
                        ),
                        None,
                    );
                }
                let direct = matches!(pos, BlockPos::LoopContinuing(l) if l == target.get());
                if !direct {
                    self.error(
                        "break_if must be the terminator of its loop's continuing block",
                        None,
                    );
                }
            }
            Terminator::Unreachable => {}
        }
    }

    /// the innermost region of `target` the control stack is currently in
    fn loop_region(&self, target: IdRef<'g, LoopData<'g>>) -> Option<LoopRegion> {
        self.control_stack.iter().rev().find_map(|item| match item {
            ControlItem::Loop { target: l, region } if *l == target => Some(*region),
            _ => None,
        })
    }

    /// exits of loops and switches may cross `if`s, and only `if`s
    fn check_exit_crossing_ifs(
        &mut self,
        what: &str,
        mut is_target: impl FnMut(&ControlItem<'g>) -> bool,
    ) {
        enum Outcome {
            Found,
            Jumped,
            NotFound,
        }
        let mut outcome = Outcome::NotFound;
        for item in self.control_stack.iter().rev() {
            if is_target(item) {
                outcome = Outcome::Found;
                break;
            }
            if !matches!(item, ControlItem::If(_)) {
                outcome = Outcome::Jumped;
                break;
            }
        }
        match outcome {
            Outcome::Found => {}
            Outcome::Jumped => self.error(
                format!("{} target jumps over other control instructions", what),
                None,
            ),
            Outcome::NotFound => self.error(
                format!(
                    "{} target not found in the enclosing control instructions",
                    what
                ),
                None,
            ),
        }
    }

    fn check_exit_arguments(
        &mut self,
        what: &str,
        arguments: &[ValueUse<'g>],
        expected: &[ValueDefinition<'g>],
    ) {
        if arguments.len() != expected.len() {
            self.error(
                format!(
                    "{} provides {} values, target expects {}",
                    what,
                    arguments.len(),
                    expected.len()
                ),
                None,
            );
            return;
        }
        for (argument, definition) in arguments.iter().zip(expected) {
            if argument.value_type() != definition.value().value_type {
                self.error(
                    format!(
                        "{} value type {} does not match target type {}",
                        what,
                        argument.value_type(),
                        definition.value().value_type
                    ),
                    None,
                );
            }
        }
    }
}

fn describe_value<'a>(value: IdRef<'a, Value<'a>>) -> String {
    let name = value.name.get();
    if name.is_empty() {
        format!("of type {}", value.value_type)
    } else {
        format!("'{}'", name)
    }
}

fn is_numeric_scalar_or_vector(ty: &Type<'_>) -> bool {
    match ty {
        Type::Int(_) | Type::Float(_) => true,
        Type::Vector { elem, .. } => matches!(elem.get(), Type::Int(_) | Type::Float(_)),
        _ => false,
    }
}

fn is_integer_scalar_or_vector(ty: &Type<'_>) -> bool {
    match ty {
        Type::Int(_) => true,
        Type::Vector { elem, .. } => matches!(elem.get(), Type::Int(_)),
        _ => false,
    }
}

fn is_bool_scalar_or_vector(ty: &Type<'_>) -> bool {
    match ty {
        Type::Bool => true,
        Type::Vector { elem, .. } => matches!(elem.get(), Type::Bool),
        _ => false,
    }
}

/// `true` if `amount` is `u32` with the same scalar/vector shape as `value`
fn is_u32_shape_matching(value: &Type<'_>, amount: &Type<'_>) -> bool {
    use crate::types::IntType;
    match (value, amount) {
        (Type::Int(_), Type::Int(IntType::U32)) => true,
        (
            Type::Vector { size: a, .. },
            Type::Vector { size: b, elem },
        ) => a == b && matches!(elem.get(), Type::Int(IntType::U32)),
        _ => false,
    }
}

/// the result type of the arithmetic operators, or `None` if the operand
/// combination is invalid. Matching scalars/vectors work for every
/// operator; vector-scalar mixes produce the vector type; the matrix forms
/// are multiplication-only.
fn arithmetic_result_type<'g>(
    op: BinaryOp,
    lhs: Interned<'g, Type<'g>>,
    rhs: Interned<'g, Type<'g>>,
    global_state: &'g GlobalState<'g>,
) -> Option<Interned<'g, Type<'g>>> {
    if lhs == rhs {
        if is_numeric_scalar_or_vector(lhs.get()) {
            return Some(lhs);
        }
        if let (BinaryOp::Multiply, Type::Matrix { .. }) = (op, lhs.get()) {
            // matrix * matrix of the same shape is only valid when square,
            // handled by the general matrix case below
        } else {
            return None;
        }
    }
    // vector-scalar mixes
    match (lhs.get(), rhs.get()) {
        (Type::Vector { elem, .. }, scalar) if scalar == elem.get() && scalar.is_scalar() => {
            return Some(lhs);
        }
        (scalar, Type::Vector { elem, .. }) if scalar == elem.get() && scalar.is_scalar() => {
            return Some(rhs);
        }
        _ => {}
    }
    if op != BinaryOp::Multiply {
        return None;
    }
    match (lhs.get(), rhs.get()) {
        (Type::Matrix { .. }, scalar) if scalar.is_float_scalar() => Some(lhs),
        (scalar, Type::Matrix { .. }) if scalar.is_float_scalar() => Some(rhs),
        (
            Type::Matrix {
                columns,
                rows,
                elem,
            },
            Type::Vector { size, elem: ve },
        ) if size == columns && ve == elem => Some(Type::vector(*rows, *elem, global_state)),
        (
            Type::Vector { size, elem: ve },
            Type::Matrix {
                columns,
                rows,
                elem,
            },
        ) if size == rows && ve == elem => Some(Type::vector(*columns, *elem, global_state)),
        (
            Type::Matrix {
                columns: k1,
                rows,
                elem,
            },
            Type::Matrix {
                columns,
                rows: k2,
                elem: e2,
            },
        ) if k1 == k2 && elem == e2 => Some(
            Type::Matrix {
                columns: *columns,
                rows: *rows,
                elem: *elem,
            }
            .intern(global_state),
        ),
        _ => None,
    }
}

fn builtin_arity(builtin: BuiltinFn) -> usize {
    match builtin {
        BuiltinFn::Abs
        | BuiltinFn::Ceil
        | BuiltinFn::Cos
        | BuiltinFn::Floor
        | BuiltinFn::Length
        | BuiltinFn::Normalize
        | BuiltinFn::Sin
        | BuiltinFn::Sqrt => 1,
        BuiltinFn::Cross
        | BuiltinFn::Distance
        | BuiltinFn::Dot
        | BuiltinFn::Max
        | BuiltinFn::Min
        | BuiltinFn::Pow => 2,
        BuiltinFn::Clamp | BuiltinFn::Mix => 3,
    }
}

/// the boolean type with the same scalar/vector shape as `ty`
fn bool_shape_of<'g>(
    ty: Interned<'g, Type<'g>>,
    global_state: &'g GlobalState<'g>,
) -> Interned<'g, Type<'g>> {
    match ty.get() {
        Type::Vector { size, .. } => {
            Type::vector(*size, Type::bool(global_state), global_state)
        }
        _ => Type::bool(global_state),
    }
}

#[cfg(test)]
mod tests {
    use super::validate;
    use crate::global_state::Allocate;
    use crate::instructions::{Binary, BinaryOp, IfData, IfRef, Inst, Store, Terminator, Var};
    use crate::types::{Access, AddressSpace};
    use crate::values::{ValueDefinition, ValueUse};
    use crate::{Function, FunctionKind, GlobalState, Module, Type};
    use crate::{BlockData};

    fn int_function<'g>(
        global_state: &'g GlobalState<'g>,
    ) -> (Function<'g>, ValueUse<'g>) {
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
        (function, param_use)
    }

    #[test]
    fn test_valid_module() {
        let global_state = GlobalState::new();
        let global_state = &global_state;
        let i32_ty = Type::i32(global_state);
        let (function, param_use) = int_function(global_state);
        let result = ValueDefinition::new(i32_ty, "", global_state);
        let result_use = ValueUse::new(result.value());
        function
            .body
            .set_body(
                vec![Inst::without_location(Binary {
                    op: BinaryOp::Add,
                    operands: [param_use, ValueUse::from_const(1i32, global_state)],
                    result,
                })],
                Terminator::Return {
                    value: Some(result_use),
                },
            )
            .unwrap();
        let mut module = Module::new();
        module.functions.push(function);
        assert!(validate(&module, global_state).is_ok());
    }

    #[test]
    fn test_missing_terminator_is_one_diagnostic() {
        let global_state = GlobalState::new();
        let global_state = &global_state;
        let (function, _) = int_function(global_state);
        // body never sealed
        let mut module = Module::new();
        module.functions.push(function);
        let diagnostics = validate(&module, global_state).unwrap_err();
        assert_eq!(diagnostics.len(), 1);
        let message = diagnostics.iter().next().unwrap().to_string();
        assert!(
            message.contains("does not end in a terminator"),
            "unexpected message: {}",
            message
        );
    }

    #[test]
    fn test_use_before_definition() {
        let global_state = GlobalState::new();
        let global_state = &global_state;
        let i32_ty = Type::i32(global_state);
        let (function, _) = int_function(global_state);
        // this value has no defining instruction anywhere in the module
        let dangling = ValueDefinition::new(i32_ty, "ghost", global_state);
        function
            .body
            .set_body(
                Vec::new(),
                Terminator::Return {
                    value: Some(ValueUse::new(dangling.value())),
                },
            )
            .unwrap();
        let mut module = Module::new();
        module.functions.push(function);
        let diagnostics = validate(&module, global_state).unwrap_err();
        assert!(diagnostics
            .iter()
            .any(|d| d.message.contains("is not defined at its use")));
    }

    #[test]
    fn test_store_type_mismatch() {
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
            initializer: None,
            binding_point: None,
            result: ValueDefinition::new(ptr_ty, "v", global_state),
        };
        let pointer = ValueUse::new(var.result.value());
        function
            .body
            .set_body(
                vec![
                    Inst::without_location(var),
                    Inst::without_location(Store {
                        pointer,
                        value: ValueUse::from_const(1.0f32, global_state),
                    }),
                ],
                Terminator::Return { value: None },
            )
            .unwrap();
        let mut module = Module::new();
        module.functions.push(function);
        let diagnostics = validate(&module, global_state).unwrap_err();
        assert!(diagnostics
            .iter()
            .any(|d| d.message.contains("store value type")));
    }

    #[test]
    fn test_exit_if_must_target_innermost() {
        let global_state = GlobalState::new();
        let global_state = &global_state;
        let void_ty = Type::void(global_state);
        let function = Function::new(
            "f",
            Vec::new(),
            void_ty,
            FunctionKind::Ordinary,
            global_state,
        );
        let outer_true = BlockData::new(global_state);
        let outer = global_state.alloc(IfData {
            condition: ValueUse::from_const(true, global_state),
            true_block: outer_true,
            false_block: None,
            results: Vec::new(),
        });
        let inner_true = BlockData::new(global_state);
        let inner = global_state.alloc(IfData {
            condition: ValueUse::from_const(false, global_state),
            true_block: inner_true,
            false_block: None,
            results: Vec::new(),
        });
        // the inner branch exits the outer if, crossing the inner one
        inner_true
            .set_body(
                Vec::new(),
                Terminator::ExitIf {
                    target: IfRef::new(outer),
                    arguments: Vec::new(),
                },
            )
            .unwrap();
        outer_true
            .set_body(
                vec![Inst::without_location(inner)],
                Terminator::ExitIf {
                    target: IfRef::new(outer),
                    arguments: Vec::new(),
                },
            )
            .unwrap();
        function
            .body
            .set_body(
                vec![Inst::without_location(outer)],
                Terminator::Return { value: None },
            )
            .unwrap();
        let mut module = Module::new();
        module.functions.push(function);
        let diagnostics = validate(&module, global_state).unwrap_err();
        assert!(diagnostics
            .iter()
            .any(|d| d.message.contains("jumps over other control instructions")));
    }
}
