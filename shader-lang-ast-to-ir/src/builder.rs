// SPDX-License-Identifier: LGPL-2.1-or-later
// See Notices.txt for copyright information

//! the AST-to-IR lowering
//!
//! Walks a resolved program and emits an equivalent IR module. Control flow
//! is restructured onto the `If`/`Loop`/`Switch` primitives; short-circuit
//! operators become `If`s with a boolean result; places lower to pointers,
//! reads of places to loads, assignments to stores. The builder keeps a
//! current-block cursor: instructions accumulate in a vector and the block
//! is sealed the moment its terminator is chosen, so nothing can ever be
//! appended after a terminator.

use crate::errors::{
    BuildResult, NotAssignable, UnknownFunction, UnknownIdentifier, UnsupportedConstruct,
};
use hashbrown::HashMap;
use shader_lang_ast as ast;
use shader_lang_ast::SourceText;
use shader_lang_ir::{
    AccessMode, AddressSpace, BinaryOp, BindingPoint, Block, BlockData, BuiltinFn, CallTarget,
    CaseSelector, Const, ConstFloat16, FunctionData, FunctionKind, FunctionRef, GlobalState,
    IdRef, IfData, IfRef, Inst, InstData, Internable, Interned, Location, LoopData, LoopRef,
    Module, PipelineStage, StructMember, SwitchCase, SwitchData, SwitchRef, Terminator, Type,
    UnaryOp, Value, ValueDefinition, ValueUse,
};

/// scan for constructs the IR cannot represent, before lowering starts
pub(crate) fn unsupported_construct(program: &ast::Program) -> Option<UnsupportedConstruct> {
    for decl in &program.decls {
        if let ast::GlobalDecl::Override(o) = decl {
            return Some(UnsupportedConstruct {
                construct: format!(
                    "pipeline-overridable constant `{}`; run the override-substitution \
                     pass before lowering",
                    o.name
                ),
            });
        }
    }
    None
}

/// lower `program` to an IR module.
///
/// `source` is the program's source text, used only to attach line/column
/// locations to the emitted instructions; pass `None` when the text is not
/// available.
pub fn build<'g>(
    program: &ast::Program,
    source: Option<&SourceText<'_>>,
    global_state: &'g GlobalState<'g>,
) -> Result<Module<'g>, crate::errors::BuildError> {
    if let Some(unsupported) = unsupported_construct(program) {
        return Err(unsupported.into());
    }
    let mut builder = Builder {
        global_state,
        module: Module::new(),
        file_name: program.source_name.intern(global_state),
        locations: source.map(|source| LocationTable { source }),
        functions: HashMap::new(),
        scopes: Vec::new(),
        control_stack: Vec::new(),
        current: None,
    };
    builder.program(program)?;
    Ok(builder.module)
}

struct LocationTable<'s, 'a> {
    source: &'s SourceText<'a>,
}

enum ControlEntry<'g> {
    If,
    Loop(IdRef<'g, LoopData<'g>>),
    Switch(IdRef<'g, SwitchData<'g>>),
}

struct CurrentBlock<'g> {
    /// `None` while emitting the module root block
    block: Option<Block<'g>>,
    insts: Vec<Inst<'g>>,
}

/// a lowered expression: either a plain value (which is a pointer for
/// places) or a reference to one element of a vector, which has no pointer
/// form and lowers to the dedicated vector-element memory instructions
enum Lowered<'g> {
    Value(IdRef<'g, Value<'g>>),
    VectorElement {
        pointer: IdRef<'g, Value<'g>>,
        index: IdRef<'g, Value<'g>>,
    },
}

struct Builder<'a, 's, 'g> {
    global_state: &'g GlobalState<'g>,
    module: Module<'g>,
    file_name: Interned<'g, str>,
    locations: Option<LocationTable<'s, 'a>>,
    functions: HashMap<&'a str, IdRef<'g, FunctionData<'g>>>,
    scopes: Vec<HashMap<&'a str, IdRef<'g, Value<'g>>>>,
    control_stack: Vec<ControlEntry<'g>>,
    current: Option<CurrentBlock<'g>>,
}

impl<'a, 's, 'g> Builder<'a, 's, 'g> {
    fn loc(&self, span: ast::Span) -> Option<Interned<'g, Location<'g>>> {
        let table = self.locations.as_ref()?;
        if span.is_empty() {
            return None;
        }
        let line_col = table.source.line_col(span.start);
        Some(
            Location {
                file: self.file_name,
                line: line_col.line,
                column: line_col.column,
            }
            .intern(self.global_state),
        )
    }

    fn push_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }
    fn pop_scope(&mut self) {
        self.scopes.pop();
    }
    fn bind(&mut self, name: &'a str, value: IdRef<'g, Value<'g>>) {
        self.scopes
            .last_mut()
            .expect("no scope to bind into")
            .insert(name, value);
    }
    fn lookup(&self, name: &str) -> BuildResult<IdRef<'g, Value<'g>>> {
        for scope in self.scopes.iter().rev() {
            if let Some(&value) = scope.get(name) {
                return Ok(value);
            }
        }
        Err(UnknownIdentifier { name: name.into() }.into())
    }

    /// append an instruction to the current block
    fn push_inst(&mut self, data: impl Into<InstData<'g>>, span: ast::Span) {
        let location = self.loc(span);
        self.current
            .as_mut()
            .expect("no current block")
            .insts
            .push(Inst::new(location, data));
    }

    fn need_terminator(&self) -> bool {
        self.current.is_some()
    }

    /// seal the current block with `terminator`
    fn set_terminator(&mut self, terminator: Terminator<'g>) {
        let current = self.current.take().expect("no current block to terminate");
        let block = current.block.expect("the module root block has no terminator");
        block
            .set_body(current.insts, terminator)
            .expect("block sealed twice");
    }

    /// switch emission to `block`, returning the previous cursor
    fn switch_to(&mut self, block: Block<'g>) -> Option<CurrentBlock<'g>> {
        self.current.replace(CurrentBlock {
            block: Some(block),
            insts: Vec::new(),
        })
    }

    fn def(&self, ty: Interned<'g, Type<'g>>, name: &str) -> ValueDefinition<'g> {
        ValueDefinition::new(ty, name, self.global_state)
    }

    fn const_value(&self, value: impl Internable<'g, Interned = Const<'g>>) -> IdRef<'g, Value<'g>> {
        Value::from_const(value.intern(self.global_state), "", self.global_state)
    }

    fn literal_const(&self, literal: ast::Literal) -> Interned<'g, Const<'g>> {
        match literal {
            ast::Literal::Bool(v) => v.intern(self.global_state),
            ast::Literal::I32(v) => v.intern(self.global_state),
            ast::Literal::U32(v) => v.intern(self.global_state),
            ast::Literal::F32(v) => v.intern(self.global_state),
            ast::Literal::F16(v) => {
                Const::F16(ConstFloat16::from_f32(v)).intern(self.global_state)
            }
        }
    }

    /// the IR type for a resolved AST type; references lower to pointers
    fn ty(&self, ty: &ast::Type) -> Interned<'g, Type<'g>> {
        let global_state = self.global_state;
        match ty {
            ast::Type::Void => Type::void(global_state),
            ast::Type::Bool => Type::bool(global_state),
            ast::Type::I32 => Type::i32(global_state),
            ast::Type::U32 => Type::u32(global_state),
            ast::Type::F32 => Type::f32(global_state),
            ast::Type::F16 => {
                Type::Float(shader_lang_ir::FloatType::F16).intern(global_state)
            }
            ast::Type::Vector { size, elem } => {
                Type::vector(*size, self.ty(elem), global_state)
            }
            ast::Type::Matrix {
                columns,
                rows,
                elem,
            } => Type::Matrix {
                columns: *columns,
                rows: *rows,
                elem: self.ty(elem),
            }
            .intern(global_state),
            ast::Type::Array { elem, count } => Type::Array {
                elem: self.ty(elem),
                count: *count,
            }
            .intern(global_state),
            ast::Type::Struct(s) => Type::Struct {
                name: s.name.intern(global_state),
                members: s
                    .members
                    .iter()
                    .map(|member| StructMember {
                        name: member.name.intern(global_state),
                        ty: self.ty(&member.ty),
                    })
                    .collect(),
            }
            .intern(global_state),
            ast::Type::Pointer {
                space,
                store,
                access,
            }
            | ast::Type::Reference {
                space,
                store,
                access,
            } => Type::pointer(
                address_space(*space),
                self.ty(store),
                access_mode(*access),
                global_state,
            ),
        }
    }

    fn program(&mut self, program: &'a ast::Program) -> BuildResult<()> {
        self.push_scope();
        for decl in &program.decls {
            match decl {
                ast::GlobalDecl::Var(v) => self.global_var(v)?,
                ast::GlobalDecl::Function(f) => self.function(f)?,
                ast::GlobalDecl::Override(_) => {
                    unreachable!("overrides are rejected before lowering starts")
                }
            }
        }
        self.pop_scope();
        Ok(())
    }

    fn global_var(&mut self, v: &'a ast::GlobalVar) -> BuildResult<()> {
        // module-scope declarations emit into the root block
        self.current = Some(CurrentBlock {
            block: None,
            insts: Vec::new(),
        });
        let initializer = match &v.init {
            Some(init) => Some(ValueUse::new(self.expr_value(init)?)),
            None => None,
        };
        let pointer_type = Type::pointer(
            address_space(v.space),
            self.ty(&v.store_type),
            access_mode(v.access),
            self.global_state,
        );
        let result = self.def(pointer_type, &v.name);
        let value = result.value();
        self.push_inst(
            shader_lang_ir::Var {
                initializer,
                binding_point: v.binding.map(|binding| BindingPoint {
                    group: binding.group,
                    binding: binding.binding,
                }),
                result,
            },
            v.span,
        );
        let current = self.current.take().expect("no current block");
        self.module.root_block.extend(current.insts);
        self.bind(&v.name, value);
        Ok(())
    }

    fn function(&mut self, f: &'a ast::FunctionDecl) -> BuildResult<()> {
        assert!(self.control_stack.is_empty(), "unbalanced control stack");
        let mut params = Vec::with_capacity(f.params.len());
        let mut param_values = Vec::with_capacity(f.params.len());
        for param in &f.params {
            let definition = self.def(self.ty(&param.ty), &param.name);
            param_values.push((param.name.as_str(), definition.value()));
            params.push(definition);
        }
        let kind = match f.stage {
            None => FunctionKind::Ordinary,
            Some(ast::Stage::Vertex) => FunctionKind::EntryPoint {
                stage: PipelineStage::Vertex,
                workgroup_size: None,
            },
            Some(ast::Stage::Fragment) => FunctionKind::EntryPoint {
                stage: PipelineStage::Fragment,
                workgroup_size: None,
            },
            Some(ast::Stage::Compute { workgroup_size }) => FunctionKind::EntryPoint {
                stage: PipelineStage::Compute,
                workgroup_size: Some(workgroup_size),
            },
        };
        let return_type = self.ty(&f.return_type);
        let function = shader_lang_ir::Function::new(
            &f.name,
            params,
            return_type,
            kind,
            self.global_state,
        );
        let function_data = function.value();
        self.functions.insert(&f.name, function_data);

        self.push_scope();
        for (name, value) in param_values {
            self.bind(name, value);
        }
        self.switch_to(function_data.body);
        self.stmts(&f.body)?;
        if self.need_terminator() {
            if return_type.is_void() && stmts_complete(&f.body) {
                self.set_terminator(Terminator::Return { value: None });
            } else {
                self.set_terminator(Terminator::Unreachable);
            }
        }
        self.pop_scope();
        assert!(self.control_stack.is_empty(), "unbalanced control stack");
        self.module.functions.push(function);
        Ok(())
    }

    fn stmts(&mut self, stmts: &'a [ast::Stmt]) -> BuildResult<()> {
        for stmt in stmts {
            self.stmt(stmt)?;
            if !self.need_terminator() || !stmt_completes(stmt) {
                // the rest of the statements are unreachable
                break;
            }
        }
        Ok(())
    }

    fn stmt(&mut self, stmt: &'a ast::Stmt) -> BuildResult<()> {
        match &stmt.kind {
            ast::StmtKind::Assign { lhs, rhs } => self.assign(lhs, rhs, stmt.span),
            ast::StmtKind::CompoundAssign { op, lhs, rhs } => {
                let lhs_place = self.expr(lhs)?;
                let rhs_value = self.expr_value(rhs)?;
                self.compound_assign(lhs_place, rhs_value, binary_op(*op), stmt.span)
            }
            ast::StmtKind::IncrementDecrement { lhs, increment } => {
                let store_type = lhs.ty.unwrap_ref();
                let one = if store_type.is_signed_integer_scalar() {
                    self.const_value(1i32)
                } else {
                    self.const_value(1u32)
                };
                let lhs_place = self.expr(lhs)?;
                let op = if *increment {
                    BinaryOp::Add
                } else {
                    BinaryOp::Subtract
                };
                self.compound_assign(lhs_place, one, op, stmt.span)
            }
            ast::StmtKind::Block(stmts) => {
                self.push_scope();
                let result = self.stmts(stmts);
                self.pop_scope();
                result
            }
            ast::StmtKind::Break => {
                let target = self.innermost_breakable();
                match target {
                    BreakTarget::Loop(target) => self.set_terminator(Terminator::ExitLoop {
                        target: LoopRef::new(target),
                        arguments: Vec::new(),
                    }),
                    BreakTarget::Switch(target) => self.set_terminator(Terminator::ExitSwitch {
                        target: SwitchRef::new(target),
                        arguments: Vec::new(),
                    }),
                }
                Ok(())
            }
            ast::StmtKind::BreakIf(condition) => {
                let condition = ValueUse::new(self.expr_value(condition)?);
                let target = self.innermost_loop();
                self.set_terminator(Terminator::BreakIf {
                    target: LoopRef::new(target),
                    condition,
                });
                Ok(())
            }
            ast::StmtKind::Continue => {
                let target = self.innermost_loop();
                self.set_terminator(Terminator::Continue {
                    target: LoopRef::new(target),
                    arguments: Vec::new(),
                });
                Ok(())
            }
            ast::StmtKind::Discard => {
                self.push_inst(shader_lang_ir::Discard, stmt.span);
                Ok(())
            }
            ast::StmtKind::Call(expr) => {
                self.expr_value(expr)?;
                Ok(())
            }
            ast::StmtKind::If {
                condition,
                body,
                else_,
            } => self.if_stmt(condition, body, else_.as_deref(), stmt.span),
            ast::StmtKind::Loop { body, continuing } => {
                self.loop_stmt(body, continuing.as_deref(), stmt.span)
            }
            ast::StmtKind::While { condition, body } => {
                self.while_stmt(condition, body, stmt.span)
            }
            ast::StmtKind::For {
                initializer,
                condition,
                continuing,
                body,
            } => self.for_stmt(
                initializer.as_deref(),
                condition.as_ref(),
                continuing.as_deref(),
                body,
                stmt.span,
            ),
            ast::StmtKind::Return(value) => {
                let value = match value {
                    Some(value) => Some(ValueUse::new(self.expr_value(value)?)),
                    None => None,
                };
                self.set_terminator(Terminator::Return { value });
                Ok(())
            }
            ast::StmtKind::Switch { condition, cases } => {
                self.switch_stmt(condition, cases, stmt.span)
            }
            ast::StmtKind::Var {
                name,
                store_type,
                init,
            } => {
                let initializer = match init {
                    Some(init) => Some(ValueUse::new(self.expr_value(init)?)),
                    None => None,
                };
                let pointer_type = Type::pointer(
                    AddressSpace::Function,
                    self.ty(store_type),
                    AccessMode::ReadWrite,
                    self.global_state,
                );
                let result = self.def(pointer_type, name);
                let value = result.value();
                self.push_inst(
                    shader_lang_ir::Var {
                        initializer,
                        binding_point: None,
                        result,
                    },
                    stmt.span,
                );
                self.bind(name, value);
                Ok(())
            }
            ast::StmtKind::Let { name, init } => {
                let before = self
                    .current
                    .as_ref()
                    .map(|current| current.insts.len())
                    .unwrap_or(0);
                let value = self.expr_value(init)?;
                let emitted_instruction = self
                    .current
                    .as_ref()
                    .map(|current| current.insts.len())
                    .unwrap_or(0)
                    != before;
                if emitted_instruction && value.const_value.get().is_none() {
                    // name the initializer's result directly; no extra
                    // indirection
                    value.set_name(name.as_str(), self.global_state);
                    self.bind(name, value);
                } else {
                    // the initializer produced no instruction; emit a Let
                    // so the binding has a place of declaration
                    let result = self.def(value.value_type, name);
                    let let_value = result.value();
                    self.push_inst(
                        shader_lang_ir::Let {
                            value: ValueUse::new(value),
                            result,
                        },
                        stmt.span,
                    );
                    self.bind(name, let_value);
                }
                Ok(())
            }
            ast::StmtKind::ConstAssert => Ok(()),
        }
    }

    fn innermost_breakable(&self) -> BreakTarget<'g> {
        for entry in self.control_stack.iter().rev() {
            match entry {
                ControlEntry::Loop(target) => return BreakTarget::Loop(*target),
                ControlEntry::Switch(target) => return BreakTarget::Switch(*target),
                ControlEntry::If => {}
            }
        }
        unreachable!("break outside of a loop or switch")
    }

    fn innermost_loop(&self) -> IdRef<'g, LoopData<'g>> {
        for entry in self.control_stack.iter().rev() {
            if let ControlEntry::Loop(target) = entry {
                return *target;
            }
        }
        unreachable!("continue outside of a loop")
    }

    fn assign(&mut self, lhs: &'a ast::Expr, rhs: &'a ast::Expr, span: ast::Span) -> BuildResult<()> {
        if lhs.is_phony() {
            self.expr_value(rhs)?;
            return Ok(());
        }
        // a multi-element swizzle write has no pointer form; it lowers to a
        // load, a per-lane reassembly and a store of the whole vector
        if let ast::ExprKind::Swizzle { object, indices } = &lhs.kind {
            if indices.len() > 1 && object.ty.is_reference() {
                return self.swizzle_store(object, indices, rhs, span);
            }
        }
        let lhs_place = self.expr(lhs)?;
        let rhs_value = self.expr_value(rhs)?;
        match lhs_place {
            Lowered::Value(pointer) => {
                if !pointer.value_type.is_pointer() {
                    return Err(NotAssignable.into());
                }
                self.push_inst(
                    shader_lang_ir::Store {
                        pointer: ValueUse::new(pointer),
                        value: ValueUse::new(rhs_value),
                    },
                    span,
                );
            }
            Lowered::VectorElement { pointer, index } => {
                self.push_inst(
                    shader_lang_ir::StoreVectorElement {
                        pointer: ValueUse::new(pointer),
                        index: ValueUse::new(index),
                        value: ValueUse::new(rhs_value),
                    },
                    span,
                );
            }
        }
        Ok(())
    }

    fn compound_assign(
        &mut self,
        lhs: Lowered<'g>,
        rhs: IdRef<'g, Value<'g>>,
        op: BinaryOp,
        span: ast::Span,
    ) -> BuildResult<()> {
        match lhs {
            Lowered::Value(pointer) => {
                let store_type = match pointer.value_type.pointee() {
                    Some(pointee) => pointee,
                    None => return Err(NotAssignable.into()),
                };
                let loaded = self.def(store_type, "");
                let loaded_value = loaded.value();
                self.push_inst(
                    shader_lang_ir::Load {
                        pointer: ValueUse::new(pointer),
                        result: loaded,
                    },
                    span,
                );
                let result = self.def(store_type, "");
                let result_value = result.value();
                self.push_inst(
                    shader_lang_ir::Binary {
                        op,
                        operands: [ValueUse::new(loaded_value), ValueUse::new(rhs)],
                        result,
                    },
                    span,
                );
                self.push_inst(
                    shader_lang_ir::Store {
                        pointer: ValueUse::new(pointer),
                        value: ValueUse::new(result_value),
                    },
                    span,
                );
            }
            Lowered::VectorElement { pointer, index } => {
                let elem_type = pointer
                    .value_type
                    .pointee()
                    .and_then(|pointee| pointee.vector_parts())
                    .map(|(elem, _)| elem)
                    .expect("vector-element place must point to a vector");
                let loaded = self.def(elem_type, "");
                let loaded_value = loaded.value();
                self.push_inst(
                    shader_lang_ir::LoadVectorElement {
                        pointer: ValueUse::new(pointer),
                        index: ValueUse::new(index),
                        result: loaded,
                    },
                    span,
                );
                let result = self.def(elem_type, "");
                let result_value = result.value();
                self.push_inst(
                    shader_lang_ir::Binary {
                        op,
                        operands: [ValueUse::new(loaded_value), ValueUse::new(rhs)],
                        result,
                    },
                    span,
                );
                self.push_inst(
                    shader_lang_ir::StoreVectorElement {
                        pointer: ValueUse::new(pointer),
                        index: ValueUse::new(index),
                        value: ValueUse::new(result_value),
                    },
                    span,
                );
            }
        }
        Ok(())
    }

    /// `object.ywx = rhs`: load the vector, pick each lane from the old
    /// value or the replacement, reconstruct and store back -- preserving
    /// component order exactly
    fn swizzle_store(
        &mut self,
        object: &'a ast::Expr,
        indices: &[u32],
        rhs: &'a ast::Expr,
        span: ast::Span,
    ) -> BuildResult<()> {
        let pointer = self.expr_place_value(object)?;
        let rhs_value = self.expr_value(rhs)?;
        let vector_type = pointer
            .value_type
            .pointee()
            .expect("swizzle store needs a pointer");
        let (elem_type, size) = vector_type
            .vector_parts()
            .expect("swizzle store needs a vector");
        let loaded = self.def(vector_type, "");
        let loaded_value = loaded.value();
        self.push_inst(
            shader_lang_ir::Load {
                pointer: ValueUse::new(pointer),
                result: loaded,
            },
            span,
        );
        let mut lanes = Vec::with_capacity(size as usize);
        for lane in 0..size {
            let (source, index) = match indices.iter().position(|&i| i == lane) {
                // this lane is written: take the matching component of the
                // replacement vector
                Some(position) => (rhs_value, position as u32),
                // this lane keeps its old value
                None => (loaded_value, lane),
            };
            let component = self.def(elem_type, "");
            let component_value = component.value();
            self.push_inst(
                shader_lang_ir::Access {
                    base: ValueUse::new(source),
                    indices: vec![ValueUse::new(self.const_value(index))],
                    result: component,
                },
                span,
            );
            lanes.push(ValueUse::new(component_value));
        }
        let reconstructed = self.def(vector_type, "");
        let reconstructed_value = reconstructed.value();
        self.push_inst(
            shader_lang_ir::Construct {
                arguments: lanes,
                result: reconstructed,
            },
            span,
        );
        self.push_inst(
            shader_lang_ir::Store {
                pointer: ValueUse::new(pointer),
                value: ValueUse::new(reconstructed_value),
            },
            span,
        );
        Ok(())
    }

    fn if_stmt(
        &mut self,
        condition: &'a ast::Expr,
        body: &'a [ast::Stmt],
        else_: Option<&'a ast::Stmt>,
        span: ast::Span,
    ) -> BuildResult<()> {
        let condition_value = self.expr_value(condition)?;
        let true_block = BlockData::new(self.global_state);
        let false_block = else_.map(|_| BlockData::new(self.global_state));
        let if_data = IfData::new(
            ValueUse::new(condition_value),
            true_block,
            false_block,
            Vec::new(),
            self.global_state,
        );
        self.push_inst(if_data, span);
        self.control_stack.push(ControlEntry::If);

        let outer = self.switch_to(true_block);
        self.push_scope();
        self.stmts(body)?;
        self.pop_scope();
        if self.need_terminator() {
            self.set_terminator(Terminator::ExitIf {
                target: IfRef::new(if_data),
                arguments: Vec::new(),
            });
        }

        if let Some(else_stmt) = else_ {
            self.current = Some(CurrentBlock {
                block: Some(false_block.expect("else branch needs a block")),
                insts: Vec::new(),
            });
            self.push_scope();
            self.stmt(else_stmt)?;
            self.pop_scope();
            if self.need_terminator() {
                self.set_terminator(Terminator::ExitIf {
                    target: IfRef::new(if_data),
                    arguments: Vec::new(),
                });
            }
        }

        self.control_stack.pop();
        self.current = outer;
        Ok(())
    }

    fn loop_stmt(
        &mut self,
        body: &'a [ast::Stmt],
        continuing: Option<&'a [ast::Stmt]>,
        span: ast::Span,
    ) -> BuildResult<()> {
        let body_block = BlockData::new(self.global_state);
        let continuing_block = continuing.map(|_| BlockData::new(self.global_state));
        let loop_data = LoopData::new(
            None,
            body_block,
            continuing_block,
            Vec::new(),
            self.global_state,
        );
        self.push_inst(loop_data, span);
        self.control_stack.push(ControlEntry::Loop(loop_data));

        // the body scope stays open for the continuing block, which can
        // read values declared in the body
        self.push_scope();
        let outer = self.switch_to(body_block);
        self.stmts(body)?;
        if self.need_terminator() {
            self.set_terminator(Terminator::Continue {
                target: LoopRef::new(loop_data),
                arguments: Vec::new(),
            });
        }
        if let Some(continuing_stmts) = continuing {
            self.current = Some(CurrentBlock {
                block: continuing_block,
                insts: Vec::new(),
            });
            self.push_scope();
            self.stmts(continuing_stmts)?;
            self.pop_scope();
            if self.need_terminator() {
                self.set_terminator(Terminator::NextIteration {
                    target: LoopRef::new(loop_data),
                    arguments: Vec::new(),
                });
            }
        }
        self.pop_scope();
        self.control_stack.pop();
        self.current = outer;
        Ok(())
    }

    fn while_stmt(
        &mut self,
        condition: &'a ast::Expr,
        body: &'a [ast::Stmt],
        span: ast::Span,
    ) -> BuildResult<()> {
        let body_block = BlockData::new(self.global_state);
        let loop_data = LoopData::new(None, body_block, None, Vec::new(), self.global_state);
        self.push_inst(loop_data, span);
        self.control_stack.push(ControlEntry::Loop(loop_data));

        self.push_scope();
        let outer = self.switch_to(body_block);
        // the condition runs at the top of the body as
        // `if cond {} else { break }`
        let condition_value = self.expr_value(condition)?;
        self.emit_loop_condition(condition_value, loop_data, span);
        self.stmts(body)?;
        if self.need_terminator() {
            self.set_terminator(Terminator::Continue {
                target: LoopRef::new(loop_data),
                arguments: Vec::new(),
            });
        }
        self.pop_scope();
        self.control_stack.pop();
        self.current = outer;
        Ok(())
    }

    fn for_stmt(
        &mut self,
        initializer: Option<&'a ast::Stmt>,
        condition: Option<&'a ast::Expr>,
        continuing: Option<&'a ast::Stmt>,
        body: &'a [ast::Stmt],
        span: ast::Span,
    ) -> BuildResult<()> {
        let initializer_block = initializer.map(|_| BlockData::new(self.global_state));
        let body_block = BlockData::new(self.global_state);
        let continuing_block = continuing.map(|_| BlockData::new(self.global_state));
        let loop_data = LoopData::new(
            initializer_block,
            body_block,
            continuing_block,
            Vec::new(),
            self.global_state,
        );
        self.push_inst(loop_data, span);
        self.control_stack.push(ControlEntry::Loop(loop_data));

        // the initializer's declarations scope over the body and the
        // continuing statement
        self.push_scope();
        let outer = self.current.take();
        if let Some(initializer_stmt) = initializer {
            self.current = Some(CurrentBlock {
                block: initializer_block,
                insts: Vec::new(),
            });
            self.stmt(initializer_stmt)?;
            if self.need_terminator() {
                self.set_terminator(Terminator::NextIteration {
                    target: LoopRef::new(loop_data),
                    arguments: Vec::new(),
                });
            }
        }

        self.current = Some(CurrentBlock {
            block: Some(body_block),
            insts: Vec::new(),
        });
        if let Some(condition) = condition {
            let condition_value = self.expr_value(condition)?;
            self.emit_loop_condition(condition_value, loop_data, span);
        }
        self.push_scope();
        self.stmts(body)?;
        self.pop_scope();
        if self.need_terminator() {
            self.set_terminator(Terminator::Continue {
                target: LoopRef::new(loop_data),
                arguments: Vec::new(),
            });
        }

        if let Some(continuing_stmt) = continuing {
            self.current = Some(CurrentBlock {
                block: continuing_block,
                insts: Vec::new(),
            });
            self.stmt(continuing_stmt)?;
            if self.need_terminator() {
                self.set_terminator(Terminator::NextIteration {
                    target: LoopRef::new(loop_data),
                    arguments: Vec::new(),
                });
            }
        }

        self.pop_scope();
        self.control_stack.pop();
        self.current = outer;
        Ok(())
    }

    /// emit the `if cond {} else { break }` pair at the top of a condition
    /// loop's body
    fn emit_loop_condition(
        &mut self,
        condition: IdRef<'g, Value<'g>>,
        loop_data: IdRef<'g, LoopData<'g>>,
        span: ast::Span,
    ) {
        let true_block = BlockData::new(self.global_state);
        let false_block = BlockData::new(self.global_state);
        let if_data = IfData::new(
            ValueUse::new(condition),
            true_block,
            Some(false_block),
            Vec::new(),
            self.global_state,
        );
        true_block
            .set_body(
                Vec::new(),
                Terminator::ExitIf {
                    target: IfRef::new(if_data),
                    arguments: Vec::new(),
                },
            )
            .expect("fresh block");
        false_block
            .set_body(
                Vec::new(),
                Terminator::ExitLoop {
                    target: LoopRef::new(loop_data),
                    arguments: Vec::new(),
                },
            )
            .expect("fresh block");
        self.push_inst(if_data, span);
    }

    fn switch_stmt(
        &mut self,
        condition: &'a ast::Expr,
        cases: &'a [ast::SwitchCase],
        span: ast::Span,
    ) -> BuildResult<()> {
        let condition_value = self.expr_value(condition)?;
        let mut ir_cases = Vec::with_capacity(cases.len());
        for case in cases {
            let selectors = case
                .selectors
                .iter()
                .map(|selector| match selector {
                    ast::CaseSelector::Value(literal) => {
                        CaseSelector::Value(self.literal_const(*literal))
                    }
                    ast::CaseSelector::Default => CaseSelector::Default,
                })
                .collect();
            ir_cases.push(SwitchCase {
                selectors,
                block: BlockData::new(self.global_state),
            });
        }
        let switch_data = SwitchData::new(
            ValueUse::new(condition_value),
            ir_cases,
            Vec::new(),
            self.global_state,
        );
        self.push_inst(switch_data, span);
        self.control_stack.push(ControlEntry::Switch(switch_data));

        let outer = self.current.take();
        for (case, ast_case) in switch_data.get().cases.iter().zip(cases) {
            self.current = Some(CurrentBlock {
                block: Some(case.block),
                insts: Vec::new(),
            });
            self.push_scope();
            self.stmts(&ast_case.body)?;
            self.pop_scope();
            if self.need_terminator() {
                self.set_terminator(Terminator::ExitSwitch {
                    target: SwitchRef::new(switch_data),
                    arguments: Vec::new(),
                });
            }
        }

        self.control_stack.pop();
        self.current = outer;
        Ok(())
    }

    /// lower an expression and apply the load rule: a place consumed as a
    /// value is loaded
    fn expr_value(&mut self, expr: &'a ast::Expr) -> BuildResult<IdRef<'g, Value<'g>>> {
        let lowered = self.expr(expr)?;
        match lowered {
            Lowered::Value(value) => {
                if expr.ty.is_reference() {
                    let result = self.def(self.ty(expr.ty.unwrap_ref()), "");
                    let result_value = result.value();
                    self.push_inst(
                        shader_lang_ir::Load {
                            pointer: ValueUse::new(value),
                            result,
                        },
                        expr.span,
                    );
                    Ok(result_value)
                } else {
                    Ok(value)
                }
            }
            Lowered::VectorElement { pointer, index } => {
                let result = self.def(self.ty(expr.ty.unwrap_ref()), "");
                let result_value = result.value();
                self.push_inst(
                    shader_lang_ir::LoadVectorElement {
                        pointer: ValueUse::new(pointer),
                        index: ValueUse::new(index),
                        result,
                    },
                    expr.span,
                );
                Ok(result_value)
            }
        }
    }

    /// lower a place expression to its pointer value
    fn expr_place_value(&mut self, expr: &'a ast::Expr) -> BuildResult<IdRef<'g, Value<'g>>> {
        match self.expr(expr)? {
            Lowered::Value(value) => Ok(value),
            Lowered::VectorElement { .. } => Err(NotAssignable.into()),
        }
    }

    fn expr(&mut self, expr: &'a ast::Expr) -> BuildResult<Lowered<'g>> {
        match &expr.kind {
            ast::ExprKind::Literal(literal) => {
                let constant = self.literal_const(*literal);
                Ok(Lowered::Value(Value::from_const(
                    constant,
                    "",
                    self.global_state,
                )))
            }
            ast::ExprKind::Ident(name) => Ok(Lowered::Value(self.lookup(name)?)),
            ast::ExprKind::Phony => Err(NotAssignable.into()),
            ast::ExprKind::Unary { op, expr: operand } => match op {
                // address-of and indirection fold away; the pointer itself
                // flows through
                ast::UnaryOp::AddressOf => {
                    let place = self.expr_place_value(operand)?;
                    Ok(Lowered::Value(place))
                }
                ast::UnaryOp::Indirection => {
                    let pointer = self.expr_value(operand)?;
                    Ok(Lowered::Value(pointer))
                }
                ast::UnaryOp::Negation | ast::UnaryOp::Complement | ast::UnaryOp::Not => {
                    let value = self.expr_value(operand)?;
                    let result = self.def(self.ty(&expr.ty), "");
                    let result_value = result.value();
                    self.push_inst(
                        shader_lang_ir::Unary {
                            op: match op {
                                ast::UnaryOp::Negation => UnaryOp::Negation,
                                ast::UnaryOp::Complement => UnaryOp::Complement,
                                ast::UnaryOp::Not => UnaryOp::Not,
                                _ => unreachable!(),
                            },
                            operand: ValueUse::new(value),
                            result,
                        },
                        expr.span,
                    );
                    Ok(Lowered::Value(result_value))
                }
            },
            ast::ExprKind::Binary { op, lhs, rhs } => match op {
                ast::BinaryOp::LogicalAnd | ast::BinaryOp::LogicalOr => {
                    self.short_circuit(*op, lhs, rhs, expr.span)
                }
                _ => {
                    let lhs_value = self.expr_value(lhs)?;
                    let rhs_value = self.expr_value(rhs)?;
                    let result = self.def(self.ty(&expr.ty), "");
                    let result_value = result.value();
                    self.push_inst(
                        shader_lang_ir::Binary {
                            op: binary_op(*op),
                            operands: [ValueUse::new(lhs_value), ValueUse::new(rhs_value)],
                            result,
                        },
                        expr.span,
                    );
                    Ok(Lowered::Value(result_value))
                }
            },
            ast::ExprKind::Bitcast(operand) => {
                let value = self.expr_value(operand)?;
                let result = self.def(self.ty(&expr.ty), "");
                let result_value = result.value();
                self.push_inst(
                    shader_lang_ir::Bitcast {
                        argument: ValueUse::new(value),
                        result,
                    },
                    expr.span,
                );
                Ok(Lowered::Value(result_value))
            }
            ast::ExprKind::Call { target, args } => {
                let value = self.call(expr, target, args)?;
                Ok(Lowered::Value(value))
            }
            ast::ExprKind::Index { object, index } => {
                if is_ref_to_vector(&object.ty) {
                    let pointer = self.expr_place_value(object)?;
                    let index_value = self.expr_value(index)?;
                    Ok(Lowered::VectorElement {
                        pointer,
                        index: index_value,
                    })
                } else {
                    Ok(Lowered::Value(self.access_chain(expr)?))
                }
            }
            ast::ExprKind::Member { .. } => Ok(Lowered::Value(self.access_chain(expr)?)),
            ast::ExprKind::Swizzle { object, indices } => {
                if indices.len() == 1 {
                    if is_ref_to_vector(&object.ty) {
                        let pointer = self.expr_place_value(object)?;
                        let index = self.const_value(indices[0]);
                        Ok(Lowered::VectorElement { pointer, index })
                    } else {
                        Ok(Lowered::Value(self.access_chain(expr)?))
                    }
                } else {
                    // multi-element swizzle of a value; a swizzle read of a
                    // place loads the whole vector first
                    let object_value = self.expr_value(object)?;
                    let result = self.def(self.ty(&expr.ty), "");
                    let result_value = result.value();
                    self.push_inst(
                        shader_lang_ir::Swizzle {
                            vector: ValueUse::new(object_value),
                            indices: indices.clone(),
                            result,
                        },
                        expr.span,
                    );
                    Ok(Lowered::Value(result_value))
                }
            }
        }
    }

    /// collect a chain of member/index projections into one `Access`
    fn access_chain(&mut self, expr: &'a ast::Expr) -> BuildResult<IdRef<'g, Value<'g>>> {
        let mut indices = Vec::new();
        let base = self.access_chain_step(expr, &mut indices)?;
        let result = self.def(self.ty(&expr.ty), "");
        let result_value = result.value();
        self.push_inst(
            shader_lang_ir::Access {
                base: ValueUse::new(base),
                indices,
                result,
            },
            expr.span,
        );
        Ok(result_value)
    }

    fn access_chain_step(
        &mut self,
        expr: &'a ast::Expr,
        indices: &mut Vec<ValueUse<'g>>,
    ) -> BuildResult<IdRef<'g, Value<'g>>> {
        match &expr.kind {
            ast::ExprKind::Member { object, member } => {
                let base = self.access_chain_step(object, indices)?;
                indices.push(ValueUse::new(self.const_value(*member)));
                Ok(base)
            }
            ast::ExprKind::Swizzle { object, indices: swizzle_indices }
                if swizzle_indices.len() == 1 =>
            {
                let base = self.access_chain_step(object, indices)?;
                indices.push(ValueUse::new(self.const_value(swizzle_indices[0])));
                Ok(base)
            }
            ast::ExprKind::Index { object, index } => {
                let base = self.access_chain_step(object, indices)?;
                let index_value = self.expr_value(index)?;
                indices.push(ValueUse::new(index_value));
                Ok(base)
            }
            _ => {
                // the root of the chain: a place (already a pointer) or a
                // composite value
                self.expr_place_value(expr)
            }
        }
    }

    /// `a && b` / `a || b`: evaluate the left side, branch, and only
    /// evaluate the right side when it can affect the result
    fn short_circuit(
        &mut self,
        op: ast::BinaryOp,
        lhs: &'a ast::Expr,
        rhs: &'a ast::Expr,
        span: ast::Span,
    ) -> BuildResult<Lowered<'g>> {
        let lhs_value = self.expr_value(lhs)?;
        let bool_type = Type::bool(self.global_state);
        let result = self.def(bool_type, "");
        let result_value = result.value();
        let true_block = BlockData::new(self.global_state);
        let false_block = BlockData::new(self.global_state);
        let if_data = IfData::new(
            ValueUse::new(lhs_value),
            true_block,
            Some(false_block),
            vec![result],
            self.global_state,
        );
        self.push_inst(if_data, span);

        let (short_block, short_value, rhs_block) = if op == ast::BinaryOp::LogicalAnd {
            // false && _ is false without evaluating the right side
            (false_block, false, true_block)
        } else {
            // true || _ is true without evaluating the right side
            (true_block, true, false_block)
        };
        short_block
            .set_body(
                Vec::new(),
                Terminator::ExitIf {
                    target: IfRef::new(if_data),
                    arguments: vec![ValueUse::new(self.const_value(short_value))],
                },
            )
            .expect("fresh block");

        let outer = self.switch_to(rhs_block);
        let rhs_value = self.expr_value(rhs)?;
        self.set_terminator(Terminator::ExitIf {
            target: IfRef::new(if_data),
            arguments: vec![ValueUse::new(rhs_value)],
        });
        self.current = outer;
        Ok(Lowered::Value(result_value))
    }

    fn call(
        &mut self,
        expr: &'a ast::Expr,
        target: &'a ast::CallTarget,
        args: &'a [ast::Expr],
    ) -> BuildResult<IdRef<'g, Value<'g>>> {
        // arguments evaluate fully, left to right, before the call
        let mut arguments = Vec::with_capacity(args.len());
        for arg in args {
            arguments.push(ValueUse::new(self.expr_value(arg)?));
        }
        let result = self.def(self.ty(&expr.ty), "");
        let result_value = result.value();
        match target {
            ast::CallTarget::Function(name) => {
                let function = match self.functions.get(name.as_str()) {
                    Some(&function) => function,
                    None => {
                        return Err(UnknownFunction { name: name.clone() }.into());
                    }
                };
                self.push_inst(
                    shader_lang_ir::Call {
                        target: CallTarget::Function(FunctionRef::new(function)),
                        arguments,
                        result,
                    },
                    expr.span,
                );
            }
            ast::CallTarget::Builtin(builtin) => {
                self.push_inst(
                    shader_lang_ir::Call {
                        target: CallTarget::Builtin(builtin_fn(*builtin)),
                        arguments,
                        result,
                    },
                    expr.span,
                );
            }
            ast::CallTarget::Construct => {
                self.push_inst(
                    shader_lang_ir::Construct {
                        arguments,
                        result,
                    },
                    expr.span,
                );
            }
            ast::CallTarget::Convert => {
                assert_eq!(arguments.len(), 1, "conversions take exactly one argument");
                self.push_inst(
                    shader_lang_ir::Convert {
                        argument: arguments.remove(0),
                        result,
                    },
                    expr.span,
                );
            }
        }
        Ok(result_value)
    }
}

enum BreakTarget<'g> {
    Loop(IdRef<'g, LoopData<'g>>),
    Switch(IdRef<'g, SwitchData<'g>>),
}

fn is_ref_to_vector(ty: &ast::Type) -> bool {
    matches!(
        ty,
        ast::Type::Reference { store, .. } if matches!(**store, ast::Type::Vector { .. })
    )
}

fn address_space(space: ast::AddressSpace) -> AddressSpace {
    match space {
        ast::AddressSpace::Function => AddressSpace::Function,
        ast::AddressSpace::Private => AddressSpace::Private,
        ast::AddressSpace::Storage => AddressSpace::Storage,
        ast::AddressSpace::Uniform => AddressSpace::Uniform,
        ast::AddressSpace::Workgroup => AddressSpace::Workgroup,
    }
}

fn access_mode(access: ast::Access) -> AccessMode {
    match access {
        ast::Access::Read => AccessMode::Read,
        ast::Access::ReadWrite => AccessMode::ReadWrite,
        ast::Access::Write => AccessMode::Write,
    }
}

fn binary_op(op: ast::BinaryOp) -> BinaryOp {
    match op {
        ast::BinaryOp::Add => BinaryOp::Add,
        ast::BinaryOp::Subtract => BinaryOp::Subtract,
        ast::BinaryOp::Multiply => BinaryOp::Multiply,
        ast::BinaryOp::Divide => BinaryOp::Divide,
        ast::BinaryOp::Modulo => BinaryOp::Modulo,
        ast::BinaryOp::And => BinaryOp::And,
        ast::BinaryOp::Or => BinaryOp::Or,
        ast::BinaryOp::Xor => BinaryOp::Xor,
        ast::BinaryOp::Equal => BinaryOp::Equal,
        ast::BinaryOp::NotEqual => BinaryOp::NotEqual,
        ast::BinaryOp::LessThan => BinaryOp::LessThan,
        ast::BinaryOp::GreaterThan => BinaryOp::GreaterThan,
        ast::BinaryOp::LessThanEqual => BinaryOp::LessThanEqual,
        ast::BinaryOp::GreaterThanEqual => BinaryOp::GreaterThanEqual,
        ast::BinaryOp::ShiftLeft => BinaryOp::ShiftLeft,
        ast::BinaryOp::ShiftRight => BinaryOp::ShiftRight,
        ast::BinaryOp::LogicalAnd | ast::BinaryOp::LogicalOr => {
            unreachable!("short-circuit operators are decomposed into ifs")
        }
    }
}

fn builtin_fn(builtin: ast::BuiltinFn) -> BuiltinFn {
    match builtin {
        ast::BuiltinFn::Abs => BuiltinFn::Abs,
        ast::BuiltinFn::Ceil => BuiltinFn::Ceil,
        ast::BuiltinFn::Clamp => BuiltinFn::Clamp,
        ast::BuiltinFn::Cos => BuiltinFn::Cos,
        ast::BuiltinFn::Cross => BuiltinFn::Cross,
        ast::BuiltinFn::Distance => BuiltinFn::Distance,
        ast::BuiltinFn::Dot => BuiltinFn::Dot,
        ast::BuiltinFn::Floor => BuiltinFn::Floor,
        ast::BuiltinFn::Length => BuiltinFn::Length,
        ast::BuiltinFn::Max => BuiltinFn::Max,
        ast::BuiltinFn::Min => BuiltinFn::Min,
        ast::BuiltinFn::Mix => BuiltinFn::Mix,
        ast::BuiltinFn::Normalize => BuiltinFn::Normalize,
        ast::BuiltinFn::Pow => BuiltinFn::Pow,
        ast::BuiltinFn::Sin => BuiltinFn::Sin,
        ast::BuiltinFn::Sqrt => BuiltinFn::Sqrt,
    }
}

/// `true` if executing `stmt` can complete normally, letting control reach
/// whatever follows it
fn stmt_completes(stmt: &ast::Stmt) -> bool {
    match &stmt.kind {
        ast::StmtKind::Return(_)
        | ast::StmtKind::Break
        | ast::StmtKind::Continue => false,
        ast::StmtKind::Block(stmts) => stmts_complete(stmts),
        ast::StmtKind::If { body, else_, .. } => match else_ {
            // without an else the false path falls through
            None => true,
            Some(else_stmt) => stmts_complete(body) || stmt_completes(else_stmt),
        },
        ast::StmtKind::Loop { body, continuing } => {
            contains_break(body)
                || continuing
                    .as_ref()
                    .map_or(false, |continuing| contains_break(continuing))
        }
        ast::StmtKind::While { .. } => true,
        ast::StmtKind::For { condition, body, .. } => {
            condition.is_some() || contains_break(body)
        }
        ast::StmtKind::Switch { cases, .. } => cases
            .iter()
            .any(|case| stmts_complete(&case.body) || contains_break(&case.body)),
        _ => true,
    }
}

/// `true` if control can flow past the end of the statement list
fn stmts_complete(stmts: &[ast::Stmt]) -> bool {
    stmts.iter().all(stmt_completes)
}

/// `true` if `stmts` contains a `break` (or `break if`) that targets the
/// enclosing loop or switch these statements are the direct body of --
/// nested loops, whiles, fors and switches capture their own breaks
fn contains_break(stmts: &[ast::Stmt]) -> bool {
    stmts.iter().any(|stmt| match &stmt.kind {
        ast::StmtKind::Break | ast::StmtKind::BreakIf(_) => true,
        ast::StmtKind::Block(stmts) => contains_break(stmts),
        ast::StmtKind::If { body, else_, .. } => {
            contains_break(body)
                || else_
                    .as_deref()
                    .map_or(false, |else_stmt| contains_break(std::slice::from_ref(else_stmt)))
        }
        _ => false,
    })
}

#[cfg(test)]
mod tests {
    use super::build;
    use shader_lang_ast as ast;
    use shader_lang_ast::{Span, Type};
    use shader_lang_ir::validate::validate;
    use shader_lang_ir::{disasm, GlobalState};

    fn expr(kind: ast::ExprKind, ty: Type) -> ast::Expr {
        ast::Expr {
            kind,
            ty,
            span: Span::default(),
        }
    }

    fn ident(name: &str, ty: Type) -> ast::Expr {
        expr(ast::ExprKind::Ident(name.into()), ty)
    }

    fn literal(lit: ast::Literal) -> ast::Expr {
        expr(ast::ExprKind::Literal(lit), lit.ty())
    }

    fn binary(op: ast::BinaryOp, lhs: ast::Expr, rhs: ast::Expr, ty: Type) -> ast::Expr {
        expr(
            ast::ExprKind::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            },
            ty,
        )
    }

    fn stmt(kind: ast::StmtKind) -> ast::Stmt {
        ast::Stmt {
            kind,
            span: Span::default(),
        }
    }

    fn function(
        name: &str,
        params: Vec<(&str, Type)>,
        return_type: Type,
        body: Vec<ast::Stmt>,
    ) -> ast::GlobalDecl {
        ast::GlobalDecl::Function(ast::FunctionDecl {
            name: name.into(),
            params: params
                .into_iter()
                .map(|(name, ty)| ast::Param {
                    name: name.into(),
                    ty,
                    span: Span::default(),
                })
                .collect(),
            return_type,
            stage: None,
            body,
            span: Span::default(),
        })
    }

    fn program(decls: Vec<ast::GlobalDecl>) -> ast::Program {
        ast::Program {
            source_name: "test.sl".into(),
            decls,
        }
    }

    fn function_ref(space: ast::AddressSpace, store: Type) -> Type {
        Type::reference(space, store, ast::Access::ReadWrite)
    }

    #[test]
    fn test_short_circuit_and() {
        // fn and(a : bool, b : bool) -> bool { return a && b; }
        let p = program(vec![function(
            "and",
            vec![("a", Type::Bool), ("b", Type::Bool)],
            Type::Bool,
            vec![stmt(ast::StmtKind::Return(Some(binary(
                ast::BinaryOp::LogicalAnd,
                ident("a", Type::Bool),
                ident("b", Type::Bool),
                Type::Bool,
            ))))],
        )]);
        let global_state = GlobalState::new();
        let global_state = &global_state;
        let module = build(&p, None, global_state).unwrap();
        validate(&module, global_state).unwrap();
        let expected = concat!(
            "module {\n",
            "    fn and(%a : bool, %b : bool) -> bool {\n",
            "        %b1 {\n",
            "            %1 : bool = if %a [t: %b2, f: %b3] {\n",
            "                %b2 {\n",
            "                    exit_if %b\n",
            "                }\n",
            "                %b3 {\n",
            "                    exit_if false\n",
            "                }\n",
            "            }\n",
            "            return %1\n",
            "        }\n",
            "    }\n",
            "}",
        );
        assert_eq!(disasm::disassemble(&module), expected);
    }

    #[test]
    fn test_short_circuit_only_calls_rhs_in_branch() {
        // fn a() -> bool + fn b() -> bool; fn c() -> bool { return a() && b(); }
        let call = |name: &str| {
            expr(
                ast::ExprKind::Call {
                    target: ast::CallTarget::Function(name.into()),
                    args: Vec::new(),
                },
                Type::Bool,
            )
        };
        let p = program(vec![
            function(
                "a",
                Vec::new(),
                Type::Bool,
                vec![stmt(ast::StmtKind::Return(Some(literal(
                    ast::Literal::Bool(true),
                ))))],
            ),
            function(
                "b",
                Vec::new(),
                Type::Bool,
                vec![stmt(ast::StmtKind::Return(Some(literal(
                    ast::Literal::Bool(false),
                ))))],
            ),
            function(
                "c",
                Vec::new(),
                Type::Bool,
                vec![stmt(ast::StmtKind::Return(Some(binary(
                    ast::BinaryOp::LogicalAnd,
                    call("a"),
                    call("b"),
                    Type::Bool,
                ))))],
            ),
        ]);
        let global_state = GlobalState::new();
        let global_state = &global_state;
        let module = build(&p, None, global_state).unwrap();
        validate(&module, global_state).unwrap();
        let expected = concat!(
            "module {\n",
            "    fn a() -> bool {\n",
            "        %b1 {\n",
            "            return true\n",
            "        }\n",
            "    }\n",
            "    fn b() -> bool {\n",
            "        %b2 {\n",
            "            return false\n",
            "        }\n",
            "    }\n",
            "    fn c() -> bool {\n",
            "        %b3 {\n",
            "            %1 : bool = call %a\n",
            "            %2 : bool = if %1 [t: %b4, f: %b5] {\n",
            "                %b4 {\n",
            "                    %3 : bool = call %b\n",
            "                    exit_if %3\n",
            "                }\n",
            "                %b5 {\n",
            "                    exit_if false\n",
            "                }\n",
            "            }\n",
            "            return %2\n",
            "        }\n",
            "    }\n",
            "}",
        );
        assert_eq!(disasm::disassemble(&module), expected);
    }

    #[test]
    fn test_for_loop_regions() {
        // fn main() { for (var i : i32 = 0; i < 5; i = i + 1) {} }
        let i_ref = || function_ref(ast::AddressSpace::Function, Type::I32);
        let p = program(vec![function(
            "main",
            Vec::new(),
            Type::Void,
            vec![stmt(ast::StmtKind::For {
                initializer: Some(Box::new(stmt(ast::StmtKind::Var {
                    name: "i".into(),
                    store_type: Type::I32,
                    init: Some(literal(ast::Literal::I32(0))),
                }))),
                condition: Some(binary(
                    ast::BinaryOp::LessThan,
                    ident("i", i_ref()),
                    literal(ast::Literal::I32(5)),
                    Type::Bool,
                )),
                continuing: Some(Box::new(stmt(ast::StmtKind::Assign {
                    lhs: ident("i", i_ref()),
                    rhs: binary(
                        ast::BinaryOp::Add,
                        ident("i", i_ref()),
                        literal(ast::Literal::I32(1)),
                        Type::I32,
                    ),
                }))),
                body: Vec::new(),
            })],
        )]);
        let global_state = GlobalState::new();
        let global_state = &global_state;
        let module = build(&p, None, global_state).unwrap();
        validate(&module, global_state).unwrap();
        let expected = concat!(
            "module {\n",
            "    fn main() -> void {\n",
            "        %b1 {\n",
            "            loop [i: %b2, b: %b3, c: %b4] {\n",
            "                %b2 {\n",
            "                    %i : ptr<function, i32, read_write> = var 0i\n",
            "                    next_iteration\n",
            "                }\n",
            "                %b3 {\n",
            "                    %1 : i32 = load %i\n",
            "                    %2 : bool = lt %1, 5i\n",
            "                    if %2 [t: %b5, f: %b6] {\n",
            "                        %b5 {\n",
            "                            exit_if\n",
            "                        }\n",
            "                        %b6 {\n",
            "                            exit_loop\n",
            "                        }\n",
            "                    }\n",
            "                    continue\n",
            "                }\n",
            "                %b4 {\n",
            "                    %3 : i32 = load %i\n",
            "                    %4 : i32 = add %3, 1i\n",
            "                    store %i, %4\n",
            "                    next_iteration\n",
            "                }\n",
            "            }\n",
            "            return\n",
            "        }\n",
            "    }\n",
            "}",
        );
        assert_eq!(disasm::disassemble(&module), expected);
    }

    #[test]
    fn test_swizzle_write_reconstructs_vector() {
        // fn main() { var v : vec4<f32>; v.ywx = vec3<f32>(1.0, 2.0, 3.0); }
        let vec4 = || Type::vector(4, Type::F32);
        let vec3 = || Type::vector(3, Type::F32);
        let p = program(vec![function(
            "main",
            Vec::new(),
            Type::Void,
            vec![
                stmt(ast::StmtKind::Var {
                    name: "v".into(),
                    store_type: vec4(),
                    init: None,
                }),
                stmt(ast::StmtKind::Assign {
                    lhs: expr(
                        ast::ExprKind::Swizzle {
                            object: Box::new(ident(
                                "v",
                                function_ref(ast::AddressSpace::Function, vec4()),
                            )),
                            indices: vec![1, 3, 0],
                        },
                        vec3(),
                    ),
                    rhs: expr(
                        ast::ExprKind::Call {
                            target: ast::CallTarget::Construct,
                            args: vec![
                                literal(ast::Literal::F32(1.0)),
                                literal(ast::Literal::F32(2.0)),
                                literal(ast::Literal::F32(3.0)),
                            ],
                        },
                        vec3(),
                    ),
                }),
            ],
        )]);
        let global_state = GlobalState::new();
        let global_state = &global_state;
        let module = build(&p, None, global_state).unwrap();
        validate(&module, global_state).unwrap();
        let expected = concat!(
            "module {\n",
            "    fn main() -> void {\n",
            "        %b1 {\n",
            "            %v : ptr<function, vec4<f32>, read_write> = var\n",
            "            %1 : vec3<f32> = construct 1.0f, 2.0f, 3.0f\n",
            "            %2 : vec4<f32> = load %v\n",
            "            %3 : f32 = access %1, 2u\n",
            "            %4 : f32 = access %1, 0u\n",
            "            %5 : f32 = access %2, 2u\n",
            "            %6 : f32 = access %1, 1u\n",
            "            %7 : vec4<f32> = construct %3, %4, %5, %6\n",
            "            store %v, %7\n",
            "            return\n",
            "        }\n",
            "    }\n",
            "}",
        );
        assert_eq!(disasm::disassemble(&module), expected);
    }

    #[test]
    fn test_switch_selector_groups() {
        // fn f(v : i32) -> i32 { switch v { case 0 { return 1; }
        //                                   case 1, default { return 2; } } }
        let p = program(vec![function(
            "f",
            vec![("v", Type::I32)],
            Type::I32,
            vec![stmt(ast::StmtKind::Switch {
                condition: ident("v", Type::I32),
                cases: vec![
                    ast::SwitchCase {
                        selectors: vec![ast::CaseSelector::Value(ast::Literal::I32(0))],
                        body: vec![stmt(ast::StmtKind::Return(Some(literal(
                            ast::Literal::I32(1),
                        ))))],
                        span: Span::default(),
                    },
                    ast::SwitchCase {
                        selectors: vec![
                            ast::CaseSelector::Value(ast::Literal::I32(1)),
                            ast::CaseSelector::Default,
                        ],
                        body: vec![stmt(ast::StmtKind::Return(Some(literal(
                            ast::Literal::I32(2),
                        ))))],
                        span: Span::default(),
                    },
                ],
            })],
        )]);
        let global_state = GlobalState::new();
        let global_state = &global_state;
        let module = build(&p, None, global_state).unwrap();
        validate(&module, global_state).unwrap();
        let expected = concat!(
            "module {\n",
            "    fn f(%v : i32) -> i32 {\n",
            "        %b1 {\n",
            "            switch %v [c: (0i, %b2), c: (1i, default, %b3)] {\n",
            "                %b2 {\n",
            "                    return 1i\n",
            "                }\n",
            "                %b3 {\n",
            "                    return 2i\n",
            "                }\n",
            "            }\n",
            "            unreachable\n",
            "        }\n",
            "    }\n",
            "}",
        );
        assert_eq!(disasm::disassemble(&module), expected);
    }

    #[test]
    fn test_shadowed_names_stay_distinct() {
        // fn f() { var x : i32; { var x : i32; } }
        let p = program(vec![function(
            "f",
            Vec::new(),
            Type::Void,
            vec![
                stmt(ast::StmtKind::Var {
                    name: "x".into(),
                    store_type: Type::I32,
                    init: None,
                }),
                stmt(ast::StmtKind::Block(vec![stmt(ast::StmtKind::Var {
                    name: "x".into(),
                    store_type: Type::I32,
                    init: None,
                })])),
            ],
        )]);
        let global_state = GlobalState::new();
        let global_state = &global_state;
        let module = build(&p, None, global_state).unwrap();
        validate(&module, global_state).unwrap();
        // both values keep the name `x`; the printer disambiguates
        let expected = concat!(
            "module {\n",
            "    fn f() -> void {\n",
            "        %b1 {\n",
            "            %x : ptr<function, i32, read_write> = var\n",
            "            %x_1 : ptr<function, i32, read_write> = var\n",
            "            return\n",
            "        }\n",
            "    }\n",
            "}",
        );
        assert_eq!(disasm::disassemble(&module), expected);
    }

    #[test]
    fn test_instruction_locations_are_queryable() {
        use shader_lang_ast::SourceText;
        use shader_lang_ir::disasm::Disassembler;

        let text = "var x : i32 = 1;\nx = 2;\n";
        let source = SourceText::new("test.sl", text);
        let p = program(vec![function(
            "f",
            Vec::new(),
            Type::Void,
            vec![
                ast::Stmt {
                    kind: ast::StmtKind::Var {
                        name: "x".into(),
                        store_type: Type::I32,
                        init: Some(literal(ast::Literal::I32(1))),
                    },
                    span: ast::Span::new(0, 16),
                },
                ast::Stmt {
                    kind: ast::StmtKind::Assign {
                        lhs: ident(
                            "x",
                            function_ref(ast::AddressSpace::Function, Type::I32),
                        ),
                        rhs: literal(ast::Literal::I32(2)),
                    },
                    span: ast::Span::new(17, 23),
                },
            ],
        )]);
        let global_state = GlobalState::new();
        let global_state = &global_state;
        let module = build(&p, Some(&source), global_state).unwrap();
        validate(&module, global_state).unwrap();

        let disassembler = Disassembler::new(&module);
        assert_eq!(disassembler.instruction_count(), 2);
        let var_location = disassembler.instruction_location(0).unwrap();
        assert_eq!(var_location.line, 1);
        assert_eq!(var_location.column, 1);
        let store_location = disassembler.instruction_location(1).unwrap();
        assert_eq!(store_location.line, 2);
        assert_eq!(store_location.column, 1);
        // the side table never changes the instruction stream itself
        assert_eq!(disassembler.text(), disasm::disassemble(&module));
    }

    #[test]
    fn test_override_rejected_before_lowering() {
        let p = program(vec![ast::GlobalDecl::Override(ast::OverrideVar {
            name: "factor".into(),
            ty: Type::F32,
            span: Span::default(),
        })]);
        let global_state = GlobalState::new();
        let global_state = &global_state;
        let error = build(&p, None, global_state).unwrap_err();
        let message = error.to_string();
        assert!(
            message.starts_with("failed to build IR from program: unsupported construct"),
            "unexpected message: {}",
            message
        );
        assert!(message.contains("factor"));
    }

    #[test]
    fn test_global_var_and_compound_assign() {
        // @group(0) @binding(1) var<storage, read_write> counter : i32;
        // fn bump() { counter += 2; }
        let counter_ref = || function_ref(ast::AddressSpace::Storage, Type::I32);
        let p = program(vec![
            ast::GlobalDecl::Var(ast::GlobalVar {
                name: "counter".into(),
                space: ast::AddressSpace::Storage,
                access: ast::Access::ReadWrite,
                store_type: Type::I32,
                binding: Some(ast::BindingPoint {
                    group: 0,
                    binding: 1,
                }),
                init: None,
                span: Span::default(),
            }),
            function(
                "bump",
                Vec::new(),
                Type::Void,
                vec![stmt(ast::StmtKind::CompoundAssign {
                    op: ast::BinaryOp::Add,
                    lhs: ident("counter", counter_ref()),
                    rhs: literal(ast::Literal::I32(2)),
                })],
            ),
        ]);
        let global_state = GlobalState::new();
        let global_state = &global_state;
        let module = build(&p, None, global_state).unwrap();
        validate(&module, global_state).unwrap();
        let expected = concat!(
            "module {\n",
            "    %counter : ptr<storage, i32, read_write> = var @binding_point(0, 1)\n",
            "    fn bump() -> void {\n",
            "        %b1 {\n",
            "            %1 : i32 = load %counter\n",
            "            %2 : i32 = add %1, 2i\n",
            "            store %counter, %2\n",
            "            return\n",
            "        }\n",
            "    }\n",
            "}",
        );
        assert_eq!(disasm::disassemble(&module), expected);
    }

    #[test]
    fn test_let_names_initializer_result() {
        // fn f(p : i32) -> i32 { let x = p + 1; return x; }
        let p = program(vec![function(
            "f",
            vec![("p", Type::I32)],
            Type::I32,
            vec![
                stmt(ast::StmtKind::Let {
                    name: "x".into(),
                    init: binary(
                        ast::BinaryOp::Add,
                        ident("p", Type::I32),
                        literal(ast::Literal::I32(1)),
                        Type::I32,
                    ),
                }),
                stmt(ast::StmtKind::Return(Some(ident("x", Type::I32)))),
            ],
        )]);
        let global_state = GlobalState::new();
        let global_state = &global_state;
        let module = build(&p, None, global_state).unwrap();
        validate(&module, global_state).unwrap();
        let expected = concat!(
            "module {\n",
            "    fn f(%p : i32) -> i32 {\n",
            "        %b1 {\n",
            "            %x : i32 = add %p, 1i\n",
            "            return %x\n",
            "        }\n",
            "    }\n",
            "}",
        );
        assert_eq!(disasm::disassemble(&module), expected);
    }

    #[test]
    fn test_access_chain_collapses_to_one_access() {
        // struct S { a : vec4<f32>, b : i32 }
        // fn f(arr : ptr<function, array<S, 4>, read_write>, i : i32) -> i32 {
        //     return (*arr)[i].b;
        // }
        let s = Type::Struct(ast::StructType {
            name: "S".into(),
            members: vec![
                ast::StructMember {
                    name: "a".into(),
                    ty: Type::vector(4, Type::F32),
                },
                ast::StructMember {
                    name: "b".into(),
                    ty: Type::I32,
                },
            ],
        });
        let array = Type::Array {
            elem: Box::new(s.clone()),
            count: 4,
        };
        let arr_ptr = Type::pointer(
            ast::AddressSpace::Function,
            array.clone(),
            ast::Access::ReadWrite,
        );
        let deref = expr(
            ast::ExprKind::Unary {
                op: ast::UnaryOp::Indirection,
                expr: Box::new(ident("arr", arr_ptr.clone())),
            },
            function_ref(ast::AddressSpace::Function, array),
        );
        let indexed = expr(
            ast::ExprKind::Index {
                object: Box::new(deref),
                index: Box::new(ident("i", Type::I32)),
            },
            function_ref(ast::AddressSpace::Function, s),
        );
        let member = expr(
            ast::ExprKind::Member {
                object: Box::new(indexed),
                member: 1,
            },
            function_ref(ast::AddressSpace::Function, Type::I32),
        );
        let p = program(vec![function(
            "f",
            vec![("arr", arr_ptr), ("i", Type::I32)],
            Type::I32,
            vec![stmt(ast::StmtKind::Return(Some(member)))],
        )]);
        let global_state = GlobalState::new();
        let global_state = &global_state;
        let module = build(&p, None, global_state).unwrap();
        validate(&module, global_state).unwrap();
        let expected = concat!(
            "module {\n",
            "    fn f(%arr : ptr<function, array<S, 4>, read_write>, %i : i32) -> i32 {\n",
            "        %b1 {\n",
            "            %1 : ptr<function, i32, read_write> = access %arr, %i, 1u\n",
            "            %2 : i32 = load %1\n",
            "            return %2\n",
            "        }\n",
            "    }\n",
            "}",
        );
        assert_eq!(disasm::disassemble(&module), expected);
    }

    #[test]
    fn test_while_lowers_to_loop_with_condition_break() {
        // fn f(n : i32) { var x : i32 = 0; while x < n { x = x + 1; } }
        let x_ref = || function_ref(ast::AddressSpace::Function, Type::I32);
        let p = program(vec![function(
            "f",
            vec![("n", Type::I32)],
            Type::Void,
            vec![
                stmt(ast::StmtKind::Var {
                    name: "x".into(),
                    store_type: Type::I32,
                    init: Some(literal(ast::Literal::I32(0))),
                }),
                stmt(ast::StmtKind::While {
                    condition: binary(
                        ast::BinaryOp::LessThan,
                        ident("x", x_ref()),
                        ident("n", Type::I32),
                        Type::Bool,
                    ),
                    body: vec![stmt(ast::StmtKind::Assign {
                        lhs: ident("x", x_ref()),
                        rhs: binary(
                            ast::BinaryOp::Add,
                            ident("x", x_ref()),
                            literal(ast::Literal::I32(1)),
                            Type::I32,
                        ),
                    })],
                }),
            ],
        )]);
        let global_state = GlobalState::new();
        let global_state = &global_state;
        let module = build(&p, None, global_state).unwrap();
        validate(&module, global_state).unwrap();
        let expected = concat!(
            "module {\n",
            "    fn f(%n : i32) -> void {\n",
            "        %b1 {\n",
            "            %x : ptr<function, i32, read_write> = var 0i\n",
            "            loop [b: %b2] {\n",
            "                %b2 {\n",
            "                    %1 : i32 = load %x\n",
            "                    %2 : bool = lt %1, %n\n",
            "                    if %2 [t: %b3, f: %b4] {\n",
            "                        %b3 {\n",
            "                            exit_if\n",
            "                        }\n",
            "                        %b4 {\n",
            "                            exit_loop\n",
            "                        }\n",
            "                    }\n",
            "                    %3 : i32 = load %x\n",
            "                    %4 : i32 = add %3, 1i\n",
            "                    store %x, %4\n",
            "                    continue\n",
            "                }\n",
            "            }\n",
            "            return\n",
            "        }\n",
            "    }\n",
            "}",
        );
        assert_eq!(disasm::disassemble(&module), expected);
    }
}
