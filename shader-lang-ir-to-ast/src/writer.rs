// SPDX-License-Identifier: LGPL-2.1-or-later
// See Notices.txt for copyright information

//! the IR-to-AST writer

use hashbrown::{HashMap, HashSet};
use shader_lang_ast as ast;
use shader_lang_ast::Span;
use shader_lang_ir::inline::{InlineDecisions, UseCounts};
use shader_lang_ir::{
    AccessMode, AddressSpace, BinaryOp, Block, BuiltinFn, CallTarget, CaseSelector, Const,
    FunctionData, FunctionKind, GlobalState, IdRef, IfData, Inst, InstData, Interned, LoopData,
    Module, PipelineStage, SwitchData, Terminator, Type, UnaryOp, Value,
};
use std::fmt;

/// the reasons writing a module back to an AST can fail
#[derive(Debug)]
pub enum WriteError {
    /// the module uses a shape this writer cannot express in source
    Unsupported(String),
    /// the module is internally inconsistent; this indicates a bug in
    /// whatever produced it
    InconsistentModule(String),
}

impl fmt::Display for WriteError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            WriteError::Unsupported(what) => {
                write!(f, "cannot write module back to a program: {}", what)
            }
            WriteError::InconsistentModule(what) => {
                write!(f, "inconsistent module: {}", what)
            }
        }
    }
}

impl std::error::Error for WriteError {}

type WriteResult<T> = Result<T, WriteError>;

/// reconstruct a resolved AST program from `module`.
///
/// `global_state` must be the state the module was built against; derived
/// types re-walked along access chains are interned through it.
pub fn to_program<'g>(
    module: &Module<'g>,
    global_state: &'g GlobalState<'g>,
) -> WriteResult<ast::Program> {
    let uses = UseCounts::for_module(module);
    let decisions = InlineDecisions::for_module(module, &uses);
    let mut writer = Writer {
        module,
        global_state,
        uses,
        decisions,
        bindings: HashMap::new(),
        function_names: HashMap::new(),
        used_names: HashSet::new(),
    };
    writer.program()
}

/// whether a binding currently stands for the pointer itself or the place
/// it points at
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
enum PtrKind {
    Ptr,
    Ref,
}

#[derive(Clone, Debug)]
enum Binding {
    /// the value is named and read through an identifier
    Variable { name: String, ptr_kind: PtrKind },
    /// the value will be substituted at its single use site
    Inlined { expr: ast::Expr, ptr_kind: PtrKind },
    /// the inlined expression was already taken; a second use is a bug
    Consumed,
}

/// where a block sits, which decides how its terminator prints
#[derive(Copy, Clone, Eq, PartialEq)]
enum TermCtx {
    FunctionBody,
    IfBranch,
    SwitchCase,
    LoopBody,
    LoopInitializer,
    LoopContinuing,
}

struct Writer<'m, 'g> {
    module: &'m Module<'g>,
    global_state: &'g GlobalState<'g>,
    uses: UseCounts<'g>,
    decisions: InlineDecisions<'g>,
    bindings: HashMap<IdRef<'g, Value<'g>>, Binding>,
    function_names: HashMap<IdRef<'g, FunctionData<'g>>, String>,
    used_names: HashSet<String>,
}

impl<'m, 'g> Writer<'m, 'g> {
    fn program(&mut self) -> WriteResult<ast::Program> {
        let mut decls = Vec::new();
        for inst in &self.module.root_block {
            match &inst.data {
                InstData::Var(var) => decls.push(ast::GlobalDecl::Var(self.global_var(var)?)),
                _ => {
                    return Err(WriteError::InconsistentModule(
                        "module root block may only contain var declarations".into(),
                    ))
                }
            }
        }
        // claim every function's name before writing any body, so calls can
        // reference functions in any order
        for function in &self.module.functions {
            let name = self.fresh_name(&function.name);
            self.function_names.insert(function.value(), name);
        }
        for function in &self.module.functions {
            decls.push(ast::GlobalDecl::Function(self.function(function.value())?));
        }
        Ok(ast::Program {
            source_name: String::new(),
            decls,
        })
    }

    fn global_var(&mut self, var: &shader_lang_ir::Var<'g>) -> WriteResult<ast::GlobalVar> {
        let pointer_type = var.result.value().value_type;
        let (space, access) = pointer_type.pointer_parts().ok_or_else(|| {
            WriteError::InconsistentModule("var result must be pointer-typed".into())
        })?;
        let store_type = pointer_type.pointee().unwrap();
        let init = match &var.initializer {
            Some(initializer) => Some(self.value_expr_value_ctx(initializer.value())?),
            None => None,
        };
        let name = self.fresh_name(&var.result.value().name.get());
        self.bindings.insert(
            var.result.value(),
            Binding::Variable {
                name: name.clone(),
                ptr_kind: PtrKind::Ref,
            },
        );
        Ok(ast::GlobalVar {
            name,
            space: ast_address_space(space),
            access: ast_access(access),
            store_type: ast_type(store_type),
            binding: var.binding_point.map(|binding_point| ast::BindingPoint {
                group: binding_point.group,
                binding: binding_point.binding,
            }),
            init,
            span: Span::default(),
        })
    }

    fn function(&mut self, function: IdRef<'g, FunctionData<'g>>) -> WriteResult<ast::FunctionDecl> {
        let mut params = Vec::with_capacity(function.params.len());
        for param in &function.params {
            let name = self.fresh_name(&param.value().name.get());
            self.bindings.insert(
                param.value(),
                Binding::Variable {
                    name: name.clone(),
                    ptr_kind: PtrKind::Ptr,
                },
            );
            params.push(ast::Param {
                name,
                ty: ast_type(param.value().value_type),
                span: Span::default(),
            });
        }
        let stage = match function.kind {
            FunctionKind::Ordinary => None,
            FunctionKind::EntryPoint {
                stage,
                workgroup_size,
            } => Some(match stage {
                PipelineStage::Vertex => ast::Stage::Vertex,
                PipelineStage::Fragment => ast::Stage::Fragment,
                PipelineStage::Compute => ast::Stage::Compute {
                    workgroup_size: workgroup_size.unwrap_or([1, 1, 1]),
                },
            }),
        };
        let body = self.block_statements(function.body, TermCtx::FunctionBody)?;
        Ok(ast::FunctionDecl {
            name: self.function_names[&function].clone(),
            params,
            return_type: ast_type(function.return_type),
            stage,
            body,
            span: Span::default(),
        })
    }

    fn block_statements(&mut self, block: Block<'g>, ctx: TermCtx) -> WriteResult<Vec<ast::Stmt>> {
        let body = block.body().ok_or_else(|| {
            WriteError::InconsistentModule("block does not end in a terminator".into())
        })?;
        if !block.params.is_empty() {
            return Err(WriteError::Unsupported(
                "block parameters have no source form".into(),
            ));
        }
        let mut stmts = Vec::new();
        for inst in &body.instructions {
            self.instruction(inst, &mut stmts)?;
        }
        self.terminator(&body.terminator, ctx, &mut stmts)?;
        Ok(stmts)
    }

    fn terminator(
        &mut self,
        terminator: &Terminator<'g>,
        ctx: TermCtx,
        stmts: &mut Vec<ast::Stmt>,
    ) -> WriteResult<()> {
        match terminator {
            Terminator::Return { value } => {
                let value = match value {
                    Some(value) => Some(self.value_expr_value_ctx(value.value())?),
                    None => {
                        if ctx == TermCtx::FunctionBody {
                            // the implicit return at the end of a void body
                            return Ok(());
                        }
                        None
                    }
                };
                stmts.push(stmt(ast::StmtKind::Return(value)));
            }
            Terminator::ExitIf { arguments, .. } => {
                if !arguments.is_empty() {
                    return Err(WriteError::Unsupported(
                        "exit_if with merge values outside a reconstructible if".into(),
                    ));
                }
            }
            Terminator::ExitSwitch { arguments, .. } => {
                if !arguments.is_empty() {
                    return Err(WriteError::Unsupported(
                        "exit_switch with merge values".into(),
                    ));
                }
                if ctx != TermCtx::SwitchCase {
                    stmts.push(stmt(ast::StmtKind::Break));
                }
            }
            Terminator::ExitLoop { arguments, .. } => {
                if !arguments.is_empty() {
                    return Err(WriteError::Unsupported("exit_loop with merge values".into()));
                }
                stmts.push(stmt(ast::StmtKind::Break));
            }
            Terminator::Continue { arguments, .. } => {
                if !arguments.is_empty() {
                    return Err(WriteError::Unsupported(
                        "continue with block arguments".into(),
                    ));
                }
                if ctx != TermCtx::LoopBody {
                    stmts.push(stmt(ast::StmtKind::Continue));
                }
            }
            Terminator::NextIteration { arguments, .. } => {
                if !arguments.is_empty() {
                    return Err(WriteError::Unsupported(
                        "next_iteration with block arguments".into(),
                    ));
                }
            }
            Terminator::BreakIf { condition, .. } => {
                let condition = self.value_expr_value_ctx(condition.value())?;
                stmts.push(stmt(ast::StmtKind::BreakIf(condition)));
            }
            Terminator::Unreachable => {}
        }
        Ok(())
    }

    fn instruction(&mut self, inst: &Inst<'g>, stmts: &mut Vec<ast::Stmt>) -> WriteResult<()> {
        match &inst.data {
            InstData::Var(var) => {
                let pointer_type = var.result.value().value_type;
                let store_type = pointer_type.pointee().ok_or_else(|| {
                    WriteError::InconsistentModule("var result must be pointer-typed".into())
                })?;
                let init = match &var.initializer {
                    Some(initializer) => Some(self.value_expr_value_ctx(initializer.value())?),
                    None => None,
                };
                let name = self.fresh_name(&var.result.value().name.get());
                self.bindings.insert(
                    var.result.value(),
                    Binding::Variable {
                        name: name.clone(),
                        ptr_kind: PtrKind::Ref,
                    },
                );
                stmts.push(stmt(ast::StmtKind::Var {
                    name,
                    store_type: ast_type(store_type),
                    init,
                }));
            }
            InstData::Let(let_) => {
                let init = self.value_expr_value_ctx(let_.value.value())?;
                self.materialize(let_.result.value(), init, PtrKind::Ptr, stmts)?;
            }
            InstData::Store(store) => {
                let lhs = self.value_expr(store.pointer.value(), PtrKind::Ref)?;
                let rhs = self.value_expr_value_ctx(store.value.value())?;
                stmts.push(stmt(ast::StmtKind::Assign { lhs, rhs }));
            }
            InstData::StoreVectorElement(store) => {
                let object = self.value_expr(store.pointer.value(), PtrKind::Ref)?;
                let index = self.value_expr_value_ctx(store.index.value())?;
                let lhs = index_place_expr(object, index, store.pointer.value())?;
                let rhs = self.value_expr_value_ctx(store.value.value())?;
                stmts.push(stmt(ast::StmtKind::Assign { lhs, rhs }));
            }
            InstData::Load(load) => {
                let place = self.value_expr(load.pointer.value(), PtrKind::Ref)?;
                self.bind_result(load.result.value(), place, PtrKind::Ref, true, stmts)?;
            }
            InstData::LoadVectorElement(load) => {
                let object = self.value_expr(load.pointer.value(), PtrKind::Ref)?;
                let index = self.value_expr_value_ctx(load.index.value())?;
                let place = index_place_expr(object, index, load.pointer.value())?;
                self.bind_result(load.result.value(), place, PtrKind::Ref, true, stmts)?;
            }
            InstData::Access(access) => {
                let expr = self.access_expr(access)?;
                self.bind_result(access.result.value(), expr, PtrKind::Ref, false, stmts)?;
            }
            InstData::Unary(unary) => {
                let operand = self.value_expr_value_ctx(unary.operand.value())?;
                let op = match unary.op {
                    UnaryOp::Negation => ast::UnaryOp::Negation,
                    UnaryOp::Complement => ast::UnaryOp::Complement,
                    UnaryOp::Not => ast::UnaryOp::Not,
                };
                let expr = ast::Expr {
                    ty: ast_type(unary.result.value().value_type),
                    kind: ast::ExprKind::Unary {
                        op,
                        expr: Box::new(operand),
                    },
                    span: Span::default(),
                };
                self.bind_result(unary.result.value(), expr, PtrKind::Ref, false, stmts)?;
            }
            InstData::Binary(binary) => {
                let lhs = self.value_expr_value_ctx(binary.operands[0].value())?;
                let rhs = self.value_expr_value_ctx(binary.operands[1].value())?;
                let expr = ast::Expr {
                    ty: ast_type(binary.result.value().value_type),
                    kind: ast::ExprKind::Binary {
                        op: ast_binary_op(binary.op),
                        lhs: Box::new(lhs),
                        rhs: Box::new(rhs),
                    },
                    span: Span::default(),
                };
                self.bind_result(binary.result.value(), expr, PtrKind::Ref, false, stmts)?;
            }
            InstData::Call(call) => {
                let mut args = Vec::with_capacity(call.arguments.len());
                for argument in &call.arguments {
                    args.push(self.value_expr_value_ctx(argument.value())?);
                }
                let target = match &call.target {
                    CallTarget::Function(function) => ast::CallTarget::Function(
                        self.function_names
                            .get(&function.value())
                            .cloned()
                            .ok_or_else(|| {
                                WriteError::InconsistentModule(
                                    "call targets a function outside this module".into(),
                                )
                            })?,
                    ),
                    CallTarget::Builtin(builtin) => {
                        ast::CallTarget::Builtin(ast_builtin(*builtin))
                    }
                };
                let result = call.result.value();
                let expr = ast::Expr {
                    ty: ast_type(result.value_type),
                    kind: ast::ExprKind::Call { target, args },
                    span: Span::default(),
                };
                if result.value_type.is_void() || self.uses.count(result) == 0 {
                    stmts.push(stmt(ast::StmtKind::Call(expr)));
                    self.bindings.insert(result, Binding::Consumed);
                } else {
                    self.bind_result(result, expr, PtrKind::Ref, true, stmts)?;
                }
            }
            InstData::Construct(construct) => {
                let mut args = Vec::with_capacity(construct.arguments.len());
                for argument in &construct.arguments {
                    args.push(self.value_expr_value_ctx(argument.value())?);
                }
                let expr = ast::Expr {
                    ty: ast_type(construct.result.value().value_type),
                    kind: ast::ExprKind::Call {
                        target: ast::CallTarget::Construct,
                        args,
                    },
                    span: Span::default(),
                };
                self.bind_result(construct.result.value(), expr, PtrKind::Ref, false, stmts)?;
            }
            InstData::Convert(convert) => {
                let argument = self.value_expr_value_ctx(convert.argument.value())?;
                let expr = ast::Expr {
                    ty: ast_type(convert.result.value().value_type),
                    kind: ast::ExprKind::Call {
                        target: ast::CallTarget::Convert,
                        args: vec![argument],
                    },
                    span: Span::default(),
                };
                self.bind_result(convert.result.value(), expr, PtrKind::Ref, false, stmts)?;
            }
            InstData::Bitcast(bitcast) => {
                let argument = self.value_expr_value_ctx(bitcast.argument.value())?;
                let expr = ast::Expr {
                    ty: ast_type(bitcast.result.value().value_type),
                    kind: ast::ExprKind::Bitcast(Box::new(argument)),
                    span: Span::default(),
                };
                self.bind_result(bitcast.result.value(), expr, PtrKind::Ref, false, stmts)?;
            }
            InstData::Swizzle(swizzle) => {
                let object = self.value_expr_value_ctx(swizzle.vector.value())?;
                let expr = ast::Expr {
                    ty: ast_type(swizzle.result.value().value_type),
                    kind: ast::ExprKind::Swizzle {
                        object: Box::new(object),
                        indices: swizzle.indices.clone(),
                    },
                    span: Span::default(),
                };
                self.bind_result(swizzle.result.value(), expr, PtrKind::Ref, false, stmts)?;
            }
            InstData::Discard(_) => stmts.push(stmt(ast::StmtKind::Discard)),
            InstData::If(if_) => self.if_inst(*if_, stmts)?,
            InstData::Loop(loop_) => self.loop_inst(*loop_, stmts)?,
            InstData::Switch(switch) => self.switch_inst(*switch, stmts)?,
        }
        Ok(())
    }

    fn if_inst(&mut self, if_: IdRef<'g, IfData<'g>>, stmts: &mut Vec<ast::Stmt>) -> WriteResult<()> {
        if !if_.results.is_empty() {
            return self.if_with_results(if_, stmts);
        }
        let condition = self.value_expr_value_ctx(if_.condition.value())?;
        let body = self.block_statements(if_.true_block, TermCtx::IfBranch)?;
        let else_ = match if_.false_block {
            Some(false_block) => {
                let mut else_stmts = self.block_statements(false_block, TermCtx::IfBranch)?;
                if else_stmts.len() == 1
                    && matches!(else_stmts[0].kind, ast::StmtKind::If { .. })
                {
                    Some(Box::new(else_stmts.remove(0)))
                } else {
                    Some(Box::new(stmt(ast::StmtKind::Block(else_stmts))))
                }
            }
            None => None,
        };
        stmts.push(stmt(ast::StmtKind::If {
            condition,
            body,
            else_,
        }));
        Ok(())
    }

    /// an `if` with a result is a short-circuit `&&`/`||` when one branch
    /// immediately exits with the operator's absorbing constant; anything
    /// else falls back to a `var` assigned in both branches
    fn if_with_results(
        &mut self,
        if_: IdRef<'g, IfData<'g>>,
        stmts: &mut Vec<ast::Stmt>,
    ) -> WriteResult<()> {
        let result = match &*if_.results {
            [result] if result.value().value_type.is_bool() => result.value(),
            _ => {
                return Err(WriteError::Unsupported(
                    "if with non-boolean or multiple results".into(),
                ))
            }
        };
        let false_block = match if_.false_block {
            Some(false_block) => false_block,
            None => {
                return Err(WriteError::Unsupported(
                    "if with results requires both branches".into(),
                ))
            }
        };
        // `a && b`: the false branch exits with `false`.
        // `a || b`: the true branch exits with `true`.
        let and_shape = block_exits_with_constant(false_block, false);
        let or_shape = block_exits_with_constant(if_.true_block, true);
        let (op, rhs_block) = if and_shape {
            (ast::BinaryOp::LogicalAnd, if_.true_block)
        } else if or_shape {
            (ast::BinaryOp::LogicalOr, false_block)
        } else {
            return self.if_result_fallback(if_, result, stmts);
        };
        let lhs = self.value_expr_value_ctx(if_.condition.value())?;
        let rhs_body = rhs_block.body().ok_or_else(|| {
            WriteError::InconsistentModule("block does not end in a terminator".into())
        })?;
        let mut rhs_stmts = Vec::new();
        for inst in &rhs_body.instructions {
            self.instruction(inst, &mut rhs_stmts)?;
        }
        let rhs_value = match &rhs_body.terminator {
            Terminator::ExitIf { arguments, .. } if arguments.len() == 1 => arguments[0].value(),
            _ => {
                return Err(WriteError::InconsistentModule(
                    "short-circuit branch must exit with its value".into(),
                ))
            }
        };
        let rhs = self.value_expr_value_ctx(rhs_value)?;
        if !rhs_stmts.is_empty() {
            // evaluation of the right side did not fold into an
            // expression; the short-circuit form cannot represent it
            return Err(WriteError::Unsupported(
                "short-circuit right side requires statements".into(),
            ));
        }
        let expr = ast::Expr {
            ty: ast::Type::Bool,
            kind: ast::ExprKind::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            },
            span: Span::default(),
        };
        self.bind_result(result, expr, PtrKind::Ref, true, stmts)
    }

    /// the general form: `var tmp : bool; if c { tmp = ..; } else { tmp = ..; }`
    fn if_result_fallback(
        &mut self,
        if_: IdRef<'g, IfData<'g>>,
        result: IdRef<'g, Value<'g>>,
        stmts: &mut Vec<ast::Stmt>,
    ) -> WriteResult<()> {
        let name = self.fresh_name(&result.name.get());
        stmts.push(stmt(ast::StmtKind::Var {
            name: name.clone(),
            store_type: ast_type(result.value_type),
            init: None,
        }));
        let condition = self.value_expr_value_ctx(if_.condition.value())?;
        let body = self.branch_with_exit_assign(if_.true_block, &name, result)?;
        let else_stmts = match if_.false_block {
            Some(false_block) => self.branch_with_exit_assign(false_block, &name, result)?,
            None => {
                return Err(WriteError::Unsupported(
                    "if with results requires both branches".into(),
                ))
            }
        };
        stmts.push(stmt(ast::StmtKind::If {
            condition,
            body,
            else_: Some(Box::new(stmt(ast::StmtKind::Block(else_stmts)))),
        }));
        self.bindings.insert(
            result,
            Binding::Variable {
                name,
                ptr_kind: PtrKind::Ref,
            },
        );
        Ok(())
    }

    fn branch_with_exit_assign(
        &mut self,
        block: Block<'g>,
        name: &str,
        result: IdRef<'g, Value<'g>>,
    ) -> WriteResult<Vec<ast::Stmt>> {
        let body = block.body().ok_or_else(|| {
            WriteError::InconsistentModule("block does not end in a terminator".into())
        })?;
        let mut stmts = Vec::new();
        for inst in &body.instructions {
            self.instruction(inst, &mut stmts)?;
        }
        match &body.terminator {
            Terminator::ExitIf { arguments, .. } if arguments.len() == 1 => {
                let value = self.value_expr_value_ctx(arguments[0].value())?;
                let lhs = ast::Expr {
                    ty: ast::Type::reference(
                        ast::AddressSpace::Function,
                        ast_type(result.value_type),
                        ast::Access::ReadWrite,
                    ),
                    kind: ast::ExprKind::Ident(name.to_string()),
                    span: Span::default(),
                };
                stmts.push(stmt(ast::StmtKind::Assign { lhs, rhs: value }));
            }
            other => {
                self.terminator(other, TermCtx::IfBranch, &mut stmts)?;
            }
        }
        Ok(stmts)
    }

    fn loop_inst(
        &mut self,
        loop_: IdRef<'g, LoopData<'g>>,
        stmts: &mut Vec<ast::Stmt>,
    ) -> WriteResult<()> {
        if !loop_.results.is_empty() {
            return Err(WriteError::Unsupported("loop with results".into()));
        }
        // the initializer region has no clause in the general loop form;
        // its statements are hoisted directly before the loop
        if let Some(initializer) = loop_.initializer {
            let mut initializer_stmts =
                self.block_statements(initializer, TermCtx::LoopInitializer)?;
            stmts.append(&mut initializer_stmts);
        }
        let body = self.block_statements(loop_.body, TermCtx::LoopBody)?;
        let continuing = match loop_.continuing {
            Some(continuing) => {
                Some(self.block_statements(continuing, TermCtx::LoopContinuing)?)
            }
            None => None,
        };
        stmts.push(stmt(ast::StmtKind::Loop { body, continuing }));
        Ok(())
    }

    fn switch_inst(
        &mut self,
        switch: IdRef<'g, SwitchData<'g>>,
        stmts: &mut Vec<ast::Stmt>,
    ) -> WriteResult<()> {
        if !switch.results.is_empty() {
            return Err(WriteError::Unsupported("switch with results".into()));
        }
        let condition = self.value_expr_value_ctx(switch.condition.value())?;
        let mut cases = Vec::with_capacity(switch.cases.len());
        for case in &switch.cases {
            let selectors = case
                .selectors
                .iter()
                .map(|selector| match selector {
                    CaseSelector::Value(value) => {
                        Ok(ast::CaseSelector::Value(const_literal(*value)?))
                    }
                    CaseSelector::Default => Ok(ast::CaseSelector::Default),
                })
                .collect::<WriteResult<Vec<_>>>()?;
            cases.push(ast::SwitchCase {
                selectors,
                body: self.block_statements(case.block, TermCtx::SwitchCase)?,
                span: Span::default(),
            });
        }
        stmts.push(stmt(ast::StmtKind::Switch { condition, cases }));
        Ok(())
    }

    fn access_expr(&mut self, access: &shader_lang_ir::Access<'g>) -> WriteResult<ast::Expr> {
        let base_type = access.base.value_type();
        let pointer_parts = base_type.pointer_parts();
        let mut current_type = base_type.pointee().unwrap_or(base_type);
        let mut expr = self.value_expr(access.base.value(), PtrKind::Ref)?;
        for index in &access.indices {
            let const_index = index
                .value()
                .const_value
                .get()
                .and_then(|constant| constant.get().as_integer());
            let (kind, next_type) = match (current_type.get(), const_index) {
                (Type::Struct { members, .. }, Some(member)) => {
                    let member_type = members
                        .get(member as usize)
                        .map(|m| m.ty)
                        .ok_or_else(|| {
                            WriteError::InconsistentModule("struct member out of range".into())
                        })?;
                    (
                        ast::ExprKind::Member {
                            object: Box::new(expr),
                            member: member as u32,
                        },
                        member_type,
                    )
                }
                (Type::Vector { elem, .. }, Some(lane)) => (
                    ast::ExprKind::Swizzle {
                        object: Box::new(expr),
                        indices: vec![lane as u32],
                    },
                    *elem,
                ),
                _ => {
                    let index_expr = self.value_expr_value_ctx(index.value())?;
                    let next_type = current_type
                        .indexed_type(const_index, self.global_state)
                        .ok_or_else(|| {
                            WriteError::InconsistentModule(
                                "access does not index into its base type".into(),
                            )
                        })?;
                    (
                        ast::ExprKind::Index {
                            object: Box::new(expr),
                            index: Box::new(index_expr),
                        },
                        next_type,
                    )
                }
            };
            current_type = next_type;
            let ty = match pointer_parts {
                Some((space, access_mode)) => ast::Type::Reference {
                    space: ast_address_space(space),
                    store: Box::new(ast_type(current_type)),
                    access: ast_access(access_mode),
                },
                None => ast_type(current_type),
            };
            expr = ast::Expr {
                kind,
                ty,
                span: Span::default(),
            };
        }
        Ok(expr)
    }

    /// bind an instruction result: substitute at the single use site when
    /// the inlining analysis allows it, otherwise materialize. `sequenced`
    /// results with zero uses still need a statement to preserve effects.
    fn bind_result(
        &mut self,
        result: IdRef<'g, Value<'g>>,
        expr: ast::Expr,
        ptr_kind: PtrKind,
        effectful: bool,
        stmts: &mut Vec<ast::Stmt>,
    ) -> WriteResult<()> {
        if self.decisions.can_inline(result) {
            self.bindings
                .insert(result, Binding::Inlined { expr, ptr_kind });
            return Ok(());
        }
        if self.uses.count(result) == 0 {
            if effectful {
                // keep the effect with a phony assignment
                stmts.push(stmt(ast::StmtKind::Assign {
                    lhs: ast::Expr {
                        kind: ast::ExprKind::Phony,
                        ty: expr.ty.clone(),
                        span: Span::default(),
                    },
                    rhs: expr,
                }));
            }
            self.bindings.insert(result, Binding::Consumed);
            return Ok(());
        }
        self.materialize(result, expr, ptr_kind, stmts)
    }

    /// emit `let name = expr;` and bind the value to the name. `have` is
    /// the form `expr` is currently in, for pointer-typed results.
    fn materialize(
        &mut self,
        result: IdRef<'g, Value<'g>>,
        expr: ast::Expr,
        have: PtrKind,
        stmts: &mut Vec<ast::Stmt>,
    ) -> WriteResult<()> {
        let is_pointer = result.value_type.is_pointer();
        let init = if is_pointer && have == PtrKind::Ref {
            // a pointer-typed binding is declared in pointer form
            convert_ptr_kind(expr, PtrKind::Ptr, result.value_type)
        } else {
            expr
        };
        let name = self.fresh_name(&result.name.get());
        stmts.push(stmt(ast::StmtKind::Let {
            name: name.clone(),
            init,
        }));
        self.bindings.insert(
            result,
            Binding::Variable {
                name,
                ptr_kind: if is_pointer { PtrKind::Ptr } else { PtrKind::Ref },
            },
        );
        Ok(())
    }

    /// the expression for a value in a value-consuming position: pointer
    /// values are wanted in pointer form, everything else as-is
    fn value_expr_value_ctx(&mut self, value: IdRef<'g, Value<'g>>) -> WriteResult<ast::Expr> {
        let want = if value.value_type.is_pointer() {
            PtrKind::Ptr
        } else {
            PtrKind::Ref
        };
        self.value_expr(value, want)
    }

    fn value_expr(
        &mut self,
        value: IdRef<'g, Value<'g>>,
        want: PtrKind,
    ) -> WriteResult<ast::Expr> {
        if let Some(constant) = value.const_value.get() {
            return const_expr(constant);
        }
        let binding = self.bindings.get(&value).cloned().ok_or_else(|| {
            WriteError::InconsistentModule("use of a value with no binding".into())
        })?;
        match binding {
            Binding::Variable { name, ptr_kind } => {
                let ty = if value.value_type.is_pointer() {
                    match ptr_kind {
                        PtrKind::Ptr => ast_type(value.value_type),
                        PtrKind::Ref => ref_type(value.value_type),
                    }
                } else {
                    ast_type(value.value_type)
                };
                let expr = ast::Expr {
                    kind: ast::ExprKind::Ident(name),
                    ty,
                    span: Span::default(),
                };
                Ok(self.apply_ptr_kind(expr, ptr_kind, want, value))
            }
            Binding::Inlined { expr, ptr_kind } => {
                self.bindings.insert(value, Binding::Consumed);
                Ok(self.apply_ptr_kind(expr, ptr_kind, want, value))
            }
            Binding::Consumed => Err(WriteError::InconsistentModule(
                "single-use value consumed twice".into(),
            )),
        }
    }

    fn apply_ptr_kind(
        &self,
        expr: ast::Expr,
        have: PtrKind,
        want: PtrKind,
        value: IdRef<'g, Value<'g>>,
    ) -> ast::Expr {
        if !value.value_type.is_pointer() || have == want {
            return expr;
        }
        convert_ptr_kind(expr, want, value.value_type)
    }

    /// a fresh source name: the value's own name when it is free, with a
    /// numeric suffix otherwise; generated `v_{N}` names for unnamed values
    fn fresh_name(&mut self, base: &str) -> String {
        if !base.is_empty() && self.used_names.insert(base.to_string()) {
            return base.to_string();
        }
        let base = if base.is_empty() { "v" } else { base };
        for n in 1.. {
            let candidate = format!("{}_{}", base, n);
            if self.used_names.insert(candidate.clone()) {
                return candidate;
            }
        }
        unreachable!()
    }
}

fn stmt(kind: ast::StmtKind) -> ast::Stmt {
    ast::Stmt {
        kind,
        span: Span::default(),
    }
}

/// `true` when the block has no instructions and exits its `if` with the
/// given boolean constant -- the shape of a short-circuit's skipped side
fn block_exits_with_constant(block: Block<'_>, expected: bool) -> bool {
    let body = match block.body() {
        Some(body) => body,
        None => return false,
    };
    if !body.instructions.is_empty() {
        return false;
    }
    match &body.terminator {
        Terminator::ExitIf { arguments, .. } if arguments.len() == 1 => arguments[0]
            .value()
            .const_value
            .get()
            .and_then(|constant| constant.get().as_bool())
            == Some(expected),
        _ => false,
    }
}

/// `lhs[index]` as a place expression over a pointer-to-vector
fn index_place_expr<'g>(
    object: ast::Expr,
    index: ast::Expr,
    pointer: IdRef<'g, Value<'g>>,
) -> WriteResult<ast::Expr> {
    let pointee = pointer.value_type.pointee().ok_or_else(|| {
        WriteError::InconsistentModule("vector element access needs a pointer".into())
    })?;
    let (elem, _) = pointee.vector_parts().ok_or_else(|| {
        WriteError::InconsistentModule("vector element access needs a vector".into())
    })?;
    let (space, access) = pointer.value_type.pointer_parts().unwrap();
    Ok(ast::Expr {
        ty: ast::Type::Reference {
            space: ast_address_space(space),
            store: Box::new(ast_type(elem)),
            access: ast_access(access),
        },
        kind: ast::ExprKind::Index {
            object: Box::new(object),
            index: Box::new(index),
        },
        span: Span::default(),
    })
}

fn convert_ptr_kind(expr: ast::Expr, to: PtrKind, pointer_type: Interned<'_, Type<'_>>) -> ast::Expr {
    match to {
        PtrKind::Ptr => ast::Expr {
            ty: ast_type(pointer_type),
            kind: ast::ExprKind::Unary {
                op: ast::UnaryOp::AddressOf,
                expr: Box::new(expr),
            },
            span: Span::default(),
        },
        PtrKind::Ref => ast::Expr {
            ty: ref_type(pointer_type),
            kind: ast::ExprKind::Unary {
                op: ast::UnaryOp::Indirection,
                expr: Box::new(expr),
            },
            span: Span::default(),
        },
    }
}

fn const_expr(constant: Interned<'_, Const<'_>>) -> WriteResult<ast::Expr> {
    match constant.get() {
        Const::Composite { ty, elements } => {
            let args = elements
                .iter()
                .map(|element| const_expr(*element))
                .collect::<WriteResult<Vec<_>>>()?;
            Ok(ast::Expr {
                ty: ast_type(*ty),
                kind: ast::ExprKind::Call {
                    target: ast::CallTarget::Construct,
                    args,
                },
                span: Span::default(),
            })
        }
        _ => {
            let literal = const_literal(constant)?;
            Ok(ast::Expr {
                ty: literal.ty(),
                kind: ast::ExprKind::Literal(literal),
                span: Span::default(),
            })
        }
    }
}

fn const_literal(constant: Interned<'_, Const<'_>>) -> WriteResult<ast::Literal> {
    match constant.get() {
        Const::Bool(v) => Ok(ast::Literal::Bool(*v)),
        Const::I32(v) => Ok(ast::Literal::I32(*v)),
        Const::U32(v) => Ok(ast::Literal::U32(*v)),
        Const::F32(v) => Ok(ast::Literal::F32(v.to_f32())),
        Const::F16(v) => Ok(ast::Literal::F16(v.to_f32())),
        Const::Composite { .. } => Err(WriteError::InconsistentModule(
            "composite constant used where a literal is required".into(),
        )),
    }
}

fn ast_type(ty: Interned<'_, Type<'_>>) -> ast::Type {
    match ty.get() {
        Type::Void => ast::Type::Void,
        Type::Bool => ast::Type::Bool,
        Type::Int(shader_lang_ir::IntType::I32) => ast::Type::I32,
        Type::Int(shader_lang_ir::IntType::U32) => ast::Type::U32,
        Type::Float(shader_lang_ir::FloatType::F32) => ast::Type::F32,
        Type::Float(shader_lang_ir::FloatType::F16) => ast::Type::F16,
        Type::Vector { size, elem } => ast::Type::Vector {
            size: *size,
            elem: Box::new(ast_type(*elem)),
        },
        Type::Matrix {
            columns,
            rows,
            elem,
        } => ast::Type::Matrix {
            columns: *columns,
            rows: *rows,
            elem: Box::new(ast_type(*elem)),
        },
        Type::Array { elem, count } => ast::Type::Array {
            elem: Box::new(ast_type(*elem)),
            count: *count,
        },
        Type::Struct { name, members } => ast::Type::Struct(ast::StructType {
            name: name.to_string(),
            members: members
                .iter()
                .map(|member| ast::StructMember {
                    name: member.name.to_string(),
                    ty: ast_type(member.ty),
                })
                .collect(),
        }),
        Type::Pointer {
            space,
            store,
            access,
        } => ast::Type::Pointer {
            space: ast_address_space(*space),
            store: Box::new(ast_type(*store)),
            access: ast_access(*access),
        },
    }
}

/// the reference form of a pointer type, for place expressions
fn ref_type(pointer_type: Interned<'_, Type<'_>>) -> ast::Type {
    match pointer_type.get() {
        Type::Pointer {
            space,
            store,
            access,
        } => ast::Type::Reference {
            space: ast_address_space(*space),
            store: Box::new(ast_type(*store)),
            access: ast_access(*access),
        },
        _ => ast_type(pointer_type),
    }
}

fn ast_address_space(space: AddressSpace) -> ast::AddressSpace {
    match space {
        AddressSpace::Function => ast::AddressSpace::Function,
        AddressSpace::Private => ast::AddressSpace::Private,
        AddressSpace::Storage => ast::AddressSpace::Storage,
        AddressSpace::Uniform => ast::AddressSpace::Uniform,
        AddressSpace::Workgroup => ast::AddressSpace::Workgroup,
    }
}

fn ast_access(access: AccessMode) -> ast::Access {
    match access {
        AccessMode::Read => ast::Access::Read,
        AccessMode::ReadWrite => ast::Access::ReadWrite,
        AccessMode::Write => ast::Access::Write,
    }
}

fn ast_binary_op(op: BinaryOp) -> ast::BinaryOp {
    match op {
        BinaryOp::Add => ast::BinaryOp::Add,
        BinaryOp::Subtract => ast::BinaryOp::Subtract,
        BinaryOp::Multiply => ast::BinaryOp::Multiply,
        BinaryOp::Divide => ast::BinaryOp::Divide,
        BinaryOp::Modulo => ast::BinaryOp::Modulo,
        BinaryOp::And => ast::BinaryOp::And,
        BinaryOp::Or => ast::BinaryOp::Or,
        BinaryOp::Xor => ast::BinaryOp::Xor,
        BinaryOp::Equal => ast::BinaryOp::Equal,
        BinaryOp::NotEqual => ast::BinaryOp::NotEqual,
        BinaryOp::LessThan => ast::BinaryOp::LessThan,
        BinaryOp::GreaterThan => ast::BinaryOp::GreaterThan,
        BinaryOp::LessThanEqual => ast::BinaryOp::LessThanEqual,
        BinaryOp::GreaterThanEqual => ast::BinaryOp::GreaterThanEqual,
        BinaryOp::ShiftLeft => ast::BinaryOp::ShiftLeft,
        BinaryOp::ShiftRight => ast::BinaryOp::ShiftRight,
    }
}

fn ast_builtin(builtin: BuiltinFn) -> ast::BuiltinFn {
    match builtin {
        BuiltinFn::Abs => ast::BuiltinFn::Abs,
        BuiltinFn::Ceil => ast::BuiltinFn::Ceil,
        BuiltinFn::Clamp => ast::BuiltinFn::Clamp,
        BuiltinFn::Cos => ast::BuiltinFn::Cos,
        BuiltinFn::Cross => ast::BuiltinFn::Cross,
        BuiltinFn::Distance => ast::BuiltinFn::Distance,
        BuiltinFn::Dot => ast::BuiltinFn::Dot,
        BuiltinFn::Floor => ast::BuiltinFn::Floor,
        BuiltinFn::Length => ast::BuiltinFn::Length,
        BuiltinFn::Max => ast::BuiltinFn::Max,
        BuiltinFn::Min => ast::BuiltinFn::Min,
        BuiltinFn::Mix => ast::BuiltinFn::Mix,
        BuiltinFn::Normalize => ast::BuiltinFn::Normalize,
        BuiltinFn::Pow => ast::BuiltinFn::Pow,
        BuiltinFn::Sin => ast::BuiltinFn::Sin,
        BuiltinFn::Sqrt => ast::BuiltinFn::Sqrt,
    }
}

#[cfg(test)]
mod tests {
    use super::to_program;
    use shader_lang_ast as ast;
    use shader_lang_ast::printer::program_to_source;
    use shader_lang_ast::{Span, Type};
    use shader_lang_ast_to_ir::build;
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

    /// lower, write, re-lower, re-write: the second writing must be
    /// byte-identical to the first
    fn assert_fixpoint(p: &ast::Program) -> String {
        let global_state = GlobalState::new();
        let m1 = build(p, None, &global_state).unwrap();
        validate(&m1, &global_state).unwrap();
        let p2 = to_program(&m1, &global_state).unwrap();
        let text2 = program_to_source(&p2);
        let m2 = build(&p2, None, &global_state).unwrap();
        validate(&m2, &global_state).unwrap();
        let p3 = to_program(&m2, &global_state).unwrap();
        assert_eq!(program_to_source(&p3), text2);
        text2
    }

    #[test]
    fn test_var_let_round_trip() {
        // fn f(p : i32) -> i32 { var x : i32 = p + 1; return x * x; }
        let x_ref = || Type::reference(ast::AddressSpace::Function, Type::I32, ast::Access::ReadWrite);
        let p = program(vec![function(
            "f",
            vec![("p", Type::I32)],
            Type::I32,
            vec![
                stmt(ast::StmtKind::Var {
                    name: "x".into(),
                    store_type: Type::I32,
                    init: Some(binary(
                        ast::BinaryOp::Add,
                        ident("p", Type::I32),
                        literal(ast::Literal::I32(1)),
                        Type::I32,
                    )),
                }),
                stmt(ast::StmtKind::Return(Some(binary(
                    ast::BinaryOp::Multiply,
                    ident("x", x_ref()),
                    ident("x", x_ref()),
                    Type::I32,
                )))),
            ],
        )]);
        let text = assert_fixpoint(&p);
        let expected = concat!(
            "fn f(p : i32) -> i32 {\n",
            "    var x : i32 = p + 1;\n",
            "    return x * x;\n",
            "}\n",
        );
        assert_eq!(text, expected);
    }

    #[test]
    fn test_short_circuit_round_trip() {
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
        let text = assert_fixpoint(&p);
        let expected = concat!(
            "fn and(a : bool, b : bool) -> bool {\n",
            "    return a && b;\n",
            "}\n",
        );
        assert_eq!(text, expected);
    }

    #[test]
    fn test_twice_used_result_materializes_as_let() {
        use shader_lang_ir::{
            Binary, BinaryOp, Function, FunctionKind, Inst, Module, Terminator, Type as IrType,
            ValueDefinition, ValueUse,
        };
        let global_state = GlobalState::new();
        let global_state = &global_state;
        let i32_ty = IrType::i32(global_state);
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

        let p = to_program(&module, global_state).unwrap();
        let expected = concat!(
            "fn f(p : i32) -> i32 {\n",
            "    let v_1 = p + 1;\n",
            "    return v_1 * v_1;\n",
            "}\n",
        );
        assert_eq!(program_to_source(&p), expected);
    }

    #[test]
    fn test_while_round_trip_is_stable() {
        // fn f(n : i32) { var x : i32 = 0; while x < n { x = x + 1; } }
        let x_ref = || Type::reference(ast::AddressSpace::Function, Type::I32, ast::Access::ReadWrite);
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
        let text = assert_fixpoint(&p);
        let expected = concat!(
            "fn f(n : i32) {\n",
            "    var x : i32 = 0;\n",
            "    loop {\n",
            "        if x < n {\n",
            "        } else {\n",
            "            break;\n",
            "        }\n",
            "        x = x + 1;\n",
            "    }\n",
            "}\n",
        );
        assert_eq!(text, expected);

        // writing the normal form changes nothing at the IR level either
        let global_state = GlobalState::new();
        let m1 = build(&p, None, &global_state).unwrap();
        let p2 = to_program(&m1, &global_state).unwrap();
        let m2 = build(&p2, None, &global_state).unwrap();
        assert_eq!(disasm::disassemble(&m1), disasm::disassemble(&m2));
    }

    #[test]
    fn test_for_loop_initializer_hoists_and_stabilizes() {
        // fn main() { for (var i : i32 = 0; i < 5; i = i + 1) {} }
        let i_ref = || Type::reference(ast::AddressSpace::Function, Type::I32, ast::Access::ReadWrite);
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
        let text = assert_fixpoint(&p);
        let expected = concat!(
            "fn main() {\n",
            "    var i : i32 = 0;\n",
            "    loop {\n",
            "        if i < 5 {\n",
            "        } else {\n",
            "            break;\n",
            "        }\n",
            "        continuing {\n",
            "            i = i + 1;\n",
            "        }\n",
            "    }\n",
            "}\n",
        );
        assert_eq!(text, expected);
    }

    #[test]
    fn test_switch_and_globals_round_trip() {
        // @group(0) @binding(1) var<storage, read_write> counter : i32;
        // fn f(v : i32) -> i32 { switch v { case 0 { return 1; }
        //                                   case 1, default { return 2; } } }
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
            ),
        ]);
        let text = assert_fixpoint(&p);
        let expected = concat!(
            "@group(0) @binding(1) var<storage, read_write> counter : i32;\n",
            "\n",
            "fn f(v : i32) -> i32 {\n",
            "    switch v {\n",
            "        case 0i {\n",
            "            return 1i;\n",
            "        }\n",
            "        case 1i, default {\n",
            "            return 2i;\n",
            "        }\n",
            "    }\n",
            "}\n",
        );
        assert_eq!(text, expected);
    }
}
