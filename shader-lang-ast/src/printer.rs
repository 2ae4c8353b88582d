// SPDX-License-Identifier: LGPL-2.1-or-later
// See Notices.txt for copyright information

//! deterministic source rendering of a resolved `Program`
//!
//! Used by round-trip tests as the canonical spelling of a program, and by
//! the IR builder to attach the offending program to failure notes. Output
//! is stable: the same `Program` always renders to the same text.

use crate::nodes::{
    BinaryOp, CallTarget, CaseSelector, Expr, ExprKind, FunctionDecl, GlobalDecl, GlobalVar,
    Literal, Program, Stage, Stmt, StmtKind, SwitchCase, UnaryOp,
};
use crate::types::{AddressSpace, Type};
use std::fmt::Write;

const SWIZZLE_LETTERS: [char; 4] = ['x', 'y', 'z', 'w'];

/// render `program` as source text
pub fn program_to_source(program: &Program) -> String {
    let mut p = Printer {
        out: String::new(),
        indent: 0,
    };
    p.program(program);
    p.out
}

struct Printer {
    out: String,
    indent: usize,
}

impl Printer {
    fn line_start(&mut self) {
        for _ in 0..self.indent {
            self.out.push_str("    ");
        }
    }
    fn line(&mut self, text: &str) {
        self.line_start();
        self.out.push_str(text);
        self.out.push('\n');
    }

    fn program(&mut self, program: &Program) {
        let mut first = true;
        for decl in &program.decls {
            if !std::mem::replace(&mut first, false) {
                self.out.push('\n');
            }
            match decl {
                GlobalDecl::Var(v) => self.global_var(v),
                GlobalDecl::Override(o) => {
                    self.line(&format!("override {} : {};", o.name, o.ty));
                }
                GlobalDecl::Function(f) => self.function(f),
            }
        }
    }

    fn global_var(&mut self, v: &GlobalVar) {
        self.line_start();
        if let Some(binding) = v.binding {
            write!(
                self.out,
                "@group({}) @binding({}) ",
                binding.group, binding.binding
            )
            .unwrap();
        }
        match v.space {
            AddressSpace::Storage => {
                write!(self.out, "var<storage, {}>", v.access.text()).unwrap()
            }
            space => write!(self.out, "var<{}>", space.text()).unwrap(),
        }
        write!(self.out, " {} : {}", v.name, v.store_type).unwrap();
        if let Some(init) = &v.init {
            write!(self.out, " = {}", ExprText(init)).unwrap();
        }
        self.out.push_str(";\n");
    }

    fn function(&mut self, f: &FunctionDecl) {
        self.line_start();
        match f.stage {
            Some(Stage::Vertex) => self.out.push_str("@vertex\n"),
            Some(Stage::Fragment) => self.out.push_str("@fragment\n"),
            Some(Stage::Compute { workgroup_size }) => {
                writeln!(
                    self.out,
                    "@compute @workgroup_size({}, {}, {})",
                    workgroup_size[0], workgroup_size[1], workgroup_size[2]
                )
                .unwrap();
            }
            None => {}
        }
        if f.stage.is_some() {
            self.line_start();
        }
        write!(self.out, "fn {}(", f.name).unwrap();
        let mut first = true;
        for param in &f.params {
            if !std::mem::replace(&mut first, false) {
                self.out.push_str(", ");
            }
            write!(self.out, "{} : {}", param.name, param.ty).unwrap();
        }
        self.out.push(')');
        if f.return_type != Type::Void {
            write!(self.out, " -> {}", f.return_type).unwrap();
        }
        self.out.push_str(" {\n");
        self.indent += 1;
        self.stmts(&f.body);
        self.indent -= 1;
        self.line("}");
    }

    fn stmts(&mut self, stmts: &[Stmt]) {
        for stmt in stmts {
            self.stmt(stmt);
        }
    }

    fn stmt(&mut self, stmt: &Stmt) {
        match &stmt.kind {
            StmtKind::Assign { lhs, rhs } => {
                if lhs.is_phony() {
                    self.line(&format!("_ = {};", ExprText(rhs)));
                } else {
                    self.line(&format!("{} = {};", ExprText(lhs), ExprText(rhs)));
                }
            }
            StmtKind::CompoundAssign { op, lhs, rhs } => {
                self.line(&format!(
                    "{} {}= {};",
                    ExprText(lhs),
                    binary_op_text(*op),
                    ExprText(rhs)
                ));
            }
            StmtKind::IncrementDecrement { lhs, increment } => {
                let op = if *increment { "++" } else { "--" };
                self.line(&format!("{}{};", ExprText(lhs), op));
            }
            StmtKind::Block(stmts) => {
                self.line("{");
                self.indent += 1;
                self.stmts(stmts);
                self.indent -= 1;
                self.line("}");
            }
            StmtKind::Break => self.line("break;"),
            StmtKind::BreakIf(cond) => self.line(&format!("break if {};", ExprText(cond))),
            StmtKind::Continue => self.line("continue;"),
            StmtKind::Discard => self.line("discard;"),
            StmtKind::Call(expr) => self.line(&format!("{};", ExprText(expr))),
            StmtKind::If {
                condition,
                body,
                else_,
            } => {
                self.line(&format!("if {} {{", ExprText(condition)));
                self.indent += 1;
                self.stmts(body);
                self.indent -= 1;
                self.else_chain(else_.as_deref());
            }
            StmtKind::Loop { body, continuing } => {
                self.line("loop {");
                self.indent += 1;
                self.stmts(body);
                if let Some(continuing) = continuing {
                    self.line("continuing {");
                    self.indent += 1;
                    self.stmts(continuing);
                    self.indent -= 1;
                    self.line("}");
                }
                self.indent -= 1;
                self.line("}");
            }
            StmtKind::While { condition, body } => {
                self.line(&format!("while {} {{", ExprText(condition)));
                self.indent += 1;
                self.stmts(body);
                self.indent -= 1;
                self.line("}");
            }
            StmtKind::For {
                initializer,
                condition,
                continuing,
                body,
            } => {
                self.line_start();
                self.out.push_str("for (");
                if let Some(init) = initializer {
                    self.inline_stmt(init);
                }
                self.out.push_str("; ");
                if let Some(cond) = condition {
                    write!(self.out, "{}", ExprText(cond)).unwrap();
                }
                self.out.push_str("; ");
                if let Some(cont) = continuing {
                    self.inline_stmt(cont);
                }
                self.out.push_str(") {\n");
                self.indent += 1;
                self.stmts(body);
                self.indent -= 1;
                self.line("}");
            }
            StmtKind::Return(value) => match value {
                Some(value) => self.line(&format!("return {};", ExprText(value))),
                None => self.line("return;"),
            },
            StmtKind::Switch { condition, cases } => {
                self.line(&format!("switch {} {{", ExprText(condition)));
                self.indent += 1;
                for case in cases {
                    self.switch_case(case);
                }
                self.indent -= 1;
                self.line("}");
            }
            StmtKind::Var {
                name,
                store_type,
                init,
            } => match init {
                Some(init) => {
                    self.line(&format!("var {} : {} = {};", name, store_type, ExprText(init)))
                }
                None => self.line(&format!("var {} : {};", name, store_type)),
            },
            StmtKind::Let { name, init } => {
                self.line(&format!("let {} = {};", name, ExprText(init)));
            }
            StmtKind::ConstAssert => {}
        }
    }

    /// a statement rendered without its line start and trailing `;`, for
    /// `for` headers
    fn inline_stmt(&mut self, stmt: &Stmt) {
        match &stmt.kind {
            StmtKind::Assign { lhs, rhs } => {
                write!(self.out, "{} = {}", ExprText(lhs), ExprText(rhs)).unwrap();
            }
            StmtKind::CompoundAssign { op, lhs, rhs } => {
                write!(
                    self.out,
                    "{} {}= {}",
                    ExprText(lhs),
                    binary_op_text(*op),
                    ExprText(rhs)
                )
                .unwrap();
            }
            StmtKind::IncrementDecrement { lhs, increment } => {
                let op = if *increment { "++" } else { "--" };
                write!(self.out, "{}{}", ExprText(lhs), op).unwrap();
            }
            StmtKind::Var {
                name,
                store_type,
                init,
            } => {
                write!(self.out, "var {} : {}", name, store_type).unwrap();
                if let Some(init) = init {
                    write!(self.out, " = {}", ExprText(init)).unwrap();
                }
            }
            StmtKind::Let { name, init } => {
                write!(self.out, "let {} = {}", name, ExprText(init)).unwrap();
            }
            StmtKind::Call(expr) => write!(self.out, "{}", ExprText(expr)).unwrap(),
            _ => unreachable!("statement not valid in a for header"),
        }
    }

    fn else_chain(&mut self, else_: Option<&Stmt>) {
        match else_ {
            None => self.line("}"),
            Some(stmt) => match &stmt.kind {
                StmtKind::If {
                    condition,
                    body,
                    else_,
                } => {
                    self.line(&format!("}} else if {} {{", ExprText(condition)));
                    self.indent += 1;
                    self.stmts(body);
                    self.indent -= 1;
                    self.else_chain(else_.as_deref());
                }
                StmtKind::Block(stmts) => {
                    self.line("} else {");
                    self.indent += 1;
                    self.stmts(stmts);
                    self.indent -= 1;
                    self.line("}");
                }
                _ => unreachable!("else branch must be a block or an if"),
            },
        }
    }

    fn switch_case(&mut self, case: &SwitchCase) {
        self.line_start();
        let only_default =
            case.selectors.len() == 1 && matches!(case.selectors[0], CaseSelector::Default);
        if only_default {
            self.out.push_str("default {");
        } else {
            self.out.push_str("case ");
            let mut first = true;
            for selector in &case.selectors {
                if !std::mem::replace(&mut first, false) {
                    self.out.push_str(", ");
                }
                match selector {
                    CaseSelector::Value(lit) => {
                        write!(self.out, "{}", literal_text(*lit)).unwrap()
                    }
                    CaseSelector::Default => self.out.push_str("default"),
                }
            }
            self.out.push_str(" {");
        }
        self.out.push('\n');
        self.indent += 1;
        self.stmts(&case.body);
        self.indent -= 1;
        self.line("}");
    }
}

/// the source spelling of a literal
pub fn literal_text(lit: Literal) -> String {
    match lit {
        Literal::Bool(v) => v.to_string(),
        Literal::I32(v) => format!("{}i", v),
        Literal::U32(v) => format!("{}u", v),
        Literal::F32(v) => format!("{:?}f", v),
        Literal::F16(v) => format!("{:?}h", v),
    }
}

/// the source spelling of a non-short-circuit binary operator
pub fn binary_op_text(op: BinaryOp) -> &'static str {
    match op {
        BinaryOp::Add => "+",
        BinaryOp::Subtract => "-",
        BinaryOp::Multiply => "*",
        BinaryOp::Divide => "/",
        BinaryOp::Modulo => "%",
        BinaryOp::And => "&",
        BinaryOp::Or => "|",
        BinaryOp::Xor => "^",
        BinaryOp::Equal => "==",
        BinaryOp::NotEqual => "!=",
        BinaryOp::LessThan => "<",
        BinaryOp::GreaterThan => ">",
        BinaryOp::LessThanEqual => "<=",
        BinaryOp::GreaterThanEqual => ">=",
        BinaryOp::ShiftLeft => "<<",
        BinaryOp::ShiftRight => ">>",
        BinaryOp::LogicalAnd => "&&",
        BinaryOp::LogicalOr => "||",
    }
}

fn binary_op_precedence(op: BinaryOp) -> u32 {
    match op {
        BinaryOp::Multiply | BinaryOp::Divide | BinaryOp::Modulo => 6,
        BinaryOp::Add | BinaryOp::Subtract => 5,
        BinaryOp::ShiftLeft | BinaryOp::ShiftRight => 4,
        BinaryOp::Equal
        | BinaryOp::NotEqual
        | BinaryOp::LessThan
        | BinaryOp::GreaterThan
        | BinaryOp::LessThanEqual
        | BinaryOp::GreaterThanEqual => 3,
        BinaryOp::And | BinaryOp::Or | BinaryOp::Xor => 2,
        BinaryOp::LogicalAnd | BinaryOp::LogicalOr => 1,
    }
}

/// wrapper rendering an expression via `Display`
pub struct ExprText<'a>(pub &'a Expr);

impl std::fmt::Display for ExprText<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write_expr(f, self.0)
    }
}

fn write_expr(out: &mut dyn Write, expr: &Expr) -> std::fmt::Result {
    match &expr.kind {
        ExprKind::Literal(lit) => out.write_str(&literal_text(*lit)),
        ExprKind::Ident(name) => out.write_str(name),
        ExprKind::Phony => out.write_str("_"),
        ExprKind::Unary { op, expr: operand } => {
            let text = match op {
                UnaryOp::Negation => "-",
                UnaryOp::Complement => "~",
                UnaryOp::Not => "!",
                UnaryOp::AddressOf => "&",
                UnaryOp::Indirection => "*",
            };
            out.write_str(text)?;
            write_operand(out, operand, 7, false)
        }
        ExprKind::Binary { op, lhs, rhs } => {
            let precedence = binary_op_precedence(*op);
            write_operand(out, lhs, precedence, true)?;
            write!(out, " {} ", binary_op_text(*op))?;
            write_operand(out, rhs, precedence, false)
        }
        ExprKind::Bitcast(operand) => {
            write!(out, "bitcast<{}>(", expr.ty)?;
            write_expr(out, operand)?;
            out.write_str(")")
        }
        ExprKind::Call { target, args } => {
            match target {
                CallTarget::Function(name) => out.write_str(name)?,
                CallTarget::Builtin(builtin) => out.write_str(builtin.text())?,
                CallTarget::Construct | CallTarget::Convert => {
                    write!(out, "{}", expr.ty)?
                }
            }
            out.write_str("(")?;
            let mut first = true;
            for arg in args {
                if !std::mem::replace(&mut first, false) {
                    out.write_str(", ")?;
                }
                write_expr(out, arg)?;
            }
            out.write_str(")")
        }
        ExprKind::Index { object, index } => {
            write_operand(out, object, 8, true)?;
            out.write_str("[")?;
            write_expr(out, index)?;
            out.write_str("]")
        }
        ExprKind::Member { object, member } => {
            write_operand(out, object, 8, true)?;
            let name = match object.ty.unwrap_ref() {
                Type::Struct(s) => s.members[*member as usize].name.as_str(),
                _ => unreachable!("member access on a non-struct type"),
            };
            write!(out, ".{}", name)
        }
        ExprKind::Swizzle { object, indices } => {
            write_operand(out, object, 8, true)?;
            out.write_str(".")?;
            for &index in indices {
                write!(out, "{}", SWIZZLE_LETTERS[index as usize])?;
            }
            Ok(())
        }
    }
}

/// write a child expression, parenthesizing when its precedence requires it
fn write_operand(
    out: &mut dyn Write,
    expr: &Expr,
    parent_precedence: u32,
    is_left: bool,
) -> std::fmt::Result {
    let needs_parens = match &expr.kind {
        ExprKind::Binary { op, .. } => {
            let precedence = binary_op_precedence(*op);
            if is_left {
                precedence < parent_precedence
            } else {
                precedence <= parent_precedence
            }
        }
        ExprKind::Unary { .. } => parent_precedence > 7,
        _ => false,
    };
    if needs_parens {
        out.write_str("(")?;
        write_expr(out, expr)?;
        out.write_str(")")
    } else {
        write_expr(out, expr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::span::Span;

    fn expr(kind: ExprKind, ty: Type) -> Expr {
        Expr {
            kind,
            ty,
            span: Span::default(),
        }
    }

    fn ident(name: &str, ty: Type) -> Expr {
        expr(ExprKind::Ident(name.into()), ty)
    }

    fn binary(op: BinaryOp, lhs: Expr, rhs: Expr, ty: Type) -> Expr {
        expr(
            ExprKind::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            },
            ty,
        )
    }

    #[test]
    fn test_precedence_parens() {
        // (a + b) * c keeps its parens, a + b * c doesn't gain any
        let a = || ident("a", Type::I32);
        let b = || ident("b", Type::I32);
        let c = || ident("c", Type::I32);
        let sum = binary(BinaryOp::Add, a(), b(), Type::I32);
        let product = binary(BinaryOp::Multiply, sum, c(), Type::I32);
        assert_eq!(ExprText(&product).to_string(), "(a + b) * c");

        let product = binary(BinaryOp::Multiply, b(), c(), Type::I32);
        let sum = binary(BinaryOp::Add, a(), product, Type::I32);
        assert_eq!(ExprText(&sum).to_string(), "a + b * c");
    }

    #[test]
    fn test_left_associative_no_parens() {
        let a = || ident("a", Type::I32);
        let inner = binary(BinaryOp::Subtract, a(), a(), Type::I32);
        let outer = binary(BinaryOp::Subtract, inner, a(), Type::I32);
        assert_eq!(ExprText(&outer).to_string(), "a - a - a");

        // right-nested needs parens to preserve evaluation order
        let inner = binary(BinaryOp::Subtract, a(), a(), Type::I32);
        let outer = binary(BinaryOp::Subtract, a(), inner, Type::I32);
        assert_eq!(ExprText(&outer).to_string(), "a - (a - a)");
    }

    #[test]
    fn test_literals() {
        assert_eq!(literal_text(Literal::I32(-3)), "-3i");
        assert_eq!(literal_text(Literal::U32(7)), "7u");
        assert_eq!(literal_text(Literal::F32(1.5)), "1.5f");
        assert_eq!(literal_text(Literal::Bool(true)), "true");
    }
}
