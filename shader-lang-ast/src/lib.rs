// SPDX-License-Identifier: LGPL-2.1-or-later
// See Notices.txt for copyright information

//! Resolved abstract syntax tree for the shading language.
//!
//! This crate is the input contract of the IR builder: a `Program` is the
//! output of the (external) parser and resolver, with every expression
//! carrying its resolved type and every place expression carrying a
//! `Reference` type. Nothing in this crate checks types; a `Program` is
//! assumed to have passed semantic analysis.

pub mod printer;
pub mod span;
pub mod types;

mod nodes;

pub use crate::nodes::{
    BinaryOp, BindingPoint, BuiltinFn, CallTarget, CaseSelector, Expr, ExprKind, FunctionDecl,
    GlobalDecl, GlobalVar, Literal, OverrideVar, Param, Program, Stage, Stmt, StmtKind, SwitchCase,
    UnaryOp,
};
pub use crate::span::{LineCol, SourceText, Span};
pub use crate::types::{Access, AddressSpace, StructMember, StructType, Type};
