// SPDX-License-Identifier: LGPL-2.1-or-later
// See Notices.txt for copyright information

//! Shading-language compiler intermediate representation.
//!
//! The IR is a structured control-flow graph: blocks hold straight-line
//! instructions and end in exactly one terminator; control instructions
//! (`If`, `Loop`, `Switch`) own their nested blocks, so arbitrary gotos
//! cannot be expressed. All IR objects live in arenas owned by a
//! [`GlobalState`] and are identified by address; types, constants, strings
//! and source locations are interned so structural equality is pointer
//! equality.

#[macro_use]
mod macros;

pub mod consts;
pub mod debug;
pub mod diag;
pub mod disasm;
pub mod inline;
pub mod text;
pub mod types;
pub mod validate;

mod block;
mod function;
mod global_state;
mod instructions;
mod module;
mod values;

pub mod prelude;

pub use crate::block::{Block, BlockBody, BlockData, BlockSealed};
pub use crate::consts::{Const, ConstFloat16, ConstFloat32};
pub use crate::debug::Location;
pub use crate::function::{Function, FunctionData, FunctionKind, FunctionRef, PipelineStage};
pub use crate::global_state::{GlobalState, Id, IdMethod, IdRef, Internable, Interned};
pub use crate::instructions::{
    Access, Binary, BinaryOp, BindingPoint, Bitcast, BuiltinFn, Call, CallTarget, CaseSelector,
    Construct, Convert, Discard, IfData, IfRef, Inst, InstData, Let, Load, LoadVectorElement,
    LoopData, LoopRef, Store, StoreVectorElement, SwitchCase, SwitchData, SwitchRef, Swizzle,
    Terminator, Unary, UnaryOp, Var,
};
pub use crate::module::Module;
pub use crate::types::{
    Access as AccessMode, AddressSpace, FloatType, IntType, StructMember, Type,
};
pub use crate::values::{Usage, Value, ValueDefinition, ValueUse};
