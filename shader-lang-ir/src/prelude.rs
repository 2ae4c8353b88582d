// SPDX-License-Identifier: LGPL-2.1-or-later
// See Notices.txt for copyright information

//! IR prelude

pub use crate::{
    text::ToText, Block, BlockData, Const, Function, FunctionData, FunctionRef, GlobalState, Id,
    IdMethod, IdRef, IfData, IfRef, Inst, InstData, Internable, Interned, Location, LoopData,
    LoopRef, Module, SwitchData, SwitchRef, Terminator, Type, Value, ValueDefinition, ValueUse,
};
