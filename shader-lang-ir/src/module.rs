// SPDX-License-Identifier: LGPL-2.1-or-later
// See Notices.txt for copyright information

//! the top-level IR container

use crate::function::Function;
use crate::instructions::Inst;

/// a shader module: module-scope variable declarations plus functions.
///
/// The type manager and the string interner are not stored here; they live
/// in the [`GlobalState`](crate::GlobalState) the module was built against,
/// which is passed explicitly wherever interning is needed. Display names
/// are interned on the values themselves.
#[derive(Debug, Default)]
pub struct Module<'g> {
    /// the root block: module-scope `Var` declarations, in dependency
    /// order. Unlike function blocks it has no terminator.
    pub root_block: Vec<Inst<'g>>,
    /// the functions, in declaration order
    pub functions: Vec<Function<'g>>,
}

impl<'g> Module<'g> {
    /// create an empty module
    pub fn new() -> Self {
        Self::default()
    }
}

impl_display_as_to_text!(<'g> Module<'g>);
