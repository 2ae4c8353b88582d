// SPDX-License-Identifier: LGPL-2.1-or-later
// See Notices.txt for copyright information

//! functions

use crate::block::{Block, BlockData};
use crate::global_state::{Allocate, GlobalState, Id, IdRef, Internable, Interned};
use crate::types::Type;
use crate::values::ValueDefinition;
use std::fmt;
use std::ops::Deref;

/// the pipeline stage of an entry point
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum PipelineStage {
    /// a vertex shader
    Vertex,
    /// a fragment shader
    Fragment,
    /// a compute shader
    Compute,
}

impl PipelineStage {
    /// the textual form
    pub fn text(self) -> &'static str {
        match self {
            PipelineStage::Vertex => "vertex",
            PipelineStage::Fragment => "fragment",
            PipelineStage::Compute => "compute",
        }
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.pad(self.text())
    }
}

/// whether a function is externally invoked, and how
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum FunctionKind {
    /// an ordinary function, callable from shader code
    Ordinary,
    /// an entry point
    EntryPoint {
        /// the pipeline stage
        stage: PipelineStage,
        /// the workgroup size, for compute entry points
        workgroup_size: Option<[u32; 3]>,
    },
}

/// the data of a function
#[derive(Debug)]
pub struct FunctionData<'g> {
    /// the function name; doesn't need to be unique
    pub name: Interned<'g, str>,
    /// the parameter value definitions, in order
    pub params: Vec<ValueDefinition<'g>>,
    /// the return type
    pub return_type: Interned<'g, Type<'g>>,
    /// ordinary or entry point
    pub kind: FunctionKind,
    /// the entry block
    pub body: Block<'g>,
}

impl<'g> Id<'g> for FunctionData<'g> {}

/// an owned function; allocates the entry block on creation
#[derive(Eq, PartialEq, Hash, Debug)]
pub struct Function<'g> {
    value: IdRef<'g, FunctionData<'g>>,
}

impl<'g> Function<'g> {
    /// create a new function with an unsealed entry block
    pub fn new(
        name: impl Internable<'g, Interned = str>,
        params: Vec<ValueDefinition<'g>>,
        return_type: Interned<'g, Type<'g>>,
        kind: FunctionKind,
        global_state: &'g GlobalState<'g>,
    ) -> Self {
        let body = BlockData::new(global_state);
        Function {
            value: global_state.alloc(FunctionData {
                name: name.intern(global_state),
                params,
                return_type,
                kind,
                body,
            }),
        }
    }
    /// get the contained `IdRef<FunctionData>`
    pub fn value(&self) -> IdRef<'g, FunctionData<'g>> {
        self.value
    }
}

impl<'g> Deref for Function<'g> {
    type Target = IdRef<'g, FunctionData<'g>>;
    fn deref(&self) -> &IdRef<'g, FunctionData<'g>> {
        &self.value
    }
}

/// a by-name reference to a function, used by calls; printed as the
/// function's name rather than its body
#[derive(Copy, Clone, Eq, PartialEq, Hash)]
pub struct FunctionRef<'g> {
    value: IdRef<'g, FunctionData<'g>>,
}

impl<'g> FunctionRef<'g> {
    /// create a new reference to the passed-in function
    pub fn new(value: IdRef<'g, FunctionData<'g>>) -> Self {
        Self { value }
    }
    /// get the contained `IdRef<FunctionData>`
    pub fn value(self) -> IdRef<'g, FunctionData<'g>> {
        self.value
    }
}

impl<'g> Deref for FunctionRef<'g> {
    type Target = IdRef<'g, FunctionData<'g>>;
    fn deref(&self) -> &IdRef<'g, FunctionData<'g>> {
        &self.value
    }
}

impl<'g> fmt::Debug for FunctionRef<'g> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        // printing the whole function here would recurse on recursive calls
        write!(f, "FunctionRef({})", self.value.name)
    }
}
