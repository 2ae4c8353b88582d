// SPDX-License-Identifier: LGPL-2.1-or-later
// See Notices.txt for copyright information

//! blocks: straight-line instruction sequences ending in one terminator

use crate::global_state::{Allocate, GlobalState, Id, IdRef};
use crate::instructions::{Inst, Terminator};
use crate::values::ValueDefinition;
use once_cell::unsync::OnceCell;
use std::fmt;

/// a block's address-identified handle
pub type Block<'g> = IdRef<'g, BlockData<'g>>;

/// the sealed contents of a block
#[derive(Debug)]
pub struct BlockBody<'g> {
    /// the non-terminator instructions, in execution order
    pub instructions: Vec<Inst<'g>>,
    /// the single terminator
    pub terminator: Terminator<'g>,
}

/// error returned when sealing an already-sealed block
#[derive(Debug)]
pub struct BlockSealed;

impl fmt::Display for BlockSealed {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.pad("block is already sealed")
    }
}

impl std::error::Error for BlockSealed {}

/// a block. Created unsealed; the body (instructions plus terminator) is
/// set exactly once, and no instruction can be appended afterwards -- the
/// seal is structural, not a runtime flag. Blocks may declare parameters,
/// defined at block entry and supplied by the branches that enter the
/// block (loop-carried values).
#[derive(Debug)]
pub struct BlockData<'g> {
    /// the block parameters
    pub params: Vec<ValueDefinition<'g>>,
    body: OnceCell<BlockBody<'g>>,
}

impl<'g> Id<'g> for BlockData<'g> {}

impl<'g> BlockData<'g> {
    /// allocate a new unsealed block with no parameters
    pub fn new(global_state: &'g GlobalState<'g>) -> Block<'g> {
        Self::with_params(Vec::new(), global_state)
    }
    /// allocate a new unsealed block with the given parameters
    pub fn with_params(
        params: Vec<ValueDefinition<'g>>,
        global_state: &'g GlobalState<'g>,
    ) -> Block<'g> {
        global_state.alloc(BlockData {
            params,
            body: OnceCell::new(),
        })
    }
    /// seal the block with its instructions and terminator
    pub fn set_body(
        &self,
        instructions: Vec<Inst<'g>>,
        terminator: Terminator<'g>,
    ) -> Result<(), BlockSealed> {
        self.body
            .set(BlockBody {
                instructions,
                terminator,
            })
            .map_err(|_| BlockSealed)
    }
    /// the sealed body, or `None` if the block was never sealed
    pub fn body(&self) -> Option<&BlockBody<'g>> {
        self.body.get()
    }
    /// `true` once the terminator has been appended
    pub fn is_sealed(&self) -> bool {
        self.body.get().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::global_state::GlobalState;

    #[test]
    fn test_sealing_is_final() {
        let global_state = GlobalState::new();
        let block = BlockData::new(&global_state);
        assert!(!block.is_sealed());
        block
            .set_body(Vec::new(), Terminator::Unreachable)
            .unwrap();
        assert!(block.is_sealed());
        assert!(block
            .set_body(Vec::new(), Terminator::Unreachable)
            .is_err());
        assert!(block.body().unwrap().instructions.is_empty());
    }
}
