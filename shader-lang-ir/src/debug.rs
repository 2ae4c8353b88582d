// SPDX-License-Identifier: LGPL-2.1-or-later
// See Notices.txt for copyright information

//! source locations for diagnostics and disassembly
//!
//! Locations are a side table over the semantic graph: instructions carry an
//! optional interned `Location`, and nothing in validation or lowering
//! depends on them.

use crate::global_state::Interned;
use std::fmt;

/// an interned source location
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct Location<'g> {
    /// the source file name
    pub file: Interned<'g, str>,
    /// the 1-based line number
    pub line: u32,
    /// the 1-based column number
    pub column: u32,
}

impl fmt::Display for Location<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.column)
    }
}
