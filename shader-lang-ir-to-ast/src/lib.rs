// SPDX-License-Identifier: LGPL-2.1-or-later
// See Notices.txt for copyright information

//! The source-producing writer path: IR back to a resolved AST.
//!
//! Unlike the disassembler, this path consumes the inlining analysis:
//! single-use results whose substitution preserves sequencing are printed
//! as nested expressions, everything else becomes a `let`, a `var` or a
//! statement. Together with the AST printer this closes the round trip
//! used by the printer-fixpoint tests: lowering the program this writer
//! produces and writing it again yields byte-identical source.

mod writer;

pub use crate::writer::{to_program, WriteError};
