// SPDX-License-Identifier: LGPL-2.1-or-later
// See Notices.txt for copyright information

//! structured diagnostics
//!
//! Ordinary diagnostics report problems in the input and are recoverable;
//! callers decide whether to abort or continue. `InternalError` marks an
//! invariant that correct upstream behavior makes impossible -- a bug in
//! the compiler itself, not the input.

use crate::debug::Location;
use crate::global_state::Interned;
use std::fmt;

/// how severe a diagnostic is
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum Severity {
    /// additional context for a preceding error
    Note,
    /// a problem in the input
    Error,
    /// a bug in the compiler itself
    InternalError,
}

impl Severity {
    /// the textual form
    pub fn text(self) -> &'static str {
        match self {
            Severity::Note => "note",
            Severity::Error => "error",
            Severity::InternalError => "internal compiler error",
        }
    }
}

/// one diagnostic
#[derive(Clone, Debug)]
pub struct Diagnostic<'g> {
    /// the severity
    pub severity: Severity,
    /// the message
    pub message: String,
    /// the source location, if known
    pub location: Option<Interned<'g, Location<'g>>>,
}

impl fmt::Display for Diagnostic<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.location {
            Some(location) => {
                write!(f, "{}: {}: {}", location, self.severity.text(), self.message)
            }
            None => write!(f, "{}: {}", self.severity.text(), self.message),
        }
    }
}

/// an ordered list of diagnostics
#[derive(Clone, Debug, Default)]
pub struct Diagnostics<'g> {
    diagnostics: Vec<Diagnostic<'g>>,
}

impl<'g> Diagnostics<'g> {
    /// create an empty list
    pub fn new() -> Self {
        Self::default()
    }
    /// append an error
    pub fn add_error(
        &mut self,
        message: impl Into<String>,
        location: Option<Interned<'g, Location<'g>>>,
    ) {
        self.diagnostics.push(Diagnostic {
            severity: Severity::Error,
            message: message.into(),
            location,
        });
    }
    /// append a note attached to the preceding error
    pub fn add_note(
        &mut self,
        message: impl Into<String>,
        location: Option<Interned<'g, Location<'g>>>,
    ) {
        self.diagnostics.push(Diagnostic {
            severity: Severity::Note,
            message: message.into(),
            location,
        });
    }
    /// append an internal compiler error
    pub fn add_internal_error(
        &mut self,
        message: impl Into<String>,
        location: Option<Interned<'g, Location<'g>>>,
    ) {
        self.diagnostics.push(Diagnostic {
            severity: Severity::InternalError,
            message: message.into(),
            location,
        });
    }
    /// `true` if any error or internal error was reported
    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| matches!(d.severity, Severity::Error | Severity::InternalError))
    }
    /// `true` if nothing was reported
    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }
    /// the number of diagnostics
    pub fn len(&self) -> usize {
        self.diagnostics.len()
    }
    /// iterate over the diagnostics in the order they were reported
    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic<'g>> {
        self.diagnostics.iter()
    }
}

impl fmt::Display for Diagnostics<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut first = true;
        for diagnostic in &self.diagnostics {
            if !std::mem::replace(&mut first, false) {
                writeln!(f)?;
            }
            write!(f, "{}", diagnostic)?;
        }
        Ok(())
    }
}
