// SPDX-License-Identifier: LGPL-2.1-or-later
// See Notices.txt for copyright information

//! deterministic text output
//!
//! Naming state lives in [`ToTextState`]: values and blocks are assigned
//! identifiers in the order they are first printed, so the same module
//! always renders to the same text -- nothing depends on addresses or hash
//! iteration order.

use crate::block::{Block, BlockData};
use crate::global_state::{IdRef, Interned};
use crate::values::Value;
use hashbrown::HashMap;
use std::fmt;
use std::mem;

/// textual output state: indentation plus deterministic name assignment
pub struct ToTextState<'g, 'w> {
    indent: usize,
    at_start_of_line: bool,
    base_writer: &'w mut dyn FnMut(&str) -> fmt::Result,
    value_names: HashMap<IdRef<'g, Value<'g>>, String>,
    name_suffixes: HashMap<Interned<'g, str>, u64>,
    next_unnamed: u64,
    block_labels: HashMap<IdRef<'g, BlockData<'g>>, u64>,
    next_block_label: u64,
}

impl<'g> ToTextState<'g, '_> {
    /// the printed form of a value reference: its interned constant if it
    /// is one, otherwise its deterministic `%` identifier
    pub fn value_text(&mut self, value: IdRef<'g, Value<'g>>) -> String {
        if let Some(const_value) = value.const_value.get() {
            return const_value.to_string();
        }
        if let Some(existing) = self.value_names.get(&value) {
            return existing.clone();
        }
        let value_name = value.name.get();
        let name = if value_name.is_empty() {
            self.next_unnamed += 1;
            format!("%{}", self.next_unnamed)
        } else {
            let next_suffix = self.name_suffixes.entry(value_name).or_insert(0);
            let suffix = *next_suffix;
            *next_suffix += 1;
            if suffix == 0 {
                format!("%{}", value_name)
            } else {
                format!("%{}_{}", value_name, suffix)
            }
        };
        self.value_names.insert(value, name.clone());
        name
    }
    /// the `%bN` label of a block, assigned monotonically on first use
    pub fn block_label(&mut self, block: Block<'g>) -> String {
        let next_block_label = &mut self.next_block_label;
        let label = *self.block_labels.entry(block).or_insert_with(|| {
            *next_block_label += 1;
            *next_block_label
        });
        format!("%b{}", label)
    }
    /// run `f` with the indentation level raised by one
    pub fn indent<R, E, F: FnOnce(&mut Self) -> Result<R, E>>(&mut self, f: F) -> Result<R, E> {
        assert!(
            self.at_start_of_line,
            "can't call indent() in the middle of a text line"
        );
        self.indent += 1;
        let retval = f(self)?;
        assert!(
            self.at_start_of_line,
            "can't return Ok to indent() in the middle of a text line"
        );
        self.indent -= 1;
        Ok(retval)
    }
    /// rebind `std::fmt::Write::write_fmt` to make it easily visible for
    /// use with the `write!` macro
    #[inline]
    pub fn write_fmt(&mut self, args: fmt::Arguments) -> fmt::Result {
        fmt::Write::write_fmt(self, args)
    }
}

impl fmt::Write for ToTextState<'_, '_> {
    fn write_str(&mut self, text: &str) -> fmt::Result {
        let mut first = true;
        for text in text.split('\n') {
            if !mem::replace(&mut first, false) {
                (self.base_writer)("\n")?;
                self.at_start_of_line = true;
            }
            if text.is_empty() {
                continue;
            }
            let do_indent = mem::replace(&mut self.at_start_of_line, false);
            if do_indent {
                for _ in 0..self.indent {
                    (self.base_writer)("    ")?;
                }
            }
            (self.base_writer)(text)?;
        }
        Ok(())
    }
}

/// conversion to deterministic text
pub trait ToText<'g> {
    /// wrap `self` for use with `format!` and friends
    fn display(&self) -> ToTextDisplay<'g, '_, Self> {
        ToTextDisplay(self, std::marker::PhantomData)
    }
    /// do the actual writing
    fn to_text(&self, state: &mut ToTextState<'g, '_>) -> fmt::Result;
}

/// helper implementing `Display` for a [`ToText`] value
pub struct ToTextDisplay<'g, 'a, T: ToText<'g> + ?Sized>(&'a T, std::marker::PhantomData<&'g ()>);

impl<'g, T: ToText<'g> + ?Sized> fmt::Display for ToTextDisplay<'g, '_, T> {
    fn fmt(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        self.0.to_text(&mut ToTextState {
            indent: 0,
            at_start_of_line: true,
            base_writer: &mut |text: &str| formatter.write_str(text),
            value_names: HashMap::new(),
            name_suffixes: HashMap::new(),
            next_unnamed: 0,
            block_labels: HashMap::new(),
            next_block_label: 0,
        })
    }
}

impl<'g, T: ToText<'g> + ?Sized> fmt::Debug for ToTextDisplay<'g, '_, T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl<'g, T: ToText<'g> + ?Sized> ToText<'g> for &'_ T {
    fn to_text(&self, state: &mut ToTextState<'g, '_>) -> fmt::Result {
        (**self).to_text(state)
    }
}
