// SPDX-License-Identifier: LGPL-2.1-or-later
// See Notices.txt for copyright information

//! values, definitions and uses

use crate::consts::Const;
use crate::global_state::{Allocate, GlobalState, Id, IdRef, Internable, Interned};
use crate::types::Type;
use std::cell::Cell;
use std::ops::Deref;

/// anything an operand can reference: an instruction result, a function or
/// block parameter, or a wrapped constant. A value has exactly one static
/// type and exactly one point of definition; identity is the address.
#[derive(Debug)]
pub struct Value<'g> {
    /// the value's type
    pub value_type: Interned<'g, Type<'g>>,
    /// the display name; `""` for unnamed values. Names don't need to be
    /// unique, collisions are resolved at print time. A cell because the
    /// builder names a value after the fact when a `let` binds it.
    pub name: Cell<Interned<'g, str>>,
    /// the constant this value is known to be, for constants
    pub const_value: Cell<Option<Interned<'g, Const<'g>>>>,
}

impl<'g> Id<'g> for Value<'g> {}

impl<'g> Value<'g> {
    /// create a value wrapping an interned constant
    pub fn from_const(
        const_value: Interned<'g, Const<'g>>,
        name: impl Internable<'g, Interned = str>,
        global_state: &'g GlobalState<'g>,
    ) -> IdRef<'g, Value<'g>> {
        global_state.alloc(Value {
            value_type: const_value.get().get_type(global_state),
            name: Cell::new(name.intern(global_state)),
            const_value: Cell::new(Some(const_value)),
        })
    }
    /// attach or replace the value's display name
    pub fn set_name(
        &self,
        name: impl Internable<'g, Interned = str>,
        global_state: &'g GlobalState<'g>,
    ) {
        self.name.set(name.intern(global_state));
    }
}

/// the single definition point of a [`Value`]. Owning a `ValueDefinition`
/// is the permission to define the value; it is deliberately not `Clone`.
#[derive(Debug)]
pub struct ValueDefinition<'g> {
    value: IdRef<'g, Value<'g>>,
}

impl<'g> ValueDefinition<'g> {
    /// allocate a new value and its definition
    pub fn new(
        value_type: Interned<'g, Type<'g>>,
        name: impl Internable<'g, Interned = str>,
        global_state: &'g GlobalState<'g>,
    ) -> ValueDefinition<'g> {
        ValueDefinition {
            value: global_state.alloc(Value {
                value_type,
                name: Cell::new(name.intern(global_state)),
                const_value: Cell::new(None),
            }),
        }
    }
    /// the defined value
    pub fn value(&self) -> IdRef<'g, Value<'g>> {
        self.value
    }
}

impl<'g> Deref for ValueDefinition<'g> {
    type Target = IdRef<'g, Value<'g>>;
    fn deref(&self) -> &IdRef<'g, Value<'g>> {
        &self.value
    }
}

/// an operand site referencing a [`Value`]
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct ValueUse<'g> {
    value: IdRef<'g, Value<'g>>,
}

impl<'g> ValueUse<'g> {
    /// create a new use of `value`
    pub fn new(value: IdRef<'g, Value<'g>>) -> Self {
        Self { value }
    }
    /// create a use of a fresh unnamed constant value
    pub fn from_const(
        const_value: impl Internable<'g, Interned = Const<'g>>,
        global_state: &'g GlobalState<'g>,
    ) -> Self {
        Self {
            value: Value::from_const(const_value.intern(global_state), "", global_state),
        }
    }
    /// the used value
    pub fn value(&self) -> IdRef<'g, Value<'g>> {
        self.value
    }
    /// the used value's type
    pub fn value_type(&self) -> Interned<'g, Type<'g>> {
        self.value.value_type
    }
}

impl<'g> Deref for ValueUse<'g> {
    type Target = IdRef<'g, Value<'g>>;
    fn deref(&self) -> &IdRef<'g, Value<'g>> {
        &self.value
    }
}

/// identifies one operand slot of one instruction; used by the use-count
/// analysis and to attach source ranges per operand
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct Usage {
    /// the consuming instruction, as a stable index assigned in traversal
    /// order by the analysis that built this usage
    pub instruction: usize,
    /// the operand index within the consuming instruction
    pub operand_index: usize,
}
