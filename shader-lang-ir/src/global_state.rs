// SPDX-License-Identifier: LGPL-2.1-or-later
// See Notices.txt for copyright information

//! arenas and interning for all IR objects

use crate::block::BlockData;
use crate::consts::Const;
use crate::debug::Location;
use crate::function::FunctionData;
use crate::instructions::{IfData, LoopData, SwitchData};
use crate::types::Type;
use crate::values::Value;
use std::collections::HashSet;
use std::cell::RefCell;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::Deref;
use std::ptr::NonNull;
use typed_arena::Arena;

/// the struct containing all the arenas in which IR objects are allocated,
/// as well as the state needed for interning. One `GlobalState` is created
/// per compilation; it is passed explicitly (never ambient), so separate
/// modules can be built concurrently on separate threads with separate
/// states.
pub struct GlobalState<'g> {
    string_byte_arena: Arena<u8>,
    string_hashtable: RefCell<HashSet<&'g str>>,
    location_arena: Arena<Location<'g>>,
    location_hashtable: RefCell<HashSet<&'g Location<'g>>>,
    type_arena: Arena<Type<'g>>,
    type_hashtable: RefCell<HashSet<&'g Type<'g>>>,
    const_arena: Arena<Const<'g>>,
    const_hashtable: RefCell<HashSet<&'g Const<'g>>>,
    value_arena: Arena<Value<'g>>,
    block_arena: Arena<BlockData<'g>>,
    if_arena: Arena<IfData<'g>>,
    loop_arena: Arena<LoopData<'g>>,
    switch_arena: Arena<SwitchData<'g>>,
    function_arena: Arena<FunctionData<'g>>,
}

impl<'g> GlobalState<'g> {
    /// create a new `GlobalState`
    pub fn new() -> Self {
        Self {
            string_byte_arena: Arena::new(),
            string_hashtable: RefCell::new(HashSet::new()),
            location_arena: Arena::new(),
            location_hashtable: RefCell::new(HashSet::new()),
            type_arena: Arena::new(),
            type_hashtable: RefCell::new(HashSet::new()),
            const_arena: Arena::new(),
            const_hashtable: RefCell::new(HashSet::new()),
            value_arena: Arena::new(),
            block_arena: Arena::new(),
            if_arena: Arena::new(),
            loop_arena: Arena::new(),
            switch_arena: Arena::new(),
            function_arena: Arena::new(),
        }
    }
}

impl<'g> Default for GlobalState<'g> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'g> fmt::Debug for GlobalState<'g> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        struct Ellipsis;
        impl fmt::Debug for Ellipsis {
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.pad("...")
            }
        }
        f.debug_struct("GlobalState")
            .field("state", &Ellipsis)
            .finish()
    }
}

#[doc(hidden)]
pub struct Private {
    _private: (),
}

impl Private {
    const fn new() -> Self {
        Self { _private: () }
    }
}

/// a trait for types where the address of a value is used as the value's
/// identity. Use `IdMethod::id()` to get the identity in a directly
/// comparable form.
pub trait Id<'g> {}

/// provides the `id` method for all types implementing `Id`
pub trait IdMethod<'g>: Id<'g> {
    /// get the identity (address) of `self` in a directly comparable form
    fn id(&'g self) -> NonNull<Self> {
        self.into()
    }
}

impl<'g, T: Id<'g>> IdMethod<'g> for T {}

/// a wrapper for a shared reference to a type implementing `Id`; compares
/// and hashes by address
#[repr(transparent)]
pub struct IdRef<'g, T: Id<'g>>(&'g T);

impl<'g, T: fmt::Debug + Id<'g>> fmt::Debug for IdRef<'g, T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_tuple("IdRef").field(self.get()).finish()
    }
}

impl<'g, T: Id<'g>> IdRef<'g, T> {
    /// get the identity (address) of the value `self` points to
    pub fn id(self) -> NonNull<T> {
        self.0.id()
    }
    /// get the contained reference
    pub fn get(self) -> &'g T {
        self.0
    }
}

impl<'g, T: Id<'g>> Deref for IdRef<'g, T> {
    type Target = T;
    fn deref(&self) -> &T {
        self.0
    }
}

impl<'g, T: Id<'g>> Eq for IdRef<'g, T> {}

impl<'g, T: Id<'g>> Copy for IdRef<'g, T> {}

impl<'g, T: Id<'g>> Clone for IdRef<'g, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<'g, T: Id<'g>> PartialEq for IdRef<'g, T> {
    fn eq(&self, rhs: &IdRef<'g, T>) -> bool {
        self.id() == rhs.id()
    }
}

impl<'g, T: Id<'g>> Hash for IdRef<'g, T> {
    fn hash<H: Hasher>(&self, h: &mut H) {
        self.id().hash(h)
    }
}

/// allocate a value from a `GlobalState` arena
pub(crate) trait Allocate<'g, T: Id<'g>> {
    #[doc(hidden)]
    fn alloc_private(&'g self, _private: Private, value: T) -> &'g T;
    /// allocate `value`, returning its address-identified handle
    #[must_use]
    fn alloc(&'g self, value: T) -> IdRef<'g, T> {
        IdRef(self.alloc_private(Private::new(), value))
    }
}

/// a reference to an interned value. Create using `Internable::intern`
#[repr(transparent)]
pub struct Interned<'g, T: ?Sized + Eq + Hash>(&'g T);

impl<T: ?Sized + Eq + Hash> Eq for Interned<'_, T> {}

impl<T: ?Sized + Eq + Hash> Copy for Interned<'_, T> {}

impl<T: ?Sized + Eq + Hash> Clone for Interned<'_, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T: ?Sized + Eq + Hash> PartialEq for Interned<'_, T> {
    fn eq(&self, rhs: &Self) -> bool {
        std::ptr::eq(self.0, rhs.0)
    }
}

impl<T: ?Sized + Eq + Hash> Hash for Interned<'_, T> {
    fn hash<H: Hasher>(&self, h: &mut H) {
        (self.0 as *const T).hash(h)
    }
}

impl<T: ?Sized + Eq + Hash> Deref for Interned<'_, T> {
    type Target = T;
    fn deref(&self) -> &T {
        self.0
    }
}

impl<T: ?Sized + Eq + Hash> AsRef<T> for Interned<'_, T> {
    fn as_ref(&self) -> &T {
        self.0
    }
}

impl<'g, T: ?Sized + Eq + Hash> Interned<'g, T> {
    /// get the contained reference
    pub fn get(self) -> &'g T {
        self.0
    }
}

impl<T: ?Sized + Eq + Hash + fmt::Debug> fmt::Debug for Interned<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl<T: ?Sized + Eq + Hash + fmt::Display> fmt::Display for Interned<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        self.0.fmt(f)
    }
}

trait Intern<'g, T: ?Sized + Eq + Hash> {
    #[doc(hidden)]
    fn intern_alloc(&'g self, _private: Private, value: &T) -> &'g T;
    #[doc(hidden)]
    fn get_hashtable(&'g self, _private: Private) -> &'g RefCell<HashSet<&'g T>>;
    #[must_use]
    fn intern<'a>(&'g self, value: &'a T) -> Interned<'g, T> {
        let mut hashtable = self.get_hashtable(Private::new()).borrow_mut();
        if let Some(retval) = hashtable.get(value) {
            Interned(retval)
        } else {
            let retval = self.intern_alloc(Private::new(), value);
            let inserted = hashtable.insert(retval);
            assert!(inserted);
            Interned(retval)
        }
    }
}

impl<'g> Intern<'g, str> for GlobalState<'g> {
    fn intern_alloc(&'g self, _private: Private, value: &str) -> &'g str {
        self.string_byte_arena.alloc_str(value)
    }
    fn get_hashtable(&'g self, _private: Private) -> &'g RefCell<HashSet<&'g str>> {
        &self.string_hashtable
    }
}

impl<'g> Intern<'g, Type<'g>> for GlobalState<'g> {
    fn intern_alloc(&'g self, _private: Private, value: &Type<'g>) -> &'g Type<'g> {
        self.type_arena.alloc(value.clone())
    }
    fn get_hashtable(&'g self, _private: Private) -> &'g RefCell<HashSet<&'g Type<'g>>> {
        &self.type_hashtable
    }
}

impl<'g> Intern<'g, Const<'g>> for GlobalState<'g> {
    fn intern_alloc(&'g self, _private: Private, value: &Const<'g>) -> &'g Const<'g> {
        self.const_arena.alloc(value.clone())
    }
    fn get_hashtable(&'g self, _private: Private) -> &'g RefCell<HashSet<&'g Const<'g>>> {
        &self.const_hashtable
    }
}

impl<'g> Intern<'g, Location<'g>> for GlobalState<'g> {
    fn intern_alloc(&'g self, _private: Private, value: &Location<'g>) -> &'g Location<'g> {
        self.location_arena.alloc(*value)
    }
    fn get_hashtable(&'g self, _private: Private) -> &'g RefCell<HashSet<&'g Location<'g>>> {
        &self.location_hashtable
    }
}

impl<'g> Allocate<'g, Value<'g>> for GlobalState<'g> {
    fn alloc_private(&'g self, _private: Private, value: Value<'g>) -> &'g Value<'g> {
        self.value_arena.alloc(value)
    }
}

impl<'g> Allocate<'g, BlockData<'g>> for GlobalState<'g> {
    fn alloc_private(&'g self, _private: Private, value: BlockData<'g>) -> &'g BlockData<'g> {
        self.block_arena.alloc(value)
    }
}

impl<'g> Allocate<'g, IfData<'g>> for GlobalState<'g> {
    fn alloc_private(&'g self, _private: Private, value: IfData<'g>) -> &'g IfData<'g> {
        self.if_arena.alloc(value)
    }
}

impl<'g> Allocate<'g, LoopData<'g>> for GlobalState<'g> {
    fn alloc_private(&'g self, _private: Private, value: LoopData<'g>) -> &'g LoopData<'g> {
        self.loop_arena.alloc(value)
    }
}

impl<'g> Allocate<'g, SwitchData<'g>> for GlobalState<'g> {
    fn alloc_private(&'g self, _private: Private, value: SwitchData<'g>) -> &'g SwitchData<'g> {
        self.switch_arena.alloc(value)
    }
}

impl<'g> Allocate<'g, FunctionData<'g>> for GlobalState<'g> {
    fn alloc_private(&'g self, _private: Private, value: FunctionData<'g>) -> &'g FunctionData<'g> {
        self.function_arena.alloc(value)
    }
}

/// types that can be interned, possibly by converting to another type before
/// interning
pub trait Internable<'g> {
    /// the type that is actually interned
    type Interned: ?Sized + Eq + Hash;
    /// convert `self` to `Self::Interned` and intern the result
    fn intern(&self, global_state: &'g GlobalState<'g>) -> Interned<'g, Self::Interned>;
}

impl<'g> Internable<'g> for str {
    type Interned = str;
    fn intern(&self, global_state: &'g GlobalState<'g>) -> Interned<'g, str> {
        global_state.intern(self)
    }
}

impl<'g> Internable<'g> for String {
    type Interned = str;
    fn intern(&self, global_state: &'g GlobalState<'g>) -> Interned<'g, str> {
        global_state.intern(&**self)
    }
}

impl<'g, T: ?Sized + Eq + Hash> Internable<'g> for Interned<'g, T> {
    type Interned = T;
    fn intern(&self, _: &'g GlobalState<'g>) -> Interned<'g, T> {
        *self
    }
}

impl<'g, T: Internable<'g> + ?Sized> Internable<'g> for &'_ T {
    type Interned = T::Interned;
    fn intern(&self, global_state: &'g GlobalState<'g>) -> Interned<'g, Self::Interned> {
        (**self).intern(global_state)
    }
}

impl<'g> Internable<'g> for Type<'g> {
    type Interned = Type<'g>;
    fn intern(&self, global_state: &'g GlobalState<'g>) -> Interned<'g, Type<'g>> {
        global_state.intern(self)
    }
}

impl<'g> Internable<'g> for Const<'g> {
    type Interned = Const<'g>;
    fn intern(&self, global_state: &'g GlobalState<'g>) -> Interned<'g, Const<'g>> {
        global_state.intern(self)
    }
}

impl<'g> Internable<'g> for Location<'g> {
    type Interned = Location<'g>;
    fn intern(&self, global_state: &'g GlobalState<'g>) -> Interned<'g, Location<'g>> {
        global_state.intern(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Type;

    #[test]
    fn test_interning_dedupes() {
        let global_state = GlobalState::new();
        let a = "hello".intern(&global_state);
        let b = String::from("hello").intern(&global_state);
        assert_eq!(a, b);
        let c = "world".intern(&global_state);
        assert_ne!(a, c);

        let t1 = Type::Bool.intern(&global_state);
        let t2 = Type::Bool.intern(&global_state);
        assert_eq!(t1, t2);
        assert!(std::ptr::eq(t1.get(), t2.get()));
    }
}
