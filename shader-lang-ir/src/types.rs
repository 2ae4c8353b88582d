// SPDX-License-Identifier: LGPL-2.1-or-later
// See Notices.txt for copyright information

//! the IR type system
//!
//! Types are interned through [`GlobalState`](crate::GlobalState): two
//! structurally-equal types are the same pointer, so type equality checks in
//! the validator are pointer comparisons. Unlike the source language's type
//! system there is no reference type here; places are always pointers.

use crate::global_state::{GlobalState, Internable, Interned};
use std::fmt;

/// the address space of a pointer
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum AddressSpace {
    /// function-local storage
    Function,
    /// module-scope per-invocation storage
    Private,
    /// read/write storage buffers
    Storage,
    /// uniform buffers
    Uniform,
    /// workgroup-shared storage
    Workgroup,
}

impl AddressSpace {
    /// the textual form
    pub fn text(self) -> &'static str {
        match self {
            AddressSpace::Function => "function",
            AddressSpace::Private => "private",
            AddressSpace::Storage => "storage",
            AddressSpace::Uniform => "uniform",
            AddressSpace::Workgroup => "workgroup",
        }
    }
}

impl fmt::Display for AddressSpace {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.pad(self.text())
    }
}

/// the access mode of a pointer
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum Access {
    /// read-only
    Read,
    /// read and write
    ReadWrite,
    /// write-only
    Write,
}

impl Access {
    /// the textual form
    pub fn text(self) -> &'static str {
        match self {
            Access::Read => "read",
            Access::ReadWrite => "read_write",
            Access::Write => "write",
        }
    }
}

impl fmt::Display for Access {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.pad(self.text())
    }
}

/// an integer scalar type
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum IntType {
    /// 32-bit signed integer
    I32,
    /// 32-bit unsigned integer
    U32,
}

/// a float scalar type
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum FloatType {
    /// 16-bit float
    F16,
    /// 32-bit float
    F32,
}

/// a member of a struct type
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub struct StructMember<'g> {
    /// the member name
    pub name: Interned<'g, str>,
    /// the member type
    pub ty: Interned<'g, Type<'g>>,
}

/// an IR type
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub enum Type<'g> {
    /// the void type; only valid as a function return type or the result
    /// type of a call to a void function
    Void,
    /// the boolean type
    Bool,
    /// an integer scalar
    Int(IntType),
    /// a float scalar
    Float(FloatType),
    /// a vector of 2, 3 or 4 scalars
    Vector {
        /// the number of elements
        size: u32,
        /// the element type
        elem: Interned<'g, Type<'g>>,
    },
    /// a matrix of column vectors
    Matrix {
        /// the number of columns
        columns: u32,
        /// the number of rows
        rows: u32,
        /// the element type
        elem: Interned<'g, Type<'g>>,
    },
    /// a fixed-size array
    Array {
        /// the element type
        elem: Interned<'g, Type<'g>>,
        /// the element count
        count: u32,
    },
    /// a struct type
    Struct {
        /// the struct name
        name: Interned<'g, str>,
        /// the members, in declaration order
        members: Vec<StructMember<'g>>,
    },
    /// a pointer to a place
    Pointer {
        /// the address space
        space: AddressSpace,
        /// the pointed-to type
        store: Interned<'g, Type<'g>>,
        /// the access mode
        access: Access,
    },
}

impl<'g> Type<'g> {
    /// intern the `i32` type
    pub fn i32(global_state: &'g GlobalState<'g>) -> Interned<'g, Type<'g>> {
        Type::Int(IntType::I32).intern(global_state)
    }
    /// intern the `u32` type
    pub fn u32(global_state: &'g GlobalState<'g>) -> Interned<'g, Type<'g>> {
        Type::Int(IntType::U32).intern(global_state)
    }
    /// intern the `f32` type
    pub fn f32(global_state: &'g GlobalState<'g>) -> Interned<'g, Type<'g>> {
        Type::Float(FloatType::F32).intern(global_state)
    }
    /// intern the `bool` type
    pub fn bool(global_state: &'g GlobalState<'g>) -> Interned<'g, Type<'g>> {
        Type::Bool.intern(global_state)
    }
    /// intern the `void` type
    pub fn void(global_state: &'g GlobalState<'g>) -> Interned<'g, Type<'g>> {
        Type::Void.intern(global_state)
    }
    /// intern a vector type
    pub fn vector(
        size: u32,
        elem: Interned<'g, Type<'g>>,
        global_state: &'g GlobalState<'g>,
    ) -> Interned<'g, Type<'g>> {
        Type::Vector { size, elem }.intern(global_state)
    }
    /// intern a pointer type
    pub fn pointer(
        space: AddressSpace,
        store: Interned<'g, Type<'g>>,
        access: Access,
        global_state: &'g GlobalState<'g>,
    ) -> Interned<'g, Type<'g>> {
        Type::Pointer {
            space,
            store,
            access,
        }
        .intern(global_state)
    }

    /// `true` if `self` is `bool`
    pub fn is_bool(&self) -> bool {
        matches!(self, Type::Bool)
    }
    /// `true` if `self` is `void`
    pub fn is_void(&self) -> bool {
        matches!(self, Type::Void)
    }
    /// `true` if `self` is `i32` or `u32`
    pub fn is_integer_scalar(&self) -> bool {
        matches!(self, Type::Int(_))
    }
    /// `true` if `self` is `i32`
    pub fn is_signed_integer_scalar(&self) -> bool {
        matches!(self, Type::Int(IntType::I32))
    }
    /// `true` if `self` is a float scalar
    pub fn is_float_scalar(&self) -> bool {
        matches!(self, Type::Float(_))
    }
    /// `true` if `self` is any scalar
    pub fn is_scalar(&self) -> bool {
        matches!(self, Type::Bool | Type::Int(_) | Type::Float(_))
    }
    /// `true` if `self` is a scalar or a vector of scalars
    pub fn is_numeric(&self) -> bool {
        match self {
            Type::Int(_) | Type::Float(_) => true,
            Type::Vector { elem, .. } => elem.is_numeric(),
            _ => false,
        }
    }
    /// `true` if `self` is a pointer
    pub fn is_pointer(&self) -> bool {
        matches!(self, Type::Pointer { .. })
    }
    /// the pointed-to type, if `self` is a pointer
    pub fn pointee(&self) -> Option<Interned<'g, Type<'g>>> {
        match self {
            Type::Pointer { store, .. } => Some(*store),
            _ => None,
        }
    }
    /// the address space and access mode, if `self` is a pointer
    pub fn pointer_parts(&self) -> Option<(AddressSpace, Access)> {
        match self {
            Type::Pointer { space, access, .. } => Some((*space, *access)),
            _ => None,
        }
    }
    /// the element type and size, if `self` is a vector
    pub fn vector_parts(&self) -> Option<(Interned<'g, Type<'g>>, u32)> {
        match self {
            Type::Vector { size, elem } => Some((*elem, *size)),
            _ => None,
        }
    }
    /// the type obtained by indexing `self` with `index`, interning any
    /// derived type. `index` is `None` for a dynamic (non-constant) index,
    /// which is invalid for structs.
    pub fn indexed_type(
        &self,
        index: Option<u64>,
        global_state: &'g GlobalState<'g>,
    ) -> Option<Interned<'g, Type<'g>>> {
        match self {
            Type::Vector { size, elem } => match index {
                Some(index) if index >= u64::from(*size) => None,
                _ => Some(*elem),
            },
            Type::Matrix {
                columns,
                rows,
                elem,
            } => match index {
                Some(index) if index >= u64::from(*columns) => None,
                _ => Some(Type::vector(*rows, *elem, global_state)),
            },
            Type::Array { elem, count } => match index {
                Some(index) if index >= u64::from(*count) => None,
                _ => Some(*elem),
            },
            Type::Struct { members, .. } => {
                let index = index?;
                members.get(index as usize).map(|m| m.ty)
            }
            _ => None,
        }
    }
}

impl fmt::Display for Type<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Type::Void => f.pad("void"),
            Type::Bool => f.pad("bool"),
            Type::Int(IntType::I32) => f.pad("i32"),
            Type::Int(IntType::U32) => f.pad("u32"),
            Type::Float(FloatType::F16) => f.pad("f16"),
            Type::Float(FloatType::F32) => f.pad("f32"),
            Type::Vector { size, elem } => write!(f, "vec{}<{}>", size, elem),
            Type::Matrix {
                columns,
                rows,
                elem,
            } => write!(f, "mat{}x{}<{}>", columns, rows, elem),
            Type::Array { elem, count } => write!(f, "array<{}, {}>", elem, count),
            Type::Struct { name, .. } => write!(f, "{}", name),
            Type::Pointer {
                space,
                store,
                access,
            } => write!(f, "ptr<{}, {}, {}>", space, store, access),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let global_state = GlobalState::new();
        let f32_ty = Type::f32(&global_state);
        let vec4 = Type::vector(4, f32_ty, &global_state);
        assert_eq!(vec4.to_string(), "vec4<f32>");
        let ptr = Type::pointer(AddressSpace::Function, vec4, Access::ReadWrite, &global_state);
        assert_eq!(ptr.to_string(), "ptr<function, vec4<f32>, read_write>");
    }

    #[test]
    fn test_indexed_type() {
        let global_state = GlobalState::new();
        let f32_ty = Type::f32(&global_state);
        let mat = Type::Matrix {
            columns: 2,
            rows: 3,
            elem: f32_ty,
        }
        .intern(&global_state);
        let column = mat.indexed_type(Some(1), &global_state).unwrap();
        assert_eq!(column, Type::vector(3, f32_ty, &global_state));
        assert!(mat.indexed_type(Some(2), &global_state).is_none());

        let members = vec![
            StructMember {
                name: "a".intern(&global_state),
                ty: f32_ty,
            },
            StructMember {
                name: "b".intern(&global_state),
                ty: Type::bool(&global_state),
            },
        ];
        let st = Type::Struct {
            name: "S".intern(&global_state),
            members,
        }
        .intern(&global_state);
        assert_eq!(st.indexed_type(Some(1), &global_state).unwrap().to_string(), "bool");
        // dynamic indexes are not valid on structs
        assert!(st.indexed_type(None, &global_state).is_none());
    }
}
