// SPDX-License-Identifier: LGPL-2.1-or-later
// See Notices.txt for copyright information

//! resolved types as produced by the semantic analyzer

use std::fmt;

/// the address space of a pointer or reference
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
    /// the textual form used in source and disassembly
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

/// the access mode of a pointer or reference
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
    /// the textual form used in source and disassembly
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

/// a member of a resolved struct type
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub struct StructMember {
    /// the member name
    pub name: String,
    /// the member type
    pub ty: Type,
}

/// a resolved struct type
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub struct StructType {
    /// the struct name
    pub name: String,
    /// the members, in declaration order
    pub members: Vec<StructMember>,
}

/// a resolved type. Place expressions are typed as `Reference`; everything
/// else is a value type. The resolver guarantees `Reference` never nests.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub enum Type {
    /// the void type, only valid as a function return type
    Void,
    /// the boolean type
    Bool,
    /// 32-bit signed integer
    I32,
    /// 32-bit unsigned integer
    U32,
    /// 32-bit float
    F32,
    /// 16-bit float
    F16,
    /// a vector of 2, 3 or 4 scalars
    Vector {
        /// the number of elements
        size: u32,
        /// the element type
        elem: Box<Type>,
    },
    /// a matrix of column vectors
    Matrix {
        /// the number of columns
        columns: u32,
        /// the number of rows
        rows: u32,
        /// the element type
        elem: Box<Type>,
    },
    /// a fixed-size array
    Array {
        /// the element type
        elem: Box<Type>,
        /// the element count
        count: u32,
    },
    /// a struct type
    Struct(StructType),
    /// a pointer to a place
    Pointer {
        /// the address space
        space: AddressSpace,
        /// the pointed-to type
        store: Box<Type>,
        /// the access mode
        access: Access,
    },
    /// a reference to a place; the type of `var` names and of access chains
    /// rooted at them
    Reference {
        /// the address space
        space: AddressSpace,
        /// the referenced type
        store: Box<Type>,
        /// the access mode
        access: Access,
    },
}

impl Type {
    /// shorthand for a vector type
    pub fn vector(size: u32, elem: Type) -> Type {
        Type::Vector {
            size,
            elem: Box::new(elem),
        }
    }
    /// shorthand for a reference type
    pub fn reference(space: AddressSpace, store: Type, access: Access) -> Type {
        Type::Reference {
            space,
            store: Box::new(store),
            access,
        }
    }
    /// shorthand for a pointer type
    pub fn pointer(space: AddressSpace, store: Type, access: Access) -> Type {
        Type::Pointer {
            space,
            store: Box::new(store),
            access,
        }
    }
    /// `true` if `self` is a `Reference`
    pub fn is_reference(&self) -> bool {
        matches!(self, Type::Reference { .. })
    }
    /// `true` if `self` is a `Pointer`
    pub fn is_pointer(&self) -> bool {
        matches!(self, Type::Pointer { .. })
    }
    /// `true` for `i32` and `u32`
    pub fn is_integer_scalar(&self) -> bool {
        matches!(self, Type::I32 | Type::U32)
    }
    /// `true` for `i32`
    pub fn is_signed_integer_scalar(&self) -> bool {
        matches!(self, Type::I32)
    }
    /// strip one level of `Reference`, if any
    pub fn unwrap_ref(&self) -> &Type {
        match self {
            Type::Reference { store, .. } => store,
            other => other,
        }
    }
    /// the stored type of a `Reference` or `Pointer`
    pub fn store_type(&self) -> Option<&Type> {
        match self {
            Type::Reference { store, .. } | Type::Pointer { store, .. } => Some(store),
            _ => None,
        }
    }
    /// the element type of a vector
    pub fn vector_elem(&self) -> Option<&Type> {
        match self {
            Type::Vector { elem, .. } => Some(elem),
            _ => None,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Type::Void => f.pad("void"),
            Type::Bool => f.pad("bool"),
            Type::I32 => f.pad("i32"),
            Type::U32 => f.pad("u32"),
            Type::F32 => f.pad("f32"),
            Type::F16 => f.pad("f16"),
            Type::Vector { size, elem } => write!(f, "vec{}<{}>", size, elem),
            Type::Matrix {
                columns,
                rows,
                elem,
            } => write!(f, "mat{}x{}<{}>", columns, rows, elem),
            Type::Array { elem, count } => write!(f, "array<{}, {}>", elem, count),
            Type::Struct(s) => f.pad(&s.name),
            Type::Pointer {
                space,
                store,
                access,
            } => write!(f, "ptr<{}, {}, {}>", space, store, access),
            Type::Reference {
                space,
                store,
                access,
            } => write!(f, "ref<{}, {}, {}>", space, store, access),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(Type::vector(3, Type::F32).to_string(), "vec3<f32>");
        assert_eq!(
            Type::pointer(AddressSpace::Function, Type::I32, Access::ReadWrite).to_string(),
            "ptr<function, i32, read_write>"
        );
        assert_eq!(
            Type::Matrix {
                columns: 2,
                rows: 4,
                elem: Box::new(Type::F16)
            }
            .to_string(),
            "mat2x4<f16>"
        );
    }
}
