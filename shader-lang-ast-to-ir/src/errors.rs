// SPDX-License-Identifier: LGPL-2.1-or-later
// See Notices.txt for copyright information

//! builder error types

use std::fmt;

macro_rules! impl_error {
    (
        $(#[doc = $doc:expr])*
        #[display = $display:literal]
        pub struct $name:ident {
            $(
                $(#[doc = $member_doc:expr])*
                pub $member_name:ident: $member_ty:ty,
            )*
        }
    ) => {
        $(#[doc = $doc])*
        #[derive(Debug)]
        pub struct $name {
            $(
                $(#[doc = $member_doc])*
                pub $member_name: $member_ty,
            )*
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                write!(
                    f,
                    $display,
                    $($member_name = self.$member_name,)*
                )
            }
        }
    };
    (
        $(#[doc = $doc:expr])*
        #[display = $display:literal]
        pub struct $name:ident;
    ) => {
        $(#[doc = $doc])*
        #[derive(Debug)]
        pub struct $name;

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                write!(f, $display)
            }
        }
    };
}

impl_error! {
    /// the program uses a construct the IR cannot represent; detected
    /// before lowering begins
    #[display = "unsupported construct for IR: {construct}"]
    pub struct UnsupportedConstruct {
        /// a description of the offending construct
        pub construct: String,
    }
}

impl_error! {
    /// an identifier did not resolve to anything in scope; the resolver
    /// should have rejected the program
    #[display = "unable to find identifier {name}"]
    pub struct UnknownIdentifier {
        /// the identifier
        pub name: String,
    }
}

impl_error! {
    /// a call targets a name that is not a function of this module
    #[display = "unable to find function {name}"]
    pub struct UnknownFunction {
        /// the callee name
        pub name: String,
    }
}

impl_error! {
    /// the left side of an assignment is not a place
    #[display = "expression is not assignable"]
    pub struct NotAssignable;
}

macro_rules! impl_build_error {
    ($($error:ident($wrapped_error:ty),)+) => {
        $(
            impl From<$wrapped_error> for BuildError {
                fn from(v: $wrapped_error) -> Self {
                    BuildError::$error(v)
                }
            }
        )+

        /// the reasons lowering a program to IR can fail
        #[derive(Debug)]
        pub enum BuildError {
            $(
                $error($wrapped_error),
            )+
        }

        impl fmt::Display for BuildError {
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                write!(f, "failed to build IR from program: ")?;
                match self {
                    $(
                        Self::$error(v) => fmt::Display::fmt(v, f),
                    )+
                }
            }
        }
    };
}

impl_build_error! {
    UnsupportedConstruct(UnsupportedConstruct),
    UnknownIdentifier(UnknownIdentifier),
    UnknownFunction(UnknownFunction),
    NotAssignable(NotAssignable),
}

impl std::error::Error for BuildError {}

pub(crate) type BuildResult<T> = Result<T, BuildError>;
