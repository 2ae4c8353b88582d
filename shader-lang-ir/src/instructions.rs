// SPDX-License-Identifier: LGPL-2.1-or-later
// See Notices.txt for copyright information

//! the instruction set
//!
//! Instructions are a closed sum type, so the validator, the disassembler
//! and the writer all dispatch with exhaustive matches; adding a kind is a
//! compile-time event everywhere. Control instructions (`If`, `Loop`,
//! `Switch`) are arena-allocated and identified by address, because exit
//! terminators must name the exact instruction they leave.

use crate::block::Block;
use crate::consts::Const;
use crate::debug::Location;
use crate::function::FunctionRef;
use crate::global_state::{Allocate, GlobalState, Id, IdRef, Interned};
use crate::values::{ValueDefinition, ValueUse};
use std::fmt;

/// a group/binding attribute pair on a module-scope variable
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct BindingPoint {
    /// the `@group` value
    pub group: u32,
    /// the `@binding` value
    pub binding: u32,
}

/// a unary operator
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum UnaryOp {
    /// arithmetic negation
    Negation,
    /// bitwise complement
    Complement,
    /// logical not
    Not,
}

impl UnaryOp {
    /// the disassembly mnemonic
    pub fn text(self) -> &'static str {
        match self {
            UnaryOp::Negation => "negation",
            UnaryOp::Complement => "complement",
            UnaryOp::Not => "not",
        }
    }
}

/// a binary operator. The short-circuiting source operators never reach the
/// IR; they are decomposed into `If` by the builder.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum BinaryOp {
    /// `+`
    Add,
    /// `-`
    Subtract,
    /// `*`
    Multiply,
    /// `/`
    Divide,
    /// `%`
    Modulo,
    /// bitwise (or non-short-circuit logical) `&`
    And,
    /// bitwise (or non-short-circuit logical) `|`
    Or,
    /// bitwise `^`
    Xor,
    /// `==`
    Equal,
    /// `!=`
    NotEqual,
    /// `<`
    LessThan,
    /// `>`
    GreaterThan,
    /// `<=`
    LessThanEqual,
    /// `>=`
    GreaterThanEqual,
    /// `<<`
    ShiftLeft,
    /// `>>`
    ShiftRight,
}

impl BinaryOp {
    /// the disassembly mnemonic
    pub fn text(self) -> &'static str {
        match self {
            BinaryOp::Add => "add",
            BinaryOp::Subtract => "sub",
            BinaryOp::Multiply => "mul",
            BinaryOp::Divide => "div",
            BinaryOp::Modulo => "mod",
            BinaryOp::And => "and",
            BinaryOp::Or => "or",
            BinaryOp::Xor => "xor",
            BinaryOp::Equal => "eq",
            BinaryOp::NotEqual => "neq",
            BinaryOp::LessThan => "lt",
            BinaryOp::GreaterThan => "gt",
            BinaryOp::LessThanEqual => "lte",
            BinaryOp::GreaterThanEqual => "gte",
            BinaryOp::ShiftLeft => "shl",
            BinaryOp::ShiftRight => "shr",
        }
    }
    /// `true` for the comparison operators, whose result is boolean rather
    /// than the operand type
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryOp::Equal
                | BinaryOp::NotEqual
                | BinaryOp::LessThan
                | BinaryOp::GreaterThan
                | BinaryOp::LessThanEqual
                | BinaryOp::GreaterThanEqual
        )
    }
}

/// a builtin function callable from shader code
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum BuiltinFn {
    /// absolute value
    Abs,
    /// round up
    Ceil,
    /// clamp to a range
    Clamp,
    /// cosine
    Cos,
    /// 3-component cross product
    Cross,
    /// distance between points
    Distance,
    /// dot product
    Dot,
    /// round down
    Floor,
    /// vector length
    Length,
    /// maximum
    Max,
    /// minimum
    Min,
    /// linear blend
    Mix,
    /// unit-length vector
    Normalize,
    /// power
    Pow,
    /// sine
    Sin,
    /// square root
    Sqrt,
}

impl BuiltinFn {
    /// the source-level name, also used as the disassembly mnemonic
    pub fn text(self) -> &'static str {
        match self {
            BuiltinFn::Abs => "abs",
            BuiltinFn::Ceil => "ceil",
            BuiltinFn::Clamp => "clamp",
            BuiltinFn::Cos => "cos",
            BuiltinFn::Cross => "cross",
            BuiltinFn::Distance => "distance",
            BuiltinFn::Dot => "dot",
            BuiltinFn::Floor => "floor",
            BuiltinFn::Length => "length",
            BuiltinFn::Max => "max",
            BuiltinFn::Min => "min",
            BuiltinFn::Mix => "mix",
            BuiltinFn::Normalize => "normalize",
            BuiltinFn::Pow => "pow",
            BuiltinFn::Sin => "sin",
            BuiltinFn::Sqrt => "sqrt",
        }
    }
}

impl fmt::Display for BuiltinFn {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.pad(self.text())
    }
}

/// a unary operator application
#[derive(Debug)]
pub struct Unary<'g> {
    /// the operator
    pub op: UnaryOp,
    /// the operand
    pub operand: ValueUse<'g>,
    /// the result
    pub result: ValueDefinition<'g>,
}

/// a binary operator application
#[derive(Debug)]
pub struct Binary<'g> {
    /// the operator
    pub op: BinaryOp,
    /// the operands, left then right
    pub operands: [ValueUse<'g>; 2],
    /// the result
    pub result: ValueDefinition<'g>,
}

/// an indexing/member projection through a pointer or value, producing a
/// narrower-typed sub-object (a pointer when the base is a pointer)
#[derive(Debug)]
pub struct Access<'g> {
    /// the pointer or composite value being projected
    pub base: ValueUse<'g>,
    /// the index chain, outermost first
    pub indices: Vec<ValueUse<'g>>,
    /// the result
    pub result: ValueDefinition<'g>,
}

/// a load through a pointer
#[derive(Debug)]
pub struct Load<'g> {
    /// the pointer loaded from
    pub pointer: ValueUse<'g>,
    /// the loaded value
    pub result: ValueDefinition<'g>,
}

/// a store through a pointer
#[derive(Debug)]
pub struct Store<'g> {
    /// the pointer stored to
    pub pointer: ValueUse<'g>,
    /// the stored value; its type must equal the pointee type
    pub value: ValueUse<'g>,
}

/// a load of one element from a pointer-to-vector
#[derive(Debug)]
pub struct LoadVectorElement<'g> {
    /// the pointer to the whole vector
    pub pointer: ValueUse<'g>,
    /// the element index
    pub index: ValueUse<'g>,
    /// the loaded element
    pub result: ValueDefinition<'g>,
}

/// a store of one element into a pointer-to-vector
#[derive(Debug)]
pub struct StoreVectorElement<'g> {
    /// the pointer to the whole vector
    pub pointer: ValueUse<'g>,
    /// the element index
    pub index: ValueUse<'g>,
    /// the stored element
    pub value: ValueUse<'g>,
}

/// a storage-slot declaration; the result is pointer-typed
#[derive(Debug)]
pub struct Var<'g> {
    /// the optional initializer
    pub initializer: Option<ValueUse<'g>>,
    /// the optional group/binding pair, for module-scope variables
    pub binding_point: Option<BindingPoint>,
    /// the pointer to the new storage slot
    pub result: ValueDefinition<'g>,
}

/// a named alias of a value; gives a `let` a place of declaration when its
/// initializer produced no instruction
#[derive(Debug)]
pub struct Let<'g> {
    /// the aliased value
    pub value: ValueUse<'g>,
    /// the result, carrying the `let`'s name
    pub result: ValueDefinition<'g>,
}

/// the callee of a [`Call`]
#[derive(Clone, Debug)]
pub enum CallTarget<'g> {
    /// a user function
    Function(FunctionRef<'g>),
    /// a builtin function
    Builtin(BuiltinFn),
}

/// a function call; arguments were fully evaluated left-to-right before the
/// call is appended
#[derive(Debug)]
pub struct Call<'g> {
    /// the callee
    pub target: CallTarget<'g>,
    /// the arguments
    pub arguments: Vec<ValueUse<'g>>,
    /// the result; void-typed for calls to void functions
    pub result: ValueDefinition<'g>,
}

/// a value constructor
#[derive(Debug)]
pub struct Construct<'g> {
    /// the constructor arguments
    pub arguments: Vec<ValueUse<'g>>,
    /// the constructed value
    pub result: ValueDefinition<'g>,
}

/// a value conversion
#[derive(Debug)]
pub struct Convert<'g> {
    /// the converted value
    pub argument: ValueUse<'g>,
    /// the result, in the target type
    pub result: ValueDefinition<'g>,
}

/// a bit reinterpretation cast
#[derive(Debug)]
pub struct Bitcast<'g> {
    /// the reinterpreted value
    pub argument: ValueUse<'g>,
    /// the result, in the target type
    pub result: ValueDefinition<'g>,
}

/// a multi-component vector shuffle of a vector *value*
#[derive(Debug)]
pub struct Swizzle<'g> {
    /// the source vector
    pub vector: ValueUse<'g>,
    /// the component indices, each in 0..4
    pub indices: Vec<u32>,
    /// the shuffled vector
    pub result: ValueDefinition<'g>,
}

/// fragment discard; execution continues with writes predicated off
#[derive(Debug)]
pub struct Discard;

/// a case of a [`SwitchData`]
#[derive(Debug)]
pub struct SwitchCase<'g> {
    /// the selectors, in source order
    pub selectors: Vec<CaseSelector<'g>>,
    /// the case body
    pub block: Block<'g>,
}

/// a selector of a switch case
#[derive(Copy, Clone, Debug)]
pub enum CaseSelector<'g> {
    /// a constant selector value
    Value(Interned<'g, Const<'g>>),
    /// the `default` marker
    Default,
}

impl<'g> CaseSelector<'g> {
    /// `true` if this is the default marker
    pub fn is_default(&self) -> bool {
        matches!(self, CaseSelector::Default)
    }
}

/// an `if` control instruction, owning its branch blocks
#[derive(Debug)]
pub struct IfData<'g> {
    /// the boolean condition
    pub condition: ValueUse<'g>,
    /// the true branch
    pub true_block: Block<'g>,
    /// the optional false branch
    pub false_block: Option<Block<'g>>,
    /// merge values, supplied by each branch's `ExitIf` arguments
    pub results: Vec<ValueDefinition<'g>>,
}

impl<'g> Id<'g> for IfData<'g> {}

impl<'g> IfData<'g> {
    /// allocate a new `if`
    pub fn new(
        condition: ValueUse<'g>,
        true_block: Block<'g>,
        false_block: Option<Block<'g>>,
        results: Vec<ValueDefinition<'g>>,
        global_state: &'g GlobalState<'g>,
    ) -> IdRef<'g, IfData<'g>> {
        global_state.alloc(IfData {
            condition,
            true_block,
            false_block,
            results,
        })
    }
}

/// a `loop` control instruction, owning its regions
#[derive(Debug)]
pub struct LoopData<'g> {
    /// the optional initializer region, run once; terminated by
    /// `NextIteration`
    pub initializer: Option<Block<'g>>,
    /// the body, run every iteration
    pub body: Block<'g>,
    /// the optional continuing region, run between iterations; the only
    /// place `BreakIf` may appear
    pub continuing: Option<Block<'g>>,
    /// merge values, supplied by each `ExitLoop`'s arguments
    pub results: Vec<ValueDefinition<'g>>,
}

impl<'g> Id<'g> for LoopData<'g> {}

impl<'g> LoopData<'g> {
    /// allocate a new `loop`
    pub fn new(
        initializer: Option<Block<'g>>,
        body: Block<'g>,
        continuing: Option<Block<'g>>,
        results: Vec<ValueDefinition<'g>>,
        global_state: &'g GlobalState<'g>,
    ) -> IdRef<'g, LoopData<'g>> {
        global_state.alloc(LoopData {
            initializer,
            body,
            continuing,
            results,
        })
    }
}

/// a `switch` control instruction, owning one block per case
#[derive(Debug)]
pub struct SwitchData<'g> {
    /// the integer selector
    pub condition: ValueUse<'g>,
    /// the cases, in source order; exactly one selector among all cases
    /// must be the default marker
    pub cases: Vec<SwitchCase<'g>>,
    /// merge values, supplied by each `ExitSwitch`'s arguments
    pub results: Vec<ValueDefinition<'g>>,
}

impl<'g> Id<'g> for SwitchData<'g> {}

impl<'g> SwitchData<'g> {
    /// allocate a new `switch`
    pub fn new(
        condition: ValueUse<'g>,
        cases: Vec<SwitchCase<'g>>,
        results: Vec<ValueDefinition<'g>>,
        global_state: &'g GlobalState<'g>,
    ) -> IdRef<'g, SwitchData<'g>> {
        global_state.alloc(SwitchData {
            condition,
            cases,
            results,
        })
    }
}

macro_rules! control_ref {
    (
        $(#[doc = $doc:expr])+
        $name:ident($data:ident)
    ) => {
        $(#[doc = $doc])+
        #[derive(Copy, Clone, Eq, PartialEq, Hash)]
        pub struct $name<'g>(IdRef<'g, $data<'g>>);

        impl<'g> $name<'g> {
            /// create a new reference to the control instruction
            pub fn new(data: IdRef<'g, $data<'g>>) -> Self {
                Self(data)
            }
            /// the referenced control instruction
            pub fn get(self) -> IdRef<'g, $data<'g>> {
                self.0
            }
        }

        // the referent is printed by its owning block; printing it here
        // would recurse through the back edge
        impl<'g> fmt::Debug for $name<'g> {
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.pad(concat!(stringify!($name), "(..)"))
            }
        }
    };
}

control_ref! {
    /// a back-reference from an exit terminator to its `If`
    IfRef(IfData)
}

control_ref! {
    /// a back-reference from an exit terminator to its `Loop`
    LoopRef(LoopData)
}

control_ref! {
    /// a back-reference from an exit terminator to its `Switch`
    SwitchRef(SwitchData)
}

/// the single instruction ending a block
#[derive(Debug)]
pub enum Terminator<'g> {
    /// return from the function, with a value unless the function is void
    Return {
        /// the returned value
        value: Option<ValueUse<'g>>,
    },
    /// leave an `If`, supplying its merge values
    ExitIf {
        /// the `If` being left; must be the innermost enclosing control
        /// instruction
        target: IfRef<'g>,
        /// one argument per `If` result
        arguments: Vec<ValueUse<'g>>,
    },
    /// leave a `Switch`, supplying its merge values
    ExitSwitch {
        /// the `Switch` being left
        target: SwitchRef<'g>,
        /// one argument per `Switch` result
        arguments: Vec<ValueUse<'g>>,
    },
    /// leave a `Loop`, supplying its merge values
    ExitLoop {
        /// the `Loop` being left
        target: LoopRef<'g>,
        /// one argument per `Loop` result
        arguments: Vec<ValueUse<'g>>,
    },
    /// jump from a loop body to its continuing region (or directly to the
    /// next iteration when the loop has none)
    Continue {
        /// the loop continued
        target: LoopRef<'g>,
        /// one argument per continuing-block parameter
        arguments: Vec<ValueUse<'g>>,
    },
    /// start the next iteration of a loop; only valid in its initializer or
    /// continuing region
    NextIteration {
        /// the loop iterated
        target: LoopRef<'g>,
        /// one argument per body-block parameter
        arguments: Vec<ValueUse<'g>>,
    },
    /// conditionally leave a loop; only valid as the terminator of its
    /// continuing region. Falls through to the next iteration when the
    /// condition is false.
    BreakIf {
        /// the loop left when the condition holds
        target: LoopRef<'g>,
        /// the boolean exit condition
        condition: ValueUse<'g>,
    },
    /// control cannot reach here
    Unreachable,
}

impl<'g> Terminator<'g> {
    /// the operand values, in order
    pub fn operands(&self) -> Vec<ValueUse<'g>> {
        match self {
            Terminator::Return { value } => value.iter().copied().collect(),
            Terminator::ExitIf { arguments, .. }
            | Terminator::ExitSwitch { arguments, .. }
            | Terminator::ExitLoop { arguments, .. }
            | Terminator::Continue { arguments, .. }
            | Terminator::NextIteration { arguments, .. } => arguments.clone(),
            Terminator::BreakIf { condition, .. } => vec![*condition],
            Terminator::Unreachable => Vec::new(),
        }
    }
    /// the disassembly mnemonic
    pub fn text(&self) -> &'static str {
        match self {
            Terminator::Return { .. } => "return",
            Terminator::ExitIf { .. } => "exit_if",
            Terminator::ExitSwitch { .. } => "exit_switch",
            Terminator::ExitLoop { .. } => "exit_loop",
            Terminator::Continue { .. } => "continue",
            Terminator::NextIteration { .. } => "next_iteration",
            Terminator::BreakIf { .. } => "break_if",
            Terminator::Unreachable => "unreachable",
        }
    }
}

/// the variable part of an [`Inst`]
#[derive(Debug)]
pub enum InstData<'g> {
    /// a unary operator
    Unary(Unary<'g>),
    /// a binary operator
    Binary(Binary<'g>),
    /// a projection
    Access(Access<'g>),
    /// a load
    Load(Load<'g>),
    /// a store
    Store(Store<'g>),
    /// a vector-element load
    LoadVectorElement(LoadVectorElement<'g>),
    /// a vector-element store
    StoreVectorElement(StoreVectorElement<'g>),
    /// a storage declaration
    Var(Var<'g>),
    /// a named alias
    Let(Let<'g>),
    /// a call
    Call(Call<'g>),
    /// a constructor
    Construct(Construct<'g>),
    /// a conversion
    Convert(Convert<'g>),
    /// a bitcast
    Bitcast(Bitcast<'g>),
    /// a vector shuffle
    Swizzle(Swizzle<'g>),
    /// a fragment discard
    Discard(Discard),
    /// an `if`
    If(IdRef<'g, IfData<'g>>),
    /// a `loop`
    Loop(IdRef<'g, LoopData<'g>>),
    /// a `switch`
    Switch(IdRef<'g, SwitchData<'g>>),
}

impl<'g> InstData<'g> {
    /// the operand values, in order
    pub fn operands(&self) -> Vec<ValueUse<'g>> {
        match self {
            InstData::Unary(v) => vec![v.operand],
            InstData::Binary(v) => v.operands.to_vec(),
            InstData::Access(v) => {
                let mut operands = vec![v.base];
                operands.extend(v.indices.iter().copied());
                operands
            }
            InstData::Load(v) => vec![v.pointer],
            InstData::Store(v) => vec![v.pointer, v.value],
            InstData::LoadVectorElement(v) => vec![v.pointer, v.index],
            InstData::StoreVectorElement(v) => vec![v.pointer, v.index, v.value],
            InstData::Var(v) => v.initializer.iter().copied().collect(),
            InstData::Let(v) => vec![v.value],
            InstData::Call(v) => v.arguments.clone(),
            InstData::Construct(v) => v.arguments.clone(),
            InstData::Convert(v) => vec![v.argument],
            InstData::Bitcast(v) => vec![v.argument],
            InstData::Swizzle(v) => vec![v.vector],
            InstData::Discard(_) => Vec::new(),
            InstData::If(v) => vec![v.condition],
            InstData::Loop(_) => Vec::new(),
            InstData::Switch(v) => vec![v.condition],
        }
    }
    /// the result values, in order
    pub fn result_values(&self) -> Vec<IdRef<'g, crate::values::Value<'g>>> {
        match self {
            InstData::Unary(v) => vec![v.result.value()],
            InstData::Binary(v) => vec![v.result.value()],
            InstData::Access(v) => vec![v.result.value()],
            InstData::Load(v) => vec![v.result.value()],
            InstData::Store(_) => Vec::new(),
            InstData::LoadVectorElement(v) => vec![v.result.value()],
            InstData::StoreVectorElement(_) => Vec::new(),
            InstData::Var(v) => vec![v.result.value()],
            InstData::Let(v) => vec![v.result.value()],
            InstData::Call(v) => vec![v.result.value()],
            InstData::Construct(v) => vec![v.result.value()],
            InstData::Convert(v) => vec![v.result.value()],
            InstData::Bitcast(v) => vec![v.result.value()],
            InstData::Swizzle(v) => vec![v.result.value()],
            InstData::Discard(_) => Vec::new(),
            InstData::If(v) => v.results.iter().map(|r| r.value()).collect(),
            InstData::Loop(v) => v.results.iter().map(|r| r.value()).collect(),
            InstData::Switch(v) => v.results.iter().map(|r| r.value()).collect(),
        }
    }
    /// `true` if the instruction observes or produces side effects, so its
    /// position in the block is part of program behavior. Sequenced
    /// single-result instructions are only inlined when printing if doing
    /// so keeps their order.
    pub fn is_sequenced(&self) -> bool {
        match self {
            InstData::Load(_)
            | InstData::Store(_)
            | InstData::LoadVectorElement(_)
            | InstData::StoreVectorElement(_)
            | InstData::Var(_)
            | InstData::Let(_)
            | InstData::Call(_)
            | InstData::Discard(_)
            | InstData::If(_)
            | InstData::Loop(_)
            | InstData::Switch(_) => true,
            InstData::Unary(_)
            | InstData::Binary(_)
            | InstData::Access(_)
            | InstData::Construct(_)
            | InstData::Convert(_)
            | InstData::Bitcast(_)
            | InstData::Swizzle(_) => false,
        }
    }
}

macro_rules! impl_inst_data_from {
    ($($enumerant:ident($ty:ident),)+) => {
        $(
            impl<'g> From<$ty<'g>> for InstData<'g> {
                fn from(v: $ty<'g>) -> InstData<'g> {
                    InstData::$enumerant(v)
                }
            }
        )+
    };
}

impl_inst_data_from! {
    Unary(Unary),
    Binary(Binary),
    Access(Access),
    Load(Load),
    Store(Store),
    LoadVectorElement(LoadVectorElement),
    StoreVectorElement(StoreVectorElement),
    Var(Var),
    Let(Let),
    Call(Call),
    Construct(Construct),
    Convert(Convert),
    Bitcast(Bitcast),
    Swizzle(Swizzle),
}

impl<'g> From<Discard> for InstData<'g> {
    fn from(v: Discard) -> InstData<'g> {
        InstData::Discard(v)
    }
}

impl<'g> From<IdRef<'g, IfData<'g>>> for InstData<'g> {
    fn from(v: IdRef<'g, IfData<'g>>) -> InstData<'g> {
        InstData::If(v)
    }
}

impl<'g> From<IdRef<'g, LoopData<'g>>> for InstData<'g> {
    fn from(v: IdRef<'g, LoopData<'g>>) -> InstData<'g> {
        InstData::Loop(v)
    }
}

impl<'g> From<IdRef<'g, SwitchData<'g>>> for InstData<'g> {
    fn from(v: IdRef<'g, SwitchData<'g>>) -> InstData<'g> {
        InstData::Switch(v)
    }
}

/// an instruction: an optional source location plus the instruction data
#[derive(Debug)]
pub struct Inst<'g> {
    /// the source location, if known
    pub location: Option<Interned<'g, Location<'g>>>,
    /// the instruction itself
    pub data: InstData<'g>,
}

impl<'g> Inst<'g> {
    /// create an instruction with an optional location
    pub fn new(
        location: Option<Interned<'g, Location<'g>>>,
        data: impl Into<InstData<'g>>,
    ) -> Self {
        Self {
            location,
            data: data.into(),
        }
    }
    /// create an instruction with a location
    pub fn with_location(
        location: Interned<'g, Location<'g>>,
        data: impl Into<InstData<'g>>,
    ) -> Self {
        Self::new(Some(location), data)
    }
    /// create an instruction without a location
    pub fn without_location(data: impl Into<InstData<'g>>) -> Self {
        Self::new(None, data)
    }
}
