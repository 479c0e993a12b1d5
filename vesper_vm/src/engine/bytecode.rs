// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The executable form: a linear instruction stream with an attached
//! constant pool, a name pool for identifier-addressed opcodes, the nested
//! function templates, and the frame's local-slot count.

use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    Pop,
    Dup,
    LoadConstant,
    LoadLocal,
    StoreLocal,
    /// Resolve a name through the environment chain, then the globals.
    LoadScope,
    StoreScope,
    /// Ensure a global binding exists (hoisted top-level `var`).
    DeclareGlobal,
    /// `typeof` of an unresolvable name is "undefined", not an error.
    TypeofScope,
    LoadThis,

    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Lt,
    Le,
    Gt,
    Ge,
    /// Abstract equality.
    Eq,
    /// Strict equality.
    StrictEq,
    Not,
    Neg,
    Plus,
    TypeofValue,

    Jump,
    JumpIfFalse,
    JumpIfTrue,

    /// `a` = argument count; stack: `[callee, args…]`.
    Call,
    /// `a` = argument count; stack: `[this, callee, args…]`.
    CallMethod,
    /// `a` = argument count; stack: `[callee, args…]`.
    New,
    Return,

    /// `a` = element count, popped off the stack.
    NewArray,
    NewObject,
    /// `a` = name-pool index; stack: `[object]` → `[value]`.
    GetProperty,
    /// `a` = name-pool index; stack: `[object, value]` → `[value]`.
    SetProperty,
    /// Stack: `[object, key]` → `[value]`.
    GetPropertyComputed,
    /// Stack: `[object, key, value]` → `[value]`.
    SetPropertyComputed,
    /// `a` = name-pool index; pushes a boolean.
    DeleteProperty,
    DeletePropertyComputed,

    /// `a` = template index.
    CreateClosure,
    /// `a` = template index; the template is tagged async.
    CreateAsyncClosure,

    Await,
    Yield,
    Throw,
    /// `a` = catch target instruction index.
    PushExceptionHandler,
    PopExceptionHandler,

    /// Pop the iterable, push a sync iterator onto the iterator stack.
    GetIterator,
    /// Same, preferring `@@asyncIterator`.
    GetAsyncIterator,
    /// Step the top iterator; `a` = jump target once done.
    ForOfNext,
    /// Call `next()` on the top iterator and push the raw result.
    ForAwaitNext,
    /// Unpack `{value, done}`; `a` = jump target once done.
    IteratorUnpack,
    /// Pop the top iterator and run its `return()` cleanup.
    IteratorClose,
    /// Pop the object, push a snapshot of its enumerable keys.
    ForInStart,
    /// Push the next key; `a` = jump target once exhausted.
    ForInNext,
    ForInEnd,

    /// Pop into the frame's completion-value slot (top-level expression
    /// statements).
    StoreResult,
    LoadResult,
}

/// `(opcode, operand₁, operand₂)` — branch targets are instruction
/// indexes, the rest are pool indexes or counts. No current opcode needs a
/// second operand, but the slot keeps the layout uniform for patching.
#[derive(Debug, Clone, Copy)]
pub struct Instruction {
    pub opcode: Opcode,
    pub a: u32,
    pub b: u32,
}

impl Instruction {
    pub fn new(opcode: Opcode, a: u32) -> Self {
        Self { opcode, a, b: 0 }
    }

    pub fn plain(opcode: Opcode) -> Self {
        Self {
            opcode,
            a: 0,
            b: 0,
        }
    }
}

/// Compile-time constants. Strings are materialized into heap strings at
/// load time; function literals live in the template table next to the
/// pool.
#[derive(Debug, Clone, PartialEq)]
pub enum Constant {
    Undefined,
    Null,
    Boolean(bool),
    Integer(i32),
    Float(f64),
    /// UTF-16 code units of a string literal.
    String(Rc<[u16]>),
}

#[derive(Debug)]
pub struct Executable {
    pub instructions: Vec<Instruction>,
    pub constants: Vec<Constant>,
    /// Identifier pool for name-addressed opcodes.
    pub names: Vec<Box<str>>,
    /// Nested function literals, referenced by `CreateClosure`.
    pub templates: Vec<Rc<FunctionTemplate>>,
    /// Local slots the interpreter must allocate per frame.
    pub local_count: u32,
}

/// A binding created in the frame's heap environment at entry (a captured
/// local).
#[derive(Debug)]
pub struct EnvBinding {
    pub name: Box<str>,
    pub mutable: bool,
}

/// The compiled shape of one function literal.
#[derive(Debug)]
pub struct FunctionTemplate {
    pub name: Box<str>,
    pub param_count: u32,
    pub is_async: bool,
    pub is_generator: bool,
    pub is_arrow: bool,
    /// Captured locals, created in a fresh environment at frame entry.
    pub env_bindings: Vec<EnvBinding>,
    /// `(parameter index, env_bindings index)` pairs for captured
    /// parameters, copied from the arguments at frame entry.
    pub captured_params: Vec<(u32, u32)>,
    pub executable: Rc<Executable>,
}
