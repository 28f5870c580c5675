// lox-vm - Bytecode compiler and virtual machine for the Lox programming language
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Heap object types: strings, functions, natives, closures, and upvalues.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::chunk::Chunk;
use crate::value::Value;

// ============================================================================
// Strings
// ============================================================================

/// An immutable interned string.
///
/// The hash is precomputed at interning time so table probes never rehash.
/// Because every `LoxString` is produced by [`crate::table::Table::intern`],
/// equal content implies an identical handle and equality checks reduce to
/// `Rc::ptr_eq`.
#[derive(Debug)]
pub struct LoxString {
    pub text: String,
    pub hash: u32,
}

impl LoxString {
    pub fn new(text: String) -> LoxString {
        let hash = hash_string(&text);
        LoxString { text, hash }
    }
}

impl fmt::Display for LoxString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// 32-bit FNV-1a.
pub fn hash_string(text: &str) -> u32 {
    let mut hash: u32 = 2166136261;
    for byte in text.bytes() {
        hash ^= byte as u32;
        hash = hash.wrapping_mul(16777619);
    }
    hash
}

// ============================================================================
// Functions
// ============================================================================

/// A compiled function: the prototype shared by every closure over it.
#[derive(Debug)]
pub struct Function {
    /// Number of parameters.
    pub arity: u8,

    /// Number of variables captured from enclosing scopes.
    pub upvalue_count: usize,

    /// The compiled bytecode for this function's body.
    pub chunk: Chunk,

    /// Function name; `None` for the top-level script.
    pub name: Option<Rc<LoxString>>,
}

impl Function {
    /// Create an empty function with no code.
    pub fn new(name: Option<Rc<LoxString>>) -> Function {
        Function {
            arity: 0,
            upvalue_count: 0,
            chunk: Chunk::new(),
            name,
        }
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "<fn {}>", name),
            None => f.write_str("<script>"),
        }
    }
}

// ============================================================================
// Native functions
// ============================================================================

/// A native (Rust) function exposed to Lox code.
///
/// The implementation receives the argument slots and returns a value; an
/// `Err` surfaces as a runtime error with the given message.
#[derive(Clone)]
pub struct NativeFunction {
    pub name: Rc<str>,
    func: Rc<dyn Fn(&[Value]) -> Result<Value, String>>,
}

impl NativeFunction {
    pub fn new(
        name: impl Into<Rc<str>>,
        func: impl Fn(&[Value]) -> Result<Value, String> + 'static,
    ) -> NativeFunction {
        NativeFunction {
            name: name.into(),
            func: Rc::new(func),
        }
    }

    /// Invoke the native with the given argument slots.
    pub fn call(&self, args: &[Value]) -> Result<Value, String> {
        (self.func)(args)
    }
}

impl fmt::Debug for NativeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<native fn {}>", self.name)
    }
}

impl PartialEq for NativeFunction {
    fn eq(&self, other: &Self) -> bool {
        // Identity equality, same as every other object type.
        Rc::ptr_eq(&self.func, &other.func)
    }
}

// ============================================================================
// Closures and upvalues
// ============================================================================

/// A function paired with its resolved captures.
#[derive(Debug)]
pub struct Closure {
    pub function: Rc<Function>,

    /// One entry per `function.upvalue_count`, shared with any sibling
    /// closures that captured the same variable.
    pub upvalues: Vec<Rc<RefCell<Upvalue>>>,
}

impl Closure {
    /// Wrap a function that captures nothing.
    pub fn new(function: Rc<Function>) -> Closure {
        Closure {
            function,
            upvalues: Vec::new(),
        }
    }
}

/// A captured variable.
///
/// While the variable's stack slot is live the upvalue stays `Open` and reads
/// and writes go through the stack. When the slot leaves scope the VM hoists
/// the value into the `Closed` variant, which every closure sharing the
/// capture then sees.
#[derive(Debug)]
pub enum Upvalue {
    /// Index of the captured value-stack slot.
    Open(usize),
    /// The hoisted value, owned by the upvalue itself.
    Closed(Value),
}
