// lox-vm - Bytecode compiler and virtual machine for the Lox programming language
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Bytecode compiler and stack-based virtual machine for Lox.
//!
//! Source text is compiled in a single pass, with no AST, straight to
//! bytecode by a Pratt parser, then executed by a stack machine. The crate
//! exposes one main entry point, [`Vm::interpret`]; globals and interned
//! strings persist on the `Vm` across calls.

pub mod chunk;
pub mod compiler;
pub mod debug;
pub mod object;
pub mod opcode;
pub mod table;
pub mod value;
pub mod vm;

pub use chunk::Chunk;
pub use compiler::{CompileError, compile};
pub use opcode::OpCode;
pub use value::Value;
pub use vm::{InterpretError, RuntimeError, RuntimeErrorKind, Vm};
