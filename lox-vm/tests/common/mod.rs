// lox-vm - Common test utilities
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Shared helpers for the interpreter integration tests.
//!
//! In your test file, add:
//! ```ignore
//! mod common;
//! use common::*;
//! ```

use lox_vm::vm::RuntimeError;
use lox_vm::{InterpretError, Vm};

/// Interpret `source` and return everything it printed.
///
/// # Panics
///
/// Panics if the program fails to compile or raises a runtime error.
#[must_use]
#[allow(dead_code)]
pub fn run(source: &str) -> String {
    let mut out = Vec::new();
    let mut vm = Vm::with_output(&mut out);
    if let Err(error) = vm.interpret(source) {
        panic!("unexpected error for {:?}:\n{}", source, error);
    }
    drop(vm);
    String::from_utf8(out).expect("interpreter output is UTF-8")
}

/// Interpret `source`, expecting it to fail.
#[must_use]
#[allow(dead_code)]
pub fn run_err(source: &str) -> InterpretError {
    let mut out = Vec::new();
    let mut vm = Vm::with_output(&mut out);
    match vm.interpret(source) {
        Ok(()) => panic!("expected an error for {:?}", source),
        Err(error) => error,
    }
}

/// Interpret `source`, expecting a runtime error.
#[must_use]
#[allow(dead_code)]
pub fn runtime_error(source: &str) -> RuntimeError {
    match run_err(source) {
        InterpretError::Runtime(error) => error,
        InterpretError::Compile(error) => {
            panic!("expected a runtime error for {:?}, got:\n{}", source, error)
        }
    }
}

/// Interpret `source`, expecting compile errors; returns the diagnostics.
#[must_use]
#[allow(dead_code)]
pub fn compile_diagnostics(source: &str) -> Vec<String> {
    match run_err(source) {
        InterpretError::Compile(error) => error.diagnostics,
        InterpretError::Runtime(error) => {
            panic!("expected a compile error for {:?}, got:\n{}", source, error)
        }
    }
}
