// lox-vm - Bytecode compiler and virtual machine for the Lox programming language
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Stack-based virtual machine for executing Lox bytecode.

pub mod error;
pub mod frame;
pub mod stack;

use std::cell::RefCell;
use std::fmt;
use std::io::{self, Write};
use std::rc::Rc;
use std::time::Instant;

use crate::compiler::{self, CompileError};
use crate::object::{Closure, LoxString, NativeFunction, Upvalue};
use crate::opcode::OpCode;
use crate::table::Table;
use crate::value::Value;

pub use error::{RuntimeError, RuntimeErrorKind, TraceFrame};
pub use frame::CallFrame;
pub use stack::ValueStack;

/// Maximum call depth.
pub const FRAMES_MAX: usize = 64;

/// Value stack capacity: 256 slots per frame.
pub const STACK_MAX: usize = FRAMES_MAX * 256;

type RunResult<T> = Result<T, RuntimeErrorKind>;

/// The outcome of [`Vm::interpret`] when the program does not finish.
#[derive(Debug)]
pub enum InterpretError {
    /// The source did not compile; no code ran.
    Compile(CompileError),
    /// Execution stopped on a runtime error; the VM stacks were reset.
    Runtime(RuntimeError),
}

impl fmt::Display for InterpretError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InterpretError::Compile(error) => write!(f, "{}", error),
            InterpretError::Runtime(error) => write!(f, "{}", error),
        }
    }
}

impl std::error::Error for InterpretError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            InterpretError::Compile(error) => Some(error),
            InterpretError::Runtime(error) => Some(error),
        }
    }
}

/// The Lox virtual machine.
///
/// Globals and interned strings persist across [`Vm::interpret`] calls, so a
/// REPL drives one `Vm` for its whole session. `OP_PRINT` writes to the
/// output writer, which defaults to stdout.
pub struct Vm<W = io::Stdout> {
    /// Call frame stack.
    frames: Vec<CallFrame>,

    /// Value stack.
    stack: ValueStack,

    /// Global variables.
    globals: Table,

    /// Interned strings, shared with the compiler.
    strings: Table,

    /// Open upvalues, sorted by the stack slot they point at.
    open_upvalues: Vec<Rc<RefCell<Upvalue>>>,

    output: W,
}

impl Vm<io::Stdout> {
    /// Create a VM that prints to stdout.
    pub fn new() -> Vm<io::Stdout> {
        Vm::with_output(io::stdout())
    }
}

impl Default for Vm {
    fn default() -> Self {
        Vm::new()
    }
}

impl<W: Write> Vm<W> {
    /// Create a VM that prints to the given writer.
    pub fn with_output(output: W) -> Vm<W> {
        let mut vm = Vm {
            frames: Vec::with_capacity(FRAMES_MAX),
            stack: ValueStack::new(),
            globals: Table::new(),
            strings: Table::new(),
            open_upvalues: Vec::new(),
            output,
        };
        vm.define_natives();
        vm
    }

    /// Compile and execute a source buffer.
    pub fn interpret(&mut self, source: &str) -> Result<(), InterpretError> {
        let function =
            compiler::compile(source, &mut self.strings).map_err(InterpretError::Compile)?;
        let closure = Rc::new(Closure::new(Rc::new(function)));
        self.stack.push(Value::Closure(Rc::clone(&closure)));

        let result = self.call(closure, 0).and_then(|()| self.run());
        result.map_err(|kind| {
            let trace = self.stack_trace();
            self.reset();
            InterpretError::Runtime(RuntimeError { kind, trace })
        })
    }

    /// Register a native function under `name` in the globals table.
    pub fn define_native(
        &mut self,
        name: &str,
        function: impl Fn(&[Value]) -> Result<Value, String> + 'static,
    ) {
        let handle = self.strings.intern(name);
        let native = NativeFunction::new(name, function);
        self.globals.set(handle, Value::Native(Rc::new(native)));
    }

    fn define_natives(&mut self) {
        let epoch = Instant::now();
        self.define_native("clock", move |_args| {
            Ok(Value::Number(epoch.elapsed().as_secs_f64()))
        });
    }

    fn run(&mut self) -> RunResult<()> {
        loop {
            #[cfg(feature = "trace-execution")]
            self.trace_instruction();

            let byte = self.read_byte()?;
            let op = OpCode::from_byte(byte)
                .ok_or(RuntimeErrorKind::Internal("unknown opcode"))?;

            match op {
                // Constants & Stack
                OpCode::Constant => {
                    let constant = self.read_constant()?;
                    self.stack.push(constant);
                }
                OpCode::Nil => self.stack.push(Value::Nil),
                OpCode::True => self.stack.push(Value::Bool(true)),
                OpCode::False => self.stack.push(Value::Bool(false)),
                OpCode::Pop => {
                    self.stack.pop()?;
                }

                // Variables
                OpCode::GetLocal => {
                    let slot = self.read_byte()? as usize;
                    let base = self.current_frame()?.base;
                    let value = self.stack.get(base + slot)?;
                    self.stack.push(value);
                }
                OpCode::SetLocal => {
                    let slot = self.read_byte()? as usize;
                    let base = self.current_frame()?.base;
                    let value = self.stack.peek(0)?;
                    self.stack.set(base + slot, value)?;
                }
                OpCode::GetGlobal => {
                    let name = self.read_string_constant()?;
                    match self.globals.get(&name) {
                        Some(value) => self.stack.push(value),
                        None => {
                            return Err(RuntimeErrorKind::UndefinedVariable(name.text.clone()));
                        }
                    }
                }
                OpCode::DefineGlobal => {
                    let name = self.read_string_constant()?;
                    let value = self.stack.pop()?;
                    self.globals.set(name, value);
                }
                OpCode::SetGlobal => {
                    let name = self.read_string_constant()?;
                    let value = self.stack.peek(0)?;
                    if self.globals.set(Rc::clone(&name), value) {
                        // The set just created an entry for an undefined
                        // name; remove it so the name stays undefined for
                        // later lookups.
                        self.globals.delete(&name);
                        return Err(RuntimeErrorKind::UndefinedVariable(name.text.clone()));
                    }
                }
                OpCode::GetUpvalue => {
                    let slot = self.read_byte()? as usize;
                    let upvalue = self.upvalue_at(slot)?;
                    let value = match &*upvalue.borrow() {
                        Upvalue::Open(index) => self.stack.get(*index)?,
                        Upvalue::Closed(value) => value.clone(),
                    };
                    self.stack.push(value);
                }
                OpCode::SetUpvalue => {
                    let slot = self.read_byte()? as usize;
                    let upvalue = self.upvalue_at(slot)?;
                    let value = self.stack.peek(0)?;
                    let open_slot = match &*upvalue.borrow() {
                        Upvalue::Open(index) => Some(*index),
                        Upvalue::Closed(_) => None,
                    };
                    match open_slot {
                        Some(index) => self.stack.set(index, value)?,
                        None => *upvalue.borrow_mut() = Upvalue::Closed(value),
                    }
                }

                // Operators
                OpCode::Equal => {
                    let b = self.stack.pop()?;
                    let a = self.stack.pop()?;
                    self.stack.push(Value::Bool(a == b));
                }
                OpCode::Greater => self.binary_compare(|a, b| a > b)?,
                OpCode::Less => self.binary_compare(|a, b| a < b)?,
                OpCode::Add => {
                    let b = self.stack.pop()?;
                    let a = self.stack.pop()?;
                    match (a, b) {
                        (Value::Number(a), Value::Number(b)) => {
                            self.stack.push(Value::Number(a + b));
                        }
                        (Value::String(a), Value::String(b)) => {
                            let mut text = String::with_capacity(a.text.len() + b.text.len());
                            text.push_str(&a.text);
                            text.push_str(&b.text);
                            let result = self.strings.intern(&text);
                            self.stack.push(Value::String(result));
                        }
                        _ => return Err(RuntimeErrorKind::OperandsMustBeNumbersOrStrings),
                    }
                }
                OpCode::Subtract => self.binary_arithmetic(|a, b| a - b)?,
                OpCode::Multiply => self.binary_arithmetic(|a, b| a * b)?,
                OpCode::Divide => self.binary_arithmetic(|a, b| a / b)?,
                OpCode::Not => {
                    let value = self.stack.pop()?;
                    self.stack.push(Value::Bool(value.is_falsey()));
                }
                OpCode::Negate => match self.stack.pop()? {
                    Value::Number(n) => self.stack.push(Value::Number(-n)),
                    _ => return Err(RuntimeErrorKind::OperandMustBeNumber),
                },

                // Statements & Control Flow
                OpCode::Print => {
                    let value = self.stack.pop()?;
                    writeln!(self.output, "{}", value)
                        .map_err(|_| RuntimeErrorKind::Internal("failed to write output"))?;
                }
                OpCode::Jump => {
                    let offset = self.read_u16()? as usize;
                    self.current_frame_mut()?.ip += offset;
                }
                OpCode::JumpIfFalse => {
                    let offset = self.read_u16()? as usize;
                    if self.stack.peek(0)?.is_falsey() {
                        self.current_frame_mut()?.ip += offset;
                    }
                }
                OpCode::Loop => {
                    let offset = self.read_u16()? as usize;
                    let frame = self.current_frame_mut()?;
                    frame.ip = frame
                        .ip
                        .checked_sub(offset)
                        .ok_or(RuntimeErrorKind::Internal("loop target out of bounds"))?;
                }

                // Functions & Closures
                OpCode::Call => {
                    let arg_count = self.read_byte()?;
                    let callee = self.stack.peek(arg_count as usize)?;
                    self.call_value(callee, arg_count)?;
                }
                OpCode::Closure => {
                    let function = match self.read_constant()? {
                        Value::Function(function) => function,
                        _ => {
                            return Err(RuntimeErrorKind::Internal(
                                "closure operand is not a function",
                            ));
                        }
                    };
                    let mut upvalues = Vec::with_capacity(function.upvalue_count);
                    for _ in 0..function.upvalue_count {
                        let is_local = self.read_byte()? != 0;
                        let index = self.read_byte()? as usize;
                        let upvalue = if is_local {
                            let base = self.current_frame()?.base;
                            self.capture_upvalue(base + index)
                        } else {
                            self.upvalue_at(index)?
                        };
                        upvalues.push(upvalue);
                    }
                    self.stack
                        .push(Value::Closure(Rc::new(Closure { function, upvalues })));
                }
                OpCode::CloseUpvalue => {
                    let top = self
                        .stack
                        .len()
                        .checked_sub(1)
                        .ok_or(RuntimeErrorKind::StackUnderflow)?;
                    self.close_upvalues(top)?;
                    self.stack.pop()?;
                }
                OpCode::Return => {
                    let result = self.stack.pop()?;
                    let frame = self
                        .frames
                        .pop()
                        .ok_or(RuntimeErrorKind::Internal("no active frame"))?;
                    self.close_upvalues(frame.base)?;

                    if self.frames.is_empty() {
                        // Pop the top-level script closure and halt.
                        self.stack.pop()?;
                        return Ok(());
                    }

                    self.stack.truncate(frame.base);
                    self.stack.push(result);
                }
            }
        }
    }

    // =========================================================================
    // Instruction stream
    // =========================================================================

    fn read_byte(&mut self) -> RunResult<u8> {
        let frame = self
            .frames
            .last_mut()
            .ok_or(RuntimeErrorKind::Internal("no active frame"))?;
        let byte = frame
            .closure
            .function
            .chunk
            .code
            .get(frame.ip)
            .copied()
            .ok_or(RuntimeErrorKind::Internal("instruction pointer out of bounds"))?;
        frame.ip += 1;
        Ok(byte)
    }

    fn read_u16(&mut self) -> RunResult<u16> {
        let high = self.read_byte()?;
        let low = self.read_byte()?;
        Ok(u16::from_be_bytes([high, low]))
    }

    fn read_constant(&mut self) -> RunResult<Value> {
        let index = self.read_byte()? as usize;
        let frame = self.current_frame()?;
        frame
            .closure
            .function
            .chunk
            .constants
            .get(index)
            .cloned()
            .ok_or(RuntimeErrorKind::Internal("constant index out of bounds"))
    }

    fn read_string_constant(&mut self) -> RunResult<Rc<LoxString>> {
        match self.read_constant()? {
            Value::String(string) => Ok(string),
            _ => Err(RuntimeErrorKind::Internal("name constant is not a string")),
        }
    }

    fn current_frame(&self) -> RunResult<&CallFrame> {
        self.frames
            .last()
            .ok_or(RuntimeErrorKind::Internal("no active frame"))
    }

    fn current_frame_mut(&mut self) -> RunResult<&mut CallFrame> {
        self.frames
            .last_mut()
            .ok_or(RuntimeErrorKind::Internal("no active frame"))
    }

    // =========================================================================
    // Calls
    // =========================================================================

    fn call_value(&mut self, callee: Value, arg_count: u8) -> RunResult<()> {
        match callee {
            Value::Closure(closure) => self.call(closure, arg_count),
            Value::Native(native) => {
                let arg_count = arg_count as usize;
                let first_arg = self
                    .stack
                    .len()
                    .checked_sub(arg_count)
                    .ok_or(RuntimeErrorKind::StackUnderflow)?;
                let mut args = Vec::with_capacity(arg_count);
                for i in 0..arg_count {
                    args.push(self.stack.get(first_arg + i)?);
                }
                let result = native.call(&args).map_err(RuntimeErrorKind::Native)?;

                // Drop the arguments and the callee, then push the result.
                let callee_slot = first_arg
                    .checked_sub(1)
                    .ok_or(RuntimeErrorKind::StackUnderflow)?;
                self.stack.truncate(callee_slot);
                self.stack.push(result);
                Ok(())
            }
            _ => Err(RuntimeErrorKind::NotCallable),
        }
    }

    fn call(&mut self, closure: Rc<Closure>, arg_count: u8) -> RunResult<()> {
        if arg_count != closure.function.arity {
            return Err(RuntimeErrorKind::Arity {
                expected: closure.function.arity,
                got: arg_count,
            });
        }
        if self.frames.len() == FRAMES_MAX {
            return Err(RuntimeErrorKind::StackOverflow);
        }
        let base = self
            .stack
            .len()
            .checked_sub(arg_count as usize + 1)
            .ok_or(RuntimeErrorKind::StackUnderflow)?;
        self.frames.push(CallFrame::new(closure, base));
        Ok(())
    }

    // =========================================================================
    // Upvalues
    // =========================================================================

    fn upvalue_at(&self, slot: usize) -> RunResult<Rc<RefCell<Upvalue>>> {
        let frame = self.current_frame()?;
        frame
            .closure
            .upvalues
            .get(slot)
            .cloned()
            .ok_or(RuntimeErrorKind::Internal("upvalue slot out of range"))
    }

    /// Find or create the open upvalue for a stack slot. Closures capturing
    /// the same variable share one upvalue, so writes through either are
    /// seen by both.
    fn capture_upvalue(&mut self, slot: usize) -> Rc<RefCell<Upvalue>> {
        for existing in &self.open_upvalues {
            if matches!(*existing.borrow(), Upvalue::Open(open) if open == slot) {
                return Rc::clone(existing);
            }
        }

        let created = Rc::new(RefCell::new(Upvalue::Open(slot)));
        // Keep the list sorted by slot so closing can stop at the first
        // surviving one.
        let position = self
            .open_upvalues
            .iter()
            .position(|upvalue| matches!(*upvalue.borrow(), Upvalue::Open(open) if open > slot))
            .unwrap_or(self.open_upvalues.len());
        self.open_upvalues.insert(position, Rc::clone(&created));
        created
    }

    /// Close every open upvalue pointing at `from` or above: the value moves
    /// off the stack into the upvalue cell.
    fn close_upvalues(&mut self, from: usize) -> RunResult<()> {
        while let Some(upvalue) = self.open_upvalues.last().cloned() {
            let slot = match *upvalue.borrow() {
                Upvalue::Open(slot) => slot,
                Upvalue::Closed(_) => {
                    return Err(RuntimeErrorKind::Internal("closed upvalue on the open list"));
                }
            };
            if slot < from {
                break;
            }
            let value = self.stack.get(slot)?;
            *upvalue.borrow_mut() = Upvalue::Closed(value);
            self.open_upvalues.pop();
        }
        Ok(())
    }

    // =========================================================================
    // Operators
    // =========================================================================

    fn binary_arithmetic(&mut self, op: fn(f64, f64) -> f64) -> RunResult<()> {
        let b = self.stack.pop()?;
        let a = self.stack.pop()?;
        match (a, b) {
            (Value::Number(a), Value::Number(b)) => {
                self.stack.push(Value::Number(op(a, b)));
                Ok(())
            }
            _ => Err(RuntimeErrorKind::OperandsMustBeNumbers),
        }
    }

    fn binary_compare(&mut self, op: fn(f64, f64) -> bool) -> RunResult<()> {
        let b = self.stack.pop()?;
        let a = self.stack.pop()?;
        match (a, b) {
            (Value::Number(a), Value::Number(b)) => {
                self.stack.push(Value::Bool(op(a, b)));
                Ok(())
            }
            _ => Err(RuntimeErrorKind::OperandsMustBeNumbers),
        }
    }

    // =========================================================================
    // Failure handling
    // =========================================================================

    /// The stack trace at the current point, innermost frame first.
    fn stack_trace(&self) -> Vec<TraceFrame> {
        self.frames
            .iter()
            .rev()
            .map(|frame| {
                let function = &frame.closure.function;
                // The ip already advanced past the failing instruction.
                let instruction = frame.ip.saturating_sub(1);
                let line = function.chunk.lines.get(instruction).copied().unwrap_or(0);
                TraceFrame {
                    line,
                    function: function.name.as_ref().map(|name| name.text.clone()),
                }
            })
            .collect()
    }

    fn reset(&mut self) {
        self.stack.clear();
        self.frames.clear();
        self.open_upvalues.clear();
    }

    #[cfg(feature = "trace-execution")]
    fn trace_instruction(&self) {
        use std::fmt::Write as _;

        let mut line = String::from("          ");
        for value in self.stack.iter() {
            let _ = write!(line, "[ {} ]", value);
        }
        eprintln!("{}", line);

        if let Some(frame) = self.frames.last() {
            let mut text = String::new();
            crate::debug::disassemble_instruction(
                &mut text,
                &frame.closure.function.chunk,
                frame.ip,
            );
            eprint!("{}", text);
        }
    }
}
