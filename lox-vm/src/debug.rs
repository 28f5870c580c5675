// lox-vm - Bytecode compiler and virtual machine for the Lox programming language
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Human-readable disassembly of bytecode chunks.
//!
//! Output goes to a `String` so callers can print it, log it, or snapshot it
//! in tests.

use std::fmt::Write;

use crate::chunk::Chunk;
use crate::opcode::OpCode;
use crate::value::Value;

/// Disassemble a whole chunk under a header.
pub fn disassemble_chunk(chunk: &Chunk, name: &str) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "== {} ==", name);
    let mut offset = 0;
    while offset < chunk.code.len() {
        offset = disassemble_instruction(&mut out, chunk, offset);
    }
    out
}

/// Disassemble the instruction at `offset`, appending one or more lines to
/// `out`, and return the offset of the next instruction.
pub fn disassemble_instruction(out: &mut String, chunk: &Chunk, offset: usize) -> usize {
    let _ = write!(out, "{:04} ", offset);
    if offset > 0 && chunk.lines[offset] == chunk.lines[offset - 1] {
        let _ = write!(out, "   | ");
    } else {
        let _ = write!(out, "{:4} ", chunk.lines[offset]);
    }

    let byte = chunk.code[offset];
    let op = match OpCode::from_byte(byte) {
        Some(op) => op,
        None => {
            let _ = writeln!(out, "Unknown opcode {}", byte);
            return offset + 1;
        }
    };

    match op {
        OpCode::Constant => constant_instruction(out, "OP_CONSTANT", chunk, offset),
        OpCode::Nil => simple_instruction(out, "OP_NIL", offset),
        OpCode::True => simple_instruction(out, "OP_TRUE", offset),
        OpCode::False => simple_instruction(out, "OP_FALSE", offset),
        OpCode::Pop => simple_instruction(out, "OP_POP", offset),
        OpCode::GetLocal => byte_instruction(out, "OP_GET_LOCAL", chunk, offset),
        OpCode::SetLocal => byte_instruction(out, "OP_SET_LOCAL", chunk, offset),
        OpCode::GetGlobal => constant_instruction(out, "OP_GET_GLOBAL", chunk, offset),
        OpCode::DefineGlobal => constant_instruction(out, "OP_DEFINE_GLOBAL", chunk, offset),
        OpCode::SetGlobal => constant_instruction(out, "OP_SET_GLOBAL", chunk, offset),
        OpCode::GetUpvalue => byte_instruction(out, "OP_GET_UPVALUE", chunk, offset),
        OpCode::SetUpvalue => byte_instruction(out, "OP_SET_UPVALUE", chunk, offset),
        OpCode::Equal => simple_instruction(out, "OP_EQUAL", offset),
        OpCode::Greater => simple_instruction(out, "OP_GREATER", offset),
        OpCode::Less => simple_instruction(out, "OP_LESS", offset),
        OpCode::Add => simple_instruction(out, "OP_ADD", offset),
        OpCode::Subtract => simple_instruction(out, "OP_SUBTRACT", offset),
        OpCode::Multiply => simple_instruction(out, "OP_MULTIPLY", offset),
        OpCode::Divide => simple_instruction(out, "OP_DIVIDE", offset),
        OpCode::Not => simple_instruction(out, "OP_NOT", offset),
        OpCode::Negate => simple_instruction(out, "OP_NEGATE", offset),
        OpCode::Print => simple_instruction(out, "OP_PRINT", offset),
        OpCode::Jump => jump_instruction(out, "OP_JUMP", 1, chunk, offset),
        OpCode::JumpIfFalse => jump_instruction(out, "OP_JUMP_IF_FALSE", 1, chunk, offset),
        OpCode::Loop => jump_instruction(out, "OP_LOOP", -1, chunk, offset),
        OpCode::Call => byte_instruction(out, "OP_CALL", chunk, offset),
        OpCode::Closure => closure_instruction(out, chunk, offset),
        OpCode::CloseUpvalue => simple_instruction(out, "OP_CLOSE_UPVALUE", offset),
        OpCode::Return => simple_instruction(out, "OP_RETURN", offset),
    }
}

fn simple_instruction(out: &mut String, name: &str, offset: usize) -> usize {
    let _ = writeln!(out, "{}", name);
    offset + 1
}

fn byte_instruction(out: &mut String, name: &str, chunk: &Chunk, offset: usize) -> usize {
    let slot = chunk.code[offset + 1];
    let _ = writeln!(out, "{:<16} {:4}", name, slot);
    offset + 2
}

fn constant_instruction(out: &mut String, name: &str, chunk: &Chunk, offset: usize) -> usize {
    let constant = chunk.code[offset + 1];
    let _ = writeln!(
        out,
        "{:<16} {:4} '{}'",
        name, constant, chunk.constants[constant as usize]
    );
    offset + 2
}

fn jump_instruction(out: &mut String, name: &str, sign: i64, chunk: &Chunk, offset: usize) -> usize {
    let jump = u16::from_be_bytes([chunk.code[offset + 1], chunk.code[offset + 2]]);
    let target = offset as i64 + 3 + sign * jump as i64;
    let _ = writeln!(out, "{:<16} {:4} -> {}", name, offset, target);
    offset + 3
}

fn closure_instruction(out: &mut String, chunk: &Chunk, offset: usize) -> usize {
    let mut offset = offset + 1;
    let constant = chunk.code[offset];
    offset += 1;
    let _ = writeln!(
        out,
        "{:<16} {:4} {}",
        "OP_CLOSURE", constant, chunk.constants[constant as usize]
    );

    if let Value::Function(function) = &chunk.constants[constant as usize] {
        for _ in 0..function.upvalue_count {
            let is_local = chunk.code[offset];
            let index = chunk.code[offset + 1];
            let _ = writeln!(
                out,
                "{:04}      |                     {} {}",
                offset,
                if is_local == 1 { "local" } else { "upvalue" },
                index
            );
            offset += 2;
        }
    }
    offset
}
