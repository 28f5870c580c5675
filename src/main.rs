// lox - A bytecode interpreter for the Lox programming language
// Copyright (c) 2025 Tom Waddington. MIT licensed.

use std::env;
use std::fs;
use std::io::{self, Write};
use std::process;

use lox_vm::{InterpretError, Vm};

fn main() {
    let args: Vec<String> = env::args().collect();

    match args.len() {
        1 => run_repl(),
        2 => run_file(&args[1]),
        _ => {
            eprintln!("Usage: lox [path]");
            process::exit(64);
        }
    }
}

/// Interpret a single source file.
fn run_file(path: &str) {
    let source = match fs::read_to_string(path) {
        Ok(source) => source,
        Err(e) => {
            eprintln!("Could not read \"{}\": {}", path, e);
            process::exit(74);
        }
    };

    let mut vm = Vm::new();
    match vm.interpret(&source) {
        Ok(()) => {}
        Err(error @ InterpretError::Compile(_)) => {
            eprintln!("{}", error);
            process::exit(65);
        }
        Err(error @ InterpretError::Runtime(_)) => {
            eprintln!("{}", error);
            process::exit(70);
        }
    }
}

/// Run the interactive REPL.
///
/// One VM serves the whole session, so globals defined on earlier lines stay
/// visible on later ones.
fn run_repl() {
    println!("Lox v0.1.0");
    let mut vm = Vm::new();

    loop {
        print!("> ");
        if io::stdout().flush().is_err() {
            break;
        }

        let mut line = String::new();
        match io::stdin().read_line(&mut line) {
            Ok(0) => {
                println!();
                break;
            }
            Ok(_) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                if let Err(error) = vm.interpret(line) {
                    eprintln!("{}", error);
                }
            }
            Err(e) => {
                eprintln!("Read error: {}", e);
                break;
            }
        }
    }
}
