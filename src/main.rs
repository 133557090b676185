//! Stack-machine runtime entry point.
//!
//! Loads a compiled bytecode image from disk and runs it to completion.
//!
//! ```text
//! lamcore <image> [--debug]
//! ```
//!
//! `--debug` enables the per-instruction trace (offset, opcode, operands,
//! operand stack, and current activation, all Raw-formatted) on stdout.

use std::env;
use std::fs;
use std::process;

mod bytecode;
mod error;
mod format;
mod frame;
mod heap;
mod stack;
mod value;
mod vm;

use vm::execute;

const VERSION: &str = "0.1.0";

fn usage() -> String {
    format!(
        r#"lamcore v{VERSION}

Usage:
    lamcore <image> [--debug]

Arguments:
    <image>
        Path to a compiled bytecode image to execute.

Options:
    --debug
        Print a per-instruction execution trace to stdout.
    -h, --help
        Show this help message and exit.
    -v, --version
        Show the runtime version."#
    )
}

fn main() {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 || args[1] == "-h" || args[1] == "--help" {
        println!("{}", usage());
        return;
    }

    if args[1] == "-v" || args[1] == "--version" {
        println!("lamcore v{VERSION}");
        return;
    }

    let image_path = &args[1];
    let debug = args[2..].iter().any(|a| a == "--debug");

    let image = fs::read(image_path).unwrap_or_else(|e| {
        eprintln!("lamcore: failed to read {image_path}: {e}");
        process::exit(1);
    });

    if let Err(e) = execute(&image, debug) {
        eprintln!("{e}");
        process::exit(1);
    }
}
