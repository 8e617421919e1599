//! Interpreter command-line.
//!
//! Without arguments it drops into an interactive read-evaluate-print loop
//! against a persistent environment; `exit` (or end of input) leaves it.
//!
//! With a single file argument it evaluates the file once.  Exit codes: 0 on
//! success, 65 when parse or runtime errors were reported, 74 when the file
//! could not be read, 64 for usage errors.

use std::env;
use std::fs::File;
use std::io;
use std::io::prelude::*;
use std::io::BufReader;
use std::process;

use anyhow::Context as _;

use rmonkey::interpreter::{Interpreter, MonkeyError};

fn main() -> Result<(), anyhow::Error> {
    let args = env::args().skip(1).collect::<Vec<_>>();
    match args.as_slice() {
        [] => run_prompt(),
        [path] => run_file(path),
        _ => {
            eprintln!("Usage: rmonkey [script]");
            process::exit(64);
        }
    }
}

fn run_file(path: &str) -> Result<(), anyhow::Error> {
    let file = match File::open(path) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("Error reading file {}: {}", path, e);
            process::exit(74);
        }
    };

    let mut interp_stdout = io::stdout();
    let mut interp = Interpreter::new(&mut interp_stdout);
    match interp.eval(BufReader::new(file)) {
        Ok(()) => Ok(()),
        Err(MonkeyError::Read(e)) => {
            eprintln!("Error reading file {}: {}", path, e);
            process::exit(74);
        }
        Err(e) => {
            println!("{}", e);
            process::exit(65);
        }
    }
}

fn run_prompt() -> Result<(), anyhow::Error> {
    let stdin = io::stdin();
    let mut repl_stdout = io::stdout();
    let mut interp_stdout = io::stdout();

    let mut interp = Interpreter::new(&mut interp_stdout);

    println!("Welcome to rmonkey! Let's get down to monkey business.");
    let mut input = String::new();
    loop {
        repl_stdout.write_all(b"> ").context("failed to write prompt")?;
        repl_stdout.flush().context("failed to flush prompt")?;

        input.clear();
        let nbytes = stdin
            .read_line(&mut input)
            .context("failed to read input")?;
        if nbytes == 0 || input.trim() == "exit" {
            break;
        }

        if let Err(e) = interp.eval(input.as_bytes()) {
            println!("{}", e);
        }
    }

    Ok(())
}
