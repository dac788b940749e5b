// SPDX-License-Identifier: Apache-2.0

#![warn(missing_docs)]

//! A quick + dirty little REPL (Read + Eval + Print Loop) command line tool
//! to verify whether a line of input is a syntactically valid query.
//!
//! Entering the sequence of two tildas `~~` followed by `↵` (the \[ENTER\]
//! key) initiates a multi-line mode which ends when `Ctrl-D` is pressed. In
//! this mode consecutive input is concatenated into one string before
//! processing.
//!
//! On success the pretty-printed form of the parsed query is echoed back
//! (exercising the parse-idempotence property: feeding that output back in
//! must reparse to the same tree). On failure the error, with its 1-based
//! character position, is printed to `stderr` in red.
//!
//! To start the loop enter...
//! ```bash
//! cargo run --bin repl↵
//! ```
//! To exit the program, press `Ctrl-D`.
//!

use std::io::{self, Write};
use vaultql::parse;

#[doc(hidden)]
const RED: &str = "\x1b[31m";
#[doc(hidden)]
const GREEN: &str = "\x1b[32m";
#[doc(hidden)]
const YELLOW: &str = "\x1b[33m";
#[doc(hidden)]
const RESET: &str = "\x1b[0m";
#[doc(hidden)]
const MULTILINE: &str = "~~";

macro_rules! error {
    ( $( $arg: tt )* ) => {
        {
            let msg = ::std::fmt::format(::core::format_args!($($arg)*));
            eprintln!("{RED}{msg}{RESET}");
        }
    }
}

macro_rules! info {
    ( $( $arg: tt )* ) => {
        {
            let msg = ::std::fmt::format(::core::format_args!($($arg)*));
            println!("{YELLOW}{msg}{RESET}");
        }
    }
}

macro_rules! note {
    ( $( $arg: tt )* ) => {
        {
            let msg = ::std::fmt::format(::core::format_args!($($arg)*));
            println!("{GREEN}{msg}{RESET}");
        }
    }
}

#[doc(hidden)]
fn prompt(s: &str) -> io::Result<()> {
    print!("{GREEN}{s} {RESET}");
    io::stdout().flush()
}

/// Executable main method.
///
/// Invoke it like so...
/// ```bash
/// cargo run --bin repl↵
/// ```
fn main() -> io::Result<()> {
    note!("Enter a query to verify it parses.\nWhen done, hit Ctrl-D.");
    let stdin = io::stdin();
    loop {
        prompt(">")?;
        let mut line = String::new();
        match stdin.read_line(&mut line) {
            Ok(0) => {
                note!("\nSee you later...");
                break;
            }
            Ok(_) => {
                let first = line.trim();
                let input = if first == MULTILINE {
                    info!("Enter multi-line mode. Exit w/ Ctrl-D");
                    let mut lines = String::new();
                    loop {
                        prompt(">>")?;
                        let mut next = String::new();
                        match stdin.read_line(&mut next) {
                            Ok(0) => break,
                            Ok(_) => lines.push_str(&next),
                            Err(e) => {
                                error!("Failed read: {e}");
                                break;
                            }
                        }
                    }
                    lines
                } else {
                    first.to_owned()
                };

                match parse(&input) {
                    Ok(query) => note!("OK! {query}"),
                    Err(e) => error!("{e}"),
                }
            }
            Err(e) => {
                error!("Failed read: {e}");
                break;
            }
        }
    }
    Ok(())
}
