//! Harness scripts (`.hts`).
//!
//! A script is a sequence of S-expressions registering tests with the
//! harness. The reader is layered: [`Lexer`] produces tokens, [`sexpr`]
//! builds a tree of atoms and lists, the parser turns the tree into
//! [`Command`]s and [`ScriptRunner`] executes them.
//!
//! # Example
//!
//! ```
//! use apiharness::script::{parse_script, Command};
//!
//! let script = parse_script(r#"
//!     ;; expect: successes=2 failures=0
//!     (test "signed zero" (assert_eq -0 -0))
//!     (promise_test "settles" (delay 1 (resolve)))
//! "#).unwrap();
//! assert_eq!(script.test_count(), 2);
//! assert!(matches!(script.commands[0], Command::Test { .. }));
//! ```

pub mod command;
mod cursor;
mod error;
mod eval;
mod lexer;
mod parser;
pub mod sexpr;
mod token;

pub use command::*;
pub use error::ScriptError;
pub use eval::{load_script, ScriptRunner};
pub use lexer::Lexer;
pub use parser::parse_script;
pub use token::{Span, Token, TokenKind};
