//! Core library for the Femboy scripting language: lexing, parsing,
//! tree-walking evaluation with classes and modules, a bridge for `native`
//! blocks, and REPL utilities.

pub mod ast;
pub mod diagnostics;
pub mod environment;
pub mod lexer;
pub mod module;
pub mod native;
pub mod object;
pub mod parser;
pub mod repl;
pub mod runtime;
pub mod stdlib;
pub mod value;

pub use diagnostics::{Diagnostic, DiagnosticKind, FemboyError, Location, SourceSpan};
pub use module::{FileSystemLoader, MemoryLoader, ModuleLoader};
pub use native::{NativeHost, NativeRequest, NoHost};
pub use repl::Repl;
pub use runtime::{exit_status, run, ExecutionContext, Interpreter, OutputBuffer};
pub use value::Value;
