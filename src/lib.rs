//! Embeddable runtime for the NuwaScript language.
//! Implements lexing, parsing and async evaluation, with tool calls routed
//! through a host-supplied registry.

pub mod ast;
pub mod diagnostics;
pub mod environment;
pub mod lexer;
pub mod output;
pub mod parser;
pub mod runtime;
pub mod stdlib;
pub mod tools;
pub mod value;

pub use ast::Script;
pub use diagnostics::{Diagnostic, NuwaError, Position, Result};
pub use environment::Scope;
pub use lexer::{tokenize, Token};
pub use output::{BufferSink, OutputSink, StdoutSink};
pub use parser::parse;
pub use runtime::{Interpreter, InterpreterBuilder};
pub use tools::{Tool, ToolError, ToolRegistry, ToolSchema, ToolSet};
pub use value::{Value, ValueType};
