//! clonk — a compiler front end for a small C-like language.
//!
//! Source text is lexed, parsed into an AST with scope and arity checking,
//! and lowered to an SSA control-flow graph with on-the-fly phi insertion.

pub mod errors;
pub mod ir;
pub mod lexer;
pub mod parser;

use crate::errors::Diagnostics;

/// Parse and lower a program in one step. Returns the recorded diagnostics
/// instead of a module when the source has errors.
pub fn compile(source: &str) -> Result<ir::Module, Diagnostics> {
    let (program, diagnostics) = parser::parse(source);
    if diagnostics.is_error() {
        return Err(diagnostics);
    }
    Ok(ir::builder::lower_program(&program))
}
