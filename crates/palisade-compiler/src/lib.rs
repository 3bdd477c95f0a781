//! Palisade compiler: the pipeline from expression text to bytecode.
//!
//! - `template` - template preprocessing and position mapping
//! - `assemble` - synthetic compilation-unit assembly
//! - `parser` - lexer, CST, and typed AST
//! - `analyze` - syntax policy, access control, type checking
//! - `emit` - lowering and module emission
//! - `session` - the compile session driving one request end to end
//! - `diagnostics` - error collection and reporting

pub mod analyze;
pub mod assemble;
pub mod diagnostics;
pub mod emit;
pub mod escape;
pub mod parser;
pub mod session;
pub mod template;

#[cfg(test)]
pub mod test_utils;

pub use diagnostics::{DiagnosticReport, Diagnostics, DiagnosticsPrinter, ErrorEntry, Severity};
pub use session::{AnalyzedUnit, CompileSession, ExprRequest};
pub use template::{PosMap, Preprocessed, TemplateError, preprocess_template};

use palisade_core::types::TypeParseError;

/// Errors from the compile entry points.
///
/// Parse, syntax-policy, access-control and type errors aggregate into one
/// [`DiagnosticReport`] per compile; everything else is its own variant.
#[derive(Debug, thiserror::Error)]
pub enum CompileError {
    #[error("compilation failed with {} error(s)", .0.entries.len())]
    Rejected(DiagnosticReport),

    #[error("invalid type `{text}`: {source}")]
    InvalidTypeRep {
        text: String,
        source: TypeParseError,
    },

    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error("internal compiler error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, CompileError>;
