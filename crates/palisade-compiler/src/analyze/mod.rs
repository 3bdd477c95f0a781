//! Semantic analysis: syntax policy, access control, type checking.

pub mod symbols;
pub mod syntax;
pub mod typer;


pub use symbols::SymbolTable;
pub use syntax::validate_syntax;
pub use typer::{Resolution, Resolutions, Typer};
