//! Lowering typed expressions to instructions.

mod lower;

#[cfg(test)]
mod lower_tests;

pub use lower::{ConstPool, LowerError, Lowerer};
