//! Runtime for compiled Palisade expressions.
//!
//! `link` resolves a decoded module's symbol table against the host type
//! registry (re-verifying the recorded signatures); `engine` executes the
//! linked artifact on a stack machine with fuel limits.

pub mod engine;
pub mod link;

pub use engine::{FuelLimits, Vm};
pub use link::{LinkError, LinkedArtifact};
