//! Artifact format for Palisade compiled expressions.
//!
//! This crate contains:
//! - the binary module format (16-byte header, postcard body, crc32)
//! - the stack-machine instruction set
//! - signature records and the `.sig` text format used by the on-disk cache

pub mod dump;
pub mod header;
pub mod instr;
pub mod module;
pub mod sig;

pub use header::{Header, FORMAT_VERSION, MAGIC};
pub use instr::Instr;
pub use module::{Binding, Const, Module, ModuleError};
pub use sig::{SigFileError, SignatureRecord, parse_sig_file, render_sig_file};
