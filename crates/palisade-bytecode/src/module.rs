//! The compiled artifact: constant pool, symbol table, binding chunks,
//! main code, and binary encode/decode.

use serde::{Deserialize, Serialize};

use crate::header::{Header, HEADER_LEN};
use crate::instr::Instr;
use crate::sig::SignatureRecord;

/// A constant-pool entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Const {
    Int(i64),
    Float(f64),
    Str(String),
    Bool(bool),
    Unit,
}

/// One compiled header/utility binding. Chunks run in order before the main
/// code; each result lands in its binding slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Binding {
    pub name: String,
    /// Rendered type, for dumps and diagnostics.
    pub ty: String,
    pub code: Vec<Instr>,
}

/// A compiled expression artifact.
///
/// The symbol table doubles as the signature-record set for the on-disk
/// cache: every external symbol the code references appears exactly once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Module {
    pub unit_name: String,
    pub context_type: String,
    pub result_type: String,
    pub setter: bool,
    /// Free-variable slot names, in declaration order.
    pub vars: Vec<String>,
    pub consts: Vec<Const>,
    pub symbols: Vec<SignatureRecord>,
    pub bindings: Vec<Binding>,
    pub code: Vec<Instr>,
}

#[derive(Debug, thiserror::Error)]
pub enum ModuleError {
    #[error("artifact too short for header")]
    TooShort,
    #[error("bad magic bytes")]
    BadMagic,
    #[error("unsupported artifact version {0}")]
    UnsupportedVersion(u32),
    #[error("checksum mismatch")]
    ChecksumMismatch,
    #[error("truncated artifact body")]
    TruncatedBody,
    #[error("body decode failed: {0}")]
    Decode(#[from] postcard::Error),
}

impl Module {
    /// Encode: 16-byte header followed by the postcard body.
    pub fn encode(&self) -> Vec<u8> {
        let body = postcard::to_allocvec(self).expect("module serialization is infallible");
        let header = Header::new(crc32fast::hash(&body), body.len() as u32);
        let mut out = Vec::with_capacity(HEADER_LEN + body.len());
        out.extend_from_slice(&header.to_bytes());
        out.extend_from_slice(&body);
        out
    }

    /// Decode, verifying magic, version and checksum.
    pub fn decode(bytes: &[u8]) -> Result<Self, ModuleError> {
        let header = Header::from_bytes(bytes).ok_or(ModuleError::TooShort)?;
        if !header.validate_magic() {
            return Err(ModuleError::BadMagic);
        }
        if !header.validate_version() {
            return Err(ModuleError::UnsupportedVersion(header.version));
        }
        let body = bytes
            .get(HEADER_LEN..HEADER_LEN + header.body_len as usize)
            .ok_or(ModuleError::TruncatedBody)?;
        if crc32fast::hash(body) != header.checksum {
            return Err(ModuleError::ChecksumMismatch);
        }
        Ok(postcard::from_bytes(body)?)
    }

    pub fn signature_records(&self) -> &[SignatureRecord] {
        &self.symbols
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Module {
        Module {
            unit_name: "_pexpr_0001".to_owned(),
            context_type: "Unit".to_owned(),
            result_type: "Int".to_owned(),
            setter: false,
            vars: vec!["x".to_owned()],
            consts: vec![Const::Int(5), Const::Str("hello".to_owned())],
            symbols: vec![SignatureRecord::new("Str.len", "Str.len(): Int", "Str()i64")],
            bindings: vec![Binding {
                name: "greeting".to_owned(),
                ty: "Str".to_owned(),
                code: vec![Instr::Const(1), Instr::Ret],
            }],
            code: vec![
                Instr::Const(1),
                Instr::CallMethod { sym: 0, argc: 0 },
                Instr::Ret,
            ],
        }
    }

    #[test]
    fn encode_decode_round_trip() {
        let module = sample();
        let bytes = module.encode();
        let decoded = Module::decode(&bytes).unwrap();
        assert_eq!(decoded, module);
    }

    #[test]
    fn corrupt_body_fails_checksum() {
        let mut bytes = sample().encode();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xff;
        assert!(matches!(
            Module::decode(&bytes),
            Err(ModuleError::ChecksumMismatch)
        ));
    }

    #[test]
    fn wrong_magic_rejected() {
        let mut bytes = sample().encode();
        bytes[0] = b'X';
        assert!(matches!(Module::decode(&bytes), Err(ModuleError::BadMagic)));
    }

    #[test]
    fn wrong_version_rejected() {
        let mut bytes = sample().encode();
        bytes[4] = 99;
        assert!(matches!(
            Module::decode(&bytes),
            Err(ModuleError::UnsupportedVersion(99))
        ));
    }

    #[test]
    fn truncated_body_rejected() {
        let bytes = sample().encode();
        assert!(matches!(
            Module::decode(&bytes[..bytes.len() - 4]),
            Err(ModuleError::TruncatedBody)
        ));
    }
}
