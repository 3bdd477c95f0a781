//! Symbol resolution against the host registry.
//!
//! Linking re-verifies every recorded signature before an artifact may run.
//! This is what makes bytecode reuse safe: an artifact loaded from the
//! on-disk cache (or kept across a registry swap) only executes if each
//! referenced symbol still resolves to the identical typed/erased pair.

use palisade_bytecode::{Module, ModuleError};
use palisade_core::registry::{MemberImpl, NativeFn, TypeRegistry};

#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    #[error("signature of `{fq}` changed: artifact recorded `{typed}` / `{erased}`")]
    SignatureChanged {
        fq: String,
        typed: String,
        erased: String,
    },

    #[error("unresolved symbol `{fq}` with signature `{typed}`")]
    Unresolved { fq: String, typed: String },

    #[error(transparent)]
    Module(#[from] ModuleError),
}

/// A resolved symbol slot, indexed by the instruction operands.
#[derive(Clone)]
pub(crate) enum Slot {
    Native(NativeFn),
    /// Object field, dispatched through `HostObject` by simple name.
    Field(String),
}

impl std::fmt::Debug for Slot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Slot::Native(_) => f.write_str("Native(..)"),
            Slot::Field(name) => f.debug_tuple("Field").field(name).finish(),
        }
    }
}

/// A module with every symbol resolved; the unit of caching and reuse.
#[derive(Debug)]
pub struct LinkedArtifact {
    module: Module,
    slots: Vec<Slot>,
}

impl LinkedArtifact {
    pub fn link(module: Module, registry: &TypeRegistry) -> Result<Self, LinkError> {
        let mut slots = Vec::with_capacity(module.symbols.len());
        for record in module.signature_records() {
            if !registry.signature_still_valid(&record.fq, &record.typed, &record.erased) {
                return Err(LinkError::SignatureChanged {
                    fq: record.fq.clone(),
                    typed: record.typed.clone(),
                    erased: record.erased.clone(),
                });
            }
            let imp = registry
                .implementation_for(&record.fq, &record.typed)
                .ok_or_else(|| LinkError::Unresolved {
                    fq: record.fq.clone(),
                    typed: record.typed.clone(),
                })?;
            slots.push(match imp {
                MemberImpl::Native(f) => Slot::Native(f),
                MemberImpl::ObjectField => {
                    let name = record
                        .fq
                        .rsplit_once('.')
                        .map_or(record.fq.as_str(), |(_, n)| n);
                    Slot::Field(name.to_owned())
                }
            });
        }
        Ok(Self { module, slots })
    }

    /// Decode then link in one step.
    pub fn from_bytes(bytes: &[u8], registry: &TypeRegistry) -> Result<Self, LinkError> {
        Self::link(Module::decode(bytes)?, registry)
    }

    pub fn module(&self) -> &Module {
        &self.module
    }

    pub(crate) fn slot(&self, index: u16) -> Option<&Slot> {
        self.slots.get(index as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use palisade_bytecode::{Instr, SignatureRecord};
    use palisade_core::registry::TypeRegistry;

    fn module_with(records: Vec<SignatureRecord>) -> Module {
        Module {
            unit_name: "_pexpr_link".to_owned(),
            context_type: "Unit".to_owned(),
            result_type: "Int".to_owned(),
            setter: false,
            vars: vec![],
            consts: vec![],
            symbols: records,
            bindings: vec![],
            code: vec![Instr::Ret],
        }
    }

    #[test]
    fn links_builtin_symbols() {
        let reg = TypeRegistry::with_builtins();
        let module = module_with(vec![SignatureRecord::new(
            "Int.+",
            "Int.+(Int): Int",
            "Int(i64)i64",
        )]);
        assert!(LinkedArtifact::link(module, &reg).is_ok());
    }

    #[test]
    fn rejects_changed_signature() {
        let reg = TypeRegistry::with_builtins();
        // Artifact recorded `Int.+` returning Float: a host change.
        let module = module_with(vec![SignatureRecord::new(
            "Int.+",
            "Int.+(Int): Float",
            "Int(i64)f64",
        )]);
        let err = LinkedArtifact::link(module, &reg).unwrap_err();
        assert!(matches!(err, LinkError::SignatureChanged { fq, .. } if fq == "Int.+"));
    }

    #[test]
    fn rejects_vanished_symbol() {
        let reg = TypeRegistry::with_builtins();
        let module = module_with(vec![SignatureRecord::new(
            "Gone.member",
            "Gone.member(): Int",
            "Gone()i64",
        )]);
        assert!(LinkedArtifact::link(module, &reg).is_err());
    }
}
