//! The per-unit symbol table.
//!
//! Every external symbol a unit references is interned once, keyed by
//! `(fq, typed)` so overloads stay distinct. The table's record list goes
//! into the emitted module verbatim, doubling as the signature-record set
//! the on-disk cache verifies.

use std::collections::HashMap;

use palisade_bytecode::SignatureRecord;

#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    index: HashMap<(String, String), u16>,
    records: Vec<SignatureRecord>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn intern(&mut self, record: SignatureRecord) -> u16 {
        let key = (record.fq.clone(), record.typed.clone());
        if let Some(&idx) = self.index.get(&key) {
            return idx;
        }
        let idx = u16::try_from(self.records.len()).expect("symbol table exceeds u16 range");
        self.index.insert(key, idx);
        self.records.push(record);
        idx
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[SignatureRecord] {
        &self.records
    }

    pub fn into_records(self) -> Vec<SignatureRecord> {
        self.records
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_deduplicates_by_fq_and_typed() {
        let mut table = SymbolTable::new();
        let a = table.intern(SignatureRecord::new("Str.len", "Str.len(): Int", "Str()i64"));
        let b = table.intern(SignatureRecord::new("Str.len", "Str.len(): Int", "Str()i64"));
        assert_eq!(a, b);
        assert_eq!(table.len(), 1);

        // A different overload of the same name is a distinct symbol.
        let c = table.intern(SignatureRecord::new(
            "Str.substring",
            "Str.substring(Int, Int): Str",
            "Str(i64,i64)str",
        ));
        assert_ne!(a, c);
        assert_eq!(table.len(), 2);
    }
}
