//! The two-level in-memory artifact cache.
//!
//! The outer level maps a def to its handed-out callable plus the strong
//! artifact reference (the cache is the artifact's owner); the inner level
//! retains encoded module bytes by unit name for dumps and diagnostics.
//! Evicting an entry drops the strong reference and deletes the stored
//! bytes; outstanding callables keep working and transparently re-resolve.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use palisade_vm::LinkedArtifact;

use crate::callable::Callable;
use crate::expression_def::ExpressionDef;

#[derive(Clone)]
pub(crate) struct CacheEntry {
    pub callable: Callable,
    pub artifact: Arc<LinkedArtifact>,
    pub unit_name: String,
}

#[derive(Default)]
pub(crate) struct MemoryCache {
    entries: Mutex<HashMap<ExpressionDef, CacheEntry>>,
    modules: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, def: &ExpressionDef) -> Option<CacheEntry> {
        self.entries.lock().unwrap().get(def).cloned()
    }

    pub fn insert(&self, def: ExpressionDef, entry: CacheEntry, module_bytes: Vec<u8>) {
        self.modules
            .lock()
            .unwrap()
            .insert(entry.unit_name.clone(), module_bytes);
        self.entries.lock().unwrap().insert(def, entry);
    }

    /// Evict one def; invalidates the inner level too.
    pub fn evict(&self, def: &ExpressionDef) -> bool {
        let removed = self.entries.lock().unwrap().remove(def);
        match removed {
            Some(entry) => {
                self.modules.lock().unwrap().remove(&entry.unit_name);
                true
            }
            None => false,
        }
    }

    pub fn module_bytes(&self, unit_name: &str) -> Option<Vec<u8>> {
        self.modules.lock().unwrap().get(unit_name).cloned()
    }

    pub fn clear(&self) {
        self.entries.lock().unwrap().clear();
        self.modules.lock().unwrap().clear();
    }
}
