//! The signature-based on-disk artifact cache.
//!
//! Layout under the configured directory:
//!
//! ```text
//! cacheVersion                 ASCII "<FORMAT_VERSION>.<host token>"
//! <unit>/<unit>.plb            encoded module (checksummed header)
//! <unit>/<unit>.pex            assembled source, kept for diagnostics and
//!                              as a collision guard
//! <unit>/<unit>.sig            signature records (SIGNATURES: format)
//! ```
//!
//! A stored artifact is reused only if every recorded signature still
//! resolves identically against the current registry, the stored source
//! matches byte for byte, and the module decodes with a valid checksum.
//! Anything else is a miss, never an error. The directory tolerates
//! concurrent processes: subdirectories are created with `create_dir_all`
//! and `cacheVersion` is the coarse reconciliation point.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use palisade_bytecode::{parse_sig_file, render_sig_file, Module};
use palisade_core::registry::TypeRegistry;

/// Bumped when the artifact format or the signature scheme changes.
pub const CACHE_FORMAT_VERSION: u32 = 1;

pub(crate) struct DiskCache {
    root: PathBuf,
}

impl DiskCache {
    /// Open (and reconcile) a cache directory. A version mismatch clears
    /// the directory.
    pub fn open(root: PathBuf, host_token: &str) -> io::Result<Self> {
        fs::create_dir_all(&root)?;
        let version_line = format!("{CACHE_FORMAT_VERSION}.{host_token}");
        let version_file = root.join("cacheVersion");

        let current = fs::read_to_string(&version_file).unwrap_or_default();
        if current.trim() != version_line {
            info!(dir = %root.display(), "artifact cache version mismatch, clearing");
            clear_dir(&root)?;
            fs::write(&version_file, format!("{version_line}\n"))?;
        }

        Ok(Self { root })
    }

    /// Load a reusable artifact, or `None` when anything disqualifies it.
    pub fn lookup(&self, unit: &str, source: &str, registry: &TypeRegistry) -> Option<Module> {
        let dir = self.root.join(unit);
        let sig_text = fs::read_to_string(dir.join(format!("{unit}.sig"))).ok()?;
        let records = parse_sig_file(&sig_text).ok()?;

        for record in &records {
            if !registry.signature_still_valid(&record.fq, &record.typed, &record.erased) {
                debug!(unit, fq = %record.fq, "stored signature no longer valid, recompiling");
                return None;
            }
        }

        let stored_source = fs::read_to_string(dir.join(format!("{unit}.pex"))).ok()?;
        if stored_source != source {
            debug!(unit, "stored source differs, treating as miss");
            return None;
        }

        let bytes = fs::read(dir.join(format!("{unit}.plb"))).ok()?;
        match Module::decode(&bytes) {
            Ok(module) => {
                debug!(unit, "reusing on-disk artifact");
                Some(module)
            }
            Err(err) => {
                debug!(unit, %err, "stored artifact undecodable, treating as miss");
                None
            }
        }
    }

    /// Persist a freshly compiled artifact alongside its source and
    /// signature file.
    pub fn store(&self, unit: &str, source: &str, module: &Module) -> io::Result<()> {
        let dir = self.root.join(unit);
        fs::create_dir_all(&dir)?;
        fs::write(dir.join(format!("{unit}.plb")), module.encode())?;
        fs::write(dir.join(format!("{unit}.pex")), source)?;
        fs::write(
            dir.join(format!("{unit}.sig")),
            render_sig_file(module.signature_records()),
        )?;
        Ok(())
    }
}

fn clear_dir(root: &Path) -> io::Result<()> {
    for entry in fs::read_dir(root)? {
        let entry = entry?;
        let path = entry.path();
        if entry.file_type()?.is_dir() {
            fs::remove_dir_all(&path)?;
        } else {
            fs::remove_file(&path)?;
        }
    }
    Ok(())
}
