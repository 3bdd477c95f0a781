//! The host facade: profile-scoped compilation, caching, evaluation.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, Weak};

use indexmap::IndexMap;
use tracing::{debug, info};

use palisade_bytecode::Module;
use palisade_compiler::assemble;
use palisade_compiler::session::{CompileSession, ExprRequest};
use palisade_core::profile::ExpressionProfile;
use palisade_core::registry::TypeRegistry;
use palisade_core::types::TypeRep;
use palisade_vm::{FuelLimits, LinkedArtifact};

use crate::cache::{CacheEntry, DiskCache, MemoryCache};
use crate::callable::Callable;
use crate::completer::{Completer, MemberDescriptor};
use crate::expression_def::ExpressionDef;
use crate::Error;

/// Process-wide state shared by the evaluator, its callables and
/// completers. The compile session is single-threaded and serialized
/// behind one lock; cache maps have their own.
pub(crate) struct Shared {
    weak: Weak<Shared>,
    registry: Arc<TypeRegistry>,
    limits: FuelLimits,
    disk: Option<DiskCache>,
    pub(crate) state: Mutex<CompileSession>,
    cache: MemoryCache,
    pub(crate) completions: Mutex<HashMap<(u64, TypeRep), Arc<Vec<MemberDescriptor>>>>,
}

impl Shared {
    pub(crate) fn registry(&self) -> &Arc<TypeRegistry> {
        &self.registry
    }

    pub(crate) fn limits(&self) -> FuelLimits {
        self.limits
    }

    /// Compute-if-absent resolution of a def to its cached entry. Identical
    /// concurrent requests coalesce on the session lock: the second caller
    /// finds the first caller's entry on the double-check.
    pub(crate) fn resolve(&self, def: &Arc<ExpressionDef>) -> Result<CacheEntry, Error> {
        if let Some(entry) = self.cache.get(def) {
            debug!(unit = %entry.unit_name, "artifact cache hit");
            return Ok(entry);
        }

        let mut session = self.state.lock().unwrap();
        if let Some(entry) = self.cache.get(def) {
            return Ok(entry);
        }

        let unit_name = def.unit_name();
        let assembled = assemble::assemble(def.profile().header(), def.expression());
        let module = self.load_or_compile(&mut session, def, &unit_name, &assembled.text)?;
        let bytes = module.encode();
        let artifact = Arc::new(LinkedArtifact::link(module, &self.registry)?);

        let callable = Callable::new(def.clone(), self.weak.clone());
        callable.attach(&artifact);
        let entry = CacheEntry {
            callable,
            artifact,
            unit_name,
        };
        self.cache.insert((**def).clone(), entry.clone(), bytes);
        Ok(entry)
    }

    fn load_or_compile(
        &self,
        session: &mut CompileSession,
        def: &ExpressionDef,
        unit_name: &str,
        source: &str,
    ) -> Result<Module, Error> {
        if let Some(disk) = &self.disk
            && let Some(module) = disk.lookup(unit_name, source, &self.registry)
        {
            if module_matches_def(&module, def) {
                info!(unit = unit_name, "reusing artifact from disk cache");
                return Ok(module);
            }
            debug!(unit = unit_name, "stored artifact metadata mismatch, recompiling");
        }

        debug!(unit = unit_name, "compiling expression");
        let module = session.compile(&ExprRequest {
            profile: def.profile(),
            expression: def.expression(),
            setter: def.is_setter(),
            context_type: &def.context_type,
            result_type: &def.result_type,
            variable_types: &def.variable_types,
            unit_name,
            original: def.original(),
            pos_map: def.pos_map(),
        })?;

        if let Some(disk) = &self.disk {
            disk.store(unit_name, source, &module)?;
        }
        Ok(module)
    }

    pub(crate) fn evict(&self, def: &ExpressionDef) -> bool {
        self.cache.evict(def)
    }

    pub(crate) fn module_bytes(&self, unit_name: &str) -> Option<Vec<u8>> {
        self.cache.module_bytes(unit_name)
    }

    /// Tear down and rebuild the compile session, invalidating both caches
    /// atomically (under the session lock).
    pub(crate) fn reset(&self) {
        let mut session = self.state.lock().unwrap();
        *session = CompileSession::new(self.registry.clone());
        self.cache.clear();
        self.completions.lock().unwrap().clear();
        info!("evaluator reset: session rebuilt, caches cleared");
    }
}

/// Guard against unit-name hash collisions across request shapes: the
/// decoded artifact must describe the same kind of unit.
fn module_matches_def(module: &Module, def: &ExpressionDef) -> bool {
    if module.setter != def.is_setter() {
        return false;
    }
    let canonical = |text: &str| TypeRep::parse(text).map(|t| t.to_string());
    if canonical(&def.context_type) != Ok(module.context_type.clone()) {
        return false;
    }
    if canonical(&def.result_type) != Ok(module.result_type.clone()) {
        return false;
    }
    module.vars.iter().eq(def.variable_types.keys())
}

/// The sandboxed expression evaluator.
///
/// Callables reference the evaluator weakly; invoking one after the
/// evaluator is dropped reports [`Error::EvaluatorGone`].
pub struct Evaluator {
    shared: Arc<Shared>,
}

impl Evaluator {
    /// An evaluator without an on-disk artifact cache.
    pub fn new(registry: TypeRegistry) -> Self {
        Self {
            shared: new_shared(registry, FuelLimits::default(), None),
        }
    }

    pub fn builder(registry: TypeRegistry) -> EvaluatorBuilder {
        EvaluatorBuilder {
            registry,
            artifact_dir: None,
            host_token: String::from("0"),
            limits: FuelLimits::default(),
        }
    }

    pub fn registry(&self) -> &Arc<TypeRegistry> {
        self.shared.registry()
    }

    /// Start describing an expression to compile.
    pub fn expr<'e>(&'e self, profile: &Arc<ExpressionProfile>, text: &str) -> ExprBuilder<'e> {
        ExprBuilder {
            evaluator: self,
            profile: profile.clone(),
            text: text.to_owned(),
            template: false,
            setter: false,
            context_type: "Unit".to_owned(),
            result_type: "Any".to_owned(),
            variable_types: IndexMap::new(),
        }
    }

    /// Compile a fully-described def.
    pub fn compile_def(&self, def: ExpressionDef) -> Result<Callable, Error> {
        self.shared.resolve(&Arc::new(def)).map(|e| e.callable)
    }

    /// A completer scoped to one profile.
    pub fn completer(&self, profile: &Arc<ExpressionProfile>) -> Completer {
        Completer::new(self.shared.clone(), profile.clone())
    }

    /// Drop a cached artifact. Outstanding callables keep serving and
    /// re-resolve on their next invocation.
    pub fn evict(&self, def: &ExpressionDef) -> bool {
        self.shared.evict(def)
    }

    /// Human-readable listing of a cached artifact, by def.
    pub fn dump(&self, def: &ExpressionDef) -> Option<String> {
        let bytes = self.shared.module_bytes(&def.unit_name())?;
        Module::decode(&bytes).ok().map(|m| palisade_bytecode::dump::dump(&m))
    }

    /// Rebuild the compiler and invalidate caches atomically.
    pub fn reset(&self) {
        self.shared.reset();
    }
}

fn new_shared(
    registry: TypeRegistry,
    limits: FuelLimits,
    disk: Option<DiskCache>,
) -> Arc<Shared> {
    let registry = Arc::new(registry);
    Arc::new_cyclic(|weak| Shared {
        weak: weak.clone(),
        state: Mutex::new(CompileSession::new(registry.clone())),
        registry,
        limits,
        disk,
        cache: MemoryCache::new(),
        completions: Mutex::new(HashMap::new()),
    })
}

pub struct EvaluatorBuilder {
    registry: TypeRegistry,
    artifact_dir: Option<PathBuf>,
    host_token: String,
    limits: FuelLimits,
}

impl EvaluatorBuilder {
    /// Enable the on-disk artifact cache under this directory.
    pub fn artifact_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.artifact_dir = Some(dir.into());
        self
    }

    /// Host-chosen backwards-compatibility token appended to the cache
    /// version line; bump it to force a cold cache.
    pub fn host_token(mut self, token: impl Into<String>) -> Self {
        self.host_token = token.into();
        self
    }

    pub fn limits(mut self, limits: FuelLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn build(self) -> Result<Evaluator, Error> {
        let disk = match self.artifact_dir {
            Some(dir) => Some(DiskCache::open(dir, &self.host_token)?),
            None => None,
        };
        Ok(Evaluator {
            shared: new_shared(self.registry, self.limits, disk),
        })
    }
}

/// Fluent description of one expression to compile.
pub struct ExprBuilder<'e> {
    evaluator: &'e Evaluator,
    profile: Arc<ExpressionProfile>,
    text: String,
    template: bool,
    setter: bool,
    context_type: String,
    result_type: String,
    variable_types: IndexMap<String, String>,
}

impl ExprBuilder<'_> {
    /// Treat the input as a `${…}` template.
    pub fn template(mut self) -> Self {
        self.template = true;
        self
    }

    /// Compile to a `(context, value) -> unit` setter.
    pub fn setter(mut self) -> Self {
        self.setter = true;
        self
    }

    pub fn context_type(mut self, ty: impl Into<String>) -> Self {
        self.context_type = ty.into();
        self
    }

    pub fn result_type(mut self, ty: impl Into<String>) -> Self {
        self.result_type = ty.into();
        self
    }

    /// Declare a free variable and its type.
    pub fn variable(mut self, name: impl Into<String>, ty: impl Into<String>) -> Self {
        self.variable_types.insert(name.into(), ty.into());
        self
    }

    pub fn to_def(self) -> Result<ExpressionDef, Error> {
        Ok(ExpressionDef::new(
            self.profile,
            &self.text,
            self.template,
            self.setter,
            self.context_type,
            self.result_type,
            self.variable_types,
        )?)
    }

    pub fn compile(self) -> Result<Callable, Error> {
        let evaluator = self.evaluator;
        let def = ExpressionDef::new(
            self.profile,
            &self.text,
            self.template,
            self.setter,
            self.context_type,
            self.result_type,
            self.variable_types,
        )?;
        evaluator.compile_def(def)
    }
}
