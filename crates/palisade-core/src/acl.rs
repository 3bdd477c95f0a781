//! Access-control lists: ordered allow/deny patterns over resolved symbols.
//!
//! An [`Acl`] is an ordered sequence of entries; a candidate access is
//! decided by walking entries in order with **last match wins**. No match
//! means deny. Patterns match structurally on qualifier type (subtype with
//! openness), symbol name (optionally a specific overload), conversion
//! context, and the wildcard forms.

use crate::registry::TypeRegistry;
use crate::types::{TypeParseError, TypeRep};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Policy {
    Allow,
    Deny,
}

/// What a pattern names on its qualifier type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatternTarget {
    /// A member by name; `params: None` matches every overload.
    Member {
        name: String,
        params: Option<Vec<TypeRep>>,
    },
    /// Every field and method of the qualifier type.
    AllMembers,
    /// Every constructor of the qualifier type.
    Constructors,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessPattern {
    pub qualifier: TypeRep,
    pub statics: bool,
    /// When set, the pattern matches only accesses going through exactly
    /// this conversion symbol.
    pub via_conversion: Option<String>,
    pub target: PatternTarget,
}

/// How a candidate access reaches its symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidateKind {
    Instance,
    Static,
    Constructor,
}

/// A reified member-access site, as the typer sees it.
#[derive(Debug, Clone)]
pub struct AccessCandidate {
    /// Static type of the qualifier expression. For statics and
    /// constructors: the accessed type itself.
    pub qualifier: TypeRep,
    pub declaring: String,
    pub name: String,
    pub params: Option<Vec<TypeRep>>,
    pub kind: CandidateKind,
    pub via_conversion: Option<String>,
}

impl AccessCandidate {
    pub fn fq(&self) -> String {
        format!("{}.{}", self.declaring, self.name)
    }
}

impl AccessPattern {
    pub fn matches(&self, candidate: &AccessCandidate, registry: &TypeRegistry) -> bool {
        match (&self.via_conversion, &candidate.via_conversion) {
            (None, None) => {}
            (Some(p), Some(c)) if p == c => {}
            _ => return false,
        }

        if self.statics != (candidate.kind == CandidateKind::Static) {
            return false;
        }

        // Via-conversion patterns pin the view symbol; the qualifier check
        // is implied by the conversion's source type.
        if self.via_conversion.is_none()
            && !registry.is_subtype(&candidate.qualifier, &self.qualifier)
        {
            return false;
        }

        match &self.target {
            PatternTarget::AllMembers => candidate.kind != CandidateKind::Constructor,
            PatternTarget::Constructors => candidate.kind == CandidateKind::Constructor,
            PatternTarget::Member { name, params } => {
                candidate.kind != CandidateKind::Constructor
                    && candidate.name == *name
                    && params
                        .as_ref()
                        .is_none_or(|p| candidate.params.as_ref() == Some(p))
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct AclEntry {
    pub pattern: AccessPattern,
    pub policy: Policy,
    pub order: usize,
}

/// The per-profile access policy.
#[derive(Debug, Clone, Default)]
pub struct Acl {
    entries: Vec<AclEntry>,
    static_refs: Vec<String>,
}

impl Acl {
    pub fn builder() -> AclBuilder {
        AclBuilder::new()
    }

    pub fn entries(&self) -> &[AclEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Walk all entries in order; the last matching entry decides.
    pub fn decide(&self, candidate: &AccessCandidate, registry: &TypeRegistry) -> Option<Policy> {
        let mut decision = None;
        for entry in &self.entries {
            if entry.pattern.matches(candidate, registry) {
                decision = Some(entry.policy);
            }
        }
        decision
    }

    /// Default deny: only an explicit allow grants access.
    pub fn allows(&self, candidate: &AccessCandidate, registry: &TypeRegistry) -> bool {
        self.decide(candidate, registry) == Some(Policy::Allow)
    }

    /// Whether any entry names statics of the given type or module; gates
    /// bare module-name resolution.
    pub fn references_statics_of(&self, type_name: &str) -> bool {
        self.static_refs.iter().any(|n| n == type_name)
    }

    /// Concatenation preserving order: `other`'s entries bind tighter.
    pub fn concat(&self, other: &Acl) -> Acl {
        let mut entries = self.entries.clone();
        entries.extend(other.entries.iter().cloned());
        for (order, entry) in entries.iter_mut().enumerate() {
            entry.order = order;
        }
        let mut static_refs = self.static_refs.clone();
        for name in &other.static_refs {
            if !static_refs.contains(name) {
                static_refs.push(name.clone());
            }
        }
        Acl {
            entries,
            static_refs,
        }
    }
}

/// Errors collected while building an ACL.
#[derive(Debug, Clone, thiserror::Error)]
pub enum AclBuildError {
    #[error("invalid type `{text}` in access pattern: {source}")]
    InvalidType {
        text: String,
        source: TypeParseError,
    },
    #[error("pattern target before `on(..)`, `statics_of(..)` or `via_conversion(..)`")]
    MissingContext,
}

/// Declarative ACL construction.
///
/// ```
/// use palisade_core::acl::Acl;
///
/// let acl = Acl::builder()
///     .allow(|p| p.on("Str").member("len").member("char_at"))
///     .deny(|p| p.on("Any").member("=="))
///     .build()
///     .unwrap();
/// assert_eq!(acl.entries().len(), 3);
/// ```
#[derive(Debug, Default)]
pub struct AclBuilder {
    entries: Vec<AclEntry>,
    static_refs: Vec<String>,
    errors: Vec<AclBuildError>,
}

impl AclBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allow(self, f: impl FnOnce(PatternSet) -> PatternSet) -> Self {
        self.block(Policy::Allow, f)
    }

    pub fn deny(self, f: impl FnOnce(PatternSet) -> PatternSet) -> Self {
        self.block(Policy::Deny, f)
    }

    fn block(mut self, policy: Policy, f: impl FnOnce(PatternSet) -> PatternSet) -> Self {
        let set = f(PatternSet::default());
        self.errors.extend(set.errors);
        for pattern in set.patterns {
            if pattern.statics && !self.static_refs.contains(&pattern.qualifier.name) {
                self.static_refs.push(pattern.qualifier.name.clone());
            }
            let order = self.entries.len();
            self.entries.push(AclEntry {
                pattern,
                policy,
                order,
            });
        }
        self
    }

    pub fn build(mut self) -> Result<Acl, AclBuildError> {
        if let Some(err) = self.errors.drain(..).next() {
            return Err(err);
        }
        Ok(Acl {
            entries: self.entries,
            static_refs: self.static_refs,
        })
    }
}

#[derive(Debug, Clone)]
struct PatternContext {
    qualifier: TypeRep,
    statics: bool,
    via_conversion: Option<String>,
}

/// One allow/deny block: a qualifier context plus the targets named on it.
#[derive(Debug, Default)]
pub struct PatternSet {
    patterns: Vec<AccessPattern>,
    ctx: Option<PatternContext>,
    errors: Vec<AclBuildError>,
}

impl PatternSet {
    /// Scope the following targets to instance members of `ty`.
    pub fn on(mut self, ty: &str) -> Self {
        match TypeRep::parse(ty) {
            Ok(qualifier) => {
                self.ctx = Some(PatternContext {
                    qualifier,
                    statics: false,
                    via_conversion: None,
                });
            }
            Err(source) => self.errors.push(AclBuildError::InvalidType {
                text: ty.to_owned(),
                source,
            }),
        }
        self
    }

    /// Scope the following targets to static members of `ty` (or a module).
    pub fn statics_of(mut self, ty: &str) -> Self {
        match TypeRep::parse(ty) {
            Ok(qualifier) => {
                self.ctx = Some(PatternContext {
                    qualifier,
                    statics: true,
                    via_conversion: None,
                });
            }
            Err(source) => self.errors.push(AclBuildError::InvalidType {
                text: ty.to_owned(),
                source,
            }),
        }
        self
    }

    /// Scope the following targets to accesses going through exactly this
    /// conversion symbol.
    pub fn via_conversion(mut self, fq: &str) -> Self {
        self.ctx = Some(PatternContext {
            qualifier: TypeRep::any(),
            statics: false,
            via_conversion: Some(fq.to_owned()),
        });
        self
    }

    /// A member by name, every overload.
    pub fn member(self, name: &str) -> Self {
        let name = name.to_owned();
        self.push(PatternTarget::Member { name, params: None })
    }

    /// A specific overload, identified by its parameter types.
    pub fn overload(mut self, name: &str, params: &[&str]) -> Self {
        let mut parsed = Vec::with_capacity(params.len());
        for text in params {
            match TypeRep::parse(text) {
                Ok(ty) => parsed.push(ty),
                Err(source) => {
                    self.errors.push(AclBuildError::InvalidType {
                        text: (*text).to_owned(),
                        source,
                    });
                    return self;
                }
            }
        }
        self.push(PatternTarget::Member {
            name: name.to_owned(),
            params: Some(parsed),
        })
    }

    pub fn all_members(self) -> Self {
        self.push(PatternTarget::AllMembers)
    }

    pub fn constructors(self) -> Self {
        self.push(PatternTarget::Constructors)
    }

    fn push(mut self, target: PatternTarget) -> Self {
        let Some(ctx) = self.ctx.clone() else {
            self.errors.push(AclBuildError::MissingContext);
            return self;
        };
        self.patterns.push(AccessPattern {
            qualifier: ctx.qualifier,
            statics: ctx.statics,
            via_conversion: ctx.via_conversion,
            target,
        });
        self
    }
}
