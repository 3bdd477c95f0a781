//! Expression profiles: named security/capability domains.
//!
//! A profile bundles the syntax policy, the ACL, symbol attributes for
//! completion, and the textual header/utilities blocks. Profiles are
//! immutable and shared behind `Arc`; identity is a process-unique id.

use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::IndexMap;

use crate::acl::Acl;

/// Abstract expression shapes checked by the syntax validator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u16)]
pub enum SyntaxShape {
    Literal = 0,
    Ident,
    This,
    Select,
    Call,
    Binary,
    Unary,
    Concat,
    If,
    Block,
    Paren,
    Ascribe,
    Let,
}

/// 16-bit bitset of [`SyntaxShape`]s for O(1) membership testing.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct ShapeSet(u16);

impl ShapeSet {
    pub const EMPTY: ShapeSet = ShapeSet(0);

    pub const fn new(shapes: &[SyntaxShape]) -> Self {
        let mut bits = 0u16;
        let mut i = 0;
        while i < shapes.len() {
            bits |= 1 << shapes[i] as u16;
            i += 1;
        }
        ShapeSet(bits)
    }

    pub const fn contains(&self, shape: SyntaxShape) -> bool {
        self.0 & (1 << shape as u16) != 0
    }

    pub const fn with(self, shape: SyntaxShape) -> Self {
        ShapeSet(self.0 | (1 << shape as u16))
    }

    pub const fn without(self, shape: SyntaxShape) -> Self {
        ShapeSet(self.0 & !(1 << shape as u16))
    }
}

impl std::fmt::Debug for ShapeSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let all = [
            SyntaxShape::Literal,
            SyntaxShape::Ident,
            SyntaxShape::This,
            SyntaxShape::Select,
            SyntaxShape::Call,
            SyntaxShape::Binary,
            SyntaxShape::Unary,
            SyntaxShape::Concat,
            SyntaxShape::If,
            SyntaxShape::Block,
            SyntaxShape::Paren,
            SyntaxShape::Ascribe,
            SyntaxShape::Let,
        ];
        f.debug_set()
            .entries(all.iter().filter(|s| self.contains(**s)))
            .finish()
    }
}

/// Which expression shapes a profile permits in user expressions.
///
/// The default permits everything except `Let` - definitions belong to
/// header and utility blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyntaxPolicy {
    allowed: ShapeSet,
}

impl SyntaxPolicy {
    const DEFAULT: ShapeSet = ShapeSet::new(&[
        SyntaxShape::Literal,
        SyntaxShape::Ident,
        SyntaxShape::This,
        SyntaxShape::Select,
        SyntaxShape::Call,
        SyntaxShape::Binary,
        SyntaxShape::Unary,
        SyntaxShape::Concat,
        SyntaxShape::If,
        SyntaxShape::Block,
        SyntaxShape::Paren,
        SyntaxShape::Ascribe,
    ]);

    pub fn default_policy() -> Self {
        Self {
            allowed: Self::DEFAULT,
        }
    }

    pub fn permitting(allowed: ShapeSet) -> Self {
        Self { allowed }
    }

    pub fn allows(&self, shape: SyntaxShape) -> bool {
        self.allowed.contains(shape)
    }

    pub fn forbid(self, shape: SyntaxShape) -> Self {
        Self {
            allowed: self.allowed.without(shape),
        }
    }

    pub fn permit(self, shape: SyntaxShape) -> Self {
        Self {
            allowed: self.allowed.with(shape),
        }
    }
}

impl Default for SyntaxPolicy {
    fn default() -> Self {
        Self::default_policy()
    }
}

/// Documentation and parameter-name overrides for one symbol.
#[derive(Debug, Clone, Default)]
pub struct SymbolAttr {
    pub doc: Option<String>,
    pub param_names: Option<Vec<String>>,
}

/// Per-profile symbol attribute table, keyed by fully-qualified name.
#[derive(Debug, Clone, Default)]
pub struct SymbolAttributes {
    map: IndexMap<String, SymbolAttr>,
}

impl SymbolAttributes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_doc(mut self, fq: &str, doc: impl Into<String>) -> Self {
        self.map.entry(fq.to_owned()).or_default().doc = Some(doc.into());
        self
    }

    pub fn with_param_names<S: Into<String>>(
        mut self,
        fq: &str,
        names: impl IntoIterator<Item = S>,
    ) -> Self {
        self.map.entry(fq.to_owned()).or_default().param_names =
            Some(names.into_iter().map(Into::into).collect());
        self
    }

    pub fn get(&self, fq: &str) -> Option<&SymbolAttr> {
        self.map.get(fq)
    }
}

pub type ProfileId = u64;

static NEXT_PROFILE_ID: AtomicU64 = AtomicU64::new(1);

/// An immutable security/capability domain.
#[derive(Debug)]
pub struct ExpressionProfile {
    id: ProfileId,
    name: String,
    syntax: SyntaxPolicy,
    acl: Acl,
    attributes: SymbolAttributes,
    header: String,
    utilities: String,
}

impl ExpressionProfile {
    pub fn builder(name: impl Into<String>) -> ProfileBuilder {
        ProfileBuilder {
            name: name.into(),
            syntax: SyntaxPolicy::default_policy(),
            acl: Acl::default(),
            attributes: SymbolAttributes::default(),
            header: String::new(),
            utilities: String::new(),
        }
    }

    pub fn id(&self) -> ProfileId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn syntax(&self) -> &SyntaxPolicy {
        &self.syntax
    }

    pub fn acl(&self) -> &Acl {
        &self.acl
    }

    pub fn attributes(&self) -> &SymbolAttributes {
        &self.attributes
    }

    /// Text prepended to every expression of this profile.
    pub fn header(&self) -> &str {
        &self.header
    }

    /// Named definitions visible to every expression, compiled once per
    /// profile identity.
    pub fn utilities(&self) -> &str {
        &self.utilities
    }
}

#[derive(Debug)]
pub struct ProfileBuilder {
    name: String,
    syntax: SyntaxPolicy,
    acl: Acl,
    attributes: SymbolAttributes,
    header: String,
    utilities: String,
}

impl ProfileBuilder {
    pub fn syntax(mut self, policy: SyntaxPolicy) -> Self {
        self.syntax = policy;
        self
    }

    pub fn acl(mut self, acl: Acl) -> Self {
        self.acl = acl;
        self
    }

    pub fn attributes(mut self, attributes: SymbolAttributes) -> Self {
        self.attributes = attributes;
        self
    }

    pub fn header(mut self, text: impl Into<String>) -> Self {
        self.header = text.into();
        self
    }

    pub fn utilities(mut self, text: impl Into<String>) -> Self {
        self.utilities = text.into();
        self
    }

    pub fn build(self) -> ExpressionProfile {
        ExpressionProfile {
            id: NEXT_PROFILE_ID.fetch_add(1, Ordering::Relaxed),
            name: self.name,
            syntax: self.syntax,
            acl: self.acl,
            attributes: self.attributes,
            header: self.header,
            utilities: self.utilities,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_policy_rejects_let() {
        let policy = SyntaxPolicy::default_policy();
        assert!(policy.allows(SyntaxShape::Select));
        assert!(policy.allows(SyntaxShape::If));
        assert!(!policy.allows(SyntaxShape::Let));
    }

    #[test]
    fn forbid_and_permit() {
        let policy = SyntaxPolicy::default_policy()
            .forbid(SyntaxShape::If)
            .permit(SyntaxShape::Let);
        assert!(!policy.allows(SyntaxShape::If));
        assert!(policy.allows(SyntaxShape::Let));
    }

    #[test]
    fn profile_ids_are_unique() {
        let a = ExpressionProfile::builder("a").build();
        let b = ExpressionProfile::builder("a").build();
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn attributes_lookup() {
        let attrs = SymbolAttributes::new()
            .with_doc("Str.len", "Length in characters.")
            .with_param_names("Str.char_at", ["index"]);
        assert_eq!(
            attrs.get("Str.len").unwrap().doc.as_deref(),
            Some("Length in characters.")
        );
        assert_eq!(
            attrs.get("Str.char_at").unwrap().param_names.as_deref(),
            Some(&["index".to_owned()][..])
        );
    }
}
