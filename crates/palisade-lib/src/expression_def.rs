//! The compile-cache key.

use std::hash::{Hash, Hasher};
use std::sync::Arc;

use indexmap::IndexMap;

use palisade_compiler::template::{preprocess_template, PosMap, TemplateError};
use palisade_compiler::assemble;
use palisade_core::profile::ExpressionProfile;

/// Everything that identifies one compiled expression.
///
/// Equality and hashing cover the identity fields only; `original` and
/// `pos_map` exist for diagnostic remapping and are ignored (two defs that
/// preprocess to the same expression are the same artifact).
#[derive(Debug, Clone)]
pub struct ExpressionDef {
    pub(crate) profile: Arc<ExpressionProfile>,
    pub(crate) template: bool,
    pub(crate) setter: bool,
    /// Preprocessed expression text.
    pub(crate) expression: String,
    pub(crate) header: String,
    pub(crate) context_type: String,
    pub(crate) result_type: String,
    pub(crate) variable_types: IndexMap<String, String>,
    // Diagnostic-only fields, not part of identity.
    pub(crate) original: String,
    pub(crate) pos_map: PosMap,
}

impl ExpressionDef {
    /// Build a def, preprocessing template-mode input.
    pub fn new(
        profile: Arc<ExpressionProfile>,
        expression: &str,
        template: bool,
        setter: bool,
        context_type: impl Into<String>,
        result_type: impl Into<String>,
        variable_types: IndexMap<String, String>,
    ) -> Result<Self, TemplateError> {
        let (processed, pos_map) = if template {
            let pre = preprocess_template(expression)?;
            if setter && !pre.pure_hole {
                return Err(TemplateError::SetterRequiresSingleHole);
            }
            (pre.text, pre.map)
        } else {
            (expression.to_owned(), PosMap::identity())
        };

        Ok(Self {
            header: profile.header().to_owned(),
            profile,
            template,
            setter,
            expression: processed,
            context_type: context_type.into(),
            result_type: result_type.into(),
            variable_types,
            original: expression.to_owned(),
            pos_map,
        })
    }

    pub fn profile(&self) -> &Arc<ExpressionProfile> {
        &self.profile
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }

    pub fn original(&self) -> &str {
        &self.original
    }

    pub fn is_setter(&self) -> bool {
        self.setter
    }

    pub fn pos_map(&self) -> &PosMap {
        &self.pos_map
    }

    /// Stable on-disk unit name, derived from the identity fields and the
    /// profile's compiled-in texts (name, utilities) so artifacts survive
    /// restarts. ACL changes do not change the generated code and are not
    /// part of the name; the signature file guards reuse.
    pub fn unit_name(&self) -> String {
        let mut parts: Vec<&str> = vec![
            self.profile.name(),
            self.profile.utilities(),
            &self.header,
            &self.expression,
            &self.context_type,
            &self.result_type,
            if self.template { "t" } else { "e" },
            if self.setter { "s" } else { "g" },
        ];
        let var_parts: Vec<String> = self
            .variable_types
            .iter()
            .map(|(name, ty)| format!("{name}:{ty}"))
            .collect();
        parts.extend(var_parts.iter().map(String::as_str));
        assemble::unit_name(&parts)
    }

    fn identity(
        &self,
    ) -> (
        u64,
        bool,
        bool,
        &str,
        &str,
        &str,
        &str,
        &IndexMap<String, String>,
    ) {
        (
            self.profile.id(),
            self.template,
            self.setter,
            &self.expression,
            &self.header,
            &self.context_type,
            &self.result_type,
            &self.variable_types,
        )
    }
}

impl PartialEq for ExpressionDef {
    fn eq(&self, other: &Self) -> bool {
        let (id, t, s, e, h, c, r, v) = self.identity();
        let (id2, t2, s2, e2, h2, c2, r2, v2) = other.identity();
        id == id2 && t == t2 && s == s2 && e == e2 && h == h2 && c == c2 && r == r2 && v == v2
    }
}

impl Eq for ExpressionDef {}

impl Hash for ExpressionDef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        let (id, t, s, e, h, c, r, vars) = self.identity();
        (id, t, s, e, h, c, r).hash(state);
        for (name, ty) in vars {
            name.hash(state);
            ty.hash(state);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile() -> Arc<ExpressionProfile> {
        Arc::new(ExpressionProfile::builder("p").build())
    }

    fn def(profile: &Arc<ExpressionProfile>, expr: &str) -> ExpressionDef {
        ExpressionDef::new(
            profile.clone(),
            expr,
            false,
            false,
            "Unit",
            "Int",
            IndexMap::new(),
        )
        .unwrap()
    }

    #[test]
    fn equality_ignores_diagnostic_fields() {
        let p = profile();
        let mut a = def(&p, "1 + 2");
        let b = def(&p, "1 + 2");
        assert_eq!(a, b);

        // Same identity, different diagnostic provenance.
        a.original = "something else".to_owned();
        assert_eq!(a, b);
    }

    #[test]
    fn different_profiles_differ() {
        let a = def(&profile(), "1");
        let b = def(&profile(), "1");
        assert_ne!(a, b);
    }

    #[test]
    fn template_preprocessing_feeds_identity() {
        let p = profile();
        let t = ExpressionDef::new(
            p.clone(),
            "${1 + 2}",
            true,
            false,
            "Unit",
            "Int",
            IndexMap::new(),
        )
        .unwrap();
        assert_eq!(t.expression(), "1 + 2");
        assert_eq!(t.original(), "${1 + 2}");
    }

    #[test]
    fn setter_template_needs_single_hole() {
        let p = profile();
        let err = ExpressionDef::new(
            p,
            "x=${this.note}",
            true,
            true,
            "Order",
            "Str",
            IndexMap::new(),
        )
        .unwrap_err();
        assert!(matches!(err, TemplateError::SetterRequiresSingleHole));
    }

    #[test]
    fn unit_names_stable_for_equal_defs() {
        let p = profile();
        assert_eq!(def(&p, "1 + 2").unit_name(), def(&p, "1 + 2").unit_name());
        assert_ne!(def(&p, "1 + 2").unit_name(), def(&p, "1 + 3").unit_name());
    }
}
