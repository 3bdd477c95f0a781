//! IDE-style completion under profile rules.
//!
//! The completer shares the evaluator's compile session (and its lock). It
//! never fails on broken input: every operation returns whatever members
//! apply plus the remapped diagnostics.

use std::sync::Arc;

use indexmap::IndexMap;
use rowan::{TextSize, TokenAtOffset};

use palisade_compiler::session::{AnalyzedUnit, ExprRequest};
use palisade_compiler::template::{preprocess_template, PosMap};
use palisade_compiler::parser::ast::{Expr, SelectExpr};
use palisade_compiler::parser::cst::{SyntaxKind, SyntaxToken};
use palisade_compiler::ErrorEntry;
use palisade_core::acl::{AccessCandidate, CandidateKind};
use palisade_core::profile::ExpressionProfile;
use palisade_core::registry::{Conversion, Member, TypeRegistry};
use palisade_core::types::TypeRep;

use crate::evaluator::Shared;

/// One parameter of a completed member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param {
    pub name: String,
    pub ty: String,
}

/// A member the completer offers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberDescriptor {
    pub name: String,
    /// `None` for fields; `Some` (possibly empty) for methods.
    pub params: Option<Vec<Param>>,
    pub result: String,
    /// Reached through a registered conversion.
    pub via_conversion: bool,
    pub doc: Option<String>,
}

/// The answer to one completion query.
#[derive(Debug, Clone, Default)]
pub struct Completion {
    pub members: Vec<MemberDescriptor>,
    pub errors: Vec<ErrorEntry>,
}

/// A completion surface for one profile and context shape.
pub struct Completer {
    shared: Arc<Shared>,
    profile: Arc<ExpressionProfile>,
    template: bool,
    context_type: String,
    result_type: String,
    variable_types: IndexMap<String, String>,
}

impl Completer {
    pub(crate) fn new(shared: Arc<Shared>, profile: Arc<ExpressionProfile>) -> Self {
        Self {
            shared,
            profile,
            template: false,
            context_type: "Unit".to_owned(),
            result_type: "Any".to_owned(),
            variable_types: IndexMap::new(),
        }
    }

    pub fn template(mut self) -> Self {
        self.template = true;
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

    pub fn variable(mut self, name: impl Into<String>, ty: impl Into<String>) -> Self {
        self.variable_types.insert(name.into(), ty.into());
        self
    }

    /// Diagnostics for an expression, remapped to the original text.
    pub fn errors(&self, expression: &str) -> Vec<ErrorEntry> {
        match self.analyzed(expression) {
            Ok((unit, req_parts)) => self.report(&unit, &req_parts),
            Err(entry) => vec![entry],
        }
    }

    /// Every name in lexical scope whose access the ACL allows.
    pub fn scope_completion(&self, expression: &str, _pos: u32) -> Completion {
        let (unit, req_parts) = match self.analyzed(expression) {
            Ok(v) => v,
            Err(entry) => {
                return Completion {
                    members: Vec::new(),
                    errors: vec![entry],
                };
            }
        };
        let registry = self.shared.registry().clone();
        let mut members = Vec::new();

        for (name, ty) in &unit.vars {
            members.push(MemberDescriptor {
                name: name.clone(),
                params: None,
                result: ty.to_string(),
                via_conversion: false,
                doc: None,
            });
        }
        for (name, ty) in &unit.binds {
            members.push(MemberDescriptor {
                name: name.clone(),
                params: None,
                result: ty.to_string(),
                via_conversion: false,
                doc: None,
            });
        }

        // Context members, filtered like any other access site.
        for descriptor in self.members_of(&unit.ctx_type, &registry).iter() {
            members.push(descriptor.clone());
        }

        Completion {
            members,
            errors: self.report(&unit, &req_parts),
        }
    }

    /// Members of the qualifier ending at `pos`, ACL-filtered, including
    /// conversion-added members.
    pub fn type_completion(&self, expression: &str, pos: u32) -> Completion {
        let (unit, req_parts) = match self.analyzed(expression) {
            Ok(v) => v,
            Err(entry) => {
                return Completion {
                    members: Vec::new(),
                    errors: vec![entry],
                };
            }
        };
        let errors = self.report(&unit, &req_parts);

        let unit_pos = req_parts.pos_map.to_processed(pos) + unit.expr_offset;
        let Some(qualifier) = qualifier_at(&unit, unit_pos) else {
            return Completion {
                members: Vec::new(),
                errors,
            };
        };

        let session = self.shared.state.lock().unwrap();
        let qualifier_type = session.type_sub_expr(&unit, &qualifier);
        drop(session);

        if qualifier_type.is_any() {
            return Completion {
                members: Vec::new(),
                errors,
            };
        }

        let registry = self.shared.registry().clone();
        let members = self.members_of(&qualifier_type, &registry);
        Completion {
            members: (*members).clone(),
            errors,
        }
    }

    /// ACL-filtered member set of one type, cached per (profile, type).
    fn members_of(
        &self,
        qualifier: &TypeRep,
        registry: &TypeRegistry,
    ) -> Arc<Vec<MemberDescriptor>> {
        let key = (self.profile.id(), qualifier.clone());
        if let Some(cached) = self.shared.completions.lock().unwrap().get(&key) {
            return cached.clone();
        }

        let mut out = Vec::new();
        for (member, conversion) in registry.visible_members(qualifier) {
            if !self.allowed(member, conversion, qualifier, registry) {
                continue;
            }
            out.push(self.describe(member, conversion.is_some()));
        }
        let out = Arc::new(out);
        self.shared
            .completions
            .lock()
            .unwrap()
            .insert(key, out.clone());
        out
    }

    fn allowed(
        &self,
        member: &Member,
        conversion: Option<&Conversion>,
        qualifier: &TypeRep,
        registry: &TypeRegistry,
    ) -> bool {
        let candidate = AccessCandidate {
            qualifier: qualifier.clone(),
            declaring: member.sig.declaring.clone(),
            name: member.sig.name.clone(),
            params: member
                .sig
                .params
                .as_ref()
                .map(|ps| ps.iter().map(|p| p.ty.clone()).collect()),
            kind: CandidateKind::Instance,
            via_conversion: conversion.map(Conversion::fq),
        };
        self.profile.acl().allows(&candidate, registry)
    }

    fn describe(&self, member: &Member, via_conversion: bool) -> MemberDescriptor {
        let attr = self.profile.attributes().get(&member.sig.fq());
        let override_names = attr.and_then(|a| a.param_names.as_deref());
        let params = member.sig.params.as_ref().map(|ps| {
            ps.iter()
                .enumerate()
                .map(|(i, p)| Param {
                    name: override_names
                        .and_then(|names| names.get(i).cloned())
                        .unwrap_or_else(|| p.name.clone()),
                    ty: p.ty.to_string(),
                })
                .collect()
        });
        MemberDescriptor {
            name: member.sig.name.clone(),
            params,
            result: member.sig.result.to_string(),
            via_conversion,
            doc: attr.and_then(|a| a.doc.clone()),
        }
    }

    /// Analyze the expression, tolerating template errors by turning them
    /// into a single entry.
    fn analyzed(&self, expression: &str) -> Result<(AnalyzedUnit, ReqParts), ErrorEntry> {
        let (processed, pos_map) = if self.template {
            match preprocess_template(expression) {
                Ok(pre) => (pre.text, pre.map),
                Err(err) => {
                    return Err(ErrorEntry::at_offset(expression, 0, err.to_string()));
                }
            }
        } else {
            (expression.to_owned(), PosMap::identity())
        };

        let req_parts = ReqParts {
            original: expression.to_owned(),
            processed,
            pos_map,
        };

        let mut session = self.shared.state.lock().unwrap();
        let result = session.analyze(&ExprRequest {
            profile: &self.profile,
            expression: &req_parts.processed,
            setter: false,
            context_type: &self.context_type,
            result_type: &self.result_type,
            variable_types: &self.variable_types,
            unit_name: "_pexpr_completion",
            original: &req_parts.original,
            pos_map: &req_parts.pos_map,
        });
        drop(session);

        match result {
            Ok(unit) => Ok((unit, req_parts)),
            Err(err) => Err(ErrorEntry::at_offset(expression, 0, err.to_string())),
        }
    }

    fn report(&self, unit: &AnalyzedUnit, req_parts: &ReqParts) -> Vec<ErrorEntry> {
        let session = self.shared.state.lock().unwrap();
        let report = session.report_for(
            &ExprRequest {
                profile: &self.profile,
                expression: &req_parts.processed,
                setter: false,
                context_type: &self.context_type,
                result_type: &self.result_type,
                variable_types: &self.variable_types,
                unit_name: "_pexpr_completion",
                original: &req_parts.original,
                pos_map: &req_parts.pos_map,
            },
            unit,
        );
        report.entries
    }
}

struct ReqParts {
    original: String,
    processed: String,
    pos_map: PosMap,
}

/// Find the qualifier expression of the select surrounding `pos`: the
/// nearest enclosing select whose dot sits at or before the cursor. Works
/// on broken selects (`qualifier.` with the member name missing).
fn qualifier_at(unit: &AnalyzedUnit, pos: u32) -> Option<Expr> {
    let len = unit.text.len() as u32;
    let pos = TextSize::from(pos.min(len));
    let token = match unit.root.as_cst().token_at_offset(pos) {
        TokenAtOffset::None => return None,
        TokenAtOffset::Single(t) => t,
        TokenAtOffset::Between(left, _) => left,
    };
    select_around(&token, pos).and_then(|select| select.qualifier())
}

fn select_around(token: &SyntaxToken, pos: TextSize) -> Option<SelectExpr> {
    token
        .parent_ancestors()
        .filter(|node| node.kind() == SyntaxKind::SelectExpr)
        .find_map(|node| {
            let select = SelectExpr::cast(node)?;
            let dot_end = select.dot_token()?.text_range().end();
            (dot_end <= pos).then_some(select)
        })
}
