//! Bottom-up type checking with access-control enforcement.
//!
//! The typer resolves every member access against the registry, reifies it
//! as an [`AccessCandidate`], and decides it against the profile ACL at the
//! reference site, so denials carry accurate positions. Resolutions are
//! recorded per CST node for the lowering pass; referenced symbols are
//! interned into the unit's [`SymbolTable`].
//!
//! `trusted` mode (profile header and utility bindings) skips the ACL but
//! still resolves and records symbols.

use std::collections::HashMap;

use indexmap::IndexMap;
use rowan::TextRange;

use palisade_bytecode::SignatureRecord;
use palisade_core::acl::{AccessCandidate, Acl, CandidateKind};
use palisade_core::registry::{Conversion, MemberHit, MemberKind, TypeRegistry};
use palisade_core::types::TypeRep;

use crate::analyze::symbols::SymbolTable;
use crate::diagnostics::Diagnostics;
use crate::escape::unescape;
use crate::parser::ast::{
    AscribeExpr, BinaryExpr, BlockExpr, CallExpr, ConcatExpr, Expr, IdentExpr, IfExpr, LitExpr,
    SelectExpr, UnaryExpr,
};
use crate::parser::cst::{SyntaxKind, SyntaxNode};

/// How one CST node lowers, as decided during typing.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// Free-variable slot.
    Var(u16),
    /// Header/utility binding slot.
    Bind(u16),
    /// Bare identifier reading a context field.
    CtxField { sym: u16, conv: Option<u16> },
    /// Bare identifier calling a zero-arg context method.
    CtxMethod { sym: u16, conv: Option<u16> },
    /// Bare identifier call `f(args)` dispatching on the context.
    CtxCall { sym: u16, conv: Option<u16> },
    /// Qualified field read.
    Field {
        sym: u16,
        conv: Option<u16>,
        settable: bool,
        ty: TypeRep,
    },
    /// Qualified method access (select of a zero-arg method, or a call).
    Method { sym: u16, conv: Option<u16> },
    /// Static member access.
    Static { sym: u16 },
    /// Constructor call.
    Construct { sym: u16 },
    /// Conversion inserted by a type ascription.
    Convert { sym: u16 },
}

pub type Resolutions = HashMap<SyntaxNode, Resolution>;

pub struct Typer<'a> {
    pub registry: &'a TypeRegistry,
    pub acl: &'a Acl,
    /// `None` while typing utilities: no context in scope.
    pub ctx_type: Option<&'a TypeRep>,
    pub vars: &'a IndexMap<String, TypeRep>,
    pub binds: &'a IndexMap<String, TypeRep>,
    pub symbols: &'a mut SymbolTable,
    pub resolutions: &'a mut Resolutions,
    pub diag: &'a mut Diagnostics,
    /// Header/utility code: skip the ACL.
    pub trusted: bool,
}

impl Typer<'_> {
    pub fn check(&mut self, expr: &Expr) -> TypeRep {
        match expr {
            Expr::Lit(lit) => self.check_lit(lit),
            Expr::Ident(ident) => self.check_ident(ident),
            Expr::This(this) => match self.ctx_type {
                Some(ctx) => ctx.clone(),
                None => {
                    self.error("`this` is not available here", this.as_cst().text_range());
                    TypeRep::any()
                }
            },
            Expr::Select(select) => self.check_select(select),
            Expr::Call(call) => self.check_call(call),
            Expr::Binary(binary) => self.check_binary(binary),
            Expr::Unary(unary) => self.check_unary(unary),
            Expr::Concat(concat) => self.check_concat(concat),
            Expr::If(node) => self.check_if(node),
            Expr::Block(block) => self.check_block(block),
            Expr::Paren(paren) => match paren.inner() {
                Some(inner) => self.check(&inner),
                None => TypeRep::any(),
            },
            Expr::Ascribe(node) => self.check_ascribe(node),
        }
    }

    fn error(&mut self, message: impl Into<String>, range: TextRange) {
        self.diag.error(message, range).emit();
    }

    fn check_lit(&mut self, lit: &LitExpr) -> TypeRep {
        let Some(token) = lit.token() else {
            return TypeRep::unit();
        };
        match token.kind() {
            SyntaxKind::IntLit => {
                if token.text().parse::<i64>().is_err() {
                    self.error("integer literal out of range", token.text_range());
                }
                TypeRep::int()
            }
            SyntaxKind::FloatLit => {
                if token.text().parse::<f64>().is_err() {
                    self.error("invalid float literal", token.text_range());
                }
                TypeRep::float()
            }
            SyntaxKind::StringLit => {
                let text = token.text();
                let inner = &text[1..text.len().saturating_sub(1)];
                if unescape(inner).is_err() {
                    self.error("invalid escape sequence", token.text_range());
                }
                TypeRep::str()
            }
            SyntaxKind::KwTrue | SyntaxKind::KwFalse => TypeRep::bool(),
            _ => TypeRep::unit(),
        }
    }

    fn check_ident(&mut self, ident: &IdentExpr) -> TypeRep {
        let Some(name) = ident.name() else {
            return TypeRep::any();
        };
        let range = ident.as_cst().text_range();

        if let Some(index) = self.vars.get_index_of(&name) {
            self.resolutions
                .insert(ident.as_cst().clone(), Resolution::Var(index as u16));
            return self.vars[index].clone();
        }
        if let Some(index) = self.binds.get_index_of(&name) {
            self.resolutions
                .insert(ident.as_cst().clone(), Resolution::Bind(index as u16));
            return self.binds[index].clone();
        }

        if let Some(ctx) = self.ctx_type {
            let ctx = ctx.clone();
            if let Some(hit) = self.registry.resolve_select(&ctx, &name) {
                let (sym, conv, result) =
                    self.record_member(&hit, &ctx, CandidateKind::Instance, range);
                let resolution = if hit.member.kind == MemberKind::Field {
                    Resolution::CtxField { sym, conv }
                } else {
                    Resolution::CtxMethod { sym, conv }
                };
                self.resolutions.insert(ident.as_cst().clone(), resolution);
                return result;
            }
        }

        if self.registry.is_module(&name) {
            // A module name only resolves (as a qualifier) when the ACL
            // references one of its statics.
            if self.trusted || self.acl.references_statics_of(&name) {
                self.error(format!("module `{name}` is not a value"), range);
            } else {
                self.error(format!("unknown name `{name}`"), range);
            }
        } else if self.registry.is_type(&name) {
            self.error(format!("type `{name}` is not a value"), range);
        } else {
            self.error(format!("unknown name `{name}`"), range);
        }
        TypeRep::any()
    }

    /// Is `name` a value in scope? Value names shadow type and module
    /// names in qualifier position.
    fn is_value_name(&self, name: &str) -> bool {
        self.vars.contains_key(name)
            || self.binds.contains_key(name)
            || self
                .ctx_type
                .is_some_and(|ctx| self.registry.resolve_select(ctx, name).is_some())
    }

    /// An identifier usable as a static qualifier: a registered type or a
    /// module the ACL lets this profile name.
    fn static_qualifier(&self, expr: &Option<Expr>) -> Option<String> {
        let Some(Expr::Ident(ident)) = expr else {
            return None;
        };
        let name = ident.name()?;
        if self.is_value_name(&name) || !self.registry.is_type(&name) {
            return None;
        }
        if self.registry.is_module(&name)
            && !self.trusted
            && !self.acl.references_statics_of(&name)
        {
            return None;
        }
        Some(name)
    }

    fn check_select(&mut self, select: &SelectExpr) -> TypeRep {
        let range = select.as_cst().text_range();
        let Some(name_token) = select.name_token() else {
            // Broken select: still type the qualifier for recovery.
            if let Some(qualifier) = select.qualifier() {
                self.check(&qualifier);
            }
            return TypeRep::any();
        };
        let name = name_token.text().to_owned();

        if let Some(type_name) = self.static_qualifier(&select.qualifier()) {
            return self.check_static_access(select.as_cst(), &type_name, &name, None, range);
        }

        let Some(qualifier) = select.qualifier() else {
            return TypeRep::any();
        };
        let qt = self.check(&qualifier);
        if qt.is_any() {
            return TypeRep::any();
        }

        match self.registry.resolve_select(&qt, &name) {
            Some(hit) => {
                let (sym, conv, result) =
                    self.record_member(&hit, &qt, CandidateKind::Instance, range);
                let resolution = if hit.member.kind == MemberKind::Field {
                    Resolution::Field {
                        sym,
                        conv,
                        settable: hit.member.settable,
                        ty: hit.member.sig.result.clone(),
                    }
                } else {
                    Resolution::Method { sym, conv }
                };
                self.resolutions.insert(select.as_cst().clone(), resolution);
                result
            }
            None => {
                if self.registry.has_member_named(&qt, &name) {
                    self.error(
                        format!("member `{name}` on `{qt}` requires arguments"),
                        range,
                    );
                } else {
                    self.error(format!("no member `{name}` on type `{qt}`"), range);
                }
                TypeRep::any()
            }
        }
    }

    fn check_static_access(
        &mut self,
        node: &SyntaxNode,
        type_name: &str,
        member: &str,
        args: Option<&[TypeRep]>,
        range: TextRange,
    ) -> TypeRep {
        match self.registry.resolve_static(type_name, member, args) {
            Some(def) => {
                let candidate = AccessCandidate {
                    qualifier: TypeRep::named(type_name),
                    declaring: def.sig.declaring.clone(),
                    name: def.sig.name.clone(),
                    params: def
                        .sig
                        .params
                        .as_ref()
                        .map(|ps| ps.iter().map(|p| p.ty.clone()).collect()),
                    kind: CandidateKind::Static,
                    via_conversion: None,
                };
                self.check_candidate(&candidate, range);
                let sym = self.symbols.intern(SignatureRecord::new(
                    def.sig.fq(),
                    def.sig.typed(),
                    TypeRegistry::erased_sig(def),
                ));
                self.resolutions
                    .insert(node.clone(), Resolution::Static { sym });
                def.sig.result.clone()
            }
            None => {
                match args {
                    Some(args) => self.error(
                        format!(
                            "no static `{member}` on `{type_name}` matching ({})",
                            type_list(args)
                        ),
                        range,
                    ),
                    None => self.error(
                        format!("no static `{member}` on `{type_name}`"),
                        range,
                    ),
                }
                TypeRep::any()
            }
        }
    }

    fn check_call(&mut self, call: &CallExpr) -> TypeRep {
        let range = call.as_cst().text_range();
        let arg_types: Vec<TypeRep> = call.args().map(|arg| self.check(&arg)).collect();

        match call.callee() {
            Some(Expr::Select(select)) => {
                let Some(name_token) = select.name_token() else {
                    return TypeRep::any();
                };
                let name = name_token.text().to_owned();

                if let Some(type_name) = self.static_qualifier(&select.qualifier()) {
                    return self.check_static_access(
                        call.as_cst(),
                        &type_name,
                        &name,
                        Some(&arg_types),
                        range,
                    );
                }

                let Some(qualifier) = select.qualifier() else {
                    return TypeRep::any();
                };
                let qt = self.check(&qualifier);
                if qt.is_any() {
                    return TypeRep::any();
                }

                match self.registry.resolve_call(&qt, &name, &arg_types) {
                    Some(hit) => {
                        let (sym, conv, result) =
                            self.record_member(&hit, &qt, CandidateKind::Instance, range);
                        self.resolutions
                            .insert(call.as_cst().clone(), Resolution::Method { sym, conv });
                        result
                    }
                    None => {
                        self.no_member_error(&qt, &name, &arg_types, range);
                        TypeRep::any()
                    }
                }
            }
            Some(Expr::Ident(ident)) => {
                let Some(name) = ident.name() else {
                    return TypeRep::any();
                };

                if self.vars.contains_key(&name) || self.binds.contains_key(&name) {
                    self.error(format!("`{name}` is not callable"), range);
                    return TypeRep::any();
                }

                // Bare call dispatching on the context.
                if let Some(ctx) = self.ctx_type {
                    let ctx = ctx.clone();
                    if let Some(hit) = self.registry.resolve_call(&ctx, &name, &arg_types) {
                        let (sym, conv, result) =
                            self.record_member(&hit, &ctx, CandidateKind::Instance, range);
                        self.resolutions
                            .insert(call.as_cst().clone(), Resolution::CtxCall { sym, conv });
                        return result;
                    }
                    if self.registry.has_member_named(&ctx, &name) {
                        self.no_member_error(&ctx, &name, &arg_types, range);
                        return TypeRep::any();
                    }
                }

                if self.registry.is_type(&name) && !self.registry.is_module(&name) {
                    return self.check_construct(call, &name, &arg_types, range);
                }

                self.error(format!("unknown name `{name}`"), range);
                TypeRep::any()
            }
            Some(other) => {
                self.check(&other);
                self.error("expression is not callable", range);
                TypeRep::any()
            }
            None => TypeRep::any(),
        }
    }

    fn check_construct(
        &mut self,
        call: &CallExpr,
        type_name: &str,
        args: &[TypeRep],
        range: TextRange,
    ) -> TypeRep {
        match self.registry.resolve_constructor(type_name, args) {
            Some(member) => {
                let candidate = AccessCandidate {
                    qualifier: TypeRep::named(type_name),
                    declaring: member.sig.declaring.clone(),
                    name: member.sig.name.clone(),
                    params: member
                        .sig
                        .params
                        .as_ref()
                        .map(|ps| ps.iter().map(|p| p.ty.clone()).collect()),
                    kind: CandidateKind::Constructor,
                    via_conversion: None,
                };
                self.check_candidate(&candidate, range);
                let sym = self.symbols.intern(SignatureRecord::new(
                    member.sig.fq(),
                    member.sig.typed(),
                    TypeRegistry::erased_sig(member),
                ));
                self.resolutions
                    .insert(call.as_cst().clone(), Resolution::Construct { sym });
                member.sig.result.clone()
            }
            None => {
                self.error(
                    format!(
                        "no constructor on `{type_name}` matching ({})",
                        type_list(args)
                    ),
                    range,
                );
                TypeRep::any()
            }
        }
    }

    fn check_binary(&mut self, binary: &BinaryExpr) -> TypeRep {
        let range = binary.as_cst().text_range();
        let Some(op_token) = binary.op_token() else {
            return TypeRep::any();
        };
        let op = op_token.text().to_owned();
        let lhs = binary.lhs().map(|e| self.check(&e));
        let rhs = binary.rhs().map(|e| self.check(&e));
        let (Some(lhs), Some(rhs)) = (lhs, rhs) else {
            return TypeRep::any();
        };

        // Short-circuit operators compile to jumps but are still validated
        // as accesses of the Bool members.
        if op == "&&" || op == "||" {
            for operand in [&lhs, &rhs] {
                if !operand.is_any() && *operand != TypeRep::bool() {
                    self.error(
                        format!("expected Bool operands for `{op}`, got `{operand}`"),
                        range,
                    );
                }
            }
            if let Some(hit) = self.registry.resolve_call(&TypeRep::bool(), &op, &[TypeRep::bool()])
            {
                let candidate = self.candidate_of(&hit, &TypeRep::bool(), CandidateKind::Instance);
                self.check_candidate(&candidate, op_token.text_range());
            }
            return TypeRep::bool();
        }

        if lhs.is_any() {
            return TypeRep::any();
        }
        match self.registry.resolve_call(&lhs, &op, &[rhs.clone()]) {
            Some(hit) => {
                let (sym, conv, result) =
                    self.record_member(&hit, &lhs, CandidateKind::Instance, op_token.text_range());
                self.resolutions
                    .insert(binary.as_cst().clone(), Resolution::Method { sym, conv });
                result
            }
            None => {
                self.error(
                    format!("no operator `{op}` on `{lhs}` for `{rhs}`"),
                    op_token.text_range(),
                );
                TypeRep::any()
            }
        }
    }

    fn check_unary(&mut self, unary: &UnaryExpr) -> TypeRep {
        let Some(op_token) = unary.op_token() else {
            return TypeRep::any();
        };
        let member = if op_token.text() == "-" { "neg" } else { "not" };
        let Some(operand) = unary.operand() else {
            return TypeRep::any();
        };
        let qt = self.check(&operand);
        if qt.is_any() {
            return TypeRep::any();
        }
        match self.registry.resolve_call(&qt, member, &[]) {
            Some(hit) => {
                let (sym, conv, result) = self.record_member(
                    &hit,
                    &qt,
                    CandidateKind::Instance,
                    op_token.text_range(),
                );
                self.resolutions
                    .insert(unary.as_cst().clone(), Resolution::Method { sym, conv });
                result
            }
            None => {
                self.error(
                    format!("no operator `{}` on `{qt}`", op_token.text()),
                    op_token.text_range(),
                );
                TypeRep::any()
            }
        }
    }

    fn check_concat(&mut self, concat: &ConcatExpr) -> TypeRep {
        // Language-level display concatenation: any operand types, no
        // host symbol involved.
        if let Some(lhs) = concat.lhs() {
            self.check(&lhs);
        }
        if let Some(rhs) = concat.rhs() {
            self.check(&rhs);
        }
        TypeRep::str()
    }

    fn check_if(&mut self, node: &IfExpr) -> TypeRep {
        if let Some(cond) = node.cond() {
            let cond_type = self.check(&cond);
            if !cond_type.is_any() && cond_type != TypeRep::bool() {
                self.error(
                    format!("condition must be Bool, got `{cond_type}`"),
                    cond.as_cst().text_range(),
                );
            }
        }
        let then_type = node.then_branch().map(|e| self.check(&e));
        let else_type = node.else_branch().map(|e| self.check(&e));
        match (then_type, else_type) {
            (Some(a), Some(b)) => self.registry.lub(&a, &b),
            (Some(a), None) | (None, Some(a)) => a,
            (None, None) => TypeRep::any(),
        }
    }

    fn check_block(&mut self, block: &BlockExpr) -> TypeRep {
        let mut last = TypeRep::unit();
        for expr in block.exprs() {
            last = self.check(&expr);
        }
        last
    }

    fn check_ascribe(&mut self, node: &AscribeExpr) -> TypeRep {
        let target = node.ty().and_then(|ty| {
            let text = ty.text();
            match TypeRep::parse(&text) {
                Ok(rep) => Some(rep),
                Err(_) => {
                    self.error(
                        format!("invalid type `{}`", text.trim()),
                        ty.as_cst().text_range(),
                    );
                    None
                }
            }
        });
        let expr_type = node.expr().map(|e| self.check(&e));
        let (Some(target), Some(expr_type)) = (target, expr_type) else {
            return TypeRep::any();
        };

        if expr_type.is_any() || self.registry.is_subtype(&expr_type, &target) {
            return target;
        }

        if let Some(conv) = self.registry.conversion_to(&expr_type, &target) {
            let sym = self.record_conversion_use(conv, node.as_cst().text_range());
            self.resolutions
                .insert(node.as_cst().clone(), Resolution::Convert { sym });
            return target;
        }

        self.error(
            format!("type mismatch: `{expr_type}` is not `{target}`"),
            node.as_cst().text_range(),
        );
        target
    }

    /// Adapt an expression of type `from` to `to` at the unit boundary
    /// (declared result type). Returns the conversion symbol when one is
    /// needed.
    pub fn adapt_result(
        &mut self,
        from: &TypeRep,
        to: &TypeRep,
        range: TextRange,
    ) -> Option<u16> {
        if from.is_any() || self.registry.is_subtype(from, to) {
            return None;
        }
        if let Some(conv) = self.registry.conversion_to(from, to) {
            return Some(self.record_conversion_use(conv, range));
        }
        self.error(
            format!("expression type `{from}` does not conform to result type `{to}`"),
            range,
        );
        None
    }

    fn candidate_of(
        &self,
        hit: &MemberHit<'_>,
        qualifier: &TypeRep,
        kind: CandidateKind,
    ) -> AccessCandidate {
        AccessCandidate {
            qualifier: qualifier.clone(),
            declaring: hit.member.sig.declaring.clone(),
            name: hit.member.sig.name.clone(),
            params: hit
                .member
                .sig
                .params
                .as_ref()
                .map(|ps| ps.iter().map(|p| p.ty.clone()).collect()),
            kind,
            via_conversion: hit.conversion.map(Conversion::fq),
        }
    }

    fn check_candidate(&mut self, candidate: &AccessCandidate, range: TextRange) {
        if self.trusted {
            return;
        }
        if !self.acl.allows(candidate, self.registry) {
            self.error(
                format!(
                    "member `{}` is not allowed on `{}`",
                    candidate.fq(),
                    candidate.qualifier
                ),
                range,
            );
        }
    }

    /// ACL-check a resolved member and intern its symbols. Returns the
    /// member symbol, the conversion symbol if the access goes through
    /// one, and the member's result type.
    fn record_member(
        &mut self,
        hit: &MemberHit<'_>,
        qualifier: &TypeRep,
        kind: CandidateKind,
        range: TextRange,
    ) -> (u16, Option<u16>, TypeRep) {
        let candidate = self.candidate_of(hit, qualifier, kind);
        self.check_candidate(&candidate, range);

        let sym = self.symbols.intern(SignatureRecord::new(
            hit.member.sig.fq(),
            hit.member.sig.typed(),
            TypeRegistry::erased_sig(hit.member),
        ));
        let conv = hit.conversion.map(|conv| {
            self.symbols.intern(SignatureRecord::new(
                conv.fq(),
                conv.sig.typed(),
                self.registry.erased_for_conversion(conv),
            ))
        });
        (sym, conv, hit.member.sig.result.clone())
    }

    /// ACL-check and intern a conversion applied directly (ascription or
    /// result adaptation).
    fn record_conversion_use(&mut self, conv: &Conversion, range: TextRange) -> u16 {
        self.check_conversion_candidate(conv, range);
        self.symbols.intern(SignatureRecord::new(
            conv.fq(),
            conv.sig.typed(),
            self.registry.erased_for_conversion(conv),
        ))
    }

    fn no_member_error(
        &mut self,
        qualifier: &TypeRep,
        name: &str,
        args: &[TypeRep],
        range: TextRange,
    ) {
        if self.registry.has_member_named(qualifier, name) {
            self.error(
                format!(
                    "no member `{name}` on `{qualifier}` matching ({})",
                    type_list(args)
                ),
                range,
            );
        } else {
            self.error(format!("no member `{name}` on type `{qualifier}`"), range);
        }
    }

    fn check_conversion_candidate(&mut self, conv: &Conversion, range: TextRange) {
        if self.trusted {
            return;
        }
        let candidate = AccessCandidate {
            qualifier: TypeRep::named(conv.sig.declaring.clone()),
            declaring: conv.sig.declaring.clone(),
            name: conv.sig.name.clone(),
            params: conv
                .sig
                .params
                .as_ref()
                .map(|ps| ps.iter().map(|p| p.ty.clone()).collect()),
            kind: CandidateKind::Static,
            via_conversion: None,
        };
        if !self.acl.allows(&candidate, self.registry) {
            self.error(
                format!(
                    "member `{}` is not allowed on `{}`",
                    candidate.fq(),
                    candidate.qualifier
                ),
                range,
            );
        }
    }
}

fn type_list(types: &[TypeRep]) -> String {
    types
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
