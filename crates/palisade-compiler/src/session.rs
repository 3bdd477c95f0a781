//! The compile session: one request end to end.
//!
//! A session owns the per-profile compiled-utilities cache and drives the
//! pipeline: assemble, parse, syntax-validate, type (with access control),
//! lower, emit. Sessions are single-threaded state; the embedding layer
//! serializes access behind a lock.

use std::collections::HashMap;
use std::sync::Arc;

use indexmap::IndexMap;
use rowan::TextSize;

use palisade_bytecode::{Binding, Const, Module};
use palisade_core::profile::{ExpressionProfile, ProfileId};
use palisade_core::registry::TypeRegistry;
use palisade_core::types::TypeRep;

use crate::analyze::typer::{Resolution, Resolutions, Typer};
use crate::analyze::{validate_syntax, SymbolTable};
use crate::assemble::{assemble, AssembledSource};
use crate::diagnostics::{DiagnosticReport, Diagnostics, ErrorEntry};
use crate::emit::{ConstPool, Lowerer};
use crate::parser::ast::Expr;
use crate::parser::{parse, parse_defs, Root};
use crate::template::PosMap;
use crate::{CompileError, Result};

/// One compile/analyze request. `expression` is already preprocessed;
/// `original` and `pos_map` only serve diagnostic remapping.
#[derive(Debug, Clone, Copy)]
pub struct ExprRequest<'a> {
    pub profile: &'a ExpressionProfile,
    pub expression: &'a str,
    pub setter: bool,
    pub context_type: &'a str,
    pub result_type: &'a str,
    pub variable_types: &'a IndexMap<String, String>,
    pub unit_name: &'a str,
    pub original: &'a str,
    pub pos_map: &'a PosMap,
}

/// A profile's utilities, compiled once per profile identity.
#[derive(Debug)]
pub struct CompiledPrelude {
    pub consts: Vec<Const>,
    pub symbols: SymbolTable,
    pub bindings: Vec<Binding>,
    pub bind_types: IndexMap<String, TypeRep>,
}

/// The parsed-and-typed view of a unit, for the completer.
#[derive(Debug)]
pub struct AnalyzedUnit {
    pub text: String,
    pub expr_offset: u32,
    pub root: Root,
    pub diagnostics: Diagnostics,
    pub ctx_type: TypeRep,
    pub vars: IndexMap<String, TypeRep>,
    /// Prelude and header binding types, in slot order.
    pub binds: IndexMap<String, TypeRep>,
}

pub struct CompileSession {
    registry: Arc<TypeRegistry>,
    preludes: HashMap<ProfileId, Arc<CompiledPrelude>>,
}

impl CompileSession {
    pub fn new(registry: Arc<TypeRegistry>) -> Self {
        Self {
            registry,
            preludes: HashMap::new(),
        }
    }

    pub fn registry(&self) -> &Arc<TypeRegistry> {
        &self.registry
    }

    /// Compile one request into a bytecode module.
    pub fn compile(&mut self, req: &ExprRequest<'_>) -> Result<Module> {
        let ctx_type = parse_type(req.context_type)?;
        let result_type = parse_type(req.result_type)?;
        let vars = parse_var_types(req.variable_types)?;
        let prelude = self.prelude(req.profile)?;

        let assembled = assemble(req.profile.header(), req.expression);
        let parsed = parse(&assembled.text);
        let root = parsed.root;
        let mut diag = parsed.diagnostics;

        validate_syntax(
            root.as_cst(),
            req.profile.syntax(),
            TextSize::from(assembled.expr_offset),
            &mut diag,
        );

        let mut symbols = prelude.symbols.clone();
        let mut resolutions = Resolutions::new();
        let mut binds = prelude.bind_types.clone();

        // Bindings: header lets are trusted; lets in the user region (when
        // the policy permits them) are validated like any user code.
        let mut header_bindings: Vec<(String, TypeRep, Expr)> = Vec::new();
        for let_def in root.lets() {
            let in_header = assembled.expr_offset > 0
                && let_def.as_cst().text_range().start() < TextSize::from(assembled.expr_offset);
            let Some(name_token) = let_def.name_token() else {
                continue;
            };
            let name = name_token.text().to_owned();
            let Some(body) = let_def.body() else {
                continue;
            };
            let ty = Typer {
                registry: &self.registry,
                acl: req.profile.acl(),
                ctx_type: Some(&ctx_type),
                vars: &vars,
                binds: &binds,
                symbols: &mut symbols,
                resolutions: &mut resolutions,
                diag: &mut diag,
                trusted: in_header,
            }
            .check(&body);
            if binds.contains_key(&name) {
                diag.error(
                    format!("duplicate definition `{name}`"),
                    name_token.text_range(),
                )
                .emit();
                continue;
            }
            binds.insert(name.clone(), ty.clone());
            header_bindings.push((name, ty, body));
        }

        // The user expression.
        let user_expr = root.expr();
        let mut result_conv = None;
        if let Some(expr) = &user_expr {
            {
                let mut typer = Typer {
                    registry: &self.registry,
                    acl: req.profile.acl(),
                    ctx_type: Some(&ctx_type),
                    vars: &vars,
                    binds: &binds,
                    symbols: &mut symbols,
                    resolutions: &mut resolutions,
                    diag: &mut diag,
                    trusted: false,
                };
                let expr_type = typer.check(expr);
                if !req.setter {
                    result_conv = typer.adapt_result(
                        &expr_type,
                        &result_type,
                        expr.as_cst().text_range(),
                    );
                }
            }
            if req.setter {
                check_setter_target(expr, &resolutions, &result_type, &self.registry, &mut diag);
            }
        }

        if diag.has_errors() {
            return Err(CompileError::Rejected(build_report(
                req, &assembled, &diag,
            )));
        }

        // Lowering.
        let mut consts = ConstPool::resume(prelude.consts.clone());
        let mut bindings = prelude.bindings.clone();
        for (name, ty, body) in &header_bindings {
            let code = Lowerer::new(&resolutions, &mut consts)
                .lower(body)
                .map_err(internal)?;
            bindings.push(Binding {
                name: name.clone(),
                ty: ty.to_string(),
                code,
            });
        }

        let expr = user_expr.ok_or_else(|| internal_msg("unit without an expression"))?;
        let code = if req.setter {
            let Expr::Select(select) = &expr else {
                return Err(internal_msg("setter target validated as non-select"));
            };
            Lowerer::new(&resolutions, &mut consts)
                .lower_setter(select)
                .map_err(internal)?
        } else {
            Lowerer::new(&resolutions, &mut consts)
                .lower_with(&expr, result_conv)
                .map_err(internal)?
        };

        Ok(Module {
            unit_name: req.unit_name.to_owned(),
            context_type: ctx_type.to_string(),
            result_type: result_type.to_string(),
            setter: req.setter,
            vars: vars.keys().cloned().collect(),
            consts: consts.into_vec(),
            symbols: symbols.into_records(),
            bindings,
            code,
        })
    }

    /// Parse and type a unit without emitting, for completer queries.
    pub fn analyze(&mut self, req: &ExprRequest<'_>) -> Result<AnalyzedUnit> {
        let ctx_type = parse_type(req.context_type)?;
        let result_type = parse_type(req.result_type)?;
        let vars = parse_var_types(req.variable_types)?;
        let prelude = self.prelude(req.profile)?;

        let assembled = assemble(req.profile.header(), req.expression);
        let parsed = parse(&assembled.text);
        let root = parsed.root;
        let mut diag = parsed.diagnostics;

        validate_syntax(
            root.as_cst(),
            req.profile.syntax(),
            TextSize::from(assembled.expr_offset),
            &mut diag,
        );

        let mut symbols = prelude.symbols.clone();
        let mut resolutions = Resolutions::new();
        let mut binds = prelude.bind_types.clone();

        for let_def in root.lets() {
            let in_header = assembled.expr_offset > 0
                && let_def.as_cst().text_range().start() < TextSize::from(assembled.expr_offset);
            let (Some(name_token), Some(body)) = (let_def.name_token(), let_def.body()) else {
                continue;
            };
            let ty = Typer {
                registry: &self.registry,
                acl: req.profile.acl(),
                ctx_type: Some(&ctx_type),
                vars: &vars,
                binds: &binds,
                symbols: &mut symbols,
                resolutions: &mut resolutions,
                diag: &mut diag,
                trusted: in_header,
            }
            .check(&body);
            binds.insert(name_token.text().to_owned(), ty);
        }

        if let Some(expr) = root.expr() {
            let mut typer = Typer {
                registry: &self.registry,
                acl: req.profile.acl(),
                ctx_type: Some(&ctx_type),
                vars: &vars,
                binds: &binds,
                symbols: &mut symbols,
                resolutions: &mut resolutions,
                diag: &mut diag,
                trusted: false,
            };
            let expr_type = typer.check(&expr);
            if !req.setter {
                typer.adapt_result(&expr_type, &result_type, expr.as_cst().text_range());
            }
        }

        Ok(AnalyzedUnit {
            text: assembled.text,
            expr_offset: assembled.expr_offset,
            root,
            diagnostics: diag,
            ctx_type,
            vars,
            binds,
        })
    }

    /// Type an arbitrary sub-expression of an analyzed unit, without ACL
    /// noise. Pure type recovery for the completer's qualifier math.
    pub fn type_sub_expr(&self, unit: &AnalyzedUnit, expr: &Expr) -> TypeRep {
        let mut symbols = SymbolTable::new();
        let mut resolutions = Resolutions::new();
        let mut diag = Diagnostics::new();
        Typer {
            registry: &self.registry,
            acl: unit_acl(),
            ctx_type: Some(&unit.ctx_type),
            vars: &unit.vars,
            binds: &unit.binds,
            symbols: &mut symbols,
            resolutions: &mut resolutions,
            diag: &mut diag,
            trusted: true,
        }
        .check(expr)
    }

    /// Remap a unit's diagnostics onto the original expression text.
    pub fn report_for(&self, req: &ExprRequest<'_>, unit: &AnalyzedUnit) -> DiagnosticReport {
        let assembled = AssembledSource {
            text: unit.text.clone(),
            expr_offset: unit.expr_offset,
        };
        build_report(req, &assembled, &unit.diagnostics)
    }

    /// The compiled utilities of a profile, built at most once per profile
    /// identity per session.
    pub fn prelude(&mut self, profile: &ExpressionProfile) -> Result<Arc<CompiledPrelude>> {
        if let Some(prelude) = self.preludes.get(&profile.id()) {
            return Ok(prelude.clone());
        }

        let prelude = Arc::new(self.build_prelude(profile)?);
        self.preludes.insert(profile.id(), prelude.clone());
        Ok(prelude)
    }

    fn build_prelude(&mut self, profile: &ExpressionProfile) -> Result<CompiledPrelude> {
        let text = profile.utilities();
        let mut consts = ConstPool::new();
        let mut symbols = SymbolTable::new();
        let mut bindings = Vec::new();
        let mut bind_types: IndexMap<String, TypeRep> = IndexMap::new();

        if text.trim().is_empty() {
            return Ok(CompiledPrelude {
                consts: consts.into_vec(),
                symbols,
                bindings,
                bind_types,
            });
        }

        let parsed = parse_defs(text);
        let mut diag = parsed.diagnostics;
        let mut resolutions = Resolutions::new();
        let empty_vars = IndexMap::new();

        if let Some(stray) = parsed.root.expr() {
            diag.error(
                "a utilities block may only contain definitions",
                stray.as_cst().text_range(),
            )
            .emit();
        }

        let mut typed: Vec<(String, TypeRep, Expr)> = Vec::new();
        for let_def in parsed.root.lets() {
            let (Some(name_token), Some(body)) = (let_def.name_token(), let_def.body()) else {
                continue;
            };
            let name = name_token.text().to_owned();
            // Utilities are context-independent: no context in scope.
            let ty = Typer {
                registry: &self.registry,
                acl: profile.acl(),
                ctx_type: None,
                vars: &empty_vars,
                binds: &bind_types,
                symbols: &mut symbols,
                resolutions: &mut resolutions,
                diag: &mut diag,
                trusted: true,
            }
            .check(&body);
            if bind_types.contains_key(&name) {
                diag.error(
                    format!("duplicate definition `{name}`"),
                    name_token.text_range(),
                )
                .emit();
                continue;
            }
            bind_types.insert(name.clone(), ty.clone());
            typed.push((name, ty, body));
        }

        if diag.has_errors() {
            let entries = diag
                .iter()
                .filter(|d| d.is_error())
                .map(|d| {
                    ErrorEntry::at_offset(text, u32::from(d.range.start()) as usize, d.message.as_str())
                })
                .collect();
            return Err(CompileError::Rejected(DiagnosticReport { entries }));
        }

        for (name, ty, body) in &typed {
            let code = Lowerer::new(&resolutions, &mut consts)
                .lower(body)
                .map_err(internal)?;
            bindings.push(Binding {
                name: name.clone(),
                ty: ty.to_string(),
                code,
            });
        }

        Ok(CompiledPrelude {
            consts: consts.into_vec(),
            symbols,
            bindings,
            bind_types,
        })
    }
}

fn parse_type(text: &str) -> Result<TypeRep> {
    TypeRep::parse(text).map_err(|source| CompileError::InvalidTypeRep {
        text: text.to_owned(),
        source,
    })
}

fn parse_var_types(vars: &IndexMap<String, String>) -> Result<IndexMap<String, TypeRep>> {
    let mut out = IndexMap::with_capacity(vars.len());
    for (name, text) in vars {
        out.insert(name.clone(), parse_type(text)?);
    }
    Ok(out)
}

fn check_setter_target(
    expr: &Expr,
    resolutions: &Resolutions,
    value_type: &TypeRep,
    registry: &TypeRegistry,
    diag: &mut Diagnostics,
) {
    let range = expr.as_cst().text_range();
    let Expr::Select(select) = expr else {
        diag.error("expression is not assignable", range).emit();
        return;
    };
    match resolutions.get(select.as_cst()) {
        Some(Resolution::Field {
            conv: None,
            settable: true,
            ty,
            ..
        }) => {
            if !value_type.is_any() && !registry.is_subtype(value_type, ty) {
                diag.error(
                    format!("value of type `{value_type}` cannot be assigned to a field of type `{ty}`"),
                    range,
                )
                .emit();
            }
        }
        Some(Resolution::Field { conv: Some(_), .. }) => {
            diag.error("cannot assign through a conversion", range).emit();
        }
        Some(Resolution::Field { .. }) => {
            diag.error("field is not assignable", range).emit();
        }
        Some(_) | None => {
            diag.error("expression is not assignable", range).emit();
        }
    }
}

fn build_report(
    req: &ExprRequest<'_>,
    assembled: &AssembledSource,
    diag: &Diagnostics,
) -> DiagnosticReport {
    let mut entries = Vec::new();
    for d in diag.iter().filter(|d| d.is_error()) {
        let offset = u32::from(d.range.start());
        let entry = if offset >= assembled.expr_offset {
            let processed = offset - assembled.expr_offset;
            let original = req.pos_map.to_original(processed);
            ErrorEntry::at_offset(req.original, original as usize, d.message.as_str())
        } else {
            // Header diagnostics report against the header region.
            let header = &assembled.text[..assembled.expr_offset as usize];
            ErrorEntry::at_offset(header, offset as usize, d.message.as_str())
        };
        entries.push(entry);
    }
    DiagnosticReport { entries }
}

fn internal(err: crate::emit::LowerError) -> CompileError {
    CompileError::Internal(err.to_string())
}

fn internal_msg(msg: &str) -> CompileError {
    CompileError::Internal(msg.to_owned())
}

fn unit_acl() -> &'static palisade_core::acl::Acl {
    use std::sync::OnceLock;
    static EMPTY: OnceLock<palisade_core::acl::Acl> = OnceLock::new();
    EMPTY.get_or_init(palisade_core::acl::Acl::default)
}
