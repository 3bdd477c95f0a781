//! The host type registry.
//!
//! The registry is the universe expressions are checked against: every
//! nominal type, its members (with both the printed *typed* signature and the
//! runtime *erased* signature), registered conversions, and the native
//! implementations the VM dispatches to. Hosts build it once at startup and
//! share it behind an `Arc`.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::types::TypeRep;
use crate::value::{EvalError, Value};

/// A native member implementation. Receiver first for instance members.
pub type NativeFn = Arc<dyn Fn(&[Value]) -> Result<Value, EvalError> + Send + Sync>;

/// How a member executes at runtime.
#[derive(Clone)]
pub enum MemberImpl {
    Native(NativeFn),
    /// Read/write through [`crate::value::HostObject`] by field name.
    ObjectField,
}

impl fmt::Debug for MemberImpl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MemberImpl::Native(_) => f.write_str("Native(..)"),
            MemberImpl::ObjectField => f.write_str("ObjectField"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberKind {
    Field,
    Method,
    Static,
    Constructor,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamSig {
    pub name: String,
    pub ty: TypeRep,
}

/// The printed identity of a member: declaring type, name, parameters,
/// result. `params` is `None` for fields and `Some(vec![])` for zero-arg
/// methods - selects resolve to either.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberSig {
    pub declaring: String,
    pub name: String,
    pub params: Option<Vec<ParamSig>>,
    pub result: TypeRep,
}

impl MemberSig {
    pub fn fq(&self) -> String {
        format!("{}.{}", self.declaring, self.name)
    }

    /// Typed signature: `Str.char_at(Int): Str`, fields `User.name: Str`.
    pub fn typed(&self) -> String {
        match &self.params {
            Some(params) => {
                let args = params
                    .iter()
                    .map(|p| p.ty.to_string())
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("{}.{}({}): {}", self.declaring, self.name, args, self.result)
            }
            None => format!("{}.{}: {}", self.declaring, self.name, self.result),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Member {
    pub sig: MemberSig,
    pub kind: MemberKind,
    pub settable: bool,
    imp: MemberImpl,
}

impl Member {
    pub fn implementation(&self) -> &MemberImpl {
        &self.imp
    }

    pub fn param_types(&self) -> Vec<TypeRep> {
        self.sig
            .params
            .iter()
            .flatten()
            .map(|p| p.ty.clone())
            .collect()
    }
}

/// A registered view from one type to another, applied implicitly during
/// member resolution when the source type lacks the member.
#[derive(Clone)]
pub struct Conversion {
    pub sig: MemberSig,
    pub from: TypeRep,
    pub to: TypeRep,
    imp: NativeFn,
}

impl Conversion {
    pub fn fq(&self) -> String {
        self.sig.fq()
    }

    pub fn implementation(&self) -> &NativeFn {
        &self.imp
    }
}

impl fmt::Debug for Conversion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Conversion")
            .field("fq", &self.sig.fq())
            .field("from", &self.from)
            .field("to", &self.to)
            .finish()
    }
}

/// One nominal type: members, statics, constructors, supertypes.
///
/// `module` marks static-namespace singletons (`math.abs(..)`) whose bare
/// name only resolves when the active ACL references one of its statics.
#[derive(Debug)]
pub struct TypeDef {
    name: String,
    supertypes: Vec<String>,
    module: bool,
    members: IndexMap<String, Vec<Member>>,
    statics: IndexMap<String, Vec<Member>>,
    constructors: Vec<Member>,
}

impl TypeDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            supertypes: Vec::new(),
            module: false,
            members: IndexMap::new(),
            statics: IndexMap::new(),
            constructors: Vec::new(),
        }
    }

    /// A static-namespace singleton.
    pub fn module(name: impl Into<String>) -> Self {
        let mut def = Self::new(name);
        def.module = true;
        def
    }

    pub fn with_supertype(mut self, name: impl Into<String>) -> Self {
        self.supertypes.push(name.into());
        self
    }

    /// An object field, read and written through `HostObject`.
    pub fn field(mut self, name: &str, ty: TypeRep) -> Self {
        let member = Member {
            sig: MemberSig {
                declaring: self.name.clone(),
                name: name.to_owned(),
                params: None,
                result: ty,
            },
            kind: MemberKind::Field,
            settable: true,
            imp: MemberImpl::ObjectField,
        };
        self.members.entry(name.to_owned()).or_default().push(member);
        self
    }

    pub fn method<F>(
        mut self,
        name: &str,
        params: &[(&str, TypeRep)],
        result: TypeRep,
        f: F,
    ) -> Self
    where
        F: Fn(&[Value]) -> Result<Value, EvalError> + Send + Sync + 'static,
    {
        let member = self.make_member(name, params, result, MemberKind::Method, Arc::new(f));
        self.members.entry(name.to_owned()).or_default().push(member);
        self
    }

    pub fn static_method<F>(
        mut self,
        name: &str,
        params: &[(&str, TypeRep)],
        result: TypeRep,
        f: F,
    ) -> Self
    where
        F: Fn(&[Value]) -> Result<Value, EvalError> + Send + Sync + 'static,
    {
        let mut member = self.make_member(name, params, result, MemberKind::Static, Arc::new(f));
        member.kind = MemberKind::Static;
        self.statics.entry(name.to_owned()).or_default().push(member);
        self
    }

    /// A static constant, exposed as a parameterless static.
    pub fn static_value(mut self, name: &str, ty: TypeRep, value: Value) -> Self {
        let member = Member {
            sig: MemberSig {
                declaring: self.name.clone(),
                name: name.to_owned(),
                params: None,
                result: ty,
            },
            kind: MemberKind::Static,
            settable: false,
            imp: MemberImpl::Native(Arc::new(move |_| Ok(value.clone()))),
        };
        self.statics.entry(name.to_owned()).or_default().push(member);
        self
    }

    pub fn constructor<F>(mut self, params: &[(&str, TypeRep)], f: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Value, EvalError> + Send + Sync + 'static,
    {
        let result = TypeRep::named(self.name.clone());
        let mut member = self.make_member("new", params, result, MemberKind::Constructor, Arc::new(f));
        member.kind = MemberKind::Constructor;
        self.constructors.push(member);
        self
    }

    fn make_member(
        &self,
        name: &str,
        params: &[(&str, TypeRep)],
        result: TypeRep,
        kind: MemberKind,
        f: NativeFn,
    ) -> Member {
        Member {
            sig: MemberSig {
                declaring: self.name.clone(),
                name: name.to_owned(),
                params: Some(
                    params
                        .iter()
                        .map(|(n, t)| ParamSig {
                            name: (*n).to_owned(),
                            ty: t.clone(),
                        })
                        .collect(),
                ),
                result,
            },
            kind,
            settable: false,
            imp: MemberImpl::Native(f),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_module(&self) -> bool {
        self.module
    }
}

/// A member resolution: the member plus the conversion it was reached
/// through, if any.
#[derive(Debug, Clone)]
pub struct MemberHit<'r> {
    pub member: &'r Member,
    pub conversion: Option<&'r Conversion>,
}

#[derive(Debug, Default)]
pub struct TypeRegistry {
    types: IndexMap<String, TypeDef>,
    conversions: Vec<Conversion>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry pre-populated with `Any`, `Int`, `Float`, `Bool`, `Str`
    /// and `Unit` and their operator members.
    pub fn with_builtins() -> Self {
        let mut reg = Self::new();
        builtins::install(&mut reg);
        reg
    }

    pub fn register(&mut self, def: TypeDef) {
        self.types.insert(def.name.clone(), def);
    }

    pub fn register_conversion<F>(
        &mut self,
        declaring: &str,
        name: &str,
        from: TypeRep,
        to: TypeRep,
        f: F,
    ) where
        F: Fn(&[Value]) -> Result<Value, EvalError> + Send + Sync + 'static,
    {
        self.conversions.push(Conversion {
            sig: MemberSig {
                declaring: declaring.to_owned(),
                name: name.to_owned(),
                params: Some(vec![ParamSig {
                    name: "value".to_owned(),
                    ty: from.clone(),
                }]),
                result: to.clone(),
            },
            from,
            to,
            imp: Arc::new(f),
        });
    }

    pub fn type_def(&self, name: &str) -> Option<&TypeDef> {
        self.types.get(name)
    }

    pub fn is_module(&self, name: &str) -> bool {
        self.types.get(name).is_some_and(TypeDef::is_module)
    }

    pub fn is_type(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    /// Base-name supertype closure, nearest first, starting at `base`.
    /// `Any` is the implicit top of every chain.
    fn closure<'a>(&'a self, base: &'a str) -> Vec<&'a str> {
        let mut out: Vec<&str> = Vec::new();
        let mut queue: Vec<&str> = vec![base];
        while let Some(name) = queue.pop() {
            if out.contains(&name) {
                continue;
            }
            out.push(name);
            if let Some(def) = self.types.get(name) {
                for sup in &def.supertypes {
                    queue.push(sup);
                }
            }
        }
        if !out.contains(&"Any") {
            out.push("Any");
        }
        out
    }

    /// Subtype check with pattern openness: `Any` is top; a pattern without
    /// type arguments matches any instantiation of its base; pattern
    /// arguments match invariantly unless the pattern argument is `Any`.
    pub fn is_subtype(&self, sub: &TypeRep, sup: &TypeRep) -> bool {
        if sup.is_any() {
            return true;
        }
        if sub.name == sup.name {
            return sup.args.is_empty()
                || (sub.args.len() == sup.args.len()
                    && sub
                        .args
                        .iter()
                        .zip(&sup.args)
                        .all(|(a, b)| b.is_any() || a == b));
        }
        self.closure(&sub.name).contains(&sup.name.as_str())
            && (sup.args.is_empty() || sup.args.iter().all(TypeRep::is_any))
    }

    /// Least upper bound used by `if` branches. Falls back to `Any`.
    pub fn lub(&self, a: &TypeRep, b: &TypeRep) -> TypeRep {
        if self.is_subtype(a, b) {
            return b.clone();
        }
        if self.is_subtype(b, a) {
            return a.clone();
        }
        for sup in self.closure(&a.name) {
            let sup_rep = TypeRep::named(sup.to_owned());
            if self.is_subtype(b, &sup_rep) {
                return sup_rep;
            }
        }
        TypeRep::any()
    }

    /// Resolve a parameterless access: a field or a zero-arg method, on the
    /// qualifier's type chain first, then through conversions.
    pub fn resolve_select(&self, qualifier: &TypeRep, name: &str) -> Option<MemberHit<'_>> {
        if let Some(member) = self.select_on_chain(&qualifier.name, name) {
            return Some(MemberHit {
                member,
                conversion: None,
            });
        }
        for conv in self.conversions_from(qualifier) {
            if let Some(member) = self.select_on_chain(&conv.to.name, name) {
                return Some(MemberHit {
                    member,
                    conversion: Some(conv),
                });
            }
        }
        None
    }

    fn select_on_chain(&self, base: &str, name: &str) -> Option<&Member> {
        for ty in self.closure(base) {
            let Some(def) = self.types.get(ty) else {
                continue;
            };
            if let Some(overloads) = def.members.get(name) {
                if let Some(m) = overloads
                    .iter()
                    .find(|m| m.sig.params.as_ref().is_none_or(Vec::is_empty))
                {
                    return Some(m);
                }
            }
        }
        None
    }

    /// Resolve a call: the first overload along the chain whose parameter
    /// list matches the argument types, then through conversions.
    pub fn resolve_call(
        &self,
        qualifier: &TypeRep,
        name: &str,
        args: &[TypeRep],
    ) -> Option<MemberHit<'_>> {
        if let Some(member) = self.call_on_chain(&qualifier.name, name, args) {
            return Some(MemberHit {
                member,
                conversion: None,
            });
        }
        for conv in self.conversions_from(qualifier) {
            if let Some(member) = self.call_on_chain(&conv.to.name, name, args) {
                return Some(MemberHit {
                    member,
                    conversion: Some(conv),
                });
            }
        }
        None
    }

    fn call_on_chain(&self, base: &str, name: &str, args: &[TypeRep]) -> Option<&Member> {
        for ty in self.closure(base) {
            let Some(def) = self.types.get(ty) else {
                continue;
            };
            if let Some(overloads) = def.members.get(name) {
                if let Some(m) = overloads.iter().find(|m| self.params_accept(m, args)) {
                    return Some(m);
                }
            }
        }
        None
    }

    fn params_accept(&self, member: &Member, args: &[TypeRep]) -> bool {
        let Some(params) = &member.sig.params else {
            return false;
        };
        params.len() == args.len()
            && args
                .iter()
                .zip(params)
                .all(|(a, p)| self.is_subtype(a, &p.ty))
    }

    pub fn resolve_static(
        &self,
        type_name: &str,
        name: &str,
        args: Option<&[TypeRep]>,
    ) -> Option<&Member> {
        let def = self.types.get(type_name)?;
        let overloads = def.statics.get(name)?;
        match args {
            None => overloads
                .iter()
                .find(|m| m.sig.params.as_ref().is_none_or(Vec::is_empty)),
            Some(args) => overloads.iter().find(|m| self.params_accept(m, args)),
        }
    }

    pub fn resolve_constructor(&self, type_name: &str, args: &[TypeRep]) -> Option<&Member> {
        let def = self.types.get(type_name)?;
        def.constructors
            .iter()
            .find(|m| self.params_accept(m, args))
    }

    /// Does any member (any overload, field or method) with this name exist
    /// on the qualifier's chain or through a conversion? For diagnostics.
    pub fn has_member_named(&self, qualifier: &TypeRep, name: &str) -> bool {
        let on_chain = |base: &str| {
            self.closure(base)
                .iter()
                .filter_map(|ty| self.types.get(*ty))
                .any(|def| def.members.contains_key(name))
        };
        on_chain(&qualifier.name)
            || self
                .conversions_from(qualifier)
                .any(|conv| on_chain(&conv.to.name))
    }

    pub fn conversions_from<'r>(&'r self, ty: &TypeRep) -> impl Iterator<Item = &'r Conversion> {
        let ty = ty.clone();
        self.conversions
            .iter()
            .filter(move |c| self.is_subtype(&ty, &c.from))
    }

    /// A conversion adapting `from` to (a subtype of) `to`, for result-type
    /// adaptation.
    pub fn conversion_to(&self, from: &TypeRep, to: &TypeRep) -> Option<&Conversion> {
        self.conversions
            .iter()
            .find(|c| self.is_subtype(from, &c.from) && self.is_subtype(&c.to, to))
    }

    /// Every instance member visible on the qualifier, nearest declaration
    /// first, plus members added by applicable conversions. Used by the
    /// completer; overridden names appear once.
    pub fn visible_members<'r>(
        &'r self,
        qualifier: &TypeRep,
    ) -> Vec<(&'r Member, Option<&'r Conversion>)> {
        let mut out: Vec<(&Member, Option<&Conversion>)> = Vec::new();
        let mut seen: Vec<(&str, usize)> = Vec::new();
        self.collect_members(&qualifier.name, None, &mut out, &mut seen);
        for conv in &self.conversions {
            if self.is_subtype(qualifier, &conv.from) {
                self.collect_members(&conv.to.name, Some(conv), &mut out, &mut seen);
            }
        }
        out
    }

    fn collect_members<'r>(
        &'r self,
        base: &str,
        conv: Option<&'r Conversion>,
        out: &mut Vec<(&'r Member, Option<&'r Conversion>)>,
        seen: &mut Vec<(&'r str, usize)>,
    ) {
        for ty in self.closure(base) {
            let Some(def) = self.types.get(ty) else {
                continue;
            };
            for overloads in def.members.values() {
                for m in overloads {
                    let arity = m.sig.params.as_ref().map_or(0, Vec::len);
                    let key = (m.sig.name.as_str(), arity);
                    if seen.contains(&key) {
                        continue;
                    }
                    seen.push(key);
                    out.push((m, conv));
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // Signatures
    // ------------------------------------------------------------------

    /// Erased-kind token of a type, as the runtime sees it.
    pub fn erased_kind(ty: &TypeRep) -> String {
        match ty.name.as_str() {
            "Int" => "i64".to_owned(),
            "Float" => "f64".to_owned(),
            "Str" => "str".to_owned(),
            "Bool" => "bool".to_owned(),
            "Unit" => "unit".to_owned(),
            "Any" => "any".to_owned(),
            other => format!("obj({other})"),
        }
    }

    /// Erased signature of a member: methods `Decl(kinds)kind`, fields
    /// `Decl.name:kind`.
    pub fn erased_sig(member: &Member) -> String {
        let sig = &member.sig;
        match &sig.params {
            Some(params) => {
                let kinds = params
                    .iter()
                    .map(|p| Self::erased_kind(&p.ty))
                    .collect::<Vec<_>>()
                    .join(",");
                format!("{}({}){}", sig.declaring, kinds, Self::erased_kind(&sig.result))
            }
            None => format!(
                "{}.{}:{}",
                sig.declaring,
                sig.name,
                Self::erased_kind(&sig.result)
            ),
        }
    }

    fn candidates_for<'r>(&'r self, fq: &str) -> Vec<&'r Member> {
        let Some((declaring, name)) = fq.rsplit_once('.') else {
            return Vec::new();
        };
        let mut out = Vec::new();
        for def in self.types.values() {
            // The declaring type itself, or a subtype carrying an override.
            if def.name != declaring && !self.closure(&def.name).contains(&declaring) {
                continue;
            }
            if let Some(overloads) = def.members.get(name) {
                out.extend(overloads.iter());
            }
            if let Some(overloads) = def.statics.get(name) {
                out.extend(overloads.iter());
            }
            if name == "new" {
                out.extend(def.constructors.iter());
            }
        }
        out
    }

    /// Does `fq` still resolve - directly or through an override - to a
    /// symbol with exactly this typed/erased signature pair?
    pub fn signature_still_valid(&self, fq: &str, typed: &str, erased: &str) -> bool {
        if let Some(def) = self.types.get(fq) {
            // Module singleton record.
            return def.is_module() && typed == fq && erased == fq;
        }
        if self
            .candidates_for(fq)
            .iter()
            .any(|m| m.sig.typed() == typed && Self::erased_sig(m) == erased)
        {
            return true;
        }
        self.conversions
            .iter()
            .any(|c| c.fq() == fq && c.sig.typed() == typed && Self::erased_sig_conv(c) == erased)
    }

    fn erased_sig_conv(conv: &Conversion) -> String {
        format!(
            "{}({}){}",
            conv.sig.declaring,
            Self::erased_kind(&conv.from),
            Self::erased_kind(&conv.to)
        )
    }

    /// Erased signature for a symbol reference recorded in an artifact.
    pub fn erased_for_conversion(&self, conv: &Conversion) -> String {
        Self::erased_sig_conv(conv)
    }

    /// The implementation behind a recorded `(fq, typed)` symbol, used at
    /// link time. `None` when the registry no longer carries the symbol.
    pub fn implementation_for(&self, fq: &str, typed: &str) -> Option<MemberImpl> {
        if let Some(m) = self
            .candidates_for(fq)
            .into_iter()
            .find(|m| m.sig.typed() == typed)
        {
            return Some(m.imp.clone());
        }
        self.conversions
            .iter()
            .find(|c| c.fq() == fq && c.sig.typed() == typed)
            .map(|c| MemberImpl::Native(c.imp.clone()))
    }
}

mod builtins {
    use super::*;

    pub(super) fn install(reg: &mut TypeRegistry) {
        reg.register(
            TypeDef::new("Any")
                .method("==", &[("other", TypeRep::any())], TypeRep::bool(), |args| {
                    Ok(Value::Bool(args[0] == args[1]))
                })
                .method("!=", &[("other", TypeRep::any())], TypeRep::bool(), |args| {
                    Ok(Value::Bool(args[0] != args[1]))
                }),
        );
        reg.register(int_def());
        reg.register(float_def());
        reg.register(bool_def());
        reg.register(str_def());
        reg.register(TypeDef::new("Unit"));
    }

    fn int_def() -> TypeDef {
        let int = TypeRep::int;
        TypeDef::new("Int")
            .method("+", &[("other", int())], int(), |a| {
                Ok(Value::Int(a[0].as_int()?.wrapping_add(a[1].as_int()?)))
            })
            .method("-", &[("other", int())], int(), |a| {
                Ok(Value::Int(a[0].as_int()?.wrapping_sub(a[1].as_int()?)))
            })
            .method("*", &[("other", int())], int(), |a| {
                Ok(Value::Int(a[0].as_int()?.wrapping_mul(a[1].as_int()?)))
            })
            .method("/", &[("other", int())], int(), |a| {
                a[0].as_int()?
                    .checked_div(a[1].as_int()?)
                    .map(Value::Int)
                    .ok_or(EvalError::DivisionByZero)
            })
            .method("%", &[("other", int())], int(), |a| {
                a[0].as_int()?
                    .checked_rem(a[1].as_int()?)
                    .map(Value::Int)
                    .ok_or(EvalError::DivisionByZero)
            })
            .method("<", &[("other", int())], TypeRep::bool(), |a| {
                Ok(Value::Bool(a[0].as_int()? < a[1].as_int()?))
            })
            .method("<=", &[("other", int())], TypeRep::bool(), |a| {
                Ok(Value::Bool(a[0].as_int()? <= a[1].as_int()?))
            })
            .method(">", &[("other", int())], TypeRep::bool(), |a| {
                Ok(Value::Bool(a[0].as_int()? > a[1].as_int()?))
            })
            .method(">=", &[("other", int())], TypeRep::bool(), |a| {
                Ok(Value::Bool(a[0].as_int()? >= a[1].as_int()?))
            })
            .method("neg", &[], int(), |a| {
                Ok(Value::Int(a[0].as_int()?.wrapping_neg()))
            })
            .method("to_float", &[], TypeRep::float(), |a| {
                Ok(Value::Float(a[0].as_int()? as f64))
            })
    }

    fn float_def() -> TypeDef {
        let float = TypeRep::float;
        TypeDef::new("Float")
            .method("+", &[("other", float())], float(), |a| {
                Ok(Value::Float(a[0].as_float()? + a[1].as_float()?))
            })
            .method("-", &[("other", float())], float(), |a| {
                Ok(Value::Float(a[0].as_float()? - a[1].as_float()?))
            })
            .method("*", &[("other", float())], float(), |a| {
                Ok(Value::Float(a[0].as_float()? * a[1].as_float()?))
            })
            .method("/", &[("other", float())], float(), |a| {
                Ok(Value::Float(a[0].as_float()? / a[1].as_float()?))
            })
            .method("<", &[("other", float())], TypeRep::bool(), |a| {
                Ok(Value::Bool(a[0].as_float()? < a[1].as_float()?))
            })
            .method("<=", &[("other", float())], TypeRep::bool(), |a| {
                Ok(Value::Bool(a[0].as_float()? <= a[1].as_float()?))
            })
            .method(">", &[("other", float())], TypeRep::bool(), |a| {
                Ok(Value::Bool(a[0].as_float()? > a[1].as_float()?))
            })
            .method(">=", &[("other", float())], TypeRep::bool(), |a| {
                Ok(Value::Bool(a[0].as_float()? >= a[1].as_float()?))
            })
            .method("neg", &[], float(), |a| Ok(Value::Float(-a[0].as_float()?)))
    }

    fn bool_def() -> TypeDef {
        let b = TypeRep::bool;
        // `&&` and `||` compile to short-circuit jumps; the natives exist so
        // the symbols carry ordinary signatures and remain linkable.
        TypeDef::new("Bool")
            .method("&&", &[("other", b())], b(), |a| {
                Ok(Value::Bool(a[0].as_bool()? && a[1].as_bool()?))
            })
            .method("||", &[("other", b())], b(), |a| {
                Ok(Value::Bool(a[0].as_bool()? || a[1].as_bool()?))
            })
            .method("not", &[], b(), |a| Ok(Value::Bool(!a[0].as_bool()?)))
    }

    fn str_def() -> TypeDef {
        let s = TypeRep::str;
        TypeDef::new("Str")
            .method("len", &[], TypeRep::int(), |a| {
                Ok(Value::Int(a[0].as_str()?.chars().count() as i64))
            })
            .method("is_empty", &[], TypeRep::bool(), |a| {
                Ok(Value::Bool(a[0].as_str()?.is_empty()))
            })
            .method("char_at", &[("index", TypeRep::int())], s(), |a| {
                let text = a[0].as_str()?;
                let index = a[1].as_int()?;
                usize::try_from(index)
                    .ok()
                    .and_then(|i| text.chars().nth(i))
                    .map(|c| Value::str(c.to_string()))
                    .ok_or(EvalError::IndexOutOfBounds {
                        index,
                        len: text.chars().count(),
                    })
            })
            .method("to_upper", &[], s(), |a| {
                Ok(Value::str(a[0].as_str()?.to_uppercase()))
            })
            .method("to_lower", &[], s(), |a| {
                Ok(Value::str(a[0].as_str()?.to_lowercase()))
            })
            .method("trim", &[], s(), |a| Ok(Value::str(a[0].as_str()?.trim())))
            .method("contains", &[("other", s())], TypeRep::bool(), |a| {
                Ok(Value::Bool(a[0].as_str()?.contains(a[1].as_str()?)))
            })
            .method("starts_with", &[("prefix", s())], TypeRep::bool(), |a| {
                Ok(Value::Bool(a[0].as_str()?.starts_with(a[1].as_str()?)))
            })
            .method("ends_with", &[("suffix", s())], TypeRep::bool(), |a| {
                Ok(Value::Bool(a[0].as_str()?.ends_with(a[1].as_str()?)))
            })
            .method(
                "substring",
                &[("start", TypeRep::int()), ("end", TypeRep::int())],
                s(),
                |a| {
                    let text = a[0].as_str()?;
                    let chars: Vec<char> = text.chars().collect();
                    let start = usize::try_from(a[1].as_int()?).ok();
                    let end = usize::try_from(a[2].as_int()?).ok();
                    match (start, end) {
                        (Some(start), Some(end)) if start <= end && end <= chars.len() => {
                            Ok(Value::str(chars[start..end].iter().collect::<String>()))
                        }
                        _ => Err(EvalError::host("invalid substring range")),
                    }
                },
            )
            .method("+", &[("other", s())], s(), |a| {
                let mut out = a[0].as_str()?.to_owned();
                out.push_str(a[1].as_str()?);
                Ok(Value::str(out))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user_registry() -> TypeRegistry {
        let mut reg = TypeRegistry::with_builtins();
        reg.register(
            TypeDef::new("Entity").method("id", &[], TypeRep::int(), |_| Ok(Value::Int(0))),
        );
        reg.register(
            TypeDef::new("User")
                .with_supertype("Entity")
                .field("name", TypeRep::str())
                .method("greet", &[("who", TypeRep::str())], TypeRep::str(), |a| {
                    Ok(Value::str(format!("hi {}", a[1].as_str()?)))
                }),
        );
        reg
    }

    #[test]
    fn subtype_chain() {
        let reg = user_registry();
        assert!(reg.is_subtype(&TypeRep::named("User"), &TypeRep::named("Entity")));
        assert!(reg.is_subtype(&TypeRep::named("User"), &TypeRep::any()));
        assert!(!reg.is_subtype(&TypeRep::named("Entity"), &TypeRep::named("User")));
    }

    #[test]
    fn subtype_with_args() {
        let reg = TypeRegistry::with_builtins();
        let vec_int = TypeRep::with_args("Vec", vec![TypeRep::int()]);
        let vec_any = TypeRep::with_args("Vec", vec![TypeRep::any()]);
        let vec_raw = TypeRep::named("Vec");
        assert!(reg.is_subtype(&vec_int, &vec_any));
        assert!(reg.is_subtype(&vec_int, &vec_raw));
        assert!(!reg.is_subtype(&vec_any, &vec_int));
    }

    #[test]
    fn select_resolves_inherited_member() {
        let reg = user_registry();
        let hit = reg
            .resolve_select(&TypeRep::named("User"), "id")
            .expect("inherited zero-arg method");
        assert_eq!(hit.member.sig.declaring, "Entity");
        assert!(hit.conversion.is_none());
    }

    #[test]
    fn call_resolves_operator_on_any() {
        let reg = TypeRegistry::with_builtins();
        let hit = reg
            .resolve_call(&TypeRep::int(), "==", &[TypeRep::int()])
            .expect("== inherited from Any");
        assert_eq!(hit.member.sig.fq(), "Any.==");
    }

    #[test]
    fn conversion_fallback() {
        let mut reg = user_registry();
        reg.register(
            TypeDef::new("RichStr").method("reversed", &[], TypeRep::str(), |a| {
                Ok(Value::str(a[0].as_str()?.chars().rev().collect::<String>()))
            }),
        );
        reg.register_conversion(
            "str_ops",
            "rich_str",
            TypeRep::str(),
            TypeRep::named("RichStr"),
            |a| Ok(a[0].clone()),
        );

        let hit = reg
            .resolve_select(&TypeRep::str(), "reversed")
            .expect("member added by conversion");
        assert_eq!(hit.member.sig.declaring, "RichStr");
        assert_eq!(hit.conversion.unwrap().fq(), "str_ops.rich_str");
    }

    #[test]
    fn typed_and_erased_signatures() {
        let reg = user_registry();
        let hit = reg
            .resolve_call(&TypeRep::named("User"), "greet", &[TypeRep::str()])
            .unwrap();
        assert_eq!(hit.member.sig.typed(), "User.greet(Str): Str");
        assert_eq!(TypeRegistry::erased_sig(hit.member), "User(str)str");

        let field = reg.resolve_select(&TypeRep::named("User"), "name").unwrap();
        assert_eq!(field.member.sig.typed(), "User.name: Str");
        assert_eq!(TypeRegistry::erased_sig(field.member), "User.name:str");
    }

    #[test]
    fn signature_validation_detects_change() {
        let reg = user_registry();
        assert!(reg.signature_still_valid("User.greet", "User.greet(Str): Str", "User(str)str"));
        // Result type changed on the host side.
        assert!(!reg.signature_still_valid("User.greet", "User.greet(Str): Int", "User(str)i64"));
        assert!(!reg.signature_still_valid("User.gone", "User.gone(): Unit", "User()unit"));
    }

    #[test]
    fn override_still_validates() {
        let mut reg = user_registry();
        // Admin overrides Entity.id with the same signature modulo declaring
        // type; the record for the supertype symbol must keep validating.
        reg.register(
            TypeDef::new("Admin")
                .with_supertype("Entity")
                .method("id", &[], TypeRep::int(), |_| Ok(Value::Int(1))),
        );
        assert!(reg.signature_still_valid("Entity.id", "Entity.id(): Int", "Entity()i64"));
    }

    #[test]
    fn erased_sig_erases_type_arguments() {
        assert_eq!(
            TypeRegistry::erased_kind(&TypeRep::with_args("Vec", vec![TypeRep::int()])),
            "obj(Vec)"
        );
    }
}
