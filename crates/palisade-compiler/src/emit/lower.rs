//! AST-to-instruction lowering.
//!
//! Runs only on error-free units: every member access carries a
//! [`Resolution`] recorded by the typer. Jumps are emitted with placeholder
//! targets and backpatched.

use palisade_bytecode::{Const, Instr};

use crate::analyze::typer::{Resolution, Resolutions};
use crate::escape::unescape;
use crate::parser::ast::{Expr, SelectExpr};
use crate::parser::cst::SyntaxKind;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LowerError {
    #[error("missing resolution for a checked node")]
    MissingResolution,
    #[error("expression too large to encode")]
    TooLong,
    #[error("setter expression is not a settable field access")]
    BadSetterTarget,
}

/// Deduplicating constant pool shared by all chunks of a unit.
#[derive(Debug, Default)]
pub struct ConstPool {
    consts: Vec<Const>,
}

impl ConstPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resume from a prelude's pool so its indices stay valid.
    pub fn resume(consts: Vec<Const>) -> Self {
        Self { consts }
    }

    pub fn add(&mut self, value: Const) -> u16 {
        if let Some(idx) = self.consts.iter().position(|c| *c == value) {
            return idx as u16;
        }
        self.consts.push(value);
        (self.consts.len() - 1) as u16
    }

    pub fn into_vec(self) -> Vec<Const> {
        self.consts
    }
}

pub struct Lowerer<'a> {
    resolutions: &'a Resolutions,
    consts: &'a mut ConstPool,
    code: Vec<Instr>,
}

impl<'a> Lowerer<'a> {
    pub fn new(resolutions: &'a Resolutions, consts: &'a mut ConstPool) -> Self {
        Self {
            resolutions,
            consts,
            code: Vec::with_capacity(16),
        }
    }

    /// Lower one expression chunk, ending in `Ret`.
    pub fn lower(self, expr: &Expr) -> Result<Vec<Instr>, LowerError> {
        self.lower_with(expr, None)
    }

    /// Lower the main chunk, applying a result-type conversion before
    /// `Ret` when the unit boundary needs one.
    pub fn lower_with(
        mut self,
        expr: &Expr,
        result_conv: Option<u16>,
    ) -> Result<Vec<Instr>, LowerError> {
        self.expr(expr)?;
        self.convert(result_conv)?;
        self.push(Instr::Ret)?;
        Ok(self.code)
    }

    /// Lower a setter chunk: qualifier, incoming value, field write.
    pub fn lower_setter(mut self, select: &SelectExpr) -> Result<Vec<Instr>, LowerError> {
        let resolution = self
            .resolutions
            .get(select.as_cst())
            .ok_or(LowerError::MissingResolution)?;
        let &Resolution::Field {
            sym,
            conv: None,
            settable: true,
            ..
        } = resolution
        else {
            return Err(LowerError::BadSetterTarget);
        };
        let qualifier = select.qualifier().ok_or(LowerError::BadSetterTarget)?;
        self.expr(&qualifier)?;
        self.push(Instr::LoadSetVal)?;
        self.push(Instr::SetField(sym))?;
        self.push(Instr::Ret)?;
        Ok(self.code)
    }

    fn expr(&mut self, expr: &Expr) -> Result<(), LowerError> {
        match expr {
            Expr::Lit(lit) => {
                let value = lit_const(lit);
                let idx = self.consts.add(value);
                self.push(Instr::Const(idx))
            }
            Expr::This(_) => self.push(Instr::LoadCtx),
            Expr::Ident(ident) => match *self.resolution(ident.as_cst())? {
                Resolution::Var(slot) => self.push(Instr::LoadVar(slot)),
                Resolution::Bind(slot) => self.push(Instr::LoadBind(slot)),
                Resolution::CtxField { sym, conv } => {
                    self.push(Instr::LoadCtx)?;
                    self.convert(conv)?;
                    self.push(Instr::GetField(sym))
                }
                Resolution::CtxMethod { sym, conv } => {
                    self.push(Instr::LoadCtx)?;
                    self.convert(conv)?;
                    self.push(Instr::CallMethod { sym, argc: 0 })
                }
                _ => Err(LowerError::MissingResolution),
            },
            Expr::Select(select) => match *self.resolution(select.as_cst())? {
                Resolution::Field { sym, conv, .. } => {
                    let qualifier = select.qualifier().ok_or(LowerError::MissingResolution)?;
                    self.expr(&qualifier)?;
                    self.convert(conv)?;
                    self.push(Instr::GetField(sym))
                }
                Resolution::Method { sym, conv } => {
                    let qualifier = select.qualifier().ok_or(LowerError::MissingResolution)?;
                    self.expr(&qualifier)?;
                    self.convert(conv)?;
                    self.push(Instr::CallMethod { sym, argc: 0 })
                }
                Resolution::Static { sym } => self.push(Instr::CallStatic { sym, argc: 0 }),
                _ => Err(LowerError::MissingResolution),
            },
            Expr::Call(call) => {
                let args: Vec<Expr> = call.args().collect();
                let argc = u8::try_from(args.len()).map_err(|_| LowerError::TooLong)?;
                match *self.resolution(call.as_cst())? {
                    Resolution::Method { sym, conv } => {
                        let Some(Expr::Select(select)) = call.callee() else {
                            return Err(LowerError::MissingResolution);
                        };
                        let qualifier =
                            select.qualifier().ok_or(LowerError::MissingResolution)?;
                        self.expr(&qualifier)?;
                        self.convert(conv)?;
                        for arg in &args {
                            self.expr(arg)?;
                        }
                        self.push(Instr::CallMethod { sym, argc })
                    }
                    Resolution::CtxCall { sym, conv } => {
                        self.push(Instr::LoadCtx)?;
                        self.convert(conv)?;
                        for arg in &args {
                            self.expr(arg)?;
                        }
                        self.push(Instr::CallMethod { sym, argc })
                    }
                    Resolution::Static { sym } => {
                        for arg in &args {
                            self.expr(arg)?;
                        }
                        self.push(Instr::CallStatic { sym, argc })
                    }
                    Resolution::Construct { sym } => {
                        for arg in &args {
                            self.expr(arg)?;
                        }
                        self.push(Instr::Construct { sym, argc })
                    }
                    _ => Err(LowerError::MissingResolution),
                }
            }
            Expr::Binary(binary) => {
                let (Some(lhs), Some(rhs)) = (binary.lhs(), binary.rhs()) else {
                    return Err(LowerError::MissingResolution);
                };
                let op = binary
                    .op_token()
                    .ok_or(LowerError::MissingResolution)?
                    .kind();
                match op {
                    SyntaxKind::AmpAmp => {
                        self.expr(&lhs)?;
                        self.push(Instr::Dup)?;
                        let jump = self.placeholder_jump_if_false()?;
                        self.push(Instr::Pop)?;
                        self.expr(&rhs)?;
                        self.patch(jump)?;
                        Ok(())
                    }
                    SyntaxKind::PipePipe => {
                        self.expr(&lhs)?;
                        self.push(Instr::Dup)?;
                        let to_rhs = self.placeholder_jump_if_false()?;
                        let to_end = self.placeholder_jump()?;
                        self.patch(to_rhs)?;
                        self.push(Instr::Pop)?;
                        self.expr(&rhs)?;
                        self.patch(to_end)?;
                        Ok(())
                    }
                    _ => {
                        let &Resolution::Method { sym, conv } =
                            self.resolution(binary.as_cst())?
                        else {
                            return Err(LowerError::MissingResolution);
                        };
                        self.expr(&lhs)?;
                        self.convert(conv)?;
                        self.expr(&rhs)?;
                        self.push(Instr::CallMethod { sym, argc: 1 })
                    }
                }
            }
            Expr::Unary(unary) => {
                let &Resolution::Method { sym, conv } = self.resolution(unary.as_cst())? else {
                    return Err(LowerError::MissingResolution);
                };
                let operand = unary.operand().ok_or(LowerError::MissingResolution)?;
                self.expr(&operand)?;
                self.convert(conv)?;
                self.push(Instr::CallMethod { sym, argc: 0 })
            }
            Expr::Concat(concat) => {
                let (Some(lhs), Some(rhs)) = (concat.lhs(), concat.rhs()) else {
                    return Err(LowerError::MissingResolution);
                };
                self.expr(&lhs)?;
                self.expr(&rhs)?;
                self.push(Instr::Concat(2))
            }
            Expr::If(node) => {
                let cond = node.cond().ok_or(LowerError::MissingResolution)?;
                let then_branch = node.then_branch().ok_or(LowerError::MissingResolution)?;
                let else_branch = node.else_branch().ok_or(LowerError::MissingResolution)?;
                self.expr(&cond)?;
                let to_else = self.placeholder_jump_if_false()?;
                self.expr(&then_branch)?;
                let to_end = self.placeholder_jump()?;
                self.patch(to_else)?;
                self.expr(&else_branch)?;
                self.patch(to_end)?;
                Ok(())
            }
            Expr::Block(block) => {
                let exprs: Vec<Expr> = block.exprs().collect();
                if exprs.is_empty() {
                    let idx = self.consts.add(Const::Unit);
                    return self.push(Instr::Const(idx));
                }
                let last = exprs.len() - 1;
                for (i, e) in exprs.iter().enumerate() {
                    self.expr(e)?;
                    if i < last {
                        self.push(Instr::Pop)?;
                    }
                }
                Ok(())
            }
            Expr::Paren(paren) => match paren.inner() {
                Some(inner) => self.expr(&inner),
                None => {
                    let idx = self.consts.add(Const::Unit);
                    self.push(Instr::Const(idx))
                }
            },
            Expr::Ascribe(node) => {
                let inner = node.expr().ok_or(LowerError::MissingResolution)?;
                self.expr(&inner)?;
                if let Some(Resolution::Convert { sym }) =
                    self.resolutions.get(node.as_cst())
                {
                    self.push(Instr::Convert(*sym))?;
                }
                Ok(())
            }
        }
    }

    fn resolution(&self, node: &crate::parser::cst::SyntaxNode) -> Result<&Resolution, LowerError> {
        self.resolutions
            .get(node)
            .ok_or(LowerError::MissingResolution)
    }

    fn convert(&mut self, conv: Option<u16>) -> Result<(), LowerError> {
        if let Some(sym) = conv {
            self.push(Instr::Convert(sym))?;
        }
        Ok(())
    }

    fn push(&mut self, instr: Instr) -> Result<(), LowerError> {
        if self.code.len() >= u16::MAX as usize {
            return Err(LowerError::TooLong);
        }
        self.code.push(instr);
        Ok(())
    }

    fn placeholder_jump(&mut self) -> Result<usize, LowerError> {
        let at = self.code.len();
        self.push(Instr::Jump(0))?;
        Ok(at)
    }

    fn placeholder_jump_if_false(&mut self) -> Result<usize, LowerError> {
        let at = self.code.len();
        self.push(Instr::JumpIfFalse(0))?;
        Ok(at)
    }

    /// Point the placeholder at the current end of code.
    fn patch(&mut self, at: usize) -> Result<(), LowerError> {
        let target = u16::try_from(self.code.len()).map_err(|_| LowerError::TooLong)?;
        match &mut self.code[at] {
            Instr::Jump(t) | Instr::JumpIfFalse(t) => *t = target,
            _ => return Err(LowerError::MissingResolution),
        }
        Ok(())
    }
}

fn lit_const(lit: &crate::parser::ast::LitExpr) -> Const {
    let Some(token) = lit.token() else {
        return Const::Unit;
    };
    match token.kind() {
        SyntaxKind::IntLit => Const::Int(token.text().parse().unwrap_or_default()),
        SyntaxKind::FloatLit => Const::Float(token.text().parse().unwrap_or_default()),
        SyntaxKind::StringLit => {
            let text = token.text();
            let inner = &text[1..text.len().saturating_sub(1)];
            Const::Str(unescape(inner).unwrap_or_default())
        }
        SyntaxKind::KwTrue => Const::Bool(true),
        SyntaxKind::KwFalse => Const::Bool(false),
        _ => Const::Unit,
    }
}
