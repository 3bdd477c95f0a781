//! Palisade: an embedded sandboxed expression evaluator.
//!
//! Hosts register their types in a [`TypeRegistry`], describe capability
//! domains as [`ExpressionProfile`]s (syntax policy + ACL + utilities), and
//! compile expressions through an [`Evaluator`] into cached, repeatedly
//! invocable [`Callable`]s. A [`Completer`] answers IDE-style completion
//! queries under the same profile rules.
//!
//! # Example
//!
//! ```
//! use palisade_lib::{Acl, Evaluator, ExpressionProfile, TypeRegistry, Value};
//!
//! let acl = Acl::builder()
//!     .allow(|p| p.on("Str").member("len"))
//!     .build()
//!     .unwrap();
//! let profile = std::sync::Arc::new(
//!     ExpressionProfile::builder("demo").acl(acl).build(),
//! );
//!
//! let evaluator = Evaluator::new(TypeRegistry::with_builtins());
//! let callable = evaluator
//!     .expr(&profile, r#""hello".len"#)
//!     .context_type("Unit")
//!     .result_type("Int")
//!     .compile()
//!     .unwrap();
//! assert_eq!(callable.eval(&Value::Unit).unwrap(), Value::Int(5));
//! ```

mod cache;
mod callable;
mod completer;
mod evaluator;
mod expression_def;

pub use cache::CACHE_FORMAT_VERSION;
pub use callable::{Callable, Vars};
pub use completer::{Completer, Completion, MemberDescriptor, Param};
pub use evaluator::{Evaluator, EvaluatorBuilder, ExprBuilder};
pub use expression_def::ExpressionDef;

pub use palisade_compiler::{CompileError, DiagnosticReport, ErrorEntry, TemplateError};
pub use palisade_core::acl::{Acl, PatternSet};
pub use palisade_core::profile::{
    ExpressionProfile, SymbolAttributes, SyntaxPolicy, SyntaxShape,
};
pub use palisade_core::registry::{TypeDef, TypeRegistry};
pub use palisade_core::types::TypeRep;
pub use palisade_core::value::{EvalError, HostObject, Value};
pub use palisade_vm::{FuelLimits, LinkError};

/// Umbrella error for the host-facing surface.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error(transparent)]
    Eval(#[from] EvalError),

    #[error(transparent)]
    Link(#[from] LinkError),

    #[error("artifact directory I/O: {0}")]
    Io(#[from] std::io::Error),

    #[error("evaluator was dropped")]
    EvaluatorGone,
}

impl From<TemplateError> for Error {
    fn from(err: TemplateError) -> Self {
        Error::Compile(CompileError::Template(err))
    }
}
