use anyhow::{Context, Result};

use super::run_common::{evaluator, profile_from, vars_from};
use crate::cli::ExprParams;

pub fn run(params: &ExprParams) -> Result<()> {
    let profile = profile_from(params)?;
    let evaluator = evaluator();
    let (_, var_types) = vars_from(params)?;

    let mut builder = evaluator
        .expr(&profile, &params.expr)
        .context_type(&params.context_type)
        .result_type(&params.result_type);
    if params.template {
        builder = builder.template();
    }
    for (name, ty) in &var_types {
        builder = builder.variable(name, ty);
    }

    let callable = builder.compile()?;
    let listing = evaluator
        .dump(callable.def())
        .context("artifact not retained in the module store")?;
    print!("{listing}");
    Ok(())
}
