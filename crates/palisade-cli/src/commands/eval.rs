use anyhow::Result;

use palisade_lib::Value;

use super::run_common::{evaluator, profile_from, vars_from};
use crate::cli::ExprParams;

pub fn run(params: &ExprParams) -> Result<()> {
    let profile = profile_from(params)?;
    let evaluator = evaluator();
    let (vars, var_types) = vars_from(params)?;

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
    let value = callable.eval_with(&Value::Unit, &vars)?;

    if params.json {
        println!("{}", serde_json::to_string(&value)?);
    } else {
        println!("{}", value.display_string());
    }
    Ok(())
}
