use anyhow::Result;

use palisade_lib::{CompileError, Error};

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

    match builder.compile() {
        Ok(_) => {
            if params.json {
                println!("{}", serde_json::json!({ "ok": true }));
            } else {
                println!("ok");
            }
            Ok(())
        }
        Err(Error::Compile(CompileError::Rejected(report))) => {
            if params.json {
                let entries: Vec<_> = report
                    .entries
                    .iter()
                    .map(|e| {
                        serde_json::json!({
                            "line": e.line,
                            "column": e.column,
                            "message": e.message,
                        })
                    })
                    .collect();
                println!("{}", serde_json::json!({ "ok": false, "errors": entries }));
            } else {
                println!("{report}");
            }
            std::process::exit(2);
        }
        Err(err) => Err(err.into()),
    }
}
