use anyhow::Result;

use super::run_common::{evaluator, profile_from, vars_from};
use crate::cli::CompleteParams;

pub fn run(params: &CompleteParams) -> Result<()> {
    let profile = profile_from(&params.expr)?;
    let evaluator = evaluator();
    let (_, var_types) = vars_from(&params.expr)?;

    let mut completer = evaluator
        .completer(&profile)
        .context_type(&params.expr.context_type)
        .result_type(&params.expr.result_type);
    if params.expr.template {
        completer = completer.template();
    }
    for (name, ty) in &var_types {
        completer = completer.variable(name, ty);
    }

    let completion = if params.scope {
        completer.scope_completion(&params.expr.expr, params.pos)
    } else {
        completer.type_completion(&params.expr.expr, params.pos)
    };

    if params.expr.json {
        let members: Vec<_> = completion
            .members
            .iter()
            .map(|m| {
                serde_json::json!({
                    "name": m.name,
                    "params": m.params.as_ref().map(|ps| {
                        ps.iter()
                            .map(|p| serde_json::json!({ "name": p.name, "ty": p.ty }))
                            .collect::<Vec<_>>()
                    }),
                    "result": m.result,
                    "viaConversion": m.via_conversion,
                    "doc": m.doc,
                })
            })
            .collect();
        let errors: Vec<_> = completion
            .errors
            .iter()
            .map(|e| {
                serde_json::json!({
                    "line": e.line,
                    "column": e.column,
                    "message": e.message,
                })
            })
            .collect();
        println!(
            "{}",
            serde_json::json!({ "members": members, "errors": errors })
        );
    } else {
        for member in &completion.members {
            println!("{}", render_member(member));
        }
        for error in &completion.errors {
            println!("error: {} (column {})", error.message, error.column);
        }
    }
    Ok(())
}

fn render_member(member: &palisade_lib::MemberDescriptor) -> String {
    let mut out = member.name.clone();
    if let Some(params) = &member.params {
        out.push('(');
        for (i, p) in params.iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            out.push_str(&p.name);
            out.push_str(": ");
            out.push_str(&p.ty);
        }
        out.push(')');
    }
    out.push_str(": ");
    out.push_str(&member.result);
    if member.via_conversion {
        out.push_str("  (via conversion)");
    }
    out
}
