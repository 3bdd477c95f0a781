//! Shared setup for the expression commands.

use std::sync::Arc;

use anyhow::{bail, Context, Result};

use palisade_lib::{
    Acl, Evaluator, ExpressionProfile, TypeRegistry, Value, Vars,
};

use crate::cli::ExprParams;

/// Build the profile: permissive unless `--allow` entries restrict it.
pub fn profile_from(params: &ExprParams) -> Result<Arc<ExpressionProfile>> {
    let mut builder = Acl::builder();
    if params.allow.is_empty() {
        builder = builder.allow(|p| p.on("Any").all_members());
    } else {
        for entry in &params.allow {
            let Some((ty, member)) = entry.rsplit_once('.') else {
                bail!("--allow expects `Type.member` or `Type.*`, got `{entry}`");
            };
            let ty = ty.to_owned();
            let member = member.to_owned();
            builder = builder.allow(move |p| {
                let p = p.on(&ty);
                if member == "*" {
                    p.all_members()
                } else {
                    p.member(&member)
                }
            });
        }
    }
    let acl = builder.build().context("invalid --allow entry")?;
    Ok(Arc::new(
        ExpressionProfile::builder("cli").acl(acl).build(),
    ))
}

pub fn evaluator() -> Evaluator {
    Evaluator::new(TypeRegistry::with_builtins())
}

/// Parse `--var name=value` pairs; the value is an int, float, bool, or
/// falls back to a string.
pub fn vars_from(params: &ExprParams) -> Result<(Vars, Vec<(String, String)>)> {
    let mut vars = Vars::new();
    let mut types = Vec::new();
    for spec in &params.vars {
        let Some((name, raw)) = spec.split_once('=') else {
            bail!("--var expects `name=value`, got `{spec}`");
        };
        let (ty, value) = parse_value(raw);
        types.push((name.to_owned(), ty.to_owned()));
        vars = vars.set(name, value);
    }
    Ok((vars, types))
}

fn parse_value(raw: &str) -> (&'static str, Value) {
    if let Ok(n) = raw.parse::<i64>() {
        return ("Int", Value::Int(n));
    }
    if let Ok(n) = raw.parse::<f64>() {
        return ("Float", Value::Float(n));
    }
    match raw {
        "true" => ("Bool", Value::Bool(true)),
        "false" => ("Bool", Value::Bool(false)),
        _ => ("Str", Value::str(raw)),
    }
}

#[cfg(test)]
mod tests {
    use super::parse_value;
    use palisade_lib::Value;

    #[test]
    fn value_inference() {
        assert_eq!(parse_value("3"), ("Int", Value::Int(3)));
        assert_eq!(parse_value("3.5"), ("Float", Value::Float(3.5)));
        assert_eq!(parse_value("true"), ("Bool", Value::Bool(true)));
        assert_eq!(parse_value("hello"), ("Str", Value::str("hello")));
    }
}
