//! Command-line definition and argument extraction.

use clap::{Arg, ArgAction, ArgMatches, Command};

pub fn build_cli() -> Command {
    Command::new("palisade")
        .about("Sandboxed expression evaluation and completion")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(expr_command(
            "check",
            "Compile an expression and report diagnostics",
        ))
        .subcommand(expr_command("eval", "Compile and evaluate an expression"))
        .subcommand(
            expr_command("complete", "Query completions at a cursor position")
                .arg(
                    Arg::new("pos")
                        .long("pos")
                        .short('p')
                        .value_parser(clap::value_parser!(u32))
                        .required(true)
                        .help("Cursor offset within the expression"),
                )
                .arg(
                    Arg::new("scope")
                        .long("scope")
                        .action(ArgAction::SetTrue)
                        .help("Scope completion instead of qualifier-type completion"),
                ),
        )
        .subcommand(expr_command(
            "dump",
            "Compile an expression and print its bytecode listing",
        ))
}

fn expr_command(name: &'static str, about: &'static str) -> Command {
    Command::new(name)
        .about(about)
        .arg(
            Arg::new("expr")
                .long("expr")
                .short('e')
                .required(true)
                .help("The expression (or template) text"),
        )
        .arg(
            Arg::new("template")
                .long("template")
                .action(ArgAction::SetTrue)
                .help("Treat the input as a ${...} template"),
        )
        .arg(
            Arg::new("context-type")
                .long("context-type")
                .default_value("Unit")
                .help("Textual context type"),
        )
        .arg(
            Arg::new("result-type")
                .long("result-type")
                .default_value("Any")
                .help("Textual result type"),
        )
        .arg(
            Arg::new("allow")
                .long("allow")
                .action(ArgAction::Append)
                .help("ACL entry `Type.member` or `Type.*`; default allows everything"),
        )
        .arg(
            Arg::new("var")
                .long("var")
                .action(ArgAction::Append)
                .help("Free variable `name=value` (int, float, bool, or string)"),
        )
        .arg(
            Arg::new("json")
                .long("json")
                .action(ArgAction::SetTrue)
                .help("JSON output"),
        )
}

pub struct ExprParams {
    pub expr: String,
    pub template: bool,
    pub context_type: String,
    pub result_type: String,
    pub allow: Vec<String>,
    pub vars: Vec<String>,
    pub json: bool,
}

impl ExprParams {
    pub fn from_matches(m: &ArgMatches) -> Self {
        Self {
            expr: m.get_one::<String>("expr").expect("required").clone(),
            template: m.get_flag("template"),
            context_type: m
                .get_one::<String>("context-type")
                .expect("defaulted")
                .clone(),
            result_type: m
                .get_one::<String>("result-type")
                .expect("defaulted")
                .clone(),
            allow: m
                .get_many::<String>("allow")
                .map(|vals| vals.cloned().collect())
                .unwrap_or_default(),
            vars: m
                .get_many::<String>("var")
                .map(|vals| vals.cloned().collect())
                .unwrap_or_default(),
            json: m.get_flag("json"),
        }
    }
}

pub struct CompleteParams {
    pub expr: ExprParams,
    pub pos: u32,
    pub scope: bool,
}

impl CompleteParams {
    pub fn from_matches(m: &ArgMatches) -> Self {
        Self {
            expr: ExprParams::from_matches(m),
            pos: *m.get_one::<u32>("pos").expect("required"),
            scope: m.get_flag("scope"),
        }
    }
}
