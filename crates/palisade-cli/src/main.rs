mod cli;
mod commands;

use cli::{build_cli, CompleteParams, ExprParams};

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let matches = build_cli().get_matches();

    let result = match matches.subcommand() {
        Some(("check", m)) => commands::check::run(&ExprParams::from_matches(m)),
        Some(("eval", m)) => commands::eval::run(&ExprParams::from_matches(m)),
        Some(("complete", m)) => commands::complete::run(&CompleteParams::from_matches(m)),
        Some(("dump", m)) => commands::dump::run(&ExprParams::from_matches(m)),
        _ => unreachable!("clap should have caught this"),
    };

    if let Err(err) = result {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}
