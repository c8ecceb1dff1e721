//! Prints per-axis aggregates and skew hints for every choice effect.
//!
//! Usage: `balance_report [path/to/story.toml]`.

use std::env;
use std::path::PathBuf;
use std::process::ExitCode;

use narrative_core::balance::BalanceReport;
use narrative_core::validator::ValidatorOptions;
use narrative_core::Story;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_target(false)
        .compact()
        .init();

    let args = env::args().skip(1).collect::<Vec<_>>();
    let path = match args.as_slice() {
        [] => ValidatorOptions::default().content_path,
        [flag] if flag == "-h" || flag == "--help" => {
            println!("usage: balance_report [path/to/story.toml]");
            return ExitCode::SUCCESS;
        }
        [path] => PathBuf::from(path),
        _ => {
            eprintln!("usage: balance_report [path/to/story.toml]");
            return ExitCode::from(1);
        }
    };

    match Story::load(&path) {
        Ok(story) => {
            print!("{}", BalanceReport::from_story(&story));
            ExitCode::SUCCESS
        }
        Err(err) => {
            for diagnostic in err.diagnostics() {
                eprintln!("{diagnostic}");
            }
            eprintln!("{err}");
            ExitCode::from(1)
        }
    }
}
