//! Offline story validator.
//!
//! Usage: `validate_story [path/to/story.toml]`. Exits 0 when the story is
//! well-formed, 1 otherwise, with one diagnostic per line on stderr.

use std::env;
use std::path::PathBuf;
use std::process::ExitCode;

use narrative_core::validator::{validate, ValidatorOptions};
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_target(false)
        .compact()
        .init();

    let options = match parse_args() {
        Ok(Some(options)) => options,
        Ok(None) => {
            println!("{}", usage_text());
            return ExitCode::SUCCESS;
        }
        Err(message) => {
            eprintln!("{message}");
            return ExitCode::from(1);
        }
    };

    let report = validate(&options);
    for note in &report.notes {
        eprintln!("note: {note}");
    }
    if report.passed() {
        println!("{report}");
        ExitCode::SUCCESS
    } else {
        for diagnostic in &report.diagnostics {
            eprintln!("{diagnostic}");
        }
        eprintln!("{report}");
        ExitCode::from(1)
    }
}

/// `Ok(None)` when help was requested.
fn parse_args() -> Result<Option<ValidatorOptions>, String> {
    let args = env::args().skip(1).collect::<Vec<_>>();
    match args.as_slice() {
        [] => Ok(Some(ValidatorOptions::default())),
        [flag] if flag == "-h" || flag == "--help" => Ok(None),
        [path] => Ok(Some(ValidatorOptions {
            content_path: PathBuf::from(path),
        })),
        _ => Err(usage_text()),
    }
}

fn usage_text() -> String {
    "usage: validate_story [path/to/story.toml]".to_string()
}
