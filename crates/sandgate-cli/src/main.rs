//! sandgate CLI entry point.
//!
//! Usage:
//!   sandgate job.py other.py           # Validate files
//!   sandgate < job.py                  # Validate stdin
//!   sandgate --allow json,math job.py  # Extend the allow-list
//!   sandgate --json job.py             # One JSON verdict per input
//!   sandgate --dump-ast job.py         # Print the parsed tree
//!
//! Exit status is 0 when every input is valid, 1 when any input is rejected
//! and 2 when an input or the config cannot be read.

use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use sandgate_kernel::{CodeValidator, ValidatorConfig};
use sandgate_types::{ValidationIssue, ValidationResult};

#[derive(Parser, Debug)]
#[command(name = "sandgate", version, about = "Check untrusted Python source before it runs")]
struct Args {
    /// Python files to check. `-` or no files reads stdin.
    files: Vec<PathBuf>,

    /// Allow importing MODULE (repeatable, or comma-separated).
    #[arg(long = "allow", value_name = "MODULE", value_delimiter = ',')]
    allow: Vec<String>,

    /// Read the allow-list from PATH instead of the user config file.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Print one JSON verdict per input.
    #[arg(long)]
    json: bool,

    /// Hide warnings.
    #[arg(long)]
    no_warnings: bool,

    /// Print nothing; only the exit status reports the verdict.
    #[arg(short, long)]
    quiet: bool,

    /// Print the parsed syntax tree instead of validating.
    #[arg(long, conflicts_with = "json")]
    dump_ast: bool,
}

/// A source read from a file or stdin.
struct Input {
    name: String,
    source: String,
}

/// JSON shape of one verdict.
#[derive(Serialize)]
struct Report<'a> {
    path: &'a str,
    is_valid: bool,
    errors: &'a [ValidationIssue],
    warnings: &'a [ValidationIssue],
}

fn main() -> ExitCode {
    // Logs go to stderr so stdout stays parseable; RUST_LOG sets the level
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    match run(&args) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e:?}");
            ExitCode::from(2)
        }
    }
}

fn run(args: &Args) -> Result<ExitCode> {
    let inputs = read_inputs(&args.files)?;

    if args.dump_ast {
        return Ok(dump_ast(&inputs, args.quiet));
    }

    let validator = build_validator(args)?;
    let mut all_valid = true;

    for input in &inputs {
        let result = validator.validate(&input.source);
        tracing::info!(
            path = %input.name,
            valid = result.is_valid(),
            errors = result.errors().len(),
            warnings = result.warnings().len(),
            "validated"
        );
        all_valid &= result.is_valid();

        if args.quiet {
            continue;
        }
        if args.json {
            print_json(input, &result, args.no_warnings)?;
        } else {
            print_text(input, &result, args.no_warnings);
        }
    }

    Ok(if all_valid {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn build_validator(args: &Args) -> Result<CodeValidator> {
    let mut config = match &args.config {
        Some(path) => ValidatorConfig::load_from(path)?,
        None => ValidatorConfig::load().context("Failed to load configuration")?,
    };

    config.allowed_imports.extend(
        args.allow
            .iter()
            .map(|module| module.trim())
            .filter(|module| !module.is_empty())
            .map(str::to_string),
    );
    tracing::debug!(allowed = ?config.allowed_imports, "allow-list");

    Ok(CodeValidator::from_config(&config))
}

fn read_inputs(files: &[PathBuf]) -> Result<Vec<Input>> {
    if files.is_empty() {
        return Ok(vec![read_stdin()?]);
    }

    files
        .iter()
        .map(|path| {
            if path == Path::new("-") {
                read_stdin()
            } else {
                let source = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read {}", path.display()))?;
                Ok(Input {
                    name: path.display().to_string(),
                    source,
                })
            }
        })
        .collect()
}

fn read_stdin() -> Result<Input> {
    let mut source = String::new();
    io::stdin()
        .read_to_string(&mut source)
        .context("Failed to read stdin")?;
    Ok(Input {
        name: "<stdin>".to_string(),
        source,
    })
}

/// Print each issue as `path:line:col: severity [code]: message`, followed by
/// the suggestion and source line when there are any.
fn print_text(input: &Input, result: &ValidationResult, no_warnings: bool) {
    let warnings = if no_warnings { &[][..] } else { result.warnings() };

    for issue in result.errors().iter().chain(warnings) {
        let rendered = issue.format(&input.source);
        if issue.span.is_some() {
            println!("{}:{}", input.name, rendered);
        } else {
            println!("{}: {}", input.name, rendered);
        }
    }
}

fn print_json(input: &Input, result: &ValidationResult, no_warnings: bool) -> Result<()> {
    let report = Report {
        path: &input.name,
        is_valid: result.is_valid(),
        errors: result.errors(),
        warnings: if no_warnings { &[] } else { result.warnings() },
    };
    let json = serde_json::to_string(&report).context("Failed to serialize report")?;
    println!("{json}");
    Ok(())
}

/// Parse each input and pretty-print its statement list. Inputs that fail to
/// parse are reported on stderr and make the exit status 1.
fn dump_ast(inputs: &[Input], quiet: bool) -> ExitCode {
    let mut all_parsed = true;

    for input in inputs {
        match sandgate_kernel::parse(&input.source) {
            Ok(suite) => {
                if !quiet {
                    println!("{:#?}", suite);
                }
            }
            Err(e) => {
                all_parsed = false;
                if !quiet {
                    eprintln!("{}: {}", input.name, e);
                }
            }
        }
    }

    if all_parsed {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
