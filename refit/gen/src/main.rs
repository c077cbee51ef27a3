//! refit-gen
//!
//! Writes generated REST client units for every `#[rest_client]` trait in a
//! Rust source file.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use colored::Colorize;
use refit_gen::errors::GeneratorError;
use refit_gen::extract::ExtractOptions;
use refit_gen::output::{GenerateOptions, generate_from_file, write_units};
use tracing::debug;
use tracing_subscriber::EnvFilter;

/// refit code generator - turns annotated service traits into REST clients
#[derive(Parser, Debug)]
#[command(name = "refit-gen")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Rust source file containing `#[rest_client]` traits
    #[arg(short, long)]
    input: PathBuf,

    /// Output directory for generated units
    #[arg(short, long, default_value = "src/generated")]
    output: PathBuf,

    /// Module path glob-imported into each unit (repeatable)
    #[arg(short, long = "module")]
    modules: Vec<String>,

    /// Print generated code without writing files
    #[arg(long)]
    dry_run: bool,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn init_tracing(verbose: u8) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = match verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        };
        EnvFilter::new(format!("refit_gen={level}"))
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: &Cli) -> Result<bool, GeneratorError> {
    let options = GenerateOptions {
        imports: cli.modules.clone(),
        extract: ExtractOptions::default(),
    };
    debug!(input = %cli.input.display(), output = %cli.output.display(), "generating");

    let report = generate_from_file(&cli.input, &options)?;

    for failure in &report.failures {
        eprintln!("{} {}", "✗".red(), failure);
    }

    if cli.dry_run {
        for unit in &report.units {
            println!("=== {} ===\n{}\n", unit.file_name, unit.contents);
        }
    } else {
        for path in write_units(&report.units, &cli.output)? {
            eprintln!("{} {}", "✓".green(), path.display());
        }
    }

    if report.services.is_empty() && report.failures.is_empty() {
        eprintln!(
            "{}",
            format!("No #[rest_client] traits found in {}", cli.input.display()).yellow()
        );
    } else {
        eprintln!(
            "Generated {} service(s), {} failed",
            report.services.len().to_string().bold(),
            report.failures.len().to_string().bold()
        );
    }

    Ok(report.is_success())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(&cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            eprintln!("{} {}", "error:".red().bold(), err);
            ExitCode::FAILURE
        }
    }
}
