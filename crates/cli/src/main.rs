mod run;

use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Output format for CLI responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    Text,
    Json,
}

/// QTI item runtime.
#[derive(Parser)]
#[command(name = "qti", version, about = "QTI item runtime: score candidate responses")]
struct Cli {
    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text", value_enum)]
    output: OutputFormat,

    /// Suppress non-essential output
    #[arg(long, global = true)]
    quiet: bool,

    /// Log session transitions and rule execution to stderr
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load an item document and check that every variable reference resolves
    Check {
        /// Path to the item JSON document
        item: PathBuf,
    },

    /// Drive a session over a list of submissions and report the outcomes
    Run {
        /// Path to the item JSON document
        item: PathBuf,
        /// Path to a JSON array of submissions (identifier -> response)
        #[arg(long)]
        responses: PathBuf,
        /// Path to a TOML file with delivery settings
        #[arg(long)]
        delivery: Option<PathBuf>,
        /// Seed for template processing and random operators
        #[arg(long, default_value_t = 0)]
        seed: u64,
        /// Override the maximum number of attempts (0 = unlimited)
        #[arg(long)]
        max_attempts: Option<u32>,
    },
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Check { item } => {
            cmd_check(&item, cli.output, cli.quiet);
        }
        Commands::Run {
            item,
            responses,
            delivery,
            seed,
            max_attempts,
        } => {
            run::cmd_run(run::RunOptions {
                item: &item,
                responses: &responses,
                delivery: delivery.as_deref(),
                seed,
                max_attempts,
                output: cli.output,
                quiet: cli.quiet,
            });
        }
    }
}

/// Logs go to stderr so JSON on stdout stays parseable. `RUST_LOG`
/// applies unless `--verbose` asks for debug output.
fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .init();
}

/// Read and lower an item document, exiting with a report on failure.
pub(crate) fn load_item(path: &Path, output: OutputFormat, quiet: bool) -> qti_core::ItemDefinition {
    let text = match std::fs::read_to_string(path) {
        Ok(s) => s,
        Err(_) => {
            let msg = format!("error: item file not found: {}", path.display());
            report_error(&msg, output, quiet);
            process::exit(1);
        }
    };
    match qti_interchange::from_json_str(&text) {
        Ok(item) => item,
        Err(e) => {
            let msg = format!("error: {}: {}", path.display(), e);
            report_error(&msg, output, quiet);
            process::exit(1);
        }
    }
}

fn cmd_check(path: &Path, output: OutputFormat, quiet: bool) {
    let item = load_item(path, output, quiet);
    if let Err(e) = item.check_references() {
        let msg = format!("error: {}: {}", path.display(), e);
        report_error(&msg, output, quiet);
        process::exit(1);
    }
    if quiet {
        return;
    }
    let declarations = item.declarations().count();
    match output {
        OutputFormat::Json => {
            let report = serde_json::json!({
                "item": item.identifier,
                "valid": true,
                "declarations": declarations,
                "expressions": item.expressions.len(),
                "rules": item.rules.len(),
                "adaptive": item.adaptive,
            });
            println!(
                "{}",
                serde_json::to_string_pretty(&report).unwrap_or_else(|_| report.to_string())
            );
        }
        OutputFormat::Text => {
            println!(
                "ok: item '{}' ({} declarations, {} expressions, {} rules)",
                item.identifier,
                declarations,
                item.expressions.len(),
                item.rules.len()
            );
        }
    }
}

pub(crate) fn report_error(msg: &str, output: OutputFormat, quiet: bool) {
    if quiet {
        return;
    }
    match output {
        OutputFormat::Text => eprintln!("{}", msg),
        OutputFormat::Json => eprintln!("{}", serde_json::json!({ "error": msg })),
    }
}
