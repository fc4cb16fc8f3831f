//! Conformer suite runner.
//! Usage: conform [--config FILE] [--filter S] [--json] [-v...] [PATH]

use std::path::PathBuf;
use std::process;

use clap::Parser;
use miette::{IntoDiagnostic, Result};

use conformer::suite::{report_results, run_suites};
use conformer::{logging, Harness, HarnessConfig};

/// Translate, build, run, and check every case in a directory of YAML suites.
#[derive(Debug, Parser)]
#[command(name = "conform", version, about)]
struct Args {
    /// Directory searched recursively for `.yaml`/`.yml` suites.
    #[arg(default_value = "tests/suites")]
    path: PathBuf,

    /// Harness configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Run only cases whose name contains this substring.
    #[arg(short, long)]
    filter: Option<String>,

    /// Print the run summary as JSON instead of text.
    #[arg(long)]
    json: bool,

    /// More logging; repeat for more detail.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> Result<()> {
    let args = Args::parse();
    logging::init_logging(args.verbose);

    let config = match &args.config {
        Some(path) => HarnessConfig::load(path)?,
        None => HarnessConfig::from_env(),
    };
    let mut harness = Harness::from_config(config)?;
    let summary = run_suites(&args.path, args.filter.as_deref(), &mut harness)?;

    if args.json {
        let json = serde_json::to_string_pretty(&summary).into_diagnostic()?;
        println!("{json}");
    } else {
        report_results(&summary, atty::is(atty::Stream::Stderr)).into_diagnostic()?;
    }

    if summary.has_failures() {
        process::exit(1);
    }
    Ok(())
}
