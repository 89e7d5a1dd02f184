//! The xrtest Command-Line Interface.
//!
//! Parses arguments, installs logging, wires the real filesystem and render
//! binary into a [`Harness`] and maps the outcome to an exit status.

use std::process;
use std::sync::Arc;

use clap::Parser;
use termcolor::StandardStream;
use tracing_subscriber::EnvFilter;

use crate::cli::args::XrtestArgs;
use crate::errors::HarnessError;
use crate::fs::OsFilesystem;
use crate::harness::Harness;
use crate::render::CommandRenderer;

pub mod args;
pub mod output;

/// Environment variable holding the log filter directives.
pub const LOG_ENV: &str = "XRTEST_LOG";

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// The main entry point for the CLI.
pub async fn run() {
    let args = XrtestArgs::parse();
    init_logging(args.verbose);

    if let Err(e) = execute(args).await {
        eprintln!("{:?}", miette::Report::new(e));
        process::exit(1);
    }
}

async fn execute(args: XrtestArgs) -> Result<(), HarnessError> {
    let (config, program) = args.command.into_config();
    let harness = Harness::new(
        config,
        Arc::new(OsFilesystem),
        Arc::new(CommandRenderer::new(program)),
    )
    .with_discovery_hook(|dirs| {
        let mut stdout = StandardStream::stdout(output::color_choice());
        if let Err(e) = output::print_test_dirs(&mut stdout, dirs) {
            tracing::warn!(error = %e, "cannot write test directories to stdout");
        }
    });
    let outputs = harness.run().await?;

    let mut stdout = StandardStream::stdout(output::color_choice());
    if let Err(e) = output::print_outputs(&mut stdout, &outputs) {
        tracing::warn!(error = %e, "cannot write results to stdout");
    }
    outputs.ensure_passed()
}
