//! Defines the command-line arguments and subcommands for the xrtest CLI.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};

use crate::config::{HarnessConfig, Mode};

/// The main CLI argument structure.
#[derive(Debug, Parser)]
#[command(
    name = "xrtest",
    version,
    about = "Golden-file regression tests for Crossplane compositions."
)]
pub struct XrtestArgs {
    /// Enable debug logging.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// An enumeration of all available CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Render every test case and record or compare baselines.
    Test {
        /// Directory searched recursively for test cases.
        #[arg(default_value = "tests")]
        test_dir: PathBuf,

        /// Compare against existing baselines instead of recording them.
        #[arg(short, long)]
        compare: bool,

        /// Baseline file name inside each test case directory.
        #[arg(long, default_value = "expected.yaml")]
        output_file: String,

        /// Package manifest functions are synthesized from.
        #[arg(long, default_value = "apis/package.yaml")]
        package_file: PathBuf,

        /// Explicit functions file; the package manifest is ignored when set.
        #[arg(long)]
        functions_file: Option<PathBuf>,

        /// Deadline for the whole run, e.g. "90s" or "2m".
        #[arg(long, default_value = "1m", value_parser = humantime::parse_duration)]
        timeout: Duration,

        /// Root searched for compositions.
        #[arg(long, default_value = ".")]
        search_root: PathBuf,

        /// Render engine binary.
        #[arg(long, default_value = "crossplane")]
        renderer: String,

        /// Maximum number of test cases rendered at once.
        #[arg(long)]
        max_concurrency: Option<usize>,
    },
}

impl Command {
    /// Builds the harness configuration and returns it with the renderer binary.
    pub fn into_config(self) -> (HarnessConfig, String) {
        match self {
            Command::Test {
                test_dir,
                compare,
                output_file,
                package_file,
                functions_file,
                timeout,
                search_root,
                renderer,
                max_concurrency,
            } => (
                HarnessConfig {
                    test_dir,
                    output_file,
                    package_file,
                    functions_file,
                    search_root,
                    timeout,
                    mode: if compare { Mode::Compare } else { Mode::Record },
                    max_concurrency,
                    ..HarnessConfig::default()
                },
                renderer,
            ),
        }
    }
}
