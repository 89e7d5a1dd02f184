//! Harness configuration.

use std::path::PathBuf;
use std::time::Duration;

/// What to do with rendered output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Mode {
    /// Overwrite each case's baseline with the rendered output.
    #[default]
    Record,
    /// Diff rendered output against the existing baselines.
    Compare,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarnessConfig {
    pub test_dir: PathBuf,
    pub output_file: String,
    pub package_file: PathBuf,
    /// When set, used verbatim and the package manifest is never read.
    pub functions_file: Option<PathBuf>,
    /// Where synthesized functions are written.
    pub dev_functions_file: PathBuf,
    pub search_root: PathBuf,
    pub timeout: Duration,
    pub mode: Mode,
    pub max_concurrency: Option<usize>,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            test_dir: PathBuf::from("tests"),
            output_file: "expected.yaml".to_string(),
            package_file: PathBuf::from("apis/package.yaml"),
            functions_file: None,
            dev_functions_file: PathBuf::from("dev-functions.yaml"),
            search_root: PathBuf::from("."),
            timeout: Duration::from_secs(60),
            mode: Mode::Record,
            max_concurrency: None,
        }
    }
}
