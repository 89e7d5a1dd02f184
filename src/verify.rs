//! Baseline recording and comparison.

use std::path::{Path, PathBuf};

use crate::diff::{self, Difference};
use crate::document;
use crate::errors::Result;
use crate::fs::Filesystem;
use crate::render::RenderedCase;

/// Why a case did not match its baseline.
#[derive(Debug, Clone, PartialEq)]
pub enum Failure {
    Differences(Vec<Difference>),
    MalformedBaseline(String),
}

/// Verification result of one test case.
#[derive(Debug, Clone, PartialEq)]
pub enum CaseVerdict {
    Pass { dir: PathBuf },
    Fail { dir: PathBuf, failure: Failure },
    Skipped { dir: PathBuf, reason: String },
}

impl CaseVerdict {
    pub fn dir(&self) -> &Path {
        match self {
            Self::Pass { dir } | Self::Fail { dir, .. } | Self::Skipped { dir, .. } => dir,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Fail { .. })
    }
}

/// Every verdict, in discovery order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VerificationReport {
    pub verdicts: Vec<CaseVerdict>,
}

impl VerificationReport {
    pub fn passed(&self) -> bool {
        !self.verdicts.iter().any(CaseVerdict::is_failure)
    }

    pub fn pass_count(&self) -> usize {
        self.verdicts
            .iter()
            .filter(|v| matches!(v, CaseVerdict::Pass { .. }))
            .count()
    }

    pub fn fail_count(&self) -> usize {
        self.verdicts.iter().filter(|v| v.is_failure()).count()
    }

    pub fn skip_count(&self) -> usize {
        self.verdicts
            .iter()
            .filter(|v| matches!(v, CaseVerdict::Skipped { .. }))
            .count()
    }

    /// Cases that had a baseline to compare against.
    pub fn compared_count(&self) -> usize {
        self.pass_count() + self.fail_count()
    }
}

/// Writes every case's output as its new baseline.
pub fn record(
    fs: &dyn Filesystem,
    cases: &[RenderedCase],
    output_file: &str,
) -> Result<Vec<PathBuf>> {
    let mut written = Vec::with_capacity(cases.len());
    for case in cases {
        let path = case.dir.join(output_file);
        fs.write(&path, case.output.as_bytes())?;
        tracing::info!(file = %path.display(), "wrote baseline");
        written.push(path);
    }
    Ok(written)
}

fn verify_case(
    fs: &dyn Filesystem,
    case: &RenderedCase,
    output_file: &str,
) -> Result<CaseVerdict> {
    let dir = case.dir.clone();
    let baseline_path = dir.join(output_file);

    let Some(baseline) = fs.read_optional(&baseline_path)? else {
        tracing::warn!(file = %baseline_path.display(), "no baseline, skipping comparison");
        return Ok(CaseVerdict::Skipped {
            dir,
            reason: format!("{} not found", baseline_path.display()),
        });
    };

    let expected = match document::parse_documents(&baseline, &baseline_path) {
        Ok(docs) => docs,
        Err(e) => {
            let message = match std::error::Error::source(&e) {
                Some(cause) => format!("{e}: {cause}"),
                None => e.to_string(),
            };
            return Ok(CaseVerdict::Fail {
                dir,
                failure: Failure::MalformedBaseline(message),
            });
        }
    };
    let actual = document::parse_documents(case.output.as_bytes(), &dir)?;

    let differences = diff::diff_documents(&expected, &actual);
    if differences.is_empty() {
        Ok(CaseVerdict::Pass { dir })
    } else {
        tracing::debug!(dir = %dir.display(), count = differences.len(), "differences found");
        Ok(CaseVerdict::Fail {
            dir,
            failure: Failure::Differences(differences),
        })
    }
}

/// Compares every case against its baseline. All cases are evaluated even
/// after a failure.
pub fn compare(
    fs: &dyn Filesystem,
    cases: &[RenderedCase],
    output_file: &str,
) -> Result<VerificationReport> {
    let verdicts = cases
        .iter()
        .map(|case| verify_case(fs, case, output_file))
        .collect::<Result<Vec<_>>>()?;
    Ok(VerificationReport { verdicts })
}
