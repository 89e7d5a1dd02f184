//! Handles all user-facing output for the CLI.
//!
//! Everything is written to a [`WriteColor`] sink so that the same code drives
//! the terminal and test buffers.

use std::io;
use std::path::PathBuf;

use termcolor::{Color, ColorChoice, ColorSpec, WriteColor};

use crate::diff;
use crate::harness::{Outputs, RunResult};
use crate::verify::{CaseVerdict, Failure, VerificationReport};

/// Colors only when stdout is a terminal.
pub fn color_choice() -> ColorChoice {
    if atty::is(atty::Stream::Stdout) {
        ColorChoice::Auto
    } else {
        ColorChoice::Never
    }
}

// ============================================================================
// CORE OUTPUT FUNCTIONS
// ============================================================================

pub fn print_test_dirs(out: &mut impl WriteColor, dirs: &[PathBuf]) -> io::Result<()> {
    out.set_color(ColorSpec::new().set_bold(true))?;
    writeln!(out, "Found {} test case(s):", dirs.len())?;
    out.reset()?;
    for dir in dirs {
        writeln!(out, "  {}", dir.display())?;
    }
    Ok(())
}

/// Lines for what a finished run did. The found directories are printed
/// separately, as soon as discovery completes.
pub fn print_outputs(out: &mut impl WriteColor, outputs: &Outputs) -> io::Result<()> {
    match &outputs.result {
        RunResult::Recorded(paths) => {
            for path in paths {
                status(out, Color::Cyan, "WROTE")?;
                writeln!(out, " {}", path.display())?;
            }
            Ok(())
        }
        RunResult::Compared(report) => print_report(out, report),
    }
}

pub fn print_report(out: &mut impl WriteColor, report: &VerificationReport) -> io::Result<()> {
    for verdict in &report.verdicts {
        match verdict {
            CaseVerdict::Pass { dir } => {
                status(out, Color::Green, "PASS")?;
                writeln!(out, " {}", dir.display())?;
            }
            CaseVerdict::Skipped { dir, reason } => {
                status(out, Color::Yellow, "SKIP")?;
                writeln!(out, " {} ({reason})", dir.display())?;
            }
            CaseVerdict::Fail { dir, failure } => {
                status(out, Color::Red, "FAIL")?;
                writeln!(out, " {}", dir.display())?;
                match failure {
                    Failure::Differences(diffs) => diff::format_differences(out, diffs)?,
                    Failure::MalformedBaseline(message) => writeln!(out, "    {message}")?,
                }
            }
        }
    }

    writeln!(out)?;
    let color = if report.passed() { Color::Green } else { Color::Red };
    out.set_color(ColorSpec::new().set_fg(Some(color)).set_bold(true))?;
    write!(
        out,
        "{} passed, {} failed, {} skipped",
        report.pass_count(),
        report.fail_count(),
        report.skip_count()
    )?;
    out.reset()?;
    writeln!(out)
}

// ============================================================================
// PRIVATE HELPERS
// ============================================================================

fn status(out: &mut impl WriteColor, color: Color, label: &str) -> io::Result<()> {
    out.set_color(ColorSpec::new().set_fg(Some(color)).set_bold(true))?;
    write!(out, "{label}")?;
    out.reset()
}
