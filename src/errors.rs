//! xrtest error handling.
//!
//! Every fatal condition the harness can hit is a variant of [`HarnessError`].
//! Each variant carries a stable `miette` diagnostic code so the CLI can render
//! it as a rich report, and names the path it concerns wherever one exists.
//!
//! Verification differences are *not* errors: they are collected as
//! [`crate::verify::CaseVerdict`] values and only turn into
//! [`HarnessError::VerificationFailed`] once every case has been evaluated.

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use miette::Diagnostic;
use thiserror::Error;

use crate::render::RenderError;

/// Convenience alias used throughout the crate.
pub type Result<T, E = HarnessError> = std::result::Result<T, E>;

// ============================================================================
// FILESYSTEM ERRORS
// ============================================================================

/// Errors raised by a [`crate::fs::Filesystem`] implementation.
#[derive(Debug, Error)]
pub enum FsError {
    #[error("cannot access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot walk {path}: {message}")]
    Walk { path: PathBuf, message: String },
}

impl FsError {
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn not_found(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let source = io::Error::new(
            io::ErrorKind::NotFound,
            format!("{} does not exist", path.display()),
        );
        Self::Io { path, source }
    }

    /// True when the underlying cause is a missing file or directory.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::Io { source, .. } => source.kind() == io::ErrorKind::NotFound,
            Self::Walk { .. } => false,
        }
    }
}

// ============================================================================
// HARNESS ERRORS
// ============================================================================

/// The single fatal error type of the harness.
#[derive(Debug, Error, Diagnostic)]
pub enum HarnessError {
    #[error(transparent)]
    #[diagnostic(code(xrtest::fs::io))]
    Filesystem(#[from] FsError),

    #[error("cannot parse YAML in {path}")]
    #[diagnostic(code(xrtest::document::parse))]
    ParseDocument {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("expected a single document in {path}, found {found}")]
    #[diagnostic(
        code(xrtest::document::count),
        help("split the file so that it holds exactly one YAML document")
    )]
    DocumentCount { path: PathBuf, found: usize },

    #[error("cannot serialize {what} to YAML")]
    #[diagnostic(code(xrtest::document::serialize))]
    Serialize {
        what: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("cannot parse context file {path}")]
    #[diagnostic(code(xrtest::loader::context))]
    ParseContext {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid version constraint for {package}: expected first constraint to start with '>=' but got {clause:?}")]
    #[diagnostic(
        code(xrtest::functions::version_constraint),
        help("anchor the constraint with a lower bound, e.g. \">=v0.9.1, <v1.0.0\"")
    )]
    InvalidVersionConstraint { package: String, clause: String },

    #[error("no functions found in {path}")]
    #[diagnostic(
        code(xrtest::functions::none),
        help("declare at least one dependency of kind Function under spec.dependsOn")
    )]
    NoFunctions { path: PathBuf },

    #[error("function {name:?} is declared more than once in {path}")]
    #[diagnostic(code(xrtest::functions::duplicate))]
    DuplicateFunction { name: String, path: PathBuf },

    #[error("invalid function document in {path}: {reason}")]
    #[diagnostic(code(xrtest::functions::invalid))]
    InvalidFunction { path: PathBuf, reason: String },

    #[error("cannot extract composition name from {path}: {field} not found or not a string")]
    #[diagnostic(
        code(xrtest::loader::composition_ref),
        help("set spec.crossplane.compositionRef.name on the composite resource")
    )]
    CompositionRef { path: PathBuf, field: String },

    #[error("composition {name:?} not found under {root}")]
    #[diagnostic(
        code(xrtest::composition::not_found),
        help("a YAML file with kind: Composition and a matching metadata.name must exist under the search root")
    )]
    CompositionNotFound { name: String, root: PathBuf },

    #[error("cannot render {dir}")]
    #[diagnostic(code(xrtest::render::failed))]
    Render {
        dir: PathBuf,
        #[source]
        source: RenderError,
    },

    #[error("failed to process {dir}")]
    #[diagnostic(code(xrtest::runner::case))]
    Case {
        dir: PathBuf,
        #[source]
        source: Box<HarnessError>,
    },

    #[error("test case task failed: {message}")]
    #[diagnostic(code(xrtest::runner::task))]
    TaskFailed { message: String },

    #[error("timed out after {}", humantime::format_duration(*.timeout))]
    #[diagnostic(
        code(xrtest::runner::timeout),
        help("raise --timeout or reduce the number of test cases")
    )]
    Timeout { timeout: Duration },

    #[error("test failed: differences found between expected and actual outputs in {failed} of {compared} compared case(s)")]
    #[diagnostic(code(xrtest::verify::failed))]
    VerificationFailed { failed: usize, compared: usize },
}

impl HarnessError {
    /// Wraps an error with the test-case directory it originated from.
    pub fn in_case(self, dir: impl Into<PathBuf>) -> Self {
        Self::Case {
            dir: dir.into(),
            source: Box::new(self),
        }
    }

    pub fn parse(path: impl Into<PathBuf>, source: serde_yaml::Error) -> Self {
        Self::ParseDocument {
            path: path.into(),
            source,
        }
    }

    pub fn serialize(what: impl Into<String>, source: serde_yaml::Error) -> Self {
        Self::Serialize {
            what: what.into(),
            source,
        }
    }
}
