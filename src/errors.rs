//! Conformer error handling.
//!
//! Every way a conformance case can fail is one variant of [`HarnessError`].
//! The variants map one-to-one onto the pipeline gates: materialization,
//! translation diagnostics, the native build, and output verification, plus
//! the process-level failures (spawn, timeout) that any external stage can hit.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use miette::Diagnostic;
use thiserror::Error;

/// Sentinel used as the "actual" output when a case never got to run.
pub const COMPILE_FAILED: &str = "COMPILE-FAILED";

/// The pipeline stage an error (or a report) belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Stage {
    Materialize,
    Translate,
    Build,
    Execute,
    Verify,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Materialize => "materialize",
            Stage::Translate => "translate",
            Stage::Build => "build",
            Stage::Execute => "execute",
            Stage::Verify => "verify",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unified error type for every harness failure mode.
#[derive(Error, Diagnostic, Debug)]
pub enum HarnessError {
    #[error("materialization failed: could not write '{}'", path.display())]
    #[diagnostic(
        code(conformer::materialize),
        help("the scratch directory must be writable; this is never retried")
    )]
    Materialization {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid fragment '{name}': {reason}")]
    #[diagnostic(code(conformer::fragment))]
    InvalidFragment { name: String, reason: String },

    #[error("invalid case name '{name}': {reason}")]
    #[diagnostic(
        code(conformer::case_name),
        help("case names select the case's directory under the scratch root")
    )]
    InvalidCase { name: String, reason: String },

    #[error("translation failed with {error_count} diagnostic(s)")]
    #[diagnostic(code(conformer::translate))]
    Translation {
        error_count: usize,
        messages: Vec<String>,
    },

    #[error("native build failed{}", status_suffix(*status))]
    #[diagnostic(
        code(conformer::build),
        help("the toolchain output is reported as the actual value")
    )]
    Build { output: String, status: Option<i32> },

    #[error("output did not match expected")]
    #[diagnostic(code(conformer::verify))]
    Mismatch { expected: String, actual: String },

    #[error("{stage} stage timed out after {}s", limit.as_secs_f64())]
    #[diagnostic(
        code(conformer::timeout),
        help("raise the matching entry under `timeouts` in the harness config")
    )]
    Timeout { stage: Stage, limit: Duration },

    #[error("failed to start '{}' during the {stage} stage", program.display())]
    #[diagnostic(code(conformer::spawn))]
    Spawn {
        stage: Stage,
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration in '{}': {message}", path.display())]
    #[diagnostic(code(conformer::config))]
    Config { path: PathBuf, message: String },

    #[error("no translator configured")]
    #[diagnostic(
        code(conformer::config),
        help("set `translator.path` in the harness config or the CONFORMER_TRANSLATOR environment variable")
    )]
    MissingTranslator,

    #[error("invalid suite '{}': {message}", path.display())]
    #[diagnostic(code(conformer::suite))]
    Suite { path: PathBuf, message: String },
}

fn status_suffix(status: Option<i32>) -> String {
    match status {
        Some(code) if code != 0 => format!(" (exit status {code})"),
        _ => String::new(),
    }
}

impl HarnessError {
    /// The stage whose gate produced this error.
    pub fn stage(&self) -> Stage {
        match self {
            HarnessError::Materialization { .. }
            | HarnessError::InvalidFragment { .. }
            | HarnessError::InvalidCase { .. } => Stage::Materialize,
            HarnessError::Translation { .. } => Stage::Translate,
            HarnessError::Build { .. } => Stage::Build,
            HarnessError::Mismatch { .. } => Stage::Verify,
            HarnessError::Timeout { stage, .. } | HarnessError::Spawn { stage, .. } => *stage,
            HarnessError::Config { .. }
            | HarnessError::MissingTranslator
            | HarnessError::Suite { .. } => Stage::Materialize,
        }
    }

    /// The text reported as "actual" output for this failure.
    ///
    /// Translation failures report the diagnostics joined by spaces, build
    /// failures report the raw toolchain output, and anything that stopped the
    /// case before the executable ran reports [`COMPILE_FAILED`].
    pub fn actual_output(&self) -> String {
        match self {
            HarnessError::Translation { messages, .. } if !messages.is_empty() => {
                messages.join(" ")
            }
            HarnessError::Build { output, .. } => output.clone(),
            HarnessError::Mismatch { actual, .. } => actual.clone(),
            HarnessError::Timeout {
                stage: Stage::Execute,
                ..
            } => String::new(),
            _ => COMPILE_FAILED.to_string(),
        }
    }
}
