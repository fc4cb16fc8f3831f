//! The conformance pipeline.
//!
//! ```text
//! MATERIALIZE → TRANSLATE → [diagnostics > 0 ⇒ FAIL]
//!             → BUILD     → [error marker / bad status ⇒ FAIL]
//!             → EXECUTE   → VERIFY → CLEANUP
//! ```
//!
//! A case with no expectation, or a harness with no toolchain configured,
//! stops after TRANSLATE with a pass. Each stage blocks until its external
//! process completes or its deadline passes, and no stage is ever retried.

use std::fs;
use std::io;
use std::panic::Location;
use std::path::{Path, PathBuf};

use miette::Diagnostic;
use tempfile::TempDir;
use thiserror::Error;
use tracing::{debug, field, info, info_span, warn, Span};

use crate::config::HarnessConfig;
use crate::errors::{HarnessError, Stage};
use crate::fragments::{materialize, FragmentSet};
use crate::report::FailureReport;
use crate::toolchain::{artifact_path, generated_inputs, NativeToolchain};
use crate::translate::{CommandTranslator, TranslationOptions, Translator};
use crate::verify;

/// One conformance case: fragments plus the output they should produce.
#[derive(Debug, Clone)]
pub struct ConformanceCase {
    pub name: String,
    pub fragments: FragmentSet,
    /// Absent or empty means "translation must succeed", nothing is run.
    pub expected: Option<String>,
}

impl ConformanceCase {
    pub fn new(name: impl Into<String>, fragments: FragmentSet, expected: Option<&str>) -> Self {
        Self {
            name: name.into(),
            fragments,
            expected: expected.map(str::to_string),
        }
    }

    /// A case named after the caller's source location.
    #[track_caller]
    pub fn here(fragments: FragmentSet, expected: Option<&str>) -> Self {
        let caller = Location::caller();
        Self::new(
            format!("{}:{}", caller.file(), caller.line()),
            fragments,
            expected,
        )
    }

    /// The expectation, if the case needs to be built and run.
    pub fn expectation(&self) -> Option<&str> {
        self.expected.as_deref().filter(|e| !e.is_empty())
    }
}

/// How a passing case passed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Built, ran, and printed the expected output.
    Verified,
    /// Translated cleanly; building and running were skipped.
    TranslationOnly,
}

/// A failed case: the gate that stopped it plus the full report.
#[derive(Error, Diagnostic, Debug)]
#[error("{report}")]
#[diagnostic(code(conformer::case))]
pub struct ConformanceFailure {
    #[source]
    pub error: HarnessError,
    pub report: FailureReport,
}

/// Scratch directory owned by a single case.
enum Scratch {
    Temp(TempDir),
    Fixed(PathBuf),
}

impl Scratch {
    fn path(&self) -> &Path {
        match self {
            Scratch::Temp(dir) => dir.path(),
            Scratch::Fixed(path) => path,
        }
    }
}

/// Removes the executable when the case ends, whatever its outcome.
struct ArtifactCleanup {
    path: PathBuf,
}

impl Drop for ArtifactCleanup {
    fn drop(&mut self) {
        match fs::remove_file(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "removed executable"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %self.path.display(), error = %e, "could not remove executable"),
        }
    }
}

/// Drives the generator under test and the native toolchain over cases.
pub struct Harness<T> {
    config: HarnessConfig,
    translator: T,
    toolchain: Option<NativeToolchain>,
}

impl Harness<CommandTranslator> {
    /// A harness using the translator executable named in `config`.
    pub fn from_config(config: HarnessConfig) -> Result<Self, HarnessError> {
        let translator = config
            .translator
            .as_ref()
            .map(CommandTranslator::from_config)
            .ok_or(HarnessError::MissingTranslator)?;
        Ok(Self::new(config, translator))
    }
}

impl<T: Translator> Harness<T> {
    pub fn new(config: HarnessConfig, translator: T) -> Self {
        let toolchain = NativeToolchain::from_config(&config.toolchain);
        Self {
            config,
            translator,
            toolchain,
        }
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    /// Whether cases with an expectation are built and run.
    pub fn builds_natively(&self) -> bool {
        self.toolchain.is_some()
    }

    /// Run `fragments` as a case named after the caller.
    ///
    /// `(qualifier, source)` pairs, first pair is the primary type; an empty
    /// `expected` only checks that translation succeeds.
    #[track_caller]
    pub fn run_conform_test(
        &mut self,
        fragments: &[(&str, &str)],
        expected: &str,
    ) -> Result<Outcome, ConformanceFailure> {
        let caller = Location::caller();
        let name = format!("{}:{}", caller.file(), caller.line());
        let expected = Some(expected);
        let fragments = match FragmentSet::from_pairs(fragments.iter().copied()) {
            Ok(fragments) => fragments,
            Err(error) => {
                let report = FailureReport::new(&name, &error, expected, &FragmentSet::new());
                return Err(ConformanceFailure { error, report });
            }
        };
        self.run_case(&ConformanceCase::new(name, fragments, expected))
    }

    /// Run one case through the pipeline.
    pub fn run_case(&mut self, case: &ConformanceCase) -> Result<Outcome, ConformanceFailure> {
        let span = info_span!("case", name = %case.name, stage = field::Empty);
        let _enter = span.enter();

        let result = self.scratch_for(case).and_then(|scratch| {
            let result = self.run_stages(case, scratch.path());
            self.finish_scratch(scratch);
            result
        });
        match result {
            Ok(outcome) => {
                info!(?outcome, "case passed");
                Ok(outcome)
            }
            Err(error) => {
                warn!(stage = %error.stage(), error = %error, "case failed");
                let report =
                    FailureReport::new(&case.name, &error, case.expected.as_deref(), &case.fragments);
                Err(ConformanceFailure { error, report })
            }
        }
    }

    fn scratch_for(&self, case: &ConformanceCase) -> Result<Scratch, HarnessError> {
        match &self.config.scratch_root {
            Some(root) => {
                let dir = case_dir(root, &case.name)?;
                let failed = |source| HarnessError::Materialization {
                    path: dir.clone(),
                    source,
                };
                match fs::remove_dir_all(&dir) {
                    Ok(()) => {}
                    Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                    Err(e) => return Err(failed(e)),
                }
                fs::create_dir_all(&dir).map_err(failed)?;
                Ok(Scratch::Fixed(dir))
            }
            None => {
                let dir = tempfile::Builder::new()
                    .prefix("conformer-")
                    .tempdir()
                    .map_err(|source| HarnessError::Materialization {
                        path: std::env::temp_dir(),
                        source,
                    })?;
                Ok(Scratch::Temp(dir))
            }
        }
    }

    fn run_stages(&mut self, case: &ConformanceCase, root: &Path) -> Result<Outcome, HarnessError> {
        let source_extension = self.config.source_extension.as_str();
        let timeouts = self.config.timeouts;

        if case.fragments.is_empty() {
            return Err(HarnessError::InvalidFragment {
                name: case.name.clone(),
                reason: "case has no fragments".to_string(),
            });
        }

        enter_stage(Stage::Materialize);
        let files = materialize(&case.fragments, root, source_extension)?;
        debug!(root = %root.display(), files = files.len(), "materialized");

        let paths: Vec<PathBuf> = files.iter().map(|f| f.path.clone()).collect();
        enter_stage(Stage::Translate);
        let options = TranslationOptions::for_scratch(root, timeouts.translate());
        self.translator.translate(&paths, &options)?.into_result()?;

        let (Some(toolchain), Some(expected)) = (self.toolchain.as_ref(), case.expectation())
        else {
            debug!("translation-only case");
            return Ok(Outcome::TranslationOnly);
        };

        let artifact = artifact_path(
            root,
            &case.fragments,
            source_extension,
            &self.config.artifact_suffix,
        )
        .ok_or_else(|| HarnessError::InvalidFragment {
            name: case.name.clone(),
            reason: "case has no primary fragment".to_string(),
        })?;
        let _cleanup = ArtifactCleanup {
            path: artifact.clone(),
        };

        enter_stage(Stage::Build);
        let inputs = generated_inputs(&files, toolchain.input_extension());
        let built = toolchain.build(root, &artifact, &inputs, timeouts.build())?;
        enter_stage(Stage::Execute);
        let output = verify::execute(&built, timeouts.run())?;
        enter_stage(Stage::Verify);
        verify::verify(expected, &output.text)?;
        Ok(Outcome::Verified)
    }

    fn finish_scratch(&self, scratch: Scratch) {
        if let Scratch::Temp(dir) = scratch {
            if self.config.keep_scratch {
                let kept = dir.keep();
                info!(path = %kept.display(), "kept scratch directory");
            }
        }
    }
}

fn enter_stage(stage: Stage) {
    Span::current().record("stage", stage.as_str());
    debug!(%stage, "entering stage");
}

/// The absolute directory a case owns under a fixed scratch root.
///
/// The directory is wiped before every run, so it must be a strict child of
/// the root.
fn case_dir(root: &Path, name: &str) -> Result<PathBuf, HarnessError> {
    let component = sanitize(name);
    if component.is_empty() {
        return Err(HarnessError::InvalidCase {
            name: name.to_string(),
            reason: "a case needs a non-empty name".to_string(),
        });
    }
    let root = std::path::absolute(root).map_err(|source| HarnessError::Materialization {
        path: root.to_path_buf(),
        source,
    })?;
    Ok(root.join(component))
}

/// Directory-safe form of a case name.
fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::translate::Diagnostics;

    fn clean(_: &[PathBuf], _: &TranslationOptions) -> Result<Diagnostics, HarnessError> {
        Ok(Diagnostics::clean())
    }

    #[test]
    fn empty_expectation_is_translation_only() {
        let case = ConformanceCase::new("t", FragmentSet::new(), Some(""));
        assert_eq!(case.expectation(), None);
        let case = ConformanceCase::new("t", FragmentSet::new(), Some("6912"));
        assert_eq!(case.expectation(), Some("6912"));
    }

    #[test]
    fn here_names_the_caller() {
        let case = ConformanceCase::here(FragmentSet::new(), None);
        assert!(case.name.starts_with(file!()), "{}", case.name);
    }

    #[test]
    fn sanitize_keeps_names_flat() {
        assert_eq!(sanitize("tests/lambda.rs:42"), "tests_lambda_rs_42");
    }

    #[test]
    fn empty_case_fails_before_translation() {
        let mut harness = Harness::new(HarnessConfig::default(), clean);
        let failure = harness
            .run_case(&ConformanceCase::new("empty", FragmentSet::new(), None))
            .unwrap_err();
        assert!(matches!(failure.error, HarnessError::InvalidFragment { .. }));
        assert_eq!(failure.report.test_name, "empty");
    }

    #[test]
    fn run_conform_test_reports_caller_name() {
        let translator = |_: &[PathBuf], _: &TranslationOptions| {
            Ok::<_, HarnessError>(Diagnostics::from_messages(["X.java:1: boom"]))
        };
        let mut harness = Harness::new(HarnessConfig::default(), translator);
        let failure = harness
            .run_conform_test(&[("X", "class X {}")], "ok")
            .unwrap_err();
        assert!(failure.report.test_name.starts_with(file!()));
        assert_eq!(failure.report.actual, "X.java:1: boom");
    }

    #[test]
    fn empty_name_never_wipes_fixed_scratch_root() {
        let root = tempfile::TempDir::new().unwrap();
        let unrelated = root.path().join("unrelated.txt");
        fs::write(&unrelated, "keep me").unwrap();

        let config = HarnessConfig {
            scratch_root: Some(root.path().to_path_buf()),
            ..HarnessConfig::default()
        };
        let mut harness = Harness::new(config, clean);
        let fragments = FragmentSet::from_pairs([("X", "class X {}")]).unwrap();
        let failure = harness
            .run_case(&ConformanceCase::new("", fragments, None))
            .unwrap_err();

        assert!(matches!(failure.error, HarnessError::InvalidCase { .. }));
        assert!(unrelated.exists());
        assert_eq!(fs::read_to_string(&unrelated).unwrap(), "keep me");
    }

    #[test]
    fn case_dir_is_an_absolute_child_of_the_root() {
        let dir = case_dir(Path::new("relative/scratch"), "tests/x.rs:7").unwrap();
        assert!(dir.is_absolute());
        assert!(dir.ends_with("relative/scratch/tests_x_rs_7"));
        assert!(case_dir(Path::new("/s"), "").is_err());
    }

    #[test]
    fn from_config_without_translator_names_the_problem() {
        let err = Harness::from_config(HarnessConfig::default()).err().unwrap();
        assert!(matches!(err, HarnessError::MissingTranslator));
        assert_eq!(err.to_string(), "no translator configured");
    }
}

