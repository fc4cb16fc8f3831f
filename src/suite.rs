//! YAML conformance suites.
//!
//! Suites are YAML files holding a list of cases:
//!
//! ```yaml
//! - name: lambda_add
//!   fragments:
//!     - name: X
//!       source: |
//!         interface I { int add(int x, int y); }
//!         public class X { ... }
//!   expected: "6912"   # absent or empty: translation-only
//!   skip: false        # optional
//!   only: false        # optional
//! ```
//!
//! Discovery walks a directory tree for `.yaml`/`.yml` files. Cases run one at
//! a time in discovery order.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::errors::HarnessError;
use crate::fragments::FragmentSet;
use crate::harness::{ConformanceCase, Harness, Outcome};
use crate::report::FailureReport;
use crate::translate::Translator;

/// A single case as written in a suite file.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SuiteCase {
    pub name: String,
    pub fragments: FragmentSet,
    #[serde(default)]
    pub expected: Option<String>,
    #[serde(default)]
    pub skip: bool,
    #[serde(default)]
    pub only: bool,
}

impl SuiteCase {
    pub fn to_case(&self) -> ConformanceCase {
        ConformanceCase::new(&self.name, self.fragments.clone(), self.expected.as_deref())
    }
}

/// Result of one suite case.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "result", rename_all = "kebab-case")]
pub enum CaseResult {
    Pass {
        file: String,
        name: String,
        translation_only: bool,
    },
    Fail {
        file: String,
        name: String,
        report: FailureReport,
    },
    Skipped {
        file: String,
        name: String,
        reason: String,
    },
}

/// Totals plus every individual result.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub results: Vec<CaseResult>,
}

impl RunSummary {
    fn from_results(results: Vec<CaseResult>) -> Self {
        let mut summary = Self::default();
        for result in &results {
            match result {
                CaseResult::Pass { .. } => summary.passed += 1,
                CaseResult::Fail { .. } => summary.failed += 1,
                CaseResult::Skipped { .. } => summary.skipped += 1,
            }
        }
        summary.results = results;
        summary
    }

    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }

    pub fn total(&self) -> usize {
        self.passed + self.failed + self.skipped
    }
}

/// Discovers all YAML files recursively under the given root, sorted by path.
pub fn discover_suite_files<P: AsRef<Path>>(root: P) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| {
            e.file_type().is_file()
                && e.path()
                    .extension()
                    .map(|ext| ext == "yaml" || ext == "yml")
                    .unwrap_or(false)
        })
        .map(|e| e.path().to_path_buf())
        .collect();
    files.sort();
    files
}

/// Load and parse the cases in one suite file.
pub fn load_suite(path: &Path) -> Result<Vec<SuiteCase>, HarnessError> {
    let suite_error = |message: String| HarnessError::Suite {
        path: path.to_path_buf(),
        message,
    };
    let text = fs::read_to_string(path).map_err(|e| suite_error(e.to_string()))?;
    let cases: Vec<SuiteCase> =
        serde_yaml::from_str(&text).map_err(|e| suite_error(e.to_string()))?;
    debug!(path = %path.display(), cases = cases.len(), "loaded suite");
    Ok(cases)
}

/// Why a case should not run, if it should not.
pub fn skip_reason(case: &SuiteCase, has_only: bool, filter: Option<&str>) -> Option<String> {
    if has_only && !case.only {
        return Some("not marked 'only' in 'only' mode".to_string());
    }
    if case.skip {
        return Some("marked 'skip'".to_string());
    }
    if let Some(f) = filter {
        if !case.name.to_lowercase().contains(&f.to_lowercase()) {
            return Some(format!("filtered out by substring: {f}"));
        }
    }
    None
}

/// Load every suite under `root` and run its cases through `harness`.
///
/// A suite file that cannot be read or parsed aborts the run before any case
/// executes.
pub fn run_suites<T: Translator>(
    root: &Path,
    filter: Option<&str>,
    harness: &mut Harness<T>,
) -> Result<RunSummary, HarnessError> {
    let mut all_cases = Vec::new();
    for path in discover_suite_files(root) {
        let file = path.display().to_string();
        for case in load_suite(&path)? {
            all_cases.push((file.clone(), case));
        }
    }
    let has_only = all_cases.iter().any(|(_, case)| case.only);
    info!(cases = all_cases.len(), root = %root.display(), "running suites");

    let results = all_cases
        .into_iter()
        .map(|(file, case)| {
            if let Some(reason) = skip_reason(&case, has_only, filter) {
                return CaseResult::Skipped {
                    file,
                    name: case.name,
                    reason,
                };
            }
            match harness.run_case(&case.to_case()) {
                Ok(outcome) => CaseResult::Pass {
                    file,
                    name: case.name,
                    translation_only: outcome == Outcome::TranslationOnly,
                },
                Err(failure) => CaseResult::Fail {
                    file,
                    name: case.name,
                    report: failure.report,
                },
            }
        })
        .collect();

    Ok(RunSummary::from_results(results))
}

/// Print every result and the totals. Failures go to stderr with full reports.
pub fn report_results(summary: &RunSummary, use_colors: bool) -> io::Result<()> {
    let choice = if use_colors {
        ColorChoice::Auto
    } else {
        ColorChoice::Never
    };
    let mut stdout = StandardStream::stdout(choice);
    let mut stderr = StandardStream::stderr(choice);

    for result in &summary.results {
        match result {
            CaseResult::Pass {
                file,
                name,
                translation_only,
            } => {
                tag(&mut stdout, "PASS", Color::Green)?;
                let note = if *translation_only {
                    " (translation only)"
                } else {
                    ""
                };
                writeln!(stdout, ": {name} [{file}]{note}")?;
            }
            CaseResult::Fail { report, .. } => report.write_colored(&mut stderr)?,
            CaseResult::Skipped { file, name, reason } => {
                tag(&mut stdout, "SKIP", Color::Yellow)?;
                writeln!(stdout, ": {name} [{file}] ({reason})")?;
            }
        }
    }

    writeln!(
        stdout,
        "\nTest summary: total {}, passed {}, failed {}, skipped {}",
        summary.total(),
        summary.passed,
        summary.failed,
        summary.skipped
    )?;

    if summary.has_failures() {
        writeln!(stderr, "\nFailed cases:")?;
        for result in &summary.results {
            if let CaseResult::Fail { name, .. } = result {
                writeln!(stderr, "  - {name}")?;
            }
        }
    }
    Ok(())
}

fn tag(out: &mut StandardStream, text: &str, color: Color) -> io::Result<()> {
    out.set_color(ColorSpec::new().set_fg(Some(color)).set_bold(true))?;
    write!(out, "{text}")?;
    out.reset()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn case(name: &str, skip: bool, only: bool) -> SuiteCase {
        SuiteCase {
            name: name.to_string(),
            fragments: FragmentSet::new(),
            expected: None,
            skip,
            only,
        }
    }

    #[test]
    fn only_mode_skips_everything_else() {
        assert!(skip_reason(&case("a", false, false), true, None).is_some());
        assert!(skip_reason(&case("a", false, true), true, None).is_none());
    }

    #[test]
    fn skip_and_filter() {
        assert_eq!(
            skip_reason(&case("a", true, false), false, None).as_deref(),
            Some("marked 'skip'")
        );
        assert!(skip_reason(&case("Lambda_Add", false, false), false, Some("lambda")).is_none());
        assert!(skip_reason(&case("generics", false, false), false, Some("lambda")).is_some());
    }

    #[test]
    fn discovers_yaml_recursively_in_order() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("nested")).unwrap();
        fs::write(temp.path().join("b.yaml"), "[]").unwrap();
        fs::write(temp.path().join("nested/a.yml"), "[]").unwrap();
        fs::write(temp.path().join("notes.txt"), "").unwrap();

        let files = discover_suite_files(temp.path());
        assert_eq!(
            files,
            vec![temp.path().join("b.yaml"), temp.path().join("nested/a.yml")]
        );
    }

    #[test]
    fn loads_cases_with_defaults() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("lambda.yaml");
        fs::write(
            &path,
            "- name: add\n  fragments:\n    - name: X\n      source: class X {}\n  expected: \"6912\"\n- name: compiles\n  fragments:\n    - name: Y\n      source: class Y {}\n",
        )
        .unwrap();

        let cases = load_suite(&path).unwrap();
        assert_eq!(cases.len(), 2);
        assert_eq!(cases[0].expected.as_deref(), Some("6912"));
        assert_eq!(cases[1].expected, None);
        assert!(!cases[1].skip);
        assert_eq!(cases[1].to_case().expectation(), None);
    }

    #[test]
    fn duplicate_fragment_names_fail_to_load() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("dup.yaml");
        fs::write(
            &path,
            "- name: dup\n  fragments:\n    - {name: X, source: a}\n    - {name: X, source: b}\n",
        )
        .unwrap();
        assert!(matches!(load_suite(&path), Err(HarnessError::Suite { .. })));
    }

    #[test]
    fn shipped_suites_parse() {
        let root = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/suites");
        let files = discover_suite_files(&root);
        assert!(!files.is_empty());
        for file in files {
            let cases = load_suite(&file).unwrap();
            for case in &cases {
                case.fragments.validate("java").unwrap();
            }
        }
    }
}
