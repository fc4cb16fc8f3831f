//! Failure reports.
//!
//! A report names the case that failed, the stage it failed in, the expected
//! and actual output, and dumps every fragment so the failure can be
//! reproduced without the suite file at hand.

use std::fmt;
use std::io::{self, Write};

use difference::{Changeset, Difference};
use serde::Serialize;
use termcolor::{Color, ColorSpec, WriteColor};

use crate::errors::{HarnessError, Stage};
use crate::fragments::FragmentSet;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FragmentDump {
    pub name: String,
    pub source: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct FailureReport {
    /// Name of the case that failed, as given by its caller.
    pub test_name: String,
    pub stage: Stage,
    /// One-line description of the failure.
    pub summary: String,
    pub expected: Option<String>,
    pub actual: String,
    pub fragments: Vec<FragmentDump>,
}

impl FailureReport {
    pub fn new(
        test_name: &str,
        error: &HarnessError,
        expected: Option<&str>,
        fragments: &FragmentSet,
    ) -> Self {
        Self {
            test_name: test_name.to_string(),
            stage: error.stage(),
            summary: error.to_string(),
            expected: expected.map(str::to_string),
            actual: error.actual_output(),
            fragments: fragments
                .iter()
                .map(|f| FragmentDump {
                    name: f.name.clone(),
                    source: f.source.clone(),
                })
                .collect(),
        }
    }

    /// Write the report with colors and, for output mismatches, a line diff.
    pub fn write_colored<W: WriteColor>(&self, out: &mut W) -> io::Result<()> {
        out.set_color(ColorSpec::new().set_fg(Some(Color::Red)).set_bold(true))?;
        write!(out, "FAIL")?;
        out.reset()?;
        writeln!(out, ": {} [{}] {}", self.test_name, self.stage, self.summary)?;

        self.write_expected_actual(out)?;
        if self.stage == Stage::Verify {
            if let Some(expected) = &self.expected {
                writeln!(out, "  Diff:")?;
                write_diff(out, expected.trim(), self.actual.trim())?;
            }
        }
        self.write_fragments(out)
    }

    fn write_expected_actual<W: Write>(&self, out: &mut W) -> io::Result<()> {
        match &self.expected {
            Some(expected) => writeln!(out, "  Expected: {}", expected.trim())?,
            None => writeln!(out, "  Expected: <none>")?,
        }
        writeln!(out, "  Actual:   {}", self.actual.trim())
    }

    fn write_fragments<W: Write>(&self, out: &mut W) -> io::Result<()> {
        for fragment in &self.fragments {
            writeln!(out, "  --- {} ---", fragment.name)?;
            for line in fragment.source.lines() {
                writeln!(out, "  {line}")?;
            }
        }
        Ok(())
    }
}

impl fmt::Display for FailureReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut buf = Vec::new();
        writeln!(buf, "FAIL: {} [{}] {}", self.test_name, self.stage, self.summary)
            .and_then(|_| self.write_expected_actual(&mut buf))
            .and_then(|_| self.write_fragments(&mut buf))
            .map_err(|_| fmt::Error)?;
        f.write_str(&String::from_utf8_lossy(&buf))
    }
}

fn write_diff<W: WriteColor>(out: &mut W, expected: &str, actual: &str) -> io::Result<()> {
    let changeset = Changeset::new(expected, actual, "\n");
    for diff in &changeset.diffs {
        match diff {
            Difference::Same(x) => {
                out.reset()?;
                for line in x.lines() {
                    writeln!(out, "    {line}")?;
                }
            }
            Difference::Rem(x) => {
                out.set_color(ColorSpec::new().set_fg(Some(Color::Green)))?;
                for line in x.lines() {
                    writeln!(out, "  - {line}")?;
                }
            }
            Difference::Add(x) => {
                out.set_color(ColorSpec::new().set_fg(Some(Color::Red)))?;
                for line in x.lines() {
                    writeln!(out, "  + {line}")?;
                }
            }
        }
    }
    out.reset()
}

#[cfg(test)]
mod tests {
    use super::*;
    use termcolor::NoColor;

    fn fragments() -> FragmentSet {
        FragmentSet::from_pairs([("X", "public class X {\n  int x;\n}")]).unwrap()
    }

    #[test]
    fn mismatch_report_shows_both_sides_and_fragments() {
        let err = HarnessError::Mismatch {
            expected: "631\n136".into(),
            actual: "631\n137\n".into(),
        };
        let report = FailureReport::new("lambda_array_ctor", &err, Some("631\n136"), &fragments());
        let text = report.to_string();

        assert!(text.starts_with("FAIL: lambda_array_ctor [verify]"));
        assert!(text.contains("Expected: 631\n136"));
        assert!(text.contains("Actual:   631\n137"));
        assert!(text.contains("--- X ---"));
        assert!(text.contains("  int x;"));
    }

    #[test]
    fn colored_report_includes_diff_lines() {
        let err = HarnessError::Mismatch {
            expected: "a\nb".into(),
            actual: "a\nc".into(),
        };
        let report = FailureReport::new("t", &err, Some("a\nb"), &fragments());
        let mut out = NoColor::new(Vec::new());
        report.write_colored(&mut out).unwrap();
        let text = String::from_utf8(out.into_inner()).unwrap();

        assert!(text.contains("  - b"));
        assert!(text.contains("  + c"));
    }

    #[test]
    fn translation_report_uses_diagnostics_as_actual() {
        let err = HarnessError::Translation {
            error_count: 1,
            messages: vec!["X.java:1: cannot find symbol".into()],
        };
        let report = FailureReport::new("t", &err, Some("6912"), &fragments());
        assert_eq!(report.stage, Stage::Translate);
        assert_eq!(report.actual, "X.java:1: cannot find symbol");
        assert_eq!(report.expected.as_deref(), Some("6912"));
    }

    #[test]
    fn serializes_to_json() {
        let err = HarnessError::Build {
            output: "error: boom".into(),
            status: Some(1),
        };
        let report = FailureReport::new("t", &err, None, &fragments());
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["stage"], "build");
        assert_eq!(json["fragments"][0]["name"], "X");
    }
}
