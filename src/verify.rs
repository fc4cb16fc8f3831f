//! Running the built executable and checking what it printed.

use std::process::Command;
use std::time::Duration;

use tracing::debug;

use crate::errors::{HarnessError, Stage};
use crate::process::{run_captured, CapturedOutput};
use crate::toolchain::BuildArtifact;

/// Run the artifact with no arguments, capturing combined output.
///
/// The exit status is recorded but not judged; only the output is compared.
pub fn execute(artifact: &BuildArtifact, timeout: Duration) -> Result<CapturedOutput, HarnessError> {
    let output = run_captured(Command::new(&artifact.path), Stage::Execute, timeout)?;
    debug!(code = ?output.code(), "executable finished");
    Ok(output)
}

/// Leading and trailing whitespace is ignored; interior whitespace is not.
pub fn outputs_match(expected: &str, actual: &str) -> bool {
    expected.trim() == actual.trim()
}

/// Compare captured output against the expectation.
pub fn verify(expected: &str, actual: &str) -> Result<(), HarnessError> {
    if outputs_match(expected, actual) {
        Ok(())
    } else {
        Err(HarnessError::Mismatch {
            expected: expected.to_string(),
            actual: actual.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn surrounding_whitespace_is_ignored() {
        assert!(outputs_match("6912", "6912\n"));
        assert!(outputs_match("  Hello\n", "\n\tHello"));
        assert!(outputs_match("", " \n "));
    }

    #[test]
    fn interior_whitespace_is_significant() {
        assert!(!outputs_match("631\n136", "631 136"));
        assert!(!outputs_match("Argv[0] = Hello! \nx", "Argv[0] = Hello!\nx"));
    }

    #[test]
    fn mismatch_carries_both_sides() {
        match verify("SUCCESS", "FAILURE\n") {
            Err(HarnessError::Mismatch { expected, actual }) => {
                assert_eq!(expected, "SUCCESS");
                assert_eq!(actual, "FAILURE\n");
            }
            other => panic!("expected mismatch, got {other:?}"),
        }
    }
}
