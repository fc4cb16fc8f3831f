//! Driving the generator under test.
//!
//! A [`Translator`] turns the materialized fragment files into generated
//! sources and returns the diagnostics it reported. Diagnostics are a plain
//! return value; nothing is read from process-wide state.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use tracing::{debug, info};

use crate::config::TranslatorConfig;
use crate::errors::{HarnessError, Stage};
use crate::process::run_captured;

/// Prefix the generator puts in front of every error it reports.
pub const ERROR_PREFIX: &str = "error: ";

/// Errors reported by one translation run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Diagnostics {
    /// Number of errors counted by the generator. This can exceed
    /// `messages.len()` when errors were counted without a message.
    pub error_count: usize,
    pub messages: Vec<String>,
}

impl Diagnostics {
    pub fn clean() -> Self {
        Self::default()
    }

    pub fn from_messages<I, S>(messages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let messages: Vec<String> = messages.into_iter().map(Into::into).collect();
        Self {
            error_count: messages.len(),
            messages,
        }
    }

    /// Scan generator output for `error: ` lines, one diagnostic per line.
    pub fn from_output(output: &str) -> Self {
        Self::from_messages(
            output
                .lines()
                .filter_map(|line| line.trim_start().strip_prefix(ERROR_PREFIX))
                .map(str::trim_end),
        )
    }

    pub fn has_errors(&self) -> bool {
        self.error_count > 0
    }

    /// Convert to the fail-fast error when any diagnostic was reported.
    pub fn into_result(self) -> Result<(), HarnessError> {
        if self.has_errors() {
            Err(HarnessError::Translation {
                error_count: self.error_count,
                messages: self.messages,
            })
        } else {
            Ok(())
        }
    }
}

/// Options shared by every translation in a case.
#[derive(Debug, Clone)]
pub struct TranslationOptions {
    /// Where generated files are written; the scratch root.
    pub output_dir: PathBuf,
    /// Roots searched for referenced sources; the scratch root by default.
    pub source_path: Vec<PathBuf>,
    /// Extra generator flags.
    pub flags: Vec<String>,
    pub timeout: Duration,
}

impl TranslationOptions {
    pub fn for_scratch(root: &Path, timeout: Duration) -> Self {
        Self {
            output_dir: root.to_path_buf(),
            source_path: vec![root.to_path_buf()],
            flags: Vec::new(),
            timeout,
        }
    }
}

/// The generator under test.
pub trait Translator {
    /// Translate `files` and report the diagnostics the generator produced.
    ///
    /// An `Err` means the generator could not be driven at all (it failed to
    /// start or timed out); reported errors belong in the returned
    /// [`Diagnostics`].
    fn translate(
        &mut self,
        files: &[PathBuf],
        options: &TranslationOptions,
    ) -> Result<Diagnostics, HarnessError>;
}

impl<F> Translator for F
where
    F: FnMut(&[PathBuf], &TranslationOptions) -> Result<Diagnostics, HarnessError>,
{
    fn translate(
        &mut self,
        files: &[PathBuf],
        options: &TranslationOptions,
    ) -> Result<Diagnostics, HarnessError> {
        self(files, options)
    }
}

/// Runs an external generator executable.
///
/// Invoked as `<program> -d <output-dir> -sourcepath <roots> <flags…> <files…>`;
/// every output line starting with `error: ` counts as one diagnostic.
#[derive(Debug, Clone)]
pub struct CommandTranslator {
    program: PathBuf,
    flags: Vec<String>,
}

impl CommandTranslator {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            flags: Vec::new(),
        }
    }

    pub fn from_config(config: &TranslatorConfig) -> Self {
        Self {
            program: config.path.clone(),
            flags: config.flags.clone(),
        }
    }

    pub fn with_flags<I, S>(mut self, flags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.flags.extend(flags.into_iter().map(Into::into));
        self
    }

    fn command(&self, files: &[PathBuf], options: &TranslationOptions) -> Command {
        let mut command = Command::new(&self.program);
        command.arg("-d").arg(&options.output_dir);
        if !options.source_path.is_empty() {
            let joined = std::env::join_paths(&options.source_path)
                .unwrap_or_else(|_| options.output_dir.clone().into_os_string());
            command.arg("-sourcepath").arg(joined);
        }
        command.args(&self.flags).args(&options.flags).args(files);
        command
    }
}

impl Translator for CommandTranslator {
    fn translate(
        &mut self,
        files: &[PathBuf],
        options: &TranslationOptions,
    ) -> Result<Diagnostics, HarnessError> {
        let output = run_captured(
            self.command(files, options),
            Stage::Translate,
            options.timeout,
        )?;
        let mut diagnostics = Diagnostics::from_output(&output.text);
        if !output.success() && !diagnostics.has_errors() {
            // A crash without an error line still counts as a failed run.
            diagnostics.error_count = 1;
            debug!(code = ?output.code(), "translator exited unsuccessfully without diagnostics");
        }
        info!(
            files = files.len(),
            errors = diagnostics.error_count,
            "translation finished"
        );
        Ok(diagnostics)
    }
}
