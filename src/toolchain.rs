//! Native build of generated sources.
//!
//! The toolchain is invoked once per case:
//!
//! ```text
//! <toolchain> -g -I<scratch-root> -ObjC -o <artifact> <generated-file>...
//! ```
//!
//! A build fails when its combined output contains `error: `, or when it
//! exits unsuccessfully and exit-status checking is enabled.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use tracing::{debug, info};

use crate::config::ToolchainConfig;
use crate::errors::{HarnessError, Stage};
use crate::fragments::{FragmentSet, MaterializedFile};
use crate::naming::camel_case_qualified_name;
use crate::process::run_captured;

/// Marker whose presence in toolchain output fails the build.
pub const BUILD_ERROR_MARKER: &str = "error: ";

/// The executable produced by a successful build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildArtifact {
    pub path: PathBuf,
}

/// Executable file name for a fragment set: the camel-cased qualified name of
/// the primary fragment followed by `suffix`.
///
/// A pure function of the first fragment's qualifier.
pub fn artifact_name(
    fragments: &FragmentSet,
    source_extension: &str,
    suffix: &str,
) -> Option<String> {
    let primary = fragments.primary()?;
    let name = camel_case_qualified_name(primary.qualified_name(source_extension));
    Some(format!("{name}{suffix}"))
}

/// Full artifact path under the scratch root.
pub fn artifact_path(
    scratch_root: &Path,
    fragments: &FragmentSet,
    source_extension: &str,
    suffix: &str,
) -> Option<PathBuf> {
    artifact_name(fragments, source_extension, suffix).map(|name| scratch_root.join(name))
}

/// Generated file paths: each materialized path with its extension replaced.
pub fn generated_inputs(files: &[MaterializedFile], input_extension: &str) -> Vec<PathBuf> {
    files
        .iter()
        .map(|f| f.path.with_extension(input_extension))
        .collect()
}

/// An external compiler/linker driver.
#[derive(Debug, Clone)]
pub struct NativeToolchain {
    program: PathBuf,
    debug: bool,
    flags: Vec<String>,
    input_extension: String,
    check_exit_status: bool,
}

impl NativeToolchain {
    /// The configured toolchain, or `None` when native build is disabled.
    pub fn from_config(config: &ToolchainConfig) -> Option<Self> {
        let program = config.enabled_path()?;
        Some(Self {
            program: program.to_path_buf(),
            debug: config.debug,
            flags: config.flags.clone(),
            input_extension: config.input_extension.clone(),
            check_exit_status: config.check_exit_status,
        })
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn input_extension(&self) -> &str {
        &self.input_extension
    }

    fn command(&self, scratch_root: &Path, artifact: &Path, inputs: &[PathBuf]) -> Command {
        let mut command = Command::new(&self.program);
        if self.debug {
            command.arg("-g");
        }
        let mut include = std::ffi::OsString::from("-I");
        include.push(scratch_root);
        command
            .arg(include)
            .args(&self.flags)
            .arg("-o")
            .arg(artifact)
            .args(inputs);
        command
    }

    /// Build `inputs` into `artifact`.
    ///
    /// On failure the toolchain output is carried in [`HarnessError::Build`].
    pub fn build(
        &self,
        scratch_root: &Path,
        artifact: &Path,
        inputs: &[PathBuf],
        timeout: Duration,
    ) -> Result<BuildArtifact, HarnessError> {
        let command = self.command(scratch_root, artifact, inputs);
        let output = run_captured(command, Stage::Build, timeout)?;

        let marker = output.text.contains(BUILD_ERROR_MARKER);
        let bad_status = self.check_exit_status && !output.success();
        if marker || bad_status {
            debug!(marker, code = ?output.code(), "toolchain reported failure");
            let status = output.code();
            return Err(HarnessError::Build {
                output: output.text,
                status,
            });
        }

        info!(artifact = %artifact.display(), inputs = inputs.len(), "native build finished");
        Ok(BuildArtifact {
            path: artifact.to_path_buf(),
        })
    }
}
