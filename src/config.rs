//! Harness configuration.
//!
//! Loaded from a YAML file, then overridden from the environment. The only
//! setting most runs need is the toolchain path: when it is empty the harness
//! verifies translation alone and never builds or runs anything.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::debug;

use crate::errors::HarnessError;

/// Selects the toolchain binary; an empty value disables build and execution.
pub const TOOLCHAIN_ENV: &str = "CONFORMER_TOOLCHAIN";
/// Selects an external translator executable.
pub const TRANSLATOR_ENV: &str = "CONFORMER_TRANSLATOR";
/// Selects a fixed scratch root instead of a fresh temporary directory.
pub const SCRATCH_ENV: &str = "CONFORMER_SCRATCH";

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HarnessConfig {
    pub toolchain: ToolchainConfig,
    pub translator: Option<TranslatorConfig>,
    /// Extension of the fragment sources, without the dot.
    pub source_extension: String,
    /// Appended to the normalized primary type name to form the executable name.
    pub artifact_suffix: String,
    /// Fixed scratch root. When unset each case gets its own temporary directory.
    pub scratch_root: Option<PathBuf>,
    /// Leave temporary scratch directories behind for inspection.
    pub keep_scratch: bool,
    pub timeouts: Timeouts,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            toolchain: ToolchainConfig::default(),
            translator: None,
            source_extension: "java".to_string(),
            artifact_suffix: String::new(),
            scratch_root: None,
            keep_scratch: false,
            timeouts: Timeouts::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ToolchainConfig {
    /// Compiler/linker driver. `None` or empty disables native build.
    pub path: Option<PathBuf>,
    /// Pass `-g`.
    pub debug: bool,
    /// Flags placed after the include path.
    pub flags: Vec<String>,
    /// Extension of the generated files the toolchain consumes, without the dot.
    pub input_extension: String,
    /// Treat a non-zero exit status as a failed build, in addition to the
    /// `error: ` marker in the output.
    pub check_exit_status: bool,
}

impl Default for ToolchainConfig {
    fn default() -> Self {
        Self {
            path: None,
            debug: true,
            flags: vec!["-ObjC".to_string()],
            input_extension: "m".to_string(),
            check_exit_status: true,
        }
    }
}

impl ToolchainConfig {
    /// The configured toolchain, or `None` when native build is disabled.
    pub fn enabled_path(&self) -> Option<&Path> {
        self.path
            .as_deref()
            .filter(|p| !p.as_os_str().is_empty())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TranslatorConfig {
    pub path: PathBuf,
    #[serde(default)]
    pub flags: Vec<String>,
}

/// Per-stage deadlines, in seconds.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Timeouts {
    pub translate: u64,
    pub build: u64,
    pub run: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            translate: 60,
            build: 120,
            run: 30,
        }
    }
}

impl Timeouts {
    pub fn translate(&self) -> Duration {
        Duration::from_secs(self.translate)
    }

    pub fn build(&self) -> Duration {
        Duration::from_secs(self.build)
    }

    pub fn run(&self) -> Duration {
        Duration::from_secs(self.run)
    }
}

impl HarnessConfig {
    /// Parse a YAML configuration document.
    pub fn from_yaml(path: &Path, text: &str) -> Result<Self, HarnessError> {
        serde_yaml::from_str(text).map_err(|e| HarnessError::Config {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Load `path` and apply environment overrides.
    pub fn load(path: &Path) -> Result<Self, HarnessError> {
        let text = fs::read_to_string(path).map_err(|e| HarnessError::Config {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        let mut config = Self::from_yaml(path, &text)?;
        config.apply_env();
        debug!(path = %path.display(), "loaded harness config");
        Ok(config)
    }

    /// Defaults plus environment overrides.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env();
        config
    }

    /// Apply `CONFORMER_*` overrides from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| env::var_os(key).map(PathBuf::from));
    }

    /// Apply overrides from `lookup`; a set-but-empty toolchain value
    /// explicitly disables native build.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<PathBuf>) {
        if let Some(toolchain) = lookup(TOOLCHAIN_ENV) {
            self.toolchain.path = Some(toolchain);
        }
        if let Some(translator) = lookup(TRANSLATOR_ENV).filter(|p| !p.as_os_str().is_empty()) {
            let flags = self
                .translator
                .take()
                .map(|t| t.flags)
                .unwrap_or_default();
            self.translator = Some(TranslatorConfig {
                path: translator,
                flags,
            });
        }
        if let Some(scratch) = lookup(SCRATCH_ENV).filter(|p| !p.as_os_str().is_empty()) {
            self.scratch_root = Some(scratch);
        }
    }
}
