//! Shared fixtures for the integration tests: shell-script toolchains and
//! translators written into temporary directories.

#![allow(dead_code)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use conformer::config::ToolchainConfig;
use conformer::{Diagnostics, HarnessConfig, HarnessError, TranslationOptions};

/// Write an executable shell script.
pub fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, format!("#!/bin/sh\n{body}")).unwrap();
    let mut perms = fs::metadata(&path).unwrap().permissions();
    perms.set_mode(0o755);
    fs::set_permissions(&path, perms).unwrap();
    path
}

/// A toolchain that concatenates its inputs into the `-o` file and makes it
/// executable, appending one line to `log` per invocation.
pub fn concat_toolchain(dir: &Path, log: &Path) -> PathBuf {
    write_script(
        dir,
        "cc.sh",
        &format!(
            r#"echo "$@" >> "{log}"
out=""
inputs=""
while [ $# -gt 0 ]; do
  case "$1" in
    -o) out="$2"; shift 2;;
    -*) shift;;
    *) inputs="$inputs $1"; shift;;
  esac
done
cat $inputs > "$out" || exit 1
chmod +x "$out"
"#,
            log = log.display()
        ),
    )
}

/// A toolchain that prints `output`, still links, and exits with `status`.
pub fn noisy_toolchain(dir: &Path, output: &str, status: i32) -> PathBuf {
    write_script(
        dir,
        "noisy-cc.sh",
        &format!(
            r#"out=""
inputs=""
while [ $# -gt 0 ]; do
  case "$1" in
    -o) out="$2"; shift 2;;
    -*) shift;;
    *) inputs="$inputs $1"; shift;;
  esac
done
cat $inputs > "$out"
chmod +x "$out"
echo "{output}"
exit {status}
"#
        ),
    )
}

/// A translator executable that copies every `.java` input to `.m` and
/// reports an `error: ` line for each input containing `BROKEN`.
pub fn copy_translator(dir: &Path) -> PathBuf {
    write_script(
        dir,
        "j2x.sh",
        r#"while [ $# -gt 0 ]; do
  case "$1" in
    -d|-sourcepath) shift 2;;
    -*) shift;;
    *) f="$1"; shift
       if grep -q BROKEN "$f"; then echo "error: $f:1: cannot find symbol"; fi
       cp "$f" "${f%.java}.m";;
  esac
done
"#,
    )
}

/// In-process translator: copies each source to its `.m` sibling.
pub fn copying_translator(
    files: &[PathBuf],
    _options: &TranslationOptions,
) -> Result<Diagnostics, HarnessError> {
    for file in files {
        fs::copy(file, file.with_extension("m")).unwrap();
    }
    Ok(Diagnostics::clean())
}

pub fn config_with_toolchain(toolchain: &Path) -> HarnessConfig {
    HarnessConfig {
        toolchain: ToolchainConfig {
            path: Some(toolchain.to_path_buf()),
            ..ToolchainConfig::default()
        },
        ..HarnessConfig::default()
    }
}

/// Fragment source that is itself a runnable shell program.
pub fn program(body: &str) -> String {
    format!("#!/bin/sh\n{body}\n")
}

pub fn invocations(log: &Path) -> usize {
    fs::read_to_string(log)
        .map(|s| s.lines().count())
        .unwrap_or(0)
}
