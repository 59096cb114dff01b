//! Test utilities for subprocess-backed types
//!
//! Provides stand-in executables so bridge, log and mirror code can be
//! exercised without `adb` or `scrcpy` installed.

use std::path::{Path, PathBuf};

/// Name of the file a fake bridge appends its invocations to
pub const CALLS_LOG: &str = "calls.log";

/// Writes an executable `sh` script named `name` into `dir`.
///
/// # Arguments
/// * `dir` - Directory to place the script in (usually a tempdir)
/// * `name` - File name, which is also the process name it runs under
/// * `body` - Shell commands following the shebang line
pub fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).expect("write script");

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))
            .expect("chmod script");
    }

    path
}

/// Writes a fake device bridge into `dir`.
///
/// Every invocation is appended (one line of arguments) to `dir/calls.log`.
/// A `logcat` stream prints `log_lines` and exits; every other subcommand,
/// including `logcat -c`, succeeds silently.
pub fn write_fake_bridge(dir: &Path, log_lines: &[&str]) -> PathBuf {
    let calls = dir.join(CALLS_LOG);
    let printed: String = log_lines
        .iter()
        .map(|line| format!("  printf '%s\\n' '{}'\n", line))
        .collect();

    let body = format!(
        r#"echo "$@" >> '{calls}'
LOGCAT=""
CLEAR=""
for arg in "$@"; do
  [ "$arg" = "logcat" ] && LOGCAT=1
  [ "$arg" = "-c" ] && CLEAR=1
done
if [ -n "$LOGCAT" ] && [ -z "$CLEAR" ]; then
{printed}fi
exit 0"#,
        calls = calls.display(),
        printed = printed,
    );

    write_script(dir, "fake-bridge", &body)
}

/// Reads the invocations recorded by a fake bridge in `dir`.
pub fn read_calls(dir: &Path) -> Vec<String> {
    std::fs::read_to_string(dir.join(CALLS_LOG))
        .map(|content| content.lines().map(str::to_string).collect())
        .unwrap_or_default()
}
